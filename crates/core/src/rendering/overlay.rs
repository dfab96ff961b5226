//! Draws faces and landmarks onto RGB images in place.
//!
//! Geometry outside the image is clipped; nothing here fails.
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::sequence::face::{Face, Frame};
use crate::shared::geometry::{BBox, Point};

pub const DEFAULT_LANDMARKS_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const DEFAULT_BBOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const DEFAULT_THICKNESS: u32 = 1;

const GLYPH_WIDTH: i32 = 3;
const GLYPH_HEIGHT: i32 = 5;

/// 3x5 bitmaps for '0'..='9'; each row uses the low three bits, MSB left.
const DIGITS: [[u8; 5]; 10] = [
    [0b111, 0b101, 0b101, 0b101, 0b111],
    [0b010, 0b110, 0b010, 0b010, 0b111],
    [0b111, 0b001, 0b111, 0b100, 0b111],
    [0b111, 0b001, 0b111, 0b001, 0b111],
    [0b101, 0b101, 0b111, 0b001, 0b001],
    [0b111, 0b100, 0b111, 0b001, 0b111],
    [0b111, 0b100, 0b111, 0b101, 0b111],
    [0b111, 0b001, 0b010, 0b010, 0b010],
    [0b111, 0b101, 0b111, 0b101, 0b111],
    [0b111, 0b101, 0b111, 0b001, 0b111],
];

/// Draws every landmark as a filled dot `2 * thickness - 1` pixels wide,
/// optionally labelled with its index.
pub fn render_landmarks(
    img: &mut RgbImage,
    landmarks: &[Point],
    draw_labels: bool,
    color: Rgb<u8>,
    thickness: u32,
) {
    let radius = thickness.max(1) as i32;
    for (i, p) in landmarks.iter().enumerate() {
        if radius == 1 {
            put_pixel_clipped(img, p.x, p.y, color);
        } else {
            draw_filled_circle_mut(img, (p.x, p.y), radius - 1, color);
        }
        if draw_labels {
            draw_number(img, p.x + radius + 1, p.y - GLYPH_HEIGHT / 2, i, color);
        }
    }
}

/// Outlines `bbox` with a border `thickness` pixels wide, growing inwards.
pub fn render_bbox(img: &mut RgbImage, bbox: &BBox, color: Rgb<u8>, thickness: u32) {
    if bbox.is_empty() {
        return;
    }
    for inset in 0..thickness.max(1) as i32 {
        let width = bbox.width - 2 * inset;
        let height = bbox.height - 2 * inset;
        if width <= 0 || height <= 0 {
            break;
        }
        let rect = Rect::at(bbox.x + inset, bbox.y + inset).of_size(width as u32, height as u32);
        draw_hollow_rect_mut(img, rect, color);
    }
}

pub fn render_face(
    img: &mut RgbImage,
    face: &Face,
    draw_labels: bool,
    bbox_color: Rgb<u8>,
    landmarks_color: Rgb<u8>,
    thickness: u32,
) {
    render_bbox(img, &face.bbox, bbox_color, thickness);
    render_landmarks(img, &face.landmarks, draw_labels, landmarks_color, thickness);
}

pub fn render_frame(
    img: &mut RgbImage,
    frame: &Frame,
    draw_labels: bool,
    bbox_color: Rgb<u8>,
    landmarks_color: Rgb<u8>,
    thickness: u32,
) {
    for face in &frame.faces {
        render_face(img, face, draw_labels, bbox_color, landmarks_color, thickness);
    }
}

fn draw_number(img: &mut RgbImage, x: i32, y: i32, value: usize, color: Rgb<u8>) {
    for (i, ch) in value.to_string().chars().enumerate() {
        let Some(digit) = ch.to_digit(10) else {
            continue;
        };
        let glyph_x = x + i as i32 * (GLYPH_WIDTH + 1);
        for (row, bits) in DIGITS[digit as usize].iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if (bits >> (GLYPH_WIDTH - 1 - col)) & 1 == 1 {
                    put_pixel_clipped(img, glyph_x + col, y + row as i32, color);
                }
            }
        }
    }
}

fn put_pixel_clipped(img: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}
