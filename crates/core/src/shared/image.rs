use image::imageops::{self, FilterType};
use ndarray::{ArrayView3, ArrayViewMut3};

use super::error::SequenceError;

/// A pixel buffer handed to the sequence: contiguous bytes in row-major
/// order, either 3 interleaved channels (RGB) or a single gray channel.
///
/// Decoding happens at I/O boundaries only; the sequence treats pixel data
/// as opaque apart from resizing it for detection.
#[derive(Clone, Debug)]
pub struct Image {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
}

impl Image {
    /// Wraps raw pixels. Zero-sized images are allowed here and rejected
    /// later by the operations that need pixels.
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        channels: u8,
    ) -> Result<Self, SequenceError> {
        if channels != 1 && channels != 3 {
            return Err(SequenceError::InvalidInput(format!(
                "images must have 1 or 3 channels, got {channels}"
            )));
        }
        let expected = (width as usize) * (height as usize) * (channels as usize);
        if data.len() != expected {
            return Err(SequenceError::InvalidInput(format!(
                "data length {} does not match {width}x{height}x{channels}",
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            channels,
        })
    }

    pub fn from_rgb(img: image::RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            data: img.into_raw(),
            width,
            height,
            channels: 3,
        }
    }

    pub fn from_gray(img: image::GrayImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            data: img.into_raw(),
            width,
            height,
            channels: 1,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Image data length must match dimensions")
    }

    pub fn as_ndarray_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        let shape = self.shape();
        ArrayViewMut3::from_shape(shape, &mut self.data)
            .expect("Image data length must match dimensions")
    }

    /// Resamples to `width` x `height` with a triangle filter.
    pub fn resized(&self, width: u32, height: u32) -> Image {
        if width == self.width && height == self.height {
            return self.clone();
        }
        match self.channels {
            1 => {
                let src = image::GrayImage::from_raw(self.width, self.height, self.data.clone())
                    .expect("Image data length must match dimensions");
                Image::from_gray(imageops::resize(&src, width, height, FilterType::Triangle))
            }
            _ => {
                let src = image::RgbImage::from_raw(self.width, self.height, self.data.clone())
                    .expect("Image data length must match dimensions");
                Image::from_rgb(imageops::resize(&src, width, height, FilterType::Triangle))
            }
        }
    }

    /// Resamples by a uniform factor; each side is `max(1, round(side * scale))`.
    pub fn scaled(&self, scale: f64) -> Image {
        let w = ((self.width as f64 * scale).round() as u32).max(1);
        let h = ((self.height as f64 * scale).round() as u32).max(1);
        self.resized(w, h)
    }

    /// Copies the pixels into an RGB image, expanding gray to three channels.
    pub fn to_rgb_image(&self) -> image::RgbImage {
        match self.channels {
            1 => {
                let mut rgb = Vec::with_capacity(self.data.len() * 3);
                for &v in &self.data {
                    rgb.extend_from_slice(&[v, v, v]);
                }
                image::RgbImage::from_raw(self.width, self.height, rgb)
                    .expect("Image data length must match dimensions")
            }
            _ => image::RgbImage::from_raw(self.width, self.height, self.data.clone())
                .expect("Image data length must match dimensions"),
        }
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
