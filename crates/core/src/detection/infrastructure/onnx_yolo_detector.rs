//! YOLO-pose face detector using ONNX Runtime via `ort`.
//!
//! Handles letterbox preprocessing, inference and NMS, then maps boxes and
//! the five facial keypoints back to the input image's pixel space.
//! Landmark order is the model's: left eye, right eye, nose, left mouth
//! corner, right mouth corner.
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::detection::domain::face_detector::{DetectorLoader, FaceDetector, RawFace};
use crate::shared::geometry::{BBox, Point};
use crate::shared::image::Image;

/// Fallback YOLO model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Default confidence threshold for face detection.
pub const DEFAULT_CONFIDENCE: f64 = 0.25;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

pub const NUM_LANDMARKS: usize = 5;

/// Values per keypoint in the output row: x, y, conf.
const KEYPOINT_STRIDE: usize = 3;

/// YOLO face detector backed by an ONNX Runtime session.
///
/// `ort` needs `&mut Session` to run, so the session sits behind a mutex;
/// concurrent callers take turns on it and share nothing else.
pub struct OnnxYoloDetector {
    session: Mutex<ort::session::Session>,
    confidence: f64,
    input_size: u32,
}

impl OnnxYoloDetector {
    /// Load a YOLO-pose ONNX model and prepare for inference.
    ///
    /// The input resolution is read from the model's input shape (expecting NCHW).
    /// Falls back to 640 if the shape is dynamic or unreadable.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        if !model_path.is_file() {
            return Err(format!("model file not found: {}", model_path.display()).into());
        }
        let session = ort::session::Session::builder()?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    // [N, C, H, W], square input
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        log::info!(
            "Loaded face model {} (input {input_size}x{input_size})",
            model_path.display()
        );

        Ok(Self {
            session: Mutex::new(session),
            confidence,
            input_size,
        })
    }

    fn infer(&self, image: &Image) -> Result<Vec<RawDetection>, Box<dyn std::error::Error>> {
        let (input_tensor, scale, pad_x, pad_y) = letterbox(image, self.input_size);
        let input_value = ort::value::Tensor::from_array(input_tensor)?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| format!("Lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();

        // [1, features, detections] (transposed) or [1, detections, features]
        if shape.len() != 3 {
            return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
        }
        let transposed = shape[1] < shape[2];
        let (num_dets, num_feats) = if transposed {
            (shape[2], shape[1])
        } else {
            (shape[1], shape[2])
        };
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;

        let mut raw_dets = Vec::new();
        for i in 0..num_dets {
            let row: Vec<f32> = if transposed {
                (0..num_feats).map(|f| data[f * num_dets + i]).collect()
            } else {
                data[i * num_feats..(i + 1) * num_feats].to_vec()
            };
            if let Some(det) = decode_row(&row, self.confidence, scale, pad_x, pad_y) {
                raw_dets.push(det);
            }
        }
        Ok(raw_dets)
    }
}

impl FaceDetector for OnnxYoloDetector {
    fn detect(&self, image: &Image) -> Result<Vec<RawFace>, Box<dyn std::error::Error>> {
        if image.is_empty() {
            return Ok(Vec::new());
        }
        let mut raw_dets = self.infer(image)?;
        let kept = nms(&mut raw_dets, NMS_IOU_THRESH);
        Ok(to_raw_faces(&kept, image.width(), image.height()))
    }
}

/// Loads [`OnnxYoloDetector`]s at a fixed confidence threshold.
pub struct OnnxDetectorLoader {
    confidence: f64,
}

impl OnnxDetectorLoader {
    pub fn new(confidence: f64) -> Self {
        Self { confidence }
    }
}

impl Default for OnnxDetectorLoader {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE)
    }
}

impl DetectorLoader for OnnxDetectorLoader {
    fn load(&self, model_path: &Path) -> Result<Arc<dyn FaceDetector>, Box<dyn std::error::Error>> {
        Ok(Arc::new(OnnxYoloDetector::new(model_path, self.confidence)?))
    }
}

fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct RawDetection {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    confidence: f64,
    keypoints: Vec<(f64, f64)>,
}

impl RawDetection {
    fn iou(&self, other: &RawDetection) -> f64 {
        let w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = w * h;
        if inter == 0.0 {
            return 0.0;
        }
        let area = |d: &RawDetection| (d.x2 - d.x1) * (d.y2 - d.y1);
        inter / (area(self) + area(other) - inter)
    }
}

/// Decodes `[cx, cy, w, h, conf, kp0_x, kp0_y, kp0_conf, ...]` from
/// letterbox space into input-image space.
fn decode_row(row: &[f32], min_conf: f64, scale: f64, pad_x: u32, pad_y: u32) -> Option<RawDetection> {
    if row.len() < 5 {
        return None;
    }
    let conf = row[4] as f64;
    if conf < min_conf {
        return None;
    }

    let cx = row[0] as f64;
    let cy = row[1] as f64;
    let w = row[2] as f64;
    let h = row[3] as f64;
    let px = pad_x as f64;
    let py = pad_y as f64;

    let keypoints = if row.len() >= 5 + NUM_LANDMARKS * KEYPOINT_STRIDE {
        (0..NUM_LANDMARKS)
            .map(|k| {
                let kx = row[5 + k * KEYPOINT_STRIDE] as f64;
                let ky = row[5 + k * KEYPOINT_STRIDE + 1] as f64;
                ((kx - px) / scale, (ky - py) / scale)
            })
            .collect()
    } else {
        Vec::new()
    };

    Some(RawDetection {
        x1: ((cx - w / 2.0) - px) / scale,
        y1: ((cy - h / 2.0) - py) / scale,
        x2: ((cx + w / 2.0) - px) / scale,
        y2: ((cy + h / 2.0) - py) / scale,
        confidence: conf,
        keypoints,
    })
}

/// Rounds to pixels and clamps boxes to the image; boxes left empty by the
/// clamp are dropped.
fn to_raw_faces(dets: &[RawDetection], width: u32, height: u32) -> Vec<RawFace> {
    let (fw, fh) = (width as f64, height as f64);
    dets.iter()
        .filter_map(|d| {
            let x1 = d.x1.round().clamp(0.0, fw) as i32;
            let y1 = d.y1.round().clamp(0.0, fh) as i32;
            let x2 = d.x2.round().clamp(0.0, fw) as i32;
            let y2 = d.y2.round().clamp(0.0, fh) as i32;
            let bbox = BBox::new(x1, y1, x2 - x1, y2 - y1).clamped(width, height);
            if bbox.is_empty() {
                return None;
            }
            let landmarks = d
                .keypoints
                .iter()
                .map(|&(x, y)| Point::new(x.round() as i32, y.round() as i32))
                .collect();
            Some(RawFace { bbox, landmarks })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Letterbox-resize an image to `target_size` × `target_size`.
///
/// Gray images are replicated across the three input channels.
/// Returns `(NCHW float32 tensor, scale, pad_x, pad_y)`.
fn letterbox(image: &Image, target_size: u32) -> (ndarray::Array4<f32>, f64, u32, u32) {
    let fw = image.width() as f64;
    let fh = image.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // Padded with 114/255 gray, YOLO convention
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = image.as_ndarray(); // [H, W, C] u8
    let src_h = image.height() as usize;
    let src_w = image.width() as usize;
    let channels = image.channels() as usize;

    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                let sc = if channels == 1 { 0 } else { c };
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, sc]] as f32 / 255.0;
            }
        }
    }

    (tensor, scale, pad_x, pad_y)
}

// ---------------------------------------------------------------------------
// NMS
// ---------------------------------------------------------------------------

/// Greedy NMS: sort by confidence descending, suppress overlapping boxes.
fn nms(dets: &mut [RawDetection], iou_thresh: f64) -> Vec<RawDetection> {
    dets.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; dets.len()];

    for i in 0..dets.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(dets[i].clone());
        for j in (i + 1)..dets.len() {
            if suppressed[j] {
                continue;
            }
            if dets[i].iou(&dets[j]) > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    keep
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
