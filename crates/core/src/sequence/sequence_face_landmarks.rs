use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::detection::infrastructure::model_resolver;
use crate::detection::infrastructure::onnx_yolo_detector::OnnxDetectorLoader;
use crate::shared::constants::{DEFAULT_FIRST_FACE_ID, DEFAULT_FRAME_SCALE, DEFAULT_IOU_THRESHOLD};
use crate::shared::error::SequenceError;
use crate::shared::image::Image;

use super::face::Frame;
use super::frame_sequence::FrameSequence;
use super::landmark_sequence::LandmarkSequence;

/// Detects faces and landmarks over an ordered sequence of frames and keeps
/// face ids consistent from one frame to the next.
///
/// Mutating calls take `&mut self`, so one instance is driven by a single
/// writer at a time. To share an instance between threads, wrap it in an
/// `RwLock`; independent workers should use [`clone_boxed`] instead, which
/// shares only the loaded model.
///
/// [`clone_boxed`]: SequenceFaceLandmarks::clone_boxed
pub trait SequenceFaceLandmarks: Send + Sync {
    /// Detects faces in `image`, assigns ids and commits a new frame.
    ///
    /// `frame_id` is used verbatim when given; otherwise the next value of
    /// an internal counter is taken. Nothing is committed on error.
    fn add_frame(&mut self, image: &Image, frame_id: Option<u32>) -> Result<&Frame, SequenceError>;

    /// Every committed frame, oldest first.
    fn sequence(&self) -> &FrameSequence;

    /// Drops all frames and restarts face and frame ids. Configuration is kept.
    fn clear(&mut self);

    /// Full copy with its own frames and tracker state, sharing the model.
    fn clone_boxed(&self) -> Box<dyn SequenceFaceLandmarks>;

    fn model(&self) -> &Path;

    /// Loads a different model. On failure the current model stays active.
    fn set_model(&mut self, model_path: &Path) -> Result<(), SequenceError>;

    fn frame_scale(&self) -> f32;

    /// Scale applied to images before detection. Must be finite and > 0.
    fn set_frame_scale(&mut self, frame_scale: f32) -> Result<(), SequenceError>;

    fn track_faces(&self) -> bool;

    fn set_track_faces(&mut self, track_faces: bool);

    fn iou_threshold(&self) -> f64;

    /// Minimum overlap for a face to keep its id. Must be in `(0, 1]`.
    fn set_iou_threshold(&mut self, iou_threshold: f64) -> Result<(), SequenceError>;

    /// Replaces the sequence with the contents of a saved file.
    fn load(&mut self, path: &Path) -> Result<(), SequenceError>;

    fn save(&self, path: &Path) -> Result<(), SequenceError>;

    fn size(&self) -> usize;
}

/// Construction settings for a sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct SequenceOptions {
    pub model_path: PathBuf,
    pub frame_scale: f32,
    pub track_faces: bool,
    pub iou_threshold: f64,
    pub first_face_id: u32,
}

impl Default for SequenceOptions {
    fn default() -> Self {
        Self {
            model_path: PathBuf::new(),
            frame_scale: DEFAULT_FRAME_SCALE,
            track_faces: false,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            first_face_id: DEFAULT_FIRST_FACE_ID,
        }
    }
}

/// Sequence backed by the ONNX model at `model_path`.
pub fn create(
    model_path: &Path,
    frame_scale: f32,
    track_faces: bool,
) -> Result<Box<dyn SequenceFaceLandmarks>, SequenceError> {
    create_with_options(SequenceOptions {
        model_path: model_path.to_path_buf(),
        frame_scale,
        track_faces,
        ..SequenceOptions::default()
    })
}

/// Sequence backed by the built-in model, downloaded into the user cache
/// on first use.
pub fn create_default(
    frame_scale: f32,
    track_faces: bool,
) -> Result<Box<dyn SequenceFaceLandmarks>, SequenceError> {
    let model_path = model_resolver::default_model(None)
        .map_err(|e| SequenceError::InvalidConfiguration(e.to_string()))?;
    create(&model_path, frame_scale, track_faces)
}

pub fn create_with_options(
    options: SequenceOptions,
) -> Result<Box<dyn SequenceFaceLandmarks>, SequenceError> {
    let sequence = LandmarkSequence::with_loader(Arc::new(OnnxDetectorLoader::default()), options)?;
    Ok(Box::new(sequence))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = SequenceOptions::default();
        assert_eq!(options.frame_scale, 1.0);
        assert!(!options.track_faces);
        assert_eq!(options.iou_threshold, 0.3);
        assert_eq!(options.first_face_id, 0);
    }

    #[test]
    fn test_create_with_missing_model_is_invalid_configuration() {
        let result = create(Path::new("/nonexistent/model.onnx"), 1.0, true);
        assert!(matches!(
            result,
            Err(SequenceError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_create_rejects_bad_scale_before_loading() {
        let result = create(Path::new("/nonexistent/model.onnx"), 0.0, false);
        match result {
            Err(SequenceError::InvalidConfiguration(msg)) => assert!(msg.contains("scale")),
            _ => panic!("expected InvalidConfiguration"),
        }
    }
}
