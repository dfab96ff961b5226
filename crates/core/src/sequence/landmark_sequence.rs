use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::detection::domain::face_detector::{DetectorLoader, FaceDetector, RawFace};
use crate::detection::infrastructure::onnx_yolo_detector::OnnxDetectorLoader;
use crate::persistence::sequence_codec;
use crate::shared::error::SequenceError;
use crate::shared::image::Image;

use super::face::Frame;
use super::face_tracker::{FaceTracker, TrackerState};
use super::frame_sequence::FrameSequence;
use super::sequence_face_landmarks::{SequenceFaceLandmarks, SequenceOptions};

/// Frame sequence controller: detection, id tracking and the frame store.
///
/// The detector is shared between clones; frames and tracker state are not.
#[derive(Clone)]
pub struct LandmarkSequence {
    detector: Arc<dyn FaceDetector>,
    loader: Arc<dyn DetectorLoader>,
    model_path: PathBuf,
    frame_scale: f32,
    track_faces: bool,
    tracker: FaceTracker,
    frames: FrameSequence,
    next_frame_id: u32,
}

impl LandmarkSequence {
    /// Loads `options.model_path` through `loader`. The loader is kept for
    /// later [`set_model`](SequenceFaceLandmarks::set_model) calls.
    pub fn with_loader(
        loader: Arc<dyn DetectorLoader>,
        options: SequenceOptions,
    ) -> Result<Self, SequenceError> {
        validate_options(&options)?;
        let detector = load_detector(loader.as_ref(), &options.model_path)?;
        Ok(Self::build(detector, loader, options))
    }

    /// Wraps an already loaded detector. `options.model_path` is only
    /// reported back by [`model`](SequenceFaceLandmarks::model).
    pub fn with_detector(
        detector: Arc<dyn FaceDetector>,
        options: SequenceOptions,
    ) -> Result<Self, SequenceError> {
        validate_options(&options)?;
        Ok(Self::build(
            detector,
            Arc::new(OnnxDetectorLoader::default()),
            options,
        ))
    }

    fn build(
        detector: Arc<dyn FaceDetector>,
        loader: Arc<dyn DetectorLoader>,
        options: SequenceOptions,
    ) -> Self {
        Self {
            detector,
            loader,
            model_path: options.model_path,
            frame_scale: options.frame_scale,
            track_faces: options.track_faces,
            tracker: FaceTracker::new(options.iou_threshold, options.first_face_id),
            frames: FrameSequence::new(),
            next_frame_id: 0,
        }
    }

    fn detect(&self, image: &Image) -> Result<Vec<RawFace>, SequenceError> {
        let scale = self.frame_scale as f64;
        let result = if self.frame_scale == 1.0 {
            self.detector.detect(image)
        } else {
            self.detector.detect(&image.scaled(scale))
        };
        let detections = result.map_err(|e| SequenceError::Detection(e.to_string()))?;

        Ok(detections
            .into_iter()
            .filter_map(|det| to_original_space(det, scale, image.width(), image.height()))
            .collect())
    }

    fn take_frame_id(&mut self, frame_id: Option<u32>) -> u32 {
        match frame_id {
            Some(id) => id,
            None => {
                let id = self.next_frame_id;
                self.next_frame_id = self.next_frame_id.saturating_add(1);
                id
            }
        }
    }
}

impl SequenceFaceLandmarks for LandmarkSequence {
    fn add_frame(&mut self, image: &Image, frame_id: Option<u32>) -> Result<&Frame, SequenceError> {
        if image.is_empty() {
            return Err(SequenceError::InvalidInput(format!(
                "cannot add an empty {}x{} image",
                image.width(),
                image.height()
            )));
        }

        let detections = self.detect(image)?;
        let faces = self.tracker.track(detections, self.track_faces)?;
        let id = self.take_frame_id(frame_id);

        log::debug!(
            "Frame {id}: {} face(s) {:?}",
            faces.len(),
            faces.iter().map(|f| f.id).collect::<Vec<_>>()
        );

        Ok(self
            .frames
            .push(Frame::new(id, image.width(), image.height(), faces)))
    }

    fn sequence(&self) -> &FrameSequence {
        &self.frames
    }

    fn clear(&mut self) {
        log::info!("Clearing sequence of {} frame(s)", self.frames.len());
        self.frames.clear();
        self.tracker.reset();
        self.next_frame_id = 0;
    }

    fn clone_boxed(&self) -> Box<dyn SequenceFaceLandmarks> {
        Box::new(self.clone())
    }

    fn model(&self) -> &Path {
        &self.model_path
    }

    fn set_model(&mut self, model_path: &Path) -> Result<(), SequenceError> {
        self.detector = load_detector(self.loader.as_ref(), model_path)?;
        self.model_path = model_path.to_path_buf();
        log::info!("Switched model to {}", model_path.display());
        Ok(())
    }

    fn frame_scale(&self) -> f32 {
        self.frame_scale
    }

    fn set_frame_scale(&mut self, frame_scale: f32) -> Result<(), SequenceError> {
        validate_frame_scale(frame_scale)?;
        self.frame_scale = frame_scale;
        Ok(())
    }

    fn track_faces(&self) -> bool {
        self.track_faces
    }

    fn set_track_faces(&mut self, track_faces: bool) {
        self.track_faces = track_faces;
    }

    fn iou_threshold(&self) -> f64 {
        self.tracker.iou_threshold()
    }

    fn set_iou_threshold(&mut self, iou_threshold: f64) -> Result<(), SequenceError> {
        validate_iou_threshold(iou_threshold)?;
        self.tracker.set_iou_threshold(iou_threshold);
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<(), SequenceError> {
        let frames = FrameSequence::from(sequence_codec::load(path)?);

        let mut tracker = self.tracker.clone();
        tracker.reset();
        let next_id = match frames.max_face_id() {
            Some(id) => id.checked_add(1).ok_or_else(|| SequenceError::MalformedFile {
                path: path.to_path_buf(),
                reason: format!("face id {id} leaves no room for new faces"),
            })?,
            None => tracker.state().next_id,
        };
        tracker.restore(TrackerState {
            last_faces: frames.last().map(|f| f.faces.clone()).unwrap_or_default(),
            next_id,
        });

        self.next_frame_id = frames.max_frame_id().map_or(0, |id| id.saturating_add(1));
        self.tracker = tracker;
        self.frames = frames;
        log::info!(
            "Loaded {} frame(s) from {}",
            self.frames.len(),
            path.display()
        );
        Ok(())
    }

    fn save(&self, path: &Path) -> Result<(), SequenceError> {
        sequence_codec::save(path, self.frames.as_slice())?;
        log::info!("Saved {} frame(s) to {}", self.frames.len(), path.display());
        Ok(())
    }

    fn size(&self) -> usize {
        self.frames.len()
    }
}

/// Maps a detection on the scaled image back to the caller's image.
/// Returns `None` when nothing of the box is left inside the image.
fn to_original_space(det: RawFace, scale: f64, width: u32, height: u32) -> Option<RawFace> {
    let bbox = det.bbox.unscaled(scale).clamped(width, height);
    if bbox.is_empty() {
        return None;
    }
    Some(RawFace {
        bbox,
        landmarks: det.landmarks.iter().map(|p| p.unscaled(scale)).collect(),
    })
}

fn load_detector(
    loader: &dyn DetectorLoader,
    model_path: &Path,
) -> Result<Arc<dyn FaceDetector>, SequenceError> {
    loader.load(model_path).map_err(|e| {
        SequenceError::InvalidConfiguration(format!(
            "cannot load model {}: {e}",
            model_path.display()
        ))
    })
}

fn validate_options(options: &SequenceOptions) -> Result<(), SequenceError> {
    validate_frame_scale(options.frame_scale)?;
    if options.first_face_id == u32::MAX {
        return Err(SequenceError::InvalidConfiguration(format!(
            "first face id must be below {}",
            u32::MAX
        )));
    }
    validate_iou_threshold(options.iou_threshold)
}

fn validate_frame_scale(frame_scale: f32) -> Result<(), SequenceError> {
    if !frame_scale.is_finite() || frame_scale <= 0.0 {
        return Err(SequenceError::InvalidConfiguration(format!(
            "frame scale must be a positive number, got {frame_scale}"
        )));
    }
    Ok(())
}

fn validate_iou_threshold(iou_threshold: f64) -> Result<(), SequenceError> {
    if !(iou_threshold > 0.0 && iou_threshold <= 1.0) {
        return Err(SequenceError::InvalidConfiguration(format!(
            "IoU threshold must be in (0, 1], got {iou_threshold}"
        )));
    }
    Ok(())
}
