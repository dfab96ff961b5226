use std::path::Path;
use std::sync::Arc;

use crate::shared::geometry::{BBox, Point};
use crate::shared::image::Image;

/// One face as reported by a detector, before any id is assigned.
///
/// Coordinates are in the pixel space of the image passed to `detect`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawFace {
    pub bbox: BBox,
    pub landmarks: Vec<Point>,
}

/// Domain interface for face + landmark detection.
///
/// Detectors are shared read-only between sequence clones and may be called
/// from several threads at once, hence `&self` and `Send + Sync`. Concurrent
/// calls are safe but not necessarily parallel: an implementation may
/// serialize them on one inference session, as the ONNX detector does, so
/// clones sharing a detector take turns. The number and order of landmarks
/// is fixed per implementation.
pub trait FaceDetector: Send + Sync {
    /// Returns no faces for an empty image.
    fn detect(&self, image: &Image) -> Result<Vec<RawFace>, Box<dyn std::error::Error>>;
}

/// Builds a detector from a model file.
pub trait DetectorLoader: Send + Sync {
    fn load(&self, model_path: &Path) -> Result<Arc<dyn FaceDetector>, Box<dyn std::error::Error>>;
}
