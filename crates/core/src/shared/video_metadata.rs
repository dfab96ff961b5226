use std::path::PathBuf;

/// What a reader learned about its source when it was opened.
///
/// Still images are reported as one-frame sources with `fps == 0`.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Best-effort count; containers without a frame count report an estimate.
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    pub fn is_still(&self) -> bool {
        self.fps == 0.0 && self.total_frames == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(fps: f64, total_frames: usize) -> VideoMetadata {
        VideoMetadata {
            width: 1280,
            height: 720,
            fps,
            total_frames,
            codec: "h264".into(),
            source_path: Some(PathBuf::from("/tmp/clip.mp4")),
        }
    }

    #[test]
    fn test_video_is_not_still() {
        assert!(!meta(25.0, 250).is_still());
    }

    #[test]
    fn test_single_frame_without_rate_is_still() {
        assert!(meta(0.0, 1).is_still());
        assert!(!meta(0.0, 3).is_still());
    }
}
