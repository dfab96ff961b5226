use std::path::Path;

use crate::shared::image::Image;
use crate::shared::video_metadata::VideoMetadata;

/// Decodes the frames of a video or still-image source.
///
/// Codec and container details stay in the implementation; callers only
/// see [`Image`]s in presentation order.
pub trait VideoReader: Send {
    /// Opens the source and returns its metadata.
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>>;

    /// Iterates over decoded frames. Yields a single error if not opened.
    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Image, Box<dyn std::error::Error>>> + '_>;

    fn close(&mut self);
}
