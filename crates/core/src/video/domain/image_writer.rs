use std::path::Path;

use crate::shared::image::Image;

/// Encodes a single image to a file; the format follows the extension.
pub trait ImageWriter: Send {
    fn write(&self, path: &Path, image: &Image) -> Result<(), Box<dyn std::error::Error>>;
}
