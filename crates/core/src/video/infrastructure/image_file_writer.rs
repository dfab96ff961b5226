use std::path::Path;

use crate::shared::image::Image;
use crate::video::domain::image_writer::ImageWriter;

/// Writes images with the `image` crate, creating parent directories.
pub struct ImageFileWriter;

impl ImageFileWriter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageFileWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageWriter for ImageFileWriter {
    fn write(&self, path: &Path, image: &Image) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        match image.channels() {
            1 => image::GrayImage::from_raw(image.width(), image.height(), image.data().to_vec())
                .ok_or("image data does not match its dimensions")?
                .save(path)?,
            _ => image.to_rgb_image().save(path)?,
        }
        Ok(())
    }
}
