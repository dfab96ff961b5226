use std::path::Path;

use image::DynamicImage;

use crate::shared::image::Image;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

/// Adapts a single image file to the [`VideoReader`] interface.
///
/// The image is a one-frame video with `fps = 0`. Gray files stay
/// single-channel; everything else is decoded to RGB.
pub struct ImageFileReader {
    image: Option<Image>,
}

impl ImageFileReader {
    pub fn new() -> Self {
        Self { image: None }
    }
}

impl Default for ImageFileReader {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoReader for ImageFileReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        let decoded = image::open(path)?;
        let image = match &decoded {
            DynamicImage::ImageLuma8(_) | DynamicImage::ImageLuma16(_) => {
                Image::from_gray(decoded.to_luma8())
            }
            _ => Image::from_rgb(decoded.to_rgb8()),
        };

        let metadata = VideoMetadata {
            width: image.width(),
            height: image.height(),
            fps: 0.0,
            total_frames: 1,
            codec: String::new(),
            source_path: Some(path.to_path_buf()),
        };
        self.image = Some(image);
        Ok(metadata)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Image, Box<dyn std::error::Error>>> + '_> {
        match self.image.take() {
            Some(image) => Box::new(std::iter::once(Ok(image))),
            None => Box::new(std::iter::once(Err("ImageFileReader: not opened".into()))),
        }
    }

    fn close(&mut self) {
        self.image = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_rgb(dir: &Path, width: u32, height: u32) -> PathBuf {
        let path = dir.join("rgb.png");
        image::RgbImage::from_pixel(width, height, image::Rgb([50, 100, 200]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_open_returns_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_rgb(dir.path(), 100, 80);
        let mut reader = ImageFileReader::new();
        let meta = reader.open(&path).unwrap();
        assert_eq!((meta.width, meta.height), (100, 80));
        assert_eq!(meta.fps, 0.0);
        assert_eq!(meta.total_frames, 1);
        assert_eq!(meta.source_path, Some(path));
    }

    #[test]
    fn test_open_nonexistent_fails() {
        let mut reader = ImageFileReader::new();
        assert!(reader.open(Path::new("/nonexistent/test.png")).is_err());
    }

    #[test]
    fn test_yields_one_rgb_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_rgb(dir.path(), 10, 8);
        let mut reader = ImageFileReader::new();
        reader.open(&path).unwrap();

        let frames: Vec<Image> = reader.frames().map(|f| f.unwrap()).collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].channels(), 3);
        assert_eq!(&frames[0].data()[..3], &[50, 100, 200]);
    }

    #[test]
    fn test_gray_file_stays_single_channel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.png");
        image::GrayImage::from_pixel(6, 4, image::Luma([77]))
            .save(&path)
            .unwrap();

        let mut reader = ImageFileReader::new();
        reader.open(&path).unwrap();
        let frame = reader.frames().next().unwrap().unwrap();
        assert_eq!(frame.channels(), 1);
        assert_eq!(frame.data().len(), 24);
        assert!(frame.data().iter().all(|&v| v == 77));
    }

    #[test]
    fn test_frames_without_open_is_error() {
        let mut reader = ImageFileReader::new();
        assert!(reader.frames().next().unwrap().is_err());
    }
}
