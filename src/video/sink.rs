use std::fs;
use std::path::{Path, PathBuf};

use image::ImageFormat;

use crate::error::{Error, Result};
use crate::frame::{self, Image};

/// Receives annotated frames after processing.
pub trait FrameSink {
    fn write_frame(&mut self, frame_index: u64, image: &Image) -> Result<()>;
}

/// Discards frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn write_frame(&mut self, _frame_index: u64, _image: &Image) -> Result<()> {
        Ok(())
    }
}

/// Writes every frame as `frame_{index:06}.jpg` into a directory.
#[derive(Debug)]
pub struct JpegDirSink {
    dir: PathBuf,
}

impl JpegDirSink {
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| Error::io(&dir, source))?;
        Ok(Self { dir })
    }

    pub fn frame_path(&self, frame_index: u64) -> PathBuf {
        self.dir.join(format!("frame_{frame_index:06}.jpg"))
    }
}

impl FrameSink for JpegDirSink {
    fn write_frame(&mut self, frame_index: u64, image: &Image) -> Result<()> {
        let path = self.frame_path(frame_index);
        let Some(rgb) = frame::to_rgb_image(image) else {
            return Err(Error::FrameSink {
                path,
                source: frame::dimension_mismatch(),
            });
        };
        rgb.save_with_format(&path, ImageFormat::Jpeg)
            .map_err(|source| Error::FrameSink { path, source })
    }
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn write_frame(&mut self, frame_index: u64, image: &Image) -> Result<()> {
        (**self).write_frame(frame_index, image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_jpeg_sink_writes_numbered_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = JpegDirSink::create(dir.path().join("frames")).unwrap();
        let image: Image = Array3::from_elem((4, 6, 3), 128);

        sink.write_frame(3, &image).unwrap();

        let path = sink.frame_path(3);
        assert!(path.ends_with("frame_000003.jpg"));
        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (6, 4));
    }

    #[test]
    fn test_jpeg_sink_rejects_non_rgb_frame() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = JpegDirSink::create(dir.path()).unwrap();
        let image: Image = Array3::zeros((4, 4, 1));

        let result = sink.write_frame(1, &image);

        assert!(matches!(result, Err(Error::FrameSink { .. })));
        assert!(!sink.frame_path(1).exists());
    }
}
