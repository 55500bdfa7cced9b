use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{VideoError, VideoSource};
use crate::frame::{self, Image};

const EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Directory of still images played back in file-name order.
#[derive(Debug)]
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    next: usize,
    fps: f64,
    frame_size: (usize, usize),
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

fn load(path: &Path) -> Result<Image, VideoError> {
    let decode = |source| VideoError::Decode {
        path: path.to_path_buf(),
        source,
    };
    let rgb = image::open(path).map_err(decode)?.to_rgb8();
    let (width, height) = rgb.dimensions();
    frame::from_rgb_image(rgb).ok_or_else(|| VideoError::FrameSize {
        path: path.to_path_buf(),
        expected: (width as usize, height as usize),
        got: (0, 0),
    })
}

impl ImageSequenceSource {
    pub fn open(dir: &Path, fps: f64) -> Result<Self, VideoError> {
        let entries = fs::read_dir(dir).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => VideoError::NotFound(dir.to_path_buf()),
            _ => VideoError::Read(e),
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(VideoError::Read)?.path();
            if path.is_file() && is_image(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let first = paths
            .first()
            .ok_or_else(|| VideoError::EmptySequence(dir.to_path_buf()))?;
        let frame_size = frame::dimensions(&load(first)?);

        debug!(dir = %dir.display(), frames = paths.len(), "opened image sequence");
        Ok(Self {
            paths,
            next: 0,
            fps,
            frame_size,
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl VideoSource for ImageSequenceSource {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_size(&self) -> (usize, usize) {
        self.frame_size
    }

    fn next_frame(&mut self) -> Result<Option<Image>, VideoError> {
        let Some(path) = self.paths.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;

        let image = load(path)?;
        let size = frame::dimensions(&image);
        if size != self.frame_size {
            return Err(VideoError::FrameSize {
                path: path.clone(),
                expected: self.frame_size,
                got: size,
            });
        }
        Ok(Some(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_frame(dir: &Path, name: &str, width: u32, value: u8) {
        RgbImage::from_pixel(width, 4, Rgb([value, 0, 0]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn test_plays_images_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "0002.png", 6, 20);
        write_frame(dir.path(), "0001.png", 6, 10);
        fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let mut source = ImageSequenceSource::open(dir.path(), 25.0).unwrap();
        assert_eq!(source.len(), 2);
        assert_eq!(source.fps(), 25.0);
        assert_eq!(source.frame_size(), (6, 4));

        let first = source.next_frame().unwrap().unwrap();
        assert_eq!(first[[0, 0, 0]], 10);
        let second = source.next_frame().unwrap().unwrap();
        assert_eq!(second[[0, 0, 0]], 20);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_rejects_mismatched_frame_size() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "a.png", 6, 0);
        write_frame(dir.path(), "b.png", 8, 0);

        let mut source = ImageSequenceSource::open(dir.path(), 30.0).unwrap();
        assert!(source.next_frame().unwrap().is_some());
        assert!(matches!(
            source.next_frame(),
            Err(VideoError::FrameSize { .. })
        ));
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ImageSequenceSource::open(dir.path(), 30.0),
            Err(VideoError::EmptySequence(_))
        ));
    }
}
