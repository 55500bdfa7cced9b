//! Frame sources, overlay drawing and annotated-frame output.

mod ffmpeg;
mod overlay;
mod sequence;
mod sink;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::frame::Image;

pub use ffmpeg::FfmpegSource;
pub use overlay::{Overlay, Rgb, draw_label};
pub use sequence::ImageSequenceSource;
pub use sink::{FrameSink, JpegDirSink, NullSink};

#[derive(Debug, Error)]
pub enum VideoError {
    #[error("video source {0:?} does not exist")]
    NotFound(PathBuf),
    #[error("failed to run {program}")]
    Spawn {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("ffprobe failed on {path:?}: {message}")]
    Probe { path: PathBuf, message: String },
    #[error("no usable frame rate for {0:?}; set video.fps")]
    FrameRate(PathBuf),
    #[error("failed to read frame data")]
    Read(#[source] std::io::Error),
    #[error("failed to decode image {path:?}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("{path:?} is {got:?}, expected {expected:?}")]
    FrameSize {
        path: PathBuf,
        expected: (usize, usize),
        got: (usize, usize),
    },
    #[error("no images found in {0:?}")]
    EmptySequence(PathBuf),
}

/// An ordered stream of RGB frames.
pub trait VideoSource {
    /// Frames per second used for speed conversion.
    fn fps(&self) -> f64;

    /// `(width, height)` of every frame.
    fn frame_size(&self) -> (usize, usize);

    /// Next frame, or `None` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Image>, VideoError>;
}

impl<S: VideoSource + ?Sized> VideoSource for Box<S> {
    fn fps(&self) -> f64 {
        (**self).fps()
    }

    fn frame_size(&self) -> (usize, usize) {
        (**self).frame_size()
    }

    fn next_frame(&mut self) -> Result<Option<Image>, VideoError> {
        (**self).next_frame()
    }
}

/// Open a video file with ffmpeg, or a directory as an image sequence.
pub fn open(path: &Path, fps: Option<f64>) -> Result<Box<dyn VideoSource>, VideoError> {
    if path.is_dir() {
        let fps = fps.ok_or_else(|| VideoError::FrameRate(path.to_path_buf()))?;
        Ok(Box::new(ImageSequenceSource::open(path, fps)?))
    } else {
        Ok(Box::new(FfmpegSource::open(path, fps)?))
    }
}
