//! Crate-wide error type.

use std::path::PathBuf;

use thiserror::Error;

use crate::video::VideoError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed error produced by an external collaborator (tracker, detector, OCR).
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read configuration {path:?}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error(transparent)]
    Video(#[from] VideoError),

    #[error("vehicle tracker failed")]
    Tracker(#[source] CollaboratorError),

    #[error("failed to write violation log {path:?}")]
    LogSink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write annotated frame {path:?}")]
    FrameSink {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("dataset preparation failed: {0}")]
    Dataset(String),

    #[error("training failed: {0}")]
    Training(String),

    #[error("i/o error on {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
