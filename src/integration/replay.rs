//! Replays detections recorded by an external detector.
//!
//! The file holds one JSON object per line:
//!
//! ```text
//! {"frame": 1, "detections": [{"bbox": [x1, y1, x2, y2], "score": 0.9, "class": 2, "id": 7}]}
//! ```
//!
//! `id` is optional; frames absent from the file have no detections.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::frame::Image;
use crate::tracker::Detection;

use super::{DetectionBuilder, DetectionSource};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to read detections {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path:?} line {line}: invalid detection record")]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// One detection as exchanged with external detector processes.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DetectionRecord {
    bbox: [f32; 4],
    #[serde(default = "default_score")]
    score: f32,
    class: u32,
    #[serde(default)]
    id: Option<u64>,
}

fn default_score() -> f32 {
    1.0
}

impl From<DetectionRecord> for Detection {
    fn from(record: DetectionRecord) -> Self {
        let [x1, y1, x2, y2] = record.bbox;
        let builder = DetectionBuilder::new()
            .tlbr(x1, y1, x2, y2)
            .score(record.score)
            .class_id(record.class);
        match record.id {
            Some(id) => builder.track_id(id).build(),
            None => builder.build(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FrameRecord {
    frame: u64,
    #[serde(default)]
    detections: Vec<DetectionRecord>,
}

/// Serves pre-computed detections frame by frame, starting at frame 1.
#[derive(Debug)]
pub struct DetectionReplay {
    frames: BTreeMap<u64, Vec<Detection>>,
    next_frame: u64,
}

impl DetectionReplay {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ReplayError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let replay = Self::parse(&contents).map_err(|(line, source)| ReplayError::Parse {
            path: path.to_path_buf(),
            line,
            source,
        })?;
        debug!(path = %path.display(), frames = replay.frames.len(), "loaded detection replay");
        Ok(replay)
    }

    /// Parse JSON lines; errors carry the 1-based line number.
    pub fn parse(contents: &str) -> Result<Self, (usize, serde_json::Error)> {
        let mut frames: BTreeMap<u64, Vec<Detection>> = BTreeMap::new();
        for (index, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: FrameRecord = serde_json::from_str(line).map_err(|e| (index + 1, e))?;
            frames
                .entry(record.frame)
                .or_default()
                .extend(record.detections.into_iter().map(Detection::from));
        }
        Ok(Self {
            frames,
            next_frame: 1,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

impl DetectionSource for DetectionReplay {
    type Error = std::convert::Infallible;

    fn detect(&mut self, _image: &Image) -> Result<Vec<Detection>, Self::Error> {
        let frame = self.next_frame;
        self.next_frame += 1;
        Ok(self.frames.remove(&frame).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_replay_serves_frames_in_order() {
        let contents = r#"
{"frame": 1, "detections": [{"bbox": [10, 20, 50, 80], "score": 0.8, "class": 2, "id": 4}]}
{"frame": 3, "detections": [{"bbox": [12, 22, 52, 82], "class": 7}]}
"#;
        let mut replay = DetectionReplay::parse(contents).unwrap();
        assert_eq!(replay.frame_count(), 2);

        let image = Array3::zeros((4, 4, 3));
        let first = replay.detect(&image).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].track_id, Some(4));
        assert_eq!(first[0].score, 0.8);

        assert!(replay.detect(&image).unwrap().is_empty());

        let third = replay.detect(&image).unwrap();
        assert_eq!(third[0].class_id, 7);
        assert_eq!(third[0].score, 1.0);
        assert_eq!(third[0].track_id, None);
    }

    #[test]
    fn test_parse_error_reports_line() {
        let contents = "{\"frame\": 1}\nnot json\n";
        let (line, _) = DetectionReplay::parse(contents).unwrap_err();
        assert_eq!(line, 2);
    }
}
