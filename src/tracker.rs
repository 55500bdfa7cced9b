//! Built-in multi-object tracker for detectors that do not assign ids.

mod byte_tracker;
mod kalman_filter;
mod matching;
mod tracklet;

pub use byte_tracker::{ByteTracker, TrackerConfig};
pub use matching::Detection;
pub use tracklet::{TrackState, Tracklet};
