//! Per-vehicle line-crossing state and speed estimation.

mod crossing;
mod estimator;
mod store;

pub use crossing::{CrossingEvent, CrossingLines};
pub use estimator::{Calibration, SpeedEstimator, SpeedMeasurement, speed_kmph};
pub use store::{LineCrossing, LogState, TrackId, TrackStore, TrackedVehicle};
