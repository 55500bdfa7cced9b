//! One-shot plate recognition and logging for speeding vehicles.

use chrono::{Local, NaiveDateTime};
use tracing::{debug, info, warn};

use super::record::{LogRecord, LogSink, UNKNOWN_PLATE};
use crate::error::Result;
use crate::frame::{self, Image};
use crate::integration::{PlateDetector, TextRecognizer};
use crate::speed::TrackedVehicle;

pub type Clock = fn() -> NaiveDateTime;

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Crop → plate detection → OCR → log, at most once per vehicle.
pub struct ViolationPipeline<P, R> {
    speed_limit: f64,
    plates: P,
    ocr: R,
    clock: Clock,
}

impl<P: PlateDetector, R: TextRecognizer> ViolationPipeline<P, R> {
    pub fn new(speed_limit: f64, plates: P, ocr: R) -> Self {
        Self {
            speed_limit,
            plates,
            ocr,
            clock: local_now,
        }
    }

    /// Replace the timestamp source.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn speed_limit(&self) -> f64 {
        self.speed_limit
    }

    /// Whether a vehicle measured at `speed_kmph` still needs logging.
    pub fn is_violation(&self, vehicle: &TrackedVehicle, speed_kmph: f64) -> bool {
        speed_kmph > self.speed_limit && !vehicle.is_logged()
    }

    /// Log `vehicle` if it is over the limit and not logged yet.
    ///
    /// The vehicle is marked logged only after the sink accepted the
    /// record; a sink error leaves it unlogged and is returned.
    pub fn process(
        &mut self,
        frame: &Image,
        vehicle: &mut TrackedVehicle,
        speed_kmph: f64,
        sink: &mut impl LogSink,
    ) -> Result<Option<LogRecord>> {
        if !self.is_violation(vehicle, speed_kmph) {
            return Ok(None);
        }

        let plate = vehicle
            .last_bbox()
            .and_then(|bbox| frame::crop(frame, &bbox))
            .and_then(|crop| self.read_plate(vehicle.id(), &crop));

        let record = LogRecord {
            id: vehicle.id(),
            vehicle_type: vehicle.vehicle_type().to_string(),
            plate: plate.unwrap_or_else(|| UNKNOWN_PLATE.to_string()),
            speed_kmph,
            timestamp: (self.clock)(),
        };
        sink.append(&record)?;
        vehicle.mark_logged();

        info!(
            id = record.id,
            vehicle_type = %record.vehicle_type,
            plate = %record.plate,
            speed_kmph = format_args!("{:.1}", record.speed_kmph),
            "overspeeding vehicle logged"
        );
        Ok(Some(record))
    }

    /// First non-empty text read from the plate candidates, in detector order.
    fn read_plate(&mut self, id: u64, vehicle_crop: &Image) -> Option<String> {
        let candidates = match self.plates.detect_plates(vehicle_crop) {
            Ok(candidates) => candidates,
            Err(err) => {
                warn!(id, error = %err, "plate detection failed");
                return None;
            }
        };
        debug!(id, candidates = candidates.len(), "plate candidates");

        for bbox in candidates {
            let Some(plate_crop) = frame::crop(vehicle_crop, &bbox) else {
                continue;
            };
            match self.ocr.recognize(&plate_crop) {
                Ok(results) => {
                    if let Some(text) = results.iter().map(|r| r.text.trim()).find(|t| !t.is_empty()) {
                        return Some(text.to_string());
                    }
                }
                Err(err) => warn!(id, error = %err, "plate text recognition failed"),
            }
        }
        None
    }
}
