//! Entry/exit line-crossing detection.

use tracing::debug;

use super::store::{LineCrossing, TrackedVehicle};

/// Outcome of testing one vehicle against the reference lines on a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossingEvent {
    Entered(LineCrossing),
    /// Both crossings are now known; the pair is ready for speed estimation.
    Exited {
        entry: LineCrossing,
        exit: LineCrossing,
    },
}

/// The calibrated pair of horizontal timing lines (pixel rows).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossingLines {
    entry_y: i32,
    exit_y: i32,
}

impl CrossingLines {
    /// Returns `None` unless the exit line lies strictly below the entry line.
    pub fn new(entry_y: i32, exit_y: i32) -> Option<Self> {
        (exit_y > entry_y).then_some(Self { entry_y, exit_y })
    }

    pub fn entry_y(&self) -> i32 {
        self.entry_y
    }

    pub fn exit_y(&self) -> i32 {
        self.exit_y
    }

    /// Pixel distance between the two lines.
    pub fn span(&self) -> i32 {
        self.exit_y - self.entry_y
    }

    /// Test the vehicle centre row against the lines.
    ///
    /// At most one crossing is recorded per call: the entry is checked
    /// first, the exit only for vehicles that already entered. Vehicles with
    /// both crossings set are left untouched.
    pub fn update(
        &self,
        vehicle: &mut TrackedVehicle,
        center_y: i32,
        frame_index: u64,
    ) -> Option<CrossingEvent> {
        let crossing = LineCrossing {
            position: center_y,
            frame_index,
        };

        match (vehicle.entry(), vehicle.exit()) {
            (None, _) if center_y >= self.entry_y => {
                vehicle.record_entry(crossing);
                debug!(
                    id = vehicle.id(),
                    row = center_y,
                    frame = frame_index,
                    "vehicle crossed entry line"
                );
                Some(CrossingEvent::Entered(crossing))
            }
            (Some(entry), None) if center_y >= self.exit_y => {
                vehicle.record_exit(crossing);
                debug!(
                    id = vehicle.id(),
                    row = center_y,
                    frame = frame_index,
                    "vehicle crossed exit line"
                );
                Some(CrossingEvent::Exited {
                    entry,
                    exit: crossing,
                })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines() -> CrossingLines {
        CrossingLines::new(330, 800).unwrap()
    }

    #[test]
    fn test_rejects_inverted_lines() {
        assert!(CrossingLines::new(800, 330).is_none());
        assert!(CrossingLines::new(330, 330).is_none());
        assert_eq!(lines().span(), 470);
    }

    #[test]
    fn test_entry_then_exit() {
        let lines = lines();
        let mut vehicle = TrackedVehicle::new(7, "car");

        assert_eq!(lines.update(&mut vehicle, 200, 90), None);
        assert!(matches!(
            lines.update(&mut vehicle, 330, 100),
            Some(CrossingEvent::Entered(_))
        ));
        assert_eq!(lines.update(&mut vehicle, 500, 103), None);

        let event = lines.update(&mut vehicle, 800, 106);
        assert_eq!(
            event,
            Some(CrossingEvent::Exited {
                entry: LineCrossing {
                    position: 330,
                    frame_index: 100
                },
                exit: LineCrossing {
                    position: 800,
                    frame_index: 106
                },
            })
        );
    }

    #[test]
    fn test_complete_vehicle_is_inert() {
        let lines = lines();
        let mut vehicle = TrackedVehicle::new(7, "car");
        lines.update(&mut vehicle, 340, 1);
        lines.update(&mut vehicle, 810, 2);
        let snapshot = vehicle.clone();

        for frame in 3..10 {
            assert_eq!(lines.update(&mut vehicle, 900, frame), None);
            assert_eq!(lines.update(&mut vehicle, 340, frame), None);
        }
        assert_eq!(vehicle, snapshot);
    }

    #[test]
    fn test_entry_and_exit_never_share_a_frame() {
        let lines = lines();
        let mut vehicle = TrackedVehicle::new(1, "truck");

        // First sighting already past the exit line only records an entry.
        assert!(matches!(
            lines.update(&mut vehicle, 850, 4),
            Some(CrossingEvent::Entered(_))
        ));
        assert!(vehicle.exit().is_none());

        let Some(CrossingEvent::Exited { entry, exit }) = lines.update(&mut vehicle, 860, 5) else {
            panic!("expected exit event");
        };
        assert!(entry.frame_index < exit.frame_index);
    }
}
