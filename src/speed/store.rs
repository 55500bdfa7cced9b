//! Track state store: one record per tracker identifier.

use std::collections::HashMap;

use crate::geometry::BBox;

/// Identifier assigned by the external tracker.
pub type TrackId = u64;

/// Where and when a vehicle's centre crossed one of the reference lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineCrossing {
    /// Pixel row of the vehicle centre on the crossing frame.
    pub position: i32,
    pub frame_index: u64,
}

/// Violation logging lifecycle. `Logged` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogState {
    #[default]
    Unlogged,
    Logged,
}

/// State accumulated for a single tracked vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedVehicle {
    id: TrackId,
    vehicle_type: String,
    entry: Option<LineCrossing>,
    exit: Option<LineCrossing>,
    last_bbox: Option<BBox>,
    log_state: LogState,
}

impl TrackedVehicle {
    pub fn new(id: TrackId, vehicle_type: impl Into<String>) -> Self {
        Self {
            id,
            vehicle_type: vehicle_type.into(),
            entry: None,
            exit: None,
            last_bbox: None,
            log_state: LogState::Unlogged,
        }
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    /// Class label recorded on first observation.
    pub fn vehicle_type(&self) -> &str {
        &self.vehicle_type
    }

    pub fn entry(&self) -> Option<LineCrossing> {
        self.entry
    }

    pub fn exit(&self) -> Option<LineCrossing> {
        self.exit
    }

    pub fn last_bbox(&self) -> Option<BBox> {
        self.last_bbox
    }

    pub fn log_state(&self) -> LogState {
        self.log_state
    }

    pub fn is_logged(&self) -> bool {
        self.log_state == LogState::Logged
    }

    /// Both lines have been crossed; the vehicle no longer reacts to them.
    pub fn is_complete(&self) -> bool {
        self.entry.is_some() && self.exit.is_some()
    }

    /// Record the entry crossing. Returns `false` if one was already set.
    pub(crate) fn record_entry(&mut self, crossing: LineCrossing) -> bool {
        if self.entry.is_some() {
            return false;
        }
        self.entry = Some(crossing);
        true
    }

    /// Record the exit crossing. Requires an entry and no previous exit.
    pub(crate) fn record_exit(&mut self, crossing: LineCrossing) -> bool {
        if self.entry.is_none() || self.exit.is_some() {
            return false;
        }
        self.exit = Some(crossing);
        true
    }

    pub(crate) fn set_bbox(&mut self, bbox: BBox) {
        self.last_bbox = Some(bbox);
    }

    pub(crate) fn mark_logged(&mut self) {
        self.log_state = LogState::Logged;
    }
}

/// Owned mapping from tracker id to vehicle state.
///
/// Records are created on first sight and kept for the rest of the run.
#[derive(Debug, Default)]
pub struct TrackStore {
    vehicles: HashMap<TrackId, TrackedVehicle>,
}

impl TrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the record for `id`, creating it with `vehicle_type` if unseen.
    ///
    /// The type of an existing record is never changed.
    pub fn get_or_create(&mut self, id: TrackId, vehicle_type: &str) -> &mut TrackedVehicle {
        self.vehicles
            .entry(id)
            .or_insert_with(|| TrackedVehicle::new(id, vehicle_type))
    }

    /// Overwrite the last known box. Returns `false` for unknown ids.
    pub fn update_bbox(&mut self, id: TrackId, bbox: BBox) -> bool {
        match self.vehicles.get_mut(&id) {
            Some(vehicle) => {
                vehicle.set_bbox(bbox);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: TrackId) -> Option<&TrackedVehicle> {
        self.vehicles.get(&id)
    }

    pub fn get_mut(&mut self, id: TrackId) -> Option<&mut TrackedVehicle> {
        self.vehicles.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedVehicle> {
        self.vehicles.values()
    }

    /// Number of vehicles that have been logged as violations.
    pub fn logged_count(&self) -> usize {
        self.vehicles.values().filter(|v| v.is_logged()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_keeps_first_type() {
        let mut store = TrackStore::new();
        let vehicle = store.get_or_create(3, "car");
        assert_eq!(vehicle.id(), 3);
        assert!(vehicle.entry().is_none());
        assert!(vehicle.exit().is_none());
        assert!(vehicle.last_bbox().is_none());
        assert_eq!(vehicle.log_state(), LogState::Unlogged);

        let again = store.get_or_create(3, "truck");
        assert_eq!(again.vehicle_type(), "car");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_update_bbox() {
        let mut store = TrackStore::new();
        assert!(!store.update_bbox(1, BBox::new(0, 0, 1, 1)));

        store.get_or_create(1, "bus");
        assert!(store.update_bbox(1, BBox::new(0, 0, 10, 10)));
        assert!(store.update_bbox(1, BBox::new(5, 5, 15, 15)));
        assert_eq!(store.get(1).unwrap().last_bbox(), Some(BBox::new(5, 5, 15, 15)));
    }

    #[test]
    fn test_exit_requires_entry() {
        let mut vehicle = TrackedVehicle::new(1, "car");
        let crossing = LineCrossing {
            position: 800,
            frame_index: 10,
        };
        assert!(!vehicle.record_exit(crossing));
        assert!(vehicle.exit().is_none());

        assert!(vehicle.record_entry(LineCrossing {
            position: 330,
            frame_index: 5
        }));
        assert!(!vehicle.record_entry(LineCrossing {
            position: 400,
            frame_index: 6
        }));
        assert!(vehicle.record_exit(crossing));
        assert!(!vehicle.record_exit(crossing));
        assert!(vehicle.is_complete());
        assert_eq!(vehicle.entry().unwrap().position, 330);
    }

    #[test]
    fn test_logged_is_a_latch() {
        let mut store = TrackStore::new();
        store.get_or_create(9, "car").mark_logged();
        store.get_or_create(9, "car");
        assert!(store.get(9).unwrap().is_logged());
        assert_eq!(store.logged_count(), 1);
    }
}
