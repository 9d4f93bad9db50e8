//! # Vehicle Store
//!
//! Shared mapping from vehicle id to its window. The map itself is a `DashMap`
//! whose shard locks are held only long enough to clone a window handle; each
//! window sits behind its own `RwLock`, so appends and snapshots for different
//! vehicles never serialize on each other.
//!
//! Lock order is always shard then window. Appends and reads release the shard
//! before touching the window; only the idle sweep holds both.

use crate::reading::{Reading, VehicleId};
use crate::window::Window;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

type WindowHandle = Arc<RwLock<Window>>;

/// Per-vehicle windows, written by the stream processor and read by the gateway
#[derive(Debug)]
pub struct VehicleStore {
    windows: DashMap<VehicleId, WindowHandle>,
    window_capacity: usize,
}

/// What a single append did to the store
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppendOutcome {
    /// First reading seen for this vehicle
    pub created: bool,
    /// Head of the window dropped to make room
    pub evicted: Option<Reading>,
    /// Window length after the append
    pub window_len: usize,
}

/// Stable copy of one vehicle's window, taken under its read lock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSnapshot {
    pub vehicle_id: VehicleId,
    /// Oldest first
    pub readings: Vec<Reading>,
}

impl WindowSnapshot {
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn latest(&self) -> Option<&Reading> {
        self.readings.last()
    }

    /// Mean speed across the snapshot; `None` for an empty snapshot
    pub fn average_speed(&self) -> Option<f64> {
        if self.readings.is_empty() {
            return None;
        }
        let total: f64 = self.readings.iter().map(|r| r.speed).sum();
        Some(total / self.readings.len() as f64)
    }
}

impl VehicleStore {
    pub fn new(window_capacity: usize) -> Self {
        Self { windows: DashMap::new(), window_capacity: window_capacity.max(1) }
    }

    pub fn window_capacity(&self) -> usize {
        self.window_capacity
    }

    /// Append a reading to its vehicle's window, creating the window on first sight.
    ///
    /// A new window is inserted already holding `reading`, so a vehicle that is
    /// visible to readers always has at least one reading.
    pub(crate) fn append(&self, reading: Reading, arrived_at: Instant) -> AppendOutcome {
        let window = match self.windows.entry(reading.vehicle_id) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                let mut window = Window::new(self.window_capacity);
                window.push(reading, arrived_at);
                entry.insert(Arc::new(RwLock::new(window)));
                return AppendOutcome { created: true, evicted: None, window_len: 1 };
            }
        };

        let mut guard = window.write();
        let evicted = guard.push(reading, arrived_at);
        AppendOutcome { created: false, evicted, window_len: guard.len() }
    }

    /// Remove vehicles whose last arrival is at least `ttl` before `now`
    pub(crate) fn remove_idle(&self, ttl: Duration, now: Instant) -> Vec<VehicleId> {
        let mut removed = Vec::new();
        self.windows.retain(|vehicle_id, window| {
            let idle = now.saturating_duration_since(window.read().last_arrival());
            if idle >= ttl {
                removed.push(*vehicle_id);
                false
            } else {
                true
            }
        });
        removed
    }

    fn handle(&self, vehicle_id: VehicleId) -> Option<WindowHandle> {
        self.windows.get(&vehicle_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Copy of the vehicle's full window
    pub fn snapshot(&self, vehicle_id: VehicleId) -> Option<WindowSnapshot> {
        let window = self.handle(vehicle_id)?;
        let readings = window.read().to_vec();
        Some(WindowSnapshot { vehicle_id, readings })
    }

    /// Copy of the vehicle's most recent reading
    pub fn latest(&self, vehicle_id: VehicleId) -> Option<Reading> {
        let window = self.handle(vehicle_id)?;
        let latest = window.read().latest().copied();
        latest
    }

    pub fn contains(&self, vehicle_id: VehicleId) -> bool {
        self.windows.contains_key(&vehicle_id)
    }

    /// Number of vehicles currently tracked
    pub fn vehicle_count(&self) -> usize {
        self.windows.len()
    }

    /// Ids of all tracked vehicles, sorted
    pub fn vehicle_ids(&self) -> Vec<VehicleId> {
        let mut ids: Vec<VehicleId> = self.windows.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn reading(vehicle_id: VehicleId, speed: f64) -> Reading {
        Reading::new(vehicle_id, speed, 50.0, 80.0, Utc::now())
    }

    #[test]
    fn test_first_append_creates_window() {
        let store = VehicleStore::new(60);
        assert!(!store.contains(7));

        let outcome = store.append(reading(7, 10.0), Instant::now());
        assert!(outcome.created);
        assert_eq!(outcome.window_len, 1);
        assert!(store.contains(7));
        assert_eq!(store.vehicle_count(), 1);

        let outcome = store.append(reading(7, 20.0), Instant::now());
        assert!(!outcome.created);
        assert_eq!(outcome.window_len, 2);
    }

    #[test]
    fn test_window_bound_per_vehicle() {
        let store = VehicleStore::new(60);
        for n in 0..150 {
            store.append(reading(1, n as f64), Instant::now());
            let len = store.snapshot(1).map(|s| s.len()).unwrap_or(0);
            assert_eq!(len, (n + 1).min(60));
        }

        let outcome = store.append(reading(1, 999.0), Instant::now());
        assert_eq!(outcome.evicted.map(|r| r.speed), Some(90.0));
    }

    #[test]
    fn test_vehicles_are_independent() {
        let store = VehicleStore::new(3);
        for i in 0..5 {
            store.append(reading(1, i as f64), Instant::now());
        }
        store.append(reading(2, 42.0), Instant::now());

        assert_eq!(store.snapshot(1).unwrap().len(), 3);
        assert_eq!(store.snapshot(2).unwrap().len(), 1);
        assert_eq!(store.vehicle_ids(), vec![1, 2]);
    }

    #[test]
    fn test_unknown_vehicle() {
        let store = VehicleStore::new(60);
        assert!(store.snapshot(99).is_none());
        assert!(store.latest(99).is_none());
    }

    #[test]
    fn test_latest_and_average() {
        let store = VehicleStore::new(60);
        for speed in [60.0, 80.0, 100.0] {
            store.append(reading(7, speed), Instant::now());
        }

        let snapshot = store.snapshot(7).unwrap();
        assert_eq!(snapshot.average_speed(), Some(80.0));
        assert_eq!(store.latest(7).map(|r| r.speed), Some(100.0));
    }

    #[test]
    fn test_remove_idle() {
        let store = VehicleStore::new(60);
        let start = Instant::now();
        store.append(reading(1, 10.0), start);
        store.append(reading(2, 10.0), start + Duration::from_secs(30));

        let removed = store.remove_idle(Duration::from_secs(60), start + Duration::from_secs(70));
        assert_eq!(removed, vec![1]);
        assert!(!store.contains(1));
        assert!(store.contains(2));
    }

    #[test]
    fn test_empty_snapshot_has_no_average() {
        let snapshot = WindowSnapshot { vehicle_id: 1, readings: Vec::new() };
        assert!(snapshot.average_speed().is_none());
        assert!(snapshot.latest().is_none());
    }
}
