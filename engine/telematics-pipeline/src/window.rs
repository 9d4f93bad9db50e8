//! Fixed-capacity FIFO history of a vehicle's most recent readings

use crate::reading::Reading;
use std::collections::VecDeque;
use std::time::Instant;

/// Bounded, oldest-first window of readings
///
/// Appends go to the tail; once `capacity` is reached every append evicts the
/// head. `len() <= capacity` holds after every operation.
#[derive(Debug, Clone)]
pub struct Window {
    readings: VecDeque<Reading>,
    capacity: usize,
    last_arrival: Instant,
}

impl Window {
    /// Create an empty window. Capacity is clamped to at least one reading.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            readings: VecDeque::with_capacity(capacity),
            capacity,
            last_arrival: Instant::now(),
        }
    }

    /// Append a reading, returning the evicted head if the window was full
    pub fn push(&mut self, reading: Reading, arrived_at: Instant) -> Option<Reading> {
        let evicted =
            if self.readings.len() == self.capacity { self.readings.pop_front() } else { None };
        self.readings.push_back(reading);
        self.last_arrival = arrived_at;
        evicted
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recently appended reading
    pub fn latest(&self) -> Option<&Reading> {
        self.readings.back()
    }

    /// When the processor last appended to this window
    pub fn last_arrival(&self) -> Instant {
        self.last_arrival
    }

    /// Copy of the readings, oldest first
    pub fn to_vec(&self) -> Vec<Reading> {
        self.readings.iter().copied().collect()
    }
}
