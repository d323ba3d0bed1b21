//! In-memory unit registry.
//!
//! Maps each serial number to its last-known reading and receipt time.
//! Entries are created on the first successfully decoded frame from a new
//! serial and overwritten on every later one, last writer wins; staleness
//! is the presentation layer's concern, so nothing is ever evicted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use crate::types::UnitReading;

/// Result of a registry upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// Whether the new reading differs from the prior one in any published
    /// field. Callers use this to skip redundant downstream notification.
    pub changed: bool,

    /// Whether this serial number was never seen before.
    pub first_seen: bool,
}

#[derive(Debug)]
struct UnitState {
    reading: Arc<UnitReading>,
    received_at: SystemTime,
}

/// Registry of the most recent reading per unit.
///
/// Keys partition independently: no cross-unit invariants, no cross-unit
/// locking beyond the map itself. The mutex is only held for the map
/// operation, never across an await point.
#[derive(Debug, Default)]
pub struct UnitRegistry {
    units: Mutex<HashMap<u32, UnitState>>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the reading for its serial number and record the receipt time.
    pub fn upsert(&self, reading: UnitReading, received_at: SystemTime) -> UpsertOutcome {
        let serial = reading.serial_number;
        let mut units = self.units.lock().expect("registry lock poisoned");

        let prior = units.get(&serial);
        let outcome = UpsertOutcome {
            changed: prior.is_none_or(|state| *state.reading != reading),
            first_seen: prior.is_none(),
        };

        units.insert(serial, UnitState { reading: Arc::new(reading), received_at });
        outcome
    }

    /// The last-known reading for a serial number.
    pub fn get(&self, serial_number: u32) -> Option<Arc<UnitReading>> {
        let units = self.units.lock().expect("registry lock poisoned");
        units.get(&serial_number).map(|state| Arc::clone(&state.reading))
    }

    /// When the last reading for a serial number was received.
    pub fn received_at(&self, serial_number: u32) -> Option<SystemTime> {
        let units = self.units.lock().expect("registry lock poisoned");
        units.get(&serial_number).map(|state| state.received_at)
    }

    /// All last-known readings, in no particular order.
    pub fn readings(&self) -> Vec<Arc<UnitReading>> {
        let units = self.units.lock().expect("registry lock poisoned");
        units.values().map(|state| Arc::clone(&state.reading)).collect()
    }

    /// Number of units seen so far.
    pub fn len(&self) -> usize {
        self.units.lock().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
