//! Full logical state of the deck at a point in time.
//!
//! [`EngineSnapshot`] is an **owned** copy: it never borrows the engine, so it can be
//! handed to other threads. Two uses:
//! - cheap "did anything change" comparisons (`==`)
//! - the `initial_state` payload replayed to each new subscriber
//!
//! [`SharedSnapshot`] is how another thread (the event server) reads state while the poll
//! loop keeps mutating the engine: the poll loop stores a fresh copy under a short lock,
//! readers clone it out under the same lock.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EngineSnapshot {
    /// Key name → logical `active`.
    pub keys: BTreeMap<String, bool>,
    /// Switch name → logical `active`.
    pub switches: BTreeMap<String, bool>,
    /// Encoder id → counter.
    pub encoders: BTreeMap<u32, i32>,
}

impl EngineSnapshot {
    /// State of a key or switch by name.
    pub fn active(&self, name: &str) -> Option<bool> {
        self.keys
            .get(name)
            .or_else(|| self.switches.get(name))
            .copied()
    }

    pub fn encoder(&self, id: u32) -> Option<i32> {
        self.encoders.get(&id).copied()
    }
}

/// Thread-safe holder of the latest [`EngineSnapshot`].
#[derive(Clone, Debug, Default)]
pub struct SharedSnapshot(Arc<Mutex<EngineSnapshot>>);

impl SharedSnapshot {
    pub fn new(initial: EngineSnapshot) -> Self {
        Self(Arc::new(Mutex::new(initial)))
    }

    /// Replace the stored snapshot.
    pub fn store(&self, snapshot: EngineSnapshot) {
        *self.0.lock().unwrap_or_else(|p| p.into_inner()) = snapshot;
    }

    /// Clone out the stored snapshot.
    pub fn load(&self) -> EngineSnapshot {
        self.0.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}
