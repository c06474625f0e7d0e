//! Change events and the identifiers they carry.
//!
//! The engine turns raw line levels into small, immutable [`ChangeEvent`] values.
//! Each tick yields an ordered batch; ordering inside the batch follows input
//! declaration order (simple inputs first, then encoders).
//!
//! ## Value conventions
//! - **Simple inputs:** `active` is the *logical* state after debouncing and polarity
//!   mapping. With the default `ActiveHigh` polarity and pull-up wiring this means
//!   `active == true` is the released electrical state; callers invert as needed.
//! - **Encoders:** `value` is the running counter (never negative), `delta` is the
//!   signed change since the previously emitted value.
//! - **Timestamps:** monotonic [`Instant`]s captured once per tick. Wall-clock
//!   conversion happens at the wire boundary (see [`crate::wire`]).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Identifier of a physical digital input line (a GPIO number).
///
/// Stable for the process lifetime; the sampler backend decides how it maps to hardware.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(pub u32);

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gpio{}", self.0)
    }
}

/// Category of a simple (non-encoder) input.
///
/// Selects the wire event a level change maps to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputClass {
    /// Momentary push button (`key_change`).
    Key,
    /// Toggle or momentary switch (`switch_change`).
    Switch,
}

/// Rotation direction of an encoder step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Clockwise; counter increases.
    Forward,
    /// Counter-clockwise; counter decreases.
    Backward,
}

impl Direction {
    /// Direction implied by a signed delta (`0` counts as forward).
    #[inline]
    pub fn from_delta(delta: i32) -> Self {
        if delta < 0 {
            Direction::Backward
        } else {
            Direction::Forward
        }
    }
}

/// One logical change produced by
/// [`InputEngine::sample_tick`](crate::engine::InputEngine::sample_tick).
#[derive(Clone, Debug, PartialEq)]
pub enum ChangeEvent {
    /// A button or switch changed its debounced logical state.
    InputLevelChanged {
        id: String,
        class: InputClass,
        active: bool,
        at: Instant,
    },

    /// An encoder counter changed by rotation.
    EncoderMoved {
        id: u32,
        value: i32,
        delta: i32,
        direction: Direction,
        at: Instant,
    },

    /// An encoder's push button was pressed; its counter is now zero.
    EncoderButtonPressed { id: u32, at: Instant },
}

impl ChangeEvent {
    /// Capture time of the tick that produced this event.
    pub fn at(&self) -> Instant {
        match self {
            ChangeEvent::InputLevelChanged { at, .. }
            | ChangeEvent::EncoderMoved { at, .. }
            | ChangeEvent::EncoderButtonPressed { at, .. } => *at,
        }
    }

    /// Human-readable source label (`"green"`, `"encoder:2"`), used for tag filtering.
    pub fn source(&self) -> String {
        match self {
            ChangeEvent::InputLevelChanged { id, .. } => id.clone(),
            ChangeEvent::EncoderMoved { id, .. } | ChangeEvent::EncoderButtonPressed { id, .. } => {
                format!("encoder:{id}")
            }
        }
    }

    /// `true` for events that come from an encoder (rotation or button).
    pub fn is_encoder(&self) -> bool {
        !matches!(self, ChangeEvent::InputLevelChanged { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_follows_delta_sign() {
        assert_eq!(Direction::from_delta(3), Direction::Forward);
        assert_eq!(Direction::from_delta(-1), Direction::Backward);
    }

    #[test]
    fn source_labels() {
        let at = Instant::now();
        let lvl = ChangeEvent::InputLevelChanged {
            id: "green".into(),
            class: InputClass::Switch,
            active: false,
            at,
        };
        let press = ChangeEvent::EncoderButtonPressed { id: 2, at };
        assert_eq!(lvl.source(), "green");
        assert_eq!(press.source(), "encoder:2");
        assert!(press.is_encoder());
        assert!(!lvl.is_encoder());
        assert_eq!(press.at(), at);
    }
}
