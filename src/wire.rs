//! Transport-agnostic wire payloads.
//!
//! Each [`ChangeEvent`] maps to exactly one [`WireEvent`] with a fixed field set. On the
//! wire an event is one JSON object per line:
//!
//! ```json
//! {"event":"encoder_change","data":{"encoder_id":2,"value":14,"direction":"right",
//!  "timestamp":1718000000.25}}
//! ```
//!
//! Payloads are encode-only; clients parse them as plain JSON.
//!
//! Timestamps are wall-clock seconds since the Unix epoch (float). Events carry monotonic
//! instants, so conversion goes through a [`WallClock`] anchored once at startup.

use crate::error::PublishError;
use crate::event::{ChangeEvent, Direction, InputClass};
use crate::snapshot::EngineSnapshot;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Maps monotonic instants to Unix-epoch seconds.
#[derive(Clone, Copy, Debug)]
pub struct WallClock {
    origin: Instant,
    origin_epoch: f64,
}

impl WallClock {
    /// Anchor at the current instant and system time.
    pub fn now() -> Self {
        let epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        Self::anchored(Instant::now(), epoch)
    }

    /// Anchor `origin` to `origin_epoch` seconds.
    pub fn anchored(origin: Instant, origin_epoch: f64) -> Self {
        Self {
            origin,
            origin_epoch,
        }
    }

    pub fn timestamp(&self, at: Instant) -> f64 {
        match at.checked_duration_since(self.origin) {
            Some(after) => self.origin_epoch + after.as_secs_f64(),
            None => self.origin_epoch - self.origin.duration_since(at).as_secs_f64(),
        }
    }
}

/// Rotation direction as clients expect it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WireDirection {
    Right,
    Left,
}

impl From<Direction> for WireDirection {
    fn from(d: Direction) -> Self {
        match d {
            Direction::Forward => WireDirection::Right,
            Direction::Backward => WireDirection::Left,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ActiveState {
    pub active: bool,
}

/// Full state replayed to a subscriber when it connects.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InitialState {
    /// First configured key, if any.
    pub key: Option<ActiveState>,
    pub switches: BTreeMap<String, ActiveState>,
    pub encoders: BTreeMap<u32, i32>,
    pub timestamp: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum WireEvent {
    KeyChange {
        active: bool,
        timestamp: f64,
    },
    SwitchChange {
        switch: String,
        active: bool,
        timestamp: f64,
    },
    EncoderChange {
        encoder_id: u32,
        value: i32,
        direction: WireDirection,
        timestamp: f64,
    },
    EncoderButtonPress {
        encoder_id: u32,
        timestamp: f64,
    },
    InitialState(InitialState),
}

impl WireEvent {
    pub fn from_change(event: &ChangeEvent, clock: &WallClock) -> Self {
        let timestamp = clock.timestamp(event.at());
        match event {
            ChangeEvent::InputLevelChanged {
                class: InputClass::Key,
                active,
                ..
            } => WireEvent::KeyChange {
                active: *active,
                timestamp,
            },
            ChangeEvent::InputLevelChanged {
                id,
                class: InputClass::Switch,
                active,
                ..
            } => WireEvent::SwitchChange {
                switch: id.clone(),
                active: *active,
                timestamp,
            },
            ChangeEvent::EncoderMoved {
                id,
                value,
                direction,
                ..
            } => WireEvent::EncoderChange {
                encoder_id: *id,
                value: *value,
                direction: (*direction).into(),
                timestamp,
            },
            ChangeEvent::EncoderButtonPressed { id, .. } => WireEvent::EncoderButtonPress {
                encoder_id: *id,
                timestamp,
            },
        }
    }

    pub fn initial_state(snapshot: &EngineSnapshot, timestamp: f64) -> Self {
        let entry = |(name, active): (&String, &bool)| {
            (name.clone(), ActiveState { active: *active })
        };
        WireEvent::InitialState(InitialState {
            key: snapshot
                .keys
                .values()
                .next()
                .map(|&active| ActiveState { active }),
            switches: snapshot.switches.iter().map(entry).collect(),
            encoders: snapshot.encoders.clone(),
            timestamp,
        })
    }

    /// Event name as used on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            WireEvent::KeyChange { .. } => "key_change",
            WireEvent::SwitchChange { .. } => "switch_change",
            WireEvent::EncoderChange { .. } => "encoder_change",
            WireEvent::EncoderButtonPress { .. } => "encoder_button_press",
            WireEvent::InitialState(_) => "initial_state",
        }
    }

    /// One JSON object terminated by `\n`.
    pub fn encode_line(&self) -> Result<String, PublishError> {
        let mut line =
            serde_json::to_string(self).map_err(|e| PublishError::Encode(e.to_string()))?;
        line.push('\n');
        Ok(line)
    }
}
