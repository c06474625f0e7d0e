//! Static configuration: which lines are wired to which inputs, and timing.
//!
//! Loaded once at startup from TOML. Every field has a default, so an empty file (or no
//! file at all) yields the stock deck wiring:
//!
//! - key on GPIO 2
//! - switches `green`/`blue`/`red` on GPIO 18/20/21
//! - encoders 1..3 with push buttons, encoder 4 without
//!
//! Encoder ids are plain data; re-labelling which physical encoder is "1" is a config
//! edit, not a code change.

use crate::debounce::{Polarity, BUTTON_DEBOUNCE, ENCODER_DEBOUNCE};
use crate::error::ConfigurationError;
use crate::event::LineId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A button or switch bound to one line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleInputConfig {
    pub name: String,
    pub line: LineId,
    #[serde(default)]
    pub polarity: Polarity,
}

/// A rotary encoder: two phase lines and an optional push button.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    pub id: u32,
    pub phase_a: LineId,
    pub phase_b: LineId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button: Option<LineId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckConfig {
    /// Sleep between poll ticks, in microseconds.
    pub poll_interval_us: u64,
    /// Debounce window for keys, switches and encoder buttons.
    pub button_debounce_ms: u64,
    /// Minimum spacing between accepted encoder A edges.
    pub encoder_debounce_us: u64,
    /// Address of the JSON-lines event server.
    pub listen: SocketAddr,
    /// Per-subscriber event backlog before slow readers start skipping events.
    pub event_buffer: usize,
    /// Root of the sysfs GPIO tree.
    pub sysfs_root: PathBuf,
    /// Added to a GPIO number to get its sysfs line number (512 on recent Pi kernels).
    pub sysfs_base: u32,
    #[serde(rename = "key")]
    pub keys: Vec<SimpleInputConfig>,
    #[serde(rename = "switch")]
    pub switches: Vec<SimpleInputConfig>,
    #[serde(rename = "encoder")]
    pub encoders: Vec<EncoderConfig>,
}

impl Default for DeckConfig {
    fn default() -> Self {
        let simple = |name: &str, line: u32| SimpleInputConfig {
            name: name.to_string(),
            line: LineId(line),
            polarity: Polarity::ActiveHigh,
        };
        let encoder = |id: u32, a: u32, b: u32, button: Option<u32>| EncoderConfig {
            id,
            phase_a: LineId(a),
            phase_b: LineId(b),
            button: button.map(LineId),
        };

        Self {
            poll_interval_us: 100,
            button_debounce_ms: BUTTON_DEBOUNCE.as_millis() as u64,
            encoder_debounce_us: ENCODER_DEBOUNCE.as_micros() as u64,
            listen: SocketAddr::from(([0, 0, 0, 0], 5000)),
            event_buffer: 256,
            sysfs_root: PathBuf::from("/sys/class/gpio"),
            sysfs_base: 512,
            keys: vec![simple("key", 2)],
            switches: vec![simple("green", 18), simple("blue", 20), simple("red", 21)],
            encoders: vec![
                encoder(1, 5, 6, Some(26)),
                encoder(2, 27, 22, Some(13)),
                encoder(3, 4, 17, Some(19)),
                encoder(4, 23, 24, None),
            ],
        }
    }
}

impl DeckConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str, origin: &Path) -> Result<Self, ConfigurationError> {
        let cfg: DeckConfig = toml::from_str(content)
            .map_err(|e| ConfigurationError::Parse(origin.to_path_buf(), e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigurationError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::Read(path.to_path_buf(), e.to_string()))?;
        Self::from_toml_str(&content, path)
    }

    /// The default configuration rendered as TOML (for `--print-config`).
    pub fn example_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }

    /// Reject duplicate names/ids, lines used twice and unusable sizes.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.event_buffer == 0 {
            return Err(ConfigurationError::Invalid(
                "event_buffer must be at least 1".into(),
            ));
        }

        let mut names = HashSet::new();
        for input in self.keys.iter().chain(&self.switches) {
            if input.name.trim().is_empty() {
                return Err(ConfigurationError::Invalid(format!(
                    "input on {} has an empty name",
                    input.line
                )));
            }
            if !names.insert(input.name.as_str()) {
                return Err(ConfigurationError::Invalid(format!(
                    "duplicate input name '{}'",
                    input.name
                )));
            }
        }

        let mut ids = HashSet::new();
        for enc in &self.encoders {
            if !ids.insert(enc.id) {
                return Err(ConfigurationError::Invalid(format!(
                    "duplicate encoder id {}",
                    enc.id
                )));
            }
        }

        let mut lines = HashSet::new();
        for line in self.all_lines() {
            if !lines.insert(line) {
                return Err(ConfigurationError::Invalid(format!(
                    "{line} is assigned more than once"
                )));
            }
        }
        Ok(())
    }

    /// Every configured line, in declaration order.
    pub fn all_lines(&self) -> Vec<LineId> {
        let mut out: Vec<LineId> = self
            .keys
            .iter()
            .chain(&self.switches)
            .map(|i| i.line)
            .collect();
        for enc in &self.encoders {
            out.push(enc.phase_a);
            out.push(enc.phase_b);
            out.extend(enc.button);
        }
        out
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.poll_interval_us)
    }

    pub fn button_debounce(&self) -> Duration {
        Duration::from_millis(self.button_debounce_ms)
    }

    pub fn encoder_debounce(&self) -> Duration {
        Duration::from_micros(self.encoder_debounce_us)
    }
}
