//! Error taxonomy.
//!
//! Only [`ConfigurationError`] is ever fatal, and only during startup. Everything
//! that can go wrong after bring-up degrades to "hold last known state".

use crate::event::LineId;
use std::path::PathBuf;
use thiserror::Error;

/// A hardware line could not be read this tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to read {line}: {reason}")]
pub struct ReadError {
    pub line: LineId,
    pub reason: String,
}

impl ReadError {
    pub fn new(line: LineId, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

/// Startup-time failure: bad config file or a line that cannot be claimed.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("failed to read config file {0}: {1}")]
    Read(PathBuf, String),

    #[error("failed to parse config file {0}: {1}")]
    Parse(PathBuf, String),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("cannot claim {line}: {reason}")]
    Claim { line: LineId, reason: String },
}

/// Transport-side failure. Swallowed at the publisher boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("no receiver attached")]
    Closed,

    #[error("publisher buffer full")]
    Full,

    #[error("failed to encode event: {0}")]
    Encode(String),
}

/// A simulator console command that cannot be carried out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("no input named `{0}`")]
    UnknownInput(String),

    #[error("no encoder with id {0}")]
    UnknownEncoder(u32),

    #[error("encoder {0} has no button")]
    NoButton(u32),
}
