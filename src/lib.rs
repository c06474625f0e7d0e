//! deckinput: debounced GPIO input events for a small control deck.
//!
//! Samples push buttons, switches and rotary encoders by fast polling, turns raw levels
//! into debounced logical events and encoder counters, and hands those events to a
//! publisher (in-process bus, channel, or the JSON-lines TCP server).
//!
//! Typical wiring: [`InputEngine::bring_up`] → [`PollLoop::run`] with a publisher from
//! [`server::event_channel`].

pub mod backends;
pub mod config;
pub mod debounce;
pub mod engine;
pub mod error;
pub mod event;
pub mod eventbus;
pub mod logger;
pub mod poll;
pub mod publisher;
pub mod quadrature;
pub mod sampler;
#[cfg(feature = "server")]
#[cfg_attr(docsrs, doc(cfg(feature = "server")))]
pub mod server;
pub mod snapshot;
pub mod wire;

pub use config::*;
pub use engine::*;
pub use error::*;
pub use event::*;
pub use eventbus::*;
pub use poll::*;
pub use publisher::*;
pub use sampler::*;
pub use snapshot::*;

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Install a `tracing` subscriber at `log_level` (default INFO).
pub fn init_logging(log_level: Option<&str>) {
    let level = log_level
        .and_then(|s| s.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    FmtSubscriber::builder()
        .with_target(false)
        .with_max_level(level)
        .init();
}
