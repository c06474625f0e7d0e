//! Time-window debouncing for single digital lines.
//!
//! [`DebounceFilter`] is leading-edge: the first raw change after the window has elapsed
//! since the last *accepted* transition flips the logical state immediately. Raw changes
//! inside the window are remembered (so edge tracking never desyncs) but suppressed.
//!
//! A settle rule covers the case where a genuine change lands inside the window (a quick
//! tap): once the raw level has held still for longer than the window and still disagrees
//! with the logical state, the logical state follows it. A settle flip does not restart
//! the window, so the next genuine edge is judged against the last accepted one.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Default window for buttons and switches (mechanical bounce).
pub const BUTTON_DEBOUNCE: Duration = Duration::from_millis(200);

/// Default window for encoder phase edges. Quadrature ordering rejects most noise already.
pub const ENCODER_DEBOUNCE: Duration = Duration::from_millis(1);

/// Mapping from electrical level to logical state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Logical state equals the raw level.
    #[default]
    ActiveHigh,
    /// Logical state is the inverted raw level (pull-up wiring, pressed = LOW).
    ActiveLow,
}

impl Polarity {
    #[inline]
    pub fn logical(self, raw: bool) -> bool {
        match self {
            Polarity::ActiveHigh => raw,
            Polarity::ActiveLow => !raw,
        }
    }
}

/// Minimum spacing between accepted edges, measured from the last accepted one.
#[derive(Clone, Copy, Debug)]
pub struct EdgeWindow {
    window: Duration,
    last_accepted: Option<Instant>,
}

impl EdgeWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: None,
        }
    }

    /// `true` when strictly more than `window` has passed since the last accepted edge
    /// (or nothing was accepted yet).
    #[inline]
    pub fn is_open(&self, now: Instant) -> bool {
        self.last_accepted
            .map_or(true, |t| now.saturating_duration_since(t) > self.window)
    }

    #[inline]
    pub fn accept(&mut self, now: Instant) {
        self.last_accepted = Some(now);
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

/// Debounced view of one raw line.
#[derive(Clone, Debug)]
pub struct DebounceFilter {
    gate: EdgeWindow,
    polarity: Polarity,
    last_raw: bool,
    last_raw_change: Option<Instant>,
    logical: bool,
}

impl DebounceFilter {
    /// Create a filter whose logical state starts at the mapped `initial_raw` level.
    pub fn new(window: Duration, polarity: Polarity, initial_raw: bool) -> Self {
        Self {
            gate: EdgeWindow::new(window),
            polarity,
            last_raw: initial_raw,
            last_raw_change: None,
            logical: polarity.logical(initial_raw),
        }
    }

    /// Feed one raw sample. Returns `Some(new_logical)` exactly when the logical state flips.
    pub fn observe(&mut self, raw: bool, now: Instant) -> Option<bool> {
        if raw != self.last_raw {
            self.last_raw = raw;
            self.last_raw_change = Some(now);
            if self.gate.is_open(now) {
                let next = self.polarity.logical(raw);
                if next != self.logical {
                    self.logical = next;
                    self.gate.accept(now);
                    return Some(next);
                }
            }
            return None;
        }

        let target = self.polarity.logical(raw);
        if target != self.logical && self.is_settled(now) {
            self.logical = target;
            return Some(target);
        }
        None
    }

    /// Current debounced logical state.
    #[inline]
    pub fn logical(&self) -> bool {
        self.logical
    }

    /// Last raw level seen, accepted or not.
    #[inline]
    pub fn last_raw(&self) -> bool {
        self.last_raw
    }

    pub fn window(&self) -> Duration {
        self.gate.window()
    }

    fn is_settled(&self, now: Instant) -> bool {
        self.last_raw_change
            .map_or(true, |t| now.saturating_duration_since(t) > self.gate.window())
    }
}
