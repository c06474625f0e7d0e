//! A-edge-triggered quadrature decoding.
//!
//! Only transitions of phase A produce steps; B is read in the same sample as the A edge
//! and decides the direction:
//!
//! | A edge  | B | step |
//! |---------|---|------|
//! | rising  | 0 | +1   |
//! | rising  | 1 | -1   |
//! | falling | 1 | +1   |
//! | falling | 0 | -1   |
//!
//! B-only transitions never step. That halves resolution but rejects most contact noise.

use crate::debounce::EdgeWindow;
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
pub struct QuadratureDecoder {
    gate: EdgeWindow,
    last_a: bool,
    last_b: bool,
}

impl QuadratureDecoder {
    pub fn new(window: Duration, initial_a: bool, initial_b: bool) -> Self {
        Self {
            gate: EdgeWindow::new(window),
            last_a: initial_a,
            last_b: initial_b,
        }
    }

    /// Feed one concurrent sample of both phases. Returns `Some(+1 | -1)` on a step.
    pub fn observe(&mut self, a: bool, b: bool, now: Instant) -> Option<i32> {
        let mut step = None;

        if a != self.last_a {
            if self.gate.is_open(now) {
                step = Some(Self::classify(a, b));
                self.gate.accept(now);
            }
            // Track the physical line even when the edge is rejected.
            self.last_a = a;
        }
        self.last_b = b;

        step
    }

    /// Step for an A edge ending at level `a` with concurrent B level `b`.
    #[inline]
    fn classify(a: bool, b: bool) -> i32 {
        // Rising with B low or falling with B high is clockwise.
        if a != b {
            1
        } else {
            -1
        }
    }

    pub fn last_phases(&self) -> (bool, bool) {
        (self.last_a, self.last_b)
    }
}
