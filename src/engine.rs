//! The input state engine.
//!
//! [`InputEngine`] owns every input and the sampler that reads them. One call to
//! [`sample_tick`](InputEngine::sample_tick) samples each input once and returns the
//! resulting [`ChangeEvent`]s in declaration order: keys, switches, then encoders.
//!
//! Each input is processed to completion before the next one is touched, so an emitted
//! event always agrees with the state it describes.
//!
//! Unreadable lines are fail-safe: the input keeps its last logical state and contributes
//! nothing for that tick.

use crate::config::{DeckConfig, EncoderConfig, SimpleInputConfig};
use crate::debounce::{DebounceFilter, Polarity};
use crate::error::ConfigurationError;
use crate::event::{ChangeEvent, Direction, InputClass, LineId};
use crate::quadrature::QuadratureDecoder;
use crate::sampler::LineSampler;
use crate::snapshot::EngineSnapshot;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Pause between a failed line setup and the single retry.
pub const RETRY_SETTLE: Duration = Duration::from_secs(1);

/// Level assumed for a line whose initial read fails (idle with pull-up).
const IDLE_LEVEL: bool = true;

/// A key or switch with its debounced state.
#[derive(Clone, Debug)]
pub struct SimpleInput {
    pub name: String,
    pub class: InputClass,
    pub line: LineId,
    filter: DebounceFilter,
}

impl SimpleInput {
    fn new(
        cfg: &SimpleInputConfig,
        class: InputClass,
        window: Duration,
        initial_raw: bool,
    ) -> Self {
        Self {
            name: cfg.name.clone(),
            class,
            line: cfg.line,
            filter: DebounceFilter::new(window, cfg.polarity, initial_raw),
        }
    }

    /// Debounced logical state.
    pub fn active(&self) -> bool {
        self.filter.logical()
    }
}

#[derive(Clone, Debug)]
struct EncoderButton {
    line: LineId,
    filter: DebounceFilter,
}

/// A rotary encoder with its running counter.
#[derive(Clone, Debug)]
pub struct EncoderInput {
    pub id: u32,
    pub phase_a: LineId,
    pub phase_b: LineId,
    decoder: QuadratureDecoder,
    counter: i32,
    last_emitted: i32,
    button: Option<EncoderButton>,
}

impl EncoderInput {
    pub fn counter(&self) -> i32 {
        self.counter
    }

    pub fn button_line(&self) -> Option<LineId> {
        self.button.as_ref().map(|b| b.line)
    }

    /// Apply one decoder step, clamping at zero. Returns the change vs the last emitted value.
    fn apply_step(&mut self, step: i32) -> Option<i32> {
        self.counter = self.counter.saturating_add(step).max(0);
        let delta = self.counter - self.last_emitted;
        if delta == 0 {
            return None;
        }
        self.last_emitted = self.counter;
        Some(delta)
    }

    fn reset(&mut self) {
        self.counter = 0;
        self.last_emitted = 0;
    }
}

pub struct InputEngine<S: LineSampler> {
    sampler: S,
    inputs: Vec<SimpleInput>,
    encoders: Vec<EncoderInput>,
    unreadable: BTreeSet<LineId>,
}

impl<S: LineSampler> InputEngine<S> {
    /// Claim every configured line and build the engine from initial levels.
    ///
    /// A failed setup releases whatever was claimed, waits [`RETRY_SETTLE`] and retries
    /// exactly once; a second failure is returned.
    pub fn bring_up(config: &DeckConfig, sampler: S) -> Result<Self, ConfigurationError> {
        Self::bring_up_with_settle(config, sampler, RETRY_SETTLE)
    }

    /// [`bring_up`](Self::bring_up) with an explicit pause before the retry.
    pub fn bring_up_with_settle(
        config: &DeckConfig,
        mut sampler: S,
        settle: Duration,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;

        if let Err(first) = claim_all(&mut sampler, config) {
            warn!("Line setup failed: {first}; releasing and retrying once");
            sampler.release_all();
            std::thread::sleep(settle);
            if let Err(second) = claim_all(&mut sampler, config) {
                sampler.release_all();
                return Err(second);
            }
            info!("Line setup succeeded on retry");
        }

        Ok(Self::with_initial_levels(config, sampler))
    }

    /// Build the engine without claiming lines (the sampler is assumed ready).
    ///
    /// Initial levels are read once so that startup does not produce events.
    pub fn with_initial_levels(config: &DeckConfig, mut sampler: S) -> Self {
        let button_window = config.button_debounce();
        let encoder_window = config.encoder_debounce();

        let mut initial = |line: LineId| match sampler.read(line) {
            Ok(level) => level,
            Err(e) => {
                warn!("Initial read failed, assuming idle: {e}");
                IDLE_LEVEL
            }
        };

        let mut inputs = Vec::with_capacity(config.keys.len() + config.switches.len());
        let classes = config
            .keys
            .iter()
            .map(|cfg| (cfg, InputClass::Key))
            .chain(config.switches.iter().map(|cfg| (cfg, InputClass::Switch)));
        for (cfg, class) in classes {
            inputs.push(SimpleInput::new(cfg, class, button_window, initial(cfg.line)));
        }

        let encoders = config
            .encoders
            .iter()
            .map(|cfg: &EncoderConfig| EncoderInput {
                id: cfg.id,
                phase_a: cfg.phase_a,
                phase_b: cfg.phase_b,
                decoder: QuadratureDecoder::new(
                    encoder_window,
                    initial(cfg.phase_a),
                    initial(cfg.phase_b),
                ),
                counter: 0,
                last_emitted: 0,
                button: cfg.button.map(|line| EncoderButton {
                    line,
                    // Pull-up wiring: pressed reads LOW.
                    filter: DebounceFilter::new(
                        button_window,
                        Polarity::ActiveLow,
                        initial(line),
                    ),
                }),
            })
            .collect::<Vec<_>>();

        debug!(
            "Engine ready on {}: {} simple input(s), {} encoder(s)",
            sampler.name(),
            inputs.len(),
            encoders.len()
        );

        Self {
            sampler,
            inputs,
            encoders,
            unreadable: BTreeSet::new(),
        }
    }

    /// Sample every input once and return this tick's events in declaration order.
    pub fn sample_tick(&mut self, now: Instant) -> Vec<ChangeEvent> {
        let mut events = Vec::new();
        let sampler = &mut self.sampler;
        let unreadable = &mut self.unreadable;

        for input in &mut self.inputs {
            let Some(raw) = read_line(sampler, unreadable, input.line) else {
                continue;
            };
            if let Some(active) = input.filter.observe(raw, now) {
                events.push(ChangeEvent::InputLevelChanged {
                    id: input.name.clone(),
                    class: input.class,
                    active,
                    at: now,
                });
            }
        }

        for enc in &mut self.encoders {
            let a = read_line(sampler, unreadable, enc.phase_a);
            let b = read_line(sampler, unreadable, enc.phase_b);
            if let (Some(a), Some(b)) = (a, b) {
                let step = enc.decoder.observe(a, b, now);
                if let Some(delta) = step.and_then(|s| enc.apply_step(s)) {
                    events.push(ChangeEvent::EncoderMoved {
                        id: enc.id,
                        value: enc.counter,
                        delta,
                        direction: Direction::from_delta(delta),
                        at: now,
                    });
                }
            }

            let Some(button) = enc.button.as_mut() else {
                continue;
            };
            let Some(raw) = read_line(sampler, unreadable, button.line) else {
                continue;
            };
            if button.filter.observe(raw, now) == Some(true) {
                // The press event alone signals the reset.
                enc.reset();
                events.push(ChangeEvent::EncoderButtonPressed { id: enc.id, at: now });
            }
        }

        events
    }

    /// Copy of the full logical state.
    pub fn snapshot(&self) -> EngineSnapshot {
        let mut snap = EngineSnapshot::default();
        for input in &self.inputs {
            let map = match input.class {
                InputClass::Key => &mut snap.keys,
                InputClass::Switch => &mut snap.switches,
            };
            map.insert(input.name.clone(), input.active());
        }
        for enc in &self.encoders {
            snap.encoders.insert(enc.id, enc.counter);
        }
        snap
    }

    pub fn inputs(&self) -> &[SimpleInput] {
        &self.inputs
    }

    pub fn encoders(&self) -> &[EncoderInput] {
        &self.encoders
    }

    pub fn counter(&self, id: u32) -> Option<i32> {
        self.encoders.iter().find(|e| e.id == id).map(|e| e.counter)
    }

    /// Zero an encoder's counter without emitting anything. Returns `false` for unknown ids.
    pub fn reset_counter(&mut self, id: u32) -> bool {
        match self.encoders.iter_mut().find(|e| e.id == id) {
            Some(enc) => {
                enc.reset();
                true
            }
            None => false,
        }
    }

    /// Lines whose most recent read failed.
    pub fn unreadable(&self) -> &BTreeSet<LineId> {
        &self.unreadable
    }

    pub fn sampler_name(&self) -> &str {
        self.sampler.name()
    }

    /// Hand the lines back to the system. Best effort.
    pub fn release(&mut self) {
        self.sampler.release_all();
    }
}

fn claim_all<S: LineSampler>(
    sampler: &mut S,
    config: &DeckConfig,
) -> Result<(), ConfigurationError> {
    for line in config.all_lines() {
        sampler.claim(line)?;
    }
    Ok(())
}

fn read_line<S: LineSampler>(
    sampler: &mut S,
    unreadable: &mut BTreeSet<LineId>,
    line: LineId,
) -> Option<bool> {
    match sampler.read(line) {
        Ok(level) => {
            unreadable.remove(&line);
            Some(level)
        }
        Err(e) => {
            trace!("{e}");
            unreadable.insert(line);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::virtual_input::{VirtualLines, VirtualSampler};

    fn engine(config: &DeckConfig) -> (InputEngine<VirtualSampler>, VirtualLines) {
        let sampler = VirtualSampler::new();
        let lines = sampler.handle();
        let engine = InputEngine::bring_up_with_settle(config, sampler, Duration::ZERO)
            .ok()
            .unwrap();
        (engine, lines)
    }

    fn at(t0: Instant, ms: u64) -> Instant {
        t0 + Duration::from_millis(ms)
    }

    #[test]
    fn startup_is_quiet_and_idempotent() {
        let (mut eng, _) = engine(&DeckConfig::default());
        let t0 = Instant::now();
        assert!(eng.sample_tick(at(t0, 0)).is_empty());
        assert!(eng.sample_tick(at(t0, 10)).is_empty());
        let snap = eng.snapshot();
        assert_eq!(snap.active("green"), Some(true));
        assert_eq!(snap.encoders.len(), 4);
    }

    #[test]
    fn key_press_maps_to_key_class() {
        let (mut eng, lines) = engine(&DeckConfig::default());
        let t0 = Instant::now();
        lines.set(LineId(2), false);
        let events = eng.sample_tick(at(t0, 1000));
        assert!(matches!(
            events.as_slice(),
            [ChangeEvent::InputLevelChanged {
                id,
                class: InputClass::Key,
                active: false,
                ..
            }] if id == "key"
        ));
    }

    #[test]
    fn forward_rotation_counts_and_reports_delta() {
        let (mut eng, lines) = engine(&DeckConfig::default());
        let t0 = Instant::now();
        let (a, b) = (LineId(5), LineId(6));
        // Idle is (1,1); forward from there: A falls with B high.
        lines.set_phases(a, b, (false, true));
        let events = eng.sample_tick(at(t0, 10));
        assert!(matches!(
            events.as_slice(),
            [ChangeEvent::EncoderMoved {
                id: 1,
                value: 1,
                delta: 1,
                direction: Direction::Forward,
                ..
            }]
        ));
        assert_eq!(eng.counter(1), Some(1));
    }

    #[test]
    fn backward_rotation_at_zero_is_silent() {
        let (mut eng, lines) = engine(&DeckConfig::default());
        let t0 = Instant::now();
        lines.set_phases(LineId(5), LineId(6), (false, false));
        assert!(eng.sample_tick(at(t0, 10)).is_empty());
        assert_eq!(eng.counter(1), Some(0));
    }

    #[test]
    fn unreadable_line_holds_state() {
        let (mut eng, lines) = engine(&DeckConfig::default());
        let t0 = Instant::now();
        lines.set(LineId(18), false);
        lines.fail(LineId(18));
        assert!(eng.sample_tick(at(t0, 1000)).is_empty());
        assert!(eng.unreadable().contains(&LineId(18)));
        assert_eq!(eng.snapshot().active("green"), Some(true));

        lines.heal(LineId(18));
        let events = eng.sample_tick(at(t0, 1001));
        assert_eq!(events.len(), 1);
        assert!(eng.unreadable().is_empty());
    }

    #[test]
    fn unreadable_phase_b_holds_the_counter() {
        let (mut eng, lines) = engine(&DeckConfig::default());
        let t0 = Instant::now();
        let (a, b) = (LineId(5), LineId(6));

        lines.set_phases(a, b, (false, true));
        lines.fail(b);
        assert!(eng.sample_tick(at(t0, 10)).is_empty());
        assert_eq!(eng.counter(1), Some(0));
        assert!(eng.unreadable().contains(&b));

        // The A edge is still pending and is counted once B reads again.
        lines.heal(b);
        let events = eng.sample_tick(at(t0, 20));
        assert!(matches!(
            events.as_slice(),
            [ChangeEvent::EncoderMoved { id: 1, value: 1, delta: 1, .. }]
        ));

        lines.set_phases(a, b, (false, false));
        assert!(eng.sample_tick(at(t0, 30)).is_empty());
        lines.set_phases(a, b, (true, false));
        let events = eng.sample_tick(at(t0, 40));
        assert!(matches!(
            events.as_slice(),
            [ChangeEvent::EncoderMoved { value: 2, .. }]
        ));
    }

    #[test]
    fn unreadable_button_does_not_reset() {
        let (mut eng, lines) = engine(&DeckConfig::default());
        let t0 = Instant::now();
        let button = LineId(26);

        lines.set_phases(LineId(5), LineId(6), (false, true));
        eng.sample_tick(at(t0, 10));
        assert_eq!(eng.counter(1), Some(1));

        lines.set(button, false);
        lines.fail(button);
        assert!(eng.sample_tick(at(t0, 1000)).is_empty());
        assert_eq!(eng.counter(1), Some(1));

        lines.heal(button);
        let events = eng.sample_tick(at(t0, 1010));
        assert!(matches!(
            events.as_slice(),
            [ChangeEvent::EncoderButtonPressed { id: 1, .. }]
        ));
        assert_eq!(eng.counter(1), Some(0));
        assert!(eng.unreadable().is_empty());
    }

    #[test]
    fn reset_counter_is_silent() {
        let (mut eng, lines) = engine(&DeckConfig::default());
        let t0 = Instant::now();
        lines.set_phases(LineId(5), LineId(6), (false, true));
        eng.sample_tick(at(t0, 10));
        assert!(eng.reset_counter(1));
        assert!(!eng.reset_counter(99));
        assert_eq!(eng.counter(1), Some(0));
        assert!(eng.sample_tick(at(t0, 20)).is_empty());
    }

    #[test]
    fn bring_up_retries_once() {
        let sampler = VirtualSampler::new();
        let lines = sampler.handle();
        lines.refuse_claims(1);
        let eng =
            InputEngine::bring_up_with_settle(&DeckConfig::default(), sampler, Duration::ZERO);
        assert!(eng.is_ok());
        assert_eq!(lines.releases(), 1);
        assert_eq!(lines.claimed().len(), DeckConfig::default().all_lines().len());
    }

    #[test]
    fn bring_up_gives_up_after_second_failure() {
        let sampler = VirtualSampler::new();
        let lines = sampler.handle();
        lines.refuse_claims(2);
        let err =
            InputEngine::bring_up_with_settle(&DeckConfig::default(), sampler, Duration::ZERO)
                .err()
                .unwrap();
        assert!(matches!(err, ConfigurationError::Claim { .. }));
        assert_eq!(lines.releases(), 2);
    }
}
