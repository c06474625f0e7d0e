use std::time::{Duration, Instant};

use proptest::prelude::*;

use deckinput::backends::virtual_input::VirtualSampler;
use deckinput::debounce::{DebounceFilter, Polarity, BUTTON_DEBOUNCE, ENCODER_DEBOUNCE};
use deckinput::quadrature::QuadratureDecoder;
use deckinput::{ChangeEvent, DeckConfig, EncoderConfig, InputEngine, LineId};

proptest! {
    /// Toggles that all land inside one window after an accepted edge never flip again.
    #[test]
    fn bounce_is_rejected(
        initial in any::<bool>(),
        gaps in prop::collection::vec(1u64..20, 1..10),
    ) {
        let t0 = Instant::now();
        let mut f = DebounceFilter::new(BUTTON_DEBOUNCE, Polarity::ActiveHigh, initial);

        let mut raw = !initial;
        let mut t = t0 + Duration::from_secs(1);
        prop_assert_eq!(f.observe(raw, t), Some(raw));

        for gap in gaps {
            raw = !raw;
            t += Duration::from_millis(gap);
            prop_assert_eq!(f.observe(raw, t), None);
        }
    }

    /// Alternations spaced wider than the window each produce exactly one flip.
    #[test]
    fn slow_alternations_all_pass(
        initial in any::<bool>(),
        gaps in prop::collection::vec(201u64..2_000, 1..20),
    ) {
        let t0 = Instant::now();
        let mut f = DebounceFilter::new(BUTTON_DEBOUNCE, Polarity::ActiveLow, initial);

        let mut raw = initial;
        let mut t = t0;
        for gap in gaps {
            raw = !raw;
            t += Duration::from_millis(gap);
            prop_assert_eq!(f.observe(raw, t), Some(!raw));
            // Holding the level changes nothing.
            prop_assert_eq!(f.observe(raw, t + Duration::from_millis(1)), None);
        }
    }

    /// Repeating the canonical forward sequence only ever steps up; the reverse only down.
    #[test]
    fn canonical_sequences_are_monotonic(cycles in 1usize..40, forward in any::<bool>()) {
        let t0 = Instant::now();
        let mut dec = QuadratureDecoder::new(ENCODER_DEBOUNCE, false, false);
        let fwd = [(true, false), (true, true), (false, true), (false, false)];
        let rev = [(false, true), (true, true), (true, false), (false, false)];
        let seq = if forward { fwd } else { rev };

        let mut steps = Vec::new();
        let mut t = t0;
        for _ in 0..cycles {
            for (a, b) in seq {
                t += Duration::from_millis(2);
                steps.extend(dec.observe(a, b, t));
            }
        }
        let expected = if forward { 1 } else { -1 };
        prop_assert_eq!(steps.len(), 2 * cycles);
        prop_assert!(steps.iter().all(|&s| s == expected));
    }

    /// Whatever the rotation, the counter never goes negative and tracks a clamped sum.
    #[test]
    fn counter_is_clamped_at_zero(moves in prop::collection::vec(any::<bool>(), 1..200)) {
        let mut config = DeckConfig::default();
        config.encoders = vec![EncoderConfig {
            id: 1,
            phase_a: LineId(5),
            phase_b: LineId(6),
            button: None,
        }];
        let sampler = VirtualSampler::new();
        let lines = sampler.handle();
        let mut engine = InputEngine::bring_up_with_settle(&config, sampler, Duration::ZERO)
            .ok()
            .unwrap();

        let t0 = Instant::now();
        let mut a = true;
        let mut model = 0i32;
        for (i, forward) in moves.into_iter().enumerate() {
            a = !a;
            let b = if forward { !a } else { a };
            lines.set_phases(LineId(5), LineId(6), (a, b));
            let events = engine.sample_tick(t0 + Duration::from_millis(2 * (i as u64 + 1)));

            let before = model;
            model = (model + if forward { 1 } else { -1 }).max(0);
            for e in &events {
                match e {
                    ChangeEvent::EncoderMoved { value, delta, .. } => {
                        prop_assert!(*value >= 0);
                        prop_assert_eq!(*value, model);
                        prop_assert_eq!(*delta, model - before);
                    }
                    other => prop_assert!(false, "unexpected event {:?}", other),
                }
            }
            prop_assert_eq!(events.is_empty(), before == model);
        }
        prop_assert_eq!(engine.counter(1), Some(model));
    }
}
