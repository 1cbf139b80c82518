//! Property-based tests for envelope, LFO, modulation and voice allocation.

use polytone_core::OfflineBackend;
use polytone_synth::{
    LfoMode, LfoPoint, ModRoute, ModSource, ModSourceValues, ModTarget, Patch, PolySynth,
    level_at_elapsed, phase_at_time, release_level, resolve, sample_shape, time_to_sustain,
};
use proptest::prelude::*;

fn route_strategy() -> impl Strategy<Value = ModRoute> {
    (
        prop::bool::ANY,
        prop::bool::ANY,
        -3.0f32..3.0,
        prop::bool::ANY,
        prop::bool::ANY,
    )
        .prop_map(|(env, voices, amount, bipolar, enabled)| ModRoute {
            source: if env { ModSource::Env1 } else { ModSource::Lfo1 },
            target: if voices {
                ModTarget::UnisonVoices
            } else {
                ModTarget::UnisonDetuneCents
            },
            amount,
            bipolar,
            enabled,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// The envelope stays in [0, 1], settles on sustain, and never jumps
    /// faster than its steepest segment allows.
    #[test]
    fn envelope_bounded_and_continuous(
        delay in 0.0f32..1.0,
        attack in 0.001f32..2.0,
        hold in 0.0f32..1.0,
        decay in 0.001f32..2.0,
        sustain in 0.0f32..=1.0,
        t in 0.0f64..6.0,
    ) {
        let patch = Patch::default()
            .with_delay(delay)
            .with_attack(attack)
            .with_hold(hold)
            .with_decay(decay)
            .with_sustain(sustain);
        let env = patch.envelope();

        let level = level_at_elapsed(t, env);
        prop_assert!((0.0..=1.0).contains(&level), "level {} at {}", level, t);

        let settled = level_at_elapsed(time_to_sustain(env) + 1e-9, env);
        prop_assert!((settled - sustain).abs() < 1e-4);

        let dt = 1e-4;
        let slope = 1.0 / f64::from(attack.min(decay));
        let step = f64::from((level_at_elapsed(t + dt, env) - level).abs());
        prop_assert!(step <= slope * dt + 1e-4, "step {} over {}", step, dt);
    }

    /// Release starts at the captured level and ends silent.
    #[test]
    fn release_endpoints(start in 0.0f32..=1.0, release in 0.001f32..8.0, probe in 0.0f64..1.0) {
        prop_assert!((release_level(0.0, start, release) - start).abs() < 1e-6);
        prop_assert_eq!(release_level(f64::from(release), start, release), 0.0);
        prop_assert_eq!(release_level(probe, start, 0.0), 0.0);
        let mid = release_level(probe * f64::from(release), start, release);
        prop_assert!(mid <= start + 1e-6 && mid >= 0.0);
    }

    /// Sync phase ignores the note start; trigger phase starts at zero.
    #[test]
    fn lfo_phase_modes(
        rate in 0.01f32..64.0,
        offset in 0.0f32..1.0,
        now in 0.0f64..100.0,
        a in 0.0f64..100.0,
        b in 0.0f64..100.0,
    ) {
        let sync_a = phase_at_time(LfoMode::Sync, rate, offset, now, a);
        let sync_b = phase_at_time(LfoMode::Sync, rate, offset, now, b);
        prop_assert_eq!(sync_a, sync_b);
        prop_assert_eq!(phase_at_time(LfoMode::Trigger, rate, 0.0, a, a), 0.0);

        let env = phase_at_time(LfoMode::Envelope, rate, offset, now, a);
        prop_assert!((0.0..=1.0).contains(&env));
    }

    /// Normalized shapes hit every breakpoint exactly and stay in [-1, 1].
    #[test]
    fn lfo_shape_bounds_and_pins(
        raw in prop::collection::vec((0u8..=100, -2.0f32..2.0), 2..10),
        phase in -4.0f64..4.0,
    ) {
        let points: Vec<LfoPoint> = raw
            .iter()
            .map(|&(x, y)| LfoPoint::new(f32::from(x) / 100.0, y))
            .collect();
        let patch = Patch::default().with_lfo_points(&points);
        let shape = &patch.lfo().points;

        let value = sample_shape(shape, phase);
        prop_assert!((-1.0..=1.0).contains(&value));

        for point in &shape[..shape.len() - 1] {
            let sampled = sample_shape(shape, f64::from(point.x));
            prop_assert!((sampled - point.y).abs() < 1e-5, "{:?} read {}", point, sampled);
        }
    }

    /// Route order does not matter and the result respects the target range.
    #[test]
    fn resolve_order_independent_and_bounded(
        (routes, shuffled) in prop::collection::vec(route_strategy(), 0..8)
            .prop_flat_map(|routes| (Just(routes.clone()), Just(routes).prop_shuffle())),
        env1 in 0.0f32..=1.0,
        lfo1 in 0.0f32..=1.0,
        base in -10.0f32..200.0,
    ) {
        let sources = ModSourceValues::new(env1, lfo1);
        for target in [ModTarget::UnisonDetuneCents, ModTarget::UnisonVoices] {
            prop_assert_eq!(
                resolve(&routes, target, base, &sources).to_bits(),
                resolve(&shuffled, target, base, &sources).to_bits()
            );
        }

        let target = ModTarget::UnisonDetuneCents;
        let detune = resolve(&routes, target, base, &sources);
        let range = target.descriptor();
        prop_assert!(detune >= range.min && detune <= range.max);

        let voices = resolve(&routes, ModTarget::UnisonVoices, base, &sources);
        prop_assert!((1.0..=16.0).contains(&voices));
        prop_assert_eq!(voices, voices.round());
    }

    /// Over-range amounts behave exactly like a full-scale amount.
    #[test]
    fn resolve_clamps_amount(amount in 1.0f32..50.0, env1 in 0.0f32..=1.0) {
        let sources = ModSourceValues::new(env1, 0.0);
        let target = ModTarget::UnisonDetuneCents;
        let mut wild = ModRoute::new(ModSource::Env1, target, 1.0);
        wild.amount = amount;
        let tame = ModRoute::new(ModSource::Env1, target, 1.0);
        prop_assert_eq!(
            resolve(&[wild], target, 10.0, &sources),
            resolve(&[tame], target, 10.0, &sources)
        );
    }

    /// Any note sequence keeps the pool within its limit, one voice per pitch.
    #[test]
    fn registry_respects_limit(
        max_voices in 1usize..8,
        events in prop::collection::vec((40u8..52, prop::bool::ANY), 1..40),
    ) {
        let patch = Patch::default().with_max_voices(max_voices);
        let mut synth = PolySynth::new(OfflineBackend::new(), patch).unwrap();
        for (midi, on) in events {
            if on {
                synth.note_on(midi, 1.0);
            } else {
                synth.note_off(midi);
            }
            synth.backend_mut().advance_by(0.01).unwrap();
            synth.update();

            prop_assert!(synth.active_voice_count() <= max_voices);
            let mut pitches = synth.registry().pitches();
            let total = pitches.len();
            pitches.sort_unstable();
            pitches.dedup();
            prop_assert_eq!(pitches.len(), total);
        }
    }
}
