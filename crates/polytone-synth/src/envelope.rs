//! Multi-segment amplitude envelope math.
//!
//! The same pure functions drive two consumers: the voice's modulation source
//! (`env1`) and any preview surface that wants to draw the envelope. The audio
//! schedule written by [`schedule_start`] and [`schedule_release`] traces the
//! identical piecewise-linear shape on the backend's gain automation.
//!
//! ```text
//!  1 ┤     ┌──┐
//!    │    /    \
//!  s ┤   /      └──────────┐
//!    │  /                   \
//!  0 ┼──┴─────────────────────┴──
//!    delay atk hold decay  sustain  release
//! ```

use polytone_core::{AudioBackend, GraphError, NodeId, ParamKind};

use crate::patch::EnvelopeParams;

/// Envelope level `elapsed` seconds after gate-on.
///
/// 0 before `delay`, a linear rise to 1 across `attack` (a jump when
/// `attack == 0`), 1 across `hold`, a linear fall to `sustain` across `decay`
/// (a jump when `decay == 0`), then `sustain`. Negative or NaN elapsed time
/// reads as 0.
///
/// # Example
///
/// ```rust
/// use polytone_synth::{Patch, level_at_elapsed};
///
/// let patch = Patch::default().with_attack(0.1).with_decay(0.1).with_sustain(0.5);
/// let env = patch.envelope();
/// assert!((level_at_elapsed(0.05, env) - 0.5).abs() < 1e-6);
/// assert!((level_at_elapsed(0.15, env) - 0.75).abs() < 1e-6);
/// assert!((level_at_elapsed(1.0, env) - 0.5).abs() < 1e-6);
/// ```
pub fn level_at_elapsed(elapsed: f64, env: &EnvelopeParams) -> f32 {
    let elapsed = if elapsed.is_nan() { 0.0 } else { elapsed };
    let delay = f64::from(env.delay);
    let attack = f64::from(env.attack);
    let hold = f64::from(env.hold);
    let decay = f64::from(env.decay);
    let sustain = f64::from(env.sustain);

    if elapsed < delay {
        return 0.0;
    }
    let mut t = elapsed - delay;

    if t < attack {
        return (t / attack) as f32;
    }
    t -= attack;

    if t < hold {
        return 1.0;
    }
    t -= hold;

    if t < decay {
        return (1.0 + (sustain - 1.0) * (t / decay)) as f32;
    }
    env.sustain
}

/// Level `elapsed` seconds after gate-off, falling linearly from
/// `start_level` to 0 across `release` seconds.
///
/// A zero release is silent immediately.
pub fn release_level(elapsed: f64, start_level: f32, release: f32) -> f32 {
    if release <= 0.0 || elapsed.is_nan() {
        return 0.0;
    }
    let elapsed = elapsed.max(0.0);
    let release = f64::from(release);
    if elapsed >= release {
        return 0.0;
    }
    (f64::from(start_level) * (1.0 - elapsed / release)) as f32
}

/// Time from gate-on until the envelope settles at sustain.
pub fn time_to_sustain(env: &EnvelopeParams) -> f64 {
    f64::from(env.delay) + f64::from(env.attack) + f64::from(env.hold) + f64::from(env.decay)
}

/// Schedule the gate-on segments on `amp`'s gain, anchored at `now`.
///
/// `peak` scales the whole shape (velocity); sustain lands at
/// `peak * env.sustain`. Pending automation from `now` on is cancelled first.
pub fn schedule_start<B: AudioBackend>(
    backend: &mut B,
    amp: NodeId,
    now: f64,
    peak: f32,
    env: &EnvelopeParams,
) -> Result<(), GraphError> {
    let gain = ParamKind::Gain;
    backend.cancel_scheduled_values(amp, gain, now)?;
    backend.set_value_at_time(amp, gain, 0.0, now)?;

    let delay_end = now + f64::from(env.delay);
    backend.set_value_at_time(amp, gain, 0.0, delay_end)?;

    let attack_end = delay_end + f64::from(env.attack);
    if env.attack <= 0.0 {
        backend.set_value_at_time(amp, gain, peak, delay_end)?;
    } else {
        backend.linear_ramp_to_value_at_time(amp, gain, peak, attack_end)?;
    }

    let hold_end = attack_end + f64::from(env.hold);
    backend.set_value_at_time(amp, gain, peak, hold_end)?;

    let sustain_level = peak * env.sustain;
    if env.decay <= 0.0 {
        backend.set_value_at_time(amp, gain, sustain_level, hold_end)?;
    } else {
        let decay_end = hold_end + f64::from(env.decay);
        backend.linear_ramp_to_value_at_time(amp, gain, sustain_level, decay_end)?;
    }
    Ok(())
}

/// Re-anchor `amp`'s gain at its current value and ramp it to 0 by
/// `now + release`. Returns the time the ramp ends.
pub fn schedule_release<B: AudioBackend>(
    backend: &mut B,
    amp: NodeId,
    now: f64,
    release: f32,
) -> Result<f64, GraphError> {
    let end = now + f64::from(release.max(0.0));
    backend.cancel_and_hold(amp, ParamKind::Gain)?;
    backend.linear_ramp_to_value_at_time(amp, ParamKind::Gain, 0.0, end)?;
    Ok(end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::{Patch, PatchOptions};
    use polytone_core::{NodeKind, OfflineBackend};

    fn env(delay: f32, attack: f32, hold: f32, decay: f32, sustain: f32) -> EnvelopeParams {
        *Patch::create(PatchOptions {
            delay: Some(delay),
            attack: Some(attack),
            hold: Some(hold),
            decay: Some(decay),
            sustain: Some(sustain),
            ..PatchOptions::default()
        })
        .envelope()
    }

    #[test]
    fn test_segments() {
        let e = env(0.0, 0.1, 0.0, 0.1, 0.5);
        assert!((level_at_elapsed(0.05, &e) - 0.5).abs() < 1e-6);
        assert!((level_at_elapsed(0.1, &e) - 1.0).abs() < 1e-6);
        assert!((level_at_elapsed(0.15, &e) - 0.75).abs() < 1e-6);
        assert!((level_at_elapsed(0.2, &e) - 0.5).abs() < 1e-6);
        assert!((level_at_elapsed(0.3, &e) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_hold_keeps_peak() {
        let e = env(0.0, 0.1, 0.05, 0.1, 0.5);
        assert!((level_at_elapsed(0.05, &e) - 0.5).abs() < 1e-6);
        assert!((level_at_elapsed(0.15, &e) - 1.0).abs() < 1e-6);
        assert!((level_at_elapsed(0.2, &e) - 0.75).abs() < 1e-6);
        assert!((level_at_elapsed(0.3, &e) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_delay_is_silent() {
        let e = env(0.2, 0.1, 0.0, 0.1, 0.5);
        assert_eq!(level_at_elapsed(0.0, &e), 0.0);
        assert_eq!(level_at_elapsed(0.19, &e), 0.0);
        assert!((level_at_elapsed(0.25, &e) - 0.5).abs() < 1e-6);
        assert_eq!(level_at_elapsed(-1.0, &e), 0.0);
    }

    #[test]
    fn test_zero_attack_and_decay_jump() {
        let e = env(0.0, 0.0, 0.0, 0.0, 0.3);
        assert!((level_at_elapsed(0.0, &e) - 0.3).abs() < 1e-6);

        let e = env(0.0, 0.0, 0.1, 0.2, 0.3);
        assert_eq!(level_at_elapsed(0.0, &e), 1.0);
        assert_eq!(level_at_elapsed(0.05, &e), 1.0);
    }

    #[test]
    fn test_release_level_endpoints() {
        assert!((release_level(0.0, 0.6, 0.2) - 0.6).abs() < 1e-6);
        assert!((release_level(0.1, 0.6, 0.2) - 0.3).abs() < 1e-6);
        assert_eq!(release_level(0.2, 0.6, 0.2), 0.0);
        assert_eq!(release_level(5.0, 0.6, 0.2), 0.0);
        assert_eq!(release_level(0.0, 0.6, 0.0), 0.0);
    }

    #[test]
    fn test_time_to_sustain() {
        let e = env(0.1, 0.2, 0.3, 0.4, 0.5);
        assert!((time_to_sustain(&e) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_schedule_matches_level_math() {
        let e = env(0.05, 0.1, 0.02, 0.2, 0.4);
        let mut backend = OfflineBackend::new();
        let amp = backend.create_node(NodeKind::Gain);
        schedule_start(&mut backend, amp, 1.0, 1.0, &e).unwrap();

        for i in 0..50 {
            let elapsed = f64::from(i) * 0.01;
            let scheduled = backend.param_value_at(amp, ParamKind::Gain, 1.0 + elapsed).unwrap();
            let expected = level_at_elapsed(elapsed, &e);
            assert!(
                (scheduled - expected).abs() < 1e-4,
                "elapsed {elapsed}: scheduled {scheduled} vs math {expected}"
            );
        }
    }

    #[test]
    fn test_schedule_scales_by_peak() {
        let e = env(0.0, 0.1, 0.0, 0.0, 0.5);
        let mut backend = OfflineBackend::new();
        let amp = backend.create_node(NodeKind::Gain);
        schedule_start(&mut backend, amp, 0.0, 0.5, &e).unwrap();
        assert!((backend.param_value_at(amp, ParamKind::Gain, 0.05).unwrap() - 0.25).abs() < 1e-6);
        assert!((backend.param_value_at(amp, ParamKind::Gain, 1.0).unwrap() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_release_schedule_ramps_from_held_value() {
        let e = env(0.0, 0.2, 0.0, 0.0, 1.0);
        let mut backend = OfflineBackend::new();
        let amp = backend.create_node(NodeKind::Gain);
        schedule_start(&mut backend, amp, 0.0, 1.0, &e).unwrap();

        backend.advance_to(0.1).unwrap();
        let end = schedule_release(&mut backend, amp, 0.1, 0.4).unwrap();
        assert!((end - 0.5).abs() < 1e-9);
        assert!((backend.param_value_at(amp, ParamKind::Gain, 0.3).unwrap() - 0.25).abs() < 1e-6);
        assert_eq!(backend.param_value_at(amp, ParamKind::Gain, 0.6).unwrap(), 0.0);
    }
}
