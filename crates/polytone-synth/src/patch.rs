//! Immutable patch model.
//!
//! A [`Patch`] is a value: every `with_*` operation returns a new patch and
//! leaves the original untouched, and cloning is a deep copy with no shared
//! mutable state. The engine keeps the master patch; every voice holds its own
//! snapshot.
//!
//! Out-of-range input is never rejected. Every numeric field is clamped on
//! every update (NaN collapses to the bottom of the range), so a patch is
//! always internally consistent.
//!
//! ## Ranges
//!
//! | Field | Range |
//! |-------|-------|
//! | `detune_cents` | -1200 to 1200 |
//! | `unison_voices` | 1 to 16 |
//! | `unison_detune_cents` | 0 to 100 |
//! | envelope times | 0 to 8 s |
//! | `sustain` | 0 to 1 |
//! | `rate_hz` | 0.01 to 64 |
//! | `phase_offset` | wrapped into [0, 1) |
//! | LFO point `x` / `y` | [0, 1] / [-1, 1] |
//! | `max_voices` | 1 to 64 |
//! | `master_gain` | 0 to 1 |
//!
//! # Example
//!
//! ```rust
//! use polytone_synth::{Patch, PatchOptions};
//!
//! let base = Patch::create(PatchOptions {
//!     attack: Some(0.05),
//!     unison_voices: Some(40),
//!     ..PatchOptions::default()
//! });
//! assert_eq!(base.oscillator().unison_voices, 16);
//!
//! let brighter = base.with_attack(-3.0);
//! assert_eq!(brighter.envelope().attack, 0.0);
//! assert_eq!(base.envelope().attack, 0.05);
//! ```

use polytone_core::{Waveform, wrap01};

use crate::lfo::{LfoMode, LfoPoint, normalize_points};
use crate::morph::OscMorphMode;

/// Maximum unison oscillators per voice.
pub const MAX_UNISON_VOICES: usize = 16;
/// Maximum unison spread in cents.
pub const MAX_UNISON_DETUNE_CENTS: f32 = 100.0;
/// Maximum oscillator detune magnitude in cents.
pub const MAX_DETUNE_CENTS: f32 = 1200.0;
/// Longest envelope segment in seconds.
pub const MAX_ENV_SECONDS: f32 = 8.0;
/// LFO rate range in Hz.
pub const LFO_RATE_RANGE: (f32, f32) = (0.01, 64.0);
/// Polyphony limit range.
pub const MAX_VOICES_RANGE: (usize, usize) = (1, 64);

/// Oscillator section.
#[derive(Clone, Debug, PartialEq)]
pub struct OscillatorParams {
    /// Waveform of every unison oscillator
    pub waveform: Waveform,
    /// Global detune added to every unison offset, in cents
    pub detune_cents: f32,
    /// Configured unison oscillator count (1 to 16)
    pub unison_voices: usize,
    /// Spread between the outermost unison oscillators and center, in cents
    pub unison_detune_cents: f32,
    /// Tone-shaping preset of the morph stage
    pub morph_mode: OscMorphMode,
}

/// Amplitude envelope (delay, attack, hold, decay, sustain, release).
///
/// Times are in seconds; `sustain` is a level in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnvelopeParams {
    /// Silence before the attack starts
    pub delay: f32,
    /// Rise from 0 to 1
    pub attack: f32,
    /// Time held at 1
    pub hold: f32,
    /// Fall from 1 to sustain
    pub decay: f32,
    /// Level held while the gate stays on
    pub sustain: f32,
    /// Fall from the release-start level to 0
    pub release: f32,
}

/// Low-frequency oscillator section.
#[derive(Clone, Debug, PartialEq)]
pub struct LfoParams {
    /// Phase behaviour relative to notes
    pub mode: LfoMode,
    /// Rate in Hz
    pub rate_hz: f32,
    /// Phase offset in cycles, `[0, 1)`
    pub phase_offset: f32,
    /// User-drawn shape; x strictly increasing, pinned at 0 and 1
    pub points: Vec<LfoPoint>,
}

/// Engine-wide settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlobalParams {
    /// Polyphony limit
    pub max_voices: usize,
    /// Output gain, `[0, 1]`
    pub master_gain: f32,
}

/// Partial patch description merged over the defaults by [`Patch::create`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PatchOptions {
    /// Oscillator waveform
    pub waveform: Option<Waveform>,
    /// Oscillator detune in cents
    pub detune_cents: Option<f32>,
    /// Unison oscillator count
    pub unison_voices: Option<usize>,
    /// Unison spread in cents
    pub unison_detune_cents: Option<f32>,
    /// Morph preset
    pub morph_mode: Option<OscMorphMode>,
    /// Envelope delay in seconds
    pub delay: Option<f32>,
    /// Envelope attack in seconds
    pub attack: Option<f32>,
    /// Envelope hold in seconds
    pub hold: Option<f32>,
    /// Envelope decay in seconds
    pub decay: Option<f32>,
    /// Envelope sustain level
    pub sustain: Option<f32>,
    /// Envelope release in seconds
    pub release: Option<f32>,
    /// LFO mode
    pub lfo_mode: Option<LfoMode>,
    /// LFO rate in Hz
    pub lfo_rate_hz: Option<f32>,
    /// LFO phase offset in cycles
    pub lfo_phase_offset: Option<f32>,
    /// LFO shape
    pub lfo_points: Option<Vec<LfoPoint>>,
    /// Polyphony limit
    pub max_voices: Option<usize>,
    /// Master gain
    pub master_gain: Option<f32>,
}

/// Complete, always-consistent parameter snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct Patch {
    oscillator: OscillatorParams,
    envelope: EnvelopeParams,
    lfo: LfoParams,
    global: GlobalParams,
}

impl Default for Patch {
    fn default() -> Self {
        Self::create(PatchOptions::default())
    }
}

impl Patch {
    /// Merge `options` over the defaults and clamp every field.
    ///
    /// Defaults: sawtooth, one unison voice, no detune, no morph; envelope
    /// 0 / 10 ms / 0 / 200 ms / 0.8 / 150 ms; trigger-mode LFO at 1 Hz with
    /// the default five-point shape; 8 voices at master gain 0.2.
    pub fn create(options: PatchOptions) -> Self {
        Self {
            oscillator: OscillatorParams {
                waveform: options.waveform.unwrap_or_default(),
                detune_cents: clamp_detune(options.detune_cents.unwrap_or(0.0)),
                unison_voices: clamp_unison_voices(options.unison_voices.unwrap_or(1)),
                unison_detune_cents: clamp_unison_detune(
                    options.unison_detune_cents.unwrap_or(0.0),
                ),
                morph_mode: options.morph_mode.unwrap_or_default(),
            },
            envelope: EnvelopeParams {
                delay: clamp_env_time(options.delay.unwrap_or(0.0)),
                attack: clamp_env_time(options.attack.unwrap_or(0.01)),
                hold: clamp_env_time(options.hold.unwrap_or(0.0)),
                decay: clamp_env_time(options.decay.unwrap_or(0.2)),
                sustain: clamp_level(options.sustain.unwrap_or(0.8)),
                release: clamp_env_time(options.release.unwrap_or(0.15)),
            },
            lfo: LfoParams {
                mode: options.lfo_mode.unwrap_or_default(),
                rate_hz: clamp_lfo_rate(options.lfo_rate_hz.unwrap_or(1.0)),
                phase_offset: wrap_phase(options.lfo_phase_offset.unwrap_or(0.0)),
                points: normalize_points(options.lfo_points.as_deref().unwrap_or(&[])),
            },
            global: GlobalParams {
                max_voices: clamp_max_voices(options.max_voices.unwrap_or(8)),
                master_gain: clamp_level(options.master_gain.unwrap_or(0.2)),
            },
        }
    }

    /// Oscillator section.
    pub fn oscillator(&self) -> &OscillatorParams {
        &self.oscillator
    }

    /// Amplitude envelope.
    pub fn envelope(&self) -> &EnvelopeParams {
        &self.envelope
    }

    /// LFO section.
    pub fn lfo(&self) -> &LfoParams {
        &self.lfo
    }

    /// Engine-wide settings.
    pub fn global(&self) -> &GlobalParams {
        &self.global
    }

    // Oscillator

    /// Returns a copy with a new waveform.
    #[must_use]
    pub fn with_waveform(&self, waveform: Waveform) -> Self {
        let mut next = self.clone();
        next.oscillator.waveform = waveform;
        next
    }

    /// Returns a copy with a new oscillator detune (clamped to ±1200 cents).
    #[must_use]
    pub fn with_detune_cents(&self, cents: f32) -> Self {
        let mut next = self.clone();
        next.oscillator.detune_cents = clamp_detune(cents);
        next
    }

    /// Returns a copy with a new unison count (clamped to 1..=16).
    #[must_use]
    pub fn with_unison_voices(&self, voices: usize) -> Self {
        let mut next = self.clone();
        next.oscillator.unison_voices = clamp_unison_voices(voices);
        next
    }

    /// Returns a copy with a new unison spread (clamped to 0..=100 cents).
    #[must_use]
    pub fn with_unison_detune_cents(&self, cents: f32) -> Self {
        let mut next = self.clone();
        next.oscillator.unison_detune_cents = clamp_unison_detune(cents);
        next
    }

    /// Returns a copy with a new morph preset.
    #[must_use]
    pub fn with_morph_mode(&self, mode: OscMorphMode) -> Self {
        let mut next = self.clone();
        next.oscillator.morph_mode = mode;
        next
    }

    // Envelope

    /// Returns a copy with a new envelope delay.
    #[must_use]
    pub fn with_delay(&self, seconds: f32) -> Self {
        let mut next = self.clone();
        next.envelope.delay = clamp_env_time(seconds);
        next
    }

    /// Returns a copy with a new attack time.
    #[must_use]
    pub fn with_attack(&self, seconds: f32) -> Self {
        let mut next = self.clone();
        next.envelope.attack = clamp_env_time(seconds);
        next
    }

    /// Returns a copy with a new hold time.
    #[must_use]
    pub fn with_hold(&self, seconds: f32) -> Self {
        let mut next = self.clone();
        next.envelope.hold = clamp_env_time(seconds);
        next
    }

    /// Returns a copy with a new decay time.
    #[must_use]
    pub fn with_decay(&self, seconds: f32) -> Self {
        let mut next = self.clone();
        next.envelope.decay = clamp_env_time(seconds);
        next
    }

    /// Returns a copy with a new sustain level.
    #[must_use]
    pub fn with_sustain(&self, level: f32) -> Self {
        let mut next = self.clone();
        next.envelope.sustain = clamp_level(level);
        next
    }

    /// Returns a copy with a new release time.
    #[must_use]
    pub fn with_release(&self, seconds: f32) -> Self {
        let mut next = self.clone();
        next.envelope.release = clamp_env_time(seconds);
        next
    }

    // LFO

    /// Returns a copy with a new LFO mode.
    #[must_use]
    pub fn with_lfo_mode(&self, mode: LfoMode) -> Self {
        let mut next = self.clone();
        next.lfo.mode = mode;
        next
    }

    /// Returns a copy with a new LFO rate (clamped to 0.01..=64 Hz).
    #[must_use]
    pub fn with_lfo_rate_hz(&self, rate_hz: f32) -> Self {
        let mut next = self.clone();
        next.lfo.rate_hz = clamp_lfo_rate(rate_hz);
        next
    }

    /// Returns a copy with a new LFO phase offset (wrapped into `[0, 1)`).
    #[must_use]
    pub fn with_lfo_phase_offset(&self, phase: f32) -> Self {
        let mut next = self.clone();
        next.lfo.phase_offset = wrap_phase(phase);
        next
    }

    /// Returns a copy with a new, normalized LFO shape.
    #[must_use]
    pub fn with_lfo_points(&self, points: &[LfoPoint]) -> Self {
        let mut next = self.clone();
        next.lfo.points = normalize_points(points);
        next
    }

    // Global

    /// Returns a copy with a new polyphony limit (clamped to 1..=64).
    #[must_use]
    pub fn with_max_voices(&self, voices: usize) -> Self {
        let mut next = self.clone();
        next.global.max_voices = clamp_max_voices(voices);
        next
    }

    /// Returns a copy with a new master gain (clamped to 0..=1).
    #[must_use]
    pub fn with_master_gain(&self, gain: f32) -> Self {
        let mut next = self.clone();
        next.global.master_gain = clamp_level(gain);
        next
    }
}

fn clamp_finite(value: f32, min: f32, max: f32) -> f32 {
    if value.is_nan() { min } else { value.clamp(min, max) }
}

fn clamp_env_time(seconds: f32) -> f32 {
    clamp_finite(seconds, 0.0, MAX_ENV_SECONDS)
}

fn clamp_level(level: f32) -> f32 {
    clamp_finite(level, 0.0, 1.0)
}

fn clamp_detune(cents: f32) -> f32 {
    clamp_finite(cents, -MAX_DETUNE_CENTS, MAX_DETUNE_CENTS)
}

fn clamp_unison_voices(voices: usize) -> usize {
    voices.clamp(1, MAX_UNISON_VOICES)
}

fn clamp_unison_detune(cents: f32) -> f32 {
    clamp_finite(cents, 0.0, MAX_UNISON_DETUNE_CENTS)
}

fn clamp_lfo_rate(rate_hz: f32) -> f32 {
    clamp_finite(rate_hz, LFO_RATE_RANGE.0, LFO_RATE_RANGE.1)
}

fn clamp_max_voices(voices: usize) -> usize {
    voices.clamp(MAX_VOICES_RANGE.0, MAX_VOICES_RANGE.1)
}

fn wrap_phase(phase: f32) -> f32 {
    let wrapped = wrap01(f64::from(phase)) as f32;
    // Rounding to f32 can land exactly on 1.0.
    if wrapped >= 1.0 { 0.0 } else { wrapped }
}
