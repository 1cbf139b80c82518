//! Polytone Synth - polyphonic voice engine over an audio-graph backend
//!
//! This crate turns note events and patch parameters into a scheduled audio
//! graph. It never renders samples: every voice is a handful of backend nodes
//! whose parameters are automated on the backend clock.
//!
//! # Core Components
//!
//! ## Patch
//!
//! - [`Patch`] - Immutable, normalized parameter set with `with_*` updates
//! - [`PatchOptions`] - Partial overrides for [`Patch::create`]
//!
//! ```rust
//! use polytone_synth::{Patch, PatchOptions};
//!
//! let patch = Patch::create(PatchOptions {
//!     unison_voices: Some(40),
//!     ..PatchOptions::default()
//! });
//! assert_eq!(patch.oscillator().unison_voices, 16);
//! ```
//!
//! ## Modulation
//!
//! - [`level_at_elapsed`] - DAHDSR envelope level, the `env1` source
//! - [`LfoMode`] / [`LfoPoint`] - Breakpoint LFO, the `lfo1` source
//! - [`ModMatrix`] / [`ModRoute`] - Routes from sources to unison targets
//!
//! ## Voices
//!
//! - [`Voice`] - One note: unison stack, morph chain, amplitude envelope
//! - [`VoiceRegistry`] - Bounded pool with oldest-first stealing
//! - [`OscMorphMode`] - Timbre presets between the oscillators and the amp
//!
//! ## Engine
//!
//! - [`PolySynth`] - Note routing, live parameter updates, deferred start
//! - [`EngineConfig`] - Control-rate and crossfade timing
//!
//! # Example
//!
//! ```rust
//! use polytone_core::OfflineBackend;
//! use polytone_synth::{ModRoute, ModSource, ModTarget, OscMorphMode, Patch, PolySynth};
//!
//! let mut synth = PolySynth::new(OfflineBackend::new(), Patch::default()).unwrap();
//! synth.set_unison_voices(3);
//! synth.set_osc_morph_mode(OscMorphMode::HarmonicStretch);
//! synth.set_mod_routes(&[ModRoute::new(ModSource::Lfo1, ModTarget::UnisonDetuneCents, 0.5)]);
//!
//! synth.note_on(60, 1.0);
//! synth.note_on(67, 0.7);
//!
//! for _ in 0..10 {
//!     synth.backend_mut().advance_by(0.016).unwrap();
//!     synth.update();
//! }
//! assert_eq!(synth.active_voice_count(), 2);
//! ```

pub mod config;
pub mod envelope;
pub mod lfo;
pub mod mod_matrix;
pub mod morph;
pub mod patch;
pub mod registry;
pub mod synth;
pub mod unison;
pub mod voice;

// Re-export main types at crate root
pub use config::EngineConfig;
pub use envelope::{level_at_elapsed, release_level, time_to_sustain};
pub use lfo::{LfoMode, LfoPoint, default_points, phase_at_time, sample_shape};
pub use mod_matrix::{ModMatrix, ModRoute, ModSource, ModSourceValues, ModTarget, Quantize, resolve};
pub use morph::{MorphChain, OscMorphMode};
pub use patch::{EnvelopeParams, GlobalParams, LfoParams, OscillatorParams, Patch, PatchOptions};
pub use registry::VoiceRegistry;
pub use synth::PolySynth;
pub use voice::{Voice, VoiceSnapshot, VoiceState};

// Re-export commonly used types from polytone-core
pub use polytone_core::{AudioBackend, OfflineBackend, Waveform};
