//! The polyphonic engine façade.
//!
//! [`PolySynth`] owns the backend, the master gain, the master patch and the
//! voice registry. Every setter is synchronous and infallible: it updates the
//! master patch and, for voice-level parameters, every sounding voice, which
//! applies the change on its immediate modulation refresh. Envelope changes
//! take effect on the next note.
//!
//! The host drives the control loop by calling [`PolySynth::update`]
//! regularly (every few milliseconds is plenty). It collects oscillator
//! completions, replays notes that arrived before the backend was running, and
//! runs each voice's modulation tick.
//!
//! # Example
//!
//! ```rust
//! use polytone_core::OfflineBackend;
//! use polytone_synth::{Patch, PolySynth};
//!
//! let mut synth = PolySynth::new(OfflineBackend::new(), Patch::default()).unwrap();
//! synth.note_on(60, 1.0);
//! synth.note_on(64, 0.8);
//! assert_eq!(synth.active_voice_count(), 2);
//!
//! synth.note_off(60);
//! synth.backend_mut().advance_to(1.0).unwrap();
//! synth.update();
//! assert_eq!(synth.active_voice_count(), 1);
//! ```

use polytone_core::{AudioBackend, BackendEvent, BackendState, GraphError, NodeId, NodeKind, ParamKind, Waveform};
use tracing::debug;

use crate::config::EngineConfig;
use crate::lfo::{LfoMode, LfoPoint};
use crate::mod_matrix::{ModMatrix, ModRoute};
use crate::morph::OscMorphMode;
use crate::patch::Patch;
use crate::registry::VoiceRegistry;
use crate::voice::{Voice, VoiceSnapshot};

/// A note event waiting for the backend to run.
#[derive(Clone, Copy, Debug, PartialEq)]
enum PendingNote {
    On { midi: u8, velocity: f32 },
    Off { midi: u8 },
}

/// Polyphonic voice engine over an [`AudioBackend`].
#[derive(Debug)]
pub struct PolySynth<B: AudioBackend> {
    backend: B,
    master: NodeId,
    patch: Patch,
    matrix: ModMatrix,
    config: EngineConfig,
    registry: VoiceRegistry,
    pending: Vec<PendingNote>,
}

impl<B: AudioBackend> PolySynth<B> {
    /// Create an engine with the default [`EngineConfig`].
    pub fn new(backend: B, patch: Patch) -> Result<Self, GraphError> {
        Self::with_config(backend, patch, EngineConfig::default())
    }

    /// Create an engine: a master gain at the patch's master level, wired to
    /// the backend destination.
    pub fn with_config(mut backend: B, patch: Patch, config: EngineConfig) -> Result<Self, GraphError> {
        let now = backend.current_time();
        let master = backend.create_node(NodeKind::Gain);
        backend.set_value_at_time(master, ParamKind::Gain, patch.global().master_gain, now)?;
        let destination = backend.destination();
        backend.connect(master, destination)?;

        Ok(Self {
            backend,
            master,
            registry: VoiceRegistry::new(patch.global().max_voices),
            patch,
            matrix: ModMatrix::new(),
            config: config.sanitized(),
            pending: Vec::new(),
        })
    }

    // Accessors

    /// The backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The backend, mutably (the host advances clocks and resumes through it).
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// The master output gain node.
    pub fn master(&self) -> NodeId {
        self.master
    }

    /// Engine timing configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// A copy of the master patch.
    pub fn get_patch(&self) -> Patch {
        self.patch.clone()
    }

    /// A copy of the modulation routes.
    pub fn mod_routes(&self) -> Vec<ModRoute> {
        self.matrix.routes().to_vec()
    }

    /// The voice registry.
    pub fn registry(&self) -> &VoiceRegistry {
        &self.registry
    }

    /// Number of tracked voices.
    pub fn active_voice_count(&self) -> usize {
        self.registry.len()
    }

    /// Number of evicted or panicked voices still fading out.
    pub fn stopping_voice_count(&self) -> usize {
        self.registry.stopping().len()
    }

    /// Number of note events waiting for the backend.
    pub fn pending_note_count(&self) -> usize {
        self.pending.len()
    }

    /// Snapshots of every tracked voice, oldest first.
    pub fn voice_snapshots(&self) -> Vec<VoiceSnapshot> {
        let now = self.backend.current_time();
        self.registry.iter().map(|v| v.snapshot(now)).collect()
    }

    // Control loop

    /// Ask a suspended backend to resume. Returns whether it is running now.
    ///
    /// Resumption is asynchronous; notes played before it completes are
    /// deferred and replayed by [`update`](Self::update).
    pub fn resume_if_needed(&mut self) -> bool {
        match self.backend.state() {
            BackendState::Running => true,
            BackendState::Suspended => {
                self.backend.request_resume();
                false
            }
            BackendState::Closed => false,
        }
    }

    /// Run the control loop once: completions, deferred notes, voice ticks.
    pub fn update(&mut self) {
        for BackendEvent::Ended(node) in self.backend.drain_events() {
            if let Some(midi) = self.registry.complete(&mut self.backend, node) {
                debug!(midi, "voice completed");
            }
        }
        if self.backend.state() == BackendState::Running {
            self.flush_pending();
        }
        let now = self.backend.current_time();
        self.registry.tick(&mut self.backend, now);
    }

    // Notes

    /// Start a note. `velocity` is clamped to `[0, 1]`.
    ///
    /// A note-on for a pitch that is still sounding, held or fading out, is
    /// ignored. While the backend is not running the event is queued.
    pub fn note_on(&mut self, midi: u8, velocity: f32) {
        if self.resume_if_needed() {
            self.flush_pending();
            self.start_note(midi, velocity);
        } else {
            self.defer(PendingNote::On { midi, velocity });
        }
    }

    /// Release a note; a no-op for pitches that are not sounding.
    pub fn note_off(&mut self, midi: u8) {
        if self.backend.state() == BackendState::Running {
            self.flush_pending();
            let now = self.backend.current_time();
            self.registry.release(&mut self.backend, midi, now);
        } else {
            self.defer(PendingNote::Off { midi });
        }
    }

    /// Hard-stop every voice and drop queued notes.
    pub fn panic(&mut self) {
        self.pending.clear();
        let now = self.backend.current_time();
        self.registry.panic(&mut self.backend, now);
    }

    fn start_note(&mut self, midi: u8, velocity: f32) {
        if self.registry.contains(midi) {
            debug!(midi, "duplicate note-on ignored");
            return;
        }

        let now = self.backend.current_time();
        let voice = Voice::new(
            &mut self.backend,
            self.master,
            midi,
            velocity,
            &self.patch,
            &self.matrix,
            &self.config,
        );
        match voice {
            Ok(mut voice) => {
                voice.start(&mut self.backend, now);
                let stopped = self.registry.add(&mut self.backend, voice, now);
                if !stopped.is_empty() {
                    debug!(midi, ?stopped, "voices stopped for note-on");
                }
            }
            Err(err) => debug!(midi, %err, "note dropped: voice graph could not be built"),
        }
    }

    fn defer(&mut self, note: PendingNote) {
        if self.backend.state() == BackendState::Closed {
            debug!(?note, "backend closed, note dropped");
            return;
        }
        debug!(?note, "backend not running, note deferred");
        self.pending.push(note);
    }

    fn flush_pending(&mut self) {
        for note in std::mem::take(&mut self.pending) {
            match note {
                PendingNote::On { midi, velocity } => self.start_note(midi, velocity),
                PendingNote::Off { midi } => {
                    let now = self.backend.current_time();
                    self.registry.release(&mut self.backend, midi, now);
                }
            }
        }
    }

    // Global parameters

    /// Set the master output gain (clamped to `[0, 1]`), effective now.
    pub fn set_master_gain(&mut self, gain: f32) {
        self.patch = self.patch.with_master_gain(gain);
        let level = self.patch.global().master_gain;
        let now = self.backend.current_time();
        let result = self
            .backend
            .cancel_scheduled_values(self.master, ParamKind::Gain, now)
            .and_then(|()| self.backend.set_value_at_time(self.master, ParamKind::Gain, level, now));
        if let Err(err) = result {
            debug!(%err, "master gain not applied");
        }
    }

    /// Set the polyphony limit, evicting oldest voices beyond it.
    pub fn set_max_voices(&mut self, voices: usize) {
        self.patch = self.patch.with_max_voices(voices);
        let now = self.backend.current_time();
        let limit = self.patch.global().max_voices;
        let evicted = self.registry.set_max_voices(&mut self.backend, limit, now);
        if !evicted.is_empty() {
            debug!(limit, ?evicted, "voices evicted by new limit");
        }
    }

    // Envelope (next note)

    /// Set the envelope delay.
    pub fn set_delay(&mut self, seconds: f32) {
        self.patch = self.patch.with_delay(seconds);
    }

    /// Set the envelope attack.
    pub fn set_attack(&mut self, seconds: f32) {
        self.patch = self.patch.with_attack(seconds);
    }

    /// Set the envelope hold.
    pub fn set_hold(&mut self, seconds: f32) {
        self.patch = self.patch.with_hold(seconds);
    }

    /// Set the envelope decay.
    pub fn set_decay(&mut self, seconds: f32) {
        self.patch = self.patch.with_decay(seconds);
    }

    /// Set the envelope sustain level.
    pub fn set_sustain(&mut self, level: f32) {
        self.patch = self.patch.with_sustain(level);
    }

    /// Set the envelope release.
    pub fn set_release(&mut self, seconds: f32) {
        self.patch = self.patch.with_release(seconds);
    }

    // Voice parameters (live)

    /// Set the oscillator waveform.
    pub fn set_wave(&mut self, waveform: Waveform) {
        self.patch = self.patch.with_waveform(waveform);
        let now = self.backend.current_time();
        self.registry
            .for_each_voice(|v| v.set_waveform(&mut self.backend, waveform, now));
    }

    /// Set the oscillator detune in cents.
    pub fn set_detune_cents(&mut self, cents: f32) {
        self.patch = self.patch.with_detune_cents(cents);
        let now = self.backend.current_time();
        self.registry
            .for_each_voice(|v| v.set_detune_cents(&mut self.backend, cents, now));
    }

    /// Set the base unison count.
    pub fn set_unison_voices(&mut self, voices: usize) {
        self.patch = self.patch.with_unison_voices(voices);
        let now = self.backend.current_time();
        self.registry
            .for_each_voice(|v| v.set_unison_voices(&mut self.backend, voices, now));
    }

    /// Set the base unison spread in cents.
    pub fn set_unison_detune_cents(&mut self, cents: f32) {
        self.patch = self.patch.with_unison_detune_cents(cents);
        let now = self.backend.current_time();
        self.registry
            .for_each_voice(|v| v.set_unison_detune_cents(&mut self.backend, cents, now));
    }

    /// Set the morph preset.
    pub fn set_osc_morph_mode(&mut self, mode: OscMorphMode) {
        self.patch = self.patch.with_morph_mode(mode);
        let now = self.backend.current_time();
        self.registry
            .for_each_voice(|v| v.set_morph_mode(&mut self.backend, mode, now));
    }

    /// Set the LFO mode.
    pub fn set_lfo_mode(&mut self, mode: LfoMode) {
        self.patch = self.patch.with_lfo_mode(mode);
        let now = self.backend.current_time();
        self.registry
            .for_each_voice(|v| v.set_lfo_mode(&mut self.backend, mode, now));
    }

    /// Set the LFO rate in Hz.
    pub fn set_lfo_rate_hz(&mut self, rate_hz: f32) {
        self.patch = self.patch.with_lfo_rate_hz(rate_hz);
        let now = self.backend.current_time();
        self.registry
            .for_each_voice(|v| v.set_lfo_rate_hz(&mut self.backend, rate_hz, now));
    }

    /// Set the LFO phase offset in cycles.
    pub fn set_lfo_phase_offset(&mut self, phase: f32) {
        self.patch = self.patch.with_lfo_phase_offset(phase);
        let now = self.backend.current_time();
        self.registry
            .for_each_voice(|v| v.set_lfo_phase_offset(&mut self.backend, phase, now));
    }

    /// Replace the LFO shape.
    pub fn set_lfo_points(&mut self, points: &[LfoPoint]) {
        self.patch = self.patch.with_lfo_points(points);
        let now = self.backend.current_time();
        self.registry
            .for_each_voice(|v| v.set_lfo_points(&mut self.backend, points, now));
    }

    /// Replace every modulation route.
    pub fn set_mod_routes(&mut self, routes: &[ModRoute]) {
        self.matrix.set_routes(routes);
        let now = self.backend.current_time();
        self.registry
            .for_each_voice(|v| v.set_mod_routes(&mut self.backend, routes, now));
    }

    /// Release every node the engine owns and hand the backend back.
    pub fn shutdown(mut self) -> B {
        self.pending.clear();
        self.registry.teardown(&mut self.backend);
        let master = self.master;
        if let Err(err) = self
            .backend
            .disconnect(master)
            .and_then(|()| self.backend.release_node(master))
        {
            debug!(%err, "master gain not released");
        }
        self.backend
    }
}
