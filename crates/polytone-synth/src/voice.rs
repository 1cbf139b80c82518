//! One sounding note: its signal graph and lifecycle.
//!
//! ## Graph
//!
//! ```text
//! [osc x n] -> mix -> morph chain -> amp -> output
//!  (retiring stacks feed the same morph input while they fade out)
//! ```
//!
//! ## Lifecycle
//!
//! `Idle -> Active -> Released -> Stopped`. [`Voice::start`] schedules the
//! envelope and starts the oscillators; [`Voice::release`] ramps the amp to 0
//! and schedules the oscillator stop a guard margin later;
//! [`Voice::force_stop`] mutes within a few milliseconds. The backend's
//! `Ended` event for the voice's lifecycle oscillator (the lead oscillator of
//! the sounding stack) moves the voice to `Stopped` exactly once and releases
//! every node it owns.
//!
//! ## Modulation refresh
//!
//! On every tick and every parameter change the voice samples `env1` and
//! `lfo1`, resolves the unison targets through its [`ModMatrix`], and either
//! glides the oscillators' detune (count unchanged) or crossfades to a freshly
//! built stack (count changed).

use polytone_core::{
    AudioBackend, DeferredQueue, GraphError, NodeId, NodeKind, ParamKind, Ticker, Waveform,
    clamp01,
};
use tracing::{debug, trace};

use crate::config::EngineConfig;
use crate::envelope::{level_at_elapsed, release_level, schedule_release, schedule_start};
use crate::lfo::{LfoMode, LfoPoint, phase_at_time, unipolar_level};
use crate::mod_matrix::{ModMatrix, ModRoute, ModSourceValues, ModTarget};
use crate::morph::{MorphChain, OscMorphMode};
use crate::patch::Patch;
use crate::unison::{StackSpec, UnisonStack, gain_scale};

/// Smallest spread or detune change worth re-scheduling, in cents.
const RETUNE_EPSILON: f32 = 1e-4;

/// Lifecycle state of a voice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum VoiceState {
    /// Graph built, nothing scheduled
    #[default]
    Idle,
    /// Gate on
    Active,
    /// Gate off (or force-stopped), sound decaying
    Released,
    /// Sound over, graph released
    Stopped,
}

impl VoiceState {
    /// Lower-case name.
    pub fn name(self) -> &'static str {
        match self {
            VoiceState::Idle => "idle",
            VoiceState::Active => "active",
            VoiceState::Released => "released",
            VoiceState::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for VoiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Read-only view of a voice for preview surfaces.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoiceSnapshot {
    /// MIDI note
    pub midi: u8,
    /// Lifecycle state
    pub state: VoiceState,
    /// `env1` source value
    pub env_level: f32,
    /// `lfo1` source value
    pub lfo_level: f32,
    /// Sounding unison count
    pub unison_voices: usize,
    /// Sounding unison spread in cents
    pub unison_detune_cents: f32,
}

/// One note's signal graph and lifecycle state machine.
#[derive(Debug)]
pub struct Voice {
    midi: u8,
    velocity: f32,
    patch: Patch,
    matrix: ModMatrix,
    config: EngineConfig,
    state: VoiceState,
    forced: bool,
    note_on: f64,
    release_at: Option<f64>,
    release_start_level: f32,
    stop_at: Option<f64>,
    amp: NodeId,
    morph: MorphChain,
    stack: Option<UnisonStack>,
    lifecycle: NodeId,
    retiring: DeferredQueue<UnisonStack>,
    ticker: Ticker,
}

impl Voice {
    /// Build the voice's graph into `output`.
    ///
    /// The unison stack starts at the patch's configured count and spread;
    /// nothing sounds until [`start`](Self::start).
    pub fn new<B: AudioBackend>(
        backend: &mut B,
        output: NodeId,
        midi: u8,
        velocity: f32,
        patch: &Patch,
        matrix: &ModMatrix,
        config: &EngineConfig,
    ) -> Result<Self, GraphError> {
        let now = backend.current_time();
        let osc = patch.oscillator();

        let spec = StackSpec {
            midi,
            waveform: osc.waveform,
            base_detune_cents: osc.detune_cents,
            count: osc.unison_voices,
            spread_cents: osc.unison_detune_cents,
        };
        let amp = backend.create_node(NodeKind::Gain);
        let (morph, stack) = match build_graph(backend, amp, output, &spec, osc.morph_mode, now) {
            Ok(parts) => parts,
            Err(err) => {
                backend.disconnect(amp).and_then(|()| backend.release_node(amp)).ok();
                return Err(err);
            }
        };
        let lifecycle = stack.lead();

        debug!(midi, velocity, unison_voices = spec.count, "voice created");

        Ok(Self {
            midi,
            velocity: clamp01(velocity),
            patch: patch.clone(),
            matrix: matrix.clone(),
            config: config.sanitized(),
            state: VoiceState::Idle,
            forced: false,
            note_on: now,
            release_at: None,
            release_start_level: 0.0,
            stop_at: None,
            amp,
            morph,
            stack: Some(stack),
            lifecycle,
            retiring: DeferredQueue::new(),
            ticker: Ticker::new(config.tick_period, now),
        })
    }

    // Accessors

    /// MIDI note.
    pub fn midi(&self) -> u8 {
        self.midi
    }

    /// Velocity in `[0, 1]`.
    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    /// Lifecycle state.
    pub fn state(&self) -> VoiceState {
        self.state
    }

    /// Whether the voice has stopped and released its graph.
    pub fn is_stopped(&self) -> bool {
        self.state == VoiceState::Stopped
    }

    /// Whether the voice was force-stopped.
    pub fn is_forced(&self) -> bool {
        self.forced
    }

    /// Gate-on time.
    pub fn note_on_time(&self) -> f64 {
        self.note_on
    }

    /// Gate-off time, once released.
    pub fn release_time(&self) -> Option<f64> {
        self.release_at
    }

    /// Envelope level captured at gate-off.
    pub fn release_start_level(&self) -> f32 {
        self.release_start_level
    }

    /// Scheduled oscillator stop time, once released.
    pub fn stop_time(&self) -> Option<f64> {
        self.stop_at
    }

    /// The oscillator whose `Ended` event completes this voice.
    pub fn lifecycle_node(&self) -> NodeId {
        self.lifecycle
    }

    /// The voice's patch snapshot.
    pub fn patch(&self) -> &Patch {
        &self.patch
    }

    /// The voice's modulation routes.
    pub fn mod_matrix(&self) -> &ModMatrix {
        &self.matrix
    }

    /// Final amplitude stage.
    pub fn amp(&self) -> NodeId {
        self.amp
    }

    /// The morph chain handles.
    pub fn morph(&self) -> &MorphChain {
        &self.morph
    }

    /// The sounding unison stack, until the voice stops.
    pub fn stack(&self) -> Option<&UnisonStack> {
        self.stack.as_ref()
    }

    /// Number of stacks still fading out after a rebuild.
    pub fn retiring_count(&self) -> usize {
        self.retiring.len()
    }

    /// Sounding unison count (0 once stopped).
    pub fn unison_voices(&self) -> usize {
        self.stack.as_ref().map_or(0, UnisonStack::count)
    }

    /// Sounding unison spread in cents (0 once stopped).
    pub fn unison_detune_cents(&self) -> f32 {
        self.stack.as_ref().map_or(0.0, UnisonStack::spread_cents)
    }

    // Modulation sources

    /// `env1`: the envelope level at `now`, following the release ramp after
    /// gate-off.
    pub fn env_level(&self, now: f64) -> f32 {
        let env = self.patch.envelope();
        match (self.state, self.release_at) {
            (VoiceState::Idle | VoiceState::Stopped, _) => 0.0,
            (_, Some(released)) => release_level(now - released, self.release_start_level, env.release),
            (_, None) => level_at_elapsed(now - self.note_on, env),
        }
    }

    /// `lfo1`: the LFO shape at `now`, mapped to `[0, 1]`.
    pub fn lfo_level(&self, now: f64) -> f32 {
        let lfo = self.patch.lfo();
        let phase = phase_at_time(lfo.mode, lfo.rate_hz, lfo.phase_offset, now, self.note_on);
        unipolar_level(&lfo.points, phase)
    }

    /// Both modulation sources at `now`.
    pub fn source_values(&self, now: f64) -> ModSourceValues {
        ModSourceValues::new(self.env_level(now), self.lfo_level(now))
    }

    /// Read-only view at `now`.
    pub fn snapshot(&self, now: f64) -> VoiceSnapshot {
        VoiceSnapshot {
            midi: self.midi,
            state: self.state,
            env_level: self.env_level(now),
            lfo_level: self.lfo_level(now),
            unison_voices: self.unison_voices(),
            unison_detune_cents: self.unison_detune_cents(),
        }
    }

    // Lifecycle

    /// Gate on at `now`: schedule the envelope, start the oscillators and the
    /// modulation tick. Only valid from `Idle`.
    pub fn start<B: AudioBackend>(&mut self, backend: &mut B, now: f64) {
        if self.state != VoiceState::Idle {
            return;
        }
        self.note_on = now;
        let env = *self.patch.envelope();
        self.note_err("schedule envelope", schedule_start(backend, self.amp, now, self.velocity, &env));
        if let Some(stack) = &self.stack {
            let result = stack.start(backend, now);
            self.note_err("start oscillators", result);
        }
        self.ticker = Ticker::new(self.config.tick_period, now);
        self.state = VoiceState::Active;
        debug!(midi = self.midi, now, "voice started");
        self.refresh(backend, now);
    }

    /// Gate off at `now`: ramp to silence over the patch release and stop the
    /// oscillators a guard margin after the ramp. Only valid from `Active`.
    pub fn release<B: AudioBackend>(&mut self, backend: &mut B, now: f64) {
        if self.state != VoiceState::Active {
            return;
        }
        let env = *self.patch.envelope();
        self.release_start_level = level_at_elapsed(now - self.note_on, &env);
        self.release_at = Some(now);

        let end = match schedule_release(backend, self.amp, now, env.release) {
            Ok(end) => end,
            Err(err) => {
                self.note_err("schedule release", Err(err));
                now + f64::from(env.release)
            }
        };
        let stop_at = end + self.config.release_guard;
        self.stop_all(backend, stop_at);
        self.state = VoiceState::Released;
        debug!(midi = self.midi, now, stop_at, "voice released");
        self.refresh(backend, now);
    }

    /// Hard mute at `now`, bypassing the release ramp.
    ///
    /// Pending amp automation is cancelled before the mute ramp, and stacks
    /// still fading from a rebuild are disposed immediately. An `Idle` voice
    /// has nothing sounding and is torn down on the spot.
    pub fn force_stop<B: AudioBackend>(&mut self, backend: &mut B, now: f64) {
        match self.state {
            VoiceState::Stopped => return,
            VoiceState::Idle => {
                self.state = VoiceState::Stopped;
                self.forced = true;
                self.teardown(backend);
                debug!(midi = self.midi, "idle voice discarded");
                return;
            }
            VoiceState::Active => {
                self.release_start_level = level_at_elapsed(now - self.note_on, self.patch.envelope());
                self.release_at = Some(now);
            }
            VoiceState::Released => {}
        }

        let ramp_end = now + self.config.force_stop_ramp;
        let muted = backend.cancel_and_hold(self.amp, ParamKind::Gain).and_then(|_| {
            backend.linear_ramp_to_value_at_time(self.amp, ParamKind::Gain, 0.0, ramp_end)
        });
        self.note_err("mute", muted);

        for stack in self.retiring.drain_all() {
            let result = stack.dispose(backend);
            self.note_err("dispose retiring stack", result);
        }
        self.stop_all(backend, ramp_end);
        self.forced = true;
        self.state = VoiceState::Released;
        debug!(midi = self.midi, now, "voice force-stopped");
    }

    /// Handle an oscillator `Ended` event.
    ///
    /// Returns `true` exactly once: when `node` is this voice's lifecycle
    /// oscillator and the voice was not already stopped. The voice then owns
    /// no live graph nodes.
    pub fn handle_ended<B: AudioBackend>(&mut self, backend: &mut B, node: NodeId) -> bool {
        if self.state == VoiceState::Stopped || node != self.lifecycle {
            return false;
        }
        self.state = VoiceState::Stopped;
        self.teardown(backend);
        debug!(midi = self.midi, "voice stopped");
        true
    }

    /// Control-rate work due at `now`: dispose retired stacks whose crossfade
    /// is over, and refresh modulation when the tick fires.
    pub fn tick<B: AudioBackend>(&mut self, backend: &mut B, now: f64) {
        if self.state == VoiceState::Stopped {
            return;
        }
        for stack in self.retiring.pop_due(now) {
            let result = stack.dispose(backend);
            self.note_err("dispose retired stack", result);
        }
        if self.ticker.poll(now) {
            self.refresh(backend, now);
        }
    }

    // Parameter setters

    /// Switch the waveform of every oscillator.
    pub fn set_waveform<B: AudioBackend>(&mut self, backend: &mut B, waveform: Waveform, now: f64) {
        self.patch = self.patch.with_waveform(waveform);
        if self.state == VoiceState::Stopped {
            return;
        }
        let mut result = Ok(());
        for stack in self.stack.iter().chain(self.retiring.iter()) {
            result = result.and(stack.set_waveform(backend, waveform));
        }
        self.note_err("set waveform", result);
        self.refresh(backend, now);
    }

    /// Change the base unison count.
    pub fn set_unison_voices<B: AudioBackend>(&mut self, backend: &mut B, voices: usize, now: f64) {
        self.patch = self.patch.with_unison_voices(voices);
        self.refresh(backend, now);
    }

    /// Change the base unison spread.
    pub fn set_unison_detune_cents<B: AudioBackend>(&mut self, backend: &mut B, cents: f32, now: f64) {
        self.patch = self.patch.with_unison_detune_cents(cents);
        self.refresh(backend, now);
    }

    /// Change the oscillator detune.
    pub fn set_detune_cents<B: AudioBackend>(&mut self, backend: &mut B, cents: f32, now: f64) {
        self.patch = self.patch.with_detune_cents(cents);
        self.refresh(backend, now);
    }

    /// Switch the morph preset.
    pub fn set_morph_mode<B: AudioBackend>(&mut self, backend: &mut B, mode: OscMorphMode, now: f64) {
        self.patch = self.patch.with_morph_mode(mode);
        if self.state == VoiceState::Stopped {
            return;
        }
        let result = self.morph.apply(backend, mode, now);
        self.note_err("apply morph", result);
        self.refresh(backend, now);
    }

    /// Replace the modulation routes.
    pub fn set_mod_routes<B: AudioBackend>(&mut self, backend: &mut B, routes: &[ModRoute], now: f64) {
        self.matrix.set_routes(routes);
        self.refresh(backend, now);
    }

    /// Change the LFO mode.
    pub fn set_lfo_mode<B: AudioBackend>(&mut self, backend: &mut B, mode: LfoMode, now: f64) {
        self.patch = self.patch.with_lfo_mode(mode);
        self.refresh(backend, now);
    }

    /// Change the LFO rate.
    pub fn set_lfo_rate_hz<B: AudioBackend>(&mut self, backend: &mut B, rate_hz: f32, now: f64) {
        self.patch = self.patch.with_lfo_rate_hz(rate_hz);
        self.refresh(backend, now);
    }

    /// Change the LFO phase offset.
    pub fn set_lfo_phase_offset<B: AudioBackend>(&mut self, backend: &mut B, phase: f32, now: f64) {
        self.patch = self.patch.with_lfo_phase_offset(phase);
        self.refresh(backend, now);
    }

    /// Replace the LFO shape.
    pub fn set_lfo_points<B: AudioBackend>(&mut self, backend: &mut B, points: &[LfoPoint], now: f64) {
        self.patch = self.patch.with_lfo_points(points);
        self.refresh(backend, now);
    }

    // Modulation

    /// Re-evaluate modulation at `now` and apply it to the unison stack.
    ///
    /// A changed count triggers a crossfaded rebuild; otherwise a changed
    /// spread or detune glides the existing oscillators. Does nothing before
    /// start, after a force-stop, or once the oscillators have been told to
    /// stop.
    pub fn refresh<B: AudioBackend>(&mut self, backend: &mut B, now: f64) {
        if matches!(self.state, VoiceState::Idle | VoiceState::Stopped) || self.forced {
            return;
        }
        if self.stop_at.is_some_and(|stop| now >= stop) {
            return;
        }
        let Some(stack) = &self.stack else {
            return;
        };

        let sources = self.source_values(now);
        let osc = self.patch.oscillator();
        let spread = self
            .matrix
            .resolve(ModTarget::UnisonDetuneCents, osc.unison_detune_cents, &sources);
        let voices = self
            .matrix
            .resolve(ModTarget::UnisonVoices, osc.unison_voices as f32, &sources)
            as usize;
        let base_detune = osc.detune_cents;

        trace!(
            midi = self.midi,
            env1 = sources.env1,
            lfo1 = sources.lfo1,
            voices,
            spread,
            "modulation refresh"
        );

        if voices != stack.count() {
            self.rebuild(backend, voices, spread, now);
        } else if (spread - stack.spread_cents()).abs() > RETUNE_EPSILON
            || (base_detune - stack.base_detune_cents()).abs() > RETUNE_EPSILON
        {
            let glide = self.config.detune_glide;
            let result = self
                .stack
                .as_mut()
                .map_or(Ok(()), |s| s.retune(backend, base_detune, spread, now, glide));
            self.note_err("retune", result);
        }
    }

    /// Crossfade from the sounding stack to a new one of `count` oscillators.
    fn rebuild<B: AudioBackend>(&mut self, backend: &mut B, count: usize, spread: f32, now: f64) {
        let osc = self.patch.oscillator();
        let spec = StackSpec {
            midi: self.midi,
            waveform: osc.waveform,
            base_detune_cents: osc.detune_cents,
            count,
            spread_cents: spread,
        };
        let crossfade = self.config.crossfade;

        let fresh = match UnisonStack::build(backend, &spec, self.morph.input(), 0.0, now) {
            Ok(stack) => stack,
            Err(err) => {
                self.note_err("build unison stack", Err(err));
                return;
            }
        };
        let mut result = fresh
            .start(backend, now)
            .and_then(|()| fresh.fade(backend, gain_scale(count), now, crossfade));
        if let Some(stop_at) = self.stop_at {
            result = result.and(fresh.stop(backend, stop_at.max(now)));
        }
        self.note_err("start unison stack", result);

        self.lifecycle = fresh.lead();
        let Some(old) = self.stack.replace(fresh) else {
            return;
        };
        let retire_at = now + crossfade;
        let old_stop = self.stop_at.map_or(retire_at, |stop| stop.min(retire_at));
        let result = old
            .fade(backend, 0.0, now, crossfade)
            .and(old.stop(backend, old_stop));
        self.note_err("retire unison stack", result);
        debug!(midi = self.midi, from = old.count(), to = count, "unison rebuild");
        self.retiring.push(retire_at, old);
    }

    // Teardown

    /// Stop every oscillator of the sounding stack at `at`.
    fn stop_all<B: AudioBackend>(&mut self, backend: &mut B, at: f64) {
        self.stop_at = Some(self.stop_at.map_or(at, |prev| prev.min(at)));
        if let Some(stack) = &self.stack {
            let result = stack.stop(backend, at);
            self.note_err("stop oscillators", result);
        }
    }

    /// Release every node the voice still owns.
    pub(crate) fn teardown<B: AudioBackend>(&mut self, backend: &mut B) {
        let mut result = Ok(());
        if let Some(stack) = self.stack.take() {
            result = result.and(stack.dispose(backend));
        }
        for stack in self.retiring.drain_all() {
            result = result.and(stack.dispose(backend));
        }
        result = result.and(self.morph.dispose(backend));
        let amp = self.amp;
        result = result.and(backend.disconnect(amp).and_then(|()| backend.release_node(amp)));
        self.note_err("teardown", result);
    }

    /// Non-fatal graph errors are logged and ignored.
    fn note_err(&self, op: &'static str, result: Result<(), GraphError>) {
        if let Err(err) = result {
            debug!(midi = self.midi, op, %err, "graph operation ignored");
        }
    }
}

/// Wire amp, morph chain and unison stack. The morph chain is released
/// again if the stack cannot be built; `amp` stays with the caller.
fn build_graph<B: AudioBackend>(
    backend: &mut B,
    amp: NodeId,
    output: NodeId,
    spec: &StackSpec,
    morph_mode: OscMorphMode,
    now: f64,
) -> Result<(MorphChain, UnisonStack), GraphError> {
    backend.set_value_at_time(amp, ParamKind::Gain, 0.0, now)?;
    backend.connect(amp, output)?;

    let morph = MorphChain::build(backend, morph_mode, now)?;
    let stack = backend.connect(morph.output(), amp).and_then(|()| {
        UnisonStack::build(backend, spec, morph.input(), gain_scale(spec.count), now)
    });
    match stack {
        Ok(stack) => Ok((morph, stack)),
        Err(err) => {
            morph.dispose(backend).ok();
            Err(err)
        }
    }
}
