//! Unison oscillator stacks.
//!
//! A stack is `n` oscillators at the same pitch, spread symmetrically in
//! detune, summed into one mix gain. A voice owns one sounding stack and, while
//! a rebuild crossfades, any number of retiring ones.

use polytone_core::{AudioBackend, GraphError, NodeId, NodeKind, ParamKind, Waveform, midi_to_hz};

/// Detune offset in cents of each unison oscillator, lowest first.
///
/// Offsets are spaced evenly across `[-spread, spread]` with the center at 0:
/// `spread * (2i / (n - 1) - 1)`. A single oscillator sits at 0.
///
/// ```rust
/// use polytone_synth::unison::detune_offsets;
///
/// assert_eq!(detune_offsets(3, 10.0), vec![-10.0, 0.0, 10.0]);
/// assert_eq!(detune_offsets(1, 10.0), vec![0.0]);
/// ```
pub fn detune_offsets(count: usize, spread_cents: f32) -> Vec<f32> {
    let count = count.max(1);
    if count == 1 {
        return vec![0.0];
    }
    let last = (count - 1) as f32;
    (0..count)
        .map(|i| spread_cents * (2.0 * i as f32 / last - 1.0))
        .collect()
}

/// Mix gain that keeps perceived loudness steady across unison counts.
pub fn gain_scale(count: usize) -> f32 {
    if count <= 1 {
        1.0
    } else {
        1.0 / libm::sqrtf(count as f32)
    }
}

/// Settings a stack is built from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StackSpec {
    /// MIDI note
    pub midi: u8,
    /// Oscillator waveform
    pub waveform: Waveform,
    /// Oscillator detune added to every offset, in cents
    pub base_detune_cents: f32,
    /// Number of oscillators
    pub count: usize,
    /// Unison spread in cents
    pub spread_cents: f32,
}

/// One set of unison oscillators and its mix gain.
#[derive(Debug, PartialEq)]
pub struct UnisonStack {
    oscillators: Vec<NodeId>,
    mix: NodeId,
    base_detune_cents: f32,
    spread_cents: f32,
}

impl UnisonStack {
    /// Create the oscillators and mix gain, wired into `output`.
    ///
    /// The mix gain starts at `initial_gain`; oscillators are not started.
    /// On failure every node created so far is released again.
    pub fn build<B: AudioBackend>(
        backend: &mut B,
        spec: &StackSpec,
        output: NodeId,
        initial_gain: f32,
        now: f64,
    ) -> Result<Self, GraphError> {
        let mut stack = Self {
            oscillators: Vec::with_capacity(spec.count),
            mix: backend.create_node(NodeKind::Gain),
            base_detune_cents: spec.base_detune_cents,
            spread_cents: spec.spread_cents,
        };
        match stack.wire(backend, spec, output, initial_gain, now) {
            Ok(()) => Ok(stack),
            Err(err) => {
                // The wiring error is the one worth reporting.
                stack.dispose(backend).ok();
                Err(err)
            }
        }
    }

    fn wire<B: AudioBackend>(
        &mut self,
        backend: &mut B,
        spec: &StackSpec,
        output: NodeId,
        initial_gain: f32,
        now: f64,
    ) -> Result<(), GraphError> {
        backend.set_value_at_time(self.mix, ParamKind::Gain, initial_gain, now)?;
        backend.connect(self.mix, output)?;

        let frequency = midi_to_hz(spec.midi);
        for offset in detune_offsets(spec.count, spec.spread_cents) {
            let osc = backend.create_node(NodeKind::Oscillator);
            self.oscillators.push(osc);
            backend.set_waveform(osc, spec.waveform)?;
            backend.set_value_at_time(osc, ParamKind::Frequency, frequency, now)?;
            backend.set_value_at_time(osc, ParamKind::Detune, spec.base_detune_cents + offset, now)?;
            backend.connect(osc, self.mix)?;
        }
        Ok(())
    }

    /// Number of oscillators.
    pub fn count(&self) -> usize {
        self.oscillators.len()
    }

    /// Oscillator handles, lowest detune first.
    pub fn oscillators(&self) -> &[NodeId] {
        &self.oscillators
    }

    /// The mix gain node.
    pub fn mix(&self) -> NodeId {
        self.mix
    }

    /// The oscillator whose end marks the end of this stack.
    pub fn lead(&self) -> NodeId {
        self.oscillators[0]
    }

    /// Current unison spread in cents.
    pub fn spread_cents(&self) -> f32 {
        self.spread_cents
    }

    /// Current oscillator detune in cents.
    pub fn base_detune_cents(&self) -> f32 {
        self.base_detune_cents
    }

    /// Start every oscillator at `at`.
    pub fn start<B: AudioBackend>(&self, backend: &mut B, at: f64) -> Result<(), GraphError> {
        for &osc in &self.oscillators {
            backend.start(osc, at)?;
        }
        Ok(())
    }

    /// Schedule every oscillator to stop at `at`.
    ///
    /// All oscillators are attempted; the first failure is returned.
    pub fn stop<B: AudioBackend>(&self, backend: &mut B, at: f64) -> Result<(), GraphError> {
        let mut first_err = None;
        for &osc in &self.oscillators {
            if let Err(err) = backend.stop(osc, at) {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Switch every oscillator's waveform.
    pub fn set_waveform<B: AudioBackend>(
        &self,
        backend: &mut B,
        waveform: Waveform,
    ) -> Result<(), GraphError> {
        for &osc in &self.oscillators {
            backend.set_waveform(osc, waveform)?;
        }
        Ok(())
    }

    /// Glide every oscillator to a new spread and base detune, arriving at
    /// `now + glide`.
    pub fn retune<B: AudioBackend>(
        &mut self,
        backend: &mut B,
        base_detune_cents: f32,
        spread_cents: f32,
        now: f64,
        glide: f64,
    ) -> Result<(), GraphError> {
        let offsets = detune_offsets(self.count(), spread_cents);
        for (&osc, offset) in self.oscillators.iter().zip(offsets) {
            backend.cancel_and_hold(osc, ParamKind::Detune)?;
            backend.linear_ramp_to_value_at_time(
                osc,
                ParamKind::Detune,
                base_detune_cents + offset,
                now + glide,
            )?;
        }
        self.base_detune_cents = base_detune_cents;
        self.spread_cents = spread_cents;
        Ok(())
    }

    /// Ramp the mix gain from its current value to `target` by `now + duration`.
    pub fn fade<B: AudioBackend>(
        &self,
        backend: &mut B,
        target: f32,
        now: f64,
        duration: f64,
    ) -> Result<(), GraphError> {
        backend.cancel_and_hold(self.mix, ParamKind::Gain)?;
        backend.linear_ramp_to_value_at_time(self.mix, ParamKind::Gain, target, now + duration)
    }

    /// Disconnect and release every node. Consumes the stack so its handles
    /// cannot be used again.
    ///
    /// Every node is attempted; the first failure is returned.
    pub fn dispose<B: AudioBackend>(self, backend: &mut B) -> Result<(), GraphError> {
        let mut first_err = None;
        for node in self.oscillators.into_iter().chain(std::iter::once(self.mix)) {
            if let Err(err) = backend.disconnect(node).and_then(|()| backend.release_node(node)) {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}
