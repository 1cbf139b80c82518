//! Node and parameter identifiers for the backend audio graph.
//!
//! The engine never holds a backend node directly. It holds a [`NodeId`],
//! an opaque handle that only means something to the backend that issued it.

use core::fmt;

/// Unique identifier for a node in a backend graph.
///
/// Node IDs are assigned sequentially and never reused within a backend
/// instance, so a stale handle can be detected instead of aliasing a newer
/// node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// The role of a node in the backend graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Periodic source. Must be started and stopped; emits an ended event.
    Oscillator,
    /// Scales its input by the `Gain` parameter.
    Gain,
    /// Second-order IIR filter (biquad).
    Filter,
    /// Memoryless nonlinearity driven by a [`ShaperCurve`](crate::ShaperCurve).
    WaveShaper,
    /// Hardware output. Exactly one per backend.
    Destination,
}

impl NodeKind {
    /// Parameters exposed by this node kind, with their initial values.
    pub fn params(self) -> &'static [(ParamKind, f32)] {
        match self {
            Self::Oscillator => &[(ParamKind::Frequency, 440.0), (ParamKind::Detune, 0.0)],
            Self::Gain => &[(ParamKind::Gain, 1.0)],
            Self::Filter => &[
                (ParamKind::Frequency, 350.0),
                (ParamKind::Q, 1.0),
                (ParamKind::Gain, 0.0),
            ],
            Self::WaveShaper | Self::Destination => &[],
        }
    }

    /// Returns `true` if this kind exposes `param`.
    pub fn has_param(self, param: ParamKind) -> bool {
        self.params().iter().any(|(p, _)| *p == param)
    }
}

/// A continuously automatable parameter on a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Frequency in Hz (oscillator pitch, filter center/cutoff)
    Frequency,
    /// Detune in cents (oscillators)
    Detune,
    /// Linear gain (gain nodes) or dB gain (shelf/peaking filters)
    Gain,
    /// Filter quality factor
    Q,
}

/// Oscillator waveform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Waveform {
    /// Pure sine
    Sine,
    /// 50% duty square
    Square,
    /// Rising sawtooth
    #[default]
    Sawtooth,
    /// Triangle
    Triangle,
}

impl Waveform {
    /// All waveforms in display order.
    pub const ALL: [Self; 4] = [Self::Sine, Self::Square, Self::Sawtooth, Self::Triangle];

    /// Lowercase display name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Sine => "sine",
            Self::Square => "square",
            Self::Sawtooth => "sawtooth",
            Self::Triangle => "triangle",
        }
    }
}

/// Biquad filter response type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FilterType {
    /// Second-order lowpass
    #[default]
    Lowpass,
    /// Second-order highpass
    Highpass,
    /// Constant-skirt bandpass
    Bandpass,
    /// Allpass (phase only)
    Allpass,
    /// Peaking EQ bell
    Peaking,
    /// High shelf
    Highshelf,
}

impl FilterType {
    /// Lowercase display name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Lowpass => "lowpass",
            Self::Highpass => "highpass",
            Self::Bandpass => "bandpass",
            Self::Allpass => "allpass",
            Self::Peaking => "peaking",
            Self::Highshelf => "highshelf",
        }
    }
}
