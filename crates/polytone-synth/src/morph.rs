//! Per-voice tone-shaping stage.
//!
//! Every voice routes its unison mix through a fixed chain:
//!
//! ```text
//! input (gain) -> pre-gain -> waveshaper -> filter A -> filter B -> (amp)
//! ```
//!
//! An [`OscMorphMode`] selects one of seven presets for the pre-gain, shaper
//! curve and both filter stages. `None` is a transparent pass-through (identity
//! curve, two allpass stages).

use std::sync::LazyLock;

use polytone_core::{
    AudioBackend, DEFAULT_CURVE_SIZE, FilterType, GraphError, NodeId, NodeKind, ParamKind,
    ShaperCurve,
};

static IDENTITY: LazyLock<ShaperCurve> = LazyLock::new(|| ShaperCurve::identity(DEFAULT_CURVE_SIZE));
static HARMONIC_STRETCH: LazyLock<ShaperCurve> =
    LazyLock::new(|| ShaperCurve::saturating(DEFAULT_CURVE_SIZE, 1.8, 0.2));
static INHARMONIC_STRETCH: LazyLock<ShaperCurve> =
    LazyLock::new(|| ShaperCurve::saturating(DEFAULT_CURVE_SIZE, 2.8, 0.45));
static SMEAR: LazyLock<ShaperCurve> =
    LazyLock::new(|| ShaperCurve::saturating(DEFAULT_CURVE_SIZE, 1.25, 0.05));

/// Tone-shaping preset of the morph stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum OscMorphMode {
    /// Transparent
    #[default]
    None,
    /// Two cascaded lowpasses
    LowPass,
    /// Two cascaded highpasses
    HighPass,
    /// Mild saturation with a bright shelf
    HarmonicStretch,
    /// Vowel-like bandpass and peak
    FormantScale,
    /// Heavy saturation, thinned lows, harsh peak
    InharmonicStretch,
    /// Soft saturation into dark lowpasses
    Smear,
}

impl OscMorphMode {
    /// All presets in cycling order.
    pub const ALL: [OscMorphMode; 7] = [
        OscMorphMode::None,
        OscMorphMode::LowPass,
        OscMorphMode::HighPass,
        OscMorphMode::HarmonicStretch,
        OscMorphMode::FormantScale,
        OscMorphMode::InharmonicStretch,
        OscMorphMode::Smear,
    ];

    /// Kebab-case name.
    pub fn name(self) -> &'static str {
        match self {
            OscMorphMode::None => "none",
            OscMorphMode::LowPass => "low-pass",
            OscMorphMode::HighPass => "high-pass",
            OscMorphMode::HarmonicStretch => "harmonic-stretch",
            OscMorphMode::FormantScale => "formant-scale",
            OscMorphMode::InharmonicStretch => "inharmonic-stretch",
            OscMorphMode::Smear => "smear",
        }
    }

    /// Next preset, wrapping around.
    pub fn next(self) -> Self {
        let i = self.index();
        Self::ALL[(i + 1) % Self::ALL.len()]
    }

    /// Previous preset, wrapping around.
    pub fn prev(self) -> Self {
        let i = self.index();
        Self::ALL[(i + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    fn index(self) -> usize {
        Self::ALL.iter().position(|&m| m == self).unwrap_or(0)
    }

    /// Concrete settings of this preset.
    pub fn preset(self) -> MorphPreset {
        const fn stage(filter_type: FilterType, frequency: f32, q: f32, gain_db: f32) -> FilterStage {
            FilterStage {
                filter_type,
                frequency,
                q,
                gain_db,
            }
        }
        use FilterType::{Allpass, Bandpass, Highpass, Highshelf, Lowpass, Peaking};

        match self {
            OscMorphMode::None => MorphPreset {
                pre_gain: 1.0,
                curve: &IDENTITY,
                filter_a: stage(Allpass, 1200.0, 0.7, 0.0),
                filter_b: stage(Allpass, 2400.0, 0.7, 0.0),
            },
            OscMorphMode::LowPass => MorphPreset {
                pre_gain: 1.0,
                curve: &IDENTITY,
                filter_a: stage(Lowpass, 1800.0, 0.9, 0.0),
                filter_b: stage(Lowpass, 5200.0, 0.6, 0.0),
            },
            OscMorphMode::HighPass => MorphPreset {
                pre_gain: 1.0,
                curve: &IDENTITY,
                filter_a: stage(Highpass, 420.0, 0.8, 0.0),
                filter_b: stage(Highpass, 980.0, 0.7, 0.0),
            },
            OscMorphMode::HarmonicStretch => MorphPreset {
                pre_gain: 1.15,
                curve: &HARMONIC_STRETCH,
                filter_a: stage(Highshelf, 2400.0, 0.7, 6.0),
                filter_b: stage(Peaking, 3200.0, 1.1, 2.5),
            },
            OscMorphMode::FormantScale => MorphPreset {
                pre_gain: 1.0,
                curve: &IDENTITY,
                filter_a: stage(Bandpass, 850.0, 2.8, 0.0),
                filter_b: stage(Peaking, 2200.0, 1.8, 5.5),
            },
            OscMorphMode::InharmonicStretch => MorphPreset {
                pre_gain: 1.28,
                curve: &INHARMONIC_STRETCH,
                filter_a: stage(Highpass, 260.0, 0.9, 0.0),
                filter_b: stage(Peaking, 3800.0, 1.6, 7.0),
            },
            OscMorphMode::Smear => MorphPreset {
                pre_gain: 1.0,
                curve: &SMEAR,
                filter_a: stage(Lowpass, 1400.0, 0.5, 0.0),
                filter_b: stage(Lowpass, 2800.0, 0.5, 0.0),
            },
        }
    }
}

impl std::fmt::Display for OscMorphMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Settings of one biquad stage.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FilterStage {
    /// Response type
    pub filter_type: FilterType,
    /// Cutoff or center frequency in Hz
    pub frequency: f32,
    /// Quality factor
    pub q: f32,
    /// Shelf/peak gain in dB (ignored by pass types)
    pub gain_db: f32,
}

/// Settings of the whole morph chain for one mode.
#[derive(Clone, Copy, Debug)]
pub struct MorphPreset {
    /// Linear gain into the shaper
    pub pre_gain: f32,
    /// Shaper transfer curve (shared between voices)
    pub curve: &'static ShaperCurve,
    /// First filter stage
    pub filter_a: FilterStage,
    /// Second filter stage
    pub filter_b: FilterStage,
}

/// Node handles of one voice's morph chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MorphChain {
    input: NodeId,
    pre_gain: NodeId,
    shaper: NodeId,
    filter_a: NodeId,
    filter_b: NodeId,
}

impl MorphChain {
    /// Create and wire the chain, configured for `mode` at `now`.
    pub fn build<B: AudioBackend>(
        backend: &mut B,
        mode: OscMorphMode,
        now: f64,
    ) -> Result<Self, GraphError> {
        let chain = Self {
            input: backend.create_node(NodeKind::Gain),
            pre_gain: backend.create_node(NodeKind::Gain),
            shaper: backend.create_node(NodeKind::WaveShaper),
            filter_a: backend.create_node(NodeKind::Filter),
            filter_b: backend.create_node(NodeKind::Filter),
        };
        let wired = chain
            .nodes()
            .windows(2)
            .try_for_each(|pair| backend.connect(pair[0], pair[1]))
            .and_then(|()| chain.apply(backend, mode, now));
        match wired {
            Ok(()) => Ok(chain),
            Err(err) => {
                chain.dispose(backend).ok();
                Err(err)
            }
        }
    }

    /// Disconnect and release every node of the chain.
    ///
    /// Every node is attempted; the first failure is returned.
    pub fn dispose<B: AudioBackend>(self, backend: &mut B) -> Result<(), GraphError> {
        let mut first_err = None;
        for node in self.nodes() {
            if let Err(err) = backend.disconnect(node).and_then(|()| backend.release_node(node)) {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Where the unison mix connects.
    pub fn input(&self) -> NodeId {
        self.input
    }

    /// Last stage; connects to the voice amp.
    pub fn output(&self) -> NodeId {
        self.filter_b
    }

    /// Every node of the chain, input first.
    pub fn nodes(&self) -> [NodeId; 5] {
        [self.input, self.pre_gain, self.shaper, self.filter_a, self.filter_b]
    }

    /// Switch the chain to `mode`, effective at `now`.
    ///
    /// Changes scheduled from `now` on are replaced, so repeated switches do
    /// not pile up automation.
    pub fn apply<B: AudioBackend>(
        &self,
        backend: &mut B,
        mode: OscMorphMode,
        now: f64,
    ) -> Result<(), GraphError> {
        let preset = mode.preset();
        set_at(backend, self.pre_gain, ParamKind::Gain, preset.pre_gain, now)?;
        backend.set_curve(self.shaper, preset.curve.clone())?;
        configure_stage(backend, self.filter_a, &preset.filter_a, now)?;
        configure_stage(backend, self.filter_b, &preset.filter_b, now)
    }
}

fn configure_stage<B: AudioBackend>(
    backend: &mut B,
    node: NodeId,
    stage: &FilterStage,
    now: f64,
) -> Result<(), GraphError> {
    backend.set_filter_type(node, stage.filter_type)?;
    set_at(backend, node, ParamKind::Frequency, stage.frequency, now)?;
    set_at(backend, node, ParamKind::Q, stage.q, now)?;
    set_at(backend, node, ParamKind::Gain, stage.gain_db, now)
}

fn set_at<B: AudioBackend>(
    backend: &mut B,
    node: NodeId,
    param: ParamKind,
    value: f32,
    now: f64,
) -> Result<(), GraphError> {
    backend.cancel_scheduled_values(node, param, now)?;
    backend.set_value_at_time(node, param, value, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polytone_core::OfflineBackend;

    #[test]
    fn test_next_prev_cycle() {
        let mut mode = OscMorphMode::None;
        for _ in 0..OscMorphMode::ALL.len() {
            mode = mode.next();
        }
        assert_eq!(mode, OscMorphMode::None);
        assert_eq!(OscMorphMode::None.prev(), OscMorphMode::Smear);
        assert_eq!(OscMorphMode::Smear.next(), OscMorphMode::None);
        assert_eq!(OscMorphMode::LowPass.prev(), OscMorphMode::None);
    }

    #[test]
    fn test_names_are_unique() {
        let mut names: Vec<_> = OscMorphMode::ALL.iter().map(|m| m.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), OscMorphMode::ALL.len());
    }

    #[test]
    fn test_none_is_transparent() {
        let preset = OscMorphMode::None.preset();
        assert_eq!(preset.pre_gain, 1.0);
        assert_eq!(preset.filter_a.filter_type, FilterType::Allpass);
        assert_eq!(preset.filter_b.filter_type, FilterType::Allpass);
        assert!((preset.curve.apply(0.42) - 0.42).abs() < 1e-3);
    }

    #[test]
    fn test_build_wires_chain() {
        let mut backend = OfflineBackend::new();
        let chain = MorphChain::build(&mut backend, OscMorphMode::FormantScale, 0.0).unwrap();
        let nodes = chain.nodes();
        for pair in nodes.windows(2) {
            assert_eq!(backend.outputs_of(pair[0]).unwrap(), &[pair[1]]);
        }
        assert_eq!(chain.output(), nodes[4]);
        assert_eq!(backend.filter_type_of(nodes[3]).unwrap(), FilterType::Bandpass);
        assert!((backend.param_value_at(nodes[3], ParamKind::Q, 0.0).unwrap() - 2.8).abs() < 1e-6);
        assert_eq!(backend.filter_type_of(nodes[4]).unwrap(), FilterType::Peaking);
    }

    #[test]
    fn test_apply_switches_preset() {
        let mut backend = OfflineBackend::new();
        let chain = MorphChain::build(&mut backend, OscMorphMode::None, 0.0).unwrap();
        backend.advance_to(0.5).unwrap();
        chain.apply(&mut backend, OscMorphMode::InharmonicStretch, 0.5).unwrap();

        let [_, pre_gain, shaper, filter_a, filter_b] = chain.nodes();
        assert!((backend.param_value_at(pre_gain, ParamKind::Gain, 0.5).unwrap() - 1.28).abs() < 1e-6);
        assert_eq!(backend.param_value_at(pre_gain, ParamKind::Gain, 0.1).unwrap(), 1.0);
        assert_eq!(backend.curve_of(shaper).unwrap(), Some(&*INHARMONIC_STRETCH));
        assert_eq!(backend.filter_type_of(filter_a).unwrap(), FilterType::Highpass);
        assert!(
            (backend.param_value_at(filter_b, ParamKind::Gain, 0.6).unwrap() - 7.0).abs() < 1e-6
        );
    }

    #[test]
    fn test_repeated_switches_do_not_grow_automation() {
        let mut backend = OfflineBackend::new();
        let chain = MorphChain::build(&mut backend, OscMorphMode::None, 0.0).unwrap();
        let [_, pre_gain, _, filter_a, _] = chain.nodes();
        let initial = backend.automation(filter_a, ParamKind::Frequency).unwrap().len();

        backend.advance_to(0.5).unwrap();
        for mode in [OscMorphMode::LowPass, OscMorphMode::Smear, OscMorphMode::HighPass] {
            chain.apply(&mut backend, mode, 0.5).unwrap();
        }
        assert_eq!(
            backend.automation(filter_a, ParamKind::Frequency).unwrap().len(),
            initial + 1
        );
        assert_eq!(backend.automation(pre_gain, ParamKind::Gain).unwrap().len(), 2);
        let expected = OscMorphMode::HighPass.preset();
        assert_eq!(
            backend.param_value_at(filter_a, ParamKind::Frequency, 0.5).unwrap(),
            expected.filter_a.frequency
        );
        assert_eq!(backend.param_value_at(pre_gain, ParamKind::Gain, 0.1).unwrap(), 1.0);
    }

    #[test]
    fn test_dispose_releases_chain() {
        let mut backend = OfflineBackend::new();
        let before = backend.live_node_count();
        let chain = MorphChain::build(&mut backend, OscMorphMode::Smear, 0.0).unwrap();
        assert_eq!(backend.live_node_count(), before + 5);
        chain.dispose(&mut backend).unwrap();
        assert_eq!(backend.live_node_count(), before);
    }
}
