//! Modulation matrix for routing envelope and LFO to voice parameters.
//!
//! Every modulated parameter funnels through one formula, [`resolve`]:
//!
//! ```text
//! signal   = bipolar ? raw * 2 - 1 : raw          (raw in [0, 1])
//! sum      = clamp(Σ signal * clamp(amount, -1, 1), -1, 1)
//! value    = clamp(base + sum * depth, min, max), rounded if the target quantizes
//! ```
//!
//! Contributions are summed, never applied one after another, so the result
//! does not depend on route order.

use polytone_core::{clamp_signed, clamp01};

/// Modulation source identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ModSource {
    /// Amplitude envelope level (0 to 1)
    Env1,
    /// LFO level mapped to 0 to 1
    Lfo1,
}

impl ModSource {
    /// All sources.
    pub const ALL: [ModSource; 2] = [ModSource::Env1, ModSource::Lfo1];

    /// Short name used in logs and the CLI.
    pub fn name(self) -> &'static str {
        match self {
            ModSource::Env1 => "env1",
            ModSource::Lfo1 => "lfo1",
        }
    }
}

/// Modulation target identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ModTarget {
    /// Number of unison oscillators
    UnisonVoices,
    /// Unison spread in cents
    UnisonDetuneCents,
}

impl ModTarget {
    /// All targets.
    pub const ALL: [ModTarget; 2] = [ModTarget::UnisonVoices, ModTarget::UnisonDetuneCents];

    /// Short name used in logs and the CLI.
    pub fn name(self) -> &'static str {
        match self {
            ModTarget::UnisonVoices => "osc.unison-voices",
            ModTarget::UnisonDetuneCents => "osc.unison-detune-cents",
        }
    }

    /// Static range and scaling of this target.
    pub fn descriptor(self) -> TargetDescriptor {
        match self {
            ModTarget::UnisonVoices => TargetDescriptor {
                min: 1.0,
                max: 16.0,
                depth: 8.0,
                quantize: Quantize::Round,
            },
            ModTarget::UnisonDetuneCents => TargetDescriptor {
                min: 0.0,
                max: 100.0,
                depth: 50.0,
                quantize: Quantize::None,
            },
        }
    }
}

/// Rounding rule applied after clamping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quantize {
    /// Continuous value
    None,
    /// Round to the nearest integer
    Round,
}

/// Range and scaling of a modulation target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetDescriptor {
    /// Lowest resolved value
    pub min: f32,
    /// Highest resolved value
    pub max: f32,
    /// Change produced by a full-scale contribution of 1.0
    pub depth: f32,
    /// Rounding rule
    pub quantize: Quantize,
}

impl TargetDescriptor {
    /// Map a normalized contribution in `[-1, 1]` onto this target.
    pub fn apply(&self, base: f32, contribution: f32) -> f32 {
        let value = (base + contribution * self.depth).clamp(self.min, self.max);
        match self.quantize {
            Quantize::None => value,
            Quantize::Round => value.round(),
        }
    }
}

/// A single modulation route.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModRoute {
    /// Source of modulation
    pub source: ModSource,
    /// Destination parameter
    pub target: ModTarget,
    /// Modulation amount (-1.0 to 1.0, negative inverts)
    pub amount: f32,
    /// Whether the source is recentred to -1..1 before scaling
    pub bipolar: bool,
    /// Disabled routes are stored but contribute nothing
    pub enabled: bool,
}

impl ModRoute {
    /// Create an enabled unipolar route (source stays 0 to 1).
    pub fn new(source: ModSource, target: ModTarget, amount: f32) -> Self {
        Self {
            source,
            target,
            amount: clamp_signed(amount),
            bipolar: false,
            enabled: true,
        }
    }

    /// Create an enabled bipolar route (source recentred to -1 to 1).
    pub fn bipolar(source: ModSource, target: ModTarget, amount: f32) -> Self {
        Self {
            bipolar: true,
            ..Self::new(source, target, amount)
        }
    }

    /// Same route, enabled or disabled.
    pub fn with_enabled(self, enabled: bool) -> Self {
        Self { enabled, ..self }
    }

    /// Signed contribution of this route for the given source values.
    fn signal(&self, sources: &ModSourceValues) -> f32 {
        let raw = sources.get(self.source);
        let shaped = if self.bipolar { raw * 2.0 - 1.0 } else { raw };
        shaped * clamp_signed(self.amount)
    }
}

/// Current modulation source values, each in `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ModSourceValues {
    /// Envelope level
    pub env1: f32,
    /// LFO level
    pub lfo1: f32,
}

impl ModSourceValues {
    /// Create source values; both are clamped to `[0, 1]`.
    pub fn new(env1: f32, lfo1: f32) -> Self {
        Self {
            env1: clamp01(env1),
            lfo1: clamp01(lfo1),
        }
    }

    /// Value of a source, clamped to `[0, 1]`.
    pub fn get(&self, source: ModSource) -> f32 {
        match source {
            ModSource::Env1 => clamp01(self.env1),
            ModSource::Lfo1 => clamp01(self.lfo1),
        }
    }
}

/// Summed, clamped contribution of every enabled route aimed at `target`.
///
/// Signals are summed in sorted order so the result is bit-identical for
/// any ordering of `routes`.
pub fn contribution(routes: &[ModRoute], target: ModTarget, sources: &ModSourceValues) -> f32 {
    let mut signals: Vec<f32> = routes
        .iter()
        .filter(|r| r.enabled && r.target == target)
        .map(|r| r.signal(sources))
        .collect();
    signals.sort_unstable_by(f32::total_cmp);
    let sum: f64 = signals.iter().copied().map(f64::from).sum();
    clamp_signed(sum as f32)
}

/// Modulated value of `target` given its unmodulated `base`.
///
/// # Example
///
/// ```rust
/// use polytone_synth::{ModRoute, ModSource, ModSourceValues, ModTarget, resolve};
///
/// let routes = [ModRoute::new(ModSource::Env1, ModTarget::UnisonVoices, 1.0)];
///
/// let open = ModSourceValues::new(1.0, 0.0);
/// assert_eq!(resolve(&routes, ModTarget::UnisonVoices, 4.0, &open), 12.0);
///
/// let closed = ModSourceValues::new(0.0, 0.0);
/// assert_eq!(resolve(&routes, ModTarget::UnisonVoices, 4.0, &closed), 4.0);
/// ```
pub fn resolve(routes: &[ModRoute], target: ModTarget, base: f32, sources: &ModSourceValues) -> f32 {
    target
        .descriptor()
        .apply(base, contribution(routes, target, sources))
}

/// Route list with normalized amounts.
///
/// # Example
///
/// ```rust
/// use polytone_synth::{ModMatrix, ModRoute, ModSource, ModTarget};
///
/// let mut matrix = ModMatrix::new();
/// matrix.set_routes(&[ModRoute::new(ModSource::Lfo1, ModTarget::UnisonDetuneCents, 0.5)]);
/// assert_eq!(matrix.len(), 1);
/// assert!(matrix.targets(ModTarget::UnisonDetuneCents));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModMatrix {
    routes: Vec<ModRoute>,
}

impl ModMatrix {
    /// Create an empty matrix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a matrix holding `routes`.
    pub fn with_routes(routes: &[ModRoute]) -> Self {
        let mut matrix = Self::new();
        matrix.set_routes(routes);
        matrix
    }

    /// Replace every route. Amounts are clamped to `[-1, 1]`.
    pub fn set_routes(&mut self, routes: &[ModRoute]) {
        self.routes = routes
            .iter()
            .map(|r| ModRoute {
                amount: clamp_signed(r.amount),
                ..*r
            })
            .collect();
    }

    /// Current routes.
    pub fn routes(&self) -> &[ModRoute] {
        &self.routes
    }

    /// Number of routes, enabled or not.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether there are no routes.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Whether any enabled route aims at `target`.
    pub fn targets(&self, target: ModTarget) -> bool {
        self.routes.iter().any(|r| r.enabled && r.target == target)
    }

    /// Resolve `target` against this matrix's routes.
    pub fn resolve(&self, target: ModTarget, base: f32, sources: &ModSourceValues) -> f32 {
        resolve(&self.routes, target, base, sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_creation() {
        let route = ModRoute::new(ModSource::Lfo1, ModTarget::UnisonDetuneCents, 0.5);
        assert_eq!(route.source, ModSource::Lfo1);
        assert_eq!(route.target, ModTarget::UnisonDetuneCents);
        assert!((route.amount - 0.5).abs() < 0.001);
        assert!(!route.bipolar);
        assert!(route.enabled);

        let route = ModRoute::bipolar(ModSource::Env1, ModTarget::UnisonVoices, 3.0);
        assert!(route.bipolar);
        assert_eq!(route.amount, 1.0);
    }

    #[test]
    fn test_unison_voices_scenario() {
        let routes = [ModRoute::new(ModSource::Env1, ModTarget::UnisonVoices, 1.0)];
        let full = ModSourceValues::new(1.0, 0.0);
        let none = ModSourceValues::new(0.0, 0.0);
        assert_eq!(resolve(&routes, ModTarget::UnisonVoices, 4.0, &full), 12.0);
        assert_eq!(resolve(&routes, ModTarget::UnisonVoices, 4.0, &none), 4.0);
    }

    #[test]
    fn test_bipolar_recentres() {
        let routes = [ModRoute::bipolar(ModSource::Lfo1, ModTarget::UnisonDetuneCents, 1.0)];
        let low = ModSourceValues::new(0.0, 0.0);
        let mid = ModSourceValues::new(0.0, 0.5);
        let high = ModSourceValues::new(0.0, 1.0);
        assert_eq!(resolve(&routes, ModTarget::UnisonDetuneCents, 50.0, &low), 0.0);
        assert_eq!(resolve(&routes, ModTarget::UnisonDetuneCents, 50.0, &mid), 50.0);
        assert_eq!(resolve(&routes, ModTarget::UnisonDetuneCents, 50.0, &high), 100.0);
    }

    #[test]
    fn test_sum_is_clamped_before_depth() {
        let routes = [
            ModRoute::new(ModSource::Env1, ModTarget::UnisonDetuneCents, 1.0),
            ModRoute::new(ModSource::Lfo1, ModTarget::UnisonDetuneCents, 1.0),
        ];
        let sources = ModSourceValues::new(1.0, 1.0);
        // 1 + 1 clamps to 1, so depth 50 adds 50, not 100.
        assert_eq!(resolve(&routes, ModTarget::UnisonDetuneCents, 10.0, &sources), 60.0);
    }

    #[test]
    fn test_route_order_is_bit_exact() {
        let target = ModTarget::UnisonDetuneCents;
        let routes = [
            ModRoute::new(ModSource::Env1, target, 0.13),
            ModRoute::bipolar(ModSource::Lfo1, target, -0.27),
            ModRoute::new(ModSource::Lfo1, target, 0.31),
            ModRoute::bipolar(ModSource::Env1, target, 0.19),
            ModRoute::new(ModSource::Env1, target, -0.07),
            ModRoute::bipolar(ModSource::Lfo1, target, 0.43),
            ModRoute::new(ModSource::Lfo1, target, -0.11),
            ModRoute::bipolar(ModSource::Env1, target, 0.05),
        ];
        let sources = ModSourceValues::new(0.37, 0.91);
        let expected = resolve(&routes, target, 33.3, &sources).to_bits();
        for shift in 1..routes.len() {
            let mut rotated = routes;
            rotated.rotate_left(shift);
            assert_eq!(resolve(&rotated, target, 33.3, &sources).to_bits(), expected);
            rotated.reverse();
            assert_eq!(resolve(&rotated, target, 33.3, &sources).to_bits(), expected);
        }
    }

    #[test]
    fn test_disabled_and_foreign_routes_ignored() {
        let routes = [
            ModRoute::new(ModSource::Env1, ModTarget::UnisonVoices, 1.0).with_enabled(false),
            ModRoute::new(ModSource::Env1, ModTarget::UnisonDetuneCents, 1.0),
        ];
        let sources = ModSourceValues::new(1.0, 1.0);
        assert_eq!(resolve(&routes, ModTarget::UnisonVoices, 3.0, &sources), 3.0);
    }

    #[test]
    fn test_out_of_range_amount_is_clamped() {
        let mut route = ModRoute::new(ModSource::Env1, ModTarget::UnisonDetuneCents, 1.0);
        route.amount = -7.0;
        let sources = ModSourceValues::new(1.0, 0.0);
        assert_eq!(resolve(&[route], ModTarget::UnisonDetuneCents, 80.0, &sources), 30.0);
    }

    #[test]
    fn test_quantized_target_rounds() {
        let routes = [ModRoute::new(ModSource::Lfo1, ModTarget::UnisonVoices, 0.3)];
        let sources = ModSourceValues::new(0.0, 1.0);
        // 2 + 0.3 * 8 = 4.4
        assert_eq!(resolve(&routes, ModTarget::UnisonVoices, 2.0, &sources), 4.0);
    }

    #[test]
    fn test_matrix_normalizes_amounts() {
        let mut route = ModRoute::new(ModSource::Env1, ModTarget::UnisonVoices, 0.0);
        route.amount = 4.0;
        let matrix = ModMatrix::with_routes(&[route]);
        assert_eq!(matrix.routes()[0].amount, 1.0);
        assert!(matrix.targets(ModTarget::UnisonVoices));
        assert!(!matrix.targets(ModTarget::UnisonDetuneCents));
    }

    #[test]
    fn test_source_values_clamped() {
        let sources = ModSourceValues { env1: 3.0, lfo1: -2.0 };
        assert_eq!(sources.get(ModSource::Env1), 1.0);
        assert_eq!(sources.get(ModSource::Lfo1), 0.0);
    }
}
