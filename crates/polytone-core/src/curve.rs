//! Sampled transfer curves for waveshaper nodes.

use std::sync::Arc;

/// Default table size for generated curves.
pub const DEFAULT_CURVE_SIZE: usize = 1024;

/// An immutable sampled transfer function mapping `[-1, 1]` to `[-1, 1]`.
///
/// Cloning is cheap: the table is shared, never copied, so the same curve can
/// be handed to every voice's shaper without allocating per note.
#[derive(Clone, Debug, PartialEq)]
pub struct ShaperCurve {
    table: Arc<[f32]>,
}

impl ShaperCurve {
    /// Build a curve by sampling `f` at `size` evenly spaced inputs in `[-1, 1]`.
    ///
    /// Outputs are clamped to `[-1, 1]`. `size` is raised to at least 2.
    pub fn from_fn(size: usize, f: impl Fn(f32) -> f32) -> Self {
        let size = size.max(2);
        let last = (size - 1) as f32;
        let table: Vec<f32> = (0..size)
            .map(|i| {
                let x = (i as f32 / last) * 2.0 - 1.0;
                f(x).clamp(-1.0, 1.0)
            })
            .collect();
        Self {
            table: table.into(),
        }
    }

    /// The identity curve (`y = x`).
    pub fn identity(size: usize) -> Self {
        Self::from_fn(size, |x| x)
    }

    /// Saturating curve `tanh(drive * (x + skew * x^3))`.
    pub fn saturating(size: usize, drive: f32, skew: f32) -> Self {
        Self::from_fn(size, |x| libm::tanhf(drive * (x + skew * x * x * x)))
    }

    /// Raw table samples.
    pub fn samples(&self) -> &[f32] {
        &self.table
    }

    /// Evaluate the curve at `x` with linear interpolation between table points.
    pub fn apply(&self, x: f32) -> f32 {
        let last = self.table.len() - 1;
        let pos = ((x.clamp(-1.0, 1.0) + 1.0) * 0.5) * last as f32;
        let idx = (pos as usize).min(last);
        if idx == last {
            return self.table[last];
        }
        let frac = pos - idx as f32;
        self.table[idx] + (self.table[idx + 1] - self.table[idx]) * frac
    }
}
