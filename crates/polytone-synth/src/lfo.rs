//! LFO phase and shape math.
//!
//! An LFO is a user-drawn piecewise-linear shape over one cycle, read at a
//! phase that depends on the [`LfoMode`]:
//!
//! | Mode | Phase | Behaviour |
//! |------|-------|-----------|
//! | `Sync` | `wrap(offset + now * rate)` | free-running, ignores notes |
//! | `Trigger` | `wrap(offset + elapsed * rate)` | restarts at every note-on |
//! | `Envelope` | `clamp(offset + elapsed * rate, 0, 1)` | one shot, freezes at the end |
//!
//! `elapsed` is `now - note_on`, floored at zero.

use polytone_core::{clamp_signed, wrap01};

use crate::patch::LFO_RATE_RANGE;

/// How the LFO phase relates to notes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum LfoMode {
    /// Restart from the phase offset on every note-on
    #[default]
    Trigger,
    /// Run continuously on the backend clock
    Sync,
    /// Run once from note-on and hold the final phase
    Envelope,
}

impl LfoMode {
    /// All modes, in display order.
    pub const ALL: [LfoMode; 3] = [LfoMode::Trigger, LfoMode::Sync, LfoMode::Envelope];

    /// Lower-case name.
    pub fn name(self) -> &'static str {
        match self {
            LfoMode::Trigger => "trigger",
            LfoMode::Sync => "sync",
            LfoMode::Envelope => "envelope",
        }
    }
}

/// One vertex of an LFO shape: `x` is the phase in `[0, 1]`, `y` the value in
/// `[-1, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LfoPoint {
    /// Phase position
    pub x: f32,
    /// Output value
    pub y: f32,
}

impl LfoPoint {
    /// Create a point. No clamping happens until the point list is normalized.
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// The built-in triangle-like shape: 0, up to 1, 0, down to -1, 0.
pub fn default_points() -> Vec<LfoPoint> {
    vec![
        LfoPoint::new(0.0, 0.0),
        LfoPoint::new(0.25, 1.0),
        LfoPoint::new(0.5, 0.0),
        LfoPoint::new(0.75, -1.0),
        LfoPoint::new(1.0, 0.0),
    ]
}

/// Bring an arbitrary point list into canonical form.
///
/// Fewer than two points yields [`default_points`]. Otherwise points are
/// sorted by `x`, the first is pinned to `x = 0` and the last to `x = 1`, `y`
/// is clamped to `[-1, 1]`, and interior points that would not keep `x`
/// strictly increasing are dropped. NaN coordinates collapse to 0.
pub fn normalize_points(points: &[LfoPoint]) -> Vec<LfoPoint> {
    if points.len() < 2 {
        return default_points();
    }

    let mut sorted: Vec<LfoPoint> = points
        .iter()
        .map(|p| LfoPoint::new(unit(p.x), clamp_signed(p.y)))
        .collect();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x));

    let last_index = sorted.len() - 1;
    sorted[0].x = 0.0;
    sorted[last_index].x = 1.0;

    let last = sorted[last_index];
    let mut out = Vec::with_capacity(sorted.len());
    out.push(sorted[0]);
    for point in &sorted[1..last_index] {
        let prev_x = out.last().map_or(0.0, |p: &LfoPoint| p.x);
        if point.x > prev_x && point.x < 1.0 {
            out.push(*point);
        }
    }
    out.push(last);
    out
}

fn unit(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

/// LFO phase at `now` for a note that started at `note_on` (both in seconds).
///
/// The rate is floored at the minimum LFO rate and the offset is wrapped into
/// `[0, 1)`. `Envelope` mode returns exactly `1.0` once the cycle completes;
/// [`sample_shape`] wraps that to 0, so a finished one-shot holds the shape's
/// first point rather than its last.
pub fn phase_at_time(mode: LfoMode, rate_hz: f32, phase_offset: f32, now: f64, note_on: f64) -> f64 {
    let rate = f64::from(rate_hz.max(LFO_RATE_RANGE.0));
    let offset = wrap01(f64::from(phase_offset));

    match mode {
        LfoMode::Sync => wrap01(offset + now * rate),
        LfoMode::Trigger => wrap01(offset + (now - note_on).max(0.0) * rate),
        LfoMode::Envelope => {
            let progressed = offset + (now - note_on).max(0.0) * rate;
            if progressed.is_nan() { 0.0 } else { progressed.clamp(0.0, 1.0) }
        }
    }
}

/// Sample a shape at `phase`, wrapped into `[0, 1)`.
///
/// An empty list reads as 0 and a single point as its `y`. Between points the
/// value is interpolated linearly; the result is always in `[-1, 1]`.
pub fn sample_shape(points: &[LfoPoint], phase: f64) -> f32 {
    match points {
        [] => return 0.0,
        [only] => return clamp_signed(only.y),
        _ => {}
    }

    let phase = wrap01(phase);
    for pair in points.windows(2) {
        let (left, right) = (pair[0], pair[1]);
        let (lx, rx) = (f64::from(left.x), f64::from(right.x));
        if phase < lx || phase > rx {
            continue;
        }
        let span = rx - lx;
        if span <= 1e-6 {
            return clamp_signed(left.y);
        }
        let t = ((phase - lx) / span).clamp(0.0, 1.0);
        let value = f64::from(left.y) + (f64::from(right.y) - f64::from(left.y)) * t;
        return clamp_signed(value as f32);
    }

    points.last().map_or(0.0, |p| clamp_signed(p.y))
}

/// Shape value mapped from `[-1, 1]` to the `[0, 1]` range of a modulation
/// source.
pub fn unipolar_level(points: &[LfoPoint], phase: f64) -> f32 {
    (sample_shape(points, phase) + 1.0) * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_shape_points() {
        let points = default_points();
        assert_eq!(sample_shape(&points, 0.0), 0.0);
        assert_eq!(sample_shape(&points, 0.25), 1.0);
        assert_eq!(sample_shape(&points, 0.5), 0.0);
        assert_eq!(sample_shape(&points, 0.75), -1.0);
        assert!((sample_shape(&points, 0.125) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_sample_wraps_phase() {
        let points = default_points();
        assert!((sample_shape(&points, 1.25) - 1.0).abs() < 1e-6);
        assert!((sample_shape(&points, -0.25) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_shapes() {
        assert_eq!(sample_shape(&[], 0.3), 0.0);
        assert_eq!(sample_shape(&[LfoPoint::new(0.5, 3.0)], 0.3), 1.0);
    }

    #[test]
    fn test_normalize_short_list_resets() {
        assert_eq!(normalize_points(&[]), default_points());
        assert_eq!(normalize_points(&[LfoPoint::new(0.3, 0.2)]), default_points());
    }

    #[test]
    fn test_normalize_sorts_pins_and_clamps() {
        let points = normalize_points(&[
            LfoPoint::new(0.9, 2.0),
            LfoPoint::new(0.5, -0.5),
            LfoPoint::new(0.2, -3.0),
        ]);
        assert_eq!(
            points,
            vec![
                LfoPoint::new(0.0, -1.0),
                LfoPoint::new(0.5, -0.5),
                LfoPoint::new(1.0, 1.0),
            ]
        );
    }

    #[test]
    fn test_normalize_drops_duplicate_x() {
        let points = normalize_points(&[
            LfoPoint::new(0.0, 0.0),
            LfoPoint::new(0.0, 0.5),
            LfoPoint::new(0.4, 0.1),
            LfoPoint::new(0.4, 0.2),
            LfoPoint::new(1.0, 0.0),
        ]);
        let xs: Vec<f32> = points.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![0.0, 0.4, 1.0]);
    }

    #[test]
    fn test_sync_ignores_note_on() {
        let a = phase_at_time(LfoMode::Sync, 2.0, 0.1, 3.3, 0.0);
        let b = phase_at_time(LfoMode::Sync, 2.0, 0.1, 3.3, 3.0);
        assert_eq!(a, b);
        assert!((a - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_trigger_restarts_at_note_on() {
        assert_eq!(phase_at_time(LfoMode::Trigger, 3.0, 0.0, 5.0, 5.0), 0.0);
        let p = phase_at_time(LfoMode::Trigger, 2.0, 0.0, 5.75, 5.0);
        assert!((p - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_envelope_freezes_instead_of_wrapping() {
        let env = phase_at_time(LfoMode::Envelope, 2.0, 0.0, 10.0, 0.0);
        let trig = phase_at_time(LfoMode::Trigger, 2.0, 0.0, 10.25, 0.0);
        assert_eq!(env, 1.0);
        assert!((trig - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_finished_envelope_reads_first_point() {
        let ramp = [LfoPoint::new(0.0, -1.0), LfoPoint::new(1.0, 1.0)];
        let phase = phase_at_time(LfoMode::Envelope, 1.0, 0.0, 5.0, 0.0);
        assert_eq!(sample_shape(&ramp, phase), -1.0);
        assert_eq!(unipolar_level(&ramp, phase), 0.0);
        assert!((sample_shape(&ramp, 0.999) - 0.998).abs() < 1e-4);
    }

    #[test]
    fn test_rate_floor() {
        let p = phase_at_time(LfoMode::Trigger, 0.0, 0.0, 10.0, 0.0);
        assert!((p - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_unipolar_level() {
        let points = default_points();
        assert!((unipolar_level(&points, 0.25) - 1.0).abs() < 1e-6);
        assert!((unipolar_level(&points, 0.75)).abs() < 1e-6);
        assert!((unipolar_level(&points, 0.0) - 0.5).abs() < 1e-6);
    }
}
