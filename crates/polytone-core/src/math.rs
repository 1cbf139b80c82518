//! Small math helpers shared by the backend and the voice engine.
//!
//! - [`clamp01`] / [`clamp_signed`] - Range limiting
//! - [`wrap01`] - Phase wrapping into `[0, 1)`
//! - [`midi_to_hz`] / [`cents_to_ratio`] - Pitch conversions

/// Clamp a value to `[0, 1]`.
///
/// NaN collapses to 0 so a bad input can never leak into automation.
#[inline]
pub fn clamp01(value: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Clamp a value to `[-1, 1]`.
#[inline]
pub fn clamp_signed(value: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(-1.0, 1.0)
}

/// Wrap a phase into `[0, 1)`.
///
/// Negative inputs wrap from the top, so `-0.25` becomes `0.75`.
///
/// # Example
/// ```rust
/// use polytone_core::wrap01;
///
/// assert!((wrap01(1.25) - 0.25).abs() < 1e-12);
/// assert!((wrap01(-0.25) - 0.75).abs() < 1e-12);
/// ```
#[inline]
pub fn wrap01(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let wrapped = value - libm::floor(value);
    // floor() can leave exactly 1.0 for tiny negative inputs
    if wrapped >= 1.0 { 0.0 } else { wrapped }
}

/// Convert a MIDI note number to frequency in Hz.
///
/// Uses standard tuning: A4 (note 69) = 440 Hz.
#[inline]
pub fn midi_to_hz(note: u8) -> f32 {
    440.0 * libm::powf(2.0, (f32::from(note) - 69.0) / 12.0)
}

/// Convert cents to frequency ratio.
///
/// 100 cents = 1 semitone.
#[inline]
pub fn cents_to_ratio(cents: f32) -> f32 {
    libm::powf(2.0, cents / 1200.0)
}
