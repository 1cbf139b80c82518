//! Shared CLI helpers used across multiple commands.

use clap::ValueEnum;
use polytone_synth::{LfoMode, OscMorphMode, Waveform};

/// Waveform choices for the command line.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum CliWaveform {
    Sine,
    Square,
    #[default]
    Sawtooth,
    Triangle,
}

impl From<CliWaveform> for Waveform {
    fn from(w: CliWaveform) -> Self {
        match w {
            CliWaveform::Sine => Waveform::Sine,
            CliWaveform::Square => Waveform::Square,
            CliWaveform::Sawtooth => Waveform::Sawtooth,
            CliWaveform::Triangle => Waveform::Triangle,
        }
    }
}

/// Morph preset choices for the command line.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum CliMorph {
    #[default]
    None,
    LowPass,
    HighPass,
    HarmonicStretch,
    FormantScale,
    InharmonicStretch,
    Smear,
}

impl From<CliMorph> for OscMorphMode {
    fn from(m: CliMorph) -> Self {
        match m {
            CliMorph::None => OscMorphMode::None,
            CliMorph::LowPass => OscMorphMode::LowPass,
            CliMorph::HighPass => OscMorphMode::HighPass,
            CliMorph::HarmonicStretch => OscMorphMode::HarmonicStretch,
            CliMorph::FormantScale => OscMorphMode::FormantScale,
            CliMorph::InharmonicStretch => OscMorphMode::InharmonicStretch,
            CliMorph::Smear => OscMorphMode::Smear,
        }
    }
}

/// LFO mode choices for the command line.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum CliLfoMode {
    #[default]
    Trigger,
    Sync,
    Envelope,
}

impl From<CliLfoMode> for LfoMode {
    fn from(m: CliLfoMode) -> Self {
        match m {
            CliLfoMode::Trigger => LfoMode::Trigger,
            CliLfoMode::Sync => LfoMode::Sync,
            CliLfoMode::Envelope => LfoMode::Envelope,
        }
    }
}

/// Sample times `start, start + step, ...` up to and including `end`.
pub fn sample_times(start: f64, end: f64, step: f64) -> Vec<f64> {
    let step = step.max(1e-4);
    let count = ((end - start) / step + 1e-9).floor().max(0.0) as usize;
    (0..=count).map(|i| start + i as f64 * step).collect()
}

/// A bar of `width` cells filled in proportion to `level` in `[0, 1]`.
pub fn level_bar(level: f32, width: usize) -> String {
    let filled = (level.clamp(0.0, 1.0) * width as f32).round() as usize;
    format!("{}{}", "#".repeat(filled), ".".repeat(width - filled))
}
