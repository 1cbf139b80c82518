//! LFO table command.

use clap::Args;
use polytone_synth::{LfoMode, Patch, phase_at_time, sample_shape};

use super::common::{CliLfoMode, level_bar, sample_times};
use crate::script::parse_points;

#[derive(Args)]
pub struct LfoArgs {
    /// Phase mode
    #[arg(long, value_enum, default_value = "trigger")]
    mode: CliLfoMode,

    /// Rate in Hz
    #[arg(long, default_value = "1.0")]
    rate: f32,

    /// Phase offset in cycles
    #[arg(long, default_value = "0.0")]
    phase: f32,

    /// Breakpoints as x:y pairs, e.g. "0:0,0.25:1,0.5:0,0.75:-1,1:0"
    #[arg(long)]
    points: Option<String>,

    /// Note-on time in seconds
    #[arg(long, default_value = "0.0")]
    note_on: f64,

    /// Table length in seconds
    #[arg(long, default_value = "2.0")]
    duration: f64,

    /// Time between rows in seconds
    #[arg(long, default_value = "0.05")]
    step: f64,
}

/// One row of the table: time, phase and shape value.
pub fn table(patch: &Patch, note_on: f64, duration: f64, step: f64) -> Vec<(f64, f64, f32)> {
    let lfo = patch.lfo();
    sample_times(0.0, duration, step)
        .into_iter()
        .map(|t| {
            let phase = phase_at_time(lfo.mode, lfo.rate_hz, lfo.phase_offset, t, note_on);
            (t, phase, sample_shape(&lfo.points, phase))
        })
        .collect()
}

pub fn run(args: LfoArgs) -> anyhow::Result<()> {
    let mut patch = Patch::default()
        .with_lfo_mode(args.mode.into())
        .with_lfo_rate_hz(args.rate)
        .with_lfo_phase_offset(args.phase);
    if let Some(text) = &args.points {
        patch = patch.with_lfo_points(&parse_points(text)?);
    }
    let lfo = patch.lfo();

    println!(
        "mode {}  rate {:.2} Hz  offset {:.3}  points {}",
        lfo.mode.name(),
        lfo.rate_hz,
        lfo.phase_offset,
        lfo.points.len()
    );
    if lfo.mode == LfoMode::Envelope {
        println!("one shot: holds the last point after {:.3}s", args.note_on + 1.0 / f64::from(lfo.rate_hz));
    }
    println!();
    println!("  {:>8}  {:>6}  {:>6}", "time", "phase", "value");
    for (t, phase, value) in table(&patch, args.note_on, args.duration, args.step) {
        println!("  {:>8.3}  {:>6.3}  {:>6.3}  {}", t, phase, value, level_bar((value + 1.0) * 0.5, 40));
    }
    Ok(())
}
