//! Envelope table command.

use clap::Args;
use polytone_synth::{Patch, PatchOptions, level_at_elapsed, release_level, time_to_sustain};

use super::common::{level_bar, sample_times};

#[derive(Args)]
pub struct EnvelopeArgs {
    /// Delay before the attack, in seconds
    #[arg(long, default_value = "0.0")]
    delay: f32,

    /// Attack time in seconds
    #[arg(long, default_value = "0.01")]
    attack: f32,

    /// Hold time at peak in seconds
    #[arg(long, default_value = "0.0")]
    hold: f32,

    /// Decay time in seconds
    #[arg(long, default_value = "0.2")]
    decay: f32,

    /// Sustain level (0-1)
    #[arg(long, default_value = "0.8")]
    sustain: f32,

    /// Release time in seconds
    #[arg(long, default_value = "0.15")]
    release: f32,

    /// Gate length in seconds (note-off time)
    #[arg(long, default_value = "0.5")]
    gate: f64,

    /// Time between rows in seconds
    #[arg(long, default_value = "0.02")]
    step: f64,
}

/// One row of the table: time and level.
pub fn table(patch: &Patch, gate: f64, step: f64) -> Vec<(f64, f32)> {
    let env = patch.envelope();
    let gate = gate.max(0.0);
    let held = level_at_elapsed(gate, env);
    let end = gate + f64::from(env.release);

    sample_times(0.0, end, step)
        .into_iter()
        .map(|t| {
            let level = if t < gate {
                level_at_elapsed(t, env)
            } else {
                release_level(t - gate, held, env.release)
            };
            (t, level)
        })
        .collect()
}

pub fn run(args: EnvelopeArgs) -> anyhow::Result<()> {
    let patch = Patch::create(PatchOptions {
        delay: Some(args.delay),
        attack: Some(args.attack),
        hold: Some(args.hold),
        decay: Some(args.decay),
        sustain: Some(args.sustain),
        release: Some(args.release),
        ..PatchOptions::default()
    });
    let env = patch.envelope();

    println!(
        "delay {:.3}s  attack {:.3}s  hold {:.3}s  decay {:.3}s  sustain {:.2}  release {:.3}s",
        env.delay, env.attack, env.hold, env.decay, env.sustain, env.release
    );
    println!("sustain reached at {:.3}s, gate off at {:.3}s", time_to_sustain(env), args.gate);
    println!();
    println!("  {:>8}  {:>6}", "time", "level");
    for (t, level) in table(&patch, args.gate, args.step) {
        println!("  {:>8.3}  {:>6.3}  {}", t, level, level_bar(level, 40));
    }
    Ok(())
}
