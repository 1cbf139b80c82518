//! Morph preset listing command.

#![allow(clippy::print_literal)]

use clap::Args;
use polytone_synth::OscMorphMode;
use polytone_synth::morph::FilterStage;

#[derive(Args)]
pub struct MorphsArgs {
    /// Show a single preset
    #[arg(value_name = "MODE")]
    mode: Option<String>,
}

fn describe(stage: &FilterStage) -> String {
    format!(
        "{:<9} {:>6.0} Hz  Q {:.2}  {:+.1} dB",
        stage.filter_type.name(),
        stage.frequency,
        stage.q,
        stage.gain_db
    )
}

fn print_preset(mode: OscMorphMode) {
    let preset = mode.preset();
    println!("{}", mode);
    println!("  pre-gain  {:.2}", preset.pre_gain);
    println!("  filter a  {}", describe(&preset.filter_a));
    println!("  filter b  {}", describe(&preset.filter_b));
}

pub fn run(args: MorphsArgs) -> anyhow::Result<()> {
    if let Some(name) = &args.mode {
        let mode = OscMorphMode::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| anyhow::anyhow!("Unknown morph mode: {}", name))?;
        print_preset(mode);
        return Ok(());
    }

    println!("Oscillator morph presets");
    println!("========================");
    println!();
    let mut mode = OscMorphMode::None;
    loop {
        print_preset(mode);
        println!();
        mode = mode.next();
        if mode == OscMorphMode::None {
            break;
        }
    }
    Ok(())
}
