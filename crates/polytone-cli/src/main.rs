//! Polytone CLI - drive the polytone voice engine from the command line.

mod commands;
mod error;
mod script;
mod settings;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "polytone")]
#[command(author, version, about = "Polytone voice engine CLI", long_about = None)]
struct Cli {
    /// Log voice lifecycle events (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a note script against the offline backend
    Play(commands::play::PlayArgs),

    /// Print an envelope level table
    Envelope(commands::envelope::EnvelopeArgs),

    /// Print an LFO phase and value table
    Lfo(commands::lfo::LfoArgs),

    /// List the oscillator morph presets
    Morphs(commands::morphs::MorphsArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Play(args) => commands::play::run(args),
        Commands::Envelope(args) => commands::envelope::run(args),
        Commands::Lfo(args) => commands::lfo::run(args),
        Commands::Morphs(args) => commands::morphs::run(args),
    }
}
