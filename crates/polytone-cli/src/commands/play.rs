//! Note script playback against the offline backend.

use clap::Args;
use polytone_core::{AudioBackend, OfflineBackend};
use polytone_synth::{EngineConfig, ModRoute, Patch, PatchOptions, PolySynth};
use std::path::PathBuf;
use tracing::info;

use super::common::{CliLfoMode, CliMorph, CliWaveform};
use crate::script::{ScriptEvent, ScriptNote, parse_points, parse_route, parse_script, timeline};
use crate::settings::Settings;

#[derive(Args)]
pub struct PlayArgs {
    /// Notes as pitch:start-end[@velocity], comma-separated (e.g. "60:0-0.5,64:0.1-0.6@0.8")
    #[arg(value_name = "NOTES")]
    notes: String,

    /// Engine settings file (TOML with [engine] and [[routes]])
    #[arg(long)]
    config: Option<PathBuf>,

    /// Modulation route, e.g. "env1>osc.unison-voices:1.0" (repeatable)
    #[arg(long = "route")]
    routes: Vec<String>,

    /// Oscillator waveform
    #[arg(long, value_enum, default_value = "sawtooth")]
    wave: CliWaveform,

    /// Oscillator detune in cents
    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    detune: f32,

    /// Unison oscillators per voice
    #[arg(long, default_value = "1")]
    unison: usize,

    /// Unison spread in cents
    #[arg(long, default_value = "0.0")]
    unison_detune: f32,

    /// Morph preset
    #[arg(long, value_enum, default_value = "none")]
    morph: CliMorph,

    /// Envelope delay in seconds
    #[arg(long, default_value = "0.0")]
    delay: f32,

    /// Envelope attack in seconds
    #[arg(long, default_value = "0.01")]
    attack: f32,

    /// Envelope hold in seconds
    #[arg(long, default_value = "0.0")]
    hold: f32,

    /// Envelope decay in seconds
    #[arg(long, default_value = "0.2")]
    decay: f32,

    /// Envelope sustain level (0-1)
    #[arg(long, default_value = "0.8")]
    sustain: f32,

    /// Envelope release in seconds
    #[arg(long, default_value = "0.15")]
    release: f32,

    /// LFO phase mode
    #[arg(long, value_enum, default_value = "trigger")]
    lfo_mode: CliLfoMode,

    /// LFO rate in Hz
    #[arg(long, default_value = "1.0")]
    lfo_rate: f32,

    /// LFO phase offset in cycles
    #[arg(long, default_value = "0.0")]
    lfo_phase: f32,

    /// LFO breakpoints as x:y pairs
    #[arg(long)]
    lfo_points: Option<String>,

    /// Polyphony limit
    #[arg(long, default_value = "8")]
    max_voices: usize,

    /// Master output gain (0-1)
    #[arg(long, default_value = "0.2")]
    master_gain: f32,

    /// Longest clock step in seconds
    #[arg(long, default_value = "0.005")]
    step: f64,

    /// Time to keep running after the last note-off, in seconds
    #[arg(long, default_value = "1.0")]
    tail: f64,

    /// Print voice snapshots at this interval in seconds
    #[arg(long)]
    snapshot_every: Option<f64>,
}

/// What happened during a run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlayReport {
    pub notes: usize,
    pub duration: f64,
    pub peak_voices: usize,
    pub peak_oscillators: usize,
    pub stolen: usize,
    pub remaining_voices: usize,
    pub leaked_nodes: usize,
}

/// Run `notes` through a fresh engine, stepping the clock at most `step`
/// seconds at a time and landing exactly on every note event.
pub fn simulate(
    patch: Patch,
    config: EngineConfig,
    routes: &[ModRoute],
    notes: &[ScriptNote],
    step: f64,
    tail: f64,
    snapshot_every: Option<f64>,
) -> anyhow::Result<PlayReport> {
    let mut synth = PolySynth::with_config(OfflineBackend::new(), patch, config)?;
    synth.set_mod_routes(routes);

    let events = timeline(notes);
    let end = events.last().map_or(0.0, |e| e.0) + tail.max(0.0);
    let step = step.max(1e-4);
    let mut report = PlayReport {
        notes: notes.len(),
        duration: end,
        ..PlayReport::default()
    };
    let mut next_event = 0;
    let mut next_snapshot = snapshot_every.map(|_| 0.0);

    loop {
        let now = synth.backend().current_time();
        while let Some(&(time, event)) = events.get(next_event) {
            if time > now {
                break;
            }
            let stopping = synth.stopping_voice_count();
            match event {
                ScriptEvent::On { midi, velocity } => {
                    info!(time, midi, velocity, "note on");
                    synth.note_on(midi, velocity);
                }
                ScriptEvent::Off { midi } => {
                    info!(time, midi, "note off");
                    synth.note_off(midi);
                }
            }
            report.stolen += synth.stopping_voice_count().saturating_sub(stopping);
            next_event += 1;
        }
        synth.update();

        report.peak_voices = report.peak_voices.max(synth.active_voice_count());
        report.peak_oscillators = report
            .peak_oscillators
            .max(synth.backend().sounding_oscillator_count());

        if let (Some(due), Some(every)) = (next_snapshot, snapshot_every)
            && now >= due
        {
            print_snapshots(&synth, now);
            next_snapshot = Some(due + every.max(step));
        }

        if now >= end {
            break;
        }
        let mut target = (now + step).min(end);
        if let Some(&(time, _)) = events.get(next_event) {
            target = target.min(time);
        }
        synth.backend_mut().advance_to(target)?;
    }

    report.remaining_voices = synth.active_voice_count();
    let backend = synth.shutdown();
    // Only the destination should survive a shutdown.
    report.leaked_nodes = backend.live_node_count().saturating_sub(1);
    Ok(report)
}

fn print_snapshots(synth: &PolySynth<OfflineBackend>, now: f64) {
    for snap in synth.voice_snapshots() {
        println!(
            "  t={:>7.3}  midi {:>3}  {:<8}  env {:.3}  lfo {:.3}  unison {:>2} @ {:>5.1} ct",
            now,
            snap.midi,
            snap.state.name(),
            snap.env_level,
            snap.lfo_level,
            snap.unison_voices,
            snap.unison_detune_cents
        );
    }
}

pub fn run(args: PlayArgs) -> anyhow::Result<()> {
    let notes = parse_script(&args.notes)?;
    let settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    let mut routes = settings.mod_routes();
    for text in &args.routes {
        routes.push(parse_route(text)?);
    }
    let lfo_points = args.lfo_points.as_deref().map(parse_points).transpose()?;

    let patch = Patch::create(PatchOptions {
        waveform: Some(args.wave.into()),
        detune_cents: Some(args.detune),
        unison_voices: Some(args.unison),
        unison_detune_cents: Some(args.unison_detune),
        morph_mode: Some(args.morph.into()),
        delay: Some(args.delay),
        attack: Some(args.attack),
        hold: Some(args.hold),
        decay: Some(args.decay),
        sustain: Some(args.sustain),
        release: Some(args.release),
        lfo_mode: Some(args.lfo_mode.into()),
        lfo_rate_hz: Some(args.lfo_rate),
        lfo_phase_offset: Some(args.lfo_phase),
        lfo_points,
        max_voices: Some(args.max_voices),
        master_gain: Some(args.master_gain),
    });

    info!(
        notes = notes.len(),
        routes = routes.len(),
        max_voices = patch.global().max_voices,
        "starting playback"
    );
    let report = simulate(
        patch,
        settings.engine,
        &routes,
        &notes,
        args.step,
        args.tail,
        args.snapshot_every,
    )?;

    println!("Playback summary");
    println!("================");
    println!("  notes              {}", report.notes);
    println!("  duration           {:.3}s", report.duration);
    println!("  peak voices        {}", report.peak_voices);
    println!("  peak oscillators   {}", report.peak_oscillators);
    println!("  voices stolen      {}", report.stolen);
    println!("  voices at end      {}", report.remaining_voices);
    println!("  leaked nodes       {}", report.leaked_nodes);
    Ok(())
}
