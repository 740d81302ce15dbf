//! Strata Player - headless four-slice looping sampler
//!
//! Opens one recording with four independent cursors, starts the audio
//! engine, and maps line-based terminal input to engine commands. This is
//! the whole control surface: no GUI, no MIDI, just a keymap on stdin.

mod config;

use std::io::BufRead;
use std::path::Path;

use anyhow::{bail, Context, Result};

use strata_core::audio::{start_audio_system, AudioSystem};
use strata_core::config::load_config;
use strata_core::engine::{
    block_tap, AudioEngine, EngineCommand, TapReader, DEFAULT_BLOCK_FRAMES, FAST_NUDGE_FRAMES,
    NUDGE_FRAMES,
};
use strata_core::source::{SampleSource, WavSource};
use strata_core::types::{SliceId, NUM_SLICES};

use config::{config_path, PlayerConfig};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let path = match std::env::args().nth(1) {
        Some(p) => p,
        None => {
            eprintln!("usage: strata-player <audio file.wav>");
            std::process::exit(1);
        }
    };

    let player_config: PlayerConfig = load_config(&config_path());

    // the same recording, opened once per slice: four independent cursors
    let mut sources: Vec<Box<dyn SampleSource>> = Vec::with_capacity(NUM_SLICES);
    for _ in 0..NUM_SLICES {
        let source = WavSource::open(Path::new(&path))
            .with_context(|| format!("cannot use {} as the sampler source", path))?;
        sources.push(Box::new(source));
    }
    let source_rate = sources[0].info().sample_rate;
    let total_frames = sources[0].info().total_frames;
    let sources: [Box<dyn SampleSource>; NUM_SLICES] = match sources.try_into() {
        Ok(s) => s,
        Err(_) => bail!("expected {} sources", NUM_SLICES),
    };

    log::info!(
        "source: {} frames at {} Hz ({:.1}s)",
        total_frames,
        source_rate,
        total_frames as f64 / source_rate as f64
    );

    let block_frames = player_config
        .buffer_frames
        .map(|f| f as usize)
        .unwrap_or(DEFAULT_BLOCK_FRAMES);
    let (tap, tap_reader) = block_tap(block_frames);

    let engine = AudioEngine::new(sources, &player_config.engine_config(), tap)?;
    let system = start_audio_system(engine, &player_config.audio_config(source_rate))
        .context("failed to start the audio stream")?;

    println!("╔════════════════════════════════════════╗");
    println!("║            STRATA  SAMPLER             ║");
    println!("║     four slices, one recording         ║");
    println!("╚════════════════════════════════════════╝");
    println!(
        "device ready: {} Hz, {} frames (~{:.1}ms)",
        system.sample_rate, system.buffer_size, system.latency_ms
    );
    print_help();

    run_control_loop(system, tap_reader, total_frames)
}

/// Read stdin line by line and translate keys into engine commands.
///
/// Consumes the audio system and shuts it down on quit, stream before
/// sources.
fn run_control_loop(
    mut system: AudioSystem,
    mut tap_reader: TapReader,
    total_frames: u64,
) -> Result<()> {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("stdin closed unexpectedly")?;
        let key = line.trim();

        let command = match key {
            "a" => Some(EngineCommand::SelectSlice(SliceId::A)),
            "b" => Some(EngineCommand::SelectSlice(SliceId::B)),
            "c" => Some(EngineCommand::SelectSlice(SliceId::C)),
            "d" => Some(EngineCommand::SelectSlice(SliceId::D)),
            "p" => Some(EngineCommand::TogglePlay),
            "m" => Some(EngineCommand::ToggleMute),
            "]" => Some(EngineCommand::GrowLoop),
            "[" => Some(EngineCommand::ShrinkLoop),
            "-" => Some(EngineCommand::Nudge {
                frames: -NUDGE_FRAMES,
            }),
            "=" => Some(EngineCommand::Nudge {
                frames: NUDGE_FRAMES,
            }),
            "_" => Some(EngineCommand::Nudge {
                frames: -FAST_NUDGE_FRAMES,
            }),
            "+" => Some(EngineCommand::Nudge {
                frames: FAST_NUDGE_FRAMES,
            }),
            "e" => Some(EngineCommand::LowpassDown),
            "r" => Some(EngineCommand::LowpassUp),
            "u" => Some(EngineCommand::HighpassDown),
            "i" => Some(EngineCommand::HighpassUp),
            "t" => Some(EngineCommand::VolumeUp),
            "y" => Some(EngineCommand::VolumeDown),
            "s" => {
                print_status(&system, &mut tap_reader, total_frames);
                None
            }
            "h" => {
                print_help();
                None
            }
            "q" => break,
            "" => None,
            other => {
                println!("unknown command '{}' — 'h' lists the keys", other);
                None
            }
        };

        if let Some(cmd) = command {
            if system.command_sender.send(cmd).is_err() {
                log::warn!("command queue full, dropped {:?}", cmd);
            }
        }
    }

    system.shutdown();
    println!("goodbye");
    Ok(())
}

fn print_help() {
    println!("----------------------------------------------------");
    println!("  a/b/c/d  select slice");
    println!("  p        start/stop the selected slice");
    println!("  m        mute on/off");
    println!("  [ / ]    shrink / grow loop");
    println!("  - / =    nudge loop start left / right");
    println!("  _ / +    fast nudge left / right");
    println!("  e / r    narrow / widen the notch (lowpass)");
    println!("  u / i    narrow / widen the band (highpass)");
    println!("  t / y    volume up / down");
    println!("  s        status    h  help    q  quit");
    println!("----------------------------------------------------");
}

/// Print one line per slice from the lock-free mirrors, plus the output
/// peak from the observer tap.
fn print_status(system: &AudioSystem, tap_reader: &mut TapReader, total_frames: u64) {
    for (i, atomics) in system.slice_atomics.iter().enumerate() {
        let id = SliceId::from_index(i).map(|s| s.label()).unwrap_or("?");
        println!(
            "slice {}: {}{}  vol {:.1}  start {:>8}/{}  loop {:>6} @ {:>6}  lp {:>3} hp {:>3}",
            id,
            if atomics.is_playing() { "playing" } else { "stopped" },
            if atomics.is_muted() { " (muted)" } else { "" },
            atomics.volume(),
            atomics.start_frame(),
            total_frames,
            atomics.loop_counter(),
            atomics.loop_length(),
            atomics.lowpass(),
            atomics.highpass(),
        );
    }

    match tap_reader.latest_block() {
        Some(block) => {
            let peak = block.iter().map(|s| s.peak()).fold(0.0f32, f32::max);
            println!("output peak: {:.3}", peak);
        }
        None => println!("output peak: (no block yet)"),
    }
}
