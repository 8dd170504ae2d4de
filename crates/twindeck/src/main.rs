use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use twindeck_dj::engine::list_audio_devices;
use twindeck_dj::library::{is_supported_audio_file, load_audio_to_pcm};
use twindeck_dj::{AudioEngine, DeckId, EngineConfig, SoundTouchTempoAnalyzer, TempoAnalyzer};

/// Two-deck DJ player with isolator EQ and an equal-power crossfader.
#[derive(Parser, Debug)]
#[command(name = "twindeck")]
#[command(about = "Two-deck DJ mixing engine")]
struct Args {
    /// Track to load on deck A
    #[arg(long)]
    deck_a: Option<PathBuf>,

    /// Track to load on deck B
    #[arg(long)]
    deck_b: Option<PathBuf>,

    /// Crossfader position (0 = deck A, 1 = deck B)
    #[arg(long, default_value = "0.5")]
    crossfader: f32,

    /// Playback rate for deck A
    #[arg(long, default_value = "1.0")]
    rate_a: f64,

    /// Playback rate for deck B
    #[arg(long, default_value = "1.0")]
    rate_b: f64,

    /// EQ for deck A as "low,mid,high" in dB (-80 kills a band)
    #[arg(long, value_parser = parse_eq, allow_hyphen_values = true)]
    eq_a: Option<(f64, f64, f64)>,

    /// EQ for deck B as "low,mid,high" in dB (-80 kills a band)
    #[arg(long, value_parser = parse_eq, allow_hyphen_values = true)]
    eq_b: Option<(f64, f64, f64)>,

    /// Channel fader for deck A (0-1)
    #[arg(long, default_value = "1.0")]
    gain_a: f32,

    /// Channel fader for deck B (0-1)
    #[arg(long, default_value = "1.0")]
    gain_b: f32,

    /// Engine config file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output device name (overrides the config file)
    #[arg(long)]
    device: Option<String>,

    /// Stop after this many seconds (default: when both decks finish)
    #[arg(long)]
    seconds: Option<f64>,

    /// Print each deck's status as JSON instead of a summary line
    #[arg(long)]
    json: bool,

    /// List output devices and exit
    #[arg(long)]
    list_devices: bool,
}

fn parse_eq(s: &str) -> Result<(f64, f64, f64), String> {
    let bands: Vec<f64> = s
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("Invalid EQ value: {}", e))?;
    match bands.as_slice() {
        [low, mid, high] => Ok((*low, *mid, *high)),
        _ => Err(format!("Expected low,mid,high but got {} values", bands.len())),
    }
}

fn main() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(device) = &args.device {
        config.device_name = device.clone();
    }

    if args.list_devices {
        println!("Output devices ({} Hz stereo f32):", config.sample_rate);
        for device in list_audio_devices(config.sample_rate) {
            println!(
                "  {}{} ({} ch){}",
                device.name,
                if device.is_default { " [default]" } else { "" },
                device.max_channels,
                if device.supports_rate { "" } else { " - rate unsupported" }
            );
        }
        return Ok(());
    }

    let mut engine = AudioEngine::new(config)?;

    let tracks = [(DeckId::A, &args.deck_a), (DeckId::B, &args.deck_b)];
    let mut loaded = Vec::new();
    for (deck, path) in tracks {
        if let Some(path) = path {
            load_track(&engine, deck, path)?;
            loaded.push(deck);
        }
    }
    if loaded.is_empty() {
        anyhow::bail!("Nothing to play: pass --deck-a and/or --deck-b");
    }

    engine.set_rate(DeckId::A, args.rate_a)?;
    engine.set_rate(DeckId::B, args.rate_b)?;
    if let Some((low, mid, high)) = args.eq_a {
        engine.set_eq(DeckId::A, low, mid, high);
    }
    if let Some((low, mid, high)) = args.eq_b {
        engine.set_eq(DeckId::B, low, mid, high);
    }
    engine.set_channel_gain(DeckId::A, args.gain_a)?;
    engine.set_channel_gain(DeckId::B, args.gain_b)?;
    engine.set_crossfader(args.crossfader)?;

    for deck in &loaded {
        engine.play(*deck)?;
    }

    let started = Instant::now();
    let limit = args.seconds.map(Duration::from_secs_f64);
    let sample_rate = engine.sample_rate() as f64;

    loop {
        thread::sleep(Duration::from_millis(500));

        if let Some(err) = engine.device_error() {
            log::warn!("Output device error: {}, restarting stream", err);
            for deck in &loaded {
                if engine.deck_status(*deck).playing {
                    engine.play(*deck)?;
                }
            }
        }

        let mut any_playing = false;
        for deck in &loaded {
            let status = engine.deck_status(*deck);
            any_playing |= status.playing;
            if args.json {
                println!("{}", serde_json::to_string(&status)?);
            } else {
                println!(
                    "Deck {}: {} {:>7.2}s / {:.2}s  rate {:.3}",
                    status.id,
                    if status.playing { "playing" } else { "stopped" },
                    status.position as f64 / sample_rate,
                    status.duration as f64 / sample_rate,
                    status.rate
                );
            }
        }

        if !any_playing || limit.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }
    }

    engine.close();
    Ok(())
}

/// Decode, analyze and load a file onto a deck.
fn load_track(engine: &AudioEngine, deck: DeckId, path: &Path) -> Result<(), anyhow::Error> {
    if !is_supported_audio_file(path) {
        log::warn!("Deck {}: {:?} has an unrecognized extension", deck, path);
    }

    let (pcm, rate) = load_audio_to_pcm(path, engine.sample_rate())?;
    let grid = SoundTouchTempoAnalyzer::default().analyze(&pcm, rate);
    println!(
        "Deck {}: {} ({:.1} BPM, confidence {:.2})",
        deck,
        path.display(),
        grid.bpm,
        grid.confidence
    );

    engine.load_pcm(deck, pcm, rate)?;
    Ok(())
}
