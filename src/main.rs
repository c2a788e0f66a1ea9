use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn, Level};
use voice_memo::config::OutputChoice;
use voice_memo::ui::{self, Command, Outcome, Screen};
use voice_memo::{Config, LocalPlatform, PlaybackMode, RecorderController};

#[derive(Parser)]
#[command(name = "voice-memo")]
#[command(about = "Record a short voice clip and play it back with adjustable gain")]
struct Args {
    /// Config file (extension optional; missing file means defaults)
    #[arg(short, long, default_value = "config/voice-memo")]
    config: String,

    /// Replay this audio file instead of capturing from the microphone
    #[arg(short, long)]
    input: Option<String>,

    /// Playback handling after play is issued
    #[arg(short, long, value_enum)]
    mode: Option<ModeArg>,

    /// Play through the default speaker (requires the `cpal` feature)
    #[arg(long)]
    speaker: bool,

    /// Print status as JSON
    #[arg(long)]
    json: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    OneShot,
    Tracked,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let mut cfg = Config::load(&args.config)?;
    if let Some(input) = args.input {
        cfg.audio.input_file = Some(input);
    }
    if let Some(mode) = args.mode {
        cfg.playback.mode = match mode {
            ModeArg::OneShot => PlaybackMode::OneShot,
            ModeArg::Tracked => PlaybackMode::Tracked,
        };
    }
    if args.speaker {
        cfg.playback.output = OutputChoice::Speaker;
    }

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!("Recordings directory: {}", cfg.recordings_dir().display());

    let platform = Arc::new(LocalPlatform::new(cfg.platform_config()?));
    let controller = RecorderController::new(platform, cfg.controller_options());
    let options = controller.options();
    info!(
        "Preset {:?}, playback {:?}, pitch factor {}",
        options.preset, options.playback_mode, options.pitch_per_gain
    );

    println!("{}", ui::HELP);
    print_screen(&controller, args.json).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read command")? {
        if line.trim().is_empty() {
            continue;
        }

        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{:#} (type `help`)", e);
                continue;
            }
        };

        match command {
            Command::Quit => break,
            Command::Help => {
                println!("{}", ui::HELP);
                continue;
            }
            _ => {}
        }

        match ui::dispatch(&controller, command).await {
            Ok(Outcome::RecordingSaved(uri)) => println!("Saved {}", uri),
            Ok(Outcome::GainSet(gain)) => println!("Gain {}", gain),
            Ok(_) => {}
            Err(e) if e.is_recoverable() => warn!("{}", e),
            Err(e) => println!("Error: {}", e),
        }

        print_screen(&controller, args.json).await?;
    }

    controller.teardown().await;
    Ok(())
}

async fn print_screen(controller: &RecorderController, json: bool) -> Result<()> {
    let snapshot = controller.snapshot().await;
    if json {
        println!("{}", serde_json::to_string(&snapshot)?);
    } else {
        print!("{}", Screen::from_snapshot(&snapshot).render());
    }
    Ok(())
}
