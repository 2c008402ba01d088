use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use avplayer_core::player::{EventData, EventHandler, EventId, LifecycleState, PlayerConfig, PlayerEvent};
use avplayer_core::utils::{self, Config};
use avplayer_core::{AvPlayerBuilder, LanguageCode, ScriptedOpener, SourceType};

/// avplayer - drive the player core with a scripted clip
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Source path announced to the player
    #[arg(value_name = "PATH", default_value = "demo.mp4")]
    path: String,

    /// Select streams and start as soon as the source is attached
    #[arg(short, long)]
    auto_start: bool,

    /// Preferred audio/subtitle language
    #[arg(short, long, value_name = "LANG")]
    language: Option<String>,

    /// Number of video frames to feed before end of stream
    #[arg(short, long, default_value = "50")]
    frames: u64,

    /// Configuration file to use instead of the system/user files
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => utils::load_config()?,
    };

    let log_level = if args.debug { "debug" } else { config.general.log_level.as_str() };
    utils::init_logging(log_level);

    info!("Starting avplayer v{}", env!("CARGO_PKG_VERSION"));

    let mut player_config = PlayerConfig::from_config(&config)?;
    player_config.auto_start |= args.auto_start;
    if let Some(language) = &args.language {
        player_config.default_language = LanguageCode::new(language)?;
    }

    let opener = Arc::new(ScriptedOpener::av_clip());
    let player = AvPlayerBuilder::new()
        .with_config(player_config)
        .with_opener(opener.clone())
        .with_event_handler(Arc::new(LoggingEventHandler))
        .build()?;

    player.add_source(&args.path, SourceType::File)?;
    info!("Attached {} with {} streams", args.path, player.stream_count()?);

    if !player.config().auto_start {
        for index in 0..player.stream_count()? as u32 {
            player.enable_stream(index)?;
        }
        player.start()?;
    }

    wait_until(|| player.state().is_running(), Duration::from_secs(5))
        .ok_or_else(|| anyhow!("player did not start (state {})", player.state()))?;

    let source = opener.last_opened().ok_or_else(|| anyhow!("no source was opened"))?;
    let frames = args.frames;
    let feeder = {
        let source = Arc::clone(&source);
        thread::Builder::new().name("avplayer-feeder".to_string()).spawn(move || {
            for i in 0..frames {
                source.push_audio(source.make_audio_frame(i * 40));
                source.push_video(source.make_video_frame(i * 40));
                thread::sleep(Duration::from_millis(4));
            }
            source.events().on_end_of_stream();
        })?
    };

    let mut presented = 0u64;
    while player.is_active() {
        match player.video_data() {
            Some(frame) => {
                presented += 1;
                log::debug!("Presenting frame at {}", utils::format_timestamp(frame.timestamp));
                while player.audio_data().is_some() {}
            }
            None => thread::sleep(Duration::from_millis(2)),
        }
    }

    feeder.join().map_err(|_| anyhow!("feeder thread panicked"))?;
    info!(
        "Finished in state {} after {} frames at {}",
        player.state(),
        presented,
        utils::format_timestamp(player.current_time())
    );

    player.stop()?;
    Ok(())
}

fn wait_until(condition: impl Fn() -> bool, timeout: Duration) -> Option<()> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return Some(());
        }
        thread::sleep(Duration::from_millis(5));
    }
    None
}

/// Event handler that logs events
struct LoggingEventHandler;

impl EventHandler for LoggingEventHandler {
    fn handle_event(&self, event: &PlayerEvent) {
        match (&event.id, &event.data) {
            (EventId::WarningId, Some(EventData::Warning(code))) => {
                warn!("Source {} warning {}", event.source_id, code);
            }
            (_, Some(EventData::State(change))) => {
                info!("Source {}: {} -> {}", event.source_id, change.previous, change.current);
                if change.current == LifecycleState::Stopped {
                    info!("Playback stopped");
                }
            }
            (id, _) => info!("Event {:?} (0x{:x})", id, id.as_raw()),
        }
    }
}
