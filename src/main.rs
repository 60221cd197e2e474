//! Voice Dispatch - voice-driven dispatcher for assistive capability modules.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use voice_dispatch::audit::{default_event_log_path, EventLog};
use voice_dispatch::config::{default_config_path, load_config, DispatcherConfig, IoMode};
use voice_dispatch::dispatch::DispatchLoop;
use voice_dispatch::interrupt::{CtrlC, InterruptListener, ShutdownSignal};
use voice_dispatch::supervisor::ProcessSupervisor;
use voice_dispatch::voice::{ConsoleFeedback, ConsoleSource, VoiceFeedback, VoiceSource};

#[derive(Parser)]
#[command(
    name = "voice-dispatch",
    about = "Voice-driven dispatcher for assistive capability modules",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to the configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

async fn run(config: DispatcherConfig) -> Result<(), Box<dyn std::error::Error>> {
    let event_db = config
        .event_db
        .clone()
        .unwrap_or_else(default_event_log_path);
    let events = EventLog::open(&event_db).await?;

    let shutdown = ShutdownSignal::new();
    let supervisor = Arc::new(ProcessSupervisor::new(
        config.root_dir.clone(),
        shutdown.clone(),
        events.clone(),
    ));

    // The emergency path shares the supervisor with the dispatch loop, so
    // both shutdown routes funnel through the same stop_all.
    InterruptListener::new(CtrlC, Arc::clone(&supervisor), shutdown.clone()).spawn();

    match config.voice.mode {
        IoMode::Voice => {
            let source = VoiceSource::from_config(&config.voice, events.clone())?;
            let feedback = VoiceFeedback::from_config(&config.voice, events.clone())?;
            DispatchLoop::new(
                source,
                feedback,
                supervisor,
                shutdown,
                events,
                config.reading,
                config.detection,
            )
            .run()
            .await;
        }
        IoMode::Console => {
            DispatchLoop::new(
                ConsoleSource::new(),
                ConsoleFeedback,
                supervisor,
                shutdown,
                events,
                config.reading,
                config.detection,
            )
            .run()
            .await;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = cli.config.unwrap_or_else(default_config_path);
    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        root = %config.root_dir.display(),
        mode = ?config.voice.mode,
        "Starting voice dispatcher"
    );

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "Dispatcher failed to start");
            ExitCode::FAILURE
        }
    }
}
