use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, info, warn};

use notiq::channel::PipeChannel;
use notiq::parser::Parser as MessageParser;
use notiq::prefs::PrefsStore;
use notiq::probes::{ProfileIdentityProbe, TcpConnectivityProbe};
use notiq::rules::FileAwardRules;
use notiq::scheduler::Scheduler;
use notiq::settings::Settings;
use notiq::sink::DesktopSink;
use notiq::telemetry::init_tracing;
use notiq::types::Notification;

const DEFAULT_CONFIG: &str = "config.toml";

#[derive(Parser, Debug)]
#[command(author, version, about = "Desktop notification intake daemon", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Intake pipe path, overriding the configured one.
    #[arg(long, value_name = "PATH")]
    pipe: Option<PathBuf>,

    /// Use a JSON layer for logs (`--features json-logs`).
    #[arg(long, action = ArgAction::SetTrue)]
    json_logs: bool,

    /// Explicit log filter (e.g. "notiq=debug").
    #[arg(long, value_name = "FILTER")]
    log_filter: Option<String>,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err);
            std::process::ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    init_tracing(cli.log_filter.as_deref(), cli.json_logs)?;

    let config_path = cli
        .config
        .or_else(Settings::default_config_path)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let mut settings = Settings::from_env_and_file(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;
    if let Some(pipe) = cli.pipe {
        settings.pipe_path = pipe;
    }

    info!(
        pipe = %settings.pipe_path.display(),
        queue_capacity = settings.queue_capacity,
        "starting notification daemon"
    );

    let (sink, completions) =
        DesktopSink::new(settings.display.appname.clone(), settings.display.timeout);
    let scheduler = Arc::new(Scheduler::new(
        Arc::new(sink),
        PrefsStore::new(settings.prefs_path.clone()),
        Box::new(TcpConnectivityProbe::new(
            settings.world.probe_addr.clone(),
            settings.world.probe_timeout,
        )),
        Box::new(ProfileIdentityProbe::new(settings.world.profile_path.clone())),
        settings.queue_capacity,
        Notification::registration_reminder(&settings.media.image_dir),
    ));
    let parser = MessageParser::new(
        Arc::new(FileAwardRules::new(settings.media.rules_dir.clone())),
        settings.media.image_dir.clone(),
        settings.media.award_sound.clone(),
    );
    let channel = PipeChannel::open(settings.pipe_path.clone(), settings.intake_capacity)?;

    let pump_scheduler = Arc::clone(&scheduler);
    let pump = tokio::spawn(async move {
        while let Ok(completion) = completions.recv().await {
            debug!(signal = ?completion, "completion signal");
            let scheduler = Arc::clone(&pump_scheduler);
            // The advance can run the connectivity probe; keep it off the
            // async workers. Awaiting each hand-off serializes completions.
            if tokio::task::spawn_blocking(move || scheduler.on_dismissed_or_timed_out())
                .await
                .is_err()
            {
                warn!("completion handler task failed");
            }
        }
    });

    let mut sigterm = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
    loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received, stopping intake");
                break;
            }
            _ = sigterm.recv() => {
                info!("termination requested, stopping intake");
                break;
            }
            line = channel.next_line() => {
                match line {
                    Some(line) => handle_line(&parser, &scheduler, &line),
                    None => {
                        warn!("intake channel closed");
                        break;
                    }
                }
            }
        }
    }

    // Removes the pipe from the filesystem.
    drop(channel);
    pump.abort();
    if let Err(err) = pump.await {
        if !err.is_cancelled() {
            warn!(error = %err, "completion pump terminated unexpectedly");
        }
    }

    Ok(())
}

/// Parse failures are logged and dropped; the pipe is one-way, so there is
/// nobody to answer.
fn handle_line(parser: &MessageParser, scheduler: &Scheduler, line: &str) {
    match parser.parse(line) {
        Ok(command) => scheduler.apply(command),
        Err(err) => debug!(error = %err, raw = %line, "dropping unrecognized line"),
    }
}

fn report_error(err: &anyhow::Error) {
    eprintln!("Error: {err}");
    for cause in err.chain().skip(1) {
        eprintln!("  caused by: {cause}");
    }
}
