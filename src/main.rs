//! # Nudge: local notification scheduler
//!
//! Usage:
//!   nudge run                  # Replay schedules, then read host commands from stdin
//!   nudge run --verbose        # Same, with debug logging
//!   nudge list                 # Show stored schedules
//!   nudge journal              # Show dismissals waiting for a host
//!   nudge config               # Print the effective configuration
//!   nudge config --write       # Save it to the config file

mod host;
mod session;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nudge_core::config::NudgeConfig;
use nudge_core::traits::SystemClock;
use nudge_scheduler::{
    run_fire_loop, Collaborators, DismissalJournal, NotificationScheduler, ScheduleStore,
    SchedulerDb, TokioTimer,
};
use tokio::io::AsyncBufReadExt;
use tokio::sync::{mpsc, Mutex};
use tracing_subscriber::EnvFilter;

use crate::host::{emit_line, DesktopPlatform, DesktopRenderer, DesktopTray, StdoutSink};
use crate::session::Session;

#[derive(Parser)]
#[command(
    name = "nudge",
    version,
    about = "🔔 Nudge: local notification scheduler"
)]
struct Cli {
    /// Config file (default: ~/.nudge/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduler, reading host commands as JSON lines from stdin
    Run,
    /// List stored schedules
    List,
    /// List dismissals waiting to be reported
    Journal,
    /// Print the effective configuration
    Config {
        /// Also write it to the config file, creating it if missing
        #[arg(long)]
        write: bool,
    },
}

fn expand_path(p: &str) -> String {
    shellexpand::tilde(p).to_string()
}

fn load_config(path: Option<&Path>) -> Result<NudgeConfig> {
    let config = match path {
        Some(path) => NudgeConfig::load_from(path)?,
        None => NudgeConfig::load()?,
    };
    Ok(config)
}

fn open_db(config: &NudgeConfig) -> Result<SchedulerDb> {
    let path = expand_path(&config.store.path);
    SchedulerDb::open(Path::new(&path)).with_context(|| format!("opening store at {path}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the host protocol
    let filter = if cli.verbose {
        "nudge=debug,nudge_scheduler=debug,nudge_core=debug"
    } else {
        "nudge=info,nudge_scheduler=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::List => list(&config),
        Command::Journal => journal(&config),
        Command::Config { write } => {
            print!("{}", toml::to_string_pretty(&config)?);
            if write {
                match cli.config.as_deref() {
                    Some(path) => config.save_to(path)?,
                    None => config.save()?,
                }
                tracing::info!("💾 Config written");
            }
            Ok(())
        }
    }
}

async fn run(config: NudgeConfig) -> Result<()> {
    let db = open_db(&config)?;
    let (fire_tx, fire_rx) = mpsc::channel(config.timer.fire_channel_capacity.max(1));

    let platform = Arc::new(DesktopPlatform::new());
    let tray = Arc::new(DesktopTray::new());
    let parts = Collaborators {
        timer: Arc::new(TokioTimer::new(fire_tx)),
        renderer: Arc::new(DesktopRenderer::new(
            platform.clone(),
            config.render.require_permission,
        )),
        surface: tray.clone(),
        platform: platform.clone(),
        clock: Arc::new(SystemClock),
    };
    let mut scheduler = NotificationScheduler::new(db, &config.journal, parts);

    // A fresh process has no armed timers: treat start-up like a boot
    let armed = scheduler.on_boot_completed();
    scheduler.on_host_attached(Arc::new(StdoutSink), None);
    scheduler.on_host_ready();

    tracing::info!("🔔 Nudge v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("📂 Store: {}", expand_path(&config.store.path));
    tracing::info!("⏰ {armed} schedule(s) armed");

    let scheduler = Arc::new(Mutex::new(scheduler));
    let fire_loop = tokio::spawn(run_fire_loop(scheduler.clone(), fire_rx));
    let mut session = Session::new(scheduler.clone(), tray, platform);

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                emit_line(session.handle_line(line).await);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("🛑 Interrupted");
                break;
            }
        }
    }

    scheduler.lock().await.on_host_detached();
    fire_loop.abort();
    tracing::info!("👋 Nudge stopped");
    Ok(())
}

fn list(config: &NudgeConfig) -> Result<()> {
    let store = ScheduleStore::new(open_db(config)?);
    let entries = store.entries()?;
    if entries.is_empty() {
        println!("No scheduled notifications.");
        return Ok(());
    }
    println!("📅 {} scheduled notification(s):\n", entries.len());
    for entry in entries {
        let every = entry
            .record
            .interval_seconds
            .map(|s| format!("every {s}s"))
            .unwrap_or_else(|| "once".into());
        println!(
            "  #{:<6} {}  {:<10} [{}] {}",
            entry.record.id,
            entry.fire_at.format("%Y-%m-%d %H:%M:%S"),
            every,
            entry.record.channel_id,
            entry.record.title
        );
    }
    Ok(())
}

fn journal(config: &NudgeConfig) -> Result<()> {
    let journal = DismissalJournal::new(open_db(config)?, &config.journal);
    let records = journal.entries()?;
    if records.is_empty() {
        println!("No pending dismissals.");
        return Ok(());
    }
    println!("📝 {} pending dismissal(s):\n", records.len());
    for record in records {
        println!("  #{:<6} [{}] {}", record.id, record.channel_id, record.title);
    }
    Ok(())
}
