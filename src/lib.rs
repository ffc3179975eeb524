mod audio;
pub mod db;
pub mod models;
mod notifier;
pub mod settings;
pub mod stats;
pub mod store;
pub mod timer;
mod utils;

use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};
use audio::ChimePlayer;
use chrono::Utc;
use clap::{Parser, Subcommand};
use db::Database;
use log::{info, warn};
use notifier::Notifier;
use models::SessionFilter;
use settings::{SettingsStore, UserSettings};
use stats::SessionTotals;
use store::{RestSessionStore, SharedStore};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use timer::{
    commands::{describe, execute, format_duration, CommandOutcome, ConsoleCommand, HELP},
    TimerController, TimerMode,
};

#[derive(Parser)]
#[command(name = "studyfocus", version, about = "Focus timer with pause and distraction accounting")]
struct Cli {
    /// Directory holding settings.json and the local session database.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a focus session, reading commands from stdin
    Start {
        /// Alternate work and break phases instead of an open-ended run
        #[arg(long)]
        pomodoro: bool,
        /// Work phase length in minutes
        #[arg(long, requires = "pomodoro")]
        work: Option<u32>,
        /// Break phase length in minutes
        #[arg(long = "break", requires = "pomodoro")]
        break_minutes: Option<u32>,
    },
    /// Print totals over stored sessions
    Stats {
        /// Only concentration-mode sessions
        #[arg(long, conflicts_with = "pomodoro")]
        concentration: bool,
        /// Only Pomodoro sessions
        #[arg(long)]
        pomodoro: bool,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
}

pub(crate) struct AppState {
    pub(crate) timer: TimerController,
    pub(crate) store: SharedStore,
    chime: ChimePlayer,
    settings: UserSettings,
}

pub fn run() -> Result<()> {
    utils::logging::init();
    let cli = Cli::parse();

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(async move {
        let app = setup(cli.data_dir).await?;
        match cli.command {
            Command::Start {
                pomodoro,
                work,
                break_minutes,
            } => {
                let mode = if pomodoro {
                    let mut settings = app.settings.clone();
                    if let Some(work) = work {
                        settings.pomodoro.work_minutes = work;
                    }
                    if let Some(minutes) = break_minutes {
                        settings.pomodoro.break_minutes = minutes;
                    }
                    settings.pomodoro_mode()
                } else {
                    TimerMode::Concentration
                };
                run_session(&app, mode).await
            }
            Command::Stats {
                concentration,
                pomodoro,
                limit,
                json,
            } => {
                let filter = SessionFilter {
                    concentration_mode: match (concentration, pomodoro) {
                        (true, _) => Some(true),
                        (_, true) => Some(false),
                        _ => None,
                    },
                    limit,
                };
                print_stats(&app, &filter, json).await
            }
        }
    })
}

async fn setup(data_dir: Option<PathBuf>) -> Result<AppState> {
    let data_dir = match data_dir {
        Some(dir) => dir,
        None => dirs::data_dir()
            .ok_or_else(|| anyhow!("no data directory on this platform; pass --data-dir"))?
            .join("studyfocus"),
    };
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;

    let settings = SettingsStore::new(data_dir.join("settings.json"))?.resolved();

    let store: SharedStore = match settings.sync.api_base_url.as_deref() {
        Some(base_url) => {
            info!("Syncing sessions to {base_url}");
            Arc::new(RestSessionStore::new(
                base_url,
                settings.sync.api_token.clone(),
                settings.request_timeout(),
            )?)
        }
        None => {
            let database = Database::new(data_dir.join("studyfocus.sqlite3"))?;
            // Finalize sessions that were open when the app last exited uncleanly.
            let recovered = database.mark_open_sessions_interrupted(Utc::now()).await?;
            if recovered > 0 {
                warn!("Marked {recovered} unfinished session(s) as Interrupted");
            }
            Arc::new(database)
        }
    };

    Ok(AppState {
        timer: TimerController::new(store.clone(), settings.timer_config()),
        store,
        chime: ChimePlayer::new(settings.chime.enabled, settings.chime.volume),
        settings,
    })
}

async fn run_session(app: &AppState, mode: TimerMode) -> Result<()> {
    let notifier = Notifier::spawn(app.timer.subscribe(), app.chime.clone(), |line| {
        println!("{line}")
    });

    if let Err(err) = app.timer.start(mode).await {
        notifier.finish().await;
        return Err(err.into());
    }
    println!("Session started. {HELP}");

    let result = drive_session(&app.timer, BufReader::new(tokio::io::stdin())).await;
    notifier.finish().await;
    result
}

/// Apply commands from `input`, then close the session however input ended.
async fn drive_session<R>(timer: &TimerController, input: R) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let result = read_commands(timer, input).await;
    if let Some(snapshot) = timer.shutdown().await {
        println!("Session ended: {}", describe(&snapshot));
    }
    result
}

/// Apply console commands until `stop`, end of input or Ctrl-C.
async fn read_commands<R>(timer: &TimerController, input: R) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read commands")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            return Ok(());
        };

        if line.trim().is_empty() {
            continue;
        }
        let command = match line.parse::<ConsoleCommand>() {
            Ok(command) => command,
            Err(err) => {
                println!("{err}. {HELP}");
                continue;
            }
        };

        match execute(timer, command).await {
            Ok(CommandOutcome::Snapshot(snapshot)) => println!("{}", describe(&snapshot)),
            Ok(CommandOutcome::Distraction(_)) => {}
            Ok(CommandOutcome::Help) => println!("{HELP}"),
            Ok(CommandOutcome::Stopped(snapshot)) => {
                println!("Session ended: {}", describe(&snapshot));
                return Ok(());
            }
            Err(err) => println!("{err}"),
        }
    }
}

async fn print_stats(app: &AppState, filter: &SessionFilter, json: bool) -> Result<()> {
    let sessions = app.store.list_sessions(filter).await?;
    let totals = SessionTotals::from_sessions(&sessions);

    if json {
        println!("{}", serde_json::to_string_pretty(&totals)?);
        return Ok(());
    }

    let (hours, minutes) = totals.focus_time();
    println!("Sessions:        {}", totals.sessions);
    println!("Focus time:      {hours}h {minutes}m");
    println!("Average session: {}m", totals.average_focus_minutes());
    println!(
        "Distractions:    {} ({}m)",
        totals.distractions, totals.distraction_minutes
    );
    println!(
        "Breaks:          {} ({})",
        totals.breaks,
        format_duration(totals.break_seconds)
    );
    if totals.pomodoro_cycles > 0 {
        println!("Pomodoro cycles: {}", totals.pomodoro_cycles);
    }
    Ok(())
}
