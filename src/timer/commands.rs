//! Commands typed into the console while a session runs.

use std::str::FromStr;

use super::{TimerController, TimerSnapshot, TimerStatus, Visibility};

pub const HELP: &str = "commands: pause [reason] | resume [reason] | hide | show | status | stop | help";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Pause(Option<String>),
    Resume(String),
    Hide,
    Show,
    Status,
    Stop,
    Help,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        match verb.to_ascii_lowercase().as_str() {
            "pause" | "p" => Ok(ConsoleCommand::Pause(
                (!rest.is_empty()).then(|| rest.to_string()),
            )),
            "resume" | "r" => Ok(ConsoleCommand::Resume(rest.to_string())),
            "hide" => Ok(ConsoleCommand::Hide),
            "show" => Ok(ConsoleCommand::Show),
            "status" | "s" => Ok(ConsoleCommand::Status),
            "stop" | "q" | "quit" => Ok(ConsoleCommand::Stop),
            "help" | "?" => Ok(ConsoleCommand::Help),
            "" => Err("empty command".into()),
            other => Err(format!("unknown command '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub enum CommandOutcome {
    Snapshot(TimerSnapshot),
    Distraction(Option<u64>),
    Stopped(TimerSnapshot),
    Help,
}

pub async fn execute(
    controller: &TimerController,
    command: ConsoleCommand,
) -> Result<CommandOutcome, String> {
    match command {
        ConsoleCommand::Pause(reason) => controller
            .pause(reason)
            .await
            .map(CommandOutcome::Snapshot)
            .map_err(|e| e.to_string()),
        ConsoleCommand::Resume(reason) => controller
            .resume(&reason)
            .await
            .map(CommandOutcome::Snapshot)
            .map_err(|e| e.to_string()),
        ConsoleCommand::Hide => {
            controller.visibility_changed(Visibility::Hidden).await;
            Ok(CommandOutcome::Distraction(None))
        }
        ConsoleCommand::Show => Ok(CommandOutcome::Distraction(
            controller.visibility_changed(Visibility::Visible).await,
        )),
        ConsoleCommand::Status => Ok(CommandOutcome::Snapshot(controller.get_snapshot().await)),
        ConsoleCommand::Stop => controller
            .stop()
            .await
            .map(CommandOutcome::Stopped)
            .map_err(|e| e.to_string()),
        ConsoleCommand::Help => Ok(CommandOutcome::Help),
    }
}

pub fn format_duration(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

pub fn describe(snapshot: &TimerSnapshot) -> String {
    let state = &snapshot.state;
    let mut line = format!(
        "[{}] elapsed {} | focused {} | distractions {} ({}) | pauses {} ({})",
        state.status.as_str(),
        format_duration(state.elapsed_seconds),
        format_duration(snapshot.focused_seconds),
        state.distraction_count,
        format_duration(state.distraction_seconds),
        state.pause_count,
        format_duration(state.pause_seconds),
    );
    if let Some(phase) = state.phase {
        if state.status != TimerStatus::Idle {
            line.push_str(&format!(
                " | {:?} phase, {} cycles",
                phase, state.completed_cycles
            ));
        }
    }
    line
}
