use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::visibility::{Visibility, VisibilityTracker};
use crate::models::{PauseEntry, SessionStatus, SessionUpdate};

pub const DEFAULT_MILESTONE_SECS: u64 = 5 * 60;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TimerStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Stopped,
}

impl TimerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerStatus::Idle => "idle",
            TimerStatus::Running => "running",
            TimerStatus::Paused => "paused",
            TimerStatus::Stopped => "stopped",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "kind")]
pub enum TimerMode {
    /// Open-ended stopwatch.
    #[default]
    Concentration,
    Pomodoro {
        work_minutes: u32,
        break_minutes: u32,
    },
}

impl TimerMode {
    pub fn is_concentration(&self) -> bool {
        matches!(self, TimerMode::Concentration)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PomodoroPhase {
    Work,
    Break,
}

/// What a single tick produced, for the caller to turn into events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub milestone: bool,
    pub phase_changed: Option<PomodoroPhase>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub status: TimerStatus,
    pub mode: TimerMode,
    pub session_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub elapsed_seconds: u64,
    pub distraction_count: u32,
    pub distraction_seconds: u64,
    pub pause_count: u32,
    pub pause_seconds: u64,
    pub pause_log: Vec<PauseEntry>,
    pub phase: Option<PomodoroPhase>,
    pub work_seconds: u64,
    pub break_seconds: u64,
    pub completed_cycles: u32,
    /// Seconds spent in the current Pomodoro phase.
    #[serde(skip)]
    pub phase_elapsed: u64,
    #[serde(skip)]
    pub milestone_every: u64,
    #[serde(skip)]
    pub revision: u64,
    #[serde(skip)]
    pub pause_started: Option<Instant>,
    #[serde(skip)]
    pub pause_reason: Option<String>,
    /// Present only while a session is open.
    #[serde(skip)]
    pub visibility: Option<VisibilityTracker>,
}

impl Default for TimerState {
    fn default() -> Self {
        Self {
            status: TimerStatus::Idle,
            mode: TimerMode::Concentration,
            session_id: None,
            started_at: None,
            elapsed_seconds: 0,
            distraction_count: 0,
            distraction_seconds: 0,
            pause_count: 0,
            pause_seconds: 0,
            pause_log: Vec::new(),
            phase: None,
            work_seconds: 0,
            break_seconds: 0,
            completed_cycles: 0,
            phase_elapsed: 0,
            milestone_every: DEFAULT_MILESTONE_SECS,
            revision: 0,
            pause_started: None,
            pause_reason: None,
            visibility: None,
        }
    }
}

impl TimerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_session(
        &mut self,
        session_id: String,
        mode: TimerMode,
        started_at: DateTime<Utc>,
        milestone_every: u64,
    ) {
        *self = Self {
            status: TimerStatus::Running,
            mode,
            session_id: Some(session_id),
            started_at: Some(started_at),
            phase: match mode {
                TimerMode::Concentration => None,
                TimerMode::Pomodoro { .. } => Some(PomodoroPhase::Work),
            },
            milestone_every: milestone_every.max(1),
            visibility: Some(VisibilityTracker::new()),
            ..Self::default()
        };
    }

    /// Time actually spent focused.
    pub fn focused_seconds(&self) -> u64 {
        self.elapsed_seconds.saturating_sub(self.distraction_seconds)
    }

    /// One second of Running time. Does nothing in any other status.
    pub fn tick(&mut self) -> TickOutcome {
        if self.status != TimerStatus::Running {
            return TickOutcome::default();
        }

        self.elapsed_seconds += 1;
        let mut outcome = TickOutcome {
            milestone: self.elapsed_seconds % self.milestone_every == 0,
            phase_changed: None,
        };

        if let (TimerMode::Pomodoro { work_minutes, break_minutes }, Some(phase)) =
            (self.mode, self.phase)
        {
            self.phase_elapsed += 1;
            let phase_len = match phase {
                PomodoroPhase::Work => {
                    self.work_seconds += 1;
                    u64::from(work_minutes) * 60
                }
                PomodoroPhase::Break => {
                    self.break_seconds += 1;
                    u64::from(break_minutes) * 60
                }
            };

            if self.phase_elapsed >= phase_len.max(1) {
                let next = match phase {
                    PomodoroPhase::Work => {
                        self.completed_cycles += 1;
                        PomodoroPhase::Break
                    }
                    PomodoroPhase::Break => PomodoroPhase::Work,
                };
                self.phase = Some(next);
                self.phase_elapsed = 0;
                outcome.phase_changed = Some(next);
            }
        }

        outcome
    }

    pub fn begin_pause(&mut self, reason: Option<String>, now: Instant) {
        self.status = TimerStatus::Paused;
        self.pause_started = Some(now);
        self.pause_reason = reason.filter(|r| !r.trim().is_empty());
        if let Some(tracker) = self.visibility.as_mut() {
            tracker.clear();
        }
    }

    /// Close the open pause into the log. The resume reason wins over the one
    /// given at pause time; neither present falls back to the sentinel.
    pub fn end_pause(&mut self, reason: &str, now: Instant, at: DateTime<Utc>) -> Option<PauseEntry> {
        let started = self.pause_started.take()?;
        let duration = now.saturating_duration_since(started).as_secs();
        let pause_reason = self.pause_reason.take();
        let reason = if reason.trim().is_empty() {
            pause_reason.as_deref().unwrap_or("")
        } else {
            reason
        };

        let entry = PauseEntry::new(reason, duration, at);
        self.pause_seconds += duration;
        self.pause_count += 1;
        self.pause_log.push(entry.clone());
        Some(entry)
    }

    pub fn resume(&mut self) {
        self.status = TimerStatus::Running;
    }

    /// Hidden interval closed while Running. The gap is clamped so distraction
    /// time never exceeds the ticks counted. Returns the seconds added.
    pub fn record_distraction(&mut self, gap_seconds: u64) -> u64 {
        let room = self.elapsed_seconds.saturating_sub(self.distraction_seconds);
        let counted = gap_seconds.min(room);
        self.distraction_seconds += counted;
        self.distraction_count += 1;
        counted
    }

    /// Feed a foreground/background signal. Only a hidden interval that opens
    /// and closes while Running is counted; returns the seconds added.
    pub fn visibility_changed(&mut self, visibility: Visibility, now: Instant) -> Option<u64> {
        if self.status != TimerStatus::Running {
            return None;
        }
        let tracker = self.visibility.as_mut()?;
        let gap = match visibility {
            Visibility::Hidden => {
                tracker.hidden(now);
                return None;
            }
            Visibility::Visible => tracker.visible(now)?,
        };
        Some(self.record_distraction(gap))
    }

    /// Build the next persistence snapshot and bump the revision.
    pub fn next_update(&mut self, ended_at: Option<DateTime<Utc>>) -> SessionUpdate {
        self.revision += 1;
        let status = match (ended_at, self.status) {
            (Some(_), _) => SessionStatus::Completed,
            (None, TimerStatus::Paused) => SessionStatus::Paused,
            (None, _) => SessionStatus::Running,
        };

        SessionUpdate {
            revision: self.revision,
            status,
            elapsed_minutes: self.elapsed_seconds / 60,
            distraction_count: self.distraction_count,
            distraction_minutes: self.distraction_seconds / 60,
            pause_count: self.pause_count,
            pause_seconds: self.pause_seconds,
            pause_log: self.pause_log.clone(),
            completed_cycles: self.completed_cycles,
            ended_at,
            updated_at: Utc::now(),
        }
    }

    /// Copy of the finished session marked Stopped; `self` goes back to Idle.
    pub fn finish(&mut self) -> TimerState {
        let mut finished = std::mem::take(self);
        finished.status = TimerStatus::Stopped;
        finished.visibility = None;
        finished.pause_started = None;
        finished
    }
}
