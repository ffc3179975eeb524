use serde::Serialize;

use super::{PomodoroPhase, TimerSnapshot, TimerState};

/// Everything the engine tells the outside world. Delivered over a
/// broadcast channel; none of these change counters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "type")]
pub enum TimerEvent {
    StateChanged {
        state: TimerState,
    },
    Heartbeat {
        elapsed_seconds: u64,
        focused_seconds: u64,
    },
    Milestone {
        elapsed_seconds: u64,
    },
    DistractionRecorded {
        lost_seconds: u64,
        distraction_count: u32,
    },
    PhaseChanged {
        phase: PomodoroPhase,
        completed_cycles: u32,
    },
    SyncFailed {
        session_id: String,
        message: String,
    },
    SessionCompleted {
        session: TimerSnapshot,
    },
}

impl TimerEvent {
    /// Whether this event should sound the chime.
    pub fn is_alert(&self) -> bool {
        matches!(
            self,
            TimerEvent::Milestone { .. } | TimerEvent::PhaseChanged { .. }
        )
    }
}
