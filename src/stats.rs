//! Aggregate totals over stored sessions.

use serde::Serialize;

use crate::models::SessionRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTotals {
    pub sessions: u32,
    /// Elapsed minutes minus distraction minutes, summed.
    pub focus_minutes: u64,
    pub distractions: u32,
    pub distraction_minutes: u64,
    pub breaks: u32,
    pub break_seconds: u64,
    pub pomodoro_cycles: u32,
}

impl SessionTotals {
    pub fn from_sessions(sessions: &[SessionRecord]) -> Self {
        sessions.iter().fold(Self::default(), |mut totals, s| {
            totals.sessions += 1;
            totals.focus_minutes += s.elapsed_minutes.saturating_sub(s.distraction_minutes);
            totals.distractions += s.distraction_count;
            totals.distraction_minutes += s.distraction_minutes;
            totals.breaks += s.pause_count;
            totals.break_seconds += s.pause_seconds;
            totals.pomodoro_cycles += s.completed_cycles;
            totals
        })
    }

    /// Total focus time as (hours, minutes).
    pub fn focus_time(&self) -> (u64, u64) {
        (self.focus_minutes / 60, self.focus_minutes % 60)
    }

    pub fn average_focus_minutes(&self) -> u64 {
        if self.sessions == 0 {
            0
        } else {
            self.focus_minutes / u64::from(self.sessions)
        }
    }
}
