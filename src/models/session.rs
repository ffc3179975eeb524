use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PauseEntry;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Running,
    Paused,
    Completed,
    Interrupted,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "Running",
            SessionStatus::Paused => "Paused",
            SessionStatus::Completed => "Completed",
            SessionStatus::Interrupted => "Interrupted",
        }
    }
}

impl FromStr for SessionStatus {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Running" => Ok(SessionStatus::Running),
            "Paused" => Ok(SessionStatus::Paused),
            "Completed" => Ok(SessionStatus::Completed),
            "Interrupted" => Ok(SessionStatus::Interrupted),
            other => Err(anyhow::anyhow!("unknown session status {other}")),
        }
    }
}

/// Payload for `SessionStore::create_session`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    pub started_at: DateTime<Utc>,
    pub concentration_mode: bool,
}

/// Partial snapshot pushed by autosave and by the final flush on stop.
///
/// Elapsed and distraction time are whole minutes, pause time is seconds.
/// `revision` only grows within a session; stores drop updates older than
/// what they already hold.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdate {
    pub revision: u64,
    pub status: SessionStatus,
    pub elapsed_minutes: u64,
    pub distraction_count: u32,
    pub distraction_minutes: u64,
    pub pause_count: u32,
    pub pause_seconds: u64,
    pub pause_log: Vec<PauseEntry>,
    pub completed_cycles: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted session as returned by `SessionStore::list_sessions`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub concentration_mode: bool,
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub elapsed_minutes: u64,
    #[serde(default)]
    pub distraction_count: u32,
    #[serde(default)]
    pub distraction_minutes: u64,
    #[serde(default)]
    pub pause_count: u32,
    #[serde(default)]
    pub pause_seconds: u64,
    #[serde(default)]
    pub pause_log: Vec<PauseEntry>,
    #[serde(default)]
    pub completed_cycles: u32,
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn from_new(id: String, new: &NewSession) -> Self {
        Self {
            id,
            started_at: new.started_at,
            ended_at: None,
            status: SessionStatus::Running,
            concentration_mode: new.concentration_mode,
            revision: 0,
            elapsed_minutes: 0,
            distraction_count: 0,
            distraction_minutes: 0,
            pause_count: 0,
            pause_seconds: 0,
            pause_log: Vec::new(),
            completed_cycles: 0,
            updated_at: new.started_at,
        }
    }

    /// Last-write-wins merge. Returns false when the update is stale.
    pub fn apply(&mut self, update: &SessionUpdate) -> bool {
        if update.revision < self.revision {
            return false;
        }
        self.revision = update.revision;
        self.status = update.status;
        self.elapsed_minutes = update.elapsed_minutes;
        self.distraction_count = update.distraction_count;
        self.distraction_minutes = update.distraction_minutes;
        self.pause_count = update.pause_count;
        self.pause_seconds = update.pause_seconds;
        self.pause_log = update.pause_log.clone();
        self.completed_cycles = update.completed_cycles;
        if update.ended_at.is_some() {
            self.ended_at = update.ended_at;
        }
        self.updated_at = update.updated_at;
        true
    }
}

/// Read-path filter for `SessionStore::list_sessions`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    pub concentration_mode: Option<bool>,
    pub limit: Option<usize>,
}

impl SessionFilter {
    pub fn concentration() -> Self {
        Self {
            concentration_mode: Some(true),
            limit: None,
        }
    }

    pub fn matches(&self, record: &SessionRecord) -> bool {
        self.concentration_mode
            .map_or(true, |flag| record.concentration_mode == flag)
    }
}
