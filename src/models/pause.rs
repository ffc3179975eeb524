use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reason recorded when neither pause nor resume supplied one.
pub const NO_REASON: &str = "No reason given";

/// One closed pause in a session's pause log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PauseEntry {
    pub reason: String,
    /// Whole seconds spent paused.
    pub duration: u64,
    /// When the pause ended.
    pub timestamp: DateTime<Utc>,
}

impl PauseEntry {
    pub fn new(reason: &str, duration: u64, timestamp: DateTime<Utc>) -> Self {
        let reason = reason.trim();
        Self {
            reason: if reason.is_empty() {
                NO_REASON.to_string()
            } else {
                reason.to_string()
            },
            duration,
            timestamp,
        }
    }
}
