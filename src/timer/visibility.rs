//! Foreground/background accounting for a running session.
//!
//! The tracker is attached to the timer state when a session starts and
//! dropped when it stops, so signals that arrive between sessions have
//! nothing to act on. Only a hidden interval that starts and ends while the
//! session is Running becomes a distraction.

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Visibility {
    Hidden,
    Visible,
}

#[derive(Debug, Clone, Default)]
pub struct VisibilityTracker {
    hidden_at: Option<Instant>,
}

impl VisibilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden_at.is_some()
    }

    /// Client went to the background while Running.
    pub fn hidden(&mut self, now: Instant) {
        if self.hidden_at.is_none() {
            self.hidden_at = Some(now);
        }
    }

    /// Client came back while Running. Returns the whole seconds spent hidden,
    /// or `None` when no hidden interval was open.
    pub fn visible(&mut self, now: Instant) -> Option<u64> {
        self.hidden_at
            .take()
            .map(|hidden_at| now.saturating_duration_since(hidden_at).as_secs())
    }

    /// Forget an open hidden interval without counting it.
    pub fn clear(&mut self) {
        self.hidden_at = None;
    }
}
