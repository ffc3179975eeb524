//! The persistence collaborator the timer engine talks to.
//!
//! The engine only ever creates a session once per `start`, pushes
//! absolute snapshots keyed by id, and reads sessions back for statistics.
//! Implementations must treat `update_session` as an upsert: repeating an
//! update is harmless and an older `revision` never overwrites a newer one.

pub mod rest;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{NewSession, SessionFilter, SessionRecord, SessionUpdate};

pub use rest::RestSessionStore;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a session and return its id.
    async fn create_session(&self, session: &NewSession) -> Result<String>;

    async fn update_session(&self, session_id: &str, update: &SessionUpdate) -> Result<()>;

    /// Sessions matching `filter`, newest first.
    async fn list_sessions(&self, filter: &SessionFilter) -> Result<Vec<SessionRecord>>;
}

pub type SharedStore = Arc<dyn SessionStore>;
