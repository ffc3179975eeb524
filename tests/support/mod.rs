#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use studyfocus_lib::models::{
    NewSession, SessionFilter, SessionRecord, SessionUpdate,
};
use studyfocus_lib::store::SessionStore;
use studyfocus_lib::timer::{TimerConfig, TimerController, TimerEvent};
use tokio::sync::broadcast::{self, error::TryRecvError};

/// In-process store that records every call.
#[derive(Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<String, SessionRecord>>,
    updates: Mutex<Vec<(String, SessionUpdate)>>,
    next_id: AtomicUsize,
    pub fail_create: AtomicBool,
    pub fail_updates: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_create() -> Arc<Self> {
        let store = Self::default();
        store.fail_create.store(true, Ordering::SeqCst);
        Arc::new(store)
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn updates(&self) -> Vec<(String, SessionUpdate)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn last_update(&self) -> Option<SessionUpdate> {
        self.updates.lock().unwrap().last().map(|(_, u)| u.clone())
    }

    pub fn record(&self, id: &str) -> Option<SessionRecord> {
        self.sessions.lock().unwrap().get(id).cloned()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(&self, session: &NewSession) -> Result<String> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(anyhow!("backend unavailable"));
        }
        let id = format!("session-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.sessions
            .lock()
            .unwrap()
            .insert(id.clone(), SessionRecord::from_new(id.clone(), session));
        Ok(id)
    }

    async fn update_session(&self, session_id: &str, update: &SessionUpdate) -> Result<()> {
        self.updates
            .lock()
            .unwrap()
            .push((session_id.to_string(), update.clone()));
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(anyhow!("network unreachable"));
        }
        let mut sessions = self.sessions.lock().unwrap();
        let record = sessions
            .get_mut(session_id)
            .ok_or_else(|| anyhow!("unknown session {session_id}"))?;
        record.apply(update);
        Ok(())
    }

    async fn list_sessions(&self, filter: &SessionFilter) -> Result<Vec<SessionRecord>> {
        let mut sessions: Vec<SessionRecord> = self
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        if let Some(limit) = filter.limit {
            sessions.truncate(limit);
        }
        Ok(sessions)
    }
}

pub fn controller(store: &Arc<MemoryStore>) -> TimerController {
    TimerController::new(store.clone(), TimerConfig::default())
}

pub fn drain(events: &mut broadcast::Receiver<TimerEvent>) -> Vec<TimerEvent> {
    let mut out = Vec::new();
    loop {
        match events.try_recv() {
            Ok(event) => out.push(event),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    out
}
