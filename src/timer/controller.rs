use std::{future::Future, sync::Arc, time::Duration};

use chrono::Utc;
use log::{error, info, warn};
use serde::Serialize;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use super::{
    autosave::autosave_loop, state::DEFAULT_MILESTONE_SECS, TimerError, TimerEvent, TimerMode,
    TimerState, TimerStatus, Visibility,
};
use crate::{models::NewSession, store::SharedStore};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub state: TimerState,
    pub focused_seconds: u64,
}

impl From<TimerState> for TimerSnapshot {
    fn from(state: TimerState) -> Self {
        Self {
            focused_seconds: state.focused_seconds(),
            state,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimerConfig {
    pub tick_interval: Duration,
    /// Running seconds between milestone alerts.
    pub milestone_every_secs: u64,
    pub autosave_interval: Duration,
    pub heartbeat_every_ticks: u32,
    /// Upper bound on the final flush made by `stop`.
    pub final_flush_timeout: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            milestone_every_secs: DEFAULT_MILESTONE_SECS,
            autosave_interval: Duration::from_secs(30),
            heartbeat_every_ticks: 10,
            final_flush_timeout: Duration::from_secs(10),
        }
    }
}

/// A spawned periodic task. Dropping it cancels and aborts the task.
struct ScheduledTask {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    fn spawn<F, Fut>(task: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(task(cancel_token.clone()));
        Self {
            cancel_token,
            handle,
        }
    }

    async fn shutdown(mut self, name: &str) {
        self.cancel_token.cancel();
        if let Err(err) = (&mut self.handle).await {
            if !err.is_cancelled() {
                error!("{name} task failed to join: {err}");
            }
        }
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel_token.cancel();
        self.handle.abort();
    }
}

#[derive(Default)]
struct Schedules {
    ticker: Option<ScheduledTask>,
    autosave: Option<ScheduledTask>,
}

/// Owns one focus session at a time.
///
/// Cloning yields another handle to the same timer. All counter mutation
/// happens under the state lock, so ticks, visibility signals and control
/// calls never observe each other half-applied. Control calls are also
/// serialized among themselves, which keeps a second `start` from racing the
/// first one's session creation.
#[derive(Clone)]
pub struct TimerController {
    state: Arc<Mutex<TimerState>>,
    store: SharedStore,
    events: broadcast::Sender<TimerEvent>,
    schedules: Arc<Mutex<Schedules>>,
    control: Arc<Mutex<()>>,
    config: TimerConfig,
}

impl TimerController {
    pub fn new(store: SharedStore, config: TimerConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(TimerState::new())),
            store,
            events,
            schedules: Arc::new(Mutex::new(Schedules::default())),
            control: Arc::new(Mutex::new(())),
            config,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.events.subscribe()
    }

    pub async fn get_state(&self) -> TimerState {
        self.state.lock().await.clone()
    }

    pub async fn get_snapshot(&self) -> TimerSnapshot {
        TimerSnapshot::from(self.get_state().await)
    }

    /// Whether any tick or autosave task is still scheduled.
    pub async fn has_active_schedules(&self) -> bool {
        let schedules = self.schedules.lock().await;
        schedules.ticker.is_some() || schedules.autosave.is_some()
    }

    pub async fn start(&self, mode: TimerMode) -> Result<TimerSnapshot, TimerError> {
        let _control = self.control.lock().await;

        {
            let state = self.state.lock().await;
            if state.status != TimerStatus::Idle {
                return Err(TimerError::InvalidTransition {
                    action: "start",
                    status: state.status,
                });
            }
        }

        let started_at = Utc::now();
        let draft = NewSession {
            started_at,
            concentration_mode: mode.is_concentration(),
        };

        let session_id = self.store.create_session(&draft).await.map_err(|err| {
            error!("Failed to create focus session: {err:#}");
            TimerError::CreationFailed(err)
        })?;

        {
            let mut state = self.state.lock().await;
            state.begin_session(
                session_id.clone(),
                mode,
                started_at,
                self.config.milestone_every_secs,
            );
        }

        self.spawn_ticker().await;
        self.spawn_autosave().await;

        info!("Started focus session {session_id} ({mode:?})");
        self.emit_state_changed().await;

        Ok(self.get_snapshot().await)
    }

    pub async fn pause(&self, reason: Option<String>) -> Result<TimerSnapshot, TimerError> {
        let _control = self.control.lock().await;

        {
            let mut state = self.state.lock().await;
            if state.status != TimerStatus::Running {
                return Err(TimerError::InvalidTransition {
                    action: "pause",
                    status: state.status,
                });
            }
            state.begin_pause(reason, Instant::now());
        }

        self.cancel_ticker().await;
        self.emit_state_changed().await;

        Ok(self.get_snapshot().await)
    }

    pub async fn resume(&self, reason: &str) -> Result<TimerSnapshot, TimerError> {
        let _control = self.control.lock().await;

        {
            let mut state = self.state.lock().await;
            if state.status != TimerStatus::Paused {
                return Err(TimerError::InvalidTransition {
                    action: "resume",
                    status: state.status,
                });
            }
            if let Some(entry) = state.end_pause(reason, Instant::now(), Utc::now()) {
                info!("Pause ended after {}s ({})", entry.duration, entry.reason);
            }
            state.resume();
        }

        self.spawn_ticker().await;
        self.emit_state_changed().await;

        Ok(self.get_snapshot().await)
    }

    /// End the session, flush the final snapshot and return it.
    ///
    /// A failed final flush is reported as `SyncFailed` but does not fail
    /// the stop: the session is over either way.
    pub async fn stop(&self) -> Result<TimerSnapshot, TimerError> {
        let _control = self.control.lock().await;

        let (finished, update) = {
            let mut state = self.state.lock().await;
            if !matches!(state.status, TimerStatus::Running | TimerStatus::Paused) {
                return Err(TimerError::InvalidTransition {
                    action: "stop",
                    status: state.status,
                });
            }

            if state.status == TimerStatus::Paused {
                state.end_pause("", Instant::now(), Utc::now());
            }
            let update = state.next_update(Some(Utc::now()));
            (state.finish(), update)
        };

        self.cancel_schedules().await;

        if let Some(session_id) = finished.session_id.clone() {
            let flush = time::timeout(
                self.config.final_flush_timeout,
                self.store.update_session(&session_id, &update),
            )
            .await;

            let failure = match flush {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(format!("{err:#}")),
                Err(_) => Some("final flush timed out".to_string()),
            };
            if let Some(message) = failure {
                error!("Failed to save final snapshot of session {session_id}: {message}");
                let _ = self.events.send(TimerEvent::SyncFailed {
                    session_id: session_id.clone(),
                    message,
                });
            }

            info!(
                "Stopped focus session {session_id}: {}s elapsed, {} distractions, {} pauses",
                finished.elapsed_seconds, finished.distraction_count, finished.pause_count
            );
        }

        let snapshot = TimerSnapshot::from(finished);
        self.emit_state_changed().await;
        let _ = self.events.send(TimerEvent::SessionCompleted {
            session: snapshot.clone(),
        });

        Ok(snapshot)
    }

    /// Stop whatever is open. Used when the front end goes away.
    pub async fn shutdown(&self) -> Option<TimerSnapshot> {
        match self.stop().await {
            Ok(snapshot) => Some(snapshot),
            Err(TimerError::InvalidTransition { .. }) => {
                self.cancel_schedules().await;
                None
            }
            Err(err) => {
                warn!("Shutdown could not stop the timer cleanly: {err}");
                None
            }
        }
    }

    /// Feed a foreground/background signal. Returns the seconds counted as
    /// distraction when a hidden interval closes.
    pub async fn visibility_changed(&self, visibility: Visibility) -> Option<u64> {
        let mut state = self.state.lock().await;
        let lost_seconds = state.visibility_changed(visibility, Instant::now())?;
        let _ = self.events.send(TimerEvent::DistractionRecorded {
            lost_seconds,
            distraction_count: state.distraction_count,
        });
        Some(lost_seconds)
    }

    async fn spawn_ticker(&self) {
        let state = self.state.clone();
        let events = self.events.clone();
        let period = self.config.tick_interval;
        let heartbeat_every = self.config.heartbeat_every_ticks.max(1);

        let task = ScheduledTask::spawn(move |cancel_token| async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut ticks: u32 = 0;

            loop {
                tokio::select! {
                    biased;
                    _ = cancel_token.cancelled() => break,
                    _ = interval.tick() => {}
                }

                let (outcome, elapsed_seconds, focused_seconds, completed_cycles) = {
                    let mut guard = state.lock().await;
                    if guard.status != TimerStatus::Running {
                        break;
                    }
                    let outcome = guard.tick();
                    (
                        outcome,
                        guard.elapsed_seconds,
                        guard.focused_seconds(),
                        guard.completed_cycles,
                    )
                };

                ticks = ticks.wrapping_add(1);
                if ticks % heartbeat_every == 0 {
                    let _ = events.send(TimerEvent::Heartbeat {
                        elapsed_seconds,
                        focused_seconds,
                    });
                }
                if outcome.milestone {
                    let _ = events.send(TimerEvent::Milestone { elapsed_seconds });
                }
                if let Some(phase) = outcome.phase_changed {
                    let _ = events.send(TimerEvent::PhaseChanged {
                        phase,
                        completed_cycles,
                    });
                }
            }
        });

        let previous = self.schedules.lock().await.ticker.replace(task);
        if let Some(previous) = previous {
            previous.shutdown("ticker").await;
        }
    }

    async fn spawn_autosave(&self) {
        let state = self.state.clone();
        let store = self.store.clone();
        let events = self.events.clone();
        let period = self.config.autosave_interval;

        let task = ScheduledTask::spawn(move |cancel_token| {
            autosave_loop(state, store, events, period, cancel_token)
        });

        let previous = self.schedules.lock().await.autosave.replace(task);
        if let Some(previous) = previous {
            previous.shutdown("autosave").await;
        }
    }

    async fn cancel_ticker(&self) {
        let ticker = self.schedules.lock().await.ticker.take();
        if let Some(ticker) = ticker {
            ticker.shutdown("ticker").await;
        }
    }

    async fn cancel_schedules(&self) {
        let (ticker, autosave) = {
            let mut schedules = self.schedules.lock().await;
            (schedules.ticker.take(), schedules.autosave.take())
        };
        if let Some(ticker) = ticker {
            ticker.shutdown("ticker").await;
        }
        if let Some(autosave) = autosave {
            autosave.shutdown("autosave").await;
        }
    }

    async fn emit_state_changed(&self) {
        let state = self.state.lock().await.clone();
        let _ = self.events.send(TimerEvent::StateChanged { state });
    }
}
