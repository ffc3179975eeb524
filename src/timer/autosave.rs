use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{broadcast, Mutex},
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use super::{TimerEvent, TimerState, TimerStatus};
use crate::store::SharedStore;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Push the current counters every `period` while a session is open.
///
/// Each attempt is bounded by `period`. A failed or timed out attempt is
/// reported and left for the next interval to supersede. Exits once the
/// session is no longer Running or Paused, or when cancelled.
pub(crate) async fn autosave_loop(
    state: Arc<Mutex<TimerState>>,
    store: SharedStore,
    events: broadcast::Sender<TimerEvent>,
    period: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let (session_id, update) = {
            let mut guard = state.lock().await;
            let open = matches!(guard.status, TimerStatus::Running | TimerStatus::Paused);
            match (open, guard.session_id.clone()) {
                (true, Some(session_id)) => (session_id, guard.next_update(None)),
                _ => break,
            }
        };

        let attempt = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            result = time::timeout(period, store.update_session(&session_id, &update)) => result,
        };

        let failure = match attempt {
            Ok(Ok(())) => {
                log_info!(
                    "autosaved session {} (revision {}, {} min)",
                    session_id,
                    update.revision,
                    update.elapsed_minutes
                );
                None
            }
            Ok(Err(err)) => {
                log_error!("autosave failed for session {}: {err:#}", session_id);
                Some(format!("{err:#}"))
            }
            Err(_) => {
                log_warn!(
                    "autosave timed out (> {}s) for session {}",
                    period.as_secs(),
                    session_id
                );
                Some(format!("autosave timed out after {}s", period.as_secs()))
            }
        };

        if let Some(message) = failure {
            let _ = events.send(TimerEvent::SyncFailed {
                session_id,
                message,
            });
        }
    }

    log_info!("autosave loop shutting down");
}
