//! Console notifications for timer events.

use std::time::Duration;

use log::warn;
use tokio::{
    sync::broadcast::{self, error::RecvError, error::TryRecvError},
    task::JoinHandle,
    time,
};
use tokio_util::sync::CancellationToken;

use crate::audio::ChimePlayer;
use crate::timer::{commands::format_duration, TimerEvent};

const FINISH_TIMEOUT: Duration = Duration::from_secs(2);

/// User-facing line for an event, if it deserves one.
pub(crate) fn notification(event: &TimerEvent) -> Option<String> {
    match event {
        TimerEvent::Milestone { elapsed_seconds } => Some(format!(
            "Milestone: {} into the session. Keep going!",
            format_duration(*elapsed_seconds)
        )),
        TimerEvent::DistractionRecorded {
            lost_seconds,
            distraction_count,
        } => Some(format!(
            "Welcome back. You lost {} to distraction ({} so far).",
            format_duration(*lost_seconds),
            distraction_count
        )),
        TimerEvent::PhaseChanged {
            phase,
            completed_cycles,
        } => Some(format!(
            "{phase:?} phase begins ({completed_cycles} cycles completed)."
        )),
        TimerEvent::SyncFailed { message, .. } => {
            Some(format!("Could not save progress: {message}"))
        }
        TimerEvent::StateChanged { .. }
        | TimerEvent::Heartbeat { .. }
        | TimerEvent::SessionCompleted { .. } => None,
    }
}

/// Background task turning engine events into chimes and messages.
pub(crate) struct Notifier {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Notifier {
    pub(crate) fn spawn<F>(
        mut events: broadcast::Receiver<TimerEvent>,
        chime: ChimePlayer,
        mut sink: F,
    ) -> Self
    where
        F: FnMut(String) + Send + 'static,
    {
        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();

        let handle = tokio::spawn(async move {
            let mut deliver = |event: TimerEvent| {
                if event.is_alert() {
                    if let Err(err) = chime.chime() {
                        warn!("Chime failed: {err:#}");
                    }
                }
                if let Some(line) = notification(&event) {
                    sink(line);
                }
            };

            loop {
                tokio::select! {
                    biased;
                    received = events.recv() => match received {
                        Ok(event) => deliver(event),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("Notifier skipped {skipped} timer events");
                        }
                        Err(RecvError::Closed) => return,
                    },
                    _ = token.cancelled() => break,
                }
            }

            // Whatever was already broadcast still reaches the user.
            loop {
                match events.try_recv() {
                    Ok(event) => deliver(event),
                    Err(TryRecvError::Lagged(_)) => continue,
                    Err(TryRecvError::Empty | TryRecvError::Closed) => break,
                }
            }
        });

        Self {
            cancel_token,
            handle,
        }
    }

    /// Deliver pending events, then stop.
    pub(crate) async fn finish(mut self) {
        self.cancel_token.cancel();
        if time::timeout(FINISH_TIMEOUT, &mut self.handle).await.is_err() {
            warn!("Notifier did not finish within {}s", FINISH_TIMEOUT.as_secs());
            self.handle.abort();
        }
    }
}
