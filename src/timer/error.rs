use thiserror::Error;

use super::TimerStatus;

#[derive(Debug, Error)]
pub enum TimerError {
    /// The operation is not allowed in the current status. State is untouched.
    #[error("cannot {action} while the timer is {}", .status.as_str())]
    InvalidTransition {
        action: &'static str,
        status: TimerStatus,
    },

    /// The store could not create the session; the timer stays idle.
    #[error("could not create a focus session")]
    CreationFailed(#[source] anyhow::Error),
}
