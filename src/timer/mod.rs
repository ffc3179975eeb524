mod autosave;
pub mod commands;
pub mod controller;
pub mod error;
pub mod events;
pub mod state;
pub mod visibility;

pub use controller::{TimerConfig, TimerController, TimerSnapshot};
pub use error::TimerError;
pub use events::TimerEvent;
pub use state::{PomodoroPhase, TimerMode, TimerState, TimerStatus};
pub use visibility::{Visibility, VisibilityTracker};
