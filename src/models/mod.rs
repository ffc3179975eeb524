pub mod pause;
pub mod session;

pub use pause::{PauseEntry, NO_REASON};
pub use session::{NewSession, SessionFilter, SessionRecord, SessionStatus, SessionUpdate};
