mod progress;
mod service;
mod store;
mod timer;
mod view;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::{SessionError, SessionLoopError};
pub use progress::SessionProgress;
pub use service::{ExamSession, FinishOutcome, Navigation, Selection, TickOutcome};
pub use store::SessionStore;
pub use timer::{ExamTimer, TICK_PERIOD};
pub use view::{AttemptListItem, recent_attempts};
pub use workflow::SessionLoopService;
