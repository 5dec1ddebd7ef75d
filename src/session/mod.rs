pub mod controller;
mod dispatch;
pub mod handle;
pub mod history;
pub mod interpreter;
pub mod overlay;
pub mod state;

pub use controller::{SessionController, SessionParts, StopReason};
pub use handle::{SessionCommand, SessionHandle};
pub use history::{HistoryEntry, HISTORY_CAPACITY};
pub use overlay::OverlayState;
pub use state::SessionSnapshot;
