mod cancel;
mod consumer;
mod core;
mod state;
mod trigger;


pub use self::cancel::{CancellationCoordinator, GenerationTicket};
pub use self::core::STOPPED_SUFFIX;
pub use self::state::{GenerationHandle, Session, SessionBuilder, SessionSnapshot};
pub use self::trigger::AutoTriggerGuard;
