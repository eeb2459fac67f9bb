pub mod api;
pub mod config;
pub mod error;
pub mod history;
pub mod state;
pub mod types;
pub mod util;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Config;
pub use error::{ErrorKind, FailedTurn, GenerationError};
pub use state::{MemoryDraft, Session};
