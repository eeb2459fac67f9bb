pub mod draft;
pub mod session;
pub mod versions;

pub use draft::{DraftSource, MemoryDraft};
pub use session::{GenerationHandle, Session, SessionBuilder, SessionSnapshot, STOPPED_SUFFIX};
pub use versions::{derive_versions, CodeVersion, DraftEffect, DraftHooks, VersionSelector};
