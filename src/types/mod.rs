mod message;
mod wire;

pub use message::{Message, Role};
pub use wire::{GenerationRequest, StreamRecord};
