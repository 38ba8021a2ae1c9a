//! Interfaces between the App and the outside world.
pub mod emitter;

pub use emitter::{EmitterError, EmitterResult, ResponseEmitter, ResponseHead};
