//! Encoder worker state machine, lifecycle events, and progress parsing

pub mod lifecycle;
pub mod progress;

pub use lifecycle::{InvalidStateTransition, WorkerEvent, WorkerLifecycle, WorkerState};
pub use progress::{parse_progress, EncoderProgress};
