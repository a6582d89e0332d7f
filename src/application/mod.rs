//! Use cases and port interfaces

pub mod coordinator;
pub mod ports;
pub mod readiness;

pub use coordinator::StreamCoordinator;
pub use readiness::{wait_for_playlist, ReadinessOutcome};
