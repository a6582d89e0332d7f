//! Stream sessions, quality options, and the session registry

pub mod options;
pub mod registry;
pub mod session;

pub use options::{StreamOptions, DEFAULT_FRAMERATE, DEFAULT_RESOLUTION};
pub use registry::{SessionFilter, StreamRegistry};
pub use session::{StreamSession, StreamStatus};
