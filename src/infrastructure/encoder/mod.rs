//! Encoder process supervision adapters

pub mod invocation;
pub mod supervisor;
pub mod worker;

pub use invocation::{TranscodePlanner, HLS_LIST_SIZE, HLS_SEGMENT_DURATION};
pub use supervisor::EncoderSupervisor;
pub use worker::EncoderWorker;
