//! Camcast - camera-to-HLS live streaming orchestration engine
//!
//! Camcast supervises per-camera live publishing sessions: it reserves
//! a capture device, launches and supervises an external ffmpeg
//! process that turns the device's feed into segmented HLS output,
//! waits for that output to become consumable, and tears everything
//! down cleanly on request or failure.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: camera and session entities, registries, the encoder
//!   state machine, errors
//! - **Application**: the stream coordinator use case and port
//!   interfaces (traits) for device enumeration, invocation planning,
//!   and disk probing
//! - **Infrastructure**: adapter implementations (encoder process
//!   workers, ffmpeg device discovery, HLS layout and cleanup)
//!
//! The HTTP layer is not part of this crate; it consumes
//! [`application::StreamCoordinator`] as the session API surface.

pub mod application;
pub mod domain;
pub mod infrastructure;
