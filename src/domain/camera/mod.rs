//! Camera devices and the reservation registry

pub mod device;
pub mod registry;

pub use device::{infer_camera_kind, CameraCapabilities, CameraDevice, CameraKind, CameraStatus};
pub use registry::CameraRegistry;
