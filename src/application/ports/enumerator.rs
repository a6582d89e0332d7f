//! Device enumeration port

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::camera::CameraDevice;

/// Enumeration errors
#[derive(Debug, Clone, Error)]
pub enum EnumerationError {
    #[error("Failed to run device discovery: {0}")]
    DiscoveryFailed(String),

    #[error("Device discovery is not supported on this platform")]
    Unsupported,
}

/// Port for platform-specific capture device enumeration.
///
/// Returns a best-effort current device list; failures propagate as
/// enumeration errors and never poison the registry's stored set.
#[async_trait]
pub trait DeviceEnumerator: Send + Sync {
    async fn enumerate(&self) -> Result<Vec<CameraDevice>, EnumerationError>;
}
