//! Camera registry: enumeration merge and exclusive reservations
//!
//! The registry is the only owner of camera state. Reservation is a
//! single check-and-set under the registry lock so two streams can
//! never both believe they reserved the same camera.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use super::device::{CameraDevice, CameraStatus};

struct CameraSlot {
    device: CameraDevice,
    reserved_by: Option<String>,
    last_seen: DateTime<Utc>,
}

/// Keyed arena of known capture devices.
#[derive(Default)]
pub struct CameraRegistry {
    slots: Mutex<HashMap<String, CameraSlot>>,
}

impl CameraRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CameraSlot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Merge a fresh enumeration pass into the stored set.
    ///
    /// Existing entries keep their reservation holder; their status
    /// becomes `InUse` while held, else the enumerated status. Entries
    /// not present in this pass are marked `Disconnected` but never
    /// purged, so an in-flight reservation is not silently lost.
    pub fn merge_discovered(&self, devices: Vec<CameraDevice>) {
        let now = Utc::now();
        let mut slots = self.lock();

        let mut seen: HashSet<String> = HashSet::with_capacity(devices.len());
        for device in devices {
            seen.insert(device.id.clone());

            match slots.get_mut(&device.id) {
                Some(slot) => {
                    let status = if slot.reserved_by.is_some() {
                        CameraStatus::InUse
                    } else {
                        device.status
                    };
                    slot.device = CameraDevice { status, ..device };
                    slot.last_seen = now;
                }
                None => {
                    slots.insert(
                        device.id.clone(),
                        CameraSlot {
                            device,
                            reserved_by: None,
                            last_seen: now,
                        },
                    );
                }
            }
        }

        for (id, slot) in slots.iter_mut() {
            if !seen.contains(id) {
                slot.device.status = CameraStatus::Disconnected;
            }
        }
    }

    /// All known cameras, including disconnected ones.
    pub fn snapshot(&self) -> Vec<CameraDevice> {
        self.lock().values().map(|slot| slot.device.clone()).collect()
    }

    pub fn get(&self, id: &str) -> Option<CameraDevice> {
        self.lock().get(id).map(|slot| slot.device.clone())
    }

    /// Reserve a camera for a stream session.
    ///
    /// Fails if the camera is unknown, already held, or in a
    /// `Disconnected`/`Error` state. Not a queue: a losing caller just
    /// gets `false`.
    pub fn reserve(&self, camera_id: &str, session_id: &str) -> bool {
        let mut slots = self.lock();
        let Some(slot) = slots.get_mut(camera_id) else {
            return false;
        };

        if slot.reserved_by.is_some() {
            return false;
        }
        if matches!(
            slot.device.status,
            CameraStatus::Disconnected | CameraStatus::Error
        ) {
            return false;
        }

        slot.reserved_by = Some(session_id.to_string());
        slot.device.status = CameraStatus::InUse;
        true
    }

    /// Release a camera. Only the holding session may release; a
    /// mismatched session id leaves the reservation untouched.
    pub fn release(&self, camera_id: &str, session_id: &str) -> bool {
        let mut slots = self.lock();
        let Some(slot) = slots.get_mut(camera_id) else {
            return false;
        };

        if slot.reserved_by.as_deref() != Some(session_id) {
            return false;
        }

        slot.reserved_by = None;
        slot.device.status = CameraStatus::Available;
        true
    }

    /// Session currently holding a camera, if any.
    pub fn reservation_holder(&self, camera_id: &str) -> Option<String> {
        self.lock().get(camera_id).and_then(|slot| slot.reserved_by.clone())
    }

    /// Whether the camera exists, is unreserved, and is free to use.
    pub fn is_available(&self, camera_id: &str) -> bool {
        self.lock()
            .get(camera_id)
            .map(|slot| {
                slot.reserved_by.is_none() && slot.device.status == CameraStatus::Available
            })
            .unwrap_or(false)
    }

    pub fn last_seen(&self, camera_id: &str) -> Option<DateTime<Utc>> {
        self.lock().get(camera_id).map(|slot| slot.last_seen)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::camera::CameraKind;

    fn camera(id: &str) -> CameraDevice {
        CameraDevice::new(id, format!("Camera {}", id), CameraKind::Usb)
    }

    fn registry_with(ids: &[&str]) -> CameraRegistry {
        let registry = CameraRegistry::new();
        registry.merge_discovered(ids.iter().map(|id| camera(id)).collect());
        registry
    }

    #[test]
    fn reserve_succeeds_on_free_camera() {
        let registry = registry_with(&["cam-1"]);
        assert!(registry.reserve("cam-1", "s1"));
        assert_eq!(registry.get("cam-1").unwrap().status, CameraStatus::InUse);
        assert_eq!(registry.reservation_holder("cam-1").as_deref(), Some("s1"));
    }

    #[test]
    fn second_reserve_on_held_camera_fails() {
        let registry = registry_with(&["cam-1"]);
        assert!(registry.reserve("cam-1", "s1"));
        assert!(!registry.reserve("cam-1", "s2"));
        // still held by the first session
        assert_eq!(registry.reservation_holder("cam-1").as_deref(), Some("s1"));
    }

    #[test]
    fn reserve_unknown_camera_fails() {
        let registry = registry_with(&["cam-1"]);
        assert!(!registry.reserve("cam-2", "s1"));
    }

    #[test]
    fn reserve_disconnected_camera_fails() {
        let registry = registry_with(&["cam-1", "cam-2"]);
        // a pass that no longer sees cam-2 marks it disconnected
        registry.merge_discovered(vec![camera("cam-1")]);
        assert_eq!(
            registry.get("cam-2").unwrap().status,
            CameraStatus::Disconnected
        );
        assert!(!registry.reserve("cam-2", "s1"));
    }

    #[test]
    fn release_requires_holding_session() {
        let registry = registry_with(&["cam-1"]);
        registry.reserve("cam-1", "s1");

        assert!(!registry.release("cam-1", "s2"));
        assert_eq!(registry.reservation_holder("cam-1").as_deref(), Some("s1"));

        assert!(registry.release("cam-1", "s1"));
        assert!(registry.reservation_holder("cam-1").is_none());
        assert_eq!(
            registry.get("cam-1").unwrap().status,
            CameraStatus::Available
        );
    }

    #[test]
    fn release_unknown_camera_fails() {
        let registry = registry_with(&["cam-1"]);
        assert!(!registry.release("cam-9", "s1"));
    }

    #[test]
    fn is_available_combines_existence_holder_and_status() {
        let registry = registry_with(&["cam-1"]);
        assert!(registry.is_available("cam-1"));
        assert!(!registry.is_available("cam-9"));

        registry.reserve("cam-1", "s1");
        assert!(!registry.is_available("cam-1"));

        registry.release("cam-1", "s1");
        assert!(registry.is_available("cam-1"));
    }

    #[test]
    fn refresh_preserves_reservation() {
        let registry = registry_with(&["cam-1"]);
        registry.reserve("cam-1", "s1");

        // the camera shows up again in a later pass
        registry.merge_discovered(vec![camera("cam-1")]);

        assert_eq!(registry.reservation_holder("cam-1").as_deref(), Some("s1"));
        assert_eq!(registry.get("cam-1").unwrap().status, CameraStatus::InUse);
    }

    #[test]
    fn refresh_marks_unseen_disconnected_without_purging() {
        let registry = registry_with(&["cam-1", "cam-2"]);
        registry.reserve("cam-2", "s1");

        registry.merge_discovered(vec![camera("cam-1")]);

        let cam2 = registry.get("cam-2").unwrap();
        assert_eq!(cam2.status, CameraStatus::Disconnected);
        // reservation metadata survives for diagnostics
        assert_eq!(registry.reservation_holder("cam-2").as_deref(), Some("s1"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn refresh_updates_device_metadata() {
        let registry = registry_with(&["cam-1"]);

        let mut updated = camera("cam-1");
        updated.name = "Renamed Camera".to_string();
        registry.merge_discovered(vec![updated]);

        assert_eq!(registry.get("cam-1").unwrap().name, "Renamed Camera");
    }
}
