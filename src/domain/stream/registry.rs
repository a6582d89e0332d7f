//! Stream session registry
//!
//! Owned, keyed arena of session records. All status mutation goes
//! through the registry so monotonicity is enforced in one place.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use uuid::Uuid;

use super::options::StreamOptions;
use super::session::{StreamSession, StreamStatus};

/// Listing filter for the session API surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionFilter {
    All,
    /// Starting or running sessions
    Active,
    /// Sessions consuming a specific camera
    Camera(String),
}

struct SessionEntry {
    session: StreamSession,
    updated_at: Instant,
}

/// Keyed arena of stream session records.
#[derive(Default)]
pub struct StreamRegistry {
    entries: Mutex<HashMap<String, SessionEntry>>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a new session record in `Starting` state.
    pub fn create(&self, camera_id: &str, options: &StreamOptions) -> StreamSession {
        let session = StreamSession::new(Uuid::new_v4().to_string(), camera_id, options);
        self.lock().insert(
            session.id.clone(),
            SessionEntry {
                session: session.clone(),
                updated_at: Instant::now(),
            },
        );
        session
    }

    pub fn get(&self, id: &str) -> Option<StreamSession> {
        self.lock().get(id).map(|entry| entry.session.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    pub fn list(&self, filter: &SessionFilter) -> Vec<StreamSession> {
        self.lock()
            .values()
            .filter(|entry| match filter {
                SessionFilter::All => true,
                SessionFilter::Active => entry.session.status.is_active(),
                SessionFilter::Camera(camera_id) => entry.session.camera_id == *camera_id,
            })
            .map(|entry| entry.session.clone())
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.lock()
            .values()
            .filter(|entry| entry.session.status.is_active())
            .count()
    }

    /// Ids of every tracked session, regardless of status.
    pub fn tracked_ids(&self) -> HashSet<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn mark_running(&self, id: &str, hls_url: &str) -> Option<StreamSession> {
        self.update(id, |session| session.mark_running(hls_url))
    }

    pub fn mark_stopped(&self, id: &str) -> Option<StreamSession> {
        self.update(id, |session| session.mark_stopped())
    }

    pub fn mark_error(&self, id: &str, message: &str) -> Option<StreamSession> {
        self.update(id, |session| session.mark_error(message))
    }

    fn update(
        &self,
        id: &str,
        apply: impl FnOnce(&mut StreamSession) -> bool,
    ) -> Option<StreamSession> {
        let mut entries = self.lock();
        let entry = entries.get_mut(id)?;
        if apply(&mut entry.session) {
            entry.updated_at = Instant::now();
        }
        Some(entry.session.clone())
    }

    pub fn remove(&self, id: &str) -> bool {
        self.lock().remove(id).is_some()
    }

    /// Remove stopped/errored records untouched for longer than
    /// `max_age`. Returns how many were evicted.
    pub fn evict_finished(&self, max_age: Duration) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| {
            !(entry.session.status.is_terminal() && entry.updated_at.elapsed() > max_age)
        });
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
