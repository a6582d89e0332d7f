//! Encoder worker registry
//!
//! At most one worker may exist per session id at a time; creating a
//! second handle for an id that already has one fails immediately.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::info;

use crate::application::ports::{InvocationPlanner, TranscodeSpec};
use crate::domain::config::EngineTimeouts;
use crate::domain::encoder::{InvalidStateTransition, WorkerEvent};
use crate::domain::error::StreamError;

use super::worker::EncoderWorker;

/// Owns every active encoder worker, keyed by session id.
pub struct EncoderSupervisor<P: InvocationPlanner> {
    planner: P,
    timeouts: EngineTimeouts,
    workers: Mutex<HashMap<String, Arc<EncoderWorker>>>,
}

impl<P: InvocationPlanner> EncoderSupervisor<P> {
    pub fn new(planner: P, timeouts: EngineTimeouts) -> Self {
        Self {
            planner,
            timeouts,
            workers: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<EncoderWorker>>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Plan, register, and start a worker for a session.
    ///
    /// The registry entry is removed again when the start fails, so a
    /// failed session never leaves a handle behind.
    pub async fn create(
        &self,
        session_id: &str,
        spec: &TranscodeSpec,
    ) -> Result<(Arc<EncoderWorker>, mpsc::UnboundedReceiver<WorkerEvent>), StreamError> {
        let invocation = self.planner.plan(spec);

        let (worker, events) = {
            let mut workers = self.lock();
            if let Some(existing) = workers.get(session_id) {
                return Err(StreamError::InvalidState(InvalidStateTransition {
                    current_state: existing.state(),
                    action: format!("create a second encoder for session {}", session_id),
                }));
            }
            let (worker, events) = EncoderWorker::new(invocation, self.timeouts);
            let worker = Arc::new(worker);
            workers.insert(session_id.to_string(), Arc::clone(&worker));
            (worker, events)
        };

        match worker.start().await {
            Ok(()) => Ok((worker, events)),
            Err(e) => {
                self.lock().remove(session_id);
                Err(e)
            }
        }
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<EncoderWorker>> {
        self.lock().get(session_id).cloned()
    }

    /// Drop the registry entry without stopping the process. Used once
    /// the process has already exited and been reaped.
    pub fn remove(&self, session_id: &str) -> Option<Arc<EncoderWorker>> {
        self.lock().remove(session_id)
    }

    /// Stop a worker gracefully and remove its handle. Returns false
    /// when no worker exists for the session.
    pub async fn remove_and_stop(&self, session_id: &str) -> bool {
        let Some(worker) = self.lock().remove(session_id) else {
            return false;
        };
        worker.stop().await;
        true
    }

    /// Force-kill every worker. Used for whole-engine shutdown; no
    /// encoder process may outlive the coordinator.
    pub fn kill_all(&self) {
        let workers: Vec<(String, Arc<EncoderWorker>)> = self.lock().drain().collect();
        for (session_id, worker) in workers {
            info!(session = %session_id, "killing encoder");
            worker.kill();
        }
    }

    pub fn active_ids(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
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
    use crate::application::ports::Invocation;
    use std::path::PathBuf;
    use std::time::Duration;

    /// Planner producing an inert shell process instead of an encoder.
    struct SleepPlanner;

    impl InvocationPlanner for SleepPlanner {
        fn plan(&self, _spec: &TranscodeSpec) -> Invocation {
            Invocation {
                program: "/bin/sh".into(),
                args: vec!["-c".to_string(), "sleep 30".to_string()],
            }
        }
    }

    struct FailPlanner;

    impl InvocationPlanner for FailPlanner {
        fn plan(&self, _spec: &TranscodeSpec) -> Invocation {
            Invocation {
                program: "/nonexistent/encoder-binary".into(),
                args: vec![],
            }
        }
    }

    fn spec() -> TranscodeSpec {
        TranscodeSpec {
            camera_id: "cam-1".to_string(),
            output_dir: PathBuf::from("/tmp/out"),
            resolution: "1280x720".to_string(),
            framerate: 30,
            video_bitrate: None,
            audio_bitrate: None,
            include_audio: true,
            audio_device_id: None,
        }
    }

    fn quick_timeouts() -> EngineTimeouts {
        EngineTimeouts {
            process_start_grace: Duration::from_millis(200),
            stop_grace: Duration::from_millis(300),
            kill_wait: Duration::from_millis(400),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_registers_one_worker_per_session() {
        let supervisor = EncoderSupervisor::new(SleepPlanner, quick_timeouts());

        let (worker, _events) = supervisor.create("s1", &spec()).await.unwrap();
        assert_eq!(supervisor.len(), 1);
        assert!(supervisor.get("s1").is_some());

        let err = supervisor.create("s1", &spec()).await.unwrap_err();
        assert!(matches!(err, StreamError::InvalidState(_)));
        assert_eq!(supervisor.len(), 1);

        worker.kill();
        supervisor.remove("s1");
    }

    #[tokio::test]
    async fn failed_start_leaves_no_handle_behind() {
        let supervisor = EncoderSupervisor::new(FailPlanner, quick_timeouts());

        let err = supervisor.create("s1", &spec()).await.unwrap_err();
        assert!(matches!(err, StreamError::ProcessSpawn(_)));
        assert!(supervisor.is_empty());

        // the id is reusable immediately
        assert!(supervisor.create("s1", &spec()).await.is_err());
        assert!(supervisor.is_empty());
    }

    #[tokio::test]
    async fn remove_and_stop_removes_the_handle() {
        let supervisor = EncoderSupervisor::new(SleepPlanner, quick_timeouts());
        supervisor.create("s1", &spec()).await.unwrap();

        assert!(supervisor.remove_and_stop("s1").await);
        assert!(supervisor.is_empty());
        assert!(!supervisor.remove_and_stop("s1").await);
    }

    #[tokio::test]
    async fn kill_all_clears_the_registry() {
        let supervisor = EncoderSupervisor::new(SleepPlanner, quick_timeouts());
        supervisor.create("s1", &spec()).await.unwrap();
        supervisor.create("s2", &spec()).await.unwrap();
        assert_eq!(supervisor.active_ids().len(), 2);

        supervisor.kill_all();
        assert!(supervisor.is_empty());
    }
}
