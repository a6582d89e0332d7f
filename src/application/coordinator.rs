//! Stream coordinator
//!
//! Orchestrates camera reservation, encoder supervision, readiness
//! detection, and deferred cleanup into the start/stop operations the
//! HTTP layer calls. Owns the session records.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};

use crate::application::ports::{
    DeviceEnumerator, EnumerationError, InvocationPlanner, StorageProbe, TranscodeSpec,
};
use crate::application::readiness::{wait_for_playlist, ReadinessOutcome};
use crate::domain::camera::{CameraDevice, CameraRegistry, CameraStatus};
use crate::domain::config::{EngineConfig, EngineTimeouts};
use crate::domain::encoder::WorkerEvent;
use crate::domain::error::StreamError;
use crate::domain::stream::{SessionFilter, StreamOptions, StreamRegistry, StreamSession, StreamStatus};
use crate::infrastructure::encoder::EncoderSupervisor;
use crate::infrastructure::hls::{CleanupQueue, HlsLayout};

/// Session API surface of the orchestration engine.
pub struct StreamCoordinator<E, P, S>
where
    E: DeviceEnumerator,
    P: InvocationPlanner + 'static,
    S: StorageProbe,
{
    cameras: Arc<CameraRegistry>,
    streams: Arc<StreamRegistry>,
    supervisor: Arc<EncoderSupervisor<P>>,
    layout: Arc<HlsLayout>,
    cleanup: Arc<CleanupQueue>,
    enumerator: E,
    probe: S,
    timeouts: EngineTimeouts,
    /// Cancellation tokens for sessions still in their readiness wait
    pending_starts: Mutex<HashMap<String, CancellationToken>>,
}

impl<E, P, S> StreamCoordinator<E, P, S>
where
    E: DeviceEnumerator,
    P: InvocationPlanner + 'static,
    S: StorageProbe,
{
    pub fn new(enumerator: E, planner: P, probe: S, config: &EngineConfig) -> Self {
        let layout = Arc::new(HlsLayout::new(config.hls_root.clone()));
        let cleanup = Arc::new(CleanupQueue::new(
            Arc::clone(&layout),
            config.timeouts.cleanup_retry,
        ));

        Self {
            cameras: Arc::new(CameraRegistry::new()),
            streams: Arc::new(StreamRegistry::new()),
            supervisor: Arc::new(EncoderSupervisor::new(planner, config.timeouts)),
            layout,
            cleanup,
            enumerator,
            probe,
            timeouts: config.timeouts,
            pending_starts: Mutex::new(HashMap::new()),
        }
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<String, CancellationToken>> {
        self.pending_starts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Re-enumerate capture devices and merge the result into the
    /// camera registry.
    pub async fn refresh_cameras(&self) -> Result<Vec<CameraDevice>, EnumerationError> {
        let devices = self.enumerator.enumerate().await?;
        self.cameras.merge_discovered(devices);
        Ok(self.cameras.snapshot())
    }

    pub fn cameras(&self) -> Vec<CameraDevice> {
        self.cameras.snapshot()
    }

    pub fn camera(&self, camera_id: &str) -> Option<CameraDevice> {
        self.cameras.get(camera_id)
    }

    /// Start a new stream from a camera.
    ///
    /// Preflight failures surface synchronously; every failure path
    /// unwinds fully, so a failed start never leaves a reservation,
    /// process handle, or (except for a readiness timeout, kept for
    /// diagnostics) session record behind.
    pub async fn start(
        &self,
        camera_id: &str,
        options: StreamOptions,
    ) -> Result<StreamSession, StreamError> {
        // disk preflight before committing any resource
        let available = self
            .probe
            .available_bytes(self.layout.root())
            .await
            .map_err(|e| StreamError::Storage(e.to_string()))?;
        let required = self.timeouts.min_free_bytes;
        if available < required {
            return Err(StreamError::InsufficientStorage {
                available,
                required,
            });
        }

        let camera = self
            .cameras
            .get(camera_id)
            .ok_or_else(|| StreamError::CameraNotFound(camera_id.to_string()))?;
        if !self.cameras.is_available(camera_id) {
            return Err(StreamError::Unavailable {
                id: camera_id.to_string(),
                status: camera.status,
            });
        }

        options.validate()?;

        let session = self.streams.create(camera_id, &options);
        info!(stream = %session.id, camera = %camera_id, "starting stream");

        match self.run_start(camera_id, &session).await {
            Ok(running) => Ok(running),
            Err(StreamError::StartTimeout) => Err(StreamError::StartTimeout),
            Err(StreamError::StartAborted) => Err(StreamError::StartAborted),
            Err(e) => {
                // full unwind: no partial state may survive a failed start
                self.supervisor.remove_and_stop(&session.id).await;
                self.cameras.release(camera_id, &session.id);
                self.streams.remove(&session.id);
                Err(e)
            }
        }
    }

    async fn run_start(
        &self,
        camera_id: &str,
        session: &StreamSession,
    ) -> Result<StreamSession, StreamError> {
        let session_id = session.id.as_str();

        // atomic check-and-set; a lost race is just "unavailable"
        if !self.cameras.reserve(camera_id, session_id) {
            let status = self
                .cameras
                .get(camera_id)
                .map(|c| c.status)
                .unwrap_or(CameraStatus::Disconnected);
            return Err(StreamError::Unavailable {
                id: camera_id.to_string(),
                status,
            });
        }

        let output_dir = self
            .layout
            .ensure_stream_dir(session_id)
            .await
            .map_err(|e| StreamError::Storage(e.to_string()))?;

        let spec = TranscodeSpec {
            camera_id: camera_id.to_string(),
            output_dir,
            resolution: session.resolution.clone(),
            framerate: session.framerate,
            video_bitrate: session.video_bitrate.clone(),
            audio_bitrate: session.audio_bitrate.clone(),
            include_audio: true,
            audio_device_id: None,
        };
        let (_worker, events) = self.supervisor.create(session_id, &spec).await?;

        let cancel = CancellationToken::new();
        self.pending()
            .insert(session_id.to_string(), cancel.clone());
        let outcome = wait_for_playlist(
            &self.layout.playlist_path(session_id),
            self.timeouts.readiness_timeout,
            self.timeouts.readiness_poll,
            &cancel,
        )
        .await;
        self.pending().remove(session_id);

        match outcome {
            ReadinessOutcome::Cancelled => {
                // a concurrent stop already tore everything down
                Err(StreamError::StartAborted)
            }
            ReadinessOutcome::TimedOut => {
                warn!(stream = %session_id, "no output before the readiness timeout");
                self.supervisor.remove_and_stop(session_id).await;
                self.cameras.release(camera_id, session_id);
                self.streams
                    .mark_error(session_id, "timeout waiting for stream to start");
                Err(StreamError::StartTimeout)
            }
            ReadinessOutcome::Ready => {
                let hls_url = self.layout.hls_url(session_id);
                let running = self
                    .streams
                    .mark_running(session_id, &hls_url)
                    .ok_or_else(|| StreamError::SessionNotFound(session_id.to_string()))?;

                self.spawn_supervision(session_id.to_string(), camera_id.to_string(), events);
                info!(stream = %session_id, url = %hls_url, "stream running");
                Ok(running)
            }
        }
    }

    /// Consume the worker's lifecycle events so an encoder crash or
    /// natural exit after the stream is live releases the camera and
    /// updates the session without any external call.
    fn spawn_supervision(
        &self,
        session_id: String,
        camera_id: String,
        mut events: mpsc::UnboundedReceiver<WorkerEvent>,
    ) {
        let streams = Arc::clone(&self.streams);
        let cameras = Arc::clone(&self.cameras);
        let supervisor = Arc::clone(&self.supervisor);

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    WorkerEvent::Started => {}
                    WorkerEvent::Progress(progress) => {
                        trace!(
                            stream = %session_id,
                            frame = progress.frame,
                            fps = progress.fps,
                            speed = %progress.speed,
                            "encoder progress"
                        );
                    }
                    WorkerEvent::Stopped => {
                        let still_running = streams
                            .get(&session_id)
                            .map(|s| s.status == StreamStatus::Running)
                            .unwrap_or(false);
                        if still_running {
                            info!(stream = %session_id, "encoder exited; stream stopped");
                            streams.mark_stopped(&session_id);
                            cameras.release(&camera_id, &session_id);
                        }
                        supervisor.remove(&session_id);
                        break;
                    }
                    WorkerEvent::Error(message) => {
                        error!(stream = %session_id, %message, "encoder failed");
                        streams.mark_error(&session_id, &message);
                        cameras.release(&camera_id, &session_id);
                        supervisor.remove(&session_id);
                        break;
                    }
                }
            }
        });
    }

    /// Stop a stream. Idempotent: stopping an already stopped stream
    /// is a no-op, and a stream mid-start is aborted promptly.
    pub async fn stop(&self, session_id: &str) -> Result<(), StreamError> {
        let session = self
            .streams
            .get(session_id)
            .ok_or_else(|| StreamError::SessionNotFound(session_id.to_string()))?;

        if session.status == StreamStatus::Stopped {
            return Ok(());
        }

        // abort an in-flight readiness wait
        if let Some(token) = self.pending().remove(session_id) {
            token.cancel();
        }

        self.supervisor.remove_and_stop(session_id).await;
        self.cameras.release(&session.camera_id, session_id);
        self.streams.mark_stopped(session_id);
        self.cleanup
            .schedule(session_id, self.timeouts.cleanup_grace);

        info!(stream = %session_id, "stream stopped");
        Ok(())
    }

    pub fn get(&self, session_id: &str) -> Option<StreamSession> {
        self.streams.get(session_id)
    }

    pub fn list(&self, filter: &SessionFilter) -> Vec<StreamSession> {
        self.streams.list(filter)
    }

    pub fn active_count(&self) -> usize {
        self.streams.active_count()
    }

    /// The deferred cleanup queue, for the host to drive.
    pub fn cleanup_queue(&self) -> Arc<CleanupQueue> {
        Arc::clone(&self.cleanup)
    }

    /// One maintenance pass: remove output directories belonging to
    /// sessions no longer tracked at all, and evict finished session
    /// records older than the retention window.
    pub async fn run_maintenance(&self) {
        match self.layout.sweep_orphans(&self.streams.tracked_ids()).await {
            Ok(removed) if removed > 0 => {
                info!(removed, "removed orphaned stream directories");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "orphan sweep failed"),
        }

        let evicted = self.streams.evict_finished(self.timeouts.retention);
        if evicted > 0 {
            info!(evicted, "evicted finished stream records");
        }
    }

    /// Terminate every active encoder before the coordinator exits.
    /// No encoder process may outlive the engine.
    pub async fn shutdown(&self) {
        let tokens: Vec<CancellationToken> = self.pending().drain().map(|(_, t)| t).collect();
        for token in tokens {
            token.cancel();
        }
        self.supervisor.kill_all();
        info!("all encoders terminated");
    }
}
