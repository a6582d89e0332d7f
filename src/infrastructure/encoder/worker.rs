//! Encoder process worker
//!
//! Owns exactly one external encoder process and translates its raw
//! lifecycle (spawn, diagnostic output, exit) into state transitions
//! and typed [`WorkerEvent`] notifications. The pure state machine
//! lives in [`crate::domain::encoder::WorkerLifecycle`]; this adapter
//! drives it.

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, Command};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::application::ports::Invocation;
use crate::domain::config::EngineTimeouts;
use crate::domain::encoder::{parse_progress, WorkerEvent, WorkerLifecycle, WorkerState};
use crate::domain::error::StreamError;

/// Marker the encoder prints to stderr once it has opened its input.
const START_MARKER: &str = "Opening";

/// Recent diagnostic lines retained per worker.
const DIAGNOSTIC_CAPACITY: usize = 200;

struct Inner {
    lifecycle: Mutex<WorkerLifecycle>,
    state_tx: watch::Sender<WorkerState>,
    events: mpsc::UnboundedSender<WorkerEvent>,
    stdin: tokio::sync::Mutex<Option<ChildStdin>>,
    diagnostics: Mutex<VecDeque<String>>,
    started_at: Mutex<Option<Instant>>,
    last_error: Mutex<Option<String>>,
    kill_requested: CancellationToken,
}

impl Inner {
    fn lifecycle(&self) -> MutexGuard<'_, WorkerLifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Flip STARTING to RUNNING once, stamping the start time.
    fn promote_running(&self) {
        let promoted = self.lifecycle().mark_running();
        if promoted {
            *self
                .started_at
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
            self.state_tx.send_replace(WorkerState::Running);
            let _ = self.events.send(WorkerEvent::Started);
        }
    }

    fn record_error(&self, message: &str) {
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(message.to_string());
    }
}

/// Supervised handle around one encoder process.
pub struct EncoderWorker {
    invocation: Invocation,
    timeouts: EngineTimeouts,
    inner: Arc<Inner>,
}

impl EncoderWorker {
    /// Create a worker in `Idle` state. The returned receiver is the
    /// worker's lifecycle notification channel; it is handed out
    /// exactly once.
    pub fn new(
        invocation: Invocation,
        timeouts: EngineTimeouts,
    ) -> (Self, mpsc::UnboundedReceiver<WorkerEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(WorkerState::Idle);

        let worker = Self {
            invocation,
            timeouts,
            inner: Arc::new(Inner {
                lifecycle: Mutex::new(WorkerLifecycle::new()),
                state_tx,
                events,
                stdin: tokio::sync::Mutex::new(None),
                diagnostics: Mutex::new(VecDeque::with_capacity(DIAGNOSTIC_CAPACITY)),
                started_at: Mutex::new(None),
                last_error: Mutex::new(None),
                kill_requested: CancellationToken::new(),
            }),
        };
        (worker, events_rx)
    }

    pub fn state(&self) -> WorkerState {
        *self.inner.state_tx.borrow()
    }

    /// Uptime since the worker entered `Running`.
    pub fn uptime(&self) -> Duration {
        self.inner
            .started_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map(|t| t.elapsed())
            .unwrap_or_default()
    }

    /// Recent diagnostic output, oldest first.
    pub fn diagnostics(&self) -> Vec<String> {
        self.inner
            .diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Spawn the encoder process and wait, bounded by the start grace,
    /// for evidence that it is running.
    ///
    /// An encoder that prints neither the start marker nor exits within
    /// the grace is optimistically treated as running; the grace is a
    /// configurable policy (`EngineTimeouts::process_start_grace`).
    pub async fn start(&self) -> Result<(), StreamError> {
        self.inner.lifecycle().begin_start()?;
        self.inner.state_tx.send_replace(WorkerState::Starting);

        debug!(
            program = %self.invocation.program.display(),
            args = ?self.invocation.args,
            "spawning encoder"
        );

        let mut child = match Command::new(&self.invocation.program)
            .args(&self.invocation.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                let message = if e.kind() == std::io::ErrorKind::NotFound {
                    format!(
                        "encoder executable not found: {}",
                        self.invocation.program.display()
                    )
                } else {
                    e.to_string()
                };
                self.inner.lifecycle().fail();
                self.inner.state_tx.send_replace(WorkerState::Error);
                self.inner.record_error(&message);
                let _ = self.inner.events.send(WorkerEvent::Error(message.clone()));
                return Err(StreamError::ProcessSpawn(message));
            }
        };

        *self.inner.stdin.lock().await = child.stdin.take();
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump_stderr(Arc::clone(&self.inner), stderr));
        }
        tokio::spawn(supervise_exit(Arc::clone(&self.inner), child));

        self.wait_for(|s| s != WorkerState::Starting, self.timeouts.process_start_grace)
            .await;

        match self.state() {
            WorkerState::Starting => {
                // no marker and no error within the grace
                debug!("no start marker observed; assuming the encoder is running");
                self.inner.promote_running();
                Ok(())
            }
            WorkerState::Error => {
                let message = self
                    .last_error()
                    .unwrap_or_else(|| "encoder failed during startup".to_string());
                Err(StreamError::ProcessSpawn(message))
            }
            WorkerState::Stopped => Err(StreamError::ProcessSpawn(
                "encoder exited before producing output".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Request graceful shutdown, escalating to a forced kill when the
    /// grace period elapses. Unconditionally terminal: the worker is
    /// `Stopped` when this returns.
    pub async fn stop(&self) {
        {
            let mut lifecycle = self.inner.lifecycle();
            if !lifecycle.begin_stop() {
                return;
            }
        }
        self.inner.state_tx.send_replace(WorkerState::Stopping);

        {
            let mut stdin = self.inner.stdin.lock().await;
            if let Some(pipe) = stdin.as_mut() {
                debug!("sending quit signal to encoder");
                if let Err(e) = pipe.write_all(b"q").await {
                    warn!(error = %e, "failed to send quit signal");
                }
                let _ = pipe.flush().await;
            }
        }

        if self
            .wait_for(|s| s.is_terminal(), self.timeouts.stop_grace)
            .await
        {
            return;
        }

        warn!("encoder ignored quit signal; killing");
        self.inner.kill_requested.cancel();

        if !self
            .wait_for(|s| s.is_terminal(), self.timeouts.kill_wait)
            .await
        {
            self.inner.lifecycle().force_stopped();
            self.inner.state_tx.send_replace(WorkerState::Stopped);
        }
    }

    /// Immediate forced termination with a synchronous state reset.
    /// Used for bulk shutdown where graceful negotiation is skipped.
    pub fn kill(&self) {
        self.inner.kill_requested.cancel();
        self.inner.lifecycle().force_stopped();
        self.inner.state_tx.send_replace(WorkerState::Stopped);
    }

    /// Wait until the state satisfies `pred`, bounded by `timeout`.
    async fn wait_for(&self, pred: impl Fn(WorkerState) -> bool, timeout: Duration) -> bool {
        let mut rx = self.inner.state_tx.subscribe();
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if pred(*rx.borrow_and_update()) {
                return true;
            }
            match tokio::time::timeout_at(deadline, rx.changed()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) | Err(_) => return pred(*rx.borrow()),
            }
        }
    }
}

/// Read the encoder's diagnostic stream line by line: retain a bounded
/// tail, surface progress, and watch for the start marker.
async fn pump_stderr(inner: Arc<Inner>, stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        {
            let mut diagnostics = inner
                .diagnostics
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if diagnostics.len() == DIAGNOSTIC_CAPACITY {
                diagnostics.pop_front();
            }
            diagnostics.push_back(line.clone());
        }

        // progress parsing is opportunistic; misses are not errors
        if let Some(progress) = parse_progress(&line) {
            trace!(
                frame = progress.frame,
                fps = progress.fps,
                speed = %progress.speed,
                "encoder progress"
            );
            let _ = inner.events.send(WorkerEvent::Progress(progress));
        }

        if line.contains(START_MARKER) {
            inner.promote_running();
        }
    }
}

/// Reap the process and classify its exit. Emits the worker's single
/// terminal event.
async fn supervise_exit(inner: Arc<Inner>, mut child: Child) {
    let kill = inner.kill_requested.clone();

    let status = tokio::select! {
        status = child.wait() => status,
        _ = kill.cancelled() => {
            if let Err(e) = child.start_kill() {
                debug!(error = %e, "kill requested after encoder exit");
            }
            child.wait().await
        }
    };

    let exit_code = status.as_ref().ok().and_then(|s| s.code());
    let final_state = inner.lifecycle().complete(exit_code, kill.is_cancelled());

    // the message must be recorded before the state change wakes a waiter
    if final_state == WorkerState::Error {
        let message = match exit_code {
            Some(code) => format!("encoder exited with code {}", code),
            None => "encoder terminated unexpectedly".to_string(),
        };
        inner.record_error(&message);
        inner.state_tx.send_replace(final_state);
        let _ = inner.events.send(WorkerEvent::Error(message));
    } else {
        inner.state_tx.send_replace(final_state);
        if final_state == WorkerState::Stopped {
            debug!(?exit_code, "encoder stopped");
            let _ = inner.events.send(WorkerEvent::Stopped);
        }
    }
}
