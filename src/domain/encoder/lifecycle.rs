//! Encoder worker state machine
//!
//! State machine:
//!   IDLE -> STARTING (start)
//!   STARTING -> RUNNING (first-output evidence, or the start grace
//!   elapsing without an error)
//!   STARTING | RUNNING -> STOPPING (stop requested)
//!   any -> STOPPED (clean exit, or any exit while stopping/killed)
//!   any -> ERROR (spawn failure or unexpected exit)
//!
//! `start` is only legal from IDLE, STOPPED, or ERROR.

use std::fmt;

use thiserror::Error;

use super::progress::EncoderProgress;

/// Encoder worker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WorkerState {
    #[default]
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
    Error,
}

impl WorkerState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Error)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when an operation is attempted in an incompatible state
#[derive(Debug, Clone, Error)]
#[error("Invalid state transition: cannot {action} while in {current_state} state")]
pub struct InvalidStateTransition {
    pub current_state: WorkerState,
    pub action: String,
}

/// Typed lifecycle notification pushed by the worker.
///
/// A worker emits at most one terminal event (`Stopped` xor `Error`)
/// over its lifetime; `Progress` events are best-effort.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Started,
    Progress(EncoderProgress),
    Stopped,
    Error(String),
}

/// Pure state machine driven by the encoder process supervisor.
#[derive(Debug, Default)]
pub struct WorkerLifecycle {
    state: WorkerState,
}

impl WorkerLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Transition into STARTING. Legal from IDLE, STOPPED, or ERROR.
    pub fn begin_start(&mut self) -> Result<(), InvalidStateTransition> {
        if !matches!(
            self.state,
            WorkerState::Idle | WorkerState::Stopped | WorkerState::Error
        ) {
            return Err(InvalidStateTransition {
                current_state: self.state,
                action: "start the encoder".to_string(),
            });
        }
        self.state = WorkerState::Starting;
        Ok(())
    }

    /// Promote STARTING to RUNNING. Returns false from any other state
    /// so late start markers are ignored.
    pub fn mark_running(&mut self) -> bool {
        if self.state != WorkerState::Starting {
            return false;
        }
        self.state = WorkerState::Running;
        true
    }

    /// Request shutdown. Returns false when there is nothing to stop
    /// (IDLE or already terminal).
    pub fn begin_stop(&mut self) -> bool {
        match self.state {
            WorkerState::Starting | WorkerState::Running => {
                self.state = WorkerState::Stopping;
                true
            }
            WorkerState::Stopping => true,
            _ => false,
        }
    }

    /// Classify a process exit. Exit code zero, an exit while already
    /// stopping, or a deliberate kill classify as STOPPED; anything
    /// else classifies as ERROR. Returns the resulting state.
    pub fn complete(&mut self, exit_code: Option<i32>, killed: bool) -> WorkerState {
        if self.state.is_terminal() {
            return self.state;
        }
        self.state = if exit_code == Some(0) || self.state == WorkerState::Stopping || killed {
            WorkerState::Stopped
        } else {
            WorkerState::Error
        };
        self.state
    }

    /// Record a spawn failure.
    pub fn fail(&mut self) {
        self.state = WorkerState::Error;
    }

    /// Forced synchronous reset to STOPPED (emergency shutdown).
    pub fn force_stopped(&mut self) {
        self.state = WorkerState::Stopped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_lifecycle_is_idle() {
        let lifecycle = WorkerLifecycle::new();
        assert_eq!(lifecycle.state(), WorkerState::Idle);
    }

    #[test]
    fn start_from_idle() {
        let mut lifecycle = WorkerLifecycle::new();
        assert!(lifecycle.begin_start().is_ok());
        assert_eq!(lifecycle.state(), WorkerState::Starting);
    }

    #[test]
    fn start_from_starting_fails() {
        let mut lifecycle = WorkerLifecycle::new();
        lifecycle.begin_start().unwrap();

        let err = lifecycle.begin_start().unwrap_err();
        assert_eq!(err.current_state, WorkerState::Starting);
        assert!(err.to_string().contains("starting"));
    }

    #[test]
    fn start_from_running_fails() {
        let mut lifecycle = WorkerLifecycle::new();
        lifecycle.begin_start().unwrap();
        lifecycle.mark_running();
        assert!(lifecycle.begin_start().is_err());
    }

    #[test]
    fn restart_after_stop_and_error() {
        let mut lifecycle = WorkerLifecycle::new();
        lifecycle.begin_start().unwrap();
        lifecycle.complete(Some(0), false);
        assert_eq!(lifecycle.state(), WorkerState::Stopped);
        assert!(lifecycle.begin_start().is_ok());

        lifecycle.complete(Some(1), false);
        assert_eq!(lifecycle.state(), WorkerState::Error);
        assert!(lifecycle.begin_start().is_ok());
    }

    #[test]
    fn mark_running_only_from_starting() {
        let mut lifecycle = WorkerLifecycle::new();
        assert!(!lifecycle.mark_running());

        lifecycle.begin_start().unwrap();
        assert!(lifecycle.mark_running());
        assert_eq!(lifecycle.state(), WorkerState::Running);

        // a late marker is ignored
        assert!(!lifecycle.mark_running());
    }

    #[test]
    fn begin_stop_from_running_and_starting() {
        let mut lifecycle = WorkerLifecycle::new();
        lifecycle.begin_start().unwrap();
        assert!(lifecycle.begin_stop());
        assert_eq!(lifecycle.state(), WorkerState::Stopping);

        let mut lifecycle = WorkerLifecycle::new();
        lifecycle.begin_start().unwrap();
        lifecycle.mark_running();
        assert!(lifecycle.begin_stop());
        assert_eq!(lifecycle.state(), WorkerState::Stopping);
    }

    #[test]
    fn begin_stop_is_noop_when_idle_or_terminal() {
        let mut lifecycle = WorkerLifecycle::new();
        assert!(!lifecycle.begin_stop());

        lifecycle.begin_start().unwrap();
        lifecycle.complete(Some(0), false);
        assert!(!lifecycle.begin_stop());
        assert_eq!(lifecycle.state(), WorkerState::Stopped);
    }

    #[test]
    fn clean_exit_classifies_stopped() {
        let mut lifecycle = WorkerLifecycle::new();
        lifecycle.begin_start().unwrap();
        lifecycle.mark_running();
        assert_eq!(lifecycle.complete(Some(0), false), WorkerState::Stopped);
    }

    #[test]
    fn exit_while_stopping_classifies_stopped_regardless_of_code() {
        let mut lifecycle = WorkerLifecycle::new();
        lifecycle.begin_start().unwrap();
        lifecycle.mark_running();
        lifecycle.begin_stop();
        assert_eq!(lifecycle.complete(Some(255), false), WorkerState::Stopped);
    }

    #[test]
    fn unexpected_exit_classifies_error() {
        let mut lifecycle = WorkerLifecycle::new();
        lifecycle.begin_start().unwrap();
        lifecycle.mark_running();
        assert_eq!(lifecycle.complete(Some(1), false), WorkerState::Error);
    }

    #[test]
    fn signal_exit_without_kill_classifies_error() {
        let mut lifecycle = WorkerLifecycle::new();
        lifecycle.begin_start().unwrap();
        lifecycle.mark_running();
        assert_eq!(lifecycle.complete(None, false), WorkerState::Error);
    }

    #[test]
    fn killed_exit_classifies_stopped() {
        let mut lifecycle = WorkerLifecycle::new();
        lifecycle.begin_start().unwrap();
        lifecycle.mark_running();
        assert_eq!(lifecycle.complete(None, true), WorkerState::Stopped);
    }

    #[test]
    fn complete_after_terminal_keeps_state() {
        let mut lifecycle = WorkerLifecycle::new();
        lifecycle.begin_start().unwrap();
        lifecycle.force_stopped();
        assert_eq!(lifecycle.complete(Some(1), false), WorkerState::Stopped);
    }
}
