//! Command enablement state machine
//!
//! ```text
//!             discovery(true)            start_run()
//!  Disabled ------------------> Enabled ------------> Running
//!     ^   <------------------     ^                      |
//!     |      discovery(false)     +------ finish_run() --+
//!     +------------- finish_run() with pending discovery(false)
//! ```
//!
//! Discovery results that arrive while `Running` are held back and applied when
//! the run finishes, so a re-discovery can never re-enable the command under a
//! run that is still in flight.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::CovrunError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Disabled,
    Enabled,
    Running,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Disabled => "disabled",
            RunState::Enabled => "enabled",
            RunState::Running => "running",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: RunState,
    /// Last discovery result received while running
    pending_discovery: Option<bool>,
}

/// Shared handle to the run state
///
/// Clones observe and drive the same state. Every transition is applied under
/// one lock and then broadcast to [`RunGate::subscribe`] receivers.
#[derive(Clone)]
pub struct RunGate {
    inner: Arc<Mutex<Inner>>,
    tx: Arc<watch::Sender<RunState>>,
}

impl Default for RunGate {
    fn default() -> Self {
        Self::new()
    }
}

impl RunGate {
    /// Create a gate in the `Disabled` state
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(RunState::Disabled);
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            tx: Arc::new(tx),
        }
    }

    pub fn state(&self) -> RunState {
        self.inner.lock().state
    }

    pub fn is_enabled(&self) -> bool {
        self.state() == RunState::Enabled
    }

    /// Receive every state change (for command enablement in a host UI)
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.tx.subscribe()
    }

    /// Apply a discovery result; deferred while a run is in flight
    pub fn on_discovery_finished(&self, has_any_test: bool) -> RunState {
        let mut inner = self.inner.lock();
        if inner.state == RunState::Running {
            debug!(has_any_test, "Discovery finished during a run; deferring");
            inner.pending_discovery = Some(has_any_test);
            return inner.state;
        }
        let next = if has_any_test {
            RunState::Enabled
        } else {
            RunState::Disabled
        };
        self.transition(&mut inner, next);
        next
    }

    /// `Enabled -> Running`; any other starting state is a contract violation
    pub fn start_run(&self) -> Result<(), CovrunError> {
        let mut inner = self.inner.lock();
        if inner.state != RunState::Enabled {
            warn!(state = %inner.state, "Rejected start of coverage run");
            return Err(CovrunError::IllegalState {
                action: "start a run",
                state: inner.state,
            });
        }
        self.transition(&mut inner, RunState::Running);
        Ok(())
    }

    /// `Running -> Enabled`, whatever the outcome of the run
    ///
    /// Falls to `Disabled` only if a discovery deferred during the run found no
    /// tests.
    pub fn finish_run(&self, had_any_test: bool) -> Result<RunState, CovrunError> {
        let mut inner = self.inner.lock();
        if inner.state != RunState::Running {
            warn!(state = %inner.state, "Rejected finish of coverage run");
            return Err(CovrunError::IllegalState {
                action: "finish a run",
                state: inner.state,
            });
        }
        let next = match inner.pending_discovery.take() {
            Some(false) => RunState::Disabled,
            _ => RunState::Enabled,
        };
        self.transition(&mut inner, next);
        info!(had_any_test, state = %next, "Coverage command re-armed");
        Ok(next)
    }

    fn transition(&self, inner: &mut Inner, next: RunState) {
        if inner.state != next {
            debug!(from = %inner.state, to = %next, "Run state transition");
        }
        inner.state = next;
        self.tx.send_replace(next);
    }
}

impl fmt::Debug for RunGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunGate")
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_gate() -> RunGate {
        let gate = RunGate::new();
        gate.on_discovery_finished(true);
        gate
    }

    #[test]
    fn starts_disabled() {
        assert_eq!(RunGate::new().state(), RunState::Disabled);
    }

    #[test]
    fn discovery_enables_and_disables() {
        let gate = RunGate::new();
        assert_eq!(gate.on_discovery_finished(true), RunState::Enabled);
        assert!(gate.is_enabled());
        assert_eq!(gate.on_discovery_finished(false), RunState::Disabled);
        assert!(!gate.is_enabled());
    }

    #[test]
    fn start_run_only_from_enabled() {
        let gate = RunGate::new();
        assert!(matches!(
            gate.start_run(),
            Err(CovrunError::IllegalState {
                state: RunState::Disabled,
                ..
            })
        ));

        gate.on_discovery_finished(true);
        gate.start_run().unwrap();
        assert_eq!(gate.state(), RunState::Running);

        assert!(matches!(
            gate.start_run(),
            Err(CovrunError::IllegalState {
                state: RunState::Running,
                ..
            })
        ));
    }

    #[test]
    fn finish_run_always_rearms() {
        for had_any_test in [true, false] {
            let gate = enabled_gate();
            gate.start_run().unwrap();
            assert_eq!(gate.finish_run(had_any_test).unwrap(), RunState::Enabled);
        }
    }

    #[test]
    fn finish_run_outside_running_is_rejected() {
        let gate = enabled_gate();
        assert!(gate.finish_run(true).is_err());
        assert_eq!(gate.state(), RunState::Enabled);
    }

    #[test]
    fn discovery_during_run_is_deferred() {
        let gate = enabled_gate();
        gate.start_run().unwrap();

        assert_eq!(gate.on_discovery_finished(true), RunState::Running);
        assert!(gate.start_run().is_err());
        assert_eq!(gate.finish_run(true).unwrap(), RunState::Enabled);
    }

    #[test]
    fn deferred_empty_discovery_disables_after_run() {
        let gate = enabled_gate();
        gate.start_run().unwrap();
        gate.on_discovery_finished(false);
        gate.on_discovery_finished(false);

        assert_eq!(gate.finish_run(true).unwrap(), RunState::Disabled);

        // pending result is consumed
        gate.on_discovery_finished(true);
        gate.start_run().unwrap();
        assert_eq!(gate.finish_run(true).unwrap(), RunState::Enabled);
    }

    #[test]
    fn latest_deferred_discovery_wins() {
        let gate = enabled_gate();
        gate.start_run().unwrap();
        gate.on_discovery_finished(false);
        gate.on_discovery_finished(true);

        assert_eq!(gate.finish_run(true).unwrap(), RunState::Enabled);
    }

    #[test]
    fn subscribers_see_transitions() {
        let gate = RunGate::new();
        let rx = gate.subscribe();
        gate.on_discovery_finished(true);
        assert_eq!(*rx.borrow(), RunState::Enabled);
        gate.start_run().unwrap();
        assert_eq!(*rx.borrow(), RunState::Running);
    }

    #[test]
    fn clones_share_state() {
        let gate = RunGate::new();
        let other = gate.clone();
        gate.on_discovery_finished(true);
        assert!(other.is_enabled());
    }
}
