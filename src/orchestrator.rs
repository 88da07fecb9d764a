//! # Coverage Run Orchestrator
//!
//! Drives one coverage run from command invocation to published results.
//!
//! ## Pipeline
//!
//! ```text
//!  interaction thread                       runtime
//!  ------------------                       -------
//!  invoke(tree)
//!   ├─ resolve selection ── empty ──> NoSelection notice, Err
//!   ├─ gate.start_run()   (Enabled -> Running)
//!   ├─ RunStarting notice, surface.show()
//!   ├─ subscribe_once(build_finished) ──┐
//!   └─ build.start_build()              │
//!                                       v
//!                        build finished: drop token, spawn supervisor
//!                                       │
//!                                       ├─ continuation task (panics re-arm via supervisor)
//!                                       ├─ worker task: engine.execute(selection)
//!                                       ├─ surface.publish(result), surface.focus()
//!                                       └─ gate.finish_run()  (Running -> Enabled)
//! ```
//!
//! ## Guarantees
//!
//! - Every rejection (no selection, illegal state) happens before any side effect.
//! - The build-finished handler is a one-shot: its token is cleared before any
//!   further work, and a second build completion cannot re-trigger the run.
//! - The selection is captured by value when the run starts.
//! - Every terminal path (success, build failure, engine error, a panic in the
//!   engine or in any collaborator called after the build) re-arms the gate
//!   exactly once, before the failure is surfaced.
//! - No retries, no timeout, no cancellation: a started run always completes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{info, instrument, warn};

use crate::collab::{
    BuildOutcome, BuildSystem, CoverageResult, ExecutionEngine, Messenger, ResultsSurface,
};
use crate::config::CoverageConfig;
use crate::error::CovrunError;
use crate::notice::Notices;
use crate::run_log::{RunEventKind, RunLog};
use crate::run_state::RunGate;
use crate::selection::{resolve, SelectedTestSet};
use crate::subscription::Subscription;
use crate::tree::TestTree;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// The four collaborators a run needs, injected at construction
#[derive(Clone)]
pub struct Collaborators {
    pub build: Arc<dyn BuildSystem>,
    pub engine: Arc<dyn ExecutionEngine>,
    pub surface: Arc<dyn ResultsSurface>,
    pub messenger: Arc<dyn Messenger>,
}

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub title: String,
    pub results_surface: String,
    pub run_on_failed_build: bool,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self::from(&CoverageConfig::default())
    }
}

impl From<&CoverageConfig> for OrchestratorOptions {
    fn from(config: &CoverageConfig) -> Self {
        Self {
            title: config.title.clone(),
            results_surface: config.results_surface.clone(),
            run_on_failed_build: config.run_on_failed_build,
        }
    }
}

// ============================================================================
// RUN OUTCOME
// ============================================================================

/// How a started run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunReport {
    Completed { tests: usize, result: CoverageResult },
    BuildFailed { reason: String },
    Failed { error: String },
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        matches!(self, RunReport::Completed { .. })
    }

    /// The error a caller should surface, if any
    pub fn error(&self) -> Option<CovrunError> {
        match self {
            RunReport::Completed { .. } => None,
            RunReport::BuildFailed { reason } => Some(CovrunError::Build(reason.clone())),
            RunReport::Failed { error } => Some(CovrunError::Execution(error.clone())),
        }
    }
}

/// Handle to a run that has been started; resolves once the gate is re-armed
#[derive(Debug)]
pub struct PendingRun {
    tests: usize,
    rx: oneshot::Receiver<RunReport>,
}

impl PendingRun {
    /// Number of tests captured for this run
    pub fn tests(&self) -> usize {
        self.tests
    }

    pub async fn wait(self) -> RunReport {
        self.rx.await.unwrap_or_else(|_| RunReport::Failed {
            error: "run ended without a report".to_string(),
        })
    }
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

struct Shared {
    collab: Collaborators,
    gate: RunGate,
    notices: Notices,
    run_on_failed_build: bool,
    log: RunLog,
    runtime: Handle,
    /// One-shot build-finished registration of the run in flight
    pending_build: Mutex<Option<Subscription>>,
}

/// Cloneable handle; clones drive the same gate, log and collaborators
#[derive(Clone)]
pub struct CoverageRunOrchestrator {
    shared: Arc<Shared>,
}

impl CoverageRunOrchestrator {
    /// `runtime` hosts the continuation and the execution worker
    pub fn new(
        collab: Collaborators,
        gate: RunGate,
        options: OrchestratorOptions,
        runtime: Handle,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                collab,
                gate,
                notices: Notices::new(options.title, options.results_surface),
                run_on_failed_build: options.run_on_failed_build,
                log: RunLog::new(),
                runtime,
                pending_build: Mutex::new(None),
            }),
        }
    }

    pub fn gate(&self) -> &RunGate {
        &self.shared.gate
    }

    pub fn log(&self) -> &RunLog {
        &self.shared.log
    }

    /// True while a run waits for its build to finish
    pub fn awaiting_build(&self) -> bool {
        self.shared.pending_build.lock().is_some()
    }

    /// Start a coverage run over the tree's current selection
    ///
    /// Not re-entrant: the command layer must keep this from being called while
    /// a run is in flight. A second call is still rejected by the gate.
    #[instrument(skip(self, tree), fields(methods = tree.method_count()))]
    pub fn invoke(&self, tree: &TestTree) -> Result<PendingRun, CovrunError> {
        let shared = &self.shared;
        shared.log.emit(RunEventKind::RunRequested);

        let selection = resolve(tree);
        shared.log.emit(RunEventKind::SelectionResolved {
            count: selection.len(),
        });

        if selection.is_empty() {
            shared.collab.messenger.notify(&shared.notices.no_selection());
            shared.log.emit(RunEventKind::RunRejected {
                reason: CovrunError::NoSelection.to_string(),
            });
            return Err(CovrunError::NoSelection);
        }

        if let Err(e) = shared.gate.start_run() {
            shared.log.emit(RunEventKind::RunRejected {
                reason: e.to_string(),
            });
            return Err(e);
        }

        let tests = selection.len();
        info!(tests, "Coverage run starting");
        shared.collab.messenger.notify(&shared.notices.run_starting());
        shared.collab.surface.show();

        let (tx, rx) = oneshot::channel();
        let this = self.clone();
        {
            // Held across subscribe so a completion racing in from another
            // thread always finds the token in place
            let mut slot = shared.pending_build.lock();
            *slot = Some(
                shared
                    .collab
                    .build
                    .build_finished()
                    .subscribe_once(move |outcome| {
                        this.on_build_finished(outcome.clone(), selection, tx)
                    }),
            );
        }

        shared.log.emit(RunEventKind::BuildRequested);
        if let Err(e) = shared.collab.build.start_build() {
            // Never reached the build; the continuation must not fire later
            let subscription = shared.pending_build.lock().take();
            if let Some(subscription) = subscription {
                subscription.unsubscribe();
            }
            let reason = format!("{:#}", e);
            warn!(reason = %reason, "Build request failed");
            self.rearm(&AtomicBool::new(false), false);
            shared
                .collab
                .messenger
                .notify(&shared.notices.build_failed(&reason));
            shared.log.emit(RunEventKind::RunFailed {
                error: reason.clone(),
            });
            return Err(CovrunError::Build(reason));
        }

        Ok(PendingRun { tests, rx })
    }

    /// Build-finished handler: clear the token, then move off the caller's thread
    fn on_build_finished(
        &self,
        outcome: BuildOutcome,
        selection: SelectedTestSet,
        tx: oneshot::Sender<RunReport>,
    ) {
        drop(self.shared.pending_build.lock().take());
        self.shared.log.emit(RunEventKind::BuildFinished {
            succeeded: outcome.is_success(),
        });

        let this = self.clone();
        self.shared.runtime.spawn(async move {
            let report = this.supervise(outcome, selection).await;
            let _ = tx.send(report);
        });
    }

    /// Runs the continuation in its own task so a panicking collaborator
    /// still ends the run and re-arms the gate
    async fn supervise(&self, outcome: BuildOutcome, selection: SelectedTestSet) -> RunReport {
        let rearmed = Arc::new(AtomicBool::new(false));
        let continuation = {
            let this = self.clone();
            let rearmed = Arc::clone(&rearmed);
            self.shared
                .runtime
                .spawn(async move { this.continue_run(outcome, selection, &rearmed).await })
        };

        match continuation.await {
            Ok(report) => report,
            Err(e) => {
                let error = if e.is_panic() {
                    "coverage run panicked after the build finished".to_string()
                } else {
                    format!("coverage run stopped: {}", e)
                };
                if rearmed.load(Ordering::SeqCst) {
                    // Gate already released; a later run may own it now
                    warn!(error = %error, "Coverage run failed after re-arming");
                    RunReport::Failed { error }
                } else {
                    self.fail(&rearmed, error)
                }
            }
        }
    }

    async fn continue_run(
        &self,
        outcome: BuildOutcome,
        selection: SelectedTestSet,
        rearmed: &AtomicBool,
    ) -> RunReport {
        let shared = &self.shared;

        if let BuildOutcome::Failed { reason } = outcome {
            if !shared.run_on_failed_build {
                warn!(reason = %reason, "Build failed; skipping coverage execution");
                self.rearm(rearmed, false);
                shared
                    .collab
                    .messenger
                    .notify(&shared.notices.build_failed(&reason));
                shared.log.emit(RunEventKind::RunFailed {
                    error: reason.clone(),
                });
                return RunReport::BuildFailed { reason };
            }
            warn!(reason = %reason, "Build failed; executing tests anyway");
        }

        let tests = selection.len();
        shared.log.emit(RunEventKind::ExecutionStarted { tests });

        let engine = Arc::clone(&shared.collab.engine);
        let worker = shared
            .runtime
            .spawn(async move { engine.execute(&selection).await });

        let result = match worker.await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => return self.fail(rearmed, format!("{:#}", e)),
            Err(e) if e.is_panic() => {
                return self.fail(rearmed, "execution engine panicked".to_string())
            }
            Err(e) => return self.fail(rearmed, format!("execution worker stopped: {}", e)),
        };

        if let Err(e) = shared.collab.surface.publish(&result) {
            return self.fail(rearmed, format!("publishing results failed: {:#}", e));
        }
        shared.log.emit(RunEventKind::ResultsPublished);
        shared.collab.surface.focus();
        info!(tests, engine = shared.collab.engine.name(), "Coverage results published");
        self.rearm(rearmed, true);
        RunReport::Completed { tests, result }
    }

    /// Re-arm first, then tell the user
    fn fail(&self, rearmed: &AtomicBool, error: String) -> RunReport {
        let shared = &self.shared;
        warn!(error = %error, "Coverage run failed");
        self.rearm(rearmed, false);
        shared.collab.messenger.notify(&shared.notices.run_failed(&error));
        shared.log.emit(RunEventKind::RunFailed {
            error: error.clone(),
        });
        RunReport::Failed { error }
    }

    /// Finish the run on the gate at most once per run
    fn rearm(&self, rearmed: &AtomicBool, had_any_test: bool) {
        if rearmed.swap(true, Ordering::SeqCst) {
            return;
        }
        match self.shared.gate.finish_run(had_any_test) {
            Ok(state) => {
                self.shared.log.emit(RunEventKind::Rearmed { state });
            }
            Err(e) => warn!(error = %e, "Could not re-arm coverage command"),
        }
    }
}

impl std::fmt::Debug for CoverageRunOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoverageRunOrchestrator")
            .field("gate", &self.shared.gate)
            .field("log", &self.shared.log)
            .finish()
    }
}
