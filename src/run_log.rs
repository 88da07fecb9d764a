//! Run log for coverage orchestration
//!
//! Append-only record of every milestone the orchestrator passes, shared between
//! the interaction side and the worker task.
//! - RunEvent: envelope with id + timestamp + kind
//! - RunEventKind: request, build and execution milestones
//! - RunLog: thread-safe, cloneable handle

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::run_state::RunState;

/// Single entry in the run log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    /// Monotonic sequence ID (for ordering)
    pub id: u64,
    /// Time since the log was created (ms)
    pub timestamp_ms: u64,
    pub kind: RunEventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEventKind {
    // ═══════════════════════════════════════════
    // INTERACTION SIDE
    // ═══════════════════════════════════════════
    RunRequested,
    SelectionResolved { count: usize },
    RunRejected { reason: String },
    BuildRequested,

    // ═══════════════════════════════════════════
    // CONTINUATION (build finished -> worker)
    // ═══════════════════════════════════════════
    BuildFinished { succeeded: bool },
    ExecutionStarted { tests: usize },
    ResultsPublished,
    RunFailed { error: String },
    Rearmed { state: RunState },
}

impl RunEventKind {
    /// Name used in filters and log output
    pub fn name(&self) -> &'static str {
        match self {
            Self::RunRequested => "run_requested",
            Self::SelectionResolved { .. } => "selection_resolved",
            Self::RunRejected { .. } => "run_rejected",
            Self::BuildRequested => "build_requested",
            Self::BuildFinished { .. } => "build_finished",
            Self::ExecutionStarted { .. } => "execution_started",
            Self::ResultsPublished => "results_published",
            Self::RunFailed { .. } => "run_failed",
            Self::Rearmed { .. } => "rearmed",
        }
    }
}

/// Thread-safe, append-only run log
#[derive(Clone)]
pub struct RunLog {
    events: Arc<RwLock<Vec<RunEvent>>>,
    start_time: Instant,
    next_id: Arc<AtomicU64>,
}

impl RunLog {
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            start_time: Instant::now(),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Append an event, returns its ID
    pub fn emit(&self, kind: RunEventKind) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let event = RunEvent {
            id,
            timestamp_ms: self.start_time.elapsed().as_millis() as u64,
            kind,
        };

        self.events.write().push(event);
        id
    }

    pub fn events(&self) -> Vec<RunEvent> {
        self.events.read().clone()
    }

    /// Event kinds in order, without envelopes
    pub fn kinds(&self) -> Vec<RunEventKind> {
        self.events.read().iter().map(|e| e.kind.clone()).collect()
    }

    /// How many events of the given name were logged
    pub fn count(&self, name: &str) -> usize {
        self.events
            .read()
            .iter()
            .filter(|e| e.kind.name() == name)
            .count()
    }

    /// Serialize to JSON for the `--log-json` output
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self.events()).unwrap_or(Value::Null)
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RunLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLog").field("len", &self.len()).finish()
    }
}
