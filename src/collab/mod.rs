//! # Collaborator Interfaces
//!
//! The coverage command drives four external collaborators it does not own:
//!
//! | Trait              | Contract                                            |
//! |--------------------|-----------------------------------------------------|
//! | [`BuildSystem`]    | `start_build()` + "build finished" notification     |
//! | [`ExecutionEngine`]| `execute(tests) -> CoverageResult`, may fail        |
//! | [`ResultsSurface`] | `show()`, `focus()`, `publish(result)`, may fail    |
//! | [`Messenger`]      | `notify(notice)`                                    |
//!
//! Implementations:
//!
//! - [`mock`] - recording doubles for tests
//! - [`shell`] - build and engine backed by shell commands
//! - [`console`] - terminal surface and messenger for the `covrun` binary
//!
//! All collaborators are injected into the orchestrator at construction; nothing
//! is looked up from a global registry.

pub mod console;
pub mod mock;
pub mod shell;

pub use console::{ConsoleMessenger, ConsoleSurface};
pub use mock::{MockBuildSystem, MockEngine, RecordingMessenger, RecordingSurface, SurfaceCall};
pub use shell::{CommandEngine, ShellBuild};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::notice::Notice;
use crate::selection::SelectedTestSet;
use crate::subscription::Notification;

// ============================================================================
// PAYLOADS
// ============================================================================

/// How a build ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BuildOutcome {
    Succeeded,
    Failed { reason: String },
}

impl BuildOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        BuildOutcome::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BuildOutcome::Succeeded)
    }
}

/// Opaque coverage payload produced by the engine
///
/// The orchestrator only transports it from the engine to the results surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoverageResult {
    payload: Value,
}

impl CoverageResult {
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn into_payload(self) -> Value {
        self.payload
    }
}

// ============================================================================
// TRAITS
// ============================================================================

/// Build subsystem of the host
pub trait BuildSystem: Send + Sync {
    /// Request a build; completion arrives through [`BuildSystem::build_finished`]
    fn start_build(&self) -> Result<()>;

    /// Fired once per completed build, including builds nobody here requested
    fn build_finished(&self) -> &Notification<BuildOutcome>;
}

/// Instrumentation engine that runs tests and collects coverage
///
/// May take a long time; always called from a worker task.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, tests: &SelectedTestSet) -> Result<CoverageResult>;
}

/// Where coverage results are displayed
pub trait ResultsSurface: Send + Sync {
    /// Make the surface visible; safe to call when already shown
    fn show(&self);

    /// Bring the surface to the front
    fn focus(&self);

    /// Display a run's result; an error fails the run
    fn publish(&self, result: &CoverageResult) -> Result<()>;
}

/// User-facing messaging
pub trait Messenger: Send + Sync {
    fn notify(&self, notice: &Notice);
}
