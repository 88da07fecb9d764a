//! "Run selected tests with coverage" command
//!
//! Owns enablement: listens to discovery results for the lifetime of the
//! command and refuses to invoke the orchestrator unless the gate is `Enabled`.

use tracing::debug;

use crate::error::CovrunError;
use crate::orchestrator::{CoverageRunOrchestrator, PendingRun};
use crate::run_log::RunEventKind;
use crate::run_state::RunState;
use crate::subscription::{Notification, Subscription};
use crate::tree::TestTree;

pub struct CoverageCommand {
    orchestrator: CoverageRunOrchestrator,
    _discovery: Subscription,
}

impl CoverageCommand {
    /// `discovery` fires with "does the tree contain any test" after each discovery
    pub fn new(orchestrator: CoverageRunOrchestrator, discovery: &Notification<bool>) -> Self {
        let gate = orchestrator.gate().clone();
        let subscription = discovery.subscribe(move |has_any_test: &bool| {
            let state = gate.on_discovery_finished(*has_any_test);
            debug!(has_any_test, state = %state, "Test discovery finished");
        });
        Self {
            orchestrator,
            _discovery: subscription,
        }
    }

    pub fn state(&self) -> RunState {
        self.orchestrator.gate().state()
    }

    pub fn is_enabled(&self) -> bool {
        self.state() == RunState::Enabled
    }

    pub fn orchestrator(&self) -> &CoverageRunOrchestrator {
        &self.orchestrator
    }

    /// Invoke the command; disabled commands never reach the orchestrator
    pub fn execute(&self, tree: &TestTree) -> Result<PendingRun, CovrunError> {
        let state = self.state();
        if state != RunState::Enabled {
            let err = CovrunError::CommandDisabled { state };
            self.orchestrator.log().emit(RunEventKind::RunRejected {
                reason: err.to_string(),
            });
            return Err(err);
        }
        self.orchestrator.invoke(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{MockBuildSystem, MockEngine, RecordingMessenger, RecordingSurface};
    use crate::orchestrator::{Collaborators, OrchestratorOptions};
    use crate::run_state::RunGate;
    use std::sync::Arc;
    use tokio::runtime::Handle;

    fn command(discovery: &Notification<bool>) -> (CoverageCommand, Arc<MockBuildSystem>) {
        let build = Arc::new(MockBuildSystem::new());
        let orchestrator = CoverageRunOrchestrator::new(
            Collaborators {
                build: build.clone(),
                engine: Arc::new(MockEngine::new()),
                surface: Arc::new(RecordingSurface::new()),
                messenger: Arc::new(RecordingMessenger::new()),
            },
            RunGate::new(),
            OrchestratorOptions::default(),
            Handle::current(),
        );
        (CoverageCommand::new(orchestrator, discovery), build)
    }

    #[tokio::test]
    async fn disabled_until_discovery_finds_tests() {
        let discovery = Notification::new();
        let (command, build) = command(&discovery);
        let mut tree = TestTree::new();
        let class = tree.add_class("A", true).unwrap();
        tree.add_method(class, "one", false).unwrap();

        assert!(!command.is_enabled());
        assert!(matches!(
            command.execute(&tree),
            Err(CovrunError::CommandDisabled {
                state: RunState::Disabled
            })
        ));
        assert_eq!(build.starts(), 0);

        discovery.fire(&tree.has_tests());
        assert!(command.is_enabled());
        command.execute(&tree).unwrap();
        assert_eq!(command.state(), RunState::Running);
    }

    #[tokio::test]
    async fn dropping_command_stops_listening() {
        let discovery = Notification::new();
        let (command, _build) = command(&discovery);
        assert_eq!(discovery.subscriber_count(), 1);
        drop(command);
        assert_eq!(discovery.subscriber_count(), 0);
    }
}
