//! covrun - run code coverage over a selected subset of a test tree

pub mod collab;
pub mod command;
pub mod config;
pub mod error;
pub mod notice;
pub mod orchestrator;
pub mod run_log;
pub mod run_state;
pub mod selection;
pub mod subscription;
pub mod tree;

pub use collab::{
    BuildOutcome, BuildSystem, CoverageResult, ExecutionEngine, Messenger, ResultsSurface,
};
pub use command::CoverageCommand;
pub use config::CoverageConfig;
pub use error::{CovrunError, FixSuggestion};
pub use notice::{Notice, NoticeKind, Notices, Severity};
pub use orchestrator::{
    Collaborators, CoverageRunOrchestrator, OrchestratorOptions, PendingRun, RunReport,
};
pub use run_log::{RunEvent, RunEventKind, RunLog};
pub use run_state::{RunGate, RunState};
pub use selection::{resolve, SelectedTestSet};
pub use subscription::{Notification, Subscription};
pub use tree::{NodeId, NodeKind, TestMethod, TestNode, TestTree};
