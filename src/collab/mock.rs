//! Mock collaborators for testing
//!
//! Record every call without touching a real build system, test runner or UI.
//! Essential for unit tests and CI pipelines.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use super::{BuildOutcome, BuildSystem, CoverageResult, ExecutionEngine, Messenger, ResultsSurface};
use crate::notice::{Notice, NoticeKind};
use crate::selection::SelectedTestSet;
use crate::subscription::Notification;

// ============================================================================
// BUILD
// ============================================================================

/// Build system whose completion is fired by the test
pub struct MockBuildSystem {
    finished: Notification<BuildOutcome>,
    starts: AtomicUsize,
    /// Error returned from `start_build` when set
    start_error: Mutex<Option<String>>,
}

impl MockBuildSystem {
    pub fn new() -> Self {
        Self {
            finished: Notification::new(),
            starts: AtomicUsize::new(0),
            start_error: Mutex::new(None),
        }
    }

    /// Make every `start_build` call fail with `message`
    pub fn failing_start(self, message: impl Into<String>) -> Self {
        *self.start_error.lock() = Some(message.into());
        self
    }

    /// Simulate a build completing; returns how many handlers ran
    pub fn finish(&self, outcome: BuildOutcome) -> usize {
        self.finished.fire(&outcome)
    }

    /// Number of builds requested
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.finished.subscriber_count()
    }
}

impl Default for MockBuildSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildSystem for MockBuildSystem {
    fn start_build(&self) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        match self.start_error.lock().as_ref() {
            Some(message) => Err(anyhow!("{}", message)),
            None => Ok(()),
        }
    }

    fn build_finished(&self) -> &Notification<BuildOutcome> {
        &self.finished
    }
}

// ============================================================================
// ENGINE
// ============================================================================

enum Behavior {
    Succeed(CoverageResult),
    Fail(String),
    Panic,
}

/// Engine returning queued outcomes (FIFO), then a default success
///
/// The default payload lists the qualified names it was asked to run.
pub struct MockEngine {
    queue: Mutex<VecDeque<Behavior>>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_result(self, result: CoverageResult) -> Self {
        self.queue.lock().push_back(Behavior::Succeed(result));
        self
    }

    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.queue.lock().push_back(Behavior::Fail(message.into()));
        self
    }

    /// Next execution panics inside the worker task
    pub fn with_panic(self) -> Self {
        self.queue.lock().push_back(Behavior::Panic);
        self
    }

    /// Qualified names passed to each `execute` call
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn execute(&self, tests: &SelectedTestSet) -> Result<CoverageResult> {
        let names = tests.qualified_names();
        self.calls.lock().push(names.clone());

        let behavior = self.queue.lock().pop_front();
        match behavior {
            Some(Behavior::Succeed(result)) => Ok(result),
            Some(Behavior::Fail(message)) => Err(anyhow!("{}", message)),
            Some(Behavior::Panic) => panic!("mock engine panicked"),
            None => Ok(CoverageResult::new(json!({ "tests": names }))),
        }
    }
}

// ============================================================================
// SURFACES
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    Show,
    Focus,
    Publish(CoverageResult),
}

/// Results surface that records calls in order
#[derive(Default)]
pub struct RecordingSurface {
    calls: Mutex<Vec<SurfaceCall>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.calls.lock().clone()
    }

    pub fn published(&self) -> Vec<CoverageResult> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                SurfaceCall::Publish(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ResultsSurface for RecordingSurface {
    fn show(&self) {
        self.calls.lock().push(SurfaceCall::Show);
    }

    fn focus(&self) {
        self.calls.lock().push(SurfaceCall::Focus);
    }

    fn publish(&self, result: &CoverageResult) -> Result<()> {
        self.calls.lock().push(SurfaceCall::Publish(result.clone()));
        Ok(())
    }
}

/// Messenger that keeps every notice
#[derive(Default)]
pub struct RecordingMessenger {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    pub fn kinds(&self) -> Vec<NoticeKind> {
        self.notices.lock().iter().map(|n| n.kind).collect()
    }
}

impl Messenger for RecordingMessenger {
    fn notify(&self, notice: &Notice) {
        self.notices.lock().push(notice.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notice::Notices;

    #[test]
    fn build_start_can_fail() {
        let build = MockBuildSystem::new().failing_start("no solution loaded");
        assert!(build.start_build().is_err());
        assert_eq!(build.starts(), 1);
    }

    #[test]
    fn finish_reaches_subscribers() {
        let build = MockBuildSystem::new();
        let _sub = build.build_finished().subscribe(|_| {});
        assert_eq!(build.finish(BuildOutcome::Succeeded), 1);
    }

    #[tokio::test]
    async fn engine_queue_then_default() {
        let engine = MockEngine::new().with_failure("boom");
        let tests = SelectedTestSet::default();

        assert!(engine.execute(&tests).await.is_err());
        let result = engine.execute(&tests).await.unwrap();
        assert_eq!(result.payload(), &json!({ "tests": [] }));
        assert_eq!(engine.call_count(), 2);
    }

    #[test]
    fn recorders_keep_order() {
        let surface = RecordingSurface::new();
        surface.show();
        surface.publish(&CoverageResult::new(json!(1))).unwrap();
        surface.focus();
        assert_eq!(surface.published().len(), 1);
        assert_eq!(surface.calls()[0], SurfaceCall::Show);

        let messenger = RecordingMessenger::new();
        messenger.notify(&Notices::default().no_selection());
        assert_eq!(messenger.kinds(), vec![NoticeKind::NoSelection]);
    }
}
