//! User-facing notices tied to orchestration milestones
//!
//! | Kind          | Severity | When                                        |
//! |---------------|----------|---------------------------------------------|
//! | `NoSelection` | Error    | invoked with nothing selected               |
//! | `RunStarting` | Info     | build requested, results will follow        |
//! | `BuildFailed` | Error    | build reported failure, tests not executed  |
//! | `RunFailed`   | Error    | execution engine failed                     |

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    NoSelection,
    RunStarting,
    BuildFailed,
    RunFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Error,
}

impl NoticeKind {
    pub fn severity(self) -> Severity {
        match self {
            NoticeKind::RunStarting => Severity::Info,
            NoticeKind::NoSelection | NoticeKind::BuildFailed | NoticeKind::RunFailed => {
                Severity::Error
            }
        }
    }
}

/// A message ready for the messaging surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub severity: Severity,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.message)
    }
}

/// Builds notices with the host's caption and results-surface name
#[derive(Debug, Clone)]
pub struct Notices {
    title: String,
    surface: String,
}

impl Notices {
    pub fn new(title: impl Into<String>, surface: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            surface: surface.into(),
        }
    }

    pub fn no_selection(&self) -> Notice {
        self.make(NoticeKind::NoSelection, "Please select a test to run".to_string())
    }

    pub fn run_starting(&self) -> Notice {
        self.make(
            NoticeKind::RunStarting,
            format!(
                "Please wait while we collect code coverage results. The results will be shown in '{}' window!",
                self.surface
            ),
        )
    }

    pub fn build_failed(&self, reason: &str) -> Notice {
        self.make(
            NoticeKind::BuildFailed,
            format!("Build failed, code coverage was not collected: {}", reason),
        )
    }

    pub fn run_failed(&self, error: &str) -> Notice {
        self.make(
            NoticeKind::RunFailed,
            format!("Code coverage run failed: {}", error),
        )
    }

    fn make(&self, kind: NoticeKind, message: String) -> Notice {
        Notice {
            kind,
            severity: kind.severity(),
            title: self.title.clone(),
            message,
        }
    }
}

impl Default for Notices {
    fn default() -> Self {
        Self::new("Code Coverage", "Code Coverage Results")
    }
}
