//! Error types with fix suggestions

use thiserror::Error;

use crate::run_state::RunState;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// All error variants are part of the public API.
#[derive(Error, Debug)]
pub enum CovrunError {
    // ─────────────────────────────────────────────────────────────
    // Run lifecycle
    // ─────────────────────────────────────────────────────────────
    #[error("COV-001: No test selected")]
    NoSelection,

    #[error("COV-002: Cannot {action} while the coverage command is {state}")]
    IllegalState {
        action: &'static str,
        state: RunState,
    },

    #[error("COV-003: Coverage command is {state}")]
    CommandDisabled { state: RunState },

    #[error("COV-010: Build failed: {0}")]
    Build(String),

    #[error("COV-011: Coverage execution failed: {0}")]
    Execution(String),

    // ─────────────────────────────────────────────────────────────
    // Inputs
    // ─────────────────────────────────────────────────────────────
    #[error("COV-020: Test tree parse error: {0}")]
    TreeParse(#[source] serde_yaml::Error),

    #[error("COV-021: Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("COV-022: Duplicate name '{name}' in {scope}")]
    DuplicateName { name: String, scope: String },

    #[error("COV-030: Config parse error: {0}")]
    ConfigParse(#[source] serde_yaml::Error),

    #[error("COV-031: Invalid config: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CovrunError {
    /// True for errors the user can fix by re-invoking the command
    pub fn is_user_recoverable(&self) -> bool {
        !matches!(self, CovrunError::IllegalState { .. })
    }
}

impl FixSuggestion for CovrunError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            CovrunError::NoSelection => {
                Some("Mark a test class or at least one test method as selected")
            }
            CovrunError::IllegalState { .. } => None,
            CovrunError::CommandDisabled { .. } => {
                Some("Wait for test discovery to find tests, or for the current run to finish")
            }
            CovrunError::Build(_) => Some("Fix the build errors and run coverage again"),
            CovrunError::Execution(_) => {
                Some("Check the coverage engine command and its output, then run again")
            }
            CovrunError::TreeParse(_) => Some("Check YAML syntax: indentation and quoting"),
            CovrunError::InvalidName { .. } => {
                Some("Use identifier characters: letters, digits, '_', '.', '<', '>', ','")
            }
            CovrunError::DuplicateName { .. } => Some("Give every group and method a unique name"),
            CovrunError::ConfigParse(_) => Some("Check YAML syntax in the config file"),
            CovrunError::Config(_) => {
                Some("engine.command must contain {{tests}}; build.command must not be empty")
            }
            CovrunError::Io(_) => Some("Check file path and permissions"),
        }
    }
}
