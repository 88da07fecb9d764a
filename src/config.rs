//! Coverage configuration
//!
//! Loaded from YAML; every field has a default so an empty document is valid.
//!
//! ```yaml
//! title: Code Coverage
//! results_surface: Code Coverage Results
//! run_on_failed_build: false
//! build:
//!   command: dotnet build
//! engine:
//!   command: opencover-run --filter "{{tests}}"
//!   separator: ","
//! results_path: coverage.json
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CovrunError;

/// Placeholder in `engine.command` replaced by the selected test names
pub const TESTS_PLACEHOLDER: &str = "{{tests}}";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageConfig {
    /// Caption used for every notice
    #[serde(default = "default_title")]
    pub title: String,

    /// Name of the results surface, quoted in the "please wait" notice
    #[serde(default = "default_surface")]
    pub results_surface: String,

    /// Execute tests even when the build reports failure
    #[serde(default)]
    pub run_on_failed_build: bool,

    #[serde(default)]
    pub build: Option<BuildConfig>,

    #[serde(default)]
    pub engine: Option<EngineConfig>,

    /// Also write published results here as JSON
    #[serde(default)]
    pub results_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    pub command: String,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub command: String,
    #[serde(default = "default_separator")]
    pub separator: String,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

fn default_title() -> String {
    "Code Coverage".to_string()
}

fn default_surface() -> String {
    "Code Coverage Results".to_string()
}

fn default_separator() -> String {
    " ".to_string()
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            results_surface: default_surface(),
            run_on_failed_build: false,
            build: None,
            engine: None,
            results_path: None,
        }
    }
}

impl CoverageConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CovrunError> {
        // An empty file deserializes to unit, not to a mapping
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml).map_err(CovrunError::ConfigParse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, CovrunError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn validate(&self) -> Result<(), CovrunError> {
        if let Some(build) = &self.build {
            if build.command.trim().is_empty() {
                return Err(CovrunError::Config("build.command is empty".to_string()));
            }
        }
        if let Some(engine) = &self.engine {
            if !engine.command.contains(TESTS_PLACEHOLDER) {
                return Err(CovrunError::Config(format!(
                    "engine.command must contain {}",
                    TESTS_PLACEHOLDER
                )));
            }
        }
        Ok(())
    }
}
