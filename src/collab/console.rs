//! Terminal surface and messenger used by the `covrun` binary

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use colored::Colorize;
use tracing::{debug, info};

use super::{CoverageResult, Messenger, ResultsSurface};
use crate::notice::{Notice, Severity};

/// Prints results to stdout, optionally mirroring them to a JSON file
pub struct ConsoleSurface {
    name: String,
    shown: AtomicBool,
    results_path: Option<PathBuf>,
}

impl ConsoleSurface {
    pub fn new(name: impl Into<String>, results_path: Option<PathBuf>) -> Self {
        Self {
            name: name.into(),
            shown: AtomicBool::new(false),
            results_path,
        }
    }

    fn write_results(&self, result: &CoverageResult) -> Result<()> {
        let Some(path) = &self.results_path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(result.payload())?;
        std::fs::write(path, json).with_context(|| {
            format!("Failed to write coverage results to '{}'", path.display())
        })?;
        info!(path = %path.display(), "Coverage results written");
        Ok(())
    }
}

impl ResultsSurface for ConsoleSurface {
    fn show(&self) {
        if !self.shown.swap(true, Ordering::SeqCst) {
            println!("{}", format!("── {} ──", self.name).bold());
        }
    }

    fn focus(&self) {
        debug!(surface = %self.name, "Results surface focused");
    }

    fn publish(&self, result: &CoverageResult) -> Result<()> {
        let rendered = match result.payload() {
            serde_json::Value::String(s) => s.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        };
        println!("{}", rendered);
        self.write_results(result)
    }
}

/// Errors go to stderr in red, information to stdout
#[derive(Debug, Default)]
pub struct ConsoleMessenger;

impl ConsoleMessenger {
    pub fn new() -> Self {
        Self
    }
}

impl Messenger for ConsoleMessenger {
    fn notify(&self, notice: &Notice) {
        match notice.severity {
            Severity::Error => {
                eprintln!("{} {}", format!("{}:", notice.title).red().bold(), notice.message)
            }
            Severity::Info => {
                println!("{} {}", format!("{}:", notice.title).cyan().bold(), notice.message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn publish_mirrors_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coverage.json");
        let surface = ConsoleSurface::new("Results", Some(path.clone()));

        surface.show();
        surface.show();
        surface
            .publish(&CoverageResult::new(json!({ "covered": 12 })))
            .unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, json!({ "covered": 12 }));
    }

    #[test]
    fn publish_without_path_does_not_write() {
        let surface = ConsoleSurface::new("Results", None);
        surface
            .publish(&CoverageResult::new(json!("plain output")))
            .unwrap();
    }

    #[test]
    fn unwritable_results_path_fails_publish() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("coverage.json");
        let surface = ConsoleSurface::new("Results", Some(path));

        let err = surface
            .publish(&CoverageResult::new(json!({ "covered": 1 })))
            .unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to write coverage results"));
    }
}
