//! covrun CLI - coverage for selected tests

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio::runtime::Handle;

use covrun::collab::{CommandEngine, ConsoleMessenger, ConsoleSurface, ShellBuild};
use covrun::{
    resolve, Collaborators, CoverageCommand, CoverageConfig, CoverageRunOrchestrator, CovrunError,
    FixSuggestion, Notification, OrchestratorOptions, RunGate, RunReport, TestTree,
};

#[derive(Parser)]
#[command(name = "covrun")]
#[command(about = "Run code coverage over the selected tests of a test tree")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build, run the selected tests under coverage and print the results
    Run {
        /// Path to the test tree YAML
        #[arg(short, long)]
        tree: PathBuf,

        /// Path to the coverage config YAML
        #[arg(short, long, default_value = "covrun.yaml")]
        config: PathBuf,

        /// Print the run log as JSON when done
        #[arg(long)]
        log_json: bool,
    },

    /// Print the tests a run would execute
    Select {
        /// Path to the test tree YAML
        #[arg(short, long)]
        tree: PathBuf,

        /// Print a JSON array instead of one name per line
        #[arg(long)]
        json: bool,
    },

    /// Validate a test tree and, optionally, a config file
    Validate {
        /// Path to the test tree YAML
        #[arg(short, long)]
        tree: PathBuf,

        /// Path to the coverage config YAML
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file (ignore if not present)
    let _ = dotenvy::dotenv();

    // Logs on stderr; stdout carries results
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            tree,
            config,
            log_json,
        } => run_coverage(&tree, &config, log_json).await,
        Commands::Select { tree, json } => select_tests(&tree, json),
        Commands::Validate { tree, config } => validate(&tree, config.as_deref()),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            if let Some(suggestion) = e.fix_suggestion() {
                eprintln!("  {} {}", "Fix:".yellow(), suggestion);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run_coverage(
    tree_path: &Path,
    config_path: &Path,
    log_json: bool,
) -> Result<ExitCode, CovrunError> {
    let tree = TestTree::load(tree_path)?;
    let config = CoverageConfig::load(config_path)?;
    let engine = config
        .engine
        .as_ref()
        .map(CommandEngine::new)
        .ok_or_else(|| CovrunError::Config("engine.command is required to run".to_string()))?;
    let build = ShellBuild::new(config.build.as_ref())
        .map_err(|e| CovrunError::Config(format!("{:#}", e)))?;

    let orchestrator = CoverageRunOrchestrator::new(
        Collaborators {
            build: Arc::new(build),
            engine: Arc::new(engine),
            surface: Arc::new(ConsoleSurface::new(
                config.results_surface.clone(),
                config.results_path.clone(),
            )),
            messenger: Arc::new(ConsoleMessenger::new()),
        },
        RunGate::new(),
        OrchestratorOptions::from(&config),
        Handle::current(),
    );

    let discovery = Notification::new();
    let command = CoverageCommand::new(orchestrator, &discovery);
    discovery.fire(&tree.has_tests());

    let code = match command.execute(&tree) {
        Ok(pending) => match pending.wait().await {
            RunReport::Completed { tests, .. } => {
                println!("{} Coverage collected for {} test(s)", "✓".green(), tests);
                ExitCode::SUCCESS
            }
            // Already reported through the messenger
            RunReport::BuildFailed { .. } | RunReport::Failed { .. } => ExitCode::FAILURE,
        },
        Err(CovrunError::NoSelection) | Err(CovrunError::Build(_)) => ExitCode::FAILURE,
        Err(e) => return Err(e),
    };

    if log_json {
        let log = command.orchestrator().log().to_json();
        println!(
            "{}",
            serde_json::to_string_pretty(&log).unwrap_or_else(|_| log.to_string())
        );
    }

    Ok(code)
}

fn select_tests(tree_path: &Path, json: bool) -> Result<ExitCode, CovrunError> {
    let tree = TestTree::load(tree_path)?;
    let names = resolve(&tree).qualified_names();

    if json {
        let rendered = serde_json::to_string_pretty(&names)
            .map_err(|e| CovrunError::Config(e.to_string()))?;
        println!("{}", rendered);
    } else {
        for name in names {
            println!("{}", name);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn validate(tree_path: &Path, config_path: Option<&Path>) -> Result<ExitCode, CovrunError> {
    let tree = TestTree::load(tree_path)?;
    let selected = resolve(&tree).len();

    println!("{} Test tree '{}' is valid", "✓".green(), tree_path.display());
    println!("  Groups: {}", tree.root().children.len());
    println!("  Classes: {}", tree.classes().len());
    println!("  Methods: {}", tree.method_count());
    println!("  Selected: {}", selected);

    if let Some(path) = config_path {
        let config = CoverageConfig::load(path)?;
        println!("{} Config '{}' is valid", "✓".green(), path.display());
        println!(
            "  Build: {}",
            config
                .build
                .as_ref()
                .map(|b| b.command.as_str())
                .unwrap_or("(none)")
        );
        println!(
            "  Engine: {}",
            config
                .engine
                .as_ref()
                .map(|e| e.command.as_str())
                .unwrap_or("(none)")
        );
    }
    Ok(ExitCode::SUCCESS)
}
