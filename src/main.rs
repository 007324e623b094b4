//! Keeps the queue-pop screenshot dataset split the way the classifier's
//! training expects: new screenshots merged into train, every category split
//! train/val at the target ratio, nothing ever deleted.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

mod config;
mod core;
mod errors;
mod logging;
mod pipeline;
mod report;

use crate::config::AppConfig;
use crate::core::{BalanceContext, DatasetLayout, InventorySnapshot};
use crate::errors::{AppError, ConfigError};
use crate::pipeline::{RunPolicy, Supervisor};

#[derive(Parser, Debug)]
#[command(name = "queue-pop-dataset")]
#[command(about = "Balance queue-pop screenshots across train and val pools")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    overrides: Overrides,

    /// Print the final report as JSON instead of a table
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge incoming screenshots and rebalance every category (default)
    Balance,
    /// Show file counts per category and pool without moving anything
    Status,
    /// Give train and val images unique timestamped names
    Rename,
    /// Write a config file with the current settings
    InitConfig {
        /// Where to write it (defaults to the per-user config file)
        path: Option<PathBuf>,

        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Settings that override the config file
#[derive(clap::Args, Debug)]
struct Overrides {
    /// Config file to read
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Dataset root holding the pool directories
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Fraction of each category kept in train
    #[arg(long, global = true)]
    ratio: Option<f64>,

    /// Seed for choosing which files move
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Also write logs to a timestamped file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Skip the incoming pool entirely
    #[arg(long, global = true)]
    no_incoming: bool,

    /// Stop when moves still fail after retrying
    #[arg(long, global = true)]
    abort_on_failure: bool,
}

impl Overrides {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(root) = &self.root {
            config.dataset_root = root.clone();
        }
        if let Some(ratio) = self.ratio {
            config.ratio_target = ratio;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(log_dir) = &self.log_dir {
            config.log_dir = Some(log_dir.clone());
        }
        if self.no_incoming {
            config.incoming_dir = None;
        }
        if self.abort_on_failure {
            config.abort_on_failure = true;
        }
    }
}

/// Defaults, then the config file, then command-line overrides
fn resolve_config(overrides: &Overrides) -> Result<(AppConfig, Option<PathBuf>), ConfigError> {
    let source = AppConfig::locate(overrides.config.as_deref());
    let mut config = match &source {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::default(),
    };
    overrides.apply(&mut config);
    config.validate()?;
    Ok((config, source))
}

fn init_config(config: &AppConfig, path: Option<PathBuf>, force: bool) -> Result<(), AppError> {
    let path = match path {
        Some(path) => path,
        None => AppConfig::default_config_path().ok_or(ConfigError::NoConfigDir)?,
    };
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists(path).into());
    }
    config.save(&path)?;
    info!("Wrote config to {:?}", path);
    println!("{}", path.display());
    Ok(())
}

fn run(command: Command, config: AppConfig, json: bool) -> Result<ExitCode, AppError> {
    match command {
        Command::Status => {
            let snapshot = InventorySnapshot::take(&DatasetLayout::from_config(&config));
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                print!("{}", report::render_summary(&snapshot));
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Balance => {
            let mut ctx = BalanceContext::from_config(&config);
            let outcome = Supervisor::new(RunPolicy::from(&config)).run(&mut ctx)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("\nFinal image counts:");
                print!("{}", report::render_summary(&outcome.summary));
            }

            let unresolved: Vec<_> = outcome.unresolved_failures().collect();
            if unresolved.is_empty() {
                return Ok(ExitCode::SUCCESS);
            }
            warn!("{} file(s) could not be moved", unresolved.len());
            if !json {
                println!("\nFiles that could not be moved:");
                print!("{}", report::render_failures(unresolved));
            }
            Ok(ExitCode::from(2))
        }
        Command::Rename => {
            let layout = DatasetLayout::from_config(&config);
            let (phase, renamed) = Supervisor::new(RunPolicy::from(&config)).rename(&layout)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&renamed)?);
            } else {
                println!("Renamed {} file(s), {} already named", renamed.renamed, renamed.unchanged);
            }

            if phase.failures.is_empty() {
                return Ok(ExitCode::SUCCESS);
            }
            if !json {
                println!("\nFiles that could not be renamed:");
                print!("{}", report::render_failures(&phase.failures));
            }
            Ok(ExitCode::from(2))
        }
        Command::InitConfig { path, force } => {
            init_config(&config, path, force)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Logging depends on the config, so config errors are reported plainly
    let (config, source) = match resolve_config(&args.overrides) {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match logging::setup_logging(config.log_dir.as_deref(), args.verbose) {
        Ok(Some(log_path)) => info!("Log file created at: {:?}", log_path),
        Ok(None) => {}
        Err(e) => {
            eprintln!("error: {}", AppError::Logging(e));
            return ExitCode::FAILURE;
        }
    }

    match &source {
        Some(path) => info!("Using config file {:?}", path),
        None => info!("No config file found, using defaults"),
    }
    info!(
        "Dataset root {:?}, categories {:?}, ratio {}",
        config.dataset_root, config.categories, config.ratio_target
    );

    match run(args.command.unwrap_or(Command::Balance), config, args.json) {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_parses() {
        let args = Args::try_parse_from(["queue-pop-dataset"]).unwrap();
        assert!(args.command.is_none());
        assert!(!args.json);
    }

    #[test]
    fn test_overrides_apply_over_config() {
        let args = Args::try_parse_from([
            "queue-pop-dataset",
            "status",
            "--root",
            "/datasets/wow",
            "--ratio",
            "0.75",
            "--seed",
            "9",
            "--no-incoming",
        ])
        .unwrap();
        assert!(matches!(args.command, Some(Command::Status)));

        let mut config = AppConfig::default();
        args.overrides.apply(&mut config);

        assert_eq!(config.dataset_root, PathBuf::from("/datasets/wow"));
        assert_eq!(config.ratio_target, 0.75);
        assert_eq!(config.seed, Some(9));
        assert!(config.incoming_dir.is_none());
        assert!(!config.abort_on_failure);
    }

    #[test]
    fn test_invalid_ratio_is_rejected() {
        let args = Args::try_parse_from(["queue-pop-dataset", "--ratio", "1.5"]).unwrap();
        let temp = tempfile::TempDir::new().unwrap();
        let config_path = temp.path().join("config.json");
        AppConfig::default().save(&config_path).unwrap();

        let overrides = Overrides {
            config: Some(config_path),
            ..args.overrides
        };

        assert!(matches!(
            resolve_config(&overrides),
            Err(ConfigError::InvalidRatio(_))
        ));
    }

    #[test]
    fn test_init_config_refuses_to_overwrite() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        let config = AppConfig::default();

        init_config(&config, Some(path.clone()), false).unwrap();
        assert!(matches!(
            init_config(&config, Some(path.clone()), false),
            Err(AppError::Config(ConfigError::AlreadyExists(_)))
        ));
        init_config(&config, Some(path), true).unwrap();
    }
}
