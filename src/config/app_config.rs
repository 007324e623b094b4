use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::ConfigError;

/// Run configuration for the rebalancer.
///
/// Built from defaults, then a JSON config file, then command-line
/// overrides. Missing fields in the file fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding the pool directories
    pub dataset_root: PathBuf,

    pub train_dir: String,

    pub val_dir: String,

    /// Pool that new screenshots land in; `None` skips the intake phase
    pub incoming_dir: Option<String>,

    pub categories: Vec<String>,

    /// Fraction of each category that belongs in the training pool
    pub ratio_target: f64,

    /// Seed for file selection; `None` draws one from the OS
    pub seed: Option<u64>,

    /// Also write logs to a timestamped file in this directory
    pub log_dir: Option<PathBuf>,

    /// How many times a failed move is retried before its batch finishes
    pub retry_attempts: u32,

    /// Stop the run when failed moves remain after retrying
    pub abort_on_failure: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            dataset_root: PathBuf::from("."),
            train_dir: "train".to_string(),
            val_dir: "val".to_string(),
            incoming_dir: Some("screenshots".to_string()),
            categories: vec!["queue_pop".to_string(), "not_queue_pop".to_string()],
            ratio_target: 0.8,
            seed: None,
            log_dir: None,
            retry_attempts: 1,
            abort_on_failure: false,
        }
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

impl AppConfig {
    /// `config.json` in the per-user config directory
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "queue-pop-dataset")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Config file to read: the explicit path if one was given, otherwise the
    /// per-user file if it exists.
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_config_path().filter(|path| path.is_file()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the config as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(write_err)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.ratio_target > 0.0 && self.ratio_target < 1.0) {
            return Err(ConfigError::InvalidRatio(self.ratio_target));
        }

        if self.categories.is_empty() {
            return Err(ConfigError::NoCategories);
        }
        let mut seen = HashSet::new();
        for category in &self.categories {
            if !is_plain_name(category) {
                return Err(ConfigError::InvalidName(category.clone()));
            }
            if !seen.insert(category.as_str()) {
                return Err(ConfigError::DuplicateCategory(category.clone()));
            }
        }

        let mut pool_dirs = HashSet::new();
        let dirs = [Some(&self.train_dir), Some(&self.val_dir), self.incoming_dir.as_ref()];
        for dir in dirs.into_iter().flatten() {
            if !is_plain_name(dir) {
                return Err(ConfigError::InvalidName(dir.clone()));
            }
            if !pool_dirs.insert(dir.as_str()) {
                return Err(ConfigError::DuplicatePoolDir(dir.clone()));
            }
        }

        Ok(())
    }
}
