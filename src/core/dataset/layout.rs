use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::config::AppConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pool {
    Train,
    Val,
    Incoming,
}

impl Pool {
    pub fn as_str(&self) -> &str {
        match self {
            Pool::Train => "train",
            Pool::Val => "val",
            Pool::Incoming => "incoming",
        }
    }
}

impl fmt::Display for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where every pool/category directory of a dataset lives.
///
/// Images are laid out as `<root>/<pool dir>/<category>/<file>`, one
/// directory per pool, one subdirectory per category.
#[derive(Debug, Clone)]
pub struct DatasetLayout {
    root: PathBuf,
    train_dir: String,
    val_dir: String,
    incoming_dir: Option<String>,
    categories: Vec<String>,
}

impl DatasetLayout {
    pub fn new(
        root: impl Into<PathBuf>,
        train_dir: impl Into<String>,
        val_dir: impl Into<String>,
        incoming_dir: Option<String>,
        categories: Vec<String>,
    ) -> Self {
        Self {
            root: root.into(),
            train_dir: train_dir.into(),
            val_dir: val_dir.into(),
            incoming_dir,
            categories,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.dataset_root.clone(),
            config.train_dir.clone(),
            config.val_dir.clone(),
            config.incoming_dir.clone(),
            config.categories.clone(),
        )
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn has_incoming(&self) -> bool {
        self.incoming_dir.is_some()
    }

    /// Top-level directory of a pool; `None` for an unconfigured incoming pool
    pub fn pool_dir(&self, pool: Pool) -> Option<PathBuf> {
        match pool {
            Pool::Train => Some(self.root.join(&self.train_dir)),
            Pool::Val => Some(self.root.join(&self.val_dir)),
            Pool::Incoming => self.incoming_dir.as_ref().map(|dir| self.root.join(dir)),
        }
    }

    pub fn category_dir(&self, pool: Pool, category: &str) -> Option<PathBuf> {
        self.pool_dir(pool).map(|dir| dir.join(category))
    }

    pub fn train(&self, category: &str) -> PathBuf {
        self.root.join(&self.train_dir).join(category)
    }

    pub fn val(&self, category: &str) -> PathBuf {
        self.root.join(&self.val_dir).join(category)
    }

    pub fn incoming(&self, category: &str) -> Option<PathBuf> {
        self.category_dir(Pool::Incoming, category)
    }
}
