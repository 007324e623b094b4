//! File counts per pool and category.
//!
//! Counting never fails: a pool directory that does not exist is reported as
//! `PoolCount::Missing` and weighs in as zero files, which keeps it apart from
//! a directory that exists but is empty.

use serde::Serialize;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::core::dataset::{DatasetLayout, Pool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "files", rename_all = "snake_case")]
pub enum PoolCount {
    /// The directory does not exist
    Missing,
    /// The directory exists and holds this many files (recursively)
    Present(usize),
}

impl PoolCount {
    pub fn files(&self) -> usize {
        match self {
            PoolCount::Missing => 0,
            PoolCount::Present(files) => *files,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, PoolCount::Missing)
    }
}

/// Count the regular files under `dir`, including nested directories
pub fn count_files(dir: &Path) -> PoolCount {
    if !dir.is_dir() {
        return PoolCount::Missing;
    }

    let mut files = 0;
    for entry in WalkDir::new(dir) {
        match entry {
            Ok(entry) if entry.file_type().is_file() => files += 1,
            Ok(_) => {}
            Err(e) => debug!("Skipping unreadable entry under {:?}: {}", dir, e),
        }
    }
    PoolCount::Present(files)
}

/// Counts of every pool of one category
#[derive(Debug, Clone, Serialize)]
pub struct CategoryInventory {
    pub category: String,
    pub train: PoolCount,
    pub val: PoolCount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incoming: Option<PoolCount>,
}

impl CategoryInventory {
    pub fn read(layout: &DatasetLayout, category: &str) -> Self {
        let inventory = Self {
            category: category.to_string(),
            train: count_files(&layout.train(category)),
            val: count_files(&layout.val(category)),
            incoming: layout.incoming(category).map(|dir| count_files(&dir)),
        };

        for pool in inventory.missing_pools() {
            warn!("{} pool for category {} does not exist, counting it as empty", pool, category);
        }
        inventory
    }

    /// Files assigned to a split (train + val); incoming files are not counted
    pub fn total(&self) -> usize {
        self.train.files() + self.val.files()
    }

    pub fn missing_pools(&self) -> Vec<Pool> {
        let mut missing = Vec::new();
        if self.train.is_missing() {
            missing.push(Pool::Train);
        }
        if self.val.is_missing() {
            missing.push(Pool::Val);
        }
        if self.incoming.map_or(false, |count| count.is_missing()) {
            missing.push(Pool::Incoming);
        }
        missing
    }
}

/// Inventory of the whole dataset, one entry per configured category
#[derive(Debug, Clone, Default, Serialize)]
pub struct InventorySnapshot {
    pub categories: Vec<CategoryInventory>,
}

impl InventorySnapshot {
    pub fn take(layout: &DatasetLayout) -> Self {
        Self {
            categories: layout
                .categories()
                .iter()
                .map(|category| CategoryInventory::read(layout, category))
                .collect(),
        }
    }

    /// Files across every category's train and val pools
    #[cfg(test)]
    pub fn grand_total(&self) -> usize {
        self.categories.iter().map(CategoryInventory::total).sum()
    }

    #[cfg(test)]
    pub fn category(&self, name: &str) -> Option<&CategoryInventory> {
        self.categories.iter().find(|c| c.category == name)
    }
}
