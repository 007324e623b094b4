use serde::Serialize;
use std::path::Path;
use tracing::{info, info_span, warn};

use super::relocator::{relocate_retrying, MoveFailure, RelocationReport};
use crate::core::analysis::count_files;
use crate::core::context::BalanceContext;
use crate::core::dataset::Pool;
use crate::errors::BalanceError;

// Keeps products like 0.29 * 100 = 28.999999999999996 from flooring a whole file short
const RATIO_EPSILON: f64 = 1e-9;

/// Why a balancing step did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// There are no files to split
    ZeroTotal,
    /// No categories are configured
    NoCategories,
}

/// Train and val file counts of one category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SplitCounts {
    pub train: usize,
    pub val: usize,
}

impl SplitCounts {
    /// Current counts; a pool directory that does not exist counts as empty
    pub fn read(train_dir: &Path, val_dir: &Path) -> Self {
        Self::inspect(train_dir, val_dir).0
    }

    /// Current counts, plus the pools whose directory does not exist
    pub fn inspect(train_dir: &Path, val_dir: &Path) -> (Self, Vec<Pool>) {
        let train = count_files(train_dir);
        let val = count_files(val_dir);

        let mut missing = Vec::new();
        if train.is_missing() {
            missing.push(Pool::Train);
        }
        if val.is_missing() {
            missing.push(Pool::Val);
        }

        let counts = Self {
            train: train.files(),
            val: val.files(),
        };
        (counts, missing)
    }

    pub fn total(&self) -> usize {
        self.train + self.val
    }
}

/// Outcome of balancing one category's train/val split
#[derive(Debug, Clone, Serialize)]
pub struct CategoryBalance {
    pub category: String,
    pub before: SplitCounts,
    pub after: SplitCounts,
    pub ideal_train: usize,
    pub ideal_val: usize,
    pub skipped: Option<SkipReason>,
    /// Pools that did not exist when balancing started
    pub missing_pools: Vec<Pool>,
    pub relocations: Vec<RelocationReport>,
    /// Failed moves that other files made up for. Those files stayed where
    /// they were and the split still reached its ideal.
    pub covered: Vec<MoveFailure>,
}

impl CategoryBalance {
    /// Train and val hold exactly the ideal split
    pub fn is_settled(&self) -> bool {
        self.skipped.is_none()
            && self.after.train == self.ideal_train
            && self.after.val == self.ideal_val
    }

    fn cover_failures(&mut self) {
        if !self.is_settled() {
            return;
        }
        for relocation in &mut self.relocations {
            self.covered.append(&mut relocation.failures);
        }
    }

    pub fn moved_count(&self) -> usize {
        self.relocations.iter().map(RelocationReport::moved_count).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &MoveFailure> {
        self.relocations.iter().flat_map(|r| r.failures.iter())
    }
}

/// Split `total` files into `(train, val)` so that train is
/// `floor(total * ratio)`.
pub fn ideal_split(total: usize, ratio: f64) -> (usize, usize) {
    let train = ((total as f64) * ratio + RATIO_EPSILON).floor() as usize;
    let train = train.min(total);
    (train, total - train)
}

/// Move files between a category's train and val pools until train holds
/// `floor(total * ratio_target)` of them.
///
/// `total` is the category's current train + val count unless `target_total`
/// is given. The train side is reconciled first, then val is recounted and
/// reconciled again, which catches whatever the first pass could not move.
/// When `total` is the real count the first pass is already exact; the second
/// one only matters after failed moves or for an explicit target that does
/// not match what is on disk. Failed moves are retried inside each batch, so
/// the recount between the passes sees every file that was going to move.
/// If the split still ends up exact, the failures go to `covered`.
pub fn balance_category(
    ctx: &mut BalanceContext,
    category: &str,
    target_total: Option<usize>,
) -> Result<CategoryBalance, BalanceError> {
    let _span = info_span!("category", name = category).entered();

    let train_dir = ctx.layout.train(category);
    let val_dir = ctx.layout.val(category);

    let (before, missing_pools) = SplitCounts::inspect(&train_dir, &val_dir);
    for pool in &missing_pools {
        warn!("{} pool for category {} does not exist, counting it as empty", pool, category);
    }
    info!("Train: {}, Val: {}", before.train, before.val);

    let total = target_total.unwrap_or_else(|| before.total());
    let mut balance = CategoryBalance {
        category: category.to_string(),
        before,
        after: before,
        ideal_train: 0,
        ideal_val: 0,
        skipped: None,
        missing_pools,
        relocations: Vec::new(),
        covered: Vec::new(),
    };

    if before.total() == 0 || total == 0 {
        warn!("No images found for category {}, skipping", category);
        balance.skipped = Some(SkipReason::ZeroTotal);
        return Ok(balance);
    }

    let (ideal_train, ideal_val) = ideal_split(total, ctx.ratio_target);
    balance.ideal_train = ideal_train;
    balance.ideal_val = ideal_val;
    info!(
        "Target for {} images at ratio {}: Train {}, Val {}",
        total, ctx.ratio_target, ideal_train, ideal_val
    );

    let attempts = ctx.retry_attempts;
    let mut shift = |from: &Path, to: &Path, count: usize| {
        relocate_retrying(from, to, count, attempts, &mut ctx.rng)
    };

    if before.train > ideal_train {
        let excess = before.train - ideal_train;
        info!("Moving {} images from train to val", excess);
        balance.relocations.push(shift(&train_dir, &val_dir, excess)?);
    } else if before.train < ideal_train {
        let shortfall = ideal_train - before.train;
        info!("Moving {} images from val to train", shortfall);
        balance.relocations.push(shift(&val_dir, &train_dir, shortfall)?);
    }

    let val_now = count_files(&val_dir).files();
    if val_now > ideal_val {
        let excess = val_now - ideal_val;
        info!("Val still over target, moving {} images from val to train", excess);
        balance.relocations.push(shift(&val_dir, &train_dir, excess)?);
    } else if val_now < ideal_val {
        let shortfall = ideal_val - val_now;
        info!("Val still under target, moving {} images from train to val", shortfall);
        balance.relocations.push(shift(&train_dir, &val_dir, shortfall)?);
    }

    balance.after = SplitCounts::read(&train_dir, &val_dir);
    balance.cover_failures();
    info!(
        "Final total images for {}: Train: {}, Val: {}",
        category, balance.after.train, balance.after.val
    );

    Ok(balance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    use crate::core::dataset::DatasetLayout;

    fn context(root: &Path, ratio: f64) -> BalanceContext {
        let layout = DatasetLayout::new(root, "train", "val", None, vec!["queue_pop".to_string()]);
        BalanceContext::new(layout, ratio, Some(17))
    }

    fn fill(dir: &Path, prefix: &str, count: usize) {
        fs::create_dir_all(dir).unwrap();
        for i in 0..count {
            fs::write(dir.join(format!("{}_{}.png", prefix, i)), "").unwrap();
        }
    }

    #[test]
    fn test_ideal_split() {
        assert_eq!(ideal_split(100, 0.8), (80, 20));
        assert_eq!(ideal_split(101, 0.8), (80, 21));
        assert_eq!(ideal_split(100, 0.29), (29, 71));
        assert_eq!(ideal_split(3, 0.5), (1, 2));
        assert_eq!(ideal_split(0, 0.8), (0, 0));
    }

    #[test]
    fn test_all_in_train_converges_to_ratio() {
        let temp = TempDir::new().unwrap();
        let mut ctx = context(temp.path(), 0.8);
        fill(&ctx.layout.train("queue_pop"), "t", 100);

        let balance = balance_category(&mut ctx, "queue_pop", None).unwrap();

        assert_eq!(balance.before, SplitCounts { train: 100, val: 0 });
        assert!((79..=81).contains(&balance.after.train));
        assert!((19..=21).contains(&balance.after.val));
        assert_eq!(balance.after.total(), 100);
        assert!(balance.failures().next().is_none());
    }

    #[test]
    fn test_all_in_val_converges_to_ratio() {
        let temp = TempDir::new().unwrap();
        let mut ctx = context(temp.path(), 0.8);
        fill(&ctx.layout.val("queue_pop"), "v", 50);

        let balance = balance_category(&mut ctx, "queue_pop", None).unwrap();

        assert_eq!(balance.after, SplitCounts { train: 40, val: 10 });
        assert_eq!(balance.moved_count(), 40);
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let temp = TempDir::new().unwrap();
        let mut ctx = context(temp.path(), 0.8);
        fill(&ctx.layout.train("queue_pop"), "t", 37);
        fill(&ctx.layout.val("queue_pop"), "v", 4);

        let first = balance_category(&mut ctx, "queue_pop", None).unwrap();
        let second = balance_category(&mut ctx, "queue_pop", None).unwrap();

        assert!(first.moved_count() > 0);
        assert_eq!(second.moved_count(), 0);
        assert!(second.relocations.is_empty());
        assert_eq!(second.after, first.after);
    }

    #[test]
    fn test_empty_category_is_skipped() {
        let temp = TempDir::new().unwrap();
        let mut ctx = context(temp.path(), 0.8);

        let balance = balance_category(&mut ctx, "queue_pop", None).unwrap();

        assert_eq!(balance.skipped, Some(SkipReason::ZeroTotal));
        assert!(balance.relocations.is_empty());
        assert!(!ctx.layout.train("queue_pop").exists());
    }

    #[test]
    fn test_files_are_conserved() {
        let temp = TempDir::new().unwrap();
        let mut ctx = context(temp.path(), 0.65);
        fill(&ctx.layout.train("queue_pop"), "t", 13);
        fill(&ctx.layout.val("queue_pop"), "v", 29);

        let balance = balance_category(&mut ctx, "queue_pop", None).unwrap();

        assert_eq!(balance.before.total(), 42);
        assert_eq!(balance.after.total(), 42);
        assert_eq!(balance.after.train, 27);
    }

    #[test]
    fn test_missing_val_pool_is_recorded_and_created() {
        let temp = TempDir::new().unwrap();
        let mut ctx = context(temp.path(), 0.8);
        fill(&ctx.layout.train("queue_pop"), "t", 100);

        let balance = balance_category(&mut ctx, "queue_pop", None).unwrap();

        assert_eq!(balance.missing_pools, vec![Pool::Val]);
        assert_eq!(balance.after, SplitCounts { train: 80, val: 20 });
        assert!(ctx.layout.val("queue_pop").is_dir());
    }

    #[test]
    fn test_present_pools_are_not_reported_missing() {
        let temp = TempDir::new().unwrap();
        let mut ctx = context(temp.path(), 0.8);
        fill(&ctx.layout.train("queue_pop"), "t", 8);
        fill(&ctx.layout.val("queue_pop"), "v", 0);

        let balance = balance_category(&mut ctx, "queue_pop", None).unwrap();

        assert!(balance.missing_pools.is_empty());
    }

    fn failed_batch(dir: &Path) -> RelocationReport {
        RelocationReport {
            requested: 1,
            available: 1,
            moved: Vec::new(),
            failures: vec![MoveFailure {
                source: dir.join("t_0.png"),
                destination_dir: dir.join("val"),
                reason: "permission denied".to_string(),
            }],
        }
    }

    fn balance_with(after: SplitCounts, relocations: Vec<RelocationReport>) -> CategoryBalance {
        CategoryBalance {
            category: "queue_pop".to_string(),
            before: SplitCounts { train: 100, val: 0 },
            after,
            ideal_train: 80,
            ideal_val: 20,
            skipped: None,
            missing_pools: Vec::new(),
            relocations,
            covered: Vec::new(),
        }
    }

    #[test]
    fn test_failures_made_up_for_are_covered() {
        let temp = TempDir::new().unwrap();
        let mut balance = balance_with(
            SplitCounts { train: 80, val: 20 },
            vec![failed_batch(temp.path())],
        );

        balance.cover_failures();

        assert!(balance.failures().next().is_none());
        assert_eq!(balance.covered.len(), 1);
    }

    #[test]
    fn test_failures_stay_open_when_split_is_off() {
        let temp = TempDir::new().unwrap();
        let mut balance = balance_with(
            SplitCounts { train: 81, val: 19 },
            vec![failed_batch(temp.path())],
        );

        balance.cover_failures();

        assert_eq!(balance.failures().count(), 1);
        assert!(balance.covered.is_empty());
    }

    #[test]
    fn test_explicit_target_total() {
        let temp = TempDir::new().unwrap();
        let mut ctx = context(temp.path(), 0.8);
        fill(&ctx.layout.train("queue_pop"), "t", 10);
        fill(&ctx.layout.val("queue_pop"), "v", 10);

        // targets for 10 files: 8 train, 2 val
        let balance = balance_category(&mut ctx, "queue_pop", Some(10)).unwrap();

        assert_eq!((balance.ideal_train, balance.ideal_val), (8, 2));
        assert_eq!(balance.after.val, 2);
        assert_eq!(balance.after.total(), 20);
    }
}
