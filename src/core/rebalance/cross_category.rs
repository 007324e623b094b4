use serde::Serialize;
use tracing::{info, info_span, warn};

use super::category::{balance_category, CategoryBalance, SkipReason, SplitCounts};
use super::relocator::{relocate_retrying, MoveFailure, RelocationReport};
use crate::core::context::BalanceContext;
use crate::core::dataset::Pool;
use crate::errors::BalanceError;

/// Shift applied to one category against the shared ideal
#[derive(Debug, Clone, Serialize)]
pub struct CategoryShift {
    pub category: String,
    pub total_before: usize,
    /// Pools that did not exist before the shift
    pub missing_pools: Vec<Pool>,
    pub relocation: Option<RelocationReport>,
}

/// How far a category's final total sits from the shared ideal
#[derive(Debug, Clone, Serialize)]
pub struct IdealDeviation {
    pub category: String,
    pub total: usize,
    /// `total - shared_ideal`
    pub deviation: i64,
}

/// Outcome of balancing all categories
#[derive(Debug, Clone, Default, Serialize)]
pub struct CrossCategoryBalance {
    pub grand_total: usize,
    pub shared_ideal: usize,
    pub skipped: Option<SkipReason>,
    pub shifts: Vec<CategoryShift>,
    pub categories: Vec<CategoryBalance>,
    pub deviations: Vec<IdealDeviation>,
}

impl CrossCategoryBalance {
    pub fn moved_count(&self) -> usize {
        let shifted: usize = self
            .shifts
            .iter()
            .filter_map(|s| s.relocation.as_ref())
            .map(RelocationReport::moved_count)
            .sum();
        shifted + self.categories.iter().map(CategoryBalance::moved_count).sum::<usize>()
    }

    pub fn failures(&self) -> Vec<MoveFailure> {
        let shifted = self
            .shifts
            .iter()
            .filter_map(|s| s.relocation.as_ref())
            .flat_map(|r| r.failures.iter());
        let balanced = self.categories.iter().flat_map(CategoryBalance::failures);
        shifted.chain(balanced).cloned().collect()
    }
}

/// Balance every configured category against an equal share of the grand
/// total, then split each category into train/val at the configured ratio.
///
/// Files never change category. A category above the shared ideal sheds its
/// excess from train into its own val pool and one below it pulls the
/// shortfall from val into train; the per-category split that follows uses
/// each category's own total. Category totals are therefore conserved, and a
/// category that started far from the ideal is reported in `deviations`
/// rather than fixed by relabeling files.
pub fn balance_categories(ctx: &mut BalanceContext) -> Result<CrossCategoryBalance, BalanceError> {
    let categories = ctx.layout.categories().to_vec();
    let mut result = CrossCategoryBalance::default();

    if categories.is_empty() {
        warn!("No categories configured, nothing to balance");
        result.skipped = Some(SkipReason::NoCategories);
        return Ok(result);
    }

    let mut counts = Vec::with_capacity(categories.len());
    for category in &categories {
        let (count, missing) =
            SplitCounts::inspect(&ctx.layout.train(category), &ctx.layout.val(category));
        for pool in &missing {
            warn!("{} pool for category {} does not exist, counting it as empty", pool, category);
        }
        counts.push((count, missing));
    }
    result.grand_total = counts.iter().map(|(count, _)| count.total()).sum();

    if result.grand_total == 0 {
        warn!("No images found in any category, nothing to balance");
        result.skipped = Some(SkipReason::ZeroTotal);
        return Ok(result);
    }

    result.shared_ideal = result.grand_total / categories.len();
    info!(
        "Balancing {} categories: {} images in total, ideal {} per category",
        categories.len(),
        result.grand_total,
        result.shared_ideal
    );

    for (category, (count, missing)) in categories.iter().zip(counts) {
        let _span = info_span!("category", name = category.as_str()).entered();
        let train_dir = ctx.layout.train(category);
        let val_dir = ctx.layout.val(category);
        let total = count.total();

        let relocation = if total > result.shared_ideal {
            let excess = total - result.shared_ideal;
            info!("Total {} is over the shared ideal, moving {} images from train to val", total, excess);
            Some(relocate_retrying(
                &train_dir,
                &val_dir,
                excess,
                ctx.retry_attempts,
                &mut ctx.rng,
            )?)
        } else if total < result.shared_ideal {
            let shortfall = result.shared_ideal - total;
            info!("Total {} is under the shared ideal, moving {} images from val to train", total, shortfall);
            Some(relocate_retrying(
                &val_dir,
                &train_dir,
                shortfall,
                ctx.retry_attempts,
                &mut ctx.rng,
            )?)
        } else {
            None
        };

        result.shifts.push(CategoryShift {
            category: category.clone(),
            total_before: total,
            missing_pools: missing,
            relocation,
        });
    }

    for (category, shift) in categories.iter().zip(result.shifts.iter_mut()) {
        let current = SplitCounts::read(&ctx.layout.train(category), &ctx.layout.val(category));
        let mut balance = balance_category(ctx, category, Some(current.total()))?;

        // the split overrides whatever the shift left behind
        if balance.is_settled() {
            if let Some(relocation) = shift.relocation.as_mut() {
                balance.covered.append(&mut relocation.failures);
            }
        }

        let total = balance.after.total();
        let deviation = total as i64 - result.shared_ideal as i64;
        if deviation.abs() > 1 {
            warn!(
                "Category {} holds {} images, {} away from the shared ideal of {}; totals only change when images are added or relabeled",
                category, total, deviation, result.shared_ideal
            );
        }
        result.deviations.push(IdealDeviation {
            category: category.clone(),
            total,
            deviation,
        });
        result.categories.push(balance);
    }

    Ok(result)
}
