use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use super::relocator::{relocate_retrying, RelocationReport};
use crate::core::analysis::{count_files, PoolCount};
use crate::core::context::BalanceContext;
use crate::errors::BalanceError;

/// Outcome of draining one category's incoming pool
#[derive(Debug, Clone, Serialize)]
pub struct IntakeResult {
    pub category: String,
    pub incoming: PoolCount,
    pub relocation: RelocationReport,
    /// Files still under the incoming directory afterwards
    pub remaining: usize,
}

/// Move every file waiting in each category's incoming pool into that
/// category's training pool. Does nothing when no incoming pool is configured.
///
/// Files in nested directories under an incoming category are not merged;
/// they show up in `remaining` along with anything that failed to move.
pub fn merge_incoming(ctx: &mut BalanceContext) -> Result<Vec<IntakeResult>, BalanceError> {
    if !ctx.layout.has_incoming() {
        debug!("No incoming pool configured, skipping intake");
        return Ok(Vec::new());
    }

    let categories = ctx.layout.categories().to_vec();
    let mut results = Vec::with_capacity(categories.len());

    for category in &categories {
        let _span = info_span!("category", name = category.as_str()).entered();
        let Some(incoming_dir) = ctx.layout.incoming(category) else {
            continue;
        };
        let train_dir = ctx.layout.train(category);

        let incoming = count_files(&incoming_dir);
        let relocation = match incoming {
            PoolCount::Missing => {
                warn!("Incoming pool {:?} does not exist, nothing to merge", incoming_dir);
                RelocationReport::default()
            }
            PoolCount::Present(0) => {
                debug!("Incoming pool {:?} is empty", incoming_dir);
                RelocationReport::default()
            }
            PoolCount::Present(files) => {
                info!("Moving all {} incoming images into train", files);
                relocate_retrying(
                    &incoming_dir,
                    &train_dir,
                    files,
                    ctx.retry_attempts,
                    &mut ctx.rng,
                )?
            }
        };

        let remaining = count_files(&incoming_dir).files();
        if remaining > 0 {
            warn!(
                "{} file(s) remain in {:?} after intake ({} failed to move)",
                remaining,
                incoming_dir,
                relocation.failures.len()
            );
        }

        results.push(IntakeResult {
            category: category.clone(),
            incoming,
            relocation,
            remaining,
        });
    }

    Ok(results)
}
