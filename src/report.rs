use std::fmt::Write;

use crate::core::analysis::{InventorySnapshot, PoolCount};
use crate::core::rebalance::MoveFailure;

fn cell(count: Option<PoolCount>) -> String {
    match count {
        Some(PoolCount::Present(files)) => files.to_string(),
        Some(PoolCount::Missing) => "missing".to_string(),
        None => "-".to_string(),
    }
}

/// Per-category table of pool counts, as printed at the end of a run
pub fn render_summary(snapshot: &InventorySnapshot) -> String {
    let width = snapshot
        .categories
        .iter()
        .map(|c| c.category.len())
        .chain(std::iter::once("category".len()))
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<width$}  {:>8}  {:>8}  {:>8}  {:>8}",
        "category", "train", "val", "incoming", "total"
    );
    for inventory in &snapshot.categories {
        let _ = writeln!(
            out,
            "{:<width$}  {:>8}  {:>8}  {:>8}  {:>8}",
            inventory.category,
            cell(Some(inventory.train)),
            cell(Some(inventory.val)),
            cell(inventory.incoming),
            inventory.total()
        );
    }
    out
}

pub fn render_failures<'a>(failures: impl IntoIterator<Item = &'a MoveFailure>) -> String {
    let mut out = String::new();
    for failure in failures {
        let _ = writeln!(
            out,
            "  {} -> {}: {}",
            failure.source.display(),
            failure.destination_dir.display(),
            failure.reason
        );
    }
    out
}
