pub mod analysis;
pub mod context;
pub mod dataset;
pub mod operations;
pub mod rebalance;
pub mod rename;

pub use analysis::InventorySnapshot;
pub use context::BalanceContext;
pub use dataset::DatasetLayout;
