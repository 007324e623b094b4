mod inventory;

pub use inventory::{count_files, InventorySnapshot, PoolCount};
