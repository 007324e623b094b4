//! Moving images between pools so every category hits its train/val ratio.

mod category;
mod cross_category;
mod intake;
mod relocator;

pub use cross_category::{balance_categories, CrossCategoryBalance};
pub use intake::{merge_incoming, IntakeResult};
pub use relocator::MoveFailure;
