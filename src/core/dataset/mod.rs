mod layout;

pub use layout::{DatasetLayout, Pool};
