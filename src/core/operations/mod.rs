mod file_ops;

pub use file_ops::{list_files, move_file, relocate_into, unique_destination};
