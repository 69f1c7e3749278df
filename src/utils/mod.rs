//! Utility helpers
//!
//! - [`fs`] - Moves and removals used by the file-tree swap, with a copy
//!   fallback for moves across filesystems

pub mod fs;

pub use fs::{copy_tree, move_path, remove_path, remove_path_if_exists};
