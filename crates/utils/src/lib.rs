pub mod glob_tree;

pub use glob_tree::{GlobTreeError, glob_tree, validate_patterns};
