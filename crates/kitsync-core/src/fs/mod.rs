//! Filesystem primitives shared across features.

pub mod materialize;
pub mod tree_hash;

pub use materialize::{
    BACKUP_SUFFIX, backup_aside, backup_path, remove_path, replace_with_copy, write_atomic,
};
pub use tree_hash::{hash_file, hash_path, hash_tree};
