//! Configuration for kitsync
//!
//! Two layers, both named `kitsync.toml`:
//! - Global: per-user defaults (source root, layout)
//! - Project: overrides committed with the project

pub mod merge;
pub mod parser;
pub mod paths;
pub mod schema;
pub mod store;

pub use merge::merge_configs;
pub use parser::{parse_kit_toml, parse_kit_toml_str, to_toml};
pub use paths::{CONFIG_FILE_NAME, TargetLayout, global_config_dir};
pub use schema::{KitConfig, PathsConfig};
pub use store::ConfigStore;
