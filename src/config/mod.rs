//! Target configuration: where to point the engine and how to
//! authenticate against it.
mod loader;
mod types;


pub use loader::{load_config, load_config_file};
pub(crate) use types::normalize_base_url;
pub use types::{
    AuthScheme, ConfigFile, FieldFormat, FieldMappingRule, TargetConfig, TargetEntry,
};
