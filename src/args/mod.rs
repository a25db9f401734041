//! Command-line interface for the `scimstress` binary.
mod cli;
mod resolve;


pub use cli::{Cli, Command, LoadArgs, TargetArgs, ValidateArgs};
pub use resolve::{resolve_categories, resolve_scenarios, resolve_target};
