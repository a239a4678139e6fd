//! Command-line interface components
//!
//! Argument parsing and the command handlers for the precache binary.

pub mod args;
pub mod commands;

pub use args::{CacheArgs, Cli, Commands, ConfigAction, ConfigArgs, GlobalArgs, ListArgs};
pub use commands::{handle_cache, handle_config, handle_list};
