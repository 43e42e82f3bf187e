//! Command-line interface.

pub mod cli;

pub use cli::{Cli, Commands, ConfigAction, OutputFormat};
