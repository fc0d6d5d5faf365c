//! Command-line interface for wslkit
//!
//! ## Module Structure
//!
//! - `args`: CLI argument definitions and parsing structures (clap)
//! - `run`: Main entry point and command dispatch
//! - `commands`: Command implementations

pub mod args;
mod commands;
mod run;

pub use args::{Cli, Commands, SetArgs};
pub use commands::{execute, resolve_distro};
pub use run::{run, run_with};
