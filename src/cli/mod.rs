//! CLI module for the Rampart reconciler.
//!
//! This module provides the command-line interface for validating
//! manifests and converging an appliance.

mod commands;
mod output;

pub use commands::{Cli, Commands, LogFormat, OutputFormat};
pub use output::OutputFormatter;
