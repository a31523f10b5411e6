//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Rampart - Declarative firewall configuration reconciler.
#[derive(Parser, Debug)]
#[command(name = "rampart")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the manifest file.
    #[arg(short, long, global = true, env = "RAMPART_MANIFEST")]
    pub manifest: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Log format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the manifest.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Show what apply would change, without changing anything.
    Plan,

    /// Converge the appliance to the manifest.
    Apply {
        /// Continue with the remaining resources after a failure.
        #[arg(long)]
        continue_on_error: bool,
    },

    /// Show the appliance's current record for a tag.
    Query {
        /// Appliance tag (e.g. `IPHost`).
        tag: String,

        /// Record name; omit for singletons or to list every record.
        name: Option<String>,
    },

    /// List the resource kinds with a dedicated schema.
    Kinds,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// Log format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable log lines.
    #[default]
    Text,
    /// One JSON object per log event.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_apply() {
        let cli = Cli::try_parse_from([
            "rampart",
            "--manifest",
            "edge.yaml",
            "apply",
            "--continue-on-error",
            "--output",
            "json",
        ])
        .expect("parse");

        assert_eq!(cli.manifest, Some(PathBuf::from("edge.yaml")));
        assert!(matches!(cli.output, OutputFormat::Json));
        assert!(matches!(cli.command, Commands::Apply { continue_on_error: true }));
    }

    #[test]
    fn test_parse_query() {
        let cli = Cli::try_parse_from(["rampart", "query", "IPHost", "web-01", "-v"]).expect("parse");

        assert!(cli.verbose);
        assert_eq!(cli.log_format, LogFormat::Text);
        match cli.command {
            Commands::Query { tag, name } => {
                assert_eq!(tag, "IPHost");
                assert_eq!(name.as_deref(), Some("web-01"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
