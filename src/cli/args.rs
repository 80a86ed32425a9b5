//! Command-line argument definitions
//!
//! This module defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Deduplicate photo backups into a date-sorted tree of hard links
#[derive(Parser, Debug)]
#[command(name = "photo-store")]
#[command(version)]
#[command(about = "Deduplicate photo backups into a date-sorted tree of hard links", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Shorthand for --log-level debug
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level: error, warn, info, debug, trace (overrides config)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(flatten)]
    pub run: RunArgs,
}

/// Options for an ingestion run
#[derive(clap::Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Directory to ingest (can be specified multiple times)
    #[arg(short = 'd', long = "directory", value_name = "DIR")]
    pub directories: Vec<PathBuf>,

    /// Output directory for the date tree and cache (overrides config)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Report groups of identical files saved under different names
    #[arg(long)]
    pub report_duplicates: bool,

    /// Update the cache only; do not touch the output tree
    #[arg(long)]
    pub no_tree: bool,
}

impl RunArgs {
    /// Combine top-level options with those given after `run`
    pub fn merged(&self, other: &RunArgs) -> RunArgs {
        let mut directories = self.directories.clone();
        directories.extend(other.directories.iter().cloned());

        RunArgs {
            directories,
            output: other.output.clone().or_else(|| self.output.clone()),
            report_duplicates: self.report_duplicates || other.report_duplicates,
            no_tree: self.no_tree || other.no_tree,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest directories, update the cache and build the output tree (default)
    Run(RunArgs),

    /// Report likely duplicates recorded in the cache without ingesting
    Duplicates {
        /// Output directory holding the cache (overrides config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show current configuration
    ShowConfig,

    /// Generate a configuration file at a specific location
    GenerateConfig {
        /// Output path for the config file (defaults to standard location)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
