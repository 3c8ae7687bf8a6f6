//! CLI parse: clap types for conftree. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// conftree - inspect and edit hierarchical XML configuration
#[derive(Parser)]
#[command(name = "conftree")]
#[command(about = "Inspect and edit a hierarchical XML configuration with includes and backing stores")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration document to operate on
    #[arg(long, short = 'f', global = true, default_value = "conftree.conf")]
    pub file: PathBuf,

    /// Settings file (overrides the global settings file)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose logging (default: off)
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the document as it is written to disk
    Show,
    /// Print the value at a path
    Get {
        path: String,
        /// Evaluate the path relative to this section
        #[arg(long)]
        section: Option<String>,
    },
    /// Set a value below a section; `@name` sets an attribute
    Set {
        section: String,
        key: String,
        value: String,
    },
    /// Print the layered key/value map of a section
    Hash {
        path: String,
        /// Namespace prefix to select
        #[arg(long)]
        ns: Option<String>,
    },
    /// List the sections matching a path
    Sections { path: String },
    /// Remove the first section matching a path
    Remove { path: String },
    /// Keep the document loaded, journaling and flushing changes until Ctrl-C
    Watch {
        /// Tick interval in milliseconds (default from settings)
        #[arg(long)]
        interval_ms: Option<u64>,
    },
}
