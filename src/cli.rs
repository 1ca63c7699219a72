use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only show errors
    Quiet,
    /// Show standard information
    #[default]
    Normal,
    /// Also list every warning
    Verbose,
    /// Everything, including entities and debug logging
    Debug,
}

impl VerbosityLevel {
    /// Default `tracing` filter when `RUST_LOG` is unset
    pub fn log_filter(&self) -> &'static str {
        match self {
            VerbosityLevel::Quiet => "error",
            VerbosityLevel::Normal => "warn",
            VerbosityLevel::Verbose => "info",
            VerbosityLevel::Debug => "debug",
        }
    }
}

/// How results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}

/// Detect, validate and import product catalog files
#[derive(Parser, Debug, Clone)]
#[command(name = "catalog-import")]
#[command(about = "Detect, validate and import BMEcat and Datanorm catalog files")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (TOML or JSON)
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Directory searched for BMEcat XSDs that are not built in
    #[arg(long = "schema-dir", global = true)]
    pub schema_dir: Option<PathBuf>,

    /// Output format
    #[arg(long = "output", value_enum, default_value_t = OutputFormat::Human, global = true)]
    pub output: OutputFormat,

    /// More output; repeat for debug detail
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(
        short = 'q',
        long = "quiet",
        global = true,
        conflicts_with = "verbose"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List supported formats
    Formats,

    /// Score a file against every format
    Detect {
        file: PathBuf,
    },

    /// Validate a file without importing it
    Validate {
        file: PathBuf,

        /// Skip detection and use this format id
        #[arg(long = "format")]
        format: Option<String>,
    },

    /// Validate and parse a file into catalog entities
    Import {
        file: PathBuf,

        /// Tenant the entities belong to
        #[arg(long = "tenant")]
        tenant: String,

        /// Supplier id used when the file names none
        #[arg(long = "supplier")]
        supplier: Option<String>,

        /// Source identifier used as a last-resort supplier id
        #[arg(long = "source")]
        source: Option<String>,

        /// Skip detection and use this format id
        #[arg(long = "format")]
        format: Option<String>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else {
            match self.verbose {
                0 => VerbosityLevel::Normal,
                1 => VerbosityLevel::Verbose,
                _ => VerbosityLevel::Debug,
            }
        }
    }
}
