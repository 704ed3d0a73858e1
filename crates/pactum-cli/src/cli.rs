//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Pactum CLI - Extract structured contract data from long documents.
#[derive(Debug, Parser)]
#[command(name = "pactum")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "PACTUM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Quiet format (bare values only)
    Quiet,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show how a document would be split into chunks
    Segment(SegmentArgs),

    /// Extract the contract record or its line items
    Extract(ExtractArgs),

    /// Manage the configuration file
    Config(ConfigArgs),
}

/// Arguments for the segment command.
#[derive(Debug, Parser)]
pub struct SegmentArgs {
    /// Element file: a JSON array of elements, or plain text
    pub input: PathBuf,

    /// Override the chunk budget in tokens
    #[arg(long)]
    pub max_chunk_tokens: Option<usize>,

    /// Override the table chunk budget in tokens
    #[arg(long)]
    pub max_table_chunk_tokens: Option<usize>,
}

/// Arguments for the extract command.
#[derive(Debug, Parser)]
pub struct ExtractArgs {
    /// Element file: a JSON array of elements, or plain text
    pub input: PathBuf,

    /// Extract line items instead of the contract record
    #[arg(long)]
    pub line_items: bool,

    /// Model to use instead of the configured one
    #[arg(short, long)]
    pub model: Option<String>,

    /// Maximum simultaneous service calls
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Answer every request with the contents of this file instead of calling the service
    #[arg(long, value_name = "FILE")]
    pub mock_response: Option<PathBuf>,

    /// Print run metrics to stderr
    #[arg(long)]
    pub stats: bool,
}

/// Arguments for configuration management.
#[derive(Debug, Parser)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Print the configuration file path
    Path,

    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,

        /// Start from a preset
        #[arg(long, value_enum, default_value = "default")]
        preset: PresetArg,
    },
}

/// Extractor preset argument.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum PresetArg {
    /// Balanced settings
    Default,
    /// Smaller chunks, more parallelism
    Aggressive,
    /// Larger chunks, more patience
    Lenient,
}

impl From<CliFormat> for crate::config::OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => crate::config::OutputFormat::Table,
            CliFormat::Json => crate::config::OutputFormat::Json,
            CliFormat::Quiet => crate::config::OutputFormat::Quiet,
        }
    }
}

impl From<PresetArg> for pactum_extractor::ExtractorConfig {
    fn from(preset: PresetArg) -> Self {
        match preset {
            PresetArg::Default => pactum_extractor::ExtractorConfig::default(),
            PresetArg::Aggressive => pactum_extractor::ExtractorConfig::aggressive(),
            PresetArg::Lenient => pactum_extractor::ExtractorConfig::lenient(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_command() {
        let cli = Cli::parse_from(["pactum", "extract", "contract.json", "--line-items"]);
        match cli.command {
            Command::Extract(args) => {
                assert!(args.line_items);
                assert_eq!(args.input, PathBuf::from("contract.json"));
            }
            _ => panic!("Expected Extract command"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["pactum", "segment", "doc.txt", "-f", "json", "-v"]);
        assert!(matches!(cli.format, Some(CliFormat::Json)));
        assert!(cli.verbose);
    }

    #[test]
    fn test_config_init_preset() {
        let cli = Cli::parse_from(["pactum", "config", "init", "--preset", "aggressive"]);
        match cli.command {
            Command::Config(ConfigArgs {
                action: ConfigAction::Init { force, preset },
            }) => {
                assert!(!force);
                assert!(matches!(preset, PresetArg::Aggressive));
            }
            _ => panic!("Expected Config Init command"),
        }
    }

    #[test]
    fn test_missing_subcommand_rejected() {
        assert!(Cli::try_parse_from(["pactum"]).is_err());
    }
}
