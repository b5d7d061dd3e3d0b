use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "ao", version, about = "Operate an agent session from a terminal")]
pub struct Cli {
    /// Path to a TOML config file. Defaults to $AO_CONFIG_PATH or
    /// <config_dir>/ao/config.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Base directory for sessions.db, artifacts/, and audit.jsonl.
    /// Defaults to $AO_DATA_DIR or <data_dir>/ao.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start an interactive session (default).
    Run {
        /// Resume an existing session instead of starting a new one.
        #[arg(long)]
        session: Option<String>,
    },
    /// Export a session's event log.
    Export {
        session: String,
        #[arg(long, value_enum, default_value = "events-jsonl")]
        format: ExportFormatArg,
    },
    /// List known sessions.
    Sessions,
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print the binary's version.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective, merged configuration as TOML.
    Show,
    /// Validate the effective configuration and exit non-zero on error.
    Validate,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum ExportFormatArg {
    EventsJsonl,
    RunbookMarkdown,
}

impl From<ExportFormatArg> for ao_store::ExportFormat {
    fn from(value: ExportFormatArg) -> Self {
        match value {
            ExportFormatArg::EventsJsonl => ao_store::ExportFormat::EventsJsonl,
            ExportFormatArg::RunbookMarkdown => ao_store::ExportFormat::RunbookMarkdown,
        }
    }
}
