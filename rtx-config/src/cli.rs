use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use rtx_config_core::ScopeKey;

#[derive(Parser, Debug)]
#[command(name = "rtx-config")]
#[command(about = "Inspect and extract Yamaha RTX router configurations")]
pub struct Cli {
    /// Settings TOML file. Defaults to the embedded settings.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Show the scope-tagged command stream of a configuration.
    Inspect(InspectArgs),
    /// Run resource extractors and print their records.
    Extract(ExtractArgs),
    /// List registered extractors.
    Extractors(ExtractorsArgs),
}

#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Configuration file, or `-` for stdin.
    pub file: PathBuf,
    /// Print the scope tree instead of commands.
    #[arg(long)]
    pub scopes: bool,
    /// Only commands of one scope, e.g. `tunnel:1`, `pp:anonymous`, `ipsec:101`.
    #[arg(long, conflicts_with = "global")]
    pub scope: Option<ScopeKey>,
    /// Only commands outside every block.
    #[arg(long)]
    pub global: bool,
    /// Print line, command and scope counts.
    #[arg(long)]
    pub summary: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct ExtractArgs {
    /// Configuration file, or `-` for stdin.
    pub file: PathBuf,
    /// Extractor to run; repeat for several. Defaults to the settings' list.
    #[arg(long = "section")]
    pub sections: Vec<String>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Fail when a requested section produced nothing.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Parser, Debug)]
pub struct ExtractorsArgs {
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
