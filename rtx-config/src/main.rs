use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use rtx_config::inspect::{command_rows, render_selection, scope_rows, summarize, Selection};
use rtx_config::registry::{self, Extractor};
use rtx_config::report::{render_extractors, render_sections, render_stream};
use rtx_config::settings::{default_settings, load_settings, Settings};
use rtx_config_core::format::{format_scope_tree, format_summary};
use rtx_config_core::{parse_bytes, parse_file_with_options, CommandStream, ParseOptions};
use serde_json::{Map, Value};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command, ExtractArgs, ExtractorsArgs, InspectArgs, OutputFormat};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("RTX_CONFIG_LOG"))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = resolve_settings(cli.config.as_deref());

    match cli.command {
        Command::Inspect(args) => run_inspect(args, &settings),
        Command::Extract(args) => run_extract(args, &settings),
        Command::Extractors(args) => run_extractors(args),
    }
}

fn run_inspect(args: InspectArgs, settings: &Settings) -> Result<()> {
    let stream = read_input(&args.file, &settings.parser)?;

    if args.summary {
        match args.format {
            OutputFormat::Text => println!("{}", format_summary(&stream)),
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&summarize(&stream))?)
            }
        }
        return Ok(());
    }

    if args.scopes {
        match args.format {
            OutputFormat::Text => println!("{}", format_scope_tree(&stream)),
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&scope_rows(&stream))?)
            }
        }
        return Ok(());
    }

    let selection = Selection::from_flags(args.scope, args.global);
    match args.format {
        OutputFormat::Text => {
            let rows = render_selection(&stream, &selection);
            if !rows.is_empty() {
                println!("{}", render_stream(&rows));
            }
        }
        OutputFormat::Json => {
            let rows = command_rows(&stream, &selection);
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }

    Ok(())
}

fn run_extract(args: ExtractArgs, settings: &Settings) -> Result<()> {
    let stream = read_input(&args.file, &settings.parser)?;

    let requested = if args.sections.is_empty() {
        &settings.extract.sections
    } else {
        &args.sections
    };
    let extractors = registry::resolve(requested)?;

    let mut sections: Vec<(&str, Value)> = Vec::with_capacity(extractors.len());
    for extractor in extractors {
        let value = (extractor.run)(&stream)
            .with_context(|| format!("extractor {} failed on {}", extractor.name, args.file.display()))?;
        debug!(section = extractor.name, "extracted");
        sections.push((extractor.name, value));
    }

    if args.strict {
        let empty: Vec<&str> = sections
            .iter()
            .filter(|(_, value)| registry::is_empty_output(value))
            .map(|(name, _)| *name)
            .collect();
        if !empty.is_empty() {
            bail!(
                "strict mode failed: section(s) {} produced no records",
                empty.join(", ")
            );
        }
    }

    match args.format {
        OutputFormat::Text => println!("{}", render_sections(&sections)),
        OutputFormat::Json => {
            let object: Map<String, Value> = sections
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect();
            println!("{}", serde_json::to_string_pretty(&object)?);
        }
    }

    Ok(())
}

fn run_extractors(args: ExtractorsArgs) -> Result<()> {
    let extractors = registry::all();
    match args.format {
        OutputFormat::Text => println!("{}", render_extractors(&extractors)),
        OutputFormat::Json => {
            let listing: Vec<Value> = extractors.iter().map(|e| describe(e)).collect();
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
    }
    Ok(())
}

fn describe(extractor: &Extractor) -> Value {
    serde_json::json!({ "name": extractor.name, "summary": extractor.summary })
}

fn resolve_settings(path: Option<&Path>) -> Settings {
    let Some(path) = path else {
        return default_settings();
    };

    match load_settings(path) {
        Ok(settings) => {
            info!(path = %path.display(), "loaded settings");
            settings
        }
        Err(err) => {
            eprintln!(
                "{} failed to load settings from {} ({err}); using embedded defaults",
                "warning:".red(),
                path.display()
            );
            default_settings()
        }
    }
}

/// Read a configuration from a file, or from stdin when the path is `-`.
fn read_input(path: &Path, options: &ParseOptions) -> Result<CommandStream> {
    if path.as_os_str() == "-" {
        let mut bytes = Vec::new();
        std::io::stdin()
            .read_to_end(&mut bytes)
            .context("failed to read configuration from stdin")?;
        return Ok(parse_bytes(&bytes, options));
    }

    parse_file_with_options(path, options)
        .with_context(|| format!("failed to parse {}", path.display()))
}
