use std::borrow::Cow;
use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, warn};

use crate::context::ContextTracker;
use crate::line::{normalize, ParseOptions};
use crate::stream::{Command, CommandStream};

/// Errors that can occur while loading configuration text.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Failed to read input file.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
}

/// Build a [`CommandStream`] from raw configuration text using default options.
///
/// Parsing text never fails: unknown commands are carried through untouched.
pub fn parse(raw: &str) -> CommandStream {
    parse_with_options(raw, &ParseOptions::default())
}

/// Build a [`CommandStream`] from raw configuration text.
pub fn parse_with_options(raw: &str, options: &ParseOptions) -> CommandStream {
    let normalized = normalize(raw, options);
    let mut tracker = ContextTracker::new();

    let commands: Vec<Command> = normalized
        .lines
        .into_iter()
        .map(|line| {
            let scope = tracker.observe(&line);
            Command { line, scope }
        })
        .collect();

    let scopes = tracker.into_scopes();
    debug!(
        lines = normalized.non_blank,
        commands = commands.len(),
        scopes = scopes.len() - 1,
        "parsed configuration"
    );

    CommandStream::new(normalized.non_blank, normalized.comments, scopes, commands)
}

/// Parse raw bytes. Invalid UTF-8 sequences, such as Shift_JIS descriptions,
/// are replaced with U+FFFD and the rest of the line is kept.
pub fn parse_bytes(bytes: &[u8], options: &ParseOptions) -> CommandStream {
    let raw = String::from_utf8_lossy(bytes);
    if let Cow::Owned(_) = raw {
        for (idx, line) in bytes.split(|b| *b == b'\n').enumerate() {
            if std::str::from_utf8(line).is_err() {
                warn!(line = idx + 1, "replaced invalid UTF-8 bytes");
            }
        }
    }
    parse_with_options(&raw, options)
}

/// Parse a configuration file into a [`CommandStream`].
pub fn parse_file(path: &Path) -> Result<CommandStream, ParseError> {
    parse_file_with_options(path, &ParseOptions::default())
}

/// Parse a configuration file with explicit options.
pub fn parse_file_with_options(
    path: &Path,
    options: &ParseOptions,
) -> Result<CommandStream, ParseError> {
    let bytes = fs::read(path)?;
    Ok(parse_bytes(&bytes, options))
}
