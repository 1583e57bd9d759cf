use rtx_config_core::format::text::format_commands;
use rtx_config_core::{Command, CommandStream, ScopeId, ScopeKey};
use serde::Serialize;

/// Which commands of a stream to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Global,
    /// Every opening of one scope, with the blocks nested inside it.
    Scope(ScopeKey),
}

impl Selection {
    pub fn from_flags(scope: Option<ScopeKey>, global: bool) -> Self {
        match scope {
            Some(ScopeKey::Global) => Self::Global,
            Some(key) => Self::Scope(key),
            None if global => Self::Global,
            None => Self::All,
        }
    }
}

/// One command as shown by `inspect --format json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandRow {
    pub line: usize,
    pub depth: usize,
    pub scope: String,
    pub text: String,
}

/// One scope instance as shown by `inspect --scopes --format json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeRow {
    pub id: usize,
    pub key: ScopeKey,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<usize>,
    pub commands: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamSummary {
    pub lines: usize,
    pub commands: usize,
    pub comments: usize,
    pub scopes: usize,
    pub contexts: Vec<String>,
}

pub fn select<'a>(stream: &'a CommandStream, selection: &'a Selection) -> Vec<&'a Command> {
    match selection {
        Selection::All => stream.commands().iter().collect(),
        Selection::Global => stream.global_commands().collect(),
        Selection::Scope(key) => stream.commands_under(key).collect(),
    }
}

/// Text rows for the selected commands.
pub fn render_selection(stream: &CommandStream, selection: &Selection) -> String {
    format_commands(stream, select(stream, selection))
}

pub fn command_rows(stream: &CommandStream, selection: &Selection) -> Vec<CommandRow> {
    select(stream, selection)
        .into_iter()
        .map(|cmd| CommandRow {
            line: cmd.line_number(),
            depth: cmd.line.depth,
            scope: stream.key_of(cmd).to_string(),
            text: cmd.text().to_string(),
        })
        .collect()
}

pub fn scope_rows(stream: &CommandStream) -> Vec<ScopeRow> {
    stream
        .scopes()
        .iter()
        .enumerate()
        .map(|(idx, scope)| ScopeRow {
            id: idx,
            key: scope.key.clone(),
            label: scope.key.to_string(),
            line: scope.line_number,
            parent: scope.parent.map(|ScopeId(parent)| parent),
            commands: stream
                .commands()
                .iter()
                .filter(|cmd| cmd.scope == ScopeId(idx))
                .count(),
        })
        .collect()
}

pub fn summarize(stream: &CommandStream) -> StreamSummary {
    StreamSummary {
        lines: stream.line_count(),
        commands: stream.command_count(),
        comments: stream.comment_count(),
        scopes: stream.scopes().len() - 1,
        contexts: stream.contexts().iter().map(|key| key.to_string()).collect(),
    }
}
