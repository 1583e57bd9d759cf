use crate::scope::ScopeId;
use crate::stream::{Command, CommandStream};

/// Format commands as `line [scope] text`, one per row, keeping source indentation.
pub fn format_stream(stream: &CommandStream) -> String {
    format_commands(stream, stream.commands())
}

/// Format a subset of a stream's commands.
pub fn format_commands<'a>(
    stream: &CommandStream,
    commands: impl IntoIterator<Item = &'a Command>,
) -> String {
    let rows: Vec<(String, &Command)> = commands
        .into_iter()
        .map(|cmd| (format!("[{}]", stream.key_of(cmd)), cmd))
        .collect();
    let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);

    rows.iter()
        .map(|(label, cmd)| {
            format!(
                "{:>5} {label:<width$} {}{}",
                cmd.line.number,
                " ".repeat(cmd.line.depth),
                cmd.line.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render scope instances as an indented tree rooted at the global scope.
pub fn format_scope_tree(stream: &CommandStream) -> String {
    let mut lines = Vec::new();
    render_scope(stream, ScopeId::GLOBAL, 0, &mut lines);
    lines.join("\n")
}

fn render_scope(stream: &CommandStream, id: ScopeId, level: usize, lines: &mut Vec<String>) {
    let scope = stream.scope(id);
    let count = stream.commands().iter().filter(|cmd| cmd.scope == id).count();
    let opened = scope
        .line_number
        .map(|n| format!(" @{n}"))
        .unwrap_or_default();
    lines.push(format!(
        "{}{}{opened} ({count} commands)",
        "  ".repeat(level),
        scope.key
    ));

    for (idx, child) in stream.scopes().iter().enumerate() {
        if child.parent == Some(id) {
            render_scope(stream, ScopeId(idx), level + 1, lines);
        }
    }
}

/// Format a one-line summary of stream counts.
pub fn format_summary(stream: &CommandStream) -> String {
    format!(
        "lines={} commands={} comments={} scopes={} contexts={}",
        stream.line_count(),
        stream.command_count(),
        stream.comment_count(),
        stream.scopes().len() - 1,
        stream.contexts().len()
    )
}
