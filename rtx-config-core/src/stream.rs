use serde::Serialize;

use crate::line::Line;
use crate::scope::{Scope, ScopeId, ScopeKey, ScopeKind};

/// A configuration line tagged with the scope that was active when it was read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Command {
    #[serde(flatten)]
    pub line: Line,
    pub scope: ScopeId,
}

impl Command {
    pub fn text(&self) -> &str {
        &self.line.text
    }

    pub fn line_number(&self) -> usize {
        self.line.number
    }
}

/// The ordered, scope-tagged command sequence of one configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandStream {
    line_count: usize,
    comment_count: usize,
    scopes: Vec<Scope>,
    commands: Vec<Command>,
}

impl Default for CommandStream {
    fn default() -> Self {
        Self {
            line_count: 0,
            comment_count: 0,
            scopes: vec![Scope::global()],
            commands: Vec::new(),
        }
    }
}

impl CommandStream {
    pub(crate) fn new(
        line_count: usize,
        comment_count: usize,
        scopes: Vec<Scope>,
        commands: Vec<Command>,
    ) -> Self {
        Self {
            line_count,
            comment_count,
            scopes,
            commands,
        }
    }

    /// Non-blank source lines, comment lines included.
    pub fn line_count(&self) -> usize {
        self.line_count
    }

    pub fn comment_count(&self) -> usize {
        self.comment_count
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Every scope instance in opening order. Index 0 is the global scope.
    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    /// Key of the scope a command was tagged with.
    pub fn key_of(&self, command: &Command) -> &ScopeKey {
        &self.scope(command.scope).key
    }

    /// Distinct scope keys in first-seen order, global excluded.
    pub fn contexts(&self) -> Vec<&ScopeKey> {
        let mut seen: Vec<&ScopeKey> = Vec::new();
        for scope in self.scopes.iter().skip(1) {
            if !seen.contains(&&scope.key) {
                seen.push(&scope.key);
            }
        }
        seen
    }

    /// Commands tagged exactly with `key`, across every opening of that scope.
    pub fn commands_in<'a>(&'a self, key: &'a ScopeKey) -> impl Iterator<Item = &'a Command> + 'a {
        self.commands
            .iter()
            .filter(move |cmd| self.key_of(cmd) == key)
    }

    pub fn global_commands(&self) -> impl Iterator<Item = &Command> + '_ {
        self.commands
            .iter()
            .filter(|cmd| cmd.scope == ScopeId::GLOBAL)
    }

    /// Commands tagged with any scope of the given kind.
    pub fn commands_in_kind(&self, kind: ScopeKind) -> impl Iterator<Item = &Command> + '_ {
        self.commands
            .iter()
            .filter(move |cmd| self.key_of(cmd).kind() == kind)
    }

    /// Commands whose scope, or any enclosing scope, has the given key.
    pub fn commands_under<'a>(
        &'a self,
        key: &'a ScopeKey,
    ) -> impl Iterator<Item = &'a Command> + 'a {
        self.commands
            .iter()
            .filter(move |cmd| self.ancestors(cmd.scope).any(|scope| &scope.key == key))
    }

    /// Walk from a scope up to the global scope, starting with the scope itself.
    pub fn ancestors(&self, id: ScopeId) -> impl Iterator<Item = &Scope> + '_ {
        let mut next = Some(id);
        std::iter::from_fn(move || {
            let current = self.scope(next?);
            next = current.parent;
            Some(current)
        })
    }

    /// Nearest enclosing scope of the given kind, the command's own scope included.
    pub fn enclosing(&self, command: &Command, kind: ScopeKind) -> Option<&ScopeKey> {
        self.ancestors(command.scope)
            .map(|scope| &scope.key)
            .find(|key| key.kind() == kind)
    }
}
