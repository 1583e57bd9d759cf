use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use crate::line::Line;
use crate::scope::{Scope, ScopeId, ScopeKey, ScopeKind};

struct Openers {
    pp: Regex,
    pp_anonymous: Regex,
    tunnel: Regex,
    ipsec_tunnel: Regex,
}

// Patterns are compile-time constants; a failure here is a programming error.
static OPENERS: LazyLock<Openers> = LazyLock::new(|| Openers {
    pp: Regex::new(r"^pp\s+select\s+(\d+)$").expect("static regex must compile"),
    pp_anonymous: Regex::new(r"^pp\s+select\s+anonymous$").expect("static regex must compile"),
    tunnel: Regex::new(r"^tunnel\s+select\s+(\d+)$").expect("static regex must compile"),
    ipsec_tunnel: Regex::new(r"^ipsec\s+tunnel\s+(\d+)$").expect("static regex must compile"),
});

/// Match a trimmed line against the scope-opening commands.
///
/// `ipsec tunnel N` is reported here regardless of position; whether it
/// actually opens a scope depends on the enclosing block.
pub fn classify_opener(text: &str) -> Option<ScopeKey> {
    let p = &*OPENERS;
    if p.pp_anonymous.is_match(text) {
        return Some(ScopeKey::anonymous_pp());
    }
    if let Some(caps) = p.pp.captures(text) {
        return caps[1].parse().ok().map(ScopeKey::pp);
    }
    if let Some(caps) = p.tunnel.captures(text) {
        return caps[1].parse().ok().map(|id| ScopeKey::Tunnel { id });
    }
    if let Some(caps) = p.ipsec_tunnel.captures(text) {
        return caps[1].parse().ok().map(|id| ScopeKey::IpsecTunnel { id });
    }
    None
}

/// Rebuilds block nesting from keywords and indentation.
///
/// Every opening becomes a new entry in the scope arena; the stack holds
/// indices into it. The bottom of the stack is always the global scope.
#[derive(Debug, Clone)]
pub struct ContextTracker {
    scopes: Vec<Scope>,
    stack: Vec<ScopeId>,
}

impl Default for ContextTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextTracker {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::global()],
            stack: vec![ScopeId::GLOBAL],
        }
    }

    /// Scope at the top of the stack.
    pub fn current(&self) -> ScopeId {
        self.stack.last().copied().unwrap_or(ScopeId::GLOBAL)
    }

    /// Feed one line and return the scope it belongs to.
    pub fn observe(&mut self, line: &Line) -> ScopeId {
        self.pop_to_depth(line.depth);

        if let Some(key) = classify_opener(&line.text) {
            if self.opens_here(&key, line.depth) {
                self.push(key, line);
            }
        }

        self.current()
    }

    /// Consume the tracker and return the scope arena.
    pub fn into_scopes(self) -> Vec<Scope> {
        self.scopes
    }

    fn top(&self) -> &Scope {
        &self.scopes[self.current().0]
    }

    fn pop_to_depth(&mut self, depth: usize) {
        while self.stack.len() > 1 {
            let top = self.top();
            if top.is_shallower_than(depth) {
                break;
            }
            trace!(scope = %top.key, depth, "leaving scope");
            self.stack.pop();
        }
    }

    fn opens_here(&self, key: &ScopeKey, depth: usize) -> bool {
        let top = self.top();
        match key.kind() {
            ScopeKind::IpsecTunnel => top.key.kind() == ScopeKind::Tunnel && top.is_shallower_than(depth),
            _ => top.is_shallower_than(depth),
        }
    }

    fn push(&mut self, key: ScopeKey, line: &Line) {
        let kind = key.kind();
        if kind != ScopeKind::IpsecTunnel {
            if let Some(pos) = self
                .stack
                .iter()
                .position(|id| self.scopes[id.0].key.kind() == kind)
            {
                trace!(scope = %key, "closing open scope of the same kind");
                self.stack.truncate(pos);
            }
        }

        let id = ScopeId(self.scopes.len());
        trace!(scope = %key, depth = line.depth, line = line.number, "entering scope");
        self.scopes.push(Scope {
            key,
            depth: Some(line.depth),
            line_number: Some(line.number),
            parent: Some(self.current()),
        });
        self.stack.push(id);
    }
}
