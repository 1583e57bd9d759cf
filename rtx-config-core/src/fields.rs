//! Token-level helpers for commands whose trailing arguments are positional
//! but optional, so a field's meaning depends on what it looks like.

use std::net::Ipv4Addr;

/// Forward-only cursor over whitespace-separated tokens.
#[derive(Debug, Clone)]
pub struct TokenCursor<'a> {
    tokens: Vec<&'a str>,
    pos: usize,
}

impl<'a> TokenCursor<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            tokens: text.split_whitespace().collect(),
            pos: 0,
        }
    }

    pub fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.pos).copied()
    }

    /// Look `n` tokens past the current one.
    pub fn peek_nth(&self, n: usize) -> Option<&'a str> {
        self.tokens.get(self.pos + n).copied()
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<&'a str> {
        let token = self.peek()?;
        self.pos += 1;
        Some(token)
    }

    /// Consume the next token only when `pred` accepts it.
    pub fn next_if(&mut self, pred: impl FnOnce(&str) -> bool) -> Option<&'a str> {
        let token = self.peek()?;
        if pred(token) {
            self.pos += 1;
            Some(token)
        } else {
            None
        }
    }

    /// Consume the next token when it equals `literal`.
    pub fn eat(&mut self, literal: &str) -> bool {
        self.next_if(|token| token == literal).is_some()
    }

    /// Consume a run of tokens that all match `literals` in order.
    pub fn eat_sequence(&mut self, literals: &[&str]) -> bool {
        let matches = literals
            .iter()
            .enumerate()
            .all(|(offset, literal)| self.peek_nth(offset) == Some(*literal));
        if matches {
            self.pos += literals.len();
        }
        matches
    }

    /// Consume `key=value` when the next token has that key.
    pub fn next_value(&mut self, key: &str) -> Option<&'a str> {
        let token = self.peek()?;
        let value = token.strip_prefix(key)?.strip_prefix('=')?;
        self.pos += 1;
        Some(value)
    }

    pub fn is_done(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Tokens not yet consumed.
    pub fn rest(&self) -> &[&'a str] {
        &self.tokens[self.pos.min(self.tokens.len())..]
    }
}

/// Dotted IPv4, or anything IPv6-shaped (contains `:` and no `*` wildcard).
pub fn is_address(token: &str) -> bool {
    is_ipv4_shaped(token) || (token.contains(':') && !token.contains('*'))
}

/// An address, a `prefix/len` network, or an `a-b` address range.
pub fn is_network(token: &str) -> bool {
    if let Some((addr, _)) = token.split_once('/') {
        if is_address(addr) {
            return true;
        }
    }
    if let Some((start, end)) = token.split_once('-') {
        if is_address(start) && is_address(end) {
            return true;
        }
    }
    is_address(token)
}

/// Four dot-separated groups of one to three digits. Octet range is not checked.
pub fn is_ipv4_shaped(token: &str) -> bool {
    let groups: Vec<&str> = token.split('.').collect();
    groups.len() == 4
        && groups
            .iter()
            .all(|g| (1..=3).contains(&g.len()) && g.bytes().all(|b| b.is_ascii_digit()))
}

/// Parse a strict dotted IPv4 address.
pub fn parse_ipv4(token: &str) -> Option<Ipv4Addr> {
    token.parse().ok()
}
