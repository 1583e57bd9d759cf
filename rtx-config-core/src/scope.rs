use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// Identifier of the anonymous PP interface.
pub const ANONYMOUS: &str = "anonymous";

/// Identity of a configuration scope.
///
/// Two scope instances with equal keys describe the same logical interface or
/// tunnel, even when the block was re-entered later in the file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScopeKey {
    Global,
    Pp { id: u32, name: Option<String> },
    Tunnel { id: u32 },
    IpsecTunnel { id: u32 },
}

impl ScopeKey {
    /// Key for `pp select N`.
    pub fn pp(id: u32) -> Self {
        Self::Pp { id, name: None }
    }

    /// Key for `pp select anonymous`.
    pub fn anonymous_pp() -> Self {
        Self::Pp {
            id: 0,
            name: Some(ANONYMOUS.to_string()),
        }
    }

    pub fn kind(&self) -> ScopeKind {
        match self {
            Self::Global => ScopeKind::Global,
            Self::Pp { .. } => ScopeKind::Pp,
            Self::Tunnel { .. } => ScopeKind::Tunnel,
            Self::IpsecTunnel { .. } => ScopeKind::IpsecTunnel,
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Self::Global)
    }

    /// Numeric identifier, `None` for the global scope.
    pub fn id(&self) -> Option<u32> {
        match self {
            Self::Global => None,
            Self::Pp { id, .. } | Self::Tunnel { id } | Self::IpsecTunnel { id } => Some(*id),
        }
    }

    pub fn is_anonymous_pp(&self) -> bool {
        matches!(self, Self::Pp { name: Some(name), .. } if name == ANONYMOUS)
    }
}

impl Display for ScopeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Pp {
                name: Some(name), ..
            } => write!(f, "pp {name}"),
            Self::Pp { id, name: None } => write!(f, "pp {id}"),
            Self::Tunnel { id } => write!(f, "tunnel {id}"),
            Self::IpsecTunnel { id } => write!(f, "ipsec tunnel {id}"),
        }
    }
}

/// Error returned when a `KIND:ID` selector cannot be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScopeKeyParseError {
    #[error("unknown scope kind `{0}` (expected global, pp, tunnel or ipsec)")]
    UnknownKind(String),
    #[error("scope `{0}` requires an identifier, e.g. `{0}:1`")]
    MissingId(String),
    #[error("invalid scope identifier `{0}`")]
    InvalidId(String),
}

impl FromStr for ScopeKey {
    type Err = ScopeKeyParseError;

    /// Parse selectors such as `global`, `tunnel:1`, `pp:2`, `pp:anonymous`, `ipsec:101`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = match s.split_once(':') {
            Some((kind, id)) => (kind.trim(), Some(id.trim())),
            None => (s.trim(), None),
        };
        let kind = kind.to_ascii_lowercase();

        if kind == "global" {
            return Ok(Self::Global);
        }

        let id = id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ScopeKeyParseError::MissingId(kind.clone()))?;

        if kind == "pp" && id.eq_ignore_ascii_case(ANONYMOUS) {
            return Ok(Self::anonymous_pp());
        }

        let numeric: u32 = id
            .parse()
            .map_err(|_| ScopeKeyParseError::InvalidId(id.to_string()))?;

        match kind.as_str() {
            "pp" => Ok(Self::pp(numeric)),
            "tunnel" => Ok(Self::Tunnel { id: numeric }),
            "ipsec" | "ipsec-tunnel" | "ipsec_tunnel" => Ok(Self::IpsecTunnel { id: numeric }),
            _ => Err(ScopeKeyParseError::UnknownKind(kind)),
        }
    }
}

/// Scope variant without its identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Global,
    Pp,
    Tunnel,
    IpsecTunnel,
}

impl Display for ScopeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Global => "global",
            Self::Pp => "pp",
            Self::Tunnel => "tunnel",
            Self::IpsecTunnel => "ipsec tunnel",
        };
        f.write_str(label)
    }
}

/// Index of a scope instance in a [`crate::CommandStream`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ScopeId(pub usize);

impl ScopeId {
    /// The global scope always lives at index 0.
    pub const GLOBAL: ScopeId = ScopeId(0);
}

/// One opening of a scope block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scope {
    pub key: ScopeKey,
    /// Indentation depth of the opening line. `None` for the global scope.
    pub depth: Option<usize>,
    /// Source line of the opening command. `None` for the global scope.
    pub line_number: Option<usize>,
    pub parent: Option<ScopeId>,
}

impl Scope {
    pub fn global() -> Self {
        Self {
            key: ScopeKey::Global,
            depth: None,
            line_number: None,
            parent: None,
        }
    }

    /// Whether a line at `depth` sits strictly inside this scope's opening indentation.
    pub fn is_shallower_than(&self, depth: usize) -> bool {
        self.depth.map_or(true, |own| own < depth)
    }
}
