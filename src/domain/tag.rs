//! Tags attached to trades, split by kind.

use crate::domain::TimeMs;
use serde::{Deserialize, Serialize};

/// Tag category. Stored and serialized uppercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TagKind {
    Strategy,
    Emotional,
    Market,
}

impl TagKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagKind::Strategy => "STRATEGY",
            TagKind::Emotional => "EMOTIONAL",
            TagKind::Market => "MARKET",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "STRATEGY" => Some(TagKind::Strategy),
            "EMOTIONAL" => Some(TagKind::Emotional),
            "MARKET" => Some(TagKind::Market),
            _ => None,
        }
    }
}

impl std::fmt::Display for TagKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named tag, unique per (name, kind).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub kind: TagKind,
    pub created_at_ms: TimeMs,
}

/// How a trade payload refers to a tag: an existing id, or a name to
/// find-or-create within the trade's transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagRef {
    Id(String),
    Named { name: String, kind: TagKind },
}
