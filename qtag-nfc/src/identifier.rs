//! Queue-slot identifier carried on a tag

use serde::{Deserialize, Serialize};

/// Which side of a queue slot a tag belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Staff-facing tag
    Primary,
    /// Customer-facing tag
    Secondary,
}

impl Role {
    /// Token written into the `type` query field
    pub fn token(self) -> &'static str {
        match self {
            Role::Primary => "server",
            Role::Secondary => "customer",
        }
    }

    /// Parse a `type` query field; unknown tokens yield `None`
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "server" => Some(Role::Primary),
            "customer" => Some(Role::Secondary),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Primary => write!(f, "primary"),
            Role::Secondary => write!(f, "secondary"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    /// Accepts the role names and the wire tokens
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "primary" | "server" => Ok(Role::Primary),
            "secondary" | "customer" => Ok(Role::Secondary),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Identifier + role pair, the application content of a tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    pub id: String,
    pub role: Role,
}

impl Identifier {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self { id: id.into(), role }
    }
}
