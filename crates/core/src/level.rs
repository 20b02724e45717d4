use serde::{Deserialize, Serialize};
use std::fmt;

/// Geographic scope level. NATION is the most general, AREA the most
/// specific of the canonical chain; anything else (e.g. DIVISION rows
/// from legacy data) ranks below the chain and never wins a resolution
/// against a canonical level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AreaLevel {
    Nation,
    Zone,
    Region,
    Area,
    Other(String),
}

impl AreaLevel {
    /// Specificity rank: lower = more general. Canonical levels rank
    /// 1..=4, unrecognized levels rank 5.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Nation => 1,
            Self::Zone => 2,
            Self::Region => 3,
            Self::Area => 4,
            Self::Other(_) => 5,
        }
    }

    pub fn is_canonical(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Nation => "NATION",
            Self::Zone => "ZONE",
            Self::Region => "REGION",
            Self::Area => "AREA",
            Self::Other(s) => s,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "NATION" => Self::Nation,
            "ZONE" => Self::Zone,
            "REGION" => Self::Region,
            "AREA" => Self::Area,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for AreaLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
