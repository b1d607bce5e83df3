//! Zone modes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// How a zone influences spawning inside its boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneMode {
    /// Block every spawn, ignoring the filter.
    #[default]
    Block,
    /// Block every spawn that does not match the filter.
    Allow,
    /// Block every spawn that matches the filter.
    Deny,
    /// Scale the spawn rate of matching spawns.
    Modify,
    /// Substitute matching spawns with another kind.
    Replace,
}

impl ZoneMode {
    pub const ALL: [Self; 5] = [Self::Block, Self::Allow, Self::Deny, Self::Modify, Self::Replace];

    /// Lowercase identifier, as used in zone files and commands.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::Modify => "modify",
            Self::Replace => "replace",
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Block => "Blocks all spawns in the zone",
            Self::Allow => "Only allows spawns matching the filter",
            Self::Deny => "Blocks spawns matching the filter",
            Self::Modify => "Modifies the spawn rate of matching spawns",
            Self::Replace => "Replaces matching spawns with another type",
        }
    }

    /// Whether this mode can prevent a spawn outright.
    #[must_use]
    pub const fn blocks_spawning(self) -> bool {
        matches!(self, Self::Block | Self::Allow | Self::Deny)
    }

    /// Whether the zone filter takes part in decisions for this mode.
    #[must_use]
    pub const fn uses_filter(self) -> bool {
        !matches!(self, Self::Block)
    }

    /// Whether the external suppression store can represent this mode.
    #[must_use]
    pub const fn is_store_expressible(self) -> bool {
        matches!(self, Self::Block | Self::Deny)
    }
}

impl fmt::Display for ZoneMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ZoneMode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseError {
                kind: "zone mode",
                value: s.to_owned(),
            })
    }
}
