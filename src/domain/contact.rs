//! Contact - a single buddy mirrored from the server roster

use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized buddy identity (screen name or numeric UIN).
///
/// Screen names compare case-insensitively with internal whitespace
/// ignored, so normalization happens once at construction and the rest
/// of the engine can compare with plain equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenName(String);

impl ScreenName {
    /// Normalize a raw screen name or UIN
    pub fn new(raw: &str) -> Self {
        let normalized: String = raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(|c| c.to_lowercase())
            .collect();
        Self(normalized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScreenName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A buddy mirrored from the authoritative server list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    /// Remote identity this contact mirrors
    pub screen_name: ScreenName,

    /// Human-readable name; falls back to the screen name when the
    /// server carries no alias
    pub display_name: String,
}

impl Contact {
    /// Create a contact from its remote identity and optional alias
    pub fn new(screen_name: ScreenName, alias: Option<String>) -> Self {
        let display_name = alias
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| screen_name.as_str().to_string());
        Self {
            screen_name,
            display_name,
        }
    }
}
