//! Visitor profile types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse experience tier assigned to an anonymous visitor.
///
/// Only these three values ever leave the classifier or cookie boundary.
/// Anything unrecognised is discarded and replaced by [`UserProfile::Familiar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserProfile {
    /// Default/standard experience.
    Familiar,
    /// Modern, mobile-optimized experience.
    Jovem,
    /// Accessibility-maximized experience.
    Senior,
}

impl UserProfile {
    /// All profiles, in declaration order.
    pub const ALL: [UserProfile; 3] = [Self::Familiar, Self::Jovem, Self::Senior];

    /// Parse a candidate profile value.
    ///
    /// Surrounding whitespace is ignored and matching is case-insensitive.
    /// Returns `None` for anything outside the enumeration.
    pub fn from_str(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|profile| profile.as_str().eq_ignore_ascii_case(s))
    }

    /// Wire value used in cookies, headers and JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Familiar => "familiar",
            Self::Jovem => "jovem",
            Self::Senior => "senior",
        }
    }
}

impl Default for UserProfile {
    fn default() -> Self {
        Self::Familiar
    }
}

impl fmt::Display for UserProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which signal produced a [`ProfileDecision`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileSource {
    /// Explicit query-parameter override.
    Query,
    /// Previously stored profile cookie.
    Cookie,
    /// User-Agent heuristic (also used for the fail-open default).
    Heuristic,
}

impl fmt::Display for ProfileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query => write!(f, "query"),
            Self::Cookie => write!(f, "cookie"),
            Self::Heuristic => write!(f, "heuristic"),
        }
    }
}

/// Request-scoped outcome of profile resolution.
///
/// Built fresh for every request and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDecision {
    /// The profile to apply to this response.
    pub resolved: UserProfile,
    /// The signal that won.
    pub source: ProfileSource,
    /// Whether the profile cookie must be (re)written.
    pub should_persist: bool,
}

impl ProfileDecision {
    /// The fail-open decision: default tier, cookie always written.
    pub fn fallback() -> Self {
        Self {
            resolved: UserProfile::default(),
            source: ProfileSource::Heuristic,
            should_persist: true,
        }
    }
}
