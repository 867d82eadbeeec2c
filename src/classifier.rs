//! User-Agent heuristic classifier.
//!
//! Lowest-priority profile signal. Rules are ordered and first match wins:
//!
//! | Order | Matches | Profile |
//! |-------|---------|---------|
//! | 1 | Feature phones, legacy mobile OS versions, end-of-life engines, accessibility markers | `senior` |
//! | 2 | Contemporary phone browsers, in-app browsers of mobile-first social apps | `jovem` |
//! | 3 | Anything else (desktop browsers, empty input) | `familiar` |
//!
//! Rule 1 runs before rule 2 so an old phone is `senior`, not `jovem`.
//! Patterns are compiled once; classification never allocates.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use crate::error::ProfileError;
use crate::types::UserProfile;

/// Only this many leading bytes of a User-Agent are inspected.
pub const MAX_USER_AGENT_BYTES: usize = 512;

/// Legacy and accessibility-constrained platforms.
pub const SENIOR_PATTERN: &str = concat!(
    r"(?i)(",
    // Feature phones and legacy mobile platforms
    r"opera mini|j2me|midp|series ?40|series ?60|symbian|nokia|blackberry|bb10|",
    r"windows phone|windows ce|iemobile|kaios|",
    // Old mobile OS versions
    r"android [1-4]\.|iphone os [1-9]_|cpu os [1-9]_|",
    // End-of-life desktop engines
    r"msie [0-9]|trident/|presto/|",
    // Explicit accessibility markers
    r"accessibility|screenreader|screen reader|nvda|jaws|voiceover|talkback",
    r")"
);

/// Modern mobile form factors and in-app browsers.
pub const JOVEM_PATTERN: &str = concat!(
    r"(?i)(",
    r"iphone|ipod|android.*mobile|mobile safari|",
    r"instagram|fban|fbav|fb_iab|tiktok|musical_ly|bytedancewebview|",
    r"snapchat|twitter for (iphone|android)|micromessenger|whatsapp|\bline/",
    r")"
);

static DEFAULT_CLASSIFIER: Lazy<HeuristicClassifier> = Lazy::new(|| {
    HeuristicClassifier::with_patterns(SENIOR_PATTERN, JOVEM_PATTERN)
        .expect("built-in classifier patterns are valid")
});

/// Classify a User-Agent with the built-in rules.
///
/// Never fails. Empty or unrecognised input maps to [`UserProfile::Familiar`].
pub fn classify(user_agent: &str) -> UserProfile {
    DEFAULT_CLASSIFIER.classify(user_agent)
}

/// Anything that maps a User-Agent to a profile.
///
/// Implementations must be pure: same input, same output.
pub trait ProfileClassifier: Send + Sync {
    /// Classify a User-Agent string.
    fn classify(&self, user_agent: &str) -> UserProfile;
}

impl<F> ProfileClassifier for F
where
    F: Fn(&str) -> UserProfile + Send + Sync,
{
    fn classify(&self, user_agent: &str) -> UserProfile {
        self(user_agent)
    }
}

/// Ordered, pre-compiled User-Agent rule set.
#[derive(Debug, Clone)]
pub struct HeuristicClassifier {
    senior: Regex,
    jovem: Regex,
}

impl HeuristicClassifier {
    /// Classifier with the built-in rules.
    pub fn new() -> Self {
        DEFAULT_CLASSIFIER.clone()
    }

    /// Classifier with custom rules.
    ///
    /// Patterns are compiled here, once. Add `(?i)` for case-insensitive rules.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidPattern`] if either pattern does not compile.
    pub fn with_patterns(senior: &str, jovem: &str) -> Result<Self, ProfileError> {
        Ok(Self {
            senior: Regex::new(senior)?,
            jovem: Regex::new(jovem)?,
        })
    }

    /// Map a User-Agent to a profile. First matching rule wins.
    pub fn classify(&self, user_agent: &str) -> UserProfile {
        let ua = truncate_at_char_boundary(user_agent, MAX_USER_AGENT_BYTES);
        if ua.trim().is_empty() {
            return UserProfile::Familiar;
        }

        if self.senior.is_match(ua) {
            UserProfile::Senior
        } else if self.jovem.is_match(ua) {
            UserProfile::Jovem
        } else {
            UserProfile::Familiar
        }
    }
}

impl ProfileClassifier for HeuristicClassifier {
    fn classify(&self, user_agent: &str) -> UserProfile {
        HeuristicClassifier::classify(self, user_agent)
    }
}

impl Default for HeuristicClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate_at_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
