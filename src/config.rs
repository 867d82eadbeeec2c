//! Resolver and collector configuration.
//!
//! Defaults are usable as-is. Override with the `with_*` methods, or load the
//! resolver settings from the environment with [`ResolverConfig::from_env`].

use std::ops::RangeInclusive;
use std::time::Duration;

use crate::error::ProfileError;

/// Default profile cookie name.
pub const DEFAULT_COOKIE_NAME: &str = "visitor_profile";

/// Default query parameter carrying an explicit override.
pub const DEFAULT_QUERY_PARAM: &str = "profile";

/// Default response header exposing the resolved profile.
pub const DEFAULT_PROFILE_HEADER: &str = "x-user-profile";

/// Default profile cookie lifetime.
pub const DEFAULT_COOKIE_MAX_AGE_DAYS: i64 = 365;

/// Accepted profile cookie lifetimes, in days.
pub const COOKIE_MAX_AGE_DAYS_RANGE: RangeInclusive<i64> = 1..=36_500;

/// Default soft budget for a single resolution.
pub const DEFAULT_SOFT_BUDGET: Duration = Duration::from_millis(50);

/// Default storage key for the persisted session record.
pub const DEFAULT_STORAGE_KEY: &str = "visitor_behavior_session";

/// Deployment environment.
///
/// Resolution failures are only logged at `warn` outside production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Production traffic.
    Production,
    /// Local, preview or test deployments.
    #[default]
    Development,
}

impl Environment {
    /// Parse an `APP_ENV`-style value. Only `production`/`prod` count as production.
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    /// Whether this is a production deployment.
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Profile resolver configuration.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Name of the profile cookie.
    pub cookie_name: String,
    /// Query parameter carrying an explicit override.
    pub query_param: String,
    /// Response header exposing the resolved profile.
    pub profile_header: String,
    /// Lifetime of the profile cookie, in days.
    pub cookie_max_age_days: i64,
    /// Resolution time above which a warning is logged.
    pub soft_budget: Duration,
    /// Deployment environment.
    pub environment: Environment,
    /// `Cache-Control` for responses that write the profile cookie.
    pub cache_control_on_write: String,
    /// `Cache-Control` for responses resolved from an unchanged cookie.
    pub cache_control_stable: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            query_param: DEFAULT_QUERY_PARAM.to_string(),
            profile_header: DEFAULT_PROFILE_HEADER.to_string(),
            cookie_max_age_days: DEFAULT_COOKIE_MAX_AGE_DAYS,
            soft_budget: DEFAULT_SOFT_BUDGET,
            environment: Environment::default(),
            cache_control_on_write: "private, no-cache".to_string(),
            cache_control_stable: "public, max-age=0, must-revalidate".to_string(),
        }
    }
}

impl ResolverConfig {
    /// Load configuration from environment variables.
    ///
    /// # Optional env vars
    /// - `PROFILE_COOKIE_NAME`: cookie name (default `visitor_profile`)
    /// - `PROFILE_QUERY_PARAM`: override parameter (default `profile`)
    /// - `PROFILE_HEADER`: response header (default `x-user-profile`)
    /// - `PROFILE_COOKIE_MAX_AGE_DAYS`: cookie lifetime (default 365)
    /// - `PROFILE_SOFT_BUDGET_MS`: slow-resolution threshold (default 50)
    /// - `APP_ENV`: `production` disables failure warnings
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::Config`] if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ProfileError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ProfileError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(name) = lookup("PROFILE_COOKIE_NAME") {
            config = config.with_cookie_name(name);
        }
        if let Some(param) = lookup("PROFILE_QUERY_PARAM") {
            config = config.with_query_param(param);
        }
        if let Some(header) = lookup("PROFILE_HEADER") {
            config = config.with_profile_header(header);
        }
        if let Some(days) = lookup("PROFILE_COOKIE_MAX_AGE_DAYS") {
            let days: i64 = days
                .trim()
                .parse()
                .map_err(|e| ProfileError::Config(format!("PROFILE_COOKIE_MAX_AGE_DAYS: {e}")))?;
            if !COOKIE_MAX_AGE_DAYS_RANGE.contains(&days) {
                return Err(ProfileError::Config(format!(
                    "PROFILE_COOKIE_MAX_AGE_DAYS must be within {}..={}, got {days}",
                    COOKIE_MAX_AGE_DAYS_RANGE.start(),
                    COOKIE_MAX_AGE_DAYS_RANGE.end(),
                )));
            }
            config = config.with_cookie_max_age_days(days);
        }
        if let Some(ms) = lookup("PROFILE_SOFT_BUDGET_MS") {
            let ms: u64 = ms
                .trim()
                .parse()
                .map_err(|e| ProfileError::Config(format!("PROFILE_SOFT_BUDGET_MS: {e}")))?;
            config = config.with_soft_budget(Duration::from_millis(ms));
        }
        if let Some(env) = lookup("APP_ENV") {
            config = config.with_environment(Environment::from_str(&env));
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_query_param(mut self, param: impl Into<String>) -> Self {
        self.query_param = param.into();
        self
    }

    #[must_use]
    pub fn with_profile_header(mut self, header: impl Into<String>) -> Self {
        self.profile_header = header.into().to_ascii_lowercase();
        self
    }

    /// Set the cookie lifetime, clamped to [`COOKIE_MAX_AGE_DAYS_RANGE`].
    #[must_use]
    pub fn with_cookie_max_age_days(mut self, days: i64) -> Self {
        self.cookie_max_age_days = clamp_cookie_max_age_days(days);
        self
    }

    #[must_use]
    pub fn with_soft_budget(mut self, budget: Duration) -> Self {
        self.soft_budget = budget;
        self
    }

    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    #[must_use]
    pub fn with_cache_control(
        mut self,
        on_write: impl Into<String>,
        stable: impl Into<String>,
    ) -> Self {
        self.cache_control_on_write = on_write.into();
        self.cache_control_stable = stable.into();
        self
    }
}

/// Clamp a cookie lifetime into [`COOKIE_MAX_AGE_DAYS_RANGE`].
pub(crate) fn clamp_cookie_max_age_days(days: i64) -> i64 {
    days.clamp(*COOKIE_MAX_AGE_DAYS_RANGE.start(), *COOKIE_MAX_AGE_DAYS_RANGE.end())
}

/// Telemetry collector configuration.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Key of the persisted session record.
    pub storage_key: String,
    /// Persist whenever the event count reaches a multiple of this.
    pub flush_every: usize,
    /// Maximum characters kept from a clicked element's text.
    pub click_text_limit: usize,
    /// Scroll milestones, ascending, in percent.
    pub scroll_milestones: Vec<u8>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            flush_every: 10,
            click_text_limit: 50,
            scroll_milestones: vec![25, 50, 75, 100],
        }
    }
}

impl CollectorConfig {
    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// A value of zero is treated as one.
    #[must_use]
    pub fn with_flush_every(mut self, events: usize) -> Self {
        self.flush_every = events.max(1);
        self
    }

    #[must_use]
    pub fn with_click_text_limit(mut self, chars: usize) -> Self {
        self.click_text_limit = chars;
        self
    }

    /// Milestones are sorted, deduplicated and clamped to 1..=100.
    #[must_use]
    pub fn with_scroll_milestones(mut self, milestones: impl IntoIterator<Item = u8>) -> Self {
        let mut milestones: Vec<u8> = milestones.into_iter().map(|m| m.clamp(1, 100)).collect();
        milestones.sort_unstable();
        milestones.dedup();
        self.scroll_milestones = milestones;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ResolverConfig::default();
        assert_eq!(config.cookie_name, "visitor_profile");
        assert_eq!(config.query_param, "profile");
        assert_eq!(config.cookie_max_age_days, 365);
        assert_eq!(config.soft_budget, Duration::from_millis(50));
        assert!(!config.environment.is_production());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = ResolverConfig::from_lookup(lookup(&[
            ("PROFILE_COOKIE_NAME", "perfil"),
            ("PROFILE_QUERY_PARAM", "p"),
            ("PROFILE_HEADER", "X-Profile"),
            ("PROFILE_COOKIE_MAX_AGE_DAYS", "30"),
            ("PROFILE_SOFT_BUDGET_MS", "5"),
            ("APP_ENV", "Production"),
        ]))
        .unwrap();

        assert_eq!(config.cookie_name, "perfil");
        assert_eq!(config.query_param, "p");
        assert_eq!(config.profile_header, "x-profile");
        assert_eq!(config.cookie_max_age_days, 30);
        assert_eq!(config.soft_budget, Duration::from_millis(5));
        assert!(config.environment.is_production());
    }

    #[test]
    fn test_from_lookup_rejects_bad_numbers() {
        let err = ResolverConfig::from_lookup(lookup(&[("PROFILE_SOFT_BUDGET_MS", "fast")]));
        assert!(matches!(err, Err(ProfileError::Config(_))));

        let err = ResolverConfig::from_lookup(lookup(&[("PROFILE_COOKIE_MAX_AGE_DAYS", "0")]));
        assert!(matches!(err, Err(ProfileError::Config(_))));
    }

    #[test]
    fn test_from_lookup_rejects_out_of_range_cookie_age() {
        for days in ["-1", "36501", "200000000000000"] {
            let err = ResolverConfig::from_lookup(lookup(&[("PROFILE_COOKIE_MAX_AGE_DAYS", days)]));
            assert!(matches!(err, Err(ProfileError::Config(_))), "{days}");
        }
        let config = ResolverConfig::from_lookup(lookup(&[("PROFILE_COOKIE_MAX_AGE_DAYS", "36500")]))
            .unwrap();
        assert_eq!(config.cookie_max_age_days, 36_500);
    }

    #[test]
    fn test_cookie_max_age_builder_clamps() {
        assert_eq!(ResolverConfig::default().with_cookie_max_age_days(-1).cookie_max_age_days, 1);
        assert_eq!(ResolverConfig::default().with_cookie_max_age_days(0).cookie_max_age_days, 1);
        assert_eq!(
            ResolverConfig::default()
                .with_cookie_max_age_days(200_000_000_000_000)
                .cookie_max_age_days,
            36_500
        );
        assert_eq!(ResolverConfig::default().with_cookie_max_age_days(30).cookie_max_age_days, 30);
    }

    #[test]
    fn test_scroll_milestones_normalized() {
        let config = CollectorConfig::default().with_scroll_milestones([100, 50, 50, 0]);
        assert_eq!(config.scroll_milestones, vec![1, 50, 100]);
    }

    #[test]
    fn test_flush_every_never_zero() {
        assert_eq!(CollectorConfig::default().with_flush_every(0).flush_every, 1);
    }
}
