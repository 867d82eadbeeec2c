//! Service state management.

use std::sync::Arc;

use crate::config::ResolverConfig;
use crate::observe::ResolutionObserver;
use crate::resolver::ProfileResolver;

use super::middleware::MetricsObserver;

/// Shared service state.
///
/// The resolver is immutable after startup, so cloning the state per request
/// is a reference-count bump.
#[derive(Clone)]
pub struct ServiceState {
    /// The per-request profile resolver.
    pub resolver: Arc<ProfileResolver>,
}

impl ServiceState {
    /// Wrap a configured resolver.
    pub fn new(resolver: ProfileResolver) -> Self {
        Self {
            resolver: Arc::new(resolver),
        }
    }

    /// Build a resolver from `config` that reports through the metrics log.
    pub fn with_config(config: ResolverConfig) -> Self {
        let observer: Arc<dyn ResolutionObserver> = Arc::new(MetricsObserver);
        Self::new(ProfileResolver::new(config).with_observer(observer))
    }

    /// Create service state from environment variables.
    ///
    /// See [`ResolverConfig::from_env`] for the variables read. An invalid
    /// value is logged and the defaults are used instead.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = ResolverConfig::from_lookup(lookup).unwrap_or_else(|error| {
            tracing::warn!(
                error = %error,
                "invalid resolver configuration, using defaults"
            );
            ResolverConfig::default()
        });
        Self::with_config(config)
    }

    /// The resolver configuration in effect.
    pub fn config(&self) -> &ResolverConfig {
        self.resolver.config()
    }
}

impl Default for ServiceState {
    fn default() -> Self {
        Self::with_config(ResolverConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_clones_share_resolver() {
        let state = ServiceState::with_config(ResolverConfig::default().with_cookie_name("perfil"));
        let clone = state.clone();

        assert!(Arc::ptr_eq(&state.resolver, &clone.resolver));
        assert_eq!(clone.config().cookie_name, "perfil");
    }

    fn vars(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| value.to_string())
        }
    }

    #[test]
    fn test_invalid_environment_falls_back_to_defaults() {
        let defaults = ResolverConfig::default();

        let unparsable = ServiceState::from_lookup(vars(&[
            ("PROFILE_COOKIE_NAME", "perfil"),
            ("PROFILE_SOFT_BUDGET_MS", "fast"),
        ]));
        let out_of_range = ServiceState::from_lookup(vars(&[("PROFILE_COOKIE_MAX_AGE_DAYS", "-1")]));

        for state in [unparsable, out_of_range] {
            assert_eq!(state.config().cookie_name, defaults.cookie_name);
            assert_eq!(state.config().soft_budget, defaults.soft_budget);
            assert_eq!(state.config().cookie_max_age_days, defaults.cookie_max_age_days);
        }
    }

    #[test]
    fn test_valid_environment_is_applied() {
        let state = ServiceState::from_lookup(vars(&[
            ("PROFILE_COOKIE_NAME", "perfil"),
            ("PROFILE_COOKIE_MAX_AGE_DAYS", "30"),
        ]));
        assert_eq!(state.config().cookie_name, "perfil");
        assert_eq!(state.config().cookie_max_age_days, 30);
    }
}
