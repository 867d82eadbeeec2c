//! Per-request visitor profile resolver.
//!
//! ## Priority
//!
//! 1. Valid query override: always wins, always rewrites the cookie
//! 2. Valid stored cookie
//! 3. User-Agent heuristic
//!
//! ## Fail-Open
//!
//! [`ProfileResolver::resolve_request`] never fails. Any extraction error, and
//! any panic inside classification, yields the default profile with a fresh
//! cookie. A broken classifier must not block traffic.
//!
//! ## Cost
//!
//! Resolution is synchronous and touches nothing but the request itself: no
//! I/O, no shared mutable state, no cross-request caching. Anything slower than
//! the configured soft budget is logged and reported to the observer.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::str;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cookie::Cookie;
use tracing::{debug, warn};

use crate::classifier::{HeuristicClassifier, ProfileClassifier};
use crate::config::ResolverConfig;
use crate::error::ProfileError;
use crate::observe::{NoOpObserver, ResolutionObserver};
use crate::profile_cookie::{find_cookie_value, profile_cookie};
use crate::types::{ProfileDecision, ProfileSource, UserProfile};

/// `Vary` value emitted with every resolution.
pub const VARY_HEADER_VALUE: &str = "Cookie, User-Agent";

/// Already-extracted candidate signals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileSignals<'a> {
    /// Raw query override value.
    pub query_profile: Option<&'a str>,
    /// Raw stored cookie value.
    pub cookie_profile: Option<&'a str>,
    /// User-Agent header (empty when absent).
    pub user_agent: &'a str,
}

impl<'a> ProfileSignals<'a> {
    /// Signals carrying only a User-Agent.
    pub fn new(user_agent: &'a str) -> Self {
        Self {
            user_agent,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_query(mut self, value: &'a str) -> Self {
        self.query_profile = Some(value);
        self
    }

    #[must_use]
    pub fn with_cookie(mut self, value: &'a str) -> Self {
        self.cookie_profile = Some(value);
        self
    }
}

/// Raw request parts, before any decoding.
///
/// Header values are bytes because that is all HTTP guarantees.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestParts<'a> {
    /// Raw (still percent-encoded) query string, without `?`.
    pub query: Option<&'a str>,
    /// `Cookie` header.
    pub cookie_header: Option<&'a [u8]>,
    /// `User-Agent` header.
    pub user_agent: Option<&'a [u8]>,
    /// `X-Forwarded-Proto` header, set by TLS-terminating proxies.
    pub forwarded_proto: Option<&'a [u8]>,
    /// Whether the request URI itself used `https`.
    pub https: bool,
}

impl<'a> RequestParts<'a> {
    /// Whether the request arrived over an encrypted transport.
    ///
    /// Only the first hop listed in `X-Forwarded-Proto` is considered.
    pub fn is_secure(&self) -> bool {
        if self.https {
            return true;
        }
        self.forwarded_proto
            .and_then(|raw| str::from_utf8(raw).ok())
            .and_then(|value| value.split(',').next())
            .map(|proto| proto.trim().eq_ignore_ascii_case("https"))
            .unwrap_or(false)
    }
}

/// Everything the response needs from one resolution.
#[derive(Debug, Clone)]
pub struct ProfileResolution {
    /// The decision.
    pub decision: ProfileDecision,
    /// Cookie to set, when the stored value must change.
    pub set_cookie: Option<Cookie<'static>>,
    /// Response headers (lowercase names): profile, `cache-control`, `vary`.
    pub headers: Vec<(String, String)>,
    /// Time spent resolving.
    pub elapsed: Duration,
}

impl ProfileResolution {
    /// The resolved profile.
    pub fn profile(&self) -> UserProfile {
        self.decision.resolved
    }

    /// `Set-Cookie` header value, if a cookie must be written.
    pub fn set_cookie_header(&self) -> Option<String> {
        self.set_cookie.as_ref().map(|c| c.to_string())
    }

    /// Look up an emitted header by (case-insensitive) name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Decide a profile from signals using the built-in classifier.
///
/// Pure and deterministic: same signals, same decision.
pub fn resolve(signals: &ProfileSignals<'_>) -> ProfileDecision {
    decide(signals, &HeuristicClassifier::default())
}

/// Apply the priority policy.
fn decide(signals: &ProfileSignals<'_>, classifier: &dyn ProfileClassifier) -> ProfileDecision {
    if let Some(profile) = signals.query_profile.and_then(UserProfile::from_str) {
        return ProfileDecision {
            resolved: profile,
            source: ProfileSource::Query,
            should_persist: true,
        };
    }

    if let Some(raw) = signals.cookie_profile {
        if let Some(profile) = UserProfile::from_str(raw) {
            return ProfileDecision {
                resolved: profile,
                source: ProfileSource::Cookie,
                // Rewrite non-canonical spellings such as "SENIOR".
                should_persist: raw != profile.as_str(),
            };
        }
    }

    // No valid stored value, so whatever the client holds differs from the result.
    ProfileDecision {
        resolved: classifier.classify(signals.user_agent),
        source: ProfileSource::Heuristic,
        should_persist: true,
    }
}

/// Stateless, per-request profile resolver.
///
/// Holds only immutable configuration, so one instance can be shared across
/// concurrent requests.
pub struct ProfileResolver {
    config: ResolverConfig,
    classifier: Arc<dyn ProfileClassifier>,
    observer: Arc<dyn ResolutionObserver>,
}

impl ProfileResolver {
    /// Create a resolver with the built-in classifier.
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            classifier: Arc::new(HeuristicClassifier::default()),
            observer: Arc::new(NoOpObserver),
        }
    }

    /// Replace the classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn ProfileClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Attach an observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ResolutionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// The resolver's configuration.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Decide a profile from already-extracted signals.
    pub fn resolve(&self, signals: &ProfileSignals<'_>) -> ProfileDecision {
        decide(signals, self.classifier.as_ref())
    }

    /// Resolve a raw request into a decision, cookie and response headers.
    ///
    /// This is the fail-open boundary: it never returns an error and never
    /// propagates a panic from classification or cookie and header assembly.
    pub fn resolve_request(&self, request: &RequestParts<'_>) -> ProfileResolution {
        let start = Instant::now();

        let secure = request.is_secure();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<_, ProfileError> {
            let decision = self.try_resolve(request)?;
            Ok(self.assemble(decision, secure))
        }))
        .unwrap_or_else(|payload| Err(ProfileError::Panicked(panic_message(payload.as_ref()))));

        let (decision, set_cookie, headers) = match outcome {
            Ok(parts) => parts,
            Err(error) => {
                self.report_failure(&error);
                self.assemble(ProfileDecision::fallback(), secure)
            }
        };

        let elapsed = start.elapsed();
        if elapsed > self.config.soft_budget {
            warn!(
                target: "visitor_signals::resolver",
                elapsed_us = elapsed.as_micros() as u64,
                budget_ms = self.config.soft_budget.as_millis() as u64,
                "profile resolution exceeded soft budget"
            );
            self.observer.on_slow(elapsed, self.config.soft_budget);
        }

        debug!(
            target: "visitor_signals::resolver",
            profile = %decision.resolved,
            source = %decision.source,
            should_persist = decision.should_persist,
            elapsed_us = elapsed.as_micros() as u64,
            "profile resolved"
        );
        self.observer.on_resolved(&decision, elapsed);

        ProfileResolution {
            decision,
            set_cookie,
            headers,
            elapsed,
        }
    }

    /// Extract signals from raw parts and decide.
    fn try_resolve(&self, request: &RequestParts<'_>) -> Result<ProfileDecision, ProfileError> {
        let user_agent = match request.user_agent {
            Some(raw) => str::from_utf8(raw)
                .map_err(|_| ProfileError::InvalidHeader { name: "user-agent" })?,
            None => "",
        };

        let cookie_profile = match request.cookie_header {
            Some(raw) => {
                let header = str::from_utf8(raw)
                    .map_err(|_| ProfileError::InvalidHeader { name: "cookie" })?;
                find_cookie_value(header, &self.config.cookie_name)
            }
            None => None,
        };

        let query_profile = request
            .query
            .and_then(|query| query_value(query, &self.config.query_param));

        Ok(self.resolve(&ProfileSignals {
            query_profile: query_profile.as_deref(),
            cookie_profile: cookie_profile.as_deref(),
            user_agent,
        }))
    }

    /// Cookie and response headers for a decision.
    fn assemble(
        &self,
        decision: ProfileDecision,
        secure: bool,
    ) -> (ProfileDecision, Option<Cookie<'static>>, Vec<(String, String)>) {
        let set_cookie = decision
            .should_persist
            .then(|| profile_cookie(&self.config, decision.resolved, secure));
        let headers = self.response_headers(&decision);
        (decision, set_cookie, headers)
    }

    fn response_headers(&self, decision: &ProfileDecision) -> Vec<(String, String)> {
        let cache_control = if decision.should_persist {
            &self.config.cache_control_on_write
        } else {
            &self.config.cache_control_stable
        };

        vec![
            (self.config.profile_header.clone(), decision.resolved.to_string()),
            ("cache-control".to_string(), cache_control.clone()),
            ("vary".to_string(), VARY_HEADER_VALUE.to_string()),
        ]
    }

    fn report_failure(&self, error: &ProfileError) {
        if self.config.environment.is_production() {
            debug!(target: "visitor_signals::resolver", error = %error, "profile resolution failed, using default");
        } else {
            warn!(target: "visitor_signals::resolver", error = %error, "profile resolution failed, using default");
        }
        self.observer.on_fallback(error);
    }
}

impl Default for ProfileResolver {
    fn default() -> Self {
        Self::new(ResolverConfig::default())
    }
}

/// First decoded value of `param` in a raw query string.
fn query_value(query: &str, param: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == param)
        .map(|(_, value)| value.into_owned())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::RecordingObserver;

    const IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 15_0 like Mac OS X)";
    const DESKTOP: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

    #[test]
    fn test_query_override_wins() {
        let decision = resolve(&ProfileSignals::new(IPHONE).with_query("senior").with_cookie("familiar"));
        assert_eq!(decision.resolved, UserProfile::Senior);
        assert_eq!(decision.source, ProfileSource::Query);
        assert!(decision.should_persist);
    }

    #[test]
    fn test_query_override_matching_cookie_still_persists() {
        let decision = resolve(&ProfileSignals::new(DESKTOP).with_query("jovem").with_cookie("jovem"));
        assert_eq!(decision.source, ProfileSource::Query);
        assert!(decision.should_persist);
    }

    #[test]
    fn test_invalid_query_falls_through_to_cookie() {
        let decision = resolve(&ProfileSignals::new(IPHONE).with_query("admin").with_cookie("senior"));
        assert_eq!(decision.resolved, UserProfile::Senior);
        assert_eq!(decision.source, ProfileSource::Cookie);
        assert!(!decision.should_persist);
    }

    #[test]
    fn test_non_canonical_cookie_is_rewritten() {
        let decision = resolve(&ProfileSignals::new(DESKTOP).with_cookie("SENIOR"));
        assert_eq!(decision.resolved, UserProfile::Senior);
        assert!(decision.should_persist);
    }

    #[test]
    fn test_heuristic_fallback() {
        let decision = resolve(&ProfileSignals::new(IPHONE));
        assert_eq!(decision.resolved, UserProfile::Jovem);
        assert_eq!(decision.source, ProfileSource::Heuristic);
        assert!(decision.should_persist);
    }

    #[test]
    fn test_malformed_cookie_ignored() {
        let decision = resolve(&ProfileSignals::new(DESKTOP).with_cookie("xyz"));
        assert_eq!(decision.resolved, UserProfile::Familiar);
        assert_eq!(decision.source, ProfileSource::Heuristic);
    }

    #[test]
    fn test_resolve_request_extracts_signals() {
        let resolver = ProfileResolver::default();
        let request = RequestParts {
            query: Some("utm_source=x&profile=Senior"),
            cookie_header: Some(b"visitor_profile=familiar".as_slice()),
            user_agent: Some(IPHONE.as_bytes()),
            ..RequestParts::default()
        };

        let resolution = resolver.resolve_request(&request);
        assert_eq!(resolution.profile(), UserProfile::Senior);
        assert_eq!(resolution.decision.source, ProfileSource::Query);
        assert_eq!(resolution.header("x-user-profile"), Some("senior"));
        assert_eq!(resolution.header("vary"), Some("Cookie, User-Agent"));
        assert_eq!(resolution.header("cache-control"), Some("private, no-cache"));

        let cookie = resolution.set_cookie.expect("override rewrites cookie");
        assert_eq!(cookie.value(), "senior");
        assert_eq!(cookie.secure(), Some(false));
    }

    #[test]
    fn test_resolve_request_stable_cookie_sets_nothing() {
        let resolver = ProfileResolver::default();
        let request = RequestParts {
            cookie_header: Some(b"a=1; visitor_profile=jovem".as_slice()),
            user_agent: Some(DESKTOP.as_bytes()),
            ..RequestParts::default()
        };

        let resolution = resolver.resolve_request(&request);
        assert_eq!(resolution.profile(), UserProfile::Jovem);
        assert!(resolution.set_cookie.is_none());
        assert_eq!(
            resolution.header("cache-control"),
            Some("public, max-age=0, must-revalidate")
        );
    }

    #[test]
    fn test_percent_encoded_override() {
        let resolver = ProfileResolver::default();
        let request = RequestParts {
            query: Some("profile=%20jovem%20"),
            ..RequestParts::default()
        };
        assert_eq!(resolver.resolve_request(&request).profile(), UserProfile::Jovem);
    }

    #[test]
    fn test_missing_user_agent_defaults() {
        let resolution = ProfileResolver::default().resolve_request(&RequestParts::default());
        assert_eq!(resolution.profile(), UserProfile::Familiar);
        assert!(resolution.set_cookie.is_some());
    }

    #[test]
    fn test_secure_flag_follows_transport() {
        let resolver = ProfileResolver::default();

        let forwarded = RequestParts {
            forwarded_proto: Some(b"https, http".as_slice()),
            ..RequestParts::default()
        };
        let cookie = resolver.resolve_request(&forwarded).set_cookie.unwrap();
        assert_eq!(cookie.secure(), Some(true));

        let direct = RequestParts {
            https: true,
            ..RequestParts::default()
        };
        assert!(direct.is_secure());

        let plain = RequestParts {
            forwarded_proto: Some(b"http".as_slice()),
            ..RequestParts::default()
        };
        assert!(!plain.is_secure());
    }

    #[test]
    fn test_invalid_header_fails_open() {
        let observer = Arc::new(RecordingObserver::new());
        let resolver = ProfileResolver::default().with_observer(observer.clone());
        let request = RequestParts {
            query: Some("profile=senior"),
            user_agent: Some(&[0xff, 0xfe, 0xfd]),
            ..RequestParts::default()
        };

        let resolution = resolver.resolve_request(&request);
        assert_eq!(resolution.decision, ProfileDecision::fallback());
        assert_eq!(resolution.set_cookie.unwrap().value(), "familiar");
        assert_eq!(observer.fallback_count(), 1);
    }

    #[test]
    fn test_panicking_classifier_fails_open() {
        let observer = Arc::new(RecordingObserver::new());
        let classifier: Arc<dyn ProfileClassifier> =
            Arc::new(|_: &str| -> UserProfile { panic!("classifier exploded") });
        let resolver = ProfileResolver::default()
            .with_classifier(classifier)
            .with_observer(observer.clone());

        let request = RequestParts {
            user_agent: Some(IPHONE.as_bytes()),
            ..RequestParts::default()
        };
        let resolution = resolver.resolve_request(&request);

        assert_eq!(resolution.profile(), UserProfile::Familiar);
        assert!(resolution.set_cookie.is_some());
        assert!(observer.fallbacks.lock()[0].contains("classifier exploded"));
    }

    #[test]
    fn test_oversized_cookie_lifetime_never_panics() {
        let mut config = ResolverConfig::default();
        config.cookie_max_age_days = 200_000_000_000_000;
        let resolver = ProfileResolver::new(config);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            resolver.resolve_request(&RequestParts::default())
        }));
        let resolution = outcome.expect("resolve_request must not panic");

        assert_eq!(resolution.profile(), UserProfile::Familiar);
        let cookie = resolution.set_cookie.unwrap();
        assert_eq!(cookie.max_age(), Some(cookie::time::Duration::days(36_500)));
    }

    #[test]
    fn test_builder_cookie_lifetime_keeps_cookie_alive() {
        let resolver = ProfileResolver::new(ResolverConfig::default().with_cookie_max_age_days(-1));
        let header = resolver
            .resolve_request(&RequestParts::default())
            .set_cookie_header()
            .unwrap();

        assert!(header.contains("Max-Age=86400"), "{header}");
    }

    #[test]
    fn test_slow_resolution_reported() {
        let observer = Arc::new(RecordingObserver::new());
        let classifier: Arc<dyn ProfileClassifier> = Arc::new(|_: &str| {
            std::thread::sleep(Duration::from_millis(5));
            UserProfile::Jovem
        });
        let resolver = ProfileResolver::new(ResolverConfig::default().with_soft_budget(Duration::from_millis(1)))
            .with_classifier(classifier)
            .with_observer(observer.clone());

        let resolution = resolver.resolve_request(&RequestParts::default());
        assert_eq!(resolution.profile(), UserProfile::Jovem);
        assert_eq!(*observer.slow.lock(), 1);
    }

    #[test]
    fn test_custom_cookie_and_query_names() {
        let config = ResolverConfig::default()
            .with_cookie_name("perfil")
            .with_query_param("p");
        let resolver = ProfileResolver::new(config);

        let request = RequestParts {
            query: Some("profile=jovem"),
            cookie_header: Some(b"perfil=senior".as_slice()),
            ..RequestParts::default()
        };
        let resolution = resolver.resolve_request(&request);
        assert_eq!(resolution.profile(), UserProfile::Senior);
        assert_eq!(resolution.decision.source, ProfileSource::Cookie);
    }
}
