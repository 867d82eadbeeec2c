//! Profile cookie encoding and lookup.

use cookie::time::Duration;
use cookie::{Cookie, SameSite};

use crate::config::{clamp_cookie_max_age_days, ResolverConfig};
use crate::types::UserProfile;

/// Build the profile cookie.
///
/// Long-lived, site-wide, `SameSite=Lax`, and `Secure` only when the request
/// arrived over an encrypted transport. Readable by client-side scripts.
pub fn profile_cookie(config: &ResolverConfig, profile: UserProfile, secure: bool) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), profile.as_str().to_string()))
        .path("/")
        .max_age(Duration::days(clamp_cookie_max_age_days(config.cookie_max_age_days)))
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

/// Find the raw value of cookie `name` in a `Cookie` request header.
///
/// Unparseable pairs are skipped. If the name repeats, the first occurrence wins.
pub fn find_cookie_value(cookie_header: &str, name: &str) -> Option<String> {
    Cookie::split_parse(cookie_header)
        .filter_map(Result::ok)
        .find(|c| c.name() == name)
        .map(|c| c.value().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_cookie_attributes() {
        let config = ResolverConfig::default();
        let cookie = profile_cookie(&config, UserProfile::Senior, true);

        assert_eq!(cookie.name(), "visitor_profile");
        assert_eq!(cookie.value(), "senior");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(Duration::days(365)));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_ne!(cookie.http_only(), Some(true));
    }

    #[test]
    fn test_profile_cookie_lifetime_is_bounded() {
        let mut config = ResolverConfig::default();
        config.cookie_max_age_days = -1;
        assert_eq!(profile_cookie(&config, UserProfile::Familiar, false).max_age(), Some(Duration::days(1)));

        config.cookie_max_age_days = i64::MAX;
        assert_eq!(
            profile_cookie(&config, UserProfile::Familiar, false).max_age(),
            Some(Duration::days(36_500))
        );
    }

    #[test]
    fn test_profile_cookie_insecure_transport() {
        let config = ResolverConfig::default();
        let header = profile_cookie(&config, UserProfile::Jovem, false).to_string();

        assert!(header.starts_with("visitor_profile=jovem"));
        assert!(header.contains("SameSite=Lax"));
        assert!(header.contains("Path=/"));
        assert!(!header.contains("Secure"));
    }

    #[test]
    fn test_find_cookie_value() {
        let header = "theme=dark; visitor_profile=senior; other=1";
        assert_eq!(find_cookie_value(header, "visitor_profile").as_deref(), Some("senior"));
        assert_eq!(find_cookie_value(header, "missing"), None);
    }

    #[test]
    fn test_find_cookie_value_first_wins() {
        let header = "visitor_profile=jovem; visitor_profile=senior";
        assert_eq!(find_cookie_value(header, "visitor_profile").as_deref(), Some("jovem"));
    }

    #[test]
    fn test_find_cookie_value_skips_garbage() {
        let header = "=novalue; ;; visitor_profile=familiar";
        assert_eq!(find_cookie_value(header, "visitor_profile").as_deref(), Some("familiar"));
    }
}
