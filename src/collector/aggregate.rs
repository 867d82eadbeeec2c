//! Derivation of [`BehavioralData`] from an event log.
//!
//! Everything here is recomputed per call; nothing is cached.

use std::collections::{BTreeMap, BTreeSet};

use url::Url;

use super::page::PageContext;
use crate::types::{
    BehavioralData, BehavioralEvent, DeviceInfo, DeviceType, EventPayload, TrafficSource,
};

/// How a referrer host is recognised.
enum HostMatch {
    /// Any dot-separated label equals this (`google` matches `www.google.com.br`).
    Label(&'static str),
    /// The host is this domain or a subdomain of it.
    Domain(&'static str),
}

impl HostMatch {
    fn matches(&self, host: &str) -> bool {
        match self {
            Self::Label(label) => host.split('.').any(|l| l == *label),
            Self::Domain(domain) => {
                host == *domain
                    || host
                        .strip_suffix(domain)
                        .is_some_and(|prefix| prefix.ends_with('.'))
            }
        }
    }
}

const SEARCH_ENGINES: &[(&str, HostMatch)] = &[
    ("google", HostMatch::Label("google")),
    ("bing", HostMatch::Domain("bing.com")),
    ("yahoo", HostMatch::Label("yahoo")),
    ("duckduckgo", HostMatch::Domain("duckduckgo.com")),
    ("baidu", HostMatch::Domain("baidu.com")),
    ("yandex", HostMatch::Label("yandex")),
    ("ecosia", HostMatch::Domain("ecosia.org")),
];

const SOCIAL_PLATFORMS: &[(&str, HostMatch)] = &[
    ("facebook", HostMatch::Domain("facebook.com")),
    ("facebook", HostMatch::Domain("fb.com")),
    ("facebook", HostMatch::Domain("fb.me")),
    ("instagram", HostMatch::Domain("instagram.com")),
    ("twitter", HostMatch::Domain("twitter.com")),
    ("twitter", HostMatch::Domain("x.com")),
    ("twitter", HostMatch::Domain("t.co")),
    ("linkedin", HostMatch::Domain("linkedin.com")),
    ("linkedin", HostMatch::Domain("lnkd.in")),
    ("tiktok", HostMatch::Domain("tiktok.com")),
    ("youtube", HostMatch::Domain("youtube.com")),
    ("youtube", HostMatch::Domain("youtu.be")),
    ("pinterest", HostMatch::Label("pinterest")),
    ("whatsapp", HostMatch::Domain("whatsapp.com")),
    ("whatsapp", HostMatch::Domain("wa.me")),
];

/// Fold an event log into the scoring engine's input.
///
/// `page` is the current page load; without one the device is derived from an
/// empty User-Agent and traffic counts as direct.
pub fn aggregate(events: &[BehavioralEvent], page: Option<&PageContext>) -> BehavioralData {
    let mut pages_visited = BTreeSet::new();
    let mut time_on_pages: BTreeMap<String, u64> = BTreeMap::new();
    let mut interactions = Vec::new();

    for event in events {
        match &event.payload {
            EventPayload::PageView(view) => {
                pages_visited.insert(view.path.clone());
            }
            EventPayload::Time(time) => {
                let total = time_on_pages.entry(time.path.clone()).or_insert(0);
                *total = total.saturating_add(time.duration_ms);
            }
            EventPayload::Click(_) => interactions.push(event.clone()),
            EventPayload::Scroll(_) | EventPayload::Exit(_) => {}
        }
    }

    BehavioralData {
        pages_visited,
        time_on_pages,
        interactions,
        device_info: device_info(page.map_or("", PageContext::user_agent)),
        traffic_source: page.map_or_else(TrafficSource::direct, traffic_source),
    }
}

/// Classify device, browser and OS by substring matching.
pub fn device_info(user_agent: &str) -> DeviceInfo {
    let ua = user_agent.to_ascii_lowercase();
    let has = |needle: &str| ua.contains(needle);

    let device_type = if ["mobi", "android", "iphone", "ipad", "ipod"].iter().any(|n| has(*n)) {
        DeviceType::Mobile
    } else {
        DeviceType::Desktop
    };

    // Order matters: Edge and Opera also claim Chrome, Chrome also claims Safari.
    let browser = if has("edg/") || has("edge/") || has("edga/") || has("edgios/") {
        "Edge"
    } else if has("opr/") || has("opera") {
        "Opera"
    } else if has("samsungbrowser") {
        "Samsung Internet"
    } else if has("chrome/") || has("crios/") {
        "Chrome"
    } else if has("firefox/") || has("fxios/") {
        "Firefox"
    } else if has("safari/") {
        "Safari"
    } else if has("msie") || has("trident/") {
        "Internet Explorer"
    } else {
        "Other"
    };

    // iOS before macOS ("like Mac OS X"), Android before Linux.
    let os = if has("windows") {
        "Windows"
    } else if has("iphone") || has("ipad") || has("ipod") {
        "iOS"
    } else if has("android") {
        "Android"
    } else if has("mac os x") || has("macintosh") {
        "macOS"
    } else if has("cros ") {
        "ChromeOS"
    } else if has("linux") {
        "Linux"
    } else {
        "Other"
    };

    DeviceInfo {
        device_type,
        browser: browser.to_string(),
        os: os.to_string(),
    }
}

/// Attribute the current page load.
///
/// Campaign parameters win; otherwise the referrer is bucketed into direct,
/// search, social or generic referral.
pub fn traffic_source(page: &PageContext) -> TrafficSource {
    let referrer = page.referrer().map(str::to_string);
    let campaign = page.query_param("utm_campaign");

    if let Some(source) = page.query_param("utm_source") {
        return TrafficSource {
            referrer,
            source,
            medium: page
                .query_param("utm_medium")
                .unwrap_or_else(|| "unknown".to_string()),
            campaign,
        };
    }
    if page.query_param("gclid").is_some() {
        return TrafficSource {
            referrer,
            source: "google".to_string(),
            medium: "cpc".to_string(),
            campaign,
        };
    }
    if page.query_param("fbclid").is_some() {
        return TrafficSource {
            referrer,
            source: "facebook".to_string(),
            medium: "paid_social".to_string(),
            campaign,
        };
    }

    let Some(raw) = referrer.as_deref() else {
        return TrafficSource {
            campaign,
            ..TrafficSource::direct()
        };
    };

    let host = Url::parse(raw)
        .ok()
        .and_then(|url| url.host_str().map(|h| h.trim_start_matches("www.").to_ascii_lowercase()));

    let (source, medium) = match host {
        Some(host) => {
            if let Some((name, _)) = SEARCH_ENGINES.iter().find(|(_, m)| m.matches(&host)) {
                (name.to_string(), "organic")
            } else if let Some((name, _)) = SOCIAL_PLATFORMS.iter().find(|(_, m)| m.matches(&host)) {
                (name.to_string(), "social")
            } else {
                (host, "referral")
            }
        }
        None => ("unknown".to_string(), "referral"),
    };

    TrafficSource {
        referrer,
        source,
        medium: medium.to_string(),
        campaign,
    }
}
