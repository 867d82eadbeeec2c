//! Aggregate telemetry view handed to the scoring engine.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::event::BehavioralEvent;

/// Coarse device form factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// Phones and tablets.
    Mobile,
    /// Everything else.
    Desktop,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mobile => write!(f, "mobile"),
            Self::Desktop => write!(f, "desktop"),
        }
    }
}

/// Device description derived from the User-Agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Form factor.
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    /// Browser family (`Chrome`, `Safari`, ...; `Other` when unknown).
    pub browser: String,
    /// OS family (`Windows`, `iOS`, ...; `Other` when unknown).
    pub os: String,
}

/// Where the current page load came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficSource {
    /// Document referrer, when present.
    pub referrer: Option<String>,
    /// Source bucket (`direct`, search engine, social platform, referring host or `utm_source`).
    pub source: String,
    /// Medium (`none`, `organic`, `social`, `referral` or `utm_medium`).
    pub medium: String,
    /// Campaign name from `utm_campaign`.
    pub campaign: Option<String>,
}

impl TrafficSource {
    /// No referrer and no campaign parameters.
    pub fn direct() -> Self {
        Self {
            referrer: None,
            source: "direct".to_string(),
            medium: "none".to_string(),
            campaign: None,
        }
    }
}

/// Aggregate computed on demand from the session's event log.
///
/// This is the whole input contract of the external scoring engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehavioralData {
    /// Unique paths with a `pageview`.
    pub pages_visited: BTreeSet<String>,
    /// Accumulated dwell time per path, in milliseconds.
    pub time_on_pages: BTreeMap<String, u64>,
    /// All `click` events, in observation order.
    pub interactions: Vec<BehavioralEvent>,
    /// Current device.
    pub device_info: DeviceInfo,
    /// Current traffic source.
    pub traffic_source: TrafficSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_info_serializes_type_key() {
        let info = DeviceInfo {
            device_type: DeviceType::Mobile,
            browser: "Safari".to_string(),
            os: "iOS".to_string(),
        };
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value["type"], "mobile");
    }

    #[test]
    fn test_direct_traffic() {
        let direct = TrafficSource::direct();
        assert_eq!(direct.source, "direct");
        assert!(direct.referrer.is_none());
    }
}
