//! Behavioral event types and the persisted session record.
//!
//! ## Wire Format
//!
//! Events persist as `{ "type": ..., "timestamp": <epoch-ms>, "payload": {...} }`
//! inside a single `{ "events": [...], "sessionStart": <epoch-ms> }` record.
//! The schema is append-only: a stored event whose `type` or payload this build
//! does not understand is skipped on load instead of invalidating the record.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Epoch milliseconds.
pub type EpochMillis = i64;

/// Discriminant of a [`BehavioralEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// A page load.
    #[serde(rename = "pageview")]
    PageView,
    /// A scroll-depth milestone.
    Scroll,
    /// A click on an interactive element.
    Click,
    /// Dwell time on a page.
    Time,
    /// The page was discarded.
    Exit,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PageView => write!(f, "pageview"),
            Self::Scroll => write!(f, "scroll"),
            Self::Click => write!(f, "click"),
            Self::Time => write!(f, "time"),
            Self::Exit => write!(f, "exit"),
        }
    }
}

/// Viewport dimensions in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Viewport {
    /// Viewport width.
    pub width: u32,
    /// Viewport height.
    pub height: u32,
}

impl Viewport {
    /// Create viewport dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Payload of a `pageview` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageView {
    /// Path of the loaded page.
    pub path: String,
    /// Referring URL, if the browser reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    /// Viewport at load time.
    pub viewport: Viewport,
}

/// Payload of a `scroll` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollMilestone {
    /// Path the milestone was reached on.
    pub path: String,
    /// Milestone percentage (25, 50, 75 or 100 by default).
    pub depth: u8,
}

/// Payload of a `click` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    /// Path the click happened on.
    pub path: String,
    /// Lowercase tag name of the interactive element.
    pub element: String,
    /// Truncated visible text of the element.
    pub text: String,
    /// Link target, for links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

/// Payload of a `time` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeOnPage {
    /// Path the time was spent on.
    pub path: String,
    /// Elapsed time since the page loaded.
    pub duration_ms: u64,
}

/// Payload of an `exit` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageExit {
    /// Path being left.
    pub path: String,
    /// Highest scroll percentage reached on the page.
    pub max_scroll: u8,
}

/// Type-specific event data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    /// `pageview`
    PageView(PageView),
    /// `scroll`
    Scroll(ScrollMilestone),
    /// `click`
    Click(Interaction),
    /// `time`
    Time(TimeOnPage),
    /// `exit`
    Exit(PageExit),
}

impl EventPayload {
    /// The discriminant for this payload.
    pub fn event_type(&self) -> EventType {
        match self {
            Self::PageView(_) => EventType::PageView,
            Self::Scroll(_) => EventType::Scroll,
            Self::Click(_) => EventType::Click,
            Self::Time(_) => EventType::Time,
            Self::Exit(_) => EventType::Exit,
        }
    }

    /// Path the event is attributed to.
    pub fn path(&self) -> &str {
        match self {
            Self::PageView(p) => &p.path,
            Self::Scroll(s) => &s.path,
            Self::Click(c) => &c.path,
            Self::Time(t) => &t.path,
            Self::Exit(e) => &e.path,
        }
    }
}

/// Append-only record of one observed browser event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireEvent", try_from = "WireEvent")]
pub struct BehavioralEvent {
    /// When the event was observed.
    pub timestamp: EpochMillis,
    /// What was observed.
    pub payload: EventPayload,
}

impl BehavioralEvent {
    /// Create an event.
    pub fn new(timestamp: EpochMillis, payload: EventPayload) -> Self {
        Self { timestamp, payload }
    }

    /// The event's discriminant.
    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }
}

/// Flat serialized shape of an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireEvent {
    #[serde(rename = "type")]
    event_type: EventType,
    timestamp: EpochMillis,
    payload: serde_json::Value,
}

impl From<BehavioralEvent> for WireEvent {
    fn from(event: BehavioralEvent) -> Self {
        let event_type = event.event_type();
        let payload = match event.payload {
            EventPayload::PageView(p) => serde_json::to_value(p),
            EventPayload::Scroll(s) => serde_json::to_value(s),
            EventPayload::Click(c) => serde_json::to_value(c),
            EventPayload::Time(t) => serde_json::to_value(t),
            EventPayload::Exit(e) => serde_json::to_value(e),
        }
        // Payload structs contain only strings and integers.
        .unwrap_or(serde_json::Value::Null);

        Self {
            event_type,
            timestamp: event.timestamp,
            payload,
        }
    }
}

impl TryFrom<WireEvent> for BehavioralEvent {
    type Error = serde_json::Error;

    fn try_from(wire: WireEvent) -> Result<Self, Self::Error> {
        let payload = match wire.event_type {
            EventType::PageView => EventPayload::PageView(serde_json::from_value(wire.payload)?),
            EventType::Scroll => EventPayload::Scroll(serde_json::from_value(wire.payload)?),
            EventType::Click => EventPayload::Click(serde_json::from_value(wire.payload)?),
            EventType::Time => EventPayload::Time(serde_json::from_value(wire.payload)?),
            EventType::Exit => EventPayload::Exit(serde_json::from_value(wire.payload)?),
        };

        Ok(Self {
            timestamp: wire.timestamp,
            payload,
        })
    }
}

/// The persisted session: ordered event log plus session start time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Events in observation order.
    #[serde(deserialize_with = "deserialize_known_events")]
    pub events: Vec<BehavioralEvent>,
    /// When the session started.
    pub session_start: EpochMillis,
}

impl SessionRecord {
    /// Start an empty session.
    pub fn new(session_start: EpochMillis) -> Self {
        Self {
            events: Vec::new(),
            session_start,
        }
    }
}

/// Keep the events this build understands, in stored order.
///
/// The field itself must still be an array; anything else fails the record.
fn deserialize_known_events<'de, D>(deserializer: D) -> Result<Vec<BehavioralEvent>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect())
}
