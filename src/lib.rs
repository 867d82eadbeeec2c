//! # visitor-signals
//!
//! Two small, independent components that tell a personalized site *who* is
//! visiting and *what they do*.
//!
//! ## Profile resolution (edge)
//!
//! ```text
//! ?profile=   →  cookie  →  User-Agent heuristic
//!   (query)      (sticky)      (familiar | jovem | senior)
//!        ↘          ↓          ↙
//!          ProfileDecision → Set-Cookie + Cache-Control + Vary
//! ```
//!
//! The resolver always answers. Any failure while reading the request yields
//! the default profile, never an error response.
//!
//! ## Behavioral telemetry (client)
//!
//! ```text
//! pageview → scroll milestones → clicks → time + exit
//!                  ↓
//!          SessionRecord (persisted every N events and at unload)
//!                  ↓
//!          BehavioralData (pages, dwell time, clicks, device, source)
//! ```
//!
//! ## Guarantees
//!
//! - Same signals → same decision
//! - A valid query override beats a cookie, a valid cookie beats the heuristic
//! - Each scroll milestone is recorded at most once per page load
//! - Storage failures never surface to the caller and never lose in-memory events

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod classifier;
pub mod collector;
pub mod config;
pub mod error;
pub mod observe;
pub mod profile_cookie;
pub mod resolver;
pub mod storage;
pub mod types;

#[cfg(feature = "service")]
pub mod service;

// Re-exports
pub use classifier::{classify, HeuristicClassifier, ProfileClassifier, MAX_USER_AGENT_BYTES};
pub use collector::{
    aggregate, device_info, traffic_source, Clock, CollectorBuilder, ElementInfo, ManualClock,
    PageContext, ScrollPosition, SystemClock, TelemetryCollector,
};
pub use config::{CollectorConfig, Environment, ResolverConfig};
pub use error::{ProfileError, StorageError, TelemetryError};
pub use observe::{
    NoOpObserver, PersistOperation, RecordingObserver, ResolutionObserver, TelemetryObserver,
};
pub use profile_cookie::{find_cookie_value, profile_cookie};
pub use resolver::{
    resolve, ProfileResolution, ProfileResolver, ProfileSignals, RequestParts, VARY_HEADER_VALUE,
};
pub use storage::{FileStorage, MemoryStorage, SessionStorage};
pub use types::{
    BehavioralData, BehavioralEvent, DeviceInfo, DeviceType, EpochMillis, EventPayload, EventType,
    Interaction, PageExit, PageView, ProfileDecision, ProfileSource, ScrollMilestone,
    SessionRecord, TimeOnPage, TrafficSource, UserProfile, Viewport,
};

/// Schema version reported by the edge service health endpoint.
pub const SESSION_SCHEMA_VERSION: &str = "1";
