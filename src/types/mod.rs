//! Core types for visitor profiling and behavioral telemetry.

pub mod profile;
pub mod event;
pub mod analytics;

pub use profile::{UserProfile, ProfileSource, ProfileDecision};
pub use event::{
    BehavioralEvent, EventPayload, EventType, EpochMillis, SessionRecord,
    PageView, ScrollMilestone, Interaction, TimeOnPage, PageExit, Viewport,
};
pub use analytics::{BehavioralData, DeviceInfo, DeviceType, TrafficSource};
