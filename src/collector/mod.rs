//! Single-session behavioral telemetry collector.
//!
//! ## Lifecycle
//!
//! ```text
//! build() ─ rehydrate from storage (or start fresh)
//!    │
//!    ├─ begin_page(ctx)    → pageview
//!    ├─ on_scroll(pos)     → scroll, once per milestone per page
//!    ├─ on_click(chain)    → click, interactive elements only
//!    └─ end_page()         → time + exit, then unconditional flush
//! ```
//!
//! The log is also flushed whenever its length reaches a multiple of
//! `flush_every`. Storage failures never escape: they go to the
//! [`TelemetryObserver`] and the in-memory log keeps working.
//!
//! One collector owns one session. Construct it once per browser context and
//! pass it to whatever drives the event listeners; tests build as many
//! isolated instances as they like.

pub mod aggregate;
pub mod clock;
pub mod page;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::CollectorConfig;
use crate::error::StorageError;
use crate::observe::{NoOpObserver, PersistOperation, TelemetryObserver};
use crate::storage::SessionStorage;
use crate::types::{
    BehavioralData, BehavioralEvent, EpochMillis, EventPayload, Interaction, PageExit, PageView,
    ScrollMilestone, SessionRecord, TimeOnPage,
};

pub use aggregate::{aggregate, device_info, traffic_source};
pub use clock::{Clock, ManualClock, SystemClock};
pub use page::{ElementInfo, PageContext, ScrollPosition, INTERACTIVE_ROLES};

/// State scoped to the current page load.
#[derive(Debug, Clone)]
struct PageState {
    context: PageContext,
    loaded_at: EpochMillis,
    max_scroll: u8,
    /// Index of the next milestone not yet emitted.
    next_milestone: usize,
    ended: bool,
}

/// Builder for [`TelemetryCollector`].
pub struct CollectorBuilder {
    storage: Arc<dyn SessionStorage>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn TelemetryObserver>,
    config: CollectorConfig,
}

impl CollectorBuilder {
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn TelemetryObserver>) -> Self {
        self.observer = observer;
        self
    }

    #[must_use]
    pub fn config(mut self, config: CollectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Rehydrate the session from storage, or start a fresh one.
    pub fn build(self) -> TelemetryCollector {
        let session = rehydrate(
            self.storage.as_ref(),
            &self.config.storage_key,
            self.observer.as_ref(),
        )
        .unwrap_or_else(|| SessionRecord::new(self.clock.now_millis()));

        TelemetryCollector {
            storage: self.storage,
            clock: self.clock,
            observer: self.observer,
            config: self.config,
            session,
            page: None,
        }
    }
}

/// Accumulates one browser session's behavioral events.
pub struct TelemetryCollector {
    storage: Arc<dyn SessionStorage>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn TelemetryObserver>,
    config: CollectorConfig,
    session: SessionRecord,
    page: Option<PageState>,
}

impl TelemetryCollector {
    /// Start building a collector over `storage`.
    ///
    /// Defaults: system clock, no-op observer, default config.
    pub fn builder(storage: Arc<dyn SessionStorage>) -> CollectorBuilder {
        CollectorBuilder {
            storage,
            clock: Arc::new(SystemClock),
            observer: Arc::new(NoOpObserver),
            config: CollectorConfig::default(),
        }
    }

    /// Build with all defaults.
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self::builder(storage).build()
    }

    /// Record a page load.
    ///
    /// If the previous page was never ended (client-side navigation), it is
    /// ended first so its dwell time is not lost.
    pub fn begin_page(&mut self, context: PageContext) {
        if self.page.as_ref().is_some_and(|page| !page.ended) {
            self.end_page();
        }

        let payload = EventPayload::PageView(PageView {
            path: context.path().to_string(),
            referrer: context.referrer().map(str::to_string),
            viewport: context.viewport(),
        });
        let loaded_at = self.record(payload);

        self.page = Some(PageState {
            context,
            loaded_at,
            max_scroll: 0,
            next_milestone: 0,
            ended: false,
        });
    }

    /// Observe a scroll event.
    pub fn on_scroll(&mut self, position: ScrollPosition) {
        self.record_scroll_percent(position.percent());
    }

    /// Observe a scroll percentage (`0..=100`, larger values are clamped).
    ///
    /// Tracks the running maximum and appends one `scroll` event the first
    /// time it reaches each milestone, in ascending order.
    pub fn record_scroll_percent(&mut self, percent: u8) {
        let percent = percent.min(100);

        let (path, reached) = {
            let Some(page) = self.page.as_mut().filter(|page| !page.ended) else {
                return;
            };
            page.max_scroll = page.max_scroll.max(percent);

            let mut reached = Vec::new();
            while let Some(&milestone) = self.config.scroll_milestones.get(page.next_milestone) {
                if page.max_scroll < milestone {
                    break;
                }
                reached.push(milestone);
                page.next_milestone += 1;
            }
            (page.context.path().to_string(), reached)
        };

        for depth in reached {
            self.record(EventPayload::Scroll(ScrollMilestone {
                path: path.clone(),
                depth,
            }));
        }
    }

    /// Observe a click.
    ///
    /// `chain` runs from the click target up to the root. The closest
    /// interactive element is recorded; clicks with none are ignored.
    /// Returns whether an event was recorded.
    pub fn on_click(&mut self, chain: &[ElementInfo]) -> bool {
        let Some(path) = self.current_path().map(str::to_string) else {
            return false;
        };
        let Some(element) = chain.iter().find(|element| element.is_interactive()) else {
            return false;
        };

        self.record(EventPayload::Click(Interaction {
            path,
            element: element.tag.trim().to_ascii_lowercase(),
            text: page::snippet(&element.text, self.config.click_text_limit),
            href: element.href.clone(),
        }));
        true
    }

    /// The page is being discarded (navigation away, tab close).
    ///
    /// Appends `time` and `exit` for the open page, then flushes the whole
    /// session regardless of the throttle.
    pub fn end_page(&mut self) {
        let now = self.clock.now_millis();
        let closing = self
            .page
            .as_mut()
            .filter(|page| !page.ended)
            .map(|page| {
                page.ended = true;
                (
                    page.context.path().to_string(),
                    now.saturating_sub(page.loaded_at).max(0) as u64,
                    page.max_scroll,
                )
            });

        if let Some((path, duration_ms, max_scroll)) = closing {
            self.record(EventPayload::Time(TimeOnPage {
                path: path.clone(),
                duration_ms,
            }));
            self.record(EventPayload::Exit(PageExit { path, max_scroll }));
        }

        self.flush();
    }

    /// Write the session to storage now. Returns whether the write succeeded.
    pub fn flush(&self) -> bool {
        let result = serde_json::to_string(&self.session)
            .map_err(StorageError::from)
            .and_then(|json| self.storage.save(&self.config.storage_key, &json));

        match result {
            Ok(()) => {
                self.observer.on_persisted(self.session.events.len());
                true
            }
            Err(error) => {
                warn!(
                    target: "visitor_signals::collector",
                    error = %error,
                    event_count = self.session.events.len(),
                    "failed to persist behavioral session"
                );
                self.observer.on_storage_error(PersistOperation::Save, &error);
                false
            }
        }
    }

    /// Aggregate the session for the scoring engine.
    pub fn analytics(&self) -> BehavioralData {
        aggregate(
            &self.session.events,
            self.page.as_ref().map(|page| &page.context),
        )
    }

    /// Drop the event log and the persisted record, starting a new session.
    ///
    /// The open page is closed without recording anything: its pageview is
    /// gone, so later scrolls, clicks and `end_page` for it are ignored until
    /// the next [`begin_page`](Self::begin_page). Its context still feeds
    /// device and traffic attribution in [`analytics`](Self::analytics).
    pub fn clear(&mut self) {
        self.session = SessionRecord::new(self.clock.now_millis());
        if let Some(page) = self.page.as_mut() {
            page.ended = true;
        }

        if let Err(error) = self.storage.remove(&self.config.storage_key) {
            warn!(
                target: "visitor_signals::collector",
                error = %error,
                "failed to remove behavioral session"
            );
            self.observer.on_storage_error(PersistOperation::Remove, &error);
        }
    }

    /// Events in observation order.
    pub fn events(&self) -> &[BehavioralEvent] {
        &self.session.events
    }

    /// When the session started.
    pub fn session_start(&self) -> EpochMillis {
        self.session.session_start
    }

    /// Path of the open page, if any.
    pub fn current_path(&self) -> Option<&str> {
        self.page
            .as_ref()
            .filter(|page| !page.ended)
            .map(|page| page.context.path())
    }

    /// Highest scroll percentage reached on the open page.
    pub fn max_scroll(&self) -> u8 {
        self.page.as_ref().map_or(0, |page| page.max_scroll)
    }

    /// Append an event and return its timestamp.
    ///
    /// Timestamps never go backwards within the log even if the clock does.
    fn record(&mut self, payload: EventPayload) -> EpochMillis {
        let now = self.clock.now_millis();
        let timestamp = self
            .session
            .events
            .last()
            .map_or(now, |last| now.max(last.timestamp));

        self.session.events.push(BehavioralEvent::new(timestamp, payload));

        if self.session.events.len() % self.config.flush_every.max(1) == 0 {
            self.flush();
        }
        timestamp
    }
}

/// Load the stored session. `None` means start fresh.
fn rehydrate(
    storage: &dyn SessionStorage,
    key: &str,
    observer: &dyn TelemetryObserver,
) -> Option<SessionRecord> {
    let raw = match storage.load(key) {
        Ok(raw) => raw?,
        Err(error) => {
            warn!(
                target: "visitor_signals::collector",
                error = %error,
                "behavioral session storage unavailable, starting fresh"
            );
            observer.on_storage_error(PersistOperation::Load, &error);
            return None;
        }
    };

    match serde_json::from_str::<SessionRecord>(&raw) {
        Ok(record) => {
            debug!(
                target: "visitor_signals::collector",
                event_count = record.events.len(),
                session_start = record.session_start,
                "behavioral session rehydrated"
            );
            Some(record)
        }
        Err(error) => {
            debug!(
                target: "visitor_signals::collector",
                error = %error,
                "discarding malformed behavioral session"
            );
            observer.on_record_discarded(&error.to_string());
            None
        }
    }
}
