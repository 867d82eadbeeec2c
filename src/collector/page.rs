//! Host-supplied descriptions of the page, scroll position and clicked elements.
//!
//! The collector never touches browser APIs itself; the embedding host (a
//! WebAssembly shim, a test, a native webview) translates DOM events into these.

use url::Url;

use crate::error::TelemetryError;
use crate::types::Viewport;

/// ARIA roles treated as interactive.
pub const INTERACTIVE_ROLES: &[&str] = &[
    "button", "link", "menuitem", "tab", "checkbox", "radio", "switch", "option",
];

/// The current page load.
#[derive(Debug, Clone, PartialEq)]
pub struct PageContext {
    url: Url,
    referrer: Option<String>,
    viewport: Viewport,
    user_agent: String,
}

impl PageContext {
    /// Describe a page by its full URL (`location.href`).
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::InvalidUrl`] if `href` is not an absolute URL.
    pub fn parse(href: &str) -> Result<Self, TelemetryError> {
        let url = Url::parse(href).map_err(|source| TelemetryError::InvalidUrl {
            url: href.to_string(),
            source,
        })?;
        Ok(Self {
            url,
            referrer: None,
            viewport: Viewport::default(),
            user_agent: String::new(),
        })
    }

    /// Set `document.referrer`. An empty string means no referrer.
    #[must_use]
    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        let referrer = referrer.into();
        self.referrer = (!referrer.trim().is_empty()).then_some(referrer);
        self
    }

    #[must_use]
    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Page path.
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Full page URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Referring URL, if any.
    pub fn referrer(&self) -> Option<&str> {
        self.referrer.as_deref()
    }

    /// Viewport at load time.
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Browser User-Agent.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// First non-empty value of a query parameter on the page URL.
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, value)| key == name && !value.trim().is_empty())
            .map(|(_, value)| value.into_owned())
    }
}

/// A scroll observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollPosition {
    /// Vertical scroll offset (`scrollY`).
    pub offset: f64,
    /// Visible height (`innerHeight`).
    pub viewport_height: f64,
    /// Full document height (`scrollHeight`).
    pub document_height: f64,
}

impl ScrollPosition {
    /// Create a scroll observation.
    pub fn new(offset: f64, viewport_height: f64, document_height: f64) -> Self {
        Self {
            offset,
            viewport_height,
            document_height,
        }
    }

    /// Scrolled percentage of the scrollable distance, floored, in `0..=100`.
    ///
    /// A document that fits the viewport counts as fully scrolled.
    pub fn percent(&self) -> u8 {
        let scrollable = self.document_height - self.viewport_height;
        if !scrollable.is_finite() || !self.offset.is_finite() {
            return 0;
        }
        if scrollable <= 0.0 {
            return 100;
        }
        ((self.offset / scrollable) * 100.0).floor().clamp(0.0, 100.0) as u8
    }
}

/// One element in a click's target-to-root chain.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ElementInfo {
    /// Tag name (any case).
    pub tag: String,
    /// Explicit `role` attribute.
    pub role: Option<String>,
    /// Visible text content.
    pub text: String,
    /// Link target.
    pub href: Option<String>,
}

impl ElementInfo {
    /// An element with only a tag name.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    #[must_use]
    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.href = Some(href.into());
        self
    }

    /// Links, buttons and elements with an interactive ARIA role.
    pub fn is_interactive(&self) -> bool {
        let tag = self.tag.trim();
        if tag.eq_ignore_ascii_case("a") || tag.eq_ignore_ascii_case("button") {
            return true;
        }
        self.role.as_deref().is_some_and(|role| {
            let role = role.trim();
            INTERACTIVE_ROLES.iter().any(|r| r.eq_ignore_ascii_case(role))
        })
    }
}

/// First `limit` characters of `text` with whitespace runs collapsed.
pub(crate) fn snippet(text: &str, limit: usize) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(limit)
        .collect()
}
