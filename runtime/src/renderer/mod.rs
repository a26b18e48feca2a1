//! Browser boundary.
//!
//! The pipeline only talks to a document through [`RenderContext`]. Two
//! implementations exist: a real headless Chromium (`chromium`) and an
//! in-memory document parsed from saved HTML (`snapshot`).

pub mod chromium;
pub mod snapshot;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Opaque handle to an element previously returned by [`RenderContext::locate`].
///
/// Handles are only valid within the context (and page load) that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementRef(pub usize);

/// How to find elements in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// ARIA role plus accessible name (case-insensitive substring match).
    Role { role: String, name: String },
    /// Innermost element whose whitespace-normalized text equals the string exactly.
    Text(String),
    /// CSS selector against the whole document.
    Css(String),
    /// CSS selector scoped to the descendants of an element.
    Within { scope: ElementRef, css: String },
}

impl Locator {
    pub fn role(role: &str, name: &str) -> Self {
        Self::Role {
            role: role.to_string(),
            name: name.to_string(),
        }
    }

    pub fn text(text: &str) -> Self {
        Self::Text(text.to_string())
    }

    pub fn css(selector: &str) -> Self {
        Self::Css(selector.to_string())
    }

    pub fn within(scope: ElementRef, selector: &str) -> Self {
        Self::Within {
            scope,
            css: selector.to_string(),
        }
    }
}

/// Element state that [`RenderContext::wait_for`] can wait on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementState {
    /// Present in the DOM.
    Attached,
    /// Present and rendered with a non-empty box.
    Visible,
}

/// Result of a completed navigation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after redirects.
    pub final_url: String,
    /// Load time in milliseconds.
    pub load_time_ms: u64,
}

/// Interval between polls in the default [`RenderContext::wait_for`].
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A single page of a browser session.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Load `url`, failing if it does not finish within `timeout_ms`.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;

    /// All elements matching `locator`, in document order.
    async fn locate(&mut self, locator: &Locator) -> Result<Vec<ElementRef>>;

    /// Raw `textContent` of an element; `None` if it has none or has gone away.
    async fn text_of(&self, element: ElementRef) -> Result<Option<String>>;

    /// Whether the element is currently rendered.
    async fn is_visible(&self, element: ElementRef) -> Result<bool>;

    /// Activate the element, bypassing actionability checks.
    async fn click(&mut self, element: ElementRef) -> Result<()>;

    /// Wait until the first element matching `locator` reaches `state`.
    ///
    /// Returns `Ok(None)` on timeout; errors are reserved for a broken document.
    async fn wait_for(
        &mut self,
        locator: &Locator,
        state: ElementState,
        timeout: Duration,
    ) -> Result<Option<ElementRef>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(&first) = self.locate(locator).await?.first() {
                let reached = match state {
                    ElementState::Attached => true,
                    ElementState::Visible => self.is_visible(first).await?,
                };
                if reached {
                    return Ok(Some(first));
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Release the page.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Something that can open fresh document contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
}

/// Collapse runs of whitespace and trim, the way accessible names are computed.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
