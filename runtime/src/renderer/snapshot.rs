//! In-memory document over a saved copy of a page.
//!
//! Used for offline replay (`--snapshot`) and as the document in tests.
//! The HTML is reparsed on every query, so the context stays `Send + Sync`.
//! Elements are addressed by their position in document order.
//!
//! Visibility follows the static markup: an element is hidden when it or an
//! ancestor carries `hidden`, `display: none` or `visibility: hidden`.
//! Clicking an element with `aria-controls` toggles the hidden state of the
//! controlled element, which is how disclosure panels behave on the live page.

use super::{
    normalize_whitespace, ElementRef, ElementState, Locator, NavigationResult, RenderContext,
    Renderer,
};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Serves one saved document for every URL.
pub struct SnapshotRenderer {
    html: Option<String>,
    clicks: Arc<AtomicUsize>,
}

impl SnapshotRenderer {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: Some(html.into()),
            clicks: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Read the document from a saved HTML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let html = std::fs::read_to_string(path)
            .with_context(|| format!("reading snapshot {}", path.display()))?;
        Ok(Self::new(html))
    }

    /// A renderer whose navigations always fail.
    pub fn unreachable() -> Self {
        Self {
            html: None,
            clicks: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Total clicks performed across all contexts.
    pub fn clicks(&self) -> usize {
        self.clicks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Renderer for SnapshotRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        Ok(Box::new(SnapshotContext {
            source: self.html.clone(),
            loaded: false,
            toggled: HashSet::new(),
            clicks: Arc::clone(&self.clicks),
        }))
    }
}

/// A page backed by static HTML.
pub struct SnapshotContext {
    source: Option<String>,
    loaded: bool,
    /// Elements whose own hidden state has been flipped by a click.
    toggled: HashSet<usize>,
    clicks: Arc<AtomicUsize>,
}

impl SnapshotContext {
    /// A context that already has `html` loaded.
    pub fn loaded(html: impl Into<String>) -> Self {
        Self {
            source: Some(html.into()),
            loaded: true,
            toggled: HashSet::new(),
            clicks: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Clicks performed in this context.
    pub fn clicks(&self) -> usize {
        self.clicks.load(Ordering::SeqCst)
    }

    fn document(&self) -> Result<Document> {
        match (&self.source, self.loaded) {
            (Some(html), true) => Ok(Document::parse(html)),
            _ => bail!("no document loaded"),
        }
    }
}

#[async_trait]
impl RenderContext for SnapshotContext {
    async fn navigate(&mut self, url: &str, _timeout_ms: u64) -> Result<NavigationResult> {
        if self.source.is_none() {
            bail!("net::ERR_NAME_NOT_RESOLVED at {url}");
        }
        self.loaded = true;
        self.toggled.clear();
        Ok(NavigationResult {
            final_url: url.to_string(),
            load_time_ms: 0,
        })
    }

    async fn locate(&mut self, locator: &Locator) -> Result<Vec<ElementRef>> {
        let doc = self.document()?;
        doc.locate(locator)
    }

    async fn text_of(&self, element: ElementRef) -> Result<Option<String>> {
        let doc = self.document()?;
        Ok(doc.text_of(element.0))
    }

    async fn is_visible(&self, element: ElementRef) -> Result<bool> {
        let doc = self.document()?;
        Ok(doc.is_visible(element.0, &self.toggled))
    }

    async fn click(&mut self, element: ElementRef) -> Result<()> {
        let doc = self.document()?;
        let controls = doc
            .attr(element.0, "aria-controls")
            .ok_or_else(|| anyhow!("element {} is not in the document", element.0))?;
        self.clicks.fetch_add(1, Ordering::SeqCst);

        if let Some(target_id) = controls {
            if let Some(target) = doc.by_id(&target_id) {
                if !self.toggled.remove(&target) {
                    self.toggled.insert(target);
                }
                debug!("toggled #{target_id}");
            }
        }
        Ok(())
    }

    // The markup never changes on its own, so a single check is conclusive.
    async fn wait_for(
        &mut self,
        locator: &Locator,
        state: ElementState,
        _timeout: Duration,
    ) -> Result<Option<ElementRef>> {
        let Some(&first) = self.locate(locator).await?.first() else {
            return Ok(None);
        };
        let reached = match state {
            ElementState::Attached => true,
            ElementState::Visible => self.is_visible(first).await?,
        };
        Ok(reached.then_some(first))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// One parse of the snapshot.
struct Document {
    html: Html,
}

impl Document {
    fn parse(source: &str) -> Self {
        Self {
            html: Html::parse_document(source),
        }
    }

    fn elements(&self) -> Vec<scraper::ElementRef<'_>> {
        self.html
            .root_element()
            .descendants()
            .filter_map(scraper::ElementRef::wrap)
            .collect()
    }

    fn locate(&self, locator: &Locator) -> Result<Vec<ElementRef>> {
        let elements = self.elements();
        let ordinals: HashMap<_, usize> = elements
            .iter()
            .enumerate()
            .map(|(i, el)| (el.id(), i))
            .collect();
        let to_ref = |el: scraper::ElementRef| ordinals.get(&el.id()).copied().map(ElementRef);

        let found: Vec<ElementRef> = match locator {
            Locator::Role { role, name } => {
                let name = name.to_lowercase();
                elements
                    .iter()
                    .filter(|el| has_role(el, role))
                    .filter(|el| accessible_name(el).to_lowercase().contains(&name))
                    .filter_map(|el| to_ref(*el))
                    .collect()
            }
            Locator::Text(want) => elements
                .iter()
                .filter(|el| normalize_whitespace(&el.text().collect::<String>()) == *want)
                .filter(|el| {
                    !el.children()
                        .filter_map(scraper::ElementRef::wrap)
                        .any(|c| normalize_whitespace(&c.text().collect::<String>()) == *want)
                })
                .filter_map(|el| to_ref(*el))
                .collect(),
            Locator::Css(css) => {
                let selector = parse_selector(css)?;
                self.html.select(&selector).filter_map(to_ref).collect()
            }
            Locator::Within { scope, css } => {
                let selector = parse_selector(css)?;
                match elements.get(scope.0) {
                    Some(el) => el.select(&selector).filter_map(to_ref).collect(),
                    None => Vec::new(),
                }
            }
        };
        Ok(found)
    }

    fn text_of(&self, ordinal: usize) -> Option<String> {
        self.elements()
            .get(ordinal)
            .map(|el| el.text().collect::<String>())
    }

    /// `None` if the element does not exist, else the attribute value if present.
    fn attr(&self, ordinal: usize, name: &str) -> Option<Option<String>> {
        self.elements()
            .get(ordinal)
            .map(|el| el.value().attr(name).map(String::from))
    }

    fn by_id(&self, id: &str) -> Option<usize> {
        self.elements()
            .iter()
            .position(|el| el.value().id() == Some(id))
    }

    fn is_visible(&self, ordinal: usize, toggled: &HashSet<usize>) -> bool {
        let elements = self.elements();
        let ordinals: HashMap<_, usize> = elements
            .iter()
            .enumerate()
            .map(|(i, el)| (el.id(), i))
            .collect();
        let Some(el) = elements.get(ordinal) else {
            return false;
        };

        let hidden = |candidate: &scraper::ElementRef<'_>| {
            let own = hides_itself(candidate);
            let flipped = ordinals
                .get(&candidate.id())
                .is_some_and(|i| toggled.contains(i));
            own != flipped
        };

        if hidden(el) {
            return false;
        }
        !el.ancestors()
            .filter_map(scraper::ElementRef::wrap)
            .any(|ancestor| hidden(&ancestor))
    }
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector {css:?}: {e}"))
}

fn has_role(el: &scraper::ElementRef<'_>, role: &str) -> bool {
    let value = el.value();
    if value.attr("role") == Some(role) {
        return true;
    }
    match role {
        "button" => {
            value.name() == "button"
                || value.name() == "summary"
                || (value.name() == "input"
                    && matches!(value.attr("type"), Some("button") | Some("submit")))
        }
        "link" => value.name() == "a" && value.attr("href").is_some(),
        "table" => value.name() == "table",
        "heading" => matches!(value.name(), "h1" | "h2" | "h3" | "h4" | "h5" | "h6"),
        _ => false,
    }
}

fn accessible_name(el: &scraper::ElementRef<'_>) -> String {
    if let Some(label) = el.value().attr("aria-label") {
        return normalize_whitespace(label);
    }
    let text = normalize_whitespace(&el.text().collect::<String>());
    if !text.is_empty() {
        return text;
    }
    normalize_whitespace(el.value().attr("value").unwrap_or(""))
}

fn hides_itself(el: &scraper::ElementRef<'_>) -> bool {
    let value = el.value();
    if value.attr("hidden").is_some() {
        return true;
    }
    let style: String = value
        .attr("style")
        .unwrap_or("")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    style.contains("display:none") || style.contains("visibility:hidden")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <button aria-controls="panel">Verify your download</button>
          <div id="panel" hidden>
            <h3>Hash values for the ISO files</h3>
            <table><tbody><tr><td>English</td><td>AA</td></tr></tbody></table>
          </div>
          <p style="display: none">ghost</p>
        </body></html>
    "#;

    #[tokio::test]
    async fn test_locate_by_role_is_case_insensitive() {
        let mut ctx = SnapshotContext::loaded(PAGE);
        let found = ctx
            .locate(&Locator::role("button", "verify YOUR download"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_text_locator_picks_innermost() {
        let mut ctx = SnapshotContext::loaded(PAGE);
        let found = ctx
            .locate(&Locator::text("Hash values for the ISO files"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        let text = ctx.text_of(found[0]).await.unwrap().unwrap();
        assert_eq!(text, "Hash values for the ISO files");
    }

    #[tokio::test]
    async fn test_click_toggles_controlled_panel() {
        let mut ctx = SnapshotContext::loaded(PAGE);
        let heading = ctx
            .locate(&Locator::text("Hash values for the ISO files"))
            .await
            .unwrap()[0];
        assert!(!ctx.is_visible(heading).await.unwrap());

        let button = ctx
            .locate(&Locator::role("button", "Verify your download"))
            .await
            .unwrap()[0];
        ctx.click(button).await.unwrap();
        assert!(ctx.is_visible(heading).await.unwrap());

        ctx.click(button).await.unwrap();
        assert!(!ctx.is_visible(heading).await.unwrap());
        assert_eq!(ctx.clicks(), 2);
    }

    #[tokio::test]
    async fn test_inline_display_none_is_hidden() {
        let mut ctx = SnapshotContext::loaded(PAGE);
        let ghost = ctx.locate(&Locator::text("ghost")).await.unwrap()[0];
        assert!(!ctx.is_visible(ghost).await.unwrap());
    }

    #[tokio::test]
    async fn test_scoped_css() {
        let mut ctx = SnapshotContext::loaded(PAGE);
        let table = ctx.locate(&Locator::css("table")).await.unwrap()[0];
        let cells = ctx
            .locate(&Locator::within(table, "tbody tr td"))
            .await
            .unwrap();
        assert_eq!(cells.len(), 2);
        assert_eq!(ctx.text_of(cells[1]).await.unwrap().as_deref(), Some("AA"));
    }

    #[tokio::test]
    async fn test_wait_for_missing_element_times_out_immediately() {
        let mut ctx = SnapshotContext::loaded(PAGE);
        let result = ctx
            .wait_for(
                &Locator::role("button", "Download now"),
                ElementState::Attached,
                Duration::from_secs(10),
            )
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_renderer_fails_navigation() {
        let renderer = SnapshotRenderer::unreachable();
        let mut ctx = renderer.new_context().await.unwrap();
        assert!(ctx.navigate("https://example.com", 1_000).await.is_err());
    }

    #[tokio::test]
    async fn test_queries_before_navigation_fail() {
        let renderer = SnapshotRenderer::new(PAGE);
        let mut ctx = renderer.new_context().await.unwrap();
        assert!(ctx.locate(&Locator::css("table")).await.is_err());
        ctx.navigate("https://example.com", 1_000).await.unwrap();
        assert_eq!(ctx.locate(&Locator::css("table")).await.unwrap().len(), 1);
    }
}
