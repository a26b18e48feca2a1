//! Headless Chromium over the DevTools protocol.
//!
//! DOM access is done by evaluating small scripts in the page. Located
//! elements are kept in a page-global registry (`window.__isohashRefs`) and
//! addressed by index, which is what [`ElementRef`] carries.

use super::{ElementRef, Locator, NavigationResult, RenderContext, Renderer};
use crate::config::BrowserSettings;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::Page;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

/// Shared helpers prepended to every locate script.
const PRELUDE: &str = r#"
    const reg = (window.__isohashRefs = window.__isohashRefs || []);
    const register = (els) => els.map((el) => {
        let i = reg.indexOf(el);
        if (i < 0) { i = reg.length; reg.push(el); }
        return i;
    });
    const norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
"#;

/// A running Chromium process.
pub struct ChromiumRenderer {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
    user_agent: String,
}

impl ChromiumRenderer {
    /// Launch Chromium according to `settings`.
    pub async fn launch(settings: &BrowserSettings) -> Result<Self> {
        let executable = match &settings.chromium_path {
            Some(path) => path.clone(),
            None => find_chromium()
                .context("Chromium not found; install it or set ISOHASH_CHROMIUM_PATH")?,
        };
        info!("launching Chromium at {}", executable.display());

        let mut builder = BrowserConfig::builder().chrome_executable(executable);
        if settings.headed {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| anyhow!("invalid browser configuration: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // The CDP connection only makes progress while its handler is polled.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    trace!("browser handler event error: {e}");
                }
            }
        });

        Ok(Self {
            browser: Mutex::new(browser),
            handler,
            user_agent: settings.user_agent.clone(),
        })
    }

    /// Close the browser and wait for the process to exit.
    pub async fn shutdown(self) -> Result<()> {
        let mut browser = self.browser.into_inner();
        browser.close().await.context("failed to close Chromium")?;
        let _ = browser.wait().await;
        let _ = self.handler.await;
        debug!("Chromium shut down");
        Ok(())
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .context("failed to open a new page")?;
        page.set_user_agent(SetUserAgentOverrideParams::new(self.user_agent.clone()))
            .await
            .context("failed to override user agent")?;
        Ok(Box::new(ChromiumContext { page }))
    }
}

/// One Chromium tab.
pub struct ChromiumContext {
    page: Page,
}

impl ChromiumContext {
    async fn eval(&self, script: String) -> Result<serde_json::Value> {
        let params = EvaluateParams::builder()
            .expression(script)
            .return_by_value(true)
            .build()
            .map_err(|e| anyhow!("invalid evaluate params: {e}"))?;
        let result = self.page.evaluate(params).await?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let start = Instant::now();
        tokio::time::timeout(Duration::from_millis(timeout_ms), self.page.goto(url))
            .await
            .map_err(|_| anyhow!("navigation timed out after {timeout_ms}ms"))??;

        let final_url = self
            .page
            .url()
            .await?
            .unwrap_or_else(|| url.to_string());

        Ok(NavigationResult {
            final_url,
            load_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn locate(&mut self, locator: &Locator) -> Result<Vec<ElementRef>> {
        let script = locate_script(locator)?;
        let value = self.eval(script).await?;
        let indices: Vec<usize> =
            serde_json::from_value(value).context("locate script returned a non-array")?;
        Ok(indices.into_iter().map(ElementRef).collect())
    }

    async fn text_of(&self, element: ElementRef) -> Result<Option<String>> {
        let value = self
            .eval(format!(
                "(() => {{ const el = (window.__isohashRefs || [])[{}]; return el ? el.textContent : null; }})()",
                element.0
            ))
            .await?;
        Ok(value.as_str().map(String::from))
    }

    async fn is_visible(&self, element: ElementRef) -> Result<bool> {
        let value = self
            .eval(format!(
                r#"(() => {{
                    const el = (window.__isohashRefs || [])[{}];
                    if (!el || !el.isConnected) return false;
                    if (window.getComputedStyle(el).visibility === 'hidden') return false;
                    const r = el.getBoundingClientRect();
                    return r.width > 0 && r.height > 0;
                }})()"#,
                element.0
            ))
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn click(&mut self, element: ElementRef) -> Result<()> {
        let value = self
            .eval(format!(
                "(() => {{ const el = (window.__isohashRefs || [])[{}]; if (!el) return false; el.click(); return true; }})()",
                element.0
            ))
            .await?;
        if value.as_bool() != Some(true) {
            bail!("element {} is no longer in the document", element.0);
        }
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.page.close().await.context("failed to close page")
    }
}

/// Build the script that resolves `locator` to registry indices.
fn locate_script(locator: &Locator) -> Result<String> {
    let body = match locator {
        Locator::Role { role, name } => format!(
            r#"
            const role = {role};
            const name = {name}.toLowerCase();
            const implicit = {{
                button: 'button, input[type="button"], input[type="submit"], summary',
                link: 'a[href]',
                table: 'table',
                heading: 'h1, h2, h3, h4, h5, h6',
            }};
            const sel = '[role="' + role + '"]' + (implicit[role] ? ', ' + implicit[role] : '');
            const found = Array.from(document.querySelectorAll(sel)).filter((el) =>
                norm(el.getAttribute('aria-label') || el.textContent || el.value)
                    .toLowerCase()
                    .includes(name));
            "#,
            role = serde_json::to_string(role)?,
            name = serde_json::to_string(name)?,
        ),
        Locator::Text(text) => format!(
            r#"
            const want = {text};
            const found = Array.from(document.querySelectorAll('body *')).filter((el) =>
                norm(el.textContent) === want &&
                !Array.from(el.children).some((c) => norm(c.textContent) === want));
            "#,
            text = serde_json::to_string(text)?,
        ),
        Locator::Css(css) => format!(
            "const found = Array.from(document.querySelectorAll({}));",
            serde_json::to_string(css)?
        ),
        Locator::Within { scope, css } => format!(
            "const scope = reg[{}]; const found = scope ? Array.from(scope.querySelectorAll({})) : [];",
            scope.0,
            serde_json::to_string(css)?
        ),
    };
    Ok(format!("(() => {{ {PRELUDE} {body} return register(found); }})()"))
}

/// Browser binaries looked up on `PATH`, in preference order.
const PATH_NAMES: [&str; 4] = ["google-chrome", "chromium", "chromium-browser", "chrome"];

/// Fixed install locations, per-user install first.
fn install_candidates(home: Option<&Path>) -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Some(home) = home {
        let root = home.join(".isohash").join("chromium");
        if cfg!(target_os = "macos") {
            out.push(root.join("Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"));
        }
        out.push(root.join("chrome"));
        out.push(root.join("chrome-linux64").join("chrome"));
    }
    if cfg!(target_os = "macos") {
        out.push(PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"));
    }
    out
}

/// Locate a Chromium executable: `ISOHASH_CHROMIUM_PATH`, then the fixed
/// install locations, then `PATH`.
pub fn find_chromium() -> Option<PathBuf> {
    std::env::var_os("ISOHASH_CHROMIUM_PATH")
        .map(PathBuf::from)
        .into_iter()
        .chain(install_candidates(dirs::home_dir().as_deref()))
        .find(|p| p.exists())
        .or_else(|| PATH_NAMES.iter().find_map(|name| which::which(name).ok()))
}
