//! Page rendering in a headless browser.
//!
//! A renderer turns one [`TargetIdentifier`] into a [`RenderOutcome`]:
//!
//! ```text
//! open tab ─→ navigate to host/?url=<target> ─→ wait for result (bounded)
//!    │                                               │
//!    │                      settle delay ←───────────┘
//!    │                           │
//!    │          result present? ─┴─→ extract head + marker fragment
//!    │                                               │
//!    └──────────── tab closed on every path ←────────┘
//! ```
//!
//! Expiry of the result wait is not an error. The outcome is then
//! [`RenderOutcome::Rendered`] with `result_present == false` and the
//! composed page shows the template's default search state.
//!
//! All `headless_chrome` calls are synchronous; each one runs inside
//! [`tokio::task::spawn_blocking`] so waiting never stalls other workers.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use headless_chrome::Tab;
use serde::Deserialize;
use url::Url;

use crate::config::BuildConfig;
use crate::error::RenderError;
use crate::target::TargetIdentifier;
use crate::tracked::TrackedBrowser;

/// Query parameter carrying the target to the client application.
pub const TARGET_QUERY_PARAM: &str = "url";

/// Expression that is `true` once the client application holds a result.
const RESULT_PROBE: &str = "!!(window.__vueState__ && window.__vueState__.vueResult && window.__vueState__.vueResult.value !== null && window.__vueState__.vueResult.value !== undefined)";

/// Serializes the rendered head and the content between the marker elements.
const EXTRACTION_SCRIPT: &str = r#"(() => {
    const begin = document.querySelector('div[data-static="begin"]');
    const end = document.querySelector('div[data-static="end"]');
    let fragment = '';
    if (begin && end && begin.parentElement) {
        const html = begin.parentElement.innerHTML;
        const beginHtml = begin.outerHTML;
        const endHtml = end.outerHTML;
        const beginIndex = html.indexOf(beginHtml);
        const endIndex = html.indexOf(endHtml);
        if (beginIndex !== -1 && endIndex !== -1 && endIndex > beginIndex) {
            fragment = html.substring(beginIndex + beginHtml.length, endIndex).trim();
        }
    }
    const head = document.head ? document.head.outerHTML : '';
    return JSON.stringify({ head, fragment });
})()"#;

/// Content extracted from a live page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderedPage {
    /// Markup found between the begin and end marker elements.
    pub fragment: String,
    /// Serialized `<head>` element of the rendered page.
    pub head: String,
    /// Whether the client application reported a result within the wait.
    pub result_present: bool,
}

impl RenderedPage {
    /// A page whose client application produced a result.
    pub fn with_result(fragment: impl Into<String>, head: impl Into<String>) -> Self {
        Self {
            fragment: fragment.into(),
            head: head.into(),
            result_present: true,
        }
    }

    /// A page that never reported a result; nothing was extracted.
    pub fn without_result() -> Self {
        Self::default()
    }
}

/// Result of rendering one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The page loaded; see [`RenderedPage::result_present`].
    Rendered(RenderedPage),
    /// The page could not be rendered.
    Failed {
        /// What went wrong.
        reason: RenderError,
    },
}

impl RenderOutcome {
    /// Shorthand for a failed outcome.
    pub fn failed(reason: RenderError) -> Self {
        RenderOutcome::Failed { reason }
    }
}

impl From<std::result::Result<RenderedPage, RenderError>> for RenderOutcome {
    fn from(result: std::result::Result<RenderedPage, RenderError>) -> Self {
        match result {
            Ok(page) => RenderOutcome::Rendered(page),
            Err(reason) => RenderOutcome::Failed { reason },
        }
    }
}

/// Something that can render targets, one at a time.
///
/// Each worker owns exactly one renderer for the whole run. Renderers must
/// not panic on page errors; they report them as [`RenderOutcome::Failed`].
pub trait PageRenderer: Send + Sync + 'static {
    /// Render `target` and report the outcome.
    fn render(&self, target: &TargetIdentifier) -> impl Future<Output = RenderOutcome> + Send;
}

/// Timing and addressing shared by every renderer of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSettings {
    /// Root URL of the render host, e.g. `http://127.0.0.1:3000/`.
    pub base_url: Url,
    /// Navigation limit.
    pub navigation_timeout: Duration,
    /// Result wait limit.
    pub result_timeout: Duration,
    /// Pause before extraction.
    pub settle_delay: Duration,
    /// Spacing between result probes.
    pub poll_interval: Duration,
}

impl RenderSettings {
    /// Take the timings from `config` and point renderers at `base_url`.
    pub fn from_config(config: &BuildConfig, base_url: Url) -> Self {
        Self {
            base_url,
            navigation_timeout: config.navigation_timeout,
            result_timeout: config.result_timeout,
            settle_delay: config.settle_delay,
            poll_interval: config.poll_interval,
        }
    }

    /// URL the browser opens for `target`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use static_prerender::{BuildConfig, RenderSettings, TargetIdentifier};
    /// use url::Url;
    ///
    /// let base = Url::parse("http://127.0.0.1:3000").unwrap();
    /// let settings = RenderSettings::from_config(&BuildConfig::default(), base);
    /// let target = TargetIdentifier::from_url("https://example.org/a b").unwrap();
    /// assert_eq!(
    ///     settings.navigation_url(&target),
    ///     "http://127.0.0.1:3000/?url=example.org%2Fa%20b"
    /// );
    /// ```
    pub fn navigation_url(&self, target: &TargetIdentifier) -> String {
        let mut url = self.base_url.clone();
        url.set_query(Some(&format!(
            "{}={}",
            TARGET_QUERY_PARAM,
            urlencoding::encode(target.as_str())
        )));
        url.into()
    }
}

/// Renders targets in one Chrome instance.
pub struct ChromeRenderer {
    browser: TrackedBrowser,
    settings: Arc<RenderSettings>,
}

impl ChromeRenderer {
    pub(crate) fn new(browser: TrackedBrowser, settings: Arc<RenderSettings>) -> Self {
        Self { browser, settings }
    }

    /// Identifier of the underlying browser instance.
    pub fn browser_id(&self) -> u64 {
        self.browser.id()
    }

    async fn try_render(&self, target: &TargetIdentifier) -> std::result::Result<RenderedPage, RenderError> {
        let settings = &self.settings;
        let browser = Arc::clone(self.browser.browser());
        let nav_timeout = settings.navigation_timeout;

        let tab = blocking(move || {
            let tab = browser
                .new_tab()
                .map_err(|e| RenderError::TabCreation(e.to_string()))?;
            tab.set_default_timeout(nav_timeout);
            Ok(tab)
        })
        .await?;
        let page = PageGuard::new(tab);

        let url = settings.navigation_url(target);
        log::debug!("Navigating to {}", url);
        let tab = page.tab();
        blocking(move || {
            tab.navigate_to(&url)
                .and_then(|tab| tab.wait_until_navigated())
                .map(|_| ())
                .map_err(|e| RenderError::Navigation(e.to_string()))
        })
        .await?;

        let result_present = self.wait_for_result(page.tab()).await;
        if !result_present {
            log::warn!(
                "⚠️ No result for {} within {:?}, keeping default page state",
                target,
                settings.result_timeout
            );
        }

        if !settings.settle_delay.is_zero() {
            tokio::time::sleep(settings.settle_delay).await;
        }

        let tab = page.tab();
        if let Ok(Ok(title)) = tokio::task::spawn_blocking(move || tab.get_title()).await {
            log::info!("Page title for {}: {}", target, title);
        }

        if !result_present {
            return Ok(RenderedPage::without_result());
        }

        let tab = page.tab();
        let extraction = blocking(move || extract(&tab)).await?;
        if extraction.fragment.is_empty() {
            log::warn!("⚠️ Marker region for {} is empty or missing", target);
        }

        Ok(RenderedPage::with_result(extraction.fragment, extraction.head))
    }

    /// Wait until the client application holds a result.
    ///
    /// Returns `false` when the wait expires.
    async fn wait_for_result(&self, tab: Arc<Tab>) -> bool {
        wait_until(
            || {
                let tab = Arc::clone(&tab);
                blocking(move || probe_result(&tab))
            },
            self.settings.poll_interval,
            self.settings.result_timeout,
        )
        .await
    }
}

/// Run `probe` every `poll_interval` until it reports ready or `deadline`
/// passes.
///
/// A probe error counts as "not ready yet". Returns whether the probe
/// reported ready before the deadline.
pub(crate) async fn wait_until<P, Fut>(mut probe: P, poll_interval: Duration, deadline: Duration) -> bool
where
    P: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<bool, RenderError>>,
{
    let poll = async {
        loop {
            match probe().await {
                Ok(true) => return,
                Ok(false) => {}
                Err(e) => log::trace!("Result probe failed, retrying: {}", e),
            }
            tokio::time::sleep(poll_interval).await;
        }
    };

    tokio::time::timeout(deadline, poll).await.is_ok()
}

fn probe_result(tab: &Tab) -> std::result::Result<bool, RenderError> {
    let result = tab
        .evaluate(RESULT_PROBE, false)
        .map_err(|e| RenderError::Evaluation(e.to_string()))?;
    Ok(result.value.and_then(|v| v.as_bool()).unwrap_or(false))
}

impl PageRenderer for ChromeRenderer {
    async fn render(&self, target: &TargetIdentifier) -> RenderOutcome {
        let outcome = self.try_render(target).await;
        if let Err(e) = &outcome {
            log::error!("❌ Browser {} failed to render {}: {}", self.browser.id(), target, e);
        }
        outcome.into()
    }
}

impl std::fmt::Debug for ChromeRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromeRenderer")
            .field("browser", &self.browser)
            .field("base_url", &self.settings.base_url)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct Extraction {
    #[serde(default)]
    head: String,
    #[serde(default)]
    fragment: String,
}

fn extract(tab: &Tab) -> std::result::Result<Extraction, RenderError> {
    let result = tab
        .evaluate(EXTRACTION_SCRIPT, false)
        .map_err(|e| RenderError::Evaluation(e.to_string()))?;

    let json = result
        .value
        .as_ref()
        .and_then(|v| v.as_str())
        .ok_or_else(|| RenderError::Evaluation("extraction script returned no string".to_string()))?;

    serde_json::from_str(json).map_err(|e| RenderError::Evaluation(e.to_string()))
}

/// Run a blocking browser call on the blocking pool.
async fn blocking<T, F>(f: F) -> std::result::Result<T, RenderError>
where
    F: FnOnce() -> std::result::Result<T, RenderError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| RenderError::Panicked(e.to_string()))?
}

/// Closes its tab when dropped, whichever way rendering ends.
struct PageGuard {
    tab: Arc<Tab>,
}

impl PageGuard {
    fn new(tab: Arc<Tab>) -> Self {
        Self { tab }
    }

    fn tab(&self) -> Arc<Tab> {
        Arc::clone(&self.tab)
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        let tab = Arc::clone(&self.tab);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || close_tab_safely(&tab));
            }
            Err(_) => close_tab_safely(&tab),
        }
    }
}

fn close_tab_safely(tab: &Tab) {
    if let Err(e) = tab.close(true) {
        log::warn!("⚠️ Failed to close tab (continuing anyway): {}", e);
    } else {
        log::trace!("Tab closed");
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn settings(base_url: &str) -> RenderSettings {
        RenderSettings::from_config(&BuildConfig::default(), Url::parse(base_url).unwrap())
    }

    /// Verifies the target is percent-encoded into the query string.
    #[test]
    fn test_navigation_url_encodes_target() {
        let target = TargetIdentifier::from_url("https://example.org/path?q=1&x=2").unwrap();
        assert_eq!(
            settings("http://127.0.0.1:3000").navigation_url(&target),
            "http://127.0.0.1:3000/?url=example.org%2Fpath%3Fq%3D1%26x%3D2"
        );
    }

    /// Verifies a base URL with or without trailing slash gives the same URL.
    #[test]
    fn test_navigation_url_trailing_slash() {
        let target = TargetIdentifier::from_url("https://example.org").unwrap();
        assert_eq!(
            settings("http://127.0.0.1:4100/").navigation_url(&target),
            "http://127.0.0.1:4100/?url=example.org"
        );
    }

    /// Verifies timings are taken from the build configuration.
    #[test]
    fn test_settings_from_config() {
        let config = BuildConfig::default();
        let settings = settings("http://h/");
        assert_eq!(settings.navigation_timeout, config.navigation_timeout);
        assert_eq!(settings.result_timeout, config.result_timeout);
        assert_eq!(settings.settle_delay, config.settle_delay);
        assert_eq!(settings.poll_interval, config.poll_interval);
    }

    /// Verifies outcome conversion from results.
    #[test]
    fn test_outcome_from_result() {
        let ok: RenderOutcome = Ok(RenderedPage::with_result("f", "h")).into();
        assert!(matches!(ok, RenderOutcome::Rendered(p) if p.result_present));

        let err: RenderOutcome = Err(RenderError::Navigation("timeout".to_string())).into();
        assert_eq!(
            err,
            RenderOutcome::failed(RenderError::Navigation("timeout".to_string()))
        );
    }

    /// Verifies the extraction payload tolerates missing keys.
    #[test]
    fn test_extraction_payload() {
        let parsed: Extraction = serde_json::from_str(r#"{"head":"<head></head>"}"#).unwrap();
        assert_eq!(parsed.head, "<head></head>");
        assert!(parsed.fragment.is_empty());
    }

    /// Verifies a probe that never reports ready gives up at the deadline.
    #[tokio::test(start_paused = true)]
    async fn test_wait_until_expires() {
        let polls = AtomicUsize::new(0);
        let started = tokio::time::Instant::now();

        let ready = wait_until(
            || {
                polls.fetch_add(1, Ordering::SeqCst);
                async { Ok(false) }
            },
            Duration::from_millis(100),
            Duration::from_secs(1),
        )
        .await;

        assert!(!ready);
        assert_eq!(started.elapsed(), Duration::from_secs(1));
        // One probe per interval; the timer and the last poll may coincide.
        assert!((10..=11).contains(&polls.load(Ordering::SeqCst)));
    }

    /// Verifies the wait ends on the first ready probe.
    #[tokio::test(start_paused = true)]
    async fn test_wait_until_ready_on_third_poll() {
        let polls = AtomicUsize::new(0);
        let started = tokio::time::Instant::now();

        let ready = wait_until(
            || {
                let n = polls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Ok(n == 3) }
            },
            Duration::from_millis(100),
            Duration::from_secs(10),
        )
        .await;

        assert!(ready);
        assert_eq!(polls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_millis(200));
    }

    /// Verifies probe errors count as not ready rather than ending the wait.
    #[tokio::test(start_paused = true)]
    async fn test_wait_until_retries_after_errors() {
        let polls = AtomicUsize::new(0);

        let ready = wait_until(
            || {
                let n = polls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 4 {
                        Err(RenderError::Evaluation("context destroyed".to_string()))
                    } else {
                        Ok(true)
                    }
                }
            },
            Duration::from_millis(50),
            Duration::from_secs(1),
        )
        .await;

        assert!(ready);
        assert_eq!(polls.load(Ordering::SeqCst), 4);
    }

    /// Verifies a probe failing every time ends as not ready, not as an error.
    #[tokio::test(start_paused = true)]
    async fn test_wait_until_errors_until_deadline() {
        let ready = wait_until(
            || async { Err(RenderError::Evaluation("no page".to_string())) },
            Duration::from_millis(100),
            Duration::from_millis(350),
        )
        .await;

        assert!(!ready);
    }

    /// Verifies a page without result carries nothing.
    #[test]
    fn test_without_result_is_empty() {
        let page = RenderedPage::without_result();
        assert!(!page.result_present);
        assert!(page.fragment.is_empty());
        assert!(page.head.is_empty());
    }
}
