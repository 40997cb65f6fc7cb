//! Chrome/Chromium renderer factory.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use static_prerender::{BuildConfig, ChromeBrowserFactory, RenderSettings};
//!
//! let config = BuildConfig::default();
//! let base = url::Url::parse("http://127.0.0.1:3000/")?;
//! let settings = Arc::new(RenderSettings::from_config(&config, base));
//!
//! // Auto-detect Chrome installation
//! let factory = ChromeBrowserFactory::with_defaults(Arc::clone(&settings));
//!
//! // Or specify custom path
//! let factory = ChromeBrowserFactory::with_path(settings, "/usr/bin/chromium".to_string());
//! ```

use std::sync::Arc;
use std::time::Duration;

use headless_chrome::{Browser, LaunchOptions};

use super::BrowserFactory;
use crate::config::BuildConfig;
use crate::error::{BuildError, Result};
use crate::render::{ChromeRenderer, RenderSettings};
use crate::tracked::TrackedBrowser;

/// How long Chrome may stay silent on the DevTools connection.
///
/// Covers the result wait plus settling delay with a wide margin.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(300);

/// Factory launching headless Chrome renderers.
///
/// Every instance gets the same launch options and shares the run's
/// [`RenderSettings`].
pub struct ChromeBrowserFactory {
    launch_options_fn: Box<dyn Fn() -> Result<LaunchOptions<'static>> + Send + Sync>,
    settings: Arc<RenderSettings>,
}

impl ChromeBrowserFactory {
    /// Create factory with custom launch options function.
    ///
    /// The function is called once per launched instance.
    pub fn new<F>(settings: Arc<RenderSettings>, launch_options_fn: F) -> Self
    where
        F: Fn() -> Result<LaunchOptions<'static>> + Send + Sync + 'static,
    {
        Self {
            launch_options_fn: Box::new(launch_options_fn),
            settings,
        }
    }

    /// Create factory with auto-detected Chrome path and default window size.
    pub fn with_defaults(settings: Arc<RenderSettings>) -> Self {
        log::debug!(" Creating ChromeBrowserFactory with auto-detect");
        Self::new(settings, || {
            create_chrome_options(None, None)
                .map_err(|e| BuildError::Configuration(e.to_string()))
        })
    }

    /// Create factory with custom Chrome binary path.
    pub fn with_path(settings: Arc<RenderSettings>, chrome_path: String) -> Self {
        log::debug!(" Creating ChromeBrowserFactory with custom path: {}", chrome_path);
        Self::new(settings, move || {
            create_chrome_options(Some(&chrome_path), None)
                .map_err(|e| BuildError::Configuration(e.to_string()))
        })
    }

    /// Create factory honoring the Chrome path and window size of `config`.
    pub fn from_config(config: &BuildConfig, settings: Arc<RenderSettings>) -> Self {
        let chrome_path = config
            .chrome_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());
        let window_size = config.window_size;

        log::debug!(
            " Creating ChromeBrowserFactory (path: {}, window: {}x{})",
            chrome_path.as_deref().unwrap_or("auto-detect"),
            window_size.0,
            window_size.1
        );

        Self::new(settings, move || {
            create_chrome_options(chrome_path.as_deref(), Some(window_size))
                .map_err(|e| BuildError::Configuration(e.to_string()))
        })
    }
}

impl BrowserFactory for ChromeBrowserFactory {
    type Instance = ChromeRenderer;

    /// Launch and validate one Chrome instance.
    ///
    /// # Errors
    ///
    /// * Returns [`BuildError::Configuration`] if launch options generation fails.
    /// * Returns [`BuildError::BrowserLaunch`] if Chrome fails to start or validate.
    fn launch(&self, worker_id: usize) -> Result<ChromeRenderer> {
        let options = (self.launch_options_fn)()?;

        log::debug!(" [worker {}] Launching Chrome browser...", worker_id);
        let browser = Browser::new(options).map_err(|e| {
            log::error!("❌ [worker {}] Chrome launch failed: {}", worker_id, e);
            BuildError::BrowserLaunch(e.to_string())
        })?;

        let tracked = TrackedBrowser::new(browser)?;
        log::info!("✅ [worker {}] Browser {} ready", worker_id, tracked.id());

        Ok(ChromeRenderer::new(tracked, Arc::clone(&self.settings)))
    }
}

impl std::fmt::Debug for ChromeBrowserFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromeBrowserFactory")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Create Chrome launch options.
///
/// # Parameters
///
/// * `chrome_path` - Optional custom Chrome binary path. If None, auto-detects.
/// * `window_size` - Optional viewport (width, height). If None, Chrome's default.
///
/// # Chrome Flags Applied
///
/// ## Memory and Performance
/// - `--disable-dev-shm-usage` - Use /tmp instead of /dev/shm (container-friendly)
/// - `--disable-crash-reporter`
/// - `--max_old_space_size=1024` - Limit V8 heap to 1GB
///
/// ## GPU
/// - `--disable-gpu-compositing`, `--disable-software-rasterizer`
/// - `--disable-accelerated-2d-canvas`, `--disable-webgl`, `--disable-webgl2`
///
/// ## Disabled Features
/// - `--disable-extensions`, `--disable-plugins`, `--disable-sync`, `--disable-default-apps`
///
/// ## Stability
/// - `--disable-background-timer-throttling` - Client timers keep firing in background tabs
/// - `--disable-backgrounding-occluded-windows`
/// - `--disable-renderer-backgrounding`
/// - `--disable-hang-monitor`
/// - `--disable-ipc-flooding-protection`
pub fn create_chrome_options(
    chrome_path: Option<&str>,
    window_size: Option<(u32, u32)>,
) -> std::result::Result<LaunchOptions<'static>, Box<dyn std::error::Error + Send + Sync>> {
    match chrome_path {
        Some(path) => log::debug!(" Creating Chrome options with custom path: {}", path),
        None => log::debug!(" Creating Chrome options (auto-detect browser)"),
    }

    let mut builder = LaunchOptions::default_builder();

    if let Some(path) = chrome_path {
        builder.path(Some(path.to_string().into()));
    }

    builder
        .headless(true)
        .sandbox(false)
        .window_size(window_size)
        .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
        .disable_default_args(true)
        .args(vec![
            // ===== Memory and Performance =====
            "--disable-dev-shm-usage".as_ref(),
            "--disable-crash-reporter".as_ref(),
            "--max_old_space_size=1024".as_ref(),

            // ===== GPU =====
            "--disable-gpu-compositing".as_ref(),
            "--disable-software-rasterizer".as_ref(),
            "--disable-accelerated-2d-canvas".as_ref(),
            "--disable-gl-drawing-for-tests".as_ref(),
            "--disable-webgl".as_ref(),
            "--disable-webgl2".as_ref(),

            // ===== Disabled Features =====
            "--disable-extensions".as_ref(),
            "--disable-plugins".as_ref(),
            "--disable-sync".as_ref(),
            "--disable-default-apps".as_ref(),

            "--enable-automation".as_ref(),

            // ===== Stability =====
            "--disable-background-timer-throttling".as_ref(),
            "--disable-backgrounding-occluded-windows".as_ref(),
            "--disable-hang-monitor".as_ref(),
            "--disable-renderer-backgrounding".as_ref(),
            "--disable-ipc-flooding-protection".as_ref(),
        ])
        .build()
        .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> {
            let path_msg = chrome_path.unwrap_or("auto-detect");
            log::error!("❌ Failed to build Chrome launch options (path: {}): {}", path_msg, e);
            e.into()
        })
}

// ============================================================================
// Unit Tests
// ============================================================================
