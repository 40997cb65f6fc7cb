//! Configuration for a prerender run.
//!
//! This module provides [`BuildConfig`] and [`BuildConfigBuilder`] for
//! configuring worker fan-out, timeouts, the render host port and the
//! project file layout.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use static_prerender::BuildConfigBuilder;
//!
//! let config = BuildConfigBuilder::new()
//!     .worker_count(4)
//!     .result_timeout(Duration::from_secs(5))
//!     .build()
//!     .expect("Invalid configuration");
//!
//! assert_eq!(config.worker_count, 4);
//! ```
//!
//! # Environment Configuration
//!
//! When the `env-config` feature is enabled, configuration can be loaded
//! from environment variables and an optional `app.env` file:
//!
//! ```rust,ignore
//! use static_prerender::config::env::from_env;
//!
//! let config = from_env()?;
//! ```
//!
//! See [`mod@env`] module for available environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{BuildError, Result};

/// Static assets copied next to the generated pages by default.
pub const DEFAULT_STATIC_ASSETS: [&str; 5] = [
    "g0v_logo.svg",
    "Logo_Compact-OCF_Purple.svg",
    "APNIC-Foundation-and-ISIF-Logo-CMYK-stacked-01-a.svg",
    "styles.css",
    "app.js",
];

/// File layout of the project being prerendered.
///
/// All paths default to locations relative to a project root, matching the
/// layout of the report site:
///
/// | Field | Default |
/// |-------|---------|
/// | `template` | `<root>/index.html` |
/// | `asset_root` | `<root>` |
/// | `data_root` | `<root>/test-result` |
/// | `catalog` | `<root>/test-result/statistic.tsv` |
/// | `output_dir` | `<root>/web` |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    /// Master HTML template; served at `/` and used for composition.
    pub template: PathBuf,

    /// Root for static assets (scripts, styles, images).
    pub asset_root: PathBuf,

    /// Root for JSON result files fetched by the client application.
    pub data_root: PathBuf,

    /// Tab-separated target catalog.
    pub catalog: PathBuf,

    /// Directory receiving the generated site.
    pub output_dir: PathBuf,

    /// Asset file names (relative to `asset_root`) copied into `output_dir`.
    pub static_assets: Vec<String>,
}

impl ProjectPaths {
    /// Derive the default layout below `root`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use static_prerender::config::ProjectPaths;
    ///
    /// let paths = ProjectPaths::from_root("/srv/site");
    /// assert!(paths.catalog.ends_with("test-result/statistic.tsv"));
    /// ```
    pub fn from_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let data_root = root.join("test-result");
        Self {
            template: root.join("index.html"),
            asset_root: root.to_path_buf(),
            catalog: data_root.join("statistic.tsv"),
            data_root,
            output_dir: root.join("web"),
            static_assets: DEFAULT_STATIC_ASSETS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for ProjectPaths {
    fn default() -> Self {
        Self::from_root(".")
    }
}

/// Configuration for one prerender run.
///
/// # Fields Overview
///
/// | Field | Default | Description |
/// |-------|---------|-------------|
/// | `worker_count` | 8 | Browser instances (one worker each) |
/// | `host_port` | 3000 | Render host port (`0` = ephemeral) |
/// | `navigation_timeout` | 30s | Page load limit |
/// | `result_timeout` | 10s | Wait for the client's result |
/// | `settle_delay` | 1s | Pause before extraction |
/// | `poll_interval` | 100ms | Result probe spacing |
/// | `window_size` | 1200×800 | Browser viewport |
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Number of browser instances launched, each driven by one worker.
    ///
    /// Never more instances than targets are launched.
    pub worker_count: usize,

    /// Local port the render host binds to.
    pub host_port: u16,

    /// Maximum time for one page navigation to complete.
    pub navigation_timeout: Duration,

    /// Maximum time to wait for the client application's result.
    ///
    /// Expiry is not an error: the target is written as a "no result" page.
    pub result_timeout: Duration,

    /// Fixed pause after the result wait so deferred rendering can finish.
    pub settle_delay: Duration,

    /// Spacing between result probes while waiting.
    pub poll_interval: Duration,

    /// Browser window size (width, height).
    pub window_size: (u32, u32),

    /// Custom Chrome binary; `None` lets headless_chrome detect one.
    pub chrome_path: Option<PathBuf>,

    /// Project file layout.
    pub paths: ProjectPaths,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            worker_count: 8,
            host_port: 3000,
            navigation_timeout: Duration::from_secs(30),
            result_timeout: Duration::from_secs(10),
            settle_delay: Duration::from_secs(1),
            poll_interval: Duration::from_millis(100),
            window_size: (1200, 800),
            chrome_path: None,
            paths: ProjectPaths::default(),
        }
    }
}

/// Builder for [`BuildConfig`] with validation.
///
/// # Validation
///
/// The [`build()`](Self::build) method validates:
/// - `worker_count` must be greater than 0
/// - `navigation_timeout` must be greater than 0
/// - `poll_interval` must be greater than 0 and not exceed `result_timeout`
#[derive(Debug, Clone)]
pub struct BuildConfigBuilder {
    config: BuildConfig,
}

impl BuildConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            config: BuildConfig::default(),
        }
    }

    /// Set the number of browser instances (must be > 0).
    pub fn worker_count(mut self, count: usize) -> Self {
        self.config.worker_count = count;
        self
    }

    /// Set the render host port.
    pub fn host_port(mut self, port: u16) -> Self {
        self.config.host_port = port;
        self
    }

    /// Set the navigation timeout.
    pub fn navigation_timeout(mut self, timeout: Duration) -> Self {
        self.config.navigation_timeout = timeout;
        self
    }

    /// Set how long to wait for the client application's result.
    pub fn result_timeout(mut self, timeout: Duration) -> Self {
        self.config.result_timeout = timeout;
        self
    }

    /// Set the settling delay applied before extraction.
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.config.settle_delay = delay;
        self
    }

    /// Set the spacing between result probes.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set the browser window size.
    pub fn window_size(mut self, width: u32, height: u32) -> Self {
        self.config.window_size = (width, height);
        self
    }

    /// Use a custom Chrome binary.
    pub fn chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    /// Reset the whole file layout to the defaults below `root`.
    ///
    /// Call this before the individual path setters; it overwrites them.
    pub fn project_root(mut self, root: impl AsRef<Path>) -> Self {
        let static_assets = std::mem::take(&mut self.config.paths.static_assets);
        self.config.paths = ProjectPaths::from_root(root);
        self.config.paths.static_assets = static_assets;
        self
    }

    /// Set the master template path.
    pub fn template(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.paths.template = path.into();
        self
    }

    /// Set the catalog path.
    pub fn catalog(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.paths.catalog = path.into();
        self
    }

    /// Set the data root serving JSON result files.
    pub fn data_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.paths.data_root = path.into();
        self
    }

    /// Set the output directory.
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.paths.output_dir = path.into();
        self
    }

    /// Replace the list of static assets copied into the output.
    pub fn static_assets<I, S>(mut self, assets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.paths.static_assets = assets.into_iter().map(Into::into).collect();
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Configuration`] describing the first invalid value.
    ///
    /// # Example
    ///
    /// ```rust
    /// use static_prerender::BuildConfigBuilder;
    ///
    /// assert!(BuildConfigBuilder::new().worker_count(0).build().is_err());
    /// ```
    pub fn build(self) -> Result<BuildConfig> {
        let config = self.config;

        if config.worker_count == 0 {
            return Err(BuildError::Configuration(
                "worker_count must be greater than 0".to_string(),
            ));
        }

        if config.navigation_timeout.is_zero() {
            return Err(BuildError::Configuration(
                "navigation_timeout must be greater than 0".to_string(),
            ));
        }

        if config.poll_interval.is_zero() {
            return Err(BuildError::Configuration(
                "poll_interval must be greater than 0".to_string(),
            ));
        }

        if config.poll_interval > config.result_timeout {
            return Err(BuildError::Configuration(
                "poll_interval cannot exceed result_timeout".to_string(),
            ));
        }

        Ok(config)
    }
}

impl Default for BuildConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Environment Configuration (feature-gated)
// ============================================================================

/// Environment-based configuration loading.
///
/// This module is only available when the `env-config` feature is enabled.
/// It loads an optional `app.env` file through `dotenvy`, then reads:
///
/// | Variable | Type | Default | Description |
/// |----------|------|---------|-------------|
/// | `PRERENDER_WORKERS` | usize | 8 | Browser instances |
/// | `PRERENDER_PORT` | u16 | 3000 | Render host port |
/// | `PRERENDER_ROOT` | path | `.` | Project root |
/// | `PRERENDER_OUTPUT_DIR` | path | `<root>/web` | Output directory |
/// | `PRERENDER_CATALOG` | path | `<root>/test-result/statistic.tsv` | Catalog |
/// | `PRERENDER_NAVIGATION_TIMEOUT_SECONDS` | u64 | 30 | Navigation limit |
/// | `PRERENDER_RESULT_TIMEOUT_MS` | u64 | 10000 | Result wait |
/// | `PRERENDER_SETTLE_DELAY_MS` | u64 | 1000 | Settling delay |
/// | `PRERENDER_STATIC_ASSETS` | list | see [`DEFAULT_STATIC_ASSETS`] | Comma-separated |
/// | `CHROME_PATH` | path | auto | Custom Chrome binary |
#[cfg(feature = "env-config")]
pub mod env {
    use super::*;

    /// Default environment file name.
    pub const ENV_FILE_NAME: &str = "app.env";

    /// Load environment variables from `app.env`.
    pub fn load_env_file() -> std::result::Result<PathBuf, dotenvy::Error> {
        dotenvy::from_filename(ENV_FILE_NAME)
    }

    fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
        let raw = std::env::var(name).ok()?;
        match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("⚠️ Ignoring unparsable {}={:?}", name, raw);
                None
            }
        }
    }

    /// Start a builder from environment variables.
    ///
    /// Unset or unparsable variables keep their defaults. The returned builder
    /// can be refined further (the CLI applies its flags on top).
    pub fn builder_from_env() -> BuildConfigBuilder {
        match load_env_file() {
            Ok(path) => log::info!("Loaded configuration from: {:?}", path),
            Err(e) => log::debug!(
                "No {} file found or failed to load: {} (using environment variables and defaults)",
                ENV_FILE_NAME,
                e
            ),
        }

        let mut builder = BuildConfigBuilder::new();

        if let Some(root) = std::env::var_os("PRERENDER_ROOT") {
            builder = builder.project_root(PathBuf::from(root));
        }
        if let Some(output) = std::env::var_os("PRERENDER_OUTPUT_DIR") {
            builder = builder.output_dir(PathBuf::from(output));
        }
        if let Some(catalog) = std::env::var_os("PRERENDER_CATALOG") {
            builder = builder.catalog(PathBuf::from(catalog));
        }
        if let Some(workers) = parsed::<usize>("PRERENDER_WORKERS") {
            builder = builder.worker_count(workers);
        }
        if let Some(port) = parsed::<u16>("PRERENDER_PORT") {
            builder = builder.host_port(port);
        }
        if let Some(secs) = parsed::<u64>("PRERENDER_NAVIGATION_TIMEOUT_SECONDS") {
            builder = builder.navigation_timeout(Duration::from_secs(secs));
        }
        if let Some(ms) = parsed::<u64>("PRERENDER_RESULT_TIMEOUT_MS") {
            builder = builder.result_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = parsed::<u64>("PRERENDER_SETTLE_DELAY_MS") {
            builder = builder.settle_delay(Duration::from_millis(ms));
        }
        if let Ok(assets) = std::env::var("PRERENDER_STATIC_ASSETS") {
            builder = builder.static_assets(
                assets
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>(),
            );
        }
        if let Some(path) = chrome_path_from_env() {
            builder = builder.chrome_path(path);
        }

        builder
    }

    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Configuration`] if the resulting values are invalid.
    pub fn from_env() -> Result<BuildConfig> {
        let config = builder_from_env().build()?;

        log::info!("Loaded build configuration from environment:");
        log::info!("   - Workers: {}", config.worker_count);
        log::info!("   - Host port: {}", config.host_port);
        log::info!("   - Result timeout: {:?}", config.result_timeout);
        log::info!("   - Output: {}", config.paths.output_dir.display());

        Ok(config)
    }

    /// Get the Chrome path from `CHROME_PATH`.
    pub fn chrome_path_from_env() -> Option<String> {
        std::env::var("CHROME_PATH").ok()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Verifies that the builder sets every value.
    #[test]
    fn test_config_builder_chaining() {
        let config = BuildConfigBuilder::new()
            .worker_count(3)
            .host_port(0)
            .navigation_timeout(Duration::from_secs(5))
            .result_timeout(Duration::from_millis(500))
            .settle_delay(Duration::ZERO)
            .poll_interval(Duration::from_millis(50))
            .window_size(800, 600)
            .chrome_path("/usr/bin/chromium")
            .build()
            .unwrap();

        assert_eq!(config.worker_count, 3);
        assert_eq!(config.host_port, 0);
        assert_eq!(config.navigation_timeout.as_secs(), 5);
        assert_eq!(config.result_timeout.as_millis(), 500);
        assert!(config.settle_delay.is_zero());
        assert_eq!(config.poll_interval.as_millis(), 50);
        assert_eq!(config.window_size, (800, 600));
        assert_eq!(config.chrome_path, Some(PathBuf::from("/usr/bin/chromium")));
    }

    /// Verifies the defaults used by the build command.
    #[test]
    fn test_config_defaults() {
        let config = BuildConfig::default();

        assert_eq!(config.worker_count, 8);
        assert_eq!(config.host_port, 3000);
        assert_eq!(config.navigation_timeout, Duration::from_secs(30));
        assert_eq!(config.result_timeout, Duration::from_secs(10));
        assert_eq!(config.settle_delay, Duration::from_secs(1));
        assert_eq!(config.window_size, (1200, 800));
        assert!(config.chrome_path.is_none());
        assert_eq!(config.paths.static_assets.len(), DEFAULT_STATIC_ASSETS.len());
    }

    /// Verifies the validation rules.
    #[test]
    fn test_config_validation() {
        let err = BuildConfigBuilder::new().worker_count(0).build().unwrap_err();
        assert!(err.to_string().contains("worker_count must be greater than 0"));

        let err = BuildConfigBuilder::new()
            .navigation_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("navigation_timeout"));

        let err = BuildConfigBuilder::new()
            .poll_interval(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("poll_interval must be greater than 0"));

        let err = BuildConfigBuilder::new()
            .result_timeout(Duration::from_millis(10))
            .poll_interval(Duration::from_millis(20))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("poll_interval cannot exceed result_timeout"));
    }

    /// Verifies that skipping the settling delay is allowed.
    #[test]
    fn test_config_zero_settle_allowed() {
        let config = BuildConfigBuilder::new()
            .settle_delay(Duration::ZERO)
            .build();
        assert!(config.is_ok());
    }

    /// Verifies the default project layout below a root.
    #[test]
    fn test_project_root_layout() {
        let config = BuildConfigBuilder::new()
            .static_assets(["styles.css"])
            .project_root("/srv/site")
            .build()
            .unwrap();

        let paths = &config.paths;
        assert_eq!(paths.template, PathBuf::from("/srv/site/index.html"));
        assert_eq!(paths.asset_root, PathBuf::from("/srv/site"));
        assert_eq!(paths.data_root, PathBuf::from("/srv/site/test-result"));
        assert_eq!(
            paths.catalog,
            PathBuf::from("/srv/site/test-result/statistic.tsv")
        );
        assert_eq!(paths.output_dir, PathBuf::from("/srv/site/web"));
        assert_eq!(paths.static_assets, vec!["styles.css".to_string()]);
    }

    /// Verifies individual path overrides after the root is set.
    #[test]
    fn test_path_overrides() {
        let config = BuildConfigBuilder::new()
            .project_root("/srv/site")
            .output_dir("/tmp/out")
            .catalog("/data/list.tsv")
            .build()
            .unwrap();

        assert_eq!(config.paths.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.paths.catalog, PathBuf::from("/data/list.tsv"));
        assert_eq!(config.paths.template, PathBuf::from("/srv/site/index.html"));
    }
}
