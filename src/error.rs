//! Error types for the prerender pipeline.
//!
//! Two families of errors exist:
//!
//! - [`BuildError`] covers fatal setup conditions. Any of them aborts the whole
//!   run and makes the binary exit with a non-zero status.
//! - [`RenderError`] covers failures scoped to a single target. They are turned
//!   into a failed record in the [`BuildReport`](crate::BuildReport) and never
//!   stop sibling work.
//!
//! # Example
//!
//! ```rust
//! use static_prerender::{BuildError, Result};
//!
//! fn load() -> Result<Vec<String>> {
//!     Err(BuildError::MissingSource("test-result/statistic.tsv: not found".to_string()))
//! }
//!
//! match load() {
//!     Ok(targets) => println!("{} targets", targets.len()),
//!     Err(e) if e.is_fatal_setup() => eprintln!("aborting: {}", e),
//!     Err(e) => eprintln!("error: {}", e),
//! }
//! ```

/// Fatal errors that abort a build run.
///
/// # Example
///
/// ```rust
/// use static_prerender::BuildError;
///
/// let error = BuildError::NoMatchingTarget("article19.org".to_string());
/// assert_eq!(error.to_string(), "No target matches \"article19.org\"");
/// ```
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The target catalog could not be located or read.
    ///
    /// Without the catalog there is nothing to render, so this is fatal.
    #[error("Target catalog unavailable: {0}")]
    MissingSource(String),

    /// The local render host could not bind its listening socket.
    ///
    /// # Common Causes
    ///
    /// - Another process already listens on the configured port
    /// - Insufficient permissions for a privileged port
    #[error("Failed to start render host: {0}")]
    ServerBind(String),

    /// Not a single browser instance could be launched.
    ///
    /// Individual launch failures are tolerated as long as at least one
    /// instance comes up; this variant carries the last launch error.
    ///
    /// # Common Causes
    ///
    /// - Chrome/Chromium binary not found or not installed
    /// - Invalid Chrome binary path specified
    /// - System resource limits exceeded
    #[error("Failed to launch browser: {0}")]
    BrowserLaunch(String),

    /// A site selector was given but matched no target in the catalog.
    #[error("No target matches \"{0}\"")]
    NoMatchingTarget(String),

    /// The output directory or one of its fixed files could not be prepared.
    #[error("Failed to prepare output: {0}")]
    OutputSetup(String),

    /// Invalid configuration provided.
    ///
    /// Returned by [`BuildConfigBuilder::build`](crate::BuildConfigBuilder::build)
    /// and by builders missing a required component.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl BuildError {
    /// Whether the error belongs to the fatal-setup class.
    ///
    /// Every variant is currently fatal; the method exists so callers do not
    /// have to enumerate variants when deciding the exit status.
    pub fn is_fatal_setup(&self) -> bool {
        matches!(
            self,
            BuildError::MissingSource(_)
                | BuildError::ServerBind(_)
                | BuildError::BrowserLaunch(_)
                | BuildError::NoMatchingTarget(_)
                | BuildError::OutputSetup(_)
                | BuildError::Configuration(_)
        )
    }
}

/// Convenience conversion from [`String`] to [`BuildError::Configuration`].
impl From<String> for BuildError {
    fn from(msg: String) -> Self {
        BuildError::Configuration(msg)
    }
}

/// Convenience conversion from `&str` to [`BuildError::Configuration`].
impl From<&str> for BuildError {
    fn from(msg: &str) -> Self {
        BuildError::Configuration(msg.to_string())
    }
}

/// Result type alias using [`BuildError`].
pub type Result<T> = std::result::Result<T, BuildError>;

/// Failures scoped to one target.
///
/// These never escape the worker that produced them: the worker converts
/// them into a failed record and moves on to the next target.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// A new page (tab) could not be opened in the browser.
    #[error("Failed to open page: {0}")]
    TabCreation(String),

    /// Navigation to the render host failed or timed out.
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// A script evaluated in the page failed or returned unexpected data.
    #[error("Page evaluation failed: {0}")]
    Evaluation(String),

    /// The master template could not be read for composition.
    #[error("Composition failed: {0}")]
    Compose(String),

    /// The composed document could not be written.
    #[error("Write failed: {0}")]
    Write(String),

    /// The task processing the target panicked.
    #[error("Render task panicked: {0}")]
    Panicked(String),
}

// ============================================================================
// Unit Tests
// ============================================================================
