//! Browser instance factories.
//!
//! The dispatcher launches one renderer per worker through a
//! [`BrowserFactory`]. Production runs use [`ChromeBrowserFactory`]; tests use
//! [`mock::MockBrowserFactory`], which needs no Chrome installation.
//!
//! | Factory | Instance | Description |
//! |---------|----------|-------------|
//! | [`ChromeBrowserFactory`] | [`ChromeRenderer`](crate::ChromeRenderer) | Headless Chrome/Chromium |
//! | [`mock::MockBrowserFactory`] | [`mock::MockRenderer`] | Scripted outcomes (feature-gated) |
//!
//! # Custom Factory
//!
//! ```rust,ignore
//! use static_prerender::{BrowserFactory, PageRenderer, RenderOutcome, Result, TargetIdentifier};
//!
//! struct Fixed;
//!
//! impl PageRenderer for Fixed {
//!     async fn render(&self, _target: &TargetIdentifier) -> RenderOutcome {
//!         todo!()
//!     }
//! }
//!
//! struct FixedFactory;
//!
//! impl BrowserFactory for FixedFactory {
//!     type Instance = Fixed;
//!     fn launch(&self, _worker_id: usize) -> Result<Fixed> {
//!         Ok(Fixed)
//!     }
//! }
//! ```

mod chrome;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use chrome::{ChromeBrowserFactory, create_chrome_options};

use crate::error::Result;
use crate::render::PageRenderer;

/// Launches renderer instances.
///
/// # Thread Safety
///
/// Factories are shared by the launch tasks, which run concurrently on the
/// blocking pool, hence `Send + Sync`.
///
/// # Blocking
///
/// [`launch`](Self::launch) may block for seconds (process start-up) and is
/// always called from [`tokio::task::spawn_blocking`].
pub trait BrowserFactory: Send + Sync + 'static {
    /// Renderer produced by this factory.
    type Instance: PageRenderer;

    /// Launch one instance for worker `worker_id`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::BrowserLaunch`](crate::BuildError::BrowserLaunch)
    /// if the instance cannot be started.
    fn launch(&self, worker_id: usize) -> Result<Self::Instance>;
}
