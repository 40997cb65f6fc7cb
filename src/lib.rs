//! # static-prerender
//!
//! Renders the pages of a client-side report site into standalone static
//! HTML files by driving a small pool of headless Chrome instances.
//!
//! The report site is a single template (`index.html`) whose client
//! application reads a `?url=` query parameter, fetches that site's test
//! result and fills a marked region of the page. This crate loads every page
//! once in a real browser, captures the filled region and the updated
//! `<head>`, and writes one self-contained document per tested site.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐     ┌──────────────────────────────────────────────┐
//! │ Catalog (TSV) │──→──│ Dispatcher                                   │
//! └───────────────┘     │  TargetQueue ─→ worker 0 … worker N          │
//!                       │   each: render ─→ compose ─→ write           │
//! ┌───────────────┐     └─────────┬──────────────────────┬─────────────┘
//! │ Render Host   │←── browsers ──┘                      │
//! │ (axum, local) │                                      ▼
//! └───────────────┘                          web/<OutputKey>/index.html
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use static_prerender::{BuildConfigBuilder, TargetSelection, run_build};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BuildConfigBuilder::new()
//!         .project_root(".")
//!         .worker_count(8)
//!         .build()?;
//!
//!     let report = run_build(&config, &TargetSelection::All).await?;
//!     println!("{}", report);
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Configuration
//!
//! With the `env-config` feature (default), configuration can be loaded from
//! an `app.env` file and the process environment; see [`config::env`].
//!
//! ```text
//! PRERENDER_WORKERS=8
//! PRERENDER_PORT=3000
//! PRERENDER_RESULT_TIMEOUT_MS=10000
//! CHROME_PATH=/usr/bin/chromium
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `env-config` | Environment-based configuration (default) |
//! | `test-utils` | Enable mock factory for testing |
//!
//! ## Error Handling
//!
//! Fatal conditions return [`BuildError`]; anything scoped to one target is
//! a [`RenderError`] recorded in the [`BuildReport`].
//!
//! ```rust,ignore
//! match run_build(&config, &selection).await {
//!     Ok(report) if report.failed() > 0 => log::warn!("{}", report),
//!     Ok(report) => log::info!("{}", report),
//!     Err(BuildError::NoMatchingTarget(selector)) => eprintln!("nothing matches {}", selector),
//!     Err(e) => eprintln!("build aborted: {}", e),
//! }
//! ```
//!
//! ## Testing
//!
//! For testing without Chrome, enable the `test-utils` feature and use
//! [`MockBrowserFactory`](factory::mock::MockBrowserFactory) with
//! [`run_build_with`](pipeline::run_build_with):
//!
//! ```rust,ignore
//! use static_prerender::factory::mock::MockBrowserFactory;
//!
//! let report = run_build_with(&config, &TargetSelection::All, |_| MockBrowserFactory::new()).await?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// Modules
// ============================================================================

pub mod catalog;
pub mod compose;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod factory;
pub mod host;
pub mod pipeline;
pub mod prelude;
pub mod render;
pub mod report;
pub mod target;
pub mod writer;

// Internal modules (not publicly exposed)
pub(crate) mod tracked;

// ============================================================================
// Re-exports (Public API)
// ============================================================================

pub use catalog::{TargetSelection, load_catalog, parse_catalog};
pub use compose::{ComposedDocument, CompositionWarning, Compositor};
pub use config::{BuildConfig, BuildConfigBuilder, ProjectPaths};
pub use dispatcher::{Dispatcher, DispatcherBuilder, TargetQueue};
pub use error::{BuildError, RenderError, Result};
pub use factory::{BrowserFactory, ChromeBrowserFactory, create_chrome_options};
pub use host::RenderHost;
pub use pipeline::{run_build, run_build_with};
pub use render::{ChromeRenderer, PageRenderer, RenderOutcome, RenderSettings, RenderedPage};
pub use report::{BuildReport, TargetRecord, TargetStatus};
pub use target::{OutputKey, TargetIdentifier};
pub use writer::OutputWriter;

#[cfg(feature = "env-config")]
pub use config::env::{chrome_path_from_env, from_env};
