//! Convenient imports for common usage patterns.
//!
//! ```rust,ignore
//! use static_prerender::prelude::*;
//!
//! let config = BuildConfigBuilder::new().worker_count(4).build()?;
//! let report = run_build(&config, &TargetSelection::Smoke).await?;
//! ```

pub use crate::catalog::TargetSelection;
pub use crate::config::{BuildConfig, BuildConfigBuilder};
pub use crate::error::{BuildError, RenderError, Result};
pub use crate::factory::{BrowserFactory, ChromeBrowserFactory};
pub use crate::pipeline::{run_build, run_build_with};
pub use crate::render::{PageRenderer, RenderOutcome, RenderedPage};
pub use crate::report::BuildReport;
pub use crate::target::TargetIdentifier;

#[cfg(feature = "env-config")]
pub use crate::config::env::from_env;
