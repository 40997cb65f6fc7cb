//! End-to-end build run.
//!
//! ```text
//! catalog ─→ selection ─→ prepare output ─→ bind host ─→ dispatch ─→ stop host
//! ```
//!
//! The render host is stopped on every path once it has been bound,
//! including when the dispatcher fails to launch any browser.

use std::sync::Arc;

use crate::catalog::{TargetSelection, load_catalog};
use crate::compose::Compositor;
use crate::config::BuildConfig;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::factory::{BrowserFactory, ChromeBrowserFactory};
use crate::host::RenderHost;
use crate::render::RenderSettings;
use crate::report::{BuildReport, TargetStatus};
use crate::target::TargetIdentifier;
use crate::writer::OutputWriter;

/// Run a build with headless Chrome.
///
/// # Errors
///
/// Returns the fatal [`BuildError`](crate::BuildError) that aborted the run.
/// Per-target failures are not errors; they are counted in the report.
pub async fn run_build(config: &BuildConfig, selection: &TargetSelection) -> Result<BuildReport> {
    run_build_with(config, selection, |settings| {
        ChromeBrowserFactory::from_config(config, Arc::new(settings))
    })
    .await
}

/// Run a build with a custom factory.
///
/// `make_factory` receives the settings pointing at the bound render host,
/// which are only known once the host is listening.
///
/// # Example
///
/// ```rust,ignore
/// use static_prerender::factory::mock::MockBrowserFactory;
/// use static_prerender::{TargetSelection, pipeline::run_build_with};
///
/// let report = run_build_with(&config, &TargetSelection::All, |_| MockBrowserFactory::new()).await?;
/// ```
pub async fn run_build_with<F, M>(
    config: &BuildConfig,
    selection: &TargetSelection,
    make_factory: M,
) -> Result<BuildReport>
where
    F: BrowserFactory,
    M: FnOnce(RenderSettings) -> F,
{
    log::info!("Starting build: {}", selection);

    let catalog = load_catalog(&config.paths.catalog)?;
    let targets = selection.apply(catalog)?;
    log::info!("{} targets selected", targets.len());

    let writer = OutputWriter::new(&config.paths.output_dir);
    writer.prepare(&config.paths).await?;

    let host = RenderHost::bind(config).await?;
    let settings = RenderSettings::from_config(config, host.base_url().clone());

    let result = render_all(config, targets, writer, make_factory(settings)).await;
    host.shutdown().await;
    let report = result?;

    log::info!("Build finished: {}", report);
    for failure in report.failures() {
        if let TargetStatus::Failed { reason } = &failure.status {
            log::warn!("⚠️ Failed: {} ({})", failure.target, reason);
        }
    }

    if *selection == TargetSelection::Smoke {
        smoke_hint(&report);
    }

    Ok(report)
}

async fn render_all<F: BrowserFactory>(
    config: &BuildConfig,
    targets: Vec<TargetIdentifier>,
    writer: OutputWriter,
    factory: F,
) -> Result<BuildReport> {
    let dispatcher = Dispatcher::builder()
        .factory(factory)
        .worker_count(config.worker_count)
        .compositor(Compositor::new(&config.paths.template))
        .writer(writer)
        .build()?;

    dispatcher.run(targets).await
}

fn smoke_hint(report: &BuildReport) {
    match report.first_output() {
        Some(path) => log::info!("Smoke run wrote {}", path.display()),
        None => log::info!("Smoke run wrote no page"),
    }
    log::info!("Pass --all to render every target, or a site name to render matching targets");
}
