//! Command line entry point.
//!
//! # Usage
//!
//! ```bash
//! # Smoke run: render the first catalog target only
//! static-prerender
//!
//! # Render every target
//! static-prerender --all
//!
//! # Render targets matching a site name
//! static-prerender article19.org
//! ```
//!
//! Exits with status 1 on any fatal condition (missing catalog, no browser
//! launched, no matching target). Individual target failures are reported
//! but do not change the exit status.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use static_prerender::{BuildConfigBuilder, TargetSelection, run_build};

/// Render report pages into static HTML.
#[derive(Parser, Debug)]
#[command(name = "static-prerender", version, about)]
struct Cli {
    /// Site name or substring selecting the targets to render
    site: Option<String>,

    /// Render every target in the catalog
    #[arg(long)]
    all: bool,

    /// Number of browser instances
    #[arg(short = 'w', long)]
    workers: Option<usize>,

    /// Render host port (0 picks a free port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Project root containing index.html and test-result/
    #[arg(long)]
    root: Option<PathBuf>,

    /// Output directory (default: <root>/web)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Target catalog (default: <root>/test-result/statistic.tsv)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Chrome/Chromium binary
    #[arg(long, env = "CHROME_PATH")]
    chrome_path: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, mut builder: BuildConfigBuilder) -> BuildConfigBuilder {
        if let Some(root) = &self.root {
            builder = builder.project_root(root);
        }
        if let Some(output) = &self.output {
            builder = builder.output_dir(output);
        }
        if let Some(catalog) = &self.catalog {
            builder = builder.catalog(catalog);
        }
        if let Some(workers) = self.workers {
            builder = builder.worker_count(workers);
        }
        if let Some(port) = self.port {
            builder = builder.host_port(port);
        }
        if let Some(chrome_path) = &self.chrome_path {
            builder = builder.chrome_path(chrome_path);
        }
        builder
    }
}

fn base_builder() -> BuildConfigBuilder {
    #[cfg(feature = "env-config")]
    {
        static_prerender::config::env::builder_from_env()
    }
    #[cfg(not(feature = "env-config"))]
    {
        BuildConfigBuilder::new()
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let selection = TargetSelection::from_args(cli.all, cli.site.as_deref());

    let config = match cli.apply(base_builder()).build() {
        Ok(config) => config,
        Err(e) => {
            log::error!("❌ {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run_build(&config, &selection).await {
        Ok(report) => {
            println!("{}", report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("❌ Build aborted: {}", e);
            ExitCode::FAILURE
        }
    }
}
