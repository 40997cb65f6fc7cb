//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use static_prerender::{BuildConfig, BuildConfigBuilder};
use tempfile::TempDir;

pub const TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Web Resilience Report</title>
    <link rel="stylesheet" href="styles.css">
</head>
<body>
    <header><img src="g0v_logo.svg" alt="g0v"></header>
    <div class="static-wrapper" data-static="begin"></div>
    <div id="search"><input placeholder="Search a site"></div>
    <div class="static-wrapper" data-static="end"></div>
    <script src="app.js"></script>
</body>
</html>
"#;

pub const CATALOG_HEADER: &str = "url\tstatus\tscore";

/// A project directory laid out like the report site.
pub struct Project {
    dir: TempDir,
}

impl Project {
    /// Create a project whose catalog lists `urls`.
    pub fn with_targets(urls: &[&str]) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();

        std::fs::write(root.join("index.html"), TEMPLATE).unwrap();
        std::fs::write(root.join("styles.css"), "body { margin: 0; }").unwrap();
        std::fs::write(root.join("app.js"), "console.log('app');").unwrap();
        std::fs::write(root.join("g0v_logo.svg"), "<svg></svg>").unwrap();

        let data = root.join("test-result");
        std::fs::create_dir_all(&data).unwrap();

        let mut catalog = String::from(CATALOG_HEADER);
        catalog.push('\n');
        for url in urls {
            catalog.push_str(url);
            catalog.push_str("\tok\t90\n");
        }
        std::fs::write(data.join("statistic.tsv"), catalog).unwrap();
        std::fs::write(data.join("example.org.json"), r#"{"url":"https://example.org/"}"#)
            .unwrap();

        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root().join("web")
    }

    /// Configuration with an ephemeral port and short waits.
    pub fn config(&self, workers: usize) -> BuildConfig {
        self.builder().worker_count(workers).build().unwrap()
    }

    pub fn builder(&self) -> BuildConfigBuilder {
        BuildConfigBuilder::new()
            .project_root(self.root())
            .host_port(0)
            .result_timeout(Duration::from_millis(200))
            .settle_delay(Duration::ZERO)
            .poll_interval(Duration::from_millis(20))
    }

    /// Read a generated document by output key.
    pub fn document(&self, key: &str) -> String {
        std::fs::read_to_string(self.output_dir().join(key).join("index.html"))
            .unwrap_or_else(|e| panic!("document for {} missing: {}", key, e))
    }

    /// Every generated directory below the output root.
    pub fn output_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = std::fs::read_dir(self.output_dir())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        keys.sort();
        keys
    }
}
