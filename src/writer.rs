//! Output directory management.
//!
//! Layout of a finished run:
//!
//! ```text
//! <output_dir>/
//! ├── index.html            copy of the template (search page)
//! ├── 404.html              template with asset paths adjusted
//! ├── styles.css, app.js…   static assets
//! └── <OutputKey>/
//!     └── index.html        composed document per target
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::compose::{ComposedDocument, rewrite_asset_paths};
use crate::config::ProjectPaths;
use crate::error::{BuildError, RenderError, Result};
use crate::target::{OutputKey, TargetIdentifier};

/// File name of every written document.
pub const DOCUMENT_FILE_NAME: &str = "index.html";

/// File name of the not-found page.
pub const NOT_FOUND_FILE_NAME: &str = "404.html";

/// Writes composed documents below the output directory.
///
/// Writes are immediate and independent: a document is on disk as soon as
/// its target finishes, and a crashed run leaves finished targets intact.
#[derive(Debug)]
pub struct OutputWriter {
    root: PathBuf,
    claimed: Mutex<HashMap<OutputKey, TargetIdentifier>>,
}

impl OutputWriter {
    /// Create a writer rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            claimed: Mutex::new(HashMap::new()),
        }
    }

    /// Output directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the document for `target` is written.
    pub fn output_path(&self, target: &TargetIdentifier) -> PathBuf {
        self.root
            .join(target.output_key().as_str())
            .join(DOCUMENT_FILE_NAME)
    }

    /// Prepare the output directory before any target is rendered.
    ///
    /// Creates the directory, copies the template as the site index, writes
    /// `404.html` from the template with asset paths adjusted, and copies the
    /// configured static assets. Assets missing from the project are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::OutputSetup`] if the directory, the index or the
    /// not-found page cannot be written.
    pub async fn prepare(&self, paths: &ProjectPaths) -> Result<()> {
        let setup = |what: &str, path: &Path, e: std::io::Error| {
            log::error!("❌ Failed to {} {}: {}", what, path.display(), e);
            BuildError::OutputSetup(format!("{} {}: {}", what, path.display(), e))
        };

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| setup("create", &self.root, e))?;

        let template = tokio::fs::read_to_string(&paths.template)
            .await
            .map_err(|e| setup("read", &paths.template, e))?;

        let index = self.root.join(DOCUMENT_FILE_NAME);
        tokio::fs::write(&index, &template)
            .await
            .map_err(|e| setup("write", &index, e))?;

        let not_found = self.root.join(NOT_FOUND_FILE_NAME);
        tokio::fs::write(&not_found, rewrite_asset_paths(&template).as_bytes())
            .await
            .map_err(|e| setup("write", &not_found, e))?;

        let mut copied = 0;
        for asset in &paths.static_assets {
            let from = paths.asset_root.join(asset);
            let to = self.root.join(asset);
            match tokio::fs::copy(&from, &to).await {
                Ok(_) => copied += 1,
                Err(e) => log::debug!("Skipping asset {}: {}", from.display(), e),
            }
        }

        log::info!(
            "✅ Output prepared at {} ({} of {} assets copied)",
            self.root.display(),
            copied,
            paths.static_assets.len()
        );
        Ok(())
    }

    /// Write the document for `target`, returning its path.
    ///
    /// Logs a warning when another target of this run already wrote to the
    /// same output key; the later document wins.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Write`] if the directory or file cannot be written.
    pub async fn write(
        &self,
        target: &TargetIdentifier,
        document: &ComposedDocument,
    ) -> std::result::Result<PathBuf, RenderError> {
        let key = target.output_key();

        {
            let mut claimed = self.claimed.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(previous) = claimed.insert(key.clone(), target.clone()) {
                if &previous != target {
                    log::warn!(
                        "⚠️ Output key {} shared by {} and {}, overwriting",
                        key,
                        previous,
                        target
                    );
                }
            }
        }

        let dir = self.root.join(key.as_str());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| RenderError::Write(format!("{}: {}", dir.display(), e)))?;

        let path = dir.join(DOCUMENT_FILE_NAME);
        tokio::fs::write(&path, document.html())
            .await
            .map_err(|e| RenderError::Write(format!("{}: {}", path.display(), e)))?;

        log::debug!("Wrote {}", path.display());
        Ok(path)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::compose;
    use crate::render::RenderedPage;

    const TEMPLATE: &str = r#"<html><head><link href="styles.css"></head><body><img src="g0v_logo.svg"></body></html>"#;

    fn target(url: &str) -> TargetIdentifier {
        TargetIdentifier::from_url(url).unwrap()
    }

    /// Verifies documents land in `<key>/index.html`.
    #[tokio::test]
    async fn test_write_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(dir.path());
        let target = target("https://example.org/news?id=1");
        let doc = compose(TEMPLATE, &RenderedPage::without_result());

        let path = writer.write(&target, &doc).await.unwrap();
        assert_eq!(path, dir.path().join("example.org_news_id_1").join("index.html"));
        assert_eq!(path, writer.output_path(&target));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), doc.html());
    }

    /// Verifies rewriting a target overwrites its document.
    #[tokio::test]
    async fn test_write_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(dir.path());
        let target = target("https://example.org");

        let first = compose(TEMPLATE, &RenderedPage::without_result());
        let second = compose(TEMPLATE, &RenderedPage::with_result("x", "<head></head>"));
        writer.write(&target, &first).await.unwrap();
        let path = writer.write(&target, &second).await.unwrap();

        assert_eq!(std::fs::read_to_string(path).unwrap(), second.html());
    }

    /// Verifies an unwritable root yields a per-target write error.
    #[tokio::test]
    async fn test_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        let writer = OutputWriter::new(&blocker);
        let doc = compose(TEMPLATE, &RenderedPage::without_result());
        let result = writer.write(&target("https://example.org"), &doc).await;
        assert!(matches!(result, Err(RenderError::Write(_))));
    }

    /// Verifies output preparation writes index, 404 and available assets.
    #[tokio::test]
    async fn test_prepare_output() {
        let project = tempfile::tempdir().unwrap();
        std::fs::write(project.path().join("index.html"), TEMPLATE).unwrap();
        std::fs::write(project.path().join("styles.css"), "body{}").unwrap();

        let paths = ProjectPaths::from_root(project.path());
        let writer = OutputWriter::new(&paths.output_dir);
        writer.prepare(&paths).await.unwrap();

        let out = &paths.output_dir;
        assert_eq!(std::fs::read_to_string(out.join("index.html")).unwrap(), TEMPLATE);

        let not_found = std::fs::read_to_string(out.join("404.html")).unwrap();
        assert!(not_found.contains(r#"href="../styles.css""#));
        assert!(not_found.contains(r#"src="../g0v_logo.svg""#));

        assert_eq!(std::fs::read_to_string(out.join("styles.css")).unwrap(), "body{}");
        assert!(!out.join("app.js").exists());
    }

    /// Verifies a missing template fails preparation.
    #[tokio::test]
    async fn test_prepare_missing_template() {
        let project = tempfile::tempdir().unwrap();
        let paths = ProjectPaths::from_root(project.path());
        let writer = OutputWriter::new(&paths.output_dir);

        let result = writer.prepare(&paths).await;
        assert!(matches!(result, Err(BuildError::OutputSetup(_))));
    }
}
