//! Target catalog loading and selection.
//!
//! The catalog is a tab-separated table whose first column holds the URL of
//! each tested site. The first non-blank line is a header and is skipped.
//!
//! # Example
//!
//! ```rust
//! use static_prerender::catalog::{parse_catalog, TargetSelection};
//!
//! let tsv = b"url\tscore\nhttps://example.org/\t9\nnot a url\t1\n";
//! let targets = parse_catalog(tsv);
//! assert_eq!(targets.len(), 1);
//! assert_eq!(targets[0].as_str(), "example.org");
//!
//! let selected = TargetSelection::Smoke.apply(targets).unwrap();
//! assert_eq!(selected.len(), 1);
//! ```

use std::collections::HashSet;
use std::path::Path;

use crate::error::{BuildError, Result};
use crate::target::TargetIdentifier;

/// Parse catalog bytes into the ordered, de-duplicated list of targets.
///
/// Rows whose first field is empty or lacks a URL scheme are skipped
/// silently. When a URL appears more than once only its first occurrence is
/// kept.
pub fn parse_catalog(bytes: &[u8]) -> Vec<TargetIdentifier> {
    let text = String::from_utf8_lossy(bytes);
    let mut seen = HashSet::new();
    let mut targets = Vec::new();

    for line in text.lines().filter(|line| !line.trim().is_empty()).skip(1) {
        let first = line.split('\t').next().unwrap_or_default();
        let Some(target) = TargetIdentifier::from_url(first) else {
            log::trace!("Skipping catalog row without URL: {:?}", first);
            continue;
        };

        if seen.insert(target.clone()) {
            targets.push(target);
        } else {
            log::debug!("Skipping duplicate catalog entry: {}", target);
        }
    }

    targets
}

/// Read and parse the catalog at `path`.
///
/// # Errors
///
/// Returns [`BuildError::MissingSource`] if the file cannot be read.
pub fn load_catalog(path: &Path) -> Result<Vec<TargetIdentifier>> {
    log::info!("Reading target catalog from {}", path.display());

    let bytes = std::fs::read(path).map_err(|e| {
        log::error!("❌ Catalog not readable at {}: {}", path.display(), e);
        BuildError::MissingSource(format!("{}: {}", path.display(), e))
    })?;

    let targets = parse_catalog(&bytes);
    log::info!("Catalog lists {} targets", targets.len());
    Ok(targets)
}

/// Which catalog targets a run renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSelection {
    /// Render only the first target (the default, used as a smoke test).
    Smoke,
    /// Render every target.
    All,
    /// Render the targets matching a site name or substring.
    Matching(String),
}

impl TargetSelection {
    /// Selection for the command line: a site selector wins over `--all`,
    /// and neither means a smoke run.
    pub fn from_args(all: bool, site: Option<&str>) -> Self {
        match site.map(str::trim).filter(|s| !s.is_empty()) {
            Some(site) => TargetSelection::Matching(site.to_string()),
            None if all => TargetSelection::All,
            None => TargetSelection::Smoke,
        }
    }

    /// Narrow the catalog targets to this selection.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::NoMatchingTarget`] when a `Matching` selector
    /// selects nothing.
    pub fn apply(&self, targets: Vec<TargetIdentifier>) -> Result<Vec<TargetIdentifier>> {
        match self {
            TargetSelection::Smoke => Ok(targets.into_iter().take(1).collect()),
            TargetSelection::All => Ok(targets),
            TargetSelection::Matching(selector) => {
                let matched: Vec<_> = targets
                    .into_iter()
                    .filter(|target| target.matches(selector))
                    .collect();

                if matched.is_empty() {
                    log::error!("❌ No target matches \"{}\"", selector);
                    return Err(BuildError::NoMatchingTarget(selector.clone()));
                }

                log::info!("Found {} targets matching \"{}\":", matched.len(), selector);
                for target in &matched {
                    log::info!("   - {}", target);
                }
                Ok(matched)
            }
        }
    }
}

impl std::fmt::Display for TargetSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetSelection::Smoke => f.write_str("smoke (first target only)"),
            TargetSelection::All => f.write_str("all targets"),
            TargetSelection::Matching(selector) => write!(f, "targets matching \"{}\"", selector),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
