//! Target identifiers and the output keys derived from them.
//!
//! A [`TargetIdentifier`] is a URL with its scheme and trailing slashes
//! removed (`https://example.org/` becomes `example.org`). It is the unit of
//! work handed to a renderer and the value passed to the client application
//! as the `url` query parameter.
//!
//! An [`OutputKey`] is the filesystem-safe directory name derived from an
//! identifier.
//!
//! # Known limitation
//!
//! Output keys are truncated to [`OUTPUT_KEY_MAX_LEN`] characters. Two long
//! identifiers sharing the same prefix therefore map to the same directory
//! and the later write wins. The [`OutputWriter`](crate::OutputWriter) logs a
//! warning when that happens within one run.

use std::fmt;

/// Maximum length of an [`OutputKey`] in characters.
pub const OUTPUT_KEY_MAX_LEN: usize = 100;

/// URL schemes accepted in the catalog's first column.
pub const URL_SCHEMES: [&str; 2] = ["https://", "http://"];

/// Normalized URL naming one page to render.
///
/// # Example
///
/// ```rust
/// use static_prerender::TargetIdentifier;
///
/// let target = TargetIdentifier::from_url("https://example.org/").unwrap();
/// assert_eq!(target.as_str(), "example.org");
/// assert!(TargetIdentifier::from_url("example.org").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetIdentifier(String);

impl TargetIdentifier {
    /// Build an identifier from a URL that carries a recognized scheme.
    ///
    /// Returns `None` when the value lacks an `http://`/`https://` prefix or
    /// nothing remains after normalization.
    pub fn from_url(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if !URL_SCHEMES.iter().any(|scheme| raw.starts_with(scheme)) {
            return None;
        }

        let normalized = normalize(raw);
        if normalized.is_empty() {
            return None;
        }

        Some(Self(normalized.to_string()))
    }

    /// The normalized identifier text.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive the directory name this target is written under.
    pub fn output_key(&self) -> OutputKey {
        OutputKey::derive(&self.0)
    }

    /// Whether this target matches a user-supplied site selector.
    ///
    /// The selector is normalized like an identifier (scheme optional), then
    /// matches when either string contains the other, so `article19.org`
    /// selects `www.article19.org`.
    pub fn matches(&self, selector: &str) -> bool {
        let pattern = normalize(selector.trim());
        if pattern.is_empty() {
            return false;
        }
        self.0.contains(pattern) || pattern.contains(self.0.as_str())
    }
}

impl fmt::Display for TargetIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TargetIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Strip a leading scheme, then trailing slashes.
fn normalize(raw: &str) -> &str {
    URL_SCHEMES
        .iter()
        .find_map(|scheme| raw.strip_prefix(scheme))
        .unwrap_or(raw)
        .trim_end_matches('/')
}

/// Filesystem-safe directory name derived from a [`TargetIdentifier`].
///
/// Every character outside `[A-Za-z0-9._-]` becomes `_` and the result is cut
/// at [`OUTPUT_KEY_MAX_LEN`] characters.
///
/// # Example
///
/// ```rust
/// use static_prerender::TargetIdentifier;
///
/// let target = TargetIdentifier::from_url("https://example.org/path?q=1").unwrap();
/// assert_eq!(target.output_key().as_str(), "example.org_path_q_1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputKey(String);

impl OutputKey {
    fn derive(identifier: &str) -> Self {
        let key = identifier
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .take(OUTPUT_KEY_MAX_LEN)
            .collect();
        Self(key)
    }

    /// The directory name.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OutputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
