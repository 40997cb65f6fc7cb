//! Template composition.
//!
//! Merges a freshly read copy of the master template with what a renderer
//! extracted from the live page, producing the document written for one
//! target:
//!
//! 1. The region between the `data-static="begin"` and `data-static="end"`
//!    marker elements is replaced with the rendered fragment.
//! 2. The template `<head>` is replaced with the rendered head, baking the
//!    per-target title, canonical URL and social preview tags into the file.
//! 3. A script setting `window.__IS_STATIC_PAGE__ = true` is inserted before
//!    `</head>` so the client application skips re-fetching.
//! 4. Relative asset references get a `../` prefix because the document is
//!    written one directory below the template.
//!
//! Steps 1–3 only happen when the page reported a result. Step 4 always runs.
//! Missing markers degrade to an unmodified body and are reported as
//! [`CompositionWarning`]s rather than errors.

use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, NoExpand, Regex};

use crate::error::RenderError;
use crate::render::RenderedPage;

/// Script inserted before `</head>` in documents carrying a result.
pub const STATIC_PAGE_MARKER: &str = "\n    <script>\n        window.__IS_STATIC_PAGE__ = true;\n    </script>\n";

const STATIC_PAGE_FLAG: &str = "window.__IS_STATIC_PAGE__ = true";

static BEGIN_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<div\b[^>]*\bdata-static=["']begin["'][^>]*>\s*</div>"#)
        .expect("begin marker regex must compile")
});

static END_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<div\b[^>]*\bdata-static=["']end["'][^>]*>\s*</div>"#)
        .expect("end marker regex must compile")
});

// `<head>` or `<head attr…>`, never `<header>`.
static HEAD_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<head(?:\s[^>]*)?>.*?</head>").expect("head regex must compile")
});

static ASSET_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    const EXT: &str = r"\.(?:png|svg|jpg|jpeg|gif|webp|css|js)";
    Regex::new(&format!(
        r#"(?i)\b(src|href)=(?:"([^"]+{EXT})"|'([^']+{EXT})')"#
    ))
    .expect("asset reference regex must compile")
});

static URL_SCHEME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").expect("scheme regex must compile")
});

/// A non-fatal problem met while composing a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompositionWarning {
    /// At least one marker element is missing from the template.
    MarkersMissing {
        /// Whether the begin marker was found.
        begin_found: bool,
        /// Whether the end marker was found.
        end_found: bool,
    },
    /// The end marker precedes the begin marker.
    MarkersOutOfOrder {
        /// Byte offset of the begin marker.
        begin: usize,
        /// Byte offset of the end marker.
        end: usize,
    },
    /// The template has no `<head>` element to replace.
    TemplateHeadMissing,
    /// The renderer returned an empty head.
    RenderedHeadEmpty,
    /// No `</head>` was found to anchor the static page marker.
    StaticMarkerNotInserted,
}

impl fmt::Display for CompositionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let found = |b: bool| if b { "found" } else { "not found" };
        match self {
            CompositionWarning::MarkersMissing {
                begin_found,
                end_found,
            } => write!(
                f,
                "static markers missing (begin: {}, end: {}), body left unmodified",
                found(*begin_found),
                found(*end_found)
            ),
            CompositionWarning::MarkersOutOfOrder { begin, end } => write!(
                f,
                "static markers out of order (begin: {}, end: {}), body left unmodified",
                begin, end
            ),
            CompositionWarning::TemplateHeadMissing => {
                f.write_str("template has no <head>, rendered head dropped")
            }
            CompositionWarning::RenderedHeadEmpty => {
                f.write_str("rendered head is empty, template head kept")
            }
            CompositionWarning::StaticMarkerNotInserted => {
                f.write_str("no </head> found, static page marker not inserted")
            }
        }
    }
}

/// Final HTML for one target, plus what composition did to get there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedDocument {
    html: String,
    body_replaced: bool,
    head_replaced: bool,
    warnings: Vec<CompositionWarning>,
}

impl ComposedDocument {
    /// The document text.
    pub fn html(&self) -> &str {
        &self.html
    }

    /// Consume the document, returning its text.
    pub fn into_html(self) -> String {
        self.html
    }

    /// Whether the marker region was replaced with the rendered fragment.
    pub fn body_replaced(&self) -> bool {
        self.body_replaced
    }

    /// Whether the template head was replaced with the rendered head.
    pub fn head_replaced(&self) -> bool {
        self.head_replaced
    }

    /// Degradations met while composing.
    pub fn warnings(&self) -> &[CompositionWarning] {
        &self.warnings
    }
}

/// Compose the document for a rendered page.
///
/// # Example
///
/// ```rust
/// use static_prerender::compose::compose;
/// use static_prerender::RenderedPage;
///
/// let template = concat!(
///     "<html><head><title>Report</title></head><body>",
///     r#"<div class="static-wrapper" data-static="begin"></div>"#,
///     "<p>search</p>",
///     r#"<div class="static-wrapper" data-static="end"></div>"#,
///     "</body></html>",
/// );
/// let page = RenderedPage::with_result("<p>card</p>", "<head><title>example.org</title></head>");
///
/// let doc = compose(template, &page);
/// assert!(doc.html().contains("<p>card</p>"));
/// assert!(!doc.html().contains("<p>search</p>"));
/// assert!(doc.html().contains("<title>example.org</title>"));
/// ```
pub fn compose(template: &str, page: &RenderedPage) -> ComposedDocument {
    let mut html = template.to_string();
    let mut warnings = Vec::new();
    let mut body_replaced = false;
    let mut head_replaced = false;

    if page.result_present {
        match replace_static_region(&html, &page.fragment) {
            Ok(replaced) => {
                html = replaced;
                body_replaced = true;
            }
            Err(warning) => warnings.push(warning),
        }

        if page.head.trim().is_empty() {
            warnings.push(CompositionWarning::RenderedHeadEmpty);
        } else {
            match replace_head(&html, &page.head) {
                Some(replaced) => {
                    html = replaced;
                    head_replaced = true;
                }
                None => warnings.push(CompositionWarning::TemplateHeadMissing),
            }
        }

        match insert_static_marker(&html) {
            Some(marked) => html = marked,
            None => warnings.push(CompositionWarning::StaticMarkerNotInserted),
        }
    }

    let html = rewrite_asset_paths(&html).into_owned();

    ComposedDocument {
        html,
        body_replaced,
        head_replaced,
        warnings,
    }
}

/// Replace everything between the begin and end markers with `fragment`.
///
/// The markers themselves are kept.
///
/// # Errors
///
/// Returns the [`CompositionWarning`] describing why the region could not be
/// located; the caller keeps the template body as-is.
pub fn replace_static_region(
    html: &str,
    fragment: &str,
) -> std::result::Result<String, CompositionWarning> {
    let begin = BEGIN_MARKER.find(html);
    let end = END_MARKER.find(html);

    let (begin, end) = match (begin, end) {
        (Some(begin), Some(end)) => (begin, end),
        (begin, end) => {
            return Err(CompositionWarning::MarkersMissing {
                begin_found: begin.is_some(),
                end_found: end.is_some(),
            });
        }
    };

    if end.start() < begin.end() {
        return Err(CompositionWarning::MarkersOutOfOrder {
            begin: begin.start(),
            end: end.start(),
        });
    }

    let mut out = String::with_capacity(html.len() + fragment.len());
    out.push_str(&html[..begin.end()]);
    out.push_str("\n        ");
    out.push_str(fragment);
    out.push_str("\n    ");
    out.push_str(&html[end.start()..]);
    Ok(out)
}

/// Replace the first `<head>…</head>` element with `head`.
///
/// Returns `None` when the document has no head element.
pub fn replace_head(html: &str, head: &str) -> Option<String> {
    if !HEAD_ELEMENT.is_match(html) {
        return None;
    }
    Some(HEAD_ELEMENT.replace(html, NoExpand(head)).into_owned())
}

/// Insert [`STATIC_PAGE_MARKER`] before the first `</head>`.
///
/// A document that already carries the marker is returned unchanged.
/// Returns `None` when there is no `</head>`.
pub fn insert_static_marker(html: &str) -> Option<String> {
    if html.contains(STATIC_PAGE_FLAG) {
        return Some(html.to_string());
    }
    let at = html.find("</head>")?;
    let mut out = String::with_capacity(html.len() + STATIC_PAGE_MARKER.len());
    out.push_str(&html[..at]);
    out.push_str(STATIC_PAGE_MARKER);
    out.push_str(&html[at..]);
    Some(out)
}

/// Prefix relative asset references with `../`.
///
/// Only `src`/`href` values ending in an image, script or stylesheet
/// extension are considered. Values that are absolute (any URL scheme),
/// protocol-relative, root-relative or already start with `../` are left
/// untouched, so applying the rewrite twice changes nothing.
///
/// # Example
///
/// ```rust
/// use static_prerender::compose::rewrite_asset_paths;
///
/// let html = r#"<img src="logo.svg"><script src="https://cdn.test/x.js"></script>"#;
/// let once = rewrite_asset_paths(html);
/// assert_eq!(once, r#"<img src="../logo.svg"><script src="https://cdn.test/x.js"></script>"#);
/// assert_eq!(rewrite_asset_paths(&once), once);
/// ```
pub fn rewrite_asset_paths(html: &str) -> Cow<'_, str> {
    ASSET_REFERENCE.replace_all(html, |caps: &Captures<'_>| {
        let attr = &caps[1];
        let (quote, value) = match (caps.get(2), caps.get(3)) {
            (Some(value), _) => ('"', value.as_str()),
            (None, Some(value)) => ('\'', value.as_str()),
            (None, None) => return caps[0].to_string(),
        };

        if is_absolute_or_adjusted(value) {
            caps[0].to_string()
        } else {
            format!("{attr}={quote}../{value}{quote}")
        }
    })
}

fn is_absolute_or_adjusted(value: &str) -> bool {
    value.starts_with('/') || value.starts_with("../") || URL_SCHEME.is_match(value)
}

/// Composes documents from the master template on disk.
///
/// The template is read again for every target so each document starts from
/// pristine text.
#[derive(Debug, Clone)]
pub struct Compositor {
    template_path: PathBuf,
}

impl Compositor {
    /// Create a compositor reading the template at `template_path`.
    pub fn new(template_path: impl Into<PathBuf>) -> Self {
        Self {
            template_path: template_path.into(),
        }
    }

    /// Path of the master template.
    pub fn template_path(&self) -> &Path {
        &self.template_path
    }

    /// Read the template and compose the document for `page`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Compose`] if the template cannot be read.
    pub async fn compose(&self, page: &RenderedPage) -> std::result::Result<ComposedDocument, RenderError> {
        let template = tokio::fs::read_to_string(&self.template_path)
            .await
            .map_err(|e| {
                RenderError::Compose(format!("{}: {}", self.template_path.display(), e))
            })?;
        Ok(compose(&template, page))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
