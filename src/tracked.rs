//! Browser instances with identity and launch validation.
//!
//! A [`TrackedBrowser`] wraps a launched [`Browser`] with a process-wide
//! unique id used in logs, and is only handed out after a validation round
//! trip proves the DevTools connection works.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use headless_chrome::Browser;

use crate::error::{BuildError, Result};

/// A launched, validated browser instance.
///
/// # Lifecycle
///
/// ```text
/// Browser launched
///       │
///       ▼
/// TrackedBrowser::new()  ──→  Validation (new_tab, navigate, close)
///       │
///       ▼
/// Owned by one worker for the whole run
///       │
///       ▼
/// Dropped after the queue drains ──→ Chrome process exits
/// ```
#[derive(Clone)]
pub(crate) struct TrackedBrowser {
    id: u64,
    browser: Arc<Browser>,
    created_at: Instant,
}

impl TrackedBrowser {
    /// Validate `browser` and start tracking it.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::BrowserLaunch`] if the browser cannot open a tab
    /// or navigate it.
    pub(crate) fn new(browser: Browser) -> Result<Self> {
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);

        let browser = Arc::new(browser);
        let created_at = Instant::now();

        log::debug!(" Validating new browser instance...");

        let tab = browser.new_tab().map_err(|e| {
            log::error!("❌ Browser validation failed at new_tab(): {}", e);
            BuildError::BrowserLaunch(e.to_string())
        })?;

        tab.navigate_to("data:text/html,<html></html>").map_err(|e| {
            log::error!("❌ Browser validation failed at navigate_to(): {}", e);
            let _ = tab.close(true);
            BuildError::BrowserLaunch(e.to_string())
        })?;

        let _ = tab.close(true);

        log::debug!("✅ Browser validation passed");

        Ok(TrackedBrowser {
            id: NEXT_ID.fetch_add(1, Ordering::SeqCst),
            browser,
            created_at,
        })
    }

    #[inline]
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub(crate) fn browser(&self) -> &Arc<Browser> {
        &self.browser
    }

    /// Time since launch.
    #[inline]
    pub(crate) fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

impl std::fmt::Debug for TrackedBrowser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedBrowser")
            .field("id", &self.id)
            .field("age_secs", &self.age().as_secs())
            .finish_non_exhaustive()
    }
}
