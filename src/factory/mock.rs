//! Mock renderer factory for testing.
//!
//! Produces [`MockRenderer`]s that answer with scripted outcomes, so the
//! dispatcher and the full pipeline can be exercised without Chrome.
//!
//! # Feature Flag
//!
//! This module is only available when:
//! - The `test-utils` feature is enabled, OR
//! - During testing (`#[cfg(test)]`)
//!
//! # Example
//!
//! ```rust,ignore
//! use static_prerender::factory::mock::MockBrowserFactory;
//!
//! // Every launch fails
//! let factory = MockBrowserFactory::always_fails("Chrome not installed");
//!
//! // Two instances launch, the rest fail
//! let factory = MockBrowserFactory::fail_after_n(2, "Resource exhausted");
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use super::BrowserFactory;
use crate::error::{BuildError, Result};
use crate::render::{PageRenderer, RenderOutcome, RenderedPage};
use crate::target::TargetIdentifier;

type OutcomeFn = dyn Fn(&TargetIdentifier) -> RenderOutcome + Send + Sync;

/// Shared log of `(worker_id, target)` pairs in render order.
pub type RenderLog = Arc<Mutex<Vec<(usize, TargetIdentifier)>>>;

/// Mock factory launching scripted renderers.
///
/// By default every target renders with a result whose fragment is
/// `<p>{target}</p>` and whose head is `<head><title>{target}</title></head>`.
pub struct MockBrowserFactory {
    should_fail: bool,
    error_message: String,
    creation_count: Arc<AtomicUsize>,
    fail_after: Option<usize>,
    outcome: Arc<OutcomeFn>,
    delay: Duration,
    renders: RenderLog,
}

impl MockBrowserFactory {
    /// Create a mock factory whose renderers always report a result.
    pub fn new() -> Self {
        Self {
            should_fail: false,
            error_message: String::new(),
            creation_count: Arc::new(AtomicUsize::new(0)),
            fail_after: None,
            outcome: Arc::new(default_outcome),
            delay: Duration::ZERO,
            renders: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock factory whose renderers never see a result, as if the
    /// client application timed out for every target.
    pub fn without_result() -> Self {
        Self::new().with_outcome(|_| RenderOutcome::Rendered(RenderedPage::without_result()))
    }

    /// Create a mock factory that always fails to launch.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let factory = MockBrowserFactory::always_fails("Chrome not installed");
    /// assert!(factory.launch(0).is_err());
    /// ```
    pub fn always_fails<S: Into<String>>(message: S) -> Self {
        Self {
            should_fail: true,
            error_message: message.into(),
            ..Self::new()
        }
    }

    /// Create a mock factory that fails after N successful launches.
    ///
    /// Useful for partial fan-out where only some instances come up.
    pub fn fail_after_n<S: Into<String>>(n: usize, message: S) -> Self {
        Self {
            error_message: message.into(),
            fail_after: Some(n),
            ..Self::new()
        }
    }

    /// Script the outcome of every render.
    pub fn with_outcome<F>(mut self, outcome: F) -> Self
    where
        F: Fn(&TargetIdentifier) -> RenderOutcome + Send + Sync + 'static,
    {
        self.outcome = Arc::new(outcome);
        self
    }

    /// Make every render take `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Get the number of launch attempts by this factory.
    pub fn creation_count(&self) -> usize {
        self.creation_count.load(Ordering::SeqCst)
    }

    /// Reset the creation counter to zero.
    pub fn reset_count(&self) {
        self.creation_count.store(0, Ordering::SeqCst);
    }

    /// Get a clone of the creation counter for external tracking.
    ///
    /// Lets tests read the count after the factory moved into a dispatcher.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.creation_count)
    }

    /// Get a handle on the log of renders performed by launched instances.
    pub fn render_log(&self) -> RenderLog {
        Arc::clone(&self.renders)
    }
}

fn default_outcome(target: &TargetIdentifier) -> RenderOutcome {
    RenderOutcome::Rendered(RenderedPage::with_result(
        format!("<p>{}</p>", target),
        format!("<head><title>{}</title></head>", target),
    ))
}

impl Default for MockBrowserFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl BrowserFactory for MockBrowserFactory {
    type Instance = MockRenderer;

    /// Launch a mock renderer or return the configured error.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::BrowserLaunch`] when configured to fail.
    fn launch(&self, worker_id: usize) -> Result<MockRenderer> {
        let count = self.creation_count.fetch_add(1, Ordering::SeqCst);

        if self.should_fail {
            log::debug!("MockBrowserFactory: Returning configured failure");
            return Err(BuildError::BrowserLaunch(self.error_message.clone()));
        }

        if let Some(fail_after) = self.fail_after {
            if count >= fail_after {
                log::debug!("MockBrowserFactory: Failing after {} launches", fail_after);
                return Err(BuildError::BrowserLaunch(self.error_message.clone()));
            }
        }

        log::debug!("MockBrowserFactory: Launching mock renderer #{}", count + 1);
        Ok(MockRenderer {
            worker_id,
            outcome: Arc::clone(&self.outcome),
            delay: self.delay,
            renders: Arc::clone(&self.renders),
        })
    }
}

impl std::fmt::Debug for MockBrowserFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBrowserFactory")
            .field("should_fail", &self.should_fail)
            .field("error_message", &self.error_message)
            .field("creation_count", &self.creation_count.load(Ordering::SeqCst))
            .field("fail_after", &self.fail_after)
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

/// Renderer launched by [`MockBrowserFactory`].
pub struct MockRenderer {
    worker_id: usize,
    outcome: Arc<OutcomeFn>,
    delay: Duration,
    renders: RenderLog,
}

impl MockRenderer {
    /// Worker this renderer was launched for.
    pub fn worker_id(&self) -> usize {
        self.worker_id
    }
}

impl PageRenderer for MockRenderer {
    async fn render(&self, target: &TargetIdentifier) -> RenderOutcome {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.renders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((self.worker_id, target.clone()));

        (self.outcome)(target)
    }
}

impl std::fmt::Debug for MockRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockRenderer")
            .field("worker_id", &self.worker_id)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderError;

    fn target(url: &str) -> TargetIdentifier {
        TargetIdentifier::from_url(url).unwrap()
    }

    /// Verifies that always_fails factory returns error.
    #[test]
    fn test_mock_factory_always_fails() {
        let factory = MockBrowserFactory::always_fails("Test error");

        match factory.launch(0) {
            Err(BuildError::BrowserLaunch(msg)) => assert_eq!(msg, "Test error"),
            _ => panic!("Expected BrowserLaunch error"),
        }
    }

    /// Verifies that creation_count tracks attempts and reset_count clears it.
    #[test]
    fn test_mock_factory_creation_count() {
        let factory = MockBrowserFactory::always_fails("Test");
        let counter = factory.counter();

        assert_eq!(factory.creation_count(), 0);
        let _ = factory.launch(0);
        let _ = factory.launch(1);
        assert_eq!(factory.creation_count(), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        factory.reset_count();
        assert_eq!(factory.creation_count(), 0);
    }

    /// Verifies fail_after_n behavior.
    #[test]
    fn test_mock_factory_fail_after_n() {
        let factory = MockBrowserFactory::fail_after_n(2, "Exhausted");

        assert!(factory.launch(0).is_ok());
        assert!(factory.launch(1).is_ok());
        assert!(matches!(factory.launch(2), Err(BuildError::BrowserLaunch(m)) if m == "Exhausted"));
    }

    /// Verifies the default scripted outcome and the render log.
    #[tokio::test]
    async fn test_mock_renderer_default_outcome() {
        let factory = MockBrowserFactory::new();
        let log = factory.render_log();
        let renderer = factory.launch(3).unwrap();

        let outcome = renderer.render(&target("https://example.org/")).await;
        match outcome {
            RenderOutcome::Rendered(page) => {
                assert!(page.result_present);
                assert_eq!(page.fragment, "<p>example.org</p>");
                assert_eq!(page.head, "<head><title>example.org</title></head>");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        let log = log.lock().unwrap();
        assert_eq!(log.as_slice(), &[(3, target("https://example.org"))]);
    }

    /// Verifies scripted outcomes.
    #[tokio::test]
    async fn test_mock_renderer_scripted() {
        let factory = MockBrowserFactory::new().with_outcome(|_| {
            RenderOutcome::failed(RenderError::Navigation("refused".to_string()))
        });
        let renderer = factory.launch(0).unwrap();
        let outcome = renderer.render(&target("https://example.org")).await;
        assert!(matches!(outcome, RenderOutcome::Failed { .. }));

        let renderer = MockBrowserFactory::without_result().launch(0).unwrap();
        let outcome = renderer.render(&target("https://example.org")).await;
        assert_eq!(outcome, RenderOutcome::Rendered(RenderedPage::without_result()));
    }

    /// Verifies Debug implementation.
    #[test]
    fn test_mock_factory_debug() {
        let debug_str = format!("{:?}", MockBrowserFactory::always_fails("Test"));
        assert!(debug_str.contains("MockBrowserFactory"));
        assert!(debug_str.contains("should_fail: true"));
    }
}
