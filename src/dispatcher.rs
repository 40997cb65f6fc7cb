//! Worker fan-out over a shared target queue.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────────────────────┐
//!                 │  TargetQueue (Mutex<VecDeque>)│
//!                 └──────┬───────┬───────┬───────┘
//!                  pop() │       │       │
//!                 ┌──────▼─┐ ┌───▼────┐ ┌▼───────┐
//!                 │worker 0│ │worker 1│ │worker N│   one browser each
//!                 └──┬─────┘ └──┬─────┘ └──┬─────┘
//!      render → compose → write │          │
//!                    │          │          │
//!                    └────── mpsc ─────────┘
//!                              │
//!                         BuildReport
//! ```
//!
//! The queue is the only shared mutable state. Each pop takes the lock once,
//! so every target is handed to exactly one worker. Records travel over a
//! channel to the dispatcher, which alone owns the report.
//!
//! Failures stay local: a failed render, compose or write becomes a failed
//! record, and a panic while processing one target is caught and recorded
//! the same way. The only run-level failure is not being able to launch a
//! single browser instance.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::compose::Compositor;
use crate::error::{BuildError, RenderError, Result};
use crate::factory::BrowserFactory;
use crate::render::{PageRenderer, RenderOutcome};
use crate::report::{BuildReport, TargetRecord, TargetStatus};
use crate::target::TargetIdentifier;
use crate::writer::OutputWriter;

/// Default number of workers.
pub const DEFAULT_WORKER_COUNT: usize = 8;

/// FIFO of pending targets shared by all workers.
///
/// # Example
///
/// ```rust
/// use static_prerender::dispatcher::TargetQueue;
/// use static_prerender::TargetIdentifier;
///
/// let queue = TargetQueue::new(vec![
///     TargetIdentifier::from_url("https://a.example").unwrap(),
///     TargetIdentifier::from_url("https://b.example").unwrap(),
/// ]);
/// assert_eq!(queue.pop().map(|(pos, t)| (pos, t.to_string())), Some((1, "a.example".to_string())));
/// assert_eq!(queue.remaining(), 1);
/// ```
#[derive(Debug)]
pub struct TargetQueue {
    pending: Mutex<VecDeque<TargetIdentifier>>,
    total: usize,
}

impl TargetQueue {
    /// Create a queue holding `targets` in order.
    pub fn new(targets: Vec<TargetIdentifier>) -> Self {
        let total = targets.len();
        Self {
            pending: Mutex::new(targets.into()),
            total,
        }
    }

    /// Take the next target with its 1-based position, or `None` when empty.
    pub fn pop(&self) -> Option<(usize, TargetIdentifier)> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let target = pending.pop_front()?;
        Some((self.total - pending.len(), target))
    }

    /// Targets not yet handed out.
    pub fn remaining(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Targets the queue was created with.
    #[inline]
    pub fn total(&self) -> usize {
        self.total
    }
}

/// Runs targets through renderers launched by a [`BrowserFactory`].
///
/// # Example
///
/// ```rust,ignore
/// use static_prerender::{Compositor, Dispatcher, OutputWriter};
/// use static_prerender::factory::mock::MockBrowserFactory;
///
/// let dispatcher = Dispatcher::builder()
///     .factory(MockBrowserFactory::new())
///     .worker_count(4)
///     .compositor(Compositor::new("index.html"))
///     .writer(OutputWriter::new("web"))
///     .build()?;
///
/// let report = dispatcher.run(targets).await?;
/// println!("{}", report);
/// ```
pub struct Dispatcher<F: BrowserFactory> {
    factory: Arc<F>,
    worker_count: usize,
    compositor: Arc<Compositor>,
    writer: Arc<OutputWriter>,
}

impl<F: BrowserFactory> Dispatcher<F> {
    /// Create a builder.
    pub fn builder() -> DispatcherBuilder<F> {
        DispatcherBuilder::new()
    }

    /// Configured worker count (upper bound on launched instances).
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Process every target and return the aggregate report.
    ///
    /// Launches `min(worker_count, targets.len())` instances. Instances that
    /// fail to launch are logged and the run continues with the rest.
    /// Returns once the queue is drained and every instance is torn down.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::BrowserLaunch`] if no instance could be launched.
    pub async fn run(&self, targets: Vec<TargetIdentifier>) -> Result<BuildReport> {
        if targets.is_empty() {
            log::warn!("⚠️ No targets to render");
            return Ok(BuildReport::new());
        }

        let wanted = self.worker_count.min(targets.len());
        let instances = self.launch(wanted).await?;

        let queue = Arc::new(TargetQueue::new(targets));
        log::info!(
            "Rendering {} targets with {} workers",
            queue.total(),
            instances.len()
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut workers = JoinSet::new();

        for (worker_id, renderer) in instances {
            let worker = Worker {
                id: worker_id,
                renderer,
                queue: Arc::clone(&queue),
                compositor: Arc::clone(&self.compositor),
                writer: Arc::clone(&self.writer),
                records: tx.clone(),
            };
            workers.spawn(worker.run());
        }
        drop(tx);

        let mut report = BuildReport::new();
        while let Some(record) = rx.recv().await {
            report.record(record);
        }

        let mut teardown = JoinSet::new();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(renderer) => {
                    teardown.spawn_blocking(move || drop(renderer));
                }
                Err(e) => log::error!("❌ Worker task ended abnormally: {}", e),
            }
        }
        while teardown.join_next().await.is_some() {}

        log::info!("All workers finished: {}", report);
        Ok(report)
    }

    async fn launch(&self, count: usize) -> Result<Vec<(usize, F::Instance)>> {
        log::info!("Launching {} browser instances...", count);

        let mut launches = JoinSet::new();
        for worker_id in 0..count {
            let factory = Arc::clone(&self.factory);
            launches.spawn_blocking(move || (worker_id, factory.launch(worker_id)));
        }

        let mut instances = Vec::with_capacity(count);
        let mut last_error = None;

        while let Some(joined) = launches.join_next().await {
            match joined {
                Ok((worker_id, Ok(instance))) => instances.push((worker_id, instance)),
                Ok((worker_id, Err(e))) => {
                    log::error!("❌ [worker {}] Launch failed: {}", worker_id, e);
                    last_error = Some(e.to_string());
                }
                Err(e) => {
                    log::error!("❌ Launch task panicked: {}", e);
                    last_error = Some(e.to_string());
                }
            }
        }

        if instances.is_empty() {
            return Err(BuildError::BrowserLaunch(
                last_error.unwrap_or_else(|| "no instance requested".to_string()),
            ));
        }

        if instances.len() < count {
            log::warn!(
                "⚠️ Only {}/{} browser instances launched, continuing with fewer workers",
                instances.len(),
                count
            );
        } else {
            log::info!("✅ {} browser instances ready", count);
        }

        instances.sort_by_key(|(worker_id, _)| *worker_id);
        Ok(instances)
    }
}

impl<F: BrowserFactory> std::fmt::Debug for Dispatcher<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("worker_count", &self.worker_count)
            .field("compositor", &self.compositor)
            .field("writer", &self.writer.root())
            .finish_non_exhaustive()
    }
}

/// One worker's loop state.
struct Worker<R> {
    id: usize,
    renderer: R,
    queue: Arc<TargetQueue>,
    compositor: Arc<Compositor>,
    writer: Arc<OutputWriter>,
    records: mpsc::UnboundedSender<TargetRecord>,
}

impl<R: PageRenderer> Worker<R> {
    /// Drain the queue, then hand the renderer back for teardown.
    async fn run(self) -> R {
        let total = self.queue.total();

        while let Some((position, target)) = self.queue.pop() {
            log::info!("[worker {}] [{}/{}] Rendering {}", self.id, position, total, target);

            let status = match AssertUnwindSafe(self.process(&target)).catch_unwind().await {
                Ok(status) => status,
                Err(panic) => TargetStatus::Failed {
                    reason: RenderError::Panicked(panic_message(panic.as_ref())),
                },
            };

            match &status {
                TargetStatus::Rendered {
                    result_present: true,
                    output,
                } => log::info!(
                    "✅ [worker {}] [{}/{}] {} -> {}",
                    self.id,
                    position,
                    total,
                    target,
                    output.display()
                ),
                TargetStatus::Rendered {
                    result_present: false,
                    output,
                } => log::info!(
                    "✅ [worker {}] [{}/{}] {} (no result) -> {}",
                    self.id,
                    position,
                    total,
                    target,
                    output.display()
                ),
                TargetStatus::Failed { reason } => log::error!(
                    "❌ [worker {}] [{}/{}] {} failed: {}",
                    self.id,
                    position,
                    total,
                    target,
                    reason
                ),
            }

            let record = TargetRecord {
                target,
                worker_id: self.id,
                status,
            };
            if self.records.send(record).is_err() {
                log::warn!("⚠️ [worker {}] Report receiver gone, stopping", self.id);
                break;
            }
        }

        log::debug!("[worker {}] Queue drained", self.id);
        self.renderer
    }

    async fn process(&self, target: &TargetIdentifier) -> TargetStatus {
        let page = match self.renderer.render(target).await {
            RenderOutcome::Rendered(page) => page,
            RenderOutcome::Failed { reason } => return TargetStatus::Failed { reason },
        };

        let document = match self.compositor.compose(&page).await {
            Ok(document) => document,
            Err(reason) => return TargetStatus::Failed { reason },
        };

        for warning in document.warnings() {
            log::warn!("⚠️ [worker {}] {}: {}", self.id, target, warning);
        }

        match self.writer.write(target, &document).await {
            Ok(output) => TargetStatus::Rendered {
                result_present: page.result_present,
                output,
            },
            Err(reason) => TargetStatus::Failed { reason },
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Builder for [`Dispatcher`].
///
/// Factory, compositor and writer are required.
pub struct DispatcherBuilder<F> {
    factory: Option<F>,
    worker_count: usize,
    compositor: Option<Compositor>,
    writer: Option<OutputWriter>,
}

impl<F: BrowserFactory> DispatcherBuilder<F> {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            factory: None,
            worker_count: DEFAULT_WORKER_COUNT,
            compositor: None,
            writer: None,
        }
    }

    /// Set the factory launching one renderer per worker (required).
    pub fn factory(mut self, factory: F) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Set the number of workers (must be > 0).
    pub fn worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    /// Set the compositor (required).
    pub fn compositor(mut self, compositor: Compositor) -> Self {
        self.compositor = Some(compositor);
        self
    }

    /// Set the output writer (required).
    pub fn writer(mut self, writer: OutputWriter) -> Self {
        self.writer = Some(writer);
        self
    }

    /// Build the dispatcher.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Configuration`] if a required part is missing or
    /// the worker count is zero.
    pub fn build(self) -> Result<Dispatcher<F>> {
        let factory = self
            .factory
            .ok_or_else(|| BuildError::Configuration("No browser factory provided".to_string()))?;
        let compositor = self
            .compositor
            .ok_or_else(|| BuildError::Configuration("No compositor provided".to_string()))?;
        let writer = self
            .writer
            .ok_or_else(|| BuildError::Configuration("No output writer provided".to_string()))?;

        if self.worker_count == 0 {
            return Err(BuildError::Configuration(
                "worker_count must be greater than 0".to_string(),
            ));
        }

        Ok(Dispatcher {
            factory: Arc::new(factory),
            worker_count: self.worker_count,
            compositor: Arc::new(compositor),
            writer: Arc::new(writer),
        })
    }
}

impl<F: BrowserFactory> Default for DispatcherBuilder<F> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
