//! Single-flight update queue.
//!
//! # Scheduling
//!
//! Batches are appended to one pending list. At most one drain loop runs at
//! a time; a batch enqueued while a drain is running (including from inside
//! a hook) is picked up by that same loop. Batches run in FIFO order and are
//! never interleaved.
//!
//! # Execution
//!
//! Instructions of a batch run strictly in order, each awaited to completion
//! before the next begins. A failing instruction is reported and skipped;
//! the rest of the batch still runs.
//!
//! Hooks have no timeout. A hook that never resolves stalls the queue.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::registry::LiveModule;
use super::surface::{
    ApplyFailure, DocumentSurface, EmptySurface, FailureReporter, ModuleLoader, ModuleRegistry,
    TracingReporter,
};
use crate::config::HotConfig;
use crate::error::ApplyError;
use crate::graph::{RevisionClock, Url};
use crate::protocol::{InstructionKind, UpdateBatch, UpdateInstruction};

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<UpdateBatch>,
    draining: bool,
}

struct Inner {
    queue: Mutex<QueueState>,
    idle: Notify,
    registry: Arc<dyn ModuleRegistry>,
    loader: Arc<dyn ModuleLoader>,
    surface: Arc<dyn DocumentSurface>,
    reporter: Arc<dyn FailureReporter>,
    clock: RevisionClock,
    cache_bust_param: String,
}

/// Builder for [`UpdateApplier`].
pub struct ApplierBuilder {
    registry: Arc<dyn ModuleRegistry>,
    loader: Arc<dyn ModuleLoader>,
    surface: Arc<dyn DocumentSurface>,
    reporter: Arc<dyn FailureReporter>,
    cache_bust_param: String,
}

impl ApplierBuilder {
    pub fn surface(mut self, surface: Arc<dyn DocumentSurface>) -> Self {
        self.surface = surface;
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn FailureReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Take the cache-busting parameter from `config`.
    pub fn config(mut self, config: &HotConfig) -> Self {
        self.cache_bust_param = config.cache_bust_param.clone();
        self
    }

    pub fn build(self) -> UpdateApplier {
        UpdateApplier {
            inner: Arc::new(Inner {
                queue: Mutex::new(QueueState::default()),
                idle: Notify::new(),
                registry: self.registry,
                loader: self.loader,
                surface: self.surface,
                reporter: self.reporter,
                clock: RevisionClock::new(),
                cache_bust_param: self.cache_bust_param,
            }),
        }
    }
}

/// Executes accepted update batches against the live module registry.
///
/// Cloning is cheap; clones share one queue.
#[derive(Clone)]
pub struct UpdateApplier {
    inner: Arc<Inner>,
}

impl UpdateApplier {
    pub fn builder(registry: Arc<dyn ModuleRegistry>, loader: Arc<dyn ModuleLoader>) -> ApplierBuilder {
        ApplierBuilder {
            registry,
            loader,
            surface: Arc::new(EmptySurface),
            reporter: Arc::new(TracingReporter),
            cache_bust_param: HotConfig::default().cache_bust_param,
        }
    }

    /// Enqueue `batch` and wait until the queue is empty.
    ///
    /// Returns immediately if another drain loop is already running; that
    /// loop will apply the batch. The drain loop runs on its own task, so
    /// dropping this future does not stop the queue.
    pub async fn apply(&self, batch: UpdateBatch) {
        if self.push(batch) {
            if let Err(err) = self.spawn_drain().await {
                warn!(error = %err, "update drain task failed");
            }
        }
    }

    /// Enqueue `batch` without waiting. Starts a drain task on the current
    /// tokio runtime when the queue is idle.
    pub fn enqueue(&self, batch: UpdateBatch) {
        if self.push(batch) {
            self.spawn_drain();
        }
    }

    fn spawn_drain(&self) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.drain().await })
    }

    /// Resolve once nothing is pending and no drain loop is running.
    pub async fn idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    pub fn is_idle(&self) -> bool {
        let queue = self.inner.queue.lock();
        !queue.draining && queue.pending.is_empty()
    }

    /// Number of batches waiting to start.
    pub fn pending(&self) -> usize {
        self.inner.queue.lock().pending.len()
    }

    /// Append a batch. Returns true if the caller must start draining.
    fn push(&self, batch: UpdateBatch) -> bool {
        let mut queue = self.inner.queue.lock();
        queue.pending.push_back(batch);
        if queue.draining {
            return false;
        }
        queue.draining = true;
        true
    }
}

impl Inner {
    async fn drain(&self) {
        while let Some(batch) = self.next_batch() {
            self.run_batch(batch).await;
        }
        self.idle.notify_waiters();
    }

    /// Pop the next batch, or mark the queue idle when there is none.
    fn next_batch(&self) -> Option<UpdateBatch> {
        let mut queue = self.queue.lock();
        let batch = queue.pending.pop_front();
        if batch.is_none() {
            queue.draining = false;
        }
        batch
    }

    async fn run_batch(&self, batch: UpdateBatch) {
        debug!(reason = %batch.reason, count = batch.instructions.len(), "applying update batch");

        for instruction in &batch.instructions {
            let outcome = AssertUnwindSafe(self.execute(instruction))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    Err(ApplyError::Panicked {
                        url: instruction.boundary.to_string(),
                    })
                });

            if let Err(error) = outcome {
                self.reporter.report(&ApplyFailure {
                    reason: batch.reason.clone(),
                    instruction: instruction.clone(),
                    error,
                });
            }
        }

        debug!(reason = %batch.reason, "update batch applied");
    }

    async fn execute(&self, instruction: &UpdateInstruction) -> Result<(), ApplyError> {
        let url = &instruction.boundary;
        match instruction.kind {
            InstructionKind::Prune => self.prune(url).await,
            InstructionKind::Module => self.reload(url).await,
            InstructionKind::Document | InstructionKind::Style => self.refresh(url).await,
            InstructionKind::Unknown => {
                warn!(boundary = %url, "ignoring instruction of unknown kind");
                Ok(())
            }
        }
    }

    async fn prune(&self, url: &Url) -> Result<(), ApplyError> {
        let Some(record) = self.registry.get(url) else {
            debug!(url = %url, "pruned module was never instantiated");
            return Ok(());
        };
        dispose(url, &record).await?;
        self.registry.clear(url);
        Ok(())
    }

    async fn reload(&self, url: &Url) -> Result<(), ApplyError> {
        let Some(previous) = self.registry.get(url) else {
            debug!(url = %url, "module not instantiated, nothing to re-evaluate");
            return Ok(());
        };
        dispose(url, &previous).await?;

        let request = cache_busted(url, &self.cache_bust_param, self.clock.next());
        let exports = self
            .loader
            .load(url, request)
            .await
            .map_err(|source| ApplyError::Reload {
                url: url.to_string(),
                source,
            })?;

        let accept = self
            .registry
            .get(url)
            .and_then(|current| current.accept_hook().cloned())
            .or_else(|| previous.accept_hook().cloned());
        if let Some(accept) = accept {
            accept(exports).await.map_err(|source| ApplyError::Accept {
                url: url.to_string(),
                source,
            })?;
        }
        Ok(())
    }

    async fn refresh(&self, url: &Url) -> Result<(), ApplyError> {
        let references = self.surface.references(url);
        if references.is_empty() {
            debug!(url = %url, "no live references to refresh");
            return Ok(());
        }

        let stamp = self.clock.next();
        let mut first_error = None;
        for reference in references {
            let request = cache_busted(url, &self.cache_bust_param, stamp);
            if let Err(source) = reference.refresh(request).await {
                first_error.get_or_insert(ApplyError::Refresh {
                    url: url.to_string(),
                    source,
                });
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

async fn dispose(url: &Url, record: &LiveModule) -> Result<(), ApplyError> {
    if let Some(hook) = record.dispose_hook() {
        hook().await.map_err(|source| ApplyError::Dispose {
            url: url.to_string(),
            source,
        })?;
    }
    Ok(())
}

/// Set `param=stamp` in the query string of `url`, replacing any previous
/// value and keeping the fragment.
pub fn cache_busted(url: &str, param: &str, stamp: u64) -> String {
    let (base, fragment) = match url.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (url, None),
    };
    let (path, query) = match base.split_once('?') {
        Some((path, query)) => (path, query),
        None => (base, ""),
    };

    let marker = format!("{param}={stamp}");
    let mut pairs: Vec<&str> = query
        .split('&')
        .filter(|pair| !pair.is_empty() && pair.split('=').next() != Some(param))
        .collect();
    pairs.push(&marker);

    let mut busted = format!("{path}?{}", pairs.join("&"));
    if let Some(fragment) = fragment {
        busted.push('#');
        busted.push_str(fragment);
    }
    busted
}
