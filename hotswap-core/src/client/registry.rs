//! Live Module Registry
//!
//! Records for instantiated modules, keyed by url. A record holds the hooks
//! a module registered while it executed: what to run before it is thrown
//! away, and what to run with its replacement.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt};
use tracing::trace;

use super::surface::ModuleRegistry;
use crate::error::BoxError;
use crate::graph::Url;

/// Whatever a module evaluates to.
pub type ModuleExports = Arc<dyn Any + Send + Sync>;

/// Future returned by lifecycle hooks.
pub type HookFuture = BoxFuture<'static, Result<(), BoxError>>;

/// Runs before a module instance is discarded.
pub type DisposeHook = Arc<dyn Fn() -> HookFuture + Send + Sync>;

/// Receives the freshly evaluated module.
pub type AcceptHook = Arc<dyn Fn(ModuleExports) -> HookFuture + Send + Sync>;

/// Runtime record of one instantiated module.
#[derive(Clone, Default)]
pub struct LiveModule {
    dispose: Option<DisposeHook>,
    accept: Option<AcceptHook>,
}

impl LiveModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the dispose hook.
    pub fn on_dispose<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.dispose = Some(Arc::new(move || hook().boxed()));
        self
    }

    /// Register the accept hook.
    pub fn on_accept<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(ModuleExports) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.accept = Some(Arc::new(move |exports: ModuleExports| hook(exports).boxed()));
        self
    }

    pub fn dispose_hook(&self) -> Option<&DisposeHook> {
        self.dispose.as_ref()
    }

    pub fn accept_hook(&self) -> Option<&AcceptHook> {
        self.accept.as_ref()
    }
}

impl fmt::Debug for LiveModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveModule")
            .field("dispose", &self.dispose.is_some())
            .field("accept", &self.accept.is_some())
            .finish()
    }
}

/// Concurrent in-memory module registry.
#[derive(Debug, Default)]
pub struct ModuleRuntime {
    records: DashMap<Url, LiveModule>,
}

impl ModuleRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a record, returning the one it replaced.
    pub fn register(&self, url: impl Into<Url>, record: LiveModule) -> Option<LiveModule> {
        let url = url.into();
        trace!(url = %url, ?record, "module registered");
        self.records.insert(url, record)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.records.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ModuleRegistry for ModuleRuntime {
    fn get(&self, url: &str) -> Option<LiveModule> {
        self.records.get(url).map(|record| record.value().clone())
    }

    fn clear(&self, url: &str) {
        if self.records.remove(url).is_some() {
            trace!(url = %url, "module cleared");
        }
    }
}
