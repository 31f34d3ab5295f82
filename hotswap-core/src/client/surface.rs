//! Collaborator capabilities consumed by the applier.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use tracing::error;

use super::registry::{LiveModule, ModuleExports};
use crate::error::{ApplyError, BoxError};
use crate::graph::Url;
use crate::protocol::UpdateInstruction;

/// Read/clear access to live module records.
pub trait ModuleRegistry: Send + Sync {
    fn get(&self, url: &str) -> Option<LiveModule>;
    fn clear(&self, url: &str);
}

/// Re-acquires module content.
///
/// `request` is `url` with a cache-busting marker. Loaders that evaluate the
/// module usually register a fresh record for `url` before resolving.
pub trait ModuleLoader: Send + Sync {
    fn load(&self, url: &Url, request: String) -> BoxFuture<'static, Result<ModuleExports, BoxError>>;
}

/// One live reference to a document or style resource, e.g. a stylesheet
/// link in the rendered page.
pub trait ResourceReference: Send + Sync {
    /// Re-fetch through `request`, a cache-busted url.
    fn refresh(&self, request: String) -> BoxFuture<'static, Result<(), BoxError>>;
}

/// The rendered surface holding references to injected resources.
pub trait DocumentSurface: Send + Sync {
    fn references(&self, url: &str) -> Vec<Arc<dyn ResourceReference>>;
}

/// A surface with no references. Document and style instructions are no-ops.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptySurface;

impl DocumentSurface for EmptySurface {
    fn references(&self, _url: &str) -> Vec<Arc<dyn ResourceReference>> {
        Vec::new()
    }
}

/// One instruction that failed to apply.
#[derive(Debug)]
pub struct ApplyFailure {
    /// Reason of the batch the instruction belonged to.
    pub reason: String,
    pub instruction: UpdateInstruction,
    pub error: ApplyError,
}

/// Receives every apply failure, once per failed instruction.
pub trait FailureReporter: Send + Sync {
    fn report(&self, failure: &ApplyFailure);
}

/// Logs failures through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl FailureReporter for TracingReporter {
    fn report(&self, failure: &ApplyFailure) {
        error!(
            boundary = %failure.instruction.boundary,
            accepted_by = %failure.instruction.accepted_by,
            reason = %failure.reason,
            error = %failure.error,
            "hot update failed"
        );
    }
}
