//! Update Applier
//!
//! The client half of live updates. Accepted notifications arrive as
//! [`UpdateBatch`](crate::UpdateBatch)es and are executed against the live
//! module registry, one instruction at a time.
//!
//! # Collaborators
//!
//! The applier owns no global state. Everything it touches is injected:
//!
//! - [`ModuleRegistry`]: live records with dispose/accept hooks
//! - [`ModuleLoader`]: re-acquires module content
//! - [`DocumentSurface`]: live references to documents and style resources
//! - [`FailureReporter`]: the single funnel for apply failures
//!
//! [`ModuleRuntime`] is an in-memory registry for hosts that do not bring
//! their own.

mod applier;
mod registry;
mod surface;

pub use applier::{cache_busted, ApplierBuilder, UpdateApplier};
pub use registry::{AcceptHook, DisposeHook, HookFuture, LiveModule, ModuleExports, ModuleRuntime};
pub use surface::{
    ApplyFailure, DocumentSurface, EmptySurface, FailureReporter, ModuleLoader, ModuleRegistry,
    ResourceReference, TracingReporter,
};
