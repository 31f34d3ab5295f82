//! Dependency Graph
//!
//! This module implements the graph of resources (modules, documents, style
//! resources) that a development server has compiled, and which of them
//! read which.
//!
//! # Overview
//!
//! - Nodes represent resources, keyed by url
//! - Edges represent reads: if A imports B, B is a dependency of A and A is a
//!   dependent of B
//!
//! Unlike a build graph, this one may contain cycles. Cycles are handled by
//! propagation, not rejected here.
//!
//! # Design Decisions
//!
//! 1. Nodes live in one owning map. Edges are url keys looked up through
//!    that map, never references, so there is no ownership cycle.
//!
//! 2. Both directions are stored and always updated by the same mutation,
//!    so a dependency edge and its mirrored dependent edge never disagree.
//!
//! 3. Nodes are created lazily the first time anything mentions them and
//!    are deleted only by pruning.

mod node;
mod revision;
mod store;

pub use node::{Node, NodeKind, NodeUpdate, Url};
pub use revision::RevisionClock;
pub use store::GraphStore;
