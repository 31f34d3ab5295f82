//! Hotswap Core
//!
//! This crate provides the engine behind development-time live updates.
//! It implements:
//!
//! - A module dependency graph with mirrored dependency/dependent edges
//! - Hot-update propagation with accept/decline/boundary semantics
//! - Orphan pruning folded into the same accept/decline decision
//! - A client-side update applier that executes accepted decisions against
//!   a live module registry
//!
//! File watching, compilation, the push transport and HTTP serving are
//! external collaborators. This crate only sees urls, compiled metadata and
//! instruction batches.
//!
//! # Architecture
//!
//! - `graph`: the node arena and its query surface
//! - `propagation`: boundary search, cycle detection and pruning
//! - `protocol`: instructions and the notifications sent to clients
//! - `server`: the change handler wiring the graph to the transport
//! - `client`: the single-flight update applier
//!
//! # Example
//!
//! ```rust
//! use hotswap_core::{Decision, GraphStore, NodeKind, NodeUpdate};
//!
//! let mut graph = GraphStore::new();
//! graph.update(
//!     "/src/util.js",
//!     NodeUpdate::new().kind(NodeKind::Module).self_accepts_update(true),
//! );
//! graph.update(
//!     "/src/main.js",
//!     NodeUpdate::new().kind(NodeKind::Module).dependencies(["/src/util.js"]),
//! );
//!
//! match graph.propagate("/src/util.js") {
//!     Decision::Accepted { instructions, .. } => assert_eq!(instructions.len(), 1),
//!     other => panic!("unexpected decision: {other:?}"),
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod graph;
pub mod propagation;
pub mod protocol;
pub mod server;

pub use config::{HotConfig, WireFormat};
pub use error::{ApplyError, CodecError, ConfigError};
pub use graph::{GraphStore, Node, NodeKind, NodeUpdate, RevisionClock, Url};
pub use propagation::Decision;
pub use protocol::{InstructionKind, Notification, UpdateBatch, UpdateInstruction};
pub use server::HotServer;
