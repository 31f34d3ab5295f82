//! Boundary search.
//!
//! The walk goes up the dependents of the changed node, depth-first, in
//! dependent insertion order:
//!
//! 1. A node that declines aborts everything, even if it self-accepts
//! 2. A self-accepting node is its own boundary; the walk stops there
//! 3. A dependent that declines aborts everything
//! 4. A dependent that accepts this dependency becomes a boundary
//! 5. A dependent already on the current path means a cycle; abort
//! 6. Otherwise recurse into the dependent
//!
//! A branch that ends without a boundary is dropped. The change is accepted
//! if at least one branch produced instructions.

use smallvec::SmallVec;
use tracing::{debug, info, warn};

use super::Decision;
use crate::graph::{GraphStore, Node, Url};
use crate::protocol::UpdateInstruction;

pub(crate) const CIRCULAR_DEPENDENCY: &str = "circular dependency";
pub(crate) const NO_BOUNDARY_FOUND: &str = "no boundary found";
const UPDATE_DECLINED: &str = "update declined";

/// Urls on the current walk path.
type Trace = SmallVec<[Url; 8]>;

impl GraphStore {
    /// Decide how a change to `url` reaches the client.
    ///
    /// Unknown urls have nothing that can absorb them and yield
    /// [`Decision::NoBoundary`].
    pub fn propagate(&self, url: &str) -> Decision {
        let Some(node) = self.get(url) else {
            return Decision::NoBoundary {
                reason: NO_BOUNDARY_FOUND.to_string(),
            };
        };

        let decision = self.walk(node, &mut Trace::new());
        match &decision {
            Decision::Accepted { instructions, .. } => {
                info!(url = %url, count = instructions.len(), "update accepted");
            }
            Decision::Declined { reason, declined_by } => {
                warn!(url = %url, declined_by = %declined_by, reason = %reason, "update declined");
            }
            Decision::NoBoundary { .. } => {
                debug!(url = %url, "no hot-update boundary");
            }
        }
        decision
    }

    fn walk(&self, node: &Node, trace: &mut Trace) -> Decision {
        if node.declines_update() {
            return Decision::Declined {
                reason: UPDATE_DECLINED.to_string(),
                declined_by: node.url().clone(),
            };
        }

        if node.self_accepts_update() {
            return Decision::Accepted {
                reason: "self accepted".to_string(),
                instructions: vec![UpdateInstruction::new(
                    node.kind().into(),
                    node.url(),
                    node.url(),
                )],
            };
        }

        let mut instructions = Vec::new();
        let mut contributing = 0usize;

        for dependent_url in node.dependents() {
            let Some(dependent) = self.get(dependent_url) else {
                continue;
            };

            if dependent.declines_update() {
                return Decision::Declined {
                    reason: UPDATE_DECLINED.to_string(),
                    declined_by: dependent_url.clone(),
                };
            }

            if dependent.accepts_dependency_update(node.url()) {
                instructions.push(UpdateInstruction::new(
                    dependent.kind().into(),
                    dependent_url,
                    node.url(),
                ));
                contributing += 1;
                continue;
            }

            if trace.contains(dependent_url) {
                return Decision::Declined {
                    reason: CIRCULAR_DEPENDENCY.to_string(),
                    declined_by: dependent_url.clone(),
                };
            }

            trace.push(dependent_url.clone());
            let result = self.walk(dependent, trace);
            trace.pop();

            match result {
                Decision::Accepted {
                    instructions: nested,
                    ..
                } => {
                    instructions.extend(nested);
                    contributing += 1;
                }
                declined @ Decision::Declined { .. } => return declined,
                Decision::NoBoundary { .. } => {}
            }
        }

        if contributing == 0 {
            return Decision::NoBoundary {
                reason: NO_BOUNDARY_FOUND.to_string(),
            };
        }

        Decision::Accepted {
            reason: format!("accepted by {contributing} dependent(s)"),
            instructions,
        }
    }
}
