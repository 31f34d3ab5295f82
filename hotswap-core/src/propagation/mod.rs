//! Hot-Update Propagation
//!
//! Given a node whose content changed, decide what the client must do:
//! re-evaluate one or more boundary nodes, or give up and fully reload.
//!
//! # Outcomes
//!
//! - `Accepted`: a list of instructions, one per boundary
//! - `Declined`: some node explicitly refused the update, or the walk ran
//!   into a cycle. The refusing node is always named.
//! - `NoBoundary`: nothing refused, but nothing could absorb the change
//!   either
//!
//! Both decline variants lead to the same external action (a full reload),
//! but they are kept apart: an explicit refusal anywhere aborts the whole
//! walk, while a dead end only removes one branch from consideration.

mod propagate;
mod prune;

use crate::graph::Url;
use crate::protocol::UpdateInstruction;

/// The result of propagating or pruning one change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The change can be applied in place.
    Accepted {
        reason: String,
        instructions: Vec<UpdateInstruction>,
    },

    /// A node refused the update. `declined_by` is that node.
    Declined { reason: String, declined_by: Url },

    /// No node accepted the change and none refused it.
    NoBoundary { reason: String },
}

impl Decision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Decision::Accepted { .. })
    }

    /// True for both decline variants.
    pub fn is_declined(&self) -> bool {
        !self.is_accepted()
    }

    pub fn reason(&self) -> &str {
        match self {
            Decision::Accepted { reason, .. }
            | Decision::Declined { reason, .. }
            | Decision::NoBoundary { reason } => reason,
        }
    }

    /// The node that explicitly refused, if any.
    pub fn declined_by(&self) -> Option<&Url> {
        match self {
            Decision::Declined { declined_by, .. } => Some(declined_by),
            _ => None,
        }
    }

    /// Instructions of an accepted decision; empty otherwise.
    pub fn instructions(&self) -> &[UpdateInstruction] {
        match self {
            Decision::Accepted { instructions, .. } => instructions,
            _ => &[],
        }
    }
}
