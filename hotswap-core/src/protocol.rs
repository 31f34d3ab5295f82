//! Wire Protocol
//!
//! Types exchanged between the change handler and the update applier. The
//! JSON shape is fixed:
//!
//! ```text
//! { "declined": true, "cause": "...", "reason": "...", "declinedBy": "/a.js" }
//! { "accepted": true, "cause": "...", "reason": "...",
//!   "instructions": [{ "kind": "module", "boundary": "/a.js", "acceptedBy": "/a.js" }] }
//! ```

use serde::{Deserialize, Serialize};

use crate::config::WireFormat;
use crate::error::CodecError;
use crate::graph::{NodeKind, Url};
use crate::propagation::Decision;

/// What the applier must do with a boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstructionKind {
    /// Re-evaluate a module.
    Module,
    /// Refresh references to a document.
    Document,
    /// Refresh references to a style resource.
    Style,
    /// Dispose and forget a module that lost all dependents.
    Prune,
    /// Anything this build does not recognise.
    #[serde(other)]
    Unknown,
}

/// A boundary whose kind was never reported is re-evaluated as a module.
/// `Unknown` is reserved for kinds a newer server sends.
impl From<NodeKind> for InstructionKind {
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Module | NodeKind::Unknown => InstructionKind::Module,
            NodeKind::Document => InstructionKind::Document,
            NodeKind::Style => InstructionKind::Style,
        }
    }
}

/// One unit of an accepted update decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInstruction {
    pub kind: InstructionKind,

    /// The node to re-evaluate or clean up.
    pub boundary: Url,

    /// The node whose update produced this instruction.
    pub accepted_by: Url,
}

impl UpdateInstruction {
    pub fn new(kind: InstructionKind, boundary: impl Into<Url>, accepted_by: impl Into<Url>) -> Self {
        Self {
            kind,
            boundary: boundary.into(),
            accepted_by: accepted_by.into(),
        }
    }

    /// True when the boundary absorbed its own update.
    pub fn is_self_accept(&self) -> bool {
        self.boundary == self.accepted_by
    }
}

/// Notification that the client must fully reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclinedNotice {
    pub declined: bool,
    pub cause: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declined_by: Option<Url>,
}

/// Notification carrying instructions to apply in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedNotice {
    pub accepted: bool,
    pub cause: String,
    pub reason: String,
    pub instructions: Vec<UpdateInstruction>,
}

/// Outbound notification, as pushed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Notification {
    Accepted(AcceptedNotice),
    Declined(DeclinedNotice),
}

impl Notification {
    /// Build the notification for a decision triggered by `cause`.
    pub fn from_decision(cause: impl Into<String>, decision: Decision) -> Self {
        let cause = cause.into();
        match decision {
            Decision::Accepted {
                reason,
                instructions,
            } => Notification::Accepted(AcceptedNotice {
                accepted: true,
                cause,
                reason,
                instructions,
            }),
            Decision::Declined {
                reason,
                declined_by,
            } => Notification::Declined(DeclinedNotice {
                declined: true,
                cause,
                reason,
                declined_by: Some(declined_by),
            }),
            Decision::NoBoundary { reason } => Notification::Declined(DeclinedNotice {
                declined: true,
                cause,
                reason,
                declined_by: None,
            }),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Notification::Accepted(_))
    }

    pub fn cause(&self) -> &str {
        match self {
            Notification::Accepted(notice) => &notice.cause,
            Notification::Declined(notice) => &notice.cause,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            Notification::Accepted(notice) => &notice.reason,
            Notification::Declined(notice) => &notice.reason,
        }
    }

    /// The batch a client should enqueue, if this is an accept.
    pub fn into_batch(self) -> Option<UpdateBatch> {
        match self {
            Notification::Accepted(notice) => Some(UpdateBatch {
                reason: notice.reason,
                instructions: notice.instructions,
            }),
            Notification::Declined(_) => None,
        }
    }

    /// Encode in the given wire format.
    pub fn encode(&self, format: WireFormat) -> Result<Vec<u8>, CodecError> {
        match format {
            WireFormat::Json => Ok(serde_json::to_vec(self)?),
            WireFormat::MessagePack => Ok(rmp_serde::to_vec_named(self)?),
        }
    }

    /// Decode from the given wire format.
    pub fn decode(bytes: &[u8], format: WireFormat) -> Result<Self, CodecError> {
        match format {
            WireFormat::Json => Ok(serde_json::from_slice(bytes)?),
            WireFormat::MessagePack => Ok(rmp_serde::from_slice(bytes)?),
        }
    }
}

/// A batch of instructions received by the applier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateBatch {
    /// Why the batch exists, for logs and failure reports.
    pub reason: String,
    pub instructions: Vec<UpdateInstruction>,
}

impl UpdateBatch {
    pub fn new(reason: impl Into<String>, instructions: Vec<UpdateInstruction>) -> Self {
        Self {
            reason: reason.into(),
            instructions,
        }
    }
}
