//! Error types.
//!
//! Graph maintenance and propagation never fail: a refusal to hot-update is a
//! [`Decision`](crate::Decision), not an error. The types here cover the
//! edges of the crate: configuration, the wire codec and the client-side
//! apply step.

use thiserror::Error;

/// Boxed error returned by user-supplied hooks and collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while loading or validating [`HotConfig`](crate::HotConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config json: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config field `{field}`: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

/// Errors raised while encoding or decoding notifications and batches.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("json codec error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("msgpack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    #[error("msgpack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),
}

/// A failure while applying one instruction on the client.
///
/// Every variant names the boundary it was working on so the failure
/// reporter can surface one message per broken boundary.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("dispose hook for {url} failed: {source}")]
    Dispose { url: String, source: BoxError },

    #[error("re-acquiring {url} failed: {source}")]
    Reload { url: String, source: BoxError },

    #[error("accept hook for {url} failed: {source}")]
    Accept { url: String, source: BoxError },

    #[error("refreshing reference to {url} failed: {source}")]
    Refresh { url: String, source: BoxError },

    #[error("hot update of {url} panicked")]
    Panicked { url: String },
}

impl ApplyError {
    /// The boundary url this failure belongs to.
    pub fn url(&self) -> &str {
        match self {
            ApplyError::Dispose { url, .. }
            | ApplyError::Reload { url, .. }
            | ApplyError::Accept { url, .. }
            | ApplyError::Refresh { url, .. }
            | ApplyError::Panicked { url } => url,
        }
    }
}
