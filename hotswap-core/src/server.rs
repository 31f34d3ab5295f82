//! Change Handler
//!
//! The server side of live updates. The compiler reports metadata through
//! [`HotServer::update`], the file watcher reports changes through
//! [`HotServer::on_change`], and every resulting decision is encoded and
//! broadcast to subscribed transports.
//!
//! All graph mutation happens through `&mut self`, so the store is only
//! ever touched from the single sequence that handles change events.

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::config::HotConfig;
use crate::graph::{GraphStore, NodeUpdate, Url};
use crate::protocol::Notification;

/// Owns the dependency graph and turns change events into notifications.
#[derive(Debug)]
pub struct HotServer {
    graph: GraphStore,
    config: HotConfig,
    outbound: broadcast::Sender<Vec<u8>>,
}

impl HotServer {
    pub fn new(config: HotConfig) -> Self {
        let (outbound, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            graph: GraphStore::new(),
            config,
            outbound,
        }
    }

    pub fn config(&self) -> &HotConfig {
        &self.config
    }

    /// Read access for diagnostics and queries.
    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    /// Subscribe to encoded notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<Vec<u8>> {
        self.outbound.subscribe()
    }

    /// Record freshly compiled metadata for `url`.
    ///
    /// Returns the pruning notification when the update orphaned former
    /// dependencies.
    pub fn update(&mut self, url: impl Into<Url>, update: NodeUpdate) -> Option<Notification> {
        let url = url.into();
        let decision = self.graph.update(url.clone(), update)?;
        let cause = format!("{} pruned", self.config.relative(&url));
        let notification = Notification::from_decision(cause, decision);
        self.publish(&notification);
        Some(notification)
    }

    /// Handle a filesystem change to `url`.
    ///
    /// Returns `None` when the url is not part of the graph.
    pub fn on_change(&mut self, url: &str, event: &str) -> Option<Notification> {
        if !self.graph.contains(url) {
            debug!(url = %url, event = %event, "change to untracked url ignored");
            return None;
        }

        self.graph.cascade_revision(url);
        let decision = self.graph.propagate(url);

        let cause = format!("{} {}", self.config.relative(url), event);
        let notification = Notification::from_decision(cause, decision);
        self.publish(&notification);
        Some(notification)
    }

    fn publish(&self, notification: &Notification) {
        if self.outbound.receiver_count() == 0 {
            return;
        }
        match notification.encode(self.config.wire_format) {
            Ok(bytes) => {
                // A send error only means every receiver has gone away.
                let _ = self.outbound.send(bytes);
            }
            Err(err) => warn!(error = %err, "failed to encode notification"),
        }
    }
}

impl Default for HotServer {
    fn default() -> Self {
        Self::new(HotConfig::default())
    }
}
