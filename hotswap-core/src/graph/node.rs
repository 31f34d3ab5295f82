//! Graph Nodes
//!
//! This module defines the node type that lives in the dependency graph:
//! one node per resource url.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Stable identifier for a node in the dependency graph.
///
/// Urls are opaque strings. Cloning is cheap, and a `Url` can be looked up
/// by `&str` in any map keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Url(Arc<str>);

impl Url {
    /// Create a url from anything string-like.
    pub fn new(url: impl AsRef<str>) -> Self {
        Self(Arc::from(url.as_ref()))
    }

    /// Get the url as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Url {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Deref for Url {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Url {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Url {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for Url {
    fn from(url: String) -> Self {
        Self(Arc::from(url))
    }
}

impl From<&Url> for Url {
    fn from(url: &Url) -> Self {
        url.clone()
    }
}

/// The kind of resource a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Not yet observed. Nodes created by reference start here.
    #[default]
    Unknown,

    /// An executable module.
    Module,

    /// A markup document.
    Document,

    /// A style resource.
    Style,
}

/// A node in the dependency graph.
///
/// Edge sets are insertion-ordered; propagation walks dependents in the
/// order they first referenced this node.
#[derive(Debug, Clone)]
pub struct Node {
    url: Url,
    kind: NodeKind,
    revision: Option<u64>,

    /// Urls this node reads or imports.
    dependencies: IndexSet<Url>,

    /// Urls that read or import this node.
    dependents: IndexSet<Url>,

    /// Where each dependency was referenced, for diagnostics only.
    dependency_traces: HashMap<Url, String>,

    self_accepts_update: bool,
    accepts_dependency_update: IndexSet<Url>,
    declines_update: bool,
}

impl Node {
    /// Create an empty node of unknown kind.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            kind: NodeKind::Unknown,
            revision: None,
            dependencies: IndexSet::new(),
            dependents: IndexSet::new(),
            dependency_traces: HashMap::new(),
            self_accepts_update: false,
            accepts_dependency_update: IndexSet::new(),
            declines_update: false,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Last revision stamped on this node, if any.
    pub fn revision(&self) -> Option<u64> {
        self.revision
    }

    pub fn dependencies(&self) -> &IndexSet<Url> {
        &self.dependencies
    }

    pub fn dependents(&self) -> &IndexSet<Url> {
        &self.dependents
    }

    /// Provenance recorded for one dependency.
    pub fn trace(&self, dependency: &str) -> Option<&str> {
        self.dependency_traces.get(dependency).map(String::as_str)
    }

    pub fn self_accepts_update(&self) -> bool {
        self.self_accepts_update
    }

    /// Whether this node absorbs updates of the given dependency.
    pub fn accepts_dependency_update(&self, dependency: &str) -> bool {
        self.accepts_dependency_update.contains(dependency)
    }

    pub fn accepted_dependencies(&self) -> &IndexSet<Url> {
        &self.accepts_dependency_update
    }

    pub fn declines_update(&self) -> bool {
        self.declines_update
    }

    pub(crate) fn set_kind(&mut self, kind: NodeKind) {
        self.kind = kind;
    }

    pub(crate) fn set_revision(&mut self, revision: u64) {
        self.revision = Some(revision);
    }

    pub(crate) fn set_self_accepts_update(&mut self, accepts: bool) {
        self.self_accepts_update = accepts;
    }

    pub(crate) fn set_accepts_dependency_update(&mut self, urls: IndexSet<Url>) {
        self.accepts_dependency_update = urls;
    }

    pub(crate) fn set_declines_update(&mut self, declines: bool) {
        self.declines_update = declines;
    }

    pub(crate) fn set_dependency_traces(&mut self, traces: HashMap<Url, String>) {
        self.dependency_traces = traces;
    }

    #[cfg(test)]
    pub(crate) fn add_dependency(&mut self, url: Url) -> bool {
        self.dependencies.insert(url)
    }

    /// Remove a dependency, keeping the order of the rest.
    pub(crate) fn remove_dependency(&mut self, url: &str) -> bool {
        self.dependency_traces.remove(url);
        self.dependencies.shift_remove(url)
    }

    pub(crate) fn add_dependent(&mut self, url: Url) -> bool {
        self.dependents.insert(url)
    }

    pub(crate) fn remove_dependent(&mut self, url: &str) -> bool {
        self.dependents.shift_remove(url)
    }

    /// Replace the dependency set wholesale, adopting the new order.
    pub(crate) fn set_dependencies(&mut self, urls: IndexSet<Url>) {
        self.dependency_traces.retain(|url, _| urls.contains(url));
        self.dependencies = urls;
    }

    pub(crate) fn take_dependencies(&mut self) -> IndexSet<Url> {
        self.dependency_traces.clear();
        std::mem::take(&mut self.dependencies)
    }
}

/// Compiled metadata merged into a node by [`GraphStore::update`].
///
/// Every field is optional; absent fields leave the node untouched.
///
/// [`GraphStore::update`]: super::GraphStore::update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeUpdate {
    pub kind: Option<NodeKind>,
    pub dependencies: Option<Vec<Url>>,
    pub dependency_traces: Option<HashMap<Url, String>>,
    pub self_accepts_update: Option<bool>,
    pub accepts_dependency_update: Option<Vec<Url>>,
    pub declines_update: Option<bool>,
}

impl NodeUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: NodeKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn dependencies<I, U>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<Url>,
    {
        self.dependencies = Some(urls.into_iter().map(Into::into).collect());
        self
    }

    pub fn dependency_trace(mut self, dependency: impl Into<Url>, trace: impl Into<String>) -> Self {
        self.dependency_traces
            .get_or_insert_with(HashMap::new)
            .insert(dependency.into(), trace.into());
        self
    }

    pub fn self_accepts_update(mut self, accepts: bool) -> Self {
        self.self_accepts_update = Some(accepts);
        self
    }

    pub fn accepts_dependency_update<I, U>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<Url>,
    {
        self.accepts_dependency_update = Some(urls.into_iter().map(Into::into).collect());
        self
    }

    pub fn declines_update(mut self, declines: bool) -> Self {
        self.declines_update = Some(declines);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_node_is_empty_and_unknown() {
        let node = Node::new(Url::new("/a.js"));
        assert_eq!(node.kind(), NodeKind::Unknown);
        assert!(node.revision().is_none());
        assert!(node.dependencies().is_empty());
        assert!(node.dependents().is_empty());
        assert!(!node.self_accepts_update());
        assert!(!node.declines_update());
    }

    #[test]
    fn url_looks_up_by_str() {
        let mut set = IndexSet::new();
        set.insert(Url::new("/a.js"));
        assert!(set.contains("/a.js"));
        assert_eq!(Url::from("/a.js").to_string(), "/a.js");
    }

    #[test]
    fn dependency_management_keeps_order() {
        let mut node = Node::new(Url::new("/main.js"));
        node.add_dependency(Url::new("/a.js"));
        node.add_dependency(Url::new("/b.js"));
        node.add_dependency(Url::new("/c.js"));

        node.remove_dependency("/b.js");

        let deps: Vec<&str> = node.dependencies().iter().map(Url::as_str).collect();
        assert_eq!(deps, vec!["/a.js", "/c.js"]);
    }

    #[test]
    fn removing_dependency_drops_its_trace() {
        let mut node = Node::new(Url::new("/main.js"));
        node.add_dependency(Url::new("/a.js"));
        let mut traces = HashMap::new();
        traces.insert(Url::new("/a.js"), "imported at line 1".to_string());
        node.set_dependency_traces(traces);

        assert_eq!(node.trace("/a.js"), Some("imported at line 1"));
        node.remove_dependency("/a.js");
        assert_eq!(node.trace("/a.js"), None);
    }

    #[test]
    fn node_update_deserializes_camel_case() {
        let update: NodeUpdate = serde_json::from_str(
            r#"{
                "kind": "module",
                "dependencies": ["/a.js"],
                "selfAcceptsUpdate": true,
                "acceptsDependencyUpdate": ["/a.js"]
            }"#,
        )
        .unwrap();

        assert_eq!(update.kind, Some(NodeKind::Module));
        assert_eq!(update.dependencies, Some(vec![Url::new("/a.js")]));
        assert_eq!(update.self_accepts_update, Some(true));
        assert_eq!(update.declines_update, None);
    }
}
