//! Graph Store
//!
//! The store owns every node and is the only place edges are mutated.
//!
//! # Updates
//!
//! [`GraphStore::update`] merges compiled metadata into a node. When the
//! dependency list changes:
//!
//! 1. Dependencies that disappeared lose this node as a dependent
//! 2. New dependencies are created if absent and gain this node as a dependent
//! 3. Any removed dependency left with no dependents becomes a pruning root
//!
//! Pruning roots are handed to the pruning engine immediately, and its
//! decision is returned to the caller.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use indexmap::IndexSet;
use tracing::{debug, trace};

use super::node::{Node, NodeUpdate, Url};
use super::revision::RevisionClock;
use crate::propagation::Decision;

/// Owning arena of graph nodes, keyed by url.
#[derive(Debug, Default)]
pub struct GraphStore {
    nodes: HashMap<Url, Node>,
    clock: RevisionClock,

    /// Orphans kept after a declined pruning, swept on the next accepted one.
    detached: IndexSet<Url>,
}

impl GraphStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a node. Never creates one.
    pub fn get(&self, url: &str) -> Option<&Node> {
        self.nodes.get(url)
    }

    /// Return the node for `url`, creating an empty one if needed.
    pub fn get_or_create(&mut self, url: impl Into<Url>) -> &Node {
        self.entry(url.into())
    }

    pub(crate) fn entry(&mut self, url: Url) -> &mut Node {
        self.nodes.entry(url).or_insert_with_key(|url| {
            trace!(url = %url, "creating graph node");
            Node::new(url.clone())
        })
    }

    pub(crate) fn get_mut(&mut self, url: &str) -> Option<&mut Node> {
        self.nodes.get_mut(url)
    }

    /// Merge compiled metadata into the node for `url`.
    ///
    /// Returns the pruning decision when the update left one or more former
    /// dependencies without any dependents, `None` otherwise.
    pub fn update(&mut self, url: impl Into<Url>, update: NodeUpdate) -> Option<Decision> {
        let url = url.into();
        let revision = self.clock.next();

        self.detached.shift_remove(&url);
        let node = self.entry(url.clone());
        node.set_revision(revision);
        if let Some(kind) = update.kind {
            node.set_kind(kind);
        }
        if let Some(accepts) = update.self_accepts_update {
            node.set_self_accepts_update(accepts);
        }
        if let Some(declines) = update.declines_update {
            node.set_declines_update(declines);
        }
        if let Some(accepted) = update.accepts_dependency_update {
            node.set_accepts_dependency_update(accepted.into_iter().collect());
        }

        let mut pruning_roots = Vec::new();
        if let Some(dependencies) = update.dependencies {
            pruning_roots = self.replace_dependencies(&url, dependencies.into_iter().collect());
        }

        if let Some(traces) = update.dependency_traces {
            if let Some(node) = self.nodes.get_mut(&url) {
                node.set_dependency_traces(traces);
            }
        }

        if pruning_roots.is_empty() {
            return None;
        }
        debug!(url = %url, roots = ?pruning_roots, "dependencies orphaned");
        Some(self.prune(&url, pruning_roots))
    }

    /// Swap the dependency set of `url`, mirroring every edge change.
    ///
    /// Returns removed dependencies that were left with no dependents.
    fn replace_dependencies(&mut self, url: &Url, next: IndexSet<Url>) -> Vec<Url> {
        let removed: Vec<Url> = match self.nodes.get(url) {
            Some(node) => node
                .dependencies()
                .iter()
                .filter(|dep| !next.contains(*dep))
                .cloned()
                .collect(),
            None => Vec::new(),
        };

        let mut orphaned = Vec::new();
        for dep in removed {
            if self.remove_edge(&dep, url) {
                orphaned.push(dep);
            }
        }

        for dep in &next {
            if self.entry(dep.clone()).add_dependent(url.clone()) {
                trace!(dependency = %dep, dependent = %url, "edge added");
            }
        }
        if let Some(node) = self.nodes.get_mut(url) {
            node.set_dependencies(next);
        }

        orphaned
    }

    /// Remove the edge `dependent -> dependency` in both directions.
    ///
    /// Returns true when `dependency` has no dependents left.
    pub(crate) fn remove_edge(&mut self, dependency: &Url, dependent: &Url) -> bool {
        if let Some(node) = self.nodes.get_mut(dependent) {
            node.remove_dependency(dependency);
        }
        match self.nodes.get_mut(dependency) {
            Some(node) => {
                node.remove_dependent(dependent);
                trace!(dependency = %dependency, dependent = %dependent, "edge removed");
                node.dependents().is_empty()
            }
            None => false,
        }
    }

    /// Remove a node from the graph along with every edge touching it.
    pub(crate) fn remove_node(&mut self, url: &str) -> Option<Node> {
        let node = self.nodes.remove(url)?;

        for dep in node.dependencies() {
            if let Some(dep_node) = self.nodes.get_mut(dep) {
                dep_node.remove_dependent(url);
            }
        }
        for dependent in node.dependents() {
            if let Some(dependent_node) = self.nodes.get_mut(dependent) {
                dependent_node.remove_dependency(url);
            }
        }

        trace!(url = %url, "graph node removed");
        Some(node)
    }

    /// Stamp a fresh revision on one node.
    pub fn touch(&mut self, url: &str) -> Option<u64> {
        let revision = self.clock.next();
        let node = self.nodes.get_mut(url)?;
        node.set_revision(revision);
        Some(revision)
    }

    /// Stamp one fresh revision on `url` and every transitive dependent.
    ///
    /// Returns the stamped urls in breadth-first order, starting with `url`.
    pub fn cascade_revision(&mut self, url: &str) -> Vec<Url> {
        let Some(start) = self.nodes.get(url).map(|node| node.url().clone()) else {
            return Vec::new();
        };
        let revision = self.clock.next();

        let mut stamped = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }
            if let Some(node) = self.nodes.get_mut(&current) {
                node.set_revision(revision);
                queue.extend(node.dependents().iter().cloned());
                stamped.push(current);
            }
        }

        stamped
    }

    pub(crate) fn detached_mut(&mut self) -> &mut IndexSet<Url> {
        &mut self.detached
    }

    pub(crate) fn next_revision(&self) -> u64 {
        self.clock.next()
    }

    /// Last revision of a node, or `None` if unknown or never stamped.
    pub fn get_revision(&self, url: &str) -> Option<u64> {
        self.nodes.get(url).and_then(Node::revision)
    }

    /// How `from` referenced `dependency`, if recorded.
    pub fn get_trace(&self, dependency: &str, from: &str) -> Option<&str> {
        self.nodes.get(from).and_then(|node| node.trace(dependency))
    }

    /// First dependent of `url`, searched breadth-first upward, matching
    /// `predicate`. The starting node itself is never returned.
    pub fn find_ancestor<F>(&self, url: &str, predicate: F) -> Option<&Node>
    where
        F: Fn(&Node) -> bool,
    {
        let start = self.nodes.get(url)?;
        let mut visited: HashSet<&str> = HashSet::from([start.url().as_str()]);
        let mut queue: VecDeque<&Url> = start.dependents().iter().collect();

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.as_str()) {
                continue;
            }
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            if predicate(node) {
                return Some(node);
            }
            queue.extend(node.dependents().iter());
        }

        None
    }

    /// Export `{ url: [dependency, ...] }` with `root` stripped from every url.
    pub fn to_dependency_map(&self, root: &str) -> BTreeMap<String, Vec<String>> {
        let relative = |url: &Url| -> String {
            if root.is_empty() {
                return url.to_string();
            }
            url.as_str().strip_prefix(root).unwrap_or(url.as_str()).to_string()
        };

        self.nodes
            .values()
            .map(|node| {
                let deps = node.dependencies().iter().map(relative).collect();
                (relative(node.url()), deps)
            })
            .collect()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.nodes.contains_key(url)
    }

    /// Direct dependents of `url`, in insertion order.
    pub fn dependents<'a>(&'a self, url: &str) -> impl Iterator<Item = &'a Url> + 'a {
        self.nodes
            .get(url)
            .into_iter()
            .flat_map(|node| node.dependents().iter())
    }

    /// Direct dependencies of `url`, in declaration order.
    pub fn dependencies<'a>(&'a self, url: &str) -> impl Iterator<Item = &'a Url> + 'a {
        self.nodes
            .get(url)
            .into_iter()
            .flat_map(|node| node.dependencies().iter())
    }

    /// Iterate over every node.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get the total number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
