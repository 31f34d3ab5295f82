//! Orphan Pruning
//!
//! When an update drops a dependency and leaves it with no dependents, that
//! node and everything only it kept alive become orphans.
//!
//! # Algorithm
//!
//! 1. Collect orphans transitively, detaching each one's outgoing edges
//! 2. Stamp every orphan with one fresh revision
//! 3. Propagate the triggering node as for any content change
//! 4. If that declines, surface the decline and keep the orphans detached
//! 5. If it accepts, any orphan that declines updates vetoes the result;
//!    otherwise emit one prune instruction per orphan ahead of the
//!    propagated instructions and delete the orphans from the graph
//!
//! Orphans kept by a decline stay in the store, edgeless, until the next
//! accepted pruning. That pass deletes the ones still unreferenced and
//! without dependencies. An orphan that is recompiled or re-imported in the
//! meantime is tracked normally again.
//!
//! Step 5 exists because a node can be safe to stop tracking while still
//! needing a full reload to be torn down on the client.

use std::collections::{HashSet, VecDeque};

use tracing::{debug, warn};

use super::Decision;
use crate::graph::{GraphStore, Node, Url};
use crate::protocol::{InstructionKind, UpdateInstruction};

impl GraphStore {
    /// Fold the removal of `roots` into the decision for `trigger`.
    pub(crate) fn prune(&mut self, trigger: &Url, roots: Vec<Url>) -> Decision {
        let orphans = self.collect_orphans(trigger, roots);
        debug!(trigger = %trigger, orphans = ?orphans, "pruning orphans");

        let revision = self.next_revision();
        for orphan in &orphans {
            if let Some(node) = self.get_mut(orphan) {
                node.set_revision(revision);
            }
        }

        let pruned = orphans
            .iter()
            .map(Url::as_str)
            .collect::<Vec<_>>()
            .join(", ");

        match self.propagate(trigger) {
            Decision::Accepted {
                reason,
                instructions,
            } => {
                let veto = orphans
                    .iter()
                    .find(|url| self.get(url).is_some_and(Node::declines_update));
                if let Some(veto) = veto.cloned() {
                    warn!(orphan = %veto, "pruned node declines update");
                    self.detached_mut().extend(orphans);
                    return Decision::Declined {
                        reason: format!("pruned {veto} declines update"),
                        declined_by: veto,
                    };
                }

                let mut combined: Vec<UpdateInstruction> = orphans
                    .iter()
                    .map(|orphan| UpdateInstruction::new(InstructionKind::Prune, orphan, trigger))
                    .collect();
                combined.extend(instructions);

                for orphan in &orphans {
                    self.remove_node(orphan);
                }
                self.sweep_detached();

                Decision::Accepted {
                    reason: format!("{reason}, pruned {pruned}"),
                    instructions: combined,
                }
            }
            Decision::Declined {
                reason,
                declined_by,
            } => {
                self.detached_mut().extend(orphans);
                Decision::Declined {
                    reason: format!("{reason} while pruning {pruned}"),
                    declined_by,
                }
            }
            Decision::NoBoundary { reason } => {
                self.detached_mut().extend(orphans);
                Decision::NoBoundary {
                    reason: format!("{reason} while pruning {pruned}"),
                }
            }
        }
    }

    /// Delete orphans left by earlier declined prunings that nothing has
    /// picked up since.
    fn sweep_detached(&mut self) {
        let detached = std::mem::take(self.detached_mut());
        for url in detached {
            let unused = self
                .get(&url)
                .is_some_and(|node| node.dependents().is_empty() && node.dependencies().is_empty());
            if unused {
                debug!(url = %url, "sweeping detached orphan");
                self.remove_node(&url);
            }
        }
    }

    /// Detach every node left without dependents, starting from `roots`.
    ///
    /// Returned in discovery order. The trigger itself is never an orphan.
    fn collect_orphans(&mut self, trigger: &Url, roots: Vec<Url>) -> Vec<Url> {
        let mut orphans = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from(roots);

        while let Some(url) = queue.pop_front() {
            if &url == trigger || !seen.insert(url.clone()) {
                continue;
            }
            let Some(node) = self.get_mut(&url) else {
                continue;
            };
            if !node.dependents().is_empty() {
                continue;
            }

            for dep in node.take_dependencies() {
                if let Some(dep_node) = self.get_mut(&dep) {
                    dep_node.remove_dependent(&url);
                    if dep_node.dependents().is_empty() {
                        queue.push_back(dep);
                    }
                }
            }
            orphans.push(url);
        }

        orphans
    }
}

#[cfg(test)]
mod tests {
    use super::super::propagate::NO_BOUNDARY_FOUND;
    use super::*;
    use crate::graph::{NodeKind, NodeUpdate};

    fn module() -> NodeUpdate {
        NodeUpdate::new().kind(NodeKind::Module)
    }

    /// a -> b -> c, b -> d, with `a` accepting updates of `b`.
    fn chain() -> GraphStore {
        let mut graph = GraphStore::new();
        graph.update("c", module());
        graph.update("d", module());
        graph.update("b", module().dependencies(["c", "d"]));
        graph.update(
            "a",
            module().dependencies(["b"]).accepts_dependency_update(["b"]),
        );
        graph
    }

    #[test]
    fn removed_dependency_is_pruned() {
        let mut graph = chain();

        let decision = graph
            .update("b", NodeUpdate::new().dependencies(["d"]))
            .expect("pruning ran");

        assert_eq!(
            decision.instructions(),
            &[
                UpdateInstruction::new(InstructionKind::Prune, "c", "b"),
                UpdateInstruction::new(InstructionKind::Module, "a", "b"),
            ]
        );
        assert!(!graph.contains("c"));

        // `d` is still referenced by `b` and untouched.
        assert!(graph.get("d").unwrap().dependents().contains("b"));
    }

    #[test]
    fn pruning_cascades_through_orphaned_dependencies() {
        let mut graph = chain();
        graph.update("c", module().dependencies(["e"]));
        graph.update("e", module().dependencies(["f"]));
        graph.update("g", module().dependencies(["f"]));

        let decision = graph
            .update("b", NodeUpdate::new().dependencies(["d"]))
            .expect("pruning ran");

        let pruned: Vec<&str> = decision
            .instructions()
            .iter()
            .filter(|i| i.kind == InstructionKind::Prune)
            .map(|i| i.boundary.as_str())
            .collect();
        assert_eq!(pruned, vec!["c", "e"]);

        // `f` keeps `g` as a dependent.
        let f = graph.get("f").unwrap();
        assert_eq!(f.dependents().len(), 1);
        assert!(f.dependents().contains("g"));
    }

    #[test]
    fn declining_orphan_vetoes_pruning() {
        let mut graph = chain();
        graph.update("c", NodeUpdate::new().declines_update(true));

        let decision = graph
            .update("b", NodeUpdate::new().dependencies(["d"]))
            .expect("pruning ran");

        assert_eq!(decision.declined_by().map(Url::as_str), Some("c"));

        // The orphan stays in the store, detached.
        let c = graph.get("c").unwrap();
        assert!(c.dependents().is_empty());
        assert!(!graph.get("b").unwrap().dependencies().contains("c"));
    }

    #[test]
    fn trigger_without_boundary_declines_and_mentions_orphans() {
        let mut graph = GraphStore::new();
        graph.update("main", module().dependencies(["gone"]));

        let decision = graph
            .update("main", NodeUpdate::new().dependencies(Vec::<Url>::new()))
            .expect("pruning ran");

        assert!(matches!(decision, Decision::NoBoundary { .. }));
        assert!(decision.reason().starts_with(NO_BOUNDARY_FOUND));
        assert!(decision.reason().contains("gone"));
        assert!(graph.contains("gone"));
    }

    #[test]
    fn declining_trigger_declines_pruning() {
        let mut graph = GraphStore::new();
        graph.update("main", module().self_accepts_update(true).dependencies(["gone"]));
        graph.update("main", NodeUpdate::new().declines_update(true));

        let decision = graph
            .update("main", NodeUpdate::new().dependencies(Vec::<Url>::new()))
            .expect("pruning ran");

        assert_eq!(decision.declined_by().map(Url::as_str), Some("main"));
        assert!(decision.reason().contains("gone"));
    }

    #[test]
    fn detached_orphans_are_swept_by_next_accepted_pruning() {
        let mut graph = GraphStore::new();
        graph.update("main", module().dependencies(["stale", "revived"]));
        graph.update("main", NodeUpdate::new().dependencies(Vec::<Url>::new()));
        assert!(graph.contains("stale"));
        assert!(graph.contains("revived"));

        // `revived` is imported again before the next pruning.
        graph.update("app", module().self_accepts_update(true).dependencies(["revived", "tmp"]));
        let decision = graph
            .update("app", NodeUpdate::new().dependencies(["revived"]))
            .expect("pruning ran");

        assert!(decision.is_accepted());
        assert!(!graph.contains("tmp"));
        assert!(!graph.contains("stale"));
        assert!(graph.get("revived").unwrap().dependents().contains("app"));
    }

    #[test]
    fn recompiled_orphan_is_not_swept() {
        let mut graph = GraphStore::new();
        graph.update("main", module().dependencies(["worker"]));
        graph.update("main", NodeUpdate::new().dependencies(Vec::<Url>::new()));

        // Recompiled as a standalone entry.
        graph.update("worker", module().self_accepts_update(true));

        graph.update("app", module().self_accepts_update(true).dependencies(["tmp"]));
        let decision = graph
            .update("app", NodeUpdate::new().dependencies(Vec::<Url>::new()))
            .expect("pruning ran");

        assert!(decision.is_accepted());
        assert!(graph.contains("worker"));
    }

    #[test]
    fn orphans_get_a_fresh_revision() {
        let mut graph = GraphStore::new();
        graph.update("main", module().dependencies(["gone"]));
        graph.update("gone", module());
        let before = graph.get_revision("gone").unwrap();

        graph.update("main", NodeUpdate::new().dependencies(Vec::<Url>::new()));

        assert!(graph.get_revision("gone").unwrap() > before);
    }

    #[test]
    fn self_accepting_trigger_prunes_without_dependents() {
        let mut graph = GraphStore::new();
        graph.update("main", module().self_accepts_update(true).dependencies(["gone"]));

        let decision = graph
            .update("main", NodeUpdate::new().dependencies(Vec::<Url>::new()))
            .expect("pruning ran");

        assert_eq!(
            decision.instructions(),
            &[
                UpdateInstruction::new(InstructionKind::Prune, "gone", "main"),
                UpdateInstruction::new(InstructionKind::Module, "main", "main"),
            ]
        );
    }
}
