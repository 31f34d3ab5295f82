//! Integration Tests for the Live Update Pipeline
//!
//! These tests drive the change handler and feed its notifications to the
//! client-side applier, the way a transport would.

use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;

use hotswap_core::client::{LiveModule, ModuleExports, ModuleLoader, ModuleRuntime, UpdateApplier};
use hotswap_core::error::BoxError;
use hotswap_core::{
    Decision, GraphStore, HotConfig, HotServer, InstructionKind, NodeKind, NodeUpdate,
    Notification, UpdateInstruction, Url, WireFormat,
};

fn module() -> NodeUpdate {
    NodeUpdate::new().kind(NodeKind::Module)
}

/// Every dependency edge is mirrored by a dependent edge and vice versa.
fn assert_edges_mirrored(graph: &GraphStore) {
    for node in graph.nodes() {
        for dep in node.dependencies() {
            assert!(graph.dependents(dep).any(|d| d == node.url()));
        }
        for dependent in node.dependents() {
            assert!(graph.dependencies(dependent).any(|d| d == node.url()));
        }
    }
}

/// Changing a self-accepting dependency yields one self instruction;
/// changing the entry yields a decline with no refusing node.
#[test]
fn main_and_util_scenario() {
    let mut server = HotServer::default();
    server.update("util", module().self_accepts_update(true));
    server.update("main", module().dependencies(["util"]));

    let util = server.on_change("util", "change").unwrap();
    let batch = util.into_batch().expect("util change is accepted");
    assert_eq!(
        batch.instructions,
        vec![UpdateInstruction::new(InstructionKind::Module, "util", "util")]
    );

    let main = server.on_change("main", "change").unwrap();
    let json = serde_json::to_value(&main).unwrap();
    assert_eq!(json["declined"], true);
    assert_eq!(json["reason"], "no boundary found");
    assert!(json.get("declinedBy").is_none());
}

/// A decline anywhere wins, however many other dependents accept.
#[test]
fn decline_is_contagious_across_the_walk() {
    let mut graph = GraphStore::new();
    graph.update("leaf", module());
    for i in 0..5 {
        graph.update(
            format!("acceptor-{i}"),
            module().dependencies(["leaf"]).accepts_dependency_update(["leaf"]),
        );
    }
    graph.update("mid", module().dependencies(["leaf"]));
    graph.update("root", module().dependencies(["mid"]).declines_update(true));

    let decision = graph.propagate("leaf");
    assert!(decision.is_declined());
    assert_eq!(decision.declined_by().map(Url::as_str), Some("root"));
}

/// A self-accepting node answers for itself even with dependents.
#[test]
fn self_accept_short_circuits() {
    let mut graph = GraphStore::new();
    graph.update("a", module().self_accepts_update(true));
    graph.update("b", module().dependencies(["a"]).accepts_dependency_update(["a"]));

    let decision = graph.propagate("a");
    assert_eq!(decision.instructions().len(), 1);
    let only = &decision.instructions()[0];
    assert_eq!(only.boundary, only.accepted_by);
    assert_eq!(only.boundary.as_str(), "a");
}

#[test]
fn mutual_dependency_terminates_as_circular() {
    let mut graph = GraphStore::new();
    graph.update("A", module().dependencies(["B"]));
    graph.update("B", module().dependencies(["A"]));

    for url in ["A", "B"] {
        let decision = graph.propagate(url);
        assert!(matches!(decision, Decision::Declined { .. }));
        assert_eq!(decision.reason(), "circular dependency");
    }
}

/// A -> B -> C, B -> D. Dropping C prunes only C.
#[test]
fn pruning_cascade_leaves_live_dependencies_alone() {
    let mut server = HotServer::default();
    server.update("C", module());
    server.update("D", module());
    server.update("B", module().dependencies(["C", "D"]));
    server.update("A", module().dependencies(["B"]).accepts_dependency_update(["B"]));

    let notification = server
        .update("B", NodeUpdate::new().dependencies(["D"]))
        .expect("C was orphaned");
    let batch = notification.into_batch().expect("pruning accepted");

    assert!(batch
        .instructions
        .contains(&UpdateInstruction::new(InstructionKind::Prune, "C", "B")));
    assert!(!batch.instructions.iter().any(|i| i.boundary.as_str() == "D"));
    assert!(server.graph().contains("D"));
    assert!(!server.graph().contains("C"));
    assert_edges_mirrored(server.graph());
}

#[test]
fn declining_orphan_vetoes_cheap_pruning() {
    let mut server = HotServer::default();
    server.update("main", module().self_accepts_update(true).dependencies(["worker"]));
    server.update("worker", module().declines_update(true));

    let notification = server
        .update("main", NodeUpdate::new().dependencies(Vec::<Url>::new()))
        .unwrap();

    match notification {
        Notification::Declined(notice) => {
            assert_eq!(notice.declined_by.as_ref().map(Url::as_str), Some("worker"));
            assert_eq!(notice.cause, "main pruned");
        }
        Notification::Accepted(_) => panic!("orphan veto ignored"),
    }
}

#[test]
fn edges_stay_mirrored_through_churn() {
    let mut graph = GraphStore::new();
    let rounds: [&[&str]; 4] = [&["a", "b", "c"], &["b", "d"], &["a", "d", "e"], &[]];
    for (i, deps) in rounds.iter().enumerate() {
        graph.update("main", module().self_accepts_update(true).dependencies(deps.iter().copied()));
        graph.update("side", module().dependencies(rounds[(i + 1) % rounds.len()].iter().copied()));
        assert_edges_mirrored(&graph);
    }
}

#[test]
fn query_surface_reports_traces_and_ancestors() {
    let mut server = HotServer::new(HotConfig {
        root: "/srv".to_string(),
        ..HotConfig::default()
    });
    server.update(
        "/srv/index.html",
        NodeUpdate::new()
            .kind(NodeKind::Document)
            .dependencies(["/srv/app.js"])
            .dependency_trace("/srv/app.js", "script tag at line 4"),
    );
    server.update("/srv/app.js", module().dependencies(["/srv/lib.js"]));

    let graph = server.graph();
    assert_eq!(
        graph.get_trace("/srv/app.js", "/srv/index.html"),
        Some("script tag at line 4")
    );
    let document = graph
        .find_ancestor("/srv/lib.js", |node| node.kind() == NodeKind::Document)
        .unwrap();
    assert_eq!(document.url().as_str(), "/srv/index.html");

    let map = graph.to_dependency_map(&server.config().root);
    assert_eq!(map["/index.html"], vec!["/app.js".to_string()]);
    assert_eq!(map["/app.js"], vec!["/lib.js".to_string()]);
    assert!(graph.get_revision("/srv/app.js").is_some());
}

struct Loader {
    log: Arc<Mutex<Vec<String>>>,
}

impl ModuleLoader for Loader {
    fn load(&self, url: &Url, _request: String) -> BoxFuture<'static, Result<ModuleExports, BoxError>> {
        let log = self.log.clone();
        let url = url.to_string();
        async move {
            log.lock().push(format!("load {url}"));
            let exports: ModuleExports = Arc::new(url);
            Ok(exports)
        }
        .boxed()
    }
}

/// Server decisions travel as JSON and are applied on the client.
#[tokio::test]
async fn notifications_drive_the_applier() {
    let mut server = HotServer::new(HotConfig {
        wire_format: WireFormat::Json,
        ..HotConfig::default()
    });
    let mut transport = server.subscribe();

    server.update(
        "/main.js",
        module().self_accepts_update(true).dependencies(["/a.js", "/b.js"]),
    );
    server.update("/a.js", module().self_accepts_update(true));
    server.update("/b.js", module().self_accepts_update(true));

    let log = Arc::new(Mutex::new(Vec::new()));
    let runtime = Arc::new(ModuleRuntime::new());
    for url in ["/main.js", "/a.js", "/b.js"] {
        let dispose_log = log.clone();
        runtime.register(
            url,
            LiveModule::new().on_dispose(move || {
                let log = dispose_log.clone();
                async move {
                    log.lock().push(format!("dispose {url}"));
                    Ok(())
                }
            }),
        );
    }
    let applier = UpdateApplier::builder(runtime.clone(), Arc::new(Loader { log: log.clone() }))
        .config(server.config())
        .build();

    server.on_change("/a.js", "change");
    server.update("/main.js", NodeUpdate::new().dependencies(["/a.js"]));

    for _ in 0..2 {
        let bytes = transport.recv().await.unwrap();
        let notification = Notification::decode(&bytes, WireFormat::Json).unwrap();
        if let Some(batch) = notification.into_batch() {
            applier.enqueue(batch);
        }
    }
    applier.idle().await;

    assert_eq!(
        *log.lock(),
        vec![
            "dispose /a.js",
            "load /a.js",
            "dispose /b.js",
            "dispose /main.js",
            "load /main.js",
        ]
    );
    assert!(!runtime.contains("/b.js"));
    assert!(runtime.contains("/a.js"));
}
