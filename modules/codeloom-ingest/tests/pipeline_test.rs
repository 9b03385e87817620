//! End-to-end ingestion scenarios against a real Neo4j instance:
//! cross-file call linking, pending resolution, idempotence, and the
//! delete cascade. Requires a container runtime.

use codeloom_analyzer::python::PythonAnalyzer;
use codeloom_analyzer::Analyzer;
use codeloom_common::{AnalysisJob, AnalyzerResult, EventType};
use codeloom_graph::testutil::neo4j_container;
use codeloom_graph::{migrate, query, GraphWriter};
use codeloom_ingest::apply_result;

const BATCH: usize = 100;

fn analyze(path: &str, source: &str) -> AnalyzerResult {
    let job = AnalysisJob {
        file_path: path.to_string(),
        event_type: EventType::Created,
        id: None,
    };
    PythonAnalyzer::new().analyze(&job, source).unwrap()
}

const MODULE_PY: &str = "def utility_function(v):\n    return v\n";
const MAIN_PY: &str =
    "from module import utility_function\n\ndef main():\n    utility_function(\"x\")\n";

async fn count(writer: &GraphWriter, cypher: &str) -> i64 {
    let mut stream = writer.client().inner().execute(query(cypher)).await.unwrap();
    let row = stream.next().await.unwrap().expect("count row");
    row.get::<i64>("n").unwrap()
}

#[tokio::test]
async fn cross_file_call_links_both_orders() {
    let (_container, client) = neo4j_container().await;
    migrate::migrate(&client).await.unwrap();
    let writer = GraphWriter::new(client);

    // Definition first, caller second: everything links immediately.
    apply_result(&writer, &analyze("module.py", MODULE_PY), BATCH)
        .await
        .unwrap();
    apply_result(&writer, &analyze("main.py", MAIN_PY), BATCH)
        .await
        .unwrap();

    let calls = count(
        &writer,
        "MATCH (a:Function {name:'main'})-[:CALLS]->(b:Function {name:'utility_function'}) \
         RETURN count(*) AS n",
    )
    .await;
    assert_eq!(calls, 1);

    let imports = count(
        &writer,
        "MATCH (a:File {file_path:'main.py'})-[:IMPORTS]->(b:File {file_path:'module.py'}) \
         RETURN count(*) AS n",
    )
    .await;
    assert_eq!(imports, 1);

    assert_eq!(writer.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn caller_before_definition_pends_then_resolves() {
    let (_container, client) = neo4j_container().await;
    migrate::migrate(&client).await.unwrap();
    let writer = GraphWriter::new(client);

    apply_result(&writer, &analyze("main.py", MAIN_PY), BATCH)
        .await
        .unwrap();

    // The call and the import both wait on module.py.
    let pending_calls = count(
        &writer,
        "MATCH (pr:PendingRelationship {type:'CALLS'}) RETURN count(pr) AS n",
    )
    .await;
    assert_eq!(pending_calls, 1);
    let pending_target = {
        let mut stream = writer
            .client()
            .inner()
            .execute(query(
                "MATCH (pr:PendingRelationship {type:'CALLS'}) \
                 RETURN pr.target_canonical_id AS t",
            ))
            .await
            .unwrap();
        stream.next().await.unwrap().unwrap().get::<String>("t").unwrap()
    };
    assert_eq!(pending_target, "module.py::Function::utility_function");

    // Ingesting the definition resolves every pending.
    apply_result(&writer, &analyze("module.py", MODULE_PY), BATCH)
        .await
        .unwrap();
    assert_eq!(writer.pending_count().await.unwrap(), 0);

    let calls = count(
        &writer,
        "MATCH (:Function {name:'main'})-[:CALLS]->(:Function {name:'utility_function'}) \
         RETURN count(*) AS n",
    )
    .await;
    assert_eq!(calls, 1);
}

#[tokio::test]
async fn reingestion_is_idempotent() {
    let (_container, client) = neo4j_container().await;
    migrate::migrate(&client).await.unwrap();
    let writer = GraphWriter::new(client);

    let result = analyze("module.py", MODULE_PY);
    apply_result(&writer, &result, BATCH).await.unwrap();
    let nodes = writer.node_count().await.unwrap();
    let relationships = writer.relationship_count().await.unwrap();
    let pendings = writer.pending_count().await.unwrap();

    apply_result(&writer, &result, BATCH).await.unwrap();
    assert_eq!(writer.node_count().await.unwrap(), nodes);
    assert_eq!(writer.relationship_count().await.unwrap(), relationships);
    assert_eq!(writer.pending_count().await.unwrap(), pendings);
}

#[tokio::test]
async fn deleting_a_file_cascades() {
    let (_container, client) = neo4j_container().await;
    migrate::migrate(&client).await.unwrap();
    let writer = GraphWriter::new(client);

    let source = "class C:\n    def m(self):\n        pass\n\ndef f():\n    pass\n";
    apply_result(&writer, &analyze("victim.py", source), BATCH)
        .await
        .unwrap();
    let before = count(
        &writer,
        "MATCH (n {file_path:'victim.py'}) RETURN count(n) AS n",
    )
    .await;
    assert!(before >= 4, "file, class, method and function expected, got {before}");

    // A DELETED event carries only the file's GID, derived offline.
    let mut deletion = AnalyzerResult::empty("victim.py", "python");
    deletion.nodes_deleted.push(file_gid("victim.py"));
    apply_result(&writer, &deletion, BATCH).await.unwrap();

    let after = count(
        &writer,
        "MATCH (n {file_path:'victim.py'}) RETURN count(n) AS n",
    )
    .await;
    assert_eq!(after, 0);
    assert_eq!(writer.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn modified_file_replaces_its_previous_state() {
    let (_container, client) = neo4j_container().await;
    migrate::migrate(&client).await.unwrap();
    let writer = GraphWriter::new(client);

    apply_result(
        &writer,
        &analyze("m.py", "def old_name():\n    pass\n"),
        BATCH,
    )
    .await
    .unwrap();
    apply_result(
        &writer,
        &analyze("m.py", "def new_name():\n    pass\n"),
        BATCH,
    )
    .await
    .unwrap();

    let old = count(&writer, "MATCH (n:Function {name:'old_name'}) RETURN count(n) AS n").await;
    let new = count(&writer, "MATCH (n:Function {name:'new_name'}) RETURN count(n) AS n").await;
    assert_eq!(old, 0);
    assert_eq!(new, 1);
}

fn file_gid(path: &str) -> String {
    use codeloom_identity::{EntityKind, IdRequest, IdentityProvider, IdentityService};
    IdentityService
        .generate_id(&IdRequest::new(path, EntityKind::File, path).with_language("python"))
        .unwrap()
        .gid
}
