#![forbid(unsafe_code)]

use dbctl_core::{ClusterSummary, ItemError, Located, PlaygroundDefaults, ResourceIdentity, Topology};
use dbctl_describe::{DescribeError, DescribeRequest, Describer, Scope, SummarySink};
use dbctl_kubehub::mock::{innodb_mapping, MockClusterClient};
use serde_json::json;

#[derive(Default)]
struct RecordingSink {
    summaries: Vec<ClusterSummary>,
    notices: Vec<String>,
}

impl SummarySink for RecordingSink {
    fn summary(&mut self, summary: &ClusterSummary) -> std::io::Result<()> {
        self.summaries.push(summary.clone());
        Ok(())
    }

    fn notice(&mut self, message: &str) -> std::io::Result<()> {
        self.notices.push(message.to_string());
        Ok(())
    }
}

fn cluster(ns: &str, name: &str, instances: i64, labels: serde_json::Value) -> serde_json::Value {
    json!({
        "apiVersion": "mysql.oracle.com/v2",
        "kind": "InnoDBCluster",
        "metadata": {"namespace": ns, "name": name, "labels": labels},
        "spec": {"version": "8.0.30", "instances": instances, "baseServerId": 1000, "secretName": format!("{}-secret", name)},
        "status": {"createTime": "2022-06-01T10:00:00Z", "cluster": {"status": "ONLINE", "onlineInstances": instances}}
    })
}

fn identity(ns: &str, name: &str) -> Located {
    Ok(ResourceIdentity { namespace: ns.to_string(), name: name.to_string(), mapping: innodb_mapping() })
}

fn request(names: &[&str], scope: Scope) -> DescribeRequest {
    DescribeRequest {
        type_hint: "innodbclusters".to_string(),
        scope,
        names: names.iter().map(|s| s.to_string()).collect(),
        chunk_size: 500,
    }
}

#[tokio::test]
async fn describes_named_clusters_in_order() {
    let client = MockClusterClient::new(innodb_mapping())
        .with_object(cluster("db", "alpha", 1, json!({"env": "prod"})))
        .with_object(cluster("db", "beta", 3, json!({})));
    let describer = Describer::new(&client, PlaygroundDefaults::default());
    let mut sink = RecordingSink::default();

    let outcome = describer
        .describe(&request(&["beta", "alpha"], Scope::Namespace("db".into())), &mut sink)
        .await
        .expect("describe");

    assert_eq!(outcome.emitted, 2);
    assert!(outcome.errors.is_empty());
    assert!(sink.notices.is_empty());
    let beta = &sink.summaries[0];
    assert_eq!(beta.cluster_name, "beta");
    assert_eq!(beta.namespace, "db");
    assert_eq!(beta.topology, Topology::Cluster);
    assert_eq!(beta.labels, "");
    assert_eq!(beta.secret_name, "beta-secret");
    let alpha = &sink.summaries[1];
    assert_eq!(alpha.topology, Topology::Standalone);
    assert_eq!(alpha.labels, "env:prod ");
    assert_eq!(alpha.port, 3306);
    // Named lookups check existence, then the run fetches each document.
    assert_eq!(client.get_calls(), ["beta", "alpha", "beta", "alpha"].map(String::from));
}

#[tokio::test]
async fn cluster_scoped_kind_fetches_without_namespace() {
    let mapping = dbctl_core::TypeMapping { namespaced: false, ..innodb_mapping() };
    let mut doc = cluster("", "global", 1, json!({}));
    doc["metadata"].as_object_mut().expect("metadata").remove("namespace");
    let client = MockClusterClient::new(mapping).with_object(doc);
    let describer = Describer::new(&client, PlaygroundDefaults::default());
    let mut sink = RecordingSink::default();

    let outcome = describer
        .describe(&request(&["global"], Scope::Namespace("db".into())), &mut sink)
        .await
        .expect("describe");

    assert_eq!(outcome.emitted, 1);
    assert_eq!(sink.summaries[0].namespace, "");
    assert_eq!(sink.summaries[0].cluster_name, "global");
    assert_eq!(client.get_namespaces(), [None, None]);
}

#[tokio::test]
async fn missing_names_aggregate_alongside_output() {
    let client = MockClusterClient::new(innodb_mapping()).with_object(cluster("db", "alpha", 1, json!({})));
    let describer = Describer::new(&client, PlaygroundDefaults::default());
    let mut sink = RecordingSink::default();

    let outcome = describer
        .describe(&request(&["ghost", "alpha", "ghost"], Scope::Namespace("db".into())), &mut sink)
        .await
        .expect("soft errors do not abort");

    assert_eq!(outcome.emitted, 1);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors.to_string(), "innodbclusters.mysql.oracle.com \"ghost\" not found");
    assert!(sink.notices.is_empty());
}

#[tokio::test]
async fn identical_soft_errors_are_recorded_once() {
    let client = MockClusterClient::new(innodb_mapping());
    let describer = Describer::new(&client, PlaygroundDefaults::default());
    let mut sink = RecordingSink::default();
    let located = vec![
        Err(ItemError::new("no mapping for kind")),
        Err(ItemError::new("no mapping for kind")),
        Err(ItemError::new("other failure")),
    ];

    let outcome = describer.run(located, &Scope::Namespace("db".into()), &mut sink).await.expect("run");

    assert_eq!(outcome.errors.messages(), ["no mapping for kind".to_string(), "other failure".to_string()]);
    assert!(client.get_calls().is_empty());
    assert!(sink.notices.is_empty());
}

#[tokio::test]
async fn empty_batch_prints_scoped_notice() {
    let client = MockClusterClient::new(innodb_mapping());
    let describer = Describer::new(&client, PlaygroundDefaults::default());

    let mut sink = RecordingSink::default();
    let outcome = describer.run(Vec::new(), &Scope::Namespace("db".into()), &mut sink).await.expect("run");
    assert_eq!(outcome.emitted, 0);
    assert!(outcome.errors.into_result().is_ok());
    assert_eq!(sink.notices, ["No resources found in db namespace.".to_string()]);

    let mut sink = RecordingSink::default();
    describer.run(Vec::new(), &Scope::AllNamespaces, &mut sink).await.expect("run");
    assert_eq!(sink.notices, ["No resources found".to_string()]);
}

#[tokio::test]
async fn fetch_failure_aborts_after_streamed_output() {
    let client = MockClusterClient::new(innodb_mapping())
        .with_object(cluster("db", "a", 1, json!({})))
        .with_object(cluster("db", "b", 1, json!({})))
        .with_object(cluster("db", "c", 1, json!({})))
        .failing_get("b", "connection reset by peer");
    let describer = Describer::new(&client, PlaygroundDefaults::default());
    let mut sink = RecordingSink::default();
    let located = vec![identity("db", "a"), identity("db", "b"), identity("db", "c")];

    let err = describer.run(located, &Scope::Namespace("db".into()), &mut sink).await.unwrap_err();

    assert!(matches!(err, DescribeError::Fetch { .. }));
    assert_eq!(err.to_string(), "unavailable: connection reset by peer");
    assert_eq!(sink.summaries.len(), 1);
    assert_eq!(sink.summaries[0].cluster_name, "a");
    assert_eq!(client.get_calls(), ["a".to_string(), "b".to_string()]);
}

#[tokio::test]
async fn malformed_object_aborts_run() {
    let mut broken = cluster("db", "b", 1, json!({}));
    broken["status"].as_object_mut().expect("status").remove("cluster");
    let client = MockClusterClient::new(innodb_mapping())
        .with_object(broken)
        .with_object(cluster("db", "c", 1, json!({})));
    let describer = Describer::new(&client, PlaygroundDefaults::default());
    let mut sink = RecordingSink::default();

    let err = describer
        .describe(&request(&["b", "c"], Scope::Namespace("db".into())), &mut sink)
        .await
        .unwrap_err();

    match err {
        DescribeError::Malformed { source, .. } => assert_eq!(source.path(), "status.cluster"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(sink.summaries.is_empty());
}

#[tokio::test]
async fn all_namespaces_finds_same_name_everywhere() {
    let client = MockClusterClient::new(innodb_mapping())
        .with_object(cluster("db", "shared", 1, json!({})))
        .with_object(cluster("qa", "shared", 3, json!({"team": "qa"})))
        .with_object(cluster("qa", "other", 1, json!({})));
    let describer = Describer::new(&client, PlaygroundDefaults::default());
    let mut sink = RecordingSink::default();

    let outcome = describer.describe(&request(&["shared"], Scope::AllNamespaces), &mut sink).await.expect("describe");

    assert_eq!(outcome.emitted, 2);
    let namespaces: Vec<_> = sink.summaries.iter().map(|s| s.namespace.as_str()).collect();
    assert_eq!(namespaces, ["db", "qa"]);
    assert_eq!(sink.summaries[1].labels, "team:qa ");
}

#[tokio::test]
async fn usage_and_locator_errors_surface_before_fetching() {
    let client = MockClusterClient::new(innodb_mapping()).failing_list("Unauthorized");
    let describer = Describer::new(&client, PlaygroundDefaults::default());
    let mut sink = RecordingSink::default();

    let err = describer.describe(&request(&[], Scope::AllNamespaces), &mut sink).await.unwrap_err();
    assert!(matches!(err, DescribeError::MissingName));
    assert_eq!(client.list_calls(), 0);

    let err = describer.describe(&request(&["a"], Scope::AllNamespaces), &mut sink).await.unwrap_err();
    assert!(matches!(err, DescribeError::Locate(_)));
    assert!(client.get_calls().is_empty());
    assert!(sink.summaries.is_empty() && sink.notices.is_empty());
}
