use clusterscope::store::{same_store, ClusterStore, Drain3Store, StoreError};
use std::fs;
use std::path::Path;

fn drain3_state(clusters: &[(u64, &str)]) -> String {
    let entries: Vec<String> = clusters
        .iter()
        .map(|(id, template)| {
            let tokens: Vec<&str> = template.split_whitespace().collect();
            format!(
                r#""{id}": {{"py/object": "drain3.drain.LogCluster", "log_template_tokens": {{"py/tuple": {}}}, "cluster_id": {id}, "size": 2}}"#,
                serde_json::to_string(&tokens).unwrap()
            )
        })
        .collect();
    format!(
        r#"{{"py/object": "drain3.drain.Drain", "id_to_cluster": {{"py/object": "drain3.drain.LogClusterCache", "_Cache__data": {{{}}}}}, "clusters_counter": {}}}"#,
        entries.join(", "),
        clusters.len()
    )
}

fn write(dir: &Path, name: &str, body: &str) {
    fs::write(dir.join(name), body).unwrap();
}

#[test]
fn loads_drain3_state_in_store_order() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "controlScenario.json", &drain3_state(&[(3, "Interface <*> up"), (1, "zebra started")]));
    let store = Drain3Store::new(tmp.path());
    let set = store.load("controlScenario").unwrap();
    assert_eq!(set.scenario(), "controlScenario");
    assert_eq!(set.len(), 2);
    let ids: Vec<u64> = set.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![3, 1]);
    let first = set.get(3).unwrap();
    assert_eq!(first.template.tokens(), ["Interface", "<*>", "up"]);
    assert_eq!(first.size, Some(2));
    assert_eq!(set.line_count(), Some(4));
}

#[test]
fn missing_store_is_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let store = Drain3Store::new(tmp.path());
    match store.load("ghost") {
        Err(StoreError::NotFound { scenario, path }) => {
            assert_eq!(scenario, "ghost");
            assert!(path.ends_with("ghost.json"));
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn unparsable_or_incomplete_stores_are_malformed() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "truncated.json", r#"{"id_to_cluster": {"_Cache__data": {"1": "#);
    write(tmp.path(), "no_clusters_key.json", r#"{"clusters": []}"#);
    write(tmp.path(), "no_id.json", r#"{"id_to_cluster": {"1": {"log_template_tokens": {"py/tuple": ["a"]}}}}"#);
    write(tmp.path(), "empty_template.json", r#"{"id_to_cluster": {"1": {"cluster_id": 1, "log_template_tokens": {"py/tuple": []}}}}"#);
    write(
        tmp.path(),
        "duplicate.json",
        r#"{"id_to_cluster": {"1": {"cluster_id": 1, "log_template_tokens": ["a"]}, "2": {"cluster_id": 1, "log_template_tokens": ["b"]}}}"#,
    );
    let store = Drain3Store::new(tmp.path());
    for name in ["truncated", "no_clusters_key", "no_id", "empty_template", "duplicate"] {
        let err = store.load(name).unwrap_err();
        assert!(matches!(err, StoreError::Malformed { ref scenario, .. } if scenario == name), "{name}: {err}");
    }
}

#[test]
fn empty_cache_is_a_valid_empty_set() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "quiet.json", &drain3_state(&[]));
    let set = Drain3Store::new(tmp.path()).load("quiet").unwrap();
    assert!(set.is_empty());
}

#[test]
fn discovers_json_stores_sorted() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "zeta.json", &drain3_state(&[]));
    write(tmp.path(), "alpha.json", &drain3_state(&[]));
    write(tmp.path(), "results.txt", "Scenario Name | Number of Clusters\n");
    fs::create_dir(tmp.path().join("nested.json")).unwrap();
    let names = Drain3Store::new(tmp.path()).scenarios().unwrap();
    assert_eq!(names, vec!["alpha".to_string(), "zeta".to_string()]);
}

#[test]
fn same_store_sees_through_path_spelling() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "a.json", &drain3_state(&[]));
    write(tmp.path(), "b.json", &drain3_state(&[]));
    fs::create_dir(tmp.path().join("sub")).unwrap();
    let a = tmp.path().join("a.json");
    assert!(same_store(&a, &tmp.path().join("sub/../a.json")));
    assert!(same_store(&a, &tmp.path().join(".").join("a.json")));
    assert!(!same_store(&a, &tmp.path().join("b.json")));
    assert!(!same_store(&a, &tmp.path().join("ghost.json")));
}
