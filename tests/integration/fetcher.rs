use chrono::TimeDelta;
use hydrant_cli::cache::{FileStore, ManualClock, TtlCache};
use hydrant_cli::core::HydrantError;
use hydrant_cli::dataset::DatasetKey;
use hydrant_cli::fetch::{Credential, DatasetFetcher, RowMutation, cache_key};
use hydrant_cli::hydration::{HydrationSession, OrderPolicy};
use hydrant_cli::registry::Registry;
use hydrant_cli::test_utils::{ScriptedSource, init_test_logging, record};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn seeded_source() -> ScriptedSource {
    let source = ScriptedSource::new();
    source.set_records(DatasetKey::Tasks, vec![
        record(json!({"task_id": "t1", "Project id": "p1", "assignee_User_id": "u1"})),
        record(json!({"task_id": "t2", "Project id": "p2", "assignee_User_id": "u2"})),
    ]);
    source.set_records(DatasetKey::Projects, vec![
        record(json!({"project_id": "p1", "Project Name": "Atlas", "owner_User_id": "u2"})),
        record(json!({"project_id": "p2", "Project Name": "Beacon", "owner_User_id": "u1"})),
    ]);
    source.set_records(DatasetKey::People, vec![
        record(json!({"User_id": "u1", "full_name": "Maya Chen", "manager_User_id": ""})),
        record(json!({"User_id": "u2", "full_name": "Diego Alvarez", "manager_User_id": "u1"})),
    ]);
    source
}

#[tokio::test]
async fn test_cached_snapshot_survives_a_new_process() {
    init_test_logging(None);
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("cache.json");
    let source = seeded_source();
    let cred = Credential::new("token-for-tests");

    let first = DatasetFetcher::new(source.clone(), TtlCache::new(Arc::new(FileStore::open(&path))));
    let rows = first.fetch(DatasetKey::Tasks, Some(&cred)).await.unwrap();

    // A second fetcher over the same file sees the snapshot without a request
    let second = DatasetFetcher::new(source.clone(), TtlCache::new(Arc::new(FileStore::open(&path))));
    let cached = second.fetch(DatasetKey::Tasks, Some(&cred)).await.unwrap();

    assert_eq!(cached, rows);
    assert_eq!(source.fetch_count(DatasetKey::Tasks), 1);
}

#[tokio::test]
async fn test_fetch_many_then_hydrate() {
    let source = seeded_source();
    let fetcher = DatasetFetcher::new(source, TtlCache::in_memory());
    let cred = Credential::new("token-for-tests");

    let keys = [DatasetKey::Tasks, DatasetKey::Projects, DatasetKey::People];
    let datasets = fetcher.fetch_many(&keys, Some(&cred)).await.unwrap();
    assert_eq!(datasets.len(), 3);

    let mut session = HydrationSession::new(Registry::builtin(), datasets, OrderPolicy::Reject);
    session.hydrate_all().unwrap();

    let tasks = session.get(DatasetKey::Tasks).unwrap();
    assert_eq!(tasks[0].get("Project id_resolved"), Some(&json!("Atlas")));
    assert_eq!(tasks[1].get("assignee_User_id_resolved"), Some(&json!("Diego Alvarez")));
    let project = tasks[0].get("project").unwrap();
    assert_eq!(project.get("owner_User_id_resolved"), Some(&json!("Diego Alvarez")));

    let people = session.get(DatasetKey::People).unwrap();
    assert_eq!(people[1].get("manager_User_id_resolved"), Some(&json!("Maya Chen")));
}

#[tokio::test]
async fn test_stale_fallback_then_recovery() {
    let clock = Arc::new(ManualClock::at_millis(0));
    let cache = TtlCache::with_clock(Arc::new(hydrant_cli::cache::MemoryStore::new()), clock.clone());
    let source = seeded_source();
    let fetcher = DatasetFetcher::new(source.clone(), cache).with_ttl(1);
    let cred = Credential::new("token-for-tests");

    let original = fetcher.fetch(DatasetKey::Projects, Some(&cred)).await.unwrap();
    clock.advance(TimeDelta::minutes(2));

    source.fail_with(DatasetKey::Projects, HydrantError::FetchFailed {
        dataset: "PROJECTS".to_string(),
        message: "HTTP 503".to_string(),
        transient: true,
    });
    let stale = fetcher.fetch(DatasetKey::Projects, Some(&cred)).await.unwrap();
    assert_eq!(stale, original);
    assert_eq!(fetcher.cache().stats().stale_hits, 1);

    source.set_records(DatasetKey::Projects, vec![record(json!({"project_id": "p9", "Project Name": "Comet"}))]);
    let recovered = fetcher.fetch(DatasetKey::Projects, Some(&cred)).await.unwrap();
    assert_eq!(recovered.len(), 1);
    assert_eq!(recovered[0].get("Project Name"), Some(&json!("Comet")));
}

#[tokio::test]
async fn test_sign_out_purges_every_dataset() {
    let source = seeded_source();
    let fetcher = DatasetFetcher::new(source.clone(), TtlCache::in_memory());
    let cred = Credential::new("token-for-tests");
    fetcher
        .fetch_many(&[DatasetKey::Tasks, DatasetKey::People], Some(&cred))
        .await
        .unwrap();

    assert_eq!(fetcher.on_credential_change().unwrap(), 2);
    assert!(fetcher.cache().get_any::<serde_json::Value>(&cache_key(DatasetKey::Tasks)).is_none());

    // Signed out: preview data, no remote request
    let preview = fetcher.fetch(DatasetKey::Tasks, None).await.unwrap();
    assert!(preview.iter().any(|row| row.get("task_id") == Some(&json!("task_001"))));
    assert_eq!(source.fetch_count(DatasetKey::Tasks), 1);
}

#[tokio::test]
async fn test_append_and_delete_are_forwarded_raw() {
    let source = seeded_source();
    let fetcher = DatasetFetcher::new(source.clone(), TtlCache::in_memory());
    let cred = Credential::new("token-for-tests");
    fetcher.fetch(DatasetKey::Tasks, Some(&cred)).await.unwrap();

    let new_task = record(json!({
        "assignee_User_id": "u1",
        "task_id": "t3",
        "assignee_User_id_resolved": "Maya Chen",
        "Project id": "p1"
    }));
    fetcher.write(DatasetKey::Tasks, Some(&cred), RowMutation::Append(new_task)).await.unwrap();
    fetcher.write(DatasetKey::Tasks, Some(&cred), RowMutation::Delete(2)).await.unwrap();

    let writes = source.writes();
    assert_eq!(writes.len(), 2);
    match &writes[0].1 {
        RowMutation::Append(values) => {
            // Ordered by the dataset's schema, derived fields removed
            let columns: Vec<&str> = values.keys().map(String::as_str).collect();
            assert_eq!(columns, vec!["task_id", "Project id", "assignee_User_id"]);
        }
        other => panic!("unexpected mutation: {other:?}"),
    }
    assert_eq!(writes[1].1, RowMutation::Delete(2));

    // The next read goes back to the store
    fetcher.fetch(DatasetKey::Tasks, Some(&cred)).await.unwrap();
    assert_eq!(source.fetch_count(DatasetKey::Tasks), 2);
}
