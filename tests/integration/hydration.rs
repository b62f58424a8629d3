use hydrant_cli::dataset::{DatasetKey, DatasetMap};
use hydrant_cli::fetch::FixtureSource;
use hydrant_cli::hydration::{HydrationSession, Hydrator, OrderPolicy, hydrate, strip_derived};
use hydrant_cli::registry::{Registry, Relationship};
use hydrant_cli::test_utils::{init_test_logging, row, rows};
use serde_json::json;

fn scenario() -> DatasetMap {
    let mut all = DatasetMap::new();
    all.insert(
        DatasetKey::Tasks,
        vec![row(1, json!({"Project id": "proj_003", "assignee_User_id": "user_003"}))],
    );
    all.insert(
        DatasetKey::Projects,
        vec![row(7, json!({"project_id": "proj_003", "Project Name": "Website Redesign"}))],
    );
    all.insert(
        DatasetKey::People,
        vec![row(4, json!({"User_id": "user_003", "full_name": "Arun Nair"}))],
    );
    all
}

#[test]
fn test_task_resolves_project_and_assignee() {
    init_test_logging(None);
    let all = scenario();

    let hydrated = hydrate(&all[&DatasetKey::Tasks], DatasetKey::Tasks, &all);

    assert_eq!(hydrated.len(), 1);
    let task = &hydrated[0];
    assert_eq!(task.row_index, 1);
    assert_eq!(task.get("Project id"), Some(&json!("proj_003")));
    assert_eq!(task.get("Project id_resolved"), Some(&json!("Website Redesign")));
    assert_eq!(
        task.get("project"),
        Some(&json!({"rowIndex": 7, "project_id": "proj_003", "Project Name": "Website Redesign"}))
    );
    assert_eq!(task.get("assignee_User_id_resolved"), Some(&json!("Arun Nair")));
    assert_eq!(
        task.get("assignee"),
        Some(&json!({"rowIndex": 4, "User_id": "user_003", "full_name": "Arun Nair"}))
    );
}

#[test]
fn test_hydration_is_idempotent_on_raw_input() {
    let all = scenario();
    let first = hydrate(&all[&DatasetKey::Tasks], DatasetKey::Tasks, &all);
    let second = hydrate(&all[&DatasetKey::Tasks], DatasetKey::Tasks, &all);
    assert_eq!(first, second);
    // Input untouched
    assert!(!all[&DatasetKey::Tasks][0].contains("project"));
}

#[test]
fn test_strip_derived_round_trips_to_raw() {
    let all = scenario();
    let hydrated = hydrate(&all[&DatasetKey::Tasks], DatasetKey::Tasks, &all);
    assert_eq!(strip_derived(&hydrated[0]), all[&DatasetKey::Tasks][0]);
}

#[test]
fn test_leading_zero_ids_join() {
    let mut all = DatasetMap::new();
    all.insert(DatasetKey::Tasks, rows(json!([{"assignee_User_id": "007"}, {"assignee_User_id": 7}])));
    all.insert(DatasetKey::People, rows(json!([{"User_id": 7, "full_name": "Bond"}])));

    let hydrated = hydrate(&all[&DatasetKey::Tasks], DatasetKey::Tasks, &all);
    for task in &hydrated {
        assert_eq!(task.get("assignee_User_id_resolved"), Some(&json!("Bond")));
    }
}

#[test]
fn test_collaborators_resolve_in_order_skipping_unknown() {
    let mut all = DatasetMap::new();
    all.insert(
        DatasetKey::Tasks,
        rows(json!([{"collaborator_User_ids": "user_002, ghost ,user_001,"}])),
    );
    all.insert(
        DatasetKey::People,
        rows(json!([
            {"User_id": "user_001", "full_name": "Maya Chen"},
            {"User_id": "user_002", "full_name": "Diego Alvarez"}
        ])),
    );

    let hydrated = hydrate(&all[&DatasetKey::Tasks], DatasetKey::Tasks, &all);
    assert_eq!(hydrated[0].get("collaborator_User_ids_resolved"), Some(&json!("Diego Alvarez, Maya Chen")));
    assert!(!hydrated[0].contains("collaborator"));
}

#[test]
fn test_custom_registry() {
    let registry = Registry::new(
        vec![Relationship::new(
            DatasetKey::Campaigns,
            "lead_id",
            DatasetKey::People,
            "User_id",
            "email",
        )],
        &[("lead_id", "lead")],
    );
    let mut all = DatasetMap::new();
    all.insert(DatasetKey::Campaigns, rows(json!([{"lead_id": "u1"}])));
    all.insert(DatasetKey::People, rows(json!([{"User_id": "u1", "email": "u1@example.com"}])));

    let hydrated = Hydrator::new(&registry).hydrate(&all[&DatasetKey::Campaigns], DatasetKey::Campaigns, &all);
    assert_eq!(hydrated[0].get("lead_id_resolved"), Some(&json!("u1@example.com")));
    assert_eq!(hydrated[0].get("lead").and_then(|lead| lead.get("rowIndex")), Some(&json!(1)));
}

#[test]
fn test_session_over_fixtures_hydrates_two_hops() {
    let all: DatasetMap = DatasetKey::ALL.iter().map(|key| (*key, FixtureSource.rows(*key))).collect();
    let mut session = HydrationSession::new(Registry::builtin(), all, OrderPolicy::Warn);
    session.hydrate_all().unwrap();

    let tasks = session.get(DatasetKey::Tasks).unwrap();
    let first = &tasks[0];
    assert_eq!(first.get("Project id_resolved"), Some(&json!("Website Redesign")));
    assert_eq!(first.get("assignee_User_id_resolved"), Some(&json!("Arun Nair")));
    assert_eq!(first.get("collaborator_User_ids_resolved"), Some(&json!("Diego Alvarez, Lena Fischer")));

    // The attached project was hydrated before the tasks
    let project = first.get("project").unwrap();
    assert_eq!(project.get("owner_User_id_resolved"), Some(&json!("Arun Nair")));
    assert_eq!(project.get("client_id_resolved"), Some(&json!("Northwind Traders")));

    // Blank and dangling references stay raw
    let audit = &tasks[3];
    assert!(!audit.contains("assignee_User_id_resolved"));
    assert!(!audit.contains("collaborator_User_ids_resolved"));
}

#[test]
fn test_strict_session_rejects_builtin_cycle() {
    let all: DatasetMap = DatasetKey::ALL.iter().map(|key| (*key, FixtureSource.rows(*key))).collect();
    let mut session = HydrationSession::new(Registry::builtin(), all, OrderPolicy::Reject);
    let err = session.hydrate_all().unwrap_err();
    assert!(err.to_string().contains("PEOPLE -> BUSINESS_UNITS -> PEOPLE"));
}
