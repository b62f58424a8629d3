use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use hydrant_cli::fetch::{Credential, credential_fingerprint};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// An isolated home with a config file whose cache lives inside the temp dir.
struct Sandbox {
    temp: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let sandbox = Self {
            temp,
        };
        std::fs::write(
            sandbox.config_path(),
            format!("cache_file = '{}'\ncache_ttl_minutes = 5\n", sandbox.cache_path().display()),
        )
        .unwrap();
        sandbox
    }

    fn config_path(&self) -> PathBuf {
        self.temp.path().join("config.toml")
    }

    fn cache_path(&self) -> PathBuf {
        self.temp.path().join("cache.json")
    }

    fn hydrant(&self) -> Command {
        self.hydrant_with(&self.config_path())
    }

    fn hydrant_with(&self, config: &Path) -> Command {
        let mut cmd = Command::cargo_bin("hydrant").unwrap();
        cmd.env("HOME", self.temp.path())
            .env_remove("HYDRANT_TOKEN")
            .env_remove("HYDRANT_CONFIG_PATH")
            .env_remove("RUST_LOG")
            .arg("--no-progress")
            .arg("--config")
            .arg(config);
        cmd
    }

    /// A second config sharing the cache file, signed in with `token`.
    fn signed_in_config(&self, name: &str, token: &str, api: &str) -> PathBuf {
        let path = self.temp.path().join(name);
        std::fs::write(
            &path,
            format!(
                "cache_file = '{}'\napi_base_url = '{api}'\ntoken = '{token}'\n",
                self.cache_path().display()
            ),
        )
        .unwrap();
        path
    }

    fn cache_keys(&self) -> Vec<String> {
        let cache: Value = serde_json::from_str(&std::fs::read_to_string(self.cache_path()).unwrap()).unwrap();
        cache.as_object().unwrap().keys().cloned().collect()
    }
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_hydrate_preview_tasks() {
    let sandbox = Sandbox::new();
    let output = sandbox.hydrant().args(["hydrate", "TASKS"]).output().unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let json = stdout_json(&output);
    let tasks = json["TASKS"].as_array().unwrap();
    assert_eq!(tasks[0]["Project id_resolved"], "Website Redesign");
    assert_eq!(tasks[0]["assignee_User_id_resolved"], "Arun Nair");
    assert_eq!(tasks[0]["project"]["owner_User_id_resolved"], "Arun Nair");
    assert_eq!(tasks[0]["rowIndex"], 1);
    // Only the requested dataset is printed
    assert!(json.get("PEOPLE").is_none());

    // Preview data is never cached
    assert!(!sandbox.cache_path().exists());
}

#[test]
fn test_hydrate_notes_preview_mode_on_stderr() {
    let sandbox = Sandbox::new();
    sandbox
        .hydrant()
        .args(["hydrate", "people", "--format", "table"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Maya Chen"))
        .stderr(predicate::str::contains("read-only preview"));
}

#[test]
fn test_strict_hydrate_all_reports_cycle() {
    let sandbox = Sandbox::new();
    sandbox
        .hydrant()
        .args(["hydrate", "--all", "--strict"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cycle"))
        .stderr(predicate::str::contains("BUSINESS_UNITS"));

    // A single dataset still reaches the cycle through its references
    sandbox
        .hydrant()
        .args(["hydrate", "CLIENTS", "--strict"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("PEOPLE -> BUSINESS_UNITS -> PEOPLE"));
}

#[test]
fn test_strict_help_explains_builtin_cycle() {
    let sandbox = Sandbox::new();
    sandbox
        .hydrant()
        .args(["hydrate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("strict hydration always reports that cycle"));
}

#[test]
fn test_hydrate_all_warns_but_succeeds() {
    let sandbox = Sandbox::new();
    let output = sandbox.hydrant().args(["hydrate", "--all"]).output().unwrap();
    assert!(output.status.success());

    let json = stdout_json(&output);
    assert_eq!(json.as_object().unwrap().len(), 7);
    assert_eq!(json["PEOPLE"][1]["manager_User_id_resolved"], "Maya Chen");
}

#[test]
fn test_fetch_prints_raw_rows() {
    let sandbox = Sandbox::new();
    let output = sandbox.hydrant().args(["fetch", "PROJECTS"]).output().unwrap();
    assert!(output.status.success());

    let json = stdout_json(&output);
    let projects = json.as_array().unwrap();
    assert_eq!(projects.len(), 3);
    assert!(projects.iter().all(|project| project.get("owner_User_id_resolved").is_none()));
}

#[test]
fn test_unknown_dataset_fails() {
    let sandbox = Sandbox::new();
    sandbox
        .hydrant()
        .args(["fetch", "WIDGETS"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown dataset: WIDGETS"))
        .stderr(predicate::str::contains("Valid datasets"));
}

#[test]
fn test_schema_lists_editable_columns() {
    let sandbox = Sandbox::new();
    let output = sandbox.hydrant().args(["schema", "TASKS", "--json"]).output().unwrap();
    assert!(output.status.success());

    let columns: Vec<String> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(columns.first().map(String::as_str), Some("task_id"));
    assert!(columns.iter().any(|column| column == "collaborator_User_ids"));
    assert!(columns.iter().all(|column| !column.ends_with("_resolved") && column != "rowIndex"));
}

#[test]
fn test_relations_prints_order_and_cycles() {
    let sandbox = Sandbox::new();
    sandbox
        .hydrant()
        .arg("relations")
        .assert()
        .success()
        .stdout(predicate::str::contains("Hydration order:"))
        .stdout(predicate::str::contains("[PEOPLE BUSINESS_UNITS]"))
        .stdout(predicate::str::contains("reference cycle"));

    let output = sandbox.hydrant().args(["relations", "--dataset", "CLIENTS", "--json"]).output().unwrap();
    let json = stdout_json(&output);
    let entries = json.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["resolved_field"], "account_manager_User_id_resolved");
}

#[test]
fn test_config_init_and_path() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("nested").join("config.toml");
    let run = || {
        let mut cmd = Command::cargo_bin("hydrant").unwrap();
        cmd.env("HOME", temp.path()).env_remove("HYDRANT_CONFIG_PATH").arg("--config").arg(&config);
        cmd
    };

    run().args(["config", "init"]).assert().success().stdout(predicate::str::contains("Created config"));
    assert!(config.exists());
    run().args(["config", "init"]).assert().success().stdout(predicate::str::contains("already exists"));

    run()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(config.to_string_lossy().into_owned()));
}

#[test]
fn test_login_masks_token_and_logout_removes_it() {
    let sandbox = Sandbox::new();
    sandbox.hydrant().args(["login", "--token", "super-secret-token"]).assert().success();

    let saved = std::fs::read_to_string(sandbox.config_path()).unwrap();
    assert!(saved.contains("super-secret-token"));

    sandbox
        .hydrant()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("supe****"))
        .stdout(predicate::str::contains("super-secret-token").not());

    sandbox.hydrant().arg("logout").assert().success().stdout(predicate::str::contains("Signed out"));
    let saved = std::fs::read_to_string(sandbox.config_path()).unwrap();
    assert!(!saved.contains("super-secret-token"));
}

#[test]
fn test_signed_in_without_api_is_a_config_error() {
    let sandbox = Sandbox::new();
    sandbox.hydrant().args(["login", "--token", "super-secret-token"]).assert().success();

    sandbox
        .hydrant()
        .args(["fetch", "TASKS"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("api_base_url is not configured"));
}

#[test]
fn test_cache_commands_on_seeded_cache() {
    let sandbox = Sandbox::new();
    std::fs::write(
        sandbox.cache_path(),
        serde_json::json!({
            "dataset_TASKS": r#"{"data":[],"expiry":4102444800000}"#,
            "dataset_PEOPLE": r#"{"data":[],"expiry":1}"#,
            "ui_theme": r#"{"data":"dark","expiry":4102444800000}"#
        })
        .to_string(),
    )
    .unwrap();

    sandbox
        .hydrant()
        .args(["cache", "info"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dataset_TASKS"))
        .stdout(predicate::str::contains("expired"));

    sandbox
        .hydrant()
        .args(["cache", "purge"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 1 expired"));

    sandbox.hydrant().args(["cache", "clear"]).assert().success().stdout(predicate::str::contains("Removed 1 cache"));

    let remaining: Value = serde_json::from_str(&std::fs::read_to_string(sandbox.cache_path()).unwrap()).unwrap();
    assert_eq!(remaining.as_object().unwrap().keys().collect::<Vec<_>>(), vec!["ui_theme"]);
}

#[test]
fn test_switching_config_drops_datasets_of_the_other_credential() {
    let sandbox = Sandbox::new();
    // Nothing listens here, so any remote fetch fails
    let api = "http://127.0.0.1:9";
    let alice = sandbox.signed_in_config("alice.toml", "alice-token-0001", api);
    let bob = sandbox.signed_in_config("bob.toml", "bob-token-0002", api);

    let alice_print = credential_fingerprint(&Credential::new("alice-token-0001"), Some(api));
    let far_future = 4_102_444_800_000_i64;
    std::fs::write(
        sandbox.cache_path(),
        serde_json::json!({
            "credential_fingerprint": serde_json::json!({"data": alice_print, "expiry": far_future}).to_string(),
            "dataset_PEOPLE": serde_json::json!({
                "data": [{"rowIndex": 1, "User_id": "u1", "salary": "ALICE-ONLY"}],
                "expiry": far_future
            })
            .to_string(),
        })
        .to_string(),
    )
    .unwrap();

    // The owner of the snapshot is served from the cache
    sandbox
        .hydrant_with(&alice)
        .args(["fetch", "PEOPLE"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ALICE-ONLY"));

    // Another credential never sees it, even with the remote down
    sandbox
        .hydrant_with(&bob)
        .args(["fetch", "PEOPLE"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("ALICE-ONLY").not());

    assert_eq!(sandbox.cache_keys(), vec!["credential_fingerprint".to_string()]);
    let cache: Value = serde_json::from_str(&std::fs::read_to_string(sandbox.cache_path()).unwrap()).unwrap();
    let stored: Value = serde_json::from_str(cache["credential_fingerprint"].as_str().unwrap()).unwrap();
    assert_eq!(stored["data"], credential_fingerprint(&Credential::new("bob-token-0002"), Some(api)));
}

#[test]
fn test_login_records_credential_and_logout_forgets_it() {
    let sandbox = Sandbox::new();
    sandbox.hydrant().args(["login", "--token", "super-secret-token"]).assert().success();
    assert_eq!(sandbox.cache_keys(), vec!["credential_fingerprint".to_string()]);
    assert!(!std::fs::read_to_string(sandbox.cache_path()).unwrap().contains("super-secret-token"));

    sandbox.hydrant().arg("logout").assert().success();
    assert!(sandbox.cache_keys().is_empty());
}
