use assert_cmd::Command;
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

#[allow(deprecated)]
fn run_raw(data: &Path, args: &[&str]) -> (bool, Value) {
    let output = Command::cargo_bin("entry-groups")
        .expect("binary")
        .arg("--quiet")
        .arg("--data")
        .arg(data)
        .args(args)
        .output()
        .expect("command run");

    let body: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    (output.status.success(), body)
}

fn run_ok(data: &Path, args: &[&str]) -> Value {
    let (ok, body) = run_raw(data, args);
    assert!(ok, "args: {args:?}\nstdout: {body}");
    assert_eq!(body["status"], "ok");
    body["data"].clone()
}

fn run_err(data: &Path, args: &[&str]) -> Value {
    let (ok, body) = run_raw(data, args);
    assert!(!ok, "expected failure for {args:?}, got {body}");
    assert_eq!(body["status"], "error");
    body
}

fn read_host(data: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(data).unwrap()).unwrap()
}

#[test]
fn prompt_group_lifecycle() {
    let temp = tempdir().unwrap();
    let data = temp.path().join("host.json");

    run_ok(&data, &["init", "--keys", "a,b,c,d"]);
    let created = run_ok(&data, &["add", "a", "b", "Intro"]);
    assert_eq!(created["name"], "Intro");
    assert_eq!(created["startIdentifier"], "a");

    let clash = run_err(&data, &["add", "b", "c", "Clash"]);
    assert_eq!(clash["kind"], "overlap");

    let host = read_host(&data);
    let stored = &host["containers"]["Default"]["extensions"]["prompt_groups"];
    assert_eq!(stored.as_array().unwrap().len(), 1);
    assert_eq!(stored[0]["endIdentifier"], "b");
    assert_eq!(host["live"]["prompt_groups"], *stored);

    let listed = run_ok(&data, &["list"]);
    assert_eq!(listed["unresolved"], 0);
    assert_eq!(
        listed["groups"][0]["resolution"],
        json!({ "status": "resolved", "span": { "start": 0, "end": 1 } })
    );

    let rendered = run_ok(&data, &["render"]);
    assert_eq!(
        rendered["sections"],
        json!([
            { "group_id": created["id"], "name": "Intro", "entries": ["a", "b"] },
            { "entries": ["c", "d"] }
        ])
    );
    assert_eq!(rendered["passes"], 1);

    let renamed = run_ok(&data, &["update", "0", "--name", "Opening", "--end", "c"]);
    assert_eq!(renamed["name"], "Opening");
    assert_eq!(renamed["endIdentifier"], "c");
    assert_eq!(renamed["id"], created["id"]);

    let missing = run_err(&data, &["remove", "-1"]);
    assert_eq!(missing["kind"], "index_out_of_range");
    let missing = run_err(&data, &["remove", "3"]);
    assert_eq!(missing["kind"], "index_out_of_range");

    run_ok(&data, &["remove", "0"]);
    let listed = run_ok(&data, &["list"]);
    assert_eq!(listed["groups"], json!([]));
}

#[test]
fn toggle_flips_every_member() {
    let temp = tempdir().unwrap();
    let data = temp.path().join("host.json");

    run_ok(&data, &["init", "--keys", "a,b,c"]);
    run_ok(&data, &["add", "b", "c", "Tail"]);

    let report = run_ok(&data, &["toggle", "0"]);
    assert_eq!(report["before"], "on");
    assert_eq!(report["after"], "off");
    assert_eq!(report["batched"], true);

    let host = read_host(&data);
    let order = &host["containers"]["Default"]["prompt_order"];
    assert_eq!(order[0]["enabled"], true);
    assert_eq!(order[1]["enabled"], false);
    assert_eq!(order[2]["enabled"], false);
}

#[test]
fn legacy_positional_groups_migrate_to_anchors() {
    let temp = tempdir().unwrap();
    let data = temp.path().join("host.json");
    let host = json!({
        "active": "Default",
        "containers": {
            "Default": {
                "prompt_order": [
                    { "identifier": "a", "enabled": true },
                    { "identifier": "b", "enabled": true },
                    { "identifier": "c", "enabled": true }
                ],
                "extensions": {
                    "prompt_groups": [
                        { "name": "Old", "startIndex": 1, "endIndex": 2 },
                        { "name": "Gone", "startIndex": 7, "endIndex": 9 }
                    ]
                }
            }
        }
    });
    fs::write(&data, serde_json::to_vec_pretty(&host).unwrap()).unwrap();

    let migrated = run_ok(&data, &["migrate"]);
    assert_eq!(migrated["groups"], 2);
    assert_eq!(migrated["unresolved"], 1);

    let host = read_host(&data);
    let stored = &host["containers"]["Default"]["extensions"]["prompt_groups"];
    assert_eq!(stored[0]["startIdentifier"], "b");
    assert_eq!(stored[0]["endIdentifier"], "c");
    assert_eq!(stored[1]["unresolved"], true);

    let rendered = run_ok(&data, &["render"]);
    assert_eq!(rendered["unresolved"], 1);
    assert_eq!(rendered["sections"][1]["name"], "Old");
}

#[test]
fn settings_file_changes_storage_key() {
    let temp = tempdir().unwrap();
    let data = temp.path().join("host.json");
    let config = temp.path().join("groups.toml");
    fs::write(&config, "[store]\nstorage_key = \"my_groups\"\n").unwrap();
    let config = config.to_str().unwrap();

    let effective = run_ok(&data, &["--config", config, "config"]);
    assert_eq!(effective["store"]["storage_key"], "my_groups");
    assert_eq!(effective["sync"]["debounce_ms"], 150);

    run_ok(&data, &["init", "--keys", "a,b"]);
    run_ok(&data, &["--config", config, "add", "a", "b", "Both"]);
    let host = read_host(&data);
    let extensions = &host["containers"]["Default"]["extensions"];
    assert_eq!(extensions["my_groups"][0]["name"], "Both");
    assert!(extensions.get("prompt_groups").is_none());
}

#[test]
fn world_info_groups_flow() {
    let temp = tempdir().unwrap();
    let data = temp.path().join("host.json");
    run_ok(&data, &["init", "--keys", "a"]);

    let places = run_ok(&data, &["wi-create", "--book", "Lore", "Places"]);
    let places = places["id"].as_str().unwrap().to_string();
    let people = run_ok(&data, &["wi-create", "--book", "Lore", "People"]);
    let people = people["id"].as_str().unwrap().to_string();

    run_ok(&data, &["wi-add", "--book", "Lore", &places, "11"]);
    run_ok(&data, &["wi-add", "--book", "Lore", &people, "11"]);

    let listed = run_ok(&data, &["wi-list", "--book", "Lore", "--entries", "10,11,12"]);
    let sections = listed["sections"].as_array().unwrap();
    assert_eq!(sections.len(), 3);
    assert_eq!(sections[0]["label"], "Places");
    assert_eq!(sections[0]["placeholder"], "(empty)");
    assert_eq!(sections[1]["entries"], json!([11]));
    assert_eq!(sections[2]["group_id"], Value::Null);
    assert_eq!(sections[2]["entries"], json!([10, 12]));

    let moved = run_ok(&data, &["wi-move", "--book", "Lore", "1", "0"]);
    assert_eq!(moved["moved"], true);
    let removed = run_ok(&data, &["wi-remove", "--book", "Lore", "11"]);
    assert_eq!(removed["removed_from"], people.as_str());

    run_ok(&data, &["wi-collapse-all", "--book", "Lore"]);
    let toggled = run_ok(&data, &["wi-toggle", "--book", "Lore", &places]);
    assert_eq!(toggled["collapsed"], false);

    run_ok(&data, &["wi-delete", "--book", "Lore", &people]);
    let missing = run_err(&data, &["wi-rename", "--book", "Lore", &people, "Again"]);
    assert_eq!(missing["kind"], "group_not_found");

    let listed = run_ok(&data, &["wi-list", "--book", "Lore", "--entries", "10"]);
    let labels: Vec<&str> = listed["sections"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|s| s["label"].as_str())
        .collect();
    assert_eq!(labels.first().copied(), Some("Places"));
}

#[test]
#[allow(deprecated)]
fn missing_host_file_reports_error_envelope() {
    let temp = tempdir().unwrap();
    Command::cargo_bin("entry-groups")
        .expect("binary")
        .arg("--quiet")
        .arg("--data")
        .arg(temp.path().join("absent.json"))
        .arg("list")
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"status\":\"error\""))
        .stdout(predicate::str::contains("Cannot read host file"));
}
