use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use predicates::prelude::*;
use serde_json::Value;

const CAR_FORM: &str = include_str!("fixtures/car_form.json");
const BROKEN_FORM: &str = include_str!("fixtures/broken_form.json");

fn draw_form(store: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("draw-form").expect("binary");
    cmd.env("DRAW_FORM_STORE_DIR", store.path())
        .env_remove("DRAW_FORM_NAMESPACE")
        .env_remove("DRAW_FORM_SCHEMA_URL")
        .env_remove("DRAW_FORM_ADMIN_PASSWORD")
        .env_remove("DRAW_FORM_ALLOW_SAVE_LOCAL")
        .env_remove("RUST_LOG");
    cmd
}

fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let file = dir.child(name);
    file.write_str(contents).expect("write fixture");
    file.path().to_path_buf()
}

#[test]
fn submit_default_form_stores_entry() {
    let store = TempDir::new().expect("store");
    let values = write(
        &store,
        "values.json",
        r#"{
            "full_name": "Asha Rao",
            "phone": "+919876543210",
            "selfie": "selfie.jpg",
            "has_car": "no",
            "income_bracket": "5_to_10"
        }"#,
    );

    draw_form(&store)
        .arg("submit")
        .arg("--values")
        .arg(&values)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"submitted\""))
        .stdout(predicate::str::contains("/ticket-created"));

    let output = draw_form(&store)
        .arg("submissions")
        .output()
        .expect("run submissions");
    assert!(output.status.success());
    let records: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(records[0]["full_name"], "Asha Rao");
    assert!(records[0]["submittedAt"].is_string());
}

#[test]
fn submit_reports_validation_errors() {
    let store = TempDir::new().expect("store");
    let schema = write(&store, "car_form.json", CAR_FORM);
    let values = write(&store, "values.json", r#"{ "has_car": "yes" }"#);

    draw_form(&store)
        .arg("submit")
        .arg("--schema")
        .arg(&schema)
        .arg("--values")
        .arg(&values)
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"status\": \"invalid\""))
        .stdout(predicate::str::contains("Name is required"))
        .stdout(predicate::str::contains("car_model"));
}

#[test]
fn validate_ignores_hidden_conditional_fields() {
    let store = TempDir::new().expect("store");
    let schema = write(&store, "car_form.json", CAR_FORM);
    let values = write(&store, "values.json", r#"{ "name": "Asha", "has_car": "no" }"#);

    draw_form(&store)
        .arg("validate")
        .arg("--schema")
        .arg(&schema)
        .arg("--values")
        .arg(&values)
        .assert()
        .success()
        .stdout(predicate::str::contains("Validation result: valid"));
}

#[test]
fn render_text_shows_next_field() {
    let store = TempDir::new().expect("store");
    let schema = write(&store, "car_form.json", CAR_FORM);

    draw_form(&store)
        .arg("render")
        .arg("--schema")
        .arg(&schema)
        .assert()
        .success()
        .stdout(predicate::str::contains("Form: Car Form"))
        .stdout(predicate::str::contains("Next field: name"));
}

#[test]
fn fill_walks_conditional_fields_and_submits() {
    let store = TempDir::new().expect("store");
    let schema = write(&store, "car_form.json", CAR_FORM);
    let hidden = write(&store, "hidden.json", r#"{ "user_id": "u-9" }"#);

    draw_form(&store)
        .arg("fill")
        .arg("--schema")
        .arg(&schema)
        .arg("--hidden")
        .arg(&hidden)
        .write_stdin("Asha\nmaybe\nyes\nThar\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Tell us about your car"))
        .stdout(predicate::str::contains("Car model"))
        .stdout(predicate::str::contains("Saved entry under 'entries' (1 stored)"))
        .stdout(predicate::str::contains("Next page: /thanks"))
        .stderr(predicate::str::contains("'maybe' is not one of the options"));

    let output = draw_form(&store)
        .arg("submissions")
        .arg("--key")
        .arg("entries")
        .output()
        .expect("run submissions");
    let records: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(records[0]["car_model"], "Thar");
    assert_eq!(records[0]["user_id"], "u-9");
}

#[test]
fn fill_fails_when_input_ends() {
    let store = TempDir::new().expect("store");
    let schema = write(&store, "car_form.json", CAR_FORM);

    draw_form(&store)
        .arg("fill")
        .arg("--schema")
        .arg(&schema)
        .write_stdin("Asha\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("input ended"));
}

#[test]
fn publish_is_gated_by_flag_and_password() {
    let store = TempDir::new().expect("store");
    let schema = write(&store, "car_form.json", CAR_FORM);

    draw_form(&store)
        .args(["schema", "publish", "--password", "changeme", "--schema"])
        .arg(&schema)
        .assert()
        .failure()
        .stderr(predicate::str::contains("publishing is disabled"));

    draw_form(&store)
        .env("DRAW_FORM_ALLOW_SAVE_LOCAL", "true")
        .args(["schema", "publish", "--password", "wrong", "--schema"])
        .arg(&schema)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid admin password"));

    draw_form(&store)
        .env("DRAW_FORM_ALLOW_SAVE_LOCAL", "true")
        .args(["schema", "publish", "--password", "changeme", "--schema"])
        .arg(&schema)
        .assert()
        .success()
        .stdout(predicate::str::contains("Published 'Car Form' (v1.0)"));

    draw_form(&store)
        .args(["schema", "resolve"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Schema origin: published"))
        .stdout(predicate::str::contains("\"title\": \"Car Form\""));
}

#[test]
fn publish_uses_draft_and_rejects_broken_schema() {
    let store = TempDir::new().expect("store");
    let broken = write(&store, "broken.json", BROKEN_FORM);

    draw_form(&store)
        .args(["schema", "draft", "save", "--schema"])
        .arg(&broken)
        .assert()
        .success();

    draw_form(&store)
        .args(["schema", "resolve", "--draft"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Schema origin: draft"));

    draw_form(&store)
        .env("DRAW_FORM_ALLOW_SAVE_LOCAL", "1")
        .env("DRAW_FORM_ADMIN_PASSWORD", "s3cret")
        .args(["schema", "publish", "--password", "s3cret"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("select fields need at least one option"))
        .stderr(predicate::str::contains("not published"));
}

#[test]
fn resolve_prefers_schema_url() {
    let store = TempDir::new().expect("store");
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/schema.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(CAR_FORM)
        .create();

    draw_form(&store)
        .env("DRAW_FORM_SCHEMA_URL", format!("{}/schema.json", server.url()))
        .args(["schema", "resolve"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Schema origin: remote"))
        .stdout(predicate::str::contains("Car Form"));
}

#[test]
fn failing_schema_url_falls_back_to_default() {
    let store = TempDir::new().expect("store");
    let mut server = mockito::Server::new();
    let _mock = server.mock("GET", "/schema.json").with_status(500).create();

    draw_form(&store)
        .env("DRAW_FORM_SCHEMA_URL", format!("{}/schema.json", server.url()))
        .args(["schema", "resolve"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Schema origin: default"))
        .stdout(predicate::str::contains("Lucky Draw Entry"));
}

#[test]
fn expr_commands() {
    let store = TempDir::new().expect("store");
    draw_form(&store)
        .args(["expr", "eval", "age > 18", "--values", r#"{"age": 20}"#])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"result\": true"));

    draw_form(&store)
        .args(["expr", "check", "age => 18"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Invalid condition"));
}

#[test]
fn storage_probe_and_clear() {
    let store = TempDir::new().expect("store");
    draw_form(&store)
        .args(["storage", "probe"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"available\": true"));

    draw_form(&store)
        .args(["storage", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 0 keys from 'thardraw'"));
}

#[test]
fn json_schema_describes_form_format() {
    let store = TempDir::new().expect("store");
    draw_form(&store)
        .args(["schema", "json-schema"])
        .assert()
        .success()
        .stdout(predicate::str::contains("showWhen"))
        .stdout(predicate::str::contains("afterSubmit"));
}
