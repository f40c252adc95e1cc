use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;
use uuid::Uuid;

fn unique_workspace(prefix: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("{prefix}-{}", Uuid::now_v7()));
    std::fs::create_dir_all(&path).expect("workspace should be creatable");
    path
}

fn run_mill(root: &Path, actor: Option<(&str, &str)>, args: &[&str]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_mill"));
    command
        .arg("--root")
        .arg(root)
        .arg("--db")
        .arg(root.join(".mill/state.sqlite"))
        .env_remove("MILL_USER")
        .env_remove("MILL_ROLE")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    if let Some((user, role)) = actor {
        command.env("MILL_USER", user).env("MILL_ROLE", role);
    }
    command
        .args(args)
        .output()
        .expect("mill command should run")
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "expected success\nstdout:\n{}\nstderr:\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn assert_failure(output: &Output) {
    assert!(
        !output.status.success(),
        "expected failure\nstdout:\n{}\nstderr:\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn json_of(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

fn step(root: &Path, actor: (&str, &str), args: &[&str]) {
    assert_success(&run_mill(root, Some(actor), args));
}

const STAFF: (&str, &str) = ("ravi", "staff");
const QC: (&str, &str) = ("suma", "quality_supervisor");
const MANAGER: (&str, &str) = ("prasad", "manager");
const OWNER: (&str, &str) = ("rao", "owner");
const PHYSICAL: (&str, &str) = ("kiran", "physical_supervisor");
const INVENTORY: (&str, &str) = ("anil", "inventory_staff");

fn create_sample(root: &Path) -> String {
    let created = run_mill(
        root,
        Some(STAFF),
        &[
            "--json",
            "new",
            "--party",
            "Sri Lakshmi Traders",
            "--broker",
            "Venkat",
            "--variety",
            "Sona Masuri",
            "--location",
            "Miryalaguda",
            "--bags",
            "400",
        ],
    );
    assert_success(&created);
    let value = json_of(&created);
    assert_eq!(value["status"], "staff_entry");
    value["id"].as_str().expect("id should be a string").to_string()
}

#[test]
fn sample_runs_from_entry_to_ledger() {
    let root = unique_workspace("millflow-cli-flow");
    let id = create_sample(&root);
    let id = id.as_str();

    step(&root, STAFF, &["next", id]);
    step(
        &root,
        QC,
        &[
            "quality", id, "--moisture", "14.5", "--cutting", "2", "--bend", "1.5", "--mix",
            "0", "--sk", "0.5", "--grains", "180",
        ],
    );
    step(&root, QC, &["next", id]);
    step(&root, MANAGER, &["lot", id, "pass"]);
    step(&root, MANAGER, &["next", id]);
    step(&root, QC, &["cooking", id, "pass"]);
    step(&root, QC, &["next", id]);
    step(&root, OWNER, &["offer", id, "--rate", "2100"]);
    step(&root, OWNER, &["next", id]);
    step(&root, MANAGER, &["allot", id, "--supervisor", "kiran", "--bags", "400"]);
    step(&root, MANAGER, &["next", id]);
    step(&root, PHYSICAL, &["inspect", id, "--bags", "400"]);
    step(&root, PHYSICAL, &["next", id]);
    step(
        &root,
        INVENTORY,
        &[
            "inventory", id, "--gross", "20400", "--tare", "400", "--bags", "400",
            "--location", "Godown 2",
        ],
    );
    step(&root, INVENTORY, &["next", id]);
    step(
        &root,
        OWNER,
        &[
            "terms", id, "--base-rate", "2100", "--sute", "1", "--brokerage", "10", "--egb",
            "15", "--lf", "5", "--hamali", "4",
        ],
    );

    let quote = run_mill(&root, None, &["--json", "quote", id]);
    assert_success(&quote);
    assert_eq!(json_of(&quote)["total_purchase_cost"], 42_757_800);

    step(&root, OWNER, &["next", id]);
    step(&root, MANAGER, &["confirm", id]);
    step(&root, MANAGER, &["next", id]);
    step(&root, OWNER, &["next", id, "-m", "approved"]);

    let shown = run_mill(&root, None, &["--json", "show", id]);
    assert_success(&shown);
    let shown = json_of(&shown);
    assert_eq!(shown["status"], "completed");
    assert_eq!(shown["terminal"], true);

    let ledger = run_mill(&root, None, &["--json", "ledger"]);
    assert_success(&ledger);
    let ledger = json_of(&ledger);
    assert_eq!(ledger.as_array().map(Vec::len), Some(1));
    assert_eq!(ledger[0]["party_payable"], 42_198_000);

    let history = run_mill(&root, None, &["--json", "history", id]);
    assert_success(&history);
    assert_eq!(json_of(&history).as_array().map(Vec::len), Some(12));

    assert_success(&run_mill(&root, None, &["verify", id]));

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn writes_are_refused_without_an_authorized_actor() {
    let root = unique_workspace("millflow-cli-auth");
    let id = create_sample(&root);

    let anonymous = run_mill(&root, None, &["next", &id]);
    assert_failure(&anonymous);
    assert!(String::from_utf8_lossy(&anonymous.stderr).contains("MILL_USER"));

    let skipped = run_mill(&root, Some(MANAGER), &["move", &id, "lot_selection"]);
    assert_failure(&skipped);
    assert!(String::from_utf8_lossy(&skipped.stderr)
        .contains("invalid status transition: staff_entry -> lot_selection"));

    step(&root, STAFF, &["next", &id]);
    let wrong_role = run_mill(&root, Some(INVENTORY), &["move", &id, "lot_selection"]);
    assert_failure(&wrong_role);
    assert!(String::from_utf8_lossy(&wrong_role.stderr).contains("may not move"));

    let queue = run_mill(&root, None, &["--json", "queue", "quality"]);
    assert_success(&queue);
    assert_eq!(json_of(&queue)[0]["id"], id.as_str());

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn stale_etag_is_rejected() {
    let root = unique_workspace("millflow-cli-etag");
    let id = create_sample(&root);

    let stale = run_mill(
        &root,
        Some(STAFF),
        &["move", &id, "quality_check", "--if-match", "stale"],
    );
    assert_failure(&stale);
    assert!(String::from_utf8_lossy(&stale.stderr).contains("expected etag stale"));

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn workflow_and_completions_need_no_database() {
    let root = unique_workspace("millflow-cli-static");

    let table = run_mill(&root, None, &["workflow"]);
    assert_success(&table);
    let text = String::from_utf8_lossy(&table.stdout);
    assert!(text.contains("staff_entry -> quality_check"));
    assert!(text.contains("* -> failed"));

    let completions = run_mill(&root, None, &["completions", "bash"]);
    assert_success(&completions);
    assert!(String::from_utf8_lossy(&completions.stdout).contains("mill"));

    assert!(!root.join(".mill/state.sqlite").exists());
    let _ = std::fs::remove_dir_all(root);
}
