use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn mbase_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_mbase"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    // Segment files as left behind by the extraction step
    let segments_dir = root.join("segments");
    fs::create_dir_all(&segments_dir).unwrap();
    fs::write(
        segments_dir.join("engine.pdf.json"),
        r#"[
  {"page": 1, "text": "Main engine start-up procedure. Open the starting air valve and check lube oil pressure before cranking."},
  {"page": 2, "text": "| Alarm | Setpoint |\n| Lube oil pressure low | 2.5 bar |", "kind": "table", "table_index": 0},
  {"page": 3, "text": "Fuel injection timing must be verified after every overhaul of the fuel pump."}
]"#,
    )
    .unwrap();
    fs::write(
        segments_dir.join("boiler.json"),
        r#"{"source_file": "boiler_manual.pdf", "segments": [
  {"page": 7, "text": "Boiler water level gauge glass must be blown down once per watch."}
]}"#,
    )
    .unwrap();

    let config_content = format!(
        r#"[storage]
dir = "{}/data"

[chunking]
size = 400
overlap = 50

[retrieval]
default_k = 5

[embedding]
provider = "hash"
dims = 128
"#,
        root.display()
    );

    let config_path = config_dir.join("mbase.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_mbase(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = mbase_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run mbase binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn segments(config_path: &Path, name: &str) -> String {
    let root = config_path.parent().unwrap().parent().unwrap();
    root.join("segments").join(name).to_string_lossy().to_string()
}

fn registered_env() -> (TempDir, PathBuf) {
    let (tmp, config_path) = setup_test_env();
    let (_, stderr, success) = run_mbase(&config_path, &["init"]);
    assert!(success, "init failed: {}", stderr);
    let (_, stderr, success) = run_mbase(
        &config_path,
        &["equipment", "register", "main_engine", "Main Engine"],
    );
    assert!(success, "register failed: {}", stderr);
    (tmp, config_path)
}

fn query_json(config_path: &Path, args: &[&str]) -> Vec<serde_json::Value> {
    let mut full = vec!["query"];
    full.extend_from_slice(args);
    full.push("--json");
    let (stdout, stderr, success) = run_mbase(config_path, &full);
    assert!(success, "query failed: stdout={}, stderr={}", stdout, stderr);
    serde_json::from_str(&stdout).unwrap()
}

// ─── Init ────────────────────────────────────────────────────────────

#[test]
fn test_init_creates_storage() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_mbase(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));

    let data = tmp.path().join("data");
    assert!(data.join("manualbase.sqlite").exists());
    let registry = fs::read_to_string(data.join("equipment_registry.json")).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&registry).unwrap();
    assert_eq!(parsed, serde_json::json!({}));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = registered_env();

    let (_, _, success) = run_mbase(&config_path, &["init"]);
    assert!(success, "Second init failed (not idempotent)");

    // Registered equipment survives a second init
    let (stdout, _, _) = run_mbase(&config_path, &["equipment", "list"]);
    assert!(stdout.contains("main_engine"));
}

// ─── Equipment ───────────────────────────────────────────────────────

#[test]
fn test_register_and_list() {
    let (_tmp, config_path) = registered_env();

    let (stdout, stderr, success) = run_mbase(&config_path, &["equipment", "list", "--json"]);
    assert!(success, "list failed: {}", stderr);
    let list: Vec<serde_json::Value> = serde_json::from_str(&stdout).unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["equipment_id"], "main_engine");
    assert_eq!(list[0]["name"], "Main Engine");
    assert_eq!(list[0]["chunk_count"], 0);
}

#[test]
fn test_register_duplicate_fails() {
    let (_tmp, config_path) = registered_env();

    let (_, stderr, success) = run_mbase(
        &config_path,
        &["equipment", "register", "main_engine", "Again"],
    );
    assert!(!success, "duplicate register should fail");
    assert!(stderr.contains("main_engine"));
}

#[test]
fn test_show_unknown_equipment() {
    let (_tmp, config_path) = registered_env();

    let (_, stderr, success) = run_mbase(&config_path, &["equipment", "show", "generator"]);
    assert!(!success);
    assert!(stderr.contains("generator"));
}

#[test]
fn test_delete_equipment() {
    let (_tmp, config_path) = registered_env();
    run_mbase(
        &config_path,
        &["ingest", "main_engine", &segments(&config_path, "engine.pdf.json")],
    );

    let (stdout, stderr, success) = run_mbase(&config_path, &["equipment", "delete", "main_engine"]);
    assert!(success, "delete failed: {}", stderr);
    assert!(stdout.contains("Deleted"));

    let (stdout, _, _) = run_mbase(&config_path, &["equipment", "list"]);
    assert!(stdout.contains("No equipment registered."));

    // Querying a deleted equipment is an error, not an empty result
    let (_, _, success) = run_mbase(&config_path, &["query", "main_engine", "lube oil"]);
    assert!(!success);

    // A second delete reports the missing registration
    let (_, _, success) = run_mbase(&config_path, &["equipment", "delete", "main_engine"]);
    assert!(!success);
}

// ─── Ingest ──────────────────────────────────────────────────────────

#[test]
fn test_ingest_directory() {
    let (tmp, config_path) = registered_env();
    let dir = tmp.path().join("segments");

    let (stdout, stderr, success) =
        run_mbase(&config_path, &["ingest", "main_engine", dir.to_str().unwrap()]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("boiler_manual.pdf"));
    assert!(stdout.contains("engine.pdf"));
    assert!(stdout.contains("files: 2"));
    assert!(stdout.contains("ok"));

    let (stdout, _, _) = run_mbase(&config_path, &["equipment", "list", "--json"]);
    let list: Vec<serde_json::Value> = serde_json::from_str(&stdout).unwrap();
    assert_eq!(list[0]["manual_count"], 2);
    assert_eq!(list[0]["chunk_count"], 4);
}

#[test]
fn test_reingest_does_not_duplicate() {
    let (_tmp, config_path) = registered_env();
    let file = segments(&config_path, "engine.pdf.json");

    run_mbase(&config_path, &["ingest", "main_engine", &file]);
    let (_, stderr, success) = run_mbase(&config_path, &["ingest", "main_engine", &file]);
    assert!(success, "second ingest failed: {}", stderr);

    let (stdout, _, _) = run_mbase(&config_path, &["stats", "main_engine", "--json"]);
    let stats: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(stats["total_chunks"], 3);
}

#[test]
fn test_ingest_unregistered_equipment() {
    let (_tmp, config_path) = registered_env();

    let (_, stderr, success) = run_mbase(
        &config_path,
        &["ingest", "generator", &segments(&config_path, "engine.pdf.json")],
    );
    assert!(!success);
    assert!(stderr.contains("generator"));
}

#[test]
fn test_ingest_dry_run_writes_nothing() {
    let (_tmp, config_path) = registered_env();

    let (stdout, _, success) = run_mbase(
        &config_path,
        &[
            "ingest",
            "main_engine",
            &segments(&config_path, "engine.pdf.json"),
            "--dry-run",
        ],
    );
    assert!(success);
    assert!(stdout.contains("dry-run"));
    assert!(stdout.contains("chunks: 3"));

    let (stdout, _, _) = run_mbase(&config_path, &["stats", "main_engine", "--json"]);
    let stats: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(stats["total_chunks"], 0);
}

// ─── Query ───────────────────────────────────────────────────────────

#[test]
fn test_query_returns_nearest_chunk() {
    let (_tmp, config_path) = registered_env();
    run_mbase(
        &config_path,
        &["ingest", "main_engine", &segments(&config_path, "engine.pdf.json")],
    );

    let hits = query_json(&config_path, &["main_engine", "fuel injection timing", "--k", "2"]);
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0]["source_file"], "engine.pdf");
    assert_eq!(hits[0]["page_number"], 3);
    let first = hits[0]["distance"].as_f64().unwrap();
    let second = hits[1]["distance"].as_f64().unwrap();
    assert!(first <= second);
}

#[test]
fn test_query_kind_filter() {
    let (_tmp, config_path) = registered_env();
    run_mbase(
        &config_path,
        &["ingest", "main_engine", &segments(&config_path, "engine.pdf.json")],
    );

    let hits = query_json(&config_path, &["main_engine", "lube oil pressure", "--kind", "table"]);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["kind"], "table");
}

#[test]
fn test_query_invalid_kind() {
    let (_tmp, config_path) = registered_env();

    let (_, stderr, success) = run_mbase(
        &config_path,
        &["query", "main_engine", "anything", "--kind", "photo"],
    );
    assert!(!success);
    assert!(stderr.contains("photo"));
}

#[test]
fn test_query_isolated_per_equipment() {
    let (_tmp, config_path) = registered_env();
    run_mbase(
        &config_path,
        &["equipment", "register", "boiler", "Auxiliary Boiler"],
    );
    run_mbase(
        &config_path,
        &["ingest", "main_engine", &segments(&config_path, "engine.pdf.json")],
    );
    run_mbase(
        &config_path,
        &["ingest", "boiler", &segments(&config_path, "boiler.json")],
    );

    let hits = query_json(&config_path, &["boiler", "lube oil pressure", "--k", "10"]);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["source_file"], "boiler_manual.pdf");
}

#[test]
fn test_query_blank_question_unregistered_equipment() {
    let (_tmp, config_path) = registered_env();

    let (_, stderr, success) = run_mbase(&config_path, &["query", "ghost", "   "]);
    assert!(!success, "blank query on an unknown equipment should fail");
    assert!(stderr.contains("ghost"));

    // A blank question against a registered equipment is simply empty
    let hits = query_json(&config_path, &["main_engine", "   "]);
    assert!(hits.is_empty());
}

#[test]
fn test_query_empty_collection() {
    let (_tmp, config_path) = registered_env();

    let hits = query_json(&config_path, &["main_engine", "anything"]);
    assert!(hits.is_empty());

    let (stdout, _, success) = run_mbase(&config_path, &["query", "main_engine", "anything"]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_query_context_block() {
    let (_tmp, config_path) = registered_env();
    run_mbase(
        &config_path,
        &["ingest", "main_engine", &segments(&config_path, "engine.pdf.json")],
    );

    let (stdout, stderr, success) = run_mbase(
        &config_path,
        &["query", "main_engine", "starting air valve", "--context", "--k", "1"],
    );
    assert!(success, "query failed: {}", stderr);
    assert!(stdout.contains("RETRIEVED MANUAL DATA"));
    assert!(stdout.contains("--- Excerpt 1 [TEXT] (Source: engine.pdf, Page: 1"));
}

// ─── Stats and reset ─────────────────────────────────────────────────

#[test]
fn test_stats_overview() {
    let (_tmp, config_path) = registered_env();
    run_mbase(
        &config_path,
        &["ingest", "main_engine", &segments(&config_path, "engine.pdf.json")],
    );

    let (stdout, stderr, success) = run_mbase(&config_path, &["stats"]);
    assert!(success, "stats failed: {}", stderr);
    assert!(stdout.contains("manualbase storage stats"));
    assert!(stdout.contains("Equipment:   1"));
    assert!(stdout.contains("Chunks:      3"));
}

#[test]
fn test_reset_requires_confirmation() {
    let (_tmp, config_path) = registered_env();

    let (_, _, success) = run_mbase(&config_path, &["reset"]);
    assert!(!success, "reset without --yes should fail");

    let (stdout, stderr, success) = run_mbase(&config_path, &["reset", "--yes"]);
    assert!(success, "reset failed: {}", stderr);
    assert!(stdout.contains("Removed 1 equipment."));

    let (stdout, _, _) = run_mbase(&config_path, &["equipment", "list", "--json"]);
    let list: Vec<serde_json::Value> = serde_json::from_str(&stdout).unwrap();
    assert!(list.is_empty());
}

// ─── Config ──────────────────────────────────────────────────────────

#[test]
fn test_invalid_config_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("bad.toml");
    fs::write(&config_path, "[chunking]\nsize = 100\noverlap = 100\n").unwrap();

    let (_, stderr, success) = run_mbase(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("chunking.overlap"));
}

#[test]
fn test_completions_without_config() {
    let output = Command::new(mbase_binary())
        .args(["completions", "bash"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("mbase"));
}
