//! Store Setup Tests
//!
//! Test Categories:
//! 1. Configuration loading and validation
//! 2. Module definitions loaded from a directory
//! 3. File-backed stores survive a reopen
//! 4. Reports over a loaded module

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use recordql::errors::QueryError;
use recordql::record::{Record, RecordFilter, RecordValue};
use recordql::schema::{FieldKind, ModuleLoader};
use recordql::store::{QueryContext, Store, StoreConfig};

const TASKS_MODULE: &str = r#"{
    "id": 70,
    "namespaceId": 2,
    "handle": "tasks",
    "fields": [
        {"name": "title", "kind": "string"},
        {"name": "estimate", "kind": "number", "options": {"precision": 0}},
        {"name": "due", "kind": "datetime", "options": {"only_date": true}},
        {"name": "labels", "kind": "select", "multi": true}
    ]
}"#;

fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

fn file_config(dir: &TempDir) -> StoreConfig {
    StoreConfig::at(dir.path().join("records.db").to_string_lossy().to_string())
}

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Test: an empty config file is a valid in-memory configuration.
#[test]
fn test_empty_config_uses_defaults() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "config.json", "{}");

    let config = StoreConfig::load(&dir.path().join("config.json")).unwrap();
    assert!(config.is_memory());
    assert_eq!(config, StoreConfig::in_memory());
}

/// Test: invalid settings are rejected at load time.
#[test]
fn test_invalid_config_rejected() {
    let dir = TempDir::new().unwrap();

    for (name, content) in [
        ("journal.json", r#"{"journal_mode": "SIDEWAYS"}"#),
        ("refetch.json", r#"{"max_refetches": 0}"#),
        ("path.json", r#"{"path": "  "}"#),
        ("json.json", "{not json"),
    ] {
        write(dir.path(), name, content);
        let err = StoreConfig::load(&dir.path().join(name)).unwrap_err();
        assert!(matches!(err, QueryError::Config(_)), "{}: {}", name, err);
    }

    assert!(matches!(
        StoreConfig::load(&dir.path().join("missing.json")),
        Err(QueryError::Config(_))
    ));
}

// =============================================================================
// MODULE DEFINITIONS
// =============================================================================

/// Test: module files load by id and handle; other files are skipped.
#[test]
fn test_load_module_directory() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "tasks.json", TASKS_MODULE);
    write(dir.path(), "notes.json", r#"{"id": 71, "namespaceId": 2, "handle": "notes"}"#);
    write(dir.path(), "README.md", "not a module");

    let mut loader = ModuleLoader::new(dir.path());
    loader.load_all().unwrap();

    assert_eq!(loader.len(), 2);
    let tasks = loader.by_handle("tasks").unwrap();
    assert_eq!(tasks.id, 70);
    assert_eq!(tasks.field("estimate").unwrap().options.precision, Some(0));
    assert!(tasks.field("due").unwrap().options.only_date);
    assert!(tasks.field("labels").unwrap().multi);
    assert_eq!(tasks.field("labels").unwrap().kind, FieldKind::Select);
    assert!(loader.get(71).unwrap().fields.is_empty());
}

/// Test: a missing directory loads nothing.
#[test]
fn test_missing_module_directory() {
    let dir = TempDir::new().unwrap();
    let mut loader = ModuleLoader::new(&dir.path().join("absent"));
    loader.load_all().unwrap();
    assert!(loader.is_empty());
}

/// Test: one bad file fails the whole load and registers nothing.
#[test]
fn test_bad_module_fails_load() {
    for bad in [
        r#"{"id": 72, "namespaceId": 2, "fields": [{"name": "bad name", "kind": "string"}]}"#,
        r#"{"id": 70, "namespaceId": 2}"#,
        r#"{"id": 73, "namespaceId": 2, "fields": [{"name": "x", "kind": "blob"}]}"#,
    ] {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a_tasks.json", TASKS_MODULE);
        write(dir.path(), "b_bad.json", bad);

        let mut loader = ModuleLoader::new(dir.path());
        let err = loader.load_all().unwrap_err();
        assert!(matches!(err, QueryError::Config(_)), "{}", bad);
        assert!(loader.is_empty());
    }
}

// =============================================================================
// PERSISTENCE
// =============================================================================

/// Test: records written to a file-backed store are there after reopening.
#[test]
fn test_reopen_keeps_records() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "tasks.json", TASKS_MODULE);
    let module = ModuleLoader::read_module_file(&dir.path().join("tasks.json")).unwrap();
    let ctx = QueryContext::background();

    let id = {
        let store = Store::open(file_config(&dir)).unwrap();
        let mut records = vec![Record::new(module.id, module.namespace_id)
            .with_value(RecordValue::new("title", "write docs"))
            .with_value(RecordValue::new("due", "2024-05-01"))
            .with_value(RecordValue::new("labels", "docs"))
            .with_value(RecordValue::new("labels", "easy").at(1))];
        store.create(&ctx, &module, &mut records).unwrap();
        records[0].id
    };

    let store = Store::open(file_config(&dir)).unwrap();
    let loaded = store.lookup_by_id(&ctx, &module, id).unwrap();
    assert_eq!(loaded.values.get("title", 0).unwrap().value, "write docs");
    assert_eq!(loaded.values.field_values("labels").len(), 2);

    let (records, _) = store
        .search(
            &ctx,
            &module,
            RecordFilter::new().with_query("due < '2024-06-01'"),
        )
        .unwrap();
    assert_eq!(records.len(), 1);
}

// =============================================================================
// REPORTS
// =============================================================================

/// Test: reports group filtered records and aggregate numbers.
#[test]
fn test_report_over_filtered_records() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "tasks.json", TASKS_MODULE);
    let module = ModuleLoader::read_module_file(&dir.path().join("tasks.json")).unwrap();
    let store = Store::open_in_memory().unwrap();
    let ctx = QueryContext::background();

    let mut records: Vec<Record> = [("a", 3), ("a", 5), ("b", 8), ("c", 13)]
        .iter()
        .map(|(title, estimate)| {
            Record::new(module.id, module.namespace_id)
                .with_value(RecordValue::new("title", *title))
                .with_value(RecordValue::new("estimate", estimate.to_string()))
        })
        .collect();
    store.create(&ctx, &module, &mut records).unwrap();

    let rows = store
        .report(
            &ctx,
            &module,
            "sum(estimate), max(estimate)",
            "title",
            &RecordFilter::new().with_query("estimate < 10"),
        )
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["title"], "a");
    assert_eq!(rows[0]["count"], 2);
    assert_eq!(rows[0]["sum_estimate"], 8);
    assert_eq!(rows[0]["max_estimate"], 5);
    assert_eq!(rows[1]["title"], "b");

    let err = store
        .report(&ctx, &module, "sum(title)", "", &RecordFilter::new())
        .unwrap_err();
    assert!(matches!(err, QueryError::TypeMismatch(_)), "{}", err);

    let err = store
        .report(&ctx, &module, "", "nope", &RecordFilter::new())
        .unwrap_err();
    assert!(matches!(err, QueryError::UnknownField(_)), "{}", err);
}
