//! CLI command implementations
//!
//! Every command loads the configuration, opens the store and loads the
//! module definitions before doing any work. A failed command writes an
//! error response and exits non-zero.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::executor::ReportRequest;
use crate::observability::{log_event_with_fields, Event, ObservationScope};
use crate::record::{format_timestamp, Record, RecordFilter};
use crate::schema::{Module, ModuleLoader};
use crate::store::{QueryContext, Store, StoreConfig};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_request, read_required_request, write_error, write_response};

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Database settings
    #[serde(flatten)]
    pub store: StoreConfig,

    /// Directory of module definition files
    #[serde(default = "default_module_dir")]
    pub module_dir: String,
}

fn default_module_dir() -> String {
    "./modules".to_string()
}

impl CliConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let config: CliConfig = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.store.validate()?;

        if config.module_dir.trim().is_empty() {
            return Err(CliError::config_error("module_dir must not be empty"));
        }

        log_event_with_fields(Event::ConfigLoaded, &[("path", &path.to_string_lossy())]);

        Ok(config)
    }

    /// Module directory path
    pub fn module_path(&self) -> PathBuf {
        PathBuf::from(&self.module_dir)
    }
}

/// Run the CLI
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run a parsed command, reporting failures on stdout
pub fn run_command(cmd: Command) -> CliResult<()> {
    let result = match cmd {
        Command::Init { config } => init(&config),
        Command::Import { config, module } => import(&config, &module),
        Command::Search { config, module } => search(&config, &module),
        Command::Report { config, module } => report(&config, &module),
    };

    if let Err(e) = &result {
        write_error(e.code_str(), &e.message())?;
    }
    result
}

/// Creates the database file and checks every module definition
pub fn init(config_path: &Path) -> CliResult<()> {
    let scope = ObservationScope::new("CLI_INIT");
    let (config, store, loader) = boot(config_path)?;

    write_response(json!({
        "initialized": true,
        "path": store.config().path,
        "module_dir": config.module_dir,
        "modules": loader.len(),
    }))?;

    scope.complete();
    Ok(())
}

/// Creates (or, with an id, upserts) the records given on stdin
pub fn import(config_path: &Path, module_ref: &str) -> CliResult<()> {
    let scope = ObservationScope::with_fields("CLI_IMPORT", &[("module", module_ref)]);
    let (_, store, loader) = boot(config_path)?;
    let module = resolve_module(&loader, module_ref)?;

    let mut records = records_from_json(module, read_required_request()?)?;
    store.upsert(&QueryContext::background(), module, &mut records)?;

    let ids: Vec<u64> = records.iter().map(|r| r.id).collect();
    write_response(json!({
        "imported": ids.len(),
        "ids": ids,
    }))?;

    scope.complete_with_fields(&[("count", &records.len().to_string())]);
    Ok(())
}

/// Prints one page of records for the filter given on stdin
pub fn search(config_path: &Path, module_ref: &str) -> CliResult<()> {
    let (_, store, loader) = boot(config_path)?;
    let module = resolve_module(&loader, module_ref)?;

    let filter: RecordFilter = match read_request()? {
        Some(v) => serde_json::from_value(v)?,
        None => RecordFilter::default(),
    };

    let (records, filter) = store.search(&QueryContext::background(), module, filter)?;

    write_response(json!({
        "records": records,
        "filter": filter,
    }))
}

/// Prints report rows for the request given on stdin
pub fn report(config_path: &Path, module_ref: &str) -> CliResult<()> {
    let scope = ObservationScope::with_fields("CLI_REPORT", &[("module", module_ref)]);
    let (_, store, loader) = boot(config_path)?;
    let module = resolve_module(&loader, module_ref)?;

    let request: ReportRequest = match read_request()? {
        Some(v) => serde_json::from_value(v)?,
        None => ReportRequest::default(),
    };

    let rows = store.report(
        &QueryContext::background(),
        module,
        &request.metrics,
        &request.dimensions,
        &request.filter,
    )?;

    write_response(json!({ "rows": rows }))?;

    scope.complete_with_fields(&[("rows", &rows.len().to_string())]);
    Ok(())
}

/// Loads configuration, opens the store and loads modules
fn boot(config_path: &Path) -> CliResult<(CliConfig, Store, ModuleLoader)> {
    let config = CliConfig::load(config_path)?;
    let store = Store::open(config.store.clone())?;

    let mut loader = ModuleLoader::new(&config.module_path());
    loader.load_all()?;
    log_event_with_fields(
        Event::ModulesLoaded,
        &[
            ("module_dir", &config.module_dir),
            ("count", &loader.len().to_string()),
        ],
    );

    Ok((config, store, loader))
}

/// Finds a module by numeric id, then by handle
fn resolve_module<'a>(loader: &'a ModuleLoader, module_ref: &str) -> CliResult<&'a Module> {
    module_ref
        .parse::<u64>()
        .ok()
        .and_then(|id| loader.get(id))
        .or_else(|| loader.by_handle(module_ref))
        .ok_or_else(|| CliError::module_not_found(module_ref))
}

/// Decodes imported records, defaulting module ids and creation time
fn records_from_json(module: &Module, input: Value) -> CliResult<Vec<Record>> {
    let items = match input {
        Value::Array(items) => items,
        single @ Value::Object(_) => vec![single],
        _ => return Err(CliError::bad_request("expected a JSON array of records")),
    };

    let now = format_timestamp(&Utc::now());
    let mut records = Vec::with_capacity(items.len());
    for mut item in items {
        let obj = item
            .as_object_mut()
            .ok_or_else(|| CliError::bad_request("every record must be a JSON object"))?;
        obj.entry("moduleId").or_insert_with(|| json!(module.id));
        obj.entry("namespaceId")
            .or_insert_with(|| json!(module.namespace_id));
        obj.entry("createdAt").or_insert_with(|| json!(now));

        records.push(serde_json::from_value(item)?);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Field;
    use tempfile::TempDir;

    #[test]
    fn test_config_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("recordql.json");
        fs::write(&path, r#"{"max_refetches": 3}"#).unwrap();

        let config = CliConfig::load(&path).unwrap();
        assert_eq!(config.module_dir, "./modules");
        assert_eq!(config.store.max_refetches, 3);
        assert!(config.store.is_memory());
    }

    #[test]
    fn test_invalid_config() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("recordql.json");
        fs::write(&path, r#"{"journal_mode": "sometimes"}"#).unwrap();

        let err = CliConfig::load(&path).unwrap_err();
        assert_eq!(err.code_str(), "RQ_CLI_CONFIG_ERROR");
        assert!(CliConfig::load(&tmp.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_resolve_module_by_id_or_handle() {
        let mut loader = ModuleLoader::new(Path::new("."));
        loader
            .register(Module::new(4, 1, vec![Field::string("title")]).with_handle("notes"))
            .unwrap();

        assert_eq!(resolve_module(&loader, "4").unwrap().id, 4);
        assert_eq!(resolve_module(&loader, "notes").unwrap().id, 4);
        assert_eq!(
            resolve_module(&loader, "5").unwrap_err().code_str(),
            "RQ_CLI_MODULE_NOT_FOUND"
        );
    }

    #[test]
    fn test_records_from_json_fills_defaults() {
        let module = Module::new(4, 1, vec![Field::string("title")]);
        let records = records_from_json(
            &module,
            json!([
                {"values": [{"name": "title", "value": "a"}]},
                {"id": 9, "values": []}
            ]),
        )
        .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].module_id, 4);
        assert_eq!(records[0].namespace_id, 1);
        assert_eq!(records[0].values.get("title", 0).unwrap().value, "a");
        assert_eq!(records[1].id, 9);

        assert!(records_from_json(&module, json!("nope")).is_err());
        assert!(records_from_json(&module, json!([1])).is_err());
    }
}
