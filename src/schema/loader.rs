//! Module loader for reading module definitions from disk
//!
//! - One JSON file per module (`*.json`) in the module directory
//! - Malformed files fail the load; nothing is partially registered
//! - Module ids are unique across the directory

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{QueryError, QueryResult};

use super::types::Module;

/// Loads module definitions and keeps them in an id-indexed registry.
pub struct ModuleLoader {
    /// Directory containing module files
    module_dir: PathBuf,
    /// Loaded modules indexed by id
    modules: BTreeMap<u64, Module>,
}

impl ModuleLoader {
    /// Creates a loader for the given directory.
    pub fn new(module_dir: &Path) -> Self {
        Self {
            module_dir: module_dir.to_path_buf(),
            modules: BTreeMap::new(),
        }
    }

    /// Returns the module directory path.
    pub fn module_dir(&self) -> &Path {
        &self.module_dir
    }

    /// Loads every `*.json` file in the module directory.
    ///
    /// A missing directory is treated as empty.
    pub fn load_all(&mut self) -> QueryResult<()> {
        if !self.module_dir.exists() {
            return Ok(());
        }

        let entries = fs::read_dir(&self.module_dir).map_err(|e| {
            QueryError::Config(format!(
                "Failed to read module directory {}: {}",
                self.module_dir.display(),
                e
            ))
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                QueryError::Config(format!("Failed to read directory entry: {}", e))
            })?;

            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            paths.push(path);
        }

        // Deterministic load order
        paths.sort();

        let mut loaded = BTreeMap::new();
        for path in paths {
            let module = Self::read_module_file(&path)?;
            if loaded.contains_key(&module.id) {
                return Err(QueryError::Config(format!(
                    "{}: duplicate module id {}",
                    path.display(),
                    module.id
                )));
            }
            loaded.insert(module.id, module);
        }

        for (id, module) in loaded {
            self.register(module).map_err(|e| {
                QueryError::Config(format!("module {}: {}", id, e))
            })?;
        }

        Ok(())
    }

    /// Reads and validates one module file.
    pub fn read_module_file(path: &Path) -> QueryResult<Module> {
        let content = fs::read_to_string(path).map_err(|e| {
            QueryError::Config(format!("{}: failed to read file: {}", path.display(), e))
        })?;

        let module: Module = serde_json::from_str(&content).map_err(|e| {
            QueryError::Config(format!("{}: invalid JSON: {}", path.display(), e))
        })?;

        module
            .validate_structure()
            .map_err(|e| QueryError::Config(format!("{}: {}", path.display(), e)))?;

        Ok(module)
    }

    /// Registers a module directly (for testing or programmatic creation).
    pub fn register(&mut self, module: Module) -> QueryResult<()> {
        module.validate_structure().map_err(QueryError::Config)?;

        if self.modules.contains_key(&module.id) {
            return Err(QueryError::Config(format!(
                "module {} already registered",
                module.id
            )));
        }

        self.modules.insert(module.id, module);
        Ok(())
    }

    /// Gets a module by id.
    pub fn get(&self, module_id: u64) -> Option<&Module> {
        self.modules.get(&module_id)
    }

    /// Finds a module by handle.
    pub fn by_handle(&self, handle: &str) -> Option<&Module> {
        self.modules.values().find(|m| m.handle == handle)
    }

    /// Number of registered modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns true when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::Field;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn test_load_all() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "tickets.json",
            r#"{"id": 10, "namespaceId": 1, "handle": "tickets",
                "fields": [{"name": "status", "kind": "string"}]}"#,
        );
        write(tmp.path(), "README.txt", "ignored");

        let mut loader = ModuleLoader::new(tmp.path());
        loader.load_all().unwrap();

        assert_eq!(loader.len(), 1);
        assert!(loader.get(10).unwrap().has_field("status"));
        assert_eq!(loader.by_handle("tickets").map(|m| m.id), Some(10));
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let tmp = TempDir::new().unwrap();
        let mut loader = ModuleLoader::new(&tmp.path().join("nope"));
        loader.load_all().unwrap();
        assert!(loader.is_empty());
    }

    #[test]
    fn test_malformed_file_fails() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "bad.json", "{ not json");

        let mut loader = ModuleLoader::new(tmp.path());
        let err = loader.load_all().unwrap_err();
        assert_eq!(err.code(), "RQ_CONFIG_ERROR");
        assert!(loader.is_empty());
    }

    #[test]
    fn test_duplicate_ids_fail() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.json", r#"{"id": 1, "namespaceId": 1}"#);
        write(tmp.path(), "b.json", r#"{"id": 1, "namespaceId": 2}"#);

        let mut loader = ModuleLoader::new(tmp.path());
        assert!(loader.load_all().is_err());
        assert!(loader.is_empty());
    }

    #[test]
    fn test_register_twice_fails() {
        let mut loader = ModuleLoader::new(Path::new("."));
        loader
            .register(Module::new(5, 1, vec![Field::string("a")]))
            .unwrap();
        assert!(loader.register(Module::new(5, 1, vec![])).is_err());
    }
}
