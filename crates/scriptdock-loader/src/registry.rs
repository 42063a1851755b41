//! In-memory index of loaded scripts.

use std::collections::BTreeMap;

use scriptdock_runtime::{ExecutionRuntime, RuntimeError, ScriptHandle, ScriptValue};

use crate::error::{LoaderError, LoaderResult};

/// Everything known about one loaded script.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptMetadata {
    /// Path relative to the watched root, `/` separated
    pub identifier: String,
    /// Identifier without the name prefix and extension
    pub name: String,
    /// Modification time in milliseconds since the Unix epoch
    pub mtime: u64,
    pub compiled_code: String,
    pub handle: Option<ScriptHandle>,
}

/// Script metadata keyed by identifier.
///
/// The registry owns what it stores: `register` takes the metadata by value and
/// queries hand out references or clones, so no caller keeps a mutable alias.
#[derive(Debug, Default)]
pub struct ScriptRegistry {
    scripts: BTreeMap<String, ScriptMetadata>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or fully replace the entry for `metadata.identifier`.
    ///
    /// Returns the replaced entry.
    pub fn register(&mut self, metadata: ScriptMetadata) -> Option<ScriptMetadata> {
        self.scripts.insert(metadata.identifier.clone(), metadata)
    }

    /// Remove an entry; absent identifiers are ignored
    pub fn unregister(&mut self, identifier: &str) -> Option<ScriptMetadata> {
        self.scripts.remove(identifier)
    }

    pub fn get(&self, identifier: &str) -> Option<&ScriptMetadata> {
        self.scripts.get(identifier)
    }

    pub fn has(&self, identifier: &str) -> bool {
        self.scripts.contains_key(identifier)
    }

    /// All entries, sorted by identifier
    pub fn get_all(&self) -> Vec<&ScriptMetadata> {
        self.scripts.values().collect()
    }

    /// Sorted identifiers
    pub fn identifiers(&self) -> Vec<String> {
        self.scripts.keys().cloned().collect()
    }

    /// Every entry whose derived name is `name`
    pub fn get_by_name(&self, name: &str) -> Vec<&ScriptMetadata> {
        self.scripts.values().filter(|m| m.name == name).collect()
    }

    pub fn clear(&mut self) {
        self.scripts.clear();
    }

    pub fn count(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    fn handle(&self, identifier: &str) -> LoaderResult<&ScriptHandle> {
        let metadata = self
            .scripts
            .get(identifier)
            .ok_or_else(|| RuntimeError::ScriptNotFound(identifier.to_string()))?;
        metadata
            .handle
            .as_ref()
            .ok_or_else(|| LoaderError::MissingHandle(identifier.to_string()))
    }

    /// Call an export of a registered script through its handle
    pub fn invoke(
        &self,
        runtime: &mut dyn ExecutionRuntime,
        identifier: &str,
        export_path: &str,
        args: &[ScriptValue],
    ) -> LoaderResult<ScriptValue> {
        let handle = self.handle(identifier)?;
        Ok(runtime.invoke_by_id(&handle.id, export_path, args)?)
    }

    /// Read an export of a registered script through its handle
    pub fn get_export(
        &self,
        runtime: &mut dyn ExecutionRuntime,
        identifier: &str,
        export_path: &str,
    ) -> LoaderResult<ScriptValue> {
        let handle = self.handle(identifier)?;
        Ok(runtime.get_export_by_id(&handle.id, export_path)?)
    }
}
