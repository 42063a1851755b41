//! The execution runtime contract.

use crate::error::RuntimeResult;
use crate::value::ScriptValue;

/// Result of loading a script.
///
/// `exports` is a host-side snapshot of the script's resolved exports (the
/// `default` export when defined, otherwise `module.exports`). The live engine
/// value stays in the runtime and is reached through the `*_by_id` methods.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptHandle {
    pub id: String,
    pub exports: ScriptValue,
}

/// Executes compiled scripts and dispatches calls into their exports.
pub trait ExecutionRuntime {
    /// One-time setup before the first load
    fn initialize(&mut self) -> RuntimeResult<()>;

    /// Execute compiled CommonJS `code` as the script `identifier`.
    ///
    /// Loading an identifier that is already loaded replaces it.
    fn load(&mut self, code: &str, identifier: &str) -> RuntimeResult<ScriptHandle>;

    /// Call the export at `export_path` with `args` and return its result.
    ///
    /// Promises returned by the export are settled before returning.
    fn invoke_by_id(
        &mut self,
        script_id: &str,
        export_path: &str,
        args: &[ScriptValue],
    ) -> RuntimeResult<ScriptValue>;

    /// Read the export at `export_path`
    fn get_export_by_id(&mut self, script_id: &str, export_path: &str) -> RuntimeResult<ScriptValue>;

    /// Release one script and its module graph; `false` if it was not loaded
    fn unload(&mut self, script_id: &str) -> bool;

    /// Release every script
    fn dispose(&mut self);

    fn is_loaded(&self, script_id: &str) -> bool;
}

/// Split an export path into property names.
///
/// `""` and `"default"` address the whole resolved exports.
pub fn export_path_segments(path: &str) -> Vec<&str> {
    match path {
        "" | "default" => Vec::new(),
        path => path.split('.').collect(),
    }
}
