//! CLI command implementations.

pub mod list;
pub mod run;
pub mod watch;

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use anyhow::Result;
use scriptdock_loader::{
    FsScriptSource, FsSourceConfig, LoaderConfig, LoaderError, LoaderEvents, ScriptLoader,
    ScriptMetadata,
};
use scriptdock_runtime::{
    BoaRuntime, Compiler, ConsoleProvider, FsModuleResolver, GlobalsProvider, RuntimeOptions,
    ScriptValue,
};

use crate::config::Config;

/// Build a loader over `dir` with the configured compiler, globals and reload settings.
pub fn build_loader(
    config: &Config,
    dir: &Path,
    events: Rc<dyn LoaderEvents>,
) -> Result<ScriptLoader> {
    let compiler = Rc::new(Compiler::new(config.compiler_config()?));

    let resolver = FsModuleResolver::new(dir).with_extensions(config.scripts.extensions.clone());
    let mut options = RuntimeOptions::new()
        .with_resolver(Rc::new(resolver))
        .with_provider(Rc::new(ConsoleProvider::new()));
    let globals = GlobalsProvider::new(config.globals.clone());
    if !globals.is_empty() {
        options = options.with_provider(Rc::new(globals));
    }
    let runtime = BoaRuntime::new(Rc::clone(&compiler), options)?;

    let source = FsScriptSource::new(
        FsSourceConfig::new(dir)
            .with_extensions(config.scripts.extensions.clone())
            .with_ignore_dirs(config.scripts.ignore_dirs.clone()),
    );

    let mut loader_config = LoaderConfig::new()
        .with_debounce(Duration::from_millis(config.scripts.debounce_ms))
        .with_skip_unchanged(config.scripts.skip_unchanged);
    if let Some(prefix) = &config.scripts.name_prefix {
        loader_config = loader_config.with_name_prefix(prefix.clone());
    }

    Ok(ScriptLoader::new(
        loader_config,
        Rc::new(source),
        compiler,
        Box::new(runtime),
        events,
    ))
}

/// Keeps script failures for reporting after a pass.
#[derive(Debug, Default)]
pub struct CollectErrors {
    errors: RefCell<Vec<(String, String)>>,
}

impl CollectErrors {
    /// Failures as `(identifier, message)`, in report order
    pub fn errors(&self) -> Vec<(String, String)> {
        self.errors.borrow().clone()
    }

    pub fn error_for(&self, identifier: &str) -> Option<String> {
        self.errors
            .borrow()
            .iter()
            .rev()
            .find(|(id, _)| id == identifier)
            .map(|(_, message)| message.clone())
    }
}

impl LoaderEvents for CollectErrors {
    fn on_script_loaded(&self, metadata: &ScriptMetadata, _exports: &ScriptValue) {
        tracing::debug!(identifier = %metadata.identifier, "script loaded");
    }

    fn on_script_error(&self, identifier: &str, error: &LoaderError) {
        tracing::debug!(identifier, error = %error, "script failed");
        self.errors
            .borrow_mut()
            .push((identifier.to_string(), error.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_errors() {
        let events = CollectErrors::default();
        events.on_script_error("a.js", &LoaderError::source("first"));
        events.on_script_error("b.js", &LoaderError::NotRunning);
        events.on_script_error("a.js", &LoaderError::source("second"));

        assert_eq!(events.errors().len(), 3);
        assert_eq!(events.error_for("a.js").as_deref(), Some("Source error: second"));
        assert_eq!(events.error_for("c.js"), None);
    }
}
