//! Host notifications from the loader.

use scriptdock_runtime::ScriptValue;

use crate::error::LoaderError;
use crate::registry::ScriptMetadata;

/// Receives script lifecycle notifications. Every method defaults to a no-op.
pub trait LoaderEvents {
    /// A script was compiled, executed and registered
    fn on_script_loaded(&self, _metadata: &ScriptMetadata, _exports: &ScriptValue) {}

    /// A script left the registry
    fn on_script_unloaded(&self, _metadata: &ScriptMetadata) {}

    /// A script failed to read, compile or execute
    fn on_script_error(&self, _identifier: &str, _error: &LoaderError) {}
}

/// Ignores every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEvents;

impl LoaderEvents for NoopEvents {}

/// Logs every notification through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEvents;

impl LoaderEvents for TracingEvents {
    fn on_script_loaded(&self, metadata: &ScriptMetadata, _exports: &ScriptValue) {
        tracing::info!(identifier = %metadata.identifier, name = %metadata.name, "script loaded");
    }

    fn on_script_unloaded(&self, metadata: &ScriptMetadata) {
        tracing::info!(identifier = %metadata.identifier, "script unloaded");
    }

    fn on_script_error(&self, identifier: &str, error: &LoaderError) {
        tracing::error!(identifier, error = %error, "script failed");
    }
}
