//! Loader and script source configuration.

use std::path::PathBuf;
use std::time::Duration;

use scriptdock_runtime::DEFAULT_EXTENSIONS;

/// Default quiet period before a watch event triggers a reload pass
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Loader orchestrator configuration
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Quiet period after the last watch event before reloading
    pub debounce: Duration,

    /// Prefix stripped from identifiers when deriving script names
    pub name_prefix: Option<String>,

    /// Do not re-execute files whose mtime matches the registered entry.
    /// Default: false (every pass re-executes every file)
    pub skip_unchanged: bool,

    /// Dispose the runtime when the loader stops.
    /// Default: true
    pub dispose_runtime_on_stop: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            name_prefix: None,
            skip_unchanged: false,
            dispose_runtime_on_stop: true,
        }
    }
}

impl LoaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the debounce interval
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Builder: set the prefix stripped from names
    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = Some(prefix.into());
        self
    }

    /// Builder: skip re-executing unchanged files
    pub fn with_skip_unchanged(mut self, skip: bool) -> Self {
        self.skip_unchanged = skip;
        self
    }

    /// Builder: keep or dispose the runtime on stop
    pub fn with_dispose_runtime_on_stop(mut self, dispose: bool) -> Self {
        self.dispose_runtime_on_stop = dispose;
        self
    }
}

/// Configuration for [`FsScriptSource`](crate::FsScriptSource).
#[derive(Debug, Clone)]
pub struct FsSourceConfig {
    /// Watched root directory
    pub root: PathBuf,
    /// File extensions treated as scripts (without the dot)
    pub extensions: Vec<String>,
    /// Directory names skipped while listing and watching
    pub ignore_dirs: Vec<String>,
}

impl FsSourceConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            ignore_dirs: vec!["node_modules".to_string(), ".git".to_string()],
        }
    }

    /// Builder: replace the extension allow-list
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    /// Builder: replace the ignored directory names
    pub fn with_ignore_dirs(mut self, ignore_dirs: Vec<String>) -> Self {
        self.ignore_dirs = ignore_dirs;
        self
    }
}
