//! Module resolution for `require()`.
//!
//! Resolvers map a specifier plus the identifier of the requiring module to
//! a resolved module identifier, then supply that module's source. Only
//! relative specifiers (`./x`, `../x`) are resolvable; anything that would
//! leave the root resolves to nothing.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::UNIX_EPOCH;

use crate::commonjs::dirname;
use crate::config::LoaderKind;
use crate::error::{RuntimeError, RuntimeResult};

/// Extensions tried, in order, when a specifier omits one
pub const DEFAULT_EXTENSIONS: [&str; 6] = ["ts", "js", "cjs", "mjs", "cts", "mts"];

/// Source of a resolved module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSource {
    pub code: String,
    /// Modification time in milliseconds, used as the compile cache key
    pub mtime: Option<u64>,
    pub kind: LoaderKind,
    /// `true` when `code` is already executable JavaScript
    pub compiled: bool,
}

impl ModuleSource {
    /// Raw source that still needs to go through the compiler
    pub fn raw(code: impl Into<String>, kind: LoaderKind, mtime: Option<u64>) -> Self {
        Self {
            code: code.into(),
            mtime,
            kind,
            compiled: false,
        }
    }

    /// Executable CommonJS code
    pub fn compiled(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            mtime: None,
            kind: LoaderKind::JavaScript,
            compiled: true,
        }
    }
}

/// Resolves `require()` specifiers to module identifiers and loads them.
pub trait ModuleResolver {
    /// Resolve `specifier` relative to the module `from`; `None` if unresolvable
    fn resolve(&self, specifier: &str, from: &str) -> Option<String>;

    /// Load the source of a resolved identifier
    fn load(&self, identifier: &str) -> RuntimeResult<ModuleSource>;
}

/// Join a relative specifier onto the directory of `from`.
///
/// Returns `None` for bare specifiers and for paths escaping the root.
pub fn resolve_relative(specifier: &str, from: &str) -> Option<String> {
    let is_relative = specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../");
    if !is_relative {
        return None;
    }

    let mut segments: Vec<&str> = dirname(from).split('/').filter(|s| !s.is_empty()).collect();
    for part in specifier.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}

/// Candidate identifiers for a resolved base path, in lookup order:
/// the exact path, the path with each extension, then `index.<ext>` inside it.
pub fn candidates<S: AsRef<str>>(base: &str, extensions: &[S]) -> Vec<String> {
    let mut out = Vec::with_capacity(1 + extensions.len() * 2);
    out.push(base.to_string());
    for ext in extensions {
        out.push(format!("{base}.{}", ext.as_ref()));
    }
    for ext in extensions {
        out.push(format!("{base}/index.{}", ext.as_ref()));
    }
    out
}

fn system_time_millis(time: std::time::SystemTime) -> Option<u64> {
    time.duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_millis() as u64)
}

/// Resolver over a directory on disk.
#[derive(Debug, Clone)]
pub struct FsModuleResolver {
    root: PathBuf,
    extensions: Vec<String>,
}

impl FsModuleResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }

    /// Builder: set the extensions tried for extension-less specifiers
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }
}

impl ModuleResolver for FsModuleResolver {
    fn resolve(&self, specifier: &str, from: &str) -> Option<String> {
        let base = resolve_relative(specifier, from)?;
        candidates(&base, &self.extensions)
            .into_iter()
            .find(|candidate| self.root.join(candidate).is_file())
    }

    fn load(&self, identifier: &str) -> RuntimeResult<ModuleSource> {
        let path = self.root.join(identifier);
        let code = std::fs::read_to_string(&path)?;
        let mtime = std::fs::metadata(&path)?
            .modified()
            .ok()
            .and_then(system_time_millis);
        Ok(ModuleSource::raw(code, LoaderKind::from_path(identifier), mtime))
    }
}

/// In-memory resolver, mainly for embedding and tests.
#[derive(Debug)]
pub struct MemoryModuleResolver {
    modules: RefCell<HashMap<String, ModuleSource>>,
    extensions: Vec<String>,
}

impl Default for MemoryModuleResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryModuleResolver {
    pub fn new() -> Self {
        Self {
            modules: RefCell::new(HashMap::new()),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }

    /// Register raw source under an identifier; the kind follows its extension
    pub fn insert(&self, identifier: impl Into<String>, code: impl Into<String>) {
        let identifier = identifier.into();
        let kind = LoaderKind::from_path(&identifier);
        self.insert_source(identifier, ModuleSource::raw(code, kind, None));
    }

    pub fn insert_source(&self, identifier: impl Into<String>, source: ModuleSource) {
        self.modules.borrow_mut().insert(identifier.into(), source);
    }

    pub fn remove(&self, identifier: &str) -> bool {
        self.modules.borrow_mut().remove(identifier).is_some()
    }
}

impl ModuleResolver for MemoryModuleResolver {
    fn resolve(&self, specifier: &str, from: &str) -> Option<String> {
        let base = resolve_relative(specifier, from)?;
        let modules = self.modules.borrow();
        candidates(&base, &self.extensions)
            .into_iter()
            .find(|candidate| modules.contains_key(candidate))
    }

    fn load(&self, identifier: &str) -> RuntimeResult<ModuleSource> {
        self.modules
            .borrow()
            .get(identifier)
            .cloned()
            .ok_or_else(|| RuntimeError::internal(format!("module '{identifier}' disappeared")))
    }
}
