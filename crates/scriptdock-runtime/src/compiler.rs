//! Compiler with a per-identifier cache keyed by modification time.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::config::{CompilerConfig, LoaderKind};
use crate::error::CompileError;
use crate::transpiler::transpile;

#[derive(Debug, Clone)]
struct CacheEntry {
    mtime: u64,
    code: String,
}

/// Transforms script sources into executable CommonJS JavaScript.
///
/// Results compiled with an `mtime` are cached under their identifier; a later
/// call with the same identifier and the same `mtime` returns the cached code
/// without re-parsing. Calls without an `mtime` always transpile and never
/// touch the cache.
#[derive(Debug, Default)]
pub struct Compiler {
    config: CompilerConfig,
    cache: RefCell<HashMap<String, CacheEntry>>,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            config,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile `source`, reusing the cached result when `mtime` is unchanged.
    pub fn compile(
        &self,
        identifier: &str,
        source: &str,
        kind: LoaderKind,
        mtime: Option<u64>,
    ) -> Result<String, CompileError> {
        if let Some(mtime) = mtime
            && let Some(entry) = self.cache.borrow().get(identifier)
            && entry.mtime == mtime
        {
            tracing::trace!(identifier, mtime, "compile cache hit");
            return Ok(entry.code.clone());
        }

        tracing::debug!(identifier, ?kind, "compiling script");
        let code = transpile(identifier, source, kind, &self.config)?;

        if let Some(mtime) = mtime {
            self.cache.borrow_mut().insert(
                identifier.to_string(),
                CacheEntry {
                    mtime,
                    code: code.clone(),
                },
            );
        }

        Ok(code)
    }

    /// Drop the cache entry for one identifier.
    pub fn invalidate(&self, identifier: &str) -> bool {
        self.cache.borrow_mut().remove(identifier).is_some()
    }

    /// Drop every cache entry.
    pub fn clear(&self) {
        self.cache.borrow_mut().clear();
    }

    pub fn is_cached(&self, identifier: &str) -> bool {
        self.cache.borrow().contains_key(identifier)
    }

    pub fn cached_count(&self) -> usize {
        self.cache.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "export const answer: number = 42;";

    #[test]
    fn test_same_mtime_hits_cache() {
        let compiler = Compiler::default();
        let first = compiler
            .compile("a.ts", SOURCE, LoaderKind::TypeScript, Some(10))
            .unwrap();

        // Different source, same mtime: the cached output is returned untouched
        let second = compiler
            .compile("a.ts", "export const answer = 0;", LoaderKind::TypeScript, Some(10))
            .unwrap();

        assert_eq!(first, second);
        assert!(compiler.is_cached("a.ts"));
    }

    #[test]
    fn test_changed_mtime_recompiles() {
        let compiler = Compiler::default();
        let first = compiler
            .compile("a.ts", SOURCE, LoaderKind::TypeScript, Some(10))
            .unwrap();
        let second = compiler
            .compile("a.ts", "export const answer = 7;", LoaderKind::TypeScript, Some(11))
            .unwrap();

        assert_ne!(first, second);
        assert!(second.contains('7'));
    }

    #[test]
    fn test_without_mtime_not_cached() {
        let compiler = Compiler::default();
        compiler
            .compile("a.js", "module.exports = 1;", LoaderKind::JavaScript, None)
            .unwrap();
        assert!(!compiler.is_cached("a.js"));
        assert_eq!(compiler.cached_count(), 0);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let compiler = Compiler::default();
        compiler.compile("a.ts", SOURCE, LoaderKind::TypeScript, Some(1)).unwrap();
        compiler.compile("b.ts", SOURCE, LoaderKind::TypeScript, Some(1)).unwrap();

        assert!(compiler.invalidate("a.ts"));
        assert!(!compiler.invalidate("a.ts"));
        assert!(compiler.is_cached("b.ts"));

        compiler.clear();
        assert_eq!(compiler.cached_count(), 0);
    }

    #[test]
    fn test_compile_error_not_cached() {
        let compiler = Compiler::default();
        let err = compiler
            .compile("bad.ts", "const = ;", LoaderKind::TypeScript, Some(3))
            .unwrap_err();
        assert_eq!(err.identifier, "bad.ts");
        assert!(!compiler.is_cached("bad.ts"));
    }
}
