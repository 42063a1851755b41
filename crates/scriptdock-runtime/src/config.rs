//! Configuration types for the scriptdock runtime.
//!
//! This module provides the compiler settings and the classification of
//! script sources into JavaScript and TypeScript.

use std::path::Path;
use swc_ecma_ast::EsVersion;

/// How a script source is parsed before execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoaderKind {
    /// Plain JavaScript (`.js`, `.cjs`, `.mjs`)
    #[default]
    JavaScript,
    /// TypeScript (`.ts`, `.cts`, `.mts`), types are stripped
    TypeScript,
}

impl LoaderKind {
    /// Detect the loader kind from a file extension (without the dot)
    pub fn from_extension(ext: Option<&str>) -> Option<Self> {
        match ext {
            Some("js" | "cjs" | "mjs") => Some(Self::JavaScript),
            Some("ts" | "cts" | "mts") => Some(Self::TypeScript),
            _ => None,
        }
    }

    /// Detect the loader kind from an identifier or path, defaulting to JavaScript
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self::from_extension(path.as_ref().extension().and_then(|e| e.to_str()))
            .unwrap_or_default()
    }

    pub fn is_typescript(&self) -> bool {
        matches!(self, Self::TypeScript)
    }
}

/// Compiler configuration.
///
/// Controls how sources are parsed and which ECMAScript version is emitted.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Target ECMAScript version for output.
    /// Default: ES2022
    pub target: EsVersion,

    /// Enable decorator syntax.
    /// Default: true
    pub decorators: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            target: EsVersion::Es2022,
            decorators: true,
        }
    }
}

impl CompilerConfig {
    /// Create a new compiler config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the target ECMAScript version.
    pub fn with_target(mut self, target: EsVersion) -> Self {
        self.target = target;
        self
    }

    /// Builder: enable or disable decorators.
    pub fn with_decorators(mut self, enabled: bool) -> Self {
        self.decorators = enabled;
        self
    }

    /// Parse a target name such as `es2020` or `esnext`.
    pub fn parse_target(name: &str) -> Option<EsVersion> {
        let target = match name.to_ascii_lowercase().as_str() {
            "es3" => EsVersion::Es3,
            "es5" => EsVersion::Es5,
            "es2015" | "es6" => EsVersion::Es2015,
            "es2016" => EsVersion::Es2016,
            "es2017" => EsVersion::Es2017,
            "es2018" => EsVersion::Es2018,
            "es2019" => EsVersion::Es2019,
            "es2020" => EsVersion::Es2020,
            "es2021" => EsVersion::Es2021,
            "es2022" => EsVersion::Es2022,
            "es2023" => EsVersion::Es2023,
            "es2024" => EsVersion::Es2024,
            "esnext" => EsVersion::EsNext,
            _ => return None,
        };
        Some(target)
    }
}
