//! Host capability injection.
//!
//! A [`ContextProvider`] contributes named variables to every module scope.
//! The runtime calls [`ContextProvider::provide`] once per module body with
//! the identifier of the module being executed, so values can differ per
//! script.

use std::collections::{BTreeMap, HashSet};

use boa_engine::{Context, JsResult, JsValue};

use crate::commonjs::STANDARD_BINDINGS;
use crate::error::{RuntimeError, RuntimeResult};

/// Supplies host variables to module scopes.
pub trait ContextProvider {
    /// Names bound in the module scope, in the order `provide` returns values
    fn variable_names(&self) -> Vec<String>;

    /// Values for the module `identifier`, one per name
    fn provide(&self, identifier: &str, context: &mut Context) -> JsResult<Vec<JsValue>>;
}

/// Injects fixed JSON values under their key names.
#[derive(Debug, Clone, Default)]
pub struct GlobalsProvider {
    values: BTreeMap<String, serde_json::Value>,
}

impl GlobalsProvider {
    pub fn new(values: BTreeMap<String, serde_json::Value>) -> Self {
        Self { values }
    }

    /// Builder: add one value
    pub fn with(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ContextProvider for GlobalsProvider {
    fn variable_names(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    fn provide(&self, _identifier: &str, context: &mut Context) -> JsResult<Vec<JsValue>> {
        self.values
            .values()
            .map(|value| JsValue::from_json(value, context))
            .collect()
    }
}

const RESERVED_WORDS: &[&str] = &[
    "arguments", "await", "break", "case", "catch", "class", "const", "continue", "debugger",
    "default", "delete", "do", "else", "enum", "eval", "export", "extends", "false", "finally",
    "for", "function", "if", "implements", "import", "in", "instanceof", "interface", "let",
    "new", "null", "package", "private", "protected", "public", "return", "static", "super",
    "switch", "this", "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield",
];

/// Check that injected names can be used as wrapper parameters.
pub fn validate_variable_names<S: AsRef<str>>(names: &[S]) -> RuntimeResult<()> {
    let mut seen = HashSet::new();
    for name in names {
        let name = name.as_ref();
        let mut chars = name.chars();
        let valid = match chars.next() {
            Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {
                chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
            }
            _ => false,
        };
        if !valid {
            return Err(RuntimeError::invalid_context_name(name, "not a JavaScript identifier"));
        }
        if RESERVED_WORDS.contains(&name) {
            return Err(RuntimeError::invalid_context_name(name, "reserved word"));
        }
        if STANDARD_BINDINGS.contains(&name) {
            return Err(RuntimeError::invalid_context_name(name, "shadows a module binding"));
        }
        if !seen.insert(name) {
            return Err(RuntimeError::invalid_context_name(name, "provided twice"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_names() {
        assert!(validate_variable_names(&["app", "$db", "_config", "tools2"]).is_ok());

        let err = validate_variable_names(&["2fast"]).unwrap_err();
        assert!(err.to_string().contains("not a JavaScript identifier"));

        let err = validate_variable_names(&["require"]).unwrap_err();
        assert!(err.to_string().contains("shadows a module binding"));

        let err = validate_variable_names(&["class"]).unwrap_err();
        assert!(err.to_string().contains("reserved word"));

        let err = validate_variable_names(&["app", "app"]).unwrap_err();
        assert!(err.to_string().contains("provided twice"));
    }

    #[test]
    fn test_globals_provider() {
        assert!(GlobalsProvider::default().is_empty());

        let provider = GlobalsProvider::default()
            .with("settings", json!({ "limit": 3 }))
            .with("appName", json!("docs"));

        assert!(!provider.is_empty());
        assert_eq!(provider.variable_names(), vec!["appName", "settings"]);

        let mut context = Context::default();
        let values = provider.provide("tool.js", &mut context).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(
            values[0].to_json(&mut context).unwrap(),
            Some(json!("docs"))
        );
    }
}
