//! Integration tests for loading scripts and dispatching into their exports

use std::rc::Rc;

use boa_engine::{Context, JsResult, JsString, JsValue};
use scriptdock_runtime::prelude::*;
use scriptdock_runtime::MemoryModuleResolver;
use serde_json::json;

fn create_runtime(options: RuntimeOptions) -> BoaRuntime {
    let mut runtime = BoaRuntime::new(Rc::new(Compiler::default()), options).unwrap();
    runtime.initialize().unwrap();
    runtime
}

/// Injects the identifier of the module being executed as `scriptName`
struct ScriptNameProvider;

impl ContextProvider for ScriptNameProvider {
    fn variable_names(&self) -> Vec<String> {
        vec!["scriptName".to_string()]
    }

    fn provide(&self, identifier: &str, _context: &mut Context) -> JsResult<Vec<JsValue>> {
        Ok(vec![JsString::from(identifier).into()])
    }
}

#[test]
fn test_default_export_is_unwrapped() {
    let mut runtime = create_runtime(RuntimeOptions::new());
    let handle = runtime
        .load(
            "module.exports = { default: { run() { return 1; } }, other: 2 };",
            "tool.js",
        )
        .unwrap();

    assert_eq!(handle.exports, json!({ "run": "[Function: run]" }));
    assert_eq!(runtime.invoke_by_id("tool.js", "run", &[]).unwrap(), json!(1));
}

#[test]
fn test_nested_export_path_binds_parent() {
    let mut runtime = create_runtime(RuntimeOptions::new());
    runtime
        .load(
            "module.exports = { counter: { n: 41, next() { return this.n + 1; } } };",
            "counter.js",
        )
        .unwrap();

    assert_eq!(runtime.invoke_by_id("counter.js", "counter.next", &[]).unwrap(), json!(42));
    assert_eq!(runtime.get_export_by_id("counter.js", "counter.n").unwrap(), json!(41));
}

#[test]
fn test_export_path_errors() {
    let mut runtime = create_runtime(RuntimeOptions::new());
    runtime
        .load("module.exports = { value: 5 };", "tool.js")
        .unwrap();
    runtime.load("module.exports = 5;", "scalar.js").unwrap();

    let err = runtime.invoke_by_id("tool.js", "value", &[]).unwrap_err();
    assert_eq!(err.to_string(), "export 'value' of script 'tool.js' is not a function");

    let err = runtime.invoke_by_id("tool.js", "value.deep.run", &[]).unwrap_err();
    assert_eq!(err.to_string(), "value is not an object");

    let err = runtime.get_export_by_id("scalar.js", "a").unwrap_err();
    assert_eq!(err.to_string(), "exports is not an object");

    let err = runtime.invoke_by_id("missing.js", "run", &[]).unwrap_err();
    assert_eq!(err.to_string(), "Script not found: missing.js");
}

#[test]
fn test_thrown_errors_are_execution_errors() {
    let mut runtime = create_runtime(RuntimeOptions::new());
    runtime
        .load("module.exports = { fail() { throw new Error('boom'); } };", "tool.js")
        .unwrap();

    match runtime.invoke_by_id("tool.js", "fail", &[]) {
        Err(RuntimeError::Execution { identifier, message }) => {
            assert_eq!(identifier, "tool.js");
            assert!(message.contains("boom"), "unexpected message: {message}");
        }
        other => panic!("expected execution error, got {other:?}"),
    }

    let err = runtime.load("throw new Error('kaboom');", "bad.js").unwrap_err();
    assert!(err.to_string().starts_with("Error in script 'bad.js'"));
    assert!(err.to_string().contains("kaboom"));
    assert!(!runtime.is_loaded("bad.js"));
}

#[test]
fn test_async_exports_settle() {
    let mut runtime = create_runtime(RuntimeOptions::new());
    runtime
        .load(
            r#"
            module.exports = {
                async answer(x) { return x * 2; },
                async refuse() { throw new Error('nope'); },
                hang() { return new Promise(() => {}); },
            };
            "#,
            "async.js",
        )
        .unwrap();

    assert_eq!(runtime.invoke_by_id("async.js", "answer", &[json!(21)]).unwrap(), json!(42));

    let err = runtime.invoke_by_id("async.js", "refuse", &[]).unwrap_err();
    assert!(err.to_string().contains("nope"));

    let err = runtime.invoke_by_id("async.js", "hang", &[]).unwrap_err();
    assert!(err.to_string().contains("did not settle"));
}

#[test]
fn test_arguments_cross_as_json() {
    let mut runtime = create_runtime(RuntimeOptions::new());
    runtime
        .load(
            "module.exports = { describe(q) { return { query: q.text, size: q.tags.length, missing: undefined }; } };",
            "search.js",
        )
        .unwrap();

    let result = runtime
        .invoke_by_id("search.js", "describe", &[json!({ "text": "rust", "tags": ["a", "b"] })])
        .unwrap();
    assert_eq!(result, json!({ "query": "rust", "size": 2, "missing": null }));
}

#[test]
fn test_standard_bindings_and_globals() {
    let options = RuntimeOptions::new()
        .with_provider(Rc::new(ConsoleProvider::new()))
        .with_provider(Rc::new(GlobalsProvider::default().with("settings", json!({ "limit": 3 }))));
    let mut runtime = create_runtime(options);

    let handle = runtime
        .load(
            r#"
            console.log('loading', __filename);
            module.exports = { limit: settings.limit, file: __filename, dir: __dirname };
            "#,
            "tools/search.js",
        )
        .unwrap();

    assert_eq!(
        handle.exports,
        json!({ "limit": 3, "file": "tools/search.js", "dir": "tools" })
    );
}

#[test]
fn test_provider_receives_each_module_identifier() {
    let resolver = Rc::new(MemoryModuleResolver::new());
    resolver.insert("lib/name.js", "module.exports = scriptName;");

    let options = RuntimeOptions::new()
        .with_resolver(resolver)
        .with_provider(Rc::new(ScriptNameProvider));
    let mut runtime = create_runtime(options);

    let handle = runtime
        .load(
            "module.exports = { mine: scriptName, dep: require('./lib/name') };",
            "main.js",
        )
        .unwrap();
    assert_eq!(handle.exports, json!({ "mine": "main.js", "dep": "lib/name.js" }));
}

#[test]
fn test_scripts_do_not_share_top_level_bindings() {
    let mut runtime = create_runtime(RuntimeOptions::new());
    runtime
        .load("const value = 'a'; module.exports = { value };", "a.js")
        .unwrap();
    let handle = runtime
        .load("const value = 'b'; module.exports = { value };", "b.js")
        .unwrap();

    assert_eq!(handle.exports, json!({ "value": "b" }));
    assert_eq!(runtime.get_export_by_id("a.js", "value").unwrap(), json!("a"));
}

#[test]
fn test_reload_replaces_script() {
    let mut runtime = create_runtime(RuntimeOptions::new());
    runtime.load("module.exports = { version: 1 };", "tool.js").unwrap();
    runtime.load("module.exports = { version: 2 };", "tool.js").unwrap();

    assert_eq!(runtime.get_export_by_id("tool.js", "").unwrap(), json!({ "version": 2 }));
}

#[test]
fn test_compiled_esm_default_function() {
    let compiler = Rc::new(Compiler::default());
    let mut runtime = BoaRuntime::new(Rc::clone(&compiler), RuntimeOptions::new()).unwrap();
    runtime.initialize().unwrap();

    let code = compiler
        .compile(
            "greet.js",
            "export default function greet(name) { return 'hi ' + name; }",
            LoaderKind::JavaScript,
            None,
        )
        .unwrap();
    let handle = runtime.load(&code, "greet.js").unwrap();

    assert_eq!(handle.exports, json!("[Function: greet]"));
    assert_eq!(runtime.invoke_by_id("greet.js", "", &[json!("bo")]).unwrap(), json!("hi bo"));
    assert_eq!(
        runtime.invoke_by_id("greet.js", "default", &[json!("al")]).unwrap(),
        json!("hi al")
    );
}
