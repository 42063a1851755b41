//! Integration tests for require() resolution and the module graph

use std::cell::RefCell;
use std::rc::Rc;

use scriptdock_runtime::prelude::*;
use scriptdock_runtime::{MemoryModuleResolver, ModuleSource};
use serde_json::json;

fn runtime_with(resolver: Rc<dyn ModuleResolver>) -> BoaRuntime {
    let options = RuntimeOptions::new().with_resolver(resolver);
    let mut runtime = BoaRuntime::new(Rc::new(Compiler::default()), options).unwrap();
    runtime.initialize().unwrap();
    runtime
}

/// Records every `(specifier, from)` pair it is asked to resolve
struct RecordingResolver {
    inner: MemoryModuleResolver,
    calls: RefCell<Vec<(String, String)>>,
}

impl ModuleResolver for RecordingResolver {
    fn resolve(&self, specifier: &str, from: &str) -> Option<String> {
        self.calls
            .borrow_mut()
            .push((specifier.to_string(), from.to_string()));
        self.inner.resolve(specifier, from)
    }

    fn load(&self, identifier: &str) -> RuntimeResult<ModuleSource> {
        self.inner.load(identifier)
    }
}

#[test]
fn test_circular_require_sees_partial_exports() {
    let resolver = Rc::new(MemoryModuleResolver::new());
    let a = r#"
        exports.aName = 'a';
        const b = require('./b');
        exports.fromB = b.bName;
        exports.bSawA = b.sawA;
    "#;
    resolver.insert("a.js", a);
    resolver.insert(
        "b.js",
        r#"
        const a = require('./a');
        exports.bName = 'b';
        exports.sawA = a.aName;
        "#,
    );

    let mut runtime = runtime_with(resolver);
    let handle = runtime.load(a, "a.js").unwrap();
    assert_eq!(
        handle.exports,
        json!({ "aName": "a", "fromB": "b", "bSawA": "a" })
    );
}

#[test]
fn test_reassigned_exports_reach_early_holders() {
    let resolver = Rc::new(MemoryModuleResolver::new());
    resolver.insert(
        "c.js",
        r#"
        const d = require('./d');
        module.exports = { value: 7, peekFromD: () => d.peek() };
        "#,
    );
    resolver.insert(
        "d.js",
        r#"
        const c = require('./c');
        module.exports = { peek() { return c.value; } };
        "#,
    );

    let mut runtime = runtime_with(resolver);
    let handle = runtime
        .load(
            "const c = require('./c'); module.exports = { seen: c.peekFromD() };",
            "main.js",
        )
        .unwrap();
    assert_eq!(handle.exports, json!({ "seen": 7 }));
}

#[test]
fn test_requires_resolve_from_requiring_module() {
    let inner = MemoryModuleResolver::new();
    inner.insert("lib/a.js", "module.exports = 'a' + require('./b');");
    inner.insert("lib/b.js", "module.exports = 'b' + require('../shared/c');");
    inner.insert("shared/c.js", "module.exports = 'c';");
    let resolver = Rc::new(RecordingResolver {
        inner,
        calls: RefCell::new(Vec::new()),
    });

    let mut runtime = runtime_with(resolver.clone());
    let handle = runtime
        .load("module.exports = require('./lib/a');", "main.js")
        .unwrap();
    assert_eq!(handle.exports, json!("abc"));

    let calls = resolver.calls.borrow();
    assert_eq!(
        *calls,
        vec![
            ("./lib/a".to_string(), "main.js".to_string()),
            ("./b".to_string(), "lib/a.js".to_string()),
            ("../shared/c".to_string(), "lib/b.js".to_string()),
        ]
    );
    assert_eq!(
        runtime.module_ids("main.js").unwrap(),
        vec!["lib/a.js", "lib/b.js", "main.js", "shared/c.js"]
    );
}

#[test]
fn test_unresolvable_require_is_structured() {
    let resolver = Rc::new(MemoryModuleResolver::new());
    resolver.insert("lib/a.js", "module.exports = require('./nope');");
    let mut runtime = runtime_with(resolver);

    match runtime.load("require('./missing');", "main.js") {
        Err(RuntimeError::Resolution { specifier, from }) => {
            assert_eq!(specifier, "./missing");
            assert_eq!(from, "main.js");
        }
        other => panic!("expected resolution error, got {other:?}"),
    }

    let err = runtime
        .load("module.exports = require('./lib/a');", "main.js")
        .unwrap_err();
    assert_eq!(err.to_string(), "Cannot find module './nope' from 'lib/a.js'");
}

#[test]
fn test_require_failure_can_be_caught() {
    let mut runtime = runtime_with(Rc::new(MemoryModuleResolver::new()));
    let handle = runtime
        .load(
            r#"
            let message;
            try { require('./missing'); } catch (e) { message = e.message; }
            module.exports = { message };
            "#,
            "main.js",
        )
        .unwrap();
    assert_eq!(
        handle.exports,
        json!({ "message": "Cannot find module './missing' from 'main.js'" })
    );
}

#[test]
fn test_dependency_compile_error_is_structured() {
    let resolver = Rc::new(MemoryModuleResolver::new());
    resolver.insert("broken.ts", "const x: = ;");
    let mut runtime = runtime_with(resolver);

    match runtime.load("require('./broken');", "main.js") {
        Err(RuntimeError::Compile(error)) => assert_eq!(error.identifier, "broken.ts"),
        other => panic!("expected compile error, got {other:?}"),
    }
}

#[test]
fn test_failed_module_is_removed_from_graph() {
    let resolver = Rc::new(MemoryModuleResolver::new());
    resolver.insert(
        "flaky.js",
        r#"
        globalThis.flakyLoads = (globalThis.flakyLoads || 0) + 1;
        if (globalThis.flakyLoads === 1) throw new Error('first load fails');
        module.exports = 'ok';
        "#,
    );
    let mut runtime = runtime_with(resolver);

    let handle = runtime
        .load(
            r#"
            let first;
            try { require('./flaky'); } catch (e) { first = e.message; }
            module.exports = { first, second: require('./flaky') };
            "#,
            "main.js",
        )
        .unwrap();
    assert_eq!(
        handle.exports,
        json!({ "first": "first load fails", "second": "ok" })
    );
}

#[test]
fn test_shared_module_runs_once_per_script() {
    let resolver = Rc::new(MemoryModuleResolver::new());
    resolver.insert(
        "shared.js",
        "globalThis.sharedRuns = (globalThis.sharedRuns || 0) + 1; module.exports = { token: {} };",
    );
    resolver.insert("a.js", "module.exports = require('./shared');");
    resolver.insert("b.js", "module.exports = require('./shared');");
    let mut runtime = runtime_with(resolver);

    let handle = runtime
        .load(
            r#"
            const a = require('./a');
            const b = require('./b');
            module.exports = { same: a === b && a.token === b.token, runs: globalThis.sharedRuns };
            "#,
            "main.js",
        )
        .unwrap();
    assert_eq!(handle.exports, json!({ "same": true, "runs": 1 }));

    let handle = runtime
        .load(
            "require('./shared'); module.exports = globalThis.sharedRuns;",
            "other.js",
        )
        .unwrap();
    assert_eq!(handle.exports, json!(2));
}

#[test]
fn test_esm_imports_between_typescript_modules() {
    let resolver = Rc::new(MemoryModuleResolver::new());
    resolver.insert(
        "lib/util.ts",
        r#"
        export const double = (n: number): number => n * 2;
        export default 'util';
        "#,
    );

    let compiler = Rc::new(Compiler::default());
    let options = RuntimeOptions::new().with_resolver(resolver);
    let mut runtime = BoaRuntime::new(Rc::clone(&compiler), options).unwrap();
    runtime.initialize().unwrap();

    let code = compiler
        .compile(
            "main.ts",
            r#"
            import label, { double } from './lib/util';
            export const result: number = double(21);
            export const name: string = label;
            "#,
            LoaderKind::TypeScript,
            None,
        )
        .unwrap();
    let handle = runtime.load(&code, "main.ts").unwrap();
    assert_eq!(handle.exports, json!({ "result": 42, "name": "util" }));
}

#[test]
fn test_dynamic_import_resolves_lazily() {
    let resolver = Rc::new(MemoryModuleResolver::new());
    resolver.insert("lazy.js", "module.exports = { double: (n) => n * 2 };");

    let compiler = Rc::new(Compiler::default());
    let options = RuntimeOptions::new().with_resolver(resolver);
    let mut runtime = BoaRuntime::new(Rc::clone(&compiler), options).unwrap();
    runtime.initialize().unwrap();

    let code = compiler
        .compile(
            "main.js",
            "module.exports = { run() { return import('./lazy').then((m) => m.double(4)); } };",
            LoaderKind::JavaScript,
            None,
        )
        .unwrap();
    runtime.load(&code, "main.js").unwrap();

    assert_eq!(runtime.invoke_by_id("main.js", "run", &[]).unwrap(), json!(8));
}

#[test]
fn test_require_without_resolver_fails() {
    let mut runtime = BoaRuntime::new(Rc::new(Compiler::default()), RuntimeOptions::new()).unwrap();
    runtime.initialize().unwrap();

    let err = runtime.load("require('./x');", "main.js").unwrap_err();
    assert!(matches!(err, RuntimeError::Resolution { .. }));
}

#[test]
fn test_precompiled_module_skips_compiler() {
    let resolver = Rc::new(MemoryModuleResolver::new());
    resolver.insert_source("lib.js", ModuleSource::compiled("module.exports = 1;"));
    let compiler = Rc::new(Compiler::default());
    let options = RuntimeOptions::new().with_resolver(resolver);
    let mut runtime = BoaRuntime::new(Rc::clone(&compiler), options).unwrap();
    runtime.initialize().unwrap();

    let handle = runtime
        .load("module.exports = { value: require('./lib') };", "main.js")
        .unwrap();
    assert_eq!(handle.exports, json!({ "value": 1 }));
    assert!(!compiler.is_cached("lib.js"));
}

#[test]
fn test_removed_module_no_longer_resolves() {
    let resolver = Rc::new(MemoryModuleResolver::new());
    resolver.insert("lib.js", "module.exports = 'v1';");
    let mut runtime = runtime_with(resolver.clone());

    let handle = runtime.load("module.exports = require('./lib');", "main.js").unwrap();
    assert_eq!(handle.exports, json!("v1"));

    assert!(resolver.remove("lib.js"));
    assert!(!resolver.remove("lib.js"));

    let err = runtime
        .load("module.exports = require('./lib');", "main.js")
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Resolution { .. }));
    assert!(!runtime.is_loaded("main.js"));
}
