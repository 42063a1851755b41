//! scriptdock-runtime - compiler and execution runtime for scriptdock.
//!
//! This crate turns TypeScript/JavaScript sources into CommonJS code and
//! executes them on the Boa engine with a per-script module graph.
//!
//! # Features
//!
//! - **TypeScript**: types are stripped with swc, no type checking
//! - **ES modules**: `import`/`export` are rewritten to `require`/`exports`
//! - **Compile cache**: keyed by identifier and modification time
//! - **CommonJS**: `require()` with relative resolution and circular modules
//! - **Context injection**: host variables bound in every module scope
//!
//! # Example
//!
//! ```no_run
//! use std::rc::Rc;
//! use scriptdock_runtime::prelude::*;
//!
//! let compiler = Rc::new(Compiler::default());
//! let mut runtime = BoaRuntime::new(Rc::clone(&compiler), RuntimeOptions::new()).unwrap();
//! runtime.initialize().unwrap();
//!
//! let code = compiler
//!     .compile("math.ts", "export const add = (a: number, b: number) => a + b;", LoaderKind::TypeScript, None)
//!     .unwrap();
//! runtime.load(&code, "math.ts").unwrap();
//!
//! let sum = runtime
//!     .invoke_by_id("math.ts", "add", &[serde_json::json!(2), serde_json::json!(3)])
//!     .unwrap();
//! assert_eq!(sum, serde_json::json!(5));
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                      Compiler                        │
//! │  parse (swc) → strip types → ESM to CommonJS → emit  │
//! │  cache: identifier → (mtime, code)                   │
//! └──────────────────────────────────────────────────────┘
//!                           ↓
//! ┌──────────────────────────────────────────────────────┐
//! │                     BoaRuntime                       │
//! │  one Context, scripts keyed by identifier            │
//! │  ┌────────────────────────────────────────────────┐  │
//! │  │ ModuleLinker (per script)                      │  │
//! │  │  - module graph keyed by resolved identifier   │  │
//! │  │  - require() → ModuleResolver → Compiler       │  │
//! │  └────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────┘
//!                           ↓
//! ┌──────────────────────────────────────────────────────┐
//! │                     ScriptValue                      │
//! │  JSON snapshot of exports and invocation results     │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod apis;
pub mod commonjs;
pub mod compiler;
pub mod config;
pub mod engine;
pub mod error;
pub mod extension;
mod linker;
mod modules_ast;
pub mod resolver;
pub mod runtime;
pub mod transpiler;
pub mod value;

pub use apis::ConsoleProvider;
pub use compiler::Compiler;
pub use config::{CompilerConfig, LoaderKind};
pub use engine::{ExecutionRuntime, ScriptHandle, export_path_segments};
pub use error::{CompileError, RuntimeError, RuntimeResult};
pub use extension::{ContextProvider, GlobalsProvider, validate_variable_names};
pub use resolver::{
    DEFAULT_EXTENSIONS, FsModuleResolver, MemoryModuleResolver, ModuleResolver, ModuleSource,
};
pub use runtime::{BoaRuntime, RuntimeOptions};
pub use transpiler::transpile;
pub use value::ScriptValue;

/// Commonly used types
pub mod prelude {
    pub use crate::{
        BoaRuntime, Compiler, CompilerConfig, ConsoleProvider, ContextProvider, ExecutionRuntime,
        GlobalsProvider, LoaderKind, ModuleResolver, RuntimeError, RuntimeOptions, RuntimeResult,
        ScriptHandle, ScriptValue,
    };
}
