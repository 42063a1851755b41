//! Boa-backed execution runtime.

use std::collections::HashMap;
use std::rc::Rc;

use boa_engine::{Context, JsError, JsString, JsValue, js_string};

use crate::compiler::Compiler;
use crate::engine::{ExecutionRuntime, ScriptHandle, export_path_segments};
use crate::error::{RuntimeError, RuntimeResult};
use crate::extension::{ContextProvider, validate_variable_names};
use crate::linker::{LinkerEnv, ModuleLinker};
use crate::resolver::ModuleResolver;
use crate::value::{ScriptValue, Settled, ValueBridge, describe_error, settle, to_engine};

/// Options for [`BoaRuntime`].
#[derive(Default, Clone)]
pub struct RuntimeOptions {
    /// Resolver backing `require()`; without one every `require()` fails
    pub resolver: Option<Rc<dyn ModuleResolver>>,
    /// Host variables injected into every module scope
    pub providers: Vec<Rc<dyn ContextProvider>>,
}

impl RuntimeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the module resolver
    pub fn with_resolver(mut self, resolver: Rc<dyn ModuleResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Builder: add a context provider
    pub fn with_provider(mut self, provider: Rc<dyn ContextProvider>) -> Self {
        self.providers.push(provider);
        self
    }
}

struct LoadedScript {
    /// Resolved exports (default export unwrapped)
    exports: JsValue,
    linker: Rc<ModuleLinker>,
}

/// [`ExecutionRuntime`] running every script in one Boa context.
///
/// Scripts share the realm (`globalThis`) but each module body gets its own
/// function scope. Every loaded script owns its module graph, so a module
/// required by two scripts is executed once per script.
pub struct BoaRuntime {
    context: Context,
    compiler: Rc<Compiler>,
    resolver: Option<Rc<dyn ModuleResolver>>,
    providers: Rc<[Rc<dyn ContextProvider>]>,
    injected: Rc<[String]>,
    bridge: Option<ValueBridge>,
    scripts: HashMap<String, LoadedScript>,
}

impl BoaRuntime {
    /// Create a runtime; fails if a provider declares an unusable name.
    pub fn new(compiler: Rc<Compiler>, options: RuntimeOptions) -> RuntimeResult<Self> {
        let injected: Vec<String> = options
            .providers
            .iter()
            .flat_map(|provider| provider.variable_names())
            .collect();
        validate_variable_names(&injected)?;

        Ok(Self {
            context: Context::default(),
            compiler,
            resolver: options.resolver,
            providers: options.providers.into(),
            injected: injected.into(),
            bridge: None,
            scripts: HashMap::new(),
        })
    }

    pub fn compiler(&self) -> &Rc<Compiler> {
        &self.compiler
    }

    /// Identifiers of the modules executed for a loaded script
    pub fn module_ids(&self, script_id: &str) -> Option<Vec<String>> {
        self.scripts.get(script_id).map(|script| script.linker.module_ids())
    }

    fn bridge(&mut self) -> RuntimeResult<ValueBridge> {
        if let Some(bridge) = &self.bridge {
            return Ok(bridge.clone());
        }
        let bridge = ValueBridge::install(&mut self.context)?;
        self.bridge = Some(bridge.clone());
        Ok(bridge)
    }

    fn linker_env(&self) -> LinkerEnv {
        LinkerEnv {
            compiler: Rc::clone(&self.compiler),
            resolver: self.resolver.clone(),
            providers: Rc::clone(&self.providers),
            injected: Rc::clone(&self.injected),
        }
    }

    /// `module.exports.default` when defined, otherwise `module.exports`
    fn resolve_default(&mut self, exports: JsValue) -> RuntimeResult<JsValue> {
        let Some(object) = exports.as_object() else {
            return Ok(exports);
        };
        let default = object
            .get(js_string!("default"), &mut self.context)
            .map_err(|e| RuntimeError::Conversion(describe_error(&e, &mut self.context)))?;
        Ok(if default.is_undefined() { exports } else { default })
    }

    /// Walk `export_path` and return `(parent, target)`.
    fn lookup(&mut self, script_id: &str, export_path: &str) -> RuntimeResult<(JsValue, JsValue)> {
        let exports = self
            .scripts
            .get(script_id)
            .map(|script| script.exports.clone())
            .ok_or_else(|| RuntimeError::ScriptNotFound(script_id.to_string()))?;

        let mut parent = JsValue::undefined();
        let mut current = exports;
        let mut label = "exports";
        for segment in export_path_segments(export_path) {
            let Some(object) = current.as_object() else {
                return Err(RuntimeError::NotAnObject(label.to_string()));
            };
            let next = object
                .get(JsString::from(segment), &mut self.context)
                .map_err(|e| {
                    RuntimeError::execution(script_id, describe_error(&e, &mut self.context))
                })?;
            parent = current;
            current = next;
            label = segment;
        }
        Ok((parent, current))
    }

    fn settle_result(
        &mut self,
        script_id: &str,
        export_path: &str,
        value: JsValue,
    ) -> RuntimeResult<JsValue> {
        let settled = settle(value, &mut self.context)
            .map_err(|e| RuntimeError::execution(script_id, describe_error(&e, &mut self.context)))?;
        match settled {
            Settled::Fulfilled(value) => Ok(value),
            Settled::Rejected(reason) => {
                let error = JsError::from_opaque(reason);
                Err(RuntimeError::execution(
                    script_id,
                    describe_error(&error, &mut self.context),
                ))
            }
            Settled::Pending => Err(RuntimeError::execution(
                script_id,
                format!("promise returned by export '{export_path}' did not settle"),
            )),
        }
    }
}

impl ExecutionRuntime for BoaRuntime {
    fn initialize(&mut self) -> RuntimeResult<()> {
        self.bridge()?;
        tracing::debug!(providers = self.providers.len(), "runtime initialized");
        Ok(())
    }

    fn load(&mut self, code: &str, identifier: &str) -> RuntimeResult<ScriptHandle> {
        self.unload(identifier);
        let bridge = self.bridge()?;

        let linker = ModuleLinker::new(identifier, self.linker_env());
        let loaded = linker
            .run_entry(code, &mut self.context)
            .and_then(|exports| {
                self.context.run_jobs().map_err(|e| {
                    RuntimeError::execution(identifier, describe_error(&e, &mut self.context))
                })?;
                self.resolve_default(exports)
            })
            .and_then(|exports| {
                let snapshot = bridge.to_host(&exports, &mut self.context)?;
                Ok((exports, snapshot))
            });

        let (exports, snapshot) = match loaded {
            Ok(loaded) => loaded,
            Err(error) => {
                linker.clear();
                return Err(error);
            }
        };

        tracing::debug!(identifier, modules = linker.module_ids().len(), "script executed");
        self.scripts
            .insert(identifier.to_string(), LoadedScript { exports, linker });

        Ok(ScriptHandle {
            id: identifier.to_string(),
            exports: snapshot,
        })
    }

    fn invoke_by_id(
        &mut self,
        script_id: &str,
        export_path: &str,
        args: &[ScriptValue],
    ) -> RuntimeResult<ScriptValue> {
        let (parent, target) = self.lookup(script_id, export_path)?;
        let Some(function) = target.as_callable() else {
            return Err(RuntimeError::not_a_function(script_id, export_path));
        };

        let args = to_engine(args, &mut self.context)?;
        let returned = function
            .call(&parent, &args, &mut self.context)
            .map_err(|e| RuntimeError::execution(script_id, describe_error(&e, &mut self.context)))?;
        let value = self.settle_result(script_id, export_path, returned)?;

        let bridge = self.bridge()?;
        bridge.to_host(&value, &mut self.context)
    }

    fn get_export_by_id(&mut self, script_id: &str, export_path: &str) -> RuntimeResult<ScriptValue> {
        let (_, value) = self.lookup(script_id, export_path)?;
        let bridge = self.bridge()?;
        bridge.to_host(&value, &mut self.context)
    }

    fn unload(&mut self, script_id: &str) -> bool {
        match self.scripts.remove(script_id) {
            Some(script) => {
                script.linker.clear();
                tracing::debug!(identifier = script_id, "script unloaded");
                true
            }
            None => false,
        }
    }

    fn dispose(&mut self) {
        for (_, script) in self.scripts.drain() {
            script.linker.clear();
        }
        tracing::debug!("runtime disposed");
    }

    fn is_loaded(&self, script_id: &str) -> bool {
        self.scripts.contains_key(script_id)
    }
}
