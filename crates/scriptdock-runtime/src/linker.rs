//! Module graph for one loaded script.
//!
//! Every entry script gets its own linker. Modules required while the entry
//! runs are recorded under their resolved identifier before their body
//! executes, so a `require()` that re-enters a module still in progress
//! receives that module's current `module.exports` instead of recursing.
//!
//! If a module handed out its placeholder exports object while in progress and
//! later replaced `module.exports` with another object, the final object's
//! properties are copied onto the placeholder so earlier holders observe the
//! final state.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use boa_engine::{
    Context, JsError, JsNativeError, JsObject, JsResult, JsString, JsValue, NativeFunction,
    Source, js_string,
};
use boa_gc::{Finalize, Trace};

use crate::commonjs::{dirname, wrap_module};
use crate::compiler::Compiler;
use crate::error::RuntimeError;
use crate::extension::ContextProvider;
use crate::resolver::ModuleResolver;
use crate::value::describe_error;

struct ModuleRecord {
    module: JsObject,
    /// Exports object created before the body ran
    placeholder: JsObject,
    loading: bool,
    /// Set when a re-entrant require handed out the in-progress exports
    shared: bool,
}

/// Environment shared by every module of one graph
pub(crate) struct LinkerEnv {
    pub(crate) compiler: Rc<Compiler>,
    pub(crate) resolver: Option<Rc<dyn ModuleResolver>>,
    pub(crate) providers: Rc<[Rc<dyn ContextProvider>]>,
    pub(crate) injected: Rc<[String]>,
}

pub(crate) struct ModuleLinker {
    entry: String,
    env: LinkerEnv,
    records: RefCell<HashMap<String, ModuleRecord>>,
    /// Last structured failure raised inside `require()`
    pending_failure: RefCell<Option<RuntimeError>>,
}

#[derive(Trace, Finalize)]
struct RequireCaptures {
    #[unsafe_ignore_trace]
    linker: Rc<ModuleLinker>,
    from: String,
}

fn require_fn(
    _this: &JsValue,
    args: &[JsValue],
    captures: &RequireCaptures,
    context: &mut Context,
) -> JsResult<JsValue> {
    let specifier = args
        .first()
        .and_then(JsValue::as_string)
        .ok_or_else(|| JsNativeError::typ().with_message("require() expects a string specifier"))?;
    captures
        .linker
        .require(&specifier.to_std_string_escaped(), &captures.from, context)
}

impl ModuleLinker {
    pub(crate) fn new(entry: impl Into<String>, env: LinkerEnv) -> Rc<Self> {
        Rc::new(Self {
            entry: entry.into(),
            env,
            records: RefCell::new(HashMap::new()),
            pending_failure: RefCell::new(None),
        })
    }

    /// Execute the entry module and return its `module.exports`.
    pub(crate) fn run_entry(
        self: &Rc<Self>,
        code: &str,
        context: &mut Context,
    ) -> Result<JsValue, RuntimeError> {
        self.pending_failure.borrow_mut().take();
        let entry = self.entry.clone();
        self.execute(&entry, code, context)
            .and_then(|module| module.get(js_string!("exports"), context))
            .map_err(|e| self.runtime_error(&e, context))
    }

    /// Identifiers currently in the graph (entry included)
    pub(crate) fn module_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.records.borrow().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Release every module of the graph
    pub(crate) fn clear(&self) {
        self.records.borrow_mut().clear();
        self.pending_failure.borrow_mut().take();
    }

    fn runtime_error(&self, error: &JsError, context: &mut Context) -> RuntimeError {
        let message = describe_error(error, context);
        if let Some(failure) = self.pending_failure.borrow_mut().take()
            && message.contains(&failure.to_string())
        {
            return failure;
        }
        RuntimeError::execution(&self.entry, message)
    }

    /// Record a structured failure and turn it into a JS exception
    fn fail(&self, error: RuntimeError) -> JsError {
        let message = error.to_string();
        *self.pending_failure.borrow_mut() = Some(error);
        JsNativeError::error().with_message(message).into()
    }

    fn require(
        self: &Rc<Self>,
        specifier: &str,
        from: &str,
        context: &mut Context,
    ) -> JsResult<JsValue> {
        let Some(resolver) = self.env.resolver.clone() else {
            return Err(self.fail(RuntimeError::resolution(specifier, from)));
        };
        let Some(resolved) = resolver.resolve(specifier, from) else {
            return Err(self.fail(RuntimeError::resolution(specifier, from)));
        };

        let existing = self.records.borrow_mut().get_mut(&resolved).map(|record| {
            if record.loading {
                record.shared = true;
            }
            record.module.clone()
        });
        if let Some(module) = existing {
            tracing::trace!(specifier, from, resolved = %resolved, "require from module graph");
            return module.get(js_string!("exports"), context);
        }

        tracing::debug!(specifier, from, resolved = %resolved, "require");
        let source = resolver.load(&resolved).map_err(|e| self.fail(e))?;
        let code = if source.compiled {
            source.code
        } else {
            self.env
                .compiler
                .compile(&resolved, &source.code, source.kind, source.mtime)
                .map_err(|e| self.fail(e.into()))?
        };

        let module = self.execute(&resolved, &code, context)?;
        module.get(js_string!("exports"), context)
    }

    fn execute(
        self: &Rc<Self>,
        identifier: &str,
        code: &str,
        context: &mut Context,
    ) -> JsResult<JsObject> {
        let exports = JsObject::with_object_proto(context.intrinsics());
        let module = JsObject::with_object_proto(context.intrinsics());
        module.set(js_string!("exports"), exports.clone(), false, context)?;
        module.set(js_string!("id"), JsString::from(identifier), false, context)?;
        module.set(js_string!("loaded"), false, false, context)?;

        self.records.borrow_mut().insert(
            identifier.to_string(),
            ModuleRecord {
                module: module.clone(),
                placeholder: exports.clone(),
                loading: true,
                shared: false,
            },
        );

        let outcome = self
            .run_body(identifier, code, &module, &exports, context)
            .and_then(|()| self.finish(identifier, &module, context));

        match outcome {
            Ok(()) => Ok(module),
            Err(error) => {
                self.records.borrow_mut().remove(identifier);
                Err(error)
            }
        }
    }

    fn run_body(
        self: &Rc<Self>,
        identifier: &str,
        code: &str,
        module: &JsObject,
        exports: &JsObject,
        context: &mut Context,
    ) -> JsResult<()> {
        let wrapped = wrap_module(code, &self.env.injected);
        let function = context.eval(Source::from_bytes(&wrapped).with_path(Path::new(identifier)))?;
        let function = function
            .as_callable()
            .ok_or_else(|| JsNativeError::typ().with_message("module wrapper is not callable"))?;

        let require = NativeFunction::from_copy_closure_with_captures(
            require_fn,
            RequireCaptures {
                linker: Rc::clone(self),
                from: identifier.to_string(),
            },
        )
        .to_js_function(context.realm());

        let mut args: Vec<JsValue> = vec![
            module.clone().into(),
            exports.clone().into(),
            require.into(),
            JsString::from(identifier).into(),
            JsString::from(dirname(identifier)).into(),
        ];
        for provider in self.env.providers.iter() {
            let expected = provider.variable_names().len();
            let values = provider.provide(identifier, context)?;
            if values.len() != expected {
                return Err(JsNativeError::error()
                    .with_message(format!(
                        "context provider returned {} values for {expected} names",
                        values.len()
                    ))
                    .into());
            }
            args.extend(values);
        }

        function.call(&exports.clone().into(), &args, context)?;
        Ok(())
    }

    fn finish(&self, identifier: &str, module: &JsObject, context: &mut Context) -> JsResult<()> {
        let (placeholder, shared) = {
            let mut records = self.records.borrow_mut();
            match records.get_mut(identifier) {
                Some(record) => {
                    record.loading = false;
                    (record.placeholder.clone(), record.shared)
                }
                None => return Ok(()),
            }
        };

        module.set(js_string!("loaded"), true, false, context)?;
        let final_exports = module.get(js_string!("exports"), context)?;
        if shared
            && let Some(object) = final_exports.as_object()
            && !JsObject::equals(&object, &placeholder)
        {
            let assign = context
                .intrinsics()
                .constructors()
                .object()
                .constructor()
                .get(js_string!("assign"), context)?;
            if let Some(assign) = assign.as_callable() {
                assign.call(
                    &JsValue::undefined(),
                    &[placeholder.into(), final_exports],
                    context,
                )?;
            }
        }
        Ok(())
    }
}

impl Drop for ModuleLinker {
    fn drop(&mut self) {
        tracing::trace!(entry = %self.entry, "module graph released");
    }
}
