//! `console` for scripts, routed to `tracing`.
//!
//! Each module receives its own console whose records carry the module
//! identifier as the `script` field.

use boa_engine::{
    Context, JsObject, JsResult, JsString, JsValue, NativeFunction, object::builtins::JsFunction,
};
use boa_gc::{Finalize, Trace};

use crate::extension::ContextProvider;

const TARGET: &str = "scriptdock::console";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConsoleLevel {
    Log,
    Info,
    Warn,
    Error,
    Debug,
}

impl ConsoleLevel {
    const ALL: [(&'static str, ConsoleLevel); 5] = [
        ("log", ConsoleLevel::Log),
        ("info", ConsoleLevel::Info),
        ("warn", ConsoleLevel::Warn),
        ("error", ConsoleLevel::Error),
        ("debug", ConsoleLevel::Debug),
    ];
}

#[derive(Trace, Finalize)]
struct ConsoleCaptures {
    identifier: String,
    #[unsafe_ignore_trace]
    level: ConsoleLevel,
}

fn format_arg(value: &JsValue, context: &mut Context) -> String {
    if let Some(text) = value.as_string() {
        return text.to_std_string_escaped();
    }
    if value.is_callable() || value.is_undefined() {
        return value.display().to_string();
    }
    match value.to_json(context) {
        Ok(Some(json)) => json.to_string(),
        _ => value.display().to_string(),
    }
}

fn console_method(
    _this: &JsValue,
    args: &[JsValue],
    captures: &ConsoleCaptures,
    context: &mut Context,
) -> JsResult<JsValue> {
    let message = args
        .iter()
        .map(|arg| format_arg(arg, context))
        .collect::<Vec<_>>()
        .join(" ");
    let script = captures.identifier.as_str();

    match captures.level {
        ConsoleLevel::Log | ConsoleLevel::Info => {
            tracing::info!(target: TARGET, script, "{message}")
        }
        ConsoleLevel::Warn => tracing::warn!(target: TARGET, script, "{message}"),
        ConsoleLevel::Error => tracing::error!(target: TARGET, script, "{message}"),
        ConsoleLevel::Debug => tracing::debug!(target: TARGET, script, "{message}"),
    }

    Ok(JsValue::undefined())
}

/// Injects a per-script `console` object.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleProvider;

impl ConsoleProvider {
    pub fn new() -> Self {
        Self
    }

    fn build(&self, identifier: &str, context: &mut Context) -> JsResult<JsObject> {
        let console = JsObject::with_object_proto(context.intrinsics());
        for (name, level) in ConsoleLevel::ALL {
            let function: JsFunction = NativeFunction::from_copy_closure_with_captures(
                console_method,
                ConsoleCaptures {
                    identifier: identifier.to_string(),
                    level,
                },
            )
            .to_js_function(context.realm());
            console.set(JsString::from(name), function, false, context)?;
        }
        Ok(console)
    }
}

impl ContextProvider for ConsoleProvider {
    fn variable_names(&self) -> Vec<String> {
        vec!["console".to_string()]
    }

    fn provide(&self, identifier: &str, context: &mut Context) -> JsResult<Vec<JsValue>> {
        Ok(vec![self.build(identifier, context)?.into()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boa_engine::{Source, js_string};

    #[test]
    fn test_console_methods_present() {
        let mut context = Context::default();
        let values = ConsoleProvider::new().provide("tool.js", &mut context).unwrap();
        let console = values[0].as_object().unwrap();

        for (name, _) in ConsoleLevel::ALL {
            let method = console.get(JsString::from(name), &mut context).unwrap();
            assert!(method.is_callable(), "console.{name} missing");
        }
    }

    #[test]
    fn test_format_arg() {
        let mut context = Context::default();
        let value = context
            .eval(Source::from_bytes("({ a: 1, b: 'two' })"))
            .unwrap();
        assert_eq!(format_arg(&value, &mut context), r#"{"a":1,"b":"two"}"#);
        assert_eq!(
            format_arg(&JsValue::from(js_string!("plain")), &mut context),
            "plain"
        );
    }
}
