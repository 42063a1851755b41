//! Value conversion between the host and the engine.
//!
//! Engine values leave the runtime as JSON ([`ScriptValue`]). Functions are
//! rendered as `"[Function: name]"`, `undefined` as `null`, bigints as decimal
//! strings, and an object reached a second time (cycles included) as
//! `"[Circular]"`.

use boa_engine::builtins::promise::PromiseState;
use boa_engine::{Context, JsError, JsObject, JsValue, Source};

use crate::error::{RuntimeError, RuntimeResult};

/// Value crossing the host/engine boundary
pub type ScriptValue = serde_json::Value;

const TO_HOST_SOURCE: &str = r#"(function () {
    return function toHost(value) {
        const seen = new Set();
        const text = JSON.stringify(value, function (key, v) {
            if (v === undefined) return null;
            if (typeof v === "function") return "[Function: " + (v.name || "anonymous") + "]";
            if (typeof v === "bigint") return v.toString();
            if (typeof v === "symbol") return v.toString();
            if (v !== null && typeof v === "object") {
                if (seen.has(v)) return "[Circular]";
                seen.add(v);
            }
            return v;
        });
        return text === undefined ? "null" : text;
    };
})()"#;

/// Helpers evaluated once per engine context
#[derive(Debug, Clone)]
pub(crate) struct ValueBridge {
    to_host: JsObject,
}

impl ValueBridge {
    pub(crate) fn install(context: &mut Context) -> RuntimeResult<Self> {
        let value = context
            .eval(Source::from_bytes(TO_HOST_SOURCE))
            .map_err(|e| RuntimeError::internal(describe_error(&e, context)))?;
        let to_host = value
            .as_callable()
            .ok_or_else(|| RuntimeError::internal("value bridge did not evaluate to a function"))?;
        Ok(Self { to_host })
    }

    /// Snapshot an engine value as JSON
    pub(crate) fn to_host(&self, value: &JsValue, context: &mut Context) -> RuntimeResult<ScriptValue> {
        let text = self
            .to_host
            .call(&JsValue::undefined(), std::slice::from_ref(value), context)
            .map_err(|e| RuntimeError::Conversion(describe_error(&e, context)))?;
        let Some(text) = text.as_string() else {
            return Ok(ScriptValue::Null);
        };
        Ok(serde_json::from_str(&text.to_std_string_escaped())?)
    }
}

/// Convert host arguments into engine values
pub(crate) fn to_engine(values: &[ScriptValue], context: &mut Context) -> RuntimeResult<Vec<JsValue>> {
    values
        .iter()
        .map(|v| JsValue::from_json(v, context))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| RuntimeError::Conversion(describe_error(&e, context)))
}

/// Human readable message for a thrown engine error
pub(crate) fn describe_error(error: &JsError, context: &mut Context) -> String {
    match error.try_native(context) {
        Ok(native) => native.to_string(),
        Err(_) => error.to_string(),
    }
}

/// Outcome of draining the job queue for a returned promise
pub(crate) enum Settled {
    Fulfilled(JsValue),
    Rejected(JsValue),
    Pending,
}

/// Run queued jobs and report the state of `value` if it is a promise.
///
/// Non-promise values are returned as fulfilled.
pub(crate) fn settle(value: JsValue, context: &mut Context) -> Result<Settled, JsError> {
    context.run_jobs()?;
    let Some(promise) = value.as_promise() else {
        return Ok(Settled::Fulfilled(value));
    };
    Ok(match promise.state() {
        PromiseState::Fulfilled(v) => Settled::Fulfilled(v),
        PromiseState::Rejected(reason) => Settled::Rejected(reason),
        PromiseState::Pending => Settled::Pending,
    })
}
