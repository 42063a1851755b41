//! CommonJS module wrapper.
//!
//! Every module body runs inside its own function so top-level bindings stay
//! local to the module:
//!
//! ```javascript
//! (function (module, exports, require, __filename, __dirname, console) {
//!     module.exports = { run: () => 42 };
//! })
//! ```
//!
//! Host-injected names follow the standard bindings as extra parameters.

/// Parameters every module receives, in call order
pub const STANDARD_BINDINGS: [&str; 5] = ["module", "exports", "require", "__filename", "__dirname"];

/// Wrap compiled module code into a function expression.
pub fn wrap_module(code: &str, injected: &[String]) -> String {
    let mut params = STANDARD_BINDINGS.join(", ");
    for name in injected {
        params.push_str(", ");
        params.push_str(name);
    }
    // Newline before the closing brace so a trailing line comment cannot swallow it
    format!("(function ({params}) {{\n{code}\n}})")
}

/// Parent segment of an identifier (`""` for identifiers at the root)
pub fn dirname(identifier: &str) -> &str {
    match identifier.rfind('/') {
        Some(idx) => &identifier[..idx],
        None => "",
    }
}
