//! TypeScript/JavaScript to CommonJS transpiler.
//!
//! Sources are parsed with SWC, TypeScript annotations are stripped, ES module
//! declarations are lowered to `require()`/`exports` and the result is printed
//! back as JavaScript ready for the CommonJS wrapper.

use swc_common::{BytePos, FileName, GLOBALS, Globals, Mark, SourceMap, Spanned, sync::Lrc};
use swc_ecma_ast::Program;
use swc_ecma_codegen::{Config as CodegenConfig, Emitter, text_writer::JsWriter};
use swc_ecma_parser::{EsSyntax, Parser, StringInput, Syntax, TsSyntax, lexer::Lexer};
use swc_ecma_transforms_base::{fixer::fixer, resolver};
use swc_ecma_transforms_typescript::strip;
use swc_ecma_visit::VisitMutWith;

use crate::config::{CompilerConfig, LoaderKind};
use crate::error::CompileError;
use crate::modules_ast::EsmToCommonJs;

/// Transpile a script source into CommonJS JavaScript.
pub fn transpile(
    identifier: &str,
    source: &str,
    kind: LoaderKind,
    config: &CompilerConfig,
) -> Result<String, CompileError> {
    let cm: Lrc<SourceMap> = Default::default();

    let fm = cm.new_source_file(
        Lrc::new(FileName::Custom(identifier.to_string())),
        source.to_string(),
    );

    let syntax = match kind {
        LoaderKind::TypeScript => Syntax::Typescript(TsSyntax {
            tsx: false,
            decorators: config.decorators,
            dts: false,
            no_early_errors: false,
            disallow_ambiguous_jsx_like: false,
        }),
        LoaderKind::JavaScript => Syntax::Es(EsSyntax {
            jsx: false,
            decorators: config.decorators,
            ..Default::default()
        }),
    };

    let lexer = Lexer::new(syntax, config.target, StringInput::from(&*fm), None);
    let mut parser = Parser::new_from(lexer);

    let program = parser
        .parse_program()
        .map_err(|e| error_at(&cm, identifier, e.span().lo, &e.kind().msg()))?;

    // Recoverable errors still mean the source is malformed
    if let Some(e) = parser.take_errors().into_iter().next() {
        return Err(error_at(&cm, identifier, e.span().lo, &e.kind().msg()));
    }

    let mut program = program;
    let mut lowering = EsmToCommonJs::new(cm.clone());

    GLOBALS.set(&Globals::default(), || {
        if kind.is_typescript() {
            let unresolved_mark = Mark::new();
            let top_level_mark = Mark::new();

            program.visit_mut_with(&mut resolver(unresolved_mark, top_level_mark, true));
            program.mutate(&mut strip(unresolved_mark, top_level_mark));
        }
        program.visit_mut_with(&mut lowering);
        program.visit_mut_with(&mut fixer(None));
    });

    lowering.finish().map_err(|message| CompileError {
        identifier: identifier.to_string(),
        line: 1,
        column: 1,
        message,
    })?;

    emit(&cm, identifier, &program, config)
}

fn emit(
    cm: &Lrc<SourceMap>,
    identifier: &str,
    program: &Program,
    config: &CompilerConfig,
) -> Result<String, CompileError> {
    let mut buf = vec![];
    {
        let writer = JsWriter::new(cm.clone(), "\n", &mut buf, None);

        let codegen_config = CodegenConfig::default()
            .with_target(config.target)
            .with_ascii_only(false)
            .with_minify(false)
            .with_omit_last_semi(false);

        let mut emitter = Emitter {
            cfg: codegen_config,
            cm: cm.clone(),
            comments: None,
            wr: writer,
        };

        emitter
            .emit_program(program)
            .map_err(|e| codegen_error(identifier, format!("Failed to emit code: {e}")))?;
    }

    String::from_utf8(buf)
        .map_err(|e| codegen_error(identifier, format!("Invalid UTF-8 output: {e}")))
}

fn error_at(cm: &SourceMap, identifier: &str, pos: BytePos, message: &str) -> CompileError {
    let loc = cm.lookup_char_pos(pos);
    CompileError {
        identifier: identifier.to_string(),
        line: loc.line,
        column: loc.col_display + 1,
        message: message.to_string(),
    }
}

fn codegen_error(identifier: &str, message: String) -> CompileError {
    CompileError {
        identifier: identifier.to_string(),
        line: 0,
        column: 0,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(source: &str) -> String {
        transpile("script.ts", source, LoaderKind::TypeScript, &CompilerConfig::default())
            .expect("transpile failed")
    }

    #[test]
    fn test_transpile_simple_typescript() {
        let code = ts(r#"
            const name: string = "test";
            const count: number = 42;
            module.exports = { name, count };
        "#);

        assert!(!code.contains(": string"));
        assert!(!code.contains(": number"));
        assert!(code.contains("const name"));
        assert!(code.contains("module.exports"));
    }

    #[test]
    fn test_transpile_interface_and_type() {
        let code = ts(r#"
            interface Tool {
                id: string;
                run(): number;
            }

            type Status = "active" | "inactive";

            export const tool: Tool = { id: "a", run: () => 1 };
            export const status: Status = "active";
        "#);

        assert!(!code.contains("interface Tool"));
        assert!(!code.contains("type Status"));
        assert!(code.contains("exports.tool = tool"));
        assert!(code.contains("exports.status = status"));
    }

    #[test]
    fn test_transpile_generics() {
        let code = ts(r#"
            function identity<T>(value: T): T {
                return value;
            }

            const result = identity<string>("hello");
        "#);

        assert!(!code.contains("<T>"));
        assert!(!code.contains("<string>"));
        assert!(code.contains("function identity"));
    }

    #[test]
    fn test_type_only_import_elided() {
        let code = ts(r#"
            import type { Options } from "./types";
            import { helper } from "./helper";
            export function run(options: Options) { return helper(options); }
        "#);

        assert!(!code.contains("./types"));
        assert!(code.contains("require(\"./helper\")"));
    }

    #[test]
    fn test_enum_lowered() {
        let code = ts("export enum Level { Low, High }");
        assert!(!code.contains("enum Level"));
        assert!(code.contains("exports.Level = Level"));
    }

    #[test]
    fn test_javascript_preserved() {
        let code = transpile(
            "tool.js",
            "const name = \"test\";\nmodule.exports = { run: () => 42 };",
            LoaderKind::JavaScript,
            &CompilerConfig::default(),
        )
        .expect("transpile failed");

        assert!(code.contains("const name"));
        assert!(code.contains("module.exports"));
    }

    #[test]
    fn test_types_rejected_in_javascript() {
        let result = transpile(
            "tool.js",
            "const x: number = 1;",
            LoaderKind::JavaScript,
            &CompilerConfig::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_error_position() {
        let err = transpile(
            "broken.ts",
            "const ok = 1;\nconst x: = \"invalid syntax\";\n",
            LoaderKind::TypeScript,
            &CompilerConfig::default(),
        )
        .unwrap_err();

        assert_eq!(err.identifier, "broken.ts");
        assert_eq!(err.line, 2);
        assert!(err.column > 1);
    }
}
