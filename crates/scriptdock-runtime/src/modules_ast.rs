//! ES module syntax lowering to CommonJS.
//!
//! Scripts run inside a CommonJS function wrapper, so `import`/`export`
//! declarations are rewritten into `require()` calls and `exports.*`
//! assignments before code generation. Exports are assigned right after
//! their declaration (function exports are hoisted to the top of the body),
//! which keeps partially initialized exports visible to circular requires.

use swc_common::{DUMMY_SP, FileName, SourceMap, sync::Lrc};
use swc_ecma_ast::*;
use swc_ecma_parser::{EsSyntax, Parser, StringInput, Syntax, lexer::Lexer};
use swc_ecma_visit::{VisitMut, VisitMutWith};

const DEFAULT_EXPORT_BINDING: &str = "__default_export__";

/// Get string value from a Wtf8Atom (used in Str literal values)
fn str_value(value: &Str) -> String {
    value.value.as_str().unwrap_or_default().to_string()
}

/// Quote a string as a JavaScript string literal
pub(crate) fn quote(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn is_identifier_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// Property access expression: `obj.name` or `obj["name"]`
fn member(object: &str, name: &str) -> String {
    if is_identifier_name(name) {
        format!("{object}.{name}")
    } else {
        format!("{object}[{}]", quote(name))
    }
}

fn require_call(specifier: &str) -> String {
    format!("require({})", quote(specifier))
}

fn export_name(name: &ModuleExportName) -> String {
    match name {
        ModuleExportName::Ident(id) => id.sym.as_str().to_string(),
        ModuleExportName::Str(s) => str_value(s),
    }
}

/// Collect all bound names from a pattern (handles destructuring)
fn collect_pattern_names(pat: &Pat, names: &mut Vec<String>) {
    match pat {
        Pat::Ident(ident) => names.push(ident.sym.as_str().to_string()),
        Pat::Object(obj) => {
            for prop in &obj.props {
                match prop {
                    ObjectPatProp::KeyValue(kv) => collect_pattern_names(&kv.value, names),
                    ObjectPatProp::Assign(assign) => {
                        names.push(assign.key.sym.as_str().to_string())
                    }
                    ObjectPatProp::Rest(rest) => collect_pattern_names(&rest.arg, names),
                }
            }
        }
        Pat::Array(arr) => {
            for elem in arr.elems.iter().flatten() {
                collect_pattern_names(elem, names);
            }
        }
        Pat::Rest(rest) => collect_pattern_names(&rest.arg, names),
        Pat::Assign(assign) => collect_pattern_names(&assign.left, names),
        _ => {}
    }
}

/// AST visitor rewriting ES module declarations into CommonJS statements.
pub(crate) struct EsmToCommonJs {
    cm: Lrc<SourceMap>,
    next_import: usize,
    /// `export { local as exported }` pairs, assigned at the end of the body
    trailing: Vec<(String, String)>,
    error: Option<String>,
}

impl EsmToCommonJs {
    pub(crate) fn new(cm: Lrc<SourceMap>) -> Self {
        Self {
            cm,
            next_import: 0,
            trailing: Vec::new(),
            error: None,
        }
    }

    /// First failure hit while generating replacement statements, if any.
    pub(crate) fn finish(self) -> Result<(), String> {
        match self.error {
            Some(message) => Err(message),
            None => Ok(()),
        }
    }

    fn import_binding(&mut self) -> String {
        let name = format!("__import_{}", self.next_import);
        self.next_import += 1;
        name
    }

    /// Parse generated code into statements
    fn stmts(&mut self, code: &str) -> Vec<ModuleItem> {
        let fm = self
            .cm
            .new_source_file(Lrc::new(FileName::Anon), code.to_string());
        let lexer = Lexer::new(
            Syntax::Es(EsSyntax::default()),
            EsVersion::EsNext,
            StringInput::from(&*fm),
            None,
        );
        match Parser::new_from(lexer).parse_script() {
            Ok(script) => script.body.into_iter().map(ModuleItem::Stmt).collect(),
            Err(e) => {
                self.error
                    .get_or_insert_with(|| format!("generated `{code}`: {}", e.kind().msg()));
                Vec::new()
            }
        }
    }

    fn lower(&mut self, decl: ModuleDecl, hoisted: &mut Vec<ModuleItem>, body: &mut Vec<ModuleItem>) {
        match decl {
            ModuleDecl::Import(import) => {
                if import.type_only {
                    return;
                }
                let specifier = str_value(&import.src);
                if import.specifiers.is_empty() {
                    body.extend(self.stmts(&format!("{};", require_call(&specifier))));
                    return;
                }

                let binding = self.import_binding();
                let mut code = format!("const {binding} = {};\n", require_call(&specifier));
                for spec in &import.specifiers {
                    match spec {
                        ImportSpecifier::Default(default) => code.push_str(&format!(
                            "const {local} = {binding} != null && {binding}.default !== undefined ? {binding}.default : {binding};\n",
                            local = default.local.sym.as_str(),
                        )),
                        ImportSpecifier::Named(named) if !named.is_type_only => {
                            let imported = named
                                .imported
                                .as_ref()
                                .map(export_name)
                                .unwrap_or_else(|| named.local.sym.as_str().to_string());
                            code.push_str(&format!(
                                "const {} = {};\n",
                                named.local.sym.as_str(),
                                member(&binding, &imported)
                            ));
                        }
                        ImportSpecifier::Named(_) => {}
                        ImportSpecifier::Namespace(ns) => {
                            code.push_str(&format!("const {} = {binding};\n", ns.local.sym.as_str()))
                        }
                    }
                }
                body.extend(self.stmts(&code));
            }

            ModuleDecl::ExportDecl(export) => match export.decl {
                Decl::Var(var_decl) => {
                    let mut names = Vec::new();
                    for declarator in &var_decl.decls {
                        collect_pattern_names(&declarator.name, &mut names);
                    }
                    body.push(ModuleItem::Stmt(Stmt::Decl(Decl::Var(var_decl))));
                    let code = export_assignments(names.iter().map(|n| (n.as_str(), n.as_str())));
                    body.extend(self.stmts(&code));
                }
                Decl::Fn(fn_decl) => {
                    let name = fn_decl.ident.sym.as_str().to_string();
                    hoisted.extend(self.stmts(&export_assignments([(name.as_str(), name.as_str())])));
                    body.push(ModuleItem::Stmt(Stmt::Decl(Decl::Fn(fn_decl))));
                }
                Decl::Class(class_decl) => {
                    let name = class_decl.ident.sym.as_str().to_string();
                    body.push(ModuleItem::Stmt(Stmt::Decl(Decl::Class(class_decl))));
                    body.extend(self.stmts(&export_assignments([(name.as_str(), name.as_str())])));
                }
                other => body.push(ModuleItem::Stmt(Stmt::Decl(other))),
            },

            ModuleDecl::ExportDefaultExpr(export) => {
                let var_decl = VarDecl {
                    span: DUMMY_SP,
                    kind: VarDeclKind::Const,
                    declare: false,
                    decls: vec![VarDeclarator {
                        span: DUMMY_SP,
                        name: Pat::Ident(BindingIdent {
                            id: Ident::new(DEFAULT_EXPORT_BINDING.into(), DUMMY_SP, Default::default()),
                            type_ann: None,
                        }),
                        init: Some(export.expr),
                        definite: false,
                    }],
                    ctxt: Default::default(),
                };
                body.push(ModuleItem::Stmt(Stmt::Decl(Decl::Var(Box::new(var_decl)))));
                body.extend(self.stmts(&format!("exports.default = {DEFAULT_EXPORT_BINDING};")));
            }

            ModuleDecl::ExportDefaultDecl(export) => match export.decl {
                DefaultDecl::Fn(fn_expr) => {
                    let name = fn_expr
                        .ident
                        .as_ref()
                        .map(|i| i.sym.as_str().to_string())
                        .unwrap_or_else(|| DEFAULT_EXPORT_BINDING.to_string());
                    hoisted.extend(self.stmts(&format!("exports.default = {name};")));
                    body.push(ModuleItem::Stmt(Stmt::Decl(Decl::Fn(FnDecl {
                        ident: Ident::new(name.into(), DUMMY_SP, Default::default()),
                        declare: false,
                        function: fn_expr.function,
                    }))));
                }
                DefaultDecl::Class(class_expr) => {
                    let name = class_expr
                        .ident
                        .as_ref()
                        .map(|i| i.sym.as_str().to_string())
                        .unwrap_or_else(|| DEFAULT_EXPORT_BINDING.to_string());
                    body.push(ModuleItem::Stmt(Stmt::Decl(Decl::Class(ClassDecl {
                        ident: Ident::new(name.clone().into(), DUMMY_SP, Default::default()),
                        declare: false,
                        class: class_expr.class,
                    }))));
                    body.extend(self.stmts(&format!("exports.default = {name};")));
                }
                _ => {}
            },

            ModuleDecl::ExportNamed(export) => {
                if export.type_only {
                    return;
                }
                let Some(src) = &export.src else {
                    for spec in &export.specifiers {
                        if let ExportSpecifier::Named(named) = spec
                            && !named.is_type_only
                        {
                            let orig = export_name(&named.orig);
                            let exported = named.exported.as_ref().map(export_name).unwrap_or_else(|| orig.clone());
                            self.trailing.push((exported, orig));
                        }
                    }
                    return;
                };

                let binding = self.import_binding();
                let mut code = format!("const {binding} = {};\n", require_call(&str_value(src)));
                for spec in &export.specifiers {
                    match spec {
                        ExportSpecifier::Named(named) if !named.is_type_only => {
                            let orig = export_name(&named.orig);
                            let exported = named.exported.as_ref().map(export_name).unwrap_or_else(|| orig.clone());
                            code.push_str(&format!("{} = {};\n", member("exports", &exported), member(&binding, &orig)));
                        }
                        ExportSpecifier::Named(_) => {}
                        ExportSpecifier::Namespace(ns) => {
                            code.push_str(&format!("{} = {binding};\n", member("exports", &export_name(&ns.name))));
                        }
                        ExportSpecifier::Default(default) => {
                            code.push_str(&format!(
                                "{} = {binding}.default;\n",
                                member("exports", default.exported.sym.as_str())
                            ));
                        }
                    }
                }
                body.extend(self.stmts(&code));
            }

            ModuleDecl::ExportAll(export) => {
                if export.type_only {
                    return;
                }
                let code = format!(
                    "(function (m) {{ Object.keys(m).forEach(function (k) {{ if (k !== \"default\" && !(k in exports)) exports[k] = m[k]; }}); }})({});",
                    require_call(&str_value(&export.src))
                );
                body.extend(self.stmts(&code));
            }

            other => body.push(ModuleItem::ModuleDecl(other)),
        }
    }
}

fn export_assignments<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    pairs
        .into_iter()
        .map(|(exported, local)| format!("{} = {local};\n", member("exports", exported)))
        .collect()
}

impl VisitMut for EsmToCommonJs {
    fn visit_mut_module_items(&mut self, items: &mut Vec<ModuleItem>) {
        let mut hoisted = Vec::new();
        let mut body = Vec::new();

        for item in items.drain(..) {
            match item {
                ModuleItem::ModuleDecl(decl) => self.lower(decl, &mut hoisted, &mut body),
                stmt => body.push(stmt),
            }
        }

        let trailing = std::mem::take(&mut self.trailing);
        let code = export_assignments(trailing.iter().map(|(e, l)| (e.as_str(), l.as_str())));
        let trailing = self.stmts(&code);

        *items = hoisted.into_iter().chain(body).chain(trailing).collect();

        // Dynamic imports can appear anywhere below the top level
        for item in items.iter_mut() {
            item.visit_mut_children_with(self);
        }
    }

    /// `import(spec)` -> `Promise.resolve(spec).then(require)`
    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        expr.visit_mut_children_with(self);

        let Expr::Call(call) = expr else { return };
        if !matches!(call.callee, Callee::Import(_)) {
            return;
        }
        let args = std::mem::take(&mut call.args);

        let fm = self.cm.new_source_file(
            Lrc::new(FileName::Anon),
            "Promise.resolve().then(require)".to_string(),
        );
        let lexer = Lexer::new(
            Syntax::Es(EsSyntax::default()),
            EsVersion::EsNext,
            StringInput::from(&*fm),
            None,
        );
        let Ok(mut replacement) = Parser::new_from(lexer).parse_expr() else {
            self.error.get_or_insert_with(|| "failed to lower dynamic import".to_string());
            return;
        };

        if let Expr::Call(outer) = &mut *replacement
            && let Callee::Expr(callee) = &mut outer.callee
            && let Expr::Member(then) = &mut **callee
            && let Expr::Call(resolve) = &mut *then.obj
        {
            resolve.args = args.into_iter().take(1).collect();
        }
        *expr = *replacement;
    }
}
