/*!
# Code templates

Advice that synthesizes code does so through Go `text/template` sources
rendered against the matched node. The rendered text is parsed as Go, and
any syntax node the template referenced through `.AST` is spliced back in
place of the placeholder it was rendered as.

Supported template language: text, `{{/* comments */}}`, trim markers,
pipelines with `|`, variables (`:=`, `=`), `if`/`else if`/`else`, `with`,
`range` (with `else`, `break` and `continue`) and the builtins `and`, `or`,
`not`, `eq`, `ne`, `lt`, `le`, `gt`, `ge`, `len`, `index`, `print`,
`printf` and `println`.

The template's `.` exposes:

| Field | Value |
|-------|-------|
| `.AST` | the matched node, with its `go/ast` fields |
| `.DirectiveArgs "name"` | `{Key, Value}` pairs of the closest `//name` directive |
| `.FindArgument "type"` | name of the first function argument of that type |
| `.Function` | the closest function: `.Name`, `.Receiver`, `.Argument i`, `.ArgumentOfType t`, `.Returns i`, `.ResultOfType t`, `.LastResultThatImplements t` |
| `.ImportPath`, `.PackageName` | the package being woven |
| `.Config "key"` | injector configuration value, empty when unset |
| `.TestMain` | whether the package is a synthesized test main |
*/

mod dot;
mod exec;
mod placeholder;
mod text;

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, value::MapAccessDeserializer, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::aspect::context::{AdviceContext, GoLangVersion};
use crate::ast::visit::VisitMut;
use crate::ast::{printer::escape_string, BlockStmt, Decl, DeclToken, Expr, File, Node, StmtKind};
use crate::fingerprint::{Hashable, Hasher};
use crate::parser::{numbered_source, ParseError, SourceParser};

use dot::{DotHost, Object};
use exec::Value;
use placeholder::Splicer;
use text::Program;

#[derive(thiserror::Error, Debug)]
pub enum TemplateError {
    #[error("template syntax error at line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("template execution failed: {message}")]
    Exec { message: String },

    #[error("failed to splice captured node: {message}")]
    Splice { message: String },

    #[error("failed to parse generated code: {error}")]
    Parse {
        #[source]
        error: ParseError,
        /// The generated source, with line numbers.
        listing: String,
    },

    #[error("template {message}")]
    Shape { message: String },

    #[error("templates can't declare imports; list them under `imports` instead")]
    ImportDeclaration,
}

pub(crate) fn quote(s: &str) -> String {
    format!("\"{}\"", escape_string(s))
}

/// A parsed code template.
#[derive(Clone, Deserialize)]
#[serde(try_from = "TemplateSpec")]
pub struct Template {
    source: String,
    /// Local package name to import path, for packages the template uses.
    imports: BTreeMap<String, String>,
    lang: Option<GoLangVersion>,
    program: Program,
}

impl Template {
    pub fn new(source: impl Into<String>) -> Result<Self, TemplateError> {
        let source = source.into();
        let program = text::parse(&source)?;
        Ok(Self {
            source,
            imports: BTreeMap::new(),
            lang: None,
            program,
        })
    }

    pub fn with_import(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.imports.insert(name.into(), path.into());
        self
    }

    pub fn with_lang(mut self, lang: GoLangVersion) -> Self {
        self.lang = Some(lang);
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn imports(&self) -> &BTreeMap<String, String> {
        &self.imports
    }

    pub fn lang(&self) -> Option<GoLangVersion> {
        self.lang
    }

    /// Import paths the generated code may reference.
    pub fn added_imports(&self) -> Vec<String> {
        self.imports.values().cloned().collect()
    }

    fn render(
        &self,
        ctx: &mut AdviceContext<'_>,
        ast: Option<Node>,
    ) -> Result<(String, Vec<Node>), TemplateError> {
        let mut host = DotHost::new(ctx);
        if let Some(ast) = ast {
            host.set_ast(ast);
        }
        let rendered = exec::execute(&self.program, Value::Object(Object::Dot), &mut host)?;
        Ok((rendered, host.into_captures()))
    }

    fn parse(&self, ctx: &mut AdviceContext<'_>, source: &str) -> Result<File, TemplateError> {
        ctx.parser()
            .parse_file(source, &self.imports)
            .map_err(|error| TemplateError::Parse {
                error,
                listing: numbered_source(source),
            })
    }

    /// Registers what the spliced code needs with the file.
    fn finish(&self, ctx: &mut AdviceContext<'_>, splicer: Splicer<'_>) -> Result<(), TemplateError> {
        if let Some(error) = splicer.error {
            return Err(error);
        }
        for path in splicer.paths {
            if path != ctx.import_path() && self.imports.values().any(|p| *p == path) {
                ctx.add_reference(&path);
            }
        }
        if let Some(lang) = self.lang {
            ctx.ensure_min_go_lang(lang);
        }
        Ok(())
    }

    /// Renders the template as a list of statements.
    pub fn compile_block(&self, ctx: &mut AdviceContext<'_>) -> Result<BlockStmt, TemplateError> {
        self.block_on(ctx, None)
    }

    fn block_on(&self, ctx: &mut AdviceContext<'_>, ast: Option<Node>) -> Result<BlockStmt, TemplateError> {
        let (rendered, captures) = self.render(ctx, ast)?;
        let source = format!("package _\n\nfunc _() {{\n{rendered}\n}}\n");
        let file = self.parse(ctx, &source)?;
        let mut block = file
            .decls
            .into_iter()
            .find_map(|decl| match decl {
                Decl::Func(func) => func.body,
                Decl::Gen(_) => None,
            })
            .ok_or_else(|| TemplateError::Shape {
                message: "produced no function body".to_string(),
            })?;
        let mut splicer = Splicer::new(&captures);
        splicer.visit_block_mut(&mut block);
        self.finish(ctx, splicer)?;
        Ok(block)
    }

    /// Renders the template as a single expression.
    pub fn compile_expression(&self, ctx: &mut AdviceContext<'_>) -> Result<Expr, TemplateError> {
        self.expression_on(ctx, None)
    }

    /// Like [`Template::compile_expression`], with `.AST` bound to `ast`
    /// instead of the matched node.
    pub fn compile_expression_on(
        &self,
        ctx: &mut AdviceContext<'_>,
        ast: Node,
    ) -> Result<Expr, TemplateError> {
        self.expression_on(ctx, Some(ast))
    }

    fn expression_on(&self, ctx: &mut AdviceContext<'_>, ast: Option<Node>) -> Result<Expr, TemplateError> {
        let mut list = self.block_on(ctx, ast)?.list;
        if list.len() != 1 {
            return Err(TemplateError::Shape {
                message: format!("must produce exactly 1 statement, got {}", list.len()),
            });
        }
        match list.pop().map(|stmt| stmt.kind) {
            Some(StmtKind::Expr(expr)) => Ok(expr),
            _ => Err(TemplateError::Shape {
                message: "must produce an expression".to_string(),
            }),
        }
    }

    /// Renders the template as top-level declarations.
    pub fn compile_declarations(&self, ctx: &mut AdviceContext<'_>) -> Result<Vec<Decl>, TemplateError> {
        let (rendered, captures) = self.render(ctx, None)?;
        let source = format!("package _\n\n{rendered}\n");
        let mut decls = self.parse(ctx, &source)?.decls;
        if decls
            .iter()
            .any(|decl| matches!(decl, Decl::Gen(gen) if gen.tok == DeclToken::Import))
        {
            return Err(TemplateError::ImportDeclaration);
        }
        let mut splicer = Splicer::new(&captures);
        for decl in &mut decls {
            splicer.visit_decl_mut(decl);
        }
        self.finish(ctx, splicer)?;
        Ok(decls)
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("source", &self.source)
            .field("imports", &self.imports)
            .field("lang", &self.lang)
            .finish()
    }
}

impl PartialEq for Template {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.imports == other.imports && self.lang == other.lang
    }
}

impl Hashable for Template {
    fn hash_into(&self, hasher: &mut Hasher) {
        let lang = self.lang.map(|lang| lang.to_string());
        hasher.named("template", &[&self.source, &self.imports, &lang]);
    }
}

/// Templates are written either as bare source or with their imports.
enum TemplateSpec {
    Source(String),
    Full(TemplateFields),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TemplateFields {
    template: String,
    #[serde(default)]
    imports: BTreeMap<String, String>,
    #[serde(default)]
    lang: Option<GoLangVersion>,
}

impl<'de> Deserialize<'de> for TemplateSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SpecVisitor;

        impl<'de> Visitor<'de> for SpecVisitor {
            type Value = TemplateSpec;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("template source or a mapping with a `template` key")
            }

            fn visit_str<E: de::Error>(self, source: &str) -> Result<TemplateSpec, E> {
                Ok(TemplateSpec::Source(source.to_string()))
            }

            fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<TemplateSpec, A::Error> {
                TemplateFields::deserialize(MapAccessDeserializer::new(map)).map(TemplateSpec::Full)
            }
        }

        deserializer.deserialize_any(SpecVisitor)
    }
}

impl TryFrom<TemplateSpec> for Template {
    type Error = TemplateError;

    fn try_from(spec: TemplateSpec) -> Result<Self, Self::Error> {
        match spec {
            TemplateSpec::Source(source) => Template::new(source),
            TemplateSpec::Full(TemplateFields {
                template,
                imports,
                lang,
            }) => {
                let mut parsed = Template::new(template)?;
                parsed.imports = imports;
                parsed.lang = lang;
                Ok(parsed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_short_and_full_forms() {
        let short: Template = serde_yaml::from_str(r#""fmt.Println(\"hi\")""#).unwrap();
        assert_eq!(short.source(), "fmt.Println(\"hi\")");
        assert!(short.imports().is_empty());

        let full: Template = serde_yaml::from_str(
            "template: '{{ .Function.Name }}'\nimports:\n  tracer: example.com/tracer\nlang: go1.22\n",
        )
        .unwrap();
        assert_eq!(full.added_imports(), vec!["example.com/tracer".to_string()]);
        assert_eq!(full.lang(), Some(GoLangVersion::new(1, 22)));
    }

    #[test]
    fn test_unknown_template_keys_are_rejected() {
        let err = serde_yaml::from_str::<Template>("template: x()\nimport:\n  fmt: fmt\n").unwrap_err();
        assert!(err.to_string().contains("unknown field `import`"), "{err}");
    }

    #[test]
    fn test_template_syntax_errors_surface_on_load() {
        let err = serde_yaml::from_str::<Template>("'{{ if .A }}'").unwrap_err();
        assert!(err.to_string().contains("template syntax error"), "{err}");
    }

    #[test]
    fn test_hash_ignores_parse_but_not_imports() {
        let a = Template::new("x()").unwrap();
        let b = Template::new("x()").unwrap().with_import("x", "example.com/x");
        assert_ne!(crate::fingerprint::fingerprint(&a), crate::fingerprint::fingerprint(&b));
        assert_eq!(
            crate::fingerprint::fingerprint(&a),
            crate::fingerprint::fingerprint(&Template::new("x()").unwrap())
        );
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("a\"b\n"), "\"a\\\"b\\n\"");
    }
}
