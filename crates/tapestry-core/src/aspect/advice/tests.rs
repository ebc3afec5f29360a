use pretty_assertions::assert_eq;

use super::*;
use crate::aspect::join::{DeclarationOf, Directive, Function, FunctionCall, FunctionOption, Point, StructDefinition};
use crate::aspect::Aspect;
use crate::typed::{NamedType, Type};
use crate::{InjectError, Injector, InjectorConfig, TemplateError};

const IMPORT_PATH: &str = "example.com/app";

fn weave(point: Box<dyn Point>, advice: Vec<Box<dyn Advice>>, source: &str) -> String {
    let config = InjectorConfig {
        import_path: IMPORT_PATH.to_string(),
        ..Default::default()
    };
    let mut injector = Injector::new(vec![Aspect::new("test", point, advice)], config);
    let result = injector.inject_file("test.go", source).unwrap();
    assert!(result.modified, "nothing was woven into:\n{source}");
    result.source
}

fn weave_error(point: Box<dyn Point>, advice: Vec<Box<dyn Advice>>, source: &str) -> AdviceError {
    let config = InjectorConfig {
        import_path: IMPORT_PATH.to_string(),
        ..Default::default()
    };
    let mut injector = Injector::new(vec![Aspect::new("test", point, advice)], config);
    match injector.inject_file("test.go", source) {
        Err(InjectError::Advice { source, .. }) => source,
        other => panic!("expected an advice error, got {other:?}"),
    }
}

fn template(source: &str) -> Template {
    Template::new(source).unwrap().with_import("tracer", "example.com/tracer")
}

fn named(name: &str) -> Box<dyn Point> {
    Box::new(Function::new(vec![FunctionOption::Name(name.to_string())]))
}

#[test]
fn test_sort_is_stable_for_equal_keys() {
    let a = AddComment("a".to_string());
    let b = AddComment("b".to_string());
    let c = PrependStatements::new(Template::new("x()").unwrap()).with_order(AdviceOrder::new("default", -5));
    let mut advice = vec![
        OrderedAdvice::new("one", 0, &a),
        OrderedAdvice::new("two", 1, &b),
        OrderedAdvice::new("three", 2, &c),
    ];
    sort_advice(&mut advice);
    let ids: Vec<&str> = advice.iter().map(|advice| advice.aspect_id).collect();
    assert_eq!(ids, vec!["three", "one", "two"]);
}

#[test]
fn test_namespace_sorts_before_order() {
    let late = PrependStatements::new(Template::new("x()").unwrap()).with_order(AdviceOrder::new("zeta", -100));
    let early = PrependStatements::new(Template::new("y()").unwrap()).with_order(AdviceOrder::new("alpha", 100));
    let mut advice = vec![OrderedAdvice::new("late", 0, &late), OrderedAdvice::new("early", 1, &early)];
    sort_advice(&mut advice);
    assert_eq!(advice[0].aspect_id, "early");
}

#[test]
fn test_append_statements_before_final_return() {
    let source = "package app\n\nfunc load() error {\n\tprepare()\n\treturn nil\n}\n";
    let woven = weave(
        named("load"),
        vec![Box::new(AppendStatements::new(Template::new("cleanup()").unwrap()))],
        source,
    );
    assert!(
        woven.contains("\tprepare()\n\tcleanup()\n\treturn nil\n"),
        "{woven}"
    );
}

#[test]
fn test_block_advice_skips_functions_without_body() {
    let source = "package app\n\nfunc asm()\n\nfunc load() {\n\tprepare()\n}\n";
    let woven = weave(
        Box::new(Function::new(Vec::new())),
        vec![
            Box::new(PrependStatements::new(Template::new("enter()").unwrap())),
            Box::new(AppendStatements::new(Template::new("leave()").unwrap())),
        ],
        source,
    );
    assert!(woven.contains("func asm()\n"), "{woven}");
    assert!(
        woven.contains("func load() {\n\tenter()\n\tprepare()\n\tleave()\n}"),
        "{woven}"
    );
}

#[test]
fn test_prepend_names_unnamed_arguments() {
    let source = "package app\n\nimport \"net/http\"\n\nfunc Handle(http.ResponseWriter, *http.Request) {\n}\n";
    let woven = weave(
        named("Handle"),
        vec![Box::new(PrependStatements::new(
            Template::new("use({{ .Function.Argument 1 }})").unwrap(),
        ))],
        source,
    );
    assert!(
        woven.contains("func Handle(_ http.ResponseWriter, __argument_1 *http.Request) {"),
        "{woven}"
    );
    assert!(woven.contains("\tuse(__argument_1)\n"), "{woven}");
}

#[test]
fn test_prepend_renders_directive_arguments() {
    let source = "package app\n\n//dd:span op:load\nfunc load() {\n}\n";
    let woven = weave(
        Box::new(Directive::new("dd:span")),
        vec![Box::new(PrependStatements::new(template(
            "tracer.Start({{ range .DirectiveArgs \"dd:span\" }}{{ printf \"%q\" .Value }}{{ end }})",
        )))],
        source,
    );
    assert!(woven.contains("\t__tapestry_tracer.Start(\"load\")\n"), "{woven}");
    assert!(woven.contains("__tapestry_tracer \"example.com/tracer\""), "{woven}");
}

const CALLS: &str = r#"package app

import "net/http"

func fetch(url string) error {
	resp, err := http.Get(url)
	_ = resp
	return err
}
"#;

#[test]
fn test_wrap_expression_embeds_original() {
    let woven = weave(
        Box::new(FunctionCall::new("net/http", "Get")),
        vec![Box::new(WrapExpression::new(template("tracer.Wrap({{ .AST }})")))],
        CALLS,
    );
    assert!(
        woven.contains("resp, err := __tapestry_tracer.Wrap(http.Get(url))"),
        "{woven}"
    );
}

#[test]
fn test_replace_function_redirects_call() {
    let woven = weave(
        Box::new(FunctionCall::new("net/http", "Get")),
        vec![Box::new(ReplaceFunction::new("example.com/tracer/http", "Get"))],
        CALLS,
    );
    assert!(woven.contains("resp, err := __tapestry_http.Get(url)"), "{woven}");
    assert!(woven.contains("__tapestry_http \"example.com/tracer/http\""), "{woven}");
}

#[test]
fn test_wrap_expression_rejects_several_statements() {
    let err = weave_error(
        Box::new(FunctionCall::new("net/http", "Get")),
        vec![Box::new(WrapExpression::new(Template::new("a()\nb()").unwrap()))],
        CALLS,
    );
    assert!(
        matches!(&err, AdviceError::Template(TemplateError::Shape { message }) if message == "must produce exactly 1 statement, got 2"),
        "{err:?}"
    );
    assert_eq!(err.to_string(), "template must produce exactly 1 statement, got 2");
}

#[test]
fn test_wrap_expression_rejects_statement() {
    let err = weave_error(
        Box::new(FunctionCall::new("net/http", "Get")),
        vec![Box::new(WrapExpression::new(Template::new("x := 1").unwrap()))],
        CALLS,
    );
    assert!(
        matches!(&err, AdviceError::Template(TemplateError::Shape { message }) if message == "must produce an expression"),
        "{err:?}"
    );
}

#[test]
fn test_inject_declarations_rejects_imports() {
    let err = weave_error(
        named("fetch"),
        vec![Box::new(InjectDeclarations::new(Template::new("import \"fmt\"").unwrap()))],
        CALLS,
    );
    assert!(matches!(err, AdviceError::Template(TemplateError::ImportDeclaration)), "{err:?}");
    assert!(err.to_string().contains("can't declare imports"), "{err}");
}

#[test]
fn test_generated_syntax_error_lists_source() {
    let err = weave_error(
        Box::new(FunctionCall::new("net/http", "Get")),
        vec![Box::new(WrapExpression::new(template("tracer.Wrap({{ .AST }}")))],
        CALLS,
    );
    let AdviceError::Template(TemplateError::Parse { listing, .. }) = &err else {
        panic!("expected a parse error, got {err:?}");
    };
    assert!(listing.contains("1 | package _"), "{listing}");
    assert!(listing.contains("tracer.Wrap("), "{listing}");
}

#[test]
fn test_replace_function_within_package_is_unqualified() {
    let woven = weave(
        Box::new(FunctionCall::new("net/http", "Get")),
        vec![Box::new(ReplaceFunction::new(IMPORT_PATH, "tracedGet"))],
        CALLS,
    );
    assert!(woven.contains("resp, err := tracedGet(url)"), "{woven}");
}

#[test]
fn test_local_replacement_is_not_a_self_import() {
    let local = Aspect::new(
        "local",
        Box::new(FunctionCall::new("net/http", "Get")),
        vec![Box::new(ReplaceFunction::new(IMPORT_PATH, "tracedGet"))],
    );
    assert!(local.added_imports().contains(IMPORT_PATH));
    assert!(!local.is_self_import(IMPORT_PATH));

    let imported = Aspect::new(
        "imported",
        named("Handle"),
        vec![Box::new(PrependStatements::new(
            Template::new("app.Record()").unwrap().with_import("app", IMPORT_PATH),
        ))],
    );
    assert!(imported.is_self_import(IMPORT_PATH));
}

const DIAL: &str = r#"package app

import "google.golang.org/grpc"

func plain(target string) {
	grpc.Dial(target)
}

func spread(target string, opts []grpc.DialOption) {
	grpc.Dial(target, opts...)
}
"#;

fn append_interceptor() -> Box<dyn Advice> {
    Box::new(AppendArgs::new(
        Type::parse("google.golang.org/grpc.DialOption").unwrap(),
        vec![template("tracer.Interceptor()")],
    ))
}

#[test]
fn test_append_args_extends_plain_call() {
    let woven = weave(
        Box::new(FunctionCall::new("google.golang.org/grpc", "Dial")),
        vec![append_interceptor()],
        DIAL,
    );
    assert!(
        woven.contains("\tgrpc.Dial(target, __tapestry_tracer.Interceptor())\n"),
        "{woven}"
    );
}

#[test]
fn test_append_args_merges_into_variadic_spread() {
    let woven = weave(
        Box::new(FunctionCall::new("google.golang.org/grpc", "Dial")),
        vec![append_interceptor()],
        DIAL,
    );
    assert!(
        woven.contains("func(__opts ...grpc.DialOption) []grpc.DialOption {"),
        "{woven}"
    );
    assert!(
        woven.contains("return append(__opts, __tapestry_tracer.Interceptor())"),
        "{woven}"
    );
    assert!(woven.contains("}(opts...)...)"), "{woven}");
}

const CONFIG: &str = r#"package app

type Config struct {
	Name string
}

var enabled bool
"#;

#[test]
fn test_add_struct_field_once() {
    let field = || -> Box<dyn Advice> {
        Box::new(AddStructField::new(
            "__span",
            Type::parse("*example.com/tracer.Span").unwrap(),
        ))
    };
    let woven = weave(
        Box::new(StructDefinition(NamedType::new(Some(IMPORT_PATH), "Config"))),
        vec![field(), field()],
        CONFIG,
    );
    assert_eq!(woven.matches("__span *__tapestry_tracer.Span").count(), 1, "{woven}");
    assert!(woven.contains("__tapestry_tracer \"example.com/tracer\""), "{woven}");
}

#[test]
fn test_assign_value_to_package_variable() {
    let woven = weave(
        Box::new(DeclarationOf::new(IMPORT_PATH, "enabled")),
        vec![Box::new(AssignValue::new(Template::new("true").unwrap()))],
        CONFIG,
    );
    assert!(woven.contains("var enabled bool = true\n"), "{woven}");
}

#[test]
fn test_add_comment_and_blank_import() {
    let woven = weave(
        Box::new(DeclarationOf::new(IMPORT_PATH, "enabled")),
        vec![
            Box::new(AddComment("managed by tracer".to_string())),
            Box::new(AddBlankImport("example.com/tracer/init".to_string())),
        ],
        CONFIG,
    );
    assert!(woven.contains("// managed by tracer\nvar enabled bool"), "{woven}");
    assert!(woven.contains("import _ \"example.com/tracer/init\"\n"), "{woven}");
}

#[test]
fn test_assign_value_rejects_other_nodes() {
    let config = InjectorConfig {
        import_path: IMPORT_PATH.to_string(),
        ..Default::default()
    };
    let aspect = Aspect::new(
        "test",
        Box::new(DeclarationOf::new(IMPORT_PATH, "Config")),
        vec![Box::new(AssignValue::new(Template::new("nil").unwrap()))],
    );
    let err = Injector::new(vec![aspect], config)
        .inject_file("test.go", CONFIG)
        .unwrap_err();
    assert!(err.to_string().contains("assign-value can't be applied"), "{err}");
}

#[test]
fn test_added_imports_cover_types_and_templates() {
    let advice = AppendArgs::new(
        Type::parse("google.golang.org/grpc.DialOption").unwrap(),
        vec![template("tracer.Interceptor()")],
    );
    assert_eq!(
        advice.added_imports(),
        vec!["example.com/tracer".to_string(), "google.golang.org/grpc".to_string()]
    );
    let links = InjectDeclarations::new(Template::new("var x int").unwrap())
        .with_links(vec!["example.com/runtime".to_string()]);
    assert_eq!(links.added_imports(), vec!["example.com/runtime".to_string()]);
}
