use pretty_assertions::assert_eq;

use super::*;
use crate::aspect::advice::{
    AddBlankImport, AddStructField, Advice, AdviceOrder, InjectDeclarations, PrependStatements, Template,
};
use crate::aspect::join::{Function, FunctionOption, ImportPath, Point};
use crate::typed::Type;

const IMPORT_PATH: &str = "example.com/app";

const HANDLER: &str = r#"package app

import "net/http"

func Handle(w http.ResponseWriter, r *http.Request) {
	w.WriteHeader(200)
}

func helper() {}
"#;

fn config() -> InjectorConfig {
    InjectorConfig {
        import_path: IMPORT_PATH.to_string(),
        ..Default::default()
    }
}

fn handle() -> Box<dyn Point> {
    Box::new(Function::new(vec![
        FunctionOption::Name("Handle".to_string()),
        FunctionOption::Signature {
            args: vec![
                Type::parse("net/http.ResponseWriter").unwrap(),
                Type::parse("*net/http.Request").unwrap(),
            ],
            returns: Vec::new(),
        },
    ]))
}

fn println(text: &str) -> Template {
    Template::new(format!("fmt.Println(\"{text}\")"))
        .unwrap()
        .with_import("fmt", "fmt")
}

fn prepend(id: &str, text: &str) -> Aspect {
    Aspect::new(id, handle(), vec![Box::new(PrependStatements::new(println(text)))])
}

#[test]
fn test_prepends_statement_and_imports_template_package() {
    let aspect = prepend("trace", "entered");
    assert!(aspect.added_imports().contains("fmt"));

    let mut injector = Injector::new(vec![aspect], config());
    let result = injector.inject_file("handler.go", HANDLER).unwrap();
    assert!(result.modified);
    assert!(
        result.source.contains("__tapestry_fmt \"fmt\""),
        "{}",
        result.source
    );
    assert!(
        result
            .source
            .contains("{\n\t__tapestry_fmt.Println(\"entered\")\n\tw.WriteHeader(200)\n}"),
        "{}",
        result.source
    );
    assert_eq!(result.references.get("fmt").map(String::as_str), Some("__tapestry_fmt"));
    assert_eq!(
        injector.stats(),
        &[AspectStats {
            aspect_id: "trace".to_string(),
            matches: 1,
            applications: 1,
            errors: 0,
        }]
    );
}

#[test]
fn test_existing_import_is_reused() {
    let source = HANDLER.replace("import \"net/http\"", "import (\n\t\"fmt\"\n\t\"net/http\"\n)");
    let mut injector = Injector::new(vec![prepend("trace", "entered")], config());
    let result = injector.inject_file("handler.go", &source).unwrap();
    assert!(result.source.contains("\tfmt.Println(\"entered\")\n"), "{}", result.source);
    assert!(!result.source.contains("__tapestry_fmt"), "{}", result.source);
}

#[test]
fn test_unmatched_file_is_returned_verbatim() {
    let source = "package app\n\nfunc unrelated() {}\n";
    let mut injector = Injector::new(vec![prepend("trace", "entered")], config());
    let result = injector.inject_file("other.go", source).unwrap();
    assert!(!result.modified);
    assert_eq!(result.source, source);
    assert!(result.references.is_empty());
    assert_eq!(injector.stats()[0].matches, 0);
}

#[test]
fn test_package_prefilter_skips_walk() {
    let aspect = Aspect::new(
        "elsewhere",
        Box::new(ImportPath("example.com/other".to_string())),
        vec![Box::new(AddBlankImport("example.com/tracer".to_string()))],
    );
    let mut injector = Injector::new(vec![aspect], config());
    let result = injector.inject_file("handler.go", HANDLER).unwrap();
    assert!(!result.modified);
    assert_eq!(injector.stats()[0].matches, 0);
}

#[test]
fn test_advice_is_ordered_across_aspects() {
    let late = prepend("late", "second");
    let early = Aspect::new(
        "early",
        handle(),
        vec![Box::new(
            PrependStatements::new(println("first")).with_order(AdviceOrder::new("default", -1)),
        )],
    );
    let mut injector = Injector::new(vec![late, early], config());
    let source = injector.inject_file("handler.go", HANDLER).unwrap().source;
    let first = source.find("\"first\"").unwrap();
    let second = source.find("\"second\"").unwrap();
    assert!(first < second, "{source}");
}

#[test]
fn test_ignored_declarations_are_not_woven() {
    let source = HANDLER.replace("func Handle(", "//tapestry:ignore\nfunc Handle(");
    let mut injector = Injector::new(vec![prepend("trace", "entered")], config());
    let result = injector.inject_file("handler.go", &source).unwrap();
    assert!(!result.modified);
    assert_eq!(injector.stats()[0].matches, 0);
}

#[test]
fn test_self_import_is_skipped_unless_tracer_internal() {
    let template = Template::new("app.Record()").unwrap().with_import("app", IMPORT_PATH);
    let build = |internal: bool| {
        Aspect::new(
            "self",
            handle(),
            vec![Box::new(PrependStatements::new(template.clone())) as Box<dyn Advice>],
        )
        .tracer_internal(internal)
    };

    let mut injector = Injector::new(vec![build(false)], config());
    assert!(!injector.inject_file("handler.go", HANDLER).unwrap().modified);

    let mut injector = Injector::new(vec![build(true)], config());
    let result = injector.inject_file("handler.go", HANDLER).unwrap();
    assert!(result.modified);
    assert!(result.source.contains("\tRecord()\n"), "{}", result.source);
    assert!(!result.source.contains(IMPORT_PATH), "{}", result.source);
}

#[test]
fn test_injected_declarations_and_links() {
    let template = Template::new("//go:linkname __tapestry_now example.com/tracer/runtime.now\nfunc __tapestry_now() int64")
        .unwrap();
    let advice = InjectDeclarations::new(template).with_links(vec!["example.com/tracer/runtime".to_string()]);
    let aspect = Aspect::new("links", handle(), vec![Box::new(advice)]);
    let mut injector = Injector::new(vec![aspect], config());
    let result = injector.inject_file("handler.go", HANDLER).unwrap();

    assert!(result.source.contains("_ \"unsafe\""), "{}", result.source);
    assert!(
        result.source.trim_end().ends_with("func __tapestry_now() int64"),
        "{}",
        result.source
    );
    assert!(result.links.contains("example.com/tracer/runtime"));
}

#[test]
fn test_advice_error_fails_the_package() {
    let aspect = Aspect::new(
        "misplaced",
        handle(),
        vec![Box::new(AddStructField::new("span", Type::parse("int").unwrap()))],
    );
    let mut injector = Injector::new(vec![aspect], config());
    let err = injector.inject_file("handler.go", HANDLER).unwrap_err();
    assert!(
        matches!(&err, InjectError::Advice { file, aspect, .. } if file == "handler.go" && aspect == "misplaced"),
        "{err}"
    );
    assert_eq!(injector.stats()[0].errors, 1);
}

#[test]
fn test_parse_errors_name_the_file() {
    let mut injector = Injector::new(Vec::new(), config());
    let err = injector.inject_file("broken.go", "package app\n\nfunc (\n").unwrap_err();
    assert!(matches!(&err, InjectError::Parse { file, .. } if file == "broken.go"), "{err}");
}

#[test]
fn test_inject_package_keeps_file_order() {
    let files = vec![
        ("helpers.go".to_string(), "package app\n\nfunc helper2() {}\n".to_string()),
        ("handler.go".to_string(), HANDLER.to_string()),
    ];
    let mut injector = Injector::new(vec![prepend("trace", "entered")], config());
    let results = injector.inject_package(&files).unwrap();
    let summary: Vec<(&str, bool)> = results
        .iter()
        .map(|result| (result.name.as_str(), result.modified))
        .collect();
    assert_eq!(summary, vec![("helpers.go", false), ("handler.go", true)]);
}

#[test]
fn test_results_serialize_to_json() {
    let mut injector = Injector::new(vec![prepend("trace", "entered")], config());
    let result = injector.inject_file("handler.go", HANDLER).unwrap();
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["name"], "handler.go");
    assert_eq!(json["modified"], true);
    assert_eq!(json["references"]["fmt"], "__tapestry_fmt");
    assert!(json["go_lang"].is_null());
}
