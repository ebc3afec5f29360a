use std::collections::{BTreeMap, BTreeSet};

use pretty_assertions::assert_eq;

use super::testing::{matched, matched_with, IMPORT_PATH};
use super::*;
use crate::typed::{NamedType, Type};
use crate::InjectorConfig;

fn ty(s: &str) -> Type {
    Type::parse(s).unwrap()
}

fn local(name: &str) -> NamedType {
    NamedType::new(Some(IMPORT_PATH), name)
}

const SPANS: &str = r#"package app

func run() {
	//dd:span op:fetch
	x := fetch()
	//dd:span
	defer cleanup()
	y := other()
	_ = x
	_ = y
}
"#;

#[test]
fn test_directive_forwards_to_primary_expressions() {
    let found = matched(&Directive::new("dd:span"), SPANS);
    assert_eq!(&found[..3], &["x", "fetch", "fetch()"]);
    assert!(found[3].contains("x := fetch()"), "{found:?}");
    assert_eq!(&found[4..6], &["cleanup", "cleanup()"]);
    assert!(found[6].contains("defer cleanup()"), "{found:?}");
    assert_eq!(found.len(), 7);
    assert!(!found.iter().any(|node| node.contains("other")));
}

#[test]
fn test_directive_forwards_through_single_spec_declarations() {
    let single = r#"package app

//dd:span
var client = newClient()
"#;
    let found = matched(&Directive::new("dd:span"), single);
    assert_eq!(found.len(), 4, "{found:?}");
    assert!(found.contains(&"newClient()".to_string()));

    let grouped = r#"package app

//dd:span
var (
	a = one()
	b = two()
)
"#;
    let found = matched(&Directive::new("dd:span"), grouped);
    assert_eq!(found.len(), 1, "{found:?}");
}

const HANDLERS: &str = r#"package app

import "net/http"

func Handle(w http.ResponseWriter, r *http.Request) {
	inner := func(r *http.Request) {}
	_ = inner
}

func Other(r *http.Request) {}
"#;

#[test]
fn test_function_name_and_exact_signature() {
    let point = Function::new(vec![
        FunctionOption::Name("Handle".to_string()),
        FunctionOption::Signature {
            args: vec![ty("net/http.ResponseWriter"), ty("*net/http.Request")],
            returns: Vec::new(),
        },
    ]);
    let found = matched(&point, HANDLERS);
    assert_eq!(found.len(), 1);
    assert!(found[0].starts_with("func Handle("), "{}", found[0]);

    let wrong_order = Function::new(vec![FunctionOption::Signature {
        args: vec![ty("*net/http.Request"), ty("net/http.ResponseWriter")],
        returns: Vec::new(),
    }]);
    assert!(matched(&wrong_order, HANDLERS).is_empty());
}

#[test]
fn test_signature_contains_matches_literals_and_declarations() {
    let point = Function::new(vec![FunctionOption::SignatureContains {
        args: vec![ty("*net/http.Request")],
        returns: Vec::new(),
    }]);
    let found = matched(&point, HANDLERS);
    assert_eq!(found.len(), 3, "{found:?}");
    assert!(found[0].starts_with("func(r *http.Request)"), "{}", found[0]);
    assert!(found[1].starts_with("func Handle("));
    assert!(found[2].starts_with("func Other("));

    let anything = Function::new(vec![FunctionOption::SignatureContains {
        args: Vec::new(),
        returns: Vec::new(),
    }]);
    assert_eq!(matched(&anything, HANDLERS).len(), 3);
}

const METHODS: &str = r#"package app

type Server struct{}

func (s *Server) Serve() {}

func (s Server) Name() string { return "" }

type Failure struct{}

func (f *Failure) Error() string { return "" }

func load() (int, *Failure) { return 0, nil }

func save() error { return nil }

func count() int { return 0 }
"#;

#[test]
fn test_receiver_type() {
    let point = Function::new(vec![FunctionOption::Receiver(ty(
        "*example.com/app.Server",
    ))]);
    let found = matched(&point, METHODS);
    assert_eq!(found.len(), 1);
    assert!(found[0].contains("Serve()"), "{}", found[0]);
}

#[test]
fn test_result_implements_uses_declared_methods() {
    let point = Function::new(vec![FunctionOption::ResultImplements(ty("error"))]);
    let found = matched(&point, METHODS);
    assert_eq!(found.len(), 2, "{found:?}");
    assert!(found[0].starts_with("func load()"));
    assert!(found[1].starts_with("func save()"));

    let last = Function::new(vec![FunctionOption::FinalResultImplements(ty("error"))]);
    assert_eq!(matched(&last, METHODS).len(), 2);
}

#[test]
fn test_function_body_matches_only_the_body_block() {
    let point = FunctionBody(Box::new(Function::new(vec![FunctionOption::Name(
        "Handle".to_string(),
    )])));
    let found = matched(&point, HANDLERS);
    assert_eq!(found.len(), 1);
    assert!(found[0].starts_with('{'), "{}", found[0]);
    assert!(found[0].contains("inner := func"));
}

#[test]
fn test_function_call_resolves_qualified_references() {
    let source = r#"package app

import "net/http"

func fetch(url string) {
	resp, _ := http.Get(url)
	_ = resp
	Get()
}

func Get() {}
"#;
    let found = matched(&FunctionCall::new("net/http", "Get"), source);
    assert_eq!(found, vec!["http.Get(url)".to_string()]);

    let local = matched(&FunctionCall::new(IMPORT_PATH, "Get"), source);
    assert_eq!(local, vec!["Get()".to_string()]);
}

const LITERALS: &str = r#"package app

type Config struct {
	Name string
}

type Alias int

func build() {
	a := Config{Name: "a"}
	b := &Config{Name: "b"}
	_, _ = a, b
}
"#;

#[test]
fn test_struct_literal_kinds() {
    let any = StructLiteral::new(local("Config"), StructLiteralMatch::Any);
    assert_eq!(matched(&any, LITERALS).len(), 2);

    let values = StructLiteral::new(local("Config"), StructLiteralMatch::ValueOnly);
    let found = matched(&values, LITERALS);
    assert_eq!(found.len(), 1);
    assert!(found[0].contains("\"a\""), "{}", found[0]);

    let pointers = StructLiteral::new(local("Config"), StructLiteralMatch::PointerOnly);
    let found = matched(&pointers, LITERALS);
    assert_eq!(found.len(), 1);
    assert!(found[0].starts_with('&'), "{}", found[0]);
}

#[test]
fn test_struct_literal_field() {
    let field = StructLiteral::field(local("Config"), "Name");
    let found = matched(&field, LITERALS);
    assert_eq!(found.len(), 2, "{found:?}");
    assert!(found.iter().all(|kv| kv.starts_with("Name:")));

    let mut pointer_field = StructLiteral::field(local("Config"), "Name");
    pointer_field.kind = StructLiteralMatch::PointerOnly;
    let found = matched(&pointer_field, LITERALS);
    assert_eq!(found.len(), 1);
    assert!(found[0].contains("\"b\""));
}

#[test]
fn test_struct_definition() {
    let found = matched(&StructDefinition(local("Config")), LITERALS);
    assert_eq!(found.len(), 1);
    assert!(found[0].starts_with("Config struct"), "{}", found[0]);
    assert!(matched(&StructDefinition(local("Alias")), LITERALS).is_empty());
    let foreign = NamedType::new(Some("example.com/other"), "Config");
    assert!(matched(&StructDefinition(foreign), LITERALS).is_empty());
}

#[test]
fn test_declarations() {
    let source = r#"package app

import (
	"os"
	"time"
)

var timeout time.Duration = 5

var count int

var home = os.Getenv("HOME")

func setup() {
	user := os.Getenv("USER")
	n := len(user)
	_ = n
}
"#;
    assert_eq!(matched(&DeclarationOf::new(IMPORT_PATH, "setup"), source).len(), 1);
    assert_eq!(matched(&DeclarationOf::new(IMPORT_PATH, "home"), source).len(), 1);
    assert!(matched(&DeclarationOf::new("example.com/other", "setup"), source).is_empty());

    let found = matched(&ValueDeclaration(ty("time.Duration")), source);
    assert_eq!(found.len(), 1);
    assert!(found[0].starts_with("timeout"), "{}", found[0]);

    let found = matched(&AssignmentOf(Box::new(FunctionCall::new("os", "Getenv"))), source);
    assert_eq!(found.len(), 2, "{found:?}");
    assert!(found[0].contains("\"HOME\""));
    assert!(found[1].contains("user := os.Getenv(\"USER\")"));
}

#[test]
fn test_combinators() {
    assert!(matched(&AllOf(Vec::new()), HANDLERS).is_empty());

    let both = AllOf(vec![
        Box::new(FunctionCall::new("net/http", "Get")),
        Box::new(Not(Box::new(TestMain(true)))),
    ]);
    let source = "package app\n\nimport \"net/http\"\n\nfunc f() { http.Get(\"x\") }\n";
    assert_eq!(matched(&both, source).len(), 1);

    let either = OneOf(vec![
        Box::new(FunctionCall::new("net/http", "Get")),
        Box::new(FunctionCall::new("net/http", "Post")),
    ]);
    assert_eq!(either.implies_imported(), vec!["net/http".to_string()]);
    let mixed = OneOf(vec![
        Box::new(FunctionCall::new("net/http", "Get")),
        Box::new(FunctionCall::new("os", "Open")),
    ]);
    assert!(mixed.implies_imported().is_empty());
    assert!(OneOf(Vec::new()).implies_imported().is_empty());
}

#[test]
fn test_configuration_join_point() {
    let point = AllOf(vec![
        Box::new(Configuration(
            [("tracer".to_string(), "on".to_string())].into_iter().collect(),
        )),
        Box::new(FunctionCall::new("net/http", "Get")),
    ]);
    let source = "package app\n\nimport \"net/http\"\n\nfunc f() { http.Get(\"x\") }\n";
    assert!(matched(&point, source).is_empty());

    let mut config = InjectorConfig {
        import_path: IMPORT_PATH.to_string(),
        ..Default::default()
    };
    config.configuration.insert("tracer".to_string(), "on".to_string());
    assert_eq!(matched_with(&point, source, &config).len(), 1);
}

#[test]
fn test_ignore_directive_skips_subtree() {
    let source = r#"package app

import "net/http"

//tapestry:ignore
func quiet() { http.Get("a") }

func loud() { http.Get("b") }
"#;
    let found = matched(&FunctionCall::new("net/http", "Get"), source);
    assert_eq!(found, vec!["http.Get(\"b\")".to_string()]);
}

#[test]
fn test_match_type_truth_tables() {
    use MatchType::*;
    let all = [Match, NeverMatch, Unknown];
    for a in all {
        assert_eq!(a.and(NeverMatch), NeverMatch);
        assert_eq!(a.or(Match), Match);
        assert_eq!(a.not().not(), a);
    }
    assert_eq!(Match.and(Match), Match);
    assert_eq!(Match.and(Unknown), Unknown);
    assert_eq!(NeverMatch.or(NeverMatch), NeverMatch);
    assert_eq!(NeverMatch.or(Unknown), Unknown);
    assert_eq!(Unknown.not(), Unknown);
}

fn package_ctx<'a>(
    imports: &'a BTreeSet<String>,
    configuration: &'a BTreeMap<String, String>,
) -> PackageMayMatchContext<'a> {
    PackageMayMatchContext {
        import_path: IMPORT_PATH,
        package_name: "app",
        module_path: "example.com/app",
        imports,
        test_main: false,
        configuration,
    }
}

#[test]
fn test_package_pre_filters() {
    let imports: BTreeSet<String> = ["fmt".to_string()].into_iter().collect();
    let configuration = BTreeMap::new();
    let ctx = package_ctx(&imports, &configuration);

    assert_eq!(
        FunctionCall::new("net/http", "Get").package_may_match(&ctx),
        MatchType::NeverMatch
    );
    assert_eq!(
        FunctionCall::new("fmt", "Println").package_may_match(&ctx),
        MatchType::Unknown
    );
    assert_eq!(ImportPath(IMPORT_PATH.to_string()).package_may_match(&ctx), MatchType::Match);
    assert_eq!(TestMain(true).package_may_match(&ctx), MatchType::NeverMatch);
    assert_eq!(AllOf(Vec::new()).package_may_match(&ctx), MatchType::NeverMatch);
    assert_eq!(
        Not(Box::new(TestMain(true))).package_may_match(&ctx),
        MatchType::Match
    );
    assert_eq!(
        Function::new(vec![FunctionOption::Receiver(ty("*example.com/other.Client"))])
            .package_may_match(&ctx),
        MatchType::NeverMatch
    );
    assert_eq!(
        Configuration([("k".to_string(), "v".to_string())].into_iter().collect())
            .package_may_match(&ctx),
        MatchType::NeverMatch
    );
}

#[test]
fn test_file_pre_filters() {
    let mut ctx = FileMayMatchContext::new(HANDLERS, "app");
    assert_eq!(Directive::new("dd:span").file_may_match(&mut ctx), MatchType::NeverMatch);
    assert_eq!(
        Function::new(vec![FunctionOption::Name("Serve".to_string())]).file_may_match(&mut ctx),
        MatchType::NeverMatch
    );
    assert_eq!(
        Function::new(vec![FunctionOption::Name("Handle".to_string())]).file_may_match(&mut ctx),
        MatchType::Unknown
    );
    assert_eq!(PackageName("other".to_string()).file_may_match(&mut ctx), MatchType::NeverMatch);
    let one_of = OneOf(vec![
        Box::new(PackageName("app".to_string())),
        Box::new(Directive::new("dd:span")),
    ]);
    assert_eq!(one_of.file_may_match(&mut ctx), MatchType::Match);
}

#[test]
fn test_fingerprints_distinguish_join_points() {
    use crate::fingerprint::fingerprint;
    let a = fingerprint(&FunctionCall::new("net/http", "Get"));
    let b = fingerprint(&FunctionCall::new("net/http", "Post"));
    assert_ne!(a, b);
    assert_eq!(a, fingerprint(&FunctionCall::new("net/http", "Get")));
    let all = fingerprint(&AllOf(vec![Box::new(TestMain(true))]));
    let one = fingerprint(&OneOf(vec![Box::new(TestMain(true))]));
    assert_ne!(all, one);
}
