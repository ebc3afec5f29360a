use std::collections::BTreeMap;

use pretty_assertions::assert_eq;

use super::*;
use crate::ast::*;

const HANDLER: &str = r#"//go:build linux

package demo

import (
	"fmt"
	"net/http"
)

type Server struct {
	Name string `json:"name"`
	mux *http.ServeMux
}

// Handle serves.
func (s *Server) Handle(w http.ResponseWriter, r *http.Request) {
	//dd:span op:handle
	ctx := r.Context()
	if ctx == nil {
		return
	} else if s.Name != "" {
		fmt.Println(s.Name) // trailing
	}

	for i := 0; i < 3; i++ {
		fmt.Println(i)
	}
	for k, v := range r.Header {
		_, _ = k, v
	}
	switch s.Name {
	case "a", "b":
		fmt.Println("ab")
	default:
	}
	go func() {
		defer fmt.Println("done")
	}()
}
"#;

fn handle_body(file: &File) -> &BlockStmt {
    file.decls
        .iter()
        .find_map(|decl| match decl {
            Decl::Func(func) if func.name.name == "Handle" => func.body.as_ref(),
            _ => None,
        })
        .expect("Handle has a body")
}

#[test]
fn test_round_trip_preserves_source() {
    let file = parse_file(HANDLER).expect("valid Go");
    assert_eq!(print_file(&file), HANDLER);
}

#[test]
fn test_package_references_become_qualified() {
    let file = parse_file(HANDLER).unwrap();
    let Decl::Func(func) = &file.decls[2] else {
        panic!("expected Handle");
    };
    let (name, ty) = func.ty.params.entries()[1];
    assert_eq!(name.map(|n| n.name.as_str()), Some("r"));
    assert_eq!(ty, &Expr::star(Expr::qualified("net/http", "Request")));

    // `r.Context()` stays a selector: `r` is not a package.
    let body = handle_body(&file);
    let StmtKind::Assign(assign) = &body.list[0].kind else {
        panic!("expected assignment");
    };
    let Expr::Call(call) = &assign.rhs[0] else {
        panic!("expected call");
    };
    assert_eq!(*call.fun, Expr::selector(Expr::ident("r"), "Context"));
}

/// Callees of every call in the file, in document order.
struct Callees(Vec<Expr>);

impl crate::ast::visit::VisitMut for Callees {
    fn visit_expr_mut(&mut self, expr: &mut Expr) {
        if let Expr::Call(call) = expr {
            self.0.push((*call.fun).clone());
        }
        crate::ast::visit::walk_expr_mut(self, expr);
    }
}

#[test]
fn test_local_names_hide_imports() {
    let source = r#"package app

import "net/http"

func fetch(client *Client, url string) {
	http.Get(url)
	http := client
	http.Get(url)
}

func param(http *Client) {
	http.Get("")
}

func scoped() {
	if http := pick(); http != nil {
		http.Get("")
	}
	for _, http := range clients {
		http.Get("")
	}
	http.Get("")
}
"#;
    let mut file = parse_file(source).unwrap();
    let mut callees = Callees(Vec::new());
    crate::ast::visit::walk_file_mut(&mut callees, &mut file);

    let package = Expr::qualified("net/http", "Get");
    let local = Expr::selector(Expr::ident("http"), "Get");
    assert_eq!(
        callees.0,
        vec![
            package.clone(),
            local.clone(),
            local.clone(),
            Expr::ident("pick"),
            local.clone(),
            local,
            package,
        ]
    );
}

#[test]
fn test_comments_attach_as_decorations() {
    let file = parse_file(HANDLER).unwrap();
    assert_eq!(file.decs.start, vec!["//go:build linux".to_string()]);
    assert_eq!(file.decls[2].decs().start, vec!["// Handle serves.".to_string()]);

    let body = handle_body(&file);
    assert_eq!(body.list[0].decs.start, vec!["//dd:span op:handle".to_string()]);
    assert_eq!(body.list[2].decs.before, Space::EmptyLine);

    let StmtKind::If(stmt) = &body.list[1].kind else {
        panic!("expected if");
    };
    let Some(els) = &stmt.els else {
        panic!("expected else branch");
    };
    let StmtKind::If(nested) = &els.kind else {
        panic!("expected else-if");
    };
    assert_eq!(nested.body.list[0].decs.end, vec!["// trailing".to_string()]);
}

#[test]
fn test_aliases_resolve_unimported_packages() {
    let mut aliases = BTreeMap::new();
    aliases.insert("tracer".to_string(), "example.com/tracer".to_string());
    let mut parser = GoParser::new().unwrap();
    let file = parser
        .parse_file("package _\n\nfunc _() {\n\ttracer.Start()\n}\n", &aliases)
        .unwrap();

    let Decl::Func(func) = &file.decls[0] else {
        panic!("expected function");
    };
    let StmtKind::Expr(Expr::Call(call)) = &func.body.as_ref().unwrap().list[0].kind else {
        panic!("expected call statement");
    };
    assert_eq!(*call.fun, Expr::qualified("example.com/tracer", "Start"));
}

#[test]
fn test_variadic_and_generic_forms() {
    let src = "package p\n\nfunc Map[T any](xs ...T) []T {\n\treturn append([]T{}, xs...)\n}\n";
    let file = parse_file(src).unwrap();
    let Decl::Func(func) = &file.decls[0] else {
        panic!("expected function");
    };
    assert!(func.ty.type_params.is_some());
    assert!(matches!(func.ty.params.list[0].ty, Expr::Ellipsis(Some(_))));

    let StmtKind::Return(results) = &func.body.as_ref().unwrap().list[0].kind else {
        panic!("expected return");
    };
    let Expr::Call(call) = &results[0] else {
        panic!("expected call");
    };
    assert!(call.ellipsis);
    assert_eq!(print_file(&file), src);
}

#[test]
fn test_syntax_errors_carry_numbered_listing() {
    let err = parse_file("package p\n\nfunc f( {\n}\n").unwrap_err();
    match err {
        ParseError::Syntax { problems, listing } => {
            assert!(!problems.is_empty());
            assert!(listing.contains("3 | func f( {"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_guess_package_name() {
    assert_eq!(guess_package_name("net/http"), "http");
    assert_eq!(guess_package_name("github.com/redis/go-redis/v9"), "redis");
    assert_eq!(guess_package_name("gopkg.in/yaml.v3"), "yaml");
    assert_eq!(guess_package_name("github.com/mattn/go-sqlite3"), "sqlite3");
    assert_eq!(guess_package_name("github.com/elastic/go-elasticsearch/v8"), "elasticsearch");
    assert_eq!(guess_package_name("github.com/foo/bar-baz"), "bar_baz");
}

#[test]
fn test_numbered_source_pads_line_numbers() {
    let source = (1..=10).map(|i| format!("l{i}")).collect::<Vec<_>>().join("\n");
    let listing = numbered_source(&source);
    assert!(listing.starts_with(" 1 | l1\n"));
    assert!(listing.ends_with("10 | l10"));
}
