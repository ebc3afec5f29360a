use proptest::prelude::*;

use super::*;
use crate::ast::{Decl, Expr, FieldList, Spec, ToSource};
use crate::parser::parse_file;

/// Parses `ty` as the type of a package-level variable in a file importing
/// the packages the tests use.
fn go_type_expr(ty: &str) -> Expr {
    let source = format!(
        "package p\n\nimport (\n\t\"net/http\"\n\t\"time\"\n)\n\nvar _ {ty}\n"
    );
    let file = parse_file(&source).unwrap_or_else(|err| panic!("{ty}: {err}"));
    match file.decls.last() {
        Some(Decl::Gen(gen)) => match &gen.specs[0] {
            Spec::Value(spec) => spec.ty.clone().expect("typed var"),
            other => panic!("unexpected spec {other:?}"),
        },
        other => panic!("unexpected decl {other:?}"),
    }
}

#[test]
fn test_parse_named_types() {
    assert_eq!(Type::parse("string").unwrap(), Type::named(None, "string"));
    assert_eq!(
        Type::parse("time.Duration").unwrap(),
        Type::named(Some("time"), "Duration")
    );
    assert_eq!(
        Type::parse("gopkg.in/yaml.v3.Node").unwrap(),
        Type::named(Some("gopkg.in/yaml.v3"), "Node")
    );
    assert_eq!(
        Type::parse("*net/http.Request").unwrap(),
        Type::pointer(Type::named(Some("net/http"), "Request"))
    );
}

#[test]
fn test_parse_composite_types() {
    let ty = Type::parse("map[string][]*example.com/pkg.Item").unwrap();
    assert_eq!(ty.to_string(), "map[string][]*example.com/pkg.Item");
    assert_eq!(
        ty.import_paths().into_iter().collect::<Vec<_>>(),
        vec!["example.com/pkg".to_string()]
    );
}

#[test]
fn test_array_sizes_ignore_literal_base() {
    let decimal = Type::parse("[16]byte").unwrap();
    for literal in ["[0x10]byte", "[0o20]byte", "[020]byte", "[0b1_0000]byte", "[1_6]byte"] {
        assert_eq!(Type::parse(literal).unwrap(), decimal, "{literal}");
    }
    let Type::Array(array) = Type::parse("[0xFF]byte").unwrap() else {
        panic!("expected array");
    };
    assert_eq!(array.size, 255);
    assert!(decimal.matches(&go_type_expr("[0x10]byte")));
}

#[test]
fn test_separator_after_base_prefix() {
    let decimal = Type::parse("[16]byte").unwrap();
    for literal in ["[0x_10]byte", "[0o_20]byte", "[0_20]byte", "[0b_1_0000]byte"] {
        assert_eq!(Type::parse(literal).unwrap(), decimal, "{literal}");
    }
    for literal in ["[0x__10]byte", "[0x_]byte", "[0_]byte"] {
        assert!(Type::parse(literal).is_err(), "{literal:?} should not parse");
    }
}

#[test]
fn test_malformed_types_are_rejected() {
    for input in [
        "",
        "*",
        "[]",
        "[16",
        "[16]",
        "map[string",
        "map[string]",
        "[0x]byte",
        "[_16]byte",
        "[16_]byte",
        "[1__6]byte",
        "[0b102]byte",
        "a.b.c",
        "net/http",
        "net/http.",
        "string]",
        "int extra",
    ] {
        assert!(Type::parse(input).is_err(), "{input:?} should not parse");
    }

    assert!(matches!(
        Type::parse("map[string]int]"),
        Err(TypeParseError::Trailing { .. })
    ));
    assert!(matches!(
        Type::parse("[0xZZ]byte"),
        Err(TypeParseError::InvalidSize { .. })
    ));
}

#[test]
fn test_named_type_never_matches_pointer() {
    let named = Type::parse("net/http.Request").unwrap();
    let pointer = Type::parse("*net/http.Request").unwrap();
    let star = go_type_expr("*http.Request");
    assert!(!named.matches(&star));
    assert!(pointer.matches(&star));
    assert!(!pointer.matches(&go_type_expr("http.Request")));
}

#[test]
fn test_generic_instantiation_matches_base_type() {
    let ty = Type::parse("example.com/list.List").unwrap();
    let expr = Expr::Index {
        x: Box::new(Expr::qualified("example.com/list", "List")),
        indices: vec![Expr::ident("int")],
    };
    assert!(ty.matches(&expr));
}

#[test]
fn test_slice_matches_variadic_parameter() {
    let ty = Type::parse("[]string").unwrap();
    assert!(ty.matches(&Expr::Ellipsis(Some(Box::new(Expr::ident("string"))))));
}

#[test]
fn test_any_matches_empty_interface() {
    let ty = Type::parse("any").unwrap();
    assert!(ty.matches(&Expr::ident("any")));
    assert!(ty.matches(&Expr::InterfaceType(FieldList::default())));
}

#[test]
fn test_local_identifiers_resolve_in_package() {
    let ty = Type::parse("example.com/app.Server").unwrap();
    let expr = Expr::star(Expr::ident("Server"));
    let ptr = Type::pointer(ty.clone());
    assert!(!ptr.matches(&expr));
    assert!(ptr.matches_in_package(&expr, "example.com/app"));
    assert!(!ptr.matches_in_package(&expr, "example.com/other"));
}

#[test]
fn test_as_node_renders_go_syntax() {
    let ty = Type::parse("map[string]*net/http.Request").unwrap();
    assert_eq!(ty.as_node().to_source(), "map[string]*http.Request");
}

#[test]
fn test_deserialize_from_string() {
    let ty: Type = serde_json::from_str("\"[]*time.Time\"").unwrap();
    assert_eq!(ty.to_string(), "[]*time.Time");
    assert!(serde_json::from_str::<Type>("\"[]\"").is_err());
}

fn arb_type() -> impl Strategy<Value = Type> {
    let leaf = prop_oneof![
        Just(Type::named(None, "int")),
        Just(Type::named(None, "string")),
        Just(Type::named(None, "error")),
        Just(Type::named(None, "any")),
        Just(Type::named(Some("time"), "Duration")),
        Just(Type::named(Some("net/http"), "Request")),
    ];
    leaf.prop_recursive(4, 16, 2, |inner| {
        prop_oneof![
            inner.clone().prop_map(Type::pointer),
            inner.clone().prop_map(|elem| Type::Slice(SliceType {
                elem: Box::new(elem)
            })),
            (0u64..4096, inner.clone()).prop_map(|(size, elem)| Type::Array(ArrayType {
                size,
                elem: Box::new(elem)
            })),
            (inner.clone(), inner).prop_map(|(key, value)| Type::Map(MapType {
                key: Box::new(key),
                value: Box::new(value)
            })),
        ]
    })
}

proptest! {
    #[test]
    fn prop_display_round_trips(ty in arb_type()) {
        prop_assert_eq!(Type::parse(&ty.to_string()).unwrap(), ty);
    }

    #[test]
    fn prop_as_node_matches_parsed_go(ty in arb_type()) {
        let go = ty.as_node().to_source();
        let parsed = go_type_expr(&go);
        prop_assert!(ty.matches(&parsed), "{} did not match {:?}", ty, parsed);
        prop_assert_eq!(ty.as_node(), parsed);
    }
}
