use pretty_assertions::assert_eq;

use super::*;
use crate::aspect::advice::AdviceOrder;

const TRACE: &str = r#"
aspects:
  - id: trace-handlers
    join-point:
      all-of:
        - import-path: example.com/app
        - function:
            - name: Handle
            - signature:
                args: ['net/http.ResponseWriter', '*net/http.Request']
    advice:
      - prepend-statements:
          imports:
            fmt: fmt
          template: fmt.Println("enter")
          order: 10
      - add-comment: traced
"#;

#[test]
fn test_load_aspects_from_mapping_document() {
    let aspects = load_aspects(TRACE).unwrap();
    assert_eq!(aspects.len(), 1);
    let aspect = &aspects[0];
    assert_eq!(aspect.id, "trace-handlers");
    assert_eq!(aspect.advice.len(), 2);
    assert_eq!(aspect.advice[0].kind(), "prepend-statements");
    assert_eq!(aspect.advice[0].order(), Some(AdviceOrder::new("default", 10)));
    assert_eq!(aspect.advice[1].kind(), "add-comment");
    assert!(aspect.added_imports().contains("fmt"));
    assert!(!aspect.tracer_internal);
}

#[test]
fn test_load_aspects_from_list_documents() {
    let yaml = r#"
- id: blank
  join-point:
    package-name: main
  advice:
    add-blank-import: example.com/tracer/init
---
- id: calls
  tracer-internal: true
  join-point:
    function-call: net/http.Get
  advice:
    - replace-function: example.com/tracer/http.Get
"#;
    let aspects = load_aspects(yaml).unwrap();
    let ids: Vec<&str> = aspects.iter().map(|aspect| aspect.id.as_str()).collect();
    assert_eq!(ids, vec!["blank", "calls"]);
    assert_eq!(aspects[0].advice.len(), 1);
    assert!(aspects[1].tracer_internal);
}

#[test]
fn test_every_registered_key_decodes() {
    let yaml = r#"
- id: everything
  join-point:
    one-of:
      - not:
          test-main: true
      - configuration:
          tracing: enabled
      - declaration-of:
          import-path: example.com/app
          name: handler
      - value-declaration: '*example.com/app.Config'
      - assignment-of:
          value-declaration: error
      - directive: 'tapestry:trace'
      - function-body:
          function:
            - signature-contains:
                returns: [error]
            - receiver: '*example.com/app.Server'
            - result-implements: error
            - final-result-implements: error
      - package-filter: 'example.com/**'
      - package-filter:
          pattern: internal/*
          root: true
      - struct-definition: example.com/app.Config
      - struct-literal:
          type: example.com/app.Config
          match: pointer-only
      - struct-literal:
          type: example.com/app.Config
          field: Name
  advice:
    - append-statements:
        template: 'defer func() {}()'
        namespace: tracer
    - assign-value: 'nil'
    - wrap-expression: 'wrap({{ .AST }})'
    - add-struct-field:
        name: __span
        type: '*example.com/tracer.Span'
    - inject-declarations:
        template: 'var __linked int'
        links: [example.com/tracer/runtime]
    - append-args:
        type: example.com/tracer.Option
        values: ['option()']
"#;
    let aspects = load_aspects(yaml).unwrap();
    let kinds: Vec<&str> = aspects[0].advice.iter().map(|advice| advice.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            "append-statements",
            "assign-value",
            "wrap-expression",
            "add-struct-field",
            "inject-declarations",
            "append-args",
        ]
    );
    assert_eq!(aspects[0].advice[0].order(), Some(AdviceOrder::new("tracer", 0)));
    let imports = aspects[0].added_imports();
    assert!(imports.contains("example.com/tracer"));
    assert!(imports.contains("example.com/tracer/runtime"));
}

#[test]
fn test_unknown_join_point_is_reported_with_aspect_id() {
    let yaml = r#"
- id: broken
  join-point:
    no-such-point: true
  advice: []
"#;
    let err = load_aspects(yaml).unwrap_err();
    let ConfigError::Aspect { id, source } = err else {
        panic!("unexpected error {err}");
    };
    assert_eq!(id, "broken");
    assert!(
        matches!(*source, ConfigError::UnknownKey { context: "join point", ref key } if key == "no-such-point")
    );
}

#[test]
fn test_unknown_advice_and_function_option() {
    let advice = load_aspects("- id: a\n  join-point: {package-name: main}\n  advice: {explode: 1}\n");
    assert!(advice.unwrap_err().to_string().contains("unknown advice \"explode\""));

    let option = load_aspects("- id: a\n  join-point: {function: [{arity: 2}]}\n  advice: []\n");
    assert!(option
        .unwrap_err()
        .to_string()
        .contains("unknown function option \"arity\""));
}

#[test]
fn test_join_point_must_have_exactly_one_key() {
    let err = decode_join_point(&serde_yaml::from_str("{import-path: a, package-name: b}").unwrap()).unwrap_err();
    assert!(matches!(err, ConfigError::NotSingleton { found, .. } if found == "2 keys"));

    let err = decode_join_point(&serde_yaml::from_str("[import-path]").unwrap()).unwrap_err();
    assert!(matches!(err, ConfigError::NotSingleton { found, .. } if found == "a list"));
}

#[test]
fn test_payload_errors() {
    let value = serde_yaml::from_str("{test-main: maybe}").unwrap();
    assert!(matches!(
        decode_join_point(&value),
        Err(ConfigError::Payload { key, .. }) if key == "test-main"
    ));

    let value = serde_yaml::from_str("{value-declaration: 'map[string'}").unwrap();
    assert!(matches!(decode_join_point(&value), Err(ConfigError::Type { .. })));

    let value = serde_yaml::from_str("{struct-definition: '[]example.com/app.Config'}").unwrap();
    assert!(matches!(decode_join_point(&value), Err(ConfigError::NotNamed { .. })));

    let value = serde_yaml::from_str("{function-call: Println}").unwrap();
    assert!(matches!(decode_join_point(&value), Err(ConfigError::Symbol { .. })));

    let value = serde_yaml::from_str("{package-filter: 'a/[b'}").unwrap();
    assert!(matches!(decode_join_point(&value), Err(ConfigError::Glob { .. })));

    let value = serde_yaml::from_str("{prepend-statements: '{{ if .A }}'}").unwrap();
    assert!(matches!(decode_advice(&value), Err(ConfigError::Payload { .. })));

    let value = serde_yaml::from_str("{assign-value: {template: 'true', import: {fmt: fmt}}}").unwrap();
    assert!(matches!(
        decode_advice(&value),
        Err(ConfigError::Payload { key, .. }) if key == "assign-value"
    ));
}

#[test]
fn test_symbol_splits_after_last_slash() {
    let value = Value::String("gopkg.in/yaml.v3.Unmarshal".to_string());
    assert_eq!(
        symbol("function-call", &value).unwrap(),
        ("gopkg.in/yaml.v3".to_string(), "Unmarshal".to_string())
    );
    assert!(symbol("function-call", &Value::String("gopkg.in/yaml".to_string())).is_err());
}

#[test]
fn test_duplicate_ids_are_rejected() {
    let yaml = "- id: twice\n  join-point: {package-name: main}\n  advice: []\n\
                - id: twice\n  join-point: {package-name: main}\n  advice: []\n";
    assert!(matches!(load_aspects(yaml), Err(ConfigError::DuplicateId(id)) if id == "twice"));
}

#[test]
fn test_unknown_aspect_fields_and_document_shapes() {
    let err = load_aspects("- id: a\n  join-point: {package-name: main}\n  advice: []\n  extra: 1\n").unwrap_err();
    assert!(matches!(err, ConfigError::Aspect { .. }));

    assert!(matches!(load_aspects("42"), Err(ConfigError::Document { .. })));
    assert!(matches!(load_aspects("other: []"), Err(ConfigError::Document { .. })));
    assert!(load_aspects("").unwrap().is_empty());
}

#[test]
fn test_load_aspects_from_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("aspects.yml");
    std::fs::write(&path, TRACE).unwrap();
    assert_eq!(load_aspects_from_path(&path).unwrap().len(), 1);

    let missing = load_aspects_from_path(dir.path().join("missing.yml")).unwrap_err();
    assert!(matches!(missing, ConfigError::Io { .. }));

    std::fs::write(&path, "- id: a\n  join-point: {bogus: 1}\n  advice: []\n").unwrap();
    let err = load_aspects_from_path(&path).unwrap_err();
    assert!(matches!(err, ConfigError::InFile { .. }));
    assert!(err.to_string().contains("aspects.yml"));
}
