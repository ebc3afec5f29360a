//! Weaving driven by aspect files, the way the CLI uses the library.

use anyhow::Result;
use pretty_assertions::assert_eq;
use tapestry_core::{fingerprint, load_aspects, Injector, InjectorConfig};

const ASPECTS: &str = r#"
aspects:
  - id: trace-handlers
    join-point:
      function:
        - name: Handle
        - signature:
            args: ['net/http.ResponseWriter', '*net/http.Request']
    advice:
      prepend-statements:
        imports:
          fmt: fmt
        template: fmt.Println("entered {{ .Function.Name }}")
---
- id: traced-get
  join-point:
    function-call: net/http.Get
  advice:
    replace-function: example.com/tracer/http.Get
"#;

const SOURCE: &str = r#"package app

import "net/http"

func Handle(w http.ResponseWriter, r *http.Request) {
	w.WriteHeader(200)
}

func fetch(url string) {
	http.Get(url)
}
"#;

fn config() -> InjectorConfig {
    InjectorConfig {
        import_path: "example.com/app".to_string(),
        ..Default::default()
    }
}

#[test]
fn test_aspect_file_weaves_package() -> Result<()> {
    let aspects = load_aspects(ASPECTS)?;
    assert_eq!(aspects.len(), 2);

    let mut injector = Injector::new(aspects, config());
    let result = injector.inject_file("app.go", SOURCE)?;

    assert!(result.modified);
    assert!(
        result.source.contains("\t__tapestry_fmt.Println(\"entered Handle\")\n\tw.WriteHeader(200)\n"),
        "{}",
        result.source
    );
    assert!(result.source.contains("\t__tapestry_http.Get(url)\n"), "{}", result.source);
    assert_eq!(
        result.references.get("example.com/tracer/http").map(String::as_str),
        Some("__tapestry_http")
    );

    let applied: Vec<u64> = injector.stats().iter().map(|stats| stats.applications).collect();
    assert_eq!(applied, vec![1, 1]);
    Ok(())
}

#[test]
fn test_woven_output_parses_again() -> Result<()> {
    let mut injector = Injector::new(load_aspects(ASPECTS)?, config());
    let first = injector.inject_file("app.go", SOURCE)?;

    // Running the same aspects over woven output still matches the handler,
    // but the call was already replaced.
    let mut again = Injector::new(load_aspects(ASPECTS)?, config());
    let second = again.inject_file("app.go", &first.source)?;
    assert_eq!(again.stats()[1].matches, 0);
    assert!(second.source.matches("entered Handle").count() == 2, "{}", second.source);
    Ok(())
}

#[test]
fn test_fingerprint_follows_aspect_content() -> Result<()> {
    let original = fingerprint(&load_aspects(ASPECTS)?);
    assert_eq!(original, fingerprint(&load_aspects(ASPECTS)?));

    let edited = ASPECTS.replace("entered", "entering");
    assert_ne!(original, fingerprint(&load_aspects(&edited)?));
    Ok(())
}
