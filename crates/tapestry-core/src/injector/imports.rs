//! Import bookkeeping applied once a file has been woven.

use std::collections::BTreeMap;

use crate::ast::visit::{walk_file_mut, VisitMut};
use crate::ast::{Decl, DeclToken, File, GenDecl, Ident, ImportSpec, Spec};

/// Adds an import for every registered reference the file can't already
/// satisfy. Named references reuse an existing non-blank import of the same
/// path; blank imports are skipped when the path is imported at all.
/// Returns the paths that were added.
pub(crate) fn add_imports(file: &mut File, references: &BTreeMap<String, String>, import_path: &str) -> Vec<String> {
    let names = file.import_names();
    let mut specs = Vec::new();
    for (path, alias) in references {
        if path == import_path {
            continue;
        }
        let satisfied = if alias == "_" {
            file.imports_path(path)
        } else {
            names.contains_key(path)
        };
        if !satisfied {
            specs.push(ImportSpec::new(Some(alias), path.clone()));
        }
    }
    let added = specs.iter().map(|spec| spec.path.clone()).collect();
    if specs.is_empty() {
        return added;
    }

    let existing = file.decls.iter_mut().find_map(|decl| match decl {
        Decl::Gen(gen) if gen.tok == DeclToken::Import => Some(gen),
        _ => None,
    });
    match existing {
        Some(gen) => {
            gen.specs.extend(specs.into_iter().map(Spec::Import));
            gen.grouped |= gen.specs.len() > 1;
        }
        None => {
            let specs = specs.into_iter().map(Spec::Import).collect();
            file.decls.insert(0, Decl::Gen(GenDecl::new(DeclToken::Import, specs)));
        }
    }
    added
}

/// Generated code refers to the woven package by its import path; inside the
/// package those references must be plain identifiers.
pub(crate) fn unqualify(file: &mut File, import_path: &str) {
    struct Unqualify<'a>(&'a str);

    impl VisitMut for Unqualify<'_> {
        fn visit_ident_mut(&mut self, ident: &mut Ident) {
            if ident.path.as_deref() == Some(self.0) {
                ident.path = None;
            }
        }
    }

    walk_file_mut(&mut Unqualify(import_path), file);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ToSource;
    use crate::parser::parse_file;

    fn references(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(path, alias)| (path.to_string(), alias.to_string()))
            .collect()
    }

    #[test]
    fn test_existing_imports_are_reused() {
        let mut file = parse_file("package app\n\nimport \"fmt\"\n\nfunc f() { fmt.Println() }\n").unwrap();
        let added = add_imports(
            &mut file,
            &references(&[("fmt", "__tapestry_fmt"), ("example.com/tracer", "__tapestry_tracer")]),
            "example.com/app",
        );
        assert_eq!(added, vec!["example.com/tracer".to_string()]);
        let source = file.to_source();
        assert!(source.contains("import (\n\t\"fmt\"\n\t__tapestry_tracer \"example.com/tracer\"\n)"), "{source}");
    }

    #[test]
    fn test_import_declaration_is_created_when_missing() {
        let mut file = parse_file("package app\n\nvar x = 1\n").unwrap();
        add_imports(&mut file, &references(&[("unsafe", "_")]), "example.com/app");
        assert!(file.to_source().starts_with("package app\n\nimport _ \"unsafe\"\n"));
    }

    #[test]
    fn test_blank_import_skipped_when_already_imported() {
        let mut file = parse_file("package app\n\nimport \"unsafe\"\n").unwrap();
        let added = add_imports(&mut file, &references(&[("unsafe", "_")]), "example.com/app");
        assert!(added.is_empty());
    }

    #[test]
    fn test_self_references_are_unqualified() {
        let mut file = parse_file("package app\n\nvar x = 1\n").unwrap();
        if let Decl::Gen(gen) = &mut file.decls[0] {
            if let Spec::Value(spec) = &mut gen.specs[0] {
                spec.values = vec![crate::ast::Expr::qualified("example.com/app", "helper")];
            }
        }
        add_imports(&mut file, &references(&[("example.com/app", "__tapestry_app")]), "example.com/app");
        unqualify(&mut file, "example.com/app");
        assert_eq!(file.to_source(), "package app\n\nvar x = helper\n");
    }
}
