//! Best-effort interface satisfaction.
//!
//! The engine does no type checking. [`TypeResolver`] is the seam where a
//! real type checker can be plugged in; [`PackageTypeIndex`] is the default,
//! which only knows the method names declared in the package being woven
//! and a table of well-known standard library interfaces.

use std::collections::{BTreeSet, HashMap};

use crate::ast::{Decl, Expr, File, Spec};
use crate::typed::{NamedType, Type};

/// Answers whether the type denoted by `expr` implements `iface`.
pub trait TypeResolver: Send + Sync {
    /// `import_path` is the package `expr` appears in. `None` when the
    /// answer cannot be determined.
    fn implements(&self, expr: &Expr, iface: &Type, import_path: &str) -> Option<bool>;
}

/// A resolver that never knows.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoResolver;

impl TypeResolver for NoResolver {
    fn implements(&self, _expr: &Expr, _iface: &Type, _import_path: &str) -> Option<bool> {
        None
    }
}

/// Methods of interfaces from the standard library.
fn well_known(path: &str, name: &str) -> Option<&'static [&'static str]> {
    Some(match (path, name) {
        ("", "error") => &["Error"],
        ("fmt", "Stringer") => &["String"],
        ("io", "Reader") => &["Read"],
        ("io", "Writer") => &["Write"],
        ("io", "Closer") => &["Close"],
        ("io", "ReadCloser") => &["Close", "Read"],
        ("io", "WriteCloser") => &["Close", "Write"],
        ("io", "ReadWriter") => &["Read", "Write"],
        ("io", "ReadWriteCloser") => &["Close", "Read", "Write"],
        ("context", "Context") => &["Deadline", "Done", "Err", "Value"],
        ("net/http", "Handler") => &["ServeHTTP"],
        ("net/http", "ResponseWriter") => &["Header", "Write", "WriteHeader"],
        ("net/http", "RoundTripper") => &["RoundTrip"],
        ("database/sql/driver", "Valuer") => &["Value"],
        _ => return None,
    })
}

#[derive(Debug, Default, Clone)]
struct MethodSet {
    /// Methods with value receivers.
    value: BTreeSet<String>,
    /// Methods with pointer receivers.
    pointer: BTreeSet<String>,
}

#[derive(Debug, Default, Clone)]
struct InterfaceDecl {
    methods: BTreeSet<String>,
    embedded: Vec<Expr>,
}

/// Method sets and interfaces declared by the files of one package.
#[derive(Debug, Default, Clone)]
pub struct PackageTypeIndex {
    import_path: String,
    types: BTreeSet<String>,
    methods: HashMap<String, MethodSet>,
    interfaces: HashMap<String, InterfaceDecl>,
}

impl PackageTypeIndex {
    pub fn new(import_path: impl Into<String>) -> Self {
        Self {
            import_path: import_path.into(),
            ..Default::default()
        }
    }

    pub fn from_files<'f>(import_path: &str, files: impl IntoIterator<Item = &'f File>) -> Self {
        let mut index = Self::new(import_path);
        for file in files {
            index.add_file(file);
        }
        index
    }

    pub fn add_file(&mut self, file: &File) {
        for decl in &file.decls {
            match decl {
                Decl::Func(func) => {
                    let Some(recv) = func.recv.as_ref().and_then(|recv| recv.list.first()) else {
                        continue;
                    };
                    let (pointer, base) = match recv.ty.unparen() {
                        Expr::Star(inner) => (true, inner.as_ref()),
                        other => (false, other),
                    };
                    let Some(type_name) = local_name(base) else {
                        continue;
                    };
                    let set = self.methods.entry(type_name.to_string()).or_default();
                    set.pointer.insert(func.name.name.clone());
                    if !pointer {
                        set.value.insert(func.name.name.clone());
                    }
                }
                Decl::Gen(gen) => {
                    for spec in &gen.specs {
                        let Spec::Type(spec) = spec else {
                            continue;
                        };
                        self.types.insert(spec.name.name.clone());
                        if let Expr::InterfaceType(fields) = &spec.ty {
                            let mut iface = InterfaceDecl::default();
                            for field in &fields.list {
                                if field.names.is_empty() {
                                    iface.embedded.push(field.ty.clone());
                                } else {
                                    iface
                                        .methods
                                        .extend(field.names.iter().map(|name| name.name.clone()));
                                }
                            }
                            self.interfaces.insert(spec.name.name.clone(), iface);
                        }
                    }
                }
            }
        }
    }

    fn is_local(&self, named: &NamedType) -> bool {
        named.import_path.as_deref() == Some(self.import_path.as_str())
    }

    /// Methods an interface requires, when it is known.
    fn required(&self, named: &NamedType, depth: usize) -> Option<BTreeSet<String>> {
        if self.is_local(named) || (named.import_path.is_none() && self.interfaces.contains_key(&named.name)) {
            let iface = self.interfaces.get(&named.name)?;
            let mut methods = iface.methods.clone();
            for embedded in &iface.embedded {
                methods.extend(self.interface_methods(embedded, depth + 1)?);
            }
            return Some(methods);
        }
        let path = named.import_path.as_deref().unwrap_or("");
        if path.is_empty() && named.name == "any" {
            return Some(BTreeSet::new());
        }
        well_known(path, &named.name).map(|methods| methods.iter().map(|m| m.to_string()).collect())
    }

    /// Methods of an interface type expression.
    fn interface_methods(&self, expr: &Expr, depth: usize) -> Option<BTreeSet<String>> {
        if depth > 8 {
            return None;
        }
        match expr.unparen() {
            Expr::Ident(ident) => {
                let named = match &ident.path {
                    Some(path) => NamedType::new(Some(path), &ident.name),
                    None if self.interfaces.contains_key(&ident.name) => {
                        NamedType::new(Some(&self.import_path), &ident.name)
                    }
                    None => NamedType::new(None, &ident.name),
                };
                self.required(&named, depth)
            }
            Expr::InterfaceType(fields) if fields.list.iter().all(|f| !f.names.is_empty()) => Some(
                fields
                    .list
                    .iter()
                    .flat_map(|f| f.names.iter().map(|n| n.name.clone()))
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Methods provided by the type `expr` denotes.
    fn provided(&self, expr: &Expr) -> Option<BTreeSet<String>> {
        match expr.unparen() {
            Expr::Star(inner) => {
                let name = local_name(inner)?;
                if !self.types.contains(name) {
                    return None;
                }
                Some(self.methods.get(name).map(|set| set.pointer.clone()).unwrap_or_default())
            }
            other => {
                if let Some(name) = local_name(other) {
                    if self.types.contains(name) {
                        if self.interfaces.contains_key(name) {
                            return self.interface_methods(other, 0);
                        }
                        return Some(
                            self.methods.get(name).map(|set| set.value.clone()).unwrap_or_default(),
                        );
                    }
                }
                // Results declared with an interface type provide its methods.
                self.interface_methods(other, 0)
            }
        }
    }
}

/// Name of a type declared in the current package, looking through generic
/// instantiations.
fn local_name(expr: &Expr) -> Option<&str> {
    match expr.unparen() {
        Expr::Ident(ident) if ident.path.is_none() => Some(&ident.name),
        Expr::Index { x, .. } => local_name(x),
        _ => None,
    }
}

impl TypeResolver for PackageTypeIndex {
    fn implements(&self, expr: &Expr, iface: &Type, _import_path: &str) -> Option<bool> {
        let Type::Named(named) = iface else {
            return Some(false);
        };
        let required = self.required(named, 0)?;
        if required.is_empty() {
            return Some(true);
        }
        let provided = self.provided(expr)?;
        Some(required.is_subset(&provided))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_file;

    const SOURCE: &str = r#"package app

import "io"

type Named interface {
	Name() string
}

type Labeled interface {
	Named
	Label() string
}

type Thing struct{}

func (Thing) Name() string { return "thing" }

func (t *Thing) Label() string { return "label" }

func (t *Thing) Error() string { return "failed" }

type Body struct{}

func (b *Body) Read(p []byte) (int, error) { return 0, nil }

func (b *Body) Close() error { return nil }

func open() io.ReadCloser { return nil }
"#;

    fn index() -> PackageTypeIndex {
        let file = parse_file(SOURCE).unwrap();
        PackageTypeIndex::from_files("example.com/app", [&file])
    }

    fn ty(s: &str) -> Type {
        Type::parse(s).unwrap()
    }

    #[test]
    fn test_value_and_pointer_method_sets() {
        let index = index();
        let thing = Expr::ident("Thing");
        let thing_ptr = Expr::star(Expr::ident("Thing"));

        let named = ty("example.com/app.Named");
        let labeled = ty("example.com/app.Labeled");
        assert_eq!(index.implements(&thing, &named, "example.com/app"), Some(true));
        assert_eq!(index.implements(&thing, &labeled, "example.com/app"), Some(false));
        assert_eq!(index.implements(&thing_ptr, &labeled, "example.com/app"), Some(true));

        assert_eq!(index.implements(&thing, &ty("error"), "example.com/app"), Some(false));
        assert_eq!(index.implements(&thing_ptr, &ty("error"), "example.com/app"), Some(true));
    }

    #[test]
    fn test_well_known_interfaces() {
        let index = index();
        let body = Expr::star(Expr::ident("Body"));
        assert_eq!(index.implements(&body, &ty("io.ReadCloser"), "example.com/app"), Some(true));
        assert_eq!(index.implements(&body, &ty("io.Writer"), "example.com/app"), Some(false));
        assert_eq!(index.implements(&body, &ty("any"), "example.com/app"), Some(true));

        let read_closer = Expr::qualified("io", "ReadCloser");
        assert_eq!(index.implements(&read_closer, &ty("io.Reader"), "example.com/app"), Some(true));
    }

    #[test]
    fn test_unknown_types_are_undecided() {
        let index = index();
        let foreign = Expr::qualified("example.com/other", "Client");
        assert_eq!(index.implements(&foreign, &ty("io.Reader"), "example.com/app"), None);
        assert_eq!(
            index.implements(&Expr::ident("Thing"), &ty("example.com/other.Iface"), "example.com/app"),
            None
        );
        assert_eq!(NoResolver.implements(&Expr::ident("x"), &ty("error"), "p"), None);
    }
}
