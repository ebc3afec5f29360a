/*!
# Type expressions

A small algebra of Go type expressions as written in aspect configurations:
`*net/http.Request`, `map[string][]int`, `[32]byte`. A parsed [`Type`]
matches syntax tree expressions structurally (no type checking happens at
this layer) and can be turned back into an expression for code generation.
*/

mod parse;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

use crate::ast::{BasicLit, Expr, LitKind};
use crate::fingerprint::{Hashable, Hasher};
use crate::parser::guess_package_name;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TypeParseError {
    #[error("invalid type {input:?}: unexpected end of input")]
    UnexpectedEnd { input: String },

    #[error("invalid type {input:?}: unexpected {found:?} at offset {offset}")]
    Unexpected {
        input: String,
        offset: usize,
        found: char,
    },

    #[error("invalid type {input:?}: unexpected trailing characters {rest:?}")]
    Trailing { input: String, rest: String },

    #[error("invalid array size {literal:?}: {reason}")]
    InvalidSize { literal: String, reason: String },

    #[error("invalid type name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },
}

/// A named type, optionally qualified by the import path of its package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamedType {
    pub import_path: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PointerType {
    pub elem: Box<Type>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SliceType {
    pub elem: Box<Type>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArrayType {
    pub size: u64,
    pub elem: Box<Type>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MapType {
    pub key: Box<Type>,
    pub value: Box<Type>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Named(NamedType),
    Pointer(PointerType),
    Slice(SliceType),
    Array(ArrayType),
    Map(MapType),
}

impl NamedType {
    pub fn new(import_path: Option<&str>, name: &str) -> Self {
        Self {
            import_path: import_path.map(str::to_string),
            name: name.to_string(),
        }
    }

    /// Whether `expr` denotes this named type. Unqualified identifiers are
    /// resolved against `local`, the import path of the package the
    /// expression lives in, when known.
    pub fn matches_in(&self, expr: &Expr, local: Option<&str>) -> bool {
        match expr {
            Expr::Paren(inner) => self.matches_in(inner, local),
            // Instantiated generic types match their base type.
            Expr::Index { x, .. } => self.matches_in(x, local),
            Expr::Ident(ident) => {
                if ident.name != self.name {
                    return false;
                }
                match (&ident.path, &self.import_path) {
                    (Some(path), Some(expected)) => path == expected,
                    (None, None) => true,
                    (None, Some(expected)) => local == Some(expected.as_str()),
                    (Some(_), None) => false,
                }
            }
            // Qualifiers the parser could not resolve to an import.
            Expr::Selector { x, sel } => match (x.as_ref(), &self.import_path) {
                (Expr::Ident(pkg), Some(path)) => {
                    pkg.path.is_none()
                        && sel.name == self.name
                        && pkg.name == guess_package_name(path)
                }
                _ => false,
            },
            Expr::InterfaceType(fields) => {
                self.import_path.is_none() && self.name == "any" && fields.list.is_empty()
            }
            _ => false,
        }
    }

    pub fn matches(&self, expr: &Expr) -> bool {
        self.matches_in(expr, None)
    }

    pub fn as_node(&self) -> Expr {
        match &self.import_path {
            Some(path) => Expr::qualified(path.clone(), self.name.clone()),
            None => Expr::ident(self.name.clone()),
        }
    }
}

impl Type {
    /// Parses a type string such as `*net/http.Request` or `[0x10]byte`.
    pub fn parse(input: &str) -> Result<Self, TypeParseError> {
        parse::parse_type(input)
    }

    pub fn named(import_path: Option<&str>, name: &str) -> Self {
        Type::Named(NamedType::new(import_path, name))
    }

    pub fn pointer(elem: Type) -> Self {
        Type::Pointer(PointerType {
            elem: Box::new(elem),
        })
    }

    /// Structural match against a type expression.
    pub fn matches(&self, expr: &Expr) -> bool {
        self.matches_in(expr, None)
    }

    /// Like [`Type::matches`], with unqualified identifiers in `expr`
    /// referring to declarations of the package at `import_path`.
    pub fn matches_in_package(&self, expr: &Expr, import_path: &str) -> bool {
        self.matches_in(expr, Some(import_path))
    }

    fn matches_in(&self, expr: &Expr, local: Option<&str>) -> bool {
        let expr = expr.unparen();
        match self {
            Type::Named(named) => named.matches_in(expr, local),
            Type::Pointer(ptr) => match expr {
                Expr::Star(elem) => ptr.elem.matches_in(elem, local),
                _ => false,
            },
            Type::Slice(slice) => match expr {
                Expr::ArrayType { len: None, elt } => slice.elem.matches_in(elt, local),
                // Variadic parameters are slices inside the function.
                Expr::Ellipsis(Some(elt)) => slice.elem.matches_in(elt, local),
                _ => false,
            },
            Type::Array(array) => match expr {
                Expr::ArrayType { len: Some(len), elt } => {
                    let size = match len.unparen() {
                        Expr::BasicLit(BasicLit {
                            kind: LitKind::Int,
                            value,
                        }) => parse::parse_size(value).ok(),
                        _ => None,
                    };
                    size == Some(array.size) && array.elem.matches_in(elt, local)
                }
                _ => false,
            },
            Type::Map(map) => match expr {
                Expr::MapType { key, value } => {
                    map.key.matches_in(key, local) && map.value.matches_in(value, local)
                }
                _ => false,
            },
        }
    }

    /// Builds the expression denoting this type.
    pub fn as_node(&self) -> Expr {
        match self {
            Type::Named(named) => named.as_node(),
            Type::Pointer(ptr) => Expr::star(ptr.elem.as_node()),
            Type::Slice(slice) => Expr::ArrayType {
                len: None,
                elt: Box::new(slice.elem.as_node()),
            },
            Type::Array(array) => Expr::ArrayType {
                len: Some(Box::new(Expr::BasicLit(BasicLit::int(array.size)))),
                elt: Box::new(array.elem.as_node()),
            },
            Type::Map(map) => Expr::MapType {
                key: Box::new(map.key.as_node()),
                value: Box::new(map.value.as_node()),
            },
        }
    }

    /// Import paths referenced anywhere in the type.
    pub fn import_paths(&self) -> BTreeSet<String> {
        let mut paths = BTreeSet::new();
        self.collect_paths(&mut paths);
        paths
    }

    fn collect_paths(&self, paths: &mut BTreeSet<String>) {
        match self {
            Type::Named(named) => {
                if let Some(path) = &named.import_path {
                    paths.insert(path.clone());
                }
            }
            Type::Pointer(PointerType { elem })
            | Type::Slice(SliceType { elem })
            | Type::Array(ArrayType { elem, .. }) => elem.collect_paths(paths),
            Type::Map(map) => {
                map.key.collect_paths(paths);
                map.value.collect_paths(paths);
            }
        }
    }

    /// The named type at the bottom of any pointer indirections.
    pub fn base_named(&self) -> Option<&NamedType> {
        match self {
            Type::Named(named) => Some(named),
            Type::Pointer(ptr) => ptr.elem.base_named(),
            _ => None,
        }
    }
}

impl FromStr for Type {
    type Err = TypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Type::parse(s)
    }
}

impl fmt::Display for NamedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.import_path {
            Some(path) => write!(f, "{path}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Named(named) => fmt::Display::fmt(named, f),
            Type::Pointer(ptr) => write!(f, "*{}", ptr.elem),
            Type::Slice(slice) => write!(f, "[]{}", slice.elem),
            Type::Array(array) => write!(f, "[{}]{}", array.size, array.elem),
            Type::Map(map) => write!(f, "map[{}]{}", map.key, map.value),
        }
    }
}

impl<'de> Deserialize<'de> for Type {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Type::parse(&text).map_err(serde::de::Error::custom)
    }
}

impl Hashable for NamedType {
    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.named("named-type", &[&self.import_path, &self.name]);
    }
}

impl Hashable for Type {
    fn hash_into(&self, hasher: &mut Hasher) {
        match self {
            Type::Named(named) => named.hash_into(hasher),
            Type::Pointer(ptr) => hasher.named("pointer-type", &[&ptr.elem]),
            Type::Slice(slice) => hasher.named("slice-type", &[&slice.elem]),
            Type::Array(array) => hasher.named("array-type", &[&array.size, &array.elem]),
            Type::Map(map) => hasher.named("map-type", &[&map.key, &map.value]),
        }
    }
}

#[cfg(test)]
mod tests;
