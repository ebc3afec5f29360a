//! Declaration-level advice: struct fields, injected declarations, imports
//! and comments.

use crate::aspect::context::AdviceContext;
use crate::ast::{Expr, Field, Ident, NodeMut, Spec};
use crate::fingerprint::{Hashable, Hasher};
use crate::typed::Type;

use super::code::Template;
use super::{unsupported, Advice, AdviceError};

/// Adds a named field to a struct type declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct AddStructField {
    pub name: String,
    pub ty: Type,
}

impl AddStructField {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

impl Advice for AddStructField {
    fn apply(&self, ctx: &mut AdviceContext<'_>) -> Result<bool, AdviceError> {
        let kind = ctx.kind();
        let import_path = ctx.import_path();
        let NodeMut::Spec(Spec::Type(spec)) = ctx.node_mut() else {
            return Err(unsupported(self.kind(), kind));
        };
        let Expr::StructType(fields) = &mut spec.ty else {
            return Err(unsupported(self.kind(), kind));
        };
        if fields
            .list
            .iter()
            .any(|field| field.names.iter().any(|name| name.name == self.name))
        {
            return Ok(false);
        }
        fields
            .list
            .push(Field::new(vec![Ident::new(&self.name)], self.ty.as_node()));
        for path in self.ty.import_paths() {
            if path != import_path {
                ctx.add_reference(&path);
            }
        }
        Ok(true)
    }

    fn added_imports(&self) -> Vec<String> {
        self.ty.import_paths().into_iter().collect()
    }

    fn kind(&self) -> &'static str {
        "add-struct-field"
    }
}

impl Hashable for AddStructField {
    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.named(self.kind(), &[&self.name, &self.ty]);
    }
}

/// Adds top-level declarations to the file. Identical declarations are only
/// added once per file. `links` are packages the declarations reach through
/// `//go:linkname`; they become link-time dependencies of the file, which
/// also imports `unsafe` for the directive to be honoured.
#[derive(Debug, Clone, PartialEq)]
pub struct InjectDeclarations {
    pub template: Template,
    pub links: Vec<String>,
}

impl InjectDeclarations {
    pub fn new(template: Template) -> Self {
        Self {
            template,
            links: Vec::new(),
        }
    }

    pub fn with_links(mut self, links: Vec<String>) -> Self {
        self.links = links;
        self
    }
}

impl Advice for InjectDeclarations {
    fn apply(&self, ctx: &mut AdviceContext<'_>) -> Result<bool, AdviceError> {
        let decls = self.template.compile_declarations(ctx)?;
        let mut changed = ctx.add_declarations(decls);
        for link in &self.links {
            changed |= ctx.add_link(link);
        }
        if !self.links.is_empty() {
            changed |= ctx.add_import("unsafe", "_");
        }
        Ok(changed)
    }

    fn added_imports(&self) -> Vec<String> {
        let mut imports = self.template.added_imports();
        imports.extend(self.links.iter().cloned());
        imports
    }

    fn kind(&self) -> &'static str {
        "inject-declarations"
    }
}

impl Hashable for InjectDeclarations {
    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.named(self.kind(), &[&self.template, &self.links]);
    }
}

/// Imports a package for its side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddBlankImport(pub String);

impl Advice for AddBlankImport {
    fn apply(&self, ctx: &mut AdviceContext<'_>) -> Result<bool, AdviceError> {
        Ok(ctx.add_import(&self.0, "_"))
    }

    fn added_imports(&self) -> Vec<String> {
        vec![self.0.clone()]
    }

    fn kind(&self) -> &'static str {
        "add-blank-import"
    }
}

impl Hashable for AddBlankImport {
    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.named(self.kind(), &[&self.0]);
    }
}

/// Adds a line comment in front of a declaration, spec, field or statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddComment(pub String);

impl AddComment {
    fn line(&self) -> String {
        if self.0.starts_with("//") || self.0.starts_with("/*") {
            self.0.clone()
        } else {
            format!("// {}", self.0)
        }
    }
}

impl Advice for AddComment {
    fn apply(&self, ctx: &mut AdviceContext<'_>) -> Result<bool, AdviceError> {
        let kind = ctx.kind();
        let line = self.line();
        let mut node = ctx.node_mut();
        let Some(decs) = node.decs_mut() else {
            return Err(unsupported(self.kind(), kind));
        };
        if decs.start.contains(&line) {
            return Ok(false);
        }
        decs.start.push(line);
        Ok(true)
    }

    fn kind(&self) -> &'static str {
        "add-comment"
    }
}

impl Hashable for AddComment {
    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.named(self.kind(), &[&self.0]);
    }
}
