/*!
# Aspects

An aspect pairs a join point (where) with a list of advice (what). The
injector walks every node of a file, asks each aspect's join point whether it
matches the node, and applies the advice of the matching aspects in a
deterministic order.

- `context`: node chains and the contexts handed to join points and advice
- `join`: the join point vocabulary
- `advice`: the advice vocabulary and code templates
*/

pub mod advice;
pub mod context;
pub mod join;

use std::collections::BTreeSet;
use std::fmt;

use crate::fingerprint::{Hashable, Hasher};

use advice::{Advice, OrderedAdvice};
use join::Point;

pub struct Aspect {
    pub id: String,
    pub join_point: Box<dyn Point>,
    pub advice: Vec<Box<dyn Advice>>,
    /// Allows the aspect to weave packages its own advice imports.
    pub tracer_internal: bool,
}

impl Aspect {
    pub fn new(id: impl Into<String>, join_point: Box<dyn Point>, advice: Vec<Box<dyn Advice>>) -> Self {
        Self {
            id: id.into(),
            join_point,
            advice,
            tracer_internal: false,
        }
    }

    pub fn tracer_internal(mut self, enabled: bool) -> Self {
        self.tracer_internal = enabled;
        self
    }

    /// Every import path the advice of this aspect may add to a file.
    pub fn added_imports(&self) -> BTreeSet<String> {
        self.advice
            .iter()
            .flat_map(|advice| advice.added_imports())
            .collect()
    }

    /// Packages a matching file is guaranteed to import.
    pub fn implies_imported(&self) -> Vec<String> {
        self.join_point.implies_imported()
    }

    /// Whether weaving this aspect into `import_path` would make the package
    /// import itself.
    pub fn is_self_import(&self, import_path: &str) -> bool {
        !self.tracer_internal && self.advice.iter().any(|advice| advice.imports_package(import_path))
    }

    /// The advice of this aspect tagged for sorting; `base` is the definition
    /// index of the first advice.
    pub fn ordered_advice(&self, base: usize) -> Vec<OrderedAdvice<'_>> {
        self.advice
            .iter()
            .enumerate()
            .map(|(offset, advice)| OrderedAdvice::new(&self.id, base + offset, advice.as_ref()))
            .collect()
    }
}

impl fmt::Debug for Aspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aspect")
            .field("id", &self.id)
            .field("join_point", &self.join_point)
            .field("advice", &self.advice)
            .field("tracer_internal", &self.tracer_internal)
            .finish()
    }
}

impl Hashable for Aspect {
    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.named(
            "aspect",
            &[
                &self.id,
                &self.join_point,
                &self.advice,
                &self.tracer_internal,
            ],
        );
    }
}
