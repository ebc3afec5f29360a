//! Walks a test file with a weaver recording what a join point matched.

use std::convert::Infallible;

use crate::aspect::context::{AdviceContext, AspectContext, FileContext, FileState};
use crate::ast::ToSource;
use crate::injector::walk::{walk_file, Weaver};
use crate::parser::parse_file;
use crate::InjectorConfig;

use super::{PackageTypeIndex, Point};

pub(crate) const IMPORT_PATH: &str = "example.com/app";

struct Recorder<'p> {
    point: &'p dyn Point,
    matched: Vec<String>,
}

impl Weaver for Recorder<'_> {
    type Plan = ();
    type Error = Infallible;

    fn plan(&mut self, ctx: &AspectContext<'_>) -> Option<()> {
        self.point.matches(ctx).then_some(())
    }

    fn apply(&mut self, _plan: (), ctx: &mut AdviceContext<'_>) -> Result<(), Infallible> {
        let source = match ctx.node().to_owned_node() {
            Some(node) => node.to_source(),
            None => "<file>".to_string(),
        };
        self.matched.push(source);
        Ok(())
    }
}

/// Source of every node `point` matches in `source`, in visiting order.
pub(crate) fn matched(point: &dyn Point, source: &str) -> Vec<String> {
    let config = InjectorConfig {
        import_path: IMPORT_PATH.to_string(),
        ..Default::default()
    };
    matched_with(point, source, &config)
}

pub(crate) fn matched_with(point: &dyn Point, source: &str, config: &InjectorConfig) -> Vec<String> {
    let mut file = parse_file(source).unwrap();
    let index = PackageTypeIndex::from_files(&config.import_path, [&file]);
    let ctx = FileContext {
        config,
        package_name: file.package.name.clone(),
        file_name: "test.go".to_string(),
        resolver: &index,
    };
    let mut state = FileState::new().unwrap();
    let mut recorder = Recorder {
        point,
        matched: Vec::new(),
    };
    walk_file(&mut file, &ctx, &mut state, &mut recorder).unwrap();
    recorder.matched
}
