/// Test utilities for domainflow integration tests
///
/// This module provides shared helpers, including:
/// - Loading scenario fixtures from `tests/scenarios`
/// - A solver that records every step it is handed
/// - Leaf-order helpers for order-preservation checks
use domainflow::scenario::Loaded;
use domainflow::{Engine, NodeId, Scenario, SolveError, SolveOutput, Solver, Step, Workflow};
use itertools::Itertools;
use std::path::PathBuf;

/// Path of a fixture under `tests/scenarios`
pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("scenarios")
        .join(name)
}

/// Parse and build a scenario given inline
pub fn load(toml: &str) -> Loaded {
    Scenario::parse_toml(toml)
        .expect("scenario should parse")
        .build()
        .expect("scenario should build")
}

/// Parse and build a fixture scenario
pub fn load_fixture(name: &str) -> Loaded {
    Scenario::load(&fixture(name))
        .expect("fixture should parse")
        .build()
        .expect("fixture should build")
}

/// Solver that records each step and reports nothing
#[derive(Debug, Default)]
pub struct Recorder {
    pub steps: Vec<Step>,
    pub rendered: Vec<String>,
}

impl Solver for Recorder {
    fn solve(
        &mut self,
        engine: &mut Engine,
        _workflow: &mut Workflow,
        step: Step,
    ) -> Result<SolveOutput, SolveError> {
        self.rendered.push(
            step.bucket
                .iter()
                .map(|&p| engine.arena().render(p))
                .join(" "),
        );
        self.steps.push(step);
        Ok(SolveOutput::Empty)
    }
}

/// Leaves of the tree under `root`, first occurrence only
pub fn tree_leaves(engine: &Engine, root: NodeId) -> Vec<NodeId> {
    engine.arena().leaves(root).into_iter().unique().collect()
}
