//! Evaluator loop.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use super::{Solution, Workflow};
use crate::domain::DomainId;
use crate::engine::Engine;
use crate::error::{SolveError, WorkflowError};
use crate::tree::{NodeId, Value};

/// One bucket handed to a [`Solver`]
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub domain: Option<DomainId>,
    pub bucket: Vec<NodeId>,
    /// Position of the bucket; also the workflow's cursor while solving
    pub index: usize,
}

/// Result of solving one bucket
#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutput {
    /// Key/value results, folded into the workflow's solution
    Bindings(BTreeMap<String, Value>),
    /// A raw value, used as the solution when no bucket produced bindings
    Value(Value),
    /// Nothing to report
    Empty,
}

/// Per-domain solving, supplied by the caller.
///
/// The solver receives the engine and the running workflow, so it can
/// [`request`](Workflow::request) nested expressions or
/// [`provide`](Workflow::provide) values back while a pass is in progress.
pub trait Solver {
    fn solve(
        &mut self,
        engine: &mut Engine,
        workflow: &mut Workflow,
        step: Step,
    ) -> Result<SolveOutput, SolveError>;
}

impl<F> Solver for F
where
    F: FnMut(&mut Engine, &mut Workflow, Step) -> Result<SolveOutput, SolveError>,
{
    fn solve(
        &mut self,
        engine: &mut Engine,
        workflow: &mut Workflow,
        step: Step,
    ) -> Result<SolveOutput, SolveError> {
        self(engine, workflow, step)
    }
}

impl Workflow {
    /// Evaluate every pending bucket in order.
    ///
    /// Runs `optimize` once, then hands each bucket to `solver`. Bindings
    /// are folded into the solution (last write wins); without any
    /// bindings the raw value of the last bucket becomes the solution. A
    /// value returned by an earlier bucket is not carried over. With nothing
    /// pending the current solution is returned unchanged.
    ///
    /// On a solver error the cursor is left before the failing bucket, so
    /// a later call retries it.
    pub fn each(
        &mut self,
        engine: &mut Engine,
        solver: &mut dyn Solver,
    ) -> Result<Option<Solution>, WorkflowError> {
        if self.is_finished() {
            return Ok(self.solution.clone());
        }
        self.optimize(engine);

        let mut bindings = match &self.solution {
            Some(Solution::Bindings(map)) => Some(map.clone()),
            _ => None,
        };
        let mut raw = None;

        while self.evaluated < self.buckets.len() {
            let index = self.evaluated;
            self.evaluated += 1;
            let bucket = &self.buckets[index];
            let step = Step {
                domain: bucket.domain,
                bucket: bucket.problems.clone(),
                index,
            };
            let label = engine.registry.label(step.domain);
            debug!(index, domain = %label, problems = step.bucket.len(), "solving bucket");

            let output = match solver.solve(engine, self, step) {
                Ok(output) => output,
                Err(source) => {
                    self.evaluated = index;
                    if let Some(partial) = bindings {
                        self.solution = Some(Solution::Bindings(partial));
                    }
                    return Err(WorkflowError::Solve {
                        index,
                        domain: label,
                        source,
                    });
                }
            };
            trace!(index, ?output, "solved");

            match &output {
                SolveOutput::Bindings(map) => bindings
                    .get_or_insert_with(BTreeMap::new)
                    .extend(map.iter().map(|(k, v)| (k.clone(), v.clone()))),
                SolveOutput::Value(value) => raw = Some(value.clone()),
                SolveOutput::Empty => raw = None,
            }
            if self.solutions.len() <= index {
                self.solutions.resize(index + 1, None);
            }
            self.solutions[index] = Some(output);
        }

        let solution = bindings
            .map(Solution::Bindings)
            .or(raw.map(Solution::Value))
            .or_else(|| self.solution.take());
        self.solution = solution.clone();
        Ok(solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::domain::{Domain, DomainRegistry};
    use crate::oracle::StaticOracle;
    use crate::workflow::{Bucket, Hint};

    fn engine(registry: DomainRegistry, oracle: StaticOracle) -> Engine {
        Engine::with_registry(registry, oracle, EngineConfig::default())
    }

    fn bind(key: &str, value: i64) -> SolveOutput {
        let mut map = BTreeMap::new();
        map.insert(key.to_string(), Value::Long(value));
        SolveOutput::Bindings(map)
    }

    fn two_buckets() -> (Engine, Workflow) {
        let mut registry = DomainRegistry::new();
        let a = registry.register(Domain::new("a", 0));
        let b = registry.register(Domain::new("b", 1));
        let mut engine = engine(registry, StaticOracle::new());
        let x = engine.arena_mut().read("x");
        let y = engine.arena_mut().read("y");
        let wf = Workflow::from_buckets(vec![
            Bucket::new(Some(a), vec![x]),
            Bucket::new(Some(b), vec![y]),
        ]);
        (engine, wf)
    }

    #[test]
    fn test_each_folds_bindings_last_write_wins() {
        let (mut engine, mut wf) = two_buckets();
        let mut solver = |_: &mut Engine, _: &mut Workflow, step: Step| {
            let mut map = BTreeMap::new();
            map.insert("shared".to_string(), Value::Long(step.index as i64));
            map.insert(format!("b{}", step.index), Value::Bool(true));
            Ok::<_, SolveError>(SolveOutput::Bindings(map))
        };
        let solution = wf.each(&mut engine, &mut solver).unwrap().unwrap();

        assert_eq!(solution.get("shared"), Some(&Value::Long(1)));
        assert_eq!(solution.get("b0"), Some(&Value::Bool(true)));
        assert_eq!(wf.cursor(), Some(1));
        assert_eq!(wf.solutions().len(), 2);
    }

    #[test]
    fn test_bindings_take_precedence_over_values() {
        let (mut engine, mut wf) = two_buckets();
        let mut solver = |_: &mut Engine, _: &mut Workflow, step: Step| {
            Ok::<_, SolveError>(if step.index == 0 {
                bind("x", 1)
            } else {
                SolveOutput::Value(Value::Long(9))
            })
        };
        let solution = wf.each(&mut engine, &mut solver).unwrap().unwrap();
        assert_eq!(solution.get("x"), Some(&Value::Long(1)));
    }

    #[test]
    fn test_raw_value_without_bindings() {
        let (mut engine, mut wf) = two_buckets();
        let mut solver = |_: &mut Engine, _: &mut Workflow, step: Step| {
            Ok::<_, SolveError>(SolveOutput::Value(Value::Long(step.index as i64)))
        };
        let solution = wf.each(&mut engine, &mut solver).unwrap();
        assert_eq!(solution, Some(Solution::Value(Value::Long(1))));
    }

    #[test]
    fn test_raw_value_comes_from_last_bucket() {
        let (mut engine, mut wf) = two_buckets();
        let mut solver = |_: &mut Engine, _: &mut Workflow, step: Step| {
            Ok::<_, SolveError>(if step.index == 0 {
                SolveOutput::Value(Value::Long(7))
            } else {
                SolveOutput::Empty
            })
        };
        let solution = wf.each(&mut engine, &mut solver).unwrap();
        assert_eq!(solution, None);
        assert_eq!(wf.solutions()[0], Some(SolveOutput::Value(Value::Long(7))));
    }

    #[test]
    fn test_each_with_nothing_pending_returns_cached_solution() {
        let (mut engine, mut wf) = two_buckets();
        let mut calls = 0;
        let mut solver = |_: &mut Engine, _: &mut Workflow, _: Step| {
            calls += 1;
            Ok::<_, SolveError>(bind("x", 1))
        };
        let first = wf.each(&mut engine, &mut solver).unwrap();
        let second = wf.each(&mut engine, &mut solver).unwrap();
        let mut empty = Workflow::new();
        assert_eq!(empty.each(&mut engine, &mut solver).unwrap(), None);

        assert_eq!(first, second);
        assert_eq!(calls, 2, "second pass solves nothing");
    }

    #[test]
    fn test_solver_error_rolls_back_cursor() {
        let (mut engine, mut wf) = two_buckets();
        let mut fail = true;
        let mut solver = |_: &mut Engine, _: &mut Workflow, step: Step| {
            if step.index == 1 && fail {
                fail = false;
                return Err(SolveError::failed("not ready"));
            }
            Ok(bind("x", step.index as i64))
        };

        let err = wf.each(&mut engine, &mut solver).unwrap_err();
        match err {
            WorkflowError::Solve { index, domain, .. } => {
                assert_eq!(index, 1);
                assert_eq!(domain, "b");
            }
        }
        assert_eq!(wf.cursor(), Some(0));

        let solution = wf.each(&mut engine, &mut solver).unwrap().unwrap();
        assert_eq!(solution.get("x"), Some(&Value::Long(1)));
    }

    #[test]
    fn test_solver_can_request_nested_work() {
        let mut registry = DomainRegistry::new();
        let a = registry.register(Domain::new("a", 0));
        let b = registry.register(Domain::new("b", 1));
        let oracle = StaticOracle::new().with_variable("x", a).with_variable("y", b);
        let mut engine = engine(registry, oracle);
        let x = engine.arena_mut().read("x");
        let y = engine.arena_mut().read("y");

        let mut wf = engine.partition(x, Hint::default());
        let mut seen = Vec::new();
        let mut solver = |engine: &mut Engine, workflow: &mut Workflow, step: Step| {
            seen.push(step.domain);
            if step.index == 0 {
                workflow.request(engine, y, Hint::default());
            }
            Ok::<_, SolveError>(SolveOutput::Empty)
        };
        wf.each(&mut engine, &mut solver).unwrap();
        assert_eq!(seen, vec![Some(a), Some(b)]);
    }
}
