//! domainflow - Workflow Decomposition, Scheduling and Recomposition
//!
//! This library routes the sub-expressions of an expression tree to the
//! evaluation contexts ("domains") able to handle them, orders the resulting
//! work so producers run before consumers, drives the evaluation through a
//! caller-supplied solver and splices partial results back into the tree.
//!
//! # Architecture
//!
//! 1. **Expression Trees** (`tree` module)
//!    - Arena of nodes addressed by stable ids
//!    - Parent links kept in a side table, origins kept for detached leaves
//!
//! 2. **Domains** (`domain`, `oracle` modules)
//!    - `DomainRegistry` owned by the engine, ids are never reused
//!    - `DomainOracle` decides who owns a read or an operation
//!
//! 3. **Workflows** (`workflow` module)
//!    - `partition`: bottom-up grouping of operands into domain buckets
//!    - `wrap` / `merge`: bubbling and priority-preserving union
//!    - `optimize`: compact, connect and defer pending buckets
//!    - `each`: evaluator loop over a `Solver`
//!    - `provide`: back-substitution of resolved values
//!
//! 4. **Engine** (`engine` module)
//!    - Owns arena, registry, oracle and the queue of deferred work
//!
//! # Example
//!
//! ```rust
//! use domainflow::{Domain, DomainRegistry, Engine, EngineConfig, Hint, StaticOracle};
//! use domainflow::{SolveError, SolveOutput, Step, Workflow};
//!
//! let mut registry = DomainRegistry::new();
//! let solver_domain = registry.register(Domain::new("solver", 0));
//! let oracle = StaticOracle::new().with_variable("x", solver_domain);
//! let mut engine = Engine::with_registry(registry, oracle, EngineConfig::default());
//!
//! // (+ (get x) 1)
//! let x = engine.arena_mut().read("x");
//! let one = engine.arena_mut().literal(1);
//! let root = engine.arena_mut().composite("+", [x, one]);
//!
//! let mut workflow = engine.partition(root, Hint::default());
//! let mut solve = |_: &mut Engine, _: &mut Workflow, step: Step| {
//!     println!("bucket {} -> {:?}", step.index, step.domain);
//!     Ok::<_, SolveError>(SolveOutput::Empty)
//! };
//! engine.evaluate(&mut workflow, &mut solve).unwrap();
//! assert!(workflow.is_finished());
//! ```

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod oracle;
pub mod scenario;
pub mod tree;
pub mod workflow;

pub use config::EngineConfig;
pub use domain::{Domain, DomainId, DomainRegistry};
pub use engine::{Deferred, DeferredStatus, Engine};
pub use error::{ConfigError, SolveError, WorkflowError};
pub use oracle::{DomainOracle, StaticOracle};
pub use scenario::{Scenario, TraceSolver};
pub use tree::{ExprArena, Link, NodeId, NodeKind, Value};
pub use workflow::{
    partition, Bucket, CrossFrameLink, Hint, Solution, SolveOutput, Solver, Step, Workflow,
};
