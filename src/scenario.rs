//! Scenario files: an expression together with the domains that own its
//! variables and operations.
//!
//! ```toml
//! expression = ["==", ["get", "x"], ["+", ["get", "#box", "width"], 1]]
//!
//! [[domains]]
//! name = "solver"
//! priority = -1
//! maybe = true
//!
//! [[domains]]
//! name = "layout"
//! url = "https://example.org/layout"
//!
//! [variables]
//! x = "solver"
//! "#box[width]" = "layout"
//!
//! [operations]
//! call = "layout"
//! ```
//!
//! `expression` is a nested array whose first element is the tag. A list
//! tagged with the configured read tag is a read: one string names the
//! property, two strings name scope and property. Strings, numbers and
//! booleans anywhere else are literals. Being a top-level key,
//! `expression` must precede every table. Optional `[engine]` and
//! `[logging]` sections follow the engine configuration format.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Deserialize;

use crate::config::{EngineConfig, EngineSection, LoggingSection};
use crate::domain::{Domain, DomainId, DomainRegistry};
use crate::engine::Engine;
use crate::error::{ConfigError, SolveError};
use crate::oracle::StaticOracle;
use crate::tree::{ExprArena, NodeId, NodeKind, Value};
use crate::workflow::{SolveOutput, Solver, Step, Workflow};

/// Expression term as written in a scenario
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Term {
    Bool(bool),
    Long(i64),
    Float(f64),
    Text(String),
    List(Vec<Term>),
}

/// A `[[domains]]` entry
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DomainSpec {
    /// Display name
    pub name: String,
    /// Key used by `[variables]` and `[operations]`; defaults to `name`
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub maybe: bool,
    #[serde(default)]
    pub frame: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub loaded: bool,
}

impl DomainSpec {
    pub fn key(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }

    fn to_domain(&self) -> Domain {
        let mut domain = Domain::new(self.name.clone(), self.priority);
        domain.maybe = self.maybe;
        domain.frame = self.frame.clone();
        domain.url = self.url.clone();
        domain.loaded = self.loaded;
        domain
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Scenario {
    pub expression: Term,
    #[serde(default)]
    pub domains: Vec<DomainSpec>,
    /// Canonical variable path -> domain key
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    /// Operation tag -> domain key
    #[serde(default)]
    pub operations: BTreeMap<String, String>,
    /// Domain key for reads without a `[variables]` entry
    #[serde(default)]
    pub fallback: Option<String>,
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// A scenario turned into a ready engine
pub struct Loaded {
    pub engine: Engine,
    pub root: NodeId,
    /// Domain key -> handle
    pub domains: BTreeMap<String, DomainId>,
}

impl Scenario {
    /// Load a scenario from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse a scenario from TOML content.
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let scenario: Scenario = toml::from_str(content)?;
        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut keys = HashSet::new();
        for spec in &self.domains {
            if !keys.insert(spec.key()) {
                return Err(ConfigError::Invalid(format!(
                    "domain {:?} is declared twice",
                    spec.key()
                )));
            }
        }
        let references = self
            .variables
            .values()
            .chain(self.operations.values())
            .chain(self.fallback.iter());
        for key in references {
            if !keys.contains(key.as_str()) {
                return Err(ConfigError::Invalid(format!("unknown domain {:?}", key)));
            }
        }
        self.config().validate_sections()
    }

    /// Engine configuration carried by the scenario
    pub fn config(&self) -> EngineConfig {
        EngineConfig {
            engine: self.engine.clone(),
            logging: self.logging.clone(),
        }
    }

    /// Build the registry, the oracle and the expression tree, using the
    /// scenario's own configuration.
    pub fn build(&self) -> Result<Loaded, ConfigError> {
        self.build_with(self.config())
    }

    /// Like [`build`](Self::build), with configuration from elsewhere
    pub fn build_with(&self, config: EngineConfig) -> Result<Loaded, ConfigError> {
        let mut registry = DomainRegistry::new();
        let domains: BTreeMap<String, DomainId> = self
            .domains
            .iter()
            .map(|spec| (spec.key().to_string(), registry.register(spec.to_domain())))
            .collect();

        let lookup = |key: &String| {
            domains
                .get(key)
                .copied()
                .ok_or_else(|| ConfigError::Invalid(format!("unknown domain {:?}", key)))
        };
        let mut oracle = StaticOracle::new();
        for (path, key) in &self.variables {
            oracle = oracle.with_variable(path.clone(), lookup(key)?);
        }
        for (tag, key) in &self.operations {
            oracle = oracle.with_operation(tag.clone(), lookup(key)?);
        }
        if let Some(key) = &self.fallback {
            oracle = oracle.with_fallback(lookup(key)?);
        }

        let mut arena = ExprArena::new();
        let root = build_term(&mut arena, &self.expression, &config.engine.read_tag)?;
        let engine = Engine::with_registry(registry, oracle, config).with_arena(arena);

        Ok(Loaded {
            engine,
            root,
            domains,
        })
    }
}

fn build_term(arena: &mut ExprArena, term: &Term, read_tag: &str) -> Result<NodeId, ConfigError> {
    let list = match term {
        Term::Bool(b) => return Ok(arena.literal(*b)),
        Term::Long(n) => return Ok(arena.literal(*n)),
        Term::Float(x) => return Ok(arena.literal(*x)),
        Term::Text(s) => return Ok(arena.literal(s.as_str())),
        Term::List(list) => list,
    };

    let tag = match list.first() {
        Some(Term::Text(tag)) => tag,
        Some(other) => {
            return Err(ConfigError::Invalid(format!(
                "expression tag must be a string, found {:?}",
                other
            )))
        }
        None => return Err(ConfigError::Invalid("empty expression".to_string())),
    };

    if tag == read_tag {
        return match &list[1..] {
            [Term::Text(property)] => Ok(arena.read(property.as_str())),
            [Term::Text(scope), Term::Text(property)] => {
                Ok(arena.scoped_read(scope.as_str(), property.as_str()))
            }
            _ => Err(ConfigError::Invalid(format!(
                "{:?} takes a property or a scope and a property",
                read_tag
            ))),
        };
    }

    let operands = list[1..]
        .iter()
        .map(|t| build_term(arena, t, read_tag))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(arena.composite(tag.as_str(), operands))
}

/// Solver used by the CLI: binds every read it is handed to the label of
/// the domain that solved it, and keeps a line per bucket.
#[derive(Debug, Default)]
pub struct TraceSolver {
    pub log: Vec<String>,
}

impl TraceSolver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Solver for TraceSolver {
    fn solve(
        &mut self,
        engine: &mut Engine,
        _workflow: &mut Workflow,
        step: Step,
    ) -> Result<SolveOutput, SolveError> {
        let arena = engine.arena();
        let registry = engine.registry();
        let oracle = engine.oracle();
        let label = registry.label(step.domain);

        let mut bindings = BTreeMap::new();
        for &problem in &step.bucket {
            for leaf in arena.leaves(problem) {
                if !matches!(arena.get(leaf).kind, NodeKind::Read { .. }) {
                    continue;
                }
                let owner = arena.header(leaf).domain;
                if owner.is_none() || owner == step.domain || registry.same_name(owner, step.domain) {
                    bindings.insert(oracle.canonical_path(arena, leaf), Value::from(label.as_str()));
                }
            }
        }

        self.log.push(format!(
            "{} {}: {}",
            step.index,
            label,
            step.bucket.iter().map(|&p| arena.render(p)).collect::<Vec<_>>().join(" ")
        ));

        if bindings.is_empty() {
            Ok(SolveOutput::Empty)
        } else {
            Ok(SolveOutput::Bindings(bindings))
        }
    }
}
