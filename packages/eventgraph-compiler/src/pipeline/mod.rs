//! Graph compilation pipeline
//!
//! Leaf-first:
//! - `producer`: producer declarations, output requests, raw input schema
//! - `graph`: producer arena, per-scope sequences, dependency ordering
//! - `rules`: sample-dependent append/remove/replace rewrite log
//! - `shifts`: systematic variants
//! - `validator`: referential integrity over every (scope, variant)
//! - `optimizer`: shared-prefix split points
//! - `artifact`: the expanded configuration
//! - `report`: diagnostic summary
//! - `compiler`: the driver tying the phases together

pub mod artifact;
pub mod compiler;
pub mod graph;
pub mod optimizer;
pub mod producer;
pub mod report;
pub mod rules;
pub mod shifts;
pub mod validator;

pub use artifact::{ExpandedConfiguration, PlanBranch, ScopePlan, VariantConfig, VariantDraft};
pub use compiler::{CompileOptions, CompilePhase, Configuration};
pub use graph::{DependencyGraph, ProducerGraph, ProducerRegistry};
pub use optimizer::Optimizer;
pub use producer::{InputSchema, OutputRequest, Producer};
pub use report::{CompileReport, ScopeSummary};
pub use rules::{ModificationRule, RuleAction, RuleEngine, RuleOutcome};
pub use shifts::{Scoped, Shift, ShiftExpander, ShiftOverride};
pub use validator::{ValidationReport, Validator};
