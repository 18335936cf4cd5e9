//! Configuration layer
//!
//! Everything a compilation run needs before any graph work happens:
//! - `value`: literal parameter values and era/sample resolvers
//! - `context`: the run's era, sample, scopes and shift selection
//! - `parameter_store`: (scope, name) entries with global fallback
//! - `provenance`: where each resolved value came from
//! - `io`: the versioned YAML analysis document
//!
//! # Examples
//!
//! ```rust,ignore
//! use eventgraph_compiler::config::{AnalysisDocument, CompileContext};
//!
//! let doc = AnalysisDocument::from_yaml_file("analysis.yaml")?;
//! let ctx = CompileContext::new("2018", "dy", ["mm", "ee"]);
//! let artifact = doc.compile(ctx, Default::default())?;
//! ```

pub mod context;
pub mod io;
pub mod parameter_store;
pub mod provenance;
pub mod value;

// Re-exports
pub use context::{CompileContext, IntoScopes, SamplePredicate, ShiftSelection, GLOBAL_SCOPE, NOMINAL};
pub use io::AnalysisDocument;
pub use parameter_store::{ParameterStore, ResolvedParameters, UnresolvedCombination};
pub use provenance::{ParameterProvenance, ParameterSource};
pub use value::{ConditionKey, ConditionalValue, ParameterValue, ResolutionContext, Value};
