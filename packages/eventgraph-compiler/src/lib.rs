/*
 * EventGraph Compiler - Analysis Configuration Compiler
 *
 * Layered architecture:
 * - config/   : Parameter values, resolvers, compile context, YAML documents
 * - pipeline/ : Producer graph, rules, shifts, validation, optimizer, driver
 * - batch     : Parallel compilation of many (era, sample) runs
 *
 * Every store is owned by one `Configuration`; nothing is process-wide.
 */

#![allow(clippy::should_implement_trait)] // from_str naming intentional
#![allow(clippy::new_without_default)] // Default impl not always needed
#![allow(clippy::type_complexity)] // Nested scope/variant maps

// ═══════════════════════════════════════════════════════════════════════════
// Module Exports
// ═══════════════════════════════════════════════════════════════════════════

/// Error types
pub mod errors;

/// Parameter store, resolvers and analysis documents
pub mod config;

/// Producer graph compilation
pub mod pipeline;

/// Parallel batch driver
pub mod batch;

pub use batch::{compile_batch, BatchResult};
pub use config::{AnalysisDocument, CompileContext, ParameterValue, SamplePredicate, ShiftSelection, Value};
pub use errors::{CompileError, ErrorKind, Result};
pub use pipeline::{
    CompileOptions, CompileReport, Configuration, ExpandedConfiguration, ModificationRule, OutputRequest,
    Producer, Shift, VariantConfig,
};
