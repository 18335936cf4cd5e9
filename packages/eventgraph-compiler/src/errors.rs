//! Error types for eventgraph-compiler
//!
//! Every error is fatal to the compilation run that raised it. Each variant
//! names the offending scope / variant / producer / parameter so a failing
//! run can be traced back to the declaration that caused it.

use std::fmt;
use thiserror::Error;

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingParameter,
    UnresolvedConditional,
    CyclicDependency,
    UnsatisfiedInput,
    DuplicateOutput,
    OutputNotEmitted,
    NotFinalized,
    AlreadyFinalized,
    UnknownProducerReference,
    Config,
    Violations,
    Io,
    Serialization,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MissingParameter => "missing_parameter",
            ErrorKind::UnresolvedConditional => "unresolved_conditional",
            ErrorKind::CyclicDependency => "cyclic_dependency",
            ErrorKind::UnsatisfiedInput => "unsatisfied_input",
            ErrorKind::DuplicateOutput => "duplicate_output",
            ErrorKind::OutputNotEmitted => "output_not_emitted",
            ErrorKind::NotFinalized => "not_finalized",
            ErrorKind::AlreadyFinalized => "already_finalized",
            ErrorKind::UnknownProducerReference => "unknown_producer_reference",
            ErrorKind::Config => "config",
            ErrorKind::Violations => "violations",
            ErrorKind::Io => "io",
            ErrorKind::Serialization => "serialization",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for compilation runs
#[derive(Debug, Error)]
pub enum CompileError {
    /// No entry for a parameter the run needs
    #[error("Missing parameter '{name}' in scope '{scope}' (variant '{variant}')")]
    MissingParameter {
        scope: String,
        variant: String,
        name: String,
    },

    /// A resolver has no branch for the run's era/sample and no default
    #[error("Unresolved conditional parameter '{name}' in scope '{scope}': no branch for {key} '{tag}' and no default")]
    UnresolvedConditional {
        scope: String,
        name: String,
        key: String,
        tag: String,
    },

    /// Producer dependencies form a cycle
    #[error("Cyclic dependency in scope '{scope}' (variant '{variant}'): {}", .cycle.join(" -> "))]
    CyclicDependency {
        scope: String,
        variant: String,
        cycle: Vec<String>,
    },

    /// A required quantity is neither emitted upstream nor a raw input
    #[error("Producer '{producer}' in scope '{scope}' (variant '{variant}') requires '{quantity}', which no producer emits")]
    UnsatisfiedInput {
        scope: String,
        variant: String,
        producer: String,
        quantity: String,
    },

    /// Two producers of one finalized list emit the same quantity
    #[error("Quantity '{quantity}' in scope '{scope}' (variant '{variant}') is emitted by both '{first}' and '{second}'")]
    DuplicateOutput {
        scope: String,
        variant: String,
        quantity: String,
        first: String,
        second: String,
    },

    /// A requested output is not produced in the variant
    #[error("Requested output '{quantity}' in scope '{scope}' (variant '{variant}') is not emitted by any producer")]
    OutputNotEmitted {
        scope: String,
        variant: String,
        quantity: String,
    },

    /// Terminal accessor called before the finalize steps ran
    #[error("'{operation}' called before '{required}'")]
    NotFinalized {
        operation: &'static str,
        required: &'static str,
    },

    /// Builder call after finalize started
    #[error("'{operation}' called after the configuration was finalized")]
    AlreadyFinalized { operation: &'static str },

    /// A rule or shift names a producer the scope never registered
    #[error("{referrer} references producer '{producer}', which is not registered in scope '{scope}'")]
    UnknownProducerReference {
        scope: String,
        producer: String,
        referrer: String,
    },

    /// Invalid compile context or declaration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Several validation violations at once
    #[error("{} configuration violations:\n{}", .0.len(), format_violations(.0))]
    Violations(Vec<CompileError>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn format_violations(violations: &[CompileError]) -> String {
    violations
        .iter()
        .map(|v| format!("  - {}", v))
        .collect::<Vec<_>>()
        .join("\n")
}

impl CompileError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        CompileError::Config(msg.into())
    }

    /// Collapse a violation list into a single error
    ///
    /// Returns `None` when the list is empty.
    pub fn from_violations(mut violations: Vec<CompileError>) -> Option<Self> {
        match violations.len() {
            0 => None,
            1 => violations.pop(),
            _ => Some(CompileError::Violations(violations)),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::MissingParameter { .. } => ErrorKind::MissingParameter,
            CompileError::UnresolvedConditional { .. } => ErrorKind::UnresolvedConditional,
            CompileError::CyclicDependency { .. } => ErrorKind::CyclicDependency,
            CompileError::UnsatisfiedInput { .. } => ErrorKind::UnsatisfiedInput,
            CompileError::DuplicateOutput { .. } => ErrorKind::DuplicateOutput,
            CompileError::OutputNotEmitted { .. } => ErrorKind::OutputNotEmitted,
            CompileError::NotFinalized { .. } => ErrorKind::NotFinalized,
            CompileError::AlreadyFinalized { .. } => ErrorKind::AlreadyFinalized,
            CompileError::UnknownProducerReference { .. } => ErrorKind::UnknownProducerReference,
            CompileError::Config(_) => ErrorKind::Config,
            CompileError::Violations(_) => ErrorKind::Violations,
            CompileError::Io(_) => ErrorKind::Io,
            CompileError::Yaml(_) | CompileError::Json(_) => ErrorKind::Serialization,
        }
    }

    /// Leaf errors, with aggregates flattened
    pub fn violations(&self) -> Vec<&CompileError> {
        match self {
            CompileError::Violations(inner) => inner.iter().flat_map(|v| v.violations()).collect(),
            other => vec![other],
        }
    }

    /// Whether this error (or any aggregated violation) has the given kind
    pub fn has_kind(&self, kind: ErrorKind) -> bool {
        self.violations().iter().any(|v| v.kind() == kind)
    }
}

/// Result type alias for compilation operations
pub type Result<T> = std::result::Result<T, CompileError>;
