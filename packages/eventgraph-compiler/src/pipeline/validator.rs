//! Referential integrity checks
//!
//! Re-runs ordering and reachability over every (scope, variant) draft and
//! collects violations instead of stopping at the first one.

use super::artifact::VariantDraft;
use super::graph::{DependencyGraph, ProducerRegistry};
use super::producer::InputSchema;
use crate::errors::{CompileError, Result};
use indexmap::IndexMap;

/// Violations found in one validation pass
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub violations: Vec<CompileError>,
    /// Number of (scope, variant) pairs checked
    pub checked: usize,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }

    /// `Ok` when clean, otherwise the violation (or the aggregate of all)
    pub fn into_result(self) -> Result<()> {
        match CompileError::from_violations(self.violations) {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }
}

pub struct Validator<'a> {
    registry: &'a ProducerRegistry,
    schema: &'a InputSchema,
}

impl<'a> Validator<'a> {
    pub fn new(registry: &'a ProducerRegistry, schema: &'a InputSchema) -> Self {
        Self { registry, schema }
    }

    /// Check every variant of every scope
    pub fn validate(
        &self,
        scopes: &IndexMap<String, IndexMap<String, VariantDraft>>,
    ) -> Result<ValidationReport> {
        let mut report = ValidationReport::default();
        for (scope, variants) in scopes {
            for (variant, draft) in variants {
                report
                    .violations
                    .extend(self.validate_variant(scope, variant, draft)?);
                report.checked += 1;
            }
        }
        Ok(report)
    }

    /// Violations of one (scope, variant)
    ///
    /// Errors only when a unit has no declaration, which means the draft
    /// did not come from this run's registry.
    pub fn validate_variant(
        &self,
        scope: &str,
        variant: &str,
        draft: &VariantDraft,
    ) -> Result<Vec<CompileError>> {
        let graph = DependencyGraph::build(&draft.units, self.registry, self.schema, &draft.renames)?;
        let mut violations = graph.violations(scope, variant);

        for (from, to) in &draft.renames {
            let available = graph.emits(to) || self.schema.contains(to);
            let reported = violations.iter().any(|v| {
                matches!(v, CompileError::UnsatisfiedInput { quantity, .. } if quantity == to)
            });
            if !available && !reported {
                violations.push(CompileError::UnsatisfiedInput {
                    scope: scope.to_string(),
                    variant: variant.to_string(),
                    producer: format!("<rename of '{}'>", from),
                    quantity: to.clone(),
                });
            }
        }

        for quantity in &draft.outputs {
            if !graph.emits(quantity) && !self.schema.contains(quantity) {
                violations.push(CompileError::OutputNotEmitted {
                    scope: scope.to_string(),
                    variant: variant.to_string(),
                    quantity: quantity.clone(),
                });
            }
        }

        Ok(violations)
    }
}
