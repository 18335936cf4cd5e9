//! Hierarchical parameter store
//!
//! Entries are keyed by (scope, name). Lookups prefer the scope's own entry
//! and fall back to `global`. Resolution is pure: it reads the store and the
//! run's era/sample, nothing else.

use super::context::{GLOBAL_SCOPE, NOMINAL};
use super::provenance::{ParameterProvenance, ParameterSource};
use super::value::{ParameterValue, ResolutionContext, Value};
use crate::errors::{CompileError, ErrorKind, Result};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use tracing::debug;

/// Flat parameter map of one scope with provenance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedParameters {
    pub values: BTreeMap<String, Value>,
    pub provenance: ParameterProvenance,
}

/// A (scope, name, era, sample) combination that fails to resolve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedCombination {
    pub scope: String,
    pub name: String,
    pub era: String,
    pub sample: String,
}

/// Parameter entries of one compilation run
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    entries: IndexMap<String, IndexMap<String, ParameterValue>>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or overwrite one entry (last writer wins)
    pub fn set(&mut self, scope: &str, name: impl Into<String>, value: impl Into<ParameterValue>) {
        let name = name.into();
        let previous = self
            .entries
            .entry(scope.to_string())
            .or_default()
            .insert(name.clone(), value.into());

        if previous.is_some() {
            debug!("parameter '{}' in scope '{}' replaced by later entry", name, scope);
        }
    }

    /// Entry stored on exactly this scope
    pub fn get(&self, scope: &str, name: &str) -> Option<&ParameterValue> {
        self.entries.get(scope).and_then(|params| params.get(name))
    }

    /// Nearest entry: the scope's own, else global
    pub fn lookup(&self, scope: &str, name: &str) -> Option<(ParameterSource, &ParameterValue)> {
        if scope != GLOBAL_SCOPE {
            if let Some(value) = self.get(scope, name) {
                return Some((ParameterSource::Scope(scope.to_string()), value));
            }
        }
        self.get(GLOBAL_SCOPE, name)
            .map(|value| (ParameterSource::Global, value))
    }

    pub fn contains(&self, scope: &str, name: &str) -> bool {
        self.lookup(scope, name).is_some()
    }

    /// Resolve one parameter for a scope
    pub fn resolve(&self, scope: &str, name: &str, ctx: &ResolutionContext<'_>) -> Result<Value> {
        let (_, value) = self
            .lookup(scope, name)
            .ok_or_else(|| CompileError::MissingParameter {
                scope: scope.to_string(),
                variant: NOMINAL.to_string(),
                name: name.to_string(),
            })?;
        value.resolve(ctx, scope, name)
    }

    /// Parameter names visible from a scope, global entries first
    pub fn names(&self, scope: &str) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for key in [GLOBAL_SCOPE, scope] {
            if let Some(params) = self.entries.get(key) {
                for name in params.keys() {
                    if !names.contains(&name.as_str()) {
                        names.push(name);
                    }
                }
            }
        }
        names
    }

    /// Resolve every parameter visible from a scope into a flat map
    pub fn resolve_scope(&self, scope: &str, ctx: &ResolutionContext<'_>) -> Result<ResolvedParameters> {
        let mut resolved = ResolvedParameters::default();
        for name in self.names(scope) {
            if let Some((source, value)) = self.lookup(scope, name) {
                resolved
                    .values
                    .insert(name.to_string(), value.resolve(ctx, scope, name)?);
                resolved.provenance.track(name, source);
            }
        }
        Ok(resolved)
    }

    /// Every combination of the given eras/samples that fails to resolve
    ///
    /// Used to check resolver totality over the declared available sets
    /// before any run is attempted.
    pub fn unresolved_combinations(
        &self,
        scopes: &[String],
        eras: &[String],
        samples: &[String],
    ) -> Vec<UnresolvedCombination> {
        let mut failures = Vec::new();
        for scope in scopes {
            for name in self.names(scope) {
                for era in eras {
                    for sample in samples {
                        let ctx = ResolutionContext::new(era, sample);
                        if let Err(err) = self.resolve(scope, name, &ctx) {
                            if err.kind() == ErrorKind::UnresolvedConditional {
                                failures.push(UnresolvedCombination {
                                    scope: scope.clone(),
                                    name: name.to_string(),
                                    era: era.clone(),
                                    sample: sample.clone(),
                                });
                            }
                        }
                    }
                }
            }
        }
        failures
    }

    /// Number of stored entries across all scopes
    pub fn len(&self) -> usize {
        self.entries.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
