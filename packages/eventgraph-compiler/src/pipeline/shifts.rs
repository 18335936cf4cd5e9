//! Systematic shifts
//!
//! A shift is a named variation of the nominal configuration. It may carry
//! parameter deltas, producer replacements and quantity renames, each keyed
//! by the scopes it applies to. Every applicable shift yields exactly one
//! extra variant per targeted scope; shifts never compose and never touch
//! the nominal entries they start from.

use super::producer::Producer;
use super::rules::replace_producer;
use crate::config::context::{IntoScopes, SamplePredicate, ShiftSelection, GLOBAL_SCOPE, NOMINAL};
use crate::config::parameter_store::ResolvedParameters;
use crate::config::provenance::ParameterSource;
use crate::config::value::{ParameterValue, ResolutionContext};
use crate::errors::{CompileError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// A value registered for a set of scopes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scoped<T> {
    pub scopes: Vec<String>,
    pub value: T,
}

impl<T> Scoped<T> {
    /// Whether the entry applies to `scope` (entries on `global` apply everywhere)
    pub fn applies_to(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope || s == GLOBAL_SCOPE)
    }
}

/// Named systematic variation
#[derive(Debug, Clone, PartialEq)]
pub struct Shift {
    pub name: String,
    pub samples: SamplePredicate,
    pub parameter_deltas: Vec<Scoped<IndexMap<String, ParameterValue>>>,
    pub producer_replacements: Vec<Scoped<Vec<(String, Producer)>>>,
    pub quantity_renames: Vec<Scoped<Vec<(String, String)>>>,
}

impl Shift {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            samples: SamplePredicate::Any,
            parameter_deltas: Vec::new(),
            producer_replacements: Vec::new(),
            quantity_renames: Vec::new(),
        }
    }

    /// Replace parameter values in the given scopes
    pub fn parameters<I, K, V>(mut self, scopes: impl IntoScopes, deltas: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ParameterValue>,
    {
        self.parameter_deltas.push(Scoped {
            scopes: scopes.into_scopes(),
            value: deltas
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        });
        self
    }

    /// Swap producers in the given scopes (Replace semantics)
    pub fn replace_producers<I, S>(mut self, scopes: impl IntoScopes, pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Producer)>,
        S: Into<String>,
    {
        self.producer_replacements.push(Scoped {
            scopes: scopes.into_scopes(),
            value: pairs
                .into_iter()
                .map(|(old, new)| (old.into(), new))
                .collect(),
        });
        self
    }

    /// Make consumers of `from` read `to` instead in the given scopes
    pub fn rename_quantities<I, A, B>(mut self, scopes: impl IntoScopes, pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        self.quantity_renames.push(Scoped {
            scopes: scopes.into_scopes(),
            value: pairs
                .into_iter()
                .map(|(from, to)| (from.into(), to.into()))
                .collect(),
        });
        self
    }

    pub fn for_samples(mut self, samples: SamplePredicate) -> Self {
        self.samples = samples;
        self
    }

    /// Whether any delta of this shift applies to `scope`
    pub fn targets(&self, scope: &str) -> bool {
        self.parameter_deltas.iter().any(|d| d.applies_to(scope))
            || self.producer_replacements.iter().any(|r| r.applies_to(scope))
            || self.quantity_renames.iter().any(|r| r.applies_to(scope))
    }

    /// Producers the shift brings into each scope it lists
    pub fn introduced(&self) -> impl Iterator<Item = (&[String], &Producer)> {
        self.producer_replacements.iter().flat_map(|scoped| {
            scoped
                .value
                .iter()
                .map(move |(_, new)| (scoped.scopes.as_slice(), new))
        })
    }
}

/// Parameter map, unit list and renames of one shifted variant
#[derive(Debug, Clone, PartialEq)]
pub struct ShiftOverride {
    pub parameters: ResolvedParameters,
    pub producers: Vec<String>,
    pub renames: BTreeMap<String, String>,
}

/// Registered shifts of one compilation run
#[derive(Debug, Clone, Default)]
pub struct ShiftExpander {
    shifts: Vec<Shift>,
}

impl ShiftExpander {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shift; names are unique and `nominal` is reserved
    pub fn add_shift(&mut self, shift: Shift) -> Result<()> {
        if shift.name.trim().is_empty() {
            return Err(CompileError::config("shift with empty name"));
        }
        if shift.name == NOMINAL {
            return Err(CompileError::config(format!(
                "'{}' is reserved for the unshifted variant",
                NOMINAL
            )));
        }
        if self.shifts.iter().any(|s| s.name == shift.name) {
            return Err(CompileError::config(format!(
                "shift '{}' registered twice",
                shift.name
            )));
        }
        self.shifts.push(shift);
        Ok(())
    }

    pub fn shifts(&self) -> &[Shift] {
        &self.shifts
    }

    pub fn len(&self) -> usize {
        self.shifts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shifts.is_empty()
    }

    /// Check that every explicitly requested shift exists
    pub fn check_selection(&self, selection: &ShiftSelection) -> Result<()> {
        if let ShiftSelection::Named(names) = selection {
            for name in names {
                if !self.shifts.iter().any(|s| &s.name == name) {
                    let known: Vec<&str> = self.shifts.iter().map(|s| s.name.as_str()).collect();
                    return Err(CompileError::config(format!(
                        "unknown shift '{}'. Available: {}",
                        name,
                        known.join(", ")
                    )));
                }
            }
        }
        Ok(())
    }

    /// Shifted variants of one scope, in registration order
    ///
    /// `baseline_parameters` and `baseline_producers` are the scope's
    /// nominal entries; they are copied, never modified.
    pub fn expand<F>(
        &self,
        scope: &str,
        ctx: &ResolutionContext<'_>,
        selection: &ShiftSelection,
        baseline_parameters: &ResolvedParameters,
        baseline_producers: &[String],
        knows: F,
    ) -> Result<IndexMap<String, ShiftOverride>>
    where
        F: Fn(&str) -> bool,
    {
        let mut variants = IndexMap::new();

        for shift in &self.shifts {
            if !selection.includes(&shift.name) || !shift.targets(scope) {
                continue;
            }
            if !shift.samples.matches(ctx.sample) {
                debug!(
                    "shift '{}' skipped in scope '{}' for sample '{}'",
                    shift.name, scope, ctx.sample
                );
                continue;
            }

            let parameters = shifted_parameters(shift, scope, ctx, baseline_parameters)?;
            let producers = shifted_producers(shift, scope, baseline_producers, &knows)?;

            let mut renames = BTreeMap::new();
            for scoped in shift.quantity_renames.iter().filter(|r| r.applies_to(scope)) {
                for (from, to) in &scoped.value {
                    renames.insert(from.clone(), to.clone());
                }
            }

            variants.insert(
                shift.name.clone(),
                ShiftOverride {
                    parameters,
                    producers,
                    renames,
                },
            );
        }

        Ok(variants)
    }
}

fn shifted_parameters(
    shift: &Shift,
    scope: &str,
    ctx: &ResolutionContext<'_>,
    baseline: &ResolvedParameters,
) -> Result<ResolvedParameters> {
    let mut parameters = baseline.clone();
    for scoped in shift.parameter_deltas.iter().filter(|d| d.applies_to(scope)) {
        // a delta reaching the scope only through `global` shifts the global
        // entry, which the scope's own entry keeps shadowing
        let via_global = !scoped.scopes.iter().any(|s| s == scope);
        for (name, delta) in &scoped.value {
            if !baseline.values.contains_key(name) {
                return Err(CompileError::MissingParameter {
                    scope: scope.to_string(),
                    variant: shift.name.clone(),
                    name: name.clone(),
                });
            }
            if via_global
                && matches!(baseline.provenance.get_source(name), Some(ParameterSource::Scope(_)))
            {
                debug!(
                    "shift '{}' leaves '{}' in scope '{}': scope entry shadows global",
                    shift.name, name, scope
                );
                continue;
            }
            let value = delta.resolve(ctx, scope, name)?;
            debug!(
                "shift '{}' sets '{}' = {} in scope '{}'",
                shift.name, name, value, scope
            );
            parameters.values.insert(name.clone(), value);
            parameters
                .provenance
                .track(name, ParameterSource::Shift(shift.name.clone()));
        }
    }
    Ok(parameters)
}

fn shifted_producers<F>(
    shift: &Shift,
    scope: &str,
    baseline: &[String],
    knows: &F,
) -> Result<Vec<String>>
where
    F: Fn(&str) -> bool,
{
    let mut producers = baseline.to_vec();
    for scoped in shift
        .producer_replacements
        .iter()
        .filter(|r| r.applies_to(scope))
    {
        for (old, new) in &scoped.value {
            if !knows(old) {
                return Err(CompileError::UnknownProducerReference {
                    scope: scope.to_string(),
                    producer: old.clone(),
                    referrer: format!("Shift '{}'", shift.name),
                });
            }
            replace_producer(&mut producers, old, &new.name);
        }
    }
    Ok(producers)
}
