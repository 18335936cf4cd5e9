//! Compilation driver
//!
//! A `Configuration` owns every store of one compilation run. It moves
//! through a fixed sequence of phases:
//!
//! ```text
//! Building ──optimize()──▶ Optimized ──validate()──▶ Validated ──report()──▶ Reported
//! ```
//!
//! Builder calls are accepted only while `Building`; `expanded_configuration()`
//! is available once validation succeeded.

use super::artifact::{ExpandedConfiguration, VariantConfig, VariantDraft};
use super::graph::{DependencyGraph, ProducerGraph};
use super::optimizer::Optimizer;
use super::producer::{InputSchema, OutputRequest, Producer};
use super::report::{CompileReport, ScopeSummary};
use super::rules::{ModificationRule, RuleEngine};
use super::shifts::{Shift, ShiftExpander};
use super::validator::Validator;
use crate::config::context::{CompileContext, IntoScopes, GLOBAL_SCOPE, NOMINAL};
use crate::config::parameter_store::{ParameterStore, ResolvedParameters};
use crate::config::value::{ParameterValue, ResolutionContext};
use crate::errors::{CompileError, Result};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Compilation switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Compute shared-prefix split points
    pub optimize: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self { optimize: true }
    }
}

/// Lifecycle phase of a `Configuration`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilePhase {
    Building,
    Optimized,
    Validated,
    Reported,
}

impl CompilePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompilePhase::Building => "building",
            CompilePhase::Optimized => "optimized",
            CompilePhase::Validated => "validated",
            CompilePhase::Reported => "reported",
        }
    }

    /// Whether validation has succeeded
    pub fn is_validated(&self) -> bool {
        matches!(self, CompilePhase::Validated | CompilePhase::Reported)
    }
}

/// One compilation run
#[derive(Debug, Clone)]
pub struct Configuration {
    context: CompileContext,
    options: CompileOptions,
    phase: CompilePhase,
    schema: InputSchema,
    parameters: ParameterStore,
    producers: ProducerGraph,
    rules: RuleEngine,
    shifts: ShiftExpander,
    outputs: IndexMap<String, Vec<OutputRequest>>,
    drafts: IndexMap<String, IndexMap<String, VariantDraft>>,
    diagnostics: Vec<String>,
    expanded: Option<ExpandedConfiguration>,
}

impl Configuration {
    /// Start a run; era, sample and scopes are checked against the
    /// context's available sets
    pub fn new(context: CompileContext) -> Result<Self> {
        context.validate()?;
        debug!(
            "configuration for era '{}' sample '{}' scopes [{}]",
            context.era,
            context.sample,
            context.scopes.join(", ")
        );
        Ok(Self {
            context,
            options: CompileOptions::default(),
            phase: CompilePhase::Building,
            schema: InputSchema::default(),
            parameters: ParameterStore::new(),
            producers: ProducerGraph::new(),
            rules: RuleEngine::new(),
            shifts: ShiftExpander::new(),
            outputs: IndexMap::new(),
            drafts: IndexMap::new(),
            diagnostics: Vec::new(),
            expanded: None,
        })
    }

    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn context(&self) -> &CompileContext {
        &self.context
    }

    pub fn phase(&self) -> CompilePhase {
        self.phase
    }

    pub fn parameter_store(&self) -> &ParameterStore {
        &self.parameters
    }

    pub fn producer_graph(&self) -> &ProducerGraph {
        &self.producers
    }

    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    // ── Build phase ────────────────────────────────────────────────────

    fn ensure_building(&self, operation: &'static str) -> Result<()> {
        if self.phase == CompilePhase::Building {
            Ok(())
        } else {
            Err(CompileError::AlreadyFinalized { operation })
        }
    }

    /// Scopes of a builder call this run acts on
    ///
    /// Unknown scopes are errors; available but unrequested scopes are
    /// dropped so one declarative analysis can serve any scope subset.
    fn target_scopes(&self, operation: &'static str, scopes: Vec<String>) -> Result<Vec<String>> {
        self.ensure_building(operation)?;
        let mut accepted = Vec::new();
        for scope in scopes {
            if !self.context.is_known_scope(&scope) {
                return Err(CompileError::config(format!(
                    "{} names unknown scope '{}'",
                    operation, scope
                )));
            }
            if scope == GLOBAL_SCOPE || self.context.is_requested_scope(&scope) {
                if !accepted.contains(&scope) {
                    accepted.push(scope);
                }
            } else {
                debug!("{} for scope '{}' ignored: scope not requested", operation, scope);
            }
        }
        Ok(accepted)
    }

    /// Declare raw quantities provided by the input schema
    pub fn add_raw_inputs<I, S>(&mut self, quantities: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ensure_building("add_raw_inputs")?;
        self.schema.extend(quantities);
        Ok(())
    }

    /// Store parameters for each scope (last writer wins)
    pub fn add_config_parameters<I, K, V>(&mut self, scopes: impl IntoScopes, parameters: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ParameterValue>,
    {
        let scopes = self.target_scopes("add_config_parameters", scopes.into_scopes())?;
        let parameters: Vec<(String, ParameterValue)> = parameters
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        for scope in &scopes {
            for (name, value) in &parameters {
                self.parameters.set(scope, name.clone(), value.clone());
            }
        }
        Ok(())
    }

    /// Append producers to each scope's sequence
    pub fn add_producers(&mut self, scopes: impl IntoScopes, producers: &[Producer]) -> Result<()> {
        let scopes = self.target_scopes("add_producers", scopes.into_scopes())?;
        for scope in &scopes {
            self.producers.add(scope, producers)?;
        }
        Ok(())
    }

    pub fn add_modification_rule(&mut self, scopes: impl IntoScopes, rule: ModificationRule) -> Result<()> {
        let scopes = self.target_scopes("add_modification_rule", scopes.into_scopes())?;
        if scopes.is_empty() {
            return Ok(());
        }
        for scope in &scopes {
            for producer in rule.introduced() {
                self.producers.introduce(scope, producer)?;
            }
        }
        self.rules.add_rule(scopes, rule);
        Ok(())
    }

    pub fn add_shift(&mut self, shift: Shift) -> Result<()> {
        self.ensure_building("add_shift")?;
        let scope_lists = shift
            .parameter_deltas
            .iter()
            .map(|d| &d.scopes)
            .chain(shift.producer_replacements.iter().map(|r| &r.scopes))
            .chain(shift.quantity_renames.iter().map(|r| &r.scopes));
        for scopes in scope_lists {
            if let Some(unknown) = scopes.iter().find(|s| !self.context.is_known_scope(s)) {
                return Err(CompileError::config(format!(
                    "shift '{}' names unknown scope '{}'",
                    shift.name, unknown
                )));
            }
        }

        for (scopes, producer) in shift.introduced() {
            for scope in scopes {
                if scope == GLOBAL_SCOPE || self.context.is_requested_scope(scope) {
                    self.producers.introduce(scope, producer)?;
                }
            }
        }
        self.shifts.add_shift(shift)
    }

    /// Request outputs (quantities or output groups) for each scope
    pub fn add_outputs<I, O>(&mut self, scopes: impl IntoScopes, outputs: I) -> Result<()>
    where
        I: IntoIterator<Item = O>,
        O: Into<OutputRequest>,
    {
        let scopes = self.target_scopes("add_outputs", scopes.into_scopes())?;
        let outputs: Vec<OutputRequest> = outputs.into_iter().map(Into::into).collect();
        for scope in scopes {
            let requested = self.outputs.entry(scope).or_default();
            for output in &outputs {
                if !requested.contains(output) {
                    requested.push(output.clone());
                }
            }
        }
        Ok(())
    }

    // ── Finalize ───────────────────────────────────────────────────────

    /// Expand every requested scope into its variants
    pub fn optimize(&mut self) -> Result<()> {
        self.ensure_building("optimize")?;
        self.shifts.check_selection(&self.context.shifts)?;

        let ctx = ResolutionContext::new(&self.context.era, &self.context.sample);
        let mut drafts = IndexMap::new();
        let mut diagnostics = Vec::new();

        for scope in &self.context.scopes {
            let (mut variants, notes) = self.expand_scope(scope, &ctx)?;
            if self.options.optimize {
                Optimizer::new(self.producers.registry()).optimize_scope(scope, &mut variants);
            }
            diagnostics.extend(notes);
            drafts.insert(scope.clone(), variants);
        }

        info!(
            "Expanded {} scopes into {} variants (era '{}', sample '{}')",
            drafts.len(),
            drafts.values().map(IndexMap::len).sum::<usize>(),
            self.context.era,
            self.context.sample
        );

        self.drafts = drafts;
        self.diagnostics = diagnostics;
        self.phase = CompilePhase::Optimized;
        Ok(())
    }

    fn expand_scope(
        &self,
        scope: &str,
        ctx: &ResolutionContext<'_>,
    ) -> Result<(IndexMap<String, VariantDraft>, Vec<String>)> {
        let knows = |name: &str| self.producers.knows(scope, name);
        let outcome = self.rules.apply(
            scope,
            &self.context.sample,
            self.producers.sequence(scope),
            knows,
        )?;

        let parameters = self.parameters.resolve_scope(scope, ctx)?;
        self.check_declared_parameters(scope, NOMINAL, &outcome.producers, &parameters)?;
        let outputs = self.expand_outputs(scope, &outcome.producers, &outcome.removed)?;

        let mut variants = IndexMap::new();
        variants.insert(
            NOMINAL.to_string(),
            VariantDraft {
                units: self.execution_order(&outcome.producers, &BTreeMap::new())?,
                parameters: parameters.clone(),
                outputs: outputs.clone(),
                renames: BTreeMap::new(),
                split_point: None,
            },
        );

        let shifted = self.shifts.expand(
            scope,
            ctx,
            &self.context.shifts,
            &parameters,
            &outcome.producers,
            knows,
        )?;
        for (name, shift) in shifted {
            self.check_declared_parameters(scope, &name, &shift.producers, &shift.parameters)?;
            let units = self.execution_order(&shift.producers, &shift.renames)?;
            variants.insert(
                name,
                VariantDraft {
                    units,
                    parameters: shift.parameters,
                    outputs: outputs.clone(),
                    renames: shift.renames,
                    split_point: None,
                },
            );
        }

        Ok((variants, outcome.diagnostics))
    }

    /// Every parameter a listed producer reads must resolve in the scope
    fn check_declared_parameters(
        &self,
        scope: &str,
        variant: &str,
        units: &[String],
        parameters: &ResolvedParameters,
    ) -> Result<()> {
        for unit in units {
            let producer = self.lookup_producer(unit)?;
            if let Some(name) = producer
                .parameters
                .iter()
                .find(|name| !parameters.values.contains_key(*name))
            {
                return Err(CompileError::MissingParameter {
                    scope: scope.to_string(),
                    variant: variant.to_string(),
                    name: name.clone(),
                });
            }
        }
        Ok(())
    }

    fn lookup_producer(&self, name: &str) -> Result<&Producer> {
        self.producers
            .registry()
            .get(name)
            .ok_or_else(|| CompileError::config(format!("producer '{}' has no declaration", name)))
    }

    /// Requested quantities of a scope with groups expanded
    ///
    /// Quantities that only removed producers emitted are dropped.
    fn expand_outputs(&self, scope: &str, units: &[String], removed: &[String]) -> Result<Vec<String>> {
        let requests = [GLOBAL_SCOPE, scope]
            .into_iter()
            .filter_map(|key| self.outputs.get(key))
            .flatten();

        let mut quantities: Vec<String> = Vec::new();
        for request in requests {
            let expanded = match request {
                OutputRequest::Quantity(q) => vec![q.clone()],
                OutputRequest::Group { group } => {
                    let producer = self.lookup_producer(group)?;
                    if producer.output_group.is_empty() {
                        return Err(CompileError::config(format!(
                            "output group '{}' requested in scope '{}' but producer declares none",
                            group, scope
                        )));
                    }
                    producer.output_group.clone()
                }
            };
            for quantity in expanded {
                if !quantities.contains(&quantity) {
                    quantities.push(quantity);
                }
            }
        }

        let emitted_by = |names: &[String], quantity: &str| -> bool {
            names.iter().any(|name| {
                self.producers
                    .registry()
                    .get(name)
                    .map_or(false, |p| p.emits.iter().any(|q| q == quantity))
            })
        };

        quantities.retain(|quantity| {
            let pruned = emitted_by(removed, quantity) && !emitted_by(units, quantity);
            if pruned {
                debug!(
                    "output '{}' in scope '{}' dropped with its removed producer",
                    quantity, scope
                );
            }
            !pruned
        });
        Ok(quantities)
    }

    /// Topological order, or registration order when none exists
    ///
    /// Integrity problems are left for `validate()` to report together.
    fn execution_order(&self, units: &[String], renames: &BTreeMap<String, String>) -> Result<Vec<String>> {
        let graph = DependencyGraph::build(units, self.producers.registry(), &self.schema, renames)?;
        Ok(graph.order().unwrap_or_else(|cycle| {
            debug!("no execution order ({}), keeping registration order", cycle.join(" -> "));
            units.to_vec()
        }))
    }

    /// Check every (scope, variant) and freeze the artifact
    pub fn validate(&mut self) -> Result<()> {
        match self.phase {
            CompilePhase::Building => {
                return Err(CompileError::NotFinalized {
                    operation: "validate",
                    required: "optimize",
                })
            }
            CompilePhase::Optimized => {}
            CompilePhase::Validated | CompilePhase::Reported => return Ok(()),
        }

        let registry = self.producers.registry();
        let report = Validator::new(registry, &self.schema).validate(&self.drafts)?;
        info!(
            "Validated {} variants: {} violations",
            report.checked,
            report.violations.len()
        );
        report.into_result()?;

        let scopes = self
            .drafts
            .iter()
            .map(|(scope, variants)| {
                let configs: IndexMap<String, VariantConfig> = variants
                    .iter()
                    .map(|(name, draft)| (name.clone(), draft.to_config(registry)))
                    .collect();
                (scope.clone(), configs)
            })
            .collect();

        self.expanded = Some(ExpandedConfiguration {
            era: self.context.era.clone(),
            sample: self.context.sample.clone(),
            scopes,
        });
        self.phase = CompilePhase::Validated;
        Ok(())
    }

    /// Diagnostic summary; logs it and warns about non-fatal findings
    pub fn report(&mut self) -> Result<CompileReport> {
        let expanded = match (&self.expanded, self.phase.is_validated()) {
            (Some(expanded), true) => expanded,
            _ => {
                return Err(CompileError::NotFinalized {
                    operation: "report",
                    required: "validate",
                })
            }
        };

        let mut diagnostics = self.diagnostics.clone();
        let eras = &self.context.available_eras;
        let samples = &self.context.available_samples;
        if !eras.is_empty() && !samples.is_empty() {
            for combo in self
                .parameters
                .unresolved_combinations(&self.context.scopes, eras, samples)
            {
                diagnostics.push(format!(
                    "parameter '{}' in scope '{}' does not resolve for era '{}' / sample '{}'",
                    combo.name, combo.scope, combo.era, combo.sample
                ));
            }
        }

        let scopes = self
            .drafts
            .iter()
            .map(|(scope, variants)| {
                let nominal = expanded.nominal(scope);
                ScopeSummary {
                    scope: scope.clone(),
                    variants: variants.keys().cloned().collect(),
                    producers: nominal.map_or(0, |n| n.producers.len()),
                    outputs: nominal.map_or(0, |n| n.outputs.len()),
                    provenance: variants
                        .get(NOMINAL)
                        .map(|d| d.parameters.provenance.summary())
                        .unwrap_or_default(),
                    split_points: variants
                        .iter()
                        .filter_map(|(name, d)| d.split_point.map(|s| (name.clone(), s)))
                        .collect(),
                }
            })
            .collect();

        let report = CompileReport {
            era: self.context.era.clone(),
            sample: self.context.sample.clone(),
            scopes,
            diagnostics,
            optimized: self.options.optimize,
        };

        for line in report.summary().lines() {
            info!("{}", line);
        }
        for note in &report.diagnostics {
            warn!("{}", note);
        }

        self.phase = CompilePhase::Reported;
        Ok(report)
    }

    /// Run optimize, validate and report in order
    pub fn finalize(&mut self) -> Result<CompileReport> {
        self.optimize()?;
        self.validate()?;
        self.report()
    }

    /// The per-scope, per-variant artifact
    ///
    /// Returns the same value on every call.
    pub fn expanded_configuration(&self) -> Result<ExpandedConfiguration> {
        match &self.expanded {
            Some(expanded) if self.phase.is_validated() => Ok(expanded.clone()),
            _ => Err(CompileError::NotFinalized {
                operation: "expanded_configuration",
                required: "validate",
            }),
        }
    }
}
