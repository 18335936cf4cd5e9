//! Expanded configuration artifact
//!
//! The terminal product of a compilation run: per scope, per variant, the
//! ordered producer list, the flat resolved parameter map and the requested
//! outputs. Serialised ordering is stable: scopes in request order, `nominal`
//! first, shifts in registration order, parameters sorted by name.

use super::graph::ProducerRegistry;
use crate::config::context::NOMINAL;
use crate::config::parameter_store::ResolvedParameters;
use crate::config::value::Value;
use crate::errors::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Working state of one (scope, variant) between optimize and expansion
#[derive(Debug, Clone, PartialEq)]
pub struct VariantDraft {
    /// Execution-ordered unit names; groups not yet inlined
    pub units: Vec<String>,
    pub parameters: ResolvedParameters,
    /// Requested quantities, output groups already expanded
    pub outputs: Vec<String>,
    pub renames: BTreeMap<String, String>,
    pub split_point: Option<usize>,
}

impl VariantDraft {
    pub fn to_config(&self, registry: &ProducerRegistry) -> VariantConfig {
        VariantConfig {
            producers: registry.flatten(&self.units),
            parameters: self.parameters.values.clone(),
            outputs: self.outputs.clone(),
            quantity_renames: self.renames.clone(),
            split_point: self.split_point,
        }
    }
}

/// Resolved configuration of one (scope, variant)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantConfig {
    pub producers: Vec<String>,
    pub parameters: BTreeMap<String, Value>,
    pub outputs: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub quantity_renames: BTreeMap<String, String>,
    /// Number of leading producers shared with the nominal list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_point: Option<usize>,
}

/// Per-scope, per-variant configuration handed to the execution engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandedConfiguration {
    pub era: String,
    pub sample: String,
    pub scopes: IndexMap<String, IndexMap<String, VariantConfig>>,
}

impl ExpandedConfiguration {
    pub fn variant(&self, scope: &str, variant: &str) -> Option<&VariantConfig> {
        self.scopes.get(scope).and_then(|variants| variants.get(variant))
    }

    pub fn nominal(&self, scope: &str) -> Option<&VariantConfig> {
        self.variant(scope, NOMINAL)
    }

    pub fn variant_names(&self, scope: &str) -> Vec<&str> {
        self.scopes
            .get(scope)
            .map(|variants| variants.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn variant_count(&self, scope: &str) -> usize {
        self.scopes.get(scope).map_or(0, IndexMap::len)
    }

    /// Same content with optimizer split points stripped
    pub fn semantic_content(&self) -> Self {
        let mut stripped = self.clone();
        for variants in stripped.scopes.values_mut() {
            for config in variants.values_mut() {
                config.split_point = None;
            }
        }
        stripped
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Shared-prefix execution plan of one scope
    pub fn plan(&self, scope: &str) -> Option<ScopePlan> {
        let variants = self.scopes.get(scope)?;
        let baseline = Arc::new(variants.get(NOMINAL)?.producers.clone());

        let branches = variants
            .iter()
            .filter(|(name, _)| name.as_str() != NOMINAL)
            .map(|(name, config)| {
                let split_point = config.split_point.unwrap_or(0);
                PlanBranch {
                    variant: name.clone(),
                    baseline: Arc::clone(&baseline),
                    split_point,
                    tail: config.producers[split_point.min(config.producers.len())..].to_vec(),
                }
            })
            .collect();

        Some(ScopePlan { baseline, branches })
    }
}

/// Nominal list plus per-variant branches off it
#[derive(Debug, Clone)]
pub struct ScopePlan {
    pub baseline: Arc<Vec<String>>,
    pub branches: Vec<PlanBranch>,
}

impl ScopePlan {
    /// Producers executed once for all variants
    pub fn shared_prefix(&self) -> &[String] {
        let shared = self
            .branches
            .iter()
            .map(|b| b.split_point)
            .min()
            .unwrap_or(self.baseline.len());
        &self.baseline[..shared.min(self.baseline.len())]
    }

    pub fn branch(&self, variant: &str) -> Option<&PlanBranch> {
        self.branches.iter().find(|b| b.variant == variant)
    }
}

/// A variant as "nominal up to `split_point`, then `tail`"
#[derive(Debug, Clone)]
pub struct PlanBranch {
    pub variant: String,
    pub baseline: Arc<Vec<String>>,
    pub split_point: usize,
    pub tail: Vec<String>,
}

impl PlanBranch {
    /// Full producer list of the variant
    pub fn producers(&self) -> Vec<String> {
        let mut producers = self.baseline[..self.split_point.min(self.baseline.len())].to_vec();
        producers.extend(self.tail.iter().cloned());
        producers
    }
}
