//! Shared-prefix optimizer
//!
//! Variants of one scope often differ from nominal only near the end of the
//! producer list. The optimizer records for each shifted variant how many
//! leading producers it can share with nominal. A unit is shared when it is
//! part of a common prefix and matches nominal in name, in the values of the
//! parameters it reads, and in the quantities it actually consumes.
//!
//! Split points only describe execution sharing; producer lists and
//! parameter maps are left untouched.

use super::artifact::VariantDraft;
use super::graph::ProducerRegistry;
use super::producer::Producer;
use crate::config::context::NOMINAL;
use indexmap::IndexMap;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct Optimizer<'a> {
    registry: &'a ProducerRegistry,
}

impl<'a> Optimizer<'a> {
    pub fn new(registry: &'a ProducerRegistry) -> Self {
        Self { registry }
    }

    /// Set split points on every shifted variant of one scope
    pub fn optimize_scope(&self, scope: &str, variants: &mut IndexMap<String, VariantDraft>) {
        let nominal = match variants.get(NOMINAL) {
            Some(nominal) => nominal.clone(),
            None => return,
        };

        for (name, draft) in variants.iter_mut() {
            if name == NOMINAL {
                continue;
            }
            let split = self.split_point(&nominal, draft);
            debug!(
                "scope '{}' variant '{}' shares {} producers with nominal",
                scope, name, split
            );
            draft.split_point = Some(split);
        }
    }

    /// Number of leading leaf producers `variant` shares with `nominal`
    pub fn split_point(&self, nominal: &VariantDraft, variant: &VariantDraft) -> usize {
        let mut shared = 0;
        for (ours, theirs) in nominal.units.iter().zip(&variant.units) {
            if ours != theirs {
                break;
            }
            let Some(producer) = self.registry.get(ours) else {
                break;
            };
            if !same_inputs(producer, nominal, variant) || !same_parameters(producer, nominal, variant) {
                break;
            }
            shared += producer.unit_names().len();
        }
        shared
    }
}

fn same_inputs(producer: &Producer, nominal: &VariantDraft, variant: &VariantDraft) -> bool {
    producer
        .requires
        .iter()
        .all(|q| nominal.renames.get(q) == variant.renames.get(q))
}

fn same_parameters(producer: &Producer, nominal: &VariantDraft, variant: &VariantDraft) -> bool {
    producer.parameters.iter().all(|name| {
        nominal.parameters.values.get(name) == variant.parameters.values.get(name)
    })
}
