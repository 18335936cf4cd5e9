//! Modification rules
//!
//! Rules rewrite a scope's producer list depending on the sample category.
//! They form a sequential rewrite log: every applicable rule runs once per
//! (scope, sample) expansion, in registration order, on the output of the
//! previous rule. Two rules touching the same producer therefore give an
//! order-sensitive but reproducible result.
//!
//! Replace keeps the replacement even when the target is absent: the new
//! producer is appended instead.

use super::producer::Producer;
use crate::config::context::{SamplePredicate, GLOBAL_SCOPE};
use crate::errors::{CompileError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Graph edit performed by a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Append(Vec<Producer>),
    Remove(Vec<String>),
    Replace(Vec<(String, Producer)>),
}

impl RuleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleAction::Append(_) => "append",
            RuleAction::Remove(_) => "remove",
            RuleAction::Replace(_) => "replace",
        }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Conditional graph edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModificationRule {
    pub action: RuleAction,
    #[serde(default)]
    pub samples: SamplePredicate,
}

impl ModificationRule {
    pub fn append(producers: Vec<Producer>) -> Self {
        Self {
            action: RuleAction::Append(producers),
            samples: SamplePredicate::Any,
        }
    }

    pub fn remove<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            action: RuleAction::Remove(names.into_iter().map(Into::into).collect()),
            samples: SamplePredicate::Any,
        }
    }

    pub fn replace<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Producer)>,
        S: Into<String>,
    {
        Self {
            action: RuleAction::Replace(
                pairs
                    .into_iter()
                    .map(|(old, new)| (old.into(), new))
                    .collect(),
            ),
            samples: SamplePredicate::Any,
        }
    }

    /// Restrict the rule to matching sample categories
    pub fn for_samples(mut self, samples: SamplePredicate) -> Self {
        self.samples = samples;
        self
    }

    /// Producers this rule brings into a scope
    pub fn introduced(&self) -> Vec<&Producer> {
        match &self.action {
            RuleAction::Append(producers) => producers.iter().collect(),
            RuleAction::Remove(_) => Vec::new(),
            RuleAction::Replace(pairs) => pairs.iter().map(|(_, new)| new).collect(),
        }
    }

    /// Existing producer names this rule refers to
    pub fn references(&self) -> Vec<&str> {
        match &self.action {
            RuleAction::Append(_) => Vec::new(),
            RuleAction::Remove(names) => names.iter().map(String::as_str).collect(),
            RuleAction::Replace(pairs) => pairs.iter().map(|(old, _)| old.as_str()).collect(),
        }
    }
}

/// What a single replacement did to a list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceEffect {
    /// `old` swapped for `new` at `old`'s position
    Substituted,
    /// `old` absent, `new` appended
    Appended,
    /// `new` already present; `old` dropped if it was there
    AlreadyPresent,
}

/// Replace `old` with `new`, appending `new` when `old` is absent
pub fn replace_producer(list: &mut Vec<String>, old: &str, new: &str) -> ReplaceEffect {
    if list.iter().any(|n| n == new) {
        list.retain(|n| n == new || n != old);
        return ReplaceEffect::AlreadyPresent;
    }
    match list.iter().position(|n| n == old) {
        Some(pos) => {
            list[pos] = new.to_string();
            ReplaceEffect::Substituted
        }
        None => {
            list.push(new.to_string());
            ReplaceEffect::Appended
        }
    }
}

/// Result of running the rule log over one list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleOutcome {
    pub producers: Vec<String>,
    /// Producers actually deleted by Remove rules
    pub removed: Vec<String>,
    /// Non-fatal notes (remove targets that were absent)
    pub diagnostics: Vec<String>,
}

#[derive(Debug, Clone)]
struct ScopedRule {
    scopes: Vec<String>,
    rule: ModificationRule,
}

/// Ordered rule log
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    rules: Vec<ScopedRule>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rule(&mut self, scopes: Vec<String>, rule: ModificationRule) {
        self.rules.push(ScopedRule { scopes, rule });
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply every rule targeting `scope` (or global) in registration order
    ///
    /// `knows` tells whether the scope ever registered or introduced a name;
    /// a reference to an unknown name is a fatal error even when the rule's
    /// sample predicate does not match, so typos surface on every run.
    pub fn apply<F>(
        &self,
        scope: &str,
        sample: &str,
        producers: Vec<String>,
        knows: F,
    ) -> Result<RuleOutcome>
    where
        F: Fn(&str) -> bool,
    {
        let mut outcome = RuleOutcome {
            producers,
            ..RuleOutcome::default()
        };

        for (index, scoped) in self.rules.iter().enumerate() {
            let targets_scope = scoped
                .scopes
                .iter()
                .any(|s| s == scope || s == GLOBAL_SCOPE);
            if !targets_scope {
                continue;
            }

            let rule = &scoped.rule;
            if let Some(unknown) = rule.references().into_iter().find(|name| !knows(*name)) {
                return Err(CompileError::UnknownProducerReference {
                    scope: scope.to_string(),
                    producer: unknown.to_string(),
                    referrer: format!("Modification rule #{} ({})", index, rule.action),
                });
            }
            if !rule.samples.matches(sample) {
                continue;
            }

            apply_action(index, scope, &rule.action, &mut outcome);
        }

        Ok(outcome)
    }
}

fn apply_action(index: usize, scope: &str, action: &RuleAction, outcome: &mut RuleOutcome) {
    match action {
        RuleAction::Append(producers) => {
            for producer in producers {
                if !outcome.producers.contains(&producer.name) {
                    debug!("rule #{}: append '{}' in scope '{}'", index, producer.name, scope);
                    outcome.producers.push(producer.name.clone());
                }
            }
        }
        RuleAction::Remove(names) => {
            for name in names {
                match outcome.producers.iter().position(|n| n == name) {
                    Some(pos) => {
                        debug!("rule #{}: remove '{}' in scope '{}'", index, name, scope);
                        outcome.producers.remove(pos);
                        outcome.removed.push(name.clone());
                    }
                    None => {
                        debug!("rule #{}: remove target '{}' absent in scope '{}'", index, name, scope);
                        outcome.diagnostics.push(format!(
                            "rule #{} could not remove '{}' from scope '{}': not present",
                            index, name, scope
                        ));
                    }
                }
            }
        }
        RuleAction::Replace(pairs) => {
            for (old, new) in pairs {
                let effect = replace_producer(&mut outcome.producers, old, &new.name);
                debug!(
                    "rule #{}: replace '{}' -> '{}' in scope '{}' ({:?})",
                    index, old, new.name, scope, effect
                );
                outcome.removed.retain(|n| n != &new.name);
            }
        }
    }
}
