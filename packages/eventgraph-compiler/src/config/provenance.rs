//! Parameter provenance tracking
//!
//! Track which scope (or shift) supplied each resolved parameter value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a resolved parameter came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterSource {
    /// Inherited from the global scope
    Global,

    /// Set on the scope itself
    Scope(String),

    /// Replaced by a shift delta
    Shift(String),
}

impl ParameterSource {
    /// Get a short description
    pub fn describe(&self) -> String {
        match self {
            ParameterSource::Global => "global".to_string(),
            ParameterSource::Scope(scope) => format!("scope:{}", scope),
            ParameterSource::Shift(shift) => format!("shift:{}", shift),
        }
    }
}

/// Field-level provenance of one resolved parameter map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterProvenance {
    sources: BTreeMap<String, ParameterSource>,
}

impl ParameterProvenance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the source of a parameter (overwrites)
    pub fn track(&mut self, name: &str, source: ParameterSource) {
        self.sources.insert(name.to_string(), source);
    }

    pub fn get_source(&self, name: &str) -> Option<&ParameterSource> {
        self.sources.get(name)
    }

    pub fn sources(&self) -> &BTreeMap<String, ParameterSource> {
        &self.sources
    }

    /// Number of parameters per source kind: (global, scope, shift)
    pub fn counts(&self) -> (usize, usize, usize) {
        self.sources
            .values()
            .fold((0, 0, 0), |(g, s, sh), source| match source {
                ParameterSource::Global => (g + 1, s, sh),
                ParameterSource::Scope(_) => (g, s + 1, sh),
                ParameterSource::Shift(_) => (g, s, sh + 1),
            })
    }

    /// Get human-readable summary of non-global entries
    pub fn summary(&self) -> String {
        let (global, scoped, shifted) = self.counts();
        let mut lines = vec![format!(
            "{} parameters ({} global, {} scope, {} shift)",
            self.sources.len(),
            global,
            scoped,
            shifted
        )];

        for (name, source) in &self.sources {
            if *source != ParameterSource::Global {
                lines.push(format!("  {} ← {}", name, source.describe()));
            }
        }

        lines.join("\n")
    }
}
