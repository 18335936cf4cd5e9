//! Compile report
//!
//! Diagnostic summary of a finalized run. Nothing downstream consumes it.

use serde::Serialize;

/// Per-scope summary line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScopeSummary {
    pub scope: String,
    pub variants: Vec<String>,
    /// Leaf producers in the nominal list
    pub producers: usize,
    pub outputs: usize,
    /// Parameter provenance of the nominal variant
    pub provenance: String,
    /// (variant, split point) for every shifted variant
    pub split_points: Vec<(String, usize)>,
}

/// Summary of one compilation run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompileReport {
    pub era: String,
    pub sample: String,
    pub scopes: Vec<ScopeSummary>,
    /// Non-fatal notes collected during expansion
    pub diagnostics: Vec<String>,
    pub optimized: bool,
}

impl CompileReport {
    pub fn total_variants(&self) -> usize {
        self.scopes.iter().map(|s| s.variants.len()).sum()
    }

    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "era {} / sample {}: {} scopes, {} variants",
            self.era,
            self.sample,
            self.scopes.len(),
            self.total_variants()
        )];

        for scope in &self.scopes {
            lines.push(format!(
                "[{}] {} producers, {} outputs, variants: {}",
                scope.scope,
                scope.producers,
                scope.outputs,
                scope.variants.join(", ")
            ));
            for line in scope.provenance.lines() {
                lines.push(format!("  {}", line));
            }
            if self.optimized {
                for (variant, split) in &scope.split_points {
                    lines.push(format!("  {} shares {} producers", variant, split));
                }
            }
        }

        if !self.diagnostics.is_empty() {
            lines.push(format!("{} diagnostics:", self.diagnostics.len()));
            for note in &self.diagnostics {
                lines.push(format!("  - {}", note));
            }
        }

        lines.join("\n")
    }
}
