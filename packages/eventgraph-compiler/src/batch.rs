//! Parallel batch compilation
//!
//! Compiles many (era, sample) combinations of one analysis document on the
//! rayon pool. Each job builds its own `Configuration`, so jobs share
//! nothing but the read-only document.

use crate::config::context::CompileContext;
use crate::config::io::AnalysisDocument;
use crate::errors::Result;
use crate::pipeline::artifact::ExpandedConfiguration;
use crate::pipeline::compiler::CompileOptions;
use rayon::prelude::*;
use tracing::{info, warn};

/// Outcome of one (era, sample) job
#[derive(Debug)]
pub struct BatchResult {
    pub era: String,
    pub sample: String,
    pub result: Result<ExpandedConfiguration>,
}

impl BatchResult {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Compile every (era, sample) job; results keep the job order
///
/// `base` supplies scopes, shift selection and available sets; its era and
/// sample are replaced per job.
pub fn compile_batch(
    document: &AnalysisDocument,
    base: &CompileContext,
    jobs: &[(String, String)],
    options: CompileOptions,
) -> Vec<BatchResult> {
    let results: Vec<BatchResult> = jobs
        .par_iter()
        .map(|(era, sample)| {
            let mut context = base.clone();
            context.era = era.clone();
            context.sample = sample.clone();
            BatchResult {
                era: era.clone(),
                sample: sample.clone(),
                result: document.compile(context, options),
            }
        })
        .collect();

    let failed = results.iter().filter(|r| !r.is_ok()).count();
    for failure in results.iter().filter(|r| !r.is_ok()) {
        if let Err(err) = &failure.result {
            warn!("era '{}' sample '{}' failed: {}", failure.era, failure.sample, err);
        }
    }
    info!(
        "Batch complete: {} jobs, {} failed",
        results.len(),
        failed
    );
    results
}

/// Cartesian product of eras and samples, era-major
pub fn jobs(eras: &[String], samples: &[String]) -> Vec<(String, String)> {
    eras.iter()
        .flat_map(|era| samples.iter().map(move |sample| (era.clone(), sample.clone())))
        .collect()
}
