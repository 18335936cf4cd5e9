//! Compile context: era, sample, requested scopes and shifts
//!
//! Mirrors the arguments an outer batch driver hands to one compilation
//! run, plus the available sets they are checked against.

use crate::errors::{CompileError, Result};
use serde::{Deserialize, Serialize};

/// Implicit scope whose parameters/producers apply to every other scope
pub const GLOBAL_SCOPE: &str = "global";

/// Variant name of the unshifted configuration
pub const NOMINAL: &str = "nominal";

/// Anything that names one or more scopes
///
/// Lets builder calls take `"global"`, `["mm", "ee"]` or a `Vec<String>`.
pub trait IntoScopes {
    fn into_scopes(self) -> Vec<String>;
}

impl IntoScopes for &str {
    fn into_scopes(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoScopes for String {
    fn into_scopes(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoScopes for &String {
    fn into_scopes(self) -> Vec<String> {
        vec![self.clone()]
    }
}

impl<const N: usize> IntoScopes for [&str; N] {
    fn into_scopes(self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

impl IntoScopes for &[&str] {
    fn into_scopes(self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

impl IntoScopes for Vec<&str> {
    fn into_scopes(self) -> Vec<String> {
        self.into_iter().map(str::to_string).collect()
    }
}

impl IntoScopes for Vec<String> {
    fn into_scopes(self) -> Vec<String> {
        self
    }
}

impl IntoScopes for &[String] {
    fn into_scopes(self) -> Vec<String> {
        self.to_vec()
    }
}

impl IntoScopes for &Vec<String> {
    fn into_scopes(self) -> Vec<String> {
        self.clone()
    }
}

/// Applicability predicate over sample categories
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplePredicate {
    /// Every sample
    #[default]
    Any,
    /// Only the listed samples
    Only(Vec<String>),
    /// Every sample except the listed ones
    Except(Vec<String>),
}

impl SamplePredicate {
    pub fn only<I, S>(samples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SamplePredicate::Only(samples.into_iter().map(Into::into).collect())
    }

    pub fn except<I, S>(samples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SamplePredicate::Except(samples.into_iter().map(Into::into).collect())
    }

    pub fn matches(&self, sample: &str) -> bool {
        match self {
            SamplePredicate::Any => true,
            SamplePredicate::Only(list) => list.iter().any(|s| s == sample),
            SamplePredicate::Except(list) => !list.iter().any(|s| s == sample),
        }
    }
}

/// Which registered shifts a run expands
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftSelection {
    #[default]
    All,
    None,
    Named(Vec<String>),
}

impl ShiftSelection {
    /// Parse `all`, `none`, or a comma-separated list of shift names
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "all" => ShiftSelection::All,
            "none" | "" => ShiftSelection::None,
            _ => ShiftSelection::Named(
                s.split(',')
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
        }
    }

    pub fn includes(&self, shift: &str) -> bool {
        match self {
            ShiftSelection::All => true,
            ShiftSelection::None => false,
            ShiftSelection::Named(names) => names.iter().any(|n| n == shift),
        }
    }
}

/// Inputs of one compilation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileContext {
    pub era: String,
    pub sample: String,
    pub scopes: Vec<String>,
    #[serde(default)]
    pub shifts: ShiftSelection,
    #[serde(default)]
    pub available_eras: Vec<String>,
    #[serde(default)]
    pub available_samples: Vec<String>,
    #[serde(default)]
    pub available_scopes: Vec<String>,
}

impl CompileContext {
    /// Context for one era/sample over the given scopes
    ///
    /// Available sets start empty, which leaves the corresponding tag
    /// unconstrained.
    pub fn new(era: impl Into<String>, sample: impl Into<String>, scopes: impl IntoScopes) -> Self {
        Self {
            era: era.into(),
            sample: sample.into(),
            scopes: scopes.into_scopes(),
            shifts: ShiftSelection::All,
            available_eras: Vec::new(),
            available_samples: Vec::new(),
            available_scopes: Vec::new(),
        }
    }

    pub fn shifts(mut self, shifts: ShiftSelection) -> Self {
        self.shifts = shifts;
        self
    }

    pub fn available_eras(mut self, eras: impl IntoScopes) -> Self {
        self.available_eras = eras.into_scopes();
        self
    }

    pub fn available_samples(mut self, samples: impl IntoScopes) -> Self {
        self.available_samples = samples.into_scopes();
        self
    }

    pub fn available_scopes(mut self, scopes: impl IntoScopes) -> Self {
        self.available_scopes = scopes.into_scopes();
        self
    }

    /// Check era, sample and scopes against the available sets
    pub fn validate(&self) -> Result<()> {
        check_member("era", &self.era, &self.available_eras)?;
        check_member("sample", &self.sample, &self.available_samples)?;

        if self.scopes.is_empty() {
            return Err(CompileError::config("no scopes requested"));
        }
        for scope in &self.scopes {
            if scope == GLOBAL_SCOPE {
                return Err(CompileError::config(
                    "'global' is implicit and cannot be requested as an analysis scope",
                ));
            }
            check_member("scope", scope, &self.available_scopes)?;
        }
        Ok(())
    }

    /// Whether `scope` may appear in builder calls
    ///
    /// `global`, requested scopes and available scopes are all accepted.
    pub fn is_known_scope(&self, scope: &str) -> bool {
        scope == GLOBAL_SCOPE
            || self.scopes.iter().any(|s| s == scope)
            || self.available_scopes.iter().any(|s| s == scope)
    }

    pub fn is_requested_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

fn check_member(what: &str, value: &str, available: &[String]) -> Result<()> {
    if available.is_empty() || available.iter().any(|a| a == value) {
        Ok(())
    } else {
        Err(CompileError::config(format!(
            "unknown {} '{}'. Available: {}",
            what,
            value,
            available.join(", ")
        )))
    }
}
