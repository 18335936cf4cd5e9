//! Parameter values and conditional resolvers
//!
//! A parameter is either a literal or a branch keyed on the run's era or
//! sample category. Branch values may be resolvers themselves, so an era
//! branch can hold a per-sample branch.

use crate::errors::{CompileError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Literal parameter value as handed to the execution engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Str(v) => write!(f, "{}", v),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

impl Value {
    /// False for NaN / infinite floats anywhere in the value
    ///
    /// JSON has no representation for them, so they cannot reach the artifact.
    pub fn is_finite(&self) -> bool {
        match self {
            Value::Float(v) => v.is_finite(),
            Value::List(items) => items.iter().all(Value::is_finite),
            _ => true,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// Which tag of the run a conditional branches on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionKey {
    Era,
    Sample,
}

impl ConditionKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionKey::Era => "era",
            ConditionKey::Sample => "sample",
        }
    }
}

impl fmt::Display for ConditionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Era and sample category of one compilation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionContext<'a> {
    pub era: &'a str,
    pub sample: &'a str,
}

impl<'a> ResolutionContext<'a> {
    pub fn new(era: &'a str, sample: &'a str) -> Self {
        Self { era, sample }
    }

    fn tag(&self, key: ConditionKey) -> &'a str {
        match key {
            ConditionKey::Era => self.era,
            ConditionKey::Sample => self.sample,
        }
    }
}

/// Branching resolver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionalValue {
    #[serde(rename = "by")]
    pub key: ConditionKey,
    pub branches: IndexMap<String, ParameterValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Box<ParameterValue>>,
}

/// A stored parameter: literal or conditional
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Literal(Value),
    Branch(ConditionalValue),
}

impl ParameterValue {
    /// Era-keyed resolver without default
    pub fn by_era<K, V, I>(branches: I) -> Self
    where
        K: Into<String>,
        V: Into<ParameterValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::branch(ConditionKey::Era, branches)
    }

    /// Sample-keyed resolver without default
    pub fn by_sample<K, V, I>(branches: I) -> Self
    where
        K: Into<String>,
        V: Into<ParameterValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::branch(ConditionKey::Sample, branches)
    }

    fn branch<K, V, I>(key: ConditionKey, branches: I) -> Self
    where
        K: Into<String>,
        V: Into<ParameterValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        ParameterValue::Branch(ConditionalValue {
            key,
            branches: branches
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            default: None,
        })
    }

    /// Attach a fallback for tags without a branch (no-op on literals)
    pub fn with_default(self, default: impl Into<ParameterValue>) -> Self {
        match self {
            ParameterValue::Branch(mut cond) => {
                cond.default = Some(Box::new(default.into()));
                ParameterValue::Branch(cond)
            }
            literal => literal,
        }
    }

    pub fn is_conditional(&self) -> bool {
        matches!(self, ParameterValue::Branch(_))
    }

    /// Evaluate against the run's era/sample
    ///
    /// `scope` and `name` only label the error.
    pub fn resolve(&self, ctx: &ResolutionContext<'_>, scope: &str, name: &str) -> Result<Value> {
        match self {
            ParameterValue::Literal(v) if v.is_finite() => Ok(v.clone()),
            ParameterValue::Literal(v) => Err(CompileError::config(format!(
                "parameter '{}' in scope '{}' is not a finite number: {}",
                name, scope, v
            ))),
            ParameterValue::Branch(cond) => {
                let tag = ctx.tag(cond.key);
                let chosen = cond
                    .branches
                    .get(tag)
                    .or(cond.default.as_deref())
                    .ok_or_else(|| CompileError::UnresolvedConditional {
                        scope: scope.to_string(),
                        name: name.to_string(),
                        key: cond.key.to_string(),
                        tag: tag.to_string(),
                    })?;
                chosen.resolve(ctx, scope, name)
            }
        }
    }
}

macro_rules! literal_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ParameterValue {
                fn from(v: $ty) -> Self {
                    ParameterValue::Literal(v.into())
                }
            }
        )*
    };
}

literal_from!(Value, bool, i32, i64, f64, &str, String);

impl<T: Into<Value>> From<Vec<T>> for ParameterValue {
    fn from(items: Vec<T>) -> Self {
        ParameterValue::Literal(items.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_literal_resolves_to_itself() {
        let ctx = ResolutionContext::new("2018", "dy");
        let v = ParameterValue::from(2.4);
        assert_eq!(v.resolve(&ctx, "global", "max_eta").unwrap(), Value::Float(2.4));
    }

    #[test]
    fn test_era_branch_and_default() {
        let v = ParameterValue::by_era([("2017", 0.304), ("2018", 0.2783)]).with_default(0.3);
        let hit = v.resolve(&ResolutionContext::new("2018", "dy"), "global", "btag_cut");
        assert_eq!(hit.unwrap(), Value::Float(0.2783));

        let fallback = v.resolve(&ResolutionContext::new("2016", "dy"), "global", "btag_cut");
        assert_eq!(fallback.unwrap(), Value::Float(0.3));
    }

    #[test]
    fn test_missing_branch_without_default_fails() {
        let v = ParameterValue::by_sample([("wj", true)]);
        let err = v
            .resolve(&ResolutionContext::new("2018", "data"), "mm", "applyRecoil")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedConditional);
        assert!(err.to_string().contains("sample 'data'"));
    }

    #[test]
    fn test_nested_branches() {
        let v = ParameterValue::by_era([(
            "2018",
            ParameterValue::by_sample([("data", "\"\"")]).with_default("Summer19UL18_V5_MC"),
        )]);
        let ctx = ResolutionContext::new("2018", "ttbar");
        assert_eq!(
            v.resolve(&ctx, "global", "jet_jes_tag").unwrap(),
            Value::Str("Summer19UL18_V5_MC".to_string())
        );
    }

    #[test]
    fn test_with_default_ignored_on_literal() {
        let v = ParameterValue::from(1).with_default(2);
        assert_eq!(v, ParameterValue::Literal(Value::Int(1)));
    }

    #[test]
    fn test_non_finite_literal_rejected() {
        let ctx = ResolutionContext::new("2018", "dy");
        let err = ParameterValue::from(f64::NAN)
            .resolve(&ctx, "mm", "met_scale")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.to_string().contains("'met_scale'"));

        let nested = ParameterValue::by_era([("2018", vec![1.0, f64::INFINITY])]);
        assert!(nested.resolve(&ctx, "mm", "bins").is_err());
        assert!(ParameterValue::by_era([("2017", f64::NAN)]).with_default(1.0).resolve(&ctx, "mm", "x").is_ok());
    }

    #[test]
    fn test_yaml_shapes() {
        let literal: ParameterValue = serde_yaml::from_str("[\"Flag_a\", \"Flag_b\"]").unwrap();
        assert_eq!(
            literal,
            ParameterValue::Literal(Value::List(vec![
                Value::Str("Flag_a".to_string()),
                Value::Str("Flag_b".to_string())
            ]))
        );

        let branch: ParameterValue =
            serde_yaml::from_str("by: era\nbranches:\n  \"2018\": 2.5\ndefault: 2.4\n").unwrap();
        assert!(branch.is_conditional());
        let ctx = ResolutionContext::new("2016", "dy");
        assert_eq!(branch.resolve(&ctx, "global", "eta").unwrap(), Value::Float(2.4));
    }
}
