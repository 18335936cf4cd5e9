//! Producer declarations
//!
//! A producer is an opaque processing unit. The compiler only sees its
//! name, the quantities it requires and emits, the parameters it reads,
//! and an optional output group. A group producer bundles member producers
//! into one unit for rules and ordering.

use crate::errors::{CompileError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Declared processing unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Producer {
    pub name: String,

    /// Quantities read from upstream producers or the raw input schema
    #[serde(default)]
    pub requires: Vec<String>,

    /// Quantities written
    #[serde(default)]
    pub emits: Vec<String>,

    /// Subset of `emits` requestable as one output entry
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_group: Vec<String>,

    /// Parameter names the unit reads
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<String>,

    /// Member units, in execution order (groups only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<Producer>,
}

impl Producer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            requires: Vec::new(),
            emits: Vec::new(),
            output_group: Vec::new(),
            parameters: Vec::new(),
            members: Vec::new(),
        }
    }

    pub fn requires<I, S>(mut self, quantities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        extend_unique(&mut self.requires, quantities);
        self
    }

    pub fn emits<I, S>(mut self, quantities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        extend_unique(&mut self.emits, quantities);
        self
    }

    /// Declare an output group; its quantities are also emitted
    pub fn output_group<I, S>(mut self, quantities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let quantities: Vec<String> = quantities.into_iter().map(Into::into).collect();
        extend_unique(&mut self.emits, quantities.iter().cloned());
        extend_unique(&mut self.output_group, quantities);
        self
    }

    pub fn parameters<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        extend_unique(&mut self.parameters, names);
        self
    }

    /// Bundle members into one unit
    ///
    /// The group requires what its members require and do not emit
    /// themselves, and emits the union of member emissions.
    pub fn group(name: impl Into<String>, members: Vec<Producer>) -> Self {
        let mut group = Producer::new(name);
        let internal: BTreeSet<&str> = members
            .iter()
            .flat_map(|m| m.emits.iter().map(String::as_str))
            .collect();

        for member in &members {
            extend_unique(
                &mut group.requires,
                member
                    .requires
                    .iter()
                    .filter(|q| !internal.contains(q.as_str()))
                    .cloned(),
            );
            extend_unique(&mut group.emits, member.emits.iter().cloned());
            extend_unique(&mut group.output_group, member.output_group.iter().cloned());
            extend_unique(&mut group.parameters, member.parameters.iter().cloned());
        }
        group.members = members;
        group
    }

    pub fn is_group(&self) -> bool {
        !self.members.is_empty()
    }

    /// Leaf unit names in execution order
    pub fn unit_names(&self) -> Vec<String> {
        if self.is_group() {
            self.members.iter().flat_map(Producer::unit_names).collect()
        } else {
            vec![self.name.clone()]
        }
    }

    /// Output request for this producer's output group
    pub fn as_output_group(&self) -> OutputRequest {
        OutputRequest::Group {
            group: self.name.clone(),
        }
    }

    /// Declaration consistency (output group within emits, members valid)
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CompileError::config("producer with empty name"));
        }
        if let Some(q) = self.output_group.iter().find(|q| !self.emits.contains(q)) {
            return Err(CompileError::config(format!(
                "producer '{}' lists '{}' in its output group but does not emit it",
                self.name, q
            )));
        }
        for member in &self.members {
            member.validate()?;
        }
        Ok(())
    }
}

fn extend_unique<I, S>(target: &mut Vec<String>, items: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    for item in items {
        let item = item.into();
        if !target.contains(&item) {
            target.push(item);
        }
    }
}

/// One entry of an output specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputRequest {
    Quantity(String),
    Group { group: String },
}

impl From<&str> for OutputRequest {
    fn from(q: &str) -> Self {
        OutputRequest::Quantity(q.to_string())
    }
}

impl From<String> for OutputRequest {
    fn from(q: String) -> Self {
        OutputRequest::Quantity(q)
    }
}

impl From<&Producer> for OutputRequest {
    fn from(p: &Producer) -> Self {
        p.as_output_group()
    }
}

/// Raw record fields provided by the external event schema
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputSchema {
    quantities: BTreeSet<String>,
}

impl InputSchema {
    pub fn new<I, S>(quantities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            quantities: quantities.into_iter().map(Into::into).collect(),
        }
    }

    pub fn extend<I, S>(&mut self, quantities: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.quantities.extend(quantities.into_iter().map(Into::into));
    }

    pub fn contains(&self, quantity: &str) -> bool {
        self.quantities.contains(quantity)
    }

    pub fn len(&self) -> usize {
        self.quantities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quantities.is_empty()
    }
}
