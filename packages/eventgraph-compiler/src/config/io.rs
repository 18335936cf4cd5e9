//! Analysis document I/O
//!
//! A declarative analysis in YAML (schema v1). The document lists every
//! scope it knows about; one document serves any (era, sample, scopes)
//! compilation run.
//!
//! ```yaml
//! version: 1
//! eras: ["2017", "2018"]
//! samples: [data, dy]
//! raw_inputs: [event, Muon_pt]
//! producers:
//!   - name: GoodMuons
//!     requires: [Muon_pt]
//!     emits: [good_muons_mask]
//!     parameters: [min_muon_pt]
//! parameters:
//!   - scopes: [global]
//!     values:
//!       min_muon_pt: {by: era, branches: {"2017": 25.0}, default: 20.0}
//! sequences:
//!   - scopes: [mm]
//!     producers: [GoodMuons]
//! outputs:
//!   - scopes: [mm]
//!     quantities: [event]
//! ```

use super::context::{CompileContext, SamplePredicate, GLOBAL_SCOPE};
use super::value::ParameterValue;
use crate::errors::{CompileError, Result};
use crate::pipeline::artifact::ExpandedConfiguration;
use crate::pipeline::compiler::{CompileOptions, Configuration};
use crate::pipeline::producer::{OutputRequest, Producer};
use crate::pipeline::rules::ModificationRule;
use crate::pipeline::shifts::Shift;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Current document schema version
pub const DOCUMENT_VERSION: u32 = 1;

/// YAML Schema v1
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisDocument {
    /// Schema version (always 1 for v1)
    pub version: u32,

    /// Available eras; empty leaves the era unconstrained
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub eras: Vec<String>,

    /// Available sample categories; empty leaves the sample unconstrained
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub samples: Vec<String>,

    #[serde(default)]
    pub raw_inputs: Vec<String>,

    #[serde(default)]
    pub producers: Vec<ProducerDecl>,

    #[serde(default)]
    pub parameters: Vec<ParameterBlock>,

    #[serde(default)]
    pub sequences: Vec<SequenceBlock>,

    #[serde(default)]
    pub rules: Vec<RuleDecl>,

    #[serde(default)]
    pub shifts: Vec<ShiftDecl>,

    #[serde(default)]
    pub outputs: Vec<OutputBlock>,
}

/// Producer declaration; groups list previously declared members by name
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProducerDecl {
    pub name: String,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub emits: Vec<String>,
    #[serde(default)]
    pub output_group: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterBlock {
    pub scopes: Vec<String>,
    pub values: IndexMap<String, ParameterValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SequenceBlock {
    pub scopes: Vec<String>,
    pub producers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplacePair {
    pub old: String,
    pub new: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RuleActionDecl {
    Append { producers: Vec<String> },
    Remove { producers: Vec<String> },
    Replace { pairs: Vec<ReplacePair> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDecl {
    pub scopes: Vec<String>,
    #[serde(default)]
    pub samples: SamplePredicate,
    #[serde(flatten)]
    pub action: RuleActionDecl,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplaceBlock {
    pub scopes: Vec<String>,
    pub pairs: Vec<ReplacePair>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenameBlock {
    pub scopes: Vec<String>,
    pub renames: IndexMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShiftDecl {
    pub name: String,
    #[serde(default)]
    pub samples: SamplePredicate,
    #[serde(default)]
    pub parameters: Vec<ParameterBlock>,
    #[serde(default)]
    pub replace_producers: Vec<ReplaceBlock>,
    #[serde(default)]
    pub rename_quantities: Vec<RenameBlock>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputBlock {
    pub scopes: Vec<String>,
    pub quantities: Vec<OutputRequest>,
}

impl AnalysisDocument {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let doc: AnalysisDocument = serde_yaml::from_str(yaml)?;
        if doc.version != DOCUMENT_VERSION {
            return Err(CompileError::config(format!(
                "unsupported analysis document version {} (expected {})",
                doc.version, DOCUMENT_VERSION
            )));
        }
        Ok(doc)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("loading analysis document {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Every non-global scope the document names, in first-mention order
    pub fn scopes(&self) -> Vec<String> {
        let mut scopes: Vec<String> = Vec::new();
        let lists = self
            .parameters
            .iter()
            .map(|b| &b.scopes)
            .chain(self.sequences.iter().map(|b| &b.scopes))
            .chain(self.rules.iter().map(|r| &r.scopes))
            .chain(self.shifts.iter().flat_map(|s| {
                s.parameters
                    .iter()
                    .map(|b| &b.scopes)
                    .chain(s.replace_producers.iter().map(|b| &b.scopes))
                    .chain(s.rename_quantities.iter().map(|b| &b.scopes))
            }))
            .chain(self.outputs.iter().map(|b| &b.scopes));

        for scope in lists.flatten() {
            if scope != GLOBAL_SCOPE && !scopes.contains(scope) {
                scopes.push(scope.clone());
            }
        }
        scopes
    }

    /// Resolve producer declarations into an arena keyed by name
    fn producer_table(&self) -> Result<IndexMap<String, Producer>> {
        let mut table: IndexMap<String, Producer> = IndexMap::new();
        for decl in &self.producers {
            if table.contains_key(&decl.name) {
                return Err(CompileError::config(format!(
                    "producer '{}' declared twice in analysis document",
                    decl.name
                )));
            }
            let producer = if decl.members.is_empty() {
                Producer::new(decl.name.as_str())
                    .requires(decl.requires.iter().cloned())
                    .emits(decl.emits.iter().cloned())
                    .output_group(decl.output_group.iter().cloned())
                    .parameters(decl.parameters.iter().cloned())
            } else {
                let members = decl
                    .members
                    .iter()
                    .map(|m| lookup(&table, m, &decl.name))
                    .collect::<Result<Vec<_>>>()?;
                Producer::group(decl.name.as_str(), members)
            };
            table.insert(decl.name.clone(), producer);
        }
        Ok(table)
    }

    /// Build a configuration for one run without finalizing it
    ///
    /// Available eras, samples and scopes the context leaves empty are
    /// taken from the document.
    pub fn configure(&self, mut context: CompileContext, options: CompileOptions) -> Result<Configuration> {
        if context.available_eras.is_empty() {
            context.available_eras = self.eras.clone();
        }
        if context.available_samples.is_empty() {
            context.available_samples = self.samples.clone();
        }
        if context.available_scopes.is_empty() {
            context.available_scopes = self.scopes();
        }

        let table = self.producer_table()?;
        let mut config = Configuration::new(context)?.with_options(options);
        config.add_raw_inputs(self.raw_inputs.iter().cloned())?;

        for block in &self.parameters {
            config.add_config_parameters(&block.scopes, block.values.clone())?;
        }

        for block in &self.sequences {
            let producers = block
                .producers
                .iter()
                .map(|name| lookup(&table, name, "sequence"))
                .collect::<Result<Vec<_>>>()?;
            config.add_producers(&block.scopes, &producers)?;
        }

        for (index, rule) in self.rules.iter().enumerate() {
            let referrer = format!("rule #{}", index);
            let built = match &rule.action {
                RuleActionDecl::Append { producers } => ModificationRule::append(
                    producers
                        .iter()
                        .map(|name| lookup(&table, name, &referrer))
                        .collect::<Result<Vec<_>>>()?,
                ),
                RuleActionDecl::Remove { producers } => ModificationRule::remove(producers.iter().cloned()),
                RuleActionDecl::Replace { pairs } => ModificationRule::replace(
                    pairs
                        .iter()
                        .map(|pair| -> Result<(String, Producer)> {
                            Ok((pair.old.clone(), lookup(&table, &pair.new, &referrer)?))
                        })
                        .collect::<Result<Vec<_>>>()?,
                ),
            };
            config.add_modification_rule(&rule.scopes, built.for_samples(rule.samples.clone()))?;
        }

        for decl in &self.shifts {
            let mut shift = Shift::new(decl.name.as_str()).for_samples(decl.samples.clone());
            for block in &decl.parameters {
                shift = shift.parameters(&block.scopes, block.values.clone());
            }
            for block in &decl.replace_producers {
                let pairs = block
                    .pairs
                    .iter()
                    .map(|pair| -> Result<(String, Producer)> {
                        Ok((pair.old.clone(), lookup(&table, &pair.new, &decl.name)?))
                    })
                    .collect::<Result<Vec<_>>>()?;
                shift = shift.replace_producers(&block.scopes, pairs);
            }
            for block in &decl.rename_quantities {
                shift = shift.rename_quantities(&block.scopes, block.renames.clone());
            }
            config.add_shift(shift)?;
        }

        for block in &self.outputs {
            config.add_outputs(&block.scopes, block.quantities.iter().cloned())?;
        }

        Ok(config)
    }

    /// Configure, finalize and return the artifact of one run
    pub fn compile(&self, context: CompileContext, options: CompileOptions) -> Result<ExpandedConfiguration> {
        let mut config = self.configure(context, options)?;
        config.finalize()?;
        config.expanded_configuration()
    }
}

fn lookup(table: &IndexMap<String, Producer>, name: &str, referrer: &str) -> Result<Producer> {
    table.get(name).cloned().ok_or_else(|| {
        CompileError::config(format!(
            "'{}' references undeclared producer '{}'",
            referrer, name
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::value::Value;
    use crate::errors::ErrorKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const DOCUMENT: &str = r#"
version: 1
eras: ["2017", "2018"]
samples: [data, dy]
raw_inputs: [event, Muon_pt, Jet_pt]
producers:
  - name: GoodMuons
    requires: [Muon_pt]
    emits: [good_muons]
    parameters: [min_muon_pt]
  - name: Pt1
    requires: [good_muons]
    emits: [pt_1]
  - name: JEC
    requires: [Jet_pt]
    emits: [jet_pt_corrected]
    parameters: [jet_jes_shift]
  - name: JEC_data
    requires: [Jet_pt]
    emits: [jet_pt_corrected]
  - name: MuonGroup
    members: [GoodMuons, Pt1]
parameters:
  - scopes: [global]
    values:
      jet_jes_shift: 0
  - scopes: [mm]
    values:
      min_muon_pt: {by: era, branches: {"2017": 25.0}, default: 20.0}
sequences:
  - scopes: [global]
    producers: [JEC]
  - scopes: [mm]
    producers: [MuonGroup]
rules:
  - scopes: [global]
    samples: {only: [data]}
    action: replace
    pairs: [{old: JEC, new: JEC_data}]
shifts:
  - name: jesUp
    samples: {except: [data]}
    parameters:
      - scopes: [global]
        values: {jet_jes_shift: 1}
outputs:
  - scopes: [mm]
    quantities: [pt_1, event]
"#;

    fn write(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_yaml_loading() {
        let file = write(DOCUMENT);
        let doc = AnalysisDocument::from_yaml_file(file.path()).unwrap();
        assert_eq!(doc.producers.len(), 5);
        assert_eq!(doc.scopes(), vec!["mm"]);
        assert!(doc.to_yaml().unwrap().contains("version: 1"));
    }

    #[test]
    fn test_compile_mc_sample() {
        let doc = AnalysisDocument::from_yaml_str(DOCUMENT).unwrap();
        let art = doc
            .compile(CompileContext::new("2018", "dy", "mm"), CompileOptions::default())
            .unwrap();

        let nominal = art.nominal("mm").unwrap();
        assert_eq!(nominal.producers, vec!["JEC", "GoodMuons", "Pt1"]);
        assert_eq!(nominal.parameters["min_muon_pt"], Value::Float(20.0));
        assert_eq!(art.variant_names("mm"), vec!["nominal", "jesUp"]);
    }

    #[test]
    fn test_compile_data_sample() {
        let doc = AnalysisDocument::from_yaml_str(DOCUMENT).unwrap();
        let art = doc
            .compile(CompileContext::new("2017", "data", "mm"), CompileOptions::default())
            .unwrap();

        let nominal = art.nominal("mm").unwrap();
        assert_eq!(nominal.producers, vec!["JEC_data", "GoodMuons", "Pt1"]);
        assert_eq!(nominal.parameters["min_muon_pt"], Value::Float(25.0));
        assert_eq!(art.variant_count("mm"), 1);
    }

    #[test]
    fn test_unknown_sample_rejected() {
        let doc = AnalysisDocument::from_yaml_str(DOCUMENT).unwrap();
        let err = doc
            .compile(CompileContext::new("2018", "ttbar", "mm"), CompileOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_yaml_unsupported_version() {
        let err = AnalysisDocument::from_yaml_str("version: 2\n").unwrap_err();
        assert!(err.to_string().contains("unsupported analysis document version 2"));
    }

    #[test]
    fn test_yaml_missing_version() {
        let err = AnalysisDocument::from_yaml_str("raw_inputs: [event]\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Serialization);
    }

    #[test]
    fn test_undeclared_producer_in_sequence() {
        let yaml = "version: 1\nsequences:\n  - scopes: [mm]\n    producers: [Nope]\n";
        let doc = AnalysisDocument::from_yaml_str(yaml).unwrap();
        let err = doc
            .configure(CompileContext::new("2018", "dy", "mm"), CompileOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("undeclared producer 'Nope'"));
    }
}
