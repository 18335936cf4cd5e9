//! Dilepton analysis fixture
//!
//! A small two-channel analysis (`mm`, `ee`) sharing global jet and MET
//! producers. Data samples swap the jet correction and drop generator
//! matching; simulated samples get jet, MET, recoil and muon-cut shifts.

use eventgraph_compiler::config::{CompileContext, ParameterValue, SamplePredicate, GLOBAL_SCOPE};
use eventgraph_compiler::pipeline::{CompileOptions, Configuration, OutputRequest};
use eventgraph_compiler::{ModificationRule, Producer, Shift};

pub const ERAS: [&str; 2] = ["2017", "2018"];
pub const SAMPLES: [&str; 3] = ["data", "dy", "ttbar"];

pub fn context(era: &str, sample: &str) -> CompileContext {
    CompileContext::new(era, sample, ["mm", "ee"])
        .available_eras(ERAS)
        .available_samples(SAMPLES)
        .available_scopes(["mm", "ee"])
}

pub fn recoil_correction() -> Producer {
    Producer::new("RecoilCorrection")
        .requires(["met", "dileptonpair"])
        .emits(["met_recoil"])
        .parameters(["recoil_method"])
}

pub fn mu1_quantities() -> Producer {
    Producer::group(
        "Mu1Quantities",
        vec![
            Producer::new("LVMu1").requires(["dileptonpair", "Muon_pt"]).emits(["p4_1"]),
            Producer::new("Pt1").requires(["p4_1"]).output_group(["pt_1"]),
        ],
    )
}

/// Register the nominal analysis (no shifts)
pub fn nominal_analysis(context: CompileContext, options: CompileOptions) -> Configuration {
    let mut config = Configuration::new(context).unwrap().with_options(options);

    config
        .add_raw_inputs([
            "event",
            "run",
            "Muon_pt",
            "Muon_eta",
            "Electron_pt",
            "Jet_pt",
            "PuppiMET_pt",
            "PuppiMET_ptUnclusteredUp",
            "GenPart_pt",
        ])
        .unwrap();

    config
        .add_config_parameters(
            GLOBAL_SCOPE,
            [
                ("min_jet_pt", ParameterValue::by_era([("2017", 30.0), ("2018", 25.0)])),
                ("jet_jes_shift", ParameterValue::from(0)),
                ("met_shift", ParameterValue::from(0)),
                (
                    "lumi_json",
                    ParameterValue::by_sample([("data", "data/golden.json")]).with_default(""),
                ),
            ],
        )
        .unwrap();
    config
        .add_config_parameters("mm", [("min_muon_pt", ParameterValue::from(20.0))])
        .unwrap();
    config
        .add_config_parameters("mm", [("recoil_method", "quantile")])
        .unwrap();
    config
        .add_config_parameters("ee", [("min_ele_pt", 25.0)])
        .unwrap();

    config
        .add_producers(
            GLOBAL_SCOPE,
            &[
                Producer::new("Lumi").requires(["run"]).emits(["lumi"]).parameters(["lumi_json"]),
                Producer::new("JEC")
                    .requires(["Jet_pt"])
                    .emits(["jet_pt_corrected"])
                    .parameters(["jet_jes_shift"]),
                Producer::new("GoodJets")
                    .requires(["jet_pt_corrected"])
                    .emits(["good_jets"])
                    .parameters(["min_jet_pt"]),
                Producer::new("Met")
                    .requires(["PuppiMET_pt"])
                    .emits(["met"])
                    .parameters(["met_shift"]),
            ],
        )
        .unwrap();

    config
        .add_producers(
            "mm",
            &[
                Producer::new("GoodMuons")
                    .requires(["Muon_pt", "Muon_eta"])
                    .emits(["good_muons"])
                    .parameters(["min_muon_pt"]),
                Producer::new("MuonPair").requires(["good_muons"]).emits(["dileptonpair"]),
                mu1_quantities(),
                Producer::new("GenMatch")
                    .requires(["dileptonpair", "GenPart_pt"])
                    .emits(["gen_match_1"]),
                recoil_correction(),
            ],
        )
        .unwrap();

    config
        .add_producers(
            "ee",
            &[
                Producer::new("GoodElectrons")
                    .requires(["Electron_pt"])
                    .emits(["good_electrons"])
                    .parameters(["min_ele_pt"]),
                Producer::new("ElectronPair").requires(["good_electrons"]).emits(["dileptonpair"]),
                Producer::new("Ele1Pt").requires(["dileptonpair"]).emits(["pt_1"]),
            ],
        )
        .unwrap();

    config
        .add_modification_rule(
            GLOBAL_SCOPE,
            ModificationRule::replace([(
                "JEC",
                Producer::new("JEC_data").requires(["Jet_pt"]).emits(["jet_pt_corrected"]),
            )])
            .for_samples(SamplePredicate::only(["data"])),
        )
        .unwrap();
    config
        .add_modification_rule(
            "mm",
            ModificationRule::remove(["GenMatch"]).for_samples(SamplePredicate::only(["data"])),
        )
        .unwrap();

    config.add_outputs(GLOBAL_SCOPE, ["event", "lumi"]).unwrap();
    config
        .add_outputs(
            "mm",
            [
                OutputRequest::from(&mu1_quantities()),
                OutputRequest::from("met_recoil"),
                OutputRequest::from("gen_match_1"),
            ],
        )
        .unwrap();
    config.add_outputs("ee", ["pt_1", "met"]).unwrap();

    config
}

/// The four simulation shifts of the fixture
pub fn shifts() -> Vec<Shift> {
    vec![
        Shift::new("jesUp")
            .parameters(GLOBAL_SCOPE, [("jet_jes_shift", 1)])
            .for_samples(SamplePredicate::except(["data"])),
        Shift::new("metUnclusteredEnUp")
            .rename_quantities(["mm", "ee"], [("PuppiMET_pt", "PuppiMET_ptUnclusteredUp")])
            .for_samples(SamplePredicate::except(["data"])),
        Shift::new("recoilResponseUp")
            .replace_producers(
                "mm",
                [(
                    "RecoilCorrection",
                    Producer::new("RecoilCorrectionUp")
                        .requires(["met", "dileptonpair"])
                        .emits(["met_recoil"])
                        .parameters(["recoil_method"]),
                )],
            )
            .for_samples(SamplePredicate::only(["dy"])),
        Shift::new("muonPtCutUp")
            .parameters("mm", [("min_muon_pt", 21.0)])
            .for_samples(SamplePredicate::except(["data"])),
    ]
}

/// Full analysis with every shift registered
pub fn dilepton_analysis(context: CompileContext, options: CompileOptions) -> Configuration {
    let mut config = nominal_analysis(context, options);
    for shift in shifts() {
        config.add_shift(shift).unwrap();
    }
    config
}

/// Finalized full analysis with default options
pub fn compiled(era: &str, sample: &str) -> eventgraph_compiler::ExpandedConfiguration {
    let mut config = dilepton_analysis(context(era, sample), CompileOptions::default());
    config.finalize().unwrap();
    config.expanded_configuration().unwrap()
}
