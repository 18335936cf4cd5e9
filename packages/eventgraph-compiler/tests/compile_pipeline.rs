//! End-to-end compilation tests over the dilepton fixture

mod common;

use common::*;
use eventgraph_compiler::config::{CompileContext, ShiftSelection, Value, GLOBAL_SCOPE};
use eventgraph_compiler::pipeline::{CompileOptions, Configuration};
use eventgraph_compiler::{ErrorKind, ModificationRule, Producer, Shift};
use pretty_assertions::assert_eq;

#[test]
fn test_expanded_configuration_is_idempotent() {
    let mut config = dilepton_analysis(context("2018", "dy"), CompileOptions::default());
    config.finalize().unwrap();

    let first = config.expanded_configuration().unwrap();
    let second = config.expanded_configuration().unwrap();
    assert_eq!(first, second);
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
}

#[test]
fn test_nominal_mm_producers_and_parameters() {
    let art = compiled("2018", "dy");
    let nominal = art.nominal("mm").unwrap();

    assert_eq!(
        nominal.producers,
        names(&[
            "Lumi",
            "JEC",
            "GoodJets",
            "Met",
            "GoodMuons",
            "MuonPair",
            "LVMu1",
            "Pt1",
            "GenMatch",
            "RecoilCorrection",
        ])
    );
    assert_eq!(nominal.parameters["min_jet_pt"], Value::Float(25.0));
    assert_eq!(nominal.parameters["min_muon_pt"], Value::Float(20.0));
    assert_eq!(nominal.parameters["lumi_json"], Value::Str(String::new()));
    assert!(!nominal.parameters.contains_key("min_ele_pt"));
    assert_eq!(
        nominal.outputs,
        names(&["event", "lumi", "pt_1", "met_recoil", "gen_match_1"])
    );
}

#[test]
fn test_data_sample_rules() {
    let art = compiled("2017", "data");
    let mm = art.nominal("mm").unwrap();

    // JEC swapped in place, generator matching and its output gone
    assert_eq!(mm.producers[1], "JEC_data");
    assert!(!mm.producers.contains(&"GenMatch".to_string()));
    assert!(!mm.outputs.contains(&"gen_match_1".to_string()));
    assert_eq!(mm.parameters["min_jet_pt"], Value::Float(30.0));
    assert_eq!(mm.parameters["lumi_json"], Value::Str("data/golden.json".to_string()));

    // global rule reaches ee too
    assert_eq!(art.nominal("ee").unwrap().producers[1], "JEC_data");
}

#[test]
fn test_variant_count_is_one_plus_applicable_shifts() {
    let dy = compiled("2018", "dy");
    assert_eq!(
        dy.variant_names("mm"),
        vec!["nominal", "jesUp", "metUnclusteredEnUp", "recoilResponseUp", "muonPtCutUp"]
    );
    assert_eq!(dy.variant_names("ee"), vec!["nominal", "jesUp", "metUnclusteredEnUp"]);

    let ttbar = compiled("2018", "ttbar");
    assert_eq!(ttbar.variant_count("mm"), 4);
    assert_eq!(ttbar.variant_count("ee"), 3);

    let data = compiled("2018", "data");
    assert_eq!(data.variant_count("mm"), 1);
    assert_eq!(data.variant_count("ee"), 1);
}

#[test]
fn test_shift_selection_limits_variants() {
    let ctx = context("2018", "dy").shifts(ShiftSelection::from_str("jesUp"));
    let mut config = dilepton_analysis(ctx, CompileOptions::default());
    config.finalize().unwrap();
    let art = config.expanded_configuration().unwrap();
    assert_eq!(art.variant_names("mm"), vec!["nominal", "jesUp"]);
}

#[test]
fn test_shift_variants_keep_nominal_untouched() {
    let art = compiled("2018", "dy");
    let nominal = art.nominal("mm").unwrap();

    let jes = art.variant("mm", "jesUp").unwrap();
    assert_eq!(jes.parameters["jet_jes_shift"], Value::Int(1));
    assert_eq!(nominal.parameters["jet_jes_shift"], Value::Int(0));
    assert_eq!(jes.producers, nominal.producers);

    let recoil = art.variant("mm", "recoilResponseUp").unwrap();
    assert_eq!(recoil.producers.last().unwrap(), "RecoilCorrectionUp");
    assert_eq!(nominal.producers.last().unwrap(), "RecoilCorrection");

    let met = art.variant("mm", "metUnclusteredEnUp").unwrap();
    assert_eq!(met.quantity_renames["PuppiMET_pt"], "PuppiMET_ptUnclusteredUp");
    assert!(nominal.quantity_renames.is_empty());
}

#[test]
fn test_split_points() {
    let art = compiled("2018", "dy");
    let split = |variant: &str| art.variant("mm", variant).unwrap().split_point;

    assert_eq!(art.nominal("mm").unwrap().split_point, None);
    assert_eq!(split("jesUp"), Some(1));
    assert_eq!(split("metUnclusteredEnUp"), Some(3));
    assert_eq!(split("muonPtCutUp"), Some(4));
    assert_eq!(split("recoilResponseUp"), Some(9));

    let plan = art.plan("mm").unwrap();
    assert_eq!(plan.shared_prefix(), &["Lumi".to_string()]);
    for branch in &plan.branches {
        assert_eq!(
            branch.producers(),
            art.variant("mm", &branch.variant).unwrap().producers
        );
    }
}

#[test]
fn test_nominal_independent_of_registered_shifts() {
    for sample in SAMPLES {
        let mut bare = nominal_analysis(context("2018", sample), CompileOptions::default());
        bare.finalize().unwrap();
        let bare = bare.expanded_configuration().unwrap();

        let full = compiled("2018", sample);
        for scope in ["mm", "ee"] {
            let a = serde_json::to_string(bare.nominal(scope).unwrap()).unwrap();
            let b = serde_json::to_string(full.nominal(scope).unwrap()).unwrap();
            assert_eq!(a, b, "nominal {} differs for sample {}", scope, sample);
        }
    }
}

#[test]
fn test_optimizer_does_not_change_semantic_content() {
    let optimized = compiled("2018", "dy");

    let mut plain = dilepton_analysis(context("2018", "dy"), CompileOptions { optimize: false });
    let report = plain.finalize().unwrap();
    let plain = plain.expanded_configuration().unwrap();

    assert!(!report.optimized);
    assert!(plain
        .scopes
        .values()
        .flat_map(|variants| variants.values())
        .all(|config| config.split_point.is_none()));
    assert_eq!(plain, optimized.semantic_content());
}

#[test]
fn test_registration_order_does_not_affect_execution_order() {
    let mut config = Configuration::new(CompileContext::new("2018", "dy", "mm")).unwrap();
    config.add_raw_inputs(["raw"]).unwrap();
    config
        .add_producers(
            "mm",
            &[
                Producer::new("P2").requires(["X"]).emits(["Y"]),
                Producer::new("P1").requires(["raw"]).emits(["X"]),
            ],
        )
        .unwrap();
    config.add_outputs("mm", ["Y"]).unwrap();
    config.finalize().unwrap();

    let art = config.expanded_configuration().unwrap();
    assert_eq!(art.nominal("mm").unwrap().producers, names(&["P1", "P2"]));
}

#[test]
fn test_cycle_fails_at_validation() {
    let mut config = Configuration::new(CompileContext::new("2018", "dy", "mm")).unwrap();
    config
        .add_producers(
            "mm",
            &[
                Producer::new("P1").requires(["Y"]).emits(["X"]),
                Producer::new("P2").requires(["X"]).emits(["Y"]),
            ],
        )
        .unwrap();

    config.optimize().unwrap();
    let err = config.validate().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CyclicDependency);
    assert!(err.to_string().contains("P1 -> P2 -> P1"));
}

#[test]
fn test_replace_with_absent_target_appends() {
    let mut config = nominal_analysis(context("2018", "dy"), CompileOptions::default());
    config
        .add_modification_rule("ee", ModificationRule::remove(["Ele1Pt"]))
        .unwrap();
    config
        .add_modification_rule(
            "ee",
            ModificationRule::replace([(
                "Ele1Pt",
                Producer::new("Ele1PtCorrected").requires(["dileptonpair"]).emits(["pt_1"]),
            )]),
        )
        .unwrap();
    config.finalize().unwrap();

    let art = config.expanded_configuration().unwrap();
    let ee = art.nominal("ee").unwrap();
    assert_eq!(ee.producers.last().unwrap(), "Ele1PtCorrected");
    assert!(!ee.producers.contains(&"Ele1Pt".to_string()));
}

#[test]
fn test_parameter_delta_changes_only_its_variant() {
    let mut config = Configuration::new(CompileContext::new("2018", "dy", "mm")).unwrap();
    config.add_config_parameters("mm", [("foo", 1)]).unwrap();
    config
        .add_producers("mm", &[Producer::new("UsesFoo").emits(["bar"]).parameters(["foo"])])
        .unwrap();
    config.add_outputs("mm", ["bar"]).unwrap();
    config.add_shift(Shift::new("fooUp").parameters("mm", [("foo", 2)])).unwrap();
    config.finalize().unwrap();

    let art = config.expanded_configuration().unwrap();
    assert_eq!(art.nominal("mm").unwrap().parameters["foo"], Value::Int(1));
    assert_eq!(art.variant("mm", "fooUp").unwrap().parameters["foo"], Value::Int(2));
}

#[test]
fn test_unemitted_output_names_quantity_and_variant() {
    let mut config = nominal_analysis(context("2018", "dy"), CompileOptions::default());
    config
        .add_shift(Shift::new("recoilOff").replace_producers(
            "mm",
            [(
                "RecoilCorrection",
                Producer::new("NoRecoil").requires(["met"]).emits(["met_uncorrected"]),
            )],
        ))
        .unwrap();

    config.optimize().unwrap();
    let err = config.validate().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutputNotEmitted);
    let message = err.to_string();
    assert!(message.contains("met_recoil"));
    assert!(message.contains("recoilOff"));
}

#[test]
fn test_multiple_violations_reported_together() {
    let mut config = Configuration::new(CompileContext::new("2018", "dy", ["mm", "ee"])).unwrap();
    config
        .add_producers(GLOBAL_SCOPE, &[Producer::new("NeedsRaw").requires(["run"]).emits(["lumi"])])
        .unwrap();
    config.add_outputs("ee", ["pt_1"]).unwrap();
    config.optimize().unwrap();

    let err = config.validate().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Violations);
    // NeedsRaw fails in both scopes, ee also misses its output
    assert_eq!(err.violations().len(), 3);
    assert!(err.has_kind(ErrorKind::UnsatisfiedInput));
    assert!(err.has_kind(ErrorKind::OutputNotEmitted));
}

#[test]
fn test_unknown_producer_reference() {
    let mut config = nominal_analysis(context("2018", "dy"), CompileOptions::default());
    config
        .add_modification_rule("ee", ModificationRule::remove(["GenMatch"]))
        .unwrap();
    let err = config.optimize().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownProducerReference);
    assert!(err.to_string().contains("scope 'ee'"));
}

#[test]
fn test_unresolved_conditional_names_parameter() {
    let ctx = CompileContext::new("2016", "dy", ["mm", "ee"]);
    let mut config = nominal_analysis(ctx, CompileOptions::default());
    let err = config.optimize().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnresolvedConditional);
    assert!(err.to_string().contains("min_jet_pt"));
}

#[test]
fn test_report_summarises_run() {
    let mut config = dilepton_analysis(context("2018", "dy"), CompileOptions::default());
    let report = config.finalize().unwrap();

    assert_eq!(report.scopes.len(), 2);
    assert_eq!(report.total_variants(), 8);
    assert!(report.diagnostics.is_empty());
    let mm = &report.scopes[0];
    assert_eq!(mm.producers, 10);
    assert!(mm.provenance.contains("min_muon_pt ← scope:mm"));
    assert!(report.summary().contains("jesUp shares 1 producers"));
}

#[test]
fn test_self_required_quantity_fails_validation() {
    let mut config = Configuration::new(CompileContext::new("2018", "dy", "mm")).unwrap();
    config
        .add_producers("mm", &[Producer::new("P").requires(["X"]).emits(["X", "Y"])])
        .unwrap();
    config.add_outputs("mm", ["Y"]).unwrap();
    config.optimize().unwrap();

    let err = config.validate().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsatisfiedInput);
    assert!(err.to_string().contains("'X'"));
    assert_eq!(config.expanded_configuration().unwrap_err().kind(), ErrorKind::NotFinalized);
}

#[test]
fn test_global_shift_does_not_override_scope_entry() {
    let mut config = Configuration::new(CompileContext::new("2018", "dy", ["mm", "ee"])).unwrap();
    config.add_config_parameters(GLOBAL_SCOPE, [("min_pt", 20.0)]).unwrap();
    config.add_config_parameters("mm", [("min_pt", 25.0)]).unwrap();
    config
        .add_producers(GLOBAL_SCOPE, &[Producer::new("Sel").emits(["sel"]).parameters(["min_pt"])])
        .unwrap();
    config.add_outputs(GLOBAL_SCOPE, ["sel"]).unwrap();
    config
        .add_shift(Shift::new("globalUp").parameters(GLOBAL_SCOPE, [("min_pt", 21.0)]))
        .unwrap();
    config.finalize().unwrap();

    let art = config.expanded_configuration().unwrap();
    assert_eq!(art.nominal("mm").unwrap().parameters["min_pt"], Value::Float(25.0));
    assert_eq!(art.variant("mm", "globalUp").unwrap().parameters["min_pt"], Value::Float(25.0));
    assert_eq!(art.nominal("ee").unwrap().parameters["min_pt"], Value::Float(20.0));
    assert_eq!(art.variant("ee", "globalUp").unwrap().parameters["min_pt"], Value::Float(21.0));
}
