//! Configuration Tests.
//!
//! Parsing fills unspecified sections with defaults, validation rejects
//! geometries the components cannot work with, and runtime patches reach a
//! component through its `config` message.

use crate::common::asm::{A0, add, addi, exit, lui, lw, program, sw};
use crate::common::harness::{self, config};
use nebula_core::common::{ConfigError, ProtocolError, SimError};
use nebula_core::config::{self, CacheConfig, Config, PredictorType};
use nebula_core::Simulation;
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;

// ══════════════════════════════════════════════════════════
// 1. Parsing
// ══════════════════════════════════════════════════════════

#[test]
fn partial_json_keeps_defaults_elsewhere() {
    let config = Config::from_json(r#"{"simulation": {"cores": 2}, "l1dc": {"nsets": 64}}"#).unwrap();
    let defaults = Config::default();
    assert_eq!(config.simulation.cores, 2);
    assert_eq!(config.l1dc.nsets, 64);
    assert_eq!(config.l1dc.nways, defaults.l1dc.nways, "unspecified fields keep their default");
    assert_eq!(config.l2.nsets, defaults.l2.nsets);
}

#[test]
fn default_configuration_is_valid_and_round_trips() {
    let defaults = Config::default();
    defaults.validate().unwrap();
    let text = serde_json::to_string(&defaults).unwrap();
    let parsed = Config::from_json(&text).unwrap();
    assert_eq!(parsed.l2.nsets, defaults.l2.nsets);
    assert_eq!(parsed.brpred.predictor_type, defaults.brpred.predictor_type);
}

#[test]
fn unparsable_text_is_a_parse_error() {
    assert!(matches!(Config::from_json("{not json"), Err(ConfigError::Parse(_))));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::from_file(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn config_file_is_read_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nebula.json");
    std::fs::write(&path, r#"{"brpred": {"predictor_type": "gshare"}}"#).unwrap();
    let config = Config::from_file(&path).unwrap();
    assert_eq!(config.brpred.predictor_type, PredictorType::Gshare);
}

// ══════════════════════════════════════════════════════════
// 2. Validation
// ══════════════════════════════════════════════════════════

#[rstest]
#[case::no_cores(json!({"simulation": {"cores": 0}}))]
#[case::odd_set_count(json!({"l1dc": {"nsets": 3}}))]
#[case::zero_ways(json!({"l1ic": {"nways": 0}}))]
#[case::l2_block_smaller_than_l1(json!({"l1dc": {"blocksize": 64}, "l2": {"blocksize": 32}}))]
#[case::decode_buffer_too_small(json!({"decode": {"buffer_capacity": 8}}))]
#[case::odd_page_size(json!({"mmu": {"pagesize": 3000}}))]
#[case::odd_btac(json!({"brpred": {"btac_entries": 12}}))]
#[case::no_issue_width(json!({"pipeline": {"issue_width": 0}}))]
fn invalid_configurations_are_rejected(#[case] text: serde_json::Value) {
    let err = Config::from_json(&text.to_string()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)), "{text} gave {err}");
}

#[test]
fn simulation_refuses_an_invalid_configuration() {
    let mut config = config();
    config.l1ic.nsets = 5;
    let err = Simulation::new(config, program(0x1000, &exit())).run().unwrap_err();
    assert!(matches!(err, SimError::Config(ConfigError::Invalid(_))));
}

// ══════════════════════════════════════════════════════════
// 3. Patching
// ══════════════════════════════════════════════════════════

#[test]
fn patch_replaces_one_field() {
    let mut cache = CacheConfig::default();
    config::patch(&mut cache, "lsu", "nsets", &json!(4)).unwrap();
    assert_eq!(cache.nsets, 4);
    assert_eq!(cache.nways, CacheConfig::default().nways);
}

#[test]
fn patch_follows_dotted_paths() {
    let mut whole = Config::default();
    config::patch(&mut whole, "cli", "l1ic.nways", &json!(8)).unwrap();
    assert_eq!(whole.l1ic.nways, 8);
}

#[test]
fn patch_rejects_unknown_fields() {
    let mut cache = CacheConfig::default();
    let err = config::patch(&mut cache, "lsu", "bogus", &json!(1)).unwrap_err();
    match err {
        ProtocolError::UnknownConfigField { service, field } => {
            assert_eq!(service, "lsu");
            assert_eq!(field, "bogus");
        }
        other => panic!("expected UnknownConfigField, got {other}"),
    }
}

#[test]
fn patch_rejects_ill_typed_values_and_keeps_the_old_value() {
    let mut cache = CacheConfig::default();
    let before = cache.nsets;
    let err = config::patch(&mut cache, "lsu", "nsets", &json!("many")).unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidConfigValue { .. }));
    assert_eq!(cache.nsets, before);
}

#[test]
fn runtime_patch_reshapes_the_data_cache() {
    // Two words 64 bytes apart collide in a 2-set, 1-way cache of 16-byte blocks.
    let mut words = vec![
        lui(6, 0x20000),
        addi(7, 0, 11),
        sw(7, 6, 0),
        addi(7, 0, 31),
        sw(7, 6, 64),
        lw(8, 6, 0),
        lw(9, 6, 64),
        add(A0, 8, 9),
    ];
    words.extend(exit());
    let report = Simulation::new(config(), program(0x1000, &words))
        .configure("lsu", "nsets", json!(2))
        .configure("lsu", "nways", json!(1))
        .configure("lsu", "blocksize", json!(16))
        .run()
        .unwrap();
    assert_eq!(report.exit_code(), Some(42), "values survive the evictions");
}

#[test]
fn runtime_patch_of_an_unknown_field_aborts_the_run() {
    harness::init_tracing();
    let err = Simulation::new(config(), program(0x1000, &exit()))
        .configure("lsu", "bogus", json!(1))
        .run()
        .unwrap_err();
    match err {
        SimError::Protocol(ProtocolError::ComponentFault { service, reason, .. }) => {
            assert_eq!(service, "lsu");
            assert!(reason.contains("bogus"), "reason: {reason}");
        }
        other => panic!("expected a component fault, got {other}"),
    }
}

#[test]
fn forwarding_can_be_switched_off_at_runtime() {
    let report = Simulation::new(config(), program(0x1000, &[addi(A0, 0, 7), addi(17, 0, 93), 0x73, 0x6f]))
        .configure("issue", "result_forwarding", json!(false))
        .run()
        .unwrap();
    assert_eq!(report.exit_code(), Some(7));
}
