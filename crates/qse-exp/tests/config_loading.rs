mod fixtures;

use std::fs;

use fixtures::{bell_observables, config};
use qse_bench::ShotGrid;
use qse_est::FwerMethod;
use qse_exp::{load_sweep_config, to_canonical_json_bytes};
use qse_proto::ProtocolKind;
use tempfile::tempdir;

const SWEEP_YAML: &str = r#"
observables:
  sites: 2
  observables:
    - id: zz
      paulis: [Z, Z]
      coefficient: 1.0
    - id: xx
      paulis: [X, X]
      coefficient: -1.0
protocols: [direct_grouped, shadow, adaptive_grouped]
grid:
  kind: geometric
  n_min: 100
  ratio: 2.0
  n_max: 1000
replicates: 3
seed: 42
confidence_level: 0.95
adaptive:
  max_rounds: 3
fwer:
  method: bonferroni
  delta: 0.05
epsilon: 0.1
scheduler:
  parallelism: 2
"#;

#[test]
fn loads_yaml_with_defaults_filled_in() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sweep.yaml");
    fs::write(&path, SWEEP_YAML).unwrap();

    let config = load_sweep_config(&path).unwrap();
    assert_eq!(config.observables.len(), 2);
    assert_eq!(
        config.protocols,
        vec![
            ProtocolKind::DirectGrouped,
            ProtocolKind::Shadow,
            ProtocolKind::AdaptiveGrouped
        ]
    );
    assert_eq!(config.grid.resolve().unwrap(), vec![100, 200, 400, 800, 1000]);
    assert_eq!(config.replicates, 3);
    assert_eq!(config.seed, 42);
    assert_eq!(config.adaptive.max_rounds, 3);
    assert_eq!(config.estimator.ess_threshold, 100);
    assert_eq!(config.fwer.unwrap().method, FwerMethod::Bonferroni);
    assert_eq!(config.scheduler.parallelism, 2);
    assert!(config.noise.is_none());
}

#[test]
fn loads_json_written_from_a_config() {
    let original = config(bell_observables(), vec![ProtocolKind::Shadow], vec![100, 300], 2);
    let dir = tempdir().unwrap();
    let path = dir.path().join("sweep.json");
    fs::write(&path, to_canonical_json_bytes(&original).unwrap()).unwrap();

    let loaded = load_sweep_config(&path).unwrap();
    assert_eq!(loaded.protocols, original.protocols);
    assert_eq!(loaded.grid, ShotGrid::Explicit { values: vec![100, 300] });
    assert_eq!(loaded.observables.ids(), original.observables.ids());
    assert_eq!(loaded.seed, original.seed);
}

#[test]
fn rejects_unknown_extensions_and_invalid_values() {
    let dir = tempdir().unwrap();
    let toml = dir.path().join("sweep.toml");
    fs::write(&toml, "seed = 1").unwrap();
    assert_eq!(
        load_sweep_config(&toml).unwrap_err().info().code,
        "unsupported-config-format"
    );

    let bad_ratio = dir.path().join("ratio.yaml");
    fs::write(&bad_ratio, SWEEP_YAML.replace("ratio: 2.0", "ratio: 1.0")).unwrap();
    assert!(load_sweep_config(&bad_ratio).unwrap_err().is_configuration());

    let bad_delta = dir.path().join("delta.yaml");
    fs::write(&bad_delta, SWEEP_YAML.replace("delta: 0.05", "delta: 1.5")).unwrap();
    assert_eq!(load_sweep_config(&bad_delta).unwrap_err().info().code, "invalid-delta");

    let missing_seed = dir.path().join("seed.yaml");
    fs::write(&missing_seed, SWEEP_YAML.replace("seed: 42\n", "")).unwrap();
    assert!(load_sweep_config(&missing_seed).is_err());
}

#[test]
fn duplicate_protocols_and_empty_lists_are_rejected() {
    let mut config = config(bell_observables(), vec![ProtocolKind::Shadow, ProtocolKind::Shadow], vec![100], 1);
    assert_eq!(config.validate().unwrap_err().info().code, "duplicate-protocol");
    config.protocols.clear();
    assert_eq!(config.validate().unwrap_err().info().code, "empty-protocols");
}

#[test]
fn config_hash_ignores_scheduler_but_tracks_seed() {
    let base = config(bell_observables(), vec![ProtocolKind::DirectNaive], vec![100], 1);
    let mut wide = base.clone();
    wide.scheduler.parallelism = 8;
    let mut reseeded = base.clone();
    reseeded.seed += 1;
    let hash = base.config_hash().unwrap();
    assert_eq!(hash.len(), 64);
    assert_eq!(hash, wide.config_hash().unwrap());
    assert_ne!(hash, reseeded.config_hash().unwrap());
}
