//! Schema validation of fixture configuration files.

use std::fs;
use std::path::PathBuf;

use orca_config::{ConfigError, ConfigFile, ConfigManager, SchemaValidator};

fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/config")
}

fn fixture(name: &str) -> String {
    fs::read_to_string(fixture_dir().join(name)).expect("read fixture")
}

#[test]
fn fixture_configs_validate() {
    let manager = ConfigManager::new(fixture_dir()).expect("manager");
    manager.validate_all_configs().expect("fixtures are valid");
}

#[test]
fn default_configs_validate() {
    let dir = tempfile::tempdir().expect("tempdir");
    let manager = ConfigManager::new(dir.path()).expect("manager");
    manager.initialize_configs().expect("initialize");
    manager.validate_all_configs().expect("defaults are valid");
}

#[test]
fn string_format_version_fails_validation() {
    let validator = SchemaValidator::bundled().expect("validator");
    let err = validator
        .validate_text(
            &fixture("CueConfig-InvalidFormatVersion.json"),
            ConfigFile::CueConfig.schema_filename().expect("schema"),
            "CueConfig-InvalidFormatVersion.json",
        )
        .unwrap_err();
    assert!(
        err.to_string()
            .contains("format_version: string found, integer expected"),
        "{err}"
    );
}

#[test]
fn all_violations_are_aggregated() {
    let validator = SchemaValidator::bundled().expect("validator");
    let err = validator
        .validate_text(
            &fixture("MeasurementConf-InvalidFields.json"),
            ConfigFile::MeasurementConf.schema_filename().expect("schema"),
            "MeasurementConf-InvalidFields.json",
        )
        .unwrap_err();
    let ConfigError::Validation { violations, .. } = &err else {
        panic!("expected a validation error, got {err:?}");
    };
    assert_eq!(violations.len(), 2);
    insta::assert_snapshot!(err.to_string(), @r"
    MeasurementConf-InvalidFields.json failed schema validation:
    $[0].parameters: string found, array expected
    $[1].function: array found, string expected
    ");
}

#[test]
fn malformed_json_is_a_load_error() {
    let validator = SchemaValidator::bundled().expect("validator");
    let err = validator
        .validate_text("[{", "MeasurementConf.schema.json", "broken.json")
        .unwrap_err();
    assert!(matches!(err, ConfigError::ConfigLoad { file, .. } if file == "broken.json"));
}
