use std::io::Write;

use docdiff_core::config::ComparisonConfig;
use docdiff_core::errors::ExErrorKind;

#[test]
fn test_load_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[guard]
max_combined_length = 2000000
large_operation_cooldown_ms = 500

[scheduler]
chunk_threshold_chars = 1000
"#
    )
    .unwrap();

    let config = ComparisonConfig::from_toml_file(file.path()).unwrap();

    assert_eq!(config.guard.max_combined_length, 2_000_000);
    assert_eq!(config.guard.large_operation_cooldown_ms, 500);
    assert_eq!(config.scheduler.chunk_threshold_chars, 1000);
    assert_eq!(config.orchestrator.debounce_ms, 200);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ComparisonConfig::from_toml_file(dir.path().join("absent.toml")).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::Io);
}

#[test]
fn test_unknown_key_is_serialization_error() {
    let err = ComparisonConfig::from_toml_str("[guard]\nmax_length = 5\n").unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::Serialization);
}

#[test]
fn test_inconsistent_values_are_invalid_config() {
    let err = ComparisonConfig::from_toml_str(
        r#"
[guard]
complex_combined_threshold = 100
complex_min_side = 200
"#,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::InvalidConfig);
    assert!(err.message().contains("complex_min_side"));

    let err = ComparisonConfig::from_toml_str("[scheduler]\nunit_budget = 0\n").unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::InvalidConfig);
}
