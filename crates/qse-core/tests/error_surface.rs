use qse_core::errors::{ErrorInfo, QseError};
use qse_core::ObservableSet;

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("observable", "o3")
        .with_context("shots", 0)
}

#[test]
fn configuration_error_surface() {
    let err = QseError::Configuration(sample_info("non-positive-budget", "budget must be positive"));
    assert_eq!(err.info().code, "non-positive-budget");
    assert!(err.is_configuration());
    assert_eq!(err.info().context.get("shots").map(String::as_str), Some("0"));
}

#[test]
fn backend_error_surface() {
    let err = QseError::Backend(sample_info("timeout", "deadline exceeded"));
    assert!(!err.is_configuration());
    assert!(err.to_string().contains("deadline exceeded"));
    assert!(err.to_string().contains("observable=o3"));
}

#[test]
fn hint_is_rendered() {
    let err = QseError::Numerical(
        ErrorInfo::new("singular", "matrix is singular").with_hint("supply a calibrated descriptor"),
    );
    assert!(err.to_string().contains("hint: supply a calibrated descriptor"));
}

#[test]
fn errors_serialize_with_family_tag() {
    let err = QseError::config("empty-observable-set", "nothing to estimate");
    let json = serde_json::to_value(&err).expect("serialize");
    assert_eq!(json["family"], "Configuration");
    assert_eq!(json["detail"]["code"], "empty-observable-set");
    let decoded: QseError = serde_json::from_value(json).expect("deserialize");
    assert_eq!(decoded, err);
}

#[test]
fn empty_observable_set_is_configuration_error() {
    let err = ObservableSet::new(2, Vec::new()).expect_err("empty set rejected");
    assert!(err.is_configuration());
    assert_eq!(err.info().code, "empty-observable-set");
}
