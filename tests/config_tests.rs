//! Tests for layered configuration and its validation.

use std::time::Duration;

use quiesce::config::ConfigError;
use quiesce::test_support::EnvGuard;
use quiesce::{OrchestrationConfig, ReleasePolicy, ScalewayConfig};
use rstest::*;

#[fixture]
fn valid_scaleway() -> ScalewayConfig {
    ScalewayConfig {
        secret_key: String::from("SCWSECRETKEYEXAMPLE"),
        default_zone: String::from("fr-par-1"),
    }
}

#[fixture]
fn defaults() -> OrchestrationConfig {
    OrchestrationConfig {
        poll_interval_secs: 5,
        continuous_target_occurrence: 1,
        operation_timeout_secs: 1800,
        command_timeout_secs: 600,
        release_when_satisfied: false,
    }
}

#[rstest]
#[case::secret("SCW_SECRET_KEY", "secret_key")]
#[case::zone("SCW_DEFAULT_ZONE", "default_zone")]
fn scaleway_validation_produces_actionable_errors(
    valid_scaleway: ScalewayConfig,
    #[case] env_var: &str,
    #[case] toml_key: &str,
) {
    let mut cfg = valid_scaleway;
    match toml_key {
        "secret_key" => cfg.secret_key = String::from("  "),
        _ => cfg.default_zone.clear(),
    }

    let error = cfg.validate().expect_err("validation should fail");
    let ConfigError::MissingField(ref message) = error else {
        panic!("expected MissingField error, got {error:?}");
    };
    assert!(
        message.contains(env_var),
        "error should mention env var {env_var}: {message}"
    );
    assert!(
        message.contains("quiesce.toml"),
        "error should mention config file: {message}"
    );
    assert!(
        message.contains(toml_key),
        "error should mention TOML key {toml_key}: {message}"
    );
}

#[rstest]
fn scaleway_validation_accepts_complete_config(valid_scaleway: ScalewayConfig) {
    assert!(valid_scaleway.validate().is_ok());
}

#[rstest]
#[case::interval("poll_interval_secs")]
#[case::occurrence("continuous_target_occurrence")]
#[case::operation("operation_timeout_secs")]
#[case::command("command_timeout_secs")]
fn orchestration_validation_rejects_zero(defaults: OrchestrationConfig, #[case] field: &str) {
    let mut cfg = defaults;
    match field {
        "poll_interval_secs" => cfg.poll_interval_secs = 0,
        "continuous_target_occurrence" => cfg.continuous_target_occurrence = 0,
        "operation_timeout_secs" => cfg.operation_timeout_secs = 0,
        _ => cfg.command_timeout_secs = 0,
    }

    let error = cfg.validate().expect_err("zero must be rejected");
    let ConfigError::Invalid(ref message) = error else {
        panic!("expected Invalid error, got {error:?}");
    };
    assert!(message.contains(field), "unexpected message: {message}");
    assert!(
        message.contains(&format!("QUIESCE_{}", field.to_uppercase())),
        "error should mention env var: {message}"
    );
}

#[rstest]
fn orchestration_helpers_reflect_the_settings(defaults: OrchestrationConfig) {
    assert!(defaults.validate().is_ok());
    let settings = defaults.poll_settings();
    assert_eq!(settings.interval, Duration::from_secs(5));
    assert_eq!(settings.continuous_target_occurrence, 1);
    assert_eq!(defaults.operation_timeout(), Duration::from_secs(1800));
    assert_eq!(defaults.release_policy(), ReleasePolicy::HoldThroughRestore);

    let relaxed = OrchestrationConfig {
        release_when_satisfied: true,
        ..defaults
    };
    assert_eq!(relaxed.release_policy(), ReleasePolicy::ReleaseWhenSatisfied);
}

#[tokio::test]
async fn orchestration_settings_load_from_environment() {
    let _guard = EnvGuard::set_vars(&[
        ("QUIESCE_POLL_INTERVAL_SECS", "7"),
        ("QUIESCE_CONTINUOUS_TARGET_OCCURRENCE", "3"),
    ])
    .await;

    let cfg = OrchestrationConfig::load_without_cli_args()
        .unwrap_or_else(|err| panic!("configuration should load: {err}"));

    assert_eq!(cfg.poll_interval_secs, 7);
    assert_eq!(cfg.continuous_target_occurrence, 3);
}

#[tokio::test]
async fn scaleway_credentials_load_from_environment() {
    let _guard = EnvGuard::set_vars(&[
        ("SCW_SECRET_KEY", "SCWSECRETKEYEXAMPLE"),
        ("SCW_DEFAULT_ZONE", "nl-ams-1"),
    ])
    .await;

    let cfg = ScalewayConfig::load_without_cli_args()
        .unwrap_or_else(|err| panic!("configuration should load: {err}"));

    assert_eq!(cfg.secret_key, "SCWSECRETKEYEXAMPLE");
    assert_eq!(cfg.default_zone, "nl-ams-1");
    assert!(cfg.validate().is_ok());
}
