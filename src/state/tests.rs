//! Unit tests for power-state normalisation.

use rstest::rstest;

use super::*;

#[rstest]
#[case("running", PowerState::Running)]
#[case("Starting", PowerState::Starting)]
#[case(" STOPPING ", PowerState::Stopping)]
#[case("stopped", PowerState::Stopped)]
#[case("deallocating", PowerState::Deallocating)]
#[case("deallocated", PowerState::Deallocated)]
#[case("hibernated", PowerState::Unknown(String::from("hibernated")))]
fn from_token_normalises_case(#[case] token: &str, #[case] expected: PowerState) {
    assert_eq!(PowerState::from_token(token), expected);
}

#[rstest]
#[case(PowerState::Starting, PowerState::Running)]
#[case(PowerState::Stopping, PowerState::Stopped)]
#[case(PowerState::Deallocating, PowerState::Deallocated)]
#[case(PowerState::Running, PowerState::Running)]
#[case(PowerState::Deallocated, PowerState::Deallocated)]
fn settled_maps_transitions_to_their_end_state(
    #[case] state: PowerState,
    #[case] expected: PowerState,
) {
    assert_eq!(state.settled(), expected);
    assert!(expected.is_steady());
}

#[test]
fn unknown_is_neither_steady_nor_transitional() {
    let state = PowerState::Unknown(String::from("locked"));
    assert!(!state.is_steady());
    assert!(!state.is_transitional());
    assert_eq!(state.settled(), state);
}

#[test]
fn classify_ignores_codes_without_power_prefix() {
    let codes = ["ProvisioningState/succeeded", "PowerState/deallocating"];
    let state = classify_status_codes(codes).expect("single power state");
    assert_eq!(state, Some(PowerState::Deallocating));
}

#[test]
fn classify_returns_none_when_no_power_code_present() {
    let codes = ["provisioningstate/updating"];
    assert_eq!(classify_status_codes(codes), Ok(None));
    assert_eq!(classify_status_codes(Vec::<String>::new()), Ok(None));
}

#[test]
fn classify_rejects_multiple_power_codes() {
    let codes = ["powerstate/running", "powerstate/stopping"];
    let err = classify_status_codes(codes).expect_err("ambiguous list");
    assert_eq!(
        err.codes,
        vec![
            String::from("powerstate/running"),
            String::from("powerstate/stopping")
        ]
    );
    assert!(err.to_string().contains("2 power states"));
}

#[test]
fn power_state_code_round_trips_through_classification() {
    let code = power_state_code(&PowerState::Stopped);
    assert_eq!(code, "powerstate/stopped");
    assert_eq!(classify_status_codes([code]), Ok(Some(PowerState::Stopped)));
}
