//! Unit tests for the `quiesce` CLI binary implementation.

use rstest::rstest;

use super::*;

#[rstest]
#[case(DesiredState::Running, PowerState::Running)]
#[case(DesiredState::Stopped, PowerState::Stopped)]
#[case(DesiredState::Deallocated, PowerState::Deallocated)]
fn desired_states_are_steady_power_states(
    #[case] desired: DesiredState,
    #[case] expected: PowerState,
) {
    let state = desired_power_state(desired);
    assert!(state.is_steady());
    assert_eq!(state, expected);
}

#[test]
fn write_error_renders_the_cause_chain() {
    let mut buf = Vec::new();
    let err = CliError::from(ScalewayBackendError::InstanceNotFound {
        instance_id: String::from("srv-1"),
        zone: String::from("fr-par-1"),
    });
    write_error(&mut buf, &err);
    let rendered = String::from_utf8(buf).expect("utf8");
    assert!(
        rendered.starts_with("error: control plane error\n"),
        "rendered: {rendered}"
    );
    assert!(
        rendered.contains("caused by: instance srv-1 not found in zone fr-par-1"),
        "rendered: {rendered}"
    );
}

#[test]
fn blank_targets_are_rejected_before_configuration_loads() {
    let err = target_of("   ").expect_err("blank target");
    assert!(matches!(err, CliError::Target(TargetIdError::Empty)));
}

#[test]
fn parser_accepts_the_documented_subcommands() {
    let cli = Cli::try_parse_from([
        "quiesce",
        "--timeout",
        "60",
        "ensure",
        "fr-par-1/srv-1",
        "--state",
        "deallocated",
    ])
    .expect("valid invocation");
    assert_eq!(cli.timeout, Some(60));
    assert!(matches!(
        cli.command,
        Command::Ensure(ref args) if args.state == DesiredState::Deallocated
    ));
}
