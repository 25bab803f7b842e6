//! BDD step definitions for precondition-gated mutations.

use std::sync::atomic::Ordering;
use std::time::Duration;

use quiesce::test_support::ScriptedError;
use quiesce::{LockRegistry, OperationContext, Orchestrator, PowerState};
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;

use super::test_helpers::{GateContext, GateOutcome, parse_command_kind, parse_failure_kind};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("a server reporting \"{state}\"")]
fn server_reporting(gate_context: GateContext, state: String) -> GateContext {
    gate_context
        .control_plane
        .set_state(&gate_context.target, PowerState::from_token(&state));
    gate_context
}

#[given("a server reporting the status code \"{code}\"")]
fn server_reporting_code(gate_context: GateContext, code: String) -> GateContext {
    gate_context
        .control_plane
        .push_status_codes(&gate_context.target, [code]);
    gate_context
}

#[given("the mutation fails")]
fn mutation_fails(mut gate_context: GateContext) -> GateContext {
    gate_context.mutation_fails = true;
    gate_context
}

#[given("the next \"{command}\" command fails transiently")]
fn command_fails_transiently(gate_context: GateContext, command: String) -> GateContext {
    let Some(kind) = parse_command_kind(&command) else {
        panic!("unknown command kind in scenario: {command}");
    };
    gate_context
        .control_plane
        .fail_next(kind, ScriptedError::transient("control plane busy"));
    gate_context
}

#[when("a mutation requiring \"{state}\" runs")]
fn run_mutation(mut gate_context: GateContext, state: String) -> Result<GateContext, StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))?;
    let orchestrator = Orchestrator::new(gate_context.control_plane.clone(), LockRegistry::new());
    let precondition = PowerState::from_token(&state);
    let target = gate_context.target.clone();
    let runs = gate_context.mutation_runs.clone();
    let fails = gate_context.mutation_fails;

    let result = runtime.block_on(async move {
        let ctx = OperationContext::with_timeout(Duration::from_secs(60));
        orchestrator
            .with_precondition(&ctx, &target, &precondition, || async move {
                runs.fetch_add(1, Ordering::SeqCst);
                if fails {
                    Err(ScriptedError::permanent("mutation rejected"))
                } else {
                    Ok(())
                }
            })
            .await
    });

    gate_context.outcome = Some(GateOutcome::from_result(result));
    Ok(gate_context)
}

#[then("the gate succeeds")]
fn gate_succeeds(gate_context: &GateContext) -> Result<(), StepError> {
    match &gate_context.outcome {
        Some(GateOutcome::Success) => Ok(()),
        Some(GateOutcome::Failure { message, .. }) => Err(StepError::Assertion(format!(
            "expected success, got failure: {message}"
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[then("the gate reports a \"{kind}\" failure")]
fn gate_reports_failure(gate_context: &GateContext, kind: String) -> Result<(), StepError> {
    let expected = parse_failure_kind(&kind)
        .ok_or_else(|| StepError::Assertion(format!("unknown failure kind: {kind}")))?;
    let Some(GateOutcome::Failure { kind: actual, .. }) = &gate_context.outcome else {
        return Err(StepError::Assertion(String::from(
            "expected failure outcome",
        )));
    };
    if *actual == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected failure kind {expected:?}, got {actual:?}"
        )))
    }
}

#[then("the failure is transient")]
fn failure_is_transient(gate_context: &GateContext) -> Result<(), StepError> {
    match &gate_context.outcome {
        Some(GateOutcome::Failure {
            transient: true, ..
        }) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected a transient failure, got {other:?}"
        ))),
    }
}

#[then("the mutation ran once")]
fn mutation_ran_once(gate_context: &GateContext) -> Result<(), StepError> {
    let runs = gate_context.mutation_runs.load(Ordering::SeqCst);
    if runs == 1 {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected one mutation run, got {runs}"
        )))
    }
}

#[then("the mutation did not run")]
fn mutation_did_not_run(gate_context: &GateContext) -> Result<(), StepError> {
    let runs = gate_context.mutation_runs.load(Ordering::SeqCst);
    if runs == 0 {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected no mutation run, got {runs}"
        )))
    }
}

#[then("the issued commands are \"{commands}\"")]
fn issued_commands(gate_context: &GateContext, commands: String) -> Result<(), StepError> {
    let issued = gate_context
        .control_plane
        .commands(&gate_context.target)
        .iter()
        .map(|command| command.name())
        .collect::<Vec<_>>()
        .join(", ");
    if issued == commands {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected commands [{commands}], got [{issued}]"
        )))
    }
}

#[then("no commands were issued")]
fn no_commands_issued(gate_context: &GateContext) -> Result<(), StepError> {
    let issued = gate_context.control_plane.commands(&gate_context.target);
    if issued.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected no commands, got {issued:?}"
        )))
    }
}

#[then("the server ends \"{state}\"")]
fn server_ends(gate_context: &GateContext, state: String) -> Result<(), StepError> {
    let expected = PowerState::from_token(&state);
    match gate_context.control_plane.state(&gate_context.target) {
        Some(actual) if actual == expected => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected final state {expected}, got {other:?}"
        ))),
    }
}
