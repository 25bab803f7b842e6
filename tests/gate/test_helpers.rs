//! Shared fixtures and helpers for mutation gate BDD scenarios.

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;

use quiesce::GateError;
use quiesce::TargetId;
use quiesce::test_support::{CallKind, ScriptedControlPlane, ScriptedError};
use rstest::fixture;

pub const TARGET: &str = "fr-par-1/srv-gated";

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GateFailureKind {
    Precondition,
    Mutation,
    Restoration,
    Interrupted,
}

#[derive(Clone, Debug)]
pub enum GateOutcome {
    Success,
    Failure {
        kind: GateFailureKind,
        transient: bool,
        message: String,
    },
}

impl GateOutcome {
    pub fn from_result(result: Result<(), GateError<ScriptedError, ScriptedError>>) -> Self {
        let Err(err) = result else {
            return Self::Success;
        };
        let kind = match &err {
            GateError::Precondition(_) => GateFailureKind::Precondition,
            GateError::MutationFailed { .. } => GateFailureKind::Mutation,
            GateError::RestorationFailed { .. } => GateFailureKind::Restoration,
            GateError::RestorationInterrupted { .. } => GateFailureKind::Interrupted,
        };
        Self::Failure {
            kind,
            transient: err.is_transient(),
            message: err.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GateContext {
    pub control_plane: ScriptedControlPlane,
    pub target: TargetId,
    pub mutation_fails: bool,
    pub mutation_runs: Arc<AtomicUsize>,
    pub outcome: Option<GateOutcome>,
}

#[fixture]
pub fn gate_context() -> GateContext {
    GateContext {
        control_plane: ScriptedControlPlane::new(),
        target: TargetId::new(TARGET)
            .unwrap_or_else(|err| panic!("fixture target should be valid: {err}")),
        mutation_fails: false,
        mutation_runs: Arc::new(AtomicUsize::new(0)),
        outcome: None,
    }
}

pub fn parse_failure_kind(raw: &str) -> Option<GateFailureKind> {
    match raw {
        "precondition" => Some(GateFailureKind::Precondition),
        "mutation" => Some(GateFailureKind::Mutation),
        "restoration" => Some(GateFailureKind::Restoration),
        "interrupted" => Some(GateFailureKind::Interrupted),
        _ => None,
    }
}

pub fn parse_command_kind(raw: &str) -> Option<CallKind> {
    match raw {
        "start" => Some(CallKind::Start),
        "power off" => Some(CallKind::Stop),
        "deallocate" => Some(CallKind::Deallocate),
        _ => None,
    }
}
