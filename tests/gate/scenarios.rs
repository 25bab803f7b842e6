//! BDD scenarios for the mutation gate.

use rstest_bdd_macros::scenario;

use super::test_helpers::{GateContext, gate_context};

#[scenario(
    path = "tests/features/mutation_gate.feature",
    name = "A stopping server is started for the mutation and stopped again"
)]
fn scenario_stopping_server_round_trip(gate_context: GateContext) {
    let _ = gate_context;
}

#[scenario(
    path = "tests/features/mutation_gate.feature",
    name = "A satisfied precondition needs no transition"
)]
fn scenario_satisfied_precondition(gate_context: GateContext) {
    let _ = gate_context;
}

#[scenario(
    path = "tests/features/mutation_gate.feature",
    name = "A failed mutation still restores the original state"
)]
fn scenario_failed_mutation_restores(gate_context: GateContext) {
    let _ = gate_context;
}

#[scenario(
    path = "tests/features/mutation_gate.feature",
    name = "A transient restoration failure stays transient"
)]
fn scenario_transient_restoration_failure(gate_context: GateContext) {
    let _ = gate_context;
}

#[scenario(
    path = "tests/features/mutation_gate.feature",
    name = "An unrecognised power state blocks the mutation"
)]
fn scenario_unrecognised_state(gate_context: GateContext) {
    let _ = gate_context;
}
