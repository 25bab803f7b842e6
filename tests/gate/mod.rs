//! Mutation gate scenarios driven against the scripted control plane.

mod bdd_steps;
mod scenarios;
mod test_helpers;
