//! Core library for the quiesce power-state orchestrator.
//!
//! Some changes to a compute resource are only accepted while it is in a
//! particular power state. The crate observes the current state, drives the
//! resource into the required state, runs the caller's mutation under a
//! per-target lock, and then returns the resource to the state it was in.
//! A Scaleway Instances control plane is included; other providers plug in
//! through [`ControlPlane`].

pub mod backend;
pub mod config;
pub mod context;
pub mod convergence;
pub mod eligibility;
pub mod error;
pub mod execute;
pub mod gate;
pub mod orchestrator;
pub mod plan;
pub mod probe;
pub mod restore;
pub mod scaleway;
pub mod state;
pub mod target;
pub mod test_support;

pub use backend::{BackendFuture, ControlPlane, ListFilter, ListedResource, Transience};
pub use config::{ConfigError, OrchestrationConfig, ScalewayConfig};
pub use context::{Interrupted, OperationContext};
pub use convergence::{
    PollCadence, PollDescriptor, PollSettings, wait_for, wait_for_power_state, wait_until_absent,
};
pub use eligibility::{
    DiskChange, DiskChangeError, DiskFacts, DiskRevision, DiskSku, InstanceCapabilities,
    can_resize_without_downtime,
};
pub use error::{GateError, PollError, TransitionError};
pub use execute::{Execution, execute};
pub use gate::{GateGuard, LockRegistry};
pub use orchestrator::{MutationReport, Orchestrator, ReleasePolicy, RestorationOutcome};
pub use plan::{
    Command, PlanError, PlannedTransition, Step, TransitionPlan, choose_precondition, plan,
};
pub use probe::observe;
pub use restore::{Restoration, restore};
pub use scaleway::{
    ScalewayBackendError, ScalewayControlPlane, ServerRef, VolumeGateError, attach_volume,
    detach_volume,
};
pub use state::{AmbiguousPowerState, PowerState, classify_status_codes};
pub use target::{TargetId, TargetIdError};
