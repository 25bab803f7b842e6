//! Transition planning from an observed power state to a precondition.
//!
//! Planning is pure. A transitional observation is first confirmed by
//! re-issuing the command of the transition in flight, since the control
//! plane may have abandoned it silently. The remaining route is then looked
//! up between steady states.

use std::fmt;

use thiserror::Error;

use crate::state::PowerState;

/// Transition command understood by every control plane.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Command {
    /// Power the target on.
    Start,
    /// Power the target off while retaining its allocation.
    PowerOff {
        /// Skip the graceful shutdown.
        force: bool,
    },
    /// Release the compute allocation.
    Deallocate {
        /// Hibernate instead of discarding memory.
        hibernate: bool,
    },
}

impl Command {
    /// Graceful power off, as issued by planned transitions.
    pub const POWER_OFF: Self = Self::PowerOff { force: false };
    /// Plain deallocation, as issued by planned transitions.
    pub const DEALLOCATE: Self = Self::Deallocate { hibernate: false };

    /// Returns the steady state this command ends in.
    #[must_use]
    pub const fn expected_state(self) -> PowerState {
        match self {
            Self::Start => PowerState::Running,
            Self::PowerOff { .. } => PowerState::Stopped,
            Self::Deallocate { .. } => PowerState::Deallocated,
        }
    }

    /// Returns the operator-facing command name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::PowerOff { .. } => "power off",
            Self::Deallocate { .. } => "deallocate",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One planned command and the state it must leave the target in.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Step {
    /// Command to issue.
    pub command: Command,
    /// State expected once the control plane confirms the command.
    pub expect: PowerState,
}

impl Step {
    /// Builds a step expecting the command's natural end state.
    #[must_use]
    pub const fn new(command: Command) -> Self {
        Self {
            command,
            expect: command.expected_state(),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (expect {})", self.command, self.expect)
    }
}

/// Ordered sequence of transition steps. Empty when nothing has to change.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TransitionPlan {
    steps: Vec<Step>,
}

impl TransitionPlan {
    /// Wraps an explicit list of steps.
    #[must_use]
    pub const fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// Returns `true` when no command needs to be issued.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of commands in the plan.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.steps.len()
    }

    /// Steps in execution order.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// State the target is left in once every step succeeded.
    #[must_use]
    pub fn final_state(&self) -> Option<&PowerState> {
        self.steps.last().map(|step| &step.expect)
    }

    /// Commands in execution order.
    pub fn commands(&self) -> impl Iterator<Item = Command> + '_ {
        self.steps.iter().map(|step| step.command)
    }
}

impl fmt::Display for TransitionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return f.write_str("no transition");
        }
        for (index, step) in self.steps.iter().enumerate() {
            if index > 0 {
                f.write_str(", then ")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

/// Result of planning: the plan plus whether restoration will be needed.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PlannedTransition {
    /// Commands to issue before the mutation.
    pub plan: TransitionPlan,
    /// `true` when the plan changes the target, so its original state must be
    /// restored afterwards.
    pub must_restore: bool,
}

/// Reasons a plan cannot be computed.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum PlanError {
    /// The observed state is not one the planner understands.
    #[error("cannot plan from unrecognised power state `{0}`")]
    UnrecognisedObserved(String),
    /// Preconditions must be steady states.
    #[error("precondition `{0}` is not a steady power state")]
    UnsteadyPrecondition(PowerState),
    /// A mutation was offered no acceptable precondition.
    #[error("no acceptable precondition was given")]
    NoPrecondition,
}

/// Computes the commands that take `observed` to `precondition`.
///
/// # Errors
///
/// Returns [`PlanError`] when `observed` is unknown or `precondition` is not
/// one of running, stopped or deallocated.
pub fn plan(
    observed: &PowerState,
    precondition: &PowerState,
) -> Result<PlannedTransition, PlanError> {
    if !precondition.is_steady() {
        return Err(PlanError::UnsteadyPrecondition(precondition.clone()));
    }
    if let PowerState::Unknown(raw) = observed {
        return Err(PlanError::UnrecognisedObserved(raw.clone()));
    }

    let mut steps: Vec<Step> = confirming_command(observed)
        .into_iter()
        .map(Step::new)
        .collect();
    steps.extend(
        route(&observed.settled(), precondition)
            .iter()
            .copied()
            .map(Step::new),
    );

    let plan = TransitionPlan::new(steps);
    let must_restore = !plan.is_empty();
    Ok(PlannedTransition { plan, must_restore })
}

/// Picks which of the `accepted` preconditions to drive `observed` toward.
///
/// The state `observed` settles into wins when it is accepted, so a target
/// already satisfying any of them is left alone. Otherwise the first entry
/// is used.
///
/// # Errors
///
/// Returns [`PlanError::NoPrecondition`] when `accepted` is empty.
pub fn choose_precondition<'a>(
    observed: &PowerState,
    accepted: &'a [PowerState],
) -> Result<&'a PowerState, PlanError> {
    let settled = observed.settled();
    accepted
        .iter()
        .find(|candidate| **candidate == settled)
        .or_else(|| accepted.first())
        .ok_or(PlanError::NoPrecondition)
}

/// Command that re-affirms the transition a target is caught in.
#[must_use]
pub const fn confirming_command(observed: &PowerState) -> Option<Command> {
    match observed {
        PowerState::Starting => Some(Command::Start),
        PowerState::Stopping => Some(Command::POWER_OFF),
        PowerState::Deallocating => Some(Command::DEALLOCATE),
        _ => None,
    }
}

fn route(from: &PowerState, to: &PowerState) -> &'static [Command] {
    match (from, to) {
        (PowerState::Running, PowerState::Stopped) => &[Command::POWER_OFF],
        (PowerState::Running, PowerState::Deallocated) => {
            &[Command::POWER_OFF, Command::DEALLOCATE]
        }
        (PowerState::Stopped | PowerState::Deallocated, PowerState::Running) => &[Command::Start],
        (PowerState::Stopped, PowerState::Deallocated) => &[Command::DEALLOCATE],
        // Deallocated targets must boot before they can be stopped in place.
        (PowerState::Deallocated, PowerState::Stopped) => &[Command::Start, Command::POWER_OFF],
        _ => &[],
    }
}
