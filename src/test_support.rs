//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};

use crate::backend::{BackendFuture, ControlPlane, ListFilter, ListedResource, Transience};
use crate::context::OperationContext;
use crate::plan::Command;
use crate::state::{PowerState, power_state_code};
use crate::target::TargetId;

/// Control-plane call recorded by [`ScriptedControlPlane`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Call {
    /// Status probe.
    Observe(TargetId),
    /// Transition command.
    Command(TargetId, Command),
    /// Listing through the read-path index.
    List(ListFilter),
}

/// Kind of call a scripted failure applies to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CallKind {
    /// [`ControlPlane::observe_state`].
    Observe,
    /// [`ControlPlane::start`].
    Start,
    /// [`ControlPlane::stop`].
    Stop,
    /// [`ControlPlane::deallocate`].
    Deallocate,
    /// [`ControlPlane::list_by_scope`].
    List,
}

impl CallKind {
    const fn of(command: Command) -> Self {
        match command {
            Command::Start => Self::Start,
            Command::PowerOff { .. } => Self::Stop,
            Command::Deallocate { .. } => Self::Deallocate,
        }
    }
}

/// Error injected into a [`ScriptedControlPlane`] call.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("scripted failure: {message}")]
pub struct ScriptedError {
    /// Human-readable failure description.
    pub message: String,
    /// Whether the failure should be reported as transient.
    pub transient: bool,
}

impl ScriptedError {
    /// Builds a permanent failure.
    #[must_use]
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: false,
        }
    }

    /// Builds a transient failure.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: true,
        }
    }
}

impl Transience for ScriptedError {
    fn is_transient(&self) -> bool {
        self.transient
    }
}

#[derive(Debug, Default)]
struct Script {
    states: HashMap<TargetId, Option<PowerState>>,
    status_lists: HashMap<TargetId, VecDeque<Vec<String>>>,
    listings: VecDeque<Vec<TargetId>>,
    failures: HashMap<CallKind, VecDeque<ScriptedError>>,
    journal: Vec<Call>,
    latency: Option<Duration>,
}

impl Script {
    fn take_failure(&mut self, kind: CallKind) -> Option<ScriptedError> {
        self.failures.get_mut(&kind).and_then(VecDeque::pop_front)
    }

    fn codes_for(&mut self, target: &TargetId) -> Vec<String> {
        if let Some(codes) = self
            .status_lists
            .get_mut(target)
            .and_then(VecDeque::pop_front)
        {
            return codes;
        }
        let mut codes = vec![String::from("provisioningstate/succeeded")];
        if let Some(Some(state)) = self.states.get(target) {
            codes.push(power_state_code(state));
        }
        codes
    }
}

/// In-memory control plane that behaves like a well-mannered provider.
///
/// Commands move the target straight to their end state. Raw status lists,
/// listing snapshots, latency and failures can be scripted, and every call is
/// journaled for assertions. Clones share the same script.
#[derive(Clone, Debug, Default)]
pub struct ScriptedControlPlane {
    script: Arc<Mutex<Script>>,
}

impl ScriptedControlPlane {
    /// Creates a control plane that knows no targets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the power state reported for `target`.
    pub fn set_state(&self, target: &TargetId, state: PowerState) {
        self.script().states.insert(target.clone(), Some(state));
    }

    /// Makes `target` report no power-state code at all.
    pub fn set_silent(&self, target: &TargetId) {
        self.script().states.insert(target.clone(), None);
    }

    /// Removes `target`, so listings stop returning it.
    pub fn remove(&self, target: &TargetId) {
        self.script().states.remove(target);
    }

    /// Queues a raw status list returned by the next probe of `target`.
    pub fn push_status_codes<I, S>(&self, target: &TargetId, codes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.script()
            .status_lists
            .entry(target.clone())
            .or_default()
            .push_back(codes.into_iter().map(Into::into).collect());
    }

    /// Queues the identities returned by the next listing call.
    pub fn push_listing(&self, ids: Vec<TargetId>) {
        self.script().listings.push_back(ids);
    }

    /// Makes the next call of `kind` fail with `error`.
    pub fn fail_next(&self, kind: CallKind, error: ScriptedError) {
        self.script()
            .failures
            .entry(kind)
            .or_default()
            .push_back(error);
    }

    /// Delays every transition command by `latency`.
    pub fn set_command_latency(&self, latency: Duration) {
        self.script().latency = Some(latency);
    }

    /// Returns the current power state of `target`.
    #[must_use]
    pub fn state(&self, target: &TargetId) -> Option<PowerState> {
        self.script().states.get(target).cloned().flatten()
    }

    /// Returns every call recorded so far.
    #[must_use]
    pub fn journal(&self) -> Vec<Call> {
        self.script().journal.clone()
    }

    /// Returns the transition commands issued for `target`, in order.
    #[must_use]
    pub fn commands(&self, target: &TargetId) -> Vec<Command> {
        self.script()
            .journal
            .iter()
            .filter_map(|call| match call {
                Call::Command(id, command) if id == target => Some(*command),
                _ => None,
            })
            .collect()
    }

    /// Counts probes of `target`.
    #[must_use]
    pub fn observe_calls(&self, target: &TargetId) -> usize {
        self.script()
            .journal
            .iter()
            .filter(|call| matches!(call, Call::Observe(id) if id == target))
            .count()
    }

    fn transition<'a>(
        &'a self,
        target: &'a TargetId,
        command: Command,
    ) -> BackendFuture<'a, (), ScriptedError> {
        Box::pin(async move {
            let latency = {
                let mut script = self.script();
                script.journal.push(Call::Command(target.clone(), command));
                script.latency
            };
            if let Some(delay) = latency {
                tokio::time::sleep(delay).await;
            }
            let mut script = self.script();
            if let Some(error) = script.take_failure(CallKind::of(command)) {
                return Err(error);
            }
            script
                .states
                .insert(target.clone(), Some(command.expected_state()));
            Ok(())
        })
    }
}

impl ControlPlane for ScriptedControlPlane {
    type Error = ScriptedError;

    fn observe_state<'a>(
        &'a self,
        target: &'a TargetId,
    ) -> BackendFuture<'a, Vec<String>, Self::Error> {
        Box::pin(async move {
            let mut script = self.script();
            script.journal.push(Call::Observe(target.clone()));
            if let Some(error) = script.take_failure(CallKind::Observe) {
                return Err(error);
            }
            Ok(script.codes_for(target))
        })
    }

    fn start<'a>(
        &'a self,
        _ctx: &'a OperationContext,
        target: &'a TargetId,
    ) -> BackendFuture<'a, (), Self::Error> {
        self.transition(target, Command::Start)
    }

    fn stop<'a>(
        &'a self,
        _ctx: &'a OperationContext,
        target: &'a TargetId,
        force: bool,
    ) -> BackendFuture<'a, (), Self::Error> {
        self.transition(target, Command::PowerOff { force })
    }

    fn deallocate<'a>(
        &'a self,
        _ctx: &'a OperationContext,
        target: &'a TargetId,
        hibernate: bool,
    ) -> BackendFuture<'a, (), Self::Error> {
        self.transition(target, Command::Deallocate { hibernate })
    }

    fn list_by_scope<'a>(
        &'a self,
        filter: &'a ListFilter,
    ) -> BackendFuture<'a, Vec<ListedResource>, Self::Error> {
        Box::pin(async move {
            let mut script = self.script();
            script.journal.push(Call::List(filter.clone()));
            if let Some(error) = script.take_failure(CallKind::List) {
                return Err(error);
            }
            let ids: Vec<TargetId> = script.listings.pop_front().unwrap_or_else(|| {
                let mut known: Vec<TargetId> = script.states.keys().cloned().collect();
                known.sort();
                known
            });
            let listed = ids
                .into_iter()
                .filter(|id| filter.ids.is_empty() || filter.ids.contains(id))
                .map(|id| ListedResource {
                    status_codes: script.codes_for(&id),
                    id,
                })
                .collect();
            Ok(listed)
        })
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and cleans up variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: AsyncMutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }

    /// Removes variables while holding the global mutex, restoring them on
    /// drop.
    pub async fn remove_vars(keys: &[&str]) -> Self {
        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(keys.len());
        for key in keys {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::remove_var(key) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
