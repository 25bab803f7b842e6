//! Scaleway Instances implementation of the control plane.
//!
//! Targets are addressed as `<zone>/<server-id>`. Every power action is
//! followed by a convergence wait so the returned future resolves only once
//! the server reports the state the action ends in.

mod error;
mod state;
mod volume;

use std::time::Duration;

use scaleway_rs::ScalewayApi;
use tracing::debug;

use crate::backend::{BackendFuture, ControlPlane, ListFilter, ListedResource};
use crate::config::{OrchestrationConfig, ScalewayConfig};
use crate::context::OperationContext;
use crate::convergence::{PollSettings, wait_for_power_state};
use crate::state::PowerState;
use crate::target::TargetId;

pub use error::ScalewayBackendError;
pub use state::status_code_for;
pub use volume::{VolumeGateError, attach_volume, detach_volume};

const POLL_INTERVAL: Duration = Duration::from_secs(5);
const COMMAND_TIMEOUT: Duration = Duration::from_secs(600);

/// Zone and server identifier parsed from a [`TargetId`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerRef {
    /// Availability zone, for example `fr-par-1`.
    pub zone: String,
    /// Server UUID.
    pub id: String,
}

impl ServerRef {
    /// Splits `<zone>/<server-id>`. A bare server id falls back to
    /// `default_zone`.
    ///
    /// # Errors
    ///
    /// Returns [`ScalewayBackendError::InvalidTarget`] when either half is
    /// empty or the id contains another separator.
    pub fn parse(target: &TargetId, default_zone: &str) -> Result<Self, ScalewayBackendError> {
        let invalid = || ScalewayBackendError::InvalidTarget {
            target: target.to_string(),
        };
        let (zone, id) = target
            .as_str()
            .split_once('/')
            .unwrap_or((default_zone, target.as_str()));
        let zone_name = zone.trim();
        let server_id = id.trim();
        if zone_name.is_empty() || server_id.is_empty() || server_id.contains('/') {
            return Err(invalid());
        }
        Ok(Self {
            zone: zone_name.to_owned(),
            id: server_id.to_owned(),
        })
    }

    /// Identity of this server as used for locking and listing.
    ///
    /// # Errors
    ///
    /// Returns [`ScalewayBackendError::InvalidTarget`] when the server id is
    /// blank.
    pub fn target_id(&self) -> Result<TargetId, ScalewayBackendError> {
        TargetId::new(format!("{}/{}", self.zone, self.id)).map_err(|_| {
            ScalewayBackendError::InvalidTarget {
                target: self.id.clone(),
            }
        })
    }
}

/// Control plane driving servers through the Scaleway Instances API.
#[derive(Clone)]
pub struct ScalewayControlPlane {
    api: ScalewayApi,
    config: ScalewayConfig,
    poll: PollSettings,
    command_timeout: Duration,
}

impl ScalewayControlPlane {
    /// Constructs a control plane from credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ScalewayBackendError::Config`] when the provided configuration
    /// fails validation.
    pub fn new(config: ScalewayConfig) -> Result<Self, ScalewayBackendError> {
        config.validate()?;
        Ok(Self {
            api: ScalewayApi::new(&config.secret_key),
            config,
            poll: PollSettings {
                interval: POLL_INTERVAL,
                continuous_target_occurrence: 1,
            },
            command_timeout: COMMAND_TIMEOUT,
        })
    }

    /// Applies the polling cadence and command budget from orchestration
    /// settings.
    #[must_use]
    pub const fn with_orchestration(mut self, settings: &OrchestrationConfig) -> Self {
        self.poll = settings.poll_settings();
        self.command_timeout = settings.command_timeout();
        self
    }

    /// Parses `target` against the configured default zone.
    ///
    /// # Errors
    ///
    /// See [`ServerRef::parse`].
    pub fn server_ref(&self, target: &TargetId) -> Result<ServerRef, ScalewayBackendError> {
        ServerRef::parse(target, &self.config.default_zone)
    }

    async fn server_state(&self, server: &ServerRef) -> Result<String, ScalewayBackendError> {
        let mut servers = self
            .api
            .list_instances(&server.zone)
            .servers(&server.id)
            .per_page(1)
            .run_async()
            .await?;
        servers
            .pop()
            .map(|found| found.state)
            .ok_or_else(|| ScalewayBackendError::InstanceNotFound {
                instance_id: server.id.clone(),
                zone: server.zone.clone(),
            })
    }

    /// Canonical `<zone>/<server-id>` identity of `target`, so every spelling
    /// of one server shares a mutation gate.
    ///
    /// # Errors
    ///
    /// See [`ServerRef::parse`].
    pub fn canonical_target(&self, target: &TargetId) -> Result<TargetId, ScalewayBackendError> {
        self.server_ref(target)?.target_id()
    }

    async fn perform(
        &self,
        ctx: &OperationContext,
        target: &TargetId,
        action: &str,
        expected: PowerState,
    ) -> Result<(), ScalewayBackendError> {
        let server = self.server_ref(target)?;
        let before = state::power_state_for(&self.server_state(&server).await?);
        debug!(resource = %target, action, from = %before, "issuing server action");
        let issued = self
            .api
            .perform_instance_action_async(&server.zone, &server.id, action)
            .await
            .map(|_| ())
            .map_err(ScalewayBackendError::from);
        tolerate_busy(issued, target, action)?;

        let bounded = ctx.bounded(self.command_timeout);
        wait_for_power_state(self, &bounded, target, &before, &expected, self.poll)
            .await
            .map_err(|err| ScalewayBackendError::from_wait(err, action, &server.id))
    }
}

/// A server refusing an action because it is already transitioning is left
/// to the convergence wait that follows.
fn tolerate_busy(
    issued: Result<(), ScalewayBackendError>,
    target: &TargetId,
    action: &str,
) -> Result<(), ScalewayBackendError> {
    match issued {
        Err(ScalewayBackendError::TransientState { message }) => {
            debug!(resource = %target, action, %message, "server busy; waiting instead");
            Ok(())
        }
        other => other,
    }
}

impl ControlPlane for ScalewayControlPlane {
    type Error = ScalewayBackendError;

    fn observe_state<'a>(
        &'a self,
        target: &'a TargetId,
    ) -> BackendFuture<'a, Vec<String>, Self::Error> {
        Box::pin(async move {
            let server = self.server_ref(target)?;
            let raw = self.server_state(&server).await?;
            Ok(vec![status_code_for(&raw)])
        })
    }

    fn start<'a>(
        &'a self,
        ctx: &'a OperationContext,
        target: &'a TargetId,
    ) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(async move {
            self.perform(ctx, target, "poweron", PowerState::Running)
                .await
        })
    }

    // Scaleway has no forced variant of `stop_in_place`.
    fn stop<'a>(
        &'a self,
        ctx: &'a OperationContext,
        target: &'a TargetId,
        force: bool,
    ) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(async move {
            if force {
                debug!(resource = %target, "forced stop requested; issuing a regular stop");
            }
            self.perform(ctx, target, "stop_in_place", PowerState::Stopped)
                .await
        })
    }

    fn deallocate<'a>(
        &'a self,
        ctx: &'a OperationContext,
        target: &'a TargetId,
        hibernate: bool,
    ) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(async move {
            if hibernate {
                return Err(ScalewayBackendError::Unsupported {
                    operation: String::from("hibernate"),
                });
            }
            self.perform(ctx, target, "poweroff", PowerState::Deallocated)
                .await
        })
    }

    fn list_by_scope<'a>(
        &'a self,
        filter: &'a ListFilter,
    ) -> BackendFuture<'a, Vec<ListedResource>, Self::Error> {
        Box::pin(async move {
            let mut ids = Vec::with_capacity(filter.ids.len());
            for id in &filter.ids {
                ids.push(ServerRef::parse(id, &filter.scope)?.id);
            }
            let joined = ids.join(",");
            let mut request = self.api.list_instances(&filter.scope);
            if !joined.is_empty() {
                request = request.servers(&joined);
            }
            let servers = request.run_async().await?;

            servers
                .into_iter()
                .map(|server| {
                    let reference = ServerRef {
                        zone: filter.scope.clone(),
                        id: server.id,
                    };
                    Ok(ListedResource {
                        id: reference.target_id()?,
                        status_codes: vec![status_code_for(&server.state)],
                    })
                })
                .collect()
        })
    }
}
