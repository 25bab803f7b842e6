//! Volume attachment through the mutation gate.
//!
//! Scaleway only accepts volume map changes on a powered-off server, so both
//! operations run through [`Orchestrator::with_any_precondition`] with either
//! powered-off state accepted. A running server is stopped in place first
//! and its previous power state is restored afterwards.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::context::OperationContext;
use crate::error::{GateError, TransitionError};
use crate::orchestrator::Orchestrator;
use crate::state::PowerState;
use crate::target::TargetId;

use super::error::TRANSIENT_STATE_ETYPE;
use super::{ScalewayBackendError, ScalewayControlPlane, ServerRef};

const POWERED_OFF: [PowerState; 2] = [PowerState::Stopped, PowerState::Deallocated];

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const SCALEWAY_INSTANCE_API_BASE: &str = "https://api.scaleway.com/instance/v1";
const ROOT_INDEX: &str = "0";

static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

/// Error returned by the gated volume operations.
pub type VolumeGateError = GateError<ScalewayBackendError, ScalewayBackendError>;

/// Volume reference for attachment in the Scaleway API.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct VolumeAttachment {
    /// Volume identifier (UUID).
    pub id: String,
    /// Whether this volume should be used for booting.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub boot: bool,
}

/// Request body for `PATCH /servers/{id}` replacing the volume map.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct UpdateInstanceVolumesRequest {
    /// Volume map keyed by index ("0" for root, "1" for first additional, etc.).
    pub volumes: HashMap<String, VolumeAttachment>,
}

impl UpdateInstanceVolumesRequest {
    fn from_map(current: &BTreeMap<String, String>) -> Self {
        let volumes = current
            .iter()
            .map(|(index, id)| {
                (
                    index.clone(),
                    VolumeAttachment {
                        id: id.clone(),
                        boot: index == ROOT_INDEX,
                    },
                )
            })
            .collect();
        Self { volumes }
    }
}

#[derive(Copy, Clone, Debug)]
enum VolumePatchAction {
    Attach,
    Detach,
}

impl VolumePatchAction {
    const fn into_error(
        self,
        volume_id: String,
        instance_id: String,
        message: String,
    ) -> ScalewayBackendError {
        match self {
            Self::Attach => ScalewayBackendError::VolumeAttachmentFailed {
                volume_id,
                instance_id,
                message,
            },
            Self::Detach => ScalewayBackendError::VolumeDetachFailed {
                volume_id,
                instance_id,
                message,
            },
        }
    }
}

/// Builds the volume map with `volume_id` appended after the highest index.
///
/// Returns `Ok(None)` when the volume is already attached.
fn attach_request(
    current: &BTreeMap<String, String>,
    server: &ServerRef,
    volume_id: &str,
) -> Result<Option<UpdateInstanceVolumesRequest>, ScalewayBackendError> {
    if !current.contains_key(ROOT_INDEX) {
        return Err(ScalewayBackendError::VolumeNotFound {
            volume_id: String::from(ROOT_INDEX),
            instance_id: server.id.clone(),
        });
    }
    if current.values().any(|id| id == volume_id) {
        return Ok(None);
    }
    let next = current
        .keys()
        .filter_map(|index| index.parse::<u32>().ok())
        .max()
        .map_or(1, |highest| highest + 1);
    let mut updated = current.clone();
    updated.insert(next.to_string(), volume_id.to_owned());
    Ok(Some(UpdateInstanceVolumesRequest::from_map(&updated)))
}

/// Builds the volume map without `volume_id`, keeping the root volume.
fn detach_request(
    current: &BTreeMap<String, String>,
    server: &ServerRef,
    volume_id: &str,
) -> Result<UpdateInstanceVolumesRequest, ScalewayBackendError> {
    let Some(index) = current
        .iter()
        .find_map(|(index, id)| (id == volume_id).then(|| index.clone()))
    else {
        return Err(ScalewayBackendError::VolumeNotFound {
            volume_id: volume_id.to_owned(),
            instance_id: server.id.clone(),
        });
    };
    if index == ROOT_INDEX {
        return Err(ScalewayBackendError::VolumeDetachFailed {
            volume_id: volume_id.to_owned(),
            instance_id: server.id.clone(),
            message: String::from("the root volume cannot be detached"),
        });
    }
    let mut updated = current.clone();
    updated.remove(&index);
    Ok(UpdateInstanceVolumesRequest::from_map(&updated))
}

impl ScalewayControlPlane {
    async fn volume_map(
        &self,
        server: &ServerRef,
    ) -> Result<BTreeMap<String, String>, ScalewayBackendError> {
        let instance = self
            .api
            .get_instance_async(&server.zone, &server.id)
            .await?;
        Ok(instance
            .volumes
            .volumes
            .iter()
            .map(|(index, volume)| (index.clone(), volume.id.clone()))
            .collect())
    }

    async fn patch_instance_volumes(
        &self,
        server: &ServerRef,
        request: &UpdateInstanceVolumesRequest,
        volume_id: &str,
        action: VolumePatchAction,
    ) -> Result<(), ScalewayBackendError> {
        let url = format!(
            "{SCALEWAY_INSTANCE_API_BASE}/zones/{}/servers/{}",
            server.zone, server.id
        );

        let response = HTTP_CLIENT
            .patch(&url)
            .header("X-Auth-Token", &self.config.secret_key)
            .json(request)
            .timeout(HTTP_TIMEOUT)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(());
        }

        let body = response.bytes().await.unwrap_or_default();
        if let Ok(api_err) = serde_json::from_slice::<scaleway_rs::ScalewayApiError>(&body)
            && api_err.etype == TRANSIENT_STATE_ETYPE
        {
            return Err(ScalewayBackendError::TransientState {
                message: api_err.message,
            });
        }
        let error_text = String::from_utf8_lossy(&body).into_owned();
        Err(action.into_error(volume_id.to_owned(), server.id.clone(), error_text))
    }

    async fn attach_to_stopped(
        &self,
        target: &TargetId,
        volume_id: &str,
    ) -> Result<(), ScalewayBackendError> {
        let server = self.server_ref(target)?;
        let current = self.volume_map(&server).await?;
        let Some(request) = attach_request(&current, &server, volume_id)? else {
            info!(resource = %target, volume = volume_id, "volume already attached");
            return Ok(());
        };
        self.patch_instance_volumes(&server, &request, volume_id, VolumePatchAction::Attach)
            .await?;
        info!(resource = %target, volume = volume_id, "volume attached");
        Ok(())
    }

    async fn detach_from_stopped(
        &self,
        target: &TargetId,
        volume_id: &str,
    ) -> Result<(), ScalewayBackendError> {
        let server = self.server_ref(target)?;
        let current = self.volume_map(&server).await?;
        let request = detach_request(&current, &server, volume_id)?;
        self.patch_instance_volumes(&server, &request, volume_id, VolumePatchAction::Detach)
            .await?;
        info!(resource = %target, volume = volume_id, "volume detached");
        Ok(())
    }
}

fn canonical_target(
    control_plane: &ScalewayControlPlane,
    target: &TargetId,
) -> Result<TargetId, Box<VolumeGateError>> {
    control_plane.canonical_target(target).map_err(|source| {
        Box::new(GateError::Precondition(
            TransitionError::ProbeUnavailable { source },
        ))
    })
}

/// Attaches `volume_id` to the server, stopping it first when needed.
///
/// # Errors
///
/// Returns [`VolumeGateError`] when the server cannot be stopped, the
/// attachment is rejected, or the original power state cannot be restored.
pub async fn attach_volume(
    orchestrator: &Orchestrator<ScalewayControlPlane>,
    ctx: &OperationContext,
    target: &TargetId,
    volume_id: &str,
) -> Result<(), Box<VolumeGateError>> {
    let control_plane = orchestrator.control_plane();
    let server = canonical_target(control_plane, target)?;
    orchestrator
        .with_any_precondition(ctx, &server, &POWERED_OFF, || {
            control_plane.attach_to_stopped(&server, volume_id)
        })
        .await
        .map_err(Box::new)
}

/// Detaches `volume_id` from the server, stopping it first when needed.
///
/// # Errors
///
/// Returns [`VolumeGateError`] when the server cannot be stopped, the volume
/// is not attached, or the original power state cannot be restored.
pub async fn detach_volume(
    orchestrator: &Orchestrator<ScalewayControlPlane>,
    ctx: &OperationContext,
    target: &TargetId,
    volume_id: &str,
) -> Result<(), Box<VolumeGateError>> {
    let control_plane = orchestrator.control_plane();
    let server = canonical_target(control_plane, target)?;
    orchestrator
        .with_any_precondition(ctx, &server, &POWERED_OFF, || {
            control_plane.detach_from_stopped(&server, volume_id)
        })
        .await
        .map_err(Box::new)
}
