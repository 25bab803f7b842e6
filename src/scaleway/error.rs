//! Error types for the Scaleway control plane.

use scaleway_rs::ScalewayError;
use thiserror::Error;

use crate::backend::Transience;
use crate::config::ConfigError;
use crate::error::PollError;

/// API error type Scaleway returns while a server is mid-transition.
pub(super) const TRANSIENT_STATE_ETYPE: &str = "transient_state";

/// Errors raised by the Scaleway control plane.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ScalewayBackendError {
    /// Raised when the high-level configuration is incomplete.
    #[error("configuration error: {0}")]
    Config(String),
    /// Raised when a target identity is not `<zone>/<server-id>`.
    #[error("invalid target '{target}': expected <zone>/<server-id>")]
    InvalidTarget {
        /// Identity supplied by the caller.
        target: String,
    },
    /// Raised when the server is not listed in its zone.
    #[error("instance {instance_id} not found in zone {zone}")]
    InstanceNotFound {
        /// Provider instance identifier.
        instance_id: String,
        /// Zone used for the lookup.
        zone: String,
    },
    /// Raised for options the provider has no equivalent for.
    #[error("unsupported operation: {operation}")]
    Unsupported {
        /// Operation that was requested.
        operation: String,
    },
    /// Raised when an action never reaches its expected state.
    #[error("timeout waiting for {action} on instance {instance_id}")]
    Timeout {
        /// Action being waited on.
        action: String,
        /// Provider instance identifier.
        instance_id: String,
    },
    /// Raised when an action leaves the server in a state outside its
    /// lifecycle.
    #[error("instance {instance_id} entered unexpected state {state} during {action}")]
    UnexpectedState {
        /// Action being waited on.
        action: String,
        /// Provider instance identifier.
        instance_id: String,
        /// State reported by the provider.
        state: String,
    },
    /// Raised when the provider refuses a request because the server is
    /// busy transitioning.
    #[error("instance busy: {message}")]
    TransientState {
        /// Message returned by the provider.
        message: String,
    },
    /// Raised when the request never produced a provider answer.
    #[error("transport error: {message}")]
    Transport {
        /// Underlying client error.
        message: String,
    },
    /// Wrapper for provider level failures.
    #[error("provider error: {message}")]
    Provider {
        /// Message returned by the provider SDK.
        message: String,
    },
    /// Raised when a volume cannot be attached to an instance.
    #[error("failed to attach volume {volume_id} to instance {instance_id}: {message}")]
    VolumeAttachmentFailed {
        /// Volume identifier that could not be attached.
        volume_id: String,
        /// Instance identifier.
        instance_id: String,
        /// Error message from the provider.
        message: String,
    },
    /// Raised when a volume cannot be detached from an instance.
    #[error("failed to detach volume {volume_id} from instance {instance_id}: {message}")]
    VolumeDetachFailed {
        /// Volume identifier that could not be detached.
        volume_id: String,
        /// Instance identifier.
        instance_id: String,
        /// Error message from the provider.
        message: String,
    },
    /// Raised when the specified volume is not attached to the instance.
    #[error("volume {volume_id} not attached to instance {instance_id}")]
    VolumeNotFound {
        /// Volume identifier that was not found.
        volume_id: String,
        /// Instance identifier.
        instance_id: String,
    },
}

impl ScalewayBackendError {
    /// Folds a failed post-action wait into a backend error.
    pub(super) fn from_wait(
        err: PollError<Self>,
        action: &str,
        instance_id: &str,
    ) -> Self {
        match err {
            PollError::Probe { source } => source,
            PollError::UnexpectedState { state, .. } => Self::UnexpectedState {
                action: action.to_owned(),
                instance_id: instance_id.to_owned(),
                state,
            },
            PollError::MissingDeadline
            | PollError::Timeout { .. }
            | PollError::Interrupted(_) => Self::Timeout {
                action: action.to_owned(),
                instance_id: instance_id.to_owned(),
            },
        }
    }
}

impl Transience for ScalewayBackendError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::TransientState { .. } | Self::Transport { .. } | Self::Timeout { .. }
        )
    }
}

impl From<ScalewayError> for ScalewayBackendError {
    fn from(value: ScalewayError) -> Self {
        match value {
            ScalewayError::Api(api_err) if api_err.etype == TRANSIENT_STATE_ETYPE => {
                Self::TransientState {
                    message: api_err.message,
                }
            }
            ScalewayError::Api(api_err) => Self::Provider {
                message: api_err.message,
            },
            other => Self::Transport {
                message: other.to_string(),
            },
        }
    }
}

impl From<reqwest::Error> for ScalewayBackendError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport {
            message: value.to_string(),
        }
    }
}

impl From<ConfigError> for ScalewayBackendError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value.to_string())
    }
}
