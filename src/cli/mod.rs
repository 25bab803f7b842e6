//! Command-line interface definitions for the `quiesce` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Top-level CLI for the `quiesce` binary.
#[derive(Debug, Parser)]
#[command(
    name = "quiesce",
    about = "Hold Scaleway servers in a required power state while changing them",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Deadline for the whole operation in seconds, restoration included.
    ///
    /// Defaults to `operation_timeout_secs` from configuration.
    #[arg(long, global = true, value_name = "SECONDS")]
    pub(crate) timeout: Option<u64>,
    /// Operation to run.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Operations exposed by the binary.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Print the observed power state of a server.
    #[command(name = "status")]
    Status(TargetArgs),
    /// Drive a server to a power state without restoring it afterwards.
    #[command(name = "ensure")]
    Ensure(EnsureCommand),
    /// Attach a volume, stopping the server for the change if needed.
    #[command(name = "attach-volume")]
    AttachVolume(VolumeCommand),
    /// Detach a volume, stopping the server for the change if needed.
    #[command(name = "detach-volume")]
    DetachVolume(VolumeCommand),
    /// Wait until a server is no longer listed in its zone.
    #[command(name = "wait-gone")]
    WaitGone(TargetArgs),
}

/// Arguments naming a single server.
#[derive(Debug, Args)]
pub(crate) struct TargetArgs {
    /// Server to act on, as `<zone>/<server-id>`.
    #[arg(value_name = "TARGET")]
    pub(crate) target: String,
}

/// Arguments for `quiesce ensure`.
#[derive(Debug, Args)]
pub(crate) struct EnsureCommand {
    /// Server to act on, as `<zone>/<server-id>`.
    #[arg(value_name = "TARGET")]
    pub(crate) target: String,
    /// Power state to reach.
    #[arg(long, value_enum)]
    pub(crate) state: DesiredState,
}

/// Arguments for the volume subcommands.
#[derive(Debug, Args)]
pub(crate) struct VolumeCommand {
    /// Server to act on, as `<zone>/<server-id>`.
    #[arg(value_name = "TARGET")]
    pub(crate) target: String,
    /// Block Storage volume identifier.
    #[arg(value_name = "VOLUME")]
    pub(crate) volume: String,
}

/// Steady power states accepted by `quiesce ensure`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum DesiredState {
    /// Powered on.
    Running,
    /// Powered off with the allocation kept.
    Stopped,
    /// Powered off with the allocation released.
    Deallocated,
}

impl DesiredState {
    /// Lower-case token for the state.
    pub(crate) const fn token(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Deallocated => "deallocated",
        }
    }
}
