//! Binary entry point for the quiesce CLI.

use std::io::{self, Write};
use std::process;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use quiesce::{
    ConfigError, ListFilter, LockRegistry, OperationContext, OrchestrationConfig, Orchestrator,
    PollError, PowerState, ScalewayBackendError, ScalewayConfig, ScalewayControlPlane, TargetId,
    TargetIdError, TransitionError, VolumeGateError, attach_volume, detach_volume,
    wait_until_absent,
};

mod cli;

use cli::{Cli, Command, DesiredState};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error")]
    Config(#[from] ConfigError),
    #[error("invalid target")]
    Target(#[from] TargetIdError),
    #[error("control plane error")]
    Backend(#[from] ScalewayBackendError),
    #[error("power transition failed")]
    Transition(#[source] Box<TransitionError<ScalewayBackendError>>),
    #[error("gated volume change failed")]
    Gate(#[source] Box<VolumeGateError>),
    #[error("wait failed")]
    Wait(#[from] PollError<ScalewayBackendError>),
}

impl From<TransitionError<ScalewayBackendError>> for CliError {
    fn from(value: TransitionError<ScalewayBackendError>) -> Self {
        Self::Transition(Box::new(value))
    }
}

impl From<Box<VolumeGateError>> for CliError {
    fn from(value: Box<VolumeGateError>) -> Self {
        Self::Gate(value)
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn target_of(raw: &str) -> Result<TargetId, CliError> {
    Ok(TargetId::new(raw)?)
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    let target = match &cli.command {
        Command::Status(args) | Command::WaitGone(args) => target_of(&args.target)?,
        Command::Ensure(args) => target_of(&args.target)?,
        Command::AttachVolume(args) | Command::DetachVolume(args) => target_of(&args.target)?,
    };

    let settings = OrchestrationConfig::load_without_cli_args()?;
    settings.validate()?;
    let control_plane = ScalewayControlPlane::new(ScalewayConfig::load_without_cli_args()?)?
        .with_orchestration(&settings);
    let orchestrator = Orchestrator::new(control_plane, LockRegistry::new())
        .with_release_policy(settings.release_policy());
    let target = orchestrator.control_plane().canonical_target(&target)?;

    let timeout = cli
        .timeout
        .map_or_else(|| settings.operation_timeout(), Duration::from_secs);
    let ctx = OperationContext::with_timeout(timeout);
    cancel_on_interrupt(&ctx);

    match cli.command {
        Command::Status(_) => {
            let state = orchestrator.observe(&ctx, &target).await?;
            let rendered = state.as_ref().map_or("unreported", PowerState::as_str);
            writeln!(io::stdout(), "{target}: {rendered}").ok();
        }
        Command::Ensure(args) => {
            let desired = desired_power_state(args.state);
            let execution = orchestrator.ensure_state(&ctx, &target, &desired).await?;
            info!(resource = %target, steps = execution.completed.len(), %desired, "power state ensured");
        }
        Command::AttachVolume(args) => {
            attach_volume(&orchestrator, &ctx, &target, &args.volume).await?;
        }
        Command::DetachVolume(args) => {
            detach_volume(&orchestrator, &ctx, &target, &args.volume).await?;
        }
        Command::WaitGone(_) => {
            let server = orchestrator.control_plane().server_ref(&target)?;
            let listed = server.target_id()?;
            let filter = ListFilter::new(server.zone.clone()).with_id(listed.clone());
            wait_until_absent(
                orchestrator.control_plane(),
                &ctx,
                &filter,
                &listed,
                settings.poll_settings(),
            )
            .await?;
            info!(resource = %target, "server no longer listed");
        }
    }
    Ok(())
}

fn desired_power_state(state: DesiredState) -> PowerState {
    PowerState::from_token(state.token())
}

fn cancel_on_interrupt(ctx: &OperationContext) {
    let interrupted = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling the operation");
            interrupted.cancel();
        }
    });
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "error: {err}").ok();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        writeln!(target, "  caused by: {cause}").ok();
        source = cause.source();
    }
}

#[cfg(test)]
mod main_tests;
