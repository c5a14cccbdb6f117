//! Binary entry point for the Eskadra CLI.

use std::io::{self, Write};
use std::process;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use eskadra::{
    ActionOutcome, ActionReport, CreateOutcome, CreateReport, DeleteOutcome, DeleteReport, Fleet,
    FleetConfig, PollStatus, ScalewayApi, ScalewayApiError, ServerReport, ServerSpec, ServerState,
};

mod cli;

use cli::{Cli, CreateCommand, TargetArgs, WaitCommand};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("api error: {0}")]
    Api(String),
    #[error("fleet error: {0}")]
    Fleet(String),
    #[error("invalid server spec: {0}")]
    Spec(String),
}

/// Exit code signalling that at least one per-server outcome failed.
const EXIT_PARTIAL_FAILURE: i32 = 2;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn dispatch(cli: Cli) -> Result<i32, CliError> {
    let config =
        FleetConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    let api = ScalewayApi::new(config).map_err(|err| CliError::Api(err.to_string()))?;
    let fleet = Fleet::new(api);

    match cli {
        Cli::Create(command) => run_create(&fleet, &command).await,
        Cli::Delete(command) => run_delete(&fleet, &command).await,
        Cli::Start(command) => run_start(&fleet, &command).await,
        Cli::Terminate(command) => run_terminate(&fleet, &command).await,
        Cli::Status(command) => run_status(&fleet, &command).await,
        Cli::Wait(command) => run_wait(&fleet, &command).await,
        Cli::Images => run_images(&fleet).await,
    }
}

async fn run_create(fleet: &Fleet<ScalewayApi>, command: &CreateCommand) -> Result<i32, CliError> {
    let mut specs = Vec::with_capacity(command.names.len());
    for name in &command.names {
        let spec = ServerSpec::builder()
            .name(name)
            .commercial_type(&command.commercial_type)
            .image_id(&command.image)
            .tags(command.tags.iter().cloned())
            .build()
            .map_err(|err| CliError::Spec(err.to_string()))?;
        specs.push(spec);
    }

    let reports = fleet
        .ensure_created(&specs)
        .await
        .map_err(|err| CliError::Fleet(err.to_string()))?;

    let mut failed = false;
    for report in &reports {
        failed = failed || report.outcome.is_failure();
        emit(&render_create(report));
    }
    Ok(exit_code(failed))
}

async fn run_delete(fleet: &Fleet<ScalewayApi>, command: &TargetArgs) -> Result<i32, CliError> {
    let reports = fleet
        .ensure_deleted(&command.names)
        .await
        .map_err(|err| CliError::Fleet(err.to_string()))?;

    let mut failed = false;
    for report in &reports {
        failed = failed || report.outcome.is_failure();
        emit(&render_delete(report));
    }
    Ok(exit_code(failed))
}

async fn run_start(fleet: &Fleet<ScalewayApi>, command: &TargetArgs) -> Result<i32, CliError> {
    let reports = fleet
        .ensure_started(&command.names)
        .await
        .map_err(|err| CliError::Fleet(err.to_string()))?;
    Ok(report_actions(&reports, "starting", &ServerState::Stopped))
}

async fn run_terminate(fleet: &Fleet<ScalewayApi>, command: &TargetArgs) -> Result<i32, CliError> {
    let reports = fleet
        .ensure_terminated(&command.names)
        .await
        .map_err(|err| CliError::Fleet(err.to_string()))?;
    Ok(report_actions(&reports, "terminating", &ServerState::Running))
}

async fn run_status(fleet: &Fleet<ScalewayApi>, command: &TargetArgs) -> Result<i32, CliError> {
    let reports = fleet
        .describe(&command.names)
        .await
        .map_err(|err| CliError::Fleet(err.to_string()))?;

    for report in &reports {
        emit(&render_status(report));
    }
    Ok(0)
}

async fn run_wait(fleet: &Fleet<ScalewayApi>, command: &WaitCommand) -> Result<i32, CliError> {
    let wanted = ServerState::parse(&command.state);
    let timeout = command.timeout.map(Duration::from_secs);

    fleet
        .poll_until(
            &command.names,
            |info| info.is_some_and(|record| record.state == wanted),
            |statuses| {
                for status in statuses {
                    emit(&render_poll_status(status));
                }
            },
            timeout,
        )
        .await
        .map_err(|err| CliError::Fleet(err.to_string()))?;

    Ok(0)
}

async fn run_images(fleet: &Fleet<ScalewayApi>) -> Result<i32, CliError> {
    let images = fleet
        .images()
        .await
        .map_err(|err| CliError::Fleet(err.to_string()))?;

    for image in &images {
        emit(&format!("{} {} ({})", image.id, image.name, image.arch));
    }
    Ok(0)
}

fn report_actions(
    reports: &[ActionReport<ScalewayApiError>],
    verb: &str,
    expected: &ServerState,
) -> i32 {
    let mut failed = false;
    for report in reports {
        failed = failed || report.outcome.is_failure();
        emit(&render_action(report, verb, expected));
    }
    exit_code(failed)
}

const fn exit_code(failed: bool) -> i32 {
    if failed { EXIT_PARTIAL_FAILURE } else { 0 }
}

fn render_create(report: &CreateReport<ScalewayApiError>) -> String {
    match &report.outcome {
        CreateOutcome::Created => format!("server \"{}\": created", report.name),
        CreateOutcome::AlreadyExists => {
            format!("server \"{}\": already exists, not creating", report.name)
        }
        CreateOutcome::Failed(error) => {
            format!("server \"{}\": create failed: {error}", report.name)
        }
    }
}

fn render_delete(report: &DeleteReport<ScalewayApiError>) -> String {
    match &report.outcome {
        DeleteOutcome::Deleted { volumes_deleted } => format!(
            "server \"{}\": deleted along with {volumes_deleted} volume(s)",
            report.name
        ),
        DeleteOutcome::Missing => {
            format!("server \"{}\": not found, nothing to delete", report.name)
        }
        DeleteOutcome::WrongState(found) => format!(
            "server \"{}\": skipped (expected state \"stopped\", found \"{found}\")",
            report.name
        ),
        DeleteOutcome::VolumeCleanupFailed {
            volumes_deleted,
            error,
        } => format!(
            "server \"{}\": deleted, but volume cleanup failed after {volumes_deleted} volume(s): {error}",
            report.name
        ),
        DeleteOutcome::Failed(error) => {
            format!("server \"{}\": delete failed: {error}", report.name)
        }
    }
}

fn render_action(
    report: &ActionReport<ScalewayApiError>,
    verb: &str,
    expected: &ServerState,
) -> String {
    match &report.outcome {
        ActionOutcome::Done => format!("server \"{}\": {verb}", report.name),
        ActionOutcome::Missing => format!("server \"{}\": missing", report.name),
        ActionOutcome::WrongState(found) => format!(
            "server \"{}\": skipped (expected state \"{expected}\", found \"{found}\")",
            report.name
        ),
        ActionOutcome::ActionUnavailable { available } => format!(
            "server \"{}\": skipped (action unavailable; available: {})",
            report.name,
            available.join(", ")
        ),
        ActionOutcome::Failed(error) => {
            format!("server \"{}\": action failed: {error}", report.name)
        }
    }
}

fn render_status(report: &ServerReport) -> String {
    report.info.as_ref().map_or_else(
        || format!("server \"{}\": missing", report.name),
        |info| {
            format!(
                "server \"{}\": {} (id {}, {} volume(s))",
                report.name,
                info.state,
                info.id,
                info.volumes.len()
            )
        },
    )
}

fn render_poll_status(status: &PollStatus) -> String {
    let seconds = status.waiting_for.as_secs();
    status.info.as_ref().map_or_else(
        || format!("waiting for \"{}\" ({seconds}s): absent", status.name),
        |info| {
            format!(
                "waiting for \"{}\" ({seconds}s): state \"{}\"",
                status.name, info.state
            )
        },
    )
}

fn emit(line: &str) {
    writeln!(io::stdout(), "{line}").ok();
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
