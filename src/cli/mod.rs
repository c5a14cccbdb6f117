//! Command-line interface definitions for the `eskadra` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `eskadra` binary.
#[derive(Debug, Parser)]
#[command(
    name = "eskadra",
    about = "Reconcile a named fleet of Scaleway servers and their volumes",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Create any listed server that does not already exist.
    #[command(
        name = "create",
        about = "Create any listed server that does not already exist"
    )]
    Create(CreateCommand),
    /// Delete stopped servers along with their attached volumes.
    #[command(
        name = "delete",
        about = "Delete stopped servers along with their attached volumes"
    )]
    Delete(TargetArgs),
    /// Power on stopped servers.
    #[command(name = "start", about = "Power on stopped servers")]
    Start(TargetArgs),
    /// Terminate running servers.
    #[command(name = "terminate", about = "Terminate running servers")]
    Terminate(TargetArgs),
    /// Report presence and state for the named servers.
    #[command(
        name = "status",
        about = "Report presence and state for the named servers"
    )]
    Status(TargetArgs),
    /// Poll until every named server reaches the given state.
    #[command(
        name = "wait",
        about = "Poll until every named server reaches the given state"
    )]
    Wait(WaitCommand),
    /// List boot images visible to the configured credentials.
    #[command(
        name = "images",
        about = "List boot images visible to the configured credentials"
    )]
    Images,
}

/// Arguments for the `eskadra create` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct CreateCommand {
    /// Commercial type for the new servers (for example `DEV1-S`).
    #[arg(long, value_name = "TYPE")]
    pub(crate) commercial_type: String,
    /// Identifier of the boot image.
    #[arg(long, value_name = "IMAGE_ID")]
    pub(crate) image: String,
    /// Tags applied to every created server.
    #[arg(long, value_name = "TAG", value_delimiter = ',')]
    pub(crate) tags: Vec<String>,
    /// Hostnames of the servers to ensure exist.
    #[arg(required = true, value_name = "NAME")]
    pub(crate) names: Vec<String>,
}

/// Server names targeted by a subcommand.
#[derive(Debug, Parser)]
pub(crate) struct TargetArgs {
    /// Hostnames of the targeted servers.
    #[arg(required = true, value_name = "NAME")]
    pub(crate) names: Vec<String>,
}

/// Arguments for the `eskadra wait` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct WaitCommand {
    /// State every target must reach (for example `running`).
    #[arg(long, value_name = "STATE")]
    pub(crate) state: String,
    /// Give up after this many seconds; waits indefinitely when omitted.
    #[arg(long, value_name = "SECS")]
    pub(crate) timeout: Option<u64>,
    /// Hostnames of the servers to watch.
    #[arg(required = true, value_name = "NAME")]
    pub(crate) names: Vec<String>,
}
