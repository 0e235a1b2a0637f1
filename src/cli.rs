//! CLI struct definitions for the stopgate command-line interface.
//!
//! All clap-derived types live here. Dispatch logic lives in `lib.rs`.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[clap(
    name = "stopgate",
    version = env!("CARGO_PKG_VERSION"),
    about = "Stopgate is the workflow compliance gatekeeper that agent sessions call at termination to prove required verification ran, on time, before they are allowed to stop."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(clap::Args, Debug)]
pub struct CheckCli {
    /// Work item key to gate (defaults to STOPGATE_WORK_ITEM, then the most
    /// recently updated open item).
    #[clap(long)]
    pub work_item: Option<String>,
    /// Output format: 'text' or 'json'. Block output is always JSON on stdout.
    #[clap(long, default_value = "text")]
    pub format: String,
}

#[derive(clap::Args, Debug)]
pub struct RequirementsCli {
    /// Work item key to resolve (defaults as for `check`).
    #[clap(long)]
    pub work_item: Option<String>,
    /// Output format: 'text' or 'json'.
    #[clap(long, default_value = "text")]
    pub format: String,
}

#[derive(clap::Args, Debug)]
pub struct AuditCli {
    #[clap(subcommand)]
    pub command: AuditCommand,
}

#[derive(Subcommand, Debug)]
pub enum AuditCommand {
    /// Show recent audit log entries (bypass usage and recovery actions).
    List {
        #[clap(long, default_value = "20")]
        limit: usize,
    },
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the termination gate (the Stop-hook entrypoint). Exit 0 allows,
    /// exit 2 blocks with a JSON document on stdout.
    #[clap(name = "check", visible_alias = "c")]
    Check(CheckCli),

    /// Show the resolved verification requirements and timing windows for a
    /// work item.
    #[clap(name = "requirements", visible_alias = "r")]
    Requirements(RequirementsCli),

    /// Audit log access.
    #[clap(name = "audit")]
    Audit(AuditCli),

    /// Initialize the planning-store schema under .stopgate/data/.
    #[clap(name = "init")]
    Init,

    /// Show version information.
    #[clap(name = "version")]
    Version,
}
