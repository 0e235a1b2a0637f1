//! Stopgate: a workflow compliance gatekeeper for agent sessions.
//!
//! **Stopgate is the policy engine a coding-agent session calls when it tries
//! to stop.** It decides whether the termination may proceed or must be
//! blocked with actionable remediation.
//!
//! # Core principles
//!
//! - **Fail closed**: a required gate that cannot be verified blocks; only a
//!   valid, audited bypass overrides it
//! - **Deterministic**: requirement resolution is pure, so any blocking
//!   decision can be replayed for audits
//! - **One decision per invocation**: exit 0 allows the stop, exit 2 blocks
//!   it with a machine-readable document on stdout
//! - **Advisories never block**: recommended checks and medium-severity bias
//!   findings surface on stderr without flipping the outcome
//!
//! # For AI agents
//!
//! 1. Run `stopgate check` before claiming a session is finished
//! 2. On exit 2, read the `remediation` list from stdout and do it
//! 3. Never delete `.stopgate/` state to make the gate pass
//! 4. A bypass artifact is single-use and always audited
//!
//! # Crate structure
//!
//! - [`core`]: gate subsystems (time, requirements, sub-agents, bias,
//!   post-completion, bypass, orchestrator) and the store plumbing

pub mod cli;
pub mod core;

use crate::cli::{AuditCommand, Cli, Command};
use crate::core::config::GateConfig;
use crate::core::gate::{self, Gate};
use crate::core::requirements::{self, SubAgentCode};
use crate::core::store::Store;
use crate::core::{db, error};

use chrono::Utc;
use clap::Parser;

pub const WORK_ITEM_ENV: &str = "STOPGATE_WORK_ITEM";

/// Parse the CLI, dispatch, and return the process exit code.
pub fn run() -> Result<i32, error::GateError> {
    let cli = Cli::parse();
    let current_dir = std::env::current_dir()?;
    let store = Store::discover(&current_dir);

    match cli.command {
        Command::Version => {
            println!("v{}", env!("CARGO_PKG_VERSION"));
            Ok(0)
        }
        Command::Init => {
            db::initialize_planning_db(&store.root)?;
            println!("Planning store initialized at {}", store.db_path().display());
            Ok(0)
        }
        Command::Check(args) => {
            let config = GateConfig::load(&store.root)?;
            let key = args
                .work_item
                .or_else(|| std::env::var(WORK_ITEM_ENV).ok().filter(|k| !k.is_empty()));
            let gate = Gate::new(&store, &config, &current_dir);
            let decision = gate.run(key.as_deref(), Utc::now());
            Ok(gate::emit(&decision, args.format == "json"))
        }
        Command::Requirements(args) => {
            let key = args
                .work_item
                .or_else(|| std::env::var(WORK_ITEM_ENV).ok().filter(|k| !k.is_empty()));
            let item = match key.as_deref() {
                Some(key) => store.work_item(key)?,
                None => store.ambient_work_item()?,
            };
            let Some(item) = item else {
                return Err(error::GateError::NotFound(
                    "no tracked work item".to_string(),
                ));
            };
            print_requirements(&item, args.format == "json");
            Ok(0)
        }
        Command::Audit(audit) => match audit.command {
            AuditCommand::List { limit } => {
                for entry in store.audit_entries(limit)? {
                    println!("{}", serde_json::to_string(&entry)?);
                }
                Ok(0)
            }
        },
    }
}

fn print_requirements(item: &crate::core::model::WorkItem, json: bool) {
    let set = requirements::resolve(item);
    if json {
        let describe = |codes: &std::collections::BTreeSet<SubAgentCode>| {
            codes
                .iter()
                .map(|c| {
                    serde_json::json!({
                        "code": c.as_str(),
                        "window": requirements::timing_rule(c).map(|r| r.describe(c)),
                    })
                })
                .collect::<Vec<_>>()
        };
        let doc = serde_json::json!({
            "work_item_key": item.key,
            "required": describe(&set.required),
            "recommended": describe(&set.recommended),
        });
        println!("{}", serde_json::to_string_pretty(&doc).unwrap_or_default());
        return;
    }
    println!("Requirements for {}:", item.key);
    for (label, codes) in [("required", &set.required), ("recommended", &set.recommended)] {
        println!("  {}:", label);
        for code in codes {
            match requirements::timing_rule(code) {
                Some(rule) => println!("    {}: {}", code.as_str(), rule.describe(code)),
                None => println!("    {}", code.as_str()),
            }
        }
    }
}
