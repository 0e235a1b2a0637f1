//! The termination gate orchestrator.
//!
//! Sequences bypass handling, work-item resolution, post-completion checks,
//! bias heuristics, and sub-agent validation into exactly one Decision per
//! invocation. Holds no state of its own; every input is read once into a
//! snapshot and the components are pure over it.
//!
//! Signal handling follows a strict taxonomy: store reads feeding required
//! gates turn into an explicit "could not verify" block on failure, while
//! advisory signals (the git changeset, retrospective/doc-verification rows)
//! degrade to "finding not raised" with a stderr warning.

use crate::core::bias::{self, BiasInputs};
use crate::core::bypass::{self, BypassCheck};
use crate::core::config::GateConfig;
use crate::core::error::GateError;
use crate::core::model::{
    BiasFinding, Decision, Outcome, Verdict, WorkItem, WorkItemStatus,
};
use crate::core::output;
use crate::core::postcompletion::{self, CompletionInputs, CompletionOutcome};
use crate::core::requirements;
use crate::core::store::Store;
use crate::core::subagents;
use crate::core::time;
use chrono::{DateTime, Duration, Utc};
use colored::Colorize;
use std::path::Path;

pub const EXIT_ALLOW: i32 = 0;
pub const EXIT_BLOCK: i32 = 2;

pub struct Gate<'a> {
    pub store: &'a Store,
    pub config: &'a GateConfig,
    /// Repository root for the change-set diff (normally the cwd).
    pub repo_root: &'a Path,
}

impl<'a> Gate<'a> {
    pub fn new(store: &'a Store, config: &'a GateConfig, repo_root: &'a Path) -> Self {
        Self {
            store,
            config,
            repo_root,
        }
    }

    /// Run the full gate sequence and produce the single Decision.
    pub fn run(&self, work_item_key: Option<&str>, now: DateTime<Utc>) -> Decision {
        // Bypass first: a valid artifact short-circuits everything else.
        match bypass::check(self.store, &self.config.bypass_file) {
            Ok(BypassCheck::Absent) => {}
            Ok(BypassCheck::Allowed { audit_event_id }) => {
                progress("bypass artifact validated; termination allowed");
                return Decision::allow(
                    "audited bypass consumed",
                    serde_json::json!({ "audit_event_id": audit_event_id }),
                );
            }
            Ok(BypassCheck::Blocked { reason, details }) => {
                return Decision::block(
                    reason,
                    details,
                    vec![
                        "Fix the bypass artifact in place (it remains at its well-known path), or run the required verification instead".to_string(),
                    ],
                );
            }
            Err(e) => {
                return could_not_verify("bypass artifact", None, &e);
            }
        }

        // Resolve the work item from ambient context.
        let item = match self.resolve_item(work_item_key) {
            Ok(Some(item)) => item,
            Ok(None) => {
                progress("no tracked work item; nothing to gate");
                return Decision::allow(
                    "no tracked work item; nothing to gate",
                    serde_json::json!({}),
                );
            }
            Err(GateError::NotFound(key)) => {
                return Decision::block(
                    "could not verify: the named work item does not exist",
                    serde_json::json!({
                        "work_item_key": key,
                        "failed_signal": "work_item_lookup",
                    }),
                    vec![format!(
                        "Check the work item key, then re-run: stopgate check --work-item {}",
                        key
                    )],
                );
            }
            Err(e) => return could_not_verify("work item lookup", work_item_key, &e),
        };
        progress(&format!(
            "gating {} ({:?}, {:?}, phase {:?})",
            item.key.bold(),
            item.item_type,
            item.status,
            item.current_phase
        ));

        // Required-gate signals: any failure here is a hard "could not verify".
        let handoffs = match self.store.accepted_handoffs(&item.key) {
            Ok(h) => h,
            Err(e) => return could_not_verify("phase handoffs", Some(&item.key), &e),
        };
        let executions = match self.store.executions(&item.key) {
            Ok(x) => x,
            Err(e) => return could_not_verify("sub-agent executions", Some(&item.key), &e),
        };
        let deliverables = match self.store.deliverables(&item.key) {
            Ok(d) => d,
            Err(e) => return could_not_verify("completion evidence", Some(&item.key), &e),
        };

        // Advisory signals: degrade to "finding not raised" on failure.
        let code_changes = bias::code_changeset(self.repo_root, &self.config.diff_excludes);
        if code_changes.is_none() {
            warn("change-set diff unavailable; treating as no code changes");
        }
        let retrospective_exists = self.advisory_flag(
            self.store.retrospective_exists(&item.key),
            "retrospective lookup",
        );
        let design_artifact_exists = self.advisory_flag(
            self.store.design_artifact_exists(&item.key),
            "design artifact lookup",
        );
        let doc_verification = match self.store.latest_doc_verification(&item.key) {
            Ok(v) => v,
            Err(e) => {
                warn(&format!("doc verification lookup degraded: {}", e));
                // Suppress the advisory rather than raise it on bad data.
                Some(Verdict::Pass)
            }
        };

        let mut advisories: Vec<String> = Vec::new();

        if item.status == WorkItemStatus::Completed {
            let outcome = postcompletion::validate(&CompletionInputs {
                item: item.clone(),
                deliverables: deliverables.clone(),
                code_changes: code_changes.clone(),
                retrospective_exists,
                doc_verification,
            });
            match outcome {
                CompletionOutcome::Block(decision) => return decision,
                CompletionOutcome::Advisories(found) => advisories.extend(found),
            }
        }

        let bias_inputs = BiasInputs {
            item: item.clone(),
            accepted_handoffs: handoffs.clone(),
            deliverables,
            code_changes,
            design_artifact_exists,
        };
        let findings = bias::detect(&bias_inputs);
        if bias::has_high_severity(&findings) {
            return bias_block(&item, &findings);
        }
        for finding in &findings {
            advisories.push(finding.message.clone());
        }

        let requirement_set = requirements::resolve(&item);
        let report = subagents::validate(
            &requirement_set,
            &handoffs,
            &executions,
            Duration::minutes(self.config.freshness_minutes),
            now,
        );
        let mut decision = subagents::handle_results(&item, &report);

        if decision.outcome == Outcome::Allow && !advisories.is_empty() {
            warn(&output::preview_findings(&advisories, 3, 120));
            if let Some(obj) = decision.details.as_object_mut() {
                obj.insert("advisories".to_string(), serde_json::json!(advisories));
            }
        }
        decision
    }

    fn resolve_item(&self, key: Option<&str>) -> Result<Option<WorkItem>, GateError> {
        match key {
            Some(key) => match self.store.work_item(key)? {
                Some(item) => Ok(Some(item)),
                None => Err(GateError::NotFound(key.to_string())),
            },
            None => self.store.ambient_work_item(),
        }
    }

    fn advisory_flag(&self, result: Result<bool, GateError>, signal: &str) -> bool {
        match result {
            Ok(v) => v,
            Err(e) => {
                warn(&format!("{} degraded: {}", signal, e));
                // "Finding not raised": a failed advisory lookup reads as
                // the evidence being present.
                true
            }
        }
    }
}

fn bias_block(item: &WorkItem, findings: &[BiasFinding]) -> Decision {
    let mut remediation: Vec<String> = Vec::new();
    for finding in findings {
        remediation.push(finding.remediation.clone());
        if let Some(command) = &finding.command {
            remediation.push(command.clone());
        }
    }
    Decision::block(
        "process-skipping bias detected",
        serde_json::json!({
            "work_item_key": item.key,
            "findings": findings,
        }),
        remediation,
    )
}

fn could_not_verify(signal: &str, key: Option<&str>, err: &GateError) -> Decision {
    Decision::block(
        format!("could not verify required gate signal: {}", signal),
        serde_json::json!({
            "work_item_key": key,
            "failed_signal": signal,
            "error": err.to_string(),
        }),
        vec![
            format!("Restore access to the planning store ({} read failed), then retry", signal),
            "stopgate check".to_string(),
        ],
    )
}

fn progress(msg: &str) {
    eprintln!("{} {}", "▸".dimmed(), msg);
}

fn warn(msg: &str) {
    eprintln!("{} {}", "!".yellow().bold(), msg);
}

/// Emit the decision on the process boundary and return the exit code.
/// Block always writes the machine-readable document to stdout; allow only
/// does so when JSON output was requested.
pub fn emit(decision: &Decision, json: bool) -> i32 {
    match decision.outcome {
        Outcome::Block => {
            let mut extra = serde_json::json!({
                "reason": decision.reason,
                "details": decision.details,
            });
            if let (Some(obj), Some(remediation)) =
                (extra.as_object_mut(), decision.remediation.as_ref())
            {
                obj.insert("remediation".to_string(), serde_json::json!(remediation));
            }
            let doc = time::decision_envelope("block", extra);
            println!("{}", serde_json::to_string_pretty(&doc).unwrap_or_default());
            eprintln!("{} {}", "BLOCK".red().bold(), decision.reason);
            EXIT_BLOCK
        }
        Outcome::Allow => {
            if json {
                let doc = time::decision_envelope(
                    "allow",
                    serde_json::json!({
                        "reason": decision.reason,
                        "details": decision.details,
                    }),
                );
                println!("{}", serde_json::to_string_pretty(&doc).unwrap_or_default());
            }
            eprintln!("{} {}", "ALLOW".green().bold(), decision.reason);
            EXIT_ALLOW
        }
    }
}
