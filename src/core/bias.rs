//! Bias heuristics: process-skipping patterns surfaced at termination.
//!
//! Three independent predicates over one immutable snapshot of the work
//! item's state. High-severity findings block; medium findings are advisory.
//! The snapshot is assembled once so all heuristics observe a consistent
//! view even if the planner mutates rows mid-invocation.

use crate::core::model::{
    BiasFinding, BiasKind, Deliverable, Phase, PhaseHandoff, Severity, TransitionType,
    WorkItem, WorkItemStatus,
};
use std::path::Path;

/// Immutable per-invocation snapshot feeding all three heuristics.
#[derive(Debug, Clone)]
pub struct BiasInputs {
    pub item: WorkItem,
    pub accepted_handoffs: Vec<PhaseHandoff>,
    pub deliverables: Vec<Deliverable>,
    /// Non-test/markdown/config files changed in the working tree. `None`
    /// means the signal was unavailable (no git, diff failed), which every
    /// consumer treats as "no observable changeset".
    pub code_changes: Option<Vec<String>>,
    pub design_artifact_exists: bool,
}

impl BiasInputs {
    pub fn has_merged_deliverable(&self) -> bool {
        self.deliverables
            .iter()
            .any(|d| d.kind == "pull_request" && (d.merged || d.state == "completed"))
    }

    pub fn has_code_changes(&self) -> bool {
        self.code_changes.as_ref().is_some_and(|files| !files.is_empty())
    }

    fn has_accepted(&self, transition: TransitionType) -> bool {
        self.accepted_handoffs
            .iter()
            .any(|h| h.transition_type == transition)
    }
}

/// Run all three heuristics. Findings are independent; zero to three may
/// surface per invocation.
pub fn detect(inputs: &BiasInputs) -> Vec<BiasFinding> {
    let mut findings = Vec::new();
    if let Some(f) = completion_bias(inputs) {
        findings.push(f);
    }
    if let Some(f) = efficiency_bias(inputs) {
        findings.push(f);
    }
    if let Some(f) = autonomy_bias(inputs) {
        findings.push(f);
    }
    findings
}

/// Shipped evidence exists but the item never reached its terminal state:
/// the session is declaring victory without closing the loop.
fn completion_bias(inputs: &BiasInputs) -> Option<BiasFinding> {
    let shipped = inputs.has_merged_deliverable() || inputs.item.completion_date.is_some();
    if !shipped
        || inputs.item.status == WorkItemStatus::Completed
        || inputs.item.current_phase == Phase::LeadFinal
    {
        return None;
    }
    Some(BiasFinding {
        kind: BiasKind::CompletionBias,
        severity: Severity::High,
        message: format!(
            "{} has shipped evidence but status is not completed and phase is not LEAD_FINAL",
            inputs.item.key
        ),
        root_cause: "work was merged/shipped without driving the item through final approval"
            .to_string(),
        remediation: "run the final-approval transition before stopping".to_string(),
        command: Some(format!(
            "planner handoff create --work-item {} --transition {}",
            inputs.item.key,
            TransitionType::PlanVerifyToLeadFinal.as_str()
        )),
    })
}

/// Implementation is underway but the phase-entry handoffs that must
/// logically precede it were never accepted.
fn efficiency_bias(inputs: &BiasInputs) -> Option<BiasFinding> {
    if inputs.item.current_phase != Phase::Exec {
        return None;
    }
    let missing: Vec<&str> = [TransitionType::LeadToPlan, TransitionType::PlanToExec]
        .into_iter()
        .filter(|t| !inputs.has_accepted(*t))
        .map(|t| t.as_str())
        .collect();
    if missing.is_empty() {
        return None;
    }
    let next = missing[0];
    Some(BiasFinding {
        kind: BiasKind::EfficiencyBias,
        severity: Severity::Medium,
        message: format!(
            "{} is in EXEC but skipped handoff(s): {}",
            inputs.item.key,
            missing.join(", ")
        ),
        root_cause: "implementation started without accepted phase-entry handoffs".to_string(),
        remediation: format!("record the {} handoff before continuing", next),
        command: Some(format!(
            "planner handoff create --work-item {} --transition {}",
            inputs.item.key, next
        )),
    })
}

/// Code landed for a type that mandates a design/requirements artifact,
/// and no such artifact exists.
fn autonomy_bias(inputs: &BiasInputs) -> Option<BiasFinding> {
    if !inputs.item.item_type.mandates_design_artifact()
        || !inputs.has_code_changes()
        || inputs.design_artifact_exists
    {
        return None;
    }
    Some(BiasFinding {
        kind: BiasKind::AutonomyBias,
        severity: Severity::High,
        message: format!(
            "{} has code changes but no design/requirements artifact",
            inputs.item.key
        ),
        root_cause: "implementation outran the mandated design artifact".to_string(),
        remediation: "author the missing design artifact before continuing".to_string(),
        command: Some(format!("planner artifact create --work-item {}", inputs.item.key)),
    })
}

pub fn has_high_severity(findings: &[BiasFinding]) -> bool {
    findings.iter().any(|f| f.severity == Severity::High)
}

/// Run git with bounded, non-interactive behavior.
fn run_git(repo_root: &Path, args: &[&str]) -> Result<String, String> {
    let output = std::process::Command::new("git")
        .args(args)
        .current_dir(repo_root)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .map_err(|e| format!("git failed: {}", e))?;

    if !output.status.success() {
        return Err(format!(
            "git failed: {}",
            String::from_utf8_lossy(&output.stderr)
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Working-tree changeset filtered down to code paths. Returns `None` when
/// the signal is unavailable; the caller logs the degradation and the
/// heuristics treat it as "no changes".
pub fn code_changeset(repo_root: &Path, excludes: &[String]) -> Option<Vec<String>> {
    let stdout = run_git(repo_root, &["diff", "--name-only", "HEAD"]).ok()?;
    Some(filter_code_paths(stdout.lines(), excludes))
}

/// Extensions that never count as code changes for bias purposes.
const NON_CODE_EXTENSIONS: &[&str] = &[
    "md", "markdown", "rst", "toml", "yml", "yaml", "json", "ini", "cfg", "lock",
];

fn is_test_path(path: &str) -> bool {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    path.split('/')
        .any(|segment| segment == "tests" || segment == "test" || segment == "__tests__")
        || file_name.contains("_test.")
        || file_name.contains(".test.")
        || file_name.contains(".spec.")
        || file_name.starts_with("test_")
}

pub fn filter_code_paths<'a>(
    paths: impl Iterator<Item = &'a str>,
    excludes: &[String],
) -> Vec<String> {
    paths
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .filter(|p| {
            let ext = p.rsplit('.').next().unwrap_or("");
            !NON_CODE_EXTENSIONS.contains(&ext)
        })
        .filter(|p| !is_test_path(p))
        .filter(|p| !excludes.iter().any(|pattern| glob_match(pattern, p)))
        .map(|p| p.to_string())
        .collect()
}

/// Simple glob match over path patterns (`*` single level, `**` any depth).
fn glob_match(pattern: &str, text: &str) -> bool {
    if pattern.contains("**") {
        let parts: Vec<&str> = pattern.split("**").collect();
        if parts.len() == 2 {
            let prefix = parts[0];
            let suffix = parts[1];
            let suffix_ok = suffix.is_empty()
                || text.ends_with(suffix)
                || suffix == "/" && text.contains('/');
            return suffix_ok && (prefix.is_empty() || text.starts_with(prefix));
        }
    }

    if pattern.contains('*') && !pattern.contains("**") {
        let parts: Vec<&str> = pattern.split('*').collect();
        if parts.len() == 2 {
            let prefix = parts[0];
            let suffix = parts[1];
            // Single-star patterns stay within one path segment.
            return text.starts_with(prefix)
                && text.ends_with(suffix)
                && !text[prefix.len()..text.len() - suffix.len()].contains('/');
        }
    }

    pattern == text
}
