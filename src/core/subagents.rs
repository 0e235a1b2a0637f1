//! Sub-agent validation: cross-references the resolved requirement sets
//! against recorded verification executions.
//!
//! Per code the checks run in strict order: freshness cache first, then
//! existence, then the temporal window anchored on accepted handoffs. Only
//! required codes ever produce blocking findings; recommended codes surface
//! as advisories.

use crate::core::model::{
    Decision, PhaseHandoff, SubAgentExecution, TransitionType, WorkItem,
};
use crate::core::requirements::{self, RequirementSet, SubAgentCode};
use crate::core::time;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// A required code whose passing execution landed outside its window.
#[derive(Debug, Clone)]
pub struct WrongTimingFinding {
    pub code: SubAgentCode,
    pub rule: String,
    /// Most recent passing execution timestamp, as evidence.
    pub last_execution_at: Option<String>,
}

/// The authoritative missing/late/cached sets for one work item.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub missing_required: Vec<SubAgentCode>,
    pub missing_recommended: Vec<SubAgentCode>,
    pub wrong_timing: Vec<WrongTimingFinding>,
    pub cached: Vec<SubAgentCode>,
}

impl ValidationReport {
    pub fn is_blocking(&self) -> bool {
        !self.missing_required.is_empty() || !self.wrong_timing.is_empty()
    }
}

/// Timing anchors: normalized timestamps of accepted handoffs, keyed by
/// transition. A transition with no accepted handoff yet has no anchor and
/// leaves the corresponding bound unset.
pub fn timing_anchors(handoffs: &[PhaseHandoff]) -> HashMap<TransitionType, DateTime<Utc>> {
    let mut anchors = HashMap::new();
    for handoff in handoffs {
        if let Some(ts) = time::normalize(Some(&handoff.created_at)) {
            // First accepted handoff per transition wins; history is
            // append-only and the earliest acceptance is the anchor.
            anchors.entry(handoff.transition_type).or_insert(ts);
        }
    }
    anchors
}

/// Validate every required and recommended code against the recorded
/// executions. `now` is injected so freshness behavior is reproducible.
pub fn validate(
    requirement_set: &RequirementSet,
    handoffs: &[PhaseHandoff],
    executions: &[SubAgentExecution],
    freshness: Duration,
    now: DateTime<Utc>,
) -> ValidationReport {
    let anchors = timing_anchors(handoffs);
    let mut report = ValidationReport::default();

    let mut passing_by_code: HashMap<SubAgentCode, Vec<Option<DateTime<Utc>>>> = HashMap::new();
    for execution in executions {
        if execution.verdict.is_some_and(|v| v.is_passing()) {
            passing_by_code
                .entry(SubAgentCode::parse(&execution.sub_agent_code))
                .or_default()
                .push(time::normalize(execution.created_at.as_deref()));
        }
    }

    let all_codes = requirement_set
        .required
        .iter()
        .map(|c| (c.clone(), true))
        .chain(requirement_set.recommended.iter().map(|c| (c.clone(), false)));

    for (code, is_required) in all_codes {
        let passing = passing_by_code.get(&code);

        // Freshness cache: a recent pass satisfies the code outright.
        let fresh = passing.is_some_and(|stamps| {
            stamps.iter().flatten().any(|ts| {
                let age = now.signed_duration_since(*ts);
                age >= Duration::zero() && age < freshness
            })
        });
        if fresh {
            report.cached.push(code);
            continue;
        }

        let Some(stamps) = passing else {
            if is_required {
                report.missing_required.push(code);
            } else {
                report.missing_recommended.push(code);
            }
            continue;
        };

        let Some(rule) = requirements::timing_rule(&code) else {
            continue;
        };
        let window_start = rule.after.and_then(|t| anchors.get(&t)).copied();
        let window_end = rule.before.and_then(|t| anchors.get(&t)).copied();

        // Both bounds unset: the window constrains nothing, so any passing
        // execution satisfies it even without a usable timestamp.
        let in_window = (window_start.is_none() && window_end.is_none())
            || stamps.iter().flatten().any(|ts| {
                window_start.is_none_or(|start| *ts >= start)
                    && window_end.is_none_or(|end| *ts <= end)
            });

        if !in_window && is_required {
            let last = stamps.iter().flatten().max().map(|ts| ts.to_rfc3339());
            report.wrong_timing.push(WrongTimingFinding {
                rule: rule.describe(&code),
                code,
                last_execution_at: last,
            });
        }
    }

    report
}

/// Map the validation report to the final decision.
pub fn handle_results(item: &WorkItem, report: &ValidationReport) -> Decision {
    let missing: Vec<&str> = report.missing_required.iter().map(|c| c.as_str()).collect();
    let advisory: Vec<&str> = report
        .missing_recommended
        .iter()
        .map(|c| c.as_str())
        .collect();
    let late: Vec<serde_json::Value> = report
        .wrong_timing
        .iter()
        .map(|f| {
            serde_json::json!({
                "code": f.code.as_str(),
                "rule": f.rule,
                "last_execution_at": f.last_execution_at,
            })
        })
        .collect();

    if report.is_blocking() {
        let mut offending: Vec<SubAgentCode> = report
            .missing_required
            .iter()
            .chain(report.wrong_timing.iter().map(|f| &f.code))
            .cloned()
            .collect();
        offending.sort_by_key(requirements::remediation_rank);
        offending.dedup();

        let mut remediation: Vec<String> = offending
            .iter()
            .map(|c| format!("Run the {} sub-agent for {}", c.as_str(), item.key))
            .collect();
        remediation.push(
            "Re-run the missing verification tasks, then attempt Stop again".to_string(),
        );
        remediation.push(format!("stopgate check --work-item {}", item.key));

        let reason = if missing.is_empty() {
            "required verification ran outside its phase window"
        } else if late.is_empty() {
            "required verification has not run"
        } else {
            "required verification is missing or mistimed"
        };

        return Decision::block(
            reason,
            serde_json::json!({
                "work_item_key": item.key,
                "missing_required": missing,
                "wrong_timing": late,
                "missing_recommended": advisory,
            }),
            remediation,
        );
    }

    Decision::allow(
        "all required verification satisfied",
        serde_json::json!({
            "work_item_key": item.key,
            "cache_hits": report.cached.len(),
            "cached": report.cached.iter().map(|c| c.as_str()).collect::<Vec<_>>(),
            "missing_recommended": advisory,
        }),
    )
}
