//! Requirement resolution: which verification sub-agents a work item needs,
//! and when each one is allowed to run.
//!
//! Everything here is table-driven and pure. The tables are compiled
//! constants; `resolve` never touches the store, so identical inputs always
//! yield identical sets and a blocking decision can be replayed for audits.

use crate::core::model::{Phase, TransitionType, WorkItem, WorkItemType};
use std::collections::BTreeSet;

/// Closed set of known verification-task identifiers. Codes the planner
/// invents later land in `Unknown` and resolve to a neutral profile.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubAgentCode {
    Architecture,
    CodeReview,
    Testing,
    Security,
    Performance,
    Database,
    Rca,
    Regression,
    DocsUpdate,
    Retrospective,
    Unknown(String),
}

impl SubAgentCode {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "ARCHITECTURE" => Self::Architecture,
            "CODE_REVIEW" => Self::CodeReview,
            "TESTING" => Self::Testing,
            "SECURITY" => Self::Security,
            "PERFORMANCE" => Self::Performance,
            "DATABASE" => Self::Database,
            "RCA" => Self::Rca,
            "REGRESSION" => Self::Regression,
            "DOCS_UPDATE" => Self::DocsUpdate,
            "RETROSPECTIVE" => Self::Retrospective,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Architecture => "ARCHITECTURE",
            Self::CodeReview => "CODE_REVIEW",
            Self::Testing => "TESTING",
            Self::Security => "SECURITY",
            Self::Performance => "PERFORMANCE",
            Self::Database => "DATABASE",
            Self::Rca => "RCA",
            Self::Regression => "REGRESSION",
            Self::DocsUpdate => "DOCS_UPDATE",
            Self::Retrospective => "RETROSPECTIVE",
            Self::Unknown(s) => s,
        }
    }
}

/// Derived (never persisted) requirement sets for one work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementSet {
    pub required: BTreeSet<SubAgentCode>,
    pub recommended: BTreeSet<SubAgentCode>,
}

/// Temporal window a code must execute within, anchored on accepted handoffs.
#[derive(Debug, Clone)]
pub struct TimingRule {
    pub after: Option<TransitionType>,
    pub before: Option<TransitionType>,
    pub phase_label: &'static str,
}

impl TimingRule {
    pub fn describe(&self, code: &SubAgentCode) -> String {
        match (self.after, self.before) {
            (Some(a), Some(b)) => format!(
                "{} must run during {} (after {} and before {})",
                code.as_str(),
                self.phase_label,
                a.as_str(),
                b.as_str()
            ),
            (Some(a), None) => format!(
                "{} must run during {} (after {})",
                code.as_str(),
                self.phase_label,
                a.as_str()
            ),
            (None, Some(b)) => format!(
                "{} must run during {} (before {})",
                code.as_str(),
                self.phase_label,
                b.as_str()
            ),
            (None, None) => format!("{} may run at any point", code.as_str()),
        }
    }
}

fn type_profile(item_type: &WorkItemType) -> (&'static [SubAgentCode], &'static [SubAgentCode]) {
    use SubAgentCode::*;
    match item_type {
        WorkItemType::Feature => (
            &[Architecture, CodeReview, Testing],
            &[Performance, DocsUpdate],
        ),
        WorkItemType::Enhancement => (&[CodeReview, Testing], &[Architecture, DocsUpdate]),
        WorkItemType::Bugfix => (&[Rca, Regression, Testing], &[CodeReview]),
        WorkItemType::Infrastructure => (&[Architecture, Security], &[Testing]),
        WorkItemType::Database => (&[Database, Testing], &[Performance]),
        WorkItemType::Security => (&[Security, CodeReview, Testing], &[Rca]),
        WorkItemType::Documentation => (&[DocsUpdate], &[]),
        WorkItemType::Refactor => (&[CodeReview, Regression], &[Architecture]),
        WorkItemType::Performance => (&[Performance, Regression], &[CodeReview]),
        WorkItemType::Orchestrator => (&[], &[Architecture]),
        WorkItemType::Unknown => (&[], &[]),
    }
}

fn category_additions(category: &str) -> &'static [SubAgentCode] {
    use SubAgentCode::*;
    match category {
        "security" => &[Security],
        "quality" => &[CodeReview],
        "performance" => &[Performance],
        "data_integrity" => &[Database],
        _ => &[],
    }
}

/// Universal set unioned into `required` in the near-completion phases.
const UNIVERSAL_NEAR_COMPLETION: &[SubAgentCode] = &[SubAgentCode::Retrospective];

/// Derive the required/recommended verification sets for a work item.
pub fn resolve(item: &WorkItem) -> RequirementSet {
    let (required_profile, recommended_profile) = type_profile(&item.item_type);
    let mut required: BTreeSet<SubAgentCode> = required_profile.iter().cloned().collect();
    let recommended: BTreeSet<SubAgentCode> = recommended_profile
        .iter()
        .filter(|c| !required.contains(c))
        .cloned()
        .collect();

    if let Some(category) = item.category.as_deref() {
        for code in category_additions(category) {
            required.insert(code.clone());
        }
    }

    if item.current_phase.is_near_completion() {
        for code in UNIVERSAL_NEAR_COMPLETION {
            required.insert(code.clone());
        }
    }

    // A code promoted to required by category/phase drops out of recommended.
    let recommended = recommended
        .into_iter()
        .filter(|c| !required.contains(c))
        .collect();

    RequirementSet {
        required,
        recommended,
    }
}

/// Timing rule for a code, if it has one. Codes without a rule may run at
/// any point in the lifecycle.
pub fn timing_rule(code: &SubAgentCode) -> Option<TimingRule> {
    use TransitionType::*;
    let (after, before, phase_label) = match code {
        SubAgentCode::Architecture => (Some(LeadToPlan), Some(PlanToExec), "PLAN"),
        SubAgentCode::Rca => (Some(LeadToPlan), Some(PlanToExec), "PLAN"),
        SubAgentCode::Database => (Some(LeadToPlan), Some(ExecToPlanVerify), "PLAN or EXEC"),
        SubAgentCode::Security => (Some(LeadToPlan), None, "PLAN onward"),
        SubAgentCode::CodeReview => (Some(PlanToExec), Some(ExecToPlanVerify), "EXEC"),
        SubAgentCode::Regression => (Some(PlanToExec), None, "EXEC onward"),
        SubAgentCode::Performance => (Some(PlanToExec), None, "EXEC onward"),
        SubAgentCode::Testing => (
            Some(PlanToExec),
            Some(PlanVerifyToLeadFinal),
            "EXEC or PLAN_VERIFY",
        ),
        SubAgentCode::Retrospective => (Some(ExecToPlanVerify), None, "PLAN_VERIFY onward"),
        SubAgentCode::DocsUpdate => (Some(ExecToPlanVerify), None, "PLAN_VERIFY onward"),
        SubAgentCode::Unknown(_) => return None,
    };
    Some(TimingRule {
        after,
        before,
        phase_label,
    })
}

/// Fixed total order used only to sort remediation suggestions. Never
/// consulted for the allow/block outcome itself.
pub fn remediation_rank(code: &SubAgentCode) -> usize {
    const ORDER: &[SubAgentCode] = &[
        SubAgentCode::Rca,
        SubAgentCode::Architecture,
        SubAgentCode::Database,
        SubAgentCode::Security,
        SubAgentCode::CodeReview,
        SubAgentCode::Testing,
        SubAgentCode::Regression,
        SubAgentCode::Performance,
        SubAgentCode::DocsUpdate,
        SubAgentCode::Retrospective,
    ];
    ORDER
        .iter()
        .position(|c| c == code)
        .unwrap_or(ORDER.len())
}
