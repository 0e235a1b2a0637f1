//! Planning-store data model as seen by the gate.
//!
//! The planning system owns these records; the gate only reads them. Every
//! enum is closed with an explicit unknown fallback so that a row written by
//! a newer planner version degrades to a neutral profile instead of a panic.

use serde::{Deserialize, Serialize};

/// Work item type. Drives the required/recommended verification profiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemType {
    Feature,
    Enhancement,
    Bugfix,
    Infrastructure,
    Database,
    Security,
    Documentation,
    Refactor,
    Performance,
    Orchestrator,
    Unknown,
}

impl WorkItemType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "feature" => Self::Feature,
            "enhancement" => Self::Enhancement,
            "bugfix" => Self::Bugfix,
            "infrastructure" => Self::Infrastructure,
            "database" => Self::Database,
            "security" => Self::Security,
            "documentation" => Self::Documentation,
            "refactor" => Self::Refactor,
            "performance" => Self::Performance,
            "orchestrator" => Self::Orchestrator,
            _ => Self::Unknown,
        }
    }

    /// Types whose completion implies shipped code (retrospective expected).
    pub fn is_code_bearing(&self) -> bool {
        !matches!(self, Self::Documentation | Self::Orchestrator | Self::Unknown)
    }

    /// Types that mandate a design/requirements artifact before code lands.
    pub fn mandates_design_artifact(&self) -> bool {
        matches!(self, Self::Feature | Self::Enhancement)
    }

    /// Types whose completion is expected to refresh user-facing docs.
    pub fn wants_doc_verification(&self) -> bool {
        matches!(self, Self::Feature | Self::Enhancement)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemStatus {
    Draft,
    Planning,
    InProgress,
    Verification,
    Completed,
    Unknown,
}

impl WorkItemStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "draft" => Self::Draft,
            "planning" => Self::Planning,
            "in_progress" => Self::InProgress,
            "verification" => Self::Verification,
            "completed" => Self::Completed,
            _ => Self::Unknown,
        }
    }
}

/// Lifecycle phase the item currently sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    #[serde(rename = "LEAD")]
    Lead,
    #[serde(rename = "PLAN")]
    Plan,
    #[serde(rename = "EXEC")]
    Exec,
    #[serde(rename = "PLAN_VERIFY")]
    PlanVerify,
    #[serde(rename = "LEAD_FINAL")]
    LeadFinal,
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl Phase {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "LEAD" => Self::Lead,
            "PLAN" => Self::Plan,
            "EXEC" => Self::Exec,
            "PLAN_VERIFY" => Self::PlanVerify,
            "LEAD_FINAL" => Self::LeadFinal,
            _ => Self::Unknown,
        }
    }

    /// Phases close enough to completion that the universal verification set
    /// (retrospective capture) becomes required.
    pub fn is_near_completion(&self) -> bool {
        matches!(self, Self::PlanVerify | Self::LeadFinal)
    }
}

/// Accepted phase-pair transitions. These are the timing anchors for
/// verification windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransitionType {
    #[serde(rename = "LEAD_TO_PLAN")]
    LeadToPlan,
    #[serde(rename = "PLAN_TO_EXEC")]
    PlanToExec,
    #[serde(rename = "EXEC_TO_PLAN_VERIFY")]
    ExecToPlanVerify,
    #[serde(rename = "PLAN_VERIFY_TO_LEAD_FINAL")]
    PlanVerifyToLeadFinal,
    #[serde(rename = "LEAD_FINAL_TO_COMPLETE")]
    LeadFinalToComplete,
}

impl TransitionType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "LEAD_TO_PLAN" => Some(Self::LeadToPlan),
            "PLAN_TO_EXEC" => Some(Self::PlanToExec),
            "EXEC_TO_PLAN_VERIFY" => Some(Self::ExecToPlanVerify),
            "PLAN_VERIFY_TO_LEAD_FINAL" => Some(Self::PlanVerifyToLeadFinal),
            "LEAD_FINAL_TO_COMPLETE" => Some(Self::LeadFinalToComplete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeadToPlan => "LEAD_TO_PLAN",
            Self::PlanToExec => "PLAN_TO_EXEC",
            Self::ExecToPlanVerify => "EXEC_TO_PLAN_VERIFY",
            Self::PlanVerifyToLeadFinal => "PLAN_VERIFY_TO_LEAD_FINAL",
            Self::LeadFinalToComplete => "LEAD_FINAL_TO_COMPLETE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "CONDITIONAL_PASS")]
    ConditionalPass,
    #[serde(rename = "FAIL")]
    Fail,
    #[serde(rename = "ERROR")]
    Error,
    #[serde(rename = "IN_PROGRESS")]
    InProgress,
    #[serde(rename = "SKIPPED")]
    Skipped,
}

impl Verdict {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "PASS" => Some(Self::Pass),
            "CONDITIONAL_PASS" => Some(Self::ConditionalPass),
            "FAIL" => Some(Self::Fail),
            "ERROR" => Some(Self::Error),
            "IN_PROGRESS" => Some(Self::InProgress),
            "SKIPPED" => Some(Self::Skipped),
            _ => None,
        }
    }

    pub fn is_passing(&self) -> bool {
        matches!(self, Self::Pass | Self::ConditionalPass)
    }
}

/// The unit of tracked work, read from the planning store.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub id: String,
    pub key: String,
    pub item_type: WorkItemType,
    pub category: Option<String>,
    pub status: WorkItemStatus,
    pub current_phase: Phase,
    pub completion_date: Option<String>,
    pub updated_at: Option<String>,
}

/// An accepted transition between lifecycle phases.
#[derive(Debug, Clone)]
pub struct PhaseHandoff {
    pub transition_type: TransitionType,
    pub created_at: String,
}

/// Recorded outcome of one verification task run.
#[derive(Debug, Clone)]
pub struct SubAgentExecution {
    pub sub_agent_code: String,
    pub verdict: Option<Verdict>,
    pub created_at: Option<String>,
}

/// Merged/shipped deliverable evidence (e.g. a completed pull request).
#[derive(Debug, Clone)]
pub struct Deliverable {
    pub kind: String,
    pub state: String,
    pub merged: bool,
}

/// One-shot override artifact, user-authored before invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BypassRecord {
    pub work_item_key: String,
    pub explanation: String,
    pub retrospective_committed: bool,
    #[serde(default)]
    pub retrospective_id: Option<String>,
    #[serde(default)]
    pub skipped_agents: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BiasKind {
    CompletionBias,
    EfficiencyBias,
    AutonomyBias,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
}

/// A heuristic signal that process steps were likely skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiasFinding {
    pub kind: BiasKind,
    pub severity: Severity,
    pub message: String,
    pub root_cause: String,
    pub remediation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Allow,
    Block,
}

/// The gate's single output value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub outcome: Outcome,
    pub reason: String,
    pub details: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<Vec<String>>,
}

impl Decision {
    pub fn allow(reason: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            outcome: Outcome::Allow,
            reason: reason.into(),
            details,
            remediation: None,
        }
    }

    pub fn block(
        reason: impl Into<String>,
        details: serde_json::Value,
        remediation: Vec<String>,
    ) -> Self {
        Self {
            outcome: Outcome::Block,
            reason: reason.into(),
            details,
            remediation: Some(remediation),
        }
    }

    pub fn is_block(&self) -> bool {
        self.outcome == Outcome::Block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_type_falls_back() {
        assert_eq!(WorkItemType::parse("telepathy"), WorkItemType::Unknown);
        assert!(!WorkItemType::Unknown.is_code_bearing());
    }

    #[test]
    fn test_code_bearing_types() {
        assert!(WorkItemType::Bugfix.is_code_bearing());
        assert!(WorkItemType::Feature.is_code_bearing());
        assert!(!WorkItemType::Documentation.is_code_bearing());
        assert!(!WorkItemType::Orchestrator.is_code_bearing());
    }

    #[test]
    fn test_design_artifact_mandate() {
        assert!(WorkItemType::Feature.mandates_design_artifact());
        assert!(WorkItemType::Enhancement.mandates_design_artifact());
        assert!(!WorkItemType::Bugfix.mandates_design_artifact());
    }

    #[test]
    fn test_near_completion_phases() {
        assert!(Phase::PlanVerify.is_near_completion());
        assert!(Phase::LeadFinal.is_near_completion());
        assert!(!Phase::Exec.is_near_completion());
        assert!(!Phase::Unknown.is_near_completion());
    }

    #[test]
    fn test_transition_round_trip() {
        for raw in [
            "LEAD_TO_PLAN",
            "PLAN_TO_EXEC",
            "EXEC_TO_PLAN_VERIFY",
            "PLAN_VERIFY_TO_LEAD_FINAL",
            "LEAD_FINAL_TO_COMPLETE",
        ] {
            assert_eq!(TransitionType::parse(raw).unwrap().as_str(), raw);
        }
        assert_eq!(TransitionType::parse("SIDEWAYS"), None);
    }

    #[test]
    fn test_passing_verdicts() {
        assert!(Verdict::Pass.is_passing());
        assert!(Verdict::ConditionalPass.is_passing());
        assert!(!Verdict::Fail.is_passing());
        assert!(!Verdict::InProgress.is_passing());
        assert_eq!(Verdict::parse("MAYBE"), None);
    }
}
