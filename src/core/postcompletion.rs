//! Post-completion checks: the finish line for items already marked done.
//!
//! Ship is the only blocking check, and only when an observable change-set
//! proves there is something left to ship. Learn (retrospective) and
//! document (docs verification) are advisories gated by work-item type.

use crate::core::model::{Decision, Deliverable, Verdict, WorkItem, WorkItemStatus};

/// Inputs snapshot for the completed-item checks.
#[derive(Debug, Clone)]
pub struct CompletionInputs {
    pub item: WorkItem,
    pub deliverables: Vec<Deliverable>,
    /// Filtered working-tree changeset; `None` when the signal was
    /// unavailable, which reads as "nothing observable left to ship".
    pub code_changes: Option<Vec<String>>,
    pub retrospective_exists: bool,
    pub doc_verification: Option<Verdict>,
}

/// Outcome of the post-completion pass: either a blocking decision or a
/// list of advisory gap descriptions to surface on the allow path.
#[derive(Debug)]
pub enum CompletionOutcome {
    Block(Decision),
    Advisories(Vec<String>),
}

pub fn validate(inputs: &CompletionInputs) -> CompletionOutcome {
    debug_assert_eq!(inputs.item.status, WorkItemStatus::Completed);

    let shipped = inputs
        .deliverables
        .iter()
        .any(|d| d.merged || d.state == "completed")
        || inputs.item.completion_date.is_some();

    // An already-merged branch leaves no diff behind; absence of a
    // change-set therefore is not evidence of an unshipped gap.
    let pending_changes = inputs
        .code_changes
        .as_ref()
        .is_some_and(|files| !files.is_empty());

    if !shipped && pending_changes {
        let files = inputs.code_changes.clone().unwrap_or_default();
        return CompletionOutcome::Block(Decision::block(
            "work item is marked completed but the change-set was never shipped",
            serde_json::json!({
                "work_item_key": inputs.item.key,
                "missing_action": "ship",
                "pending_files": files,
            }),
            vec![
                format!(
                    "Publish/merge the pending change-set for {} before stopping",
                    inputs.item.key
                ),
                "git status --short".to_string(),
            ],
        ));
    }

    let mut advisories = Vec::new();
    if inputs.item.item_type.is_code_bearing() && !inputs.retrospective_exists {
        advisories.push(format!(
            "no retrospective recorded for completed item {} (learn step missing)",
            inputs.item.key
        ));
    }
    if inputs.item.item_type.wants_doc_verification()
        && !inputs.doc_verification.is_some_and(|v| v.is_passing())
    {
        advisories.push(format!(
            "no passing documentation verification for completed item {} (document step missing)",
            inputs.item.key
        ));
    }
    CompletionOutcome::Advisories(advisories)
}
