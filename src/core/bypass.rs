//! Single-use bypass artifact handling.
//!
//! The artifact is claimed atomically: it is renamed out of the well-known
//! path before being read, so two racing invocations can never both validate
//! the same artifact. Only successful validation deletes it; a rejected
//! artifact is restored to the well-known path, so its continued presence
//! after a run is the operator's rejection signal and the file can be fixed
//! in place.

use crate::core::error;
use crate::core::model::BypassRecord;
use crate::core::store::Store;
use crate::core::time;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

pub const MIN_EXPLANATION_CHARS: usize = 50;

/// Outcome of the bypass check. The blocked path carries the specific
/// failed precondition in its reason and details.
#[derive(Debug)]
pub enum BypassCheck {
    /// No artifact present; fall through to normal evaluation.
    Absent,
    /// Artifact validated; termination is allowed and audited.
    Allowed { audit_event_id: Option<String> },
    /// Artifact present but invalid; block with the given reason.
    Blocked { reason: String, details: serde_json::Value },
}

pub fn artifact_path(store_root: &Path, bypass_file: &str) -> PathBuf {
    store_root.join(bypass_file)
}

/// Atomically claim the artifact by renaming it to a one-shot name. After a
/// successful rename the well-known path is free; the claimed copy belongs
/// to this invocation alone.
fn claim_artifact(path: &Path) -> Option<PathBuf> {
    if !path.exists() {
        return None;
    }
    let claimed = path.with_extension(format!("consumed.{}", time::new_event_id()));
    match std::fs::rename(path, &claimed) {
        Ok(()) => Some(claimed),
        // Lost the race (or the file vanished): nothing to consume.
        Err(_) => None,
    }
}

/// Put a rejected artifact back at the well-known path so the operator can
/// see the rejection and fix the file in place.
fn restore_artifact(claimed: &Path, path: &Path) {
    if let Err(e) = std::fs::rename(claimed, path) {
        eprintln!("stopgate: warning: failed to restore rejected bypass artifact: {}", e);
    }
}

/// Check the bypass artifact. Deleted only on successful validation; a
/// rejected artifact survives at the well-known path.
pub fn check(store: &Store, bypass_file: &str) -> Result<BypassCheck, error::GateError> {
    let path = artifact_path(&store.root, bypass_file);
    let Some(claimed) = claim_artifact(&path) else {
        return Ok(BypassCheck::Absent);
    };

    let raw = match std::fs::read_to_string(&claimed) {
        Ok(raw) => raw,
        Err(e) => {
            restore_artifact(&claimed, &path);
            return Err(error::GateError::IoError(e));
        }
    };

    let record: BypassRecord = match serde_json::from_str(&raw) {
        Ok(record) => record,
        Err(e) => {
            // An unreadable override must never fail open.
            restore_artifact(&claimed, &path);
            return Ok(BypassCheck::Blocked {
                reason: format!("bypass artifact is not valid JSON: {}", e),
                details: serde_json::json!({
                    "artifact": path.display().to_string(),
                    "failed_precondition": "parse",
                }),
            });
        }
    };

    if record.explanation.chars().count() < MIN_EXPLANATION_CHARS {
        restore_artifact(&claimed, &path);
        return Ok(BypassCheck::Blocked {
            reason: format!(
                "bypass explanation must be at least {} characters (got {})",
                MIN_EXPLANATION_CHARS,
                record.explanation.chars().count()
            ),
            details: serde_json::json!({
                "work_item_key": record.work_item_key,
                "failed_precondition": "explanation_length",
            }),
        });
    }

    if !record.retrospective_committed {
        restore_artifact(&claimed, &path);
        return Ok(BypassCheck::Blocked {
            reason: "bypass requires retrospective_committed = true".to_string(),
            details: serde_json::json!({
                "work_item_key": record.work_item_key,
                "failed_precondition": "retrospective_committed",
            }),
        });
    }

    if let Err(e) = std::fs::remove_file(&claimed) {
        eprintln!("stopgate: warning: failed to delete consumed bypass artifact: {}", e);
    }

    let fingerprint = {
        let mut hasher = Sha256::new();
        hasher.update(raw.as_bytes());
        format!("{:x}", hasher.finalize())
    };

    let audit_details = serde_json::json!({
        "work_item_key": record.work_item_key,
        "explanation": record.explanation,
        "skipped_agents": record.skipped_agents,
        "retrospective_id": record.retrospective_id,
        "artifact_sha256": fingerprint,
    });

    // The bypass is already granted and the artifact consumed; an audit
    // failure is reported loudly but does not revoke the allow.
    let audit_event_id = match store.write_audit("bypass_used", "warning", &audit_details) {
        Ok(id) => Some(id),
        Err(e) => {
            eprintln!("stopgate: warning: bypass audit write failed: {}", e);
            None
        }
    };

    Ok(BypassCheck::Allowed { audit_event_id })
}
