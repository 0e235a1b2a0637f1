//! Timestamp normalization and deterministic event envelopes.
//!
//! The planning store records timestamps written by several different tools,
//! some with an explicit offset, some without. Every comparison the gate makes
//! (freshness, timing windows) goes through [`normalize`] first so that a
//! suffix-less timestamp is read as UTC instead of local time.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;
use ulid::Ulid;

/// Normalize a store timestamp into a UTC instant.
///
/// Accepts RFC 3339 strings with an offset or `Z` suffix, suffix-less
/// `YYYY-MM-DDTHH:MM:SS[.frac]` strings (interpreted as UTC), and the compact
/// `<epoch-seconds>Z` envelope form. Returns `None` for absent or unparseable
/// input; callers treat that as "no timing evidence", never as an error.
pub fn normalize(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }

    // Compact envelope form: unix-epoch seconds with a Z suffix.
    if let Some(secs) = raw.strip_suffix('Z')
        && let Ok(secs) = secs.parse::<i64>()
    {
        return DateTime::from_timestamp(secs, 0);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    // No offset suffix: read as UTC, not local time.
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }

    None
}

/// Returns unix-epoch seconds with `Z` suffix (e.g. `1771220592Z`).
pub fn now_epoch_z() -> String {
    format!("{}Z", Utc::now().timestamp())
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}

/// Standard response envelope shape used on the gate's stdout surface.
pub fn decision_envelope(decision: &str, extra: JsonValue) -> JsonValue {
    let mut base = serde_json::json!({
        "envelope_version": "1.0.0",
        "ts": now_epoch_z(),
        "event_id": new_event_id(),
        "decision": decision
    });
    if let (Some(base_obj), Some(extra_obj)) = (base.as_object_mut(), extra.as_object()) {
        for (k, v) in extra_obj {
            base_obj.insert(k.clone(), v.clone());
        }
    }
    base
}
