//! Compact rendering helpers for the gate's stderr diagnostics.
//!
//! Keeps finding previews bounded and readable while preserving signal.

/// Collapse newlines/extra whitespace and bound length for terminal display.
pub fn compact_line(input: &str, max_chars: usize) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = collapsed.chars();
    let preview: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", preview)
    } else {
        preview
    }
}

/// Render up to `max_items` findings with compact formatting.
pub fn preview_findings(findings: &[String], max_items: usize, max_chars: usize) -> String {
    if findings.is_empty() {
        return String::new();
    }
    let shown = findings
        .iter()
        .take(max_items)
        .map(|m| compact_line(m, max_chars))
        .collect::<Vec<_>>()
        .join(" | ");
    if findings.len() > max_items {
        format!("{} (+{} more)", shown, findings.len() - max_items)
    } else {
        shown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_line_bounds_and_collapses() {
        assert_eq!(compact_line("a\n  b\tc", 80), "a b c");
        assert_eq!(compact_line("abcdef", 3), "abc...");
    }

    #[test]
    fn test_preview_findings_overflow_marker() {
        let findings = vec!["one".into(), "two".into(), "three".into()];
        assert_eq!(preview_findings(&findings, 2, 10), "one | two (+1 more)");
        assert_eq!(preview_findings(&[], 2, 10), "");
    }
}
