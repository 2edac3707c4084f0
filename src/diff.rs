//! Diff presentation - pure rendering, no state mutation.
//!
//! Produces unified-diff-style text with line-level color tagging for
//! terminal display, plus the cheaper flat summary used when the operator
//! declines a full diff review.

use colored::Colorize;
use similar::{ChangeTag, TextDiff};

/// Number of context lines around each hunk.
const CONTEXT_LINES: usize = 3;

/// Render a colorized unified diff between two content strings.
///
/// Returns an empty string when the contents are identical, so callers
/// can skip printing entirely.
#[must_use]
pub fn render_diff(old: &str, new: &str, old_label: &str, new_label: &str) -> String {
    if old == new {
        return String::new();
    }

    let diff = TextDiff::from_lines(old, new);
    let mut out = String::new();

    out.push_str(&format!("{}\n", format!("--- {old_label}").bold()));
    out.push_str(&format!("{}\n", format!("+++ {new_label}").bold()));

    for group in diff.grouped_ops(CONTEXT_LINES) {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };
        let old_start = first.old_range().start;
        let old_len = last.old_range().end - old_start;
        let new_start = first.new_range().start;
        let new_len = last.new_range().end - new_start;

        out.push_str(&format!(
            "{}\n",
            format!(
                "@@ -{},{} +{},{} @@",
                old_start + 1,
                old_len,
                new_start + 1,
                new_len
            )
            .cyan()
        ));

        for op in &group {
            for change in diff.iter_changes(op) {
                let line = change.value().trim_end_matches('\n');
                let rendered = match change.tag() {
                    ChangeTag::Delete => format!("-{line}").red().to_string(),
                    ChangeTag::Insert => format!("+{line}").green().to_string(),
                    ChangeTag::Equal => format!(" {line}"),
                };
                out.push_str(&rendered);
                out.push('\n');
            }
        }
    }

    out
}

/// One line of the flat change summary.
///
/// New files get a plain `+` marker; files whose local content would be
/// replaced carry an overwrite warning.
#[must_use]
pub fn summary_line(file_name: &str, overwrites: bool) -> String {
    if overwrites {
        format!(
            "  {} {} {}",
            "~".yellow(),
            file_name,
            "(overwrites local changes)".dimmed()
        )
    } else {
        format!("  {} {}", "+".green(), file_name)
    }
}
