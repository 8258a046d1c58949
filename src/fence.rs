//! Markdown fence removal.
//!
//! Models asked for raw HTML often wrap it in a ```` ```html ```` block anyway.
//! Only fence lines at the very start and end of the text are removed.

use regex::Regex;
use std::sync::LazyLock;

static FENCE_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*```(?:html)?\s*$").expect("FENCE_LINE_RE")
});

/// True if `line` consists only of a code fence, optionally tagged `html`.
pub fn is_fence_line(line: &str) -> bool {
    FENCE_LINE_RE.is_match(line)
}

/// Strip fence lines from the start and end of `content`.
///
/// A run of fence lines at either end is removed as a unit, so stripping
/// is idempotent even for doubled fences. Interior fence lines are kept.
pub fn strip_fences(content: &str) -> String {
    let lines: Vec<&str> = content.split('\n').collect();
    let mut start = 0;
    let mut end = lines.len();

    while start < end && is_fence_line(lines[start]) {
        start += 1;
    }
    while start < end && is_fence_line(lines[end - 1]) {
        end -= 1;
    }

    lines[start..end].join("\n")
}
