//! Line-level diffing.
//!
//! [`compute_diff`] classifies every line of two texts as unchanged, added or
//! removed using a longest-common-subsequence table, and
//! [`format_unified_diff`] renders the result as a full-file unified view.
//!
//! The table is `(m + 1) x (n + 1)` for `m` old and `n` new lines, so time and
//! memory are `O(m * n)`. That is fine for editor-sized documents; callers that
//! may see megabyte-scale blobs need their own size guard.

use serde::{Deserialize, Serialize};

/// Classification of a single diff row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffLineKind {
    Unchanged,
    Added,
    Removed,
}

impl DiffLineKind {
    /// Prefix used in the unified rendering.
    pub fn marker(&self) -> char {
        match self {
            DiffLineKind::Unchanged => ' ',
            DiffLineKind::Added => '+',
            DiffLineKind::Removed => '-',
        }
    }
}

/// One row of a computed comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffLine {
    #[serde(rename = "type")]
    pub kind: DiffLineKind,

    /// The line text, without its newline.
    pub content: String,

    /// 1-based position in the new text. `None` for removed lines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<usize>,

    /// 1-based position in the old text. `None` for added lines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_line_number: Option<usize>,
}

impl DiffLine {
    pub fn unchanged(content: impl Into<String>, original: usize, new: usize) -> Self {
        Self {
            kind: DiffLineKind::Unchanged,
            content: content.into(),
            line_number: Some(new),
            original_line_number: Some(original),
        }
    }

    pub fn added(content: impl Into<String>, new: usize) -> Self {
        Self {
            kind: DiffLineKind::Added,
            content: content.into(),
            line_number: Some(new),
            original_line_number: None,
        }
    }

    pub fn removed(content: impl Into<String>, original: usize) -> Self {
        Self {
            kind: DiffLineKind::Removed,
            content: content.into(),
            line_number: None,
            original_line_number: Some(original),
        }
    }
}

/// Ordered diff rows plus their aggregate counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffResult {
    pub lines: Vec<DiffLine>,
    pub added_count: usize,
    pub removed_count: usize,
    pub unchanged_count: usize,
}

impl DiffResult {
    /// Build a result whose counts are derived by scanning `lines`.
    pub fn from_lines(lines: Vec<DiffLine>) -> Self {
        let mut result = Self::default();
        for line in &lines {
            match line.kind {
                DiffLineKind::Unchanged => result.unchanged_count += 1,
                DiffLineKind::Added => result.added_count += 1,
                DiffLineKind::Removed => result.removed_count += 1,
            }
        }
        result.lines = lines;
        result
    }

    /// Whether any line was added or removed.
    pub fn has_changes(&self) -> bool {
        self.added_count > 0 || self.removed_count > 0
    }
}

/// Split text into lines on `\n`.
///
/// A trailing newline yields a trailing empty element; the empty string has
/// no lines at all.
pub fn split_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        Vec::new()
    } else {
        text.split('\n').collect()
    }
}

/// Compute a line-level diff between two texts.
///
/// Backtracking prefers an added line over a removed one when both keep the
/// LCS length, so the output is deterministic for a given input pair.
pub fn compute_diff(old_text: &str, new_text: &str) -> DiffResult {
    let old_lines = split_lines(old_text);
    let new_lines = split_lines(new_text);
    let (m, n) = (old_lines.len(), new_lines.len());

    // lcs[i][j] = LCS length of old_lines[..i] and new_lines[..j]
    let mut lcs = vec![vec![0usize; n + 1]; m + 1];
    for i in 1..=m {
        for j in 1..=n {
            lcs[i][j] = if old_lines[i - 1] == new_lines[j - 1] {
                lcs[i - 1][j - 1] + 1
            } else {
                lcs[i - 1][j].max(lcs[i][j - 1])
            };
        }
    }

    let mut lines = Vec::with_capacity(m + n);
    let (mut i, mut j) = (m, n);
    while i > 0 || j > 0 {
        if i > 0 && j > 0 && old_lines[i - 1] == new_lines[j - 1] {
            lines.push(DiffLine::unchanged(old_lines[i - 1], i, j));
            i -= 1;
            j -= 1;
        } else if j > 0 && (i == 0 || lcs[i][j - 1] >= lcs[i - 1][j]) {
            lines.push(DiffLine::added(new_lines[j - 1], j));
            j -= 1;
        } else {
            lines.push(DiffLine::removed(old_lines[i - 1], i));
            i -= 1;
        }
    }
    lines.reverse();

    DiffResult::from_lines(lines)
}

/// Render a diff as a full-file unified view.
///
/// Two header lines (`--- old_label`, `+++ new_label`) followed by every row
/// prefixed with ` `, `+` or `-`. There are no hunk headers and no context
/// windowing.
pub fn format_unified_diff(diff: &DiffResult, old_label: &str, new_label: &str) -> String {
    let mut rows = Vec::with_capacity(diff.lines.len() + 2);
    rows.push(format!("--- {old_label}"));
    rows.push(format!("+++ {new_label}"));
    for line in &diff.lines {
        rows.push(format!("{}{}", line.kind.marker(), line.content));
    }
    rows.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar::{capture_diff_slices, Algorithm, DiffTag};

    fn replay(diff: &DiffResult, keep: DiffLineKind) -> String {
        diff.lines
            .iter()
            .filter(|l| l.kind == DiffLineKind::Unchanged || l.kind == keep)
            .map(|l| l.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    const PAIRS: &[(&str, &str)] = &[
        ("", ""),
        ("", "one"),
        ("one", ""),
        ("a\nb\nc", "a\nc"),
        ("a\nb\nc\n", "x\na\nb\ny\nc\n"),
        ("hello\nworld", "hello\nthere\nworld"),
        ("same\nsame\nsame", "same\nother\nsame"),
        ("fn main() {\n    run();\n}\n", "fn main() {\n    init();\n    run();\n}\n"),
        ("\n\n\n", "\n"),
        ("a\nb", "b\na"),
    ];

    #[test]
    fn test_replay_reconstructs_both_sides() {
        for (old, new) in PAIRS {
            let diff = compute_diff(old, new);
            assert_eq!(replay(&diff, DiffLineKind::Added), *new, "new side of {old:?}");
            assert_eq!(replay(&diff, DiffLineKind::Removed), *old, "old side of {old:?}");
        }
    }

    #[test]
    fn test_self_diff_is_all_unchanged() {
        let text = "alpha\nbeta\ngamma\n";
        let diff = compute_diff(text, text);
        assert_eq!(diff.added_count, 0);
        assert_eq!(diff.removed_count, 0);
        assert_eq!(diff.unchanged_count, split_lines(text).len());
        assert!(!diff.has_changes());
    }

    #[test]
    fn test_empty_inputs_are_degenerate() {
        let diff = compute_diff("", "");
        assert!(diff.lines.is_empty());
        assert_eq!(diff, DiffResult::default());
    }

    #[test]
    fn test_deterministic() {
        for (old, new) in PAIRS {
            assert_eq!(compute_diff(old, new), compute_diff(old, new));
        }
    }

    #[test]
    fn test_counts_match_lines() {
        for (old, new) in PAIRS {
            let diff = compute_diff(old, new);
            assert_eq!(DiffResult::from_lines(diff.lines.clone()), diff);
        }
    }

    #[test]
    fn test_counts_are_minimal() {
        // Any LCS-based diff has the same add/remove totals as a minimal
        // edit script, so they must agree with similar's line diff.
        for (old, new) in PAIRS {
            let ours = compute_diff(old, new);
            let old_lines = split_lines(old);
            let new_lines = split_lines(new);
            let ops = capture_diff_slices(Algorithm::Myers, &old_lines, &new_lines);

            let (mut added, mut removed) = (0, 0);
            for op in &ops {
                let (tag, old_range, new_range) = op.as_tag_tuple();
                match tag {
                    DiffTag::Insert => added += new_range.len(),
                    DiffTag::Delete => removed += old_range.len(),
                    DiffTag::Replace => {
                        added += new_range.len();
                        removed += old_range.len();
                    }
                    DiffTag::Equal => {}
                }
            }
            assert_eq!(
                (ours.added_count, ours.removed_count),
                (added, removed),
                "{old:?} -> {new:?}"
            );
        }
    }

    #[test]
    fn test_insertion_line_numbers() {
        let diff = compute_diff("hello\nworld", "hello\nthere\nworld");
        assert_eq!(
            diff.lines,
            vec![
                DiffLine::unchanged("hello", 1, 1),
                DiffLine::added("there", 2),
                DiffLine::unchanged("world", 2, 3),
            ]
        );
    }

    #[test]
    fn test_ties_favor_added_first_in_backtrack() {
        // Replacing one line: backtracking emits the added row first, so in
        // forward order the removal precedes the addition.
        let diff = compute_diff("a\nold\nc", "a\nnew\nc");
        let kinds: Vec<_> = diff.lines.iter().map(|l| l.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DiffLineKind::Unchanged,
                DiffLineKind::Removed,
                DiffLineKind::Added,
                DiffLineKind::Unchanged,
            ]
        );
        assert_eq!(diff.lines[1].original_line_number, Some(2));
        assert_eq!(diff.lines[1].line_number, None);
        assert_eq!(diff.lines[2].line_number, Some(2));
        assert_eq!(diff.lines[2].original_line_number, None);
    }

    #[test]
    fn test_trailing_newline_is_a_line() {
        let diff = compute_diff("a", "a\n");
        assert_eq!(diff.unchanged_count, 1);
        assert_eq!(diff.added_count, 1);
        assert_eq!(diff.lines[1], DiffLine::added("", 2));
    }

    #[test]
    fn test_format_unified_diff() {
        let diff = compute_diff("a\nold\nc", "a\nnew\nc");
        let rendered = format_unified_diff(&diff, "a/file.txt", "b/file.txt");
        assert_eq!(
            rendered,
            "--- a/file.txt\n+++ b/file.txt\n a\n-old\n+new\n c"
        );
    }

    #[test]
    fn test_format_unified_diff_of_empty_diff_is_header_only() {
        let rendered = format_unified_diff(&DiffResult::default(), "old", "new");
        assert_eq!(rendered, "--- old\n+++ new");
    }

    #[test]
    fn test_diff_line_serializes_type_field() {
        let json = serde_json::to_value(DiffLine::removed("x", 3)).unwrap();
        assert_eq!(json["type"], "removed");
        assert_eq!(json["originalLineNumber"], 3);
        assert!(json.get("lineNumber").is_none());
    }
}
