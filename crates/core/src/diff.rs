//! Line-level diff and hunk grouping.
//!
//! The edit script is computed with a dynamic-programming LCS over lines.
//! Lines are tokenized with their trailing newline retained, so applying
//! the script to the old content reproduces the new content byte-exactly
//! (including a missing final newline). Tie-breaks between equivalent
//! minimal scripts always emit deletes before inserts, keeping output
//! deterministic across calls.
//!
//! Hunk grouping: a hunk opens at a change line, seeded with up to
//! `context` preceding equal lines; two change regions share a hunk only
//! when separated by at most `2 * context` equal lines.

use tracing::trace;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Classification of one line in the edit script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Present in both sides.
    Equal,
    /// Present only in the new side.
    Insert,
    /// Present only in the old side.
    Delete,
}

/// One classified line. `text` retains its trailing newline when the source
/// line had one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub kind: LineKind,
    pub text: String,
}

/// A group of nearby changes with surrounding context.
///
/// Starts are 1-indexed; a pure-insert hunk has `old_count == 0` and
/// `old_start` pointing at the first unconsumed old line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    pub lines: Vec<DiffLine>,
}

impl Hunk {
    /// Unified-diff style header, for display.
    pub fn header(&self) -> String {
        format!(
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_count, self.new_start, self.new_count
        )
    }
}

// ---------------------------------------------------------------------------
// Line diff
// ---------------------------------------------------------------------------

fn tokenize(content: &str) -> Vec<&str> {
    content.split_inclusive('\n').collect()
}

/// Compute the classified edit script between two contents.
///
/// Deterministic: identical inputs always produce the identical script.
pub fn diff_lines(old: &str, new: &str) -> Vec<DiffLine> {
    let a = tokenize(old);
    let b = tokenize(new);
    let n = a.len();
    let m = b.len();

    // dp[i][j] = LCS length of a[i..] and b[j..].
    let mut dp = vec![vec![0u32; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            dp[i][j] = if a[i] == b[j] {
                dp[i + 1][j + 1] + 1
            } else {
                dp[i + 1][j].max(dp[i][j + 1])
            };
        }
    }

    let mut lines = Vec::with_capacity(n.max(m));
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            lines.push(DiffLine {
                kind: LineKind::Equal,
                text: a[i].to_string(),
            });
            i += 1;
            j += 1;
        } else if dp[i + 1][j] >= dp[i][j + 1] {
            lines.push(DiffLine {
                kind: LineKind::Delete,
                text: a[i].to_string(),
            });
            i += 1;
        } else {
            lines.push(DiffLine {
                kind: LineKind::Insert,
                text: b[j].to_string(),
            });
            j += 1;
        }
    }
    for line in &a[i..] {
        lines.push(DiffLine {
            kind: LineKind::Delete,
            text: line.to_string(),
        });
    }
    for line in &b[j..] {
        lines.push(DiffLine {
            kind: LineKind::Insert,
            text: line.to_string(),
        });
    }
    lines
}

// ---------------------------------------------------------------------------
// Hunk grouping
// ---------------------------------------------------------------------------

struct HunkBuilder {
    old_start: usize,
    old_count: usize,
    new_start: usize,
    new_count: usize,
    lines: Vec<DiffLine>,
}

impl HunkBuilder {
    fn new(old_start: usize, new_start: usize) -> Self {
        Self {
            old_start,
            old_count: 0,
            new_start,
            new_count: 0,
            lines: Vec::new(),
        }
    }

    fn push(&mut self, line: DiffLine) {
        match line.kind {
            LineKind::Equal => {
                self.old_count += 1;
                self.new_count += 1;
            }
            LineKind::Insert => self.new_count += 1,
            LineKind::Delete => self.old_count += 1,
        }
        self.lines.push(line);
    }

    fn finish(self) -> Hunk {
        Hunk {
            old_start: self.old_start,
            old_count: self.old_count,
            new_start: self.new_start,
            new_count: self.new_count,
            lines: self.lines,
        }
    }
}

/// Group a classified line sequence into context-bounded hunks.
///
/// Zero changes produce zero hunks.
pub fn build_hunks(lines: &[DiffLine], context: usize) -> Vec<Hunk> {
    let mut hunks = Vec::new();
    let mut current: Option<HunkBuilder> = None;
    // Equal lines seen since the last change, with the positions they had
    // when encountered.
    let mut pending: Vec<(DiffLine, usize, usize)> = Vec::new();

    let mut old_no = 1usize;
    let mut new_no = 1usize;

    for line in lines {
        let (o, n) = (old_no, new_no);
        match line.kind {
            LineKind::Equal => {
                pending.push((line.clone(), o, n));
                old_no += 1;
                new_no += 1;
            }
            LineKind::Insert | LineKind::Delete => {
                if current.is_none() {
                    let keep = pending.len().min(context);
                    let seed = &pending[pending.len() - keep..];
                    let (start_o, start_n) =
                        seed.first().map(|&(_, o, n)| (o, n)).unwrap_or((o, n));
                    let mut builder = HunkBuilder::new(start_o, start_n);
                    for (equal, _, _) in seed {
                        builder.push(equal.clone());
                    }
                    current = Some(builder);
                } else if pending.len() > 2 * context {
                    // Gap too wide: close the open hunk with its trailing
                    // context and start a fresh one.
                    let mut closing = current.take().unwrap();
                    for (equal, _, _) in pending.iter().take(context) {
                        closing.push(equal.clone());
                    }
                    hunks.push(closing.finish());

                    let seed = &pending[pending.len() - context..];
                    let (start_o, start_n) =
                        seed.first().map(|&(_, o, n)| (o, n)).unwrap_or((o, n));
                    let mut builder = HunkBuilder::new(start_o, start_n);
                    for (equal, _, _) in seed {
                        builder.push(equal.clone());
                    }
                    current = Some(builder);
                } else {
                    let builder = current.as_mut().unwrap();
                    for (equal, _, _) in pending.drain(..) {
                        builder.push(equal);
                    }
                }
                pending.clear();
                let builder = current.as_mut().unwrap();
                builder.push(line.clone());
                match line.kind {
                    LineKind::Insert => new_no += 1,
                    LineKind::Delete => old_no += 1,
                    LineKind::Equal => unreachable!(),
                }
            }
        }
    }

    if let Some(mut builder) = current {
        for (equal, _, _) in pending.into_iter().take(context) {
            builder.push(equal);
        }
        hunks.push(builder.finish());
    }

    trace!(hunks = hunks.len(), "built hunks");
    hunks
}

/// Diff two contents and group into hunks in one step.
pub fn diff(old: &str, new: &str, context: usize) -> Vec<Hunk> {
    build_hunks(&diff_lines(old, new), context)
}

/// Apply hunks produced by [`diff`] back onto `old`, reproducing the new
/// content. Used for verification. Returns `None` when the hunks do not
/// fit `old` (overlapping hunks, or ones that consume past its end).
pub fn apply_hunks(old: &str, hunks: &[Hunk]) -> Option<String> {
    let old_lines = tokenize(old);
    let mut out = String::with_capacity(old.len());
    let mut next_old = 1usize;

    for hunk in hunks {
        if hunk.old_start < next_old || hunk.old_start > old_lines.len() + 1 {
            return None;
        }
        while next_old < hunk.old_start {
            out.push_str(old_lines[next_old - 1]);
            next_old += 1;
        }
        for line in &hunk.lines {
            match line.kind {
                LineKind::Equal => {
                    if next_old > old_lines.len() {
                        return None;
                    }
                    out.push_str(&line.text);
                    next_old += 1;
                }
                LineKind::Delete => {
                    if next_old > old_lines.len() {
                        return None;
                    }
                    next_old += 1;
                }
                LineKind::Insert => {
                    out.push_str(&line.text);
                }
            }
        }
    }
    while next_old <= old_lines.len() {
        out.push_str(old_lines[next_old - 1]);
        next_old += 1;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(lines: &[DiffLine]) -> Vec<LineKind> {
        lines.iter().map(|l| l.kind).collect()
    }

    #[test]
    fn test_identical_contents_no_hunks() {
        let content = "a\nb\nc\n";
        assert!(diff(content, content, 3).is_empty());
        assert!(diff("", "", 3).is_empty());
    }

    #[test]
    fn test_simple_replace() {
        let lines = diff_lines("a\nb\nc\n", "a\nX\nc\n");
        assert_eq!(
            kinds(&lines),
            vec![
                LineKind::Equal,
                LineKind::Delete,
                LineKind::Insert,
                LineKind::Equal
            ]
        );
    }

    #[test]
    fn test_deterministic() {
        let old = "a\nb\nc\nd\n";
        let new = "a\nc\nb\nd\n";
        let first = diff_lines(old, new);
        let second = diff_lines(old, new);
        assert_eq!(first, second);
    }

    #[test]
    fn test_round_trip() {
        let cases = [
            ("a\nb\nc\n", "a\nX\nc\n"),
            ("", "brand\nnew\n"),
            ("gone\n", ""),
            ("a\nb\n", "b\na\n"),
            ("no newline", "no newline at all"),
            ("x\ny\n", "x\ny"),
            ("1\n2\n3\n4\n5\n6\n7\n8\n9\n", "1\ntwo\n3\n4\n5\n6\n7\neight\n9\n"),
        ];
        for (old, new) in cases {
            let hunks = diff(old, new, 3);
            assert_eq!(
                apply_hunks(old, &hunks).unwrap(),
                new,
                "old={old:?} new={new:?}"
            );
        }
    }

    #[test]
    fn test_apply_hunks_rejects_mismatched_input() {
        // Hunks built against a longer document consume past the end of a
        // shorter one.
        let hunks = diff("a\nb\nc\nd\ne\n", "a\nb\nc\nd\nE\n", 1);
        assert_eq!(apply_hunks("a\n", &hunks), None);

        // Overlapping hunks are rejected rather than applied twice.
        let one = diff("a\nb\nc\n", "a\nB\nc\n", 1);
        let mut overlapping = one.clone();
        overlapping.extend(one);
        assert_eq!(apply_hunks("a\nb\nc\n", &overlapping), None);
    }

    #[test]
    fn test_hunk_gap_boundary() {
        // context=1: changes at lines 1 and 4 (gap of 2 == 2*context) share
        // a hunk; changes at lines 1 and 5 (gap of 3) split.
        let old = "a\nb\nc\nd\n";
        let new = "A\nb\nc\nD\n";
        let hunks = diff(old, new, 1);
        assert_eq!(hunks.len(), 1);

        let old = "a\nb\nc\nd\ne\n";
        let new = "A\nb\nc\nd\nE\n";
        let hunks = diff(old, new, 1);
        assert_eq!(hunks.len(), 2);
        assert_eq!(apply_hunks(old, &hunks).unwrap(), new);
    }

    #[test]
    fn test_hunk_counts_and_starts() {
        let old = "a\nb\nc\nd\ne\nf\ng\nh\ni\nj\n";
        let new = "a\nb\nc\nd\nE\nf\ng\nh\ni\nj\n";
        let hunks = diff(old, new, 3);
        assert_eq!(hunks.len(), 1);
        let h = &hunks[0];
        // Three context lines either side of the single replaced line.
        assert_eq!((h.old_start, h.old_count), (2, 7));
        assert_eq!((h.new_start, h.new_count), (2, 7));
        assert_eq!(h.header(), "@@ -2,7 +2,7 @@");
    }

    #[test]
    fn test_context_clamped_at_start() {
        let old = "a\nb\nc\n";
        let new = "A\nb\nc\n";
        let hunks = diff(old, new, 3);
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].old_start, 1);
        assert_eq!(hunks[0].new_start, 1);
        // Trailing context is clamped at the end of the file too.
        assert_eq!(hunks[0].old_count, 3);
    }

    #[test]
    fn test_zero_context() {
        let old = "a\nb\nc\n";
        let new = "A\nb\nC\n";
        let hunks = diff(old, new, 0);
        assert_eq!(hunks.len(), 2);
        for h in &hunks {
            assert!(h.lines.iter().all(|l| l.kind != LineKind::Equal));
        }
        assert_eq!(apply_hunks(old, &hunks).unwrap(), new);
    }

    #[test]
    fn test_pure_insert_hunk() {
        let old = "a\nb\n";
        let new = "a\nb\nc\nd\n";
        let hunks = diff(old, new, 0);
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].old_count, 0);
        assert_eq!(apply_hunks(old, &hunks).unwrap(), new);
    }

    #[test]
    fn test_missing_final_newline_preserved() {
        let old = "a\nb\n";
        let new = "a\nb\nc";
        let hunks = diff(old, new, 3);
        assert_eq!(apply_hunks(old, &hunks).unwrap(), new);
    }
}
