//! Unified line diff via longest-common-subsequence.

use webpeel_types::{ContentDiff, DiffKind, DiffLine};

/// Lines of leading context before each change in a hunk.
const LEAD_CONTEXT: usize = 3;
/// Maximum lines of trailing context after the last change in a hunk.
const TRAIL_CONTEXT: usize = 10;
/// Inputs are capped at this many lines before the O(m·n) table is built.
const MAX_DIFF_LINES: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq)]
enum OpKind {
    Ctx,
    Add,
    Del,
}

struct Op<'a> {
    kind: OpKind,
    text: &'a str,
    old_line: usize,
    new_line: usize,
}

/// Compute a unified diff between two contents.
///
/// Classic LCS dynamic program with backtrack; inputs longer than the
/// line cap are truncated and the result flagged.
pub fn lcs_diff(old: &str, new: &str) -> ContentDiff {
    let mut old_lines: Vec<&str> = old.lines().collect();
    let mut new_lines: Vec<&str> = new.lines().collect();
    let truncated = old_lines.len() > MAX_DIFF_LINES || new_lines.len() > MAX_DIFF_LINES;
    old_lines.truncate(MAX_DIFF_LINES);
    new_lines.truncate(MAX_DIFF_LINES);

    let ops = diff_ops(&old_lines, &new_lines);
    let additions = ops.iter().filter(|o| o.kind == OpKind::Add).count();
    let deletions = ops.iter().filter(|o| o.kind == OpKind::Del).count();

    let hunks = hunk_ranges(&ops);
    let mut text = String::new();
    let mut changes = Vec::new();
    for (start, end) in hunks {
        let slice = &ops[start..end];
        let old_start = slice
            .iter()
            .find(|o| o.kind != OpKind::Add)
            .map(|o| o.old_line)
            .unwrap_or(slice.first().map(|o| o.old_line).unwrap_or(0));
        let new_start = slice
            .iter()
            .find(|o| o.kind != OpKind::Del)
            .map(|o| o.new_line)
            .unwrap_or(slice.first().map(|o| o.new_line).unwrap_or(0));
        let old_count = slice.iter().filter(|o| o.kind != OpKind::Add).count();
        let new_count = slice.iter().filter(|o| o.kind != OpKind::Del).count();
        text.push_str(&format!(
            "@@ -{},{} +{},{} @@\n",
            old_start, old_count, new_start, new_count
        ));
        for op in slice {
            let (prefix, kind) = match op.kind {
                OpKind::Ctx => (' ', DiffKind::Ctx),
                OpKind::Add => ('+', DiffKind::Add),
                OpKind::Del => ('-', DiffKind::Del),
            };
            text.push(prefix);
            text.push_str(op.text);
            text.push('\n');
            changes.push(DiffLine {
                kind,
                text: op.text.to_string(),
            });
        }
    }
    if truncated {
        text.push_str("[diff truncated: input exceeded line cap]\n");
    }

    ContentDiff {
        text,
        additions,
        deletions,
        changes,
        truncated,
    }
}

fn diff_ops<'a>(old: &[&'a str], new: &[&'a str]) -> Vec<Op<'a>> {
    let m = old.len();
    let n = new.len();

    // LCS length table.
    let mut table = vec![vec![0u32; n + 1]; m + 1];
    for i in (0..m).rev() {
        for j in (0..n).rev() {
            table[i][j] = if old[i] == new[j] {
                table[i + 1][j + 1] + 1
            } else {
                table[i + 1][j].max(table[i][j + 1])
            };
        }
    }

    // Backtrack into an op sequence. Line numbers are 1-based.
    let mut ops = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < m && j < n {
        if old[i] == new[j] {
            ops.push(Op {
                kind: OpKind::Ctx,
                text: old[i],
                old_line: i + 1,
                new_line: j + 1,
            });
            i += 1;
            j += 1;
        } else if table[i + 1][j] >= table[i][j + 1] {
            ops.push(Op {
                kind: OpKind::Del,
                text: old[i],
                old_line: i + 1,
                new_line: j + 1,
            });
            i += 1;
        } else {
            ops.push(Op {
                kind: OpKind::Add,
                text: new[j],
                old_line: i + 1,
                new_line: j + 1,
            });
            j += 1;
        }
    }
    while i < m {
        ops.push(Op {
            kind: OpKind::Del,
            text: old[i],
            old_line: i + 1,
            new_line: j + 1,
        });
        i += 1;
    }
    while j < n {
        ops.push(Op {
            kind: OpKind::Add,
            text: new[j],
            old_line: i + 1,
            new_line: j + 1,
        });
        j += 1;
    }
    ops
}

/// Group changed ops into hunk ranges with leading and (bounded)
/// trailing context, merging overlaps.
fn hunk_ranges(ops: &[Op<'_>]) -> Vec<(usize, usize)> {
    let changed: Vec<usize> = ops
        .iter()
        .enumerate()
        .filter_map(|(i, o)| (o.kind != OpKind::Ctx).then_some(i))
        .collect();
    if changed.is_empty() {
        return Vec::new();
    }

    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for &idx in &changed {
        let start = idx.saturating_sub(LEAD_CONTEXT);
        let end = (idx + TRAIL_CONTEXT + 1).min(ops.len());
        match ranges.last_mut() {
            Some((_, prev_end)) if start <= *prev_end => {
                *prev_end = (*prev_end).max(end);
            }
            _ => ranges.push((start, end)),
        }
    }
    ranges
}

/// Paragraph-level set difference used by the watch manager.
///
/// Paragraphs are blank-line separated blocks longer than ten characters;
/// each reported paragraph is truncated to 500 characters.
pub fn paragraph_diff(old: &str, new: &str) -> (Vec<String>, Vec<String>) {
    let split = |text: &str| -> Vec<String> {
        text.split("\n\n")
            .map(|p| p.trim().to_string())
            .filter(|p| p.len() > 10)
            .collect()
    };
    let old_paragraphs = split(old);
    let new_paragraphs = split(new);
    let old_set: std::collections::HashSet<&String> = old_paragraphs.iter().collect();
    let new_set: std::collections::HashSet<&String> = new_paragraphs.iter().collect();

    let truncate = |p: &String| {
        let mut cut = 500.min(p.len());
        while cut > 0 && !p.is_char_boundary(cut) {
            cut -= 1;
        }
        p[..cut].to_string()
    };

    let added = new_paragraphs
        .iter()
        .filter(|p| !old_set.contains(*p))
        .map(truncate)
        .collect();
    let removed = old_paragraphs
        .iter()
        .filter(|p| !new_set.contains(*p))
        .map(truncate)
        .collect();
    (added, removed)
}
