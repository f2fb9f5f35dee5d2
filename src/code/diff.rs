//! Line-level diff counting

/// Longest-common-subsequence tables above this many cells fall back to a
/// multiset comparison of the differing middle section.
const LCS_CELL_LIMIT: usize = 4_000_000;

/// (lines_added, lines_removed) between two file states
pub fn count_diff_lines(before: &str, after: &str) -> (i64, i64) {
    let old: Vec<&str> = before.lines().collect();
    let new: Vec<&str> = after.lines().collect();

    let prefix = old.iter().zip(new.iter()).take_while(|(a, b)| a == b).count();
    let old_rest = &old[prefix..];
    let new_rest = &new[prefix..];
    let suffix = old_rest
        .iter()
        .rev()
        .zip(new_rest.iter().rev())
        .take_while(|(a, b)| a == b)
        .count();
    let old_mid = &old_rest[..old_rest.len() - suffix];
    let new_mid = &new_rest[..new_rest.len() - suffix];

    let common = if old_mid.len().saturating_mul(new_mid.len()) <= LCS_CELL_LIMIT {
        lcs_len(old_mid, new_mid)
    } else {
        multiset_common(old_mid, new_mid)
    };

    (
        (new_mid.len() - common) as i64,
        (old_mid.len() - common) as i64,
    )
}

fn lcs_len(a: &[&str], b: &[&str]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    for x in a {
        for (j, y) in b.iter().enumerate() {
            cur[j + 1] = if x == y {
                prev[j] + 1
            } else {
                cur[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

fn multiset_common(a: &[&str], b: &[&str]) -> usize {
    let mut counts: std::collections::HashMap<&str, isize> = std::collections::HashMap::new();
    for line in a {
        *counts.entry(line).or_default() += 1;
    }
    let mut common = 0;
    for line in b {
        if let Some(n) = counts.get_mut(line) {
            if *n > 0 {
                *n -= 1;
                common += 1;
            }
        }
    }
    common
}

/// Minimal unified diff for a single replaced region
pub fn replacement_diff(old: &str, new: &str) -> String {
    let mut out = String::from("--- old\n+++ new\n@@ @@\n");
    for line in old.lines() {
        out.push('-');
        out.push_str(line);
        out.push('\n');
    }
    for line in new.lines() {
        out.push('+');
        out.push_str(line);
        out.push('\n');
    }
    out
}
