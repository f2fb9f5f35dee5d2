//! Aggressive cleanup for turn text
//!
//! Pipeline: compress log-like runs, dedupe adjacent lines, normalize
//! whitespace, collapse blank lines, then a head/middle/tail truncation when
//! the result is still over budget.

use regex::Regex;
use std::sync::LazyLock;

use crate::config::CleanerConfig;

static STACK_FRAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)(?:at\s+[\w.<>\-]+\s*\([^\)]*\)|[\w./\\-]+\.[A-Za-z0-9]{1,8}:\d+(?::\d+)?)")
        .expect("stack frame pattern")
});

static EMOJI_START_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\x{1F300}-\x{1F9FF}]").expect("emoji pattern"));

static BLANK_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n\s*\n+").expect("blank run pattern"));

const REPEAT_MIN_LENGTH: usize = 10;
const MARKER: &str = "[..stripped..]";

#[derive(Debug, Clone)]
pub struct Cleaner {
    threshold: usize,
    head_frac: f64,
    mid_frac: f64,
}

impl Default for Cleaner {
    fn default() -> Self {
        Self::new(&CleanerConfig::default())
    }
}

impl Cleaner {
    pub fn new(config: &CleanerConfig) -> Self {
        Self {
            threshold: config.threshold,
            head_frac: config.head_frac.clamp(0.0, 1.0),
            mid_frac: config.mid_frac.clamp(0.0, 1.0 - config.head_frac.clamp(0.0, 1.0)),
        }
    }

    pub fn clean(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }
        let text = remove_logs(text);
        let text = dedupe_adjacent_lines(&text);
        let text = normalize_whitespace(&text);
        let text = collapse_blank_lines(&text, 1);
        self.truncate(&text).trim().to_string()
    }

    /// Keep a head, middle and tail slice of the budget, separated by markers
    pub fn truncate(&self, text: &str) -> String {
        let len = text.chars().count();
        if len <= self.threshold {
            return text.to_string();
        }

        let head_len = (self.threshold as f64 * self.head_frac) as usize;
        let mid_len = (self.threshold as f64 * self.mid_frac) as usize;
        let tail_len = self.threshold - head_len - mid_len;

        let head: String = text.chars().take(head_len).collect();
        let tail: String = text.chars().skip(len - tail_len).collect();
        let mid_start = (len - mid_len) / 2;
        let mid: String = text.chars().skip(mid_start).take(mid_len).collect();

        let head = trim_to_boundary(&head, false, true);
        let mid = trim_to_boundary(&mid, true, true);
        let tail = trim_to_boundary(&tail, true, false);

        let mut parts: Vec<&str> = Vec::new();
        if !head.trim().is_empty() {
            parts.push(head.trim());
        }
        parts.push(MARKER);
        if !mid.trim().is_empty() {
            parts.push(mid.trim());
            parts.push(MARKER);
        }
        if !tail.trim().is_empty() {
            parts.push(tail.trim());
        }
        parts.join("\n\n")
    }
}

/// Keep the first and last two lines of a run, replacing the rest with a counted marker
fn compress_block(block: Vec<String>, label: &str) -> Vec<String> {
    if block.len() <= 4 {
        return block;
    }
    let removed = block.len() - 4;
    let mut out = Vec::with_capacity(5);
    out.extend_from_slice(&block[..2]);
    out.push(format!("[... {} lines {} ...]", removed, label));
    out.extend_from_slice(&block[block.len() - 2..]);
    out
}

/// Compress runs of lines matching `is_member`
fn compress_runs(lines: Vec<String>, label: &str, is_member: impl Fn(&str) -> bool) -> Vec<String> {
    let mut cleaned = Vec::with_capacity(lines.len());
    let mut block = Vec::new();
    for line in lines {
        if is_member(line.trim()) {
            block.push(line);
        } else {
            cleaned.extend(compress_block(std::mem::take(&mut block), label));
            cleaned.push(line);
        }
    }
    cleaned.extend(compress_block(block, label));
    cleaned
}

/// Compress stack traces, emoji-led log lines and repeated long lines
pub fn remove_logs(text: &str) -> String {
    let lines: Vec<String> = text.split('\n').map(String::from).collect();

    let lines = compress_runs(lines, "stack trace removed", |l| STACK_FRAME_RE.is_match(l));
    let lines = compress_runs(lines, "logs removed", |l| EMOJI_START_RE.is_match(l));

    // Repeats: a run starts at the first copy of a line
    let mut cleaned = Vec::with_capacity(lines.len());
    let mut block: Vec<String> = Vec::new();
    let mut prev: Option<String> = None;
    for line in lines {
        let stripped = line.trim().to_string();
        if prev.as_deref() == Some(stripped.as_str()) && stripped.chars().count() > REPEAT_MIN_LENGTH {
            block.push(line);
        } else {
            cleaned.extend(compress_block(std::mem::take(&mut block), "repeated content removed"));
            block.push(line);
            prev = Some(stripped);
        }
    }
    cleaned.extend(compress_block(block, "repeated content removed"));

    cleaned.join("\n")
}

pub fn dedupe_adjacent_lines(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for line in text.lines() {
        if out.last() != Some(&line) {
            out.push(line);
        }
    }
    out.join("\n")
}

pub fn normalize_whitespace(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = BLANK_RUN_RE.replace_all(&text, "\n\n");
    text.split('\n')
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn collapse_blank_lines(text: &str, max_blank: usize) -> String {
    let mut out = Vec::new();
    let mut blanks = 0;
    for line in text.split('\n') {
        if line.trim().is_empty() {
            blanks += 1;
            if blanks <= max_blank {
                out.push("");
            }
        } else {
            blanks = 0;
            out.push(line);
        }
    }
    out.join("\n")
}

/// Byte offset where the last `n` characters of `s` begin
fn tail_offset(s: &str, n: usize) -> usize {
    s.char_indices().rev().nth(n.saturating_sub(1)).map_or(0, |(i, _)| i)
}

/// Byte offset just past the first `n` characters of `s`
fn head_offset(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map_or(s.len(), |(i, _)| i)
}

/// Nudge slice edges to a nearby paragraph, sentence or line break
fn trim_to_boundary(text: &str, trim_start: bool, trim_end: bool) -> String {
    let mut result = text.to_string();

    if trim_end && !result.is_empty() {
        let region_start = tail_offset(&result, 100);
        let region = &result[region_start..];
        for sep in ["\n\n", ".\n", ". ", "!\n", "! ", "?\n", "? ", "\n"] {
            if let Some(pos) = region.rfind(sep) {
                let actual = region_start + pos + sep.len();
                if actual as f64 > result.len() as f64 * 0.7 {
                    result = result[..actual].trim_end().to_string();
                    break;
                }
            }
        }
    }

    if trim_start && !result.is_empty() {
        let region_end = head_offset(&result, 100);
        let region = &result[..region_end];
        for sep in ["\n\n", "\n", ". ", "! ", "? "] {
            if let Some(pos) = region.find(sep) {
                if (pos as f64) < result.len() as f64 * 0.3 {
                    let start = pos + sep.len();
                    if start > 0 {
                        result = result[start..].trim_start().to_string();
                    }
                    break;
                }
            }
        }
    }

    result
}
