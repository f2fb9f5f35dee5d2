//! Lines-of-code snapshot of a workspace folder

use std::fs;
use std::path::Path;

use glob::Pattern;
use walkdir::{DirEntry, WalkDir};

use super::language_for_path;

const IGNORED_DIRS: &[&str] = &[
    "node_modules",
    "target",
    "dist",
    "build",
    "venv",
    "__pycache__",
    "vendor",
];

const DOC_EXTENSIONS: &[&str] = &["md", "rst", "txt", "adoc"];

const MAX_FILE_BYTES: u64 = 2 * 1024 * 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocCount {
    pub code: usize,
    pub doc: usize,
    pub files: usize,
}

/// Count non-blank lines of code and documentation under `root`.
///
/// Hidden entries, common dependency/output folders and names matched by the
/// root `.gitignore` are skipped. A missing folder counts as empty.
pub fn count_loc(root: &Path) -> LocCount {
    let mut count = LocCount::default();
    if !root.is_dir() {
        return count;
    }
    let ignore = gitignore_patterns(root);

    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_skipped(e, root, &ignore));
    for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.metadata().map(|m| m.len() > MAX_FILE_BYTES).unwrap_or(true) {
            continue;
        }
        let path = entry.path().to_string_lossy();
        let is_doc = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| DOC_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        let is_code = !is_doc && language_for_path(&path).is_some();
        if !is_doc && !is_code {
            continue;
        }
        // Binary or non-UTF-8 files are skipped
        let Ok(content) = fs::read_to_string(entry.path()) else { continue };
        let lines = content.lines().filter(|l| !l.trim().is_empty()).count();
        if is_doc {
            count.doc += lines;
        } else {
            count.code += lines;
        }
        count.files += 1;
    }
    count
}

fn is_skipped(entry: &DirEntry, root: &Path, ignore: &[Pattern]) -> bool {
    let name = entry.file_name().to_string_lossy();
    if name.starts_with('.') {
        return true;
    }
    if entry.file_type().is_dir() && IGNORED_DIRS.contains(&name.as_ref()) {
        return true;
    }
    let relative = entry
        .path()
        .strip_prefix(root)
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default();
    ignore.iter().any(|p| p.matches(&name) || p.matches(&relative))
}

/// Plain patterns from the root `.gitignore`. Negations are ignored.
fn gitignore_patterns(root: &Path) -> Vec<Pattern> {
    let Ok(content) = fs::read_to_string(root.join(".gitignore")) else {
        return Vec::new();
    };
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with('!'))
        .filter_map(|l| Pattern::new(l.trim_start_matches('/').trim_end_matches('/')).ok())
        .collect()
}
