//! Static code metrics for edit enrichment

use regex::Regex;
use std::sync::LazyLock;

use crate::model::CodeMetrics;

/// Source of per-file static metrics (NLOC, cyclomatic complexity, tokens)
pub trait ComplexityAnalyzer: Send + Sync {
    /// `filename` is a hint for the language; content may be a fragment.
    fn analyze(&self, content: &str, filename: &str) -> CodeMetrics;
}

static FUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:fn|def|function|func|sub)\s+\w+|^\s*[\w<>\[\],\s]+\s+\w+\s*\([^;]*\)\s*\{\s*$")
        .expect("function pattern")
});

static DECISION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:if|elif|for|while|case|catch|except)\b|&&|\|\||\?\s").expect("decision pattern")
});

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+|[^\w\s]").expect("token pattern"));

const COMMENT_PREFIXES: &[&str] = &["//", "#", "--", "/*", "*", "<!--", ";"];

const CONTROL_KEYWORDS: &[&str] = &["if", "else", "for", "while", "switch", "catch", "return"];

fn starts_with_control(line: &str) -> bool {
    let first = line.trim_start_matches('}').trim_start();
    CONTROL_KEYWORDS
        .iter()
        .any(|k| first.split(|c: char| !c.is_alphanumeric()).next() == Some(*k))
}

/// Line-oriented approximation of a real complexity analyser.
///
/// A function starts at a definition-looking line and runs until the next one;
/// its complexity is 1 plus the decision points inside it.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicComplexity;

impl ComplexityAnalyzer for HeuristicComplexity {
    fn analyze(&self, content: &str, _filename: &str) -> CodeMetrics {
        if content.trim().is_empty() {
            return CodeMetrics::default();
        }

        let code_lines: Vec<&str> = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !COMMENT_PREFIXES.iter().any(|p| l.starts_with(p)))
            .collect();

        let mut functions: Vec<i64> = Vec::new();
        for line in &code_lines {
            if FUNCTION_RE.is_match(line) && !starts_with_control(line) {
                functions.push(1);
            }
            if let Some(current) = functions.last_mut() {
                *current += DECISION_RE.find_iter(line).count() as i64;
            }
        }

        let token_count = code_lines
            .iter()
            .map(|l| TOKEN_RE.find_iter(l).count() as i64)
            .sum();

        let (average, max) = if functions.is_empty() {
            (0.0, 0)
        } else {
            let total: i64 = functions.iter().sum();
            (
                total as f64 / functions.len() as f64,
                functions.iter().copied().max().unwrap_or(0),
            )
        };

        CodeMetrics {
            nloc: code_lines.len() as i64,
            average_cyclomatic_complexity: average,
            token_count,
            max_cyclomatic_complexity: max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_content_is_zero() {
        assert_eq!(HeuristicComplexity.analyze("  \n", "a.py"), CodeMetrics::default());
    }

    #[test]
    fn test_counts_branches_per_function() {
        let src = r#"
def simple():
    return 1

def branchy(x):
    # comment
    if x > 1 and x < 5:
        return 1
    for i in range(x):
        while i:
            i -= 1
    return 0
"#;
        let m = HeuristicComplexity.analyze(src, "a.py");
        assert_eq!(m.nloc, 9);
        assert_eq!(m.max_cyclomatic_complexity, 4);
        assert!((m.average_cyclomatic_complexity - 2.5).abs() < f64::EPSILON);
        assert!(m.token_count > 20);
    }

    #[test]
    fn test_rust_functions_detected() {
        let src = "pub fn a(x: bool) -> i32 {\n    if x { 1 } else { 0 }\n}\n";
        let m = HeuristicComplexity.analyze(src, "lib.rs");
        assert_eq!(m.max_cyclomatic_complexity, 2);
    }
}
