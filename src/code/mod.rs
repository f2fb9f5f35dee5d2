//! Code helpers: language detection, diff counting, complexity metrics and LOC

pub mod diff;
pub mod language;
pub mod loc;
pub mod metrics;

pub use diff::{count_diff_lines, replacement_diff};
pub use language::{detect_languages, language_for_path};
pub use loc::{count_loc, LocCount};
pub use metrics::{ComplexityAnalyzer, HeuristicComplexity};
