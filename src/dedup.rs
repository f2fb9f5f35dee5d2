//! Session deduplication by user-message fingerprint
//!
//! Some agents write a resumed conversation as a fresh session file that
//! replays the earlier one. A session whose user messages are a strict subset
//! of another session's is a fragment and is dropped.

use std::collections::BTreeSet;

use crate::text::take_chars;

const PREVIEW_CHARS: usize = 200;

/// Set of (timestamp, text preview) pairs drawn from a session's user messages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fingerprint(BTreeSet<(String, String)>);

impl Fingerprint {
    /// Record one user message. Pairs with neither a timestamp nor text are ignored.
    pub fn add(&mut self, timestamp: &str, text: &str) {
        let preview = take_chars(text, PREVIEW_CHARS);
        if timestamp.is_empty() && preview.is_empty() {
            return;
        }
        self.0.insert((timestamp.to_string(), preview));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_strict_subset_of(&self, other: &Fingerprint) -> bool {
        self.0.len() < other.0.len() && self.0.is_subset(&other.0)
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for Fingerprint {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut fp = Fingerprint::default();
        for (ts, text) in iter {
            fp.add(ts, text);
        }
        fp
    }
}

/// Keep sessions that are neither empty nor a strict subset of a sibling.
///
/// Sessions with identical fingerprints are both kept. Order is preserved.
pub fn dedupe_sessions<T>(sessions: Vec<(T, Fingerprint)>) -> Vec<T> {
    let keep: Vec<bool> = sessions
        .iter()
        .enumerate()
        .map(|(i, (_, fp))| {
            !fp.is_empty()
                && !sessions
                    .iter()
                    .enumerate()
                    .any(|(j, (_, other))| i != j && fp.is_strict_subset_of(other))
        })
        .collect();

    let dropped = keep.iter().filter(|k| !**k).count();
    if dropped > 0 {
        tracing::debug!("dropped {} duplicate or empty sessions", dropped);
    }

    sessions
        .into_iter()
        .zip(keep)
        .filter_map(|((session, _), keep)| keep.then_some(session))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(pairs: &[(&str, &str)]) -> Fingerprint {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_strict_subset_session_dropped() {
        let b = fp(&[("t1", "hello"), ("t2", "fix bug")]);
        let a = fp(&[("t1", "hello")]);
        assert_eq!(dedupe_sessions(vec![("A", a), ("B", b)]), vec!["B"]);
    }

    #[test]
    fn test_identical_fingerprints_both_kept() {
        let a = fp(&[("t1", "hello")]);
        let b = fp(&[("t1", "hello")]);
        assert_eq!(dedupe_sessions(vec![("A", a), ("B", b)]), vec!["A", "B"]);
    }

    #[test]
    fn test_empty_fingerprint_dropped() {
        let empty = fp(&[("", "")]);
        assert!(empty.is_empty());
        let other = fp(&[("t9", "unrelated")]);
        assert_eq!(dedupe_sessions(vec![("E", empty), ("O", other)]), vec!["O"]);
    }

    #[test]
    fn test_overlapping_but_not_subset_kept() {
        let a = fp(&[("t1", "hello"), ("t3", "other")]);
        let b = fp(&[("t1", "hello"), ("t2", "fix bug")]);
        assert_eq!(dedupe_sessions(vec![("A", a), ("B", b)]).len(), 2);
    }

    #[test]
    fn test_preview_truncated_to_200_chars() {
        let long = "x".repeat(500);
        let a = fp(&[("t", &long)]);
        let b = fp(&[("t", &long[..200]), ("u", "more")]);
        assert!(a.is_strict_subset_of(&b));
    }
}
