//! C2: destination-pattern wildcard matcher (spec §4.2).
//!
//! Ported from `original_source/src/protocol/util.go`'s `subMatch` /
//! `MatchWildcards`, adopting the documented (terminal-only `**`) behavior
//! per the REDESIGN note in spec §9: the source's implementation allowed
//! `**` to appear anywhere and still match as if it were terminal, which
//! contradicts its own doc comment. This port enforces the comment.

const SEPARATOR: char = '.';

/// Per-segment match: equal strings match; `*` matches any single segment;
/// a segment with exactly one embedded `*` matches if the pre/post literals
/// bracket the subject segment. More than one `*` in a segment is rejected.
fn sub_match(subject: &str, pattern: &str) -> bool {
    if subject == pattern {
        return true;
    }
    if pattern == "*" {
        return true;
    }
    if let Some(n) = pattern.find('*') {
        if pattern[n + 1..].contains('*') {
            return false;
        }
        let pre = &pattern[..n];
        let post = &pattern[n + 1..];
        if !pre.is_empty() && !subject.starts_with(pre) {
            return false;
        }
        if !post.is_empty() && !subject.ends_with(post) {
            return false;
        }
        return true;
    }
    false
}

/// Whole-string wildcard match (spec §4.2 / §8.7).
///
/// `s` must not itself contain `*` — such subjects never match anything and
/// this returns `false` rather than erroring.
pub fn match_wildcards(subject: &str, pattern: &str) -> bool {
    if subject.contains('*') {
        return false;
    }

    let sf: Vec<&str> = subject.split(SEPARATOR).collect();
    let pf: Vec<&str> = pattern.split(SEPARATOR).collect();

    if sf.len() < pf.len() {
        return false;
    }

    for (i, p) in pf.iter().enumerate() {
        if *p == "**" {
            // Only valid as the final pattern segment.
            return i == pf.len() - 1;
        }
        if !sub_match(sf[i], p) {
            return false;
        }
    }

    sf.len() == pf.len()
}
