#![cfg_attr(test, allow(clippy::panic, clippy::unwrap_used, clippy::expect_used))]
//! Regex compilation and byte-oriented search for address sides and the
//! `x`/`y`/`g`/`v` loop commands.
//!
//! The spec treats the regex engine as an external collaborator (Plan
//! 9-style, supporting forward and backward range search with up to ten
//! capture groups and a "not beginning of line" search flag). We implement
//! that collaborator here on top of the `regex` crate's byte-oriented API so
//! patterns and haystacks alike stay raw bytes throughout the engine — no
//! UTF-8 validation requirement is imposed on the buffer being edited.
//!
//! Ownership is simpler here than in the C original: a [`CompiledRegex`] is
//! just a value: `Drop` frees it exactly once when the owning `AddressSide`
//! or `Command` node (and, transitively, the parse arena) goes out of scope.
//! There is no separate deallocation step to get wrong.

use thiserror::Error;

/// Capture groups beyond this index are not tracked, matching the spec's
/// fixed ten-slot capture array (group 0 plus `\1`..`\9`).
pub const MAX_CAPTURES: usize = 10;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegexError {
    #[error("{message}")]
    Syntax { message: String },
}

impl RegexError {
    pub fn syntax(message: impl Into<String>) -> Self {
        RegexError::Syntax { message: message.into() }
    }
}

/// A single match's byte span. `start == end` denotes a zero-width match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteMatch {
    pub start: usize,
    pub end: usize,
}

impl ByteMatch {
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }
}

/// Capture groups from one match: index 0 is the whole match, 1..=9 are
/// `\1`..`\9`. Unset groups (didn't participate in the match) are `None`.
#[derive(Debug, Clone, Default)]
pub struct Captures {
    groups: [Option<ByteMatch>; MAX_CAPTURES],
}

impl Captures {
    pub fn get(&self, index: usize) -> Option<ByteMatch> {
        self.groups.get(index).copied().flatten()
    }

    pub fn whole(&self) -> ByteMatch {
        // Group 0 always participates when a match was found at all.
        self.get(0).unwrap_or(ByteMatch { start: 0, end: 0 })
    }
}

/// A compiled regular expression owned by the parse arena it was built in.
#[derive(Debug, Clone)]
pub struct CompiledRegex {
    pattern: String,
    inner: regex::bytes::Regex,
}

impl CompiledRegex {
    /// Compile `pattern`. Multi-line mode is always on: `^`/`$` match at
    /// line boundaries, which is what gives forward search its "not at
    /// beginning of line" behavior for free — see [`Self::find_forward`].
    pub fn compile(pattern: &str) -> Result<Self, RegexError> {
        regex::bytes::RegexBuilder::new(pattern)
            .multi_line(true)
            .build()
            .map(|inner| CompiledRegex { pattern: pattern.to_string(), inner })
            .map_err(|e| RegexError::syntax(e.to_string()))
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Number of capture groups besides the whole match (`\1`..`\9`, capped
    /// at nine since only ten total registers exist).
    pub fn nsub(&self) -> usize {
        self.inner.captures_len().saturating_sub(1).min(MAX_CAPTURES - 1)
    }

    /// First match starting at or after `from`, searched against the whole
    /// `haystack` (never a sub-slice). Because matching always sees the true
    /// buffer, a multi-line `^` only matches where a real line begins, which
    /// is exactly the "not beginning of line" restriction the spec's
    /// external regex engine would otherwise need a dedicated flag for.
    pub fn find_forward(&self, haystack: &[u8], from: usize) -> Option<ByteMatch> {
        let from = from.min(haystack.len());
        self.inner.find_at(haystack, from).map(|m| ByteMatch { start: m.start(), end: m.end() })
    }

    /// Like [`Self::find_forward`] but also returns capture groups.
    pub fn captures_forward(&self, haystack: &[u8], from: usize) -> Option<Captures> {
        let from = from.min(haystack.len());
        let caps = self.inner.captures_at(haystack, from)?;
        let mut out = Captures::default();
        for (i, slot) in out.groups.iter_mut().enumerate() {
            *slot = caps.get(i).map(|m| ByteMatch { start: m.start(), end: m.end() });
        }
        Some(out)
    }

    /// Last non-overlapping match ending at or before `before`.
    ///
    /// The Plan 9-style matcher this spec is descended from supports native
    /// backward search; `regex` does not, so this walks every forward match
    /// up to `before` and keeps the last one. O(matches up to `before`), not
    /// O(1), but exact for the address-evaluator semantics in the spec.
    pub fn find_backward(&self, haystack: &[u8], before: usize) -> Option<ByteMatch> {
        let before = before.min(haystack.len());
        let mut best = None;
        let mut pos = 0;
        while pos <= before {
            let Some(m) = self.inner.find_at(haystack, pos) else { break };
            if m.start() > before || m.end() > before {
                break;
            }
            let advance = if m.end() > m.start() { m.end() } else { m.end() + 1 };
            best = Some(ByteMatch { start: m.start(), end: m.end() });
            pos = advance;
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_search_finds_word() {
        let re = CompiledRegex::compile(r"\w+").expect("valid pattern");
        let m = re.find_forward(b"one two three", 4).expect("match");
        assert_eq!(&b"one two three"[m.start..m.end], b"two");
    }

    #[test]
    fn backward_search_finds_last_match_before_point() {
        let re = CompiledRegex::compile(r"\w+").expect("valid pattern");
        let m = re.find_backward(b"one two three", 9).expect("match");
        assert_eq!(&b"one two three"[m.start..m.end], b"two");
    }

    #[test]
    fn multiline_caret_only_matches_at_line_starts() {
        let re = CompiledRegex::compile(r"^two").expect("valid pattern");
        assert!(re.find_forward(b"one\ntwo", 4).is_some());
        assert!(re.find_forward(b"one two", 4).is_none());
    }

    #[test]
    fn captures_report_group_one() {
        let re = CompiledRegex::compile(r"(\w+)=(\w+)").expect("valid pattern");
        let caps = re.captures_forward(b"key=value", 0).expect("match");
        let g1 = caps.get(1).expect("group 1");
        assert_eq!(&b"key=value"[g1.start..g1.end], b"key");
        let g2 = caps.get(2).expect("group 2");
        assert_eq!(&b"key=value"[g2.start..g2.end], b"value");
    }

    #[test]
    fn invalid_pattern_reports_syntax_error() {
        assert!(CompiledRegex::compile("(unclosed").is_err());
    }
}
