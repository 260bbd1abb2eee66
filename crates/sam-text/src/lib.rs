#![cfg_attr(test, allow(clippy::panic, clippy::unwrap_used, clippy::expect_used))]
//! Traits the sam command engine expects the host's text store to provide.
//!
//! The engine itself never owns buffer bytes; it is written entirely
//! against [`TextSource`]/[`TextMutate`] (plus the optional [`Undo`]
//! history trait), so a host can plug in a gap buffer, piece table, or
//! rope without touching the engine crates. `sam-text-mem` supplies the
//! `ropey`-backed implementation used by `sam-cli` and the scenario tests.

use sam_error::SamError;

/// Absolute byte range `[start, end)` within a text store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Range {
    pub start: usize,
    pub end: usize,
}

impl Range {
    pub fn new(start: usize, end: usize) -> Self {
        Range { start, end }
    }

    pub fn point(pos: usize) -> Self {
        Range { start: pos, end: pos }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Smallest range containing both inputs, per the `,` address operator.
    pub fn union(a: Range, b: Range) -> Range {
        Range { start: a.start.min(b.start), end: a.end.max(b.end) }
    }
}

/// Sentinel for "no such position" (marks, failed searches). Named after
/// `EPOS` in the original C source.
pub const EPOS: usize = usize::MAX;

/// Read-only operations over a text store's current content.
///
/// Covers both the "Text store" and "Motion helpers" bullets of the
/// required-services list: they are kept on one trait because every real
/// implementation needs both, unlike view/register access which a caller
/// may reasonably omit.
pub trait TextSource {
    fn size(&self) -> usize;
    fn byte_at(&self, pos: usize) -> Option<u8>;
    fn bytes(&self, pos: usize, len: usize) -> Vec<u8>;

    /// Start of the line containing `pos`.
    fn line_begin(&self, pos: usize) -> usize;
    /// Start of the line after the one containing `pos`, or `size()` at EOF.
    fn line_next(&self, pos: usize) -> usize;
    /// Byte offset of the start of 1-indexed line `n`, or [`EPOS`] if the
    /// text has fewer than `n` lines.
    fn pos_by_line(&self, n: usize) -> usize;
    /// 1-indexed line number containing `pos`.
    fn line_by_pos(&self, pos: usize) -> usize;
    /// Byte offset immediately after the character at `pos`.
    fn char_next(&self, pos: usize) -> usize;
}

/// Mutating operations over a text store.
pub trait TextMutate: TextSource {
    fn insert(&mut self, pos: usize, bytes: &[u8]);
    fn delete(&mut self, range: Range);
}

/// Opaque undo-history checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UndoState(pub u64);

/// Optional undo/redo/restore capability. Split from [`TextMutate`] so a
/// minimal harness (e.g. a scenario test) can implement just the mutation
/// surface the engine needs without building real history tracking; the
/// default methods report [`SamError::Execute`] rather than silently
/// pretending a checkpoint was taken.
pub trait Undo {
    fn snapshot(&mut self) -> Result<UndoState, SamError> {
        Err(SamError::Execute)
    }

    fn undo(&mut self) -> Result<UndoState, SamError> {
        Err(SamError::Execute)
    }

    fn redo(&mut self) -> Result<UndoState, SamError> {
        Err(SamError::Execute)
    }

    fn restore(&mut self, _state: UndoState) -> Result<(), SamError> {
        Err(SamError::Execute)
    }

    fn state(&self) -> UndoState {
        UndoState(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_union_takes_min_start_max_end() {
        let a = Range::new(3, 5);
        let b = Range::new(1, 4);
        let u = Range::union(a, b);
        assert_eq!(u, Range::new(1, 5));
    }

    #[test]
    fn point_range_is_empty() {
        assert!(Range::point(7).is_empty());
        assert_eq!(Range::point(7).len(), 0);
    }
}
