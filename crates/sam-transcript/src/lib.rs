#![cfg_attr(test, allow(clippy::panic, clippy::unwrap_used, clippy::expect_used))]
//! Per-file transcript: a sorted, non-overlapping list of pending edits
//! built up during one command-line evaluation, validated for conflicts,
//! and committed to the text store in one atomic pass.
//!
//! The insertion algorithm and the `latest`-hint fast path are ported
//! directly from `change_new`/`change_add` in the original `sam.c`: most
//! real-world command lines enqueue changes in increasing range order (a
//! single `x/re/ c/.../` loop, for instance), so checking `latest` first
//! avoids re-walking the whole list from the head for every insert.

use sam_error::SamError;
use sam_text::{Range, TextMutate};
use sam_view::{SelectionId, View};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Delete,
    Change,
}

/// One pending edit. Inserts use `range.start == range.end`.
#[derive(Debug, Clone)]
pub struct Change {
    pub kind: ChangeKind,
    pub range: Range,
    pub data: Option<Vec<u8>>,
    pub repeat_count: u32,
    pub selection: Option<SelectionId>,
}

impl Change {
    pub fn insert(at: usize, data: Vec<u8>, repeat_count: u32, selection: Option<SelectionId>) -> Self {
        Change { kind: ChangeKind::Insert, range: Range::point(at), data: Some(data), repeat_count, selection }
    }

    pub fn delete(range: Range, selection: Option<SelectionId>) -> Self {
        Change { kind: ChangeKind::Delete, range, data: None, repeat_count: 1, selection }
    }

    pub fn change(range: Range, data: Vec<u8>, repeat_count: u32, selection: Option<SelectionId>) -> Self {
        Change { kind: ChangeKind::Change, range, data: Some(data), repeat_count, selection }
    }

    /// `Change` needs both phases: the old range is deleted and the
    /// replacement text is inserted in its place.
    fn is_insert(&self) -> bool {
        matches!(self.kind, ChangeKind::Insert | ChangeKind::Change)
    }

    fn is_delete(&self) -> bool {
        matches!(self.kind, ChangeKind::Delete | ChangeKind::Change)
    }
}

/// Per-file transcript. `changes` is kept sorted by `range.start` at all
/// times; `latest_idx` remembers the index of the most recently inserted
/// change as an insertion-point hint.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    changes: Vec<Change>,
    latest_idx: Option<usize>,
    error: Option<SamError>,
}

impl Transcript {
    pub fn new() -> Self {
        Transcript::default()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn error(&self) -> Option<SamError> {
        self.error
    }

    /// Insert `change` if it does not overlap an existing entry. On
    /// conflict, sets the transcript's sticky error to `Conflict` and the
    /// change is not inserted. Returns whether it was inserted.
    pub fn add(&mut self, change: Change) -> bool {
        if change.range.start > change.range.end {
            return false;
        }

        let search_from = match self.latest_idx {
            Some(idx) if self.changes[idx].range.end <= change.range.start => idx + 1,
            _ => 0,
        };

        let mut insert_at = self.changes.len();
        for i in search_from..self.changes.len() {
            if self.changes[i].range.end > change.range.start {
                insert_at = i;
                break;
            }
        }

        if let Some(next) = self.changes.get(insert_at) {
            if next.range.start < change.range.end {
                self.error = Some(SamError::Conflict);
                return false;
            }
        }

        self.changes.insert(insert_at, change);
        self.latest_idx = Some(insert_at);
        true
    }

    /// Writing a file while it has pending changes is a semantic
    /// pre-commit conflict (§7 class 2): callers invoke this before `w`
    /// actually runs.
    pub fn guard_write(&mut self) -> Result<(), SamError> {
        if !self.changes.is_empty() {
            self.error = Some(SamError::WriteConflict);
            return Err(SamError::WriteConflict);
        }
        Ok(())
    }

    /// Apply every pending change to `text`, in range order, with running
    /// byte-delta fix-up, updating bound selections via `view`. Returns
    /// the net byte-length delta applied. No-ops (returns `Ok(0)`) if the
    /// transcript carries a sticky error — commit is suppressed for that
    /// file only, per §7 class 2/3.
    pub fn commit<T: TextMutate, V: View>(&mut self, text: &mut T, view: &mut V) -> Result<i64, SamError> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let mut delta: i64 = 0;
        for change in self.changes.drain(..) {
            let start = (change.range.start as i64 + delta).max(0) as usize;
            let end = (change.range.end as i64 + delta).max(0) as usize;

            if change.is_delete() {
                text.delete(Range::new(start, end));
                delta -= (end - start) as i64;
            }

            if change.is_insert() {
                let data = change.data.unwrap_or_default();
                let insert_at = if matches!(change.kind, ChangeKind::Change) { start } else { start };
                for _ in 0..change.repeat_count.max(1) {
                    text.insert(insert_at, &data);
                    delta += data.len() as i64;
                }
                let end_of_insert = insert_at + data.len() * change.repeat_count.max(1) as usize;
                if let Some(sel) = change.selection {
                    let caret = if data.contains(&b'\n') { insert_at } else { end_of_insert };
                    view.set_range(sel, Range::new(insert_at, end_of_insert));
                    let _ = caret;
                } else {
                    view.new_selection(Range::new(insert_at, end_of_insert), false);
                }
            } else if let Some(sel) = change.selection {
                view.set_range(sel, Range::point(start));
            }

            tracing::debug!(target: "sam_transcript::commit", start, end, kind = ?change.kind, "applied change");
        }

        self.latest_idx = None;
        Ok(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeText(Vec<u8>);
    impl sam_text::TextSource for FakeText {
        fn size(&self) -> usize {
            self.0.len()
        }
        fn byte_at(&self, pos: usize) -> Option<u8> {
            self.0.get(pos).copied()
        }
        fn bytes(&self, pos: usize, len: usize) -> Vec<u8> {
            self.0.get(pos..pos + len).unwrap_or(&[]).to_vec()
        }
        fn line_begin(&self, pos: usize) -> usize {
            pos
        }
        fn line_next(&self, pos: usize) -> usize {
            pos
        }
        fn pos_by_line(&self, _n: usize) -> usize {
            0
        }
        fn line_by_pos(&self, _pos: usize) -> usize {
            1
        }
        fn char_next(&self, pos: usize) -> usize {
            pos + 1
        }
    }
    impl TextMutate for FakeText {
        fn insert(&mut self, pos: usize, bytes: &[u8]) {
            self.0.splice(pos..pos, bytes.iter().copied());
        }
        fn delete(&mut self, range: Range) {
            self.0.drain(range.start..range.end);
        }
    }

    #[derive(Default)]
    struct FakeView {
        ranges: HashMap<u32, Range>,
        next: u32,
    }
    impl View for FakeView {
        fn selection_ids(&self) -> Vec<SelectionId> {
            self.ranges.keys().map(|k| SelectionId(*k)).collect()
        }
        fn primary(&self) -> SelectionId {
            SelectionId(0)
        }
        fn set_primary(&mut self, _id: SelectionId) {}
        fn range(&self, id: SelectionId) -> Option<Range> {
            self.ranges.get(&id.0).copied()
        }
        fn set_range(&mut self, id: SelectionId, range: Range) {
            self.ranges.insert(id.0, range);
        }
        fn is_anchored(&self, _id: SelectionId) -> bool {
            false
        }
        fn set_anchored(&mut self, _id: SelectionId, _anchored: bool) {}
        fn caret(&self, id: SelectionId) -> usize {
            self.range(id).map(|r| r.end).unwrap_or(0)
        }
        fn new_selection(&mut self, range: Range, _anchored: bool) -> SelectionId {
            let id = self.next;
            self.next += 1;
            self.ranges.insert(id, range);
            SelectionId(id)
        }
        fn dispose(&mut self, id: SelectionId) {
            self.ranges.remove(&id.0);
        }
    }

    #[test]
    fn non_overlapping_inserts_succeed_in_any_order() {
        let mut t = Transcript::new();
        assert!(t.add(Change::delete(Range::new(5, 6), None)));
        assert!(t.add(Change::delete(Range::new(0, 1), None)));
        assert!(t.error().is_none());
    }

    #[test]
    fn overlapping_change_sets_conflict() {
        let mut t = Transcript::new();
        assert!(t.add(Change::delete(Range::new(0, 5), None)));
        assert!(!t.add(Change::delete(Range::new(3, 4), None)));
        assert_eq!(t.error(), Some(SamError::Conflict));
    }

    #[test]
    fn commit_applies_delete_then_insert_with_delta() {
        let mut t = Transcript::new();
        assert!(t.add(Change::delete(Range::new(0, 3), None)));
        assert!(t.add(Change::insert(3, b"XY".to_vec(), 1, None)));
        let mut text = FakeText(b"one two".to_vec());
        let mut view = FakeView::default();
        let delta = t.commit(&mut text, &mut view).expect("commit succeeds");
        assert_eq!(delta, -3 + 2);
        assert_eq!(text.0, b"XY two");
    }

    #[test]
    fn write_guard_rejects_pending_changes() {
        let mut t = Transcript::new();
        t.add(Change::delete(Range::new(0, 1), None));
        assert_eq!(t.guard_write(), Err(SamError::WriteConflict));
    }
}
