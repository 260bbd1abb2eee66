#![cfg_attr(test, allow(clippy::panic, clippy::unwrap_used, clippy::expect_used))]
//! View, selection, and mark traits consumed by the sam command engine.
//!
//! Selection iteration must be snapshot-safe (§4.5/§4.6 of the spec this
//! crate implements against): a sub-command may dispose or create
//! selections while a loop command is still iterating the set it started
//! with. [`View::selection_ids`] returns an owned snapshot rather than a
//! live iterator so callers never observe a mutation mid-loop.

/// Opaque handle to one selection within a [`View`]. Stable across
/// mutation of *other* selections; only invalidated by disposing the
/// selection it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SelectionId(pub u32);

/// Opaque handle to a named mark, resolved from a letter via
/// [`Marks::mark_from_letter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MarkId(pub u8);

use sam_text::Range;

/// A view's ordered list of selections plus the handful of per-selection
/// operations the engine needs: get/set range, anchor flag, caret, and
/// primary-selection bookkeeping.
pub trait View {
    /// Snapshot of every live selection, in view order. Safe to hold across
    /// a sub-command invocation that disposes or creates selections.
    fn selection_ids(&self) -> Vec<SelectionId>;

    fn primary(&self) -> SelectionId;
    fn set_primary(&mut self, id: SelectionId);

    fn range(&self, id: SelectionId) -> Option<Range>;
    fn set_range(&mut self, id: SelectionId, range: Range);

    fn is_anchored(&self, id: SelectionId) -> bool;
    fn set_anchored(&mut self, id: SelectionId, anchored: bool);

    /// Caret position for `id` — conventionally `range.end` unless the
    /// commit phase placed it at `range.start` (e.g. inserted text
    /// containing a trailing newline per §4.8 step 3).
    fn caret(&self, id: SelectionId) -> usize;

    fn new_selection(&mut self, range: Range, anchored: bool) -> SelectionId;
    fn dispose(&mut self, id: SelectionId);

    fn selection_count(&self) -> usize {
        self.selection_ids().len()
    }
}

/// Per-file mark storage, indexed by selection number per spec.md §3.
pub trait Marks {
    /// Maps a mark letter (`'a'..='z'`, and the conventional `'<'`/`'>'`
    /// visual-mode marks) to a stable [`MarkId`], or `None` if the letter
    /// is not a valid mark name.
    fn mark_from_letter(&self, letter: u8) -> Option<MarkId>;

    fn get(&self, mark: MarkId, selection: SelectionId) -> Option<usize>;
    fn set(&mut self, mark: MarkId, selection: SelectionId, pos: usize);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeView {
        ranges: Vec<(SelectionId, Range, bool)>,
        primary: u32,
        next_id: u32,
    }

    impl View for FakeView {
        fn selection_ids(&self) -> Vec<SelectionId> {
            self.ranges.iter().map(|(id, _, _)| *id).collect()
        }
        fn primary(&self) -> SelectionId {
            SelectionId(self.primary)
        }
        fn set_primary(&mut self, id: SelectionId) {
            self.primary = id.0;
        }
        fn range(&self, id: SelectionId) -> Option<Range> {
            self.ranges.iter().find(|(i, _, _)| *i == id).map(|(_, r, _)| *r)
        }
        fn set_range(&mut self, id: SelectionId, range: Range) {
            if let Some(entry) = self.ranges.iter_mut().find(|(i, _, _)| *i == id) {
                entry.1 = range;
            }
        }
        fn is_anchored(&self, id: SelectionId) -> bool {
            self.ranges.iter().find(|(i, _, _)| *i == id).map(|(_, _, a)| *a).unwrap_or(false)
        }
        fn set_anchored(&mut self, id: SelectionId, anchored: bool) {
            if let Some(entry) = self.ranges.iter_mut().find(|(i, _, _)| *i == id) {
                entry.2 = anchored;
            }
        }
        fn caret(&self, id: SelectionId) -> usize {
            self.range(id).map(|r| r.end).unwrap_or(0)
        }
        fn new_selection(&mut self, range: Range, anchored: bool) -> SelectionId {
            let id = SelectionId(self.next_id);
            self.next_id += 1;
            self.ranges.push((id, range, anchored));
            id
        }
        fn dispose(&mut self, id: SelectionId) {
            self.ranges.retain(|(i, _, _)| *i != id);
        }
    }

    #[test]
    fn snapshot_survives_disposal_mid_iteration() {
        let mut v = FakeView::default();
        let a = v.new_selection(Range::new(0, 1), false);
        let b = v.new_selection(Range::new(2, 3), false);
        let snapshot = v.selection_ids();
        v.dispose(a);
        assert_eq!(snapshot, vec![a, b]);
        assert_eq!(v.selection_ids(), vec![b]);
    }
}
