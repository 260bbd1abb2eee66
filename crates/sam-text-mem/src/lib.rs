#![cfg_attr(test, allow(clippy::panic, clippy::unwrap_used, clippy::expect_used))]
//! Concrete, in-memory host services for the sam command engine: a
//! `ropey`-backed [`RopeText`] store and a `Vec`-backed [`InMemoryView`].
//!
//! Every trait in `sam-text`/`sam-view`/`sam-registers` describes a
//! *capability* the engine needs; this crate is the one place those
//! capabilities meet a real buffer, used by `sam-cli` and by the
//! scenario tests in `sam-engine`. A host embedding the engine
//! differently (a GUI editor's own piece-table buffer, say) would
//! implement the same traits directly instead of depending on this
//! crate.
//!
//! Positions are byte offsets everywhere, per `sam-text`'s contract; this
//! implementation assumes the buffer is valid UTF-8 and that every byte
//! offset the engine hands it falls on a character boundary, which holds
//! for every offset this codebase produces (line starts, regex match
//! bounds, and the rope's own `size()`).

use ropey::Rope;
use sam_error::SamError;
use sam_text::{Range, TextMutate, TextSource, Undo, UndoState, EPOS};
use sam_view::{MarkId, Marks, SelectionId, View};
use std::collections::HashMap;

/// Rope-backed text store with a linear undo/redo snapshot stack.
#[derive(Debug, Clone)]
pub struct RopeText {
    rope: Rope,
    history: Vec<Rope>,
    redo: Vec<Rope>,
    generation: u64,
}

impl RopeText {
    pub fn new() -> Self {
        RopeText { rope: Rope::new(), history: Vec::new(), redo: Vec::new(), generation: 0 }
    }

    pub fn from_str(content: &str) -> Self {
        RopeText { rope: Rope::from_str(content), history: Vec::new(), redo: Vec::new(), generation: 0 }
    }

    pub fn as_string(&self) -> String {
        self.rope.to_string()
    }

    fn byte_to_char(&self, pos: usize) -> usize {
        self.rope.byte_to_char(pos.min(self.rope.len_bytes()))
    }

    fn char_to_byte(&self, idx: usize) -> usize {
        self.rope.char_to_byte(idx.min(self.rope.len_chars()))
    }
}

impl Default for RopeText {
    fn default() -> Self {
        RopeText::new()
    }
}

impl TextSource for RopeText {
    fn size(&self) -> usize {
        self.rope.len_bytes()
    }

    fn byte_at(&self, pos: usize) -> Option<u8> {
        if pos >= self.size() {
            return None;
        }
        self.rope.bytes().nth(pos)
    }

    fn bytes(&self, pos: usize, len: usize) -> Vec<u8> {
        self.rope.bytes().skip(pos).take(len).collect()
    }

    fn line_begin(&self, pos: usize) -> usize {
        let c = self.byte_to_char(pos);
        let line = self.rope.char_to_line(c);
        self.char_to_byte(self.rope.line_to_char(line))
    }

    fn line_next(&self, pos: usize) -> usize {
        let c = self.byte_to_char(pos);
        let line = self.rope.char_to_line(c);
        if line + 1 < self.rope.len_lines() {
            self.char_to_byte(self.rope.line_to_char(line + 1))
        } else {
            self.size()
        }
    }

    fn pos_by_line(&self, n: usize) -> usize {
        if n == 0 || n > self.rope.len_lines() {
            return EPOS;
        }
        self.char_to_byte(self.rope.line_to_char(n - 1))
    }

    fn line_by_pos(&self, pos: usize) -> usize {
        let c = self.byte_to_char(pos);
        self.rope.char_to_line(c) + 1
    }

    fn char_next(&self, pos: usize) -> usize {
        let c = self.byte_to_char(pos);
        if c + 1 >= self.rope.len_chars() {
            self.size()
        } else {
            self.char_to_byte(c + 1)
        }
    }
}

impl TextMutate for RopeText {
    fn insert(&mut self, pos: usize, bytes: &[u8]) {
        let text = std::str::from_utf8(bytes).unwrap_or("");
        let c = self.byte_to_char(pos);
        self.rope.insert(c, text);
    }

    fn delete(&mut self, range: Range) {
        let start = self.byte_to_char(range.start);
        let end = self.byte_to_char(range.end);
        if start < end {
            self.rope.remove(start..end);
        }
    }
}

impl Undo for RopeText {
    fn snapshot(&mut self) -> Result<UndoState, SamError> {
        self.history.push(self.rope.clone());
        self.redo.clear();
        self.generation += 1;
        Ok(UndoState(self.generation))
    }

    fn undo(&mut self) -> Result<UndoState, SamError> {
        let Some(prev) = self.history.pop() else { return Err(SamError::Execute) };
        self.redo.push(std::mem::replace(&mut self.rope, prev));
        self.generation += 1;
        Ok(UndoState(self.generation))
    }

    fn redo(&mut self) -> Result<UndoState, SamError> {
        let Some(next) = self.redo.pop() else { return Err(SamError::Execute) };
        self.history.push(std::mem::replace(&mut self.rope, next));
        self.generation += 1;
        Ok(UndoState(self.generation))
    }

    fn restore(&mut self, _state: UndoState) -> Result<(), SamError> {
        Err(SamError::Execute)
    }

    fn state(&self) -> UndoState {
        UndoState(self.generation)
    }
}

#[derive(Debug, Clone, Copy)]
struct Selection {
    range: Range,
    anchored: bool,
}

/// `Vec`-backed view and per-file mark bank. Selections are kept sorted
/// by `range.start` after every mutation, matching the ordering the
/// loop commands and the transcript's selection snapshot expect.
#[derive(Debug, Clone, Default)]
pub struct InMemoryView {
    selections: HashMap<u32, Selection>,
    order: Vec<u32>,
    next_id: u32,
    primary: u32,
    marks: HashMap<(u8, u32), usize>,
}

impl InMemoryView {
    pub fn new() -> Self {
        InMemoryView::default()
    }

    /// A fresh view with one selection at the start of the buffer, the
    /// state every file opens in.
    pub fn with_initial_selection() -> Self {
        let mut v = InMemoryView::new();
        v.new_selection(Range::point(0), false);
        v
    }

    fn resort(&mut self) {
        self.order.sort_by_key(|id| self.selections.get(id).map(|s| s.range.start).unwrap_or(0));
    }
}

impl View for InMemoryView {
    fn selection_ids(&self) -> Vec<SelectionId> {
        self.order.iter().map(|id| SelectionId(*id)).collect()
    }

    fn primary(&self) -> SelectionId {
        SelectionId(self.primary)
    }

    fn set_primary(&mut self, id: SelectionId) {
        self.primary = id.0;
    }

    fn range(&self, id: SelectionId) -> Option<Range> {
        self.selections.get(&id.0).map(|s| s.range)
    }

    fn set_range(&mut self, id: SelectionId, range: Range) {
        if let Some(sel) = self.selections.get_mut(&id.0) {
            sel.range = range;
        }
        self.resort();
    }

    fn is_anchored(&self, id: SelectionId) -> bool {
        self.selections.get(&id.0).map(|s| s.anchored).unwrap_or(false)
    }

    fn set_anchored(&mut self, id: SelectionId, anchored: bool) {
        if let Some(sel) = self.selections.get_mut(&id.0) {
            sel.anchored = anchored;
        }
    }

    fn caret(&self, id: SelectionId) -> usize {
        self.range(id).map(|r| r.end).unwrap_or(0)
    }

    fn new_selection(&mut self, range: Range, anchored: bool) -> SelectionId {
        let id = self.next_id;
        self.next_id += 1;
        self.selections.insert(id, Selection { range, anchored });
        self.order.push(id);
        self.resort();
        SelectionId(id)
    }

    fn dispose(&mut self, id: SelectionId) {
        self.selections.remove(&id.0);
        self.order.retain(|i| *i != id.0);
    }
}

impl Marks for InMemoryView {
    fn mark_from_letter(&self, letter: u8) -> Option<MarkId> {
        if letter.is_ascii_lowercase() || letter == b'<' || letter == b'>' {
            Some(MarkId(letter))
        } else {
            None
        }
    }

    fn get(&self, mark: MarkId, selection: SelectionId) -> Option<usize> {
        self.marks.get(&(mark.0, selection.0)).copied()
    }

    fn set(&mut self, mark: MarkId, selection: SelectionId, pos: usize) {
        self.marks.insert((mark.0, selection.0), pos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_delete_update_line_index() {
        let mut text = RopeText::from_str("one\ntwo\nthree\n");
        assert_eq!(text.line_by_pos(5), 2);
        text.delete(Range::new(4, 8));
        assert_eq!(text.as_string(), "one\nthree\n");
    }

    #[test]
    fn undo_restores_previous_snapshot() {
        let mut text = RopeText::from_str("abc");
        text.snapshot().expect("snapshot succeeds");
        text.insert(3, b"def");
        assert_eq!(text.as_string(), "abcdef");
        text.undo().expect("undo succeeds");
        assert_eq!(text.as_string(), "abc");
    }

    #[test]
    fn view_keeps_selections_sorted_by_start() {
        let mut view = InMemoryView::new();
        let b = view.new_selection(Range::new(5, 6), false);
        let a = view.new_selection(Range::new(0, 1), false);
        assert_eq!(view.selection_ids(), vec![a, b]);
    }

    #[test]
    fn mark_from_letter_accepts_lowercase_only() {
        let view = InMemoryView::new();
        assert!(view.mark_from_letter(b'a').is_some());
        assert!(view.mark_from_letter(b'A').is_none());
    }
}
