#![cfg_attr(test, allow(clippy::panic, clippy::unwrap_used, clippy::expect_used))]
//! Register bank: the addressable byte buffers used for yank/paste and
//! capture-group storage during back-reference expansion (`&`, `\1`..`\9`).

use sam_text::Range;
use std::collections::HashMap;

/// Identifies one register. `Capture(0)` is `&` (whole match); `Capture(1..=9)`
/// are `\1`..`\9`. `Named` covers the lowercase-letter yank registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterId {
    Named(char),
    Capture(u8),
    Shell,
}

pub trait Registers {
    fn get(&self, id: RegisterId) -> Option<&[u8]>;
    fn put(&mut self, id: RegisterId, bytes: Vec<u8>);

    /// Store the text covered by `matchrange` within `text` into `id`; the
    /// convenience form `x`/`y`/`g`/`v` use to populate `\1`..`\9` per match
    /// without the caller slicing the buffer itself.
    fn put_range(&mut self, id: RegisterId, text: &[u8], matchrange: Range) {
        let bytes = text.get(matchrange.start..matchrange.end).unwrap_or(&[]).to_vec();
        self.put(id, bytes);
    }
}

/// Simple `HashMap`-backed register bank, sufficient for a single
/// `sam_cmd` invocation or a long-lived CLI session.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegisters {
    entries: HashMap<RegisterId, Vec<u8>>,
}

impl InMemoryRegisters {
    pub fn new() -> Self {
        InMemoryRegisters::default()
    }
}

impl Registers for InMemoryRegisters {
    fn get(&self, id: RegisterId) -> Option<&[u8]> {
        self.entries.get(&id).map(|v| v.as_slice())
    }

    fn put(&mut self, id: RegisterId, bytes: Vec<u8>) {
        self.entries.insert(id, bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_range_slices_text_into_register() {
        let mut regs = InMemoryRegisters::new();
        regs.put_range(RegisterId::Capture(1), b"key=value", Range::new(0, 3));
        assert_eq!(regs.get(RegisterId::Capture(1)), Some(b"key".as_slice()));
    }

    #[test]
    fn unset_register_is_none() {
        let regs = InMemoryRegisters::new();
        assert_eq!(regs.get(RegisterId::Shell), None);
    }

    #[test]
    fn put_overwrites_previous_value() {
        let mut regs = InMemoryRegisters::new();
        regs.put(RegisterId::Named('a'), b"first".to_vec());
        regs.put(RegisterId::Named('a'), b"second".to_vec());
        assert_eq!(regs.get(RegisterId::Named('a')), Some(b"second".as_slice()));
    }
}
