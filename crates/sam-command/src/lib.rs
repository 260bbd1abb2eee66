#![cfg_attr(test, allow(clippy::panic, clippy::unwrap_used, clippy::expect_used))]
//! Command flag bitset and the closest-prefix command registry.
//!
//! The flag set is a plain `u32` bitset (mirroring the original's `enum`
//! of `1 << n` values) rather than the `bitflags` crate: it is small,
//! fixed at compile time, and every flag-test call site just wants `&`
//! against a `const`.

use sam_error::SamError;
use std::collections::BTreeMap;

pub mod flags {
    pub const SUB: u32 = 1 << 0;
    pub const REGEX: u32 = 1 << 1;
    pub const REGEX_DEFAULT: u32 = 1 << 2;
    pub const COUNT: u32 = 1 << 3;
    pub const TEXT: u32 = 1 << 4;
    pub const ADDRESS_NONE: u32 = 1 << 5;
    pub const ADDRESS_POS: u32 = 1 << 6;
    pub const ADDRESS_LINE: u32 = 1 << 7;
    pub const ADDRESS_AFTER: u32 = 1 << 8;
    pub const ADDRESS_ALL: u32 = 1 << 9;
    pub const ADDRESS_ALL_1CURSOR: u32 = 1 << 10;
    pub const SHELL: u32 = 1 << 11;
    pub const FORCE: u32 = 1 << 12;
    pub const ARGV: u32 = 1 << 13;
    pub const ONCE: u32 = 1 << 14;
    pub const LOOP: u32 = 1 << 15;
    pub const DESTRUCTIVE: u32 = 1 << 16;
    pub const WIN: u32 = 1 << 17;
}

/// Thin wrapper over the raw bitset giving flag tests a method-call shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandFlags(pub u32);

impl CommandFlags {
    pub const fn new(bits: u32) -> Self {
        CommandFlags(bits)
    }

    pub fn has(self, flag: u32) -> bool {
        self.0 & flag != 0
    }
}

/// A registered command: name, one-line help, dispatch identity, and flags.
///
/// `dispatch` names which `sam-engine` implementation function handles this
/// command; kept as a plain static string tag here (rather than a function
/// pointer) so this crate stays free of an `sam-engine` dependency — the
/// engine crate owns the actual `fn` table and looks dispatch tags up in
/// its own match, the same separation the parser/executor split in spec.md
/// §4.4/§4.5 implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDef {
    pub name: &'static str,
    pub help: &'static str,
    pub dispatch: &'static str,
    pub flags: CommandFlags,
}

/// Name-to-definition registry supporting closest-prefix lookup (spec.md
/// §9's "Closest-prefix command lookup" design note): a `BTreeMap` sorted
/// by name lets an ambiguous prefix resolve deterministically to the
/// lexicographically-first (and, by construction of this table, shortest)
/// matching entry, matching `lookup_command_definition`'s behavior of
/// preferring an exact match over a longer ambiguous one.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    commands: BTreeMap<&'static str, CommandDef>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    pub fn register(&mut self, def: CommandDef) {
        self.commands.insert(def.name, def);
    }

    /// Look up `name` by exact match first, then by closest (shortest)
    /// prefix match if `name` is itself a prefix of exactly the registered
    /// commands that share it.
    pub fn lookup(&self, name: &str) -> Result<CommandDef, SamError> {
        if let Some(def) = self.commands.get(name) {
            return Ok(*def);
        }
        let mut candidates = self.commands.range(name..).filter(|(k, _)| k.starts_with(name));
        let first = candidates.next();
        match first {
            Some((_, def)) => Ok(*def),
            None => Err(SamError::Command),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandDef> {
        self.commands.values()
    }
}

/// Build the registry populated with the full §6.3 grammar surface.
/// Structural commands dispatch to real `sam-engine` implementations;
/// window/session-chrome commands (`cd`, `new`, `open`, `split`, `vsplit`,
/// `vnew`, `help`, `map`, `unmap`, `map-window`, `unmap-window`,
/// `langmap`, `set`, `earlier`, `later`, `qall`) are registered so the
/// grammar surface and prefix-lookup behave uniformly across every name
/// spec.md lists, but dispatch to `"unsupported-window-command"`, which
/// `sam-engine` maps to `SamError::Execute` — see SPEC_FULL.md §4.7.
pub fn default_registry() -> Registry {
    use flags::*;
    let mut reg = Registry::new();
    let defs: &[(&str, &str, &str, u32)] = &[
        ("a", "Append text after range", "append", TEXT | WIN),
        ("c", "Change text in range", "change", TEXT | WIN),
        ("d", "Delete text in range", "delete", WIN),
        ("g", "If range contains regexp, run command", "guard", COUNT | REGEX | SUB | WIN),
        ("i", "Insert text before range", "insert", TEXT | WIN),
        ("p", "Create selection covering range", "print", WIN),
        ("s", "Substitute: use x/pattern/ c/replacement/ instead", "substitute_hint", SHELL),
        ("v", "If range does not contain regexp, run command", "guard_v", COUNT | REGEX | SUB),
        (
            "x",
            "Set range and run command on each match",
            "extract",
            SUB | REGEX | REGEX_DEFAULT | ADDRESS_ALL_1CURSOR | LOOP | WIN,
        ),
        ("y", "As `x` but select unmatched text", "extract_y", SUB | REGEX | ADDRESS_ALL_1CURSOR | LOOP | WIN),
        ("X", "Run command on files whose name matches", "files", SUB | REGEX | REGEX_DEFAULT | ADDRESS_NONE | ONCE),
        ("Y", "As `X` but select unmatched files", "files_y", SUB | REGEX | ADDRESS_NONE | ONCE),
        (">", "Send range to stdin of command", "pipeout", SHELL | ADDRESS_LINE | WIN),
        ("<", "Replace range by stdout of command", "pipein", SHELL | ADDRESS_POS | WIN),
        ("|", "Pipe range through command", "filter", SHELL | WIN),
        ("!", "Run the command", "launch", SHELL | ONCE | ADDRESS_NONE | WIN),
        ("w", "Write range to named file", "write", ARGV | FORCE | ONCE | ADDRESS_ALL | WIN),
        ("r", "Replace range by contents of file", "read", ARGV | ADDRESS_AFTER),
        ("e", "Edit file", "edit", ARGV | FORCE | ONCE | ADDRESS_NONE | DESTRUCTIVE | WIN),
        ("q", "Quit the current window", "quit", ARGV | FORCE | ONCE | ADDRESS_NONE | DESTRUCTIVE),
        ("wq", "Write file and quit", "write_quit", ARGV | FORCE | ONCE | ADDRESS_ALL | DESTRUCTIVE | WIN),
        ("cd", "Change directory", "unsupported-window-command", ARGV | ONCE | ADDRESS_NONE),
        ("help", "Show this help", "unsupported-window-command", ARGV | ONCE | ADDRESS_NONE),
        ("map", "Map key binding", "unsupported-window-command", ARGV | FORCE | ONCE | ADDRESS_NONE),
        ("map-window", "As `map` but window local", "unsupported-window-command", ARGV | FORCE | ONCE | ADDRESS_NONE),
        ("unmap", "Unmap key binding", "unsupported-window-command", ARGV | ONCE | ADDRESS_NONE),
        (
            "unmap-window",
            "`unmap` for window local bindings",
            "unsupported-window-command",
            ARGV | ONCE | ADDRESS_NONE | WIN,
        ),
        ("langmap", "Map keyboard layout", "unsupported-window-command", ARGV | FORCE | ONCE | ADDRESS_NONE),
        ("new", "Create new window", "unsupported-window-command", ARGV | ONCE | ADDRESS_NONE),
        ("open", "Open file", "unsupported-window-command", ARGV | ONCE | ADDRESS_NONE),
        ("qall", "Exit", "unsupported-window-command", ARGV | FORCE | ONCE | ADDRESS_NONE | DESTRUCTIVE),
        ("set", "Set option", "unsupported-window-command", ARGV | ONCE | ADDRESS_NONE),
        ("split", "Horizontally split window", "unsupported-window-command", ARGV | ONCE | ADDRESS_NONE | WIN),
        ("vnew", "As `new` but split vertically", "unsupported-window-command", ARGV | ONCE | ADDRESS_NONE),
        ("vsplit", "Vertically split window", "unsupported-window-command", ARGV | ONCE | ADDRESS_NONE | WIN),
        ("earlier", "Go to older text state", "unsupported-window-command", ARGV | ONCE | ADDRESS_NONE | WIN),
        ("later", "Go to newer text state", "unsupported-window-command", ARGV | ONCE | ADDRESS_NONE | WIN),
    ];
    for (name, help, dispatch, bits) in defs {
        reg.register(CommandDef { name, help, dispatch, flags: CommandFlags::new(*bits) });
    }
    reg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_wins_over_prefix() {
        let reg = default_registry();
        let def = reg.lookup("map").expect("exact match");
        assert_eq!(def.name, "map");
    }

    #[test]
    fn unambiguous_prefix_resolves() {
        let reg = default_registry();
        let def = reg.lookup("lang").expect("prefix match");
        assert_eq!(def.name, "langmap");
    }

    #[test]
    fn unknown_command_is_error() {
        let reg = default_registry();
        assert_eq!(reg.lookup("zzz"), Err(SamError::Command));
    }

    #[test]
    fn loop_flag_set_on_x_command() {
        let reg = default_registry();
        let def = reg.lookup("x").expect("x command exists");
        assert!(def.flags.has(flags::LOOP));
        assert!(!def.flags.has(flags::DESTRUCTIVE));
    }
}
