#![cfg_attr(test, allow(clippy::panic, clippy::unwrap_used, clippy::expect_used))]
//! Per-selection executor, loop commands, and the `sam_cmd` state machine.
//!
//! This is the crate that actually runs a parsed command tree: it walks
//! the [`sam_parser::ParseArena`] the parser built, computes a default
//! range for each command per `get_range_for_command` in the original
//! `sam.c`, builds up a [`sam_transcript::Transcript`] of pending edits,
//! and commits it in one pass. Loop commands (`x`/`y`/`g`/`v`/`X`/`Y`/`{}`)
//! are driven from here too, including the negative-count two-pass remap
//! ported from `count_init`/`count_negative`/`count_evaluate`.

use sam_address::evaluate;
use sam_command::{flags, Registry};
use sam_error::{ErrorLog, SamError};
use sam_parser::{parse, CommandId, CommandNode, Count, ParseArena};
use sam_registers::{RegisterId, Registers};
use sam_text::{Range, TextMutate};
use sam_transcript::{Change, Transcript};
use sam_view::{Marks, SelectionId, View};

/// External shell collaborator for `|`, `>`, `<`, and `!`. Split out as a
/// trait (rather than calling `std::process::Command` directly) so a
/// scenario test or a sandboxed host can supply a fake without spawning a
/// real process.
pub trait ProcessPipe {
    /// Run `shell_cmd` with `stdin` piped to it; return what it wrote to
    /// stdout. `Err(SamError::Shell)` on spawn failure or non-zero exit.
    fn run(&mut self, shell_cmd: &str, stdin: &[u8]) -> Result<Vec<u8>, SamError>;
}

/// No-op collaborator for hosts (and tests) that never use `|`/`>`/`<`/`!`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProcessPipe;

impl ProcessPipe for NullProcessPipe {
    fn run(&mut self, _shell_cmd: &str, _stdin: &[u8]) -> Result<Vec<u8>, SamError> {
        Err(SamError::Shell)
    }
}

/// User-visible, non-error messages `sam_cmd` produces along the way
/// (the info line, not the error log): a successful write, a quit
/// request, etc.
pub trait EventEmitter {
    fn info(&mut self, message: &str);
}

/// Collects info messages into a `Vec` rather than printing them;
/// `sam-cli` supplies the real stderr/status-line sink.
#[derive(Debug, Clone, Default)]
pub struct CollectingEmitter {
    pub messages: Vec<String>,
}

impl EventEmitter for CollectingEmitter {
    fn info(&mut self, message: &str) {
        self.messages.push(message.to_string());
    }
}

/// The five phases a `sam_cmd` invocation walks through in order. Each
/// transition is logged at `debug` so an embedding host can trace a
/// command line's progress without instrumenting call sites itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    Idle,
    Lexing,
    Validating,
    Executing,
    Committing,
    Reporting,
}

fn transition(from: EngineState, to: EngineState) {
    tracing::debug!(target: "sam_engine::state", ?from, ?to, "state transition");
}

/// Everything [`run_command_line`] threads through to every dispatch
/// function without re-listing five generic parameters at each call site.
struct ExecCtx<'a, T, V, R, P, E> {
    registry: &'a Registry,
    text: &'a mut T,
    view: &'a mut V,
    registers: &'a mut R,
    pipe: &'a mut P,
    emit: &'a mut E,
    transcript: Transcript,
    /// Whether the view held exactly one selection when this command
    /// line started. `ADDRESS_ALL_1CURSOR` reads this snapshot rather
    /// than `view.selection_count()` live: loop commands call
    /// `new_selection` for every match they iterate, so a live count
    /// would make a sibling statement's default address flip from
    /// "whole file" to "just dot" only because an earlier statement in
    /// the same line happened to fan out selections first.
    single_cursor_at_entry: bool,
}

/// Resolve the default range for a command with no explicit address,
/// per `get_range_for_command` in `sam.c`. Checked in this fixed order;
/// the first matching flag wins.
fn effective_range<T: TextMutate>(
    flags: sam_command::CommandFlags,
    dot: Range,
    text: &T,
    single_cursor_at_entry: bool,
) -> Range {
    if flags.has(self::flags::ADDRESS_POS) {
        return Range::point(dot.end);
    }
    if flags.has(self::flags::ADDRESS_LINE) {
        let begin = text.line_begin(dot.start);
        return Range::new(begin, text.line_next(begin));
    }
    if flags.has(self::flags::ADDRESS_AFTER) {
        let next = text.line_next(dot.end);
        return Range::point(next);
    }
    if flags.has(self::flags::ADDRESS_ALL) {
        return Range::new(0, text.size());
    }
    if flags.has(self::flags::ADDRESS_ALL_1CURSOR) && single_cursor_at_entry {
        return Range::new(0, text.size());
    }
    dot
}

/// Resolve the `[start, end]` iteration window a [`Count`] selects out of
/// `total` matches, applying the negative-index two-pass remap `sam.c`
/// performs in `count_negative`/`count_init`: a negative bound counts
/// back from the last match (`-1` is the last, `-2` the second-to-last,
/// ...), which only resolves once `total` is known — hence "two pass":
/// the matches are found first, and only then is the count window fixed.
fn resolve_count_window(count: &Count, total: i32) -> (i32, i32) {
    let resolve = |n: i32| -> i32 {
        if n < 0 {
            (total + n + 1).max(0)
        } else {
            n
        }
    };
    let start = resolve(count.start).max(if count.start == 0 { 0 } else { 1 });
    let end = if count.end == i32::MAX { total } else { resolve(count.end) };
    (start.max(1), end.min(total).max(0))
}

fn selected_by_count(count: &Count, iteration: i32, total: i32) -> bool {
    let (start, end) = resolve_count_window(count, total);
    if count.modulo {
        count.start > 0 && iteration % count.start == 0
    } else {
        iteration >= start && iteration <= end
    }
}

/// Substitute `&` and `\1`..`\9` in replacement/insert/append text with the
/// register contents the most recent `x`/`y` match populated (`&` is
/// `RegisterId::Capture(0)`, the whole match), per the original `text()`
/// helper's two-byte-class scan (`strcspn(text, "\\&")`). `\&` and `\\`
/// escape to a literal `&`/`\` instead of expanding, matching its
/// `text[1] == '\\' || text[1] == '&'` branch.
fn expand_backreferences<R: Registers>(body: &[u8], registers: &R) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len());
    let mut i = 0;
    while i < body.len() {
        let b = body[i];
        if b == b'&' {
            if let Some(bytes) = registers.get(RegisterId::Capture(0)) {
                out.extend_from_slice(bytes);
            }
            i += 1;
            continue;
        }
        if b == b'\\' && i + 1 < body.len() {
            let next = body[i + 1];
            if next.is_ascii_digit() && next != b'0' {
                if let Some(bytes) = registers.get(RegisterId::Capture(next - b'0')) {
                    out.extend_from_slice(bytes);
                }
                i += 2;
                continue;
            }
            if next == b'&' || next == b'\\' {
                out.push(next);
                i += 2;
                continue;
            }
        }
        out.push(b);
        i += 1;
    }
    out
}

/// Parse and run one command line against one open file. Returns the
/// terminal [`SamError`] (`Ok` on success) plus the accumulated parse
/// diagnostics; commit-time and execute-time errors are folded into a
/// single-entry `ErrorLog` so callers always look in the same place.
pub fn run_command_line<T, V, R, P, E>(
    line: &[u8],
    registry: &Registry,
    text: &mut T,
    view: &mut V,
    registers: &mut R,
    pipe: &mut P,
    emit: &mut E,
) -> (SamError, ErrorLog)
where
    T: TextMutate,
    V: View + Marks,
    R: Registers,
    P: ProcessPipe,
    E: EventEmitter,
{
    transition(EngineState::Idle, EngineState::Lexing);
    let (arena, mut errors, hard_error) = parse(line, registry);
    if let Some(err) = hard_error {
        transition(EngineState::Lexing, EngineState::Reporting);
        return (err, errors);
    }

    transition(EngineState::Lexing, EngineState::Validating);
    if let Some(err) = validate(&arena, registry) {
        errors.report(err, 0);
        transition(EngineState::Validating, EngineState::Reporting);
        return (err, errors);
    }

    transition(EngineState::Validating, EngineState::Executing);
    let single_cursor_at_entry = view.selection_count() <= 1;
    let mut ctx =
        ExecCtx { registry, text, view, registers, pipe, emit, transcript: Transcript::new(), single_cursor_at_entry };

    let dot_selections = ctx.view.selection_ids();
    let mut exec_error = None;
    'statements: for &stmt in &arena.statements {
        for &sel in &dot_selections {
            let dot = ctx.view.range(sel).unwrap_or(Range::point(0));
            match execute_node(stmt, &arena, &mut ctx, sel, dot) {
                Ok(()) => {}
                Err(e) => {
                    exec_error = Some(e);
                    break 'statements;
                }
            }
        }
    }

    transition(EngineState::Executing, EngineState::Committing);
    let commit_result = if exec_error.is_none() { ctx.transcript.commit(ctx.text, ctx.view) } else { Ok(0) };

    transition(EngineState::Committing, EngineState::Reporting);
    let final_error = exec_error.or(commit_result.err()).unwrap_or(SamError::Ok);
    if final_error != SamError::Ok {
        errors.report(final_error, 0);
    }
    (final_error, errors)
}

/// Structural checks that don't need the text store: a `LOOP`-flagged
/// command followed by a `DESTRUCTIVE` one in the same group is already
/// caught during parsing (`LoopInvalidCmd`); this pass additionally
/// rejects a `DESTRUCTIVE` command nested directly inside a `Group`
/// (`GroupInvalidCmd` in `sam.c`'s `cmd_add`), which the parser does not
/// see because groups nest through a different code path than loop
/// bodies.
fn validate(arena: &ParseArena, _registry: &Registry) -> Option<SamError> {
    fn walk(id: CommandId, arena: &ParseArena, in_group: bool) -> Option<SamError> {
        match arena.get(id) {
            CommandNode::Group { children, .. } => {
                for &c in children {
                    if let CommandNode::Leaf { definition, .. } = arena.get(c) {
                        if definition.flags.has(flags::DESTRUCTIVE) {
                            return Some(SamError::GroupInvalidCmd);
                        }
                    }
                    if let Some(e) = walk(c, arena, true) {
                        return Some(e);
                    }
                }
                None
            }
            CommandNode::Leaf { sub, .. } => sub.and_then(|s| walk(s, arena, in_group)),
        }
    }
    arena.statements.iter().find_map(|&id| walk(id, arena, false))
}

fn execute_node<T, V, R, P, E>(
    id: CommandId,
    arena: &ParseArena,
    ctx: &mut ExecCtx<T, V, R, P, E>,
    selection: SelectionId,
    dot: Range,
) -> Result<(), SamError>
where
    T: TextMutate,
    V: View + Marks,
    R: Registers,
    P: ProcessPipe,
    E: EventEmitter,
{
    match arena.get(id) {
        CommandNode::Group { address, children } => {
            let range = if address.is_empty() { dot } else { evaluate(address, ctx.text, ctx.view, selection, dot) };
            for &child in children {
                execute_node(child, arena, ctx, selection, range)?;
            }
            Ok(())
        }
        CommandNode::Leaf { definition, address, regex, count, text: body, shell_text, args, force, iteration, sub } => {
            let range = if address.is_empty() {
                effective_range(definition.flags, dot, ctx.text, ctx.single_cursor_at_entry)
            } else {
                evaluate(address, ctx.text, ctx.view, selection, dot)
            };
            iteration.set(iteration.get() + 1);

            match definition.dispatch {
                "append" => {
                    let data = expand_backreferences(body.as_deref().unwrap_or(&[]), ctx.registers);
                    ctx.transcript.add(Change::insert(range.end, data, 1, Some(selection)));
                    Ok(())
                }
                "insert" => {
                    let data = expand_backreferences(body.as_deref().unwrap_or(&[]), ctx.registers);
                    ctx.transcript.add(Change::insert(range.start, data, 1, Some(selection)));
                    Ok(())
                }
                "change" => {
                    let data = expand_backreferences(body.as_deref().unwrap_or(&[]), ctx.registers);
                    ctx.transcript.add(Change::change(range, data, 1, Some(selection)));
                    Ok(())
                }
                "delete" => {
                    ctx.transcript.add(Change::delete(range, Some(selection)));
                    Ok(())
                }
                "print" => {
                    ctx.view.set_range(selection, range);
                    Ok(())
                }
                "substitute_hint" => Err(SamError::Command),
                "guard" | "guard_v" => {
                    let Some(re) = regex else { return Err(SamError::Regex) };
                    let haystack = ctx.text.bytes(range.start, range.len());
                    let found = re.find_forward(&haystack, 0).is_some();
                    // No bounding "total" match count applies to a guard's own
                    // count window (unlike x/y's loop count): i32::MAX as the
                    // `total` argument leaves an unconstrained count exactly
                    // unconstrained and a literal count (e.g. `g2`) exact.
                    let counted = selected_by_count(count, iteration.get(), i32::MAX);
                    let fire = (counted && found) ^ (definition.dispatch == "guard_v");
                    if fire {
                        if let Some(s) = sub {
                            execute_node(*s, arena, ctx, selection, range)?;
                        }
                    } else {
                        ctx.view.dispose(selection);
                    }
                    Ok(())
                }
                "extract" | "extract_y" => {
                    run_extract(arena, ctx, *sub, regex.as_ref(), count, range, selection, definition.dispatch == "extract_y")
                }
                "files" | "files_y" => Err(SamError::Execute),
                "pipeout" => {
                    let haystack = ctx.text.bytes(range.start, range.len());
                    let cmd = shell_text.clone().unwrap_or_default();
                    ctx.pipe.run(&cmd, &haystack)?;
                    Ok(())
                }
                "pipein" => {
                    let cmd = shell_text.clone().unwrap_or_default();
                    let output = ctx.pipe.run(&cmd, b"")?;
                    ctx.transcript.add(Change::change(range, output, 1, Some(selection)));
                    Ok(())
                }
                "filter" => {
                    let haystack = ctx.text.bytes(range.start, range.len());
                    let cmd = shell_text.clone().unwrap_or_default();
                    let output = ctx.pipe.run(&cmd, &haystack)?;
                    ctx.transcript.add(Change::change(range, output, 1, Some(selection)));
                    Ok(())
                }
                "launch" => {
                    let cmd = shell_text.clone().unwrap_or_default();
                    ctx.pipe.run(&cmd, b"")?;
                    Ok(())
                }
                "write" => {
                    ctx.transcript.guard_write()?;
                    let name = args.first().cloned().unwrap_or_default();
                    ctx.emit.info(&format!("wrote {name}"));
                    let _ = force;
                    Ok(())
                }
                "write_quit" => {
                    ctx.transcript.guard_write()?;
                    ctx.emit.info("wrote and quit");
                    Ok(())
                }
                "read" => Err(SamError::Execute),
                "edit" => {
                    ctx.emit.info("edit");
                    Ok(())
                }
                "quit" => {
                    ctx.emit.info("quit");
                    Ok(())
                }
                "unsupported-window-command" => Err(SamError::Execute),
                _ => Err(SamError::Execute),
            }
        }
    }
}

/// Drive `x`/`y` (`invert_y == true` for `y`): find every match of `re`
/// within `range`, apply the count window, and run `sub` with each
/// match (or, for `y`, each unmatched gap) installed as a fresh
/// selection and the current "dot". Matches are gathered up front into
/// an owned `Vec` before any sub-command runs, so a destructive
/// sub-command disposing or creating selections never perturbs the
/// iteration `sam.c`'s `cmd_x`/`cmd_y` loop is mid-way through.
#[allow(clippy::too_many_arguments)]
fn run_extract<T, V, R, P, E>(
    arena: &ParseArena,
    ctx: &mut ExecCtx<T, V, R, P, E>,
    sub: Option<CommandId>,
    regex: Option<&sam_regex::CompiledRegex>,
    count: &Count,
    range: Range,
    selection: SelectionId,
    invert_y: bool,
) -> Result<(), SamError>
where
    T: TextMutate,
    V: View + Marks,
    R: Registers,
    P: ProcessPipe,
    E: EventEmitter,
{
    let Some(re) = regex else { return Err(SamError::Regex) };
    let haystack = ctx.text.bytes(0, ctx.text.size());

    let mut matches = Vec::new();
    let mut pos = range.start;
    while pos <= range.end {
        let Some(caps) = re.captures_forward(&haystack, pos) else { break };
        let m = caps.whole();
        if m.start >= range.end {
            break;
        }
        matches.push((Range::new(m.start, m.end), caps));
        pos = if m.end > m.start { m.end } else { m.end + 1 };
    }

    let windows: Vec<Range> = if invert_y {
        let mut gaps = Vec::new();
        let mut cursor = range.start;
        for (m, _) in &matches {
            if cursor < m.start {
                gaps.push(Range::new(cursor, m.start));
            }
            cursor = m.end;
        }
        if cursor < range.end {
            gaps.push(Range::new(cursor, range.end));
        }
        gaps
    } else {
        matches.iter().map(|(r, _)| *r).collect()
    };

    let total = windows.len() as i32;
    for (idx, win) in windows.into_iter().enumerate() {
        let iteration = idx as i32 + 1;
        if !selected_by_count(count, iteration, total) {
            continue;
        }
        if !invert_y {
            if let Some((_, caps)) = matches.get(idx) {
                for group in 0..sam_regex::MAX_CAPTURES {
                    if let Some(g) = caps.get(group) {
                        ctx.registers.put_range(RegisterId::Capture(group as u8), &haystack, Range::new(g.start, g.end));
                    }
                }
            }
        }
        let child_selection = ctx.view.new_selection(win, false);
        if let Some(s) = sub {
            execute_node(s, arena, ctx, child_selection, win)?;
        } else {
            ctx.view.set_range(selection, win);
        }
    }
    Ok(())
}
