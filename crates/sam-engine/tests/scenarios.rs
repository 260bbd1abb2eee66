//! End-to-end scenarios run against the real `ropey`-backed text store
//! and view, one command line at a time, mirroring how `sam-cli` drives
//! the engine.

use sam_command::default_registry;
use sam_engine::{run_command_line, CollectingEmitter, NullProcessPipe};
use sam_error::SamError;
use sam_registers::InMemoryRegisters;
use sam_text_mem::{InMemoryView, RopeText};

fn run(initial: &str, command: &str) -> (String, SamError) {
    let reg = default_registry();
    let mut text = RopeText::from_str(initial);
    let mut view = InMemoryView::with_initial_selection();
    let mut registers = InMemoryRegisters::new();
    let mut pipe = NullProcessPipe;
    let mut emit = CollectingEmitter::default();
    let (err, _) =
        run_command_line(command.as_bytes(), &reg, &mut text, &mut view, &mut registers, &mut pipe, &mut emit);
    (text.as_string(), err)
}

#[test]
fn change_every_word_to_x() {
    let (result, err) = run("one two three\n", ",x/\\w+/ c/X/");
    assert_eq!(err, SamError::Ok);
    assert_eq!(result, "X X X\n");
}

#[test]
fn extract_then_print_selects_each_word() {
    let reg = default_registry();
    let mut text = RopeText::from_str("one two three\n");
    let mut view = InMemoryView::with_initial_selection();
    let mut registers = InMemoryRegisters::new();
    let mut pipe = NullProcessPipe;
    let mut emit = CollectingEmitter::default();

    let (err, _) = run_command_line(
        b",x/\\w+/ p",
        &reg,
        &mut text,
        &mut view,
        &mut registers,
        &mut pipe,
        &mut emit,
    );
    assert_eq!(err, SamError::Ok);

    let buf = text.as_string();
    let mut words: Vec<String> = view
        .selection_ids()
        .into_iter()
        .filter_map(|id| view.range(id))
        .filter(|r| r.start < r.end)
        .map(|r| buf[r.start..r.end].to_string())
        .collect();
    words.sort();
    assert_eq!(words, vec!["one".to_string(), "three".to_string(), "two".to_string()]);
}

#[test]
fn line_by_line_guard_deletes_the_matching_line() {
    let (result, err) = run("one\ntwo\nthree\n", ",x/.+\\n/ g/two/ d");
    assert_eq!(err, SamError::Ok);
    assert_eq!(result, "one\nthree\n");
}

#[test]
fn bare_comma_address_deletes_the_whole_buffer() {
    let (result, err) = run("one two three\n", ",d");
    assert_eq!(err, SamError::Ok);
    assert_eq!(result, "");
}

#[test]
fn numeric_line_range_delete_leaves_the_tail() {
    let (result, err) = run("a\nb\nc\n", "1,2d");
    assert_eq!(err, SamError::Ok);
    assert_eq!(result, "c\n");
}

#[test]
fn two_disjoint_extract_passes_in_one_group_do_not_conflict() {
    let (result, err) = run("one two three\n", ",{ x/o/ c/0/\n x/e/ c/3/ }");
    assert_eq!(err, SamError::Ok);
    assert_eq!(result, "0n3 tw0 thr33\n");
}

#[test]
fn overlapping_passes_in_one_group_report_conflict_and_leave_buffer_untouched() {
    let initial = "one two three\n";
    let (result, err) = run(initial, "{ x/\\w+/ d\n x/o/ c/0/ }");
    assert_eq!(err, SamError::Conflict);
    assert_eq!(result, initial);
}

#[test]
fn change_body_expands_ampersand_to_whole_match() {
    let (result, err) = run("ab\n", ",x/\\w+/ c/[&]/");
    assert_eq!(err, SamError::Ok);
    assert_eq!(result, "[ab]\n");
}

#[test]
fn change_with_backreferences_swaps_captured_groups() {
    let (result, err) = run("key=value\n", ",x/(\\w+)=(\\w+)/ c/\\2=\\1/");
    assert_eq!(err, SamError::Ok);
    assert_eq!(result, "value=key\n");
}

#[test]
fn counted_guard_fires_only_on_its_nth_invocation() {
    let (result, err) = run("bar foo bar foo\n", ",x/\\w+/ g2/foo/ d");
    assert_eq!(err, SamError::Ok);
    assert_eq!(result, "bar  bar foo\n");
}
