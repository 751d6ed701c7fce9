//! PC-relative limit: a target at exactly `PC + 2047` stays
//! PC-relative; `PC + 2048` falls back to BASE-relative when BASE
//! covers it, and is a hard error otherwise.

use crate::{lexer::tokenize, pass1, pass2};

#[test]
fn target_at_pc_plus_2047_is_pc_relative() {
    let source = "A START 0\n J TARGET\nFILL RESB 2047\nTARGET WORD 0\n END A\n";
    let lines = tokenize(source);
    let p1 = pass1::run(&lines);
    assert!(p1.success, "{:?}", p1.diagnostics);
    let p2 = pass2::run(&p1);
    assert!(p2.success, "{:?}", p2.diagnostics);

    let j = &p2.entries[1];
    assert_eq!(j.displacement, Some(0x7FF));
    assert_eq!(j.flags.p, 1);
    assert_eq!(j.flags.b, 0);
}

#[test]
fn target_at_pc_plus_2048_falls_back_to_base_when_covered() {
    let source = "A START 0\n BASE TARGET\n J TARGET\nFILL RESB 2048\nTARGET WORD 0\n END A\n";
    let lines = tokenize(source);
    let p1 = pass1::run(&lines);
    assert!(p1.success, "{:?}", p1.diagnostics);
    let p2 = pass2::run(&p1);
    assert!(p2.success, "{:?}", p2.diagnostics);

    let j = &p2.entries[1];
    assert_eq!(j.flags.b, 1);
    assert_eq!(j.flags.p, 0);
    assert_eq!(j.displacement, Some(0));
}

#[test]
fn target_at_pc_plus_2048_without_base_is_out_of_range_error() {
    let source = "A START 0\n J TARGET\nFILL RESB 2048\nTARGET WORD 0\n END A\n";
    let lines = tokenize(source);
    let p1 = pass1::run(&lines);
    assert!(p1.success, "{:?}", p1.diagnostics);
    let p2 = pass2::run(&p1);
    assert!(!p2.success);
    assert!(p2.diagnostics.errors().any(|d| d.message.contains("out of range")));
}
