//! Immediate operand addressing: `LDA #100` is an immediate literal (no
//! memory reference at all — TA is the literal value itself, `b`/`p`
//! both `0`), while `LDA #LENGTH` is an immediate *symbol* reference
//! (TA is `LENGTH`'s address, so it still needs PC- or BASE-relative
//! addressing to reach it).

use crate::{lexer::tokenize, pass1, pass2};

#[test]
fn immediate_literal_has_no_pc_or_base_relative_addressing() {
    let source = "A START 0\nLENGTH EQU 100\n LDA #100\n LDA #LENGTH\n END A\n";
    let lines = tokenize(source);
    let p1 = pass1::run(&lines);
    assert!(p1.success, "{:?}", p1.diagnostics);
    let p2 = pass2::run(&p1);
    assert!(p2.success, "{:?}", p2.diagnostics);

    let literal = &p2.entries[2];
    assert_eq!(literal.flags.n, 0);
    assert_eq!(literal.flags.i, 1);
    assert_eq!(literal.flags.b, 0);
    assert_eq!(literal.flags.p, 0);
    assert_eq!(literal.displacement, Some(0x064));
}

#[test]
fn immediate_symbol_still_needs_pc_or_base_relative_addressing() {
    let source = "A START 0\nLENGTH EQU 100\n LDA #100\n LDA #LENGTH\n END A\n";
    let lines = tokenize(source);
    let p1 = pass1::run(&lines);
    assert!(p1.success, "{:?}", p1.diagnostics);
    let p2 = pass2::run(&p1);
    assert!(p2.success, "{:?}", p2.diagnostics);

    let symbol = &p2.entries[3];
    assert_eq!(symbol.flags.n, 0);
    assert_eq!(symbol.flags.i, 1);
    assert!(symbol.flags.p == 1 || symbol.flags.b == 1);
}
