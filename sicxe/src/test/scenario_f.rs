//! Duplicate symbol definition: two lines both labelling `LOOP`
//! produce exactly one error naming the prior address, and Pass 1
//! otherwise keeps walking the remaining lines rather than aborting.

use crate::{lexer::tokenize, pass1};

#[test]
fn duplicate_label_reports_exactly_one_error() {
    let source = "A START 0\nLOOP LDA FIVE\nLOOP STA FIVE\nFIVE WORD 5\n END A\n";
    let lines = tokenize(source);
    let result = pass1::run(&lines);

    assert!(!result.success);
    assert_eq!(result.diagnostics.errors().count(), 1);
    let message = &result.diagnostics.errors().next().unwrap().message;
    assert!(message.contains("LOOP"));
}

#[test]
fn rows_after_the_duplicate_are_still_assigned_addresses() {
    let source = "A START 0\nLOOP LDA FIVE\nLOOP STA FIVE\nFIVE WORD 5\n END A\n";
    let lines = tokenize(source);
    let result = pass1::run(&lines);

    assert_eq!(result.intermediate[3].locctr, Some(0x6));
    assert_eq!(result.symtab["FIVE"], 0x6);
}
