//! Deferred `EQU`: `BUFEND EQU BUFFER+4096` appears before `BUFFER` is
//! defined. Pass 1 cannot resolve it on first sight, defers it, and
//! fixes it up once `BUFFER` is assigned a location — without ever
//! restarting the walk from the top.

use crate::{lexer::tokenize, pass1};

#[test]
fn forward_reference_in_equ_resolves_after_its_dependency_is_defined() {
    let source = "A START 0\nBUFEND EQU BUFFER+4096\nBUFFER RESB 4096\n END A\n";
    let lines = tokenize(source);
    let result = pass1::run(&lines);

    assert!(result.success, "{:?}", result.diagnostics);
    assert_eq!(result.symtab["BUFFER"], 0);
    assert_eq!(result.symtab["BUFEND"], 4096);
}

#[test]
fn equ_still_unresolvable_at_the_fixed_point_is_an_error() {
    let source = "A START 0\nX EQU MISSING\n END A\n";
    let lines = tokenize(source);
    let result = pass1::run(&lines);

    assert!(!result.success);
    assert!(result.diagnostics.errors().count() >= 1);
}
