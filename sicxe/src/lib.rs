//! A from-scratch two-pass SIC/XE assembler.
//!
//! The pipeline is a strict sequence of pure stages, each taking the
//! previous stage's fully-materialized output and producing its own:
//!
//! ```text
//! tokenize -> validate -> pass1::run -> pass2::run -> object::generate -> loader::load
//! ```
//!
//! [`assemble`] drives `tokenize` through `object::generate` and returns
//! every intermediate stage result bundled into an [`AssembleResult`], so
//! a caller (the CLI, or a test) can inspect any stage without re-running
//! the pipeline. The memory loader is a separate, optional final step
//! (see [`loader::load`]) since it needs a caller-chosen memory size.
//!
//! ## Source language
//!
//! A program is a sequence of lines, each optionally carrying a label, a
//! mnemonic or directive, an operand, and a `.`/`;`-introduced comment.
//! The first non-comment line must be `START`; the last reachable line
//! must be `END`. See [`lexer`] for the exact column rules that decide
//! whether a line's first token is a label or an opcode.
//!
//! ## Supported instruction set
//!
//! All SIC/XE format 1-4 mnemonics ([`tables`]), `BYTE`/`WORD`/`RESB`/
//! `RESW`/`BASE`/`NOBASE`/`EQU`/`ORG`/`LTORG`/`START`/`END`, plus
//! `USE`/`CSECT`/`EXTDEF`/`EXTREF` recognized syntactically as no-ops.
//! Multi-CSECT linking, literal pools, and macros are not implemented.

pub mod error;
pub mod expr;
pub mod lexer;
pub mod loader;
pub mod object;
pub mod parser;
pub mod pass1;
pub mod pass2;
pub mod tables;

#[cfg(test)]
mod test;

use error::Diagnostics;
use lexer::TokenLine;
use object::ObjectProgram;
use pass1::Pass1Result;
use pass2::Pass2Result;

/// Every stage's output from a single `assemble` call.
pub struct AssembleResult {
    pub lines: Vec<TokenLine>,
    pub parse_diagnostics: Diagnostics,
    pub pass1: Pass1Result,
    pub pass2: Option<Pass2Result>,
    pub object: Option<ObjectProgram>,
    pub success: bool,
}

/// Runs the full tokenize -> validate -> Pass 1 -> Pass 2 -> object-program
/// pipeline over `source`. Stops after the first stage that reports an
/// error, leaving later fields `None`; diagnostics from every stage that
/// did run are still present on their respective result (or, for the
/// parser, in `parse_diagnostics`).
pub fn assemble(source: &str) -> AssembleResult {
    let lines = lexer::tokenize(source);
    let parse_diagnostics = parser::validate(&lines);

    if parse_diagnostics.has_errors() {
        return AssembleResult {
            lines,
            parse_diagnostics,
            pass1: Pass1Result::default(),
            pass2: None,
            object: None,
            success: false,
        };
    }

    let pass1_result = pass1::run(&lines);
    if !pass1_result.success {
        return AssembleResult {
            lines,
            parse_diagnostics,
            pass1: pass1_result,
            pass2: None,
            object: None,
            success: false,
        };
    }

    let pass2_result = pass2::run(&pass1_result);
    if !pass2_result.success {
        return AssembleResult {
            lines,
            parse_diagnostics,
            pass1: pass1_result,
            pass2: Some(pass2_result),
            object: None,
            success: false,
        };
    }

    let (object_program, object_diagnostics) = object::generate(&pass1_result, &pass2_result);
    let success = !object_diagnostics.has_errors();

    AssembleResult {
        lines,
        parse_diagnostics,
        pass1: pass1_result,
        pass2: Some(pass2_result),
        object: Some(object_program),
        success,
    }
}
