//! Pass 1: symbol resolution and location-counter assignment.

use crate::error::{Diagnostic, Diagnostics, Phase};
use crate::expr::evaluate;
use crate::lexer::{parse_numeric, TokenLine};
use crate::tables::{lookup_directive, lookup_op, Directive, Format};
use std::collections::HashMap;

pub type SymbolTable = HashMap<String, u32>;

/// A tokenized line annotated with the address it starts at (if any)
/// and its size in bytes. `format` records the resolved base format
/// for instruction lines so Pass 2 does not need to re-look-up the
/// mnemonic. A per-line symbol table snapshot is deliberately elided
/// here; nothing downstream in this crate needs it.
#[derive(Clone, Debug)]
pub struct IntermediateEntry {
    pub index: usize,
    pub line: TokenLine,
    pub locctr: Option<u32>,
    pub size: u32,
    pub format: Option<Format>,
}

#[derive(Clone, Debug, Default)]
pub struct Pass1Result {
    pub intermediate: Vec<IntermediateEntry>,
    pub symtab: SymbolTable,
    pub program_name: String,
    pub start_address: u32,
    pub program_length: u32,
    pub diagnostics: Diagnostics,
    pub success: bool,
}

struct DeferredEqu {
    label: String,
    operand: String,
    locctr: u32,
    entry_index: usize,
    line_number: u32,
}

pub fn run(lines: &[TokenLine]) -> Pass1Result {
    let mut symtab = SymbolTable::new();
    let mut intermediate = Vec::with_capacity(lines.len());
    let mut diagnostics = Diagnostics::new();
    let mut deferred: Vec<DeferredEqu> = Vec::new();

    let mut locctr: u32 = 0;
    let mut start_address: u32 = 0;
    let mut program_name = String::from("PROG");
    let mut found_start = false;
    let mut found_end = false;
    let mut first_nonempty_seen = false;

    for (idx, line) in lines.iter().enumerate() {
        if found_end {
            // Lines after END are recorded with no location.
            intermediate.push(IntermediateEntry {
                index: idx,
                line: line.clone(),
                locctr: None,
                size: 0,
                format: None,
            });
            continue;
        }

        if line.is_empty || line.is_comment {
            intermediate.push(IntermediateEntry {
                index: idx,
                line: line.clone(),
                locctr: None,
                size: 0,
                format: None,
            });
            continue;
        }

        let is_first_nonempty = !first_nonempty_seen;
        first_nonempty_seen = true;

        let opcode = line.opcode.clone().unwrap_or_default();
        let directive = lookup_directive(&opcode);

        if directive == Some(Directive::Start) {
            if found_start {
                diagnostics.push(
                    Diagnostic::error(Phase::Pass1, Some(line.line_number), "duplicate START directive")
                        .with_excerpt(&line.raw),
                );
            } else if !is_first_nonempty {
                diagnostics.push(
                    Diagnostic::error(
                        Phase::Pass1,
                        Some(line.line_number),
                        "START must be the first non-empty line",
                    )
                    .with_excerpt(&line.raw),
                );
            }
            found_start = true;

            let addr = line
                .operand
                .as_deref()
                .and_then(parse_numeric)
                .unwrap_or(0) as u32;
            start_address = addr;
            locctr = addr;
            program_name = line.label.clone().unwrap_or_else(|| "PROG".to_string());

            if let Some(label) = &line.label {
                symtab.insert(label.to_uppercase(), locctr);
            }

            intermediate.push(IntermediateEntry {
                index: idx,
                line: line.clone(),
                locctr: Some(locctr),
                size: 0,
                format: None,
            });
            continue;
        }

        if directive == Some(Directive::End) {
            found_end = true;
            intermediate.push(IntermediateEntry {
                index: idx,
                line: line.clone(),
                locctr: Some(locctr),
                size: 0,
                format: None,
            });
            continue;
        }

        if directive == Some(Directive::Equ) {
            let label = line.label.clone();
            let operand = line.operand.clone();
            match (label, operand) {
                (Some(label), Some(operand)) => {
                    match evaluate(&operand, &symtab, locctr) {
                        Some(value) => {
                            symtab.insert(label.to_uppercase(), value as u32);
                            intermediate.push(IntermediateEntry {
                                index: idx,
                                line: line.clone(),
                                locctr: Some(value as u32),
                                size: 0,
                                format: None,
                            });
                        }
                        None => {
                            deferred.push(DeferredEqu {
                                label: label.to_uppercase(),
                                operand,
                                locctr,
                                entry_index: intermediate.len(),
                                line_number: line.line_number,
                            });
                            intermediate.push(IntermediateEntry {
                                index: idx,
                                line: line.clone(),
                                locctr: None,
                                size: 0,
                                format: None,
                            });
                        }
                    }
                }
                _ => {
                    diagnostics.push(
                        Diagnostic::error(Phase::Pass1, Some(line.line_number), "EQU requires a label and operand")
                            .with_excerpt(&line.raw),
                    );
                    intermediate.push(IntermediateEntry {
                        index: idx,
                        line: line.clone(),
                        locctr: None,
                        size: 0,
                        format: None,
                    });
                }
            }
            continue;
        }

        if directive == Some(Directive::Org) {
            match line.operand.as_deref().and_then(|op| evaluate(op, &symtab, locctr)) {
                Some(value) => locctr = value as u32,
                None => diagnostics.push(
                    Diagnostic::error(Phase::Pass1, Some(line.line_number), "ORG with undefined symbol")
                        .with_excerpt(&line.raw)
                        .with_hint("ensure every symbol in the ORG expression is already defined"),
                ),
            }
            intermediate.push(IntermediateEntry {
                index: idx,
                line: line.clone(),
                locctr: Some(locctr),
                size: 0,
                format: None,
            });
            continue;
        }

        // Other instruction/directive line: assign label, compute size, advance locctr.
        if let Some(label) = &line.label {
            let key = label.to_uppercase();
            if let Some(&existing) = symtab.get(&key) {
                diagnostics.push(
                    Diagnostic::error(
                        Phase::Pass1,
                        Some(line.line_number),
                        format!(
                            "duplicate symbol \"{}\" (previously defined at {:06X})",
                            label, existing
                        ),
                    )
                    .with_excerpt(&line.raw),
                );
            } else {
                symtab.insert(key, locctr);
            }
        }

        let (size, format) = line_size(line, &mut diagnostics);
        let entry_locctr = locctr;
        locctr = locctr.wrapping_add(size);

        intermediate.push(IntermediateEntry {
            index: idx,
            line: line.clone(),
            locctr: Some(entry_locctr),
            size,
            format,
        });
    }

    if !found_end {
        diagnostics.push(Diagnostic::warning(
            Phase::Pass1,
            None,
            "missing END directive",
        ));
    }

    resolve_deferred_equs(&mut deferred, &mut symtab, &mut intermediate, &mut diagnostics);

    let program_length = locctr.wrapping_sub(start_address);

    let success = !diagnostics.has_errors();
    log::debug!(
        "pass1: {} symbols, program length {:#06x}, success={}",
        symtab.len(),
        program_length,
        success
    );
    Pass1Result {
        intermediate,
        symtab,
        program_name,
        start_address,
        program_length,
        diagnostics,
        success,
    }
}

fn resolve_deferred_equs(
    deferred: &mut Vec<DeferredEqu>,
    symtab: &mut SymbolTable,
    intermediate: &mut [IntermediateEntry],
    diagnostics: &mut Diagnostics,
) {
    let cap = deferred.len() + 1;
    for _ in 0..cap {
        if deferred.is_empty() {
            break;
        }
        let mut progressed = false;
        let mut still_deferred = Vec::new();
        for item in deferred.drain(..) {
            match evaluate(&item.operand, symtab, item.locctr) {
                Some(value) => {
                    symtab.insert(item.label.clone(), value as u32);
                    intermediate[item.entry_index].locctr = Some(value as u32);
                    progressed = true;
                }
                None => still_deferred.push(item),
            }
        }
        *deferred = still_deferred;
        if !progressed {
            break;
        }
    }

    for item in deferred.drain(..) {
        diagnostics.push(
            Diagnostic::error(
                Phase::Pass1,
                Some(item.line_number),
                format!(
                    "undefined symbol or circular reference in EQU expression for \"{}\"",
                    item.label
                ),
            )
            .with_operand(item.operand),
        );
    }
}

/// Computes a line's size in bytes, and the resolved format for
/// instruction lines.
fn line_size(line: &TokenLine, diagnostics: &mut Diagnostics) -> (u32, Option<Format>) {
    let opcode = match &line.opcode {
        Some(o) => o,
        None => return (0, None),
    };

    if let Some(directive) = lookup_directive(opcode) {
        return match directive {
            Directive::Byte => {
                let size = line
                    .operand
                    .as_deref()
                    .and_then(crate::lexer::calculate_byte_constant_size)
                    .unwrap_or(0);
                (size, None)
            }
            Directive::Word => (3, None),
            Directive::Resb => {
                let n = line.operand.as_deref().and_then(|s| s.parse::<u32>().ok()).unwrap_or(0);
                (n, None)
            }
            Directive::Resw => {
                let n = line.operand.as_deref().and_then(|s| s.parse::<u32>().ok()).unwrap_or(0);
                (3 * n, None)
            }
            _ => (0, None),
        };
    }

    match lookup_op(opcode) {
        Some(entry) => {
            let size = match entry.format {
                Format::One => 1,
                Format::Two => 2,
                Format::Three => {
                    if line.extended {
                        4
                    } else {
                        3
                    }
                }
            };
            (size, Some(entry.format))
        }
        None => {
            diagnostics.push(Diagnostic::error(
                Phase::Pass1,
                Some(line.line_number),
                format!("unknown opcode \"{}\" in size calculation", opcode),
            ));
            (0, None)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lexer::tokenize;

    #[test]
    fn simple_program_assigns_addresses() {
        let source = "\
SIMPLE  START   0
        LDA     FIVE
        ADD     THREE
        STA     RESULT
        RSUB
FIVE    WORD    5
THREE   WORD    3
RESULT  RESW    1
        END     SIMPLE
";
        let lines = tokenize(source);
        let result = run(&lines);
        assert!(result.success, "{:?}", result.diagnostics);
        assert_eq!(result.symtab["SIMPLE"], 0x0000);
        assert_eq!(result.symtab["FIVE"], 0x000C);
        assert_eq!(result.symtab["THREE"], 0x000F);
        assert_eq!(result.symtab["RESULT"], 0x0012);
        assert_eq!(result.program_length, 0x15);
    }

    #[test]
    fn duplicate_start_is_error() {
        let lines = tokenize("A START 0\nB START 0\n     END A\n");
        let result = run(&lines);
        assert!(!result.success);
    }

    #[test]
    fn duplicate_symbol_reports_prior_address() {
        let source = "A START 0\nLOOP LDA FIVE\nLOOP STA FIVE\nFIVE WORD 5\n END A\n";
        let lines = tokenize(source);
        let result = run(&lines);
        assert!(!result.success);
        assert_eq!(result.diagnostics.errors().count(), 1);
    }

    #[test]
    fn missing_end_is_warning_not_error() {
        let lines = tokenize("A START 0\nB LDA C\nC WORD 1\n");
        let result = run(&lines);
        assert!(result.success);
        assert_eq!(result.diagnostics.warnings().count(), 1);
    }

    #[test]
    fn deferred_equ_resolves_after_dependency_defined() {
        let source = "A START 0\nBUFEND EQU BUFFER+4096\nBUFFER RESB 4096\n END A\n";
        let lines = tokenize(source);
        let result = run(&lines);
        assert!(result.success, "{:?}", result.diagnostics);
        assert_eq!(result.symtab["BUFFER"], 0);
        assert_eq!(result.symtab["BUFEND"], 4096);
    }

    #[test]
    fn unresolvable_equ_after_fixed_point_is_error() {
        let source = "A START 0\nX EQU MISSING\n END A\n";
        let lines = tokenize(source);
        let result = run(&lines);
        assert!(!result.success);
    }

    #[test]
    fn org_with_undefined_symbol_is_error() {
        let source = "A START 0\n ORG MISSING\nB WORD 1\n END A\n";
        let lines = tokenize(source);
        let result = run(&lines);
        assert!(!result.success);
    }
}
