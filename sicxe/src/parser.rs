//! Per-line syntactic validation. Stateless: produces diagnostics only,
//! never transforms the token stream.

use crate::error::{Diagnostic, Diagnostics, Phase};
use crate::lexer::{is_valid_byte_constant, is_valid_decimal, is_valid_label, parse_numeric, TokenLine};
use crate::tables::{lookup_directive, lookup_op, lookup_register, Directive, Format};

fn diag(line: &TokenLine, message: impl Into<String>) -> Diagnostic {
    let mut d = Diagnostic::error(Phase::Parser, Some(line.line_number), message).with_excerpt(&line.raw);
    if let Some(label) = &line.label {
        d = d.with_label(label);
    }
    if let Some(opcode) = &line.opcode {
        d = d.with_opcode(opcode);
    }
    if let Some(operand) = &line.operand {
        d = d.with_operand(operand);
    }
    d
}

fn warn(line: &TokenLine, message: impl Into<String>) -> Diagnostic {
    let mut d = diag(line, message);
    d.severity = crate::error::Severity::Warning;
    d
}

/// Validates every tokenized line, returning the accumulated diagnostics.
pub fn validate(lines: &[TokenLine]) -> Diagnostics {
    let mut diags = Diagnostics::new();
    for line in lines {
        validate_line(line, &mut diags);
    }
    diags
}

fn validate_line(line: &TokenLine, diags: &mut Diagnostics) {
    if line.is_empty || line.is_comment {
        return;
    }

    if let Some(label) = &line.label {
        if !is_valid_label(label) {
            diags.push(diag(line, format!("invalid label syntax: \"{}\"", label)));
        }
    }

    let opcode = match &line.opcode {
        Some(o) => o,
        None => {
            diags.push(diag(line, "missing opcode"));
            return;
        }
    };

    let op_entry = lookup_op(opcode);
    let directive = lookup_directive(opcode);

    if op_entry.is_none() && directive.is_none() {
        diags.push(diag(line, format!("unknown opcode \"{}\"", opcode)));
        return;
    }

    if line.extended {
        match &op_entry {
            Some(entry) if entry.format == Format::Three => {}
            _ => diags.push(diag(
                line,
                "'+' (extended format) is only valid on format-3 instructions",
            )),
        }
    }

    if let (AddressingImmediate, true) = (&line.addressing_prefix, line.indexed) {
        diags.push(diag(line, "immediate addressing cannot be combined with indexing"));
    }

    if let Some(entry) = op_entry {
        if entry.format == Format::Two {
            validate_format2_operands(line, opcode, diags);
        }
        return;
    }

    if let Some(directive) = directive {
        validate_directive(line, directive, diags);
    }
}

// Matches the lexer's `AddressingPrefix::Immediate` variant without a
// glob import, for the `if let` guard above.
use crate::lexer::AddressingPrefix::Immediate as AddressingImmediate;

fn validate_directive(line: &TokenLine, directive: Directive, diags: &mut Diagnostics) {
    match directive {
        Directive::Start => {
            if line.operand.is_none() {
                diags.push(warn(line, "START without an address operand defaults to 0"));
            } else if parse_numeric(line.operand.as_ref().unwrap()).is_none() {
                diags.push(diag(line, "START operand must be a valid address"));
            }
        }
        Directive::Byte => match &line.operand {
            Some(op) if is_valid_byte_constant(op) => {}
            _ => diags.push(diag(line, "BYTE requires a valid C'...' or X'...' constant")),
        },
        Directive::Word => {
            // A symbol operand isn't looked up (or syntax-checked) here —
            // only Pass 1/2 know the symbol table — so any present operand
            // passes; only a missing operand is flagged.
            if line.operand.is_none() {
                diags.push(diag(line, "WORD requires a number or symbol operand"));
            }
        }
        Directive::Resb | Directive::Resw => match &line.operand {
            Some(op) if is_valid_decimal(op) && !op.starts_with('-') => {}
            _ => diags.push(diag(
                line,
                format!("{:?} requires a positive decimal integer operand", directive),
            )),
        },
        Directive::Base => {
            if line.operand.is_none() {
                diags.push(diag(line, "BASE requires an operand"));
            }
        }
        Directive::Nobase | Directive::Ltorg => {
            if line.operand.is_some() {
                diags.push(warn(line, format!("{:?} does not take an operand", directive)));
            }
        }
        Directive::Equ => {
            if line.label.is_none() {
                diags.push(diag(line, "EQU requires a label"));
            }
            if line.operand.is_none() {
                diags.push(diag(line, "EQU requires an operand expression"));
            }
        }
        Directive::Org => {
            if line.operand.is_none() {
                diags.push(diag(line, "ORG requires an operand expression"));
            }
        }
        Directive::End | Directive::Use | Directive::Csect | Directive::Extdef | Directive::Extref => {}
    }
}

fn validate_format2_operands(line: &TokenLine, mnemonic: &str, diags: &mut Diagnostics) {
    let operand = match &line.operand {
        Some(o) => o,
        None => {
            diags.push(diag(line, format!("{} requires operands", mnemonic)));
            return;
        }
    };
    let parts: Vec<&str> = operand.split(',').map(str::trim).collect();

    match mnemonic {
        "SVC" => {
            if parts.len() != 1 || !is_valid_decimal(parts[0]) {
                diags.push(diag(line, "SVC requires a single decimal operand"));
            }
        }
        "CLEAR" | "TIXR" => {
            if parts.len() != 1 || lookup_register(parts[0]).is_none() {
                diags.push(diag(line, format!("{} requires a single register operand", mnemonic)));
            }
        }
        "SHIFTL" | "SHIFTR" => {
            if parts.len() != 2 || lookup_register(parts[0]).is_none() || !is_valid_decimal(parts[1]) {
                diags.push(diag(
                    line,
                    format!("{} requires a register and a decimal count", mnemonic),
                ));
            }
        }
        _ => {
            if parts.is_empty() || parts.len() > 2 || parts.iter().any(|p| lookup_register(p).is_none()) {
                diags.push(diag(line, format!("{} requires 1-2 register operands", mnemonic)));
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lexer::tokenize;

    #[test]
    fn unknown_opcode_reported() {
        let lines = tokenize("        FROB  1,2");
        let diags = validate(&lines);
        assert!(diags.has_errors());
    }

    #[test]
    fn plus_on_format1_is_error() {
        let lines = tokenize("        +FIX");
        let diags = validate(&lines);
        assert!(diags.has_errors());
    }

    #[test]
    fn plus_on_format3_is_ok() {
        let lines = tokenize("       +JSUB  RDREC");
        let diags = validate(&lines);
        assert!(!diags.has_errors());
    }

    #[test]
    fn immediate_with_indexed_forbidden() {
        let lines = tokenize("        LDA   #45,X");
        let diags = validate(&lines);
        assert!(diags.has_errors());
    }

    #[test]
    fn byte_requires_valid_constant() {
        let lines = tokenize("        BYTE  5");
        let diags = validate(&lines);
        assert!(diags.has_errors());
    }

    #[test]
    fn start_missing_operand_is_warning_only() {
        let lines = tokenize("SIMPLE  START");
        let diags = validate(&lines);
        assert!(!diags.has_errors());
        assert_eq!(diags.warnings().count(), 1);
    }

    #[test]
    fn resw_requires_positive_decimal() {
        let lines = tokenize("RESULT  RESW  -1");
        let diags = validate(&lines);
        assert!(diags.has_errors());
    }

    #[test]
    fn clear_requires_single_register() {
        let lines = tokenize("        CLEAR A");
        assert!(!validate(&lines).has_errors());
        let lines = tokenize("        CLEAR 5");
        assert!(validate(&lines).has_errors());
    }

    #[test]
    fn shiftl_requires_register_and_count() {
        let lines = tokenize("        SHIFTL A, 4");
        assert!(!validate(&lines).has_errors());
    }

    #[test]
    fn noop_directives_accept_any_operand() {
        let lines = tokenize("        EXTREF BUFFER, LENGTH");
        assert!(!validate(&lines).has_errors());
    }
}
