//! Pass 2: addressing-mode resolution, displacement selection, and
//! object-code emission.

use crate::error::{Diagnostic, Diagnostics, Phase};
use crate::expr::evaluate;
use crate::lexer::{extract_byte_constant, AddressingPrefix};
use crate::pass1::{IntermediateEntry, Pass1Result};
use crate::tables::{lookup_directive, lookup_op, lookup_register, Directive, Format};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EffectiveFormat {
    None,
    One,
    Two,
    Three,
    Four,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AddressingMode {
    Simple,
    Immediate,
    Indirect,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DisplacementMode {
    None,
    Pc,
    Base,
    Direct,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Nixbpe {
    pub n: u8,
    pub i: u8,
    pub x: u8,
    pub b: u8,
    pub p: u8,
    pub e: u8,
}

#[derive(Clone, Debug)]
pub struct Pass2Entry {
    pub index: usize,
    pub format: EffectiveFormat,
    pub flags: Nixbpe,
    pub target_address: Option<u32>,
    pub displacement: Option<u32>,
    pub displacement_mode: DisplacementMode,
    pub addressing_mode: Option<AddressingMode>,
    pub object_code: Option<String>,
    pub needs_modification: bool,
}

impl Pass2Entry {
    fn blank(index: usize) -> Pass2Entry {
        Pass2Entry {
            index,
            format: EffectiveFormat::None,
            flags: Nixbpe::default(),
            target_address: None,
            displacement: None,
            displacement_mode: DisplacementMode::None,
            addressing_mode: None,
            object_code: None,
            needs_modification: false,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Pass2Result {
    pub entries: Vec<Pass2Entry>,
    pub diagnostics: Diagnostics,
    pub success: bool,
}

pub fn run(pass1: &Pass1Result) -> Pass2Result {
    let mut entries = Vec::with_capacity(pass1.intermediate.len());
    let mut diagnostics = Diagnostics::new();
    let mut base_register: Option<u32> = None;

    for entry in &pass1.intermediate {
        let result = process_entry(entry, pass1, &mut base_register, &mut diagnostics);
        entries.push(result);
    }

    let success = !diagnostics.has_errors();
    log::debug!("pass2: {} entries processed, success={}", entries.len(), success);
    Pass2Result {
        entries,
        diagnostics,
        success,
    }
}

fn process_entry(
    entry: &IntermediateEntry,
    pass1: &Pass1Result,
    base_register: &mut Option<u32>,
    diagnostics: &mut Diagnostics,
) -> Pass2Entry {
    let line = &entry.line;
    let mut out = Pass2Entry::blank(entry.index);

    if line.is_empty || line.is_comment {
        return out;
    }

    let opcode = match &line.opcode {
        Some(o) => o.clone(),
        None => return out,
    };

    if let Some(directive) = lookup_directive(&opcode) {
        match directive {
            Directive::Base => {
                let value = line.operand.as_deref().and_then(|op| resolve_base_operand(op, &pass1.symtab));
                match value {
                    Some(v) => *base_register = Some(v),
                    None => diagnostics.push(
                        Diagnostic::error(Phase::Pass2, Some(line.line_number), "undefined symbol for BASE")
                            .with_excerpt(&line.raw),
                    ),
                }
            }
            Directive::Nobase => *base_register = None,
            Directive::Byte => {
                out.format = EffectiveFormat::None;
                out.object_code = line.operand.as_deref().and_then(emit_byte_constant);
            }
            Directive::Word => {
                let locctr = entry.locctr.unwrap_or(0);
                if let Some(op) = &line.operand {
                    match evaluate(op, &pass1.symtab, locctr) {
                        Some(value) => {
                            out.object_code = Some(format_word(value));
                            // A plain symbol reference (no arithmetic) needs
                            // relocation; an expression or a bare numeric
                            // literal does not. Symbol table membership
                            // alone decides this — a label can never itself
                            // be a numeral, so there's no ambiguity to break
                            // a tie on (matches resolve_base_operand).
                            out.needs_modification = pass1.symtab.contains_key(&op.trim().to_uppercase());
                        }
                        None => diagnostics.push(
                            Diagnostic::error(Phase::Pass2, Some(line.line_number), "undefined symbol in WORD operand")
                                .with_excerpt(&line.raw),
                        ),
                    }
                }
            }
            _ => {}
        }
        return out;
    }

    let op_entry = match lookup_op(&opcode) {
        Some(e) => e,
        None => {
            diagnostics.push(Diagnostic::error(
                Phase::Pass2,
                Some(line.line_number),
                format!("unknown opcode \"{}\"", opcode),
            ));
            return out;
        }
    };

    let effective_format = match (op_entry.format, line.extended) {
        (Format::One, _) => EffectiveFormat::One,
        (Format::Two, _) => EffectiveFormat::Two,
        (Format::Three, false) => EffectiveFormat::Three,
        (Format::Three, true) => EffectiveFormat::Four,
    };
    out.format = effective_format;

    match effective_format {
        EffectiveFormat::One => {
            out.object_code = Some(format!("{:02X}", op_entry.opcode));
        }
        EffectiveFormat::Two => {
            emit_format2(&opcode, line, &mut out, diagnostics);
        }
        EffectiveFormat::Three => {
            emit_format3(op_entry.opcode, entry, pass1, *base_register, &mut out, diagnostics);
        }
        EffectiveFormat::Four => {
            emit_format4(op_entry.opcode, entry, pass1, &mut out, diagnostics);
        }
        EffectiveFormat::None => {}
    }

    out
}

fn emit_byte_constant(operand: &str) -> Option<String> {
    let (tag, inner) = extract_byte_constant(operand)?;
    match tag {
        'C' => Some(inner.bytes().map(|b| format!("{:02X}", b)).collect()),
        'X' => Some(inner.to_uppercase()),
        _ => None,
    }
}

fn format_word(value: i64) -> String {
    let bits = (value as i64) & 0xFF_FFFF;
    format!("{:06X}", bits)
}

fn emit_format2(mnemonic: &str, line: &crate::lexer::TokenLine, out: &mut Pass2Entry, diagnostics: &mut Diagnostics) {
    let operand = match &line.operand {
        Some(o) => o,
        None => {
            diagnostics.push(Diagnostic::error(
                Phase::Pass2,
                Some(line.line_number),
                format!("{} requires operands", mnemonic),
            ));
            return;
        }
    };
    let parts: Vec<&str> = operand.split(',').map(str::trim).collect();

    let resolve = |part: &str, as_count: bool| -> Option<u8> {
        if let Some(code) = lookup_register(part) {
            return Some(code);
        }
        if as_count {
            return part.parse::<u32>().ok().map(|n| (n.wrapping_sub(1) & 0x0F) as u8);
        }
        part.parse::<u32>().ok().map(|n| (n & 0x0F) as u8)
    };

    let (r1, r2) = match mnemonic {
        "SVC" => (parts.first().and_then(|p| resolve(p, false)).unwrap_or(0), 0u8),
        "CLEAR" | "TIXR" => (parts.first().and_then(|p| resolve(p, false)).unwrap_or(0), 0u8),
        "SHIFTL" | "SHIFTR" => (
            parts.first().and_then(|p| resolve(p, false)).unwrap_or(0),
            parts.get(1).and_then(|p| resolve(p, true)).unwrap_or(0),
        ),
        _ => (
            parts.first().and_then(|p| resolve(p, false)).unwrap_or(0),
            parts.get(1).and_then(|p| resolve(p, false)).unwrap_or(0),
        ),
    };

    let opcode = lookup_op(mnemonic).unwrap().opcode;
    out.object_code = Some(format!("{:02X}{:01X}{:01X}", opcode, r1, r2));
}

fn emit_format3(
    opcode: u8,
    entry: &IntermediateEntry,
    pass1: &Pass1Result,
    base_register: Option<u32>,
    out: &mut Pass2Entry,
    diagnostics: &mut Diagnostics,
) {
    let line = &entry.line;
    let locctr = entry.locctr.unwrap_or(0);
    let pc = locctr + 3;

    let (flags, mode, target) = resolve_addressing(line, &pass1.symtab, locctr);
    out.flags = flags;
    out.addressing_mode = Some(mode);

    // RSUB and other no-operand instructions.
    if line.operand.is_none() {
        out.flags.b = 0;
        out.flags.p = 0;
        out.displacement = Some(0);
        out.displacement_mode = DisplacementMode::None;
        out.object_code = Some(pack_format3(opcode, &out.flags, 0));
        return;
    }

    let pure_literal = if mode == AddressingMode::Immediate {
        pure_numeric_literal(&operand_body(line), &pass1.symtab)
    } else {
        None
    };

    if let Some(value) = pure_literal {
        out.flags.b = 0;
        out.flags.p = 0;
        out.displacement = Some((value as u32) & 0x0FFF);
        out.displacement_mode = DisplacementMode::Direct;
        out.object_code = Some(pack_format3(opcode, &out.flags, out.displacement.unwrap()));
        return;
    }

    match target {
        Some(address) => {
            out.target_address = Some(address);
            match select_displacement(address, pc, base_register) {
                Ok((disp, b, p, dmode)) => {
                    out.flags.b = b;
                    out.flags.p = p;
                    out.displacement = Some(disp);
                    out.displacement_mode = dmode;
                    out.object_code = Some(pack_format3(opcode, &out.flags, disp));
                }
                Err(()) => diagnostics.push(
                    Diagnostic::error(
                        Phase::Pass2,
                        Some(line.line_number),
                        "displacement out of range for format-3 instruction",
                    )
                    .with_excerpt(&line.raw)
                    .with_hint("use the extended '+' form to force format 4"),
                ),
            }
        }
        None => diagnostics.push(
            Diagnostic::error(
                Phase::Pass2,
                Some(line.line_number),
                "undefined symbol in operand",
            )
            .with_excerpt(&line.raw),
        ),
    }
}

fn emit_format4(
    opcode: u8,
    entry: &IntermediateEntry,
    pass1: &Pass1Result,
    out: &mut Pass2Entry,
    diagnostics: &mut Diagnostics,
) {
    let line = &entry.line;
    let locctr = entry.locctr.unwrap_or(0);

    let (flags, mode, target) = resolve_addressing(line, &pass1.symtab, locctr);
    out.flags = flags;
    out.flags.e = 1;
    out.flags.b = 0;
    out.flags.p = 0;
    out.addressing_mode = Some(mode);

    if line.operand.is_none() {
        out.displacement = Some(0);
        out.object_code = Some(pack_format4(opcode, &out.flags, 0));
        return;
    }

    let operand_text = operand_body(line);
    let pure_literal = if mode == AddressingMode::Immediate {
        pure_numeric_literal(&operand_text, &pass1.symtab)
    } else {
        None
    };

    let address: u32 = if let Some(value) = pure_literal {
        value as u32 & 0xF_FFFF
    } else {
        match target {
            Some(addr) => {
                out.target_address = Some(addr);
                // Both sub-paths below can set needs_modification; they
                // overlap for a plain simple-addressed symbol and both
                // are preserved.
                if flags.n == 1 && flags.i == 1 {
                    out.needs_modification = true;
                }
                if mode == AddressingMode::Immediate {
                    out.needs_modification = true;
                }
                addr & 0xF_FFFF
            }
            None => {
                diagnostics.push(
                    Diagnostic::error(Phase::Pass2, Some(line.line_number), "undefined symbol in operand")
                        .with_excerpt(&line.raw),
                );
                0
            }
        }
    };

    out.displacement = Some(address);
    out.object_code = Some(pack_format4(opcode, &out.flags, address));
}

/// The operand text with any addressing prefix already stripped by the
/// lexer (the lexer records the prefix separately in
/// `addressing_prefix`, so `line.operand` is already "clean").
fn operand_body(line: &crate::lexer::TokenLine) -> String {
    line.operand.clone().unwrap_or_default()
}

/// BASE's operand is resolved symbol-table-first, numeric-fallback —
/// the reverse priority from the general expression evaluator — so a
/// label that happens to look like a hex literal (e.g. `DEAD`, `CAFE`)
/// still resolves to its address rather than being misread as a number.
/// The numeric fallback is decimal-first like every non-START context;
/// only START's own address operand reads bare digits as hex.
fn resolve_base_operand(operand: &str, symtab: &crate::pass1::SymbolTable) -> Option<u32> {
    if let Some(&value) = symtab.get(&operand.trim().to_uppercase()) {
        return Some(value);
    }
    crate::lexer::parse_numeric_decimal(operand.trim()).map(|v| v as u32)
}

/// Distinguishes a pure numeric literal from a symbol reference for
/// Format-3/4 immediate-operand addressing: the symbol table is
/// checked first, so a label spelled entirely with hex digits/letters
/// (`DEAD`, `BEEF`, `CAFE`) is resolved through the symbol table rather
/// than misread as a raw numeral. Returns `None` for anything that
/// isn't a bare literal, including symbols, leaving addressing
/// resolution to fall through to the symbol/target-address path.
fn pure_numeric_literal(operand: &str, symtab: &crate::pass1::SymbolTable) -> Option<i64> {
    if symtab.contains_key(&operand.trim().to_uppercase()) {
        return None;
    }
    crate::lexer::parse_numeric_decimal(operand.trim())
}

fn resolve_addressing(
    line: &crate::lexer::TokenLine,
    symtab: &crate::pass1::SymbolTable,
    locctr: u32,
) -> (Nixbpe, AddressingMode, Option<u32>) {
    let mut flags = Nixbpe {
        n: 1,
        i: 1,
        x: if line.indexed { 1 } else { 0 },
        b: 0,
        p: 0,
        e: 0,
    };

    let mode = match line.addressing_prefix {
        AddressingPrefix::Immediate => {
            flags.n = 0;
            flags.i = 1;
            AddressingMode::Immediate
        }
        AddressingPrefix::Indirect => {
            flags.n = 1;
            flags.i = 0;
            AddressingMode::Indirect
        }
        AddressingPrefix::None => AddressingMode::Simple,
    };

    let target = match &line.operand {
        Some(operand) => evaluate(operand, symtab, locctr).map(|v| v as u32),
        None => None,
    };

    (flags, mode, target)
}

fn pack_format3(opcode: u8, flags: &Nixbpe, disp: u32) -> String {
    let byte1 = (opcode & 0xFC) | (flags.n << 1) | flags.i;
    let byte2 = (flags.x << 7) | (flags.b << 6) | (flags.p << 5) | (flags.e << 4) | (((disp >> 8) & 0x0F) as u8);
    let byte3 = (disp & 0xFF) as u8;
    format!("{:02X}{:02X}{:02X}", byte1, byte2, byte3)
}

fn pack_format4(opcode: u8, flags: &Nixbpe, address: u32) -> String {
    let byte1 = (opcode & 0xFC) | (flags.n << 1) | flags.i;
    let byte2 = (flags.x << 7) | (flags.b << 6) | (flags.p << 5) | (flags.e << 4) | (((address >> 16) & 0x0F) as u8);
    let byte3 = ((address >> 8) & 0xFF) as u8;
    let byte4 = (address & 0xFF) as u8;
    format!("{:02X}{:02X}{:02X}{:02X}", byte1, byte2, byte3, byte4)
}

/// Displacement selection: prefer PC-relative, fall back to
/// BASE-relative, else an out-of-range error.
fn select_displacement(
    target: u32,
    pc: u32,
    base: Option<u32>,
) -> Result<(u32, u8, u8, DisplacementMode), ()> {
    let disp_pc = target as i64 - pc as i64;
    if (-2048..=2047).contains(&disp_pc) {
        return Ok(((disp_pc & 0x0FFF) as u32, 0, 1, DisplacementMode::Pc));
    }
    if let Some(base) = base {
        let disp_base = target as i64 - base as i64;
        if (0..=4095).contains(&disp_base) {
            return Ok((disp_base as u32, 1, 0, DisplacementMode::Base));
        }
    }
    Err(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lexer::tokenize;
    use crate::pass1;

    fn run_pipeline(source: &str) -> Pass2Result {
        let lines = tokenize(source);
        let p1 = pass1::run(&lines);
        assert!(p1.success, "{:?}", p1.diagnostics);
        run(&p1)
    }

    #[test]
    fn scenario_a_simple_straight_line() {
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
        let result = run_pipeline(source);
        assert!(result.success, "{:?}", result.diagnostics);
        let codes: Vec<_> = result
            .entries
            .iter()
            .filter_map(|e| e.object_code.clone())
            .collect();
        assert_eq!(codes[0], "032009");
        assert_eq!(codes[1], "1B2009");
        assert_eq!(codes[2], "0F2009");
        assert_eq!(codes[3], "4F0000");
        assert_eq!(codes[4], "000005");
        assert_eq!(codes[5], "000003");
    }

    #[test]
    fn scenario_e_immediate_literal_vs_symbol() {
        let source = "A START 0\nLENGTH EQU 100\n LDA #100\n LDA #LENGTH\n END A\n";
        let result = run_pipeline(source);
        assert!(result.success, "{:?}", result.diagnostics);
        let lit = &result.entries[2];
        assert_eq!(lit.flags.n, 0);
        assert_eq!(lit.flags.i, 1);
        assert_eq!(lit.displacement, Some(0x064));
        assert_eq!(lit.flags.b, 0);
        assert_eq!(lit.flags.p, 0);

        let sym = &result.entries[3];
        assert_eq!(sym.flags.n, 0);
        assert_eq!(sym.flags.i, 1);
        assert!(sym.flags.p == 1 || sym.flags.b == 1);
    }

    #[test]
    fn format4_relocation_needs_modification() {
        let source = "COPY START 0\nRDREC EQU *\n +JSUB RDREC\n END COPY\n";
        let result = run_pipeline(source);
        assert!(result.success, "{:?}", result.diagnostics);
        let jsub = &result.entries[2];
        assert_eq!(jsub.format, EffectiveFormat::Four);
        assert!(jsub.needs_modification);
        assert_eq!(jsub.flags.e, 1);
    }

    #[test]
    fn nixbpe_consistency_across_modes() {
        let source = "A START 0\n LDA #5\n LDA @5\n LDA 5\n END A\n";
        let result = run_pipeline(source);
        for entry in &result.entries[1..4] {
            assert!(!(entry.flags.b == 1 && entry.flags.p == 1));
        }
        let imm = &result.entries[1];
        assert_eq!((imm.flags.n, imm.flags.i), (0, 1));
        let ind = &result.entries[2];
        assert_eq!((ind.flags.n, ind.flags.i), (1, 0));
        let simple = &result.entries[3];
        assert_eq!((simple.flags.n, simple.flags.i), (1, 1));
    }

    #[test]
    fn base_prefers_symbol_over_hex_looking_name() {
        // DEAD is a valid label and also a valid bare-hex literal
        // (0xDEAD); BASE must resolve it as the symbol's address (20),
        // not as the number 0xDEAD. The target is far enough from PC
        // that only a correctly-resolved BASE brings it in range.
        let source = "A START 0\nDEAD EQU 20\n BASE DEAD\n STA TARGET\n RESB 3000\nTARGET RESW 1\n END A\n";
        let result = run_pipeline(source);
        assert!(result.success, "{:?}", result.diagnostics);
        let sta = &result.entries[3];
        assert_eq!(sta.flags.b, 1);
        assert_eq!(sta.flags.p, 0);
        assert_eq!(sta.displacement, Some(3003 - 20));
    }
}
