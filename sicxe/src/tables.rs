//! Static, read-only tables: the operation table, the register table,
//! and the directive set. None of these ever change once built, and can
//! be shared freely across any number of concurrent assemblies.

/// Base instruction format. `extended` (the `+` prefix) promotes a
/// format-3 mnemonic to format 4; formats 1 and 2 never carry it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Format {
    One,
    Two,
    Three,
}

/// A row of the operation table: opcode byte (low two bits always
/// zero — Pass 2 fills them from n/i), base format, operand arity.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OpEntry {
    pub opcode: u8,
    pub format: Format,
    pub operands: u8,
}

macro_rules! op_table {
    ($(($mnemonic:literal, $opcode:expr, $format:expr, $operands:expr)),* $(,)?) => {
        /// Looks up a mnemonic (case-sensitive, expected uppercase) in the
        /// operation table.
        pub fn lookup_op(mnemonic: &str) -> Option<OpEntry> {
            match mnemonic {
                $($mnemonic => Some(OpEntry { opcode: $opcode, format: $format, operands: $operands }),)*
                _ => None,
            }
        }

        /// True if `mnemonic` is a recognized instruction (not a directive).
        pub fn is_instruction(mnemonic: &str) -> bool {
            lookup_op(mnemonic).is_some()
        }
    };
}

use Format::*;

op_table! {
    // Format 3 / loadable-as-format-4 instructions.
    ("LDA", 0x00, Three, 1), ("LDX", 0x04, Three, 1), ("LDL", 0x08, Three, 1),
    ("STA", 0x0C, Three, 1), ("STX", 0x10, Three, 1), ("STL", 0x14, Three, 1),
    ("ADD", 0x18, Three, 1), ("SUB", 0x1C, Three, 1), ("MUL", 0x20, Three, 1),
    ("DIV", 0x24, Three, 1), ("COMP", 0x28, Three, 1), ("TIX", 0x2C, Three, 1),
    ("JEQ", 0x30, Three, 1), ("JGT", 0x34, Three, 1), ("JLT", 0x38, Three, 1),
    ("J", 0x3C, Three, 1), ("AND", 0x40, Three, 1), ("OR", 0x44, Three, 1),
    ("JSUB", 0x48, Three, 1), ("RSUB", 0x4C, Three, 0), ("LDCH", 0x50, Three, 1),
    ("STCH", 0x54, Three, 1), ("ADDF", 0x58, Three, 1), ("SUBF", 0x5C, Three, 1),
    ("MULF", 0x60, Three, 1), ("DIVF", 0x64, Three, 1), ("LDB", 0x68, Three, 1),
    ("LDS", 0x6C, Three, 1), ("LDF", 0x70, Three, 1), ("LDT", 0x74, Three, 1),
    ("STB", 0x78, Three, 1), ("STS", 0x7C, Three, 1), ("STF", 0x80, Three, 1),
    ("STT", 0x84, Three, 1), ("COMPF", 0x88, Three, 1), ("LPS", 0xD0, Three, 1),
    ("STI", 0xD4, Three, 1), ("RD", 0xD8, Three, 1), ("WD", 0xDC, Three, 1),
    ("TD", 0xE0, Three, 1), ("STSW", 0xE8, Three, 1), ("SSK", 0xEC, Three, 1),

    // Format 2.
    ("ADDR", 0x90, Two, 2), ("SUBR", 0x94, Two, 2), ("MULR", 0x98, Two, 2),
    ("DIVR", 0x9C, Two, 2), ("COMPR", 0xA0, Two, 2), ("SHIFTL", 0xA4, Two, 2),
    ("SHIFTR", 0xA8, Two, 2), ("RMO", 0xAC, Two, 2), ("SVC", 0xB0, Two, 1),
    ("CLEAR", 0xB4, Two, 1), ("TIXR", 0xB8, Two, 1),

    // Format 1.
    ("FLOAT", 0xC0, One, 0), ("FIX", 0xC4, One, 0), ("NORM", 0xC8, One, 0),
    ("SIO", 0xF0, One, 0), ("HIO", 0xF4, One, 0), ("TIO", 0xF8, One, 0),
}

/// Register name (uppercase) to its 4-bit code.
pub fn lookup_register(name: &str) -> Option<u8> {
    match name {
        "A" => Some(0),
        "X" => Some(1),
        "L" => Some(2),
        "B" => Some(3),
        "S" => Some(4),
        "T" => Some(5),
        "F" => Some(6),
        "PC" => Some(8),
        "SW" => Some(9),
        _ => None,
    }
}

/// The set of directives this assembler understands, including the
/// syntactically-recognized-but-no-op ones (`USE`, `CSECT`, `EXTDEF`,
/// `EXTREF`): these are accepted anywhere a directive is accepted,
/// always contribute zero bytes, and their operand text is not
/// validated: `CSECT`/`EXTDEF`/`EXTREF` are recognized syntactically,
/// not semantically (no multi-CSECT linking).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Directive {
    Start,
    End,
    Byte,
    Word,
    Resb,
    Resw,
    Base,
    Nobase,
    Equ,
    Org,
    Ltorg,
    Use,
    Csect,
    Extdef,
    Extref,
}

impl Directive {
    /// Zero for every directive; callers compute BYTE/WORD/RESB/RESW
    /// sizes separately from their operands, not from this table.
    pub fn base_size(self) -> u32 {
        0
    }

    pub fn is_noop(self) -> bool {
        matches!(
            self,
            Directive::Use | Directive::Csect | Directive::Extdef | Directive::Extref
        )
    }
}

pub fn lookup_directive(name: &str) -> Option<Directive> {
    match name {
        "START" => Some(Directive::Start),
        "END" => Some(Directive::End),
        "BYTE" => Some(Directive::Byte),
        "WORD" => Some(Directive::Word),
        "RESB" => Some(Directive::Resb),
        "RESW" => Some(Directive::Resw),
        "BASE" => Some(Directive::Base),
        "NOBASE" => Some(Directive::Nobase),
        "EQU" => Some(Directive::Equ),
        "ORG" => Some(Directive::Org),
        "LTORG" => Some(Directive::Ltorg),
        "USE" => Some(Directive::Use),
        "CSECT" => Some(Directive::Csect),
        "EXTDEF" => Some(Directive::Extdef),
        "EXTREF" => Some(Directive::Extref),
        _ => None,
    }
}

/// True if `name` (uppercased) is either a known mnemonic or directive.
pub fn is_known_opcode(name: &str) -> bool {
    is_instruction(name) || lookup_directive(name).is_some()
}
