//! Object-program generator: packs Pass 1/Pass 2 results into the
//! classic H/T/M/E object-record text format.

use crate::error::Diagnostics;
use crate::pass1::Pass1Result;
use crate::pass2::{EffectiveFormat, Pass2Result};
use crate::tables::{lookup_directive, Directive};

const TEXT_RECORD_MAX_BYTES: usize = 30;

#[derive(Clone, Debug, Default)]
pub struct ObjectProgram {
    pub header: String,
    pub text_records: Vec<String>,
    pub modification_records: Vec<String>,
    pub end_record: String,
}

impl ObjectProgram {
    /// The ordered raw form: header, text records, modification records,
    /// end record, one per line.
    pub fn to_text(&self) -> String {
        let mut lines = Vec::with_capacity(2 + self.text_records.len() + self.modification_records.len());
        lines.push(self.header.clone());
        lines.extend(self.text_records.iter().cloned());
        lines.extend(self.modification_records.iter().cloned());
        lines.push(self.end_record.clone());
        lines.join("\n")
    }
}

struct OpenRecord {
    start: u32,
    bytes: Vec<u8>,
}

impl OpenRecord {
    fn to_record(&self) -> String {
        let hex: String = self.bytes.iter().map(|b| format!("{:02X}", b)).collect();
        format!("T^{:06X}^{:02X}^{}", self.start, self.bytes.len(), hex)
    }
}

/// Builds the object program from a completed Pass 1/Pass 2 run. Assumes
/// both passes already succeeded; callers should check `success` first.
pub fn generate(pass1: &Pass1Result, pass2: &Pass2Result) -> (ObjectProgram, Diagnostics) {
    let diagnostics = Diagnostics::new();

    let header = format!(
        "H^{:<6}^{:06X}^{:06X}",
        truncate_pad(&pass1.program_name, 6),
        pass1.start_address,
        pass1.program_length
    );

    let mut text_records = Vec::new();
    let mut open: Option<OpenRecord> = None;

    for (intermediate, entry) in pass1.intermediate.iter().zip(pass2.entries.iter()) {
        let code = match &entry.object_code {
            Some(code) => code,
            None => {
                if let Some(record) = open.take() {
                    text_records.push(record.to_record());
                }
                continue;
            }
        };
        let bytes = hex_to_bytes(code);
        let location = intermediate.locctr.unwrap_or(0);

        match &mut open {
            None => {
                open = Some(OpenRecord {
                    start: location,
                    bytes,
                });
            }
            Some(record) => {
                if record.bytes.len() + bytes.len() > TEXT_RECORD_MAX_BYTES {
                    text_records.push(record.to_record());
                    open = Some(OpenRecord {
                        start: location,
                        bytes,
                    });
                } else {
                    record.bytes.extend(bytes);
                }
            }
        }
    }
    if let Some(record) = open.take() {
        text_records.push(record.to_record());
    }

    let program_name = truncate_pad(&pass1.program_name, 6);
    let modification_records: Vec<String> = pass1
        .intermediate
        .iter()
        .zip(pass2.entries.iter())
        .filter(|(_, entry)| entry.needs_modification && entry.format == EffectiveFormat::Four)
        .map(|(intermediate, _)| {
            let location = intermediate.locctr.unwrap_or(0) + 1;
            format!("M^{:06X}^05^+{}", location, program_name)
        })
        .collect();

    let end_target = end_operand_address(pass1).unwrap_or(pass1.start_address);
    let end_record = format!("E^{:06X}", end_target);

    log::debug!(
        "object: {} text records, {} modification records packed",
        text_records.len(),
        modification_records.len()
    );

    (
        ObjectProgram {
            header,
            text_records,
            modification_records,
            end_record,
        },
        diagnostics,
    )
}

/// Looks up END's operand symbol in the symbol table, if present.
fn end_operand_address(pass1: &Pass1Result) -> Option<u32> {
    for entry in &pass1.intermediate {
        let opcode = entry.line.opcode.as_deref()?;
        if lookup_directive(opcode) == Some(Directive::End) {
            let operand = entry.line.operand.as_deref()?;
            return pass1.symtab.get(&operand.to_uppercase()).copied();
        }
    }
    None
}

fn truncate_pad(name: &str, width: usize) -> String {
    let mut padded = name.to_string();
    padded.truncate(width);
    while padded.len() < width {
        padded.push(' ');
    }
    padded
}

fn hex_to_bytes(hex: &str) -> Vec<u8> {
    hex.as_bytes()
        .chunks(2)
        .filter_map(|pair| {
            let s = std::str::from_utf8(pair).ok()?;
            u8::from_str_radix(s, 16).ok()
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{lexer::tokenize, pass1, pass2};

    fn assemble(source: &str) -> (Pass1Result, Pass2Result) {
        let lines = tokenize(source);
        let p1 = pass1::run(&lines);
        assert!(p1.success, "{:?}", p1.diagnostics);
        let p2 = pass2::run(&p1);
        assert!(p2.success, "{:?}", p2.diagnostics);
        (p1, p2)
    }

    #[test]
    fn scenario_a_header_and_single_text_record() {
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
        let (p1, p2) = assemble(source);
        let (program, diags) = generate(&p1, &p2);
        assert!(diags.is_empty());
        assert_eq!(program.header, "H^SIMPLE^000000^000015");
        assert_eq!(program.text_records.len(), 1);
        assert_eq!(
            program.text_records[0],
            "T^000000^12^0320091B20090F20094F0000000005000003"
        );
        assert!(program.modification_records.is_empty());
        assert_eq!(program.end_record, "E^000000");
    }

    #[test]
    fn format4_emits_modification_record() {
        let source = "COPY START 0\nRDREC EQU *\n +JSUB RDREC\n END COPY\n";
        let (p1, p2) = assemble(source);
        let (program, _) = generate(&p1, &p2);
        assert_eq!(program.modification_records.len(), 1);
        assert_eq!(program.modification_records[0], "M^000001^05^+COPY  ");
    }

    #[test]
    fn end_operand_resolves_first_executable_address() {
        let source = "A START 0\n LDA X\nLOOP LDA X\nX WORD 1\n END LOOP\n";
        let (p1, p2) = assemble(source);
        let (program, _) = generate(&p1, &p2);
        assert_eq!(program.end_record, format!("E^{:06X}", p1.symtab["LOOP"]));
    }

    #[test]
    fn text_record_splits_past_thirty_bytes() {
        let mut source = String::from("A START 0\n");
        for _ in 0..12 {
            source.push_str(" WORD 1\n");
        }
        source.push_str(" END A\n");
        let (p1, p2) = assemble(&source);
        let (program, _) = generate(&p1, &p2);
        assert_eq!(program.text_records.len(), 2);
        assert_eq!(program.text_records[0].split('^').nth(2).unwrap(), "1E");
        assert_eq!(program.text_records[1].split('^').nth(2).unwrap(), "06");
    }
}
