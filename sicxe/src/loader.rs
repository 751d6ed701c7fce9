//! Memory loader: lays an object program into a zeroed byte image and
//! keeps per-byte metadata (source line, instruction text, label) so a
//! caller can explain any address without re-running the pipeline.

use crate::error::{Diagnostic, Diagnostics, Phase};
use crate::object::ObjectProgram;
use byteorder::{BigEndian, ByteOrder};

/// What kind of content currently occupies a byte.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ByteKind {
    Empty,
    Code,
    Data,
    Reserved,
    Modified,
}

/// Per-byte provenance, attached only to bytes written by a text record.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ByteMeta {
    pub line_number: Option<u32>,
    pub instruction_text: Option<String>,
    pub label: Option<String>,
}

/// A loaded SIC/XE memory image: the byte array plus a parallel metadata
/// array of identical length.
pub struct MemoryImage {
    bytes: Vec<u8>,
    meta: Vec<(ByteKind, ByteMeta)>,
    pub program_start: u32,
    pub program_end: u32,
}

/// One write originating from a single Pass 2 entry, used to build an
/// O(1) byte-to-instruction index for explaining any address in the
/// loaded image.
pub struct InstructionSpan {
    pub start: u32,
    pub end: u32,
    pub line_number: u32,
    pub instruction_text: String,
    pub label: Option<String>,
}

impl MemoryImage {
    /// Allocates a zeroed image of `size` bytes, `program_start`/`end`
    /// recorded but not yet validated against `size`.
    fn new(size: u32, program_start: u32, program_end: u32) -> MemoryImage {
        MemoryImage {
            bytes: vec![0; size as usize],
            meta: vec![(ByteKind::Empty, ByteMeta::default()); size as usize],
            program_start,
            program_end,
        }
    }

    pub fn len(&self) -> u32 {
        self.bytes.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Reads a single byte, or `None` if `address` is out of bounds.
    pub fn read_byte(&self, address: u32) -> Option<u8> {
        self.bytes.get(address as usize).copied()
    }

    /// Reads a 3-byte big-endian word (the SIC/XE word size), or `None`
    /// if the range is out of bounds.
    pub fn read_word(&self, address: u32) -> Option<u32> {
        let slice = self.bytes.get(address as usize..address as usize + 3)?;
        Some(BigEndian::read_u24(slice))
    }

    /// Looks up the metadata tagged at `address`, or `None` if the
    /// address has never been written (or is out of bounds).
    pub fn meta_at(&self, address: u32) -> Option<(ByteKind, &ByteMeta)> {
        let (kind, meta) = self.meta.get(address as usize)?;
        Some((*kind, meta))
    }

    /// A hex/ASCII dump of `[start, start+length)`, sixteen bytes per
    /// line, formatted the way a debugger memory view would be.
    pub fn dump(&self, start: u32, length: u32) -> String {
        let mut out = String::new();
        let mut offset = 0u32;
        while offset < length {
            let row_start = start + offset;
            let row_len = length.saturating_sub(offset).min(16);
            let mut hex = String::new();
            let mut ascii = String::new();
            for i in 0..row_len {
                let b = self.read_byte(row_start + i).unwrap_or(0);
                hex.push_str(&format!("{:02X} ", b));
                let printable = if (0x20..=0x7E).contains(&b) { b as char } else { '.' };
                ascii.push(printable);
            }
            out.push_str(&format!("{:06X}  {:<48}{}\n", row_start, hex, ascii));
            offset += row_len;
        }
        out
    }

    fn set_byte(&mut self, address: u32, value: u8) -> bool {
        match self.bytes.get_mut(address as usize) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    fn tag(&mut self, address: u32, kind: ByteKind, meta: ByteMeta) {
        if let Some(slot) = self.meta.get_mut(address as usize) {
            *slot = (kind, meta);
        }
    }

    fn retag_kind(&mut self, address: u32, kind: ByteKind) {
        if let Some((slot_kind, _)) = self.meta.get_mut(address as usize) {
            *slot_kind = kind;
        }
    }
}

/// Loads `program` into a freshly allocated image of `memory_size` bytes.
/// `spans` supplies the per-instruction metadata used to tag written
/// bytes (built by the caller from the Pass 1/Pass 2 results; see
/// `build_spans`). Out-of-bounds writes from an over-long program are
/// silently dropped rather than treated as an error.
pub fn load(program: &ObjectProgram, spans: &[InstructionSpan], memory_size: u32) -> (MemoryImage, Diagnostics) {
    let mut diagnostics = Diagnostics::new();

    let (program_start, length) = match parse_header(&program.header) {
        Some(pair) => pair,
        None => {
            diagnostics.push(Diagnostic::error(Phase::Loader, None, "malformed header record"));
            return (MemoryImage::new(memory_size, 0, 0), diagnostics);
        }
    };
    let program_end = program_start + length;
    let mut image = MemoryImage::new(memory_size, program_start, program_end);

    for record in &program.text_records {
        match parse_text_record(record) {
            Some((start, bytes)) => {
                for (offset, byte) in bytes.into_iter().enumerate() {
                    let address = start + offset as u32;
                    if !image.set_byte(address, byte) {
                        continue;
                    }
                    if let Some(span) = find_span(spans, address) {
                        image.tag(
                            address,
                            ByteKind::Code,
                            ByteMeta {
                                line_number: Some(span.line_number),
                                instruction_text: Some(span.instruction_text.clone()),
                                label: span.label.clone(),
                            },
                        );
                    } else {
                        image.tag(address, ByteKind::Data, ByteMeta::default());
                    }
                }
            }
            None => diagnostics.push(Diagnostic::error(
                Phase::Loader,
                None,
                format!("malformed text record: \"{}\"", record),
            )),
        }
    }

    for record in &program.modification_records {
        match parse_modification_record(record) {
            Some((address, half_bytes)) => {
                let span_bytes = (half_bytes + 1) / 2;
                for offset in 0..span_bytes {
                    image.retag_kind(address + offset, ByteKind::Modified);
                }
            }
            None => diagnostics.push(Diagnostic::error(
                Phase::Loader,
                None,
                format!("malformed modification record: \"{}\"", record),
            )),
        }
    }

    (image, diagnostics)
}

fn find_span(spans: &[InstructionSpan], address: u32) -> Option<&InstructionSpan> {
    spans.iter().find(|span| address >= span.start && address < span.end)
}

fn parse_header(header: &str) -> Option<(u32, u32)> {
    let mut fields = header.split('^');
    let tag = fields.next()?;
    if tag != "H" {
        return None;
    }
    let _name = fields.next()?;
    let start = u32::from_str_radix(fields.next()?, 16).ok()?;
    let length = u32::from_str_radix(fields.next()?, 16).ok()?;
    Some((start, length))
}

fn parse_text_record(record: &str) -> Option<(u32, Vec<u8>)> {
    let mut fields = record.split('^');
    let tag = fields.next()?;
    if tag != "T" {
        return None;
    }
    let start = u32::from_str_radix(fields.next()?, 16).ok()?;
    let declared_len = usize::from_str_radix(fields.next()?, 16).ok()?;
    let payload = fields.next()?;
    let bytes: Vec<u8> = payload
        .as_bytes()
        .chunks(2)
        .filter_map(|pair| std::str::from_utf8(pair).ok().and_then(|s| u8::from_str_radix(s, 16).ok()))
        .collect();
    if bytes.len() != declared_len {
        return None;
    }
    Some((start, bytes))
}

fn parse_modification_record(record: &str) -> Option<(u32, u32)> {
    let mut fields = record.split('^');
    let tag = fields.next()?;
    if tag != "M" {
        return None;
    }
    let address = u32::from_str_radix(fields.next()?, 16).ok()?;
    let half_bytes = fields.next()?.trim_start_matches('0');
    let half_bytes = if half_bytes.is_empty() { 0 } else { half_bytes.parse().ok()? };
    Some((address, half_bytes))
}

/// Builds the O(1) byte-to-instruction index from a completed pipeline
/// run: each Pass 2 entry with object code maps the address range
/// `[locctr, locctr + size)` to its originating line.
pub fn build_spans(pass1: &crate::pass1::Pass1Result, pass2: &crate::pass2::Pass2Result) -> Vec<InstructionSpan> {
    pass1
        .intermediate
        .iter()
        .zip(pass2.entries.iter())
        .filter_map(|(intermediate, entry)| {
            entry.object_code.as_ref()?;
            let start = intermediate.locctr?;
            let size = (entry.object_code.as_ref()?.len() / 2) as u32;
            Some(InstructionSpan {
                start,
                end: start + size,
                line_number: intermediate.line.line_number,
                instruction_text: intermediate.line.raw.clone(),
                label: intermediate.line.label.clone(),
            })
        })
        .collect()
}
