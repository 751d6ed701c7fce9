//! Line-oriented tokenizer. Never fails: ill-formed constructs flow
//! through as malformed tokens and surface as diagnostics at the
//! parser or Pass 1.

use crate::tables::{is_known_opcode, lookup_op};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AddressingPrefix {
    None,
    Immediate,
    Indirect,
}

/// One tokenized source line, 1-indexed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TokenLine {
    pub line_number: u32,
    pub raw: String,
    pub label: Option<String>,
    pub opcode: Option<String>,
    pub operand: Option<String>,
    pub extended: bool,
    pub indexed: bool,
    pub addressing_prefix: AddressingPrefix,
    pub comment: Option<String>,
    pub is_empty: bool,
    pub is_comment: bool,
}

impl TokenLine {
    fn blank(line_number: u32, raw: &str) -> TokenLine {
        TokenLine {
            line_number,
            raw: raw.to_owned(),
            label: None,
            opcode: None,
            operand: None,
            extended: false,
            indexed: false,
            addressing_prefix: AddressingPrefix::None,
            comment: None,
            is_empty: false,
            is_comment: false,
        }
    }
}

/// Tokenizes a full source string into one [`TokenLine`] per input line.
pub fn tokenize(source: &str) -> Vec<TokenLine> {
    let lines: Vec<TokenLine> = source
        .lines()
        .enumerate()
        .map(|(i, raw)| tokenize_line((i + 1) as u32, raw))
        .collect();
    log::debug!("tokenize: {} lines", lines.len());
    lines
}

fn tokenize_line(line_number: u32, raw: &str) -> TokenLine {
    let trimmed = raw.trim();
    let mut line = TokenLine::blank(line_number, raw);

    if trimmed.is_empty() {
        line.is_empty = true;
        return line;
    }

    if trimmed.starts_with('.') || trimmed.starts_with(';') {
        line.is_comment = true;
        line.comment = Some(trimmed.to_owned());
        return line;
    }

    let (code_part, inline_comment) = split_inline_comment(trimmed);
    if let Some(c) = inline_comment {
        line.comment = Some(c.to_owned());
    }

    let tokens = split_respecting_quotes(code_part);
    if tokens.is_empty() {
        line.is_empty = true;
        return line;
    }

    let starts_with_whitespace = raw.starts_with(char::is_whitespace);
    let first_is_opcode_like = is_known_opcode(&opcode_candidate(&tokens[0]));
    let has_following_opcode = tokens
        .get(1)
        .map(|t| is_known_opcode(&opcode_candidate(t)))
        .unwrap_or(false);

    let label_present = !starts_with_whitespace && (!first_is_opcode_like || has_following_opcode);

    let (label, rest) = if label_present {
        (Some(tokens[0].clone()), &tokens[1..])
    } else {
        (None, &tokens[..])
    };
    line.label = label;

    if rest.is_empty() {
        return line;
    }

    let raw_opcode = &rest[0];
    let extended = raw_opcode.starts_with('+');
    let opcode_text = if extended {
        raw_opcode[1..].to_owned()
    } else {
        raw_opcode.clone()
    };
    line.opcode = Some(opcode_text.to_uppercase());
    line.extended = extended;

    if rest.len() > 1 {
        let operand_text = rest[1..].join(" ");
        let (operand_text, prefix) = strip_addressing_prefix(&operand_text);
        let is_format2 = lookup_op(line.opcode.as_deref().unwrap_or(""))
            .map(|e| e.format == crate::tables::Format::Two)
            .unwrap_or(false);
        let (operand_text, indexed) = if is_format2 {
            (operand_text, false)
        } else {
            strip_indexed_suffix(&operand_text)
        };
        line.operand = Some(operand_text);
        line.addressing_prefix = prefix;
        line.indexed = indexed;
    }

    line
}

/// Extracts the bare opcode candidate from a token by stripping a
/// leading `+` (same convention as opcode normalization) so label
/// detection can consult the op/directive tables.
fn opcode_candidate(token: &str) -> String {
    token.strip_prefix('+').unwrap_or(token).to_uppercase()
}

fn strip_addressing_prefix(operand: &str) -> (String, AddressingPrefix) {
    if let Some(rest) = operand.strip_prefix('#') {
        (rest.to_owned(), AddressingPrefix::Immediate)
    } else if let Some(rest) = operand.strip_prefix('@') {
        (rest.to_owned(), AddressingPrefix::Indirect)
    } else {
        (operand.to_owned(), AddressingPrefix::None)
    }
}

fn strip_indexed_suffix(operand: &str) -> (String, bool) {
    if operand.len() >= 2 {
        let tail = &operand[operand.len() - 2..];
        if tail.eq_ignore_ascii_case(",X") {
            return (operand[..operand.len() - 2].to_owned(), true);
        }
    }
    (operand.to_owned(), false)
}

/// Splits `line` at the first unquoted `.` or `;`, returning
/// `(code, Some(comment))` or `(line, None)` if none is found outside
/// quotes.
fn split_inline_comment(line: &str) -> (&str, Option<&str>) {
    let mut in_single = false;
    let mut in_double = false;
    for (i, ch) in line.char_indices() {
        match ch {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            '.' | ';' if !in_single && !in_double => {
                return (line[..i].trim_end(), Some(line[i..].trim()));
            }
            _ => {}
        }
    }
    (line, None)
}

/// Splits `code` into whitespace-separated tokens, treating any run of
/// characters inside single or double quotes as part of the current
/// token (so `C'A B'` stays one token).
fn split_respecting_quotes(code: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_single = false;
    let mut in_double = false;

    for ch in code.chars() {
        match ch {
            '\'' if !in_double => {
                in_single = !in_single;
                current.push(ch);
            }
            '"' if !in_single => {
                in_double = !in_double;
                current.push(ch);
            }
            c if c.is_whitespace() && !in_single && !in_double => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// True iff `s` is a syntactically valid label: starts with a letter,
/// followed by alphanumerics/underscores, at most 16 characters.
pub fn is_valid_label(s: &str) -> bool {
    if s.is_empty() || s.len() > 16 {
        return false;
    }
    let mut chars = s.chars();
    let first = chars.next().unwrap();
    if !first.is_ascii_alphabetic() {
        return false;
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn is_valid_hex(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}

pub fn is_valid_decimal(s: &str) -> bool {
    let s = s.strip_prefix('-').or_else(|| s.strip_prefix('+')).unwrap_or(s);
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// `C'…'` with at least one character, or `X'…'` with an even number
/// of hex digits.
pub fn is_valid_byte_constant(s: &str) -> bool {
    extract_byte_constant(s).is_some()
}

/// Returns the parsed content of a `C'…'`/`X'…'` byte constant: the
/// character type tag and inner text, already validated.
pub fn extract_byte_constant(s: &str) -> Option<(char, &str)> {
    if s.len() < 3 {
        return None;
    }
    let tag = s.chars().next().unwrap();
    if tag != 'C' && tag != 'X' {
        return None;
    }
    let rest = &s[1..];
    if !rest.starts_with('\'') || !rest.ends_with('\'') || rest.len() < 2 {
        return None;
    }
    let inner = &rest[1..rest.len() - 1];
    match tag {
        'C' if !inner.is_empty() => Some((tag, inner)),
        'X' if !inner.is_empty() && inner.len() % 2 == 0 && inner.chars().all(|c| c.is_ascii_hexdigit()) => {
            Some((tag, inner))
        }
        _ => None,
    }
}

/// Size in bytes of a validated byte constant.
pub fn calculate_byte_constant_size(s: &str) -> Option<u32> {
    extract_byte_constant(s).map(|(tag, inner)| match tag {
        'C' => inner.len() as u32,
        'X' => (inner.len() / 2) as u32,
        _ => unreachable!(),
    })
}

/// Parses a numeric literal accepting `0xHH…`, bare hex, or signed
/// decimal. The bare-hex reading is specific to `START`'s address
/// operand (conventionally written in hex, e.g. `COPY START 1000`);
/// every other numeric context (expressions, immediate literals) uses
/// [`parse_numeric_decimal`] instead, where a bare digit string means
/// decimal.
pub fn parse_numeric(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok();
    }
    if s.starts_with('+') || s.starts_with('-') {
        if is_valid_decimal(s) {
            return s.parse::<i64>().ok();
        }
        return None;
    }
    if is_valid_hex(s) {
        return i64::from_str_radix(s, 16).ok();
    }
    None
}

/// Parses a numeric literal accepting `0xHH…` or signed/bare decimal —
/// a bare digit string means decimal here, unlike [`parse_numeric`].
/// Used by the expression evaluator and by Format-3/4 immediate-literal
/// resolution, where `LDA #100` must mean decimal 100, not hex 0x100
/// (spec.md §4.6, Scenario E). A label can never parse as decimal here
/// (labels must start with a letter), so this also can't misread a
/// hex-looking symbol name (`DEAD`, `CAFE`) as a number.
pub fn parse_numeric_decimal(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok();
    }
    if s.starts_with('+') || s.starts_with('-') {
        if is_valid_decimal(s) {
            return s.parse::<i64>().ok();
        }
        return None;
    }
    if is_valid_decimal(s) {
        return s.parse::<i64>().ok();
    }
    None
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_line_is_empty() {
        let lines = tokenize("   \n");
        assert!(lines[0].is_empty);
    }

    #[test]
    fn comment_line_starting_with_dot() {
        let lines = tokenize(".this is a comment");
        assert!(lines[0].is_comment);
    }

    #[test]
    fn comment_line_starting_with_semicolon() {
        let lines = tokenize("; also a comment");
        assert!(lines[0].is_comment);
    }

    #[test]
    fn label_detected_when_line_starts_at_column_zero() {
        let lines = tokenize("LOOP    LDA   FIVE");
        assert_eq!(lines[0].label.as_deref(), Some("LOOP"));
        assert_eq!(lines[0].opcode.as_deref(), Some("LDA"));
        assert_eq!(lines[0].operand.as_deref(), Some("FIVE"));
    }

    #[test]
    fn no_label_when_line_is_indented() {
        let lines = tokenize("        LDA   FIVE");
        assert_eq!(lines[0].label, None);
        assert_eq!(lines[0].opcode.as_deref(), Some("LDA"));
    }

    #[test]
    fn extended_flag_strips_plus() {
        let lines = tokenize("       +JSUB  RDREC");
        assert!(lines[0].extended);
        assert_eq!(lines[0].opcode.as_deref(), Some("JSUB"));
    }

    #[test]
    fn immediate_prefix_and_indexed_suffix() {
        let lines = tokenize("        LDA   #45,X");
        assert_eq!(lines[0].addressing_prefix, AddressingPrefix::Immediate);
        assert_eq!(lines[0].operand.as_deref(), Some("45"));
        assert!(lines[0].indexed);
    }

    #[test]
    fn indexed_suffix_not_applied_to_format_2() {
        let lines = tokenize("        CLEAR X");
        assert!(!lines[0].indexed);
    }

    #[test]
    fn byte_constant_comment_marker_inside_quotes_is_not_split() {
        let lines = tokenize("        BYTE  C'EOF.'");
        assert_eq!(lines[0].operand.as_deref(), Some("C'EOF.'"));
        assert_eq!(lines[0].comment, None);
    }

    #[test]
    fn inline_comment_after_code() {
        let lines = tokenize("        LDA   FIVE   . load five");
        assert_eq!(lines[0].operand.as_deref(), Some("FIVE"));
        assert_eq!(lines[0].comment.as_deref(), Some(". load five"));
    }

    #[test]
    fn label_only_token_followed_by_valid_opcode() {
        let lines = tokenize("RESULT  RESW  1");
        assert_eq!(lines[0].label.as_deref(), Some("RESULT"));
        assert_eq!(lines[0].opcode.as_deref(), Some("RESW"));
    }

    #[test]
    fn byte_constant_helpers() {
        assert!(is_valid_byte_constant("C'EOF'"));
        assert!(is_valid_byte_constant("X'F1'"));
        assert!(!is_valid_byte_constant("X'F'"));
        assert_eq!(calculate_byte_constant_size("C'EOF'"), Some(3));
        assert_eq!(calculate_byte_constant_size("X'F1F2'"), Some(2));
    }

    #[test]
    fn numeric_parsing_variants() {
        assert_eq!(parse_numeric("0x1A"), Some(0x1A));
        assert_eq!(parse_numeric("-5"), Some(-5));
        // Bare digits are hex here, matching START's conventional usage.
        assert_eq!(parse_numeric("1000"), Some(0x1000));
    }

    #[test]
    fn decimal_numeric_parsing_variants() {
        assert_eq!(parse_numeric_decimal("0x1A"), Some(0x1A));
        assert_eq!(parse_numeric_decimal("-5"), Some(-5));
        // Bare digits are decimal here (Scenario E: `LDA #100` is 100).
        assert_eq!(parse_numeric_decimal("100"), Some(100));
        assert_eq!(parse_numeric_decimal("4096"), Some(4096));
        // A label can never be misread as a number: it must start with
        // a letter, so it never satisfies the all-digits decimal check.
        assert_eq!(parse_numeric_decimal("DEAD"), None);
    }

    #[test]
    fn label_syntax_rules() {
        assert!(is_valid_label("LOOP1"));
        assert!(is_valid_label("BUF_END"));
        assert!(!is_valid_label("1LOOP"));
        assert!(!is_valid_label(""));
        assert!(!is_valid_label(&"A".repeat(17)));
    }
}
