//! Left-to-right expression evaluator over `+`/`-`. Deliberately has no
//! operator precedence and no parentheses: a term is `*` (current
//! locctr), a numeric literal, or an uppercased symbol.

use crate::lexer::parse_numeric_decimal;
use std::collections::HashMap;

/// Evaluates `expr` against `symtab` and the current location counter.
/// Returns `None` ("unresolvable") if any referenced symbol is
/// undefined.
pub fn evaluate(expr: &str, symtab: &HashMap<String, u32>, locctr: u32) -> Option<i64> {
    let expr = expr.trim();
    if expr.is_empty() {
        return None;
    }

    let mut terms = split_terms(expr);
    if terms.is_empty() {
        return None;
    }

    let mut total: i64 = 0;
    for (sign, term) in terms.drain(..) {
        let value = evaluate_term(term, symtab, locctr)?;
        total += sign * value;
    }
    Some(total)
}

fn evaluate_term(term: &str, symtab: &HashMap<String, u32>, locctr: u32) -> Option<i64> {
    if term == "*" {
        return Some(locctr as i64);
    }
    // Symbol table first: a defined symbol always wins over a numeric
    // reading of the same text (relevant for `0x`-free numerals, since
    // a label can never itself be all-decimal-digits).
    if let Some(&value) = symtab.get(&term.to_uppercase()) {
        return Some(value as i64);
    }
    parse_numeric_decimal(term)
}

/// Splits `expr` into `(sign, term)` pairs, left-associative over `+`
/// and `-`. The first term is implicitly positive unless the
/// expression itself starts with `-`.
fn split_terms(expr: &str) -> Vec<(i64, &str)> {
    let mut terms = Vec::new();
    let mut sign = 1i64;
    let mut start = 0usize;
    let bytes = expr.as_bytes();
    let mut i = 0usize;

    while i < bytes.len() {
        let c = bytes[i] as char;
        if (c == '+' || c == '-') && i != start {
            let term = expr[start..i].trim();
            if !term.is_empty() {
                terms.push((sign, term));
            }
            sign = if c == '-' { -1 } else { 1 };
            start = i + 1;
        }
        i += 1;
    }
    let term = expr[start..].trim();
    if !term.is_empty() {
        terms.push((sign, term));
    }
    terms
}

#[cfg(test)]
mod test {
    use super::*;

    fn symtab(pairs: &[(&str, u32)]) -> HashMap<String, u32> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn single_symbol() {
        let st = symtab(&[("BUFFER", 0x1000)]);
        assert_eq!(evaluate("BUFFER", &st, 0), Some(0x1000));
    }

    #[test]
    fn addition_of_symbol_and_literal() {
        let st = symtab(&[("BUFFER", 0x1000)]);
        assert_eq!(evaluate("BUFFER+4096", &st, 0), Some(0x1000 + 4096));
    }

    #[test]
    fn subtraction() {
        let st = symtab(&[("END", 100)]);
        assert_eq!(evaluate("END-10", &st, 0), Some(90));
    }

    #[test]
    fn current_locctr() {
        let st = symtab(&[]);
        assert_eq!(evaluate("*", &st, 0x2030), Some(0x2030));
    }

    #[test]
    fn undefined_symbol_is_unresolvable() {
        let st = symtab(&[]);
        assert_eq!(evaluate("MISSING", &st, 0), None);
        assert_eq!(evaluate("MISSING+1", &st, 0), None);
    }

    #[test]
    fn left_associative_chain() {
        let st = symtab(&[("A", 10), ("B", 3)]);
        assert_eq!(evaluate("A-B+5", &st, 0), Some(12));
    }
}
