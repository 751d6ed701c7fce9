//! The single diagnostic type carried through every pipeline stage.

use std::fmt;

/// Which stage produced a [`Diagnostic`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
    Parser,
    Pass1,
    Pass2,
    Object,
    Loader,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Parser => "parser",
            Phase::Pass1 => "pass1",
            Phase::Pass2 => "pass2",
            Phase::Object => "object",
            Phase::Loader => "loader",
        };
        write!(f, "{}", name)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{}", name)
    }
}

/// A single diagnostic, carrying everything needed to render a useful
/// message without re-deriving it from the original source later.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Diagnostic {
    pub phase: Phase,
    pub line: Option<u32>,
    pub severity: Severity,
    pub message: String,
    pub source_excerpt: Option<String>,
    pub label: Option<String>,
    pub opcode: Option<String>,
    pub operand: Option<String>,
    pub locctr_hex: Option<String>,
    pub hint: Option<String>,
}

impl Diagnostic {
    pub fn error(phase: Phase, line: Option<u32>, message: impl Into<String>) -> Diagnostic {
        Diagnostic {
            phase,
            line,
            severity: Severity::Error,
            message: message.into(),
            source_excerpt: None,
            label: None,
            opcode: None,
            operand: None,
            locctr_hex: None,
            hint: None,
        }
    }

    pub fn warning(phase: Phase, line: Option<u32>, message: impl Into<String>) -> Diagnostic {
        let mut diag = Diagnostic::error(phase, line, message);
        diag.severity = Severity::Warning;
        diag
    }

    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Diagnostic {
        self.source_excerpt = Some(excerpt.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Diagnostic {
        self.label = Some(label.into());
        self
    }

    pub fn with_opcode(mut self, opcode: impl Into<String>) -> Diagnostic {
        self.opcode = Some(opcode.into());
        self
    }

    pub fn with_operand(mut self, operand: impl Into<String>) -> Diagnostic {
        self.operand = Some(operand.into());
        self
    }

    pub fn with_locctr(mut self, locctr: u32) -> Diagnostic {
        self.locctr_hex = Some(format!("{:06X}", locctr));
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Diagnostic {
        self.hint = Some(hint.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.phase, self.severity)?;
        if let Some(line) = self.line {
            write!(f, " (line {})", line)?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(excerpt) = &self.source_excerpt {
            write!(f, "\n    {}", excerpt)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n    hint: {}", hint)?;
        }
        Ok(())
    }
}

/// An ordered collection of diagnostics accumulated by a single stage.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Diagnostics {
        Diagnostics(Vec::new())
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| !d.is_error())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for diagnostic in &self.0 {
            writeln!(f, "{}", diagnostic)?;
        }
        Ok(())
    }
}
