//! Compile-time diagnostics.
//!
//! The front-end never aborts on the first fault: every pass accumulates
//! [`CompileError`] values into a [`Diagnostics`] list and keeps going where
//! that is meaningful, exactly as described for the original C bootstrap's
//! error taxonomy. A [`CompileError`] carries a numeric `C####` code, a
//! family classification, a source span, and a human-readable message.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A location in source text: filename plus a half-open line/column range
/// and the byte offset of the start, following the `(filename, start,
/// end)` shape the bootstrap's parser and validator both use for
/// diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub file: PathBuf,
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
    pub byte_offset: u32,
}

impl SourceSpan {
    pub fn point(file: PathBuf, line: u32, col: u32, byte_offset: u32) -> Self {
        SourceSpan {
            file,
            start_line: line,
            start_col: col,
            end_line: line,
            end_col: col,
            byte_offset,
        }
    }

    pub fn span(
        file: PathBuf,
        start_line: u32,
        start_col: u32,
        end_line: u32,
        end_col: u32,
        byte_offset: u32,
    ) -> Self {
        debug_assert!(
            (start_line, start_col) <= (end_line, end_col),
            "SourceSpan: start must not be after end"
        );
        SourceSpan {
            file,
            start_line,
            start_col,
            end_line,
            end_col,
            byte_offset,
        }
    }

    /// Merge two spans in the same file into their smallest enclosing span.
    pub fn merge(&self, other: &SourceSpan) -> SourceSpan {
        let (start_line, start_col, byte_offset) =
            if (self.start_line, self.start_col) <= (other.start_line, other.start_col) {
                (self.start_line, self.start_col, self.byte_offset)
            } else {
                (other.start_line, other.start_col, other.byte_offset)
            };
        let (end_line, end_col) =
            if (self.end_line, self.end_col) >= (other.end_line, other.end_col) {
                (self.end_line, self.end_col)
            } else {
                (other.end_line, other.end_col)
            };
        SourceSpan {
            file: self.file.clone(),
            start_line,
            start_col,
            end_line,
            end_col,
            byte_offset,
        }
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}:{} -- {}:{}",
            self.file.display(),
            self.start_line + 1,
            self.start_col + 1,
            self.end_line + 1,
            self.end_col + 1
        )
    }
}

/// The diagnostic families from the error taxonomy, one group of numeric
/// codes per family. Matches the `C####` codes referenced by tests and
/// documentation in the original bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ErrorCode {
    /// string is not a valid integer/real/interval/map
    Format(u32),
    /// illegal input byte, unterminated token
    Lex(u32),
    /// unexpected token, unclosed enclosure, misgrouped string
    Parse(u32),
    /// ambiguous symbol, missing expander, arity error
    Macsub(u32),
    /// redefinition, assignment to readonly/closed var
    Symbol(u32),
    /// duplicate label, out-of-range register, use-before-init, bad cross-ref
    Xcode(u32),
    /// source-read failure, cyclic dependency
    Io(u32),
}

impl ErrorCode {
    /// Render as the `C####` form used in diagnostics and tests.
    pub fn code_str(&self) -> String {
        let n = match self {
            ErrorCode::Format(n)
            | ErrorCode::Lex(n)
            | ErrorCode::Parse(n)
            | ErrorCode::Macsub(n)
            | ErrorCode::Symbol(n)
            | ErrorCode::Xcode(n)
            | ErrorCode::Io(n) => *n,
        };
        format!("C{n:04}")
    }

    pub fn family(&self) -> &'static str {
        match self {
            ErrorCode::Format(_) => "format",
            ErrorCode::Lex(_) => "lex",
            ErrorCode::Parse(_) => "parse",
            ErrorCode::Macsub(_) => "macsub",
            ErrorCode::Symbol(_) => "symbol",
            ErrorCode::Xcode(_) => "xcode",
            ErrorCode::Io(_) => "io",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code_str())
    }
}

/// A single compile diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileError {
    pub code: ErrorCode,
    pub location: SourceSpan,
    pub message: String,
}

impl CompileError {
    pub fn new(code: ErrorCode, location: SourceSpan, message: impl Into<String>) -> Self {
        CompileError {
            code,
            location,
            message: message.into(),
        }
    }

    /// Render one line plus a caret range under the offending source line,
    /// per the "user-visible failure behavior" rendering rule: `<filename>:
    /// <line>:<col> -- <line>:<col>: error: <message>` followed by the
    /// source line and a caret-underline.
    pub fn render(&self, source_line: Option<&str>) -> String {
        let mut out = format!(
            "{}: error: {} [{}]",
            self.location, self.message, self.code
        );
        if let Some(line) = source_line {
            out.push('\n');
            out.push_str(line);
            out.push('\n');
            let start = self.location.start_col as usize;
            let width = if self.location.start_line == self.location.end_line {
                (self.location.end_col as usize).saturating_sub(start).max(1)
            } else {
                line.len().saturating_sub(start).max(1)
            };
            out.push_str(&" ".repeat(start));
            out.push_str(&"^".repeat(width));
        }
        out
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(None))
    }
}

impl std::error::Error for CompileError {}

/// An append-only accumulator of diagnostics, threaded through every pass.
///
/// Passes push onto this rather than returning early, matching the
/// propagation policy that parsing/macro-expansion/validation keep going
/// after a fault so a single run reports as many diagnostics as possible.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    errors: Vec<CompileError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics::default()
    }

    pub fn push(&mut self, error: CompileError) {
        self.errors.push(error);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompileError> {
        self.errors.iter()
    }

    pub fn into_vec(self) -> Vec<CompileError> {
        self.errors
    }
}

impl IntoIterator for Diagnostics {
    type Item = CompileError;
    type IntoIter = std::vec::IntoIter<CompileError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(col: u32) -> SourceSpan {
        SourceSpan::point(PathBuf::from("test.ava"), 0, col, col)
    }

    #[test]
    fn render_without_source_line() {
        let err = CompileError::new(ErrorCode::Lex(5010), span(3), "illegal character");
        let rendered = err.render(None);
        assert!(rendered.contains("C5010"));
        assert!(rendered.contains("illegal character"));
    }

    #[test]
    fn diagnostics_accumulate_in_order() {
        let mut diags = Diagnostics::new();
        diags.push(CompileError::new(ErrorCode::Parse(1), span(0), "first"));
        diags.push(CompileError::new(ErrorCode::Parse(2), span(1), "second"));
        let msgs: Vec<_> = diags.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(msgs, vec!["first", "second"]);
    }

    #[test]
    fn merge_span_picks_outer_bounds() {
        let a = SourceSpan::span(PathBuf::from("f"), 0, 2, 0, 5, 2);
        let b = SourceSpan::span(PathBuf::from("f"), 0, 0, 0, 3, 0);
        let merged = a.merge(&b);
        assert_eq!((merged.start_col, merged.end_col), (0, 5));
    }
}
