//! Simplified AST ("parse units") — the parser's output, before macro
//! substitution turns it into a semantic AST.

use std::rc::Rc;

use crate::error::SourceSpan;

/// One parse unit. `Spread` carries a pointer to another unit rather than
/// owning it inline, per the original's "wraps any unit" phrasing — modeled
/// here as an `Rc` so a spread can share structure with whatever it wraps
/// instead of needing a deep clone.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitKind {
    Bareword(String),
    AString(String),
    LString(String),
    RString(String),
    LRString(String),
    Verbatim(String),
    Substitution(Vec<Statement>),
    Block(Vec<Statement>),
    Semiliteral(Vec<Unit>),
    Expander(String),
    Spread(Rc<Unit>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    pub kind: UnitKind,
    pub span: SourceSpan,
}

impl Unit {
    pub fn new(kind: UnitKind, span: SourceSpan) -> Self {
        Unit { kind, span }
    }

    /// The literal string this unit was made of, where that is
    /// unambiguous (barewords and the four quoted-string variants); `None`
    /// for structural units.
    pub fn literal_text(&self) -> Option<&str> {
        match &self.kind {
            UnitKind::Bareword(s)
            | UnitKind::AString(s)
            | UnitKind::LString(s)
            | UnitKind::RString(s)
            | UnitKind::LRString(s)
            | UnitKind::Verbatim(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_left_continuing(&self) -> bool {
        matches!(self.kind, UnitKind::LString(_) | UnitKind::LRString(_))
    }

    pub fn is_right_continuing(&self) -> bool {
        matches!(self.kind, UnitKind::RString(_) | UnitKind::LRString(_))
    }
}

/// An ordered, non-empty list of units.
pub type Statement = Vec<Unit>;
