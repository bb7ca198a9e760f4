//! Recursive-descent parser: tokens to parse units, applying the
//! statement-boundary, enclosure, string-regrouping, variable-simplification,
//! subscript-desugaring, spread, and group-tag rules in one pass.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::{CompileError, Diagnostics, ErrorCode, SourceSpan};

use super::ast::{Statement, Unit, UnitKind};
use super::lexer;
use super::token::{Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Closer {
    Paren,
    Bracket,
    Brace,
}

impl Closer {
    fn matches(self, kind: &TokenKind) -> bool {
        matches!(
            (self, kind),
            (Closer::Paren, TokenKind::CloseParen)
                | (Closer::Bracket, TokenKind::CloseBracket)
                | (Closer::Brace, TokenKind::CloseBrace)
        )
    }

    fn name(self) -> &'static str {
        match self {
            Closer::Paren => ")",
            Closer::Bracket => "]",
            Closer::Brace => "}",
        }
    }
}

pub struct Parser {
    file: PathBuf,
    tokens: Vec<Token>,
    pos: usize,
    diags: Diagnostics,
}

/// Parse a whole compilation unit into its root block's statement list.
pub fn parse(file: impl Into<PathBuf>, src: &str) -> (Vec<Statement>, Diagnostics) {
    let file = file.into();
    let (tokens, lex_diags) = lexer::tokenize(file.clone(), src);
    let mut parser = Parser {
        file,
        tokens,
        pos: 0,
        diags: lex_diags,
    };
    let stmts = parser.parse_statement_sequence(None);
    (stmts, parser.diags)
}

pub fn parse_path(path: &Path, src: &str) -> (Vec<Statement>, Diagnostics) {
    parse(path.to_path_buf(), src)
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    fn error(&mut self, code: u32, span: SourceSpan, msg: impl Into<String>) {
        self.diags
            .push(CompileError::new(ErrorCode::Parse(code), span, msg));
    }

    /// Parse statements (newline-separated) until `closer` (or EOF for the
    /// top level / `None`). Does not consume the closer; the caller does.
    fn parse_statement_sequence(&mut self, closer: Option<Closer>) -> Vec<Statement> {
        let mut statements = Vec::new();
        loop {
            while matches!(self.peek_kind(), TokenKind::Newline) {
                self.advance();
            }
            if self.at_eof() {
                if let Some(c) = closer {
                    let span = self.peek().span.clone();
                    self.error(5010, span, format!("unclosed enclosure, expected '{}'", c.name()));
                }
                break;
            }
            if let Some(c) = closer {
                if c.matches(self.peek_kind()) {
                    break;
                }
            }
            let stmt = self.parse_statement(closer);
            if !stmt.is_empty() {
                statements.push(stmt);
            }
        }
        statements
    }

    fn parse_statement(&mut self, closer: Option<Closer>) -> Statement {
        let mut units = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::Newline => {
                    self.advance();
                    break;
                }
                TokenKind::Eof => break,
                TokenKind::EscapedNewline => {
                    self.advance();
                }
                TokenKind::CloseParen | TokenKind::CloseBracket | TokenKind::CloseBrace => {
                    if let Some(c) = closer {
                        if c.matches(self.peek_kind()) {
                            break;
                        }
                    }
                    let tok = self.advance();
                    self.error(5011, tok.span, "unexpected token");
                    break;
                }
                _ => {
                    if let Some(unit) = self.parse_unit() {
                        units.push(unit);
                    }
                }
            }
        }
        units
    }

    /// Parse the flat unit list inside `[ … ]`, applying L/R string
    /// regrouping afterward.
    fn parse_flat_units(&mut self) -> Vec<Unit> {
        let mut units = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::Newline | TokenKind::EscapedNewline => {
                    self.advance();
                }
                TokenKind::Eof | TokenKind::CloseBracket => break,
                TokenKind::CloseParen | TokenKind::CloseBrace => {
                    let tok = self.advance();
                    self.error(5011, tok.span, "unexpected token");
                }
                _ => {
                    if let Some(unit) = self.parse_unit() {
                        units.push(unit);
                    }
                }
            }
        }
        self.regroup_lr_strings(units)
    }

    /// Parse one unit, applying variable-simplification, subscript
    /// desugaring, spread-wrapping, and group-tag simplification as they
    /// apply. Returns `None` only for a bare trailing spread, which is
    /// diagnosed and produces nothing.
    fn parse_unit(&mut self) -> Option<Unit> {
        let tok = self.advance();
        let start = tok.span.clone();
        let base = match tok.kind {
            TokenKind::Bareword(name) => return Some(self.finish_bareword(name, start)),
            TokenKind::AString(s) => Unit::new(UnitKind::AString(s), start),
            TokenKind::LString(s) => Unit::new(UnitKind::LString(s), start),
            TokenKind::RString(s) => Unit::new(UnitKind::RString(s), start),
            TokenKind::LRString(s) => Unit::new(UnitKind::LRString(s), start),
            TokenKind::Verbatim(s) => Unit::new(UnitKind::Verbatim(s), start),
            TokenKind::Expander(name) => Unit::new(UnitKind::Expander(name), start),
            TokenKind::Spread => {
                return self.parse_spread(start);
            }
            TokenKind::OpenParen => {
                let stmts = self.parse_statement_sequence(Some(Closer::Paren));
                let end = self.expect_closer(Closer::Paren, &start);
                Unit::new(UnitKind::Substitution(stmts), start.merge(&end))
            }
            TokenKind::OpenBracket => {
                let inner = self.parse_flat_units();
                let end = self.expect_closer(Closer::Bracket, &start);
                Unit::new(UnitKind::Semiliteral(inner), start.merge(&end))
            }
            TokenKind::OpenBrace => {
                let stmts = self.parse_statement_sequence(Some(Closer::Brace));
                let end = self.expect_closer(Closer::Brace, &start);
                Unit::new(UnitKind::Block(stmts), start.merge(&end))
            }
            other => {
                self.error(5012, start.clone(), format!("unexpected token {other:?}"));
                Unit::new(UnitKind::Bareword(String::new()), start)
            }
        };
        Some(self.finish_group_tag(base))
    }

    fn expect_closer(&mut self, closer: Closer, opener_span: &SourceSpan) -> SourceSpan {
        while matches!(self.peek_kind(), TokenKind::Newline) {
            self.advance();
        }
        if closer.matches(self.peek_kind()) {
            self.advance().span
        } else {
            self.error(
                5010,
                opener_span.clone(),
                format!("unclosed enclosure, expected '{}'", closer.name()),
            );
            opener_span.clone()
        }
    }

    fn parse_spread(&mut self, spread_span: SourceSpan) -> Option<Unit> {
        match self.peek_kind() {
            TokenKind::Newline | TokenKind::Eof => {
                self.error(5057, spread_span, "spread with no following expression");
                None
            }
            TokenKind::CloseParen | TokenKind::CloseBracket | TokenKind::CloseBrace => {
                self.error(5057, spread_span, "spread with no following expression");
                None
            }
            _ => {
                let inner = self.parse_unit()?;
                let span = spread_span.merge(&inner.span);
                Some(Unit::new(UnitKind::Spread(Rc::new(inner)), span))
            }
        }
    }

    /// Subscript desugaring (rule 5) and variable simplification (rule 4)
    /// for a plain bareword.
    fn finish_bareword(&mut self, name: String, span: SourceSpan) -> Unit {
        if self.adjacent_opener() {
            return self.desugar_subscript(name, span);
        }
        if name.contains('$') {
            return self.simplify_variable(&name, span);
        }
        Unit::new(UnitKind::Bareword(name), span)
    }

    /// True if the very next token starts immediately where the
    /// just-consumed token ended (no intervening whitespace), and is an
    /// opening enclosure or bareword — the adjacency subscript/group-tag
    /// rules require directly-touching tokens.
    fn adjacent_opener(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::OpenParen | TokenKind::OpenBracket | TokenKind::OpenBrace
        ) && self.is_adjacent_to_previous()
    }

    fn is_adjacent_to_previous(&self) -> bool {
        if self.pos == 0 {
            return false;
        }
        let prev = &self.tokens[self.pos - 1].span;
        let cur = &self.peek().span;
        prev.end_line == cur.start_line && prev.end_col == cur.start_col
    }

    fn desugar_subscript(&mut self, name: String, span: SourceSpan) -> Unit {
        let opener_kind = self.peek_kind().clone();
        let (intrinsic, contents, end) = match opener_kind {
            TokenKind::OpenParen => {
                let open_span = self.advance().span;
                let stmts = self.parse_statement_sequence(Some(Closer::Paren));
                let end = self.expect_closer(Closer::Paren, &open_span);
                ("#name-subscript#", UnitKind::Substitution(stmts), end)
            }
            TokenKind::OpenBracket => {
                let open_span = self.advance().span;
                let units = self.parse_flat_units();
                let end = self.expect_closer(Closer::Bracket, &open_span);
                ("#numeric-subscript#", UnitKind::Semiliteral(units), end)
            }
            TokenKind::OpenBrace => {
                let open_span = self.advance().span;
                let stmts = self.parse_statement_sequence(Some(Closer::Brace));
                let end = self.expect_closer(Closer::Brace, &open_span);
                ("#string-subscript#", UnitKind::Block(stmts), end)
            }
            _ => unreachable!("adjacent_opener only returns true for an opening token"),
        };
        let contents_unit = Unit::new(contents, span.merge(&end));
        let tag = if self.adjacent_bareword() {
            self.take_tag_bareword()
        } else {
            "##".to_string()
        };
        let whole_span = span.merge(&contents_unit.span);
        let call = vec![
            Unit::new(UnitKind::Bareword(intrinsic.to_string()), span.clone()),
            Unit::new(UnitKind::Bareword(name), span.clone()),
            contents_unit,
            Unit::new(UnitKind::Bareword(tag), whole_span.clone()),
        ];
        Unit::new(UnitKind::Substitution(vec![call]), whole_span)
    }

    fn adjacent_bareword(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Bareword(_)) && self.is_adjacent_to_previous()
    }

    fn take_tag_bareword(&mut self) -> String {
        match self.advance().kind {
            TokenKind::Bareword(s) => s,
            _ => "##".to_string(),
        }
    }

    /// Group-tag simplification (rule 7): a trailing, adjacent bareword
    /// after a closed `(…)`, `[…]`, or `{…}` rewrites the whole form into a
    /// call to the matching `#…#tag` intrinsic.
    fn finish_group_tag(&mut self, base: Unit) -> Unit {
        let intrinsic = match &base.kind {
            UnitKind::Substitution(_) => "#substitution#",
            UnitKind::Semiliteral(_) => "#semiliteral#",
            UnitKind::Block(_) => "#block#",
            _ => return base,
        };
        if !self.adjacent_bareword() {
            return base;
        }
        let tag = self.take_tag_bareword();
        let span = base.span.clone();
        Unit::new(
            UnitKind::Substitution(vec![vec![
                Unit::new(UnitKind::Bareword(format!("{intrinsic}{tag}")), span.clone()),
                base,
            ]]),
            span,
        )
    }

    /// Variable simplification (rule 4): split a `$`-bearing bareword into
    /// literal/variable segments, each variable segment becoming a call to
    /// `#var#`, joined by `#string-concat#` when there is more than one
    /// segment. A bareword that is exactly `$` names the context variable.
    fn simplify_variable(&mut self, name: &str, span: SourceSpan) -> Unit {
        if name == "$" {
            return Unit::new(
                UnitKind::Substitution(vec![vec![Unit::new(
                    UnitKind::Bareword("#context-var#".to_string()),
                    span.clone(),
                )]]),
                span,
            );
        }

        let parts: Vec<&str> = name.split('$').collect();
        let mut pieces: Vec<Unit> = Vec::new();
        for (i, part) in parts.iter().enumerate() {
            if i % 2 == 0 {
                if !part.is_empty() {
                    pieces.push(Unit::new(UnitKind::AString(part.to_string()), span.clone()));
                }
            } else {
                if part.is_empty() {
                    self.error(5058, span.clone(), "empty variable name");
                }
                pieces.push(Unit::new(
                    UnitKind::Substitution(vec![vec![
                        Unit::new(UnitKind::Bareword("#var#".to_string()), span.clone()),
                        Unit::new(UnitKind::AString(part.to_string()), span.clone()),
                    ]]),
                    span.clone(),
                ));
            }
        }

        match pieces.len() {
            0 => Unit::new(UnitKind::AString(String::new()), span),
            1 => pieces.into_iter().next().unwrap(),
            _ => {
                let mut call = vec![Unit::new(
                    UnitKind::Bareword("#string-concat#".to_string()),
                    span.clone(),
                )];
                call.extend(pieces);
                Unit::new(UnitKind::Substitution(vec![call]), span)
            }
        }
    }

    /// Rule 3: fuse a maximal `(bareword|rstring|lrstring|verbatim)*
    /// (lstring|lrstring)` run into one substitution, converting interior
    /// barewords to verbatim units so the fused parts read back as literal
    /// text rather than further macro-processed names.
    fn regroup_lr_strings(&mut self, units: Vec<Unit>) -> Vec<Unit> {
        fn is_fusible(u: &Unit) -> bool {
            matches!(
                u.kind,
                UnitKind::Bareword(_)
                    | UnitKind::LString(_)
                    | UnitKind::RString(_)
                    | UnitKind::LRString(_)
                    | UnitKind::Verbatim(_)
            )
        }
        fn is_l_terminator(u: &Unit) -> bool {
            matches!(u.kind, UnitKind::LString(_) | UnitKind::LRString(_))
        }
        fn is_r_starter(u: &Unit) -> bool {
            matches!(u.kind, UnitKind::RString(_) | UnitKind::LRString(_))
        }

        let mut out = Vec::new();
        let mut i = 0usize;
        while i < units.len() {
            if is_l_terminator(&units[i]) {
                // Leading L with nothing to attach to.
                self.error(
                    5059,
                    units[i].span.clone(),
                    "expression before L-string with no preceding expression",
                );
                out.push(units[i].clone());
                i += 1;
                continue;
            }

            if is_fusible(&units[i]) {
                // Find the run end: consume bareword/verbatim continuations
                // until an L-terminator closes the run, or a non-fusible
                // unit / the end of input interrupts it.
                let mut j = i;
                let mut found_end = None;
                while j < units.len() && is_fusible(&units[j]) {
                    if is_l_terminator(&units[j]) {
                        found_end = Some(j);
                        break;
                    }
                    j += 1;
                }
                if let Some(end) = found_end {
                    let run = &units[i..=end];
                    let fused_span = run
                        .iter()
                        .skip(1)
                        .fold(run[0].span.clone(), |acc, u| acc.merge(&u.span));
                    let inner: Vec<Unit> = run
                        .iter()
                        .map(|u| match &u.kind {
                            UnitKind::Bareword(s) => {
                                Unit::new(UnitKind::Verbatim(s.clone()), u.span.clone())
                            }
                            _ => u.clone(),
                        })
                        .collect();
                    out.push(Unit::new(UnitKind::Substitution(vec![inner]), fused_span));
                    i = end + 1;
                    continue;
                }
                if is_r_starter(&units[i]) {
                    self.error(
                        5060,
                        units[i].span.clone(),
                        "expression after R-string with no following expression",
                    );
                }
                out.push(units[i].clone());
                i += 1;
                continue;
            }

            out.push(units[i].clone());
            i += 1;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_has_no_statements_and_no_errors() {
        let (stmts, diags) = parse("t.ava", "");
        assert!(stmts.is_empty());
        assert!(diags.is_empty());
    }

    #[test]
    fn integer_concat_is_two_bareword_units() {
        let (stmts, diags) = parse("t.ava", "foo bar");
        assert!(diags.is_empty());
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].len(), 2);
        assert_eq!(stmts[0][0].kind, UnitKind::Bareword("foo".into()));
        assert_eq!(stmts[0][1].kind, UnitKind::Bareword("bar".into()));
    }

    #[test]
    fn l_r_string_regrouping_inside_semiliteral() {
        let (stmts, diags) = parse("t.ava", "[foo `bar\" baz]");
        assert!(diags.is_empty(), "{:?}", diags);
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].len(), 1);
        let UnitKind::Semiliteral(units) = &stmts[0][0].kind else {
            panic!("expected semiliteral");
        };
        assert_eq!(units.len(), 2);
        match &units[0].kind {
            UnitKind::Substitution(inner) => {
                assert_eq!(inner.len(), 1);
                assert_eq!(inner[0][0].kind, UnitKind::Verbatim("foo".into()));
                assert_eq!(inner[0][1].kind, UnitKind::LString("bar".into()));
            }
            other => panic!("expected fused substitution, got {other:?}"),
        }
        assert_eq!(units[1].kind, UnitKind::Bareword("baz".into()));
    }

    #[test]
    fn mismatched_enclosure_is_diagnosed() {
        let (_, diags) = parse("t.ava", "(foo]");
        assert!(!diags.is_empty());
    }

    #[test]
    fn unclosed_enclosure_is_diagnosed() {
        let (_, diags) = parse("t.ava", "(foo");
        assert!(diags.iter().any(|e| e.message.contains("unclosed")));
    }

    #[test]
    fn lone_dollar_is_context_variable() {
        let (stmts, _) = parse("t.ava", "$");
        let UnitKind::Substitution(inner) = &stmts[0][0].kind else {
            panic!("expected substitution");
        };
        assert_eq!(
            inner[0][0].kind,
            UnitKind::Bareword("#context-var#".into())
        );
    }

    #[test]
    fn subscript_desugars_to_name_subscript_call() {
        let (stmts, diags) = parse("t.ava", "foo(bar)");
        assert!(diags.is_empty());
        let UnitKind::Substitution(inner) = &stmts[0][0].kind else {
            panic!("expected substitution");
        };
        assert_eq!(
            inner[0][0].kind,
            UnitKind::Bareword("#name-subscript#".into())
        );
        assert_eq!(inner[0][1].kind, UnitKind::Bareword("foo".into()));
    }
}
