//! Tokenizer.
//!
//! Whitespace and comments (`#` to end of line) are discarded. Control
//! bytes (anything below 0x20 other than tab/newline/carriage-return)
//! produce `illegal character` diagnostics but do not stop the scan —
//! the offending byte is skipped and lexing continues, so later passes
//! still see as much of the token stream as possible.

use std::path::{Path, PathBuf};

use crate::error::{CompileError, Diagnostics, ErrorCode, SourceSpan};

use super::token::{Token, TokenKind};

pub struct Lexer<'a> {
    file: PathBuf,
    src: &'a [u8],
    pos: usize,
    line: u32,
    col: u32,
}

/// Bytes that terminate a bareword scan. `$` is deliberately absent: a
/// bareword may contain `$`-segments (variable simplification handles those
/// later); only a token that *starts* with `$$` is lexed as an expander.
const SPECIAL_BYTES: &[u8] = b"()[]{}\"`\\ \t\r\n#";

impl<'a> Lexer<'a> {
    pub fn new(file: impl Into<PathBuf>, src: &'a str) -> Self {
        Lexer {
            file: file.into(),
            src: src.as_bytes(),
            pos: 0,
            line: 0,
            col: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }
        Some(b)
    }

    fn here(&self) -> (u32, u32, usize) {
        (self.line, self.col, self.pos)
    }

    fn span_from(&self, start: (u32, u32, usize)) -> SourceSpan {
        SourceSpan::span(
            self.file.clone(),
            start.0,
            start.1,
            self.line,
            self.col,
            start.2 as u32,
        )
    }

    /// Tokenize the whole input, accumulating lex diagnostics rather than
    /// stopping at the first bad byte.
    pub fn tokenize(mut self) -> (Vec<Token>, Diagnostics) {
        let mut tokens = Vec::new();
        let mut diags = Diagnostics::new();
        loop {
            self.skip_trivia(&mut diags);
            let start = self.here();
            let Some(b) = self.peek() else {
                tokens.push(Token::new(TokenKind::Eof, self.span_from(start)));
                break;
            };
            match b {
                b'\n' => {
                    self.advance();
                    tokens.push(Token::new(TokenKind::Newline, self.span_from(start)));
                }
                b'(' => {
                    self.advance();
                    tokens.push(Token::new(TokenKind::OpenParen, self.span_from(start)));
                }
                b')' => {
                    self.advance();
                    tokens.push(Token::new(TokenKind::CloseParen, self.span_from(start)));
                }
                b'[' => {
                    self.advance();
                    tokens.push(Token::new(TokenKind::OpenBracket, self.span_from(start)));
                }
                b']' => {
                    self.advance();
                    tokens.push(Token::new(TokenKind::CloseBracket, self.span_from(start)));
                }
                b'{' => {
                    self.advance();
                    tokens.push(Token::new(TokenKind::OpenBrace, self.span_from(start)));
                }
                b'}' => {
                    self.advance();
                    tokens.push(Token::new(TokenKind::CloseBrace, self.span_from(start)));
                }
                b'"' | b'`' => {
                    let (kind, ok) = self.scan_quoted(b, &mut diags);
                    let _ = ok;
                    tokens.push(Token::new(kind, self.span_from(start)));
                }
                b'\\' => {
                    tokens.push(self.scan_backslash(start, &mut diags));
                }
                b'$' if self.peek_at(1) == Some(b'$') => {
                    self.advance();
                    self.advance();
                    let name = self.scan_bareword_chars(&mut diags);
                    tokens.push(Token::new(TokenKind::Expander(name), self.span_from(start)));
                }
                _ => {
                    let word = self.scan_bareword_chars(&mut diags);
                    tokens.push(Token::new(TokenKind::Bareword(word), self.span_from(start)));
                }
            }
        }
        (tokens, diags)
    }

    fn skip_trivia(&mut self, diags: &mut Diagnostics) {
        loop {
            match self.peek() {
                Some(b' ') | Some(b'\t') | Some(b'\r') => {
                    self.advance();
                }
                Some(b'#') => {
                    while let Some(b) = self.peek() {
                        if b == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some(b) if b < 0x20 && b != b'\n' => {
                    let start = self.here();
                    self.advance();
                    diags.push(CompileError::new(
                        ErrorCode::Lex(5001),
                        self.span_from(start),
                        format!("illegal character 0x{b:02x}"),
                    ));
                }
                _ => break,
            }
        }
    }

    fn scan_bareword_chars(&mut self, diags: &mut Diagnostics) -> String {
        let mut out = Vec::new();
        while let Some(b) = self.peek() {
            if SPECIAL_BYTES.contains(&b) {
                break;
            }
            if b < 0x20 {
                let start = self.here();
                self.advance();
                diags.push(CompileError::new(
                    ErrorCode::Lex(5001),
                    self.span_from(start),
                    format!("illegal character 0x{b:02x}"),
                ));
                continue;
            }
            out.push(b);
            self.advance();
        }
        String::from_utf8_lossy(&out).into_owned()
    }

    /// Scan a quoted string starting with `opener` (`"` or `` ` ``). The
    /// terminator may be either quote character; which one closes it
    /// decides the l/r/lr/plain variant.
    fn scan_quoted(&mut self, opener: u8, diags: &mut Diagnostics) -> (TokenKind, bool) {
        let open_start = self.here();
        self.advance(); // consume opener
        let mut content = Vec::new();
        let closer;
        loop {
            match self.peek() {
                None => {
                    diags.push(CompileError::new(
                        ErrorCode::Lex(5002),
                        self.span_from(open_start),
                        "unterminated string literal",
                    ));
                    closer = opener;
                    break;
                }
                Some(b'\\') => {
                    self.advance();
                    match self.advance() {
                        Some(b'n') => content.push(b'\n'),
                        Some(b't') => content.push(b'\t'),
                        Some(b) => content.push(b),
                        None => {}
                    }
                }
                Some(b @ b'"') | Some(b @ b'`') => {
                    self.advance();
                    closer = b;
                    break;
                }
                Some(b) => {
                    content.push(b);
                    self.advance();
                }
            }
        }
        let text = String::from_utf8_lossy(&content).into_owned();
        let kind = match (opener, closer) {
            (b'"', b'"') => TokenKind::AString(text),
            (b'"', b'`') => TokenKind::RString(text),
            (b'`', b'"') => TokenKind::LString(text),
            (b'`', b'`') => TokenKind::LRString(text),
            _ => TokenKind::AString(text),
        };
        (kind, true)
    }

    fn scan_backslash(&mut self, start: (u32, u32, usize), diags: &mut Diagnostics) -> Token {
        self.advance(); // consume backslash
        match self.peek() {
            Some(b'*') => {
                self.advance();
                Token::new(TokenKind::Spread, self.span_from(start))
            }
            Some(b'\n') => {
                self.advance();
                Token::new(TokenKind::EscapedNewline, self.span_from(start))
            }
            Some(b'{') => {
                self.advance();
                let mut content = Vec::new();
                loop {
                    match self.peek() {
                        None => {
                            diags.push(CompileError::new(
                                ErrorCode::Lex(5003),
                                self.span_from(start),
                                "unterminated verbatim literal",
                            ));
                            break;
                        }
                        Some(b'\\') if self.peek_at(1) == Some(b'}') => {
                            self.advance();
                            self.advance();
                            break;
                        }
                        Some(b) => {
                            content.push(b);
                            self.advance();
                        }
                    }
                }
                let text = String::from_utf8_lossy(&content).into_owned();
                Token::new(TokenKind::Verbatim(text), self.span_from(start))
            }
            _ => {
                // A lone backslash is itself a bareword byte, joined with
                // whatever bareword content follows.
                let mut rest = self.scan_bareword_chars(diags);
                rest.insert(0, '\\');
                Token::new(TokenKind::Bareword(rest), self.span_from(start))
            }
        }
    }
}

pub fn tokenize(file: impl Into<PathBuf>, src: &str) -> (Vec<Token>, Diagnostics) {
    Lexer::new(file, src).tokenize()
}

pub fn lex_path(path: &Path, src: &str) -> (Vec<Token>, Diagnostics) {
    tokenize(path.to_path_buf(), src)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let (tokens, diags) = tokenize("t.ava", src);
        assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn empty_input_is_just_eof() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
    }

    #[test]
    fn barewords_split_on_whitespace() {
        assert_eq!(
            kinds("foo bar"),
            vec![
                TokenKind::Bareword("foo".into()),
                TokenKind::Bareword("bar".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn quote_variants_by_opener_and_closer() {
        assert_eq!(kinds("\"a\""), vec![TokenKind::AString("a".into()), TokenKind::Eof]);
        assert_eq!(kinds("`a\""), vec![TokenKind::LString("a".into()), TokenKind::Eof]);
        assert_eq!(kinds("\"a`"), vec![TokenKind::RString("a".into()), TokenKind::Eof]);
        assert_eq!(kinds("`a`"), vec![TokenKind::LRString("a".into()), TokenKind::Eof]);
    }

    #[test]
    fn expander_requires_double_dollar() {
        assert_eq!(
            kinds("$$foo"),
            vec![TokenKind::Expander("foo".into()), TokenKind::Eof]
        );
        assert_eq!(
            kinds("$foo"),
            vec![TokenKind::Bareword("$foo".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn spread_and_verbatim_and_escaped_newline() {
        assert_eq!(kinds("\\*x"), vec![
            TokenKind::Spread,
            TokenKind::Bareword("x".into()),
            TokenKind::Eof
        ]);
        assert_eq!(
            kinds("\\{raw\\}"),
            vec![TokenKind::Verbatim("raw".into()), TokenKind::Eof]
        );
        assert_eq!(
            kinds("a\\\nb"),
            vec![
                TokenKind::Bareword("a".into()),
                TokenKind::EscapedNewline,
                TokenKind::Bareword("b".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn control_byte_is_diagnosed_but_lexing_continues() {
        let (tokens, diags) = tokenize("t.ava", "a\x01b");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags.iter().next().unwrap().code, ErrorCode::Lex(5001));
        let kinds: Vec<_> = tokens.into_iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![TokenKind::Bareword("ab".into()), TokenKind::Eof]);
    }
}
