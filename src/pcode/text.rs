//! Textual form: P-code is a sequence of statements in the language's own
//! list syntax. Parsing and re-serializing an [`Atom`] tree must yield
//! byte-equal output.

use std::fmt::Write as _;

use super::{Atom, RegClass, Register};

pub fn serialize(atoms: &[Atom]) -> String {
    let mut out = String::new();
    for (i, a) in atoms.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        write_atom(a, &mut out);
    }
    out
}

fn write_atom(atom: &Atom, out: &mut String) {
    match atom {
        Atom::Int(n) => {
            let _ = write!(out, "{n}");
        }
        Atom::Bareword(b) => out.push_str(b),
        Atom::Reg(r) => {
            let _ = write!(out, "{r}");
        }
        Atom::Str(s) => write_quoted(s, out),
        Atom::List(items) => {
            out.push('(');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                write_atom(item, out);
            }
            out.push(')');
        }
        Atom::Block(items) => {
            out.push('{');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                write_atom(item, out);
            }
            out.push('}');
        }
    }
}

fn write_quoted(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
}

#[derive(Debug)]
pub struct TextParseError(pub String);

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(src: &'a str) -> Self {
        Reader { bytes: src.as_bytes(), pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n')) {
            self.pos += 1;
        }
    }

    fn parse_atom(&mut self) -> Result<Atom, TextParseError> {
        self.skip_ws();
        match self.peek() {
            None => Err(TextParseError("unexpected end of input".to_string())),
            Some(b'(') => {
                self.pos += 1;
                let mut items = Vec::new();
                loop {
                    self.skip_ws();
                    if self.peek() == Some(b')') {
                        self.pos += 1;
                        break;
                    }
                    items.push(self.parse_atom()?);
                }
                Ok(Atom::List(items))
            }
            Some(b'{') => {
                self.pos += 1;
                let mut items = Vec::new();
                loop {
                    self.skip_ws();
                    if self.peek() == Some(b'}') {
                        self.pos += 1;
                        break;
                    }
                    items.push(self.parse_atom()?);
                }
                Ok(Atom::Block(items))
            }
            Some(b'"') => {
                self.pos += 1;
                let mut s = String::new();
                loop {
                    match self.peek() {
                        None => return Err(TextParseError("unterminated string".to_string())),
                        Some(b'"') => {
                            self.pos += 1;
                            break;
                        }
                        Some(b'\\') => {
                            self.pos += 1;
                            match self.peek() {
                                Some(b'n') => s.push('\n'),
                                Some(b) => s.push(b as char),
                                None => return Err(TextParseError("unterminated escape".to_string())),
                            }
                            self.pos += 1;
                        }
                        Some(b) => {
                            s.push(b as char);
                            self.pos += 1;
                        }
                    }
                }
                Ok(Atom::Str(s))
            }
            _ => {
                let start = self.pos;
                while let Some(b) = self.peek() {
                    if b == b'(' || b == b')' || b == b'{' || b == b'}' || b == b'"' || b.is_ascii_whitespace() {
                        break;
                    }
                    self.pos += 1;
                }
                let text = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap();
                Ok(atom_from_bareword(text))
            }
        }
    }
}

fn atom_from_bareword(text: &str) -> Atom {
    if let Ok(n) = text.parse::<i64>() {
        return Atom::Int(n);
    }
    let mut chars = text.chars();
    if let Some(c) = chars.next() {
        if let Some(class) = RegClass::from_letter(c) {
            let rest = chars.as_str();
            if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(index) = rest.parse::<u32>() {
                    return Atom::Reg(Register { class, index });
                }
            }
        }
    }
    Atom::Bareword(text.to_string())
}

/// Parse a sequence of top-level statements.
pub fn parse(src: &str) -> Result<Vec<Atom>, TextParseError> {
    let mut reader = Reader::new(src);
    let mut out = Vec::new();
    loop {
        reader.skip_ws();
        if reader.peek().is_none() {
            break;
        }
        out.push(reader.parse_atom()?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_function_body() {
        let atoms = vec![Atom::List(vec![
            Atom::Bareword("defun".to_string()),
            Atom::Str("main".to_string()),
            Atom::Block(vec![
                Atom::List(vec![Atom::Bareword("push".to_string()), Atom::Bareword("i".to_string()), Atom::Int(1)]),
                Atom::List(vec![
                    Atom::Bareword("ldimm-i".to_string()),
                    Atom::Reg(Register { class: RegClass::I, index: 0 }),
                    Atom::Int(42),
                ]),
                Atom::List(vec![
                    Atom::Bareword("ret".to_string()),
                    Atom::Reg(Register { class: RegClass::I, index: 0 }),
                ]),
            ]),
        ])];
        let text = serialize(&atoms);
        let parsed = parse(&text).unwrap();
        assert_eq!(parsed, atoms);
        assert_eq!(serialize(&parsed), text);
    }

    #[test]
    fn registers_parse_back_to_reg_atoms() {
        let parsed = parse("v17").unwrap();
        assert_eq!(parsed, vec![Atom::Reg(Register { class: RegClass::V, index: 17 })]);
    }

    #[test]
    fn quoted_strings_round_trip_with_escapes() {
        let atoms = vec![Atom::Str("has \"quotes\" and \\backslash".to_string())];
        let text = serialize(&atoms);
        assert_eq!(parse(&text).unwrap(), atoms);
    }
}
