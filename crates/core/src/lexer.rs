//! Byte lexer for RIB streams.
//!
//! Text and binary encodings share one stream: bytes below 0x80 are read as
//! text, bytes from 0x80 up introduce a binary token. The lexer keeps one byte
//! of pushback and the two binary definition tables (encoded requests and
//! string tokens) for the lifetime of the stream.

use std::collections::HashMap;
use std::io::{self, BufReader, Read};

use crate::error::RibError;
use crate::request::Request;

#[derive(Debug, Clone, PartialEq)]
pub enum Lexeme {
    Eof,
    /// `#` comment (`structured` for `##`), without the leading marks.
    Comment { text: String, structured: bool },
    Int(i32),
    Float(f32),
    Str(String),
    /// Binary float array, already complete.
    FloatArray(Vec<f32>),
    ArrayStart,
    ArrayEnd,
    /// Bare word; resolved to a request by the parser.
    Request(String),
    /// Binary request reference, resolved through the definition table.
    EncodedRequest(Request),
    /// Binary request reference with no definition.
    UndefinedRequest(u8),
    NotAToken(u8),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub lexeme: Lexeme,
    pub line: u32,
}

pub struct Lexer<R: Read> {
    bytes: io::Bytes<BufReader<R>>,
    pushback: Option<u8>,
    line: u32,
    requests: [Option<Request>; 256],
    strings: HashMap<u16, String>,
}

fn is_delimiter(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b'[' | b']' | b'"' | b'#') || b >= 0x80
}

impl<R: Read> Lexer<R> {
    pub fn new(input: R) -> Self {
        Lexer {
            bytes: BufReader::new(input).bytes(),
            pushback: None,
            line: 1,
            requests: [None; 256],
            strings: HashMap::new(),
        }
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    fn byte(&mut self) -> Result<Option<u8>, RibError> {
        if let Some(b) = self.pushback.take() {
            return Ok(Some(b));
        }
        Ok(self.bytes.next().transpose()?)
    }

    fn unread(&mut self, b: u8) {
        self.pushback = Some(b);
    }

    /// A byte of a binary payload; end of stream is an error.
    fn payload(&mut self, what: &str) -> Result<u8, RibError> {
        self.byte()?.ok_or_else(|| {
            RibError::syntax(self.line, format!("stream ends inside binary {}", what))
        })
    }

    fn payload_bytes(&mut self, n: usize, what: &str) -> Result<Vec<u8>, RibError> {
        (0..n).map(|_| self.payload(what)).collect()
    }

    fn unsigned(&mut self, n: usize, what: &str) -> Result<u32, RibError> {
        let mut v: u32 = 0;
        for _ in 0..n {
            v = (v << 8) | u32::from(self.payload(what)?);
        }
        Ok(v)
    }

    pub fn next_lexeme(&mut self) -> Result<Spanned, RibError> {
        loop {
            let Some(b) = self.byte()? else {
                return Ok(self.at(Lexeme::Eof));
            };
            match b {
                b'\n' => self.line += 1,
                _ if b.is_ascii_whitespace() => {}
                b'#' => return self.comment(),
                b'"' => return self.string(),
                b'[' => return Ok(self.at(Lexeme::ArrayStart)),
                b']' => return Ok(self.at(Lexeme::ArrayEnd)),
                b'0'..=b'9' | b'+' | b'-' | b'.' => return self.number(b),
                _ if b.is_ascii_alphabetic() || b == b'_' => return self.word(b),
                0x80..=0xff => {
                    if let Some(lexeme) = self.binary(b)? {
                        return Ok(self.at(lexeme));
                    }
                }
                _ => return Ok(self.at(Lexeme::NotAToken(b))),
            }
        }
    }

    fn at(&self, lexeme: Lexeme) -> Spanned {
        Spanned {
            lexeme,
            line: self.line,
        }
    }

    fn comment(&mut self) -> Result<Spanned, RibError> {
        let line = self.line;
        let mut structured = false;
        let mut text = Vec::new();
        match self.byte()? {
            Some(b'#') => structured = true,
            Some(b) => self.unread(b),
            None => {}
        }
        while let Some(b) = self.byte()? {
            if b == b'\n' {
                self.line += 1;
                break;
            }
            text.push(b);
        }
        if text.last() == Some(&b'\r') {
            text.pop();
        }
        Ok(Spanned {
            lexeme: Lexeme::Comment {
                text: String::from_utf8_lossy(&text).into_owned(),
                structured,
            },
            line,
        })
    }

    fn string(&mut self) -> Result<Spanned, RibError> {
        let line = self.line;
        let mut out = Vec::new();
        loop {
            let b = self
                .byte()?
                .ok_or_else(|| RibError::syntax(line, "unterminated string"))?;
            match b {
                b'"' => break,
                b'\n' => {
                    self.line += 1;
                    out.push(b);
                }
                b'\\' => self.escape(line, &mut out)?,
                _ => out.push(b),
            }
        }
        Ok(Spanned {
            lexeme: Lexeme::Str(String::from_utf8_lossy(&out).into_owned()),
            line,
        })
    }

    fn escape(&mut self, line: u32, out: &mut Vec<u8>) -> Result<(), RibError> {
        let b = self
            .byte()?
            .ok_or_else(|| RibError::syntax(line, "unterminated escape in string"))?;
        match b {
            b'n' => out.push(b'\n'),
            b't' => out.push(b'\t'),
            b'r' => out.push(b'\r'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'\\' | b'"' => out.push(b),
            // line continuation
            b'\n' => self.line += 1,
            b'\r' => match self.byte()? {
                Some(b'\n') => self.line += 1,
                Some(other) => self.unread(other),
                None => {}
            },
            b'0'..=b'7' => {
                let mut v = u32::from(b - b'0');
                for _ in 0..2 {
                    match self.byte()? {
                        Some(d @ b'0'..=b'7') => v = v * 8 + u32::from(d - b'0'),
                        Some(other) => {
                            self.unread(other);
                            break;
                        }
                        None => break,
                    }
                }
                out.push((v & 0xff) as u8);
            }
            other => out.push(other),
        }
        Ok(())
    }

    fn number(&mut self, first: u8) -> Result<Spanned, RibError> {
        let mut text = String::new();
        text.push(char::from(first));
        while let Some(b) = self.byte()? {
            if b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-') {
                text.push(char::from(b));
            } else {
                self.unread(b);
                break;
            }
        }
        let malformed = || RibError::syntax(self.line, format!("malformed number '{}'", text));
        let is_float = text.contains(['.', 'e', 'E']);
        let lexeme = if is_float {
            Lexeme::Float(text.parse::<f32>().map_err(|_| malformed())?)
        } else {
            match text.parse::<i64>() {
                Ok(v) => match i32::try_from(v) {
                    Ok(i) => Lexeme::Int(i),
                    Err(_) => Lexeme::Float(v as f32),
                },
                Err(_) => return Err(malformed()),
            }
        };
        Ok(self.at(lexeme))
    }

    fn word(&mut self, first: u8) -> Result<Spanned, RibError> {
        let mut text = String::new();
        text.push(char::from(first));
        while let Some(b) = self.byte()? {
            if is_delimiter(b) {
                self.unread(b);
                break;
            }
            text.push(char::from(b));
        }
        Ok(self.at(Lexeme::Request(text)))
    }

    /// Decode one binary token. Definitions yield `None`.
    fn binary(&mut self, code: u8) -> Result<Option<Lexeme>, RibError> {
        let lexeme = match code {
            0x80..=0x8f => {
                let len = usize::from(code & 0x03) + 1;
                let frac = i32::from((code >> 2) & 0x03);
                let raw = self.unsigned(len, "number")?;
                // sign-extend from `len` bytes
                let shift = 32 - 8 * len as u32;
                let value = ((raw << shift) as i32) >> shift;
                if frac == 0 {
                    Lexeme::Int(value)
                } else {
                    Lexeme::Float(value as f32 / 256f32.powi(frac))
                }
            }
            0x90..=0x9f => Lexeme::Str(self.binary_string(usize::from(code & 0x0f))?),
            0xa0..=0xa3 => {
                let len = self.unsigned(usize::from(code & 0x03) + 1, "string length")?;
                Lexeme::Str(self.binary_string(len as usize)?)
            }
            0xa4 => {
                let b = self.payload_bytes(4, "float")?;
                Lexeme::Float(f32::from_be_bytes([b[0], b[1], b[2], b[3]]))
            }
            0xa5 => {
                let b = self.payload_bytes(8, "double")?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&b);
                Lexeme::Float(f64::from_be_bytes(raw) as f32)
            }
            0xa6 => {
                let op = self.payload("request")?;
                match self.requests[usize::from(op)] {
                    Some(r) => Lexeme::EncodedRequest(r),
                    None => Lexeme::UndefinedRequest(op),
                }
            }
            0xc8..=0xcb => {
                let n = self.unsigned(usize::from(code & 0x03) + 1, "array length")? as usize;
                let mut values = Vec::with_capacity(n.min(1 << 16));
                for _ in 0..n {
                    let b = self.payload_bytes(4, "float array")?;
                    values.push(f32::from_be_bytes([b[0], b[1], b[2], b[3]]));
                }
                Lexeme::FloatArray(values)
            }
            0xcc => {
                let op = self.payload("request definition")?;
                let name = self.definition_string()?;
                let request = Request::from_name(&name).ok_or_else(|| {
                    RibError::bad(self.line, format!("cannot encode unknown request '{}'", name))
                })?;
                self.requests[usize::from(op)] = Some(request);
                return Ok(None);
            }
            0xcd | 0xce => {
                let token = self.unsigned(usize::from(code - 0xcd) + 1, "string token")? as u16;
                let text = self.definition_string()?;
                self.strings.insert(token, text);
                return Ok(None);
            }
            0xcf | 0xd0 => {
                let token = self.unsigned(usize::from(code - 0xcf) + 1, "string token")? as u16;
                let text = self.strings.get(&token).cloned().ok_or_else(|| {
                    RibError::bad(self.line, format!("string token {} was never defined", token))
                })?;
                Lexeme::Str(text)
            }
            _ => Lexeme::NotAToken(code),
        };
        Ok(Some(lexeme))
    }

    fn binary_string(&mut self, len: usize) -> Result<String, RibError> {
        let bytes = self.payload_bytes(len, "string")?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// The string operand of a binary definition, in either encoding.
    fn definition_string(&mut self) -> Result<String, RibError> {
        let line = self.line;
        match self.next_lexeme()?.lexeme {
            Lexeme::Str(s) => Ok(s),
            other => Err(RibError::syntax(
                line,
                format!("binary definition expects a string, found {:?}", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(input: &[u8]) -> Vec<Lexeme> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        loop {
            let s = lexer.next_lexeme().unwrap();
            if s.lexeme == Lexeme::Eof {
                break;
            }
            out.push(s.lexeme);
        }
        out
    }

    #[test]
    fn text_tokens() {
        let lexemes = lex_all(b"Sphere 1 -1.5 2e1 [ \"a\\tb\" ] # note\n");
        assert_eq!(
            lexemes,
            vec![
                Lexeme::Request("Sphere".into()),
                Lexeme::Int(1),
                Lexeme::Float(-1.5),
                Lexeme::Float(20.0),
                Lexeme::ArrayStart,
                Lexeme::Str("a\tb".into()),
                Lexeme::ArrayEnd,
                Lexeme::Comment {
                    text: " note".into(),
                    structured: false
                },
            ]
        );
    }

    #[test]
    fn words_stop_at_brackets() {
        assert_eq!(
            lex_all(b"Color[1 0 0]"),
            vec![
                Lexeme::Request("Color".into()),
                Lexeme::ArrayStart,
                Lexeme::Int(1),
                Lexeme::Int(0),
                Lexeme::Int(0),
                Lexeme::ArrayEnd,
            ]
        );
    }

    #[test]
    fn octal_escapes_and_continuations() {
        assert_eq!(
            lex_all(b"\"\\101\\\nB\""),
            vec![Lexeme::Str("AB".into())]
        );
    }

    #[test]
    fn line_numbers_advance() {
        let mut lexer = Lexer::new(&b"WorldBegin\n\n\"x\ny\" Sphere"[..]);
        assert_eq!(lexer.next_lexeme().unwrap().line, 1);
        assert_eq!(lexer.next_lexeme().unwrap().line, 3);
        assert_eq!(lexer.next_lexeme().unwrap().line, 4);
    }

    #[test]
    fn fixed_point_numbers() {
        // 1-byte -1, 2-byte 360, 2 bytes with one fraction byte = 1.5
        assert_eq!(
            lex_all(&[0x80, 0xff, 0x81, 0x01, 0x68, 0x85, 0x01, 0x80]),
            vec![Lexeme::Int(-1), Lexeme::Int(360), Lexeme::Float(1.5)]
        );
    }

    #[test]
    fn binary_floats_and_arrays() {
        let mut input = vec![0xa4];
        input.extend_from_slice(&2.5f32.to_be_bytes());
        input.extend_from_slice(&[0xc8, 0x02]);
        input.extend_from_slice(&1.0f32.to_be_bytes());
        input.extend_from_slice(&(-1.0f32).to_be_bytes());
        assert_eq!(
            lex_all(&input),
            vec![Lexeme::Float(2.5), Lexeme::FloatArray(vec![1.0, -1.0])]
        );
    }

    #[test]
    fn encoded_requests_and_string_tokens() {
        let mut input = vec![0xcc, 0x07, 0x96];
        input.extend_from_slice(b"Sphere");
        input.extend_from_slice(&[0xa6, 0x07, 0xcd, 0x02, 0x97]);
        input.extend_from_slice(b"plastic");
        input.extend_from_slice(&[0xcf, 0x02]);
        assert_eq!(
            lex_all(&input),
            vec![
                Lexeme::EncodedRequest(Request::Sphere),
                Lexeme::Str("plastic".into()),
            ]
        );
    }

    #[test]
    fn undefined_binary_references() {
        let mut lexer = Lexer::new(&[0xa6u8, 0x09][..]);
        assert_eq!(
            lexer.next_lexeme().unwrap().lexeme,
            Lexeme::UndefinedRequest(9)
        );
        let mut lexer = Lexer::new(&[0xcfu8, 0x01][..]);
        assert!(lexer.next_lexeme().is_err());
    }

    #[test]
    fn reserved_bytes_are_not_tokens() {
        assert_eq!(lex_all(&[0xb0, b'{']), vec![Lexeme::NotAToken(0xb0), Lexeme::NotAToken(b'{')]);
    }

    #[test]
    fn malformed_number() {
        let mut lexer = Lexer::new(&b"1.2.3"[..]);
        assert!(lexer.next_lexeme().is_err());
    }
}
