//! Allocation-free GraphQL lexer.
//!
//! Tokens carry byte offsets into the source slice rather than owned
//! strings; the parser borrows identifier/literal text directly from the
//! input for the lifetime of a single compilation. This mirrors the
//! teacher's preference for zero-copy parsing on the hot compile path
//! (`fraiseql-core::compiler`), generalized here to GraphQL source instead
//! of a pre-parsed schema IR.

use gqlsql_error::{CompileError, Result};

/// A lexical token with its byte span in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'src> {
    /// The kind of token and its borrowed text payload, if any.
    pub kind: TokenKind<'src>,
    /// Byte offset of the first byte of this token in the source.
    pub offset: usize,
}

/// Token payload. Identifier and literal text borrows directly from the
/// source byte slice; no copies are made during lexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind<'src> {
    /// A GraphQL name: `[_A-Za-z][_0-9A-Za-z]*`.
    Name(&'src str),
    /// An integer literal, unparsed.
    IntVal(&'src str),
    /// A float literal, unparsed.
    FloatVal(&'src str),
    /// A quoted string literal with escapes still encoded.
    StringVal(&'src str),
    /// A `"""triple-quoted"""` block string, raw contents.
    BlockString(&'src str),
    /// `{`
    BraceOpen,
    /// `}`
    BraceClose,
    /// `(`
    ParenOpen,
    /// `)`
    ParenClose,
    /// `[`
    BracketOpen,
    /// `]`
    BracketClose,
    /// `:`
    Colon,
    /// `,`
    Comma,
    /// `=`
    Equals,
    /// `!`
    Bang,
    /// `$`
    Dollar,
    /// `@`
    At,
    /// `|`
    Pipe,
    /// `&`
    Amp,
    /// `...`
    Spread,
    /// End of input.
    Eof,
}

/// Tokenizes `source` eagerly into a `Vec<Token>`.
///
/// # Errors
/// Returns [`CompileError::Lex`] on the first malformed token.
pub fn lex(source: &str) -> Result<Vec<Token<'_>>> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        let tok = lexer.next_token()?;
        let is_eof = matches!(tok.kind, TokenKind::Eof);
        tokens.push(tok);
        if is_eof {
            break;
        }
    }
    Ok(tokens)
}

struct Lexer<'src> {
    src: &'src str,
    bytes: &'src [u8],
    pos: usize,
}

impl<'src> Lexer<'src> {
    fn new(source: &'src str) -> Self {
        Self {
            src: source,
            bytes: source.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn skip_ignored(&mut self) {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\n' | b'\r' | b',') => self.pos += 1,
                Some(0xEF) if self.src[self.pos..].starts_with('\u{FEFF}') => {
                    self.pos += '\u{FEFF}'.len_utf8();
                }
                Some(b'#') => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Result<Token<'src>> {
        self.skip_ignored();
        let offset = self.pos;
        let Some(b) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                offset,
            });
        };

        let kind = match b {
            b'{' => self.single(TokenKind::BraceOpen),
            b'}' => self.single(TokenKind::BraceClose),
            b'(' => self.single(TokenKind::ParenOpen),
            b')' => self.single(TokenKind::ParenClose),
            b'[' => self.single(TokenKind::BracketOpen),
            b']' => self.single(TokenKind::BracketClose),
            b':' => self.single(TokenKind::Colon),
            b'=' => self.single(TokenKind::Equals),
            b'!' => self.single(TokenKind::Bang),
            b'$' => self.single(TokenKind::Dollar),
            b'@' => self.single(TokenKind::At),
            b'|' => self.single(TokenKind::Pipe),
            b'&' => self.single(TokenKind::Amp),
            b'.' => {
                if self.peek_at(1) == Some(b'.') && self.peek_at(2) == Some(b'.') {
                    self.pos += 3;
                    TokenKind::Spread
                } else {
                    return Err(CompileError::lex(offset, "unexpected '.' (expected '...')"));
                }
            }
            b'"' => self.lex_string(offset)?,
            b'-' | b'0'..=b'9' => self.lex_number(offset)?,
            c if c == b'_' || c.is_ascii_alphabetic() => self.lex_name(),
            _ => return Err(CompileError::lex(offset, "unrecognized byte")),
        };

        Ok(Token { kind, offset })
    }

    fn single(&mut self, kind: TokenKind<'src>) -> TokenKind<'src> {
        self.pos += 1;
        kind
    }

    fn lex_name(&mut self) -> TokenKind<'src> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == b'_' || c.is_ascii_alphanumeric() {
                self.pos += 1;
            } else {
                break;
            }
        }
        TokenKind::Name(&self.src[start..self.pos])
    }

    fn lex_number(&mut self, offset: usize) -> Result<TokenKind<'src>> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        if self.peek() == Some(b'0') {
            self.pos += 1;
            if matches!(self.peek(), Some(b'0'..=b'9')) {
                return Err(CompileError::lex(offset, "leading zero in number"));
            }
        } else {
            let digits_start = self.pos;
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.pos += 1;
            }
            if self.pos == digits_start {
                return Err(CompileError::lex(offset, "invalid number"));
            }
        }

        let mut is_float = false;
        if self.peek() == Some(b'.') {
            is_float = true;
            self.pos += 1;
            let frac_start = self.pos;
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.pos += 1;
            }
            if self.pos == frac_start {
                return Err(CompileError::lex(offset, "missing digits after decimal point"));
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            is_float = true;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            let exp_start = self.pos;
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.pos += 1;
            }
            if self.pos == exp_start {
                return Err(CompileError::lex(offset, "missing digits in exponent"));
            }
        }

        let text = &self.src[start..self.pos];
        Ok(if is_float {
            TokenKind::FloatVal(text)
        } else {
            TokenKind::IntVal(text)
        })
    }

    fn lex_string(&mut self, offset: usize) -> Result<TokenKind<'src>> {
        if self.peek_at(1) == Some(b'"') && self.peek_at(2) == Some(b'"') {
            return self.lex_block_string(offset);
        }
        self.pos += 1;
        let start = self.pos;
        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    return Err(CompileError::lex(offset, "unterminated string"));
                }
                Some(b'"') => {
                    let text = &self.src[start..self.pos];
                    self.pos += 1;
                    return Ok(TokenKind::StringVal(text));
                }
                Some(b'\\') => {
                    self.pos += 1;
                    if self.peek().is_none() {
                        return Err(CompileError::lex(offset, "unterminated string"));
                    }
                    match self.peek() {
                        Some(b'"' | b'\\' | b'/' | b'b' | b'f' | b'n' | b'r' | b't') => {
                            self.pos += 1;
                        }
                        Some(b'u') => {
                            self.pos += 1;
                            for _ in 0..4 {
                                if !matches!(self.peek(), Some(b'0'..=b'9' | b'a'..=b'f' | b'A'..=b'F')) {
                                    return Err(CompileError::lex(self.pos, "invalid escape"));
                                }
                                self.pos += 1;
                            }
                        }
                        _ => return Err(CompileError::lex(self.pos, "invalid escape")),
                    }
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    fn lex_block_string(&mut self, offset: usize) -> Result<TokenKind<'src>> {
        self.pos += 3;
        let start = self.pos;
        loop {
            match self.peek() {
                None => return Err(CompileError::lex(offset, "unterminated block string")),
                Some(b'"') if self.peek_at(1) == Some(b'"') && self.peek_at(2) == Some(b'"') => {
                    let text = &self.src[start..self.pos];
                    self.pos += 3;
                    return Ok(TokenKind::BlockString(text));
                }
                Some(_) => self.pos += 1,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexes_punctuation() {
        let toks = lex("{ } ( ) [ ] : = ! $ @ | & ...").unwrap();
        let kinds: Vec<_> = toks.iter().map(|t| t.kind).collect();
        assert!(matches!(kinds[0], TokenKind::BraceOpen));
        assert!(matches!(kinds.last().unwrap(), TokenKind::Eof));
        assert!(kinds.contains(&TokenKind::Spread));
    }

    #[test]
    fn lexes_name_and_offset() {
        let toks = lex("  products").unwrap();
        match toks[0] {
            Token {
                kind: TokenKind::Name("products"),
                offset: 2,
            } => {}
            other => panic!("unexpected token {other:?}"),
        }
    }

    #[test]
    fn lexes_numbers() {
        let toks = lex("42 -3.14 1e10").unwrap();
        assert!(matches!(toks[0].kind, TokenKind::IntVal("42")));
        assert!(matches!(toks[1].kind, TokenKind::FloatVal("-3.14")));
        assert!(matches!(toks[2].kind, TokenKind::FloatVal("1e10")));
    }

    #[test]
    fn rejects_leading_zero() {
        assert!(lex("007").is_err());
    }

    #[test]
    fn lexes_string_with_escape() {
        let toks = lex(r#""hello\nworld""#).unwrap();
        assert!(matches!(toks[0].kind, TokenKind::StringVal(r"hello\nworld")));
    }

    #[test]
    fn unterminated_string_is_lex_error() {
        let err = lex("\"unterminated").unwrap_err();
        assert!(matches!(err, CompileError::Lex { .. }));
    }

    #[test]
    fn lexes_block_string() {
        let toks = lex("\"\"\"a\nb\"\"\"").unwrap();
        assert!(matches!(toks[0].kind, TokenKind::BlockString("a\nb")));
    }

    #[test]
    fn skips_comments_and_commas() {
        let toks = lex("# comment\nfoo, bar").unwrap();
        assert!(matches!(toks[0].kind, TokenKind::Name("foo")));
        assert!(matches!(toks[1].kind, TokenKind::Name("bar")));
    }
}
