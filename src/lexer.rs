//! Byte-stream scanner for Squirt source.
//!
//! Consumes raw bytes and emits tokens with line/column spans. High-bit bytes
//! are treated as identifier characters, so UTF-8 names pass through without
//! decoding.

use crate::error::ParseError;
use crate::token::{reserved, Span, Token, TokenKind};

fn escape_char(c: u8) -> Option<u8> {
    match c {
        b'a' => Some(0x07),
        b'b' => Some(0x08),
        b'f' => Some(0x0c),
        b'n' => Some(b'\n'),
        b'r' => Some(b'\r'),
        b't' => Some(b'\t'),
        b'v' => Some(0x0b),
        b'\\' | b'"' | b'\'' => Some(c),
        _ => None,
    }
}

fn is_newline(c: Option<u8>) -> bool {
    matches!(c, Some(b'\n') | Some(b'\r'))
}

fn is_ident_start(c: u8) -> bool {
    c == b'_' || c.is_ascii_alphabetic() || c >= 0x80
}

fn is_ident(c: u8) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

pub struct Lexer {
    file: bool,
    origin: String,
    src: Vec<u8>,
    pos: usize,
    current: Option<u8>,
    buffer: Vec<u8>,
    line: usize,
    col: usize,
}

impl Lexer {
    /// `origin` is the file path when `file` is set, the source text itself
    /// otherwise; it only feeds error rendering.
    pub fn new(source: &str, file: bool, origin: &str) -> Self {
        let mut lexer = Self {
            file,
            origin: origin.to_string(),
            src: source.as_bytes().to_vec(),
            pos: 0,
            current: None,
            buffer: Vec::new(),
            line: 1,
            col: 0,
        };
        lexer.advance();
        lexer.skip_shebang();
        lexer
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            file: self.file,
            source: self.origin.clone(),
            message: message.into(),
            span: Span::point(self.line, self.col),
        }
    }

    fn expected(&self, what: &str) -> ParseError {
        let found = match self.current {
            None => "<eof>".to_string(),
            Some(b'\n') | Some(b'\r') => "<newline>".to_string(),
            Some(c) => (c as char).to_string(),
        };
        self.error(format!("expected {what} but found {found}"))
    }

    fn advance(&mut self) {
        self.current = self.src.get(self.pos).copied();
        self.pos += 1;
        self.col += 1;
    }

    /// Consumes a newline, folding a `\r\n` (or `\n\r`) pair into one line.
    fn increment_line(&mut self) {
        let old = self.current;
        self.advance();
        if is_newline(self.current) && self.current != old {
            self.advance();
        }
        self.line += 1;
        self.col = 1;
    }

    fn save(&mut self, c: u8) {
        self.buffer.push(c);
    }

    fn save_and_advance(&mut self) {
        if let Some(c) = self.current {
            self.buffer.push(c);
        }
        self.advance();
    }

    fn take_buffer(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        text
    }

    fn skip_shebang(&mut self) {
        if self.current == Some(b'#') && self.src.get(self.pos) == Some(&b'!') {
            while self.current.is_some() && !is_newline(self.current) {
                self.advance();
            }
        }
    }

    fn eos_token(&self) -> Token {
        Token::eos(Span::point(self.line, self.col))
    }

    /// Body of a backtick literal or a `/* */` comment. The opening delimiter
    /// has been consumed; consumes through the closing one.
    fn read_multiline(&mut self, comment: bool) -> Result<String, ParseError> {
        if is_newline(self.current) {
            self.increment_line();
        }
        loop {
            match self.current {
                None => return Err(self.error("unfinished multiline text")),
                Some(b'`') if !comment => {
                    self.advance();
                    break;
                }
                Some(b'*') if comment => {
                    self.advance();
                    if self.current == Some(b'/') {
                        self.advance();
                        break;
                    }
                    self.save(b'*');
                }
                Some(b'\n') | Some(b'\r') => {
                    self.save(b'\n');
                    self.increment_line();
                }
                Some(c) => {
                    self.save(c);
                    self.advance();
                }
            }
        }
        let mut text = self.take_buffer();
        if text.ends_with('\n') {
            text.pop();
        }
        Ok(text)
    }

    fn read_hex_escape(&mut self) -> Result<u8, ParseError> {
        self.advance();
        let mut value: u8 = 0;
        for _ in 0..2 {
            let digit = self
                .current
                .and_then(hex_digit)
                .ok_or_else(|| self.expected("hexadecimal digit"))?;
            value = value << 4 | digit;
            self.advance();
        }
        Ok(value)
    }

    fn read_decimal_escape(&mut self) -> Result<u8, ParseError> {
        let mut value: u32 = 0;
        let mut count = 0;
        while count < 3 {
            match self.current {
                Some(c) if c.is_ascii_digit() => {
                    value = value * 10 + u32::from(c - b'0');
                    count += 1;
                    self.advance();
                }
                _ => break,
            }
        }
        if value > u32::from(u8::MAX) {
            return Err(self.error("decimal escape too large"));
        }
        Ok(value as u8)
    }

    fn read_string(&mut self) -> Result<Token, ParseError> {
        let delimiter = self.current;
        let start_line = self.line;
        let start_col = self.col;
        self.advance();
        loop {
            match self.current {
                None | Some(b'\n') | Some(b'\r') => return Err(self.error("unfinished string")),
                c if c == delimiter => break,
                Some(b'\\') => {
                    self.advance();
                    match self.current {
                        Some(b'\n') | Some(b'\r') => {
                            self.increment_line();
                            self.save(b'\n');
                        }
                        Some(b'x') => {
                            let value = self.read_hex_escape()?;
                            self.save(value);
                        }
                        Some(b'z') => {
                            self.advance();
                            while matches!(
                                self.current,
                                Some(b' ') | Some(b'\t') | Some(b'\x0b') | Some(b'\x0c')
                                    | Some(b'\n') | Some(b'\r')
                            ) {
                                if is_newline(self.current) {
                                    self.increment_line();
                                } else {
                                    self.advance();
                                }
                            }
                        }
                        Some(c) if c.is_ascii_digit() => {
                            let value = self.read_decimal_escape()?;
                            self.save(value);
                        }
                        Some(c) => match escape_char(c) {
                            Some(to) => {
                                self.advance();
                                self.save(to);
                            }
                            None => return Err(self.error("invalid escape sequence")),
                        },
                        None => {}
                    }
                }
                Some(c) => {
                    self.save(c);
                    self.advance();
                }
            }
        }
        self.advance();
        let value = self.take_buffer();
        Ok(Token {
            kind: TokenKind::Str,
            number_value: 0.0,
            string_value: value,
            loc: Span {
                start_line,
                start_col,
                end_line: self.line,
                end_col: self.col - 1,
            },
        })
    }

    fn read_digits(&mut self) {
        while matches!(self.current, Some(c) if c.is_ascii_digit()) {
            self.save_and_advance();
        }
    }

    /// Accumulates hex digits into `seed` per digit-by-digit `n*16 + d`.
    /// Returns the value and how many digits were consumed.
    fn read_hex_digits(&mut self, seed: f64) -> (f64, u32) {
        let mut value = seed;
        let mut count = 0;
        while let Some(digit) = self.current.and_then(hex_digit) {
            self.save_and_advance();
            value = value * 16.0 + f64::from(digit);
            count += 1;
        }
        (value, count)
    }

    fn read_number(&mut self, start_line: usize, start_col: usize) -> Result<Token, ParseError> {
        let first = self.current;
        self.save_and_advance();
        if first == Some(b'0') && matches!(self.current, Some(b'x') | Some(b'X')) {
            return self.read_hex_number(start_line, start_col);
        }

        self.read_digits();
        if self.current == Some(b'.') {
            self.save_and_advance();
            self.read_digits();
        }
        if matches!(self.current, Some(b'e') | Some(b'E')) {
            self.save_and_advance();
            if matches!(self.current, Some(b'+') | Some(b'-')) {
                self.save_and_advance();
            }
            self.read_digits();
        }
        let mut literal = self.take_buffer();
        if literal.starts_with('0') {
            let trimmed = literal.trim_start_matches('0');
            if trimmed.is_empty() || !trimmed.as_bytes()[0].is_ascii_digit() {
                literal = format!("0{trimmed}");
            } else {
                literal = trimmed.to_string();
            }
        }
        let value: f64 = literal
            .parse()
            .map_err(|_| self.error("malformed number"))?;
        Ok(Token {
            kind: TokenKind::Number,
            number_value: value,
            string_value: literal,
            loc: Span {
                start_line,
                start_col,
                end_line: self.line,
                end_col: self.col - 1,
            },
        })
    }

    fn read_hex_number(&mut self, start_line: usize, start_col: usize) -> Result<Token, ParseError> {
        self.save_and_advance(); // the x
        let (mut fraction, int_digits) = self.read_hex_digits(0.0);
        let mut frac_digits = 0;
        if self.current == Some(b'.') {
            self.save_and_advance();
            let (value, count) = self.read_hex_digits(fraction);
            fraction = value;
            frac_digits = count;
        }
        if int_digits == 0 && frac_digits == 0 {
            return Err(self.error("malformed number"));
        }
        // Each hex fraction digit shifts the mantissa by four bits.
        let mut exponent = -4 * frac_digits as i32;

        let mut literal = self.take_buffer();

        if let Some(marker @ (b'p' | b'P')) = self.current {
            let marker = marker as char;
            self.advance();
            let mut negative = false;
            let mut sign = String::new();
            if let Some(c @ (b'+' | b'-')) = self.current {
                negative = c == b'-';
                sign = (c as char).to_string();
                self.advance();
            }
            if !matches!(self.current, Some(c) if c.is_ascii_digit()) {
                return Err(self.error("malformed number"));
            }
            self.read_digits();
            let digits = self.take_buffer();
            let exp: i32 = digits.parse().map_err(|_| self.error("malformed number"))?;
            exponent += if negative { -exp } else { exp };
            literal = format!("{literal}{marker}{sign}{digits}");
        }

        let value = fraction * 2f64.powi(exponent);
        Ok(Token {
            kind: TokenKind::Number,
            number_value: value,
            string_value: literal,
            loc: Span {
                start_line,
                start_col,
                end_line: self.line,
                end_col: self.col - 1,
            },
        })
    }

    fn compound(
        &mut self,
        start_line: usize,
        start_col: usize,
        pairs: &[(u8, TokenKind)],
        single: TokenKind,
    ) -> Token {
        self.advance();
        for (next, kind) in pairs {
            if self.current == Some(*next) {
                self.advance();
                return Token::new(
                    *kind,
                    Span {
                        start_line,
                        start_col,
                        end_line: self.line,
                        end_col: self.col - 1,
                    },
                );
            }
        }
        Token::new(single, Span::point(start_line, start_col))
    }

    pub fn scan(&mut self) -> Result<Token, ParseError> {
        loop {
            let line = self.line;
            let col = self.col;
            match self.current {
                Some(b'\n') | Some(b'\r') => self.increment_line(),
                Some(b' ') | Some(b'\t') | Some(b'\x0b') | Some(b'\x0c') | Some(0) => {
                    self.advance()
                }
                Some(b'/') => {
                    self.advance();
                    match self.current {
                        Some(b'/') => {
                            while self.current.is_some() && !is_newline(self.current) {
                                self.advance();
                            }
                        }
                        Some(b'*') => {
                            self.advance();
                            self.read_multiline(true)?;
                        }
                        _ => return Ok(Token::new(TokenKind::Sym(b'/'), Span::point(line, col))),
                    }
                }
                None => return Ok(self.eos_token()),
                Some(b'`') => {
                    self.advance();
                    let value = self.read_multiline(false)?;
                    return Ok(Token {
                        kind: TokenKind::Str,
                        number_value: 0.0,
                        string_value: value,
                        loc: Span {
                            start_line: line,
                            start_col: col,
                            end_line: self.line,
                            end_col: self.col - 1,
                        },
                    });
                }
                Some(b'"') | Some(b'\'') => return self.read_string(),
                Some(b'=') => {
                    return Ok(self.compound(line, col, &[(b'=', TokenKind::Eq)], TokenKind::Sym(b'=')))
                }
                Some(b'<') => {
                    return Ok(self.compound(
                        line,
                        col,
                        &[(b'=', TokenKind::Le), (b'<', TokenKind::ShiftLeft)],
                        TokenKind::Sym(b'<'),
                    ))
                }
                Some(b'>') => {
                    return Ok(self.compound(
                        line,
                        col,
                        &[(b'=', TokenKind::Ge), (b'>', TokenKind::ShiftRight)],
                        TokenKind::Sym(b'>'),
                    ))
                }
                Some(b'!') => {
                    return Ok(self.compound(line, col, &[(b'=', TokenKind::Ne)], TokenKind::Sym(b'!')))
                }
                Some(b'-') => {
                    return Ok(self.compound(
                        line,
                        col,
                        &[(b'-', TokenKind::Decrement), (b'=', TokenKind::DecrEq)],
                        TokenKind::Sym(b'-'),
                    ))
                }
                Some(b'+') => {
                    return Ok(self.compound(
                        line,
                        col,
                        &[(b'+', TokenKind::Increment), (b'=', TokenKind::IncrEq)],
                        TokenKind::Sym(b'+'),
                    ))
                }
                Some(b'.') => {
                    self.advance();
                    if self.current == Some(b'.') {
                        self.advance();
                        if self.current == Some(b'.') {
                            self.advance();
                            return Ok(Token::new(
                                TokenKind::Spread,
                                Span {
                                    start_line: line,
                                    start_col: col,
                                    end_line: self.line,
                                    end_col: self.col - 1,
                                },
                            ));
                        }
                        return Err(self.error("unexpected token .. found"));
                    }
                    if matches!(self.current, Some(c) if c.is_ascii_digit()) {
                        self.save(b'.');
                        return self.read_number(line, col);
                    }
                    return Ok(Token::new(TokenKind::Sym(b'.'), Span::point(line, col)));
                }
                Some(c) if c.is_ascii_digit() => return self.read_number(line, col),
                Some(c) if is_ident_start(c) => {
                    while matches!(self.current, Some(c) if is_ident(c)) {
                        self.save_and_advance();
                    }
                    let word = self.take_buffer();
                    let (kind, keep) = match reserved(&word) {
                        Some(kind) => (kind, word),
                        None => (TokenKind::Name, word),
                    };
                    return Ok(Token {
                        kind,
                        number_value: 0.0,
                        string_value: keep,
                        loc: Span {
                            start_line: line,
                            start_col: col,
                            end_line: self.line,
                            end_col: self.col - 1,
                        },
                    });
                }
                Some(c) => {
                    self.advance();
                    return Ok(Token::new(TokenKind::Sym(c), Span::point(line, col)));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_all(source: &str) -> Result<Vec<Token>, ParseError> {
        let mut lexer = Lexer::new(source, false, source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.scan()?;
            if token.kind == TokenKind::Eos {
                return Ok(tokens);
            }
            tokens.push(token);
        }
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        scan_all(source)
            .expect("scan should succeed")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn scan_err(source: &str) -> String {
        scan_all(source).expect_err("expected scan failure").message
    }

    #[test]
    fn scans_nothing_from_whitespace_and_comments() {
        assert!(kinds("").is_empty());
        assert!(kinds("// short comment").is_empty());
        assert!(kinds("/* long comment */").is_empty());
        assert!(kinds("/* long *com/ment */").is_empty());
        assert!(kinds("// hello, world\n").is_empty());
        assert!(kinds("  \t \x0c\x0b \r\n ").is_empty());
    }

    #[test]
    fn scans_single_char_tokens() {
        assert_eq!(kinds("-"), vec![TokenKind::Sym(b'-')]);
        assert_eq!(kinds("="), vec![TokenKind::Sym(b'=')]);
        assert_eq!(kinds("."), vec![TokenKind::Sym(b'.')]);
        assert_eq!(kinds(":"), vec![TokenKind::Sym(b':')]);
        assert_eq!(kinds("#"), vec![TokenKind::Sym(b'#')]);
        assert_eq!(kinds("@"), vec![TokenKind::Sym(b'@')]);
    }

    #[test]
    fn scans_compound_operators() {
        assert_eq!(kinds("..."), vec![TokenKind::Spread]);
        assert_eq!(kinds("=="), vec![TokenKind::Eq]);
        assert_eq!(kinds(">="), vec![TokenKind::Ge]);
        assert_eq!(kinds("<="), vec![TokenKind::Le]);
        assert_eq!(kinds("!="), vec![TokenKind::Ne]);
        assert_eq!(kinds("<<"), vec![TokenKind::ShiftLeft]);
        assert_eq!(kinds(">>"), vec![TokenKind::ShiftRight]);
        assert_eq!(kinds("--"), vec![TokenKind::Decrement]);
        assert_eq!(kinds("-="), vec![TokenKind::DecrEq]);
        assert_eq!(kinds("++"), vec![TokenKind::Increment]);
        assert_eq!(kinds("+="), vec![TokenKind::IncrEq]);
        assert_eq!(scan_err(".."), "unexpected token .. found");
    }

    #[test]
    fn scans_reserved_words() {
        for word in [
            "and", "attr", "break", "class", "cleanup", "do", "else", "elseif", "end", "false",
            "for", "func", "if", "in", "isa", "next", "nil", "or", "return", "then", "true",
            "while",
        ] {
            let tokens = scan_all(word).expect("scan should succeed");
            assert_eq!(tokens.len(), 1, "{word}");
            assert_ne!(tokens[0].kind, TokenKind::Name, "{word}");
            assert_eq!(tokens[0].string_value, word);
        }
    }

    #[test]
    fn scans_names() {
        for name in ["_foo", "baz123", "boo_boo"] {
            let tokens = scan_all(name).expect("scan should succeed");
            assert_eq!(tokens[0].kind, TokenKind::Name);
            assert_eq!(tokens[0].string_value, name);
        }
    }

    #[test]
    fn scans_quoted_strings() {
        let tokens = scan_all("\"hello, world\"").expect("scan should succeed");
        assert_eq!(tokens[0].kind, TokenKind::Str);
        assert_eq!(tokens[0].string_value, "hello, world");

        let tokens = scan_all("'it''s'").expect("scan should succeed");
        assert_eq!(tokens[0].string_value, "it");
        assert_eq!(tokens[1].string_value, "s");
    }

    #[test]
    fn scans_string_escapes() {
        let tokens = scan_all(r#""a\tb\n\x41\65\\""#).expect("scan should succeed");
        assert_eq!(tokens[0].string_value, "a\tb\nAA\\");

        let tokens = scan_all("\"a\\z  \n  b\"").expect("scan should succeed");
        assert_eq!(tokens[0].string_value, "ab");

        assert_eq!(scan_err(r#""\999""#), "decimal escape too large");
        assert_eq!(scan_err(r#""\q""#), "invalid escape sequence");
        assert_eq!(
            scan_err(r#""\xg""#),
            "expected hexadecimal digit but found g"
        );
        assert_eq!(scan_err("\"abc\n\""), "unfinished string");
        assert_eq!(scan_err("\"abc"), "unfinished string");
    }

    #[test]
    fn scans_multiline_strings() {
        let tokens = scan_all("`hello,\r\nworld`").expect("scan should succeed");
        assert_eq!(tokens[0].string_value, "hello,\nworld");

        // one trailing newline is stripped
        let tokens = scan_all("`line\n`").expect("scan should succeed");
        assert_eq!(tokens[0].string_value, "line");

        let tokens = scan_all("`a ], b`").expect("scan should succeed");
        assert_eq!(tokens[0].string_value, "a ], b");

        assert_eq!(scan_err("`hello world"), "unfinished multiline text");
    }

    #[test]
    fn scans_decimal_numbers() {
        let cases = [
            (".34", 0.34, ".34"),
            ("3", 3.0, "3"),
            ("3.0", 3.0, "3.0"),
            ("3.1416", 3.1416, "3.1416"),
            ("314.16e-2", 3.1416, "314.16e-2"),
            ("0.31416E1", 3.1416, "0.31416E1"),
        ];
        for (source, value, literal) in cases {
            let tokens = scan_all(source).expect(source);
            assert_eq!(tokens[0].kind, TokenKind::Number, "{source}");
            assert_eq!(tokens[0].number_value, value, "{source}");
            assert_eq!(tokens[0].string_value, literal, "{source}");
        }
        assert_eq!(scan_err("3.1416e"), "malformed number");
    }

    #[test]
    fn scans_hex_numbers() {
        let cases = [
            ("0xff", 255.0, "0xff"),
            ("0x0.1E", 0.1171875, "0x0.1E"),
            ("0xA23p-4", 162.1875, "0xA23p-4"),
            ("0X1.921FB54442D18P+1", std::f64::consts::PI, "0X1.921FB54442D18P+1"),
        ];
        for (source, value, literal) in cases {
            let tokens = scan_all(source).expect(source);
            assert_eq!(tokens[0].number_value, value, "{source}");
            assert_eq!(tokens[0].string_value, literal, "{source}");
        }
        assert_eq!(scan_err("0xA23p"), "malformed number");
        assert_eq!(scan_err("0x"), "malformed number");
    }

    #[test]
    fn scans_negated_hex_as_two_tokens() {
        let tokens = scan_all("  -0xa  ").expect("scan should succeed");
        assert_eq!(tokens[0].kind, TokenKind::Sym(b'-'));
        assert_eq!(tokens[1].number_value, 10.0);
    }

    #[test]
    fn skips_shebang_line() {
        let tokens = scan_all("#!/usr/bin/env squirt\nx = 1").expect("scan should succeed");
        assert_eq!(tokens[0].kind, TokenKind::Name);
        assert_eq!(tokens[0].string_value, "x");
    }

    #[test]
    fn tracks_line_and_column_locations() {
        let tokens = scan_all("a = 1\n  b").expect("scan should succeed");
        assert_eq!(tokens[0].loc, Span::point(1, 1));
        assert_eq!(tokens[1].loc, Span::point(1, 3));
        assert_eq!(tokens[2].loc, Span::point(1, 5));
        assert_eq!(tokens[3].loc, Span::point(2, 3));
    }
}
