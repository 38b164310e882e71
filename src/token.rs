use std::fmt;

use serde::ser::{Serialize, SerializeTuple, Serializer};

/// Source location of a token or syntax node: start line/column through end
/// line/column, all 1-based. Serialized as a 4-element array in AST dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

impl Span {
    pub fn point(line: usize, col: usize) -> Self {
        Self {
            start_line: line,
            start_col: col,
            end_line: line,
            end_col: col,
        }
    }

    /// Span from the start of `self` through the end of `other`.
    pub fn through(self, other: Span) -> Span {
        Span {
            start_line: self.start_line,
            start_col: self.start_col,
            end_line: other.end_line,
            end_col: other.end_col,
        }
    }

    pub fn contains(&self, other: &Span) -> bool {
        let starts_before = self.start_line < other.start_line
            || (self.start_line == other.start_line && self.start_col <= other.start_col);
        let ends_after = self.end_line > other.end_line
            || (self.end_line == other.end_line && self.end_col >= other.end_col);
        starts_before && ends_after
    }
}

impl Serialize for Span {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(4)?;
        tuple.serialize_element(&self.start_line)?;
        tuple.serialize_element(&self.start_col)?;
        tuple.serialize_element(&self.end_line)?;
        tuple.serialize_element(&self.end_col)?;
        tuple.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Reserved words
    And,
    Attr,
    Break,
    Class,
    Cleanup,
    Do,
    Else,
    Elseif,
    End,
    False,
    For,
    Func,
    If,
    In,
    Isa,
    Next,
    Nil,
    Or,
    Return,
    Then,
    True,
    While,

    // Compound operators
    Spread,     // ...
    Eq,         // ==
    Ge,         // >=
    Le,         // <=
    Ne,         // !=
    ShiftLeft,  // <<
    ShiftRight, // >>
    Decrement,  // --
    DecrEq,     // -=
    Increment,  // ++
    IncrEq,     // +=

    // Sentinels and literals
    Eos,
    Number,
    Name,
    Str,

    // Any single-character punctuation or operator
    Sym(u8),
}

/// Reserved-word table. Identifiers not listed here scan as `Name`.
pub fn reserved(ident: &str) -> Option<TokenKind> {
    let kind = match ident {
        "and" => TokenKind::And,
        "attr" => TokenKind::Attr,
        "break" => TokenKind::Break,
        "class" => TokenKind::Class,
        "cleanup" => TokenKind::Cleanup,
        "do" => TokenKind::Do,
        "else" => TokenKind::Else,
        "elseif" => TokenKind::Elseif,
        "end" => TokenKind::End,
        "false" => TokenKind::False,
        "for" => TokenKind::For,
        "func" => TokenKind::Func,
        "if" => TokenKind::If,
        "in" => TokenKind::In,
        "isa" => TokenKind::Isa,
        "next" => TokenKind::Next,
        "nil" => TokenKind::Nil,
        "or" => TokenKind::Or,
        "return" => TokenKind::Return,
        "then" => TokenKind::Then,
        "true" => TokenKind::True,
        "while" => TokenKind::While,
        _ => return None,
    };
    Some(kind)
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::And => "and",
            TokenKind::Attr => "attr",
            TokenKind::Break => "break",
            TokenKind::Class => "class",
            TokenKind::Cleanup => "cleanup",
            TokenKind::Do => "do",
            TokenKind::Else => "else",
            TokenKind::Elseif => "elseif",
            TokenKind::End => "end",
            TokenKind::False => "false",
            TokenKind::For => "for",
            TokenKind::Func => "func",
            TokenKind::If => "if",
            TokenKind::In => "in",
            TokenKind::Isa => "isa",
            TokenKind::Next => "next",
            TokenKind::Nil => "nil",
            TokenKind::Or => "or",
            TokenKind::Return => "return",
            TokenKind::Then => "then",
            TokenKind::True => "true",
            TokenKind::While => "while",
            TokenKind::Spread => "...",
            TokenKind::Eq => "==",
            TokenKind::Ge => ">=",
            TokenKind::Le => "<=",
            TokenKind::Ne => "!=",
            TokenKind::ShiftLeft => "<<",
            TokenKind::ShiftRight => ">>",
            TokenKind::Decrement => "--",
            TokenKind::DecrEq => "-=",
            TokenKind::Increment => "++",
            TokenKind::IncrEq => "+=",
            TokenKind::Eos => "<eof>",
            TokenKind::Number => "<number>",
            TokenKind::Name => "<name>",
            TokenKind::Str => "<string>",
            TokenKind::Sym(b'\n') | TokenKind::Sym(b'\r') => "<newline>",
            TokenKind::Sym(c) => return write!(f, "{}", *c as char),
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub number_value: f64,
    pub string_value: String,
    pub loc: Span,
}

impl Token {
    pub fn new(kind: TokenKind, loc: Span) -> Self {
        Self {
            kind,
            number_value: 0.0,
            string_value: String::new(),
            loc,
        }
    }

    pub fn eos(loc: Span) -> Self {
        Self::new(TokenKind::Eos, loc)
    }

    /// Textual form of the token: payload for names/strings/numbers, the
    /// operator or keyword spelling otherwise. Used for operator dispatch and
    /// diagnostics.
    pub fn text(&self) -> String {
        match self.kind {
            TokenKind::Name | TokenKind::Str | TokenKind::Number => self.string_value.clone(),
            kind => kind.to_string(),
        }
    }
}

impl Default for Token {
    fn default() -> Self {
        Token::eos(Span::default())
    }
}
