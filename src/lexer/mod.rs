use serde::Serialize;
use thiserror::Error;

/// Words that can never be used as variable, function or parameter names.
pub const RESERVED_WORDS: &[&str] = &[
    "local", "function",
    "scale", "rotate", "translate",
    "draw", "display", "append",
    "sphere", "plane", "csg", "cube",
];

pub const COLOR_NAMES: &[&str] = &[
    "red", "orange", "yellow", "green", "blue", "purple", "black", "white",
];

/// Every word with a fixed meaning somewhere in the grammar.
/// Only the `RESERVED_WORDS` subset is rejected as an identifier; the rest
/// are recognised by position (`end`, `then`, `set camera`, color names...).
pub const SCENE_KEYWORDS: &[&str] = &[
    // Blocks and control flow
    "local", "function", "end", "if", "then", "while", "do", "call",
    // Commands
    "draw", "display", "append", "light", "set", "camera",
    // Transformations
    "scale", "rotate", "translate",
    // Objects
    "sphere", "plane", "csg", "cube",
    // Value constructors
    "rgb", "texture",
    // Colors
    "red", "orange", "yellow", "green", "blue", "purple", "black", "white",
];

const OPERATORS: &str = "+-*/%<>=";
const PUNCTUATION: &str = "(),";

pub fn is_reserved(word: &str) -> bool {
    RESERVED_WORDS.contains(&word)
}

pub fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

pub fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// Byte range of a token in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Token {
    Identifier(String),
    Keyword(&'static str),
    Number(f64),
    StringLiteral(String),
    Operator(char),
    Punctuation(char),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenInfo {
    pub token: Token,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("unterminated string literal")]
    UnterminatedString { start: usize },

    /// Runs straight into a letter, or is too large for an `f64`.
    #[error("malformed number literal `{text}`")]
    MalformedNumber { start: usize, text: String },

    #[error("unrecognized character `{ch}`")]
    UnrecognizedCharacter { offset: usize, ch: char },
}

impl LexError {
    /// Byte offset where the offending token starts.
    pub fn offset(&self) -> usize {
        match self {
            LexError::UnterminatedString { start } => *start,
            LexError::MalformedNumber { start, .. } => *start,
            LexError::UnrecognizedCharacter { offset, .. } => *offset,
        }
    }
}

/// Cursor over the scene source.
///
/// The parser drives the atomic scanners directly and rewinds with
/// [`Lexer::reset`] when an alternative fails, so the lexer never buffers
/// tokens of its own. [`Lexer::next_token`] exists for token dumps and for
/// describing what sits at an error position.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer { source, pos: 0 }
    }

    /// A lexer positioned at `offset`, which must lie on a char boundary.
    pub fn at(source: &'a str, offset: usize) -> Self {
        Lexer { source, pos: offset.min(source.len()) }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn reset(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    /// Skips whitespace and `//` comments. Never fails.
    pub fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(ch) if ch.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.rest().starts_with("//") => self.skip_comment(),
                _ => break,
            }
        }
    }

    /// A comment runs to the end of the line, or to the end of input.
    fn skip_comment(&mut self) {
        match self.rest().find('\n') {
            Some(newline) => self.pos += newline + 1,
            None => self.pos = self.source.len(),
        }
    }

    /// Consumes `symbol` if the input continues with it. Trivia is not skipped.
    pub fn eat_symbol(&mut self, symbol: &str) -> bool {
        if self.rest().starts_with(symbol) {
            self.pos += symbol.len();
            true
        } else {
            false
        }
    }

    /// Consumes `keyword` only when it is a whole token, so `drawing`
    /// never matches `draw`.
    pub fn eat_keyword(&mut self, keyword: &str) -> bool {
        let rest = self.rest();
        if !rest.starts_with(keyword) {
            return false;
        }
        if rest[keyword.len()..].chars().next().is_some_and(is_ident_char) {
            return false;
        }
        self.pos += keyword.len();
        true
    }

    /// The identifier-shaped word at the cursor, reserved or not.
    pub fn peek_word(&self) -> Option<&'a str> {
        let rest = self.rest();
        let first = rest.chars().next()?;
        if !is_ident_start(first) {
            return None;
        }
        let len = rest.find(|c: char| !is_ident_char(c)).unwrap_or(rest.len());
        Some(&rest[..len])
    }

    /// Consumes an identifier. Reserved words are left in place.
    pub fn eat_identifier(&mut self) -> Option<&'a str> {
        let word = self.peek_word()?;
        if is_reserved(word) {
            return None;
        }
        self.pos += word.len();
        Some(word)
    }

    /// `digit+ ('.' digit+)?`, rejected when a letter follows directly.
    pub fn scan_number(&mut self) -> Result<Option<f64>, LexError> {
        let start = self.pos;
        let rest = self.rest();

        let mut len = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if len == 0 {
            return Ok(None);
        }

        // A '.' belongs to the number only when digits follow it
        if let Some(after_dot) = rest[len..].strip_prefix('.') {
            let fraction = after_dot
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(after_dot.len());
            if fraction > 0 {
                len += 1 + fraction;
            }
        }

        if rest[len..].chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
            let word_end = rest[len..]
                .find(|c: char| !is_ident_char(c))
                .map_or(rest.len(), |i| len + i);
            return Err(LexError::MalformedNumber {
                start,
                text: rest[..word_end].to_string(),
            });
        }

        let text = &rest[..len];
        let value = text
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| LexError::MalformedNumber {
                start,
                text: text.to_string(),
            })?;
        self.pos += len;
        Ok(Some(value))
    }

    /// Single- or double-quoted text, closed by the same quote. No escapes.
    pub fn scan_string(&mut self) -> Result<Option<&'a str>, LexError> {
        let start = self.pos;
        let quote = match self.peek() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Ok(None),
        };

        let body = &self.rest()[1..];
        match body.find(quote) {
            Some(len) => {
                self.pos += len + 2;
                Ok(Some(&body[..len]))
            }
            None => Err(LexError::UnterminatedString { start }),
        }
    }

    pub fn next_token(&mut self) -> Result<Option<TokenInfo>, LexError> {
        self.skip_trivia();
        let start = self.pos;
        let Some(ch) = self.peek() else {
            return Ok(None);
        };

        let token = if let Some(text) = self.scan_string()? {
            Token::StringLiteral(text.to_string())
        } else if let Some(value) = self.scan_number()? {
            Token::Number(value)
        } else if let Some(word) = self.peek_word() {
            self.pos += word.len();
            match SCENE_KEYWORDS.iter().find(|kw| **kw == word) {
                Some(keyword) => Token::Keyword(keyword),
                None => Token::Identifier(word.to_string()),
            }
        } else if OPERATORS.contains(ch) {
            self.advance();
            Token::Operator(ch)
        } else if PUNCTUATION.contains(ch) {
            self.advance();
            Token::Punctuation(ch)
        } else {
            return Err(LexError::UnrecognizedCharacter { offset: start, ch });
        };

        Ok(Some(TokenInfo {
            token,
            span: Span { start, end: self.pos },
        }))
    }

    pub fn tokenize(&mut self) -> Result<Vec<TokenInfo>, LexError> {
        let mut tokens = Vec::new();
        while let Some(info) = self.next_token()? {
            tokens.push(info);
        }
        Ok(tokens)
    }
}

pub fn tokenize(source: &str) -> Result<Vec<TokenInfo>, LexError> {
    Lexer::new(source).tokenize()
}

/// Short description of whatever starts at `offset`, for error messages.
pub fn describe_at(source: &str, offset: usize) -> String {
    const MAX_WIDTH: usize = 24;

    match Lexer::at(source, offset).next_token() {
        Ok(None) => "end of input".to_string(),
        Ok(Some(info)) => {
            let text = &source[info.span.start..info.span.end];
            if text.chars().count() > MAX_WIDTH {
                let clipped: String = text.chars().take(MAX_WIDTH).collect();
                format!("`{}...`", clipped)
            } else {
                format!("`{}`", text)
            }
        }
        Err(LexError::UnterminatedString { .. }) => "an unterminated string".to_string(),
        Err(LexError::MalformedNumber { text, .. }) => format!("`{}`", text),
        Err(LexError::UnrecognizedCharacter { ch, .. }) => format!("`{}`", ch),
    }
}
