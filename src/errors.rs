use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::lexer::LexError;

/// A point in the source text. `line` and `column` are 1-based, the column
/// counts characters rather than bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn from_offset(source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let before = &source[..offset];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let column = source[line_start..offset].chars().count() + 1;
        Position { offset, line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error(transparent)]
    Lexical(LexError),

    #[error("syntax error")]
    Syntax,

    /// A missing `end`. Reported as a syntax error naming the block.
    #[error("unclosed `{keyword}` block opened on line {line}")]
    UnclosedBlock { keyword: &'static str, line: usize },

    /// Blocks, transformations and parentheses nested past the parser's limit.
    #[error("nesting too deep (more than {limit} levels)")]
    NestingTooDeep { limit: usize },

    #[error("reserved word `{0}` used as identifier")]
    ReservedWord(String),

    #[error("unexpected trailing input")]
    TrailingInput,
}

impl ErrorKind {
    pub fn is_syntax(&self) -> bool {
        matches!(
            self,
            ErrorKind::Syntax | ErrorKind::UnclosedBlock { .. } | ErrorKind::NestingTooDeep { .. }
        )
    }
}

/// The set of things the parser would have accepted at an error position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expected(pub Vec<String>);

impl Expected {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, item: &str) -> bool {
        self.0.iter().any(|e| e == item)
    }
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [] => Ok(()),
            [single] => write!(f, "expected {}", single),
            [init @ .., last] => write!(f, "expected one of {} or {}", init.join(", "), last),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at {position}, found {found}")]
pub struct ParseError {
    pub kind: ErrorKind,
    pub position: Position,
    pub expected: Expected,
    pub found: String,
    pub suggestion: Option<String>,
}

impl ParseError {
    pub fn new(kind: ErrorKind, position: Position, found: impl Into<String>) -> Self {
        ParseError {
            kind,
            position,
            expected: Expected::default(),
            found: found.into(),
            suggestion: None,
        }
    }

    pub fn with_expected(mut self, expected: Vec<String>) -> Self {
        self.expected = Expected(expected);
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.suggestion = Some(suggestion.to_string());
        self
    }
}

#[derive(Debug, Clone)]
pub struct SourceLocation {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub line_content: String,
}

impl SourceLocation {
    pub fn new(file: &str, line: usize, column: usize, line_content: &str) -> Self {
        SourceLocation {
            file: file.to_string(),
            line,
            column,
            line_content: line_content.to_string(),
        }
    }
}

pub struct SourceFile {
    pub filename: String,
    lines: Vec<String>,
}

impl SourceFile {
    pub fn new(filename: &str, content: &str) -> Self {
        let lines: Vec<String> = content.lines().map(|s| s.to_string()).collect();
        SourceFile {
            filename: filename.to_string(),
            lines,
        }
    }

    pub fn get_line(&self, line_num: usize) -> Option<&str> {
        if line_num > 0 && line_num <= self.lines.len() {
            Some(&self.lines[line_num - 1])
        } else {
            None
        }
    }

    pub fn make_location(&self, position: Position) -> SourceLocation {
        let line_content = self.get_line(position.line).unwrap_or("");
        SourceLocation::new(&self.filename, position.line, position.column, line_content)
    }

    pub fn diagnostic<'e>(&self, error: &'e ParseError) -> Diagnostic<'e> {
        Diagnostic {
            error,
            location: self.make_location(error.position),
            color: true,
        }
    }
}

/// A parse error rendered against its source line.
pub struct Diagnostic<'e> {
    error: &'e ParseError,
    location: SourceLocation,
    color: bool,
}

impl Diagnostic<'_> {
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }
}

impl fmt::Display for Diagnostic<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ANSI color codes
        let paint = |code: &'static str| if self.color { code } else { "" };
        let red = paint("\x1b[1;31m");
        let blue = paint("\x1b[1;34m");
        let cyan = paint("\x1b[1;36m");
        let yellow = paint("\x1b[1;33m");
        let green = paint("\x1b[1;32m");
        let bold = paint("\x1b[1m");
        let reset = paint("\x1b[0m");

        let err = self.error;
        let loc = &self.location;

        writeln!(f, "{}error{}: {}{}, found {}{}", red, reset, bold, err.kind, err.found, reset)?;
        writeln!(f, "  {}-->{} {}:{}:{}", blue, reset, loc.file, loc.line, loc.column)?;

        // Line number gutter width
        let gutter = loc.line.to_string().len();

        writeln!(f, "  {:width$} {}|{}", "", blue, reset, width = gutter)?;
        writeln!(f, "  {}{}{} {}|{} {}", blue, loc.line, reset, blue, reset, loc.line_content.trim_end())?;

        // Pointer line, tabs kept so the caret lines up
        let pointer: String = loc
            .line_content
            .chars()
            .take(loc.column.saturating_sub(1))
            .map(|c| if c == '\t' { '\t' } else { ' ' })
            .collect();
        writeln!(f, "  {:width$} {}|{} {}{}^--- here{}", "", blue, reset, pointer, red, reset, width = gutter)?;

        if !err.expected.is_empty() {
            writeln!(f, "  {}note{}: {}", cyan, reset, err.expected)?;
        }

        // Suggestion (did you mean?)
        if let Some(ref suggestion) = err.suggestion {
            writeln!(f, "  {}help{}: did you mean `{}{}{}`?", green, reset, yellow, suggestion, reset)?;
        }

        Ok(())
    }
}

pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    let m = a_chars.len();
    let n = b_chars.len();

    if m == 0 { return n; }
    if n == 0 { return m; }

    let mut dp = vec![vec![0usize; n + 1]; m + 1];

    for (i, row) in dp.iter_mut().enumerate() { row[0] = i; }
    for j in 0..=n { dp[0][j] = j; }

    for i in 1..=m {
        for j in 1..=n {
            let cost = if a_chars[i - 1] == b_chars[j - 1] { 0 } else { 1 };
            dp[i][j] = (dp[i - 1][j] + 1)
                .min(dp[i][j - 1] + 1)
                .min(dp[i - 1][j - 1] + cost);
        }
    }

    dp[m][n]
}

/// Closest keyword to a misspelled word, if any is close enough to be a typo.
/// Keywords are case-sensitive, so `Draw` suggests `draw`.
pub fn find_similar_keyword(word: &str, keywords: &[&str]) -> Option<String> {
    // Short names like x, y, i are usually intentional
    if word.len() <= 2 {
        return None;
    }

    let mut best_match: Option<(&str, usize)> = None;

    for &keyword in keywords {
        let len_diff = word.len().abs_diff(keyword.len());
        if len_diff > 2 {
            continue;
        }

        if word == keyword {
            return None;
        }

        let distance = levenshtein_distance(&word.to_lowercase(), keyword);
        let max_distance = if word.len() >= 4 { 2 } else { 1 };

        if distance <= max_distance && best_match.map_or(true, |(_, best)| distance < best) {
            best_match = Some((keyword, distance));
        }
    }

    best_match.map(|(s, _)| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::SCENE_KEYWORDS;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein_distance("draw", "draw"), 0);
        assert_eq!(levenshtein_distance("draw", "drew"), 1);
        assert_eq!(levenshtein_distance("sphere", "sphre"), 1);
        assert_eq!(levenshtein_distance("", "cube"), 4);
    }

    #[test]
    fn test_find_similar() {
        assert_eq!(find_similar_keyword("sphre", SCENE_KEYWORDS), Some("sphere".to_string()));
        assert_eq!(find_similar_keyword("trnslate", SCENE_KEYWORDS), Some("translate".to_string()));
        assert_eq!(find_similar_keyword("Draw", SCENE_KEYWORDS), Some("draw".to_string()));
        assert_eq!(find_similar_keyword("draw", SCENE_KEYWORDS), None);
        assert_eq!(find_similar_keyword("ab", SCENE_KEYWORDS), None);
        assert_eq!(find_similar_keyword("radius", SCENE_KEYWORDS), None);
    }

    #[test]
    fn test_position_from_offset() {
        let source = "a = 1\n  draw(a)\n";
        assert_eq!(Position::from_offset(source, 0), Position { offset: 0, line: 1, column: 1 });
        assert_eq!(Position::from_offset(source, 8), Position { offset: 8, line: 2, column: 3 });
        assert_eq!(Position::from_offset(source, 100).offset, source.len());
    }

    #[test]
    fn test_expected_display() {
        assert_eq!(Expected::default().to_string(), "");
        assert_eq!(Expected(vec!["`)`".into()]).to_string(), "expected `)`");
        assert_eq!(
            Expected(vec!["`(`".into(), "`,`".into(), "`)`".into()]).to_string(),
            "expected one of `(`, `,` or `)`"
        );
    }

    #[test]
    fn test_diagnostic_render() {
        let source = "a = 1\ndraw = 5\n";
        let file = SourceFile::new("globes.scene", source);
        let err = ParseError::new(
            ErrorKind::ReservedWord("draw".to_string()),
            Position::from_offset(source, 6),
            "`draw`",
        )
        .with_expected(vec!["identifier".to_string()]);

        let rendered = file.diagnostic(&err).with_color(false).to_string();
        assert!(rendered.contains("error: reserved word `draw` used as identifier"));
        assert!(rendered.contains("--> globes.scene:2:1"));
        assert!(rendered.contains("2 | draw = 5"));
        assert!(rendered.contains("^--- here"));
        assert!(rendered.contains("note: expected identifier"));
        assert!(!rendered.contains('\x1b'));
    }

    #[test]
    fn test_error_display() {
        let err = ParseError::new(
            ErrorKind::TrailingInput,
            Position { offset: 14, line: 1, column: 15 },
            "`)`",
        );
        assert_eq!(err.to_string(), "unexpected trailing input at 1:15, found `)`");
    }
}
