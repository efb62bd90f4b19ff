pub mod ast;
pub mod printer;

use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use tracing::{debug, trace};

use crate::errors::{find_similar_keyword, ErrorKind, ParseError, Position};
use crate::lexer::{self, LexError, Lexer, SCENE_KEYWORDS};
use ast::*;

/// `Ok(None)` means the rule did not match and the caller may try its next
/// alternative. `Err` ends the whole parse.
type PResult<T> = Result<Option<T>, ParseError>;

type StatementRule<'a> = fn(&mut Parser<'a>) -> PResult<Statement>;
type ValueRule<'a> = fn(&mut Parser<'a>) -> PResult<Expr>;

const VALUE_FORMS: &str = "a value (number, color name, `rgb(...)`, `<x, y, z>`, \
                           `texture(...)`, `(...)`, object, string or identifier)";

const ADDITIVE: &[(&str, BinaryOperator)] = &[
    ("+", BinaryOperator::Add),
    ("-", BinaryOperator::Subtract),
];

const MULTIPLICATIVE: &[(&str, BinaryOperator)] = &[
    ("*", BinaryOperator::Multiply),
    ("/", BinaryOperator::Divide),
    ("%", BinaryOperator::Modulo),
];

/// Combined depth of nested statements and expressions. Deeper input is
/// rejected before the recursion can exhaust the stack.
const MAX_NESTING: usize = 100;

/// Why the parse could not get past the farthest failure, beyond
/// "nothing matched here".
#[derive(Debug, Clone)]
enum Cause {
    Lexical(LexError),
    Unclosed { keyword: &'static str, opened_at: usize },
}

/// Farthest position any rule failed at, and what would have been accepted there.
#[derive(Debug, Default)]
struct Failure {
    pos: usize,
    expected: BTreeSet<String>,
    cause: Option<Cause>,
}

/// Scannerless ordered-choice parser.
///
/// Every rule returns with the cursor past what it matched, or reports
/// `Ok(None)`; callers that try further alternatives rewind to their own
/// start. `statement` and `expression` results are memoized per position.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    farthest: Failure,
    statement_memo: HashMap<usize, Option<(Statement, usize)>>,
    expression_memo: HashMap<usize, Option<(Expr, usize)>>,
    memo_hits: usize,
    depth: usize,
}

pub fn parse(source: &str) -> Result<Program, ParseError> {
    Parser::new(source).parse_program()
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        Parser {
            lexer: Lexer::new(source),
            farthest: Failure::default(),
            statement_memo: HashMap::new(),
            expression_memo: HashMap::new(),
            memo_hits: 0,
            depth: 0,
        }
    }

    fn source(&self) -> &'a str {
        self.lexer.source()
    }

    fn pos(&self) -> usize {
        self.lexer.pos()
    }

    fn reset(&mut self, pos: usize) {
        self.lexer.reset(pos);
    }

    fn position(&self, offset: usize) -> Position {
        Position::from_offset(self.source(), offset)
    }

    fn record(&mut self, pos: usize, what: &str) {
        if pos > self.farthest.pos {
            self.farthest = Failure { pos, ..Failure::default() };
        }
        if pos == self.farthest.pos {
            self.farthest.expected.insert(what.to_string());
        }
    }

    fn record_cause(&mut self, pos: usize, cause: Cause) {
        if pos > self.farthest.pos {
            self.farthest = Failure { pos, ..Failure::default() };
        }
        if pos == self.farthest.pos && self.farthest.cause.is_none() {
            self.farthest.cause = Some(cause);
        }
    }

    /// Matches a keyword without recording an expectation. Used for the
    /// leading token of an alternative.
    fn keyword(&mut self, keyword: &str) -> bool {
        self.lexer.skip_trivia();
        self.lexer.eat_keyword(keyword)
    }

    fn symbol(&mut self, symbol: &str) -> bool {
        self.lexer.skip_trivia();
        self.lexer.eat_symbol(symbol)
    }

    fn expect_keyword(&mut self, keyword: &str) -> bool {
        self.lexer.skip_trivia();
        let at = self.pos();
        if self.lexer.eat_keyword(keyword) {
            return true;
        }
        self.record(at, &format!("`{}`", keyword));
        false
    }

    fn expect_symbol(&mut self, symbol: &str) -> bool {
        self.lexer.skip_trivia();
        let at = self.pos();
        if self.lexer.eat_symbol(symbol) {
            return true;
        }
        self.record(at, &format!("`{}`", symbol));
        false
    }

    /// Matches a block-opening keyword and returns where it starts.
    fn block_keyword(&mut self, keyword: &str) -> Option<usize> {
        self.lexer.skip_trivia();
        let at = self.pos();
        self.lexer.eat_keyword(keyword).then_some(at)
    }

    fn expect_end(&mut self, keyword: &'static str, opened_at: usize) -> bool {
        self.lexer.skip_trivia();
        let at = self.pos();
        if self.lexer.eat_keyword("end") {
            return true;
        }
        self.record(at, "`end`");
        self.record_cause(at, Cause::Unclosed { keyword, opened_at });
        false
    }

    /// Runs `rule` one nesting level deeper, failing at `at` past the limit.
    fn nested<T>(
        &mut self,
        at: usize,
        rule: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(ParseError::new(
                ErrorKind::NestingTooDeep { limit: MAX_NESTING },
                self.position(at),
                lexer::describe_at(self.source(), at),
            ));
        }
        self.depth += 1;
        let result = rule(self);
        self.depth -= 1;
        result
    }

    fn reserved_word(&self, at: usize, word: &str) -> ParseError {
        trace!(word, offset = at, "reserved word in identifier position");
        ParseError::new(
            ErrorKind::ReservedWord(word.to_string()),
            self.position(at),
            format!("`{}`", word),
        )
        .with_expected(vec!["identifier".to_string()])
    }

    /// An identifier in a position nothing else could fill. A reserved word
    /// here is an error rather than a reason to backtrack.
    fn identifier(&mut self, what: &str) -> PResult<String> {
        self.lexer.skip_trivia();
        let at = self.pos();
        if let Some(name) = self.lexer.eat_identifier() {
            return Ok(Some(name.to_string()));
        }
        if let Some(word) = self.lexer.peek_word() {
            return Err(self.reserved_word(at, word));
        }
        self.record(at, what);
        Ok(None)
    }

    pub fn parse_program(mut self) -> Result<Program, ParseError> {
        let started = Instant::now();

        let statements = self.statement_list()?;
        self.lexer.skip_trivia();
        if !self.lexer.is_at_end() {
            let stop = self.pos();
            let err = self.stopped_at(stop);
            debug!(error = %err, memo_hits = self.memo_hits, "scene rejected");
            return Err(err);
        }

        debug!(
            statements = statements.len(),
            memo_hits = self.memo_hits,
            elapsed_us = started.elapsed().as_micros() as u64,
            "scene parsed"
        );
        Ok(Program::new(statements))
    }

    /// Builds the error for a top-level statement list that ended at `stop`
    /// with input left over.
    fn stopped_at(&mut self, stop: usize) -> ParseError {
        let source = self.source();
        let failure = std::mem::take(&mut self.farthest);

        // A stray `end` closes nothing; say so instead of asking for `=`
        let mut probe = Lexer::at(source, stop);
        if probe.eat_keyword("end") {
            probe.skip_trivia();
            if !probe.eat_symbol("=") {
                return ParseError::new(ErrorKind::TrailingInput, self.position(stop), "`end`");
            }
        }

        if failure.pos > stop || failure.cause.is_some() {
            let kind = match failure.cause {
                Some(Cause::Lexical(err)) => ErrorKind::Lexical(err),
                Some(Cause::Unclosed { keyword, opened_at }) => ErrorKind::UnclosedBlock {
                    keyword,
                    line: self.position(opened_at).line,
                },
                None => ErrorKind::Syntax,
            };
            let err = ParseError::new(
                kind,
                self.position(failure.pos),
                lexer::describe_at(source, failure.pos),
            )
            .with_expected(failure.expected.into_iter().collect());
            return self.with_suggestion(err, &[failure.pos, stop]);
        }

        let kind = match Lexer::at(source, stop).next_token() {
            Err(err) => ErrorKind::Lexical(err),
            Ok(_) => ErrorKind::TrailingInput,
        };
        let err = ParseError::new(kind, self.position(stop), lexer::describe_at(source, stop));
        self.with_suggestion(err, &[stop])
    }

    /// Attaches a "did you mean" for the first misspelled keyword found at
    /// one of `offsets`.
    fn with_suggestion(&self, err: ParseError, offsets: &[usize]) -> ParseError {
        let suggestion = offsets.iter().find_map(|&offset| {
            let word = Lexer::at(self.source(), offset).peek_word()?;
            find_similar_keyword(word, SCENE_KEYWORDS)
        });
        match suggestion {
            Some(keyword) => err.with_suggestion(&keyword),
            None => err,
        }
    }

    fn statement_list(&mut self) -> Result<Vec<Statement>, ParseError> {
        let mut statements = Vec::new();
        while let Some(statement) = self.statement()? {
            statements.push(statement);
        }
        Ok(statements)
    }

    fn statement(&mut self) -> PResult<Statement> {
        self.lexer.skip_trivia();
        let start = self.pos();

        if let Some(cached) = self.statement_memo.get(&start).cloned() {
            self.memo_hits += 1;
            return Ok(cached.map(|(statement, end)| {
                self.reset(end);
                statement
            }));
        }

        let result = self.nested(start, |parser| parser.statement_alternatives(start))?;
        let end = self.pos();
        self.statement_memo
            .insert(start, result.clone().map(|statement| (statement, end)));
        Ok(result)
    }

    /// Order matters: `append light` must be tried before the plain
    /// `append` command, and block keywords before assignment so that
    /// `do = 1` is only an assignment once `do ... end` has failed.
    fn statement_alternatives(&mut self, start: usize) -> PResult<Statement> {
        let alternatives: [StatementRule<'a>; 10] = [
            Self::set_camera_statement,
            Self::append_light_statement,
            Self::do_statement,
            Self::if_statement,
            Self::while_statement,
            Self::call_statement,
            Self::function_statement,
            Self::command_statement,
            Self::assignment_statement,
            Self::transformation_statement,
        ];

        for rule in alternatives {
            if let Some(statement) = rule(self)? {
                return Ok(Some(statement));
            }
            self.reset(start);
        }

        self.record(start, "statement");
        Ok(None)
    }

    // set camera ( <expression> )
    fn set_camera_statement(&mut self) -> PResult<Statement> {
        if !(self.keyword("set") && self.expect_keyword("camera")) {
            return Ok(None);
        }
        if !self.expect_symbol("(") {
            return Ok(None);
        }
        let Some(value) = self.expression()? else {
            return Ok(None);
        };
        if !self.expect_symbol(")") {
            return Ok(None);
        }
        Ok(Some(Statement::SetCamera { value }))
    }

    // append light ( <param_list> )
    fn append_light_statement(&mut self) -> PResult<Statement> {
        if !(self.keyword("append") && self.expect_keyword("light")) {
            return Ok(None);
        }
        let Some(args) = self.arguments()? else {
            return Ok(None);
        };
        Ok(Some(Statement::AppendLight { args }))
    }

    // do <statement_list> end
    fn do_statement(&mut self) -> PResult<Statement> {
        let Some(opened_at) = self.block_keyword("do") else {
            return Ok(None);
        };
        let body = self.statement_list()?;
        if !self.expect_end("do", opened_at) {
            return Ok(None);
        }
        Ok(Some(Statement::Do { body }))
    }

    // if <bool_expression> then <statement_list> end
    fn if_statement(&mut self) -> PResult<Statement> {
        let Some(opened_at) = self.block_keyword("if") else {
            return Ok(None);
        };
        let Some(condition) = self.bool_expression()? else {
            return Ok(None);
        };
        if !self.expect_keyword("then") {
            return Ok(None);
        }
        let body = self.statement_list()?;
        if !self.expect_end("if", opened_at) {
            return Ok(None);
        }
        Ok(Some(Statement::If { condition, body }))
    }

    // while <bool_expression> do <statement_list> end
    fn while_statement(&mut self) -> PResult<Statement> {
        let Some(opened_at) = self.block_keyword("while") else {
            return Ok(None);
        };
        let Some(condition) = self.bool_expression()? else {
            return Ok(None);
        };
        if !self.expect_keyword("do") {
            return Ok(None);
        }
        let body = self.statement_list()?;
        if !self.expect_end("while", opened_at) {
            return Ok(None);
        }
        Ok(Some(Statement::While { condition, body }))
    }

    // call <id> ( <param_list> )
    fn call_statement(&mut self) -> PResult<Statement> {
        if !self.keyword("call") {
            return Ok(None);
        }
        let Some(name) = self.identifier("function name")? else {
            return Ok(None);
        };
        let Some(args) = self.arguments()? else {
            return Ok(None);
        };
        Ok(Some(Statement::FunctionCall { name, args }))
    }

    // function <id> ( <id>* ) <statement_list> end
    fn function_statement(&mut self) -> PResult<Statement> {
        let Some(opened_at) = self.block_keyword("function") else {
            return Ok(None);
        };
        let Some(name) = self.identifier("function name")? else {
            return Ok(None);
        };
        if !self.expect_symbol("(") {
            return Ok(None);
        }

        let mut params = Vec::new();
        loop {
            self.lexer.skip_trivia();
            let at = self.pos();
            if let Some(param) = self.lexer.eat_identifier() {
                params.push(param.to_string());
                self.symbol(",");
            } else if let Some(word) = self.lexer.peek_word() {
                return Err(self.reserved_word(at, word));
            } else {
                self.record(at, "parameter name");
                break;
            }
        }

        if !self.expect_symbol(")") {
            return Ok(None);
        }
        let body = self.statement_list()?;
        if !self.expect_end("function", opened_at) {
            return Ok(None);
        }
        Ok(Some(Statement::FunctionDef { name, params, body }))
    }

    // (draw | display | append) ( <param_list> )
    fn command_statement(&mut self) -> PResult<Statement> {
        let Some(name) = CommandName::ALL
            .into_iter()
            .find(|name| self.keyword(name.as_str()))
        else {
            return Ok(None);
        };
        let Some(args) = self.arguments()? else {
            return Ok(None);
        };
        Ok(Some(Statement::Command { name, args }))
    }

    // local? <id> = <expression>
    fn assignment_statement(&mut self) -> PResult<Statement> {
        self.lexer.skip_trivia();
        let local_at = self.pos();
        let is_local = self.lexer.eat_keyword("local");

        self.lexer.skip_trivia();
        let name_at = self.pos();
        let Some(name) = self.lexer.eat_identifier() else {
            return self.rejected_assignment(is_local, local_at, name_at);
        };
        let name = name.to_string();

        if !self.expect_symbol("=") {
            return Ok(None);
        }
        let Some(value) = self.expression()? else {
            return Ok(None);
        };
        Ok(Some(Statement::Assignment { is_local, name, value }))
    }

    /// No identifier where an assignment needs one. A reserved word that is
    /// clearly being assigned to cannot start any other statement, so it
    /// is reported directly.
    fn rejected_assignment(&mut self, is_local: bool, local_at: usize, name_at: usize) -> PResult<Statement> {
        let mut probe = self.lexer.clone();
        match probe.peek_word() {
            Some(word) => {
                probe.reset(name_at + word.len());
                probe.skip_trivia();
                if is_local || probe.eat_symbol("=") {
                    return Err(self.reserved_word(name_at, word));
                }
            }
            None if is_local => {
                if probe.eat_symbol("=") {
                    return Err(self.reserved_word(local_at, "local"));
                }
                self.record(name_at, "identifier");
            }
            None => {}
        }
        Ok(None)
    }

    // (scale | rotate | translate) ( <expr>, <expr>, <expr> ) <statement>
    fn transformation_statement(&mut self) -> PResult<Statement> {
        let Some(kind) = TransformKind::ALL
            .into_iter()
            .find(|kind| self.keyword(kind.as_str()))
        else {
            return Ok(None);
        };
        if !self.expect_symbol("(") {
            return Ok(None);
        }
        let Some(args) = self.components(")")? else {
            return Ok(None);
        };
        let Some(body) = self.statement()? else {
            return Ok(None);
        };
        Ok(Some(Statement::Transformation {
            kind,
            args,
            body: Box::new(body),
        }))
    }

    // ( <param_list> )
    fn arguments(&mut self) -> PResult<Vec<Expr>> {
        if !self.expect_symbol("(") {
            return Ok(None);
        }
        let args = self.param_list()?;
        if !self.expect_symbol(")") {
            return Ok(None);
        }
        Ok(Some(args))
    }

    /// Zero or more expressions, each optionally followed by a comma.
    fn param_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut params = Vec::new();
        while let Some(expr) = self.expression()? {
            params.push(expr);
            self.symbol(",");
        }
        Ok(params)
    }

    /// `<expr>, <expr>, <expr>` followed by `close`. The opening token has
    /// already been consumed by the caller.
    fn components(&mut self, close: &str) -> PResult<[Expr; 3]> {
        let Some(first) = self.expression()? else {
            return Ok(None);
        };
        if !self.expect_symbol(",") {
            return Ok(None);
        }
        let Some(second) = self.expression()? else {
            return Ok(None);
        };
        if !self.expect_symbol(",") {
            return Ok(None);
        }
        let Some(third) = self.expression()? else {
            return Ok(None);
        };
        if !self.expect_symbol(close) {
            return Ok(None);
        }
        Ok(Some([first, second, third]))
    }

    /// `<expression> ((< | >) <expression>)?`, only used as a guard.
    fn bool_expression(&mut self) -> PResult<Expr> {
        let Some(left) = self.expression()? else {
            return Ok(None);
        };

        let before = self.pos();
        self.lexer.skip_trivia();
        let op = if self.lexer.eat_symbol("<") {
            BinaryOperator::LessThan
        } else if self.lexer.eat_symbol(">") {
            BinaryOperator::GreaterThan
        } else {
            self.reset(before);
            return Ok(Some(left));
        };

        match self.expression()? {
            Some(right) => Ok(Some(Expr::binary(left, op, right))),
            None => {
                self.reset(before);
                Ok(Some(left))
            }
        }
    }

    fn expression(&mut self) -> PResult<Expr> {
        self.lexer.skip_trivia();
        let start = self.pos();

        if let Some(cached) = self.expression_memo.get(&start).cloned() {
            self.memo_hits += 1;
            return Ok(cached.map(|(expr, end)| {
                self.reset(end);
                expr
            }));
        }

        let result = self.nested(start, |parser| parser.binary_level(ADDITIVE, Self::multiplicative))?;
        let end = self.pos();
        self.expression_memo
            .insert(start, result.clone().map(|expr| (expr, end)));
        Ok(result)
    }

    fn multiplicative(&mut self) -> PResult<Expr> {
        self.binary_level(MULTIPLICATIVE, Self::negation)
    }

    /// One left-associative precedence level: `operand (op operand)*`.
    fn binary_level(
        &mut self,
        operators: &[(&str, BinaryOperator)],
        operand: fn(&mut Self) -> PResult<Expr>,
    ) -> PResult<Expr> {
        let Some(mut left) = operand(self)? else {
            return Ok(None);
        };

        loop {
            let before = self.pos();
            self.lexer.skip_trivia();
            let Some(op) = operators
                .iter()
                .find(|(symbol, _)| self.lexer.eat_symbol(symbol))
                .map(|&(_, op)| op)
            else {
                self.reset(before);
                break;
            };

            match operand(self)? {
                Some(right) => left = Expr::binary(left, op, right),
                None => {
                    self.reset(before);
                    break;
                }
            }
        }

        Ok(Some(left))
    }

    // -? <value>
    fn negation(&mut self) -> PResult<Expr> {
        self.lexer.skip_trivia();
        let start = self.pos();
        if !self.lexer.eat_symbol("-") {
            return self.value();
        }
        match self.value()? {
            Some(value) => Ok(Some(Expr::Negate(Box::new(value)))),
            None => {
                self.reset(start);
                Ok(None)
            }
        }
    }

    /// Literal forms come before the identifier catch-all, and color names
    /// before identifiers so that `red` is a color rather than a variable.
    fn value(&mut self) -> PResult<Expr> {
        self.lexer.skip_trivia();
        let start = self.pos();

        let alternatives: [ValueRule<'a>; 9] = [
            Self::number_value,
            Self::color_value,
            Self::rgb_value,
            Self::vector_value,
            Self::texture_value,
            Self::paren_value,
            Self::object_value,
            Self::string_value,
            Self::identifier_value,
        ];

        for rule in alternatives {
            if let Some(expr) = rule(self)? {
                return Ok(Some(expr));
            }
            self.reset(start);
        }

        self.record(start, VALUE_FORMS);
        Ok(None)
    }

    fn number_value(&mut self) -> PResult<Expr> {
        let at = self.pos();
        match self.lexer.scan_number() {
            Ok(number) => Ok(number.map(Expr::Number)),
            Err(err) => {
                self.record_cause(at, Cause::Lexical(err));
                Ok(None)
            }
        }
    }

    fn color_value(&mut self) -> PResult<Expr> {
        Ok(ColorName::ALL
            .into_iter()
            .find(|color| self.lexer.eat_keyword(color.as_str()))
            .map(Expr::Color))
    }

    // rgb ( <expr>, <expr>, <expr> )
    fn rgb_value(&mut self) -> PResult<Expr> {
        // `rgb` is not reserved, so a bare `rgb` falls through to identifier
        if !(self.keyword("rgb") && self.symbol("(")) {
            return Ok(None);
        }
        let Some([r, g, b]) = self.components(")")? else {
            return Ok(None);
        };
        Ok(Some(Expr::Rgb {
            r: Box::new(r),
            g: Box::new(g),
            b: Box::new(b),
        }))
    }

    // < <expr>, <expr>, <expr> >
    fn vector_value(&mut self) -> PResult<Expr> {
        if !self.symbol("<") {
            return Ok(None);
        }
        let Some([x, y, z]) = self.components(">")? else {
            return Ok(None);
        };
        Ok(Some(Expr::Vector {
            x: Box::new(x),
            y: Box::new(y),
            z: Box::new(z),
        }))
    }

    // texture ( <expr> )
    fn texture_value(&mut self) -> PResult<Expr> {
        if !(self.keyword("texture") && self.symbol("(")) {
            return Ok(None);
        }
        let Some(path) = self.expression()? else {
            return Ok(None);
        };
        if !self.expect_symbol(")") {
            return Ok(None);
        }
        Ok(Some(Expr::Texture { path: Box::new(path) }))
    }

    // ( <expr> )
    fn paren_value(&mut self) -> PResult<Expr> {
        if !self.symbol("(") {
            return Ok(None);
        }
        let Some(inner) = self.expression()? else {
            return Ok(None);
        };
        if !self.expect_symbol(")") {
            return Ok(None);
        }
        Ok(Some(Expr::Paren(Box::new(inner))))
    }

    // (sphere | plane | csg | cube) ( <param_list> )
    fn object_value(&mut self) -> PResult<Expr> {
        let Some(kind) = ObjectKind::ALL
            .into_iter()
            .find(|kind| self.lexer.eat_keyword(kind.as_str()))
        else {
            return Ok(None);
        };
        let Some(args) = self.arguments()? else {
            return Ok(None);
        };
        Ok(Some(Expr::Object { kind, args }))
    }

    fn string_value(&mut self) -> PResult<Expr> {
        let at = self.pos();
        match self.lexer.scan_string() {
            Ok(text) => Ok(text.map(|text| Expr::StringLit(text.to_string()))),
            Err(err) => {
                self.record_cause(at, Cause::Lexical(err));
                Ok(None)
            }
        }
    }

    fn identifier_value(&mut self) -> PResult<Expr> {
        Ok(self
            .lexer
            .eat_identifier()
            .map(|name| Expr::Identifier(name.to_string())))
    }
}
