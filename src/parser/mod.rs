pub mod ast;
mod expr;

use thiserror::Error;
use tracing::debug;

use crate::lexer::token::{Token, TokenKind};
use crate::lexer::{self, LexError};
use ast::{Block, FunctionDecl, Param, Program, Stmt, TypeName};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    fn new(message: impl Into<String>, token: &Token) -> Self {
        Self {
            message: message.into(),
            line: token.line,
            column: token.column,
        }
    }
}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        Self {
            message: err.message,
            line: err.line,
            column: err.column,
        }
    }
}

/// Result of a parse run: the (possibly partial) program plus every
/// lexical and syntax diagnostic collected along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub program: Program,
    pub errors: Vec<ParseError>,
}

impl Parsed {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// The program if parsing produced no diagnostics.
    pub fn into_result(self) -> Result<Program, Vec<ParseError>> {
        if self.errors.is_empty() {
            Ok(self.program)
        } else {
            Err(self.errors)
        }
    }
}

/// Lex and parse a source text in one step.
pub fn parse_source(source: &str) -> Parsed {
    Parser::from_source(source).parse()
}

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    errors: Vec<ParseError>,
}

impl Parser {
    /// Build a parser over a token stream. Comment tokens are dropped; the
    /// stream is terminated with `Eof` if the caller did not do so.
    pub fn new(tokens: Vec<Token>) -> Self {
        let mut tokens: Vec<Token> = tokens
            .into_iter()
            .filter(|token| token.kind != TokenKind::Comment)
            .collect();
        if tokens.last().map(|t| t.kind) != Some(TokenKind::Eof) {
            let (line, column) = tokens
                .last()
                .map(|t| (t.line, t.column + t.text.chars().count()))
                .unwrap_or((1, 1));
            tokens.push(Token::new(TokenKind::Eof, "", line, column));
        }

        Self {
            tokens,
            current: 0,
            errors: Vec::new(),
        }
    }

    pub fn from_source(source: &str) -> Self {
        let (tokens, lex_errors) = lexer::lex(source);
        let mut parser = Self::new(tokens);
        parser.errors = lex_errors.into_iter().map(ParseError::from).collect();
        parser
    }

    pub fn parse(mut self) -> Parsed {
        let mut functions = Vec::new();

        while !self.is_at_end() {
            if self.check(TokenKind::Func) {
                match self.function_declaration() {
                    Some(function) => functions.push(function),
                    None => self.synchronize(),
                }
            } else {
                let token = self.peek().clone();
                self.error(format!("unexpected token at top level: {}", token.describe()));
                self.synchronize();
            }
        }

        // Lexical diagnostics were recorded up front; keep the batch in
        // source order.
        self.errors.sort_by_key(|err| (err.line, err.column));
        debug!(
            functions = functions.len(),
            errors = self.errors.len(),
            "parsed program"
        );

        Parsed {
            program: Program { functions },
            errors: self.errors,
        }
    }

    fn function_declaration(&mut self) -> Option<FunctionDecl> {
        let line = self.advance().line;

        let name = self.consume_identifier("expected function name")?;
        self.consume(TokenKind::LeftParen, "expected '(' after function name")?;

        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                params.push(self.parameter()?);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "expected ')' after parameters")?;

        let return_type = if self.matches(TokenKind::Arrow) {
            self.type_name(true, "expected return type")?
        } else {
            TypeName::Void
        };

        if !self.check(TokenKind::LeftBrace) {
            self.expected("expected '{' to start function body");
            return None;
        }
        let body = self.block();

        Some(FunctionDecl {
            name,
            params,
            return_type,
            body,
            line,
        })
    }

    fn parameter(&mut self) -> Option<Param> {
        let name = self.consume_identifier("expected parameter name")?;
        self.consume(TokenKind::Colon, "expected ':' after parameter name")?;
        let ty = self.type_name(false, "expected type")?;
        Some(Param { name, ty })
    }

    /// Parse a type keyword. `void` is only accepted where `allow_void` is set.
    fn type_name(&mut self, allow_void: bool, message: &str) -> Option<TypeName> {
        let ty = match self.peek_kind() {
            TokenKind::IntType => TypeName::Int,
            TokenKind::FloatType => TypeName::Float,
            TokenKind::StringType => TypeName::String,
            TokenKind::BoolType => TypeName::Bool,
            TokenKind::VoidType if allow_void => TypeName::Void,
            _ => {
                self.expected(message);
                return None;
            }
        };
        self.advance();
        Some(ty)
    }

    fn block(&mut self) -> Block {
        let mut block = Block::default();
        if !self.matches(TokenKind::LeftBrace) {
            self.expected("expected '{'");
            return block;
        }

        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            let before = self.current;
            if let Some(stmt) = self.statement() {
                block.statements.push(stmt);
            }
            if self.current == before {
                self.advance();
            }
        }

        if !self.matches(TokenKind::RightBrace) {
            self.expected("expected '}'");
        }
        block
    }

    fn statement(&mut self) -> Option<Stmt> {
        match self.peek_kind() {
            TokenKind::IntType
            | TokenKind::FloatType
            | TokenKind::StringType
            | TokenKind::BoolType => self.variable_declaration(),
            TokenKind::Var => self.inferred_declaration(),
            TokenKind::Return => self.return_statement(),
            TokenKind::If => self.if_statement(),
            TokenKind::While => self.while_statement(),
            TokenKind::Identifier if self.peek_kind_at(1) == Some(TokenKind::Equal) => {
                self.assignment()
            }
            _ => {
                let expr = self.expression()?;
                self.matches(TokenKind::Semicolon);
                Some(Stmt::Expr(expr))
            }
        }
    }

    fn variable_declaration(&mut self) -> Option<Stmt> {
        let declared_type = self.type_name(false, "expected type")?;
        let name = self.consume_identifier("expected variable name")?;

        let initializer = if self.matches(TokenKind::Equal) {
            Some(self.expression()?)
        } else {
            None
        };
        self.matches(TokenKind::Semicolon);

        Some(Stmt::VarDecl {
            name,
            declared_type: Some(declared_type),
            inferred: false,
            initializer,
        })
    }

    fn inferred_declaration(&mut self) -> Option<Stmt> {
        self.advance();
        let name = self.consume_identifier("expected variable name")?;
        self.consume(TokenKind::Equal, "expected '='")?;
        let initializer = self.expression()?;
        self.matches(TokenKind::Semicolon);

        Some(Stmt::VarDecl {
            name,
            declared_type: None,
            inferred: true,
            initializer: Some(initializer),
        })
    }

    fn return_statement(&mut self) -> Option<Stmt> {
        self.advance();
        if self.matches(TokenKind::Semicolon) || self.check(TokenKind::RightBrace) {
            return Some(Stmt::Return { value: None });
        }

        let value = self.expression()?;
        self.matches(TokenKind::Semicolon);
        Some(Stmt::Return { value: Some(value) })
    }

    fn if_statement(&mut self) -> Option<Stmt> {
        self.advance();
        self.consume(TokenKind::LeftParen, "expected '(' after 'if'")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "expected ')' after condition")?;

        let then_block = self.block();
        let else_block = if self.matches(TokenKind::Else) {
            Some(self.block())
        } else {
            None
        };

        Some(Stmt::If {
            condition,
            then_block,
            else_block,
        })
    }

    fn while_statement(&mut self) -> Option<Stmt> {
        self.advance();
        self.consume(TokenKind::LeftParen, "expected '(' after 'while'")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "expected ')' after condition")?;
        let body = self.block();
        Some(Stmt::While { condition, body })
    }

    fn assignment(&mut self) -> Option<Stmt> {
        let name = self.advance().text.clone();
        self.consume(TokenKind::Equal, "expected '='")?;
        let value = self.expression()?;
        self.matches(TokenKind::Semicolon);
        Some(Stmt::Assign { name, value })
    }

    /// Skip to the next `func` keyword without reporting anything further.
    fn synchronize(&mut self) {
        while !self.is_at_end() && !self.check(TokenKind::Func) {
            self.advance();
        }
    }

    pub(crate) fn error(&mut self, message: impl Into<String>) {
        let err = ParseError::new(message, self.peek());
        self.errors.push(err);
    }

    /// Record "<message>, got <token>" against the current token.
    pub(crate) fn expected(&mut self, message: &str) {
        let got = self.peek().describe().to_string();
        self.error(format!("{}, got {}", message, got));
    }

    pub(crate) fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn consume(&mut self, kind: TokenKind, message: &str) -> Option<()> {
        if self.matches(kind) {
            Some(())
        } else {
            self.expected(message);
            None
        }
    }

    pub(crate) fn consume_identifier(&mut self, message: &str) -> Option<String> {
        if self.check(TokenKind::Identifier) {
            Some(self.advance().text.clone())
        } else {
            self.expected(message);
            None
        }
    }

    pub(crate) fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    pub(crate) fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.peek_kind() == TokenKind::Eof
    }

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    pub(crate) fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_kind_at(&self, offset: usize) -> Option<TokenKind> {
        self.tokens.get(self.current + offset).map(|token| token.kind)
    }

    pub(crate) fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_return_type_defaults_to_void() {
        let parsed = parse_source("func main() { }");
        assert!(parsed.is_ok());
        assert_eq!(parsed.program.functions[0].return_type, TypeName::Void);
    }

    #[test]
    fn advance_at_end_stays_on_eof() {
        let mut parser = Parser::new(Vec::new());
        assert!(parser.is_at_end());
        parser.advance();
        assert!(parser.is_at_end());
    }

    #[test]
    fn comments_are_dropped() {
        let parsed = parse_source("// header\nfunc f() { // body\n return; }");
        assert!(parsed.is_ok(), "{:?}", parsed.errors);
        assert_eq!(parsed.program.functions[0].body.statements.len(), 1);
    }
}
