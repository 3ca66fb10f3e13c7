pub mod token;

use thiserror::Error;

use token::{Token, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct LexError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl LexError {
    fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

/// Tokenize a whole source text. The returned stream always ends with a
/// single `Eof` token; lexical problems are reported alongside it.
pub fn lex(source: &str) -> (Vec<Token>, Vec<LexError>) {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token();
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            break;
        }
    }
    (tokens, lexer.into_errors())
}

pub struct Lexer {
    chars: Vec<char>,
    current: usize,
    start: usize,
    line: usize,
    column: usize,
    token_line: usize,
    token_column: usize,
    errors: Vec<LexError>,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            current: 0,
            start: 0,
            line: 1,
            column: 1,
            token_line: 1,
            token_column: 1,
            errors: Vec::new(),
        }
    }

    /// Produce the next token. Once the input is exhausted every further call
    /// returns `Eof`.
    pub fn next_token(&mut self) -> Token {
        loop {
            self.skip_whitespace();
            self.start_token();
            if self.is_at_end() {
                return Token::new(TokenKind::Eof, "", self.token_line, self.token_column);
            }
            if let Some(token) = self.scan_token() {
                return token;
            }
        }
    }

    pub fn errors(&self) -> &[LexError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<LexError> {
        self.errors
    }

    fn scan_token(&mut self) -> Option<Token> {
        let c = self.advance();
        let token = match c {
            '(' => self.make(TokenKind::LeftParen),
            ')' => self.make(TokenKind::RightParen),
            '{' => self.make(TokenKind::LeftBrace),
            '}' => self.make(TokenKind::RightBrace),
            ',' => self.make(TokenKind::Comma),
            ';' => self.make(TokenKind::Semicolon),
            ':' => self.make(TokenKind::Colon),
            '+' => self.make(TokenKind::Plus),
            '*' => self.make(TokenKind::Star),
            '-' => {
                if self.matches('>') {
                    self.make(TokenKind::Arrow)
                } else {
                    self.make(TokenKind::Minus)
                }
            }
            '=' => {
                if self.matches('=') {
                    self.make(TokenKind::EqualEqual)
                } else {
                    self.make(TokenKind::Equal)
                }
            }
            '!' => {
                if self.matches('=') {
                    self.make(TokenKind::BangEqual)
                } else {
                    self.make(TokenKind::Bang)
                }
            }
            '<' => {
                if self.matches('=') {
                    self.make(TokenKind::LessEqual)
                } else {
                    self.make(TokenKind::Less)
                }
            }
            '>' => {
                if self.matches('=') {
                    self.make(TokenKind::GreaterEqual)
                } else {
                    self.make(TokenKind::Greater)
                }
            }
            '/' => {
                if self.matches('/') {
                    self.line_comment()
                } else {
                    self.make(TokenKind::Slash)
                }
            }
            '"' => self.string(),
            d if d.is_ascii_digit() => self.number(),
            a if is_ident_start(a) => self.identifier(),
            other => {
                self.errors.push(LexError::new(
                    format!("unexpected character '{}'", other),
                    self.token_line,
                    self.token_column,
                ));
                return None;
            }
        };
        Some(token)
    }

    fn line_comment(&mut self) -> Token {
        while !self.is_at_end() && self.peek() != '\n' {
            self.advance();
        }
        let body: String = self.chars[self.start + 2..self.current].iter().collect();
        Token::new(
            TokenKind::Comment,
            body.trim(),
            self.token_line,
            self.token_column,
        )
    }

    fn string(&mut self) -> Token {
        let mut closed = false;
        while !self.is_at_end() {
            if self.advance() == '"' {
                closed = true;
                break;
            }
        }

        let end = if closed { self.current - 1 } else { self.current };
        let text: String = self.chars[self.start + 1..end].iter().collect();
        if !closed {
            self.errors.push(LexError::new(
                "unterminated string literal",
                self.token_line,
                self.token_column,
            ));
        }
        Token::new(TokenKind::String, text, self.token_line, self.token_column)
    }

    fn number(&mut self) -> Token {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
            return self.make(TokenKind::Float);
        }

        self.make(TokenKind::Int)
    }

    fn identifier(&mut self) -> Token {
        while is_ident_continue(self.peek()) {
            self.advance();
        }

        let lexeme = self.current_lexeme();
        let kind = TokenKind::keyword(&lexeme).unwrap_or(TokenKind::Identifier);
        Token::new(kind, lexeme, self.token_line, self.token_column)
    }

    fn skip_whitespace(&mut self) {
        while !self.is_at_end() && self.peek().is_whitespace() {
            self.advance();
        }
    }

    fn make(&self, kind: TokenKind) -> Token {
        Token::new(
            kind,
            self.current_lexeme(),
            self.token_line,
            self.token_column,
        )
    }

    fn start_token(&mut self) {
        self.start = self.current;
        self.token_line = self.line;
        self.token_column = self.column;
    }

    fn current_lexeme(&self) -> String {
        self.chars[self.start..self.current].iter().collect()
    }

    fn matches(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.peek() != expected {
            return false;
        }
        self.advance();
        true
    }

    fn peek(&self) -> char {
        self.chars.get(self.current).copied().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        self.chars.get(self.current + 1).copied().unwrap_or('\0')
    }

    fn advance(&mut self) -> char {
        let c = self.chars[self.current];
        self.current += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.chars.len()
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_ascii_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).0.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn eof_repeats_after_end_of_input() {
        let mut lexer = Lexer::new("x");
        assert_eq!(lexer.next_token().kind, TokenKind::Identifier);
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
    }

    #[test]
    fn dot_without_digit_ends_integer() {
        let (tokens, errors) = lex("12.x");
        assert_eq!(tokens[0].kind, TokenKind::Int);
        assert_eq!(tokens[0].text, "12");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "unexpected character '.'");
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
    }

    #[test]
    fn two_character_operators_win_over_single() {
        assert_eq!(
            kinds("-> - == = != ! <= < >= >"),
            vec![
                TokenKind::Arrow,
                TokenKind::Minus,
                TokenKind::EqualEqual,
                TokenKind::Equal,
                TokenKind::BangEqual,
                TokenKind::Bang,
                TokenKind::LessEqual,
                TokenKind::Less,
                TokenKind::GreaterEqual,
                TokenKind::Greater,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_string_is_reported() {
        let (tokens, errors) = lex("\"abc");
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].text, "abc");
        assert_eq!(errors[0].message, "unterminated string literal");
    }
}
