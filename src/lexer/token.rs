use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Comma,
    Semicolon,
    Colon,
    Plus,
    Minus,
    Star,
    Slash,
    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Arrow,
    Identifier,
    Int,
    Float,
    String,
    Comment,
    Func,
    Return,
    If,
    Else,
    While,
    True,
    False,
    Var,
    IntType,
    FloatType,
    StringType,
    BoolType,
    VoidType,
    Eof,
}

impl TokenKind {
    /// Keyword lookup for an identifier-shaped lexeme.
    pub fn keyword(text: &str) -> Option<TokenKind> {
        let kind = match text {
            "func" => TokenKind::Func,
            "return" => TokenKind::Return,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "var" => TokenKind::Var,
            "int" => TokenKind::IntType,
            "float" => TokenKind::FloatType,
            "string" => TokenKind::StringType,
            "bool" => TokenKind::BoolType,
            "void" => TokenKind::VoidType,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_type_keyword(self) -> bool {
        matches!(
            self,
            TokenKind::IntType
                | TokenKind::FloatType
                | TokenKind::StringType
                | TokenKind::BoolType
                | TokenKind::VoidType
        )
    }

    pub fn is_keyword(self) -> bool {
        self.is_type_keyword()
            || matches!(
                self,
                TokenKind::Func
                    | TokenKind::Return
                    | TokenKind::If
                    | TokenKind::Else
                    | TokenKind::While
                    | TokenKind::True
                    | TokenKind::False
                    | TokenKind::Var
            )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw source text. String tokens hold the text between the quotes,
    /// comment tokens the trimmed comment body.
    pub text: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
            column,
        }
    }

    /// Text used when quoting this token in a diagnostic.
    pub fn describe(&self) -> &str {
        match self.kind {
            TokenKind::Eof => "end of input",
            _ => &self.text,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::String => write!(f, "\"{}\"", self.text),
            TokenKind::Comment => write!(f, "// {}", self.text),
            _ => f.write_str(&self.text),
        }
    }
}
