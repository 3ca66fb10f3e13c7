use kestrel::lexer::lex;
use kestrel::lexer::token::{Token, TokenKind};

fn significant(tokens: &[Token]) -> Vec<(TokenKind, String)> {
    tokens
        .iter()
        .filter(|t| t.kind != TokenKind::Comment)
        .map(|t| (t.kind, t.text.clone()))
        .collect()
}

#[test]
fn lexes_function_header() {
    let (tokens, errors) = lex("func add(a: int, b: int) -> int {");
    assert!(errors.is_empty());
    let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Func,
            TokenKind::Identifier,
            TokenKind::LeftParen,
            TokenKind::Identifier,
            TokenKind::Colon,
            TokenKind::IntType,
            TokenKind::Comma,
            TokenKind::Identifier,
            TokenKind::Colon,
            TokenKind::IntType,
            TokenKind::RightParen,
            TokenKind::Arrow,
            TokenKind::IntType,
            TokenKind::LeftBrace,
            TokenKind::Eof,
        ]
    );
    assert_eq!(tokens[1].text, "add");
}

#[test]
fn lexes_float_and_comparison() {
    let (tokens, _) = lex("pi = 3.14 >= 3");
    assert_eq!(tokens[0].kind, TokenKind::Identifier);
    assert_eq!(tokens[1].kind, TokenKind::Equal);
    assert_eq!(tokens[2].kind, TokenKind::Float);
    assert_eq!(tokens[2].text, "3.14");
    assert_eq!(tokens[3].kind, TokenKind::GreaterEqual);
    assert_eq!(tokens[4].kind, TokenKind::Int);
}

#[test]
fn keywords_are_recognized() {
    let (tokens, _) = lex("func return if else while true false var int float string bool void funcs");
    let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Func,
            TokenKind::Return,
            TokenKind::If,
            TokenKind::Else,
            TokenKind::While,
            TokenKind::True,
            TokenKind::False,
            TokenKind::Var,
            TokenKind::IntType,
            TokenKind::FloatType,
            TokenKind::StringType,
            TokenKind::BoolType,
            TokenKind::VoidType,
            TokenKind::Identifier,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn string_text_keeps_escapes_raw() {
    let (tokens, _) = lex(r#"print("a\tb\n")"#);
    assert_eq!(tokens[2].kind, TokenKind::String);
    assert_eq!(tokens[2].text, r"a\tb\n");
}

#[test]
fn comments_become_tokens() {
    let (tokens, _) = lex("x // trailing note  \ny");
    assert_eq!(tokens[1].kind, TokenKind::Comment);
    assert_eq!(tokens[1].text, "trailing note");
    assert_eq!(tokens[2].line, 2);
    assert_eq!(tokens[2].column, 1);
}

#[test]
fn tracks_line_and_column() {
    let (tokens, _) = lex("func f() {\n    return 1;\n}");
    let ret = &tokens[5];
    assert_eq!(ret.kind, TokenKind::Return);
    assert_eq!((ret.line, ret.column), (2, 5));
    let one = &tokens[6];
    assert_eq!((one.line, one.column), (2, 12));
}

#[test]
fn unknown_character_is_reported_and_skipped() {
    let (tokens, errors) = lex("a @ b");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].to_string(), "line 1: unexpected character '@'");
    assert_eq!(errors[0].column, 3);
    let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![TokenKind::Identifier, TokenKind::Identifier, TokenKind::Eof]
    );
}

#[test]
fn relexing_token_texts_reproduces_the_stream() {
    let source = r#"
func main() -> int {
    // count up
    var total = 0;
    int i = 0;
    while (i <= 10) {
        total = total + i * 2.5;
        i = i + 1;
    }
    if (total != 0) { print("done"); } else { print(false); }
    return total;
}
"#;
    let (tokens, errors) = lex(source);
    assert!(errors.is_empty());

    let rebuilt = tokens
        .iter()
        .filter(|t| !matches!(t.kind, TokenKind::Comment | TokenKind::Eof))
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    let (again, errors) = lex(&rebuilt);
    assert!(errors.is_empty());

    assert_eq!(significant(&tokens), significant(&again));
}
