//! Line handling for the REPL: continuation detection, ANSI colouring and
//! completion candidates.

use kestrel::lexer::token::TokenKind;

const ANSI_RESET: &str = "\x1b[0m";
const ANSI_KEYWORD: &str = "\x1b[94m";
const ANSI_STRING: &str = "\x1b[92m";
const ANSI_NUMBER: &str = "\x1b[93m";
const ANSI_COMMENT: &str = "\x1b[90m";

const BUILTINS: &[&str] = &[
    "printf",
    "print",
    "print_int",
    "print_float",
    "print_bool",
    "print_string",
];

/// Strip trailing whitespace.
pub fn normalize_line(input: &str) -> String {
    input.trim_end().to_string()
}

/// True while the buffer has an open string, parenthesis or brace, or
/// ends with a binary operator.
pub fn needs_more_input(source: &str) -> bool {
    let mut paren_depth: i32 = 0;
    let mut brace_depth: i32 = 0;
    let mut in_string = false;
    let mut chars = source.chars().peekable();

    while let Some(ch) = chars.next() {
        // The lexer has no escapes: a string ends at the next quote.
        if in_string {
            if ch == '"' {
                in_string = false;
            }
            continue;
        }

        if ch == '/' && chars.peek() == Some(&'/') {
            while let Some(next) = chars.peek() {
                if *next == '\n' {
                    break;
                }
                let _ = chars.next();
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '(' => paren_depth += 1,
            ')' => paren_depth -= 1,
            '{' => brace_depth += 1,
            '}' => brace_depth -= 1,
            _ => {}
        }
    }

    if in_string || paren_depth > 0 || brace_depth > 0 {
        return true;
    }

    let trimmed = source.trim_end();
    trimmed.ends_with('+')
        || trimmed.ends_with('-')
        || trimmed.ends_with('*')
        || (trimmed.ends_with('/') && !trimmed.ends_with("//"))
        || trimmed.ends_with('=')
        || trimmed.ends_with("->")
        || trimmed.ends_with(',')
}

/// Wrap keywords, literals and comments in ANSI colour codes.
pub fn colorize(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 16);
    let chars = input.chars().collect::<Vec<_>>();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];

        if ch == '/' && chars.get(i + 1) == Some(&'/') {
            out.push_str(ANSI_COMMENT);
            while i < chars.len() && chars[i] != '\n' {
                out.push(chars[i]);
                i += 1;
            }
            out.push_str(ANSI_RESET);
            continue;
        }

        if ch == '"' {
            out.push_str(ANSI_STRING);
            out.push(ch);
            i += 1;
            while i < chars.len() {
                let current = chars[i];
                out.push(current);
                i += 1;
                if current == '"' {
                    break;
                }
            }
            out.push_str(ANSI_RESET);
            continue;
        }

        if ch.is_ascii_digit() {
            out.push_str(ANSI_NUMBER);
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                out.push(chars[i]);
                i += 1;
            }
            out.push_str(ANSI_RESET);
            continue;
        }

        if ch == '_' || ch.is_ascii_alphabetic() {
            let start = i;
            while i < chars.len() && (chars[i] == '_' || chars[i].is_ascii_alphanumeric()) {
                i += 1;
            }
            let word = chars[start..i].iter().collect::<String>();
            if TokenKind::keyword(&word).is_some() {
                out.push_str(ANSI_KEYWORD);
                out.push_str(&word);
                out.push_str(ANSI_RESET);
            } else {
                out.push_str(&word);
            }
            continue;
        }

        out.push(ch);
        i += 1;
    }

    out
}

const KEYWORDS: &[&str] = &[
    "func", "return", "if", "else", "while", "true", "false", "var", "int", "float", "string",
    "bool", "void",
];

/// Keywords, built-ins and session symbols starting with `prefix`, sorted
/// and deduplicated.
pub fn complete(prefix: &str, symbols: &[String]) -> Vec<String> {
    let mut candidates = KEYWORDS
        .iter()
        .chain(BUILTINS)
        .map(|word| word.to_string())
        .collect::<Vec<_>>();
    candidates.extend(symbols.iter().cloned());
    candidates.sort();
    candidates.dedup();
    candidates
        .into_iter()
        .filter(|candidate| candidate.starts_with(prefix))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_braces_and_parens_continue() {
        assert!(needs_more_input("func main() -> int {"));
        assert!(needs_more_input("func add(a: int,"));
        assert!(needs_more_input("func f() {\n  print(\"a {\")\n"));
        assert!(!needs_more_input("func f() {\n  print(\"}\")\n}"));
        assert!(!needs_more_input("func f() { } // done {"));
    }

    #[test]
    fn backslash_does_not_escape_the_closing_quote() {
        assert!(!needs_more_input("func f() { print(\"a\\\"); }"));
        assert!(needs_more_input("func f() { print(\"a\nb"));
        assert_eq!(
            colorize("\"a\\\" x"),
            format!("{}\"a\\\"{} x", ANSI_STRING, ANSI_RESET)
        );
    }

    #[test]
    fn keywords_are_coloured() {
        let coloured = colorize("return x");
        assert!(coloured.starts_with(ANSI_KEYWORD));
        assert!(coloured.ends_with(" x"));
    }

    #[test]
    fn completes_builtins_and_symbols() {
        let symbols = vec!["printer".to_string()];
        assert_eq!(
            complete("print_", &symbols),
            vec!["print_bool", "print_float", "print_int", "print_string"]
        );
        assert_eq!(complete("printe", &symbols), vec!["printer"]);
    }
}
