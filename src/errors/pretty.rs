use crate::parser::ParseError;

pub fn underline(line: &str, column: usize) -> String {
    let mut marker = String::new();
    for _ in 1..column {
        marker.push(' ');
    }
    marker.push('^');
    format!("{}\n{}", line, marker)
}

/// Render a diagnostic with the offending source line and a caret.
pub fn format_parse_error(source_label: &str, source: &str, err: &ParseError) -> String {
    let header = format!(
        "{}:{}:{}: {}",
        source_label, err.line, err.column, err.message
    );
    match source.lines().nth(err.line.saturating_sub(1)) {
        Some(line) => format!("{}\n{}", header, underline(line, err.column)),
        None => header,
    }
}

pub fn format_parse_errors(source_label: &str, source: &str, errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(|err| format_parse_error(source_label, source, err))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caret_points_at_column() {
        let err = ParseError {
            message: "expected ')' after condition, got {".to_string(),
            line: 2,
            column: 9,
        };
        let rendered = format_parse_error("demo.k", "func f() {\n  if (x {\n}", &err);
        assert_eq!(
            rendered,
            "demo.k:2:9: expected ')' after condition, got {\n  if (x {\n        ^"
        );
    }
}
