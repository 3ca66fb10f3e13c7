use crate::lexer::token::TokenKind;

use super::ast::{BinaryOp, Expr};
use super::Parser;

impl Parser {
    pub(crate) fn expression(&mut self) -> Option<Expr> {
        let lhs = self.primary()?;
        self.climb(lhs, 0)
    }

    /// Precedence climbing: fold operators binding at least as tightly as
    /// `min_precedence` onto `lhs`, recursing while a tighter operator
    /// follows on the right. Equal precedence associates to the left.
    fn climb(&mut self, mut lhs: Expr, min_precedence: u8) -> Option<Expr> {
        while let Some(op) = self.peek_binary_op() {
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            self.advance();

            let mut rhs = self.primary()?;
            while let Some(next) = self.peek_binary_op() {
                if next.precedence() <= precedence {
                    break;
                }
                rhs = self.climb(rhs, next.precedence())?;
            }

            lhs = Expr::Binary {
                lhs: Box::new(lhs),
                op,
                rhs: Box::new(rhs),
            };
        }

        Some(lhs)
    }

    fn peek_binary_op(&self) -> Option<BinaryOp> {
        let op = match self.peek_kind() {
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Subtract,
            TokenKind::Star => BinaryOp::Multiply,
            TokenKind::Slash => BinaryOp::Divide,
            TokenKind::EqualEqual => BinaryOp::Equal,
            TokenKind::BangEqual => BinaryOp::NotEqual,
            TokenKind::Less => BinaryOp::Less,
            TokenKind::LessEqual => BinaryOp::LessEqual,
            TokenKind::Greater => BinaryOp::Greater,
            TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
            _ => return None,
        };
        Some(op)
    }

    fn primary(&mut self) -> Option<Expr> {
        match self.peek_kind() {
            TokenKind::Identifier => {
                let name = self.advance().text.clone();
                if self.matches(TokenKind::LeftParen) {
                    return self.call(name);
                }
                Some(Expr::Identifier(name))
            }
            TokenKind::Int => {
                let text = self.peek().text.clone();
                match text.parse::<i64>() {
                    Ok(value) => {
                        self.advance();
                        Some(Expr::Int(value))
                    }
                    Err(_) => {
                        self.error(format!("invalid integer: {}", text));
                        self.advance();
                        None
                    }
                }
            }
            TokenKind::Float => {
                let text = self.peek().text.clone();
                match text.parse::<f64>() {
                    Ok(value) => {
                        self.advance();
                        Some(Expr::Float(value))
                    }
                    Err(_) => {
                        self.error(format!("invalid float: {}", text));
                        self.advance();
                        None
                    }
                }
            }
            TokenKind::String => {
                let text = self.advance().text.clone();
                Some(Expr::String(text))
            }
            TokenKind::True => {
                self.advance();
                Some(Expr::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                Some(Expr::Bool(false))
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.consume(TokenKind::RightParen, "expected ')'")?;
                Some(expr)
            }
            TokenKind::RightBrace | TokenKind::Eof => {
                self.expected("expected expression");
                None
            }
            _ => {
                let text = self.peek().describe().to_string();
                self.error(format!("unexpected token: {}", text));
                self.advance();
                None
            }
        }
    }

    fn call(&mut self, callee: String) -> Option<Expr> {
        let mut args = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                args.push(self.expression()?);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "expected ')' after arguments")?;
        Some(Expr::Call { callee, args })
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::ast::{BinaryOp, Expr, Stmt};
    use crate::parser::parse_source;

    fn returned(source: &str) -> Expr {
        let parsed = parse_source(&format!("func f() -> int {{ return {}; }}", source));
        assert!(parsed.is_ok(), "{:?}", parsed.errors);
        match parsed.program.functions[0].body.statements[0].clone() {
            Stmt::Return { value: Some(expr) } => expr,
            other => panic!("expected return, got {:?}", other),
        }
    }

    #[test]
    fn subtraction_is_left_associative() {
        assert_eq!(returned("10 - 3 - 2").to_string(), "((10 - 3) - 2)");
    }

    #[test]
    fn comparison_binds_loosest() {
        assert_eq!(
            returned("a + 1 < b * 2").to_string(),
            "((a + 1) < (b * 2))"
        );
    }

    #[test]
    fn mixed_chain_climbs_and_returns() {
        assert_eq!(
            returned("1 * 2 + 3 * 4 - 5").to_string(),
            "(((1 * 2) + (3 * 4)) - 5)"
        );
    }

    #[test]
    fn parentheses_reset_precedence() {
        match returned("(1 + 2) * 3") {
            Expr::Binary { op, lhs, .. } => {
                assert_eq!(op, BinaryOp::Multiply);
                assert!(matches!(*lhs, Expr::Binary { op: BinaryOp::Add, .. }));
            }
            other => panic!("expected binary, got {:?}", other),
        }
    }
}
