use kestrel::parser::ast::{BinaryOp, Expr, Program, Stmt, TypeName};
use kestrel::parse_source;

fn parse(source: &str) -> Program {
    let parsed = parse_source(source);
    assert!(parsed.is_ok(), "unexpected diagnostics: {:?}", parsed.errors);
    parsed.program
}

fn body(source: &str) -> Vec<Stmt> {
    let program = parse(source);
    program.functions[0].body.statements.clone()
}

#[test]
fn parses_function_signature() {
    let program = parse("func add(a: int, b: float) -> bool { return true; }");
    let function = &program.functions[0];
    assert_eq!(function.name, "add");
    assert_eq!(function.params.len(), 2);
    assert_eq!(function.params[0].name, "a");
    assert_eq!(function.params[0].ty, TypeName::Int);
    assert_eq!(function.params[1].ty, TypeName::Float);
    assert_eq!(function.return_type, TypeName::Bool);
    assert_eq!(function.line, 1);
}

#[test]
fn keeps_functions_in_source_order() {
    let program = parse("func a() {} func b() -> int { return 1; } func c(s: string) {}");
    let names: Vec<_> = program.functions.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    let statements = body("func f() -> int { return 1 + 2 * 3; }");
    match &statements[0] {
        Stmt::Return {
            value: Some(Expr::Binary { lhs, op, rhs }),
        } => {
            assert_eq!(*op, BinaryOp::Add);
            assert_eq!(**lhs, Expr::Int(1));
            assert_eq!(
                **rhs,
                Expr::Binary {
                    lhs: Box::new(Expr::Int(2)),
                    op: BinaryOp::Multiply,
                    rhs: Box::new(Expr::Int(3)),
                }
            );
        }
        other => panic!("expected return of a binary expression, got {:?}", other),
    }
}

#[test]
fn parses_typed_and_inferred_declarations() {
    let statements = body("func f() { int x = 4; float y; var z = x + 1.5; }");
    assert_eq!(
        statements[0],
        Stmt::VarDecl {
            name: "x".to_string(),
            declared_type: Some(TypeName::Int),
            inferred: false,
            initializer: Some(Expr::Int(4)),
        }
    );
    assert_eq!(
        statements[1],
        Stmt::VarDecl {
            name: "y".to_string(),
            declared_type: Some(TypeName::Float),
            inferred: false,
            initializer: None,
        }
    );
    match &statements[2] {
        Stmt::VarDecl {
            declared_type: None,
            inferred: true,
            initializer: Some(Expr::Binary { op, .. }),
            ..
        } => assert_eq!(*op, BinaryOp::Add),
        other => panic!("expected inferred declaration, got {:?}", other),
    }
}

#[test]
fn distinguishes_assignment_from_call_statement() {
    let statements = body("func f() { x = 1; print(x); }");
    assert!(matches!(&statements[0], Stmt::Assign { name, .. } if name == "x"));
    match &statements[1] {
        Stmt::Expr(Expr::Call { callee, args }) => {
            assert_eq!(callee, "print");
            assert_eq!(args, &vec![Expr::Identifier("x".to_string())]);
        }
        other => panic!("expected call statement, got {:?}", other),
    }
}

#[test]
fn parses_if_else_and_while() {
    let statements = body(
        "func f(n: int) { if (n > 0) { n = n - 1; } else { return; } while (n < 10) { n = n + 1; } }",
    );
    match &statements[0] {
        Stmt::If {
            condition,
            then_block,
            else_block: Some(else_block),
        } => {
            assert_eq!(condition.to_string(), "(n > 0)");
            assert_eq!(then_block.statements.len(), 1);
            assert_eq!(else_block.statements, vec![Stmt::Return { value: None }]);
        }
        other => panic!("expected if/else, got {:?}", other),
    }
    match &statements[1] {
        Stmt::While { condition, body } => {
            assert_eq!(condition.to_string(), "(n < 10)");
            assert_eq!(body.statements.len(), 1);
        }
        other => panic!("expected while, got {:?}", other),
    }
}

#[test]
fn parses_literals() {
    let statements =
        body("func f() { print(7); print(2.5); print(\"hi\\n\"); print(true); print(false); }");
    let args: Vec<Expr> = statements
        .iter()
        .map(|stmt| match stmt {
            Stmt::Expr(Expr::Call { args, .. }) => args[0].clone(),
            other => panic!("expected call, got {:?}", other),
        })
        .collect();
    assert_eq!(
        args,
        vec![
            Expr::Int(7),
            Expr::Float(2.5),
            Expr::String("hi\\n".to_string()),
            Expr::Bool(true),
            Expr::Bool(false),
        ]
    );
}

#[test]
fn nested_calls_as_arguments() {
    let statements = body("func f() { print(add(1, mul(2, 3))); }");
    assert_eq!(
        statements[0],
        Stmt::Expr(Expr::Call {
            callee: "print".to_string(),
            args: vec![Expr::Call {
                callee: "add".to_string(),
                args: vec![
                    Expr::Int(1),
                    Expr::Call {
                        callee: "mul".to_string(),
                        args: vec![Expr::Int(2), Expr::Int(3)],
                    },
                ],
            }],
        })
    );
}

#[test]
fn reports_missing_paren_with_line_number() {
    let parsed = parse_source("func f() {\n    if (x {\n    }\n}\n");
    assert!(!parsed.is_ok());
    assert_eq!(
        parsed.errors[0].to_string(),
        "line 2: expected ')' after condition, got {"
    );
}

#[test]
fn collects_multiple_diagnostics() {
    let parsed = parse_source(
        "func f() -> list { }\nfunc g(a int) { }\nfunc ok() -> int { return 1; }\n",
    );
    let messages: Vec<String> = parsed.errors.iter().map(|e| e.to_string()).collect();
    assert_eq!(
        messages,
        vec![
            "line 1: expected return type, got list".to_string(),
            "line 2: expected ':' after parameter name, got int".to_string(),
        ]
    );
    let names: Vec<_> = parsed
        .program
        .functions
        .iter()
        .map(|f| f.name.as_str())
        .collect();
    assert_eq!(names, vec!["ok"]);
}

#[test]
fn lexical_and_syntax_errors_are_batched_in_order() {
    let parsed = parse_source("func f() {\n  int x = 1 $ + ;\n}\n42\n");
    let messages: Vec<String> = parsed.errors.iter().map(|e| e.to_string()).collect();
    assert_eq!(
        messages,
        vec![
            "line 2: unexpected character '$'".to_string(),
            "line 2: unexpected token: ;".to_string(),
            "line 4: unexpected token at top level: 42".to_string(),
        ]
    );
}

#[test]
fn skips_garbage_before_first_function() {
    let parsed = parse_source("garbage here func main() { }");
    assert_eq!(parsed.errors.len(), 1);
    assert_eq!(parsed.program.functions.len(), 1);
}
