//! Integration tests for Kestrel code generation

use kestrelc::codegen::CodegenError;
use kestrelc::ir::{Instruction, Module, Terminator, Type};
use kestrelc::{CompileError, Compiler};

fn compile(source: &str) -> Module {
    match Compiler::new().compile_source(source, "test") {
        Ok(module) => module,
        Err(err) => panic!("compilation failed: {}", err),
    }
}

fn codegen_error(source: &str) -> CodegenError {
    match Compiler::new().compile_source(source, "test") {
        Err(CompileError::Codegen(err)) => err,
        Err(other) => panic!("expected a codegen error, got {}", other),
        Ok(_) => panic!("expected a codegen error, compilation succeeded"),
    }
}

fn function_text(module: &Module, name: &str) -> String {
    module
        .function(name)
        .unwrap_or_else(|| panic!("missing function {}", name))
        .to_string()
}

#[test]
fn one_ir_function_per_source_function() {
    let module = compile(
        "func a(x: int, y: float) -> bool { return true; }\n\
         func b(s: string) {}\n\
         func main() -> int { return 0; }",
    );
    let names: Vec<_> = module.functions.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "main"]);

    let a = module.function("a").unwrap();
    let params: Vec<_> = a.params.iter().map(|p| p.ty).collect();
    assert_eq!(params, vec![Type::Int32, Type::Float32]);
    assert_eq!(a.return_type, Type::Bool1);
    assert_eq!(module.function("b").unwrap().params[0].ty, Type::StringPtr);
    assert_eq!(module.function("b").unwrap().return_type, Type::Void);
    assert!(module.verify().is_ok());
}

#[test]
fn mixed_arithmetic_widens_the_integer_operand() {
    let module = compile("func f(a: int, b: float) -> float { return a + b; }");
    let text = function_text(&module, "f");
    assert!(text.contains("%t2 = sitofp i32 %t0 to float"), "{}", text);
    assert!(text.contains("%t3 = fadd float %t2, %t1"), "{}", text);
    assert!(text.contains("ret float %t3"), "{}", text);
}

#[test]
fn returned_float_is_truncated_for_int_function() {
    let module = compile("func f(x: float) -> int { return x; }");
    let text = function_text(&module, "f");
    assert!(text.contains("fptosi float %t0 to i32"), "{}", text);
}

#[test]
fn identical_literals_share_one_global() {
    let module = compile(
        "func main() -> int {\n  printf(\"hi\");\n  printf(\"hi\");\n  var s = \"hi\";\n  return 0;\n}",
    );
    assert_eq!(module.globals.len(), 1);
    let global = module.global(".str.0").unwrap();
    assert_eq!(global.bytes, b"hi\0".to_vec());
}

#[test]
fn repeated_print_literal_is_interned_once() {
    let module = compile("func main() {\n  print(\"hi\");\n  print(\"hi\");\n  print(\"ho\");\n}");
    let count = |text: &[u8]| module.globals.iter().filter(|g| g.bytes == text).count();
    assert_eq!(count(b"hi\0"), 1);
    assert_eq!(count(b"ho\0"), 1);
}

#[test]
fn int_plus_float_literal_is_float_addition() {
    let module = compile("func f() -> float { return 1 + 2.5; }");
    let text = function_text(&module, "f");
    assert!(
        text.contains("%t0 = sitofp i32 1 to float\n  %t1 = fadd float %t0, 0x4004000000000000"),
        "{}",
        text
    );
}

#[test]
fn escapes_are_processed_before_interning() {
    let module = compile("func main() { printf(\"a\\tb\\n\"); }");
    assert_eq!(module.globals[0].bytes, b"a\tb\n\0".to_vec());
}

#[test]
fn missing_returns_yield_zero_values() {
    let module = compile(
        "func i() -> int {}\nfunc b() -> bool {}\nfunc f() -> float {}\nfunc s() -> string {}\nfunc v() {}",
    );
    assert!(function_text(&module, "i").contains("ret i32 0"));
    assert!(function_text(&module, "b").contains("ret i1 false"));
    assert!(function_text(&module, "f").contains("ret float 0x0000000000000000"));
    assert!(function_text(&module, "s").contains("ret ptr null"));
    assert!(function_text(&module, "v").contains("ret void"));
}

#[test]
fn if_else_produces_four_blocks() {
    let module = compile(
        "func sign(x: int) -> int {\n  if (x < 0) {\n    return 0 - 1;\n  } else {\n    return 1;\n  }\n}",
    );
    let function = module.function("sign").unwrap();
    let labels: Vec<_> = function.blocks.iter().map(|b| b.label.as_str()).collect();
    assert_eq!(labels, vec!["entry", "if.then.0", "if.else.0", "if.merge.0"]);

    assert!(matches!(
        &function.blocks[0].terminator,
        Some(Terminator::CondBr { then_label, else_label, .. })
            if then_label == "if.then.0" && else_label == "if.else.0"
    ));
    assert!(matches!(function.blocks[1].terminator, Some(Terminator::Ret(Some(_)))));
    assert!(matches!(function.blocks[2].terminator, Some(Terminator::Ret(Some(_)))));
    // Both arms return, so the merge block only holds the default return.
    assert!(function.blocks[3].instructions.is_empty());
    assert!(function.verify().is_ok());
}

#[test]
fn if_without_else_branches_to_merge() {
    let module = compile("func f(x: int) {\n  if (x) {\n    print(x);\n  }\n}");
    let function = module.function("f").unwrap();
    let labels: Vec<_> = function.blocks.iter().map(|b| b.label.as_str()).collect();
    assert_eq!(labels, vec!["entry", "if.then.0", "if.merge.0"]);

    let text = function.to_string();
    assert!(text.contains("icmp ne i32 %t0, 0"), "{}", text);
    assert!(text.contains("label %if.then.0, label %if.merge.0"), "{}", text);
    assert_eq!(
        function.blocks[1].terminator,
        Some(Terminator::Br("if.merge.0".to_string()))
    );
}

#[test]
fn float_and_string_conditions_compare_against_zero() {
    let module = compile(
        "func f() {\n  if (1.5) {\n  }\n}\nfunc g() {\n  while (\"s\") {\n  }\n}",
    );
    let f = function_text(&module, "f");
    assert!(
        f.contains("%t0 = fcmp one float 0x3FF8000000000000, 0x0000000000000000"),
        "{}",
        f
    );
    assert!(f.contains("br i1 %t0, label %if.then.0, label %if.merge.0"), "{}", f);

    let g = function_text(&module, "g");
    assert!(g.contains("%t1 = icmp ne ptr %t0, null"), "{}", g);
    assert!(g.contains("br i1 %t1, label %while.body.0, label %while.end.0"), "{}", g);
}

#[test]
fn while_loop_checks_condition_each_iteration() {
    let module = compile(
        "func count() -> int {\n  int i = 0;\n  while (i < 10) {\n    i = i + 1;\n  }\n  return i;\n}",
    );
    let function = module.function("count").unwrap();
    let labels: Vec<_> = function.blocks.iter().map(|b| b.label.as_str()).collect();
    assert_eq!(
        labels,
        vec!["entry", "while.cond.0", "while.body.0", "while.end.0"]
    );
    assert_eq!(
        function.blocks[0].terminator,
        Some(Terminator::Br("while.cond.0".to_string()))
    );
    assert!(matches!(
        &function.blocks[1].terminator,
        Some(Terminator::CondBr { then_label, else_label, .. })
            if then_label == "while.body.0" && else_label == "while.end.0"
    ));
    assert_eq!(
        function.blocks[2].terminator,
        Some(Terminator::Br("while.cond.0".to_string()))
    );
}

#[test]
fn loop_variables_are_allocated_once_in_entry() {
    let module = compile(
        "func f() {\n  int i = 0;\n  while (i < 3) {\n    int j = i;\n    i = i + 1;\n  }\n}",
    );
    let function = module.function("f").unwrap();
    let allocas: Vec<_> = function
        .blocks
        .iter()
        .map(|block| {
            block
                .instructions
                .iter()
                .filter(|inst| matches!(inst, Instruction::Alloca { .. }))
                .count()
        })
        .collect();
    assert_eq!(allocas, vec![2, 0, 0, 0]);
}

#[test]
fn redeclared_names_get_distinct_slots() {
    let module = compile("func f() {\n  int x = 1;\n  float x = 2.5;\n  print(x);\n}");
    let text = function_text(&module, "f");
    assert!(text.contains("%x.addr = alloca i32"), "{}", text);
    assert!(text.contains("%x.addr1 = alloca float"), "{}", text);
    assert!(text.contains("load float, ptr %x.addr1"), "{}", text);
}

#[test]
fn print_dispatches_on_argument_type() {
    let module = compile("func main() {\n  print(1.5);\n  print(true);\n  print_int(2);\n}");
    let names: Vec<_> = module.functions.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["main", "print_int", "print_float", "print_bool", "printf"]
    );
    assert!(module.function("printf").unwrap().is_declaration());

    let main = function_text(&module, "main");
    assert!(main.contains("call void @print_float(float 0x3FF8000000000000)"), "{}", main);
    assert!(main.contains("call void @print_bool(i1 true)"), "{}", main);
    assert!(main.contains("call void @print_int(i32 2)"), "{}", main);
}

#[test]
fn printf_promotes_variadic_arguments() {
    let module = compile("func main() {\n  printf(\"%f %d\\n\", 1.5, true);\n}");
    let main = function_text(&module, "main");
    assert!(main.contains("fpext float 0x3FF8000000000000 to double"), "{}", main);
    assert!(main.contains("zext i1 true to i32"), "{}", main);
    assert!(
        main.contains("call i32 (ptr, ...) @printf(ptr %t0, double %t1, i32 %t2)"),
        "{}",
        main
    );
}

#[test]
fn bool_widens_to_int_on_assignment() {
    let module = compile("func f() -> int {\n  int x = true;\n  return x;\n}");
    assert!(function_text(&module, "f").contains("zext i1 true to i32"));
}

#[test]
fn semantic_errors_are_reported() {
    assert_eq!(
        codegen_error("func f() -> int { return y; }"),
        CodegenError::UndefinedVariable("y".to_string())
    );
    assert_eq!(
        codegen_error("func f() { missing(); }"),
        CodegenError::UndefinedFunction("missing".to_string())
    );
    assert_eq!(
        codegen_error("func g(a: int) {}\nfunc f() { g(1, 2); }"),
        CodegenError::ArityMismatch {
            name: "g".to_string(),
            expected: 1,
            found: 2,
        }
    );
    assert_eq!(
        codegen_error("func f() { int x = \"text\"; }"),
        CodegenError::CannotConvert {
            from: Type::StringPtr,
            to: Type::Int32,
        }
    );
    assert_eq!(
        codegen_error("func f() { var x = 2147483648; }"),
        CodegenError::IntegerOutOfRange(2147483648)
    );
}

#[test]
fn string_arithmetic_is_rejected() {
    let err = codegen_error("func f() { var s = \"a\" + 1; }");
    assert_eq!(err.to_string(), "operator '+' cannot be applied to ptr and i32");
}

#[test]
fn void_call_initializes_inferred_variable_with_zero() {
    let module = compile("func g() {}\nfunc f() -> int { var x = g(); return x; }");
    let text = function_text(&module, "f");
    assert!(text.contains("%x.addr = alloca i32"), "{}", text);
    assert!(text.contains("call void @g()"), "{}", text);
    assert!(text.contains("store i32 0, ptr %x.addr"), "{}", text);
}

#[test]
fn compile_error_wraps_codegen_message() {
    let err = Compiler::new()
        .compile_source("func f() { x = 1; }", "test")
        .unwrap_err();
    assert_eq!(err.to_string(), "codegen error: undefined variable: x");
}

#[test]
fn compile_file_names_module_after_file() {
    let dir = std::env::temp_dir().join(format!("kestrelc-codegen-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("answer.k");
    std::fs::write(&path, "func main() -> int { return 42; }\n").unwrap();

    let module = Compiler::new().compile_file(&path).unwrap();
    assert_eq!(module.name, "answer.k");

    let missing = Compiler::new().compile_file(&dir.join("missing.k"));
    assert!(matches!(missing, Err(CompileError::Io { .. })));
    let _ = std::fs::remove_dir_all(&dir);
}
