use criterion::{black_box, criterion_group, criterion_main, Criterion};
use kestrelc::codegen::CodeGenerator;

const PROGRAM: &str = r#"
func fib(n: int) -> int {
    if (n < 2) {
        return n
    }
    return fib(n - 1) + fib(n - 2)
}

func average(a: float, b: int) -> float {
    var sum = a + b
    return sum / 2
}

func main() -> int {
    int i = 0
    while (i < 10) {
        print_int(fib(i))
        i = i + 1
    }
    print_float(average(1.5, 2))
    printf("done %s\n", "ok")
    return 0
}
"#;

fn source_program(repeat: usize) -> String {
    let mut source = String::new();
    for index in 0..repeat {
        let renamed = PROGRAM
            .replace("fib", &format!("fib{}", index))
            .replace("average", &format!("average{}", index))
            .replace("func main", &format!("func main{}", index));
        source.push_str(&renamed);
    }
    source
}

fn parse_benchmark(c: &mut Criterion) {
    let source = source_program(50);
    c.bench_function("parse", |b| {
        b.iter(|| kestrel::parse_source(black_box(&source)))
    });
}

fn generate_benchmark(c: &mut Criterion) {
    let source = source_program(50);
    let program = kestrel::parse_source(&source).program;
    c.bench_function("generate", |b| {
        b.iter(|| CodeGenerator::new("bench").generate(black_box(&program)))
    });
}

fn print_benchmark(c: &mut Criterion) {
    let source = source_program(50);
    let program = kestrel::parse_source(&source).program;
    let Ok(module) = CodeGenerator::new("bench").generate(&program) else {
        return;
    };
    c.bench_function("print_ir", |b| b.iter(|| black_box(&module).to_string()));
}

criterion_group!(benches, parse_benchmark, generate_benchmark, print_benchmark);
criterion_main!(benches);
