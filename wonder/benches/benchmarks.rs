use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use wonderscript::{Interpreter, InterpreterOptions};

// ============================================================================
// Reader
// ============================================================================

fn nested_source(depth: usize) -> String {
    let mut text = String::new();
    for i in 0..depth {
        text.push_str(&format!("(define v{i} [{i} {{:k \"s{i}\"}} #{{{i}}} '(a b c)])\n"));
    }
    text
}

fn bench_reader(c: &mut Criterion) {
    let interp = Interpreter::new();
    let mut group = c.benchmark_group("reader");
    for n in [10usize, 100, 1_000] {
        let source = nested_source(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &source, |b, source| {
            b.iter(|| interp.read(black_box(source), "bench"))
        });
    }
    group.finish();
}

// ============================================================================
// Evaluation
// ============================================================================

fn bench_fib(c: &mut Criterion) {
    let interp = Interpreter::new();
    interp
        .eval_str(
            "(define fib (lambda [n] (cond (< n 2) n :else (+ (fib (- n 1)) (fib (- n 2))))))",
            "bench",
        )
        .ok();
    c.bench_function("fib 15", |b| {
        b.iter(|| interp.eval_str(black_box("(fib 15)"), "bench"))
    });
}

fn bench_loop_trampoline(c: &mut Criterion) {
    let interp = Interpreter::new();
    let mut group = c.benchmark_group("loop again");
    for n in [1_000usize, 10_000, 100_000] {
        let code = format!("(loop [i {n}] (cond (= i 0) i :else (again (- i 1))))");
        group.bench_with_input(BenchmarkId::from_parameter(n), &code, |b, code| {
            b.iter(|| interp.eval_str(black_box(code), "bench"))
        });
    }
    group.finish();
}

fn bench_collections(c: &mut Criterion) {
    let code = "(loop [i 0 acc {}] (cond (= i 500) (count acc) :else (again (+ i 1) (assoc acc i i))))";
    let native = Interpreter::new();
    let persistent = Interpreter::with_options(InterpreterOptions::new().persistent());

    let mut group = c.benchmark_group("assoc 500");
    group.bench_function("native", |b| b.iter(|| native.eval_str(black_box(code), "bench")));
    group.bench_function("persistent", |b| {
        b.iter(|| persistent.eval_str(black_box(code), "bench"))
    });
    group.finish();
}

fn bench_macroexpand(c: &mut Criterion) {
    let interp = Interpreter::new();
    interp
        .eval_str(
            "(define-macro twice [x] (list '+ x x))
             (define-macro quad [x] (list 'twice (list 'twice x)))",
            "bench",
        )
        .ok();
    c.bench_function("macro expansion", |b| {
        b.iter(|| interp.eval_str(black_box("(quad (quad 1))"), "bench"))
    });
}

criterion_group!(
    benches,
    bench_reader,
    bench_fib,
    bench_loop_trampoline,
    bench_collections,
    bench_macroexpand
);
criterion_main!(benches);
