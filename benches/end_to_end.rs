//! Parse, bind and generate latency for typical statement sets.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use symcl::kernel::{emit_program, schedule};
use symcl::lower::lower_file;
use symcl::syntax::parse_source;
use symcl::{compile_silent, CompileOptions, GeneratorConfig};

const AXPY: &str = "vector<float> x, y;\nhost<float> alpha;\ny = alpha * x + y;\n";

const CG_STEP: &str = "\
matrix<float, row> A;
vector<float> p, q, r, x;
scalar<float> rr, pq;
q = A * p;
rr = dot(r, r);
pq = dot(p, q);
x += rr / pq * p;
r -= rr / pq * q;
";

/// A long chain of fused elementwise statements.
fn synthetic_chain(n: usize) -> String {
    let mut src = String::from("vector<float> a, b, c;\nhost<float> s;\n");
    for i in 0..n {
        match i % 3 {
            0 => src.push_str("a = s * b + c;\n"),
            1 => src.push_str("b = a .* c - b;\n"),
            _ => src.push_str("c = exp(a) + b ./ c;\n"),
        }
    }
    src
}

fn bench_stages(c: &mut Criterion) {
    let config = GeneratorConfig::default();
    let mut group = c.benchmark_group("stages");
    group.bench_function("parse", |b| b.iter(|| parse_source(black_box(CG_STEP), 0)));
    let file = match parse_source(CG_STEP, 0) {
        Ok(file) => file,
        Err(_) => return,
    };
    group.bench_function("lower+bind", |b| {
        b.iter(|| {
            let statements = lower_file(black_box(&file), &config).ok()?;
            schedule(statements, &config).ok()
        })
    });
    group.bench_function("generate", |b| {
        b.iter(|| {
            let statements = lower_file(&file, &config).ok()?;
            let plan = schedule(statements, &config).ok()?;
            emit_program(&plan, "bench", &config).ok()
        })
    });
    group.finish();
}

fn bench_end_to_end(c: &mut Criterion) {
    let options = CompileOptions::default();
    let chain = synthetic_chain(64);
    let mut group = c.benchmark_group("compile");
    group.bench_function("axpy", |b| {
        b.iter(|| compile_silent(black_box(AXPY), &options))
    });
    group.bench_function("cg_step", |b| {
        b.iter(|| compile_silent(black_box(CG_STEP), &options))
    });
    group.bench_function("chain_64", |b| {
        b.iter(|| compile_silent(black_box(&chain), &options))
    });
    group.finish();
}

criterion_group!(benches, bench_stages, bench_end_to_end);
criterion_main!(benches);
