//! Exploration hot-path benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use weft_check::{check, CheckConfig, ErrorPolicy, Reduction};
use weft_core::load_str;

fn bench_racing_writers(c: &mut Criterion) {
    let program = load_str(
        "thread a { write x = 1; write x = 2; }\n\
         thread b { write x = 3; write x = 4; }\n\
         thread c { write x = 5; }",
    )
    .unwrap();
    let config = CheckConfig::new().with_policy(ErrorPolicy::KeepGoing);
    c.bench_function("dpor_racing_writers", |b| {
        b.iter(|| check(black_box(&program), &config).unwrap())
    });
}

fn bench_lock_contention(c: &mut Criterion) {
    let program = load_str(
        "thread a { lock m; fadd x, 1; unlock m; lock m; fadd x, 1; unlock m; }\n\
         thread b { lock m; fadd x, 1; unlock m; }\n\
         thread c { lock m; fadd x, 1; unlock m; }",
    )
    .unwrap();
    let config = CheckConfig::new().with_policy(ErrorPolicy::KeepGoing);
    c.bench_function("dpor_lock_contention", |b| {
        b.iter(|| check(black_box(&program), &config).unwrap())
    });
}

fn bench_exhaustive_reference(c: &mut Criterion) {
    let program = load_str(
        "thread a { write x = 1; write y = 1; }\n\
         thread b { write y = 2; write x = 2; }",
    )
    .unwrap();
    let config = CheckConfig::new()
        .with_reduction(Reduction::Exhaustive)
        .with_policy(ErrorPolicy::KeepGoing);
    c.bench_function("exhaustive_store_buffer", |b| {
        b.iter(|| check(black_box(&program), &config).unwrap())
    });
}

criterion_group!(
    benches,
    bench_racing_writers,
    bench_lock_contention,
    bench_exhaustive_reference
);
criterion_main!(benches);
