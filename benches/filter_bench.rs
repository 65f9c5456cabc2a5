//! Criterion benchmarks for the filter engine.
//!
//! `parse_compile` measures the one-off cost per expression; the other groups
//! measure per-record evaluation over a batch of 1000 records, which is the
//! cost that dominates in practice.
//!
//! Run:
//!   cargo bench
//!   cargo bench -- evaluate      # one group

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use histfilter::{compile, parser, FilterEngine, Value};
use indexmap::IndexMap;

// ── Data builders ─────────────────────────────────────────────────────────────

/// 1000 event records: {id, kind, path, actor: {name, roles}, size, tags}.
fn events_1000() -> Vec<Value> {
    let kinds = ["create", "update", "delete", "move"];
    (0..1000_usize)
        .map(|i| {
            let mut actor = IndexMap::new();
            actor.insert("name".to_string(), Value::from(format!("user{}", i % 37)));
            let role = if i % 5 == 0 { "admin" } else { "writer" };
            actor.insert(
                "roles".to_string(),
                Value::list(vec![Value::from("reader"), Value::from(role)]),
            );

            let tags: Vec<Value> = (0..i % 4).map(|j| Value::from(format!("t{j}"))).collect();

            let mut m = IndexMap::new();
            m.insert("id".to_string(), Value::from(i));
            m.insert("kind".to_string(), Value::from(kinds[i % 4]));
            m.insert(
                "path".to_string(),
                Value::from(format!("collections/c{}/docs/d{}", i % 10, i)),
            );
            m.insert("actor".to_string(), Value::map(actor));
            m.insert("size".to_string(), Value::from((i * 37 % 1000) as f64));
            m.insert("tags".to_string(), Value::list(tags));
            Value::map(m)
        })
        .collect()
}

const EXPRESSIONS: &[(&str, &str)] = &[
    ("field", "size"),
    ("comparison", "size > 500 && kind == 'update'"),
    ("member_chain", "actor.name == 'user3'"),
    ("membership", "'admin' in actor.roles"),
    ("glob_literal", "path =* 'collections/c1/**'"),
    ("regex_literal", r"path =~ 'd\\d*7$'"),
    ("quantifier", "any('glob', tags, 't*')"),
    ("math", "Math.floor(size / 100) % 2 == 0"),
    ("ternary", "kind == 'delete' ? size > 100 : size < 900"),
];

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_parse_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_compile");

    for (name, expr) in EXPRESSIONS {
        group.bench_with_input(BenchmarkId::new("parse", name), expr, |b, expr| {
            b.iter(|| black_box(parser::parse(black_box(expr)).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("compile", name), expr, |b, expr| {
            b.iter(|| black_box(compile(black_box(expr)).unwrap()))
        });
    }

    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");
    let records = events_1000();

    for (name, expr) in EXPRESSIONS {
        let compiled = compile(expr).unwrap();
        group.bench_function(*name, |b| {
            b.iter(|| black_box(compiled.filter(black_box(&records))))
        });
    }

    group.finish();
}

fn bench_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine");
    let records = events_1000();
    let engine = FilterEngine::new();
    let expr = "size > 500 && path =* 'collections/c[1-3]/**'";

    // Cache hit: only the filter pass is paid
    group.bench_function("cached_filter", |b| {
        b.iter(|| black_box(engine.filter(black_box(&records), black_box(expr)).unwrap()))
    });

    group.bench_function("uncached_filter", |b| {
        b.iter(|| {
            black_box(histfilter::filter_records(black_box(&records), black_box(expr)).unwrap())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_parse_compile, bench_evaluate, bench_engine);
criterion_main!(benches);
