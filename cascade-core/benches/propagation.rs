//! Propagation benchmarks
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;

use cascade_core::reactive::{Effect, Memo, Path, Runtime, Signal, Store};

// =============================================================================
// SIGNALS
// =============================================================================

fn bench_signal_set(c: &mut Criterion) {
    let rt = Runtime::new();
    let s = Signal::new(&rt, 0i64);
    let mut i = 0i64;

    c.bench_function("signal_set_unobserved", |b| {
        b.iter(|| {
            i += 1;
            s.set(black_box(i)).unwrap()
        })
    });
}

fn bench_signal_set_same_value(c: &mut Criterion) {
    let rt = Runtime::new();
    let s = Signal::new(&rt, 42i64);

    c.bench_function("signal_set_same_value", |b| {
        b.iter(|| s.set(black_box(42)).unwrap())
    });
}

// =============================================================================
// MEMO CHAINS
// =============================================================================

fn bench_memo_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("memo_chain");

    for depth in [10usize, 100] {
        let rt = Runtime::new();
        let source = Signal::new(&rt, 0i64);

        let s = source.clone();
        let mut tail = Memo::new(&rt, move || s.get() + 1);
        for _ in 1..depth {
            let prev = tail.clone();
            tail = Memo::new(&rt, move || prev.get() + 1);
        }

        let mut i = 0i64;
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| {
                i += 1;
                source.set(i).unwrap();
                black_box(tail.get())
            })
        });
    }

    group.finish();
}

// =============================================================================
// EFFECT FAN-OUT
// =============================================================================

fn bench_effect_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("effect_fan_out");

    for width in [10usize, 1000] {
        let rt = Runtime::new();
        let source = Signal::new(&rt, 0i64);
        let effects: Vec<_> = (0..width)
            .map(|_| {
                let s = source.clone();
                Effect::new(&rt, move |_| {
                    black_box(s.get());
                })
            })
            .collect();

        let mut i = 0i64;
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, _| {
            b.iter(|| {
                i += 1;
                source.set(i).unwrap()
            })
        });
        drop(effects);
    }

    group.finish();
}

fn bench_batched_writes(c: &mut Criterion) {
    let rt = Runtime::new();
    let cells: Vec<_> = (0..100).map(|_| Signal::new(&rt, 0i64)).collect();

    let read = cells.clone();
    let _sum = Effect::new(&rt, move |_| {
        black_box(read.iter().map(|cell| cell.get()).sum::<i64>());
    });

    let mut i = 0i64;
    c.bench_function("batch_100_writes", |b| {
        b.iter(|| {
            i += 1;
            rt.batch(|| {
                for cell in &cells {
                    cell.set(i).unwrap();
                }
            })
            .unwrap()
        })
    });
}

// =============================================================================
// STORES
// =============================================================================

fn bench_store_leaf_write(c: &mut Criterion) {
    let rt = Runtime::new();
    let rows: Vec<_> = (0..1000)
        .map(|i| json!({ "id": i, "label": format!("row {i}") }))
        .collect();
    let store = Store::new(&rt, json!({ "rows": rows }));

    let path = Path::root().key("rows").index(500).key("label");
    let reader = store.clone();
    let watched = path.clone();
    let _effect = Effect::new(&rt, move |_| {
        black_box(reader.get(&watched).ok());
    });

    let mut i = 0u64;
    c.bench_function("store_leaf_write", |b| {
        b.iter(|| {
            i += 1;
            store.set(&path, json!(i)).unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_signal_set,
    bench_signal_set_same_value,
    bench_memo_chain,
    bench_effect_fan_out,
    bench_batched_writes,
    bench_store_leaf_write,
);
criterion_main!(benches);
