//! Invoke and mutation throughput for both delegate flavours.
//!
//! Run with: cargo bench -p pulse-delegate

use std::sync::atomic::{AtomicU64, Ordering};

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use pulse_delegate::{Callback, FastMulticastDelegate, MulticastDelegate};

static SINK: AtomicU64 = AtomicU64::new(0);

fn sink(v: &u64) {
    SINK.fetch_add(*v, Ordering::Relaxed);
}

// ============================================================================
// Invoke
// ============================================================================

fn bench_invoke(c: &mut Criterion) {
    let mut group = c.benchmark_group("invoke");

    for len in [0usize, 1, 8, 64] {
        group.throughput(Throughput::Elements(len.max(1) as u64));

        let shared = MulticastDelegate::new();
        let mut fast = FastMulticastDelegate::new();
        for _ in 0..len {
            shared.add(Callback::from_fn(sink));
            fast.add(Callback::from_fn(sink));
        }

        group.bench_with_input(BenchmarkId::new("multicast", len), &len, |b, _| {
            b.iter(|| shared.invoke(black_box(&1)));
        });
        group.bench_with_input(BenchmarkId::new("fast", len), &len, |b, _| {
            b.iter(|| fast.invoke(black_box(&1)));
        });
    }

    group.finish();
}

// ============================================================================
// Add + Remove
// ============================================================================

fn bench_add_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_remove");
    group.throughput(Throughput::Elements(1));

    let cb = Callback::from_fn(sink);

    let shared = MulticastDelegate::new();
    shared.add(Callback::from_fn(sink));
    group.bench_function("multicast", |b| {
        b.iter(|| {
            shared.add(cb);
            black_box(shared.remove(cb));
        });
    });

    let mut fast = FastMulticastDelegate::new();
    fast.add(Callback::from_fn(sink));
    group.bench_function("fast", |b| {
        b.iter(|| {
            fast.add(cb);
            black_box(fast.remove(cb));
        });
    });

    group.finish();
}

criterion_group!(benches, bench_invoke, bench_add_remove);
criterion_main!(benches);
