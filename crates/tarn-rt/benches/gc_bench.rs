//! Collector pause-time benchmarks: minor sweep of a churn burst, full
//! mark-and-sweep of a cyclic graph, and the cost of spreading the same
//! collection over budgeted slices.

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use tarn_rt::Context;

fn churn(ctx: &mut Context, cells: i64) {
    for i in 0..cells {
        let h = ctx.alloc(4).unwrap();
        ctx.assign(i, h);
        ctx.erase(i).unwrap();
    }
}

fn cyclic_garbage(ctx: &mut Context, pairs: i64) {
    for i in 0..pairs {
        let a = ctx.alloc(1).unwrap();
        let b = ctx.alloc(1).unwrap();
        ctx.write(a, 0, b).unwrap();
        ctx.write(b, 0, a).unwrap();
        ctx.assign(i, a);
        ctx.erase(i).unwrap();
    }
}

fn bench_minor_gc(c: &mut Criterion) {
    c.bench_function("minor_gc_1000_dead_cells", |b| {
        b.iter(|| {
            let mut ctx = Context::new();
            churn(&mut ctx, 1000);
            ctx.minor_gc();
            black_box(ctx.heap_len());
        });
    });
}

fn bench_major_gc(c: &mut Criterion) {
    c.bench_function("major_gc_500_cycles", |b| {
        b.iter(|| {
            let mut ctx = Context::new();
            cyclic_garbage(&mut ctx, 500);
            ctx.major_gc(-1);
            black_box(ctx.heap_len());
        });
    });
}

fn bench_major_gc_sliced(c: &mut Criterion) {
    c.bench_function("major_gc_500_cycles_sliced_64", |b| {
        b.iter(|| {
            let mut ctx = Context::new();
            cyclic_garbage(&mut ctx, 500);
            ctx.major_gc(64);
            while ctx.major_in_progress() {
                ctx.major_gc(64);
            }
            black_box(ctx.heap_len());
        });
    });
}

criterion_group!(benches, bench_minor_gc, bench_major_gc, bench_major_gc_sliced);
criterion_main!(benches);
