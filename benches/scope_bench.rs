//! Benchmarks for the scope begin/register/exit hot path.
//!
//! The design target is a bookkeeping layer cheap enough to invoke on every
//! resource acquisition, with the pooled list keeping steady-state scope
//! churn allocation-free.

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use dispose_scope::{
    begin_scope, begin_scope_with, register, BoxError, Disposable, ScopeOption,
};
use std::sync::Arc;

struct Noop;

impl Disposable for Noop {
    fn dispose(&self) -> Result<(), BoxError> {
        Ok(())
    }
}

fn bench_empty_scope(c: &mut Criterion) {
    c.bench_function("begin_exit_empty", |b| {
        b.iter(|| {
            let scope = begin_scope();
            black_box(&scope);
            scope.exit().unwrap();
        });
    });
}

fn bench_register_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("register_release");
    for count in [1_usize, 8, 64, 512] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let resources: Vec<Arc<Noop>> = (0..count).map(|_| Arc::new(Noop)).collect();
            b.iter(|| {
                let scope = begin_scope_with(ScopeOption::RequiresNew, count);
                for resource in &resources {
                    register(resource.clone()).unwrap();
                }
                scope.exit().unwrap();
            });
        });
    }
    group.finish();
}

fn bench_nested_required(c: &mut Criterion) {
    c.bench_function("nested_required_join_depth_8", |b| {
        let resource = Arc::new(Noop);
        b.iter(|| {
            let outer = begin_scope();
            let inner: Vec<_> = (0..7).map(|_| begin_scope()).collect();
            register(resource.clone()).unwrap();
            for scope in inner.into_iter().rev() {
                scope.exit().unwrap();
            }
            outer.exit().unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_empty_scope,
    bench_register_release,
    bench_nested_required
);
criterion_main!(benches);
