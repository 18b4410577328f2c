//! Criterion benchmarks for the manager's per-call hot path.
//!
//! Every management call validates its arguments and most touch the
//! registry, all on the single coordinating task.  These benches keep an eye
//! on how that work scales with the number of registered objects.
//!
//! Run with:
//! ```bash
//! cargo bench --package pan-manager --bench registry_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pan_core::{connection_path, BdAddr, ServiceRequestType};
use pan_manager::application::registry::{ObjectKind, ObjectRegistry};

// ── Fixture builders ──────────────────────────────────────────────────────────

/// A registry holding `n` connections and both server roles.
fn registry_with_connections(n: u64) -> ObjectRegistry {
    let mut registry = ObjectRegistry::new();
    registry.register(ObjectKind::Server, "/org/bluez/network/server/1116");
    registry.register(ObjectKind::Server, "/org/bluez/network/server/1117");
    for i in 0..n {
        registry.register(ObjectKind::Connection, &connection_path(i));
    }
    registry
}

// ── Benchmarks: registry ──────────────────────────────────────────────────────

/// Benchmarks the duplicate check done before every registration.
fn bench_contains_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_contains");

    for &count in &[1u64, 8, 64, 256] {
        let registry = registry_with_connections(count);
        // Worst case for the linear scan: the most recent connection.
        let last = connection_path(count - 1);

        group.bench_with_input(BenchmarkId::new("connections", count), &last, |b, path| {
            b.iter(|| registry.contains(black_box(ObjectKind::Connection), black_box(path)))
        });
    }

    group.finish();
}

/// Benchmarks a register/unregister cycle against a populated registry.
fn bench_register_unregister(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_churn");

    for &count in &[8u64, 64] {
        let mut registry = registry_with_connections(count);
        let extra = connection_path(count);

        group.bench_with_input(BenchmarkId::new("connections", count), &extra, |b, path| {
            b.iter(|| {
                registry.register(ObjectKind::Connection, black_box(path));
                registry
                    .unregister(ObjectKind::Connection, black_box(path))
                    .expect("just registered");
            })
        });
    }

    group.finish();
}

/// Benchmarks building the `ListConnections` reply body.
fn bench_list(c: &mut Criterion) {
    let registry = registry_with_connections(64);

    c.bench_function("registry_list_64", |b| {
        b.iter(|| registry.list(black_box(ObjectKind::Connection)).to_vec())
    });
}

// ── Benchmarks: argument parsing ──────────────────────────────────────────────

/// Benchmarks the address and service parsing done by `CreateConnection`.
fn bench_argument_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("argument_parsing");

    group.bench_function("bd_addr", |b| {
        b.iter(|| black_box("AA:BB:CC:DD:EE:FF").parse::<BdAddr>())
    });

    for label in ["nap", "GN", "0x1116", "00001117-0000-1000-8000-00805f9b34fb"] {
        group.bench_with_input(BenchmarkId::new("service", label), &label, |b, label| {
            b.iter(|| black_box(*label).parse::<ServiceRequestType>())
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_contains_scaling,
    bench_register_unregister,
    bench_list,
    bench_argument_parsing,
);
criterion_main!(benches);
