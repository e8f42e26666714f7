//! Catalog build benchmarks.
//!
//! These benchmarks measure:
//! - **Catalog build**: `build_catalog` over a database with many repositories
//! - **Version comparison**: `vercmp` on typical kernel versions
//!
//! ## Running Benchmarks
//!
//! ```bash
//! cargo bench --bench catalog
//! ```

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use kmgr::catalog::{KernelNaming, build_catalog};
use kmgr::db::MemoryDatabase;
use kmgr::vercmp::vercmp;
use std::hint::black_box;

/// A database with `kernels` kernels per repository, each with headers and
/// a zfs module, plus unrelated packages.
fn database(repos: usize, kernels: usize) -> MemoryDatabase {
    let mut db = MemoryDatabase::new();
    for r in 0..repos {
        let repo = format!("repo{r}");
        for k in 0..kernels {
            let name = format!("linux-variant{k}");
            let version = format!("6.{}.{}-{}", k % 12, r, k % 3 + 1);
            db.publish(&repo, &name, &version);
            db.publish(&repo, &format!("{name}-headers"), &version);
            db.publish(&repo, &format!("{name}-zfs"), &version);
            db.publish(&repo, &format!("package{k}"), "1.0-1");
        }
    }
    for k in (0..kernels).step_by(4) {
        db.install(&format!("linux-variant{k}"), "6.0.0-1");
        db.install(&format!("linux-variant{k}-headers"), "6.0.0-1");
    }
    db
}

fn bench_build_catalog(c: &mut Criterion) {
    let naming = KernelNaming::default();
    let mut group = c.benchmark_group("build_catalog");
    for kernels in [50, 500] {
        let db = database(4, kernels);
        group.bench_with_input(BenchmarkId::from_parameter(kernels), &db, |b, db| {
            b.iter(|| build_catalog(black_box(db), &naming))
        });
    }
    group.finish();
}

fn bench_vercmp(c: &mut Criterion) {
    c.bench_function("vercmp", |b| {
        b.iter(|| {
            vercmp(black_box("6.9.2.arch1-1"), black_box("6.9.10.arch1-2"));
            vercmp(black_box("1:6.6.32-1"), black_box("6.10.0rc3-1"));
        })
    });
}

criterion_group!(benches, bench_build_catalog, bench_vercmp);
criterion_main!(benches);
