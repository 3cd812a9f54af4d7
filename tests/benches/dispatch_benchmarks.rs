//! # Dispatch Benchmarks
//!
//! Hot paths of an events-transport call:
//!
//! | Path | Per call |
//! |------|----------|
//! | Correlation registry | register + resolve + wait |
//! | Envelope codec | encode + decode of a request envelope |
//! | Directory | lookup by service and operation name |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rw_dispatch::{CorrelationId, CorrelationRegistry, ServiceDirectory};
use shared_bus::Envelope;
use shared_types::dto::CreateUserPictureRequest;
use std::time::Duration;

const SERVICES_TOML: &str = include_str!("../../configs/services.toml");

fn bench_correlation_registry(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    let mut group = c.benchmark_group("correlation-registry");

    group.bench_function("register_resolve_wait", |b| {
        let registry = CorrelationRegistry::<u64>::new();
        b.iter(|| {
            runtime.block_on(async {
                let id = CorrelationId::new();
                let handle = registry.register(id.clone(), "bench").unwrap();
                registry.resolve(id.as_str(), 7);
                black_box(handle.wait(Duration::from_secs(1)).await.unwrap())
            })
        })
    });

    for pending in [100usize, 1_000, 10_000] {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("resolve_with_backlog", pending),
            &pending,
            |b, &pending| {
                let registry = CorrelationRegistry::<u64>::new();
                let _backlog: Vec<_> = (0..pending)
                    .map(|_| registry.register(CorrelationId::new(), "backlog").unwrap())
                    .collect();
                b.iter(|| {
                    let id = CorrelationId::new();
                    let handle = registry.register(id.clone(), "bench").unwrap();
                    black_box(registry.resolve(id.as_str(), 1));
                    drop(handle);
                })
            },
        );
    }

    group.finish();
}

fn bench_envelope_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope-codec");

    for size in [1_024usize, 64 * 1_024] {
        let request = CreateUserPictureRequest {
            user_id: "u-1".into(),
            title: "holiday".into(),
            base64: "A".repeat(size),
        };
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("roundtrip", size), &request, |b, request| {
            b.iter(|| {
                let envelope =
                    Envelope::request("pictures:create_user_picture", "c-1", request).unwrap();
                let bytes = envelope.to_bytes().unwrap();
                black_box(Envelope::from_bytes(&bytes).unwrap())
            })
        });
    }

    group.finish();
}

fn bench_directory_lookup(c: &mut Criterion) {
    let directory = ServiceDirectory::from_toml_str(SERVICES_TOML).unwrap();

    c.bench_function("directory_lookup", |b| {
        b.iter(|| black_box(directory.lookup("pictures", "createUserPicture").unwrap().topic()))
    });
}

criterion_group!(
    benches,
    bench_correlation_registry,
    bench_envelope_codec,
    bench_directory_lookup
);
criterion_main!(benches);
