//! ChaCha20 benchmark
use benches::{Benchmarker, SIZES, bench_backends};
use criterion::{BenchmarkId, Throughput, criterion_group, criterion_main};

use chacha20_keystream::{Backend, ChaCha20};

fn bench_backend(c: &mut Benchmarker, backend: &'static dyn Backend) {
    let mut group = c.benchmark_group(format!("chacha20-{}", backend.name()));

    for size in SIZES {
        let mut buf = vec![0u8; size];

        group.throughput(Throughput::Bytes(size as u64));

        group.bench_function(BenchmarkId::new("apply_keystream", size), |b| {
            let mut cipher = ChaCha20::with_backend(&[0u8; 32], &[0u8; 12], 0, backend).unwrap();
            b.iter(|| {
                cipher.seek(0).unwrap();
                cipher.apply_keystream(&mut buf).unwrap();
            });
        });

        group.bench_function(BenchmarkId::new("write_keystream", size), |b| {
            let mut cipher = ChaCha20::with_backend(&[0u8; 32], &[0u8; 12], 0, backend).unwrap();
            b.iter(|| {
                cipher.seek(0).unwrap();
                cipher.write_keystream(&mut buf).unwrap();
            });
        });
    }

    group.finish();
}

fn bench(c: &mut Benchmarker) {
    for backend in bench_backends() {
        bench_backend(c, backend);
    }
}

criterion_group!(
    name = chacha20_benches;
    config = benches::config();
    targets = bench
);
criterion_main!(chacha20_benches);
