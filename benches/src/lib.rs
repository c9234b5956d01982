//! Shared setup for the keystream benchmarks.
use chacha20_keystream::{Backend, backends};

/// Cycle counter where the platform has one, wall clock elsewhere.
#[cfg(any(
    target_arch = "x86_64",
    target_arch = "x86",
    all(target_arch = "aarch64", target_os = "linux")
))]
pub type Measurement = criterion_cycles_per_byte::CyclesPerByte;
#[cfg(not(any(
    target_arch = "x86_64",
    target_arch = "x86",
    all(target_arch = "aarch64", target_os = "linux")
)))]
pub type Measurement = criterion::measurement::WallTime;

pub type Benchmarker = criterion::Criterion<Measurement>;

/// Message sizes every backend is measured at.
pub const SIZES: [usize; 5] = [1024, 2 * 1024, 4 * 1024, 8 * 1024, 16 * 1024];

pub fn config() -> Benchmarker {
    criterion::Criterion::default().with_measurement(Measurement)
}

/// The portable backend followed by every vector backend this CPU runs.
pub fn bench_backends() -> Vec<&'static dyn Backend> {
    let mut all = vec![backends::soft()];
    all.extend(backends::sse2());
    all.extend(backends::avx2());
    all
}
