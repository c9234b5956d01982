//! AVX2 backend: eight blocks per step.
//!
//! Each `__m256i` holds the same state row of two blocks, one per 128-bit
//! lane, and four such register sets are processed at once. Shuffles and
//! byte rotations operate within lanes, so the round function is the SSE2 one
//! at twice the width.
#![allow(unsafe_op_in_unsafe_fn)]
#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]

use super::{Backend, Capability};
use crate::{BLOCK_SIZE, DOUBLE_ROUNDS, STATE_WORDS, State, Variant};

#[cfg(target_arch = "x86")]
use core::arch::x86::*;
#[cfg(target_arch = "x86_64")]
use core::arch::x86_64::*;

const PAR_BLOCKS: usize = 8;

/// Number of `__m256i` register sets needed for `PAR_BLOCKS` blocks.
const N: usize = PAR_BLOCKS / 2;

#[derive(Debug)]
pub(crate) struct Avx2(());

static AVX2: Avx2 = Avx2(());

/// Hand out the AVX2 backend if the CPU supports it.
pub(crate) fn detect() -> Option<&'static dyn Backend> {
    if crate::avx2_cpuid::get() {
        Some(&AVX2)
    } else {
        None
    }
}

impl Backend for Avx2 {
    fn name(&self) -> &'static str {
        "avx2"
    }

    fn capability(&self) -> Capability {
        Capability::Vectorized { lanes: PAR_BLOCKS }
    }

    fn gen_ks_blocks(&self, state: &State, out: &mut [u8]) {
        let wide = state.variant() == Variant::Legacy;
        // SAFETY: `Avx2` is only reachable through `detect`, which checked
        // that the CPU supports AVX2.
        unsafe { inner(state.words(), wide, out) }
    }
}

#[inline]
#[target_feature(enable = "avx2")]
unsafe fn inner(state: &[u32; STATE_WORDS], wide: bool, out: &mut [u8]) {
    let state_ptr = state.as_ptr().cast::<__m128i>();
    let mut v = [
        _mm256_broadcastsi128_si256(_mm_loadu_si128(state_ptr.add(0))),
        _mm256_broadcastsi128_si256(_mm_loadu_si128(state_ptr.add(1))),
        _mm256_broadcastsi128_si256(_mm_loadu_si128(state_ptr.add(2))),
        _mm256_broadcastsi128_si256(_mm_loadu_si128(state_ptr.add(3))),
    ];

    let mut chunks = out.chunks_exact_mut(PAR_BLOCKS * BLOCK_SIZE);
    for chunk in &mut chunks {
        let res = rounds(&v, wide);
        v[3] = add_ctr(v[3], PAR_BLOCKS, PAR_BLOCKS, wide);
        store(&res, chunk, PAR_BLOCKS);
    }

    let tail = chunks.into_remainder();
    let tail_blocks = tail.len() / BLOCK_SIZE;
    if tail_blocks != 0 {
        let res = rounds(&v, wide);
        store(&res, tail, tail_blocks);
    }
}

/// Add `lo` to the counter of the low lane and `hi` to the counter of the
/// high lane.
#[inline]
#[target_feature(enable = "avx2")]
unsafe fn add_ctr(v: __m256i, lo: usize, hi: usize, wide: bool) -> __m256i {
    if wide {
        _mm256_add_epi64(v, _mm256_set_epi64x(0, hi as i64, 0, lo as i64))
    } else {
        _mm256_add_epi32(v, _mm256_set_epi32(0, 0, 0, hi as i32, 0, 0, 0, lo as i32))
    }
}

/// Write the first `blocks` blocks of `res`; register set `i` holds blocks
/// `2 * i` (low lane) and `2 * i + 1` (high lane).
#[inline]
#[target_feature(enable = "avx2")]
unsafe fn store(res: &[[__m256i; 4]; N], out: &mut [u8], blocks: usize) {
    debug_assert!(out.len() >= blocks * BLOCK_SIZE);
    let out_ptr = out.as_mut_ptr().cast::<__m128i>();
    for block in 0..blocks {
        let set = &res[block / 2];
        for i in 0..4 {
            let row = if block % 2 == 0 {
                _mm256_castsi256_si128(set[i])
            } else {
                _mm256_extracti128_si256::<1>(set[i])
            };
            _mm_storeu_si128(out_ptr.add(block * 4 + i), row);
        }
    }
}

#[inline]
#[target_feature(enable = "avx2")]
unsafe fn rounds(v: &[__m256i; 4], wide: bool) -> [[__m256i; 4]; N] {
    let mut res = [*v; N];
    for set in 0..N {
        res[set][3] = add_ctr(v[3], 2 * set, 2 * set + 1, wide);
    }

    for _ in 0..DOUBLE_ROUNDS {
        double_quarter_round(&mut res);
    }

    for set in 0..N {
        for i in 0..3 {
            res[set][i] = _mm256_add_epi32(res[set][i], v[i]);
        }
        let ctr = add_ctr(v[3], 2 * set, 2 * set + 1, wide);
        res[set][3] = _mm256_add_epi32(res[set][3], ctr);
    }

    res
}

#[inline]
#[target_feature(enable = "avx2")]
unsafe fn double_quarter_round(v: &mut [[__m256i; 4]; N]) {
    add_xor_rot(v);
    rows_to_cols(v);
    add_xor_rot(v);
    cols_to_rows(v);
}

#[inline]
#[target_feature(enable = "avx2")]
unsafe fn rows_to_cols(sets: &mut [[__m256i; 4]; N]) {
    for [a, _, c, d] in sets.iter_mut() {
        // c >>>= 32; d >>>= 64; a >>>= 96;
        *c = _mm256_shuffle_epi32(*c, 0b_00_11_10_01); // _MM_SHUFFLE(0, 3, 2, 1)
        *d = _mm256_shuffle_epi32(*d, 0b_01_00_11_10); // _MM_SHUFFLE(1, 0, 3, 2)
        *a = _mm256_shuffle_epi32(*a, 0b_10_01_00_11); // _MM_SHUFFLE(2, 1, 0, 3)
    }
}

#[inline]
#[target_feature(enable = "avx2")]
unsafe fn cols_to_rows(sets: &mut [[__m256i; 4]; N]) {
    for [a, _, c, d] in sets.iter_mut() {
        // c <<<= 32; d <<<= 64; a <<<= 96;
        *c = _mm256_shuffle_epi32(*c, 0b_10_01_00_11); // _MM_SHUFFLE(2, 1, 0, 3)
        *d = _mm256_shuffle_epi32(*d, 0b_01_00_11_10); // _MM_SHUFFLE(1, 0, 3, 2)
        *a = _mm256_shuffle_epi32(*a, 0b_00_11_10_01); // _MM_SHUFFLE(0, 3, 2, 1)
    }
}

#[inline]
#[target_feature(enable = "avx2")]
unsafe fn add_xor_rot(sets: &mut [[__m256i; 4]; N]) {
    let rol16 = _mm256_set_epi8(
        13, 12, 15, 14, 9, 8, 11, 10, 5, 4, 7, 6, 1, 0, 3, 2, 13, 12, 15, 14, 9, 8, 11, 10, 5, 4,
        7, 6, 1, 0, 3, 2,
    );
    let rol8 = _mm256_set_epi8(
        14, 13, 12, 15, 10, 9, 8, 11, 6, 5, 4, 7, 2, 1, 0, 3, 14, 13, 12, 15, 10, 9, 8, 11, 6, 5,
        4, 7, 2, 1, 0, 3,
    );

    for [a, b, c, d] in sets.iter_mut() {
        // a += b; d ^= a; d <<<= (16, 16, 16, 16);
        *a = _mm256_add_epi32(*a, *b);
        *d = _mm256_xor_si256(*d, *a);
        *d = _mm256_shuffle_epi8(*d, rol16);

        // c += d; b ^= c; b <<<= (12, 12, 12, 12);
        *c = _mm256_add_epi32(*c, *d);
        *b = _mm256_xor_si256(*b, *c);
        *b = _mm256_xor_si256(_mm256_slli_epi32(*b, 12), _mm256_srli_epi32(*b, 20));

        // a += b; d ^= a; d <<<= (8, 8, 8, 8);
        *a = _mm256_add_epi32(*a, *b);
        *d = _mm256_xor_si256(*d, *a);
        *d = _mm256_shuffle_epi8(*d, rol8);

        // c += d; b ^= c; b <<<= (7, 7, 7, 7);
        *c = _mm256_add_epi32(*c, *d);
        *b = _mm256_xor_si256(*b, *c);
        *b = _mm256_xor_si256(_mm256_slli_epi32(*b, 7), _mm256_srli_epi32(*b, 25));
    }
}
