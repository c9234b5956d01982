//! SSE2 backend: four blocks per step, one state row per `__m128i`.
#![allow(unsafe_op_in_unsafe_fn)]
#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]

use super::{Backend, Capability};
use crate::{BLOCK_SIZE, DOUBLE_ROUNDS, STATE_WORDS, State, Variant};

#[cfg(target_arch = "x86")]
use core::arch::x86::*;
#[cfg(target_arch = "x86_64")]
use core::arch::x86_64::*;

const PAR_BLOCKS: usize = 4;

#[derive(Debug)]
pub(crate) struct Sse2(());

static SSE2: Sse2 = Sse2(());

/// Hand out the SSE2 backend if the CPU supports it.
pub(crate) fn detect() -> Option<&'static dyn Backend> {
    if crate::sse2_cpuid::get() {
        Some(&SSE2)
    } else {
        None
    }
}

impl Backend for Sse2 {
    fn name(&self) -> &'static str {
        "sse2"
    }

    fn capability(&self) -> Capability {
        Capability::Vectorized { lanes: PAR_BLOCKS }
    }

    fn gen_ks_blocks(&self, state: &State, out: &mut [u8]) {
        let wide = state.variant() == Variant::Legacy;
        // SAFETY: `Sse2` is only reachable through `detect`, which checked
        // that the CPU supports SSE2.
        unsafe { inner(state.words(), wide, out) }
    }
}

#[inline]
#[target_feature(enable = "sse2")]
unsafe fn inner(state: &[u32; STATE_WORDS], wide: bool, out: &mut [u8]) {
    let state_ptr = state.as_ptr().cast::<__m128i>();
    let mut v = [
        _mm_loadu_si128(state_ptr.add(0)),
        _mm_loadu_si128(state_ptr.add(1)),
        _mm_loadu_si128(state_ptr.add(2)),
        _mm_loadu_si128(state_ptr.add(3)),
    ];

    let mut chunks = out.chunks_exact_mut(PAR_BLOCKS * BLOCK_SIZE);
    for chunk in &mut chunks {
        let res = rounds(&v, wide);
        v[3] = add_ctr(v[3], PAR_BLOCKS, wide);
        store(&res, chunk, PAR_BLOCKS);
    }

    let tail = chunks.into_remainder();
    let tail_blocks = tail.len() / BLOCK_SIZE;
    if tail_blocks != 0 {
        let res = rounds(&v, wide);
        store(&res, tail, tail_blocks);
    }
}

#[inline]
#[target_feature(enable = "sse2")]
unsafe fn add_ctr(v: __m128i, amount: usize, wide: bool) -> __m128i {
    if wide {
        _mm_add_epi64(v, _mm_set_epi64x(0, amount as i64))
    } else {
        _mm_add_epi32(v, _mm_set_epi32(0, 0, 0, amount as i32))
    }
}

#[inline]
#[target_feature(enable = "sse2")]
unsafe fn store(res: &[[__m128i; 4]; PAR_BLOCKS], out: &mut [u8], blocks: usize) {
    debug_assert!(out.len() >= blocks * BLOCK_SIZE);
    let out_ptr = out.as_mut_ptr().cast::<__m128i>();
    for block in 0..blocks {
        for i in 0..4 {
            _mm_storeu_si128(out_ptr.add(block * 4 + i), res[block][i]);
        }
    }
}

#[inline]
#[target_feature(enable = "sse2")]
unsafe fn rounds(v: &[__m128i; 4], wide: bool) -> [[__m128i; 4]; PAR_BLOCKS] {
    let mut res = [*v; PAR_BLOCKS];
    for block in 1..PAR_BLOCKS {
        res[block][3] = add_ctr(v[3], block, wide);
    }

    for _ in 0..DOUBLE_ROUNDS {
        double_quarter_round(&mut res);
    }

    for block in 0..PAR_BLOCKS {
        for i in 0..3 {
            res[block][i] = _mm_add_epi32(res[block][i], v[i]);
        }
        let ctr = add_ctr(v[3], block, wide);
        res[block][3] = _mm_add_epi32(res[block][3], ctr);
    }

    res
}

#[inline]
#[target_feature(enable = "sse2")]
unsafe fn double_quarter_round(v: &mut [[__m128i; 4]; PAR_BLOCKS]) {
    add_xor_rot(v);
    rows_to_cols(v);
    add_xor_rot(v);
    cols_to_rows(v);
}

/// Rotate rows `a`, `c`, and `d` so that the columns of the state hold its
/// diagonals:
/// ```text
/// [a0, a1, a2, a3]        [a3, a0, a1, a2]
/// [b0, b1, b2, b3]   =>   [b0, b1, b2, b3]
/// [c0, c1, c2, c3]        [c1, c2, c3, c0]
/// [d0, d1, d2, d3]        [d2, d3, d0, d1]
/// ```
///
/// Row `b` is left in place because it is the last word written by
/// [`add_xor_rot`], so the shuffles do not wait on it.
#[inline]
#[target_feature(enable = "sse2")]
unsafe fn rows_to_cols(blocks: &mut [[__m128i; 4]; PAR_BLOCKS]) {
    for [a, _, c, d] in blocks.iter_mut() {
        // c >>>= 32; d >>>= 64; a >>>= 96;
        *c = _mm_shuffle_epi32(*c, 0b_00_11_10_01); // _MM_SHUFFLE(0, 3, 2, 1)
        *d = _mm_shuffle_epi32(*d, 0b_01_00_11_10); // _MM_SHUFFLE(1, 0, 3, 2)
        *a = _mm_shuffle_epi32(*a, 0b_10_01_00_11); // _MM_SHUFFLE(2, 1, 0, 3)
    }
}

/// Inverse of [`rows_to_cols`].
#[inline]
#[target_feature(enable = "sse2")]
unsafe fn cols_to_rows(blocks: &mut [[__m128i; 4]; PAR_BLOCKS]) {
    for [a, _, c, d] in blocks.iter_mut() {
        // c <<<= 32; d <<<= 64; a <<<= 96;
        *c = _mm_shuffle_epi32(*c, 0b_10_01_00_11); // _MM_SHUFFLE(2, 1, 0, 3)
        *d = _mm_shuffle_epi32(*d, 0b_01_00_11_10); // _MM_SHUFFLE(1, 0, 3, 2)
        *a = _mm_shuffle_epi32(*a, 0b_00_11_10_01); // _MM_SHUFFLE(0, 3, 2, 1)
    }
}

#[inline]
#[target_feature(enable = "sse2")]
unsafe fn add_xor_rot(blocks: &mut [[__m128i; 4]; PAR_BLOCKS]) {
    for [a, b, c, d] in blocks.iter_mut() {
        // a += b; d ^= a; d <<<= (16, 16, 16, 16);
        *a = _mm_add_epi32(*a, *b);
        *d = _mm_xor_si128(*d, *a);
        *d = _mm_xor_si128(_mm_slli_epi32(*d, 16), _mm_srli_epi32(*d, 16));

        // c += d; b ^= c; b <<<= (12, 12, 12, 12);
        *c = _mm_add_epi32(*c, *d);
        *b = _mm_xor_si128(*b, *c);
        *b = _mm_xor_si128(_mm_slli_epi32(*b, 12), _mm_srli_epi32(*b, 20));

        // a += b; d ^= a; d <<<= (8, 8, 8, 8);
        *a = _mm_add_epi32(*a, *b);
        *d = _mm_xor_si128(*d, *a);
        *d = _mm_xor_si128(_mm_slli_epi32(*d, 8), _mm_srli_epi32(*d, 24));

        // c += d; b ^= c; b <<<= (7, 7, 7, 7);
        *c = _mm_add_epi32(*c, *d);
        *b = _mm_xor_si128(*b, *c);
        *b = _mm_xor_si128(_mm_slli_epi32(*b, 7), _mm_srli_epi32(*b, 25));
    }
}
