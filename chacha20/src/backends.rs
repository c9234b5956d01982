//! Backends providing the ChaCha20 block function, and the dispatcher that
//! picks one of them.
//!
//! A backend only has to turn a [`State`] into consecutive keystream blocks
//! ([`Backend::gen_ks_blocks`]). Buffer validation, the exhaustion check and
//! counter advancement live in
//! [`apply_blocks`](trait.Backend.html#method.apply_blocks), shared by all of
//! them.

use crate::{BLOCK_SIZE, Error, State};
use cfg_if::cfg_if;
use core::fmt::Debug;

pub(crate) mod soft;

cfg_if! {
    if #[cfg(any(target_arch = "x86", target_arch = "x86_64"))] {
        pub(crate) mod avx2;
        pub(crate) mod sse2;
    }
}

/// Capability tag of a backend.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Scalar code that runs on every target.
    Portable,
    /// Wide-register code computing `lanes` blocks per internal step.
    Vectorized {
        /// Blocks computed per step.
        lanes: usize,
    },
}

impl Capability {
    /// Number of blocks computed per internal step.
    #[must_use]
    pub const fn par_blocks(self) -> usize {
        match self {
            Capability::Portable => 1,
            Capability::Vectorized { lanes } => lanes,
        }
    }
}

/// A keystream block generator.
///
/// Implementations must produce output byte-identical to repeated application
/// of the portable [`block`](crate::block::block) function, however many
/// blocks they compute per step.
pub trait Backend: Debug + Send + Sync {
    /// Short identifier, e.g. `"soft"` or `"avx2"`.
    fn name(&self) -> &'static str;

    /// What kind of block generator this is.
    fn capability(&self) -> Capability;

    /// Write `out.len() / BLOCK_SIZE` consecutive keystream blocks into `out`,
    /// the first one for the counter currently held by `state`.
    ///
    /// Counter lanes are incremented at the width of `state.variant()`. Bytes
    /// past the last whole block are left untouched and the counter in `state`
    /// is not moved. Callers go through
    /// [`apply_blocks`](trait.Backend.html#method.apply_blocks), which has
    /// already rejected requests that would run past the counter range.
    fn gen_ks_blocks(&self, state: &State, out: &mut [u8]);
}

impl<'a> dyn Backend + 'a {
    /// Generate `blocks` keystream blocks from `state` into `dst`, XORed with
    /// `src` when it is present, and advance the counter by exactly `blocks`.
    ///
    /// Only `dst[..blocks * BLOCK_SIZE]` is written.
    ///
    /// # Errors
    /// - [`Error::BufferTooShort`] if `dst` or `src` holds fewer than
    ///   `blocks * BLOCK_SIZE` bytes.
    /// - [`Error::CounterOverflow`] if the counter would pass the maximum of
    ///   the state's variant.
    ///
    /// Both are detected before anything is written; on error neither `dst`
    /// nor the counter changes.
    pub fn apply_blocks(
        &self,
        state: &mut State,
        src: Option<&[u8]>,
        dst: &mut [u8],
        blocks: usize,
    ) -> Result<(), Error> {
        let len = blocks
            .checked_mul(BLOCK_SIZE)
            .ok_or(Error::BufferTooShort)?;
        if dst.len() < len || src.is_some_and(|src| src.len() < len) {
            return Err(Error::BufferTooShort);
        }
        state.check_remaining(blocks)?;

        let out = &mut dst[..len];
        self.gen_ks_blocks(state, out);
        if let Some(src) = src {
            xor(out, &src[..len]);
        }
        state.advance(blocks);
        Ok(())
    }
}

#[inline(always)]
pub(crate) fn xor(buf: &mut [u8], key: &[u8]) {
    debug_assert_eq!(buf.len(), key.len());
    for (a, b) in buf.iter_mut().zip(key) {
        *a ^= *b;
    }
}

/// The portable backend.
#[must_use]
pub fn soft() -> &'static dyn Backend {
    &soft::SOFT
}

/// The SSE2 backend (4 blocks per step), if this CPU supports it.
#[must_use]
pub fn sse2() -> Option<&'static dyn Backend> {
    cfg_if! {
        if #[cfg(any(target_arch = "x86", target_arch = "x86_64"))] {
            sse2::detect()
        } else {
            None
        }
    }
}

/// The AVX2 backend (8 blocks per step), if this CPU supports it.
#[must_use]
pub fn avx2() -> Option<&'static dyn Backend> {
    cfg_if! {
        if #[cfg(any(target_arch = "x86", target_arch = "x86_64"))] {
            avx2::detect()
        } else {
            None
        }
    }
}

cfg_if! {
    if #[cfg(any(
        chacha20_backend = "soft",
        not(any(target_arch = "x86", target_arch = "x86_64"))
    ))] {
        /// Probe for the best backend this process can use.
        ///
        /// Always the portable backend in this build.
        #[must_use]
        pub fn detect() -> &'static dyn Backend {
            soft()
        }
    } else if #[cfg(chacha20_backend = "sse2")] {
        /// Probe for the best backend this process can use.
        ///
        /// AVX2 is disabled in this build: SSE2 if available, else portable.
        #[must_use]
        pub fn detect() -> &'static dyn Backend {
            sse2().unwrap_or_else(soft)
        }
    } else if #[cfg(chacha20_backend = "avx2")] {
        /// Probe for the best backend this process can use.
        ///
        /// SSE2 is disabled in this build: AVX2 if available, else portable.
        #[must_use]
        pub fn detect() -> &'static dyn Backend {
            avx2().unwrap_or_else(soft)
        }
    } else {
        /// Probe for the best backend this process can use: AVX2, then SSE2,
        /// then portable.
        #[must_use]
        pub fn detect() -> &'static dyn Backend {
            avx2().or_else(sse2).unwrap_or_else(soft)
        }
    }
}

cfg_if! {
    if #[cfg(feature = "std")] {
        use std::sync::OnceLock;

        static DEFAULT: OnceLock<&'static dyn Backend> = OnceLock::new();

        /// Backend used by [`ChaCha20::new`](crate::ChaCha20::new).
        ///
        /// Bound on first use to either the backend passed to
        /// [`register_default`] or the result of [`detect`], and never
        /// changes afterwards.
        #[must_use]
        pub fn default_backend() -> &'static dyn Backend {
            *DEFAULT.get_or_init(detect)
        }

        /// Bind `backend` as the process-wide default.
        ///
        /// Must happen before the first cipher is built with
        /// [`ChaCha20::new`](crate::ChaCha20::new) (or any other call to
        /// [`default_backend`]).
        ///
        /// # Errors
        /// [`Error::BackendAlreadySelected`] if a default is already bound.
        pub fn register_default(backend: &'static dyn Backend) -> Result<(), Error> {
            DEFAULT
                .set(backend)
                .map_err(|_| Error::BackendAlreadySelected)
        }
    } else {
        /// Backend used by [`ChaCha20::new`](crate::ChaCha20::new).
        ///
        /// Without `std` this is [`detect`]; the CPU feature probe behind it
        /// runs once and is cached.
        #[must_use]
        pub fn default_backend() -> &'static dyn Backend {
            detect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::block;

    fn state(nonce_len: usize, counter: u64) -> State {
        let key: [u8; 32] = core::array::from_fn(|i| i as u8);
        let nonce: [u8; 12] = core::array::from_fn(|i| 0xa0 + i as u8);
        State::new(&key, &nonce[..nonce_len], counter).unwrap()
    }

    fn reference(state: &State, blocks: usize) -> std::vec::Vec<u8> {
        let mut words = *state.words();
        let mut out = std::vec::Vec::new();
        for _ in 0..blocks {
            out.extend_from_slice(&block(&words));
            let ctr = ((u64::from(words[13]) << 32) | u64::from(words[12])).wrapping_add(1);
            words[12] = ctr as u32;
            if state.variant() == crate::Variant::Legacy {
                words[13] = (ctr >> 32) as u32;
            }
        }
        out
    }

    fn available() -> std::vec::Vec<&'static dyn Backend> {
        let mut backends = std::vec![soft()];
        backends.extend(sse2());
        backends.extend(avx2());
        backends
    }

    #[test]
    fn backends_match_reference() {
        for backend in available() {
            for nonce_len in [8, 12] {
                for counter in [0, 1, 7, 0xffff_ffe0] {
                    for blocks in [0, 1, 3, 4, 5, 8, 9, 17] {
                        let mut st = state(nonce_len, counter);
                        let expected = reference(&st, blocks);
                        let mut out = std::vec![0u8; blocks * BLOCK_SIZE];
                        let backend: &dyn Backend = backend;
                        backend.apply_blocks(&mut st, None, &mut out, blocks).unwrap();
                        assert_eq!(out, expected, "{} nonce={nonce_len} ctr={counter}", backend.name());
                        assert_eq!(st.block_pos(), counter + blocks as u64);
                    }
                }
            }
        }
    }

    #[test]
    fn legacy_counter_carries_across_words() {
        for backend in available() {
            let mut st = state(8, u64::from(u32::MAX) - 2);
            let expected = reference(&st, 9);
            let mut out = [0u8; 9 * BLOCK_SIZE];
            backend.apply_blocks(&mut st, None, &mut out, 9).unwrap();
            assert_eq!(&out[..], &expected[..], "{}", backend.name());
            assert_eq!(st.block_pos(), u64::from(u32::MAX) + 7);
        }
    }

    #[test]
    fn xor_with_source() {
        let src: [u8; 2 * BLOCK_SIZE] = core::array::from_fn(|i| i as u8);
        let mut st = state(12, 3);
        let ks = reference(&st, 2);
        let mut dst = [0u8; 2 * BLOCK_SIZE + 5];
        soft().apply_blocks(&mut st, Some(&src[..]), &mut dst, 2).unwrap();
        for i in 0..src.len() {
            assert_eq!(dst[i], src[i] ^ ks[i]);
        }
        assert_eq!(&dst[2 * BLOCK_SIZE..], &[0u8; 5]);
    }

    #[test]
    fn short_buffers_are_rejected_untouched() {
        let mut st = state(12, 0);
        let mut dst = [0x55u8; BLOCK_SIZE];
        assert_eq!(
            soft().apply_blocks(&mut st, None, &mut dst, 2),
            Err(Error::BufferTooShort)
        );
        let mut dst = [0x55u8; 2 * BLOCK_SIZE];
        assert_eq!(
            soft().apply_blocks(&mut st, Some(&[0u8; BLOCK_SIZE][..]), &mut dst, 2),
            Err(Error::BufferTooShort)
        );
        assert_eq!(dst, [0x55u8; 2 * BLOCK_SIZE]);
        assert_eq!(st.block_pos(), 0);
    }

    #[test]
    fn overflow_is_rejected_untouched() {
        for backend in available() {
            let mut st = state(12, u64::from(u32::MAX) - 1);
            let mut dst = [0x55u8; 2 * BLOCK_SIZE];
            assert_eq!(
                backend.apply_blocks(&mut st, None, &mut dst, 2),
                Err(Error::CounterOverflow)
            );
            assert_eq!(dst, [0x55u8; 2 * BLOCK_SIZE]);
            assert_eq!(st.block_pos(), u64::from(u32::MAX) - 1);

            backend.apply_blocks(&mut st, None, &mut dst, 1).unwrap();
            assert_eq!(st.block_pos(), u64::from(u32::MAX));
            assert_eq!(
                backend.apply_blocks(&mut st, None, &mut dst, 1),
                Err(Error::CounterOverflow)
            );
        }
    }

    #[test]
    fn legacy_overflow_is_checked() {
        let mut st = state(8, u64::MAX - 1);
        let mut dst = [0u8; 2 * BLOCK_SIZE];
        assert_eq!(
            soft().apply_blocks(&mut st, None, &mut dst, 2),
            Err(Error::CounterOverflow)
        );
        soft().apply_blocks(&mut st, None, &mut dst, 1).unwrap();
        assert_eq!(st.block_pos(), u64::MAX);
    }

    #[test]
    fn detect_is_stable() {
        let first = detect();
        assert_eq!(first.name(), detect().name());
        assert_eq!(default_backend().name(), default_backend().name());
    }

    #[test]
    fn detect_honours_pinned_backend() {
        let name = detect().name();
        if cfg!(chacha20_backend = "soft") {
            assert_eq!(name, "soft");
        } else if cfg!(chacha20_backend = "sse2") {
            assert!(name == "sse2" || name == "soft", "{name}");
        } else if cfg!(chacha20_backend = "avx2") {
            assert!(name == "avx2" || name == "soft", "{name}");
            assert_eq!(avx2().is_some(), name == "avx2");
        } else if avx2().is_some() {
            assert_eq!(name, "avx2");
        }
    }

    #[test]
    fn capabilities() {
        assert_eq!(soft().capability(), Capability::Portable);
        assert_eq!(soft().capability().par_blocks(), 1);
        if let Some(backend) = sse2() {
            assert_eq!(backend.capability(), Capability::Vectorized { lanes: 4 });
        }
        if let Some(backend) = avx2() {
            assert_eq!(backend.capability(), Capability::Vectorized { lanes: 8 });
        }
    }
}
