//! ChaCha20 stream cipher: a [`State`] driven by a [`Backend`].

use crate::{
    BLOCK_SIZE, Error, IETF_NONCE_SIZE, KEY_SIZE, LEGACY_NONCE_SIZE, State, Variant,
    backends::{self, Backend},
};
use core::fmt;

/// The ChaCha20 stream cipher.
///
/// Encryption and decryption are the same operation, [`xor_key_stream`].
/// Every call starts on a block boundary: when a request ends part-way
/// through a block, the unused tail of that block is discarded and the next
/// call begins with the following block.
///
/// All stateful calls take `&mut self`, so concurrent use of one instance
/// needs external synchronisation; distinct instances are independent.
///
/// [`xor_key_stream`]: ChaCha20::xor_key_stream
pub struct ChaCha20 {
    state: State,
    backend: &'static dyn Backend,
}

impl ChaCha20 {
    /// Create a cipher using the process-wide default backend.
    ///
    /// The nonce length selects the variant: 12 bytes for IETF (32-bit
    /// counter), 8 bytes for legacy (64-bit counter).
    ///
    /// # Errors
    /// - [`Error::InvalidKeySize`] if `key` is not 32 bytes.
    /// - [`Error::InvalidNonceSize`] if `nonce` is not 8 or 12 bytes.
    /// - [`Error::CounterOverflow`] if `counter` does not fit the variant.
    pub fn new(key: &[u8], nonce: &[u8], counter: u64) -> Result<Self, Error> {
        Self::with_backend(key, nonce, counter, backends::default_backend())
    }

    /// Create a cipher driven by an explicitly chosen backend.
    ///
    /// # Errors
    /// Same as [`ChaCha20::new`].
    pub fn with_backend(
        key: &[u8],
        nonce: &[u8],
        counter: u64,
        backend: &'static dyn Backend,
    ) -> Result<Self, Error> {
        Ok(Self {
            state: State::new(key, nonce, counter)?,
            backend,
        })
    }

    /// Create an IETF (RFC 8439) cipher using the default backend.
    #[must_use]
    pub fn new_ietf(key: &[u8; KEY_SIZE], nonce: &[u8; IETF_NONCE_SIZE], counter: u32) -> Self {
        Self {
            state: State::ietf(key, nonce, counter),
            backend: backends::default_backend(),
        }
    }

    /// Create a legacy (64-bit nonce, 64-bit counter) cipher using the
    /// default backend.
    #[must_use]
    pub fn new_legacy(
        key: &[u8; KEY_SIZE],
        nonce: &[u8; LEGACY_NONCE_SIZE],
        counter: u64,
    ) -> Self {
        Self {
            state: State::legacy(key, nonce, counter),
            backend: backends::default_backend(),
        }
    }

    /// XOR `src` with the keystream into `dst`, or, when `src` is `None`,
    /// write raw keystream into the whole of `dst`.
    ///
    /// With a source, exactly `src.len()` bytes of `dst` are written and the
    /// rest is left alone. The counter advances by the number of blocks
    /// touched, rounding up.
    ///
    /// # Errors
    /// - [`Error::BufferTooShort`] if `dst` is shorter than `src`.
    /// - [`Error::CounterOverflow`] if the request would run the counter past
    ///   the variant's maximum.
    ///
    /// Both are checked before anything is written.
    pub fn xor_key_stream(&mut self, dst: &mut [u8], src: Option<&[u8]>) -> Result<(), Error> {
        let len = match src {
            Some(src) if dst.len() < src.len() => return Err(Error::BufferTooShort),
            Some(src) => src.len(),
            None => dst.len(),
        };
        self.state.check_remaining(blocks_for(len))?;

        let full_len = len - len % BLOCK_SIZE;
        let full_blocks = full_len / BLOCK_SIZE;
        let (dst_full, dst_tail) = dst[..len].split_at_mut(full_len);
        match src {
            Some(src) => {
                let (src_full, src_tail) = src.split_at(full_len);
                self.backend
                    .apply_blocks(&mut self.state, Some(src_full), dst_full, full_blocks)?;
                self.tail_block(Some(src_tail), dst_tail)
            }
            None => {
                self.backend
                    .apply_blocks(&mut self.state, None, dst_full, full_blocks)?;
                self.tail_block(None, dst_tail)
            }
        }
    }

    /// Produce one block through a stack buffer and write its first
    /// `dst.len()` bytes (XORed with `src` if present). The rest of the block
    /// is discarded.
    fn tail_block(&mut self, src: Option<&[u8]>, dst: &mut [u8]) -> Result<(), Error> {
        if dst.is_empty() {
            return Ok(());
        }
        let mut buf = [0u8; BLOCK_SIZE];
        let result = self
            .backend
            .apply_blocks(&mut self.state, None, &mut buf, 1);
        if result.is_ok() {
            dst.copy_from_slice(&buf[..dst.len()]);
            if let Some(src) = src {
                backends::xor(dst, src);
            }
        }
        wipe(&mut buf);
        result
    }

    /// Encrypt or decrypt `buf` in place.
    ///
    /// # Errors
    /// [`Error::CounterOverflow`] if the request would run the counter past
    /// the variant's maximum; `buf` is left unchanged.
    pub fn apply_keystream(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        self.state.check_remaining(blocks_for(buf.len()))?;

        let mut ks = [0u8; CHUNK_SIZE];
        let mut result = Ok(());
        for chunk in buf.chunks_mut(CHUNK_SIZE) {
            result = self
                .backend
                .apply_blocks(&mut self.state, None, &mut ks, blocks_for(chunk.len()));
            if result.is_err() {
                break;
            }
            backends::xor(chunk, &ks[..chunk.len()]);
        }
        wipe(&mut ks);
        result
    }

    /// Fill `dst` with raw keystream.
    ///
    /// # Errors
    /// [`Error::CounterOverflow`] if the keystream for this nonce is exhausted.
    pub fn write_keystream(&mut self, dst: &mut [u8]) -> Result<(), Error> {
        self.xor_key_stream(dst, None)
    }

    /// Reposition the block counter without changing key or nonce.
    ///
    /// Seeking back to blocks already used with this key and nonce reuses
    /// keystream and is only safe for re-decrypting the same data.
    ///
    /// # Errors
    /// [`Error::CounterOverflow`] if `block` does not fit the variant's counter.
    pub fn seek(&mut self, block: u64) -> Result<(), Error> {
        self.state.set_block_pos(block)
    }

    /// Current block counter: the block the next call starts with.
    #[must_use]
    pub fn block_pos(&self) -> u64 {
        self.state.block_pos()
    }

    /// Blocks that can still be produced under the current nonce.
    #[must_use]
    pub fn remaining_blocks(&self) -> u64 {
        self.state.remaining_blocks()
    }

    /// Counter/nonce layout in use.
    #[must_use]
    pub fn variant(&self) -> Variant {
        self.state.variant()
    }

    /// Backend generating the keystream for this cipher.
    #[must_use]
    pub fn backend(&self) -> &'static dyn Backend {
        self.backend
    }

    /// Replace key, nonce, and counter in place, keeping the backend.
    ///
    /// # Errors
    /// Same as [`ChaCha20::new`]; on error the cipher is unchanged.
    pub fn rekey(&mut self, key: &[u8], nonce: &[u8], counter: u64) -> Result<(), Error> {
        self.state.rekey(key, nonce, counter)
    }

    /// State and backend, for drivers that generate blocks on their own.
    #[cfg(feature = "cipher")]
    pub(crate) fn parts_mut(&mut self) -> (&mut State, &'static dyn Backend) {
        (&mut self.state, self.backend)
    }

    /// Wipe key and nonce.
    ///
    /// The counter is left exhausted, so every keystream request fails with
    /// [`Error::CounterOverflow`] until the cipher is rekeyed.
    pub fn reset(&mut self) {
        self.state.wipe();
    }
}

/// Keystream generated per step of [`ChaCha20::apply_keystream`].
const CHUNK_SIZE: usize = 8 * BLOCK_SIZE;

/// Number of blocks needed to cover `len` bytes.
#[inline]
fn blocks_for(len: usize) -> usize {
    len.div_ceil(BLOCK_SIZE)
}

pub(crate) fn wipe(buf: &mut [u8]) {
    #[cfg(feature = "zeroize")]
    zeroize::Zeroize::zeroize(buf);
    #[cfg(not(feature = "zeroize"))]
    buf.fill(0);
}

impl fmt::Debug for ChaCha20 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChaCha20")
            .field("state", &self.state)
            .field("backend", &self.backend.name())
            .finish()
    }
}
