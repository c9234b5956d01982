//! Cipher state: constants, key, block counter, and nonce.

use crate::{
    CONSTANTS, Error, IETF_NONCE_SIZE, KEY_SIZE, LEGACY_NONCE_SIZE, STATE_WORDS, Variant,
};
use core::fmt;

#[cfg(feature = "zeroize")]
use zeroize::{Zeroize, ZeroizeOnDrop};

/// The 16-word ChaCha20 state.
///
/// ```text
/// [ c0, c1, c2, c3 ]   constants "expand 32-byte k"
/// [ k0, k1, k2, k3 ]   key (little-endian words)
/// [ k4, k5, k6, k7 ]
/// [ b0, n0, n1, n2 ]   IETF:   32-bit counter, 96-bit nonce
/// [ b0, b1, n0, n1 ]   legacy: 64-bit counter, 64-bit nonce
/// ```
///
/// The counter is only ever moved forward by backend invocations (exactly one
/// step per block produced) or explicitly repositioned by the owner.
///
/// Repositioning the counter so that blocks already produced under the same
/// key and nonce are produced again reuses keystream. That is a caller error
/// this type cannot detect.
#[derive(Clone)]
pub struct State {
    words: [u32; STATE_WORDS],
    variant: Variant,
}

impl State {
    /// Build the initial state from a 32-byte key, an 8- or 12-byte nonce, and
    /// a starting block counter. No keystream is generated.
    ///
    /// # Errors
    /// - [`Error::InvalidKeySize`] if `key` is not 32 bytes.
    /// - [`Error::InvalidNonceSize`] if `nonce` is not 8 or 12 bytes.
    /// - [`Error::CounterOverflow`] if `counter` does not fit the counter of
    ///   the variant selected by the nonce length.
    pub fn new(key: &[u8], nonce: &[u8], counter: u64) -> Result<Self, Error> {
        let mut state = Self {
            words: [0u32; STATE_WORDS],
            variant: Variant::Ietf,
        };
        state.rekey(key, nonce, counter)?;
        Ok(state)
    }

    /// Build an IETF state from fixed-size inputs.
    #[must_use]
    pub fn ietf(key: &[u8; KEY_SIZE], nonce: &[u8; IETF_NONCE_SIZE], counter: u32) -> Self {
        let mut state = Self {
            words: [0u32; STATE_WORDS],
            variant: Variant::Ietf,
        };
        state.load(key, nonce, Variant::Ietf, u64::from(counter));
        state
    }

    /// Build a legacy state from fixed-size inputs.
    #[must_use]
    pub fn legacy(key: &[u8; KEY_SIZE], nonce: &[u8; LEGACY_NONCE_SIZE], counter: u64) -> Self {
        let mut state = Self {
            words: [0u32; STATE_WORDS],
            variant: Variant::Legacy,
        };
        state.load(key, nonce, Variant::Legacy, counter);
        state
    }

    /// Reinitialise key, nonce, and counter in place.
    ///
    /// All inputs are validated first; on error the state is left unchanged.
    ///
    /// # Errors
    /// Same as [`State::new`].
    pub fn rekey(&mut self, key: &[u8], nonce: &[u8], counter: u64) -> Result<(), Error> {
        let key: &[u8; KEY_SIZE] = key.try_into().map_err(|_| Error::InvalidKeySize)?;
        let variant = Variant::from_nonce_len(nonce.len())?;
        if counter > variant.max_block_pos() {
            return Err(Error::CounterOverflow);
        }
        self.load(key, nonce, variant, counter);
        Ok(())
    }

    /// Fill every word of the state. `nonce` and `counter` must fit `variant`.
    fn load(&mut self, key: &[u8; KEY_SIZE], nonce: &[u8], variant: Variant, counter: u64) {
        debug_assert_eq!(nonce.len(), variant.nonce_size());
        self.words[0..4].copy_from_slice(&CONSTANTS);
        for (val, chunk) in self.words[4..12].iter_mut().zip(key.chunks_exact(4)) {
            *val = read_le(chunk);
        }
        for (val, chunk) in self.words[variant.nonce_index()..]
            .iter_mut()
            .zip(nonce.chunks_exact(4))
        {
            *val = read_le(chunk);
        }
        self.variant = variant;
        variant.set_block_pos(&mut self.words, counter);
    }

    /// Move the block counter to `pos` without touching key or nonce.
    ///
    /// # Errors
    /// [`Error::CounterOverflow`] if `pos` does not fit the variant's counter.
    pub fn set_block_pos(&mut self, pos: u64) -> Result<(), Error> {
        if pos > self.variant.max_block_pos() {
            return Err(Error::CounterOverflow);
        }
        self.variant.set_block_pos(&mut self.words, pos);
        Ok(())
    }

    /// Current block counter.
    #[must_use]
    pub fn block_pos(&self) -> u64 {
        self.variant.get_block_pos(&self.words)
    }

    /// Blocks that can still be produced before the counter is exhausted.
    #[must_use]
    pub fn remaining_blocks(&self) -> u64 {
        self.variant.remaining_blocks(self.block_pos())
    }

    /// Check that `blocks` more blocks can be produced under this nonce.
    ///
    /// # Errors
    /// [`Error::CounterOverflow`] if the counter would pass the variant's maximum.
    pub fn check_remaining(&self, blocks: usize) -> Result<(), Error> {
        match u64::try_from(blocks) {
            Ok(blocks) if blocks <= self.remaining_blocks() => Ok(()),
            _ => Err(Error::CounterOverflow),
        }
    }

    /// Counter/nonce layout in use.
    #[must_use]
    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// The raw state words, as fed to the block function.
    #[must_use]
    pub fn words(&self) -> &[u32; STATE_WORDS] {
        &self.words
    }

    /// Advance the counter by `blocks`. Callers must have passed
    /// [`State::check_remaining`] for the same amount.
    #[inline]
    pub(crate) fn advance(&mut self, blocks: usize) {
        let pos = self.block_pos() + blocks as u64;
        self.variant.set_block_pos(&mut self.words, pos);
    }

    /// Move the block counter to `pos`, or to the variant's maximum if `pos`
    /// does not fit, which leaves nothing more to generate.
    #[cfg(feature = "cipher")]
    pub(crate) fn set_block_pos_saturating(&mut self, pos: u64) {
        let pos = pos.min(self.variant.max_block_pos());
        self.variant.set_block_pos(&mut self.words, pos);
    }

    /// Overwrite key and nonce words with zeros and park the counter at its
    /// maximum, so nothing more can be generated until [`State::rekey`].
    pub(crate) fn wipe(&mut self) {
        #[cfg(feature = "zeroize")]
        self.words.zeroize();
        #[cfg(not(feature = "zeroize"))]
        {
            self.words = [0u32; STATE_WORDS];
        }
        self.variant
            .set_block_pos(&mut self.words, self.variant.max_block_pos());
    }
}

#[inline(always)]
fn read_le(chunk: &[u8]) -> u32 {
    u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("variant", &self.variant)
            .field("block_pos", &self.block_pos())
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "zeroize")]
impl Drop for State {
    fn drop(&mut self) {
        self.words.zeroize();
    }
}

#[cfg(feature = "zeroize")]
impl ZeroizeOnDrop for State {}
