//! Distinguishing features of ChaCha variants.
//!
//! Both variants share the constant and key rows; they differ in how the last
//! row of the state is split between the block counter and the nonce.

use crate::{Error, STATE_WORDS};

/// Nonce size of the IETF variant in bytes.
pub const IETF_NONCE_SIZE: usize = 12;

/// Nonce size of the legacy ("djb") variant in bytes.
pub const LEGACY_NONCE_SIZE: usize = 8;

/// Index of the (first) counter word in the state.
pub(crate) const COUNTER_INDEX: usize = 12;

/// Counter/nonce layout of the cipher state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Variant {
    /// RFC 8439: 96-bit nonce, 32-bit block counter in word 12.
    Ietf,
    /// Original construction: 64-bit nonce, 64-bit block counter in words 12 and 13.
    Legacy,
}

impl Variant {
    /// Select the variant implied by a nonce of `len` bytes.
    ///
    /// # Errors
    /// [`Error::InvalidNonceSize`] for any length other than 8 or 12.
    pub const fn from_nonce_len(len: usize) -> Result<Self, Error> {
        match len {
            IETF_NONCE_SIZE => Ok(Variant::Ietf),
            LEGACY_NONCE_SIZE => Ok(Variant::Legacy),
            _ => Err(Error::InvalidNonceSize),
        }
    }

    /// Nonce size in bytes.
    #[must_use]
    pub const fn nonce_size(self) -> usize {
        match self {
            Variant::Ietf => IETF_NONCE_SIZE,
            Variant::Legacy => LEGACY_NONCE_SIZE,
        }
    }

    /// Index of the first nonce word in the state.
    #[must_use]
    pub const fn nonce_index(self) -> usize {
        match self {
            Variant::Ietf => 13,
            Variant::Legacy => 14,
        }
    }

    /// Width of the block counter in bits.
    #[must_use]
    pub const fn counter_bits(self) -> u32 {
        match self {
            Variant::Ietf => 32,
            Variant::Legacy => 64,
        }
    }

    /// Largest value the block counter may hold.
    #[must_use]
    pub const fn max_block_pos(self) -> u64 {
        u64::MAX >> (u64::BITS - self.counter_bits())
    }

    /// Read the block counter out of a state.
    #[inline(always)]
    pub(crate) fn get_block_pos(self, state: &[u32; STATE_WORDS]) -> u64 {
        match self {
            Variant::Ietf => u64::from(state[COUNTER_INDEX]),
            Variant::Legacy => {
                u64::from(state[COUNTER_INDEX]) | (u64::from(state[COUNTER_INDEX + 1]) << 32)
            }
        }
    }

    /// Write the block counter into a state. `pos` must fit the variant.
    #[inline(always)]
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn set_block_pos(self, state: &mut [u32; STATE_WORDS], pos: u64) {
        debug_assert!(pos <= self.max_block_pos());
        state[COUNTER_INDEX] = pos as u32;
        if self == Variant::Legacy {
            state[COUNTER_INDEX + 1] = (pos >> 32) as u32;
        }
    }

    /// Number of blocks that can still be produced starting at `block_pos`.
    ///
    /// A request for `n` blocks is admissible iff `n <= remaining_blocks(pos)`,
    /// i.e. the counter after the request still fits the variant.
    #[inline(always)]
    #[must_use]
    pub const fn remaining_blocks(self, block_pos: u64) -> u64 {
        self.max_block_pos().saturating_sub(block_pos)
    }
}
