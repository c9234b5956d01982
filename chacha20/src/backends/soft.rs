//! Portable implementation which does not rely on architecture-specific
//! intrinsics.

use super::{Backend, Capability};
use crate::{BLOCK_SIZE, State, Variant, block::run_rounds};

#[cfg(feature = "zeroize")]
use zeroize::Zeroize;

#[derive(Debug)]
pub(crate) struct Soft;

pub(crate) static SOFT: Soft = Soft;

impl Backend for Soft {
    fn name(&self) -> &'static str {
        "soft"
    }

    fn capability(&self) -> Capability {
        Capability::Portable
    }

    #[allow(clippy::cast_possible_truncation)]
    fn gen_ks_blocks(&self, state: &State, out: &mut [u8]) {
        let wide = state.variant() == Variant::Legacy;
        let mut words = *state.words();

        for block in out.chunks_exact_mut(BLOCK_SIZE) {
            let res = run_rounds(&words);
            let mut ctr = (u64::from(words[13]) << 32) | u64::from(words[12]);
            ctr = ctr.wrapping_add(1);
            words[12] = ctr as u32;
            if wide {
                words[13] = (ctr >> 32) as u32;
            }

            for (chunk, val) in block.chunks_exact_mut(4).zip(res.iter()) {
                chunk.copy_from_slice(&val.to_le_bytes());
            }
        }

        #[cfg(feature = "zeroize")]
        words.zeroize();
    }
}
