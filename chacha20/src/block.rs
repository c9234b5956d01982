//! The ChaCha20 block function. Defined in RFC 8439 Section 2.3.
//!
//! <https://tools.ietf.org/html/rfc8439#section-2.3>
//!
//! Portable implementation which does not rely on architecture-specific
//! intrinsics. It is the reference every other backend is checked against.

use crate::{BLOCK_SIZE, DOUBLE_ROUNDS, STATE_WORDS, quarter_round};

/// Compute one 64-byte keystream block from a 16-word state.
///
/// Pure: the counter in `state` is not advanced.
#[inline]
#[must_use]
pub fn block(state: &[u32; STATE_WORDS]) -> [u8; BLOCK_SIZE] {
    let res = run_rounds(state);
    let mut out = [0u8; BLOCK_SIZE];
    for (chunk, val) in out.chunks_exact_mut(4).zip(res.iter()) {
        chunk.copy_from_slice(&val.to_le_bytes());
    }
    out
}

/// Run the 20 rounds (i.e. 10 double rounds) of ChaCha20 and add the
/// input state back in.
#[inline(always)]
pub(crate) fn run_rounds(state: &[u32; STATE_WORDS]) -> [u32; STATE_WORDS] {
    let mut res = *state;

    for _ in 0..DOUBLE_ROUNDS {
        // column rounds
        quarter_round(0, 4, 8, 12, &mut res);
        quarter_round(1, 5, 9, 13, &mut res);
        quarter_round(2, 6, 10, 14, &mut res);
        quarter_round(3, 7, 11, 15, &mut res);

        // diagonal rounds
        quarter_round(0, 5, 10, 15, &mut res);
        quarter_round(1, 6, 11, 12, &mut res);
        quarter_round(2, 7, 8, 13, &mut res);
        quarter_round(3, 4, 9, 14, &mut res);
    }

    for (s1, s0) in res.iter_mut().zip(state.iter()) {
        *s1 = s1.wrapping_add(*s0);
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    // RFC 8439 section 2.3.2
    const INPUT: [u32; STATE_WORDS] = [
        0x6170_7865, 0x3320_646e, 0x7962_2d32, 0x6b20_6574, 0x0302_0100, 0x0706_0504, 0x0b0a_0908,
        0x0f0e_0d0c, 0x1312_1110, 0x1716_1514, 0x1b1a_1918, 0x1f1e_1d1c, 0x0000_0001, 0x0900_0000,
        0x4a00_0000, 0x0000_0000,
    ];

    #[test]
    fn rfc8439_block_words() {
        let expected = [
            0xe4e7_f110, 0x1559_3bd1, 0x1fdd_0f50, 0xc471_20a3, 0xc7f4_d1c7, 0x0368_c033,
            0x9aaa_2204, 0x4e6c_d4c3, 0x4664_82d2, 0x09aa_9f07, 0x05d7_c214, 0xa202_8bd9,
            0xd19c_12b5, 0xb94e_16de, 0xe883_d0cb, 0x4e3c_50a2,
        ];
        assert_eq!(run_rounds(&INPUT), expected);
    }

    #[test]
    fn rfc8439_block_bytes() {
        let expected = hex!(
            "
            10f1e7e4d13b5915500fdd1fa32071c4
            c7d1f4c733c068030422aa9ac3d46c4e
            d2826446079faa0914c2d705d98b02a2
            b5129cd1de164eb9cbd083e8a2503c4e
            "
        );
        assert_eq!(block(&INPUT), expected);
    }

    #[test]
    fn block_is_pure() {
        let state = INPUT;
        assert_eq!(block(&state), block(&state));
        assert_eq!(state, INPUT);
    }
}
