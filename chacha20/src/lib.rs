//! The ChaCha20 keystream engine ([RFC 8439])
//!
//! This crate generates the ChaCha20 keystream for a 256-bit key, a nonce,
//! and a starting block counter, and XORs it with caller data to encrypt or
//! decrypt. Two counter/nonce layouts are supported, selected by nonce length:
//!
//! - 12-byte nonce: the IETF variant ([RFC 8439]) with a 32-bit block counter,
//!   limiting one nonce to just under 2^32 blocks (~256 GiB) of keystream
//! - 8-byte nonce: the original "djb" variant with a 64-bit block counter
//!
//! Block generation is delegated to a [`Backend`]. A portable backend is always
//! available; on x86/x86_64 an SSE2 (4 blocks at a time) or AVX2 (8 blocks at a
//! time) backend is selected at runtime when the CPU supports it. Every backend
//! produces output byte-identical to the portable one.
//!
//! # ⚠️ Security Warning: Hazmat!
//!
//! This crate does not ensure ciphertexts are authentic, which can lead to
//! serious vulnerabilities if used incorrectly!
//!
//! Never use the same (key, nonce) pair over an overlapping range of block
//! counters. The counter is checked against its maximum before every call and
//! exhaustion is reported as [`Error::CounterOverflow`], but repositioning
//! with [`ChaCha20::seek`] to blocks already used cannot be detected.
//!
//! **USE AT YOUR OWN RISK!**
//!
//! # Usage
//!
//! ```
//! use chacha20_keystream::ChaCha20;
//! use hex_literal::hex;
//!
//! let key = [0x42; 32];
//! let nonce = [0x24; 12];
//! let plaintext = hex!("00010203 04050607 08090A0B 0C0D0E0F");
//! let ciphertext = hex!("e405626e 4f1236b3 670ee428 332ea20e");
//!
//! // encrypt
//! let mut cipher = ChaCha20::new(&key, &nonce, 0)?;
//! let mut buffer = [0u8; 16];
//! cipher.xor_key_stream(&mut buffer, Some(&plaintext[..]))?;
//! assert_eq!(buffer, ciphertext);
//!
//! // decrypt in place, starting over from block 0
//! cipher.seek(0)?;
//! cipher.apply_keystream(&mut buffer)?;
//! assert_eq!(buffer, plaintext);
//! # Ok::<(), chacha20_keystream::Error>(())
//! ```
//!
//! [RFC 8439]: https://tools.ietf.org/html/rfc8439

#![no_std]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc(
    html_logo_url = "https://raw.githubusercontent.com/RustCrypto/media/8f1a9894/logo.svg",
    html_favicon_url = "https://raw.githubusercontent.com/RustCrypto/media/8f1a9894/logo.svg"
)]
#![warn(missing_docs, rust_2018_idioms, trivial_casts, unused_qualifications)]

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod backends;
pub mod block;
mod chacha;
mod errors;
mod state;
#[cfg(feature = "cipher")]
mod stream_core;
mod variants;

pub use crate::{
    backends::{Backend, Capability},
    chacha::ChaCha20,
    errors::Error,
    state::State,
    variants::{IETF_NONCE_SIZE, LEGACY_NONCE_SIZE, Variant},
};

#[cfg(feature = "cipher")]
pub use crate::stream_core::{ChaCha20Core, ChaCha20Stream};
#[cfg(feature = "cipher")]
pub use cipher;
#[cfg(feature = "zeroize")]
pub use zeroize;

/// Size of a ChaCha20 key in bytes.
pub const KEY_SIZE: usize = 32;

/// Size of one keystream block in bytes.
pub const BLOCK_SIZE: usize = 64;

/// Number of 32-bit words in the ChaCha state.
pub const STATE_WORDS: usize = 16;

/// State initialization constant ("expand 32-byte k")
pub const CONSTANTS: [u32; 4] = [0x6170_7865, 0x3320_646e, 0x7962_2d32, 0x6b20_6574];

/// Number of double rounds in ChaCha20.
pub(crate) const DOUBLE_ROUNDS: usize = 10;

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
cpufeatures::new!(avx2_cpuid, "avx2");
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
cpufeatures::new!(sse2_cpuid, "sse2");

/// The ChaCha20 quarter round function
///
/// We located this function in the root of the crate as we want it to be
/// available for the soft backend and for the block function tests.
#[inline(always)]
pub(crate) fn quarter_round(a: usize, b: usize, c: usize, d: usize, state: &mut [u32; STATE_WORDS]) {
    state[a] = state[a].wrapping_add(state[b]);
    state[d] ^= state[a];
    state[d] = state[d].rotate_left(16);

    state[c] = state[c].wrapping_add(state[d]);
    state[b] ^= state[c];
    state[b] = state[b].rotate_left(12);

    state[a] = state[a].wrapping_add(state[b]);
    state[d] ^= state[a];
    state[d] = state[d].rotate_left(8);

    state[c] = state[c].wrapping_add(state[d]);
    state[b] ^= state[c];
    state[b] = state[b].rotate_left(7);
}
