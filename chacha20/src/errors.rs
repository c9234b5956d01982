//! Error types.
use core::fmt;

/// Errors reported by cipher construction, positioning, and keystream
/// generation.
///
/// Every error is detected before any output is written, so a failed call
/// leaves both the destination buffer and the block counter untouched.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Error {
    /// The key is not exactly 32 bytes.
    InvalidKeySize,
    /// The nonce is neither 8 bytes (legacy variant) nor 12 bytes (IETF variant).
    InvalidNonceSize,
    /// The request would run the block counter past the variant's range.
    ///
    /// Continuing would reuse keystream, so there is no valid way to proceed
    /// under the current nonce: rekey or pick a fresh nonce.
    CounterOverflow,
    /// The destination (or source) buffer is too short for the request.
    BufferTooShort,
    /// A default backend was already bound for this process.
    BackendAlreadySelected,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Error::InvalidKeySize => "invalid key size: expected 32 bytes",
            Error::InvalidNonceSize => "invalid nonce size: expected 8 or 12 bytes",
            Error::CounterOverflow => "keystream per nonce limit exceeded",
            Error::BufferTooShort => "buffer too short",
            Error::BackendAlreadySelected => "default backend already selected",
        })
    }
}

impl core::error::Error for Error {}
