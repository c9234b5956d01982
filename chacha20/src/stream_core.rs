//! Block-level implementation of the RustCrypto `cipher` traits.
//!
//! [`ChaCha20Core`] never buffers: every call of the core traits works on
//! whole blocks. Wrap it in [`StreamCipherCoreWrapper`] for byte-granular
//! `StreamCipher`/`StreamCipherSeek` access.

use crate::{BLOCK_SIZE, Backend, ChaCha20, State, chacha::wipe};
use cipher::{
    BlockSizeUser, ParBlocks, ParBlocksSizeUser, StreamCipherBackend, StreamCipherClosure,
    StreamCipherCore, StreamCipherCoreWrapper, StreamCipherSeekCore,
    array::Array,
    consts::{U8, U64},
};

#[cfg(feature = "zeroize")]
use zeroize::ZeroizeOnDrop;

/// Block type used by the core traits.
type Block = Array<u8, U64>;

/// Blocks handed to the backend per parallel step.
const PAR_BLOCKS: usize = 8;

/// Byte-granular ChaCha20 built from [`ChaCha20Core`].
pub type ChaCha20Stream = StreamCipherCoreWrapper<ChaCha20Core>;

/// [`ChaCha20`] exposed through the `cipher` core traits.
///
/// The block counter follows the variant of the wrapped cipher. Seeking past
/// the variant's maximum leaves the core exhausted, and
/// [`remaining_blocks`](StreamCipherCore::remaining_blocks) then reports zero.
#[derive(Debug)]
pub struct ChaCha20Core(ChaCha20);

impl ChaCha20Core {
    /// Hand the wrapped cipher back.
    #[must_use]
    pub fn into_inner(self) -> ChaCha20 {
        self.0
    }
}

impl From<ChaCha20> for ChaCha20Core {
    fn from(cipher: ChaCha20) -> Self {
        Self(cipher)
    }
}

impl BlockSizeUser for ChaCha20Core {
    type BlockSize = U64;
}

impl StreamCipherCore for ChaCha20Core {
    #[inline(always)]
    fn remaining_blocks(&self) -> Option<usize> {
        usize::try_from(self.0.remaining_blocks()).ok()
    }

    fn process_with_backend(&mut self, f: impl StreamCipherClosure<BlockSize = Self::BlockSize>) {
        let (state, backend) = self.0.parts_mut();
        f.call(&mut Driver { state, backend });
    }
}

impl StreamCipherSeekCore for ChaCha20Core {
    type Counter = u64;

    #[inline(always)]
    fn get_block_pos(&self) -> u64 {
        self.0.block_pos()
    }

    #[inline(always)]
    fn set_block_pos(&mut self, pos: u64) {
        self.0.parts_mut().0.set_block_pos_saturating(pos);
    }
}

#[cfg(feature = "zeroize")]
impl ZeroizeOnDrop for ChaCha20Core {}

/// Runs a [`Backend`] on behalf of a `cipher` closure.
struct Driver<'a> {
    state: &'a mut State,
    backend: &'static dyn Backend,
}

impl Driver<'_> {
    /// # Panics
    /// If the counter is exhausted. `cipher` checks
    /// [`remaining_blocks`](StreamCipherCore::remaining_blocks) before asking
    /// for keystream, so this only fires on misuse of the core.
    fn generate(&mut self, out: &mut [u8]) {
        let blocks = out.len() / BLOCK_SIZE;
        if let Err(err) = self.backend.apply_blocks(self.state, None, out, blocks) {
            panic!("{err}");
        }
    }
}

impl BlockSizeUser for Driver<'_> {
    type BlockSize = U64;
}

impl ParBlocksSizeUser for Driver<'_> {
    type ParBlocksSize = U8;
}

impl StreamCipherBackend for Driver<'_> {
    #[inline(always)]
    fn gen_ks_block(&mut self, block: &mut Block) {
        self.generate(block.as_mut_slice());
    }

    #[inline(always)]
    fn gen_par_ks_blocks(&mut self, blocks: &mut ParBlocks<Self>) {
        let mut buf = [0u8; PAR_BLOCKS * BLOCK_SIZE];
        self.generate(&mut buf);
        for (block, chunk) in blocks.iter_mut().zip(buf.chunks_exact(BLOCK_SIZE)) {
            block.copy_from_slice(chunk);
        }
        wipe(&mut buf);
    }
}
