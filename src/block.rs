//! Aligned storage for dense containers.
//!
//! A [`Block`] is exactly one dense container's worth of bits: 1024 words,
//! 65536 bits, 8 KiB. The type itself carries a 32-byte alignment, so any
//! `Block` (boxed, pooled or on the stack) starts on an AVX2 vector
//! boundary and the vectorized kernels never need to check.

use std::fmt;
use std::ops::{Deref, DerefMut};

/// Number of 64-bit words in a block.
pub const BLOCK_WORDS: usize = 1024;

/// Alignment of a block in bytes (one 256-bit vector).
pub const BLOCK_ALIGN: usize = 32;

/// A 32-byte aligned array of [`BLOCK_WORDS`] words.
#[derive(Clone, PartialEq, Eq, Hash)]
#[repr(C, align(32))]
pub struct Block {
    words: [u64; BLOCK_WORDS],
}

impl Block {
    /// A block with every bit clear.
    pub const fn zeroed() -> Self {
        Self {
            words: [0; BLOCK_WORDS],
        }
    }

    /// A block with every bit set.
    pub const fn full() -> Self {
        Self {
            words: [u64::MAX; BLOCK_WORDS],
        }
    }

    /// Heap-allocate a cleared block.
    pub fn boxed() -> Box<Self> {
        Box::new(Self::zeroed())
    }

    /// Set every word to `value`.
    pub fn fill(&mut self, value: u64) {
        self.words.fill(value);
    }

    /// Test bit `index`.
    #[inline]
    pub fn get(&self, index: u16) -> bool {
        let i = usize::from(index);
        self.words[i >> 6] & (1u64 << (i & 63)) != 0
    }

    /// Set bit `index`, returning true if it was previously clear.
    #[inline]
    pub fn set(&mut self, index: u16) -> bool {
        let i = usize::from(index);
        let mask = 1u64 << (i & 63);
        let word = &mut self.words[i >> 6];
        let was_clear = *word & mask == 0;
        *word |= mask;
        was_clear
    }

    /// Clear bit `index`, returning true if it was previously set.
    #[inline]
    pub fn clear(&mut self, index: u16) -> bool {
        let i = usize::from(index);
        let mask = 1u64 << (i & 63);
        let word = &mut self.words[i >> 6];
        let was_set = *word & mask != 0;
        *word &= !mask;
        was_set
    }

    /// Flip bit `index`, returning true if it is set afterwards.
    #[inline]
    pub fn flip(&mut self, index: u16) -> bool {
        let i = usize::from(index);
        let mask = 1u64 << (i & 63);
        let word = &mut self.words[i >> 6];
        *word ^= mask;
        *word & mask != 0
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl Deref for Block {
    type Target = [u64; BLOCK_WORDS];

    fn deref(&self) -> &Self::Target {
        &self.words
    }
}

impl DerefMut for Block {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.words
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("ones", &crate::words::popcount(&self.words))
            .finish()
    }
}
