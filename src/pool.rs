//! A bounded pool of aligned blocks for dense containers.
//!
//! The pool owns a fixed number of [`Block`]s, allocated up front. Renting
//! moves one block out of the free list into a [`PooledBlock`] guard; the
//! guard puts it back when dropped, so a dense container built on a pooled
//! block returns its storage exactly when the container is dropped. Nothing
//! waits: renting from an empty pool fails with [`Error::PoolExhausted`].
//!
//! The free list sits behind a mutex, so a pool handle can be cloned and
//! shared across threads.

use std::fmt;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::block::Block;
use crate::error::{Error, Result};

/// Configuration for a [`BlockPool`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of blocks the pool owns.
    pub blocks: usize,
}

impl PoolConfig {
    /// A configuration owning `blocks` blocks.
    pub fn new(blocks: usize) -> Self {
        Self { blocks }
    }

    /// Set the number of blocks.
    #[must_use]
    pub fn blocks(mut self, blocks: usize) -> Self {
        self.blocks = blocks;
        self
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        // 64 blocks = 512 KiB, enough for a bitmap with 64 dense keys.
        Self { blocks: 64 }
    }
}

struct PoolInner {
    free: Mutex<Vec<Box<Block>>>,
    capacity: usize,
}

impl PoolInner {
    fn free_list(&self) -> MutexGuard<'_, Vec<Box<Block>>> {
        // The free list holds owned boxes only; a panic elsewhere cannot
        // leave it half-updated.
        self.free.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A fixed-capacity pool of 32-byte aligned blocks.
///
/// Cloning the pool clones the handle; all clones share the same blocks.
#[derive(Clone)]
pub struct BlockPool {
    inner: Arc<PoolInner>,
}

impl BlockPool {
    /// Create a pool and allocate all of its blocks.
    pub fn new(config: PoolConfig) -> Self {
        let free: Vec<Box<Block>> = (0..config.blocks).map(|_| Block::boxed()).collect();
        log::debug!(
            "block pool created: {} blocks, {} bytes",
            config.blocks,
            config.blocks * std::mem::size_of::<Block>()
        );
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(free),
                capacity: config.blocks,
            }),
        }
    }

    /// Create a pool of `blocks` blocks.
    pub fn with_blocks(blocks: usize) -> Self {
        Self::new(PoolConfig::new(blocks))
    }

    /// Total number of blocks owned by the pool.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Number of blocks currently rented out.
    pub fn in_use(&self) -> usize {
        self.inner.capacity - self.available()
    }

    /// Number of blocks ready to be rented.
    pub fn available(&self) -> usize {
        self.inner.free_list().len()
    }

    /// Take a cleared block out of the pool.
    pub fn rent(&self) -> Result<PooledBlock> {
        let block = self.inner.free_list().pop();
        match block {
            Some(mut block) => {
                block.fill(0);
                Ok(PooledBlock {
                    block: ManuallyDrop::new(block),
                    pool: Arc::clone(&self.inner),
                })
            }
            None => {
                log::warn!("block pool exhausted ({} blocks)", self.inner.capacity);
                Err(Error::PoolExhausted {
                    capacity: self.inner.capacity,
                })
            }
        }
    }

    /// Hand a block back before its guard would be dropped.
    ///
    /// Fails with [`Error::ForeignBuffer`] if the block came from a different
    /// pool; that block still goes home to its own pool when it is dropped.
    pub fn give_back(&self, block: PooledBlock) -> Result<()> {
        if !self.issued(&block) {
            return Err(Error::ForeignBuffer);
        }
        drop(block);
        Ok(())
    }

    /// True if `block` was rented from this pool.
    pub fn issued(&self, block: &PooledBlock) -> bool {
        Arc::ptr_eq(&self.inner, &block.pool)
    }
}

impl Default for BlockPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl fmt::Debug for BlockPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockPool")
            .field("capacity", &self.capacity())
            .field("in_use", &self.in_use())
            .finish()
    }
}

/// A block rented from a [`BlockPool`]; returns itself on drop.
pub struct PooledBlock {
    block: ManuallyDrop<Box<Block>>,
    pool: Arc<PoolInner>,
}

impl Deref for PooledBlock {
    type Target = Block;

    fn deref(&self) -> &Block {
        &self.block
    }
}

impl DerefMut for PooledBlock {
    fn deref_mut(&mut self) -> &mut Block {
        &mut self.block
    }
}

impl Drop for PooledBlock {
    fn drop(&mut self) {
        // SAFETY: `block` is not accessed again after being taken here.
        let block = unsafe { ManuallyDrop::take(&mut self.block) };
        self.pool.free_list().push(block);
    }
}

impl fmt::Debug for PooledBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBlock")
            .field("ones", &crate::words::popcount(&self[..]))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BLOCK_ALIGN;

    #[test]
    fn test_pool_rent_until_exhausted() {
        let pool = BlockPool::with_blocks(3);
        assert_eq!(pool.capacity(), 3);

        let a = pool.rent().unwrap();
        let b = pool.rent().unwrap();
        let c = pool.rent().unwrap();
        assert_eq!(pool.in_use(), 3);
        assert!(matches!(
            pool.rent(),
            Err(Error::PoolExhausted { capacity: 3 })
        ));

        drop(b);
        assert_eq!(pool.in_use(), 2);
        let b = pool.rent().unwrap();
        assert_eq!(pool.in_use(), 3);

        pool.give_back(a).unwrap();
        drop((b, c));
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn test_pool_blocks_are_aligned_and_cleared() {
        let pool = BlockPool::with_blocks(1);
        {
            let mut block = pool.rent().unwrap();
            assert_eq!(block.as_ptr() as usize % BLOCK_ALIGN, 0);
            block.fill(u64::MAX);
        }
        let block = pool.rent().unwrap();
        assert!(block.iter().all(|&w| w == 0));
    }

    #[test]
    fn test_pool_rejects_foreign_block() {
        let home = BlockPool::with_blocks(1);
        let other = BlockPool::with_blocks(1);

        let block = other.rent().unwrap();
        assert!(!home.issued(&block));
        assert!(matches!(home.give_back(block), Err(Error::ForeignBuffer)));
        // The rejected block went back to the pool that issued it.
        assert_eq!(other.in_use(), 0);
        assert_eq!(home.in_use(), 0);
    }

    #[test]
    fn test_pool_shared_across_threads() {
        let pool = BlockPool::with_blocks(8);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let block = pool.rent().unwrap();
                        drop(block);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(pool.in_use(), 0);
    }
}
