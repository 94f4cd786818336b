//! Bit-vector containers.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Deref, DerefMut};

use super::sparse::SparseContainer;
use super::{Container, KEY_SPACE, SPARSE_MAX};
use crate::block::{Block, BLOCK_WORDS};
use crate::pool::PooledBlock;
use crate::simd;
use crate::words::{self, BitOp};

/// Shared backing for every full container; copied on first write.
static FULL_BLOCK: Block = Block::full();

/// Backing memory of a dense container: its own heap block, one rented
/// from a [`crate::BlockPool`], or the shared all-ones block.
pub(crate) enum Storage {
    Heap(Box<Block>),
    Pooled(PooledBlock),
    Full,
}

impl Deref for Storage {
    type Target = Block;

    fn deref(&self) -> &Block {
        match self {
            Storage::Heap(block) => block,
            Storage::Pooled(block) => block,
            Storage::Full => &FULL_BLOCK,
        }
    }
}

impl DerefMut for Storage {
    fn deref_mut(&mut self) -> &mut Block {
        if matches!(self, Storage::Full) {
            *self = Storage::Heap(Box::new(Block::full()));
        }
        match self {
            Storage::Heap(block) => block,
            Storage::Pooled(block) => block,
            Storage::Full => unreachable!("shared full block is copied before mutation"),
        }
    }
}

/// A container holding its low values as a 65536-bit vector.
///
/// Used once the cardinality exceeds [`SPARSE_MAX`]. The cardinality is
/// cached and kept in step with every mutation.
pub struct DenseContainer {
    storage: Storage,
    cardinality: usize,
}

impl DenseContainer {
    /// Create a container with no bits set.
    ///
    /// An empty dense container is not normalized; it is a starting point
    /// for building with [`DenseContainer::insert`].
    pub fn new() -> Self {
        Self::from_block_with_cardinality(Block::boxed(), 0)
    }

    /// Create a container with all 65536 bits set.
    ///
    /// Full containers share one static block until they are mutated.
    pub fn full() -> Self {
        Self {
            storage: Storage::Full,
            cardinality: KEY_SPACE,
        }
    }

    /// Take ownership of `block`, counting its bits.
    pub fn from_block(block: Box<Block>) -> Self {
        Self::from_storage(Storage::Heap(block))
    }

    /// Build on a block rented from a pool, counting its bits.
    ///
    /// The block goes back to its pool when the container is dropped.
    pub fn from_pooled(block: PooledBlock) -> Self {
        Self::from_storage(Storage::Pooled(block))
    }

    fn from_storage(storage: Storage) -> Self {
        let cardinality = simd::popcount(&storage[..]) as usize;
        Self {
            storage,
            cardinality,
        }
    }

    pub(crate) fn from_block_with_cardinality(block: Box<Block>, cardinality: usize) -> Self {
        debug_assert_eq!(simd::popcount(&block[..]) as usize, cardinality);
        Self {
            storage: Storage::Heap(block),
            cardinality,
        }
    }

    /// Number of set bits.
    #[inline]
    pub fn cardinality(&self) -> usize {
        self.cardinality
    }

    /// True if all 65536 bits are set.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.cardinality == KEY_SPACE
    }

    /// True if the backing block was rented from a pool.
    pub fn is_pooled(&self) -> bool {
        matches!(self.storage, Storage::Pooled(_))
    }

    /// Test bit `value`.
    #[inline]
    pub fn contains(&self, value: u16) -> bool {
        self.storage.get(value)
    }

    /// The raw words, least significant bit first.
    pub fn words(&self) -> &[u64; BLOCK_WORDS] {
        &self.storage
    }

    /// Ascending iterator over the set bits.
    pub fn iter(&self) -> DenseIter<'_> {
        DenseIter {
            words: &self.storage,
            index: 0,
            current: self.storage[0],
            remaining: self.cardinality,
        }
    }

    /// Smallest set bit.
    pub fn min(&self) -> Option<u16> {
        self.storage
            .iter()
            .enumerate()
            .find(|&(_, &w)| w != 0)
            .map(|(i, w)| (i * 64 + w.trailing_zeros() as usize) as u16)
    }

    /// Largest set bit.
    pub fn max(&self) -> Option<u16> {
        self.storage
            .iter()
            .enumerate()
            .rev()
            .find(|&(_, &w)| w != 0)
            .map(|(i, w)| (i * 64 + 63 - w.leading_zeros() as usize) as u16)
    }

    /// Set bit `value`, returning true if it was clear.
    pub fn insert(&mut self, value: u16) -> bool {
        let added = self.storage.set(value);
        self.cardinality += usize::from(added);
        added
    }

    /// Clear bit `value`, returning true if it was set.
    pub fn remove(&mut self, value: u16) -> bool {
        let removed = self.storage.clear(value);
        self.cardinality -= usize::from(removed);
        removed
    }

    /// Extract the set bits into a sorted array.
    pub fn to_sparse(&self) -> SparseContainer {
        let mut values = Vec::with_capacity(self.cardinality);
        values.extend(self.iter());
        SparseContainer::from_sorted(values)
    }

    /// Normalize into the representation the threshold calls for.
    pub(crate) fn into_container(self) -> Container {
        if self.cardinality <= SPARSE_MAX {
            Container::Sparse(self.to_sparse())
        } else {
            Container::Dense(self)
        }
    }

    fn cloned_block(&self) -> Box<Block> {
        let mut block = Block::boxed();
        block.copy_from_slice(&self.storage[..]);
        block
    }

    fn combined(&self, op: BitOp, other: &DenseContainer) -> DenseContainer {
        let mut block = self.cloned_block();
        simd::combine_blocks(op, &mut block, &other.storage);
        DenseContainer::from_block(block)
    }

    /// Set union. The result has at least as many bits as either input.
    pub fn union(&self, other: &DenseContainer) -> DenseContainer {
        self.combined(BitOp::Or, other)
    }

    /// Union with a sparse container, setting one bit per value.
    pub fn union_sparse(&self, other: &SparseContainer) -> DenseContainer {
        let mut result = self.clone();
        result.union_sparse_in_place(other);
        result
    }

    /// Set intersection.
    pub fn intersect(&self, other: &DenseContainer) -> Container {
        self.combined(BitOp::And, other).into_container()
    }

    /// Bits of `self` not set in `other`.
    pub fn difference(&self, other: &DenseContainer) -> Container {
        self.combined(BitOp::AndNot, other).into_container()
    }

    /// Bits of `self` other than the values in `other`.
    pub fn difference_sparse(&self, other: &SparseContainer) -> Container {
        let mut result = self.clone();
        result.difference_sparse_in_place(other);
        result.into_container()
    }

    /// Bits set in exactly one of `self` and `other`.
    pub fn symmetric_difference(&self, other: &DenseContainer) -> Container {
        self.combined(BitOp::Xor, other).into_container()
    }

    /// Flip one bit per value of `other`.
    pub fn symmetric_difference_sparse(&self, other: &SparseContainer) -> Container {
        let mut block = self.cloned_block();
        let mut cardinality = self.cardinality;
        for v in other.iter() {
            if block.flip(v) {
                cardinality += 1;
            } else {
                cardinality -= 1;
            }
        }
        DenseContainer::from_block_with_cardinality(block, cardinality).into_container()
    }

    /// Complement within the 65536-value key universe.
    pub fn complement(&self) -> Container {
        if self.cardinality == 0 {
            return Container::full();
        }
        if self.is_full() {
            return Container::new();
        }
        let mut block = self.cloned_block();
        words::negate(&mut block[..]);
        DenseContainer::from_block_with_cardinality(block, KEY_SPACE - self.cardinality)
            .into_container()
    }

    pub(crate) fn union_sparse_in_place(&mut self, other: &SparseContainer) {
        for v in other.iter() {
            self.insert(v);
        }
    }

    pub(crate) fn difference_sparse_in_place(&mut self, other: &SparseContainer) {
        for v in other.iter() {
            self.remove(v);
        }
    }

    /// Apply `op` word by word with `other`, then recount.
    pub(crate) fn combine_in_place(&mut self, op: BitOp, other: &DenseContainer) {
        simd::combine_blocks(op, &mut self.storage, &other.storage);
        self.cardinality = simd::popcount(&self.storage[..]) as usize;
    }
}

impl Default for DenseContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for DenseContainer {
    /// Clones own a heap block, even when `self` is pooled.
    fn clone(&self) -> Self {
        let storage = match self.storage {
            Storage::Full => Storage::Full,
            _ => Storage::Heap(self.cloned_block()),
        };
        Self {
            storage,
            cardinality: self.cardinality,
        }
    }
}

impl PartialEq for DenseContainer {
    fn eq(&self, other: &Self) -> bool {
        if self.cardinality != other.cardinality {
            return false;
        }
        if self.is_full() {
            return true;
        }
        simd::blocks_equal(&self.storage, &other.storage)
    }
}

impl Eq for DenseContainer {}

impl Hash for DenseContainer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cardinality.hash(state);
        self.storage[..].hash(state);
    }
}

impl fmt::Debug for DenseContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DenseContainer")
            .field("cardinality", &self.cardinality)
            .field("pooled", &self.is_pooled())
            .finish()
    }
}

/// Ascending iterator over the set bits of a [`DenseContainer`].
pub struct DenseIter<'a> {
    words: &'a [u64; BLOCK_WORDS],
    index: usize,
    current: u64,
    remaining: usize,
}

impl Iterator for DenseIter<'_> {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        while self.current == 0 {
            self.index += 1;
            if self.index >= BLOCK_WORDS {
                return None;
            }
            self.current = self.words[self.index];
        }
        // Isolate the lowest set bit; the ones below it give its position.
        let lowest = self.current & self.current.wrapping_neg();
        let bit = (lowest - 1).count_ones() as usize;
        self.current ^= lowest;
        self.remaining -= 1;
        Some((self.index * 64 + bit) as u16)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for DenseIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::BlockPool;

    fn dense_of(values: impl IntoIterator<Item = u16>) -> DenseContainer {
        let mut d = DenseContainer::new();
        for v in values {
            d.insert(v);
        }
        d
    }

    #[test]
    fn test_dense_iter_order() {
        let d = dense_of([65535, 0, 63, 64, 1000]);
        let got: Vec<u16> = d.iter().collect();
        assert_eq!(got, vec![0, 63, 64, 1000, 65535]);
        assert_eq!(d.iter().len(), 5);
        assert_eq!(d.min(), Some(0));
        assert_eq!(d.max(), Some(65535));
        assert_eq!(DenseContainer::new().min(), None);
    }

    #[test]
    fn test_dense_cardinality_tracking() {
        let mut d = dense_of(0..5000);
        assert_eq!(d.cardinality(), 5000);
        assert!(!d.insert(10));
        assert!(d.remove(10));
        assert!(!d.remove(10));
        assert_eq!(d.cardinality(), 4999);
        assert_eq!(d.cardinality() as u64, simd::popcount(&d.words()[..]));
    }

    #[test]
    fn test_dense_ops_normalize() {
        let a = dense_of(0..6000);
        let b = dense_of(3000..9000);
        let and = a.intersect(&b);
        assert!(and.is_sparse());
        assert_eq!(and.cardinality(), 3000);

        let or = a.union(&b);
        assert_eq!(or.cardinality(), 9000);

        let xor = a.symmetric_difference(&b);
        assert!(xor.is_dense());
        assert_eq!(xor.cardinality(), 6000);

        let diff = a.difference(&b);
        assert!(diff.is_sparse());
        assert_eq!(diff.cardinality(), 3000);
    }

    #[test]
    fn test_dense_sparse_mixed_ops() {
        let a = dense_of(0..5000);
        let s = SparseContainer::from_sorted(vec![1, 4999, 5000, 60000]);
        let u = a.union_sparse(&s);
        assert_eq!(u.cardinality(), 5002);

        let x = a.symmetric_difference_sparse(&s);
        assert_eq!(x.cardinality(), 5000);
        assert!(!x.contains(1));
        assert!(x.contains(60000));

        let d = a.difference_sparse(&s);
        assert!(d.is_dense());
        assert_eq!(d.cardinality(), 4998);

        let head = SparseContainer::from_sorted((0..1000).collect());
        let drained = a.difference_sparse(&head);
        assert!(drained.is_sparse());
        assert_eq!(drained.cardinality(), 4000);
        assert_eq!(drained.min(), Some(1000));
    }

    #[test]
    fn test_dense_equality_and_full() {
        let a = dense_of(0..5000);
        let mut b = dense_of((0..5000).rev());
        assert_eq!(a, b);
        b.remove(0);
        b.insert(5000);
        assert_ne!(a, b);

        assert_eq!(DenseContainer::full(), DenseContainer::full());
        assert!(DenseContainer::full().complement().is_empty());
    }

    #[test]
    fn test_full_copy_on_write() {
        let mut full = DenseContainer::full();
        let copy = full.clone();
        assert!(full.remove(7));
        assert_eq!(full.cardinality(), KEY_SPACE - 1);
        assert!(!full.contains(7));
        assert!(copy.is_full());
        assert!(copy.contains(7));
        assert!(DenseContainer::full().contains(7));
    }

    #[test]
    fn test_pooled_dense_returns_block() {
        let pool = BlockPool::with_blocks(1);
        let mut block = pool.rent().unwrap();
        block.fill(u64::MAX);
        let d = DenseContainer::from_pooled(block);
        assert!(d.is_pooled());
        assert!(d.is_full());
        assert_eq!(pool.in_use(), 1);

        let copy = d.clone();
        assert!(!copy.is_pooled());
        assert_eq!(copy, d);
        drop(d);
        assert_eq!(pool.in_use(), 0);
    }
}
