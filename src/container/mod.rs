//! Containers: the per-key sets of low 16-bit values.
//!
//! A container holds the values sharing one high key in one of two layouts:
//!
//! ```text
//! Sparse  [u16; n]            ascending array, 2n bytes, n <= 4096
//! Dense   [u64; 1024]         65536-bit vector, always 8 KiB
//! ```
//!
//! The crossover [`SPARSE_MAX`] is where both cost the same (4096 * 2 bytes
//! = 8 KiB). Every operation returns a *normalized* container: sparse while
//! the cardinality is at most `SPARSE_MAX`, dense above it. Since the layout
//! is a function of the contents, structural equality is set equality.
//!
//! Binary operators dispatch on the pair of layouts:
//!
//! | pair   | and                | or              | xor             | and_not            |
//! |--------|--------------------|-----------------|-----------------|--------------------|
//! | S, S   | merge / gallop     | merge or bits   | merge or bits   | merge              |
//! | S, D   | filter S by bits   | copy D, set S   | copy D, flip S  | filter S by bits   |
//! | D, S   | filter S by bits   | copy D, set S   | copy D, flip S  | copy D, clear S    |
//! | D, D   | word kernel        | word kernel     | word kernel     | word kernel        |

mod dense;
mod sparse;

pub use dense::{DenseContainer, DenseIter};
pub use sparse::SparseContainer;

use std::iter::Copied;
use std::slice;

use crate::block::{Block, BLOCK_WORDS};
use crate::words::{self, BitOp};

/// Largest cardinality held in a sparse container.
pub const SPARSE_MAX: usize = 4096;

/// Number of distinct low values under one key.
pub const KEY_SPACE: usize = 1 << 16;

/// Number of words in a dense container.
pub const DENSE_WORDS: usize = BLOCK_WORDS;

/// The set of low values for one high key.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Container {
    /// Sorted array of values.
    Sparse(SparseContainer),
    /// 65536-bit vector.
    Dense(DenseContainer),
}

impl Container {
    /// An empty (sparse) container.
    pub fn new() -> Self {
        Container::Sparse(SparseContainer::new())
    }

    /// A container holding all 65536 values.
    pub fn full() -> Self {
        Container::Dense(DenseContainer::full())
    }

    /// Build from ascending, duplicate-free values.
    ///
    /// # Panics
    ///
    /// In debug builds, if `values` is not strictly ascending. Release
    /// builds do not check, and a disordered input yields a container
    /// whose queries and serialized form are meaningless. Use
    /// [`Container::try_from_sorted`] for untrusted input.
    pub fn from_sorted(values: &[u16]) -> Self {
        SparseContainer::from_sorted(values.to_vec()).into_container()
    }

    /// Build from `values` if it is strictly ascending.
    pub fn try_from_sorted(values: &[u16]) -> Option<Self> {
        SparseContainer::try_from_sorted(values.to_vec()).map(SparseContainer::into_container)
    }

    /// The values in `start..end`, where `end <= 65536`.
    pub fn from_range(start: u32, end: u32) -> Self {
        debug_assert!(start <= end && end as usize <= KEY_SPACE);
        let len = (end - start) as usize;
        if len <= SPARSE_MAX {
            return Container::Sparse(SparseContainer::from_sorted(
                (start..end).map(|v| v as u16).collect(),
            ));
        }
        if len == KEY_SPACE {
            return Container::full();
        }
        let mut block = Block::boxed();
        words::set_range(&mut block[..], start as usize, end as usize);
        Container::Dense(DenseContainer::from_block_with_cardinality(block, len))
    }

    /// Number of values held.
    #[inline]
    pub fn cardinality(&self) -> usize {
        match self {
            Container::Sparse(s) => s.cardinality(),
            Container::Dense(d) => d.cardinality(),
        }
    }

    /// True if no value is held.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cardinality() == 0
    }

    /// True if all 65536 values are held.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.cardinality() == KEY_SPACE
    }

    /// True for the array layout.
    pub fn is_sparse(&self) -> bool {
        matches!(self, Container::Sparse(_))
    }

    /// True for the bit-vector layout.
    pub fn is_dense(&self) -> bool {
        matches!(self, Container::Dense(_))
    }

    /// True if the layout matches the cardinality threshold.
    pub fn is_normalized(&self) -> bool {
        match self {
            Container::Sparse(s) => s.cardinality() <= SPARSE_MAX,
            Container::Dense(d) => d.cardinality() > SPARSE_MAX,
        }
    }

    /// Membership test.
    #[inline]
    pub fn contains(&self, value: u16) -> bool {
        match self {
            Container::Sparse(s) => s.contains(value),
            Container::Dense(d) => d.contains(value),
        }
    }

    /// Ascending iterator over the values.
    pub fn iter(&self) -> Iter<'_> {
        let inner = match self {
            Container::Sparse(s) => IterInner::Sparse(s.iter()),
            Container::Dense(d) => IterInner::Dense(d.iter()),
        };
        Iter { inner }
    }

    /// Smallest value.
    pub fn min(&self) -> Option<u16> {
        match self {
            Container::Sparse(s) => s.min(),
            Container::Dense(d) => d.min(),
        }
    }

    /// Largest value.
    pub fn max(&self) -> Option<u16> {
        match self {
            Container::Sparse(s) => s.max(),
            Container::Dense(d) => d.max(),
        }
    }

    /// Apply `op` to `self` and `other`, returning a normalized container.
    pub fn combine(&self, op: BitOp, other: &Container) -> Container {
        use Container::{Dense as D, Sparse as S};

        let mut result = match (op, self, other) {
            (BitOp::And, S(a), S(b)) => S(a.intersect(b)),
            (BitOp::And, S(a), D(b)) => S(a.intersect_dense(b)),
            (BitOp::And, D(a), S(b)) => S(b.intersect_dense(a)),
            (BitOp::And, D(a), D(b)) => a.intersect(b),

            (BitOp::Or, S(a), S(b)) => a.union(b),
            (BitOp::Or, S(a), D(b)) => D(b.union_sparse(a)),
            (BitOp::Or, D(a), S(b)) => D(a.union_sparse(b)),
            (BitOp::Or, D(a), D(b)) => D(a.union(b)),

            (BitOp::Xor, S(a), S(b)) => a.symmetric_difference(b),
            (BitOp::Xor, S(a), D(b)) => b.symmetric_difference_sparse(a),
            (BitOp::Xor, D(a), S(b)) => a.symmetric_difference_sparse(b),
            (BitOp::Xor, D(a), D(b)) => a.symmetric_difference(b),

            (BitOp::AndNot, S(a), S(b)) => S(a.difference(b)),
            (BitOp::AndNot, S(a), D(b)) => S(a.difference_dense(b)),
            (BitOp::AndNot, D(a), S(b)) => a.difference_sparse(b),
            (BitOp::AndNot, D(a), D(b)) => a.difference(b),
        };
        // Only matters for hand-built, non-normalized inputs.
        result.optimize();
        result
    }

    /// Intersection.
    pub fn and(&self, other: &Container) -> Container {
        self.combine(BitOp::And, other)
    }

    /// Union.
    pub fn or(&self, other: &Container) -> Container {
        self.combine(BitOp::Or, other)
    }

    /// Symmetric difference.
    pub fn xor(&self, other: &Container) -> Container {
        self.combine(BitOp::Xor, other)
    }

    /// Values of `self` not in `other`.
    pub fn and_not(&self, other: &Container) -> Container {
        self.combine(BitOp::AndNot, other)
    }

    /// Complement within the 65536-value key universe.
    pub fn not(&self) -> Container {
        match self {
            Container::Sparse(s) => s.complement(),
            Container::Dense(d) => d.complement(),
        }
    }

    /// Insert `value`, returning true if it was absent.
    pub fn insert(&mut self, value: u16) -> bool {
        match self {
            Container::Sparse(s) => {
                if s.cardinality() < SPARSE_MAX {
                    return s.insert(value);
                }
                if s.contains(value) {
                    return false;
                }
                let mut dense = s.to_dense();
                dense.insert(value);
                *self = Container::Dense(dense);
                true
            }
            Container::Dense(d) => d.insert(value),
        }
    }

    /// Remove `value`, returning true if it was present.
    pub fn remove(&mut self, value: u16) -> bool {
        match self {
            Container::Sparse(s) => s.remove(value),
            Container::Dense(d) => {
                if !d.remove(value) {
                    return false;
                }
                if d.cardinality() <= SPARSE_MAX {
                    *self = Container::Sparse(d.to_sparse());
                }
                true
            }
        }
    }

    /// In-place union; a dense left side is updated without copying.
    pub fn or_assign(&mut self, other: &Container) {
        if let Container::Dense(dense) = self {
            match other {
                Container::Sparse(s) => dense.union_sparse_in_place(s),
                Container::Dense(d) => dense.combine_in_place(BitOp::Or, d),
            }
            return;
        }
        *self = self.or(other);
    }

    /// In-place difference; a dense left side is updated without copying.
    pub fn and_not_assign(&mut self, other: &Container) {
        if let Container::Dense(dense) = self {
            match other {
                Container::Sparse(s) => dense.difference_sparse_in_place(s),
                Container::Dense(d) => dense.combine_in_place(BitOp::AndNot, d),
            }
            self.optimize();
            return;
        }
        *self = self.and_not(other);
    }

    /// Convert to the layout the cardinality calls for.
    pub fn optimize(&mut self) {
        let replacement = match self {
            Container::Sparse(s) if s.cardinality() > SPARSE_MAX => {
                Container::Dense(s.to_dense())
            }
            Container::Dense(d) if d.cardinality() <= SPARSE_MAX => {
                Container::Sparse(d.to_sparse())
            }
            _ => return,
        };
        *self = replacement;
    }

    /// By-value form of [`Container::optimize`].
    #[must_use]
    pub fn optimized(mut self) -> Self {
        self.optimize();
        self
    }

    /// Payload size in the portable format, in bytes.
    pub fn serialized_size(&self) -> usize {
        match self {
            Container::Sparse(s) => s.cardinality() * 2,
            Container::Dense(_) => DENSE_WORDS * 8,
        }
    }

    /// Approximate heap memory usage in bytes.
    pub fn heap_bytes(&self) -> usize {
        match self {
            Container::Sparse(s) => s.heap_bytes(),
            Container::Dense(_) => std::mem::size_of::<Block>(),
        }
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> IntoIterator for &'a Container {
    type Item = u16;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

/// Ascending iterator over a [`Container`].
pub struct Iter<'a> {
    inner: IterInner<'a>,
}

enum IterInner<'a> {
    Sparse(Copied<slice::Iter<'a, u16>>),
    Dense(DenseIter<'a>),
}

impl Iterator for Iter<'_> {
    type Item = u16;

    #[inline]
    fn next(&mut self) -> Option<u16> {
        match &mut self.inner {
            IterInner::Sparse(it) => it.next(),
            IterInner::Dense(it) => it.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.inner {
            IterInner::Sparse(it) => it.size_hint(),
            IterInner::Dense(it) => it.size_hint(),
        }
    }
}

impl ExactSizeIterator for Iter<'_> {}
