//! Sorted-array containers.

use std::fmt;
use std::iter::Copied;
use std::slice;

use super::dense::DenseContainer;
use super::{Container, SPARSE_MAX};
use crate::array_ops;
use crate::block::Block;

/// A container holding its low values as an ascending, duplicate-free array.
///
/// Used while the cardinality is at most [`SPARSE_MAX`]; each value costs
/// two bytes.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct SparseContainer {
    values: Vec<u16>,
}

impl SparseContainer {
    /// Create an empty container.
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Wrap an ascending, duplicate-free array.
    ///
    /// # Panics
    ///
    /// In debug builds, if `values` is not strictly ascending. Release
    /// builds skip the check; use [`SparseContainer::try_from_sorted`] for
    /// untrusted input.
    pub fn from_sorted(values: Vec<u16>) -> Self {
        debug_assert!(array_ops::is_strictly_ascending(&values));
        Self { values }
    }

    /// Wrap `values` if it is strictly ascending.
    pub fn try_from_sorted(values: Vec<u16>) -> Option<Self> {
        array_ops::is_strictly_ascending(&values).then_some(Self { values })
    }

    /// Number of values held.
    #[inline]
    pub fn cardinality(&self) -> usize {
        self.values.len()
    }

    /// True if no value is held.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Binary search for `value`.
    #[inline]
    pub fn contains(&self, value: u16) -> bool {
        self.values.binary_search(&value).is_ok()
    }

    /// Ascending iterator over the values.
    pub fn iter(&self) -> Copied<slice::Iter<'_, u16>> {
        self.values.iter().copied()
    }

    /// The values as a slice.
    pub fn as_slice(&self) -> &[u16] {
        &self.values
    }

    /// Smallest value.
    pub fn min(&self) -> Option<u16> {
        self.values.first().copied()
    }

    /// Largest value.
    pub fn max(&self) -> Option<u16> {
        self.values.last().copied()
    }

    /// Insert `value`, returning true if it was absent.
    ///
    /// The array may grow past [`SPARSE_MAX`]; [`Container::insert`] converts
    /// before that happens.
    pub fn insert(&mut self, value: u16) -> bool {
        match self.values.binary_search(&value) {
            Ok(_) => false,
            Err(pos) => {
                self.values.insert(pos, value);
                true
            }
        }
    }

    /// Remove `value`, returning true if it was present.
    pub fn remove(&mut self, value: u16) -> bool {
        match self.values.binary_search(&value) {
            Ok(pos) => {
                self.values.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    /// Copy the values into a dense bit vector.
    pub fn to_dense(&self) -> DenseContainer {
        let mut block = Block::boxed();
        for &v in &self.values {
            block.set(v);
        }
        DenseContainer::from_block_with_cardinality(block, self.values.len())
    }

    /// Normalize into the representation the threshold calls for.
    pub(crate) fn into_container(self) -> Container {
        if self.values.len() > SPARSE_MAX {
            Container::Dense(self.to_dense())
        } else {
            Container::Sparse(self)
        }
    }

    /// Set union.
    pub fn union(&self, other: &SparseContainer) -> Container {
        if self.cardinality() + other.cardinality() <= SPARSE_MAX {
            return Container::Sparse(Self::from_sorted(array_ops::union(
                &self.values,
                &other.values,
            )));
        }
        // The result may exceed the threshold; build it as bits and let the
        // popcount decide.
        let mut block = Block::boxed();
        for &v in self.values.iter().chain(&other.values) {
            block.set(v);
        }
        DenseContainer::from_block(block).into_container()
    }

    /// Set intersection.
    pub fn intersect(&self, other: &SparseContainer) -> SparseContainer {
        Self::from_sorted(array_ops::intersect(&self.values, &other.values))
    }

    /// Intersection with a dense container, by bit test per value.
    pub fn intersect_dense(&self, other: &DenseContainer) -> SparseContainer {
        Self::from_sorted(
            self.values
                .iter()
                .copied()
                .filter(|&v| other.contains(v))
                .collect(),
        )
    }

    /// Values of `self` not in `other`.
    pub fn difference(&self, other: &SparseContainer) -> SparseContainer {
        Self::from_sorted(array_ops::difference(&self.values, &other.values))
    }

    /// Values of `self` not in the dense `other`.
    pub fn difference_dense(&self, other: &DenseContainer) -> SparseContainer {
        Self::from_sorted(
            self.values
                .iter()
                .copied()
                .filter(|&v| !other.contains(v))
                .collect(),
        )
    }

    /// Values in exactly one of `self` and `other`.
    pub fn symmetric_difference(&self, other: &SparseContainer) -> Container {
        if self.cardinality() + other.cardinality() <= SPARSE_MAX {
            return Container::Sparse(Self::from_sorted(array_ops::symmetric_difference(
                &self.values,
                &other.values,
            )));
        }
        let mut block = Block::boxed();
        for &v in self.values.iter().chain(&other.values) {
            block.flip(v);
        }
        DenseContainer::from_block(block).into_container()
    }

    /// Complement within the 65536-value key universe.
    pub fn complement(&self) -> Container {
        if self.values.is_empty() {
            return Container::full();
        }
        let mut block = Box::new(Block::full());
        for &v in &self.values {
            block.clear(v);
        }
        let cardinality = super::KEY_SPACE - self.values.len();
        DenseContainer::from_block_with_cardinality(block, cardinality).into_container()
    }

    /// Approximate heap memory usage in bytes.
    pub fn heap_bytes(&self) -> usize {
        self.values.capacity() * std::mem::size_of::<u16>()
    }
}

impl fmt::Debug for SparseContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SparseContainer")
            .field("cardinality", &self.values.len())
            .field("min", &self.min())
            .field("max", &self.max())
            .finish()
    }
}
