//! The two-level index: high keys mapped to containers.
//!
//! A [`Directory`] is a single vector of `(key, container)` pairs, keys
//! strictly ascending, no container empty, plus the total cardinality as a
//! cached `u64`. Every bitmap-level operator is a merge-join over the two
//! key sequences:
//!
//! ```text
//!             key in both        key only left      key only right
//! and         combine            drop               drop
//! or          combine            keep               keep
//! xor         combine            keep               keep
//! and_not     combine            keep               drop
//! ```
//!
//! Combined containers that come out empty are dropped, so the invariants
//! hold for every result without a separate cleanup pass.

use std::cmp::Ordering;
use std::fmt;
use std::slice;

use crate::container::{self, Container, SparseContainer};
use crate::words::BitOp;

/// High 16 bits of `value`: the container key.
#[inline]
pub fn high(value: u32) -> u16 {
    (value >> 16) as u16
}

/// Low 16 bits of `value`: the position inside the container.
#[inline]
pub fn low(value: u32) -> u16 {
    value as u16
}

/// Reassemble a value from its key and low bits.
#[inline]
pub fn join(high: u16, low: u16) -> u32 {
    (u32::from(high) << 16) | u32::from(low)
}

/// Ordered `(key, container)` pairs with a cached total cardinality.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Directory {
    entries: Vec<(u16, Container)>,
    cardinality: u64,
}

impl Directory {
    /// An empty directory.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            cardinality: 0,
        }
    }

    /// Build from strictly ascending values.
    pub(crate) fn from_sorted_values(values: &[u32]) -> Self {
        let mut out = Self::new();
        for (key, container) in KeyGroups::new(values) {
            out.push(key, container);
        }
        out
    }

    /// Append a container after all existing keys. Empty containers are
    /// skipped.
    pub(crate) fn push(&mut self, key: u16, container: Container) {
        debug_assert!(self.entries.last().map_or(true, |(k, _)| *k < key));
        if container.is_empty() {
            return;
        }
        self.cardinality += container.cardinality() as u64;
        self.entries.push((key, container));
    }

    /// Total number of values.
    #[inline]
    pub fn cardinality(&self) -> u64 {
        self.cardinality
    }

    /// True if no value is held.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of containers.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The `(key, container)` pairs in key order.
    pub fn entries(&self) -> &[(u16, Container)] {
        &self.entries
    }

    /// The container for `key`, if any.
    pub fn get(&self, key: u16) -> Option<&Container> {
        self.search(key).ok().map(|i| &self.entries[i].1)
    }

    fn search(&self, key: u16) -> Result<usize, usize> {
        self.entries.binary_search_by_key(&key, |(k, _)| *k)
    }

    /// Membership test.
    pub fn contains(&self, value: u32) -> bool {
        self.get(high(value)).is_some_and(|c| c.contains(low(value)))
    }

    /// Smallest value.
    pub fn min(&self) -> Option<u32> {
        let (key, c) = self.entries.first()?;
        c.min().map(|lo| join(*key, lo))
    }

    /// Largest value.
    pub fn max(&self) -> Option<u32> {
        let (key, c) = self.entries.last()?;
        c.max().map(|lo| join(*key, lo))
    }

    /// Ascending iterator over all values.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            entries: self.entries.iter(),
            current: None,
            remaining: self.cardinality,
        }
    }

    /// Merge-join `self` and `other` under `op`.
    pub fn merge(&self, op: BitOp, other: &Directory) -> Directory {
        let (a, b) = (&self.entries, &other.entries);
        let mut out = Directory {
            entries: Vec::with_capacity(match op {
                BitOp::And => a.len().min(b.len()),
                BitOp::AndNot => a.len(),
                BitOp::Or | BitOp::Xor => a.len() + b.len(),
            }),
            cardinality: 0,
        };

        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            let (ka, ca) = &a[i];
            let (kb, cb) = &b[j];
            match ka.cmp(kb) {
                Ordering::Less => {
                    if op.keeps_left_only() {
                        out.push(*ka, ca.clone());
                    }
                    i += 1;
                }
                Ordering::Greater => {
                    if op.keeps_right_only() {
                        out.push(*kb, cb.clone());
                    }
                    j += 1;
                }
                Ordering::Equal => {
                    out.push(*ka, ca.combine(op, cb));
                    i += 1;
                    j += 1;
                }
            }
        }
        if op.keeps_left_only() {
            for (k, c) in &a[i..] {
                out.push(*k, c.clone());
            }
        }
        if op.keeps_right_only() {
            for (k, c) in &b[j..] {
                out.push(*k, c.clone());
            }
        }
        out
    }

    /// Complement over the whole `u32` universe.
    ///
    /// Absent keys become full containers; present keys are complemented
    /// and dropped if that leaves them empty.
    pub fn not(&self) -> Directory {
        let mut out = Directory {
            entries: Vec::with_capacity(container::KEY_SPACE - self.entries.len()),
            cardinality: 0,
        };
        let mut present = self.entries.iter().peekable();
        for key in 0..=u16::MAX {
            let complement = match present.next_if(|(k, _)| *k == key) {
                Some((_, c)) => c.not(),
                None => Container::full(),
            };
            out.push(key, complement);
        }
        out
    }

    /// Union of any number of directories, folded pairwise.
    pub fn union_all<'a, I>(directories: I) -> Directory
    where
        I: IntoIterator<Item = &'a Directory>,
    {
        let mut iter = directories.into_iter();
        let Some(first) = iter.next() else {
            return Directory::new();
        };
        iter.fold(first.clone(), |acc, d| acc.merge(BitOp::Or, d))
    }

    /// Insert one value, returning true if it was absent.
    pub fn insert_value(&mut self, value: u32) -> bool {
        let (key, lo) = (high(value), low(value));
        match self.search(key) {
            Ok(i) => {
                let added = self.entries[i].1.insert(lo);
                self.cardinality += u64::from(added);
                added
            }
            Err(i) => {
                let singleton = Container::Sparse(SparseContainer::from_sorted(vec![lo]));
                self.entries.insert(i, (key, singleton));
                self.cardinality += 1;
                true
            }
        }
    }

    /// Remove one value, returning true if it was present.
    pub fn remove_value(&mut self, value: u32) -> bool {
        let Ok(i) = self.search(high(value)) else {
            return false;
        };
        let container = &mut self.entries[i].1;
        if !container.remove(low(value)) {
            return false;
        }
        self.cardinality -= 1;
        if container.is_empty() {
            self.entries.remove(i);
        }
        true
    }

    /// Union `group` into the container for `key`.
    pub fn or_group(&mut self, key: u16, group: &Container) {
        match self.search(key) {
            Ok(i) => {
                let container = &mut self.entries[i].1;
                let before = container.cardinality();
                container.or_assign(group);
                self.cardinality += (container.cardinality() - before) as u64;
            }
            Err(i) => {
                if !group.is_empty() {
                    self.cardinality += group.cardinality() as u64;
                    self.entries.insert(i, (key, group.clone().optimized()));
                }
            }
        }
    }

    /// Remove the values of `group` from the container for `key`.
    pub fn and_not_group(&mut self, key: u16, group: &Container) {
        let Ok(i) = self.search(key) else {
            return;
        };
        let container = &mut self.entries[i].1;
        let before = container.cardinality();
        container.and_not_assign(group);
        self.cardinality -= (before - container.cardinality()) as u64;
        if container.is_empty() {
            self.entries.remove(i);
        }
    }

    /// Renormalize every container.
    pub fn optimize(&mut self) {
        for (_, c) in &mut self.entries {
            c.optimize();
        }
    }

    /// Check every structural invariant: keys strictly ascending, no empty
    /// or non-normalized container, cached cardinality correct.
    pub fn is_valid(&self) -> bool {
        let ascending = self.entries.windows(2).all(|w| w[0].0 < w[1].0);
        let containers_ok = self
            .entries
            .iter()
            .all(|(_, c)| !c.is_empty() && c.is_normalized());
        let total: u64 = self
            .entries
            .iter()
            .map(|(_, c)| c.cardinality() as u64)
            .sum();
        ascending && containers_ok && total == self.cardinality
    }

    /// Approximate heap memory usage in bytes.
    pub fn heap_bytes(&self) -> usize {
        self.entries.capacity() * std::mem::size_of::<(u16, Container)>()
            + self
                .entries
                .iter()
                .map(|(_, c)| c.heap_bytes())
                .sum::<usize>()
    }
}

impl fmt::Debug for Directory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Directory")
            .field("containers", &self.entries.len())
            .field("cardinality", &self.cardinality)
            .finish()
    }
}

/// Splits strictly ascending values into one normalized container per key.
pub(crate) struct KeyGroups<'a> {
    rest: &'a [u32],
}

impl<'a> KeyGroups<'a> {
    pub(crate) fn new(values: &'a [u32]) -> Self {
        debug_assert!(values.windows(2).all(|w| w[0] < w[1]));
        Self { rest: values }
    }
}

impl Iterator for KeyGroups<'_> {
    type Item = (u16, Container);

    fn next(&mut self) -> Option<Self::Item> {
        let key = high(*self.rest.first()?);
        let n = self.rest.partition_point(|&v| high(v) == key);
        let (group, rest) = self.rest.split_at(n);
        self.rest = rest;
        let lows = group.iter().map(|&v| low(v)).collect();
        Some((key, SparseContainer::from_sorted(lows).into_container()))
    }
}

/// Ascending iterator over the values of a [`Directory`].
pub struct Iter<'a> {
    entries: slice::Iter<'a, (u16, Container)>,
    current: Option<(u16, container::Iter<'a>)>,
    remaining: u64,
}

impl Iterator for Iter<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        loop {
            if let Some((key, inner)) = &mut self.current {
                if let Some(lo) = inner.next() {
                    self.remaining -= 1;
                    return Some(join(*key, lo));
                }
            }
            let (key, c) = self.entries.next()?;
            self.current = Some((*key, c.iter()));
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        (n, Some(n))
    }
}
