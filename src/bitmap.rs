//! The user-facing compressed bitmap.

use std::fmt;
use std::io::{Read, Write};
use std::ops::{
    BitAnd, BitAndAssign, BitOr, BitOrAssign, BitXor, BitXorAssign, Bound, Not, RangeBounds, Sub,
    SubAssign,
};

use crate::container::Container;
use crate::directory::{self, Directory, KeyGroups};
use crate::error::{Error, Result};
use crate::format;
use crate::pool::BlockPool;
use crate::words::BitOp;

/// A compressed set of `u32` values.
///
/// Values are grouped by their high 16 bits; each group is stored in a
/// [`Container`] that is either a sorted array or a 65536-bit vector,
/// whichever is smaller for its cardinality.
///
/// # Example
///
/// ```
/// use roarbits::RoaringBitmap;
///
/// let a: RoaringBitmap = [1, 3, 5, 100_000].into_iter().collect();
/// let b = RoaringBitmap::from_range(0..4);
///
/// assert_eq!((&a & &b).iter().collect::<Vec<_>>(), vec![1, 3]);
/// assert_eq!((&a | &b).cardinality(), 6);
///
/// let bytes = a.to_bytes();
/// assert_eq!(RoaringBitmap::from_bytes(&bytes).unwrap(), a);
/// ```
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct RoaringBitmap {
    directory: Directory,
}

impl RoaringBitmap {
    /// Create an empty bitmap.
    pub fn new() -> Self {
        Self {
            directory: Directory::new(),
        }
    }

    /// A bitmap holding exactly `value`.
    pub fn singleton(value: u32) -> Self {
        let mut bitmap = Self::new();
        bitmap.add(value);
        bitmap
    }

    /// Build from values in any order; duplicates are ignored.
    pub fn from_values<I: IntoIterator<Item = u32>>(values: I) -> Self {
        let sorted = sorted_distinct(values);
        Self {
            directory: Directory::from_sorted_values(&sorted),
        }
    }

    /// A bitmap holding every value in `range`.
    pub fn from_range<R: RangeBounds<u32>>(range: R) -> Self {
        let start = match range.start_bound() {
            Bound::Included(&s) => u64::from(s),
            Bound::Excluded(&s) => u64::from(s) + 1,
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&e) => u64::from(e) + 1,
            Bound::Excluded(&e) => u64::from(e),
            Bound::Unbounded => 1 << 32,
        };

        let mut directory = Directory::new();
        let mut lo = start;
        while lo < end {
            let key_start = lo & !0xFFFF;
            let key_end = (key_start + (1 << 16)).min(end);
            let container =
                Container::from_range((lo - key_start) as u32, (key_end - key_start) as u32);
            directory.push((lo >> 16) as u16, container);
            lo = key_end;
        }
        Self { directory }
    }

    /// Wrap an existing directory.
    pub fn from_directory(directory: Directory) -> Self {
        Self { directory }
    }

    /// The underlying directory.
    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Number of values in the set.
    #[inline]
    pub fn cardinality(&self) -> u64 {
        self.directory.cardinality()
    }

    /// Alias for [`RoaringBitmap::cardinality`].
    #[inline]
    pub fn len(&self) -> u64 {
        self.cardinality()
    }

    /// True if the set is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.directory.is_empty()
    }

    /// Membership test.
    #[inline]
    pub fn contains(&self, value: u32) -> bool {
        self.directory.contains(value)
    }

    /// Ascending iterator over the values.
    pub fn iter(&self) -> directory::Iter<'_> {
        self.directory.iter()
    }

    /// Smallest value.
    pub fn min(&self) -> Option<u32> {
        self.directory.min()
    }

    /// Largest value.
    pub fn max(&self) -> Option<u32> {
        self.directory.max()
    }

    /// Number of containers (distinct high keys).
    pub fn container_count(&self) -> usize {
        self.directory.len()
    }

    /// The `(key, container)` pairs in key order.
    pub fn containers(&self) -> impl Iterator<Item = (u16, &Container)> + '_ {
        self.directory.entries().iter().map(|(k, c)| (*k, c))
    }

    fn combine(&self, op: BitOp, other: &RoaringBitmap) -> RoaringBitmap {
        Self {
            directory: self.directory.merge(op, &other.directory),
        }
    }

    /// Intersection.
    #[must_use]
    pub fn and(&self, other: &RoaringBitmap) -> RoaringBitmap {
        self.combine(BitOp::And, other)
    }

    /// Union.
    #[must_use]
    pub fn or(&self, other: &RoaringBitmap) -> RoaringBitmap {
        self.combine(BitOp::Or, other)
    }

    /// Symmetric difference.
    #[must_use]
    pub fn xor(&self, other: &RoaringBitmap) -> RoaringBitmap {
        self.combine(BitOp::Xor, other)
    }

    /// Values of `self` not in `other`.
    #[must_use]
    pub fn and_not(&self, other: &RoaringBitmap) -> RoaringBitmap {
        self.combine(BitOp::AndNot, other)
    }

    /// Complement over the whole `u32` universe.
    ///
    /// The result of complementing a small set is very large: every key
    /// the set does not touch becomes a full container.
    #[must_use]
    pub fn not(&self) -> RoaringBitmap {
        Self {
            directory: self.directory.not(),
        }
    }

    /// Union of any number of bitmaps.
    pub fn union_all<'a, I>(bitmaps: I) -> RoaringBitmap
    where
        I: IntoIterator<Item = &'a RoaringBitmap>,
    {
        Self {
            directory: Directory::union_all(bitmaps.into_iter().map(|b| &b.directory)),
        }
    }

    /// Insert `value`, returning true if it was absent.
    pub fn add(&mut self, value: u32) -> bool {
        self.directory.insert_value(value)
    }

    /// Insert many values; each affected container is updated once.
    pub fn add_many<I: IntoIterator<Item = u32>>(&mut self, values: I) {
        let sorted = sorted_distinct(values);
        for (key, group) in KeyGroups::new(&sorted) {
            self.directory.or_group(key, &group);
        }
    }

    /// Remove `value`, returning true if it was present.
    pub fn remove(&mut self, value: u32) -> bool {
        self.directory.remove_value(value)
    }

    /// Remove many values; each affected container is updated once.
    pub fn remove_many<I: IntoIterator<Item = u32>>(&mut self, values: I) {
        let sorted = sorted_distinct(values);
        for (key, group) in KeyGroups::new(&sorted) {
            self.directory.and_not_group(key, &group);
        }
    }

    /// A copy with every container in its preferred layout.
    #[must_use]
    pub fn optimize(&self) -> RoaringBitmap {
        let mut directory = self.directory.clone();
        directory.optimize();
        Self { directory }
    }

    /// Exact size of the serialized form, in bytes.
    pub fn serialized_size(&self) -> usize {
        format::serialized_size(&self.directory)
    }

    /// Write the portable serialized form, returning the bytes written.
    pub fn serialize<W: Write>(&self, writer: W) -> Result<usize> {
        format::serialize(&self.directory, writer)
    }

    /// Serialize into a byte vector.
    pub fn to_bytes(&self) -> Vec<u8> {
        format::to_vec(&self.directory)
    }

    /// Read one bitmap from `reader`, leaving any following bytes unread.
    pub fn deserialize<R: Read>(reader: R) -> Result<Self> {
        format::deserialize(reader, None).map(Self::from_directory)
    }

    /// Read one bitmap, placing dense containers in blocks rented from
    /// `pool`. The blocks return to the pool when the bitmap is dropped.
    pub fn deserialize_with_pool<R: Read>(reader: R, pool: &BlockPool) -> Result<Self> {
        format::deserialize(reader, Some(pool)).map(Self::from_directory)
    }

    /// Decode a bitmap that occupies all of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut rest = bytes;
        let directory = format::deserialize(&mut rest, None)?;
        if !rest.is_empty() {
            return Err(Error::TrailingBytes(rest.len()));
        }
        Ok(Self { directory })
    }

    /// Approximate heap memory usage in bytes.
    pub fn heap_bytes(&self) -> usize {
        self.directory.heap_bytes()
    }
}

fn sorted_distinct<I: IntoIterator<Item = u32>>(values: I) -> Vec<u32> {
    let mut sorted: Vec<u32> = values.into_iter().collect();
    sorted.sort_unstable();
    sorted.dedup();
    sorted
}

impl fmt::Debug for RoaringBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoaringBitmap")
            .field("cardinality", &self.cardinality())
            .field("containers", &self.container_count())
            .field("min", &self.min())
            .field("max", &self.max())
            .finish()
    }
}

impl FromIterator<u32> for RoaringBitmap {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self::from_values(iter)
    }
}

impl<'a> FromIterator<&'a u32> for RoaringBitmap {
    fn from_iter<I: IntoIterator<Item = &'a u32>>(iter: I) -> Self {
        Self::from_values(iter.into_iter().copied())
    }
}

impl Extend<u32> for RoaringBitmap {
    fn extend<I: IntoIterator<Item = u32>>(&mut self, iter: I) {
        self.add_many(iter);
    }
}

impl<'a> Extend<&'a u32> for RoaringBitmap {
    fn extend<I: IntoIterator<Item = &'a u32>>(&mut self, iter: I) {
        self.add_many(iter.into_iter().copied());
    }
}

impl<'a> IntoIterator for &'a RoaringBitmap {
    type Item = u32;
    type IntoIter = directory::Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $assign_trait:ident, $assign_method:ident, $op:expr) => {
        impl $trait<&RoaringBitmap> for &RoaringBitmap {
            type Output = RoaringBitmap;

            fn $method(self, rhs: &RoaringBitmap) -> RoaringBitmap {
                self.combine($op, rhs)
            }
        }

        impl $trait<RoaringBitmap> for &RoaringBitmap {
            type Output = RoaringBitmap;

            fn $method(self, rhs: RoaringBitmap) -> RoaringBitmap {
                self.combine($op, &rhs)
            }
        }

        impl $trait<&RoaringBitmap> for RoaringBitmap {
            type Output = RoaringBitmap;

            fn $method(self, rhs: &RoaringBitmap) -> RoaringBitmap {
                self.combine($op, rhs)
            }
        }

        impl $trait<RoaringBitmap> for RoaringBitmap {
            type Output = RoaringBitmap;

            fn $method(self, rhs: RoaringBitmap) -> RoaringBitmap {
                self.combine($op, &rhs)
            }
        }

        impl $assign_trait<&RoaringBitmap> for RoaringBitmap {
            fn $assign_method(&mut self, rhs: &RoaringBitmap) {
                *self = self.combine($op, rhs);
            }
        }

        impl $assign_trait<RoaringBitmap> for RoaringBitmap {
            fn $assign_method(&mut self, rhs: RoaringBitmap) {
                *self = self.combine($op, &rhs);
            }
        }
    };
}

impl_binary_op!(BitAnd, bitand, BitAndAssign, bitand_assign, BitOp::And);
impl_binary_op!(BitOr, bitor, BitOrAssign, bitor_assign, BitOp::Or);
impl_binary_op!(BitXor, bitxor, BitXorAssign, bitxor_assign, BitOp::Xor);
impl_binary_op!(Sub, sub, SubAssign, sub_assign, BitOp::AndNot);

impl Not for &RoaringBitmap {
    type Output = RoaringBitmap;

    fn not(self) -> RoaringBitmap {
        RoaringBitmap::not(self)
    }
}

impl Not for RoaringBitmap {
    type Output = RoaringBitmap;

    fn not(self) -> RoaringBitmap {
        RoaringBitmap::not(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_remove() {
        let mut b = RoaringBitmap::new();
        assert!(b.add(10));
        assert!(b.add(1 << 20));
        assert!(!b.add(10));
        assert_eq!(b.cardinality(), 2);
        assert!(b.remove(10));
        assert!(!b.remove(10));
        assert_eq!(b.iter().collect::<Vec<_>>(), vec![1 << 20]);
        assert_eq!(b.container_count(), 1);
    }

    #[test]
    fn test_from_range_bounds() {
        assert_eq!(RoaringBitmap::from_range(5..5).cardinality(), 0);
        assert_eq!(RoaringBitmap::from_range(5..=5).cardinality(), 1);
        let r = RoaringBitmap::from_range(65_000..140_000);
        assert_eq!(r.cardinality(), 75_000);
        assert_eq!(r.container_count(), 3);
        assert_eq!(r.min(), Some(65_000));
        assert_eq!(r.max(), Some(139_999));
        assert!(r.directory().is_valid());

        let top = RoaringBitmap::from_range(u32::MAX - 1..);
        assert_eq!(top.iter().collect::<Vec<_>>(), vec![u32::MAX - 1, u32::MAX]);
    }

    #[test]
    fn test_add_many_remove_many() {
        let mut b = RoaringBitmap::from_range(0..4000);
        b.add_many([5000, 4001, 70_000, 4001, 3]);
        assert_eq!(b.cardinality(), 4003);

        b.add_many(4000..10_000);
        assert_eq!(b.cardinality(), 10_001);
        assert!(b.containers().next().is_some_and(|(_, c)| c.is_dense()));

        b.remove_many(0..9_000);
        assert_eq!(b.cardinality(), 1001);
        assert!(b.containers().next().is_some_and(|(_, c)| c.is_sparse()));

        b.remove_many([70_000]);
        assert_eq!(b.container_count(), 1);
        assert!(b.directory().is_valid());
    }

    #[test]
    fn test_operator_forms_agree() {
        let a = RoaringBitmap::from_values([1, 2, 3, 70_000]);
        let b = RoaringBitmap::from_values([2, 3, 4, 80_000]);

        assert_eq!(&a & &b, a.and(&b));
        assert_eq!(a.clone() | b.clone(), a.or(&b));
        assert_eq!(&a ^ b.clone(), a.xor(&b));
        assert_eq!(a.clone() - &b, a.and_not(&b));

        let mut c = a.clone();
        c |= &b;
        c -= &a;
        assert_eq!(c, b.and_not(&a));
        c ^= b.clone();
        c &= &a;
        assert_eq!(c.iter().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_from_bytes_rejects_trailing() {
        let b = RoaringBitmap::from_values([1, 2, 3]);
        let mut bytes = b.to_bytes();
        assert_eq!(bytes.len(), b.serialized_size());
        assert_eq!(RoaringBitmap::from_bytes(&bytes).unwrap(), b);
        bytes.push(0);
        assert!(matches!(
            RoaringBitmap::from_bytes(&bytes),
            Err(Error::TrailingBytes(1))
        ));
        assert_eq!(RoaringBitmap::deserialize(bytes.as_slice()).unwrap(), b);
    }

    #[test]
    fn test_debug_summary() {
        let b = RoaringBitmap::from_values([7, 9]);
        let s = format!("{b:?}");
        assert!(s.contains("cardinality: 2"));
        assert!(s.contains("containers: 1"));
    }
}
