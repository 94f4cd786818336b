//! Scalar word-array kernels.
//!
//! These are the reference semantics for every dense-container operation.
//! The vectorized versions in [`crate::simd`] must agree with them bit for
//! bit; the property tests check that they do.

/// A binary set operator.
///
/// The same four operators are used at every level of the structure: on
/// single words, on word arrays, on containers and on whole directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitOp {
    /// Intersection: `a & b`.
    And,
    /// Union: `a | b`.
    Or,
    /// Symmetric difference: `a ^ b`.
    Xor,
    /// Difference: `a & !b`.
    AndNot,
}

impl BitOp {
    /// All four operators, in declaration order.
    pub const ALL: [BitOp; 4] = [BitOp::And, BitOp::Or, BitOp::Xor, BitOp::AndNot];

    /// Apply the operator to a pair of words.
    #[inline]
    pub fn apply(self, a: u64, b: u64) -> u64 {
        match self {
            BitOp::And => a & b,
            BitOp::Or => a | b,
            BitOp::Xor => a ^ b,
            BitOp::AndNot => a & !b,
        }
    }

    /// True if elements present only in the left operand survive.
    #[inline]
    pub fn keeps_left_only(self) -> bool {
        !matches!(self, BitOp::And)
    }

    /// True if elements present only in the right operand survive.
    #[inline]
    pub fn keeps_right_only(self) -> bool {
        matches!(self, BitOp::Or | BitOp::Xor)
    }
}

/// Number of set bits across `words`, one hardware popcount per word.
pub fn popcount(words: &[u64]) -> u64 {
    words.iter().map(|w| u64::from(w.count_ones())).sum()
}

/// `dst[i] = dst[i] op src[i]` for every word.
///
/// # Panics
///
/// Panics if the slices differ in length.
pub fn combine_into(op: BitOp, dst: &mut [u64], src: &[u64]) {
    assert_eq!(dst.len(), src.len(), "word arrays differ in length");
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = op.apply(*d, s);
    }
}

/// Flip every bit of `words`.
pub fn negate(words: &mut [u64]) {
    for w in words.iter_mut() {
        *w = !*w;
    }
}

/// Set bits `[start, end)` of the bit vector stored in `words`.
///
/// # Panics
///
/// Panics if `end` exceeds the bit length of `words`.
pub fn set_range(words: &mut [u64], start: usize, end: usize) {
    if start >= end {
        return;
    }
    assert!(end <= words.len() * 64, "bit range out of bounds");

    let first = start / 64;
    let last = (end - 1) / 64;
    let head_mask = !0u64 << (start % 64);
    let tail_mask = !0u64 >> (63 - (end - 1) % 64);

    if first == last {
        words[first] |= head_mask & tail_mask;
        return;
    }
    words[first] |= head_mask;
    for w in &mut words[first + 1..last] {
        *w = !0;
    }
    words[last] |= tail_mask;
}

/// Word-wise equality.
pub fn equal(a: &[u64], b: &[u64]) -> bool {
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitop_truth_table() {
        let (a, b) = (0b1100u64, 0b1010u64);
        assert_eq!(BitOp::And.apply(a, b), 0b1000);
        assert_eq!(BitOp::Or.apply(a, b), 0b1110);
        assert_eq!(BitOp::Xor.apply(a, b), 0b0110);
        assert_eq!(BitOp::AndNot.apply(a, b), 0b0100);
    }

    #[test]
    fn test_bitop_side_retention() {
        assert!(!BitOp::And.keeps_left_only());
        assert!(!BitOp::And.keeps_right_only());
        assert!(BitOp::Or.keeps_left_only() && BitOp::Or.keeps_right_only());
        assert!(BitOp::Xor.keeps_left_only() && BitOp::Xor.keeps_right_only());
        assert!(BitOp::AndNot.keeps_left_only());
        assert!(!BitOp::AndNot.keeps_right_only());
    }

    #[test]
    fn test_popcount_and_combine() {
        let mut a = vec![u64::MAX, 0, 0b1011];
        let b = vec![0xFF, 0xF0, 0b0001];
        assert_eq!(popcount(&a), 67);
        combine_into(BitOp::And, &mut a, &b);
        assert_eq!(a, vec![0xFF, 0, 0b0001]);
        negate(&mut a);
        assert_eq!(popcount(&a), 3 * 64 - 9);
    }

    #[test]
    fn test_set_range_edges() {
        let mut w = vec![0u64; 3];
        set_range(&mut w, 3, 3);
        assert_eq!(popcount(&w), 0);

        set_range(&mut w, 60, 130);
        assert_eq!(popcount(&w), 70);
        assert_eq!(w[0], 0xF000_0000_0000_0000);
        assert_eq!(w[1], u64::MAX);
        assert_eq!(w[2], 0b11);

        let mut full = vec![0u64; 2];
        set_range(&mut full, 0, 128);
        assert_eq!(full, vec![u64::MAX; 2]);

        let mut one = vec![0u64; 1];
        set_range(&mut one, 5, 6);
        assert_eq!(one[0], 1 << 5);
    }
}
