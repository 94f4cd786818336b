//! Vectorized population count and word-array boolean kernels.
//!
//! # Population count
//!
//! Short arrays are counted one word at a time with the hardware `popcnt`.
//! Long arrays on AVX2 hardware use the Harley-Seal carry-save-adder
//! reduction (Muła, Kurz, Lemire, "Faster Population Counts Using AVX2
//! Instructions", 2016): sixteen 256-bit vectors are folded per step into
//! running sums of weight 1, 2, 4, 8 and 16, and only the weight-16 sum is
//! population-counted inside the loop. The per-lane count uses a 4-bit
//! lookup table through `vpshufb` followed by `vpsadbw`.
//!
//! # Boolean kernels
//!
//! `dst op= src` over word arrays, four words (one 256-bit lane) per step.
//! [`Block`] operands are always 32-byte aligned and take the aligned
//! load/store path directly. Arbitrary slices are checked once: if both
//! start at the same offset from a vector boundary, a short scalar head
//! brings them onto the boundary and the aligned path handles the rest;
//! otherwise unaligned loads are used.
//!
//! Every kernel here is a performance substitution for the scalar kernel of
//! the same name in [`crate::words`], and must return identical results.

use std::sync::OnceLock;

use crate::block::Block;
use crate::words::{self, BitOp};

/// Arrays shorter than this are counted word by word.
pub const HARLEY_SEAL_MIN_WORDS: usize = 256;

/// Which kernel family the current CPU runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Portable scalar kernels.
    Scalar,
    /// AVX2 kernels (x86_64 only).
    Avx2,
}

/// The backend selected for this process, detected once.
pub fn backend() -> Backend {
    static BACKEND: OnceLock<Backend> = OnceLock::new();
    *BACKEND.get_or_init(|| {
        let backend = detect();
        log::trace!("roaring kernels using {:?} backend", backend);
        backend
    })
}

#[cfg(target_arch = "x86_64")]
fn detect() -> Backend {
    if is_x86_feature_detected!("avx2") {
        Backend::Avx2
    } else {
        Backend::Scalar
    }
}

#[cfg(not(target_arch = "x86_64"))]
fn detect() -> Backend {
    Backend::Scalar
}

/// Number of set bits across `words`.
pub fn popcount(words: &[u64]) -> u64 {
    if words.len() < HARLEY_SEAL_MIN_WORDS {
        return words::popcount(words);
    }
    match backend() {
        #[cfg(target_arch = "x86_64")]
        Backend::Avx2 => {
            // SAFETY: the backend is only Avx2 when the CPU reports AVX2.
            let count = unsafe { x86::popcount_harley_seal(words) };
            debug_assert_eq!(
                count,
                words::popcount(words),
                "Harley-Seal popcount disagrees with scalar popcount"
            );
            count
        }
        _ => words::popcount(words),
    }
}

/// `dst[i] = dst[i] op src[i]` over two blocks, aligned path.
pub fn combine_blocks(op: BitOp, dst: &mut Block, src: &Block) {
    match backend() {
        #[cfg(target_arch = "x86_64")]
        // SAFETY: AVX2 is present and both blocks are 32-byte aligned by type.
        Backend::Avx2 => unsafe { x86::combine_aligned(op, &mut dst[..], &src[..]) },
        _ => words::combine_into(op, &mut dst[..], &src[..]),
    }
}

/// `dst[i] = dst[i] op src[i]` over arbitrary slices.
///
/// # Panics
///
/// Panics if the slices differ in length.
pub fn combine_into(op: BitOp, dst: &mut [u64], src: &[u64]) {
    assert_eq!(dst.len(), src.len(), "word arrays differ in length");
    match backend() {
        #[cfg(target_arch = "x86_64")]
        // SAFETY: AVX2 is present; alignment is checked before aligned access.
        Backend::Avx2 => unsafe { x86::combine_any(op, dst, src) },
        _ => words::combine_into(op, dst, src),
    }
}

/// Word-wise equality of two blocks.
pub fn blocks_equal(a: &Block, b: &Block) -> bool {
    match backend() {
        #[cfg(target_arch = "x86_64")]
        // SAFETY: AVX2 is present and both blocks are 32-byte aligned by type.
        Backend::Avx2 => unsafe { x86::equal_aligned(&a[..], &b[..]) },
        _ => words::equal(&a[..], &b[..]),
    }
}

#[cfg(target_arch = "x86_64")]
mod x86 {
    use std::arch::x86_64::*;

    use crate::block::BLOCK_ALIGN;
    use crate::words::BitOp;

    const LANE_WORDS: usize = 4;

    /// Carry-save adder: returns `(carry, sum)` of `a + b + c` per bit.
    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn csa(a: __m256i, b: __m256i, c: __m256i) -> (__m256i, __m256i) {
        let u = _mm256_xor_si256(a, b);
        let high = _mm256_or_si256(_mm256_and_si256(a, b), _mm256_and_si256(u, c));
        let low = _mm256_xor_si256(u, c);
        (high, low)
    }

    /// Per-64-bit-lane population count via nibble lookup.
    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn count_lanes(v: __m256i) -> __m256i {
        let lookup = _mm256_setr_epi8(
            0, 1, 1, 2, 1, 2, 2, 3, 1, 2, 2, 3, 2, 3, 3, 4, //
            0, 1, 1, 2, 1, 2, 2, 3, 1, 2, 2, 3, 2, 3, 3, 4,
        );
        let low_mask = _mm256_set1_epi8(0x0f);
        let lo = _mm256_and_si256(v, low_mask);
        let hi = _mm256_and_si256(_mm256_srli_epi32::<4>(v), low_mask);
        let counts = _mm256_add_epi8(
            _mm256_shuffle_epi8(lookup, lo),
            _mm256_shuffle_epi8(lookup, hi),
        );
        _mm256_sad_epu8(counts, _mm256_setzero_si256())
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn horizontal_sum(v: __m256i) -> u64 {
        let mut lanes = [0u64; LANE_WORDS];
        _mm256_storeu_si256(lanes.as_mut_ptr() as *mut __m256i, v);
        lanes.iter().sum()
    }

    #[target_feature(enable = "avx2")]
    pub(super) unsafe fn popcount_harley_seal(words: &[u64]) -> u64 {
        let vectors = words.len() / LANE_WORDS;
        let data = words.as_ptr() as *const __m256i;
        macro_rules! load {
            ($i:expr) => {
                _mm256_loadu_si256(data.add($i))
            };
        }

        let zero = _mm256_setzero_si256();
        let mut total = zero;
        let mut ones = zero;
        let mut twos = zero;
        let mut fours = zero;
        let mut eights = zero;

        let limit = vectors - vectors % 16;
        let mut i = 0;
        while i < limit {
            let (twos_a, o) = csa(ones, load!(i), load!(i + 1));
            let (twos_b, o) = csa(o, load!(i + 2), load!(i + 3));
            let (fours_a, t) = csa(twos, twos_a, twos_b);
            let (twos_a, o) = csa(o, load!(i + 4), load!(i + 5));
            let (twos_b, o) = csa(o, load!(i + 6), load!(i + 7));
            let (fours_b, t) = csa(t, twos_a, twos_b);
            let (eights_a, f) = csa(fours, fours_a, fours_b);

            let (twos_a, o) = csa(o, load!(i + 8), load!(i + 9));
            let (twos_b, o) = csa(o, load!(i + 10), load!(i + 11));
            let (fours_a, t) = csa(t, twos_a, twos_b);
            let (twos_a, o) = csa(o, load!(i + 12), load!(i + 13));
            let (twos_b, o) = csa(o, load!(i + 14), load!(i + 15));
            let (fours_b, t) = csa(t, twos_a, twos_b);
            let (eights_b, f) = csa(f, fours_a, fours_b);

            let (sixteens, e) = csa(eights, eights_a, eights_b);
            total = _mm256_add_epi64(total, count_lanes(sixteens));

            ones = o;
            twos = t;
            fours = f;
            eights = e;
            i += 16;
        }

        total = _mm256_slli_epi64::<4>(total);
        total = _mm256_add_epi64(total, _mm256_slli_epi64::<3>(count_lanes(eights)));
        total = _mm256_add_epi64(total, _mm256_slli_epi64::<2>(count_lanes(fours)));
        total = _mm256_add_epi64(total, _mm256_slli_epi64::<1>(count_lanes(twos)));
        total = _mm256_add_epi64(total, count_lanes(ones));
        while i < vectors {
            total = _mm256_add_epi64(total, count_lanes(load!(i)));
            i += 1;
        }

        let tail: u64 = words[vectors * LANE_WORDS..]
            .iter()
            .map(|w| u64::from(w.count_ones()))
            .sum();
        horizontal_sum(total) + tail
    }

    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn apply(op: BitOp, a: __m256i, b: __m256i) -> __m256i {
        match op {
            BitOp::And => _mm256_and_si256(a, b),
            BitOp::Or => _mm256_or_si256(a, b),
            BitOp::Xor => _mm256_xor_si256(a, b),
            // andnot computes `!first & second`
            BitOp::AndNot => _mm256_andnot_si256(b, a),
        }
    }

    /// Both slices must start on a 32-byte boundary.
    #[target_feature(enable = "avx2")]
    pub(super) unsafe fn combine_aligned(op: BitOp, dst: &mut [u64], src: &[u64]) {
        debug_assert_eq!(dst.as_ptr() as usize % BLOCK_ALIGN, 0);
        debug_assert_eq!(src.as_ptr() as usize % BLOCK_ALIGN, 0);
        let vectors = dst.len() / LANE_WORDS;
        let d = dst.as_mut_ptr() as *mut __m256i;
        let s = src.as_ptr() as *const __m256i;
        for i in 0..vectors {
            let v = apply(op, _mm256_load_si256(d.add(i)), _mm256_load_si256(s.add(i)));
            _mm256_store_si256(d.add(i), v);
        }
        for k in vectors * LANE_WORDS..dst.len() {
            dst[k] = op.apply(dst[k], src[k]);
        }
    }

    #[target_feature(enable = "avx2")]
    unsafe fn combine_unaligned(op: BitOp, dst: &mut [u64], src: &[u64]) {
        let vectors = dst.len() / LANE_WORDS;
        let d = dst.as_mut_ptr() as *mut __m256i;
        let s = src.as_ptr() as *const __m256i;
        for i in 0..vectors {
            let v = apply(op, _mm256_loadu_si256(d.add(i)), _mm256_loadu_si256(s.add(i)));
            _mm256_storeu_si256(d.add(i), v);
        }
        for k in vectors * LANE_WORDS..dst.len() {
            dst[k] = op.apply(dst[k], src[k]);
        }
    }

    #[target_feature(enable = "avx2")]
    pub(super) unsafe fn combine_any(op: BitOp, dst: &mut [u64], src: &[u64]) {
        let dst_offset = dst.as_ptr() as usize % BLOCK_ALIGN;
        let src_offset = src.as_ptr() as usize % BLOCK_ALIGN;
        if dst_offset != src_offset {
            combine_unaligned(op, dst, src);
            return;
        }

        // u64 slices sit on 8-byte boundaries, so the head is 0..=3 words.
        let head = ((BLOCK_ALIGN - dst_offset) % BLOCK_ALIGN / 8).min(dst.len());
        for k in 0..head {
            dst[k] = op.apply(dst[k], src[k]);
        }
        if head == dst.len() {
            return;
        }
        combine_aligned(op, &mut dst[head..], &src[head..]);
    }

    /// Both slices must start on a 32-byte boundary and have equal length.
    #[target_feature(enable = "avx2")]
    pub(super) unsafe fn equal_aligned(a: &[u64], b: &[u64]) -> bool {
        if a.len() != b.len() {
            return false;
        }
        let vectors = a.len() / LANE_WORDS;
        let pa = a.as_ptr() as *const __m256i;
        let pb = b.as_ptr() as *const __m256i;
        for i in 0..vectors {
            let eq = _mm256_cmpeq_epi64(_mm256_load_si256(pa.add(i)), _mm256_load_si256(pb.add(i)));
            if _mm256_movemask_epi8(eq) != -1 {
                return false;
            }
        }
        a[vectors * LANE_WORDS..] == b[vectors * LANE_WORDS..]
    }
}
