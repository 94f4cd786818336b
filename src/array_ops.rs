//! Merge kernels over ascending, duplicate-free `u16` arrays.
//!
//! All four set operators are two-pointer merges, $O(n + m)$. Intersection
//! switches to a one-sided galloping search when one side is at least
//! [`GALLOP_RATIO`] times longer than the other: the short side drives, and
//! the long side is skipped forward with [`advance_until`], for
//! $O(n \log(m/n))$ behaviour.

/// Length ratio at which intersection gallops over the longer array.
pub const GALLOP_RATIO: usize = 64;

/// Return the smallest index `> pos` whose element is `>= min`, or
/// `array.len()` if there is none.
///
/// The element right after `pos` is checked before binary searching the
/// rest, since while galloping the next hit is usually adjacent.
#[inline]
pub fn advance_until(array: &[u16], pos: usize, min: u16) -> usize {
    let start = pos + 1;
    if start >= array.len() || array[start] >= min {
        return start.min(array.len());
    }
    start + array[start..].partition_point(|&v| v < min)
}

/// Union of two sorted arrays.
pub fn union(a: &[u16], b: &[u16]) -> Vec<u16> {
    if a.is_empty() {
        return b.to_vec();
    }
    if b.is_empty() {
        return a.to_vec();
    }

    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let (x, y) = (a[i], b[j]);
        if x < y {
            out.push(x);
            i += 1;
        } else if y < x {
            out.push(y);
            j += 1;
        } else {
            out.push(x);
            i += 1;
            j += 1;
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

/// Intersection of two sorted arrays, galloping when sizes are lopsided.
pub fn intersect(a: &[u16], b: &[u16]) -> Vec<u16> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    if b.len() >= a.len().saturating_mul(GALLOP_RATIO) {
        return intersect_galloping(a, b);
    }
    if a.len() >= b.len().saturating_mul(GALLOP_RATIO) {
        return intersect_galloping(b, a);
    }
    intersect_linear(a, b)
}

/// Two-pointer intersection.
pub fn intersect_linear(a: &[u16], b: &[u16]) -> Vec<u16> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let (x, y) = (a[i], b[j]);
        if x < y {
            i += 1;
        } else if y < x {
            j += 1;
        } else {
            out.push(x);
            i += 1;
            j += 1;
        }
    }
    out
}

/// Intersection driven by `small`, skipping through `large` with
/// [`advance_until`].
pub fn intersect_galloping(small: &[u16], large: &[u16]) -> Vec<u16> {
    let mut out = Vec::with_capacity(small.len());
    if small.is_empty() || large.is_empty() {
        return out;
    }

    let mut k = 0;
    for &s in small {
        if large[k] < s {
            k = advance_until(large, k, s);
            if k == large.len() {
                break;
            }
        }
        if large[k] == s {
            out.push(s);
        }
    }
    out
}

/// Elements of `a` not in `b`.
pub fn difference(a: &[u16], b: &[u16]) -> Vec<u16> {
    if a.is_empty() {
        return Vec::new();
    }
    if b.is_empty() {
        return a.to_vec();
    }

    let mut out = Vec::with_capacity(a.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let (x, y) = (a[i], b[j]);
        if x < y {
            out.push(x);
            i += 1;
        } else if y < x {
            j += 1;
        } else {
            i += 1;
            j += 1;
        }
    }
    out.extend_from_slice(&a[i..]);
    out
}

/// Elements in exactly one of `a` and `b`.
pub fn symmetric_difference(a: &[u16], b: &[u16]) -> Vec<u16> {
    if a.is_empty() {
        return b.to_vec();
    }
    if b.is_empty() {
        return a.to_vec();
    }

    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let (x, y) = (a[i], b[j]);
        if x < y {
            out.push(x);
            i += 1;
        } else if y < x {
            out.push(y);
            j += 1;
        } else {
            i += 1;
            j += 1;
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

/// True if `values` is strictly ascending.
pub fn is_strictly_ascending(values: &[u16]) -> bool {
    values.windows(2).all(|w| w[0] < w[1])
}
