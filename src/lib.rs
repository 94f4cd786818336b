//! # Roaring Bitmaps
//!
//! *Compressed sets of 32-bit integers with fast set algebra.*
//!
//! ## Intuition First
//!
//! Picture a filing cabinet with 65536 drawers, one for each possible value
//! of the top 16 bits of a number. A drawer with a handful of entries holds
//! a short sorted list. A drawer crammed with entries holds a checklist of
//! all 65536 possible slots with a tick per entry. Each drawer picks
//! whichever is smaller, and empty drawers are not stored at all.
//!
//! Set operations then go drawer by drawer: two lists merge like sorted
//! decks, two checklists combine a word at a time, and a list against a
//! checklist is a series of bit tests.
//!
//! ## The Problem
//!
//! A plain bitset over `u32` costs 512 MiB whatever it holds. A sorted
//! array costs 4 bytes per value and makes intersections of large sets
//! slow. Run-length bitmaps (WAH, EWAH, Concise) compress well but must be
//! decoded sequentially, so random access and lopsided intersections
//! suffer.
//!
//! ## Historical Context
//!
//! ```text
//! 1998  Antoshenkov  BBC: byte-aligned run-length bitmap compression
//! 2002  Wu et al.    WAH: word-aligned hybrid, the CPU-friendly variant
//! 2010  Lemire       EWAH, Concise: run-length bitmaps for indexes
//! 2016  Chambi       Roaring: two-level, per-chunk adaptive containers
//! 2016  Muła et al.  Harley-Seal popcount with AVX2
//! 2018  Lemire       Roaring with run containers; the portable format
//! ```
//!
//! ## Mathematical Formulation
//!
//! A value $v \in [0, 2^{32})$ splits into a key $h = \lfloor v / 2^{16}
//! \rfloor$ and a low part $\ell = v \bmod 2^{16}$. The set $S$ is stored as
//! the family $\{(h, C_h) : C_h \neq \emptyset\}$ with
//! $C_h = \{\ell : (h, \ell) \in S\}$.
//!
//! A container of cardinality $c$ costs $2c$ bytes as an array and 8192
//! bytes as a bitset, so the layout switches at $c = 4096$
//! ([`container::SPARSE_MAX`]).
//!
//! ## Complexity Analysis
//!
//! - `contains`: $O(\log k + \log c)$ for $k$ containers.
//! - Array-array union / intersection: $O(n + m)$; intersection gallops
//!   when one side is 64 times longer, $O(n \log(m/n))$.
//! - Bitset-bitset operations: 1024 word operations plus a popcount.
//! - **Space**: at most $2$ bytes per value plus 8 bytes per container.
//!
//! ## What Could Go Wrong
//!
//! 1. **Complement blow-up**: `!x` of a small set holds nearly $2^{32}$
//!    values. Full containers share one static block, so the cost is per
//!    key rather than per value, but it is still 65536 containers.
//! 2. **Layout drift**: every operation must renormalize its result, or
//!    structural equality would stop meaning set equality.
//! 3. **Untrusted bytes**: the serialized form is validated in full before
//!    a bitmap is handed out.
//!
//! ## Implementation Notes
//!
//! This crate provides:
//! - **[`RoaringBitmap`]**: the set, its operators and serialization.
//! - **[`Container`]**: the per-key sparse / dense layouts.
//! - **[`Directory`]**: the sorted key index and its merge-join.
//! - **[`BlockPool`]**: a bounded pool of aligned blocks that dense
//!   containers can be decoded into.
//! - **[`simd`]**: AVX2 popcount and word kernels, with scalar fallbacks in
//!   [`words`].
//!
//! ## References
//!
//! - Chambi, S., Lemire, D., et al. (2016). "Better bitmap performance with
//!   Roaring bitmaps."
//! - Lemire, D., et al. (2018). "Roaring Bitmaps: Implementation of an
//!   Optimized Software Library."
//! - Muła, W., Kurz, N., & Lemire, D. (2018). "Faster Population Counts
//!   Using AVX2 Instructions."

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod array_ops;
pub mod bitmap;
pub mod block;
pub mod container;
pub mod directory;
pub mod error;
pub mod format;
pub mod pool;
pub mod simd;
pub mod words;

pub use bitmap::RoaringBitmap;
pub use block::Block;
pub use container::{Container, DenseContainer, SparseContainer};
pub use directory::Directory;
pub use error::{Error, Result};
pub use pool::{BlockPool, PoolConfig, PooledBlock};
pub use words::BitOp;
