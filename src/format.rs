//! The portable Roaring serialization format.
//!
//! Layout written (all integers little-endian):
//!
//! ```text
//! u32      cookie = 12346
//! u32      container count n
//! n x      { u16 key, u16 cardinality - 1 }
//! n x      u32 byte offset of the payload from the start of the stream
//! payloads in key order:
//!          cardinality <= 4096   cardinality x u16, ascending
//!          cardinality  > 4096   1024 x u64
//! ```
//!
//! The payload kind is implied by the cardinality; there is no tag.
//!
//! Reading also accepts the layout with run containers that other Roaring
//! implementations produce: the cookie is `12347 | (n - 1) << 16`, a
//! bitset of `ceil(n / 8)` bytes marks which containers are runs, and the
//! offset header is only present when `n >= 4`. A run payload is a `u16`
//! run count followed by `{u16 start, u16 length - 1}` pairs. Runs are
//! decoded straight into sparse or dense containers.
//!
//! Every read is validated; malformed input yields an [`Error`], never a
//! panic or an inconsistent bitmap.

use std::io::{self, Read, Write};

use crate::block::{Block, BLOCK_WORDS};
use crate::container::{Container, DenseContainer, SparseContainer, KEY_SPACE, SPARSE_MAX};
use crate::directory::Directory;
use crate::error::{Error, Result};
use crate::pool::BlockPool;
use crate::words;

/// Cookie of the layout without run containers.
pub const SERIAL_COOKIE_NO_RUNCONTAINER: u32 = 12346;

/// Low 16 bits of the cookie of the layout with run containers.
pub const SERIAL_COOKIE: u32 = 12347;

/// In the run layout, offsets are written only for at least this many
/// containers.
pub const NO_OFFSET_THRESHOLD: usize = 4;

/// Bytes before the per-container headers: cookie and count.
const HEADER_BYTES: usize = 8;

/// Bytes of header per container: key, cardinality and offset.
const PER_CONTAINER_HEADER_BYTES: usize = 8;

/// Exact number of bytes [`serialize`] writes for `directory`.
pub fn serialized_size(directory: &Directory) -> usize {
    HEADER_BYTES
        + directory
            .entries()
            .iter()
            .map(|(_, c)| PER_CONTAINER_HEADER_BYTES + c.serialized_size())
            .sum::<usize>()
}

/// Write `directory` to `writer`, returning the number of bytes written.
pub fn serialize<W: Write>(directory: &Directory, mut writer: W) -> Result<usize> {
    let mut buf = encode_header(directory);
    writer.write_all(&buf)?;
    let mut written = buf.len();
    for (_, c) in directory.entries() {
        buf.clear();
        encode_payload(c, &mut buf);
        writer.write_all(&buf)?;
        written += buf.len();
    }
    Ok(written)
}

/// Encode `directory` into a new byte vector.
pub fn to_vec(directory: &Directory) -> Vec<u8> {
    let mut out = encode_header(directory);
    out.reserve(serialized_size(directory) - out.len());
    for (_, c) in directory.entries() {
        encode_payload(c, &mut out);
    }
    out
}

/// Cookie, count, key/cardinality pairs and offsets.
fn encode_header(directory: &Directory) -> Vec<u8> {
    let entries = directory.entries();
    let n = entries.len();
    let mut header = Vec::with_capacity(HEADER_BYTES + n * PER_CONTAINER_HEADER_BYTES);
    header.extend_from_slice(&SERIAL_COOKIE_NO_RUNCONTAINER.to_le_bytes());
    header.extend_from_slice(&(n as u32).to_le_bytes());
    for (key, c) in entries {
        header.extend_from_slice(&key.to_le_bytes());
        header.extend_from_slice(&((c.cardinality() - 1) as u16).to_le_bytes());
    }
    let mut offset = HEADER_BYTES + n * PER_CONTAINER_HEADER_BYTES;
    for (_, c) in entries {
        header.extend_from_slice(&(offset as u32).to_le_bytes());
        offset += c.serialized_size();
    }
    header
}

fn encode_payload(container: &Container, out: &mut Vec<u8>) {
    match container {
        Container::Sparse(s) => out.extend(s.iter().flat_map(u16::to_le_bytes)),
        Container::Dense(d) => out.extend(d.words().iter().flat_map(|w| w.to_le_bytes())),
    }
}

/// Read one bitmap from `reader`.
///
/// Bytes after the bitmap are left unread. With a `pool`, dense containers
/// are decoded into blocks rented from it.
pub fn deserialize<R: Read>(reader: R, pool: Option<&BlockPool>) -> Result<Directory> {
    let mut src = Source::new(reader);

    let cookie = src.u32("cookie")?;
    let (n, run_flags, has_offsets) = if cookie == SERIAL_COOKIE_NO_RUNCONTAINER {
        let n = src.u32("container count")?;
        if n as usize > KEY_SPACE {
            return Err(Error::InvalidContainerCount(n));
        }
        (n as usize, Vec::new(), true)
    } else if cookie & 0xFFFF == SERIAL_COOKIE {
        let n = (cookie >> 16) as usize + 1;
        let mut flags = vec![0u8; n.div_ceil(8)];
        src.fill(&mut flags, "run flags")?;
        (n, flags, n >= NO_OFFSET_THRESHOLD)
    } else {
        return Err(Error::InvalidCookie(cookie));
    };

    let descriptors = src.u16_vec(2 * n, "key header")?;
    let mut headers: Vec<(u16, usize)> = Vec::with_capacity(n);
    for (index, pair) in descriptors.chunks_exact(2).enumerate() {
        let (key, cardinality) = (pair[0], usize::from(pair[1]) + 1);
        if let Some(&(previous, _)) = headers.last() {
            if key <= previous {
                return Err(Error::UnorderedKeys {
                    index,
                    previous,
                    key,
                });
            }
        }
        headers.push((key, cardinality));
    }

    let offsets: Vec<u32> = if has_offsets {
        let mut raw = vec![0u8; 4 * n];
        src.fill(&mut raw, "offset header")?;
        raw.chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    } else {
        Vec::new()
    };

    let mut directory = Directory::new();
    for (index, &(key, cardinality)) in headers.iter().enumerate() {
        if let Some(&expected) = offsets.get(index) {
            if u64::from(expected) != src.position {
                return Err(Error::OffsetMismatch {
                    index,
                    expected,
                    actual: src.position,
                });
            }
        }
        let is_run = run_flags
            .get(index / 8)
            .is_some_and(|byte| byte & (1 << (index % 8)) != 0);

        let container = if is_run {
            read_runs(&mut src, key, cardinality, pool)?
        } else if cardinality <= SPARSE_MAX {
            let values = src.u16_vec(cardinality, "sparse payload")?;
            let sparse =
                SparseContainer::try_from_sorted(values).ok_or(Error::UnsortedContainer(key))?;
            Container::Sparse(sparse)
        } else {
            let dense = build_dense(pool, |block| src.words(&mut block[..], "dense payload"))?;
            check_cardinality(key, cardinality, dense.cardinality())?;
            Container::Dense(dense)
        };
        directory.push(key, container);
    }

    log::debug!(
        "deserialized roaring bitmap: {} containers, {} values, {} layout",
        n,
        directory.cardinality(),
        if run_flags.is_empty() { "plain" } else { "run" }
    );
    Ok(directory)
}

fn read_runs<R: Read>(
    src: &mut Source<R>,
    key: u16,
    cardinality: usize,
    pool: Option<&BlockPool>,
) -> Result<Container> {
    let count = usize::from(src.u16("run count")?);
    let pairs = src.u16_vec(2 * count, "run payload")?;

    // Runs as half-open `start..end` ranges, ascending and disjoint.
    let mut runs = Vec::with_capacity(count);
    let mut next_free = 0usize;
    for pair in pairs.chunks_exact(2) {
        let start = usize::from(pair[0]);
        let end = start + usize::from(pair[1]) + 1;
        if start < next_free || end > KEY_SPACE {
            return Err(Error::UnsortedContainer(key));
        }
        runs.push((start, end));
        next_free = end;
    }
    let total: usize = runs.iter().map(|(s, e)| e - s).sum();
    check_cardinality(key, cardinality, total)?;

    if total <= SPARSE_MAX {
        let values = runs
            .iter()
            .flat_map(|&(s, e)| (s..e).map(|v| v as u16))
            .collect();
        return Ok(Container::Sparse(SparseContainer::from_sorted(values)));
    }
    let dense = build_dense(pool, |block| {
        for &(s, e) in &runs {
            words::set_range(&mut block[..], s, e);
        }
        Ok(())
    })?;
    Ok(Container::Dense(dense))
}

/// Fill a fresh block, rented from `pool` if there is one.
fn build_dense(
    pool: Option<&BlockPool>,
    fill: impl FnOnce(&mut Block) -> Result<()>,
) -> Result<DenseContainer> {
    match pool {
        Some(pool) => {
            let mut block = pool.rent()?;
            fill(&mut block)?;
            Ok(DenseContainer::from_pooled(block))
        }
        None => {
            let mut block = Block::boxed();
            fill(&mut block)?;
            Ok(DenseContainer::from_block(block))
        }
    }
}

fn check_cardinality(key: u16, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(Error::CardinalityMismatch {
            key,
            expected: expected as u32,
            actual: actual as u32,
        });
    }
    Ok(())
}

/// A reader that tracks its position and reports short reads as
/// [`Error::Truncated`].
struct Source<R> {
    inner: R,
    position: u64,
}

impl<R: Read> Source<R> {
    fn new(inner: R) -> Self {
        Self { inner, position: 0 }
    }

    fn fill(&mut self, buf: &mut [u8], context: &'static str) -> Result<()> {
        self.inner.read_exact(buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                Error::Truncated(context)
            } else {
                Error::Io(e)
            }
        })?;
        self.position += buf.len() as u64;
        Ok(())
    }

    fn u16(&mut self, context: &'static str) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.fill(&mut buf, context)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn u32(&mut self, context: &'static str) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.fill(&mut buf, context)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn u16_vec(&mut self, len: usize, context: &'static str) -> Result<Vec<u16>> {
        let mut raw = vec![0u8; 2 * len];
        self.fill(&mut raw, context)?;
        Ok(raw
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect())
    }

    fn words(&mut self, out: &mut [u64], context: &'static str) -> Result<()> {
        let mut raw = [0u8; BLOCK_WORDS * 8];
        let raw = &mut raw[..out.len() * 8];
        self.fill(raw, context)?;
        for (w, chunk) in out.iter_mut().zip(raw.chunks_exact(8)) {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            *w = u64::from_le_bytes(bytes);
        }
        Ok(())
    }
}
