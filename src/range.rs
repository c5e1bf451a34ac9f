//! Byte-range primitives: [`Block`], overlap tests, chunking and the
//! last-writer-wins merge.
//!
//! A *block sequence* is sorted by start address, holds no empty blocks, and
//! no two blocks overlap or touch.  Every function here that returns a block
//! sequence keeps those three properties.

use serde::{Deserialize, Serialize};
use std::iter;

/// Exclusive end of the 32-bit address space.
pub const ADDRESS_SPACE: u64 = 1 << 32;

// ── Block ────────────────────────────────────────────────────────────────────

/// A contiguous run of known bytes starting at `start`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Block {
    pub start: u32,
    #[serde(with = "hex_bytes")]
    pub data:  Vec<u8>,
}

impl Block {
    pub fn new(start: u32, data: impl Into<Vec<u8>>) -> Self {
        Self { start, data: data.into() }
    }

    /// Exclusive end address.  May equal `2^32`, hence `u64`.
    #[inline]
    pub fn endex(&self) -> u64 {
        self.start as u64 + self.data.len() as u64
    }

    pub fn len(&self) -> usize { self.data.len() }

    pub fn is_empty(&self) -> bool { self.data.is_empty() }

    pub fn overlaps(&self, other: &Block) -> bool {
        do_overlap(self.start as u64, self.endex(), other.start as u64, other.endex())
    }
}

impl From<(u32, Vec<u8>)> for Block {
    fn from((start, data): (u32, Vec<u8>)) -> Self {
        Self { start, data }
    }
}

/// Blocks serialise their payload as an upper-case hex string.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode_upper(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        hex::decode(text).map_err(serde::de::Error::custom)
    }
}

// ── Interval math ────────────────────────────────────────────────────────────

/// Whether the half-open ranges `[start1, endex1)` and `[start2, endex2)`
/// share at least one address.  Empty ranges never overlap.
#[inline]
pub fn do_overlap(start1: u64, endex1: u64, start2: u64, endex2: u64) -> bool {
    start1 < endex1 && start2 < endex2 && start1 < endex2 && start2 < endex1
}

/// Split `data` into chunks of at most `window` bytes.
///
/// When `align_base` is not a multiple of `window`, the first chunk is
/// shortened so that every following chunk starts at a multiple of `window`
/// relative to `align_base`.  Empty chunks are never produced.
///
/// `window` must be non-zero.
pub fn chop(data: &[u8], window: usize, align_base: usize) -> impl Iterator<Item = &[u8]> {
    debug_assert!(window > 0);
    let misalign = align_base % window;
    let head = if misalign != 0 { (window - misalign).min(data.len()) } else { 0 };
    let (first, rest) = data.split_at(head);
    iter::once(first)
        .filter(|chunk| !chunk.is_empty())
        .chain(rest.chunks(window))
}

// ── Merge ────────────────────────────────────────────────────────────────────

/// Write `block` over a block sequence, in place.
///
/// Bytes of `block` replace whatever `blocks` held at the same addresses;
/// blocks that end up touching are coalesced.
pub fn overlay(blocks: &mut Vec<Block>, block: Block) {
    if block.is_empty() {
        return;
    }
    let start = block.start as u64;
    let endex = block.endex();

    // blocks[lo..hi] overlap or touch the new range.
    let lo = blocks.partition_point(|b| b.endex() < start);
    let hi = blocks.partition_point(|b| (b.start as u64) <= endex);

    if lo >= hi {
        blocks.insert(lo, block);
        return;
    }

    let first_start = blocks[lo].start;
    let last = &blocks[hi - 1];
    let mut data = Vec::with_capacity(block.len());

    if (first_start as u64) < start {
        let keep = (start - first_start as u64) as usize;
        data.extend_from_slice(&blocks[lo].data[..keep]);
    }
    data.extend_from_slice(&block.data);
    if last.endex() > endex {
        let skip = (endex - last.start as u64) as usize;
        data.extend_from_slice(&last.data[skip..]);
    }

    let merged = Block { start: first_start.min(block.start), data };
    blocks.splice(lo..hi, iter::once(merged));
}

/// Merge block sources in priority order: later sources overwrite earlier
/// ones byte by byte.  Blocks inside one source are applied in order too.
///
/// The result is a block sequence (sorted, non-overlapping, coalesced).
pub fn merge_blocks<S: AsRef<[Block]>>(sources: &[S]) -> Vec<Block> {
    let mut merged = Vec::new();
    for source in sources {
        for block in source.as_ref() {
            overlay(&mut merged, block.clone());
        }
    }
    merged
}
