//! Sparse memory image.
//!
//! A thin owner of a block sequence with byte-level accessors, used as the
//! load/save target when a whole file is treated as a memory map rather than
//! as records.

use serde::{Deserialize, Serialize};

use crate::error::{RecordError, Result};
use crate::range::{merge_blocks, overlay, Block, ADDRESS_SPACE};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparseMemory {
    blocks: Vec<Block>,
}

impl SparseMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from blocks in write order; later blocks win.
    pub fn from_blocks(blocks: &[Block]) -> Self {
        Self { blocks: merge_blocks(&[blocks]) }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Number of known bytes.
    pub fn len(&self) -> u64 {
        self.blocks.iter().map(|b| b.len() as u64).sum()
    }

    pub fn start(&self) -> Option<u32> {
        self.blocks.first().map(|b| b.start)
    }

    pub fn endex(&self) -> Option<u64> {
        self.blocks.last().map(Block::endex)
    }

    /// Overwrite `data` at `address`.
    pub fn write(&mut self, address: u32, data: impl Into<Vec<u8>>) -> Result<()> {
        let block = Block::new(address, data);
        if block.endex() > ADDRESS_SPACE {
            return Err(RecordError::SizeOverflow);
        }
        overlay(&mut self.blocks, block);
        Ok(())
    }

    fn block_at(&self, address: u32) -> Option<&Block> {
        let index = self.blocks.partition_point(|b| b.endex() <= address as u64);
        self.blocks.get(index).filter(|b| b.start <= address)
    }

    pub fn get(&self, address: u32) -> Option<u8> {
        self.block_at(address).map(|b| b.data[(address - b.start) as usize])
    }

    /// `size` bytes from `address`, or `None` if any of them is unknown.
    pub fn read(&self, address: u32, size: usize) -> Option<Vec<u8>> {
        if size == 0 {
            return Some(Vec::new());
        }
        let block = self.block_at(address)?;
        let offset = (address - block.start) as usize;
        block.data.get(offset..offset.checked_add(size)?).map(<[u8]>::to_vec)
    }

    /// Forget every byte in `[start, endex)`.
    pub fn clear(&mut self, start: u32, endex: u64) {
        let start = start as u64;
        let mut kept = Vec::with_capacity(self.blocks.len() + 1);
        for block in self.blocks.drain(..) {
            let (b_start, b_endex) = (block.start as u64, block.endex());
            if b_endex <= start || b_start >= endex {
                kept.push(block);
                continue;
            }
            if b_start < start {
                kept.push(Block::new(block.start, block.data[..(start - b_start) as usize].to_vec()));
            }
            if b_endex > endex {
                let skip = (endex - b_start) as usize;
                kept.push(Block::new(endex as u32, block.data[skip..].to_vec()));
            }
        }
        self.blocks = kept;
    }
}
