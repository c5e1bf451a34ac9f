//! Bridging records and blocks, and the record-level merge/convert built on
//! top of it.
//!
//! Any conversion between two formats goes through the block model: data
//! records become blocks, blocks are merged, and the result is split again
//! with the output format.  Framing records of the input never survive.

use log::debug;

use crate::error::Result;
use crate::range::{merge_blocks, Block};
use crate::record::{Format, Record, SplitOptions};

/// Copies of the data records, in order.
pub fn get_data_records<F: Format>(records: &[Record<F>]) -> Vec<Record<F>> {
    records.iter().filter(|r| r.is_data()).cloned().collect()
}

/// Indices of the records failing their own check.  Never fails itself.
pub fn find_corrupted_records<F: Format>(records: &[Record<F>]) -> Vec<usize> {
    records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.check().is_err())
        .map(|(i, _)| i)
        .collect()
}

/// Data records as raw blocks, in record order, without merging.
fn data_blocks<F: Format>(records: &[Record<F>]) -> Vec<Block> {
    records
        .iter()
        .filter(|r| r.is_data())
        .map(|r| Block::new(r.address, r.data.clone()))
        .collect()
}

/// Data records as a block sequence.  Later records win where they overlap.
///
/// Records must already use flat addressing (see [`Format::readdress`]).
pub fn records_to_blocks<F: Format>(records: &[Record<F>]) -> Vec<Block> {
    merge_blocks(&[data_blocks(records)])
}

/// Split every block with format `F` and add the framing once, around the
/// whole sequence, when `options.standalone` is set.
pub fn blocks_to_records<F: Format>(
    blocks:  &[Block],
    options: &SplitOptions,
    framing: &F::Framing,
) -> Result<Vec<Record<F>>> {
    let chunk_options = SplitOptions { standalone: false, ..*options };
    let mut records = Vec::new();
    for block in blocks {
        records.extend(F::split(&block.data, block.start, &chunk_options, framing)?);
    }
    if options.standalone {
        records = F::build_standalone(records, framing)?;
    }
    Ok(records)
}

/// Merge record sequences of format `I` into one sequence of format `O`.
/// Later sources win where they overlap.
pub fn merge_records<I: Format, O: Format>(
    sources: &[Vec<Record<I>>],
    options: &SplitOptions,
    framing: &O::Framing,
) -> Result<Vec<Record<O>>> {
    let blocks: Vec<Vec<Block>> = sources.iter().map(|s| data_blocks(s)).collect();
    let merged = merge_blocks(&blocks);
    debug!(
        "merged {} {} sources into {} blocks for {}",
        sources.len(),
        I::NAME,
        merged.len(),
        O::NAME
    );
    blocks_to_records::<O>(&merged, options, framing)
}

/// Convert one record sequence from format `I` to format `O`.
pub fn convert_records<I: Format, O: Format>(
    records: &[Record<I>],
    options: &SplitOptions,
    framing: &O::Framing,
) -> Result<Vec<Record<O>>> {
    blocks_to_records::<O>(&records_to_blocks(records), options, framing)
}
