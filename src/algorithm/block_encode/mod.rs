use enum_dispatch::enum_dispatch;
use lanes::LanePacking;
use word_pair::WordPairPacking;

use super::int_block::{IntBlock, BLOCK_SIZE};
use crate::error::{PostingsError, Result};
use crate::options::PackingOption;
use crate::store::{DataInput, DataOutput};

mod lanes;
mod word_pair;

pub const MAX_BITS_PER_VALUE: u32 = 32;

/// On-disk size of a packed block, including the bit width byte.
pub const fn encoded_size(bits_per_value: u32) -> usize {
    1 + (bits_per_value as usize) * BLOCK_SIZE / 8
}

#[enum_dispatch]
pub trait BlockPackTrait {
    /// Packs 128 values of at most `bits_per_value` bits into
    /// `2 * bits_per_value` words.
    fn pack(&self, block: &IntBlock, bits_per_value: u32, words: &mut [u64]);
    fn unpack(&self, words: &[u64], bits_per_value: u32, block: &mut IntBlock);
}

#[enum_dispatch(BlockPackTrait)]
#[derive(Debug, Clone, Copy)]
pub enum BlockPacking {
    WordPairPacking,
    LanePacking,
}

impl BlockPacking {
    pub fn new(option: PackingOption) -> Self {
        match option {
            PackingOption::WordPair => WordPairPacking.into(),
            PackingOption::Lanes => LanePacking.into(),
        }
    }
}

/// Frame-of-reference block codec: one byte holding the bit width, then the
/// packed words, big-endian.
#[derive(Debug, Clone, Copy)]
pub struct ForUtil {
    packing: BlockPacking,
}

impl ForUtil {
    pub fn new(option: PackingOption) -> Self {
        Self {
            packing: BlockPacking::new(option),
        }
    }

    pub fn encode<O: DataOutput + ?Sized>(&self, block: &IntBlock, out: &mut O) -> Result<()> {
        let bpv = block.bits_required();
        out.write_byte(bpv as u8)?;
        if bpv == 0 {
            return Ok(());
        }
        let num_words = 2 * bpv as usize;
        let mut words = [0u64; 2 * MAX_BITS_PER_VALUE as usize];
        self.packing.pack(block, bpv, &mut words[..num_words]);
        let mut bytes = [0u8; 16 * MAX_BITS_PER_VALUE as usize];
        for (chunk, word) in bytes.chunks_exact_mut(8).zip(&words[..num_words]) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        out.write_bytes(&bytes[..num_words * 8])
    }

    pub fn decode<I: DataInput + ?Sized>(&self, input: &mut I, block: &mut IntBlock) -> Result<()> {
        let bpv = read_bits_per_value(input)?;
        if bpv == 0 {
            block.fill(0);
            return Ok(());
        }
        let num_words = 2 * bpv as usize;
        let mut bytes = [0u8; 16 * MAX_BITS_PER_VALUE as usize];
        input.read_bytes(&mut bytes[..num_words * 8])?;
        let mut words = [0u64; 2 * MAX_BITS_PER_VALUE as usize];
        for (word, chunk) in words.iter_mut().zip(bytes[..num_words * 8].chunks_exact(8)) {
            *word = u64::from_be_bytes([
                chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
            ]);
        }
        self.packing.unpack(&words[..num_words], bpv, block);
        Ok(())
    }

    /// Moves past one block without materializing it.
    pub fn skip<I: DataInput + ?Sized>(&self, input: &mut I) -> Result<()> {
        let bpv = read_bits_per_value(input)?;
        input.skip_bytes(u64::from(bpv) << 4)
    }
}

fn read_bits_per_value<I: DataInput + ?Sized>(input: &mut I) -> Result<u32> {
    let bpv = u32::from(input.read_byte()?);
    if bpv > MAX_BITS_PER_VALUE {
        return Err(PostingsError::corrupt(
            format!("invalid bits per value {bpv}"),
            input.resource(),
        ));
    }
    Ok(bpv)
}
