//! Skip data of one posting list.
//!
//! Level 0 holds one entry per completed doc block; level `L` holds one
//! entry every `multiplier^L` blocks carrying the merged impacts of all the
//! blocks it covers. Entries are fixed-size records so the reader can
//! binary-search them in place.
//!
//! ```text
//! [vint num_levels][vint multiplier]
//! per level: [vint entry_count][vint impacts_len][entries][impacts]
//! ```

mod impacts;
mod reader;
mod writer;

use bytemuck::{Pod, Zeroable};
pub use impacts::{CompetitiveImpactAccumulator, Impact, Impacts};
pub use reader::SkipReader;
pub use writer::SkipWriter;

use crate::error::Result;
use crate::postings::DocId;
use crate::store::IndexOutput;

/// Stream positions right after a completed doc block. Pointers are relative
/// to the term's start pointers.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct SkipBlock {
    pub doc_fp: u64,
    pub pos_fp: u64,
    pub pay_fp: u64,
    pub last_doc: DocId,
    pub pos_buffer_upto: u32,
    pub payload_byte_upto: u32,
    pub impacts_offset: u32,
}

unsafe impl Zeroable for SkipBlock {}
unsafe impl Pod for SkipBlock {}

pub const SKIP_BLOCK_SIZE: usize = std::mem::size_of::<SkipBlock>();

/// Absolute stream state recorded by the postings writer for one block.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipCheckpoint {
    pub last_doc: DocId,
    pub doc_fp: u64,
    pub pos_fp: u64,
    pub pay_fp: u64,
    pub pos_buffer_upto: u32,
    pub payload_byte_upto: u32,
}

pub trait SkipListWrite {
    /// Starts a new posting list whose streams begin at the given pointers.
    fn reset_skip(&mut self, doc_fp: u64, pos_fp: u64, pay_fp: u64);

    /// Records the checkpoint after one more completed block.
    fn buffer_skip(
        &mut self,
        checkpoint: &SkipCheckpoint,
        impacts: &CompetitiveImpactAccumulator,
    ) -> Result<()>;

    /// Writes the buffered skip data and returns where it starts.
    fn write_skip(&mut self, out: &mut IndexOutput) -> Result<u64>;
}

pub trait SkipListRead {
    /// Moves to the last checkpoint whose block ends before `target` and
    /// returns how many documents precede the next unread block.
    fn skip_to(&mut self, target: DocId) -> Result<usize>;

    /// Last document of the most recently skipped block.
    fn doc(&self) -> DocId;

    fn doc_pointer(&self) -> u64;

    fn pos_pointer(&self) -> u64;

    fn pay_pointer(&self) -> u64;

    /// Index inside the position block at `pos_pointer` where the next
    /// document's positions start.
    fn pos_buffer_upto(&self) -> usize;

    fn payload_byte_upto(&self) -> usize;

    /// Last document of the block the cursor is in.
    fn next_skip_doc(&self) -> DocId;

    fn impacts(&self) -> Result<Impacts>;
}
