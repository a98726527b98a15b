use enum_dispatch::enum_dispatch;

use super::DocId;
use crate::error::Result;
use crate::skip::Impacts;

#[enum_dispatch]
pub trait DocIterator {
    /// Current document, `-1` before the first call to `next_doc` or
    /// `advance`, `NO_MORE_DOCS` once exhausted.
    fn doc_id(&self) -> DocId;

    fn next_doc(&mut self) -> Result<DocId>;

    /// Moves to the first document `>= target`. `target` must be greater
    /// than the current document.
    fn advance(&mut self, target: DocId) -> Result<DocId>;

    fn cost(&self) -> usize;
}

#[enum_dispatch]
pub trait PostingIterator: DocIterator {
    /// Frequency of the current document, `1` when freqs were not indexed
    /// or not requested.
    fn freq(&mut self) -> Result<u32>;

    /// Next position of the current document. Must be called at most
    /// `freq()` times per document.
    fn next_position(&mut self) -> Result<i32>;

    /// `-1` unless offsets were indexed and requested.
    fn start_offset(&self) -> i32;

    fn end_offset(&self) -> i32;

    /// Payload at the current position, if any.
    fn payload(&self) -> Option<&[u8]>;

    /// Counts of blocks decoded and skipped so far.
    fn decode_stats(&self) -> DecodeStats {
        DecodeStats::default()
    }
}

#[enum_dispatch]
pub trait ImpactsIterator: PostingIterator {
    /// Positions skip data so that `impacts()` covers `target`, without
    /// decoding any block.
    fn advance_shallow(&mut self, target: DocId) -> Result<()>;

    fn impacts(&mut self) -> Result<Impacts>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub doc_blocks_decoded: u64,
    pub freq_blocks_decoded: u64,
    pub freq_blocks_skipped: u64,
    pub pos_blocks_decoded: u64,
    pub pos_blocks_skipped: u64,
    pub pay_blocks_decoded: u64,
    pub pay_blocks_skipped: u64,
    /// Vint-encoded tail blocks of either stream.
    pub vint_blocks_decoded: u64,
}

impl DecodeStats {
    pub fn merge(self, other: DecodeStats) -> DecodeStats {
        DecodeStats {
            doc_blocks_decoded: self.doc_blocks_decoded + other.doc_blocks_decoded,
            freq_blocks_decoded: self.freq_blocks_decoded + other.freq_blocks_decoded,
            freq_blocks_skipped: self.freq_blocks_skipped + other.freq_blocks_skipped,
            pos_blocks_decoded: self.pos_blocks_decoded + other.pos_blocks_decoded,
            pos_blocks_skipped: self.pos_blocks_skipped + other.pos_blocks_skipped,
            pay_blocks_decoded: self.pay_blocks_decoded + other.pay_blocks_decoded,
            pay_blocks_skipped: self.pay_blocks_skipped + other.pay_blocks_skipped,
            vint_blocks_decoded: self.vint_blocks_decoded + other.vint_blocks_decoded,
        }
    }
}

/// State of the current block of one stream: the freqs of the doc stream,
/// the pos stream, and the payloads and offsets of the pay stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockState {
    /// Still in the stream right at the read cursor.
    NotDecoded,
    /// Held in the stream's buffers.
    Decoded,
    /// Passed over, or the cursor was moved elsewhere.
    Skipped,
}
