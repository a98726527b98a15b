use super::doc_cursor::{DocCursor, FreqMode};
use super::iterator::{DecodeStats, DocIterator, PostingIterator};
use super::{DocId, IntBlockTermState, NO_MORE_DOCS};
use crate::algorithm::ForUtil;
use crate::error::{PostingsError, Result};
use crate::field::PostingFlags;
use crate::store::IndexInput;

/// Doc ids and, on request, freqs. Freq blocks are decoded only when
/// `freq()` is called inside the block.
pub struct BlockDocIterator {
    cursor: DocCursor,
}

impl BlockDocIterator {
    pub(crate) fn new(for_util: ForUtil, doc_in: IndexInput, index_has_freq: bool) -> Self {
        Self {
            cursor: DocCursor::new(for_util, doc_in, index_has_freq),
        }
    }

    pub(crate) fn can_reuse(&self, doc_in: &IndexInput, index_has_freq: bool) -> bool {
        self.cursor.doc_in_name() == doc_in.name() && self.cursor.index_has_freq() == index_has_freq
    }

    pub(crate) fn reset(&mut self, state: &IntBlockTermState, flags: PostingFlags) -> Result<()> {
        let freq_mode = if flags.contains(PostingFlags::FREQS) {
            FreqMode::Lazy
        } else {
            FreqMode::Skip
        };
        self.cursor.reset(state, freq_mode)
    }
}

impl DocIterator for BlockDocIterator {
    fn doc_id(&self) -> DocId {
        self.cursor.doc
    }

    fn next_doc(&mut self) -> Result<DocId> {
        if self.cursor.exhausted() {
            return Ok(self.cursor.finish());
        }
        self.cursor.doc = self.cursor.consume()?;
        Ok(self.cursor.doc)
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        if target == NO_MORE_DOCS {
            return Ok(self.cursor.finish());
        }
        self.cursor.skip_to_block(target)?;
        loop {
            if self.cursor.exhausted() {
                return Ok(self.cursor.finish());
            }
            let doc = self.cursor.consume()?;
            if doc >= target {
                self.cursor.doc = doc;
                return Ok(doc);
            }
        }
    }

    fn cost(&self) -> usize {
        self.cursor.doc_freq()
    }
}

impl PostingIterator for BlockDocIterator {
    fn freq(&mut self) -> Result<u32> {
        self.cursor.freq()
    }

    fn next_position(&mut self) -> Result<i32> {
        Err(PostingsError::illegal_state(
            "positions were not requested from this iterator",
        ))
    }

    fn start_offset(&self) -> i32 {
        -1
    }

    fn end_offset(&self) -> i32 {
        -1
    }

    fn payload(&self) -> Option<&[u8]> {
        None
    }

    fn decode_stats(&self) -> DecodeStats {
        self.cursor.stats()
    }
}
