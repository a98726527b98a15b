use super::doc_cursor::{DocCursor, FreqMode};
use super::iterator::{DecodeStats, DocIterator, PostingIterator};
use super::position_cursor::{PositionCursor, PositionFeatures};
use super::{DocId, IntBlockTermState, NO_MORE_DOCS};
use crate::algorithm::ForUtil;
use crate::error::Result;
use crate::store::IndexInput;

/// Doc ids, freqs and positions, with payloads and offsets when requested.
pub struct EverythingIterator {
    cursor: DocCursor,
    positions: PositionCursor,
}

impl EverythingIterator {
    pub(crate) fn new(
        for_util: ForUtil,
        doc_in: IndexInput,
        pos_in: IndexInput,
        pay_in: Option<IndexInput>,
        features: PositionFeatures,
    ) -> Self {
        Self {
            cursor: DocCursor::new(for_util, doc_in, true),
            positions: PositionCursor::new(for_util, pos_in, pay_in, features),
        }
    }

    pub(crate) fn can_reuse(&self, doc_in: &IndexInput, features: PositionFeatures) -> bool {
        self.cursor.doc_in_name() == doc_in.name() && self.positions.features() == features
    }

    pub(crate) fn reset(&mut self, state: &IntBlockTermState) -> Result<()> {
        self.cursor.reset(state, FreqMode::Eager)?;
        self.positions.reset(state)
    }

    #[cfg(test)]
    pub(crate) fn stream_states(&self) -> (super::iterator::BlockState, super::iterator::BlockState) {
        self.positions.stream_states()
    }

    // consumes one document and queues its positions
    fn consume(&mut self) -> Result<(DocId, u32)> {
        let doc = self.cursor.consume()?;
        let freq = self.cursor.freq()?;
        self.positions.add_pending(freq);
        Ok((doc, freq))
    }

    fn land(&mut self, doc: DocId, freq: u32) -> DocId {
        self.positions.start_doc(freq);
        self.cursor.doc = doc;
        doc
    }
}

impl DocIterator for EverythingIterator {
    fn doc_id(&self) -> DocId {
        self.cursor.doc
    }

    fn next_doc(&mut self) -> Result<DocId> {
        if self.cursor.exhausted() {
            return Ok(self.cursor.finish());
        }
        let (doc, freq) = self.consume()?;
        Ok(self.land(doc, freq))
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        if target == NO_MORE_DOCS {
            return Ok(self.cursor.finish());
        }
        if let Some(jump) = self.cursor.skip_to_block(target)? {
            self.positions.jump(&jump);
        }
        loop {
            if self.cursor.exhausted() {
                return Ok(self.cursor.finish());
            }
            let (doc, freq) = self.consume()?;
            if doc >= target {
                return Ok(self.land(doc, freq));
            }
        }
    }

    fn cost(&self) -> usize {
        self.cursor.doc_freq()
    }
}

impl PostingIterator for EverythingIterator {
    fn freq(&mut self) -> Result<u32> {
        self.cursor.freq()
    }

    fn next_position(&mut self) -> Result<i32> {
        self.positions.next_position()
    }

    fn start_offset(&self) -> i32 {
        self.positions.start_offset()
    }

    fn end_offset(&self) -> i32 {
        self.positions.end_offset()
    }

    fn payload(&self) -> Option<&[u8]> {
        self.positions.payload()
    }

    fn decode_stats(&self) -> DecodeStats {
        self.cursor.stats().merge(self.positions.stats())
    }
}
