use super::doc_cursor::{DocCursor, FreqMode};
use super::iterator::{DecodeStats, DocIterator, ImpactsIterator, PostingIterator};
use super::position_cursor::PositionCursor;
use super::reader::BlockPostings;
use super::{DocId, IntBlockTermState, NO_MORE_DOCS};
use crate::algorithm::ForUtil;
use crate::error::{PostingsError, Result};
use crate::field::PostingFlags;
use crate::skip::Impacts;
use crate::store::IndexInput;

/// Iterator over a posting list with skip data that exposes per-block
/// impacts. Without a position cursor it only reads the doc stream; with
/// one it reads positions, and payloads or offsets when the cursor tracks
/// them.
pub struct BlockImpactsIterator {
    cursor: DocCursor,
    positions: Option<PositionCursor>,
}

impl BlockImpactsIterator {
    pub(crate) fn new(
        for_util: ForUtil,
        doc_in: IndexInput,
        index_has_freq: bool,
        positions: Option<PositionCursor>,
    ) -> Self {
        Self {
            cursor: DocCursor::new(for_util, doc_in, index_has_freq),
            positions,
        }
    }

    pub(crate) fn reset(&mut self, state: &IntBlockTermState, flags: PostingFlags) -> Result<()> {
        let freq_mode = if self.positions.is_some() {
            FreqMode::Eager
        } else if flags.contains(PostingFlags::FREQS) {
            FreqMode::Lazy
        } else {
            FreqMode::Skip
        };
        self.cursor.reset(state, freq_mode)?;
        if let Some(positions) = self.positions.as_mut() {
            positions.reset(state)?;
        }
        Ok(())
    }

    fn consume(&mut self) -> Result<(DocId, u32)> {
        let doc = self.cursor.consume()?;
        let mut freq = 1;
        if let Some(positions) = self.positions.as_mut() {
            freq = self.cursor.freq()?;
            positions.add_pending(freq);
        }
        Ok((doc, freq))
    }
}

impl DocIterator for BlockImpactsIterator {
    fn doc_id(&self) -> DocId {
        self.cursor.doc
    }

    fn next_doc(&mut self) -> Result<DocId> {
        if self.cursor.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        self.advance(self.cursor.doc + 1)
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        if target == NO_MORE_DOCS {
            return Ok(self.cursor.finish());
        }
        self.advance_shallow(target)?;
        loop {
            if self.cursor.exhausted() {
                return Ok(self.cursor.finish());
            }
            let (doc, freq) = self.consume()?;
            if doc >= target {
                if let Some(positions) = self.positions.as_mut() {
                    positions.start_doc(freq);
                }
                self.cursor.doc = doc;
                return Ok(doc);
            }
        }
    }

    fn cost(&self) -> usize {
        self.cursor.doc_freq()
    }
}

impl PostingIterator for BlockImpactsIterator {
    fn freq(&mut self) -> Result<u32> {
        self.cursor.freq()
    }

    fn next_position(&mut self) -> Result<i32> {
        match self.positions.as_mut() {
            Some(positions) => positions.next_position(),
            None => Err(PostingsError::illegal_state(
                "positions were not requested from this iterator",
            )),
        }
    }

    fn start_offset(&self) -> i32 {
        self.positions.as_ref().map_or(-1, PositionCursor::start_offset)
    }

    fn end_offset(&self) -> i32 {
        self.positions.as_ref().map_or(-1, PositionCursor::end_offset)
    }

    fn payload(&self) -> Option<&[u8]> {
        self.positions.as_ref().and_then(PositionCursor::payload)
    }

    fn decode_stats(&self) -> DecodeStats {
        match self.positions.as_ref() {
            Some(positions) => self.cursor.stats().merge(positions.stats()),
            None => self.cursor.stats(),
        }
    }
}

impl ImpactsIterator for BlockImpactsIterator {
    fn advance_shallow(&mut self, target: DocId) -> Result<()> {
        if let Some(jump) = self.cursor.skip_to_block(target)? {
            if let Some(positions) = self.positions.as_mut() {
                positions.jump(&jump);
            }
        }
        Ok(())
    }

    fn impacts(&mut self) -> Result<Impacts> {
        self.advance_shallow(self.cursor.doc)?;
        self.cursor.impacts()
    }
}

/// Posting list too short for skip data: impacts carry no information, the
/// score bound is whatever the scorer allows.
pub struct SlowImpactsIterator {
    inner: BlockPostings,
}

impl SlowImpactsIterator {
    pub(crate) fn new(inner: BlockPostings) -> Self {
        Self { inner }
    }
}

impl DocIterator for SlowImpactsIterator {
    fn doc_id(&self) -> DocId {
        self.inner.doc_id()
    }

    fn next_doc(&mut self) -> Result<DocId> {
        self.inner.next_doc()
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        self.inner.advance(target)
    }

    fn cost(&self) -> usize {
        self.inner.cost()
    }
}

impl PostingIterator for SlowImpactsIterator {
    fn freq(&mut self) -> Result<u32> {
        self.inner.freq()
    }

    fn next_position(&mut self) -> Result<i32> {
        self.inner.next_position()
    }

    fn start_offset(&self) -> i32 {
        self.inner.start_offset()
    }

    fn end_offset(&self) -> i32 {
        self.inner.end_offset()
    }

    fn payload(&self) -> Option<&[u8]> {
        self.inner.payload()
    }

    fn decode_stats(&self) -> DecodeStats {
        self.inner.decode_stats()
    }
}

impl ImpactsIterator for SlowImpactsIterator {
    fn advance_shallow(&mut self, _target: DocId) -> Result<()> {
        Ok(())
    }

    fn impacts(&mut self) -> Result<Impacts> {
        Ok(Impacts::unbounded())
    }
}
