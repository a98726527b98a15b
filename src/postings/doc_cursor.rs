use super::iterator::{BlockState, DecodeStats};
use super::{DocId, IntBlockTermState, NO_MORE_DOCS};
use crate::algorithm::{ForUtil, IntBlock, BLOCK_SIZE};
use crate::error::{PostingsError, Result};
use crate::skip::{Impacts, SkipListRead, SkipReader};
use crate::store::{DataInput, IndexInput};

/// How freq blocks are handled on refill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FreqMode {
    /// Decoded together with the doc deltas.
    Eager,
    /// Decoded on the first `freq()` call of the block.
    Lazy,
    /// Never decoded, every freq reads as 1.
    Skip,
}

/// Where the position streams resume after a skip.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SkipJump {
    pub pos_fp: u64,
    pub pay_fp: u64,
    pub pos_buffer_upto: usize,
    pub payload_byte_upto: usize,
}

/// Doc stream state shared by every iterator: block refill, lazy freqs and
/// skip data.
pub(crate) struct DocCursor {
    for_util: ForUtil,
    doc_in: IndexInput,
    // untouched handle, cloned for the skip reader
    start_doc_in: IndexInput,
    doc_delta_buffer: IntBlock,
    freq_buffer: IntBlock,
    doc_buffer_upto: usize,
    doc_upto: usize,
    doc_freq: usize,
    total_term_freq: u64,
    accum: DocId,
    pub doc: DocId,
    index_has_freq: bool,
    freq_mode: FreqMode,
    freq_state: BlockState,
    term: IntBlockTermState,
    skipper: Option<SkipReader>,
    skipper_ready: bool,
    next_skip_doc: DocId,
    // doc stream seek deferred until the next refill
    seek_to: Option<u64>,
    stats: DecodeStats,
}

impl DocCursor {
    pub fn new(for_util: ForUtil, doc_in: IndexInput, index_has_freq: bool) -> Self {
        Self {
            for_util,
            start_doc_in: doc_in.clone(),
            doc_in,
            doc_delta_buffer: IntBlock::new(),
            freq_buffer: IntBlock::new(),
            doc_buffer_upto: BLOCK_SIZE,
            doc_upto: 0,
            doc_freq: 0,
            total_term_freq: 0,
            accum: 0,
            doc: -1,
            index_has_freq,
            freq_mode: FreqMode::Skip,
            freq_state: BlockState::Decoded,
            term: IntBlockTermState::default(),
            skipper: None,
            skipper_ready: false,
            next_skip_doc: NO_MORE_DOCS,
            seek_to: None,
            stats: DecodeStats::default(),
        }
    }

    pub fn doc_in_name(&self) -> &str {
        self.doc_in.name()
    }

    pub fn index_has_freq(&self) -> bool {
        self.index_has_freq
    }

    pub fn reset(&mut self, state: &IntBlockTermState, freq_mode: FreqMode) -> Result<()> {
        self.term = state.clone();
        self.doc_freq = state.doc_freq as usize;
        self.total_term_freq = if self.index_has_freq {
            state.total_term_freq
        } else {
            u64::from(state.doc_freq)
        };
        if self.doc_freq > 1 {
            self.doc_in.seek(state.doc_start_fp)?;
        }
        self.freq_mode = if self.index_has_freq {
            freq_mode
        } else {
            FreqMode::Skip
        };
        if self.freq_mode == FreqMode::Skip {
            self.freq_buffer.fill(1);
        }
        self.freq_state = BlockState::Decoded;
        self.doc = -1;
        self.accum = 0;
        self.doc_upto = 0;
        self.doc_buffer_upto = BLOCK_SIZE;
        self.next_skip_doc = if self.doc_freq > BLOCK_SIZE {
            BLOCK_SIZE as DocId - 1
        } else {
            NO_MORE_DOCS
        };
        self.skipper_ready = false;
        self.seek_to = None;
        Ok(())
    }

    pub fn doc_freq(&self) -> usize {
        self.doc_freq
    }

    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    pub fn exhausted(&self) -> bool {
        self.doc_upto >= self.doc_freq
    }

    /// Marks the cursor as exhausted and returns `NO_MORE_DOCS`.
    pub fn finish(&mut self) -> DocId {
        self.doc = NO_MORE_DOCS;
        NO_MORE_DOCS
    }

    /// Consumes the next document of the posting list. The caller checks
    /// `exhausted` first.
    pub fn consume(&mut self) -> Result<DocId> {
        if self.doc_buffer_upto == BLOCK_SIZE {
            self.refill_docs()?;
        }
        let delta = self.doc_delta_buffer.get(self.doc_buffer_upto);
        let doc = i64::from(self.accum) + i64::from(delta);
        if (delta == 0 && self.doc_upto > 0) || doc >= i64::from(NO_MORE_DOCS) {
            return Err(PostingsError::corrupt(
                format!("invalid doc delta {delta} after doc {}", self.accum),
                self.doc_in.name(),
            ));
        }
        self.accum = doc as DocId;
        self.doc_buffer_upto += 1;
        self.doc_upto += 1;
        Ok(self.accum)
    }

    /// Freq of the most recently consumed document.
    pub fn freq(&mut self) -> Result<u32> {
        match self.freq_state {
            BlockState::NotDecoded => {
                self.for_util.decode(&mut self.doc_in, &mut self.freq_buffer)?;
                self.stats.freq_blocks_decoded += 1;
                self.freq_state = BlockState::Decoded;
            }
            BlockState::Decoded => {}
            BlockState::Skipped if self.freq_mode == FreqMode::Skip => return Ok(1),
            BlockState::Skipped => {
                return Err(PostingsError::illegal_state(
                    "freq read after the cursor moved past the current document's block",
                ))
            }
        }
        Ok(self.freq_buffer.get(self.doc_buffer_upto.saturating_sub(1)))
    }

    fn refill_docs(&mut self) -> Result<()> {
        if let Some(fp) = self.seek_to.take() {
            self.doc_in.seek(fp)?;
        } else if self.freq_state == BlockState::NotDecoded {
            self.for_util.skip(&mut self.doc_in)?;
            self.stats.freq_blocks_skipped += 1;
        }
        self.freq_state = BlockState::Decoded;

        let left = self.doc_freq - self.doc_upto;
        if left >= BLOCK_SIZE {
            self.for_util.decode(&mut self.doc_in, &mut self.doc_delta_buffer)?;
            self.stats.doc_blocks_decoded += 1;
            match self.freq_mode {
                FreqMode::Eager => {
                    self.for_util.decode(&mut self.doc_in, &mut self.freq_buffer)?;
                    self.stats.freq_blocks_decoded += 1;
                }
                FreqMode::Lazy => self.freq_state = BlockState::NotDecoded,
                FreqMode::Skip if self.index_has_freq => {
                    self.for_util.skip(&mut self.doc_in)?;
                    self.stats.freq_blocks_skipped += 1;
                    self.freq_state = BlockState::Skipped;
                }
                FreqMode::Skip => {}
            }
        } else if let Some(doc) = self.term.singleton_doc_id {
            self.doc_delta_buffer.set(0, doc as u32);
            if self.freq_mode != FreqMode::Skip {
                self.freq_buffer.set(0, self.total_term_freq as u32);
            }
        } else {
            self.read_vint_block(left)?;
            self.stats.vint_blocks_decoded += 1;
        }
        self.doc_buffer_upto = 0;
        Ok(())
    }

    fn read_vint_block(&mut self, num: usize) -> Result<()> {
        if !self.index_has_freq {
            for i in 0..num {
                self.doc_delta_buffer.set(i, self.doc_in.read_vint()?);
            }
            return Ok(());
        }
        let keep_freqs = self.freq_mode != FreqMode::Skip;
        for i in 0..num {
            let code = self.doc_in.read_vint()?;
            self.doc_delta_buffer.set(i, code >> 1);
            let freq = if code & 1 != 0 {
                1
            } else {
                self.doc_in.read_vint()?
            };
            if keep_freqs {
                self.freq_buffer.set(i, freq);
            }
        }
        Ok(())
    }

    fn skipper(&mut self) -> Result<&mut SkipReader> {
        let start_doc_in = &self.start_doc_in;
        let skipper = self
            .skipper
            .get_or_insert_with(|| SkipReader::new(start_doc_in.clone()));
        if !self.skipper_ready {
            let Some(skip_offset) = self.term.skip_offset else {
                return Err(PostingsError::corrupt(
                    format!("no skip data for {} documents", self.doc_freq),
                    self.doc_in.name(),
                ));
            };
            let term = &self.term;
            skipper.init(
                term.doc_start_fp + skip_offset,
                term.doc_start_fp,
                term.pos_start_fp,
                term.pay_start_fp,
            )?;
            self.skipper_ready = true;
        }
        Ok(skipper)
    }

    /// Uses skip data when `target` lies beyond the current block. The doc
    /// stream seek is deferred to the next refill; the position streams are
    /// left to the caller through the returned jump.
    pub fn skip_to_block(&mut self, target: DocId) -> Result<Option<SkipJump>> {
        if self.doc_freq <= BLOCK_SIZE || target <= self.next_skip_doc {
            return Ok(None);
        }
        let doc_upto = self.doc_upto;
        let skipper = self.skipper()?;
        let new_doc_upto = skipper.skip_to(target)?;
        let next_skip_doc = skipper.next_skip_doc();
        let mut jump = None;
        if new_doc_upto > doc_upto {
            let accum = skipper.doc();
            let doc_fp = skipper.doc_pointer();
            jump = Some(SkipJump {
                pos_fp: skipper.pos_pointer(),
                pay_fp: skipper.pay_pointer(),
                pos_buffer_upto: skipper.pos_buffer_upto(),
                payload_byte_upto: skipper.payload_byte_upto(),
            });
            self.doc_upto = new_doc_upto;
            self.doc_buffer_upto = BLOCK_SIZE;
            self.accum = accum;
            self.seek_to = Some(doc_fp);
            self.freq_state = BlockState::Skipped;
        }
        self.next_skip_doc = next_skip_doc;
        Ok(jump)
    }

    /// Impacts of the block holding the current document and the levels
    /// above it.
    pub fn impacts(&mut self) -> Result<Impacts> {
        if self.doc_freq <= BLOCK_SIZE {
            return Ok(Impacts::unbounded());
        }
        self.skipper()?.impacts()
    }
}
