use super::impacts::read_impacts;
use super::{Impacts, SkipBlock, SkipListRead, SKIP_BLOCK_SIZE};
use crate::algorithm::BLOCK_SIZE;
use crate::error::{PostingsError, Result};
use crate::postings::{DocId, NO_MORE_DOCS};
use crate::store::{DataInput, IndexInput};

#[derive(Debug, Clone, Copy)]
struct LevelData {
    entries_fp: u64,
    count: usize,
    impacts_fp: u64,
    impacts_len: u64,
}

pub struct SkipReader {
    input: IndexInput,
    doc_base: u64,
    pos_base: u64,
    pay_base: u64,
    multiplier: usize,
    levels: Vec<LevelData>,
    // number of level 0 entries passed, i.e. index of the current block
    skipped: usize,
    current: SkipBlock,
    next_skip_doc: DocId,
}

impl SkipReader {
    pub fn new(input: IndexInput) -> Self {
        Self {
            input,
            doc_base: 0,
            pos_base: 0,
            pay_base: 0,
            multiplier: 0,
            levels: Vec::new(),
            skipped: 0,
            current: SkipBlock::default(),
            next_skip_doc: NO_MORE_DOCS,
        }
    }

    pub fn init(&mut self, skip_fp: u64, doc_base: u64, pos_base: u64, pay_base: u64) -> Result<()> {
        self.doc_base = doc_base;
        self.pos_base = pos_base;
        self.pay_base = pay_base;

        self.input.seek(skip_fp)?;
        let num_levels = self.input.read_vint()? as usize;
        let multiplier = self.input.read_vint()? as usize;
        if num_levels == 0 || multiplier < 2 {
            return Err(PostingsError::corrupt(
                format!("invalid skip header: {num_levels} levels, multiplier {multiplier}"),
                self.input.resource(),
            ));
        }
        self.multiplier = multiplier;
        self.levels.clear();
        for _ in 0..num_levels {
            let count = self.input.read_vint()? as usize;
            let impacts_len = u64::from(self.input.read_vint()?);
            let entries_fp = self.input.file_pointer();
            self.input.skip_bytes((count * SKIP_BLOCK_SIZE) as u64)?;
            let impacts_fp = self.input.file_pointer();
            self.input.skip_bytes(impacts_len)?;
            self.levels.push(LevelData {
                entries_fp,
                count,
                impacts_fp,
                impacts_len,
            });
        }

        self.skipped = 0;
        self.current = SkipBlock::default();
        self.next_skip_doc = if self.levels[0].count > 0 {
            self.entry(0, 0)?.last_doc
        } else {
            NO_MORE_DOCS
        };
        Ok(())
    }

    fn entry(&self, level: usize, index: usize) -> Result<SkipBlock> {
        let start = self.levels[level].entries_fp + (index * SKIP_BLOCK_SIZE) as u64;
        let bytes = self.input.slice(start, start + SKIP_BLOCK_SIZE as u64)?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }
}

impl SkipListRead for SkipReader {
    fn skip_to(&mut self, target: DocId) -> Result<usize> {
        let count = self.levels[0].count;
        let (mut lo, mut hi) = (self.skipped, count);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.entry(0, mid)?.last_doc < target {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        if lo > self.skipped {
            self.current = self.entry(0, lo - 1)?;
            self.skipped = lo;
        }
        self.next_skip_doc = if self.skipped < count {
            self.entry(0, self.skipped)?.last_doc
        } else {
            NO_MORE_DOCS
        };
        Ok(self.skipped * BLOCK_SIZE)
    }

    fn doc(&self) -> DocId {
        self.current.last_doc
    }

    fn doc_pointer(&self) -> u64 {
        self.doc_base + self.current.doc_fp
    }

    fn pos_pointer(&self) -> u64 {
        self.pos_base + self.current.pos_fp
    }

    fn pay_pointer(&self) -> u64 {
        self.pay_base + self.current.pay_fp
    }

    fn pos_buffer_upto(&self) -> usize {
        self.current.pos_buffer_upto as usize
    }

    fn payload_byte_upto(&self) -> usize {
        self.current.payload_byte_upto as usize
    }

    fn next_skip_doc(&self) -> DocId {
        self.next_skip_doc
    }

    fn impacts(&self) -> Result<Impacts> {
        let mut levels = Vec::with_capacity(self.levels.len());
        let mut span = 1usize;
        for (level, data) in self.levels.iter().enumerate() {
            let index = self.skipped / span;
            if index >= data.count {
                break;
            }
            let entry = self.entry(level, index)?;
            let start = data.impacts_fp + u64::from(entry.impacts_offset);
            let mut bytes = self.input.slice(start, data.impacts_fp + data.impacts_len)?;
            levels.push((entry.last_doc, read_impacts(&mut bytes)?));
            span = span.saturating_mul(self.multiplier);
        }
        if levels.is_empty() {
            return Ok(Impacts::unbounded());
        }
        Ok(Impacts::new(levels))
    }
}
