use super::doc_cursor::SkipJump;
use super::iterator::{BlockState, DecodeStats};
use super::IntBlockTermState;
use crate::algorithm::{ForUtil, IntBlock, BLOCK_SIZE};
use crate::error::{PostingsError, Result};
use crate::store::{DataInput, IndexInput};

/// Which parts of the position data a cursor decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PositionFeatures {
    pub index_has_payloads: bool,
    pub index_has_offsets: bool,
    pub needs_payloads: bool,
    pub needs_offsets: bool,
}

impl PositionFeatures {
    /// The pay stream is only followed when something in it is decoded.
    pub fn uses_pay_stream(&self) -> bool {
        self.needs_payloads || self.needs_offsets
    }
}

/// Position, payload and offset state of the current document. Positions
/// of documents passed over are skipped lazily on the next `next_position`.
pub(crate) struct PositionCursor {
    for_util: ForUtil,
    pos_in: IndexInput,
    pay_in: Option<IndexInput>,
    features: PositionFeatures,
    pos_delta_buffer: IntBlock,
    payload_length_buffer: IntBlock,
    offset_start_delta_buffer: IntBlock,
    offset_length_buffer: IntBlock,
    payload_bytes: Vec<u8>,
    pos_buffer_upto: usize,
    payload_byte_upto: usize,
    // positions not yet consumed, including the current document's
    pos_pending_count: u64,
    pos_state: BlockState,
    // where both streams resume while `pos_state` is Skipped
    pos_resume_fp: u64,
    pay_resume_fp: u64,
    // whether the payload and offset buffers hold the current block
    pay_state: BlockState,
    // start of the vint tail, None when every position is in a packed block
    last_pos_block_fp: Option<u64>,
    total_term_freq: u64,
    freq: u32,
    position: i32,
    last_start_offset: i32,
    start_offset: i32,
    end_offset: i32,
    payload_start: usize,
    payload_length: usize,
    stats: DecodeStats,
}

impl PositionCursor {
    /// `pay_in` must be present when `features.uses_pay_stream()`.
    pub fn new(
        for_util: ForUtil,
        pos_in: IndexInput,
        pay_in: Option<IndexInput>,
        features: PositionFeatures,
    ) -> Self {
        debug_assert!(pay_in.is_some() || !features.uses_pay_stream());
        Self {
            for_util,
            pos_in,
            pay_in,
            features,
            pos_delta_buffer: IntBlock::new(),
            payload_length_buffer: IntBlock::new(),
            offset_start_delta_buffer: IntBlock::new(),
            offset_length_buffer: IntBlock::new(),
            payload_bytes: Vec::new(),
            pos_buffer_upto: BLOCK_SIZE,
            payload_byte_upto: 0,
            pos_pending_count: 0,
            pos_state: BlockState::Skipped,
            pos_resume_fp: 0,
            pay_resume_fp: 0,
            pay_state: BlockState::NotDecoded,
            last_pos_block_fp: None,
            total_term_freq: 0,
            freq: 0,
            position: 0,
            last_start_offset: 0,
            start_offset: -1,
            end_offset: -1,
            payload_start: 0,
            payload_length: 0,
            stats: DecodeStats::default(),
        }
    }

    pub fn features(&self) -> PositionFeatures {
        self.features
    }

    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    fn tracks_payloads(&self) -> bool {
        self.features.index_has_payloads && self.features.needs_payloads
    }

    fn tracks_offsets(&self) -> bool {
        self.features.index_has_offsets && self.features.needs_offsets
    }

    pub fn reset(&mut self, state: &IntBlockTermState) -> Result<()> {
        self.move_to(state.pos_start_fp, state.pay_start_fp);
        self.pos_pending_count = 0;
        self.total_term_freq = state.total_term_freq;
        let block = BLOCK_SIZE as u64;
        self.last_pos_block_fp = if state.total_term_freq < block {
            Some(state.pos_start_fp)
        } else if state.total_term_freq == block {
            None
        } else {
            let Some(offset) = state.last_pos_block_offset else {
                return Err(PostingsError::corrupt(
                    format!("no position tail offset for {} positions", state.total_term_freq),
                    self.pos_in.name(),
                ));
            };
            Some(state.pos_start_fp + offset)
        };
        self.pos_buffer_upto = BLOCK_SIZE;
        self.payload_byte_upto = 0;
        self.freq = 0;
        self.position = 0;
        self.last_start_offset = 0;
        self.start_offset = -1;
        self.end_offset = -1;
        self.payload_length = 0;
        Ok(())
    }

    pub fn jump(&mut self, jump: &SkipJump) {
        self.move_to(jump.pos_fp, jump.pay_fp);
        self.pos_pending_count = jump.pos_buffer_upto as u64;
        self.payload_byte_upto = jump.payload_byte_upto;
        self.last_start_offset = 0;
    }

    fn move_to(&mut self, pos_fp: u64, pay_fp: u64) {
        self.pos_resume_fp = pos_fp;
        self.pay_resume_fp = pay_fp;
        self.pos_state = BlockState::Skipped;
        self.pay_state = BlockState::NotDecoded;
    }

    #[cfg(test)]
    pub fn stream_states(&self) -> (BlockState, BlockState) {
        (self.pos_state, self.pay_state)
    }

    /// Accounts for a document passed over or landed on.
    pub fn add_pending(&mut self, freq: u32) {
        self.pos_pending_count += u64::from(freq);
    }

    pub fn start_doc(&mut self, freq: u32) {
        self.freq = freq;
        self.position = 0;
        self.last_start_offset = 0;
        self.start_offset = -1;
        self.end_offset = -1;
        self.payload_length = 0;
    }

    pub fn next_position(&mut self) -> Result<i32> {
        if self.pos_state == BlockState::Skipped {
            self.pos_in.seek(self.pos_resume_fp)?;
            if let Some(pay_in) = self.pay_in.as_mut() {
                pay_in.seek(self.pay_resume_fp)?;
            }
            self.pos_buffer_upto = BLOCK_SIZE;
            self.pos_state = BlockState::NotDecoded;
        }
        let freq = u64::from(self.freq);
        if self.pos_pending_count > freq {
            self.skip_positions()?;
            self.pos_pending_count = freq;
        }
        if self.pos_pending_count == 0 {
            return Err(PostingsError::illegal_state(format!(
                "next_position called more than freq ({}) times",
                self.freq
            )));
        }
        if self.pos_state == BlockState::NotDecoded {
            self.refill_positions()?;
            self.pos_buffer_upto = 0;
        }
        debug_assert!(
            self.pay_state == BlockState::Decoded
                || !(self.tracks_payloads() || self.tracks_offsets())
        );

        let upto = self.pos_buffer_upto;
        self.position += self.pos_delta_buffer.get(upto) as i32;
        if self.tracks_payloads() {
            self.payload_length = self.payload_length_buffer.get(upto) as usize;
            self.payload_start = self.payload_byte_upto;
            self.payload_byte_upto += self.payload_length;
        }
        if self.tracks_offsets() {
            self.start_offset = self.last_start_offset + self.offset_start_delta_buffer.get(upto) as i32;
            self.end_offset = self.start_offset + self.offset_length_buffer.get(upto) as i32;
            self.last_start_offset = self.start_offset;
        }
        self.pos_buffer_upto += 1;
        if self.pos_buffer_upto == BLOCK_SIZE {
            self.pos_state = BlockState::NotDecoded;
        }
        self.pos_pending_count -= 1;
        Ok(self.position)
    }

    pub fn start_offset(&self) -> i32 {
        self.start_offset
    }

    pub fn end_offset(&self) -> i32 {
        self.end_offset
    }

    pub fn payload(&self) -> Option<&[u8]> {
        if !self.tracks_payloads() || self.payload_length == 0 {
            return None;
        }
        self.payload_bytes
            .get(self.payload_start..self.payload_start + self.payload_length)
    }

    // drops the pending positions of documents before the current one
    fn skip_positions(&mut self) -> Result<()> {
        let mut to_skip = (self.pos_pending_count - u64::from(self.freq)) as usize;
        let left_in_block = BLOCK_SIZE - self.pos_buffer_upto;
        if to_skip < left_in_block {
            let end = self.pos_buffer_upto + to_skip;
            self.advance_buffer_to(end);
        } else {
            to_skip -= left_in_block;
            while to_skip >= BLOCK_SIZE {
                if Some(self.pos_in.file_pointer()) == self.last_pos_block_fp {
                    return Err(PostingsError::corrupt(
                        "position count exceeds the term's packed blocks",
                        self.pos_in.name(),
                    ));
                }
                self.skip_block()?;
                to_skip -= BLOCK_SIZE;
            }
            self.refill_positions()?;
            self.payload_byte_upto = 0;
            self.pos_buffer_upto = 0;
            self.advance_buffer_to(to_skip);
        }
        self.position = 0;
        self.last_start_offset = 0;
        Ok(())
    }

    fn advance_buffer_to(&mut self, end: usize) {
        if self.tracks_payloads() {
            for i in self.pos_buffer_upto..end {
                self.payload_byte_upto += self.payload_length_buffer.get(i) as usize;
            }
        }
        self.pos_buffer_upto = end;
    }

    fn skip_block(&mut self) -> Result<()> {
        self.for_util.skip(&mut self.pos_in)?;
        self.stats.pos_blocks_skipped += 1;
        if let Some(pay_in) = self.pay_in.as_mut() {
            if self.features.index_has_payloads {
                self.for_util.skip(pay_in)?;
                let num_bytes = pay_in.read_vint()?;
                pay_in.skip_bytes(u64::from(num_bytes))?;
                self.stats.pay_blocks_skipped += 1;
            }
            if self.features.index_has_offsets {
                self.for_util.skip(pay_in)?;
                self.for_util.skip(pay_in)?;
                self.stats.pay_blocks_skipped += 2;
            }
        }
        Ok(())
    }

    fn refill_positions(&mut self) -> Result<()> {
        if Some(self.pos_in.file_pointer()) == self.last_pos_block_fp {
            return self.read_vint_block();
        }
        self.for_util.decode(&mut self.pos_in, &mut self.pos_delta_buffer)?;
        self.stats.pos_blocks_decoded += 1;
        self.pos_state = BlockState::Decoded;

        let Some(pay_in) = self.pay_in.as_mut() else {
            // nothing in the pay stream is followed
            self.pay_state = BlockState::Skipped;
            return Ok(());
        };
        if self.features.index_has_payloads {
            if self.features.needs_payloads {
                self.for_util.decode(pay_in, &mut self.payload_length_buffer)?;
                let num_bytes = pay_in.read_vint()? as usize;
                if self.payload_bytes.len() < num_bytes {
                    self.payload_bytes.resize(num_bytes, 0);
                }
                pay_in.read_bytes(&mut self.payload_bytes[..num_bytes])?;
                self.stats.pay_blocks_decoded += 1;
            } else {
                self.for_util.skip(pay_in)?;
                let num_bytes = pay_in.read_vint()?;
                pay_in.skip_bytes(u64::from(num_bytes))?;
                self.stats.pay_blocks_skipped += 1;
            }
            self.payload_byte_upto = 0;
        }
        if self.features.index_has_offsets {
            if self.features.needs_offsets {
                self.for_util.decode(pay_in, &mut self.offset_start_delta_buffer)?;
                self.for_util.decode(pay_in, &mut self.offset_length_buffer)?;
                self.stats.pay_blocks_decoded += 2;
            } else {
                self.for_util.skip(pay_in)?;
                self.for_util.skip(pay_in)?;
                self.stats.pay_blocks_skipped += 2;
            }
        }
        self.pay_state = BlockState::Decoded;
        Ok(())
    }

    // the tail lives in the pos stream with payloads and offsets inline
    fn read_vint_block(&mut self) -> Result<()> {
        let count = (self.total_term_freq % BLOCK_SIZE as u64) as usize;
        let keep_payloads = self.tracks_payloads();
        let mut payload_length = 0u32;
        let mut offset_length = 0u32;
        self.payload_byte_upto = 0;
        for i in 0..count {
            let code = self.pos_in.read_vint()?;
            if self.features.index_has_payloads {
                if code & 1 != 0 {
                    payload_length = self.pos_in.read_vint()?;
                }
                self.payload_length_buffer.set(i, payload_length);
                self.pos_delta_buffer.set(i, code >> 1);
                let len = payload_length as usize;
                if len != 0 {
                    if keep_payloads {
                        let end = self.payload_byte_upto + len;
                        if self.payload_bytes.len() < end {
                            self.payload_bytes.resize(end, 0);
                        }
                        self.pos_in
                            .read_bytes(&mut self.payload_bytes[self.payload_byte_upto..end])?;
                        self.payload_byte_upto = end;
                    } else {
                        self.pos_in.skip_bytes(len as u64)?;
                    }
                }
            } else {
                self.pos_delta_buffer.set(i, code);
            }
            if self.features.index_has_offsets {
                let delta_code = self.pos_in.read_vint()?;
                if delta_code & 1 != 0 {
                    offset_length = self.pos_in.read_vint()?;
                }
                self.offset_start_delta_buffer.set(i, delta_code >> 1);
                self.offset_length_buffer.set(i, offset_length);
            }
        }
        self.payload_byte_upto = 0;
        self.stats.vint_blocks_decoded += 1;
        self.pos_state = BlockState::Decoded;
        self.pay_state = BlockState::Decoded;
        Ok(())
    }
}
