use super::{
    version_for_packing, DocId, IntBlockTermState, DOC_CODEC, DOC_EXTENSION, MAX_POSITION,
    NO_MORE_DOCS, PAY_CODEC, PAY_EXTENSION, POS_CODEC, POS_EXTENSION, TERMS_CODEC,
};
use crate::algorithm::{ForUtil, IntBlock, BLOCK_SIZE};
use crate::error::{PostingsError, Result};
use crate::field::{FieldInfo, FieldNormRead, SegmentWriteState};
use crate::skip::{CompetitiveImpactAccumulator, SkipCheckpoint, SkipListWrite, SkipWriter};
use crate::store::codec_util::{write_footer, write_index_header};
use crate::store::{segment_file_name, DataOutput, IndexOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Idle,
    TermOpen,
    DocOpen,
}

/// Writes the postings of one segment, term by term:
///
/// ```text
/// set_field (start_term (start_doc add_position* finish_doc)+ finish_term)*
/// ```
///
/// followed by `close`.
pub struct PostingsWriter {
    doc_out: IndexOutput,
    pos_out: Option<IndexOutput>,
    pay_out: Option<IndexOutput>,
    for_util: ForUtil,
    version: i32,
    state: WriterState,

    write_freqs: bool,
    write_positions: bool,
    write_payloads: bool,
    write_offsets: bool,
    norms: Option<Box<dyn FieldNormRead>>,
    last_state: IntBlockTermState,

    doc_start_fp: u64,
    pos_start_fp: u64,
    pay_start_fp: u64,

    doc_delta_buffer: IntBlock,
    freq_buffer: IntBlock,
    doc_buffer_upto: usize,
    last_doc_id: DocId,
    doc_count: u32,
    total_term_freq: u64,

    pos_delta_buffer: IntBlock,
    payload_length_buffer: IntBlock,
    offset_start_delta_buffer: IntBlock,
    offset_length_buffer: IntBlock,
    pos_buffer_upto: usize,
    payload_bytes: Vec<u8>,
    last_position: i32,
    last_start_offset: i32,
    doc_freq: u32,
    doc_positions: u32,

    // set when a doc block fills up; its skip entry is written by the next
    // start_doc, once the doc stream pointer is past the block
    last_block_doc_id: Option<DocId>,
    last_block_pos_fp: u64,
    last_block_pay_fp: u64,
    last_block_pos_buffer_upto: usize,
    last_block_payload_byte_upto: usize,

    skip_writer: SkipWriter,
    competitive_impacts: CompetitiveImpactAccumulator,
}

impl PostingsWriter {
    /// Creates the segment's streams. Streams opened before a failure are
    /// dropped and never published.
    pub fn open(state: &SegmentWriteState) -> Result<Self> {
        let version = version_for_packing(state.option.packing);
        let create = |ext: &str, codec: &str| -> Result<IndexOutput> {
            let name = segment_file_name(&state.segment_name, &state.segment_suffix, ext);
            let mut out = state.directory.create_output(&name)?;
            write_index_header(
                &mut out,
                codec,
                version,
                &state.segment_id,
                &state.segment_suffix,
            )?;
            Ok(out)
        };

        let doc_out = create(DOC_EXTENSION, DOC_CODEC)?;
        let field_infos = &state.field_infos;
        let (pos_out, pay_out) = if field_infos.has_prox() {
            let pos_out = create(POS_EXTENSION, POS_CODEC)?;
            let pay_out = if field_infos.has_payloads() || field_infos.has_offsets() {
                Some(create(PAY_EXTENSION, PAY_CODEC)?)
            } else {
                None
            };
            (Some(pos_out), pay_out)
        } else {
            (None, None)
        };
        tracing::debug!(
            segment = %state.segment_name,
            version,
            positions = pos_out.is_some(),
            payloads = pay_out.is_some(),
            "opened postings writer"
        );

        Ok(Self {
            doc_out,
            pos_out,
            pay_out,
            for_util: ForUtil::new(state.option.packing),
            version,
            state: WriterState::Idle,
            write_freqs: false,
            write_positions: false,
            write_payloads: false,
            write_offsets: false,
            norms: None,
            last_state: IntBlockTermState::default(),
            doc_start_fp: 0,
            pos_start_fp: 0,
            pay_start_fp: 0,
            doc_delta_buffer: IntBlock::new(),
            freq_buffer: IntBlock::new(),
            doc_buffer_upto: 0,
            last_doc_id: 0,
            doc_count: 0,
            total_term_freq: 0,
            pos_delta_buffer: IntBlock::new(),
            payload_length_buffer: IntBlock::new(),
            offset_start_delta_buffer: IntBlock::new(),
            offset_length_buffer: IntBlock::new(),
            pos_buffer_upto: 0,
            payload_bytes: Vec::new(),
            last_position: 0,
            last_start_offset: 0,
            doc_freq: 0,
            doc_positions: 0,
            last_block_doc_id: None,
            last_block_pos_fp: 0,
            last_block_pay_fp: 0,
            last_block_pos_buffer_upto: 0,
            last_block_payload_byte_upto: 0,
            skip_writer: SkipWriter::new(&state.option),
            competitive_impacts: CompetitiveImpactAccumulator::new(),
        })
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    fn expect_state(&self, expected: WriterState, op: &str) -> Result<()> {
        if self.state != expected {
            return Err(PostingsError::illegal_state(format!(
                "{op} called in state {:?}, expected {expected:?}",
                self.state
            )));
        }
        Ok(())
    }

    fn corrupt(&self, message: String) -> PostingsError {
        PostingsError::corrupt(message, self.doc_out.name())
    }

    /// Writes the terms dictionary header: the codec header and the block
    /// size, checked by [`PostingsReader::init`](super::PostingsReader::init).
    pub fn init<O: DataOutput + ?Sized>(
        &self,
        terms_out: &mut O,
        state: &SegmentWriteState,
    ) -> Result<()> {
        write_index_header(
            terms_out,
            TERMS_CODEC,
            self.version,
            &state.segment_id,
            &state.segment_suffix,
        )?;
        terms_out.write_vint(BLOCK_SIZE as u32)
    }

    /// Switches to a new field. `norms` feeds the competitive impacts of
    /// fields that have norms; documents without a norm count as norm 1.
    pub fn set_field(
        &mut self,
        field: &FieldInfo,
        norms: Option<Box<dyn FieldNormRead>>,
    ) -> Result<()> {
        self.expect_state(WriterState::Idle, "set_field")?;
        let options = field.index_options;
        self.write_freqs = options.has_freqs();
        self.write_positions = options.has_positions();
        self.write_payloads = field.has_payloads();
        self.write_offsets = options.has_offsets();
        if self.write_positions && self.pos_out.is_none() {
            return Err(PostingsError::illegal_state(format!(
                "field {:?} has positions but the segment was opened without them",
                field.name
            )));
        }
        if (self.write_payloads || self.write_offsets) && self.pay_out.is_none() {
            return Err(PostingsError::illegal_state(format!(
                "field {:?} has payloads or offsets but the segment was opened without them",
                field.name
            )));
        }
        self.norms = if field.has_norms { norms } else { None };
        self.last_state = IntBlockTermState::default();
        Ok(())
    }

    pub fn start_term(&mut self) -> Result<()> {
        self.expect_state(WriterState::Idle, "start_term")?;
        self.doc_start_fp = self.doc_out.file_pointer();
        if let Some(pos_out) = &self.pos_out {
            self.pos_start_fp = pos_out.file_pointer();
        }
        if let Some(pay_out) = &self.pay_out {
            self.pay_start_fp = pay_out.file_pointer();
        }
        self.last_doc_id = 0;
        self.last_block_doc_id = None;
        self.doc_count = 0;
        self.total_term_freq = 0;
        self.doc_buffer_upto = 0;
        self.pos_buffer_upto = 0;
        self.payload_bytes.clear();
        self.skip_writer
            .reset_skip(self.doc_start_fp, self.pos_start_fp, self.pay_start_fp);
        self.competitive_impacts.clear();
        self.state = WriterState::TermOpen;
        Ok(())
    }

    /// Adds a document to the current term. `freq` is ignored for fields
    /// without freqs.
    pub fn start_doc(&mut self, doc_id: DocId, freq: u32) -> Result<()> {
        self.expect_state(WriterState::TermOpen, "start_doc")?;

        if !(0..NO_MORE_DOCS).contains(&doc_id) {
            return Err(self.corrupt(format!("doc id {doc_id} out of range")));
        }
        if self.doc_count > 0 && doc_id <= self.last_doc_id {
            return Err(self.corrupt(format!(
                "docs out of order ({doc_id} <= {})",
                self.last_doc_id
            )));
        }
        let freq = if self.write_freqs { freq } else { 1 };
        if freq == 0 {
            return Err(self.corrupt(format!("doc {doc_id} has a freq of 0")));
        }

        // the block filled by the previous doc gets its skip entry now
        if let Some(last_doc) = self.last_block_doc_id {
            if self.doc_buffer_upto == 0 {
                let checkpoint = SkipCheckpoint {
                    last_doc,
                    doc_fp: self.doc_out.file_pointer(),
                    pos_fp: self.last_block_pos_fp,
                    pay_fp: self.last_block_pay_fp,
                    pos_buffer_upto: self.last_block_pos_buffer_upto as u32,
                    payload_byte_upto: self.last_block_payload_byte_upto as u32,
                };
                self.skip_writer
                    .buffer_skip(&checkpoint, &self.competitive_impacts)?;
                self.competitive_impacts.clear();
            }
        }

        self.doc_delta_buffer
            .set(self.doc_buffer_upto, (doc_id - self.last_doc_id) as u32);
        if self.write_freqs {
            self.freq_buffer.set(self.doc_buffer_upto, freq);
        }
        self.doc_buffer_upto += 1;
        self.doc_count += 1;
        if self.doc_buffer_upto == BLOCK_SIZE {
            self.for_util.encode(&self.doc_delta_buffer, &mut self.doc_out)?;
            if self.write_freqs {
                self.for_util.encode(&self.freq_buffer, &mut self.doc_out)?;
            }
            // doc_buffer_upto is reset by finish_doc
        }

        self.last_doc_id = doc_id;
        self.last_position = 0;
        self.last_start_offset = 0;
        self.total_term_freq += u64::from(freq);
        self.doc_freq = freq;
        self.doc_positions = 0;

        let norm = self
            .norms
            .as_ref()
            .and_then(|norms| norms.read(doc_id))
            .unwrap_or(1);
        self.competitive_impacts.add(freq, norm);
        self.state = WriterState::DocOpen;
        Ok(())
    }

    /// Adds the next position of the current document. `payload` and the
    /// offsets are ignored unless the field indexes them.
    pub fn add_position(
        &mut self,
        position: i32,
        payload: Option<&[u8]>,
        start_offset: i32,
        end_offset: i32,
    ) -> Result<()> {
        self.expect_state(WriterState::DocOpen, "add_position")?;
        if !self.write_positions {
            return Err(PostingsError::illegal_state(
                "add_position on a field without positions",
            ));
        }
        if position > MAX_POSITION {
            return Err(self.corrupt(format!(
                "position {position} is too large, must be <= {MAX_POSITION}"
            )));
        }
        if position < 0 {
            return Err(self.corrupt(format!("position {position} is negative")));
        }
        if position < self.last_position {
            return Err(self.corrupt(format!(
                "positions out of order ({position} < {})",
                self.last_position
            )));
        }
        if self.write_offsets
            && (start_offset < self.last_start_offset || end_offset < start_offset)
        {
            return Err(self.corrupt(format!(
                "invalid offsets [{start_offset}, {end_offset}) after start offset {}",
                self.last_start_offset
            )));
        }
        if self.doc_positions == self.doc_freq {
            return Err(PostingsError::illegal_state(format!(
                "more than freq ({}) positions for doc {}",
                self.doc_freq, self.last_doc_id
            )));
        }

        let upto = self.pos_buffer_upto;
        self.pos_delta_buffer
            .set(upto, (position - self.last_position) as u32);
        if self.write_payloads {
            match payload {
                Some(payload) if !payload.is_empty() => {
                    self.payload_length_buffer.set(upto, payload.len() as u32);
                    self.payload_bytes.extend_from_slice(payload);
                }
                _ => self.payload_length_buffer.set(upto, 0),
            }
        }
        if self.write_offsets {
            self.offset_start_delta_buffer
                .set(upto, (start_offset - self.last_start_offset) as u32);
            self.offset_length_buffer
                .set(upto, (end_offset - start_offset) as u32);
            self.last_start_offset = start_offset;
        }

        self.pos_buffer_upto += 1;
        self.last_position = position;
        self.doc_positions += 1;
        if self.pos_buffer_upto == BLOCK_SIZE {
            self.flush_position_block()?;
        }
        Ok(())
    }

    fn flush_position_block(&mut self) -> Result<()> {
        let Some(pos_out) = self.pos_out.as_mut() else {
            return Err(PostingsError::illegal_state("no position stream"));
        };
        self.for_util.encode(&self.pos_delta_buffer, pos_out)?;
        if let Some(pay_out) = self.pay_out.as_mut() {
            if self.write_payloads {
                self.for_util.encode(&self.payload_length_buffer, pay_out)?;
                pay_out.write_vint(self.payload_bytes.len() as u32)?;
                pay_out.write_bytes(&self.payload_bytes)?;
                self.payload_bytes.clear();
            }
            if self.write_offsets {
                self.for_util.encode(&self.offset_start_delta_buffer, pay_out)?;
                self.for_util.encode(&self.offset_length_buffer, pay_out)?;
            }
        }
        self.pos_buffer_upto = 0;
        Ok(())
    }

    pub fn finish_doc(&mut self) -> Result<()> {
        self.expect_state(WriterState::DocOpen, "finish_doc")?;
        if self.write_positions && self.doc_positions != self.doc_freq {
            return Err(PostingsError::illegal_state(format!(
                "doc {} has {} positions but freq {}",
                self.last_doc_id, self.doc_positions, self.doc_freq
            )));
        }
        if self.doc_buffer_upto == BLOCK_SIZE {
            self.last_block_doc_id = Some(self.last_doc_id);
            if let Some(pos_out) = &self.pos_out {
                self.last_block_pos_fp = pos_out.file_pointer();
                self.last_block_pos_buffer_upto = self.pos_buffer_upto;
                self.last_block_payload_byte_upto = self.payload_bytes.len();
            }
            if let Some(pay_out) = &self.pay_out {
                self.last_block_pay_fp = pay_out.file_pointer();
            }
            self.doc_buffer_upto = 0;
        }
        self.state = WriterState::TermOpen;
        Ok(())
    }

    /// Flushes the partial blocks and skip data of the current term and
    /// returns its metadata.
    pub fn finish_term(&mut self) -> Result<IntBlockTermState> {
        self.expect_state(WriterState::TermOpen, "finish_term")?;
        if self.doc_count == 0 {
            return Err(PostingsError::illegal_state("finish_term without documents"));
        }

        let singleton_doc_id = if self.doc_count == 1 {
            Some(self.doc_delta_buffer.get(0) as DocId)
        } else {
            self.write_doc_tail()?;
            None
        };

        let last_pos_block_offset = if self.write_positions {
            let offset = self.write_position_tail()?;
            (self.total_term_freq > BLOCK_SIZE as u64).then_some(offset)
        } else {
            None
        };

        let skip_offset = if self.doc_count as usize > BLOCK_SIZE {
            Some(self.skip_writer.write_skip(&mut self.doc_out)? - self.doc_start_fp)
        } else {
            None
        };

        let state = IntBlockTermState {
            doc_freq: self.doc_count,
            total_term_freq: self.total_term_freq,
            doc_start_fp: self.doc_start_fp,
            pos_start_fp: self.pos_start_fp,
            pay_start_fp: self.pay_start_fp,
            skip_offset,
            last_pos_block_offset,
            singleton_doc_id,
        };
        tracing::trace!(
            doc_freq = state.doc_freq,
            total_term_freq = state.total_term_freq,
            singleton = singleton_doc_id.is_some(),
            "finished term"
        );

        self.doc_buffer_upto = 0;
        self.doc_count = 0;
        self.last_doc_id = 0;
        self.state = WriterState::Idle;
        Ok(state)
    }

    fn write_doc_tail(&mut self) -> Result<()> {
        for i in 0..self.doc_buffer_upto {
            let delta = self.doc_delta_buffer.get(i);
            if !self.write_freqs {
                self.doc_out.write_vint(delta)?;
                continue;
            }
            let freq = self.freq_buffer.get(i);
            if freq == 1 {
                self.doc_out.write_vint((delta << 1) | 1)?;
            } else {
                self.doc_out.write_vint(delta << 1)?;
                self.doc_out.write_vint(freq)?;
            }
        }
        Ok(())
    }

    // returns the offset of the tail from the term's first position block
    fn write_position_tail(&mut self) -> Result<u64> {
        let Some(pos_out) = self.pos_out.as_mut() else {
            return Err(PostingsError::illegal_state("no position stream"));
        };
        let offset = pos_out.file_pointer() - self.pos_start_fp;
        let mut last_payload_length = None;
        let mut last_offset_length = None;
        let mut payload_read_upto = 0;
        for i in 0..self.pos_buffer_upto {
            let pos_delta = self.pos_delta_buffer.get(i);
            if self.write_payloads {
                let length = self.payload_length_buffer.get(i);
                if last_payload_length == Some(length) {
                    pos_out.write_vint(pos_delta << 1)?;
                } else {
                    last_payload_length = Some(length);
                    pos_out.write_vint((pos_delta << 1) | 1)?;
                    pos_out.write_vint(length)?;
                }
                if length != 0 {
                    let end = payload_read_upto + length as usize;
                    pos_out.write_bytes(&self.payload_bytes[payload_read_upto..end])?;
                    payload_read_upto = end;
                }
            } else {
                pos_out.write_vint(pos_delta)?;
            }
            if self.write_offsets {
                let delta = self.offset_start_delta_buffer.get(i);
                let length = self.offset_length_buffer.get(i);
                if last_offset_length == Some(length) {
                    pos_out.write_vint(delta << 1)?;
                } else {
                    last_offset_length = Some(length);
                    pos_out.write_vint((delta << 1) | 1)?;
                    pos_out.write_vint(length)?;
                }
            }
        }
        self.payload_bytes.clear();
        self.pos_buffer_upto = 0;
        Ok(offset)
    }

    /// Writes the metadata of `state` to the terms dictionary, relative to
    /// the previous term of the field unless `absolute`.
    pub fn encode_term<O: DataOutput + ?Sized>(
        &mut self,
        out: &mut O,
        field: &FieldInfo,
        state: &IntBlockTermState,
        absolute: bool,
    ) -> Result<()> {
        if absolute {
            self.last_state = IntBlockTermState::default();
        }
        state.encode(out, field, &self.last_state)?;
        self.last_state = state.clone();
        Ok(())
    }

    /// Writes the footers and closes every stream.
    pub fn close(self) -> Result<()> {
        if self.state != WriterState::Idle {
            return Err(PostingsError::illegal_state(format!(
                "close called in state {:?}",
                self.state
            )));
        }
        let PostingsWriter {
            doc_out,
            pos_out,
            pay_out,
            ..
        } = self;
        for mut out in std::iter::once(doc_out).chain(pos_out).chain(pay_out) {
            write_footer(&mut out)?;
            out.close()?;
        }
        tracing::debug!("closed postings writer");
        Ok(())
    }
}
