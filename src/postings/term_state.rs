use super::DocId;
use crate::algorithm::BLOCK_SIZE;
use crate::error::{PostingsError, Result};
use crate::field::FieldInfo;
use crate::store::{DataInput, DataOutput};

/// Everything the reader needs to find one term's postings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntBlockTermState {
    pub doc_freq: u32,
    pub total_term_freq: u64,
    pub doc_start_fp: u64,
    pub pos_start_fp: u64,
    pub pay_start_fp: u64,
    /// Skip data offset relative to `doc_start_fp`, present when there is
    /// more than one doc block.
    pub skip_offset: Option<u64>,
    /// Offset of the vint position tail relative to `pos_start_fp`, present
    /// when there is more than one position block.
    pub last_pos_block_offset: Option<u64>,
    /// The only document of a term with `doc_freq == 1`.
    pub singleton_doc_id: Option<DocId>,
}

impl IntBlockTermState {
    /// Writes the stream pointers as deltas from `last`, followed by the
    /// optional fields. `doc_freq` and `total_term_freq` are stored by the
    /// terms dictionary.
    pub fn encode<O: DataOutput + ?Sized>(
        &self,
        out: &mut O,
        field: &FieldInfo,
        last: &IntBlockTermState,
    ) -> Result<()> {
        out.write_vlong(self.doc_start_fp - last.doc_start_fp)?;
        let has_positions = field.index_options.has_positions();
        if has_positions {
            out.write_vlong(self.pos_start_fp - last.pos_start_fp)?;
            if field.has_payloads() || field.index_options.has_offsets() {
                out.write_vlong(self.pay_start_fp - last.pay_start_fp)?;
            }
        }
        if let Some(doc) = self.singleton_doc_id {
            out.write_vint(doc as u32)?;
        }
        if has_positions {
            if let Some(offset) = self.last_pos_block_offset {
                out.write_vlong(offset)?;
            }
        }
        if let Some(offset) = self.skip_offset {
            out.write_vlong(offset)?;
        }
        Ok(())
    }

    /// Inverse of `encode`, applied on top of the previous term's pointers
    /// unless `absolute`. `doc_freq` and `total_term_freq` must already be
    /// set.
    pub fn decode<I: DataInput + ?Sized>(
        &mut self,
        input: &mut I,
        field: &FieldInfo,
        absolute: bool,
    ) -> Result<()> {
        if absolute {
            self.doc_start_fp = 0;
            self.pos_start_fp = 0;
            self.pay_start_fp = 0;
        }
        self.doc_start_fp += input.read_vlong()?;
        let has_positions = field.index_options.has_positions();
        if has_positions {
            self.pos_start_fp += input.read_vlong()?;
            if field.has_payloads() || field.index_options.has_offsets() {
                self.pay_start_fp += input.read_vlong()?;
            }
        }
        if self.doc_freq == 0 {
            return Err(PostingsError::corrupt(
                "term without documents",
                input.resource(),
            ));
        }
        self.singleton_doc_id = if self.doc_freq == 1 {
            Some(input.read_vint()? as DocId)
        } else {
            None
        };
        self.last_pos_block_offset = if has_positions && self.total_term_freq > BLOCK_SIZE as u64 {
            Some(input.read_vlong()?)
        } else {
            None
        };
        self.skip_offset = if self.doc_freq as usize > BLOCK_SIZE {
            Some(input.read_vlong()?)
        } else {
            None
        };
        Ok(())
    }
}
