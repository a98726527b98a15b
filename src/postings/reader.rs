use enum_dispatch::enum_dispatch;

use super::iterator::{DecodeStats, DocIterator, ImpactsIterator, PostingIterator};
use super::position_cursor::{PositionCursor, PositionFeatures};
use super::{
    packing_for_version, BlockDocIterator, BlockImpactsIterator, DocId, EverythingIterator,
    IntBlockTermState, SlowImpactsIterator, DOC_CODEC, DOC_EXTENSION, PAY_CODEC, PAY_EXTENSION,
    POS_CODEC, POS_EXTENSION, TERMS_CODEC, VERSION_CURRENT, VERSION_START,
};
use crate::algorithm::{ForUtil, BLOCK_SIZE};
use crate::error::{PostingsError, Result};
use crate::field::{FieldInfo, PostingFlags, SegmentReadState};
use crate::skip::Impacts;
use crate::store::codec_util::{check_index_header, checksum_entire_file, retrieve_checksum};
use crate::store::{segment_file_name, DataInput, IndexInput};

#[enum_dispatch(DocIterator, PostingIterator)]
pub enum BlockPostings {
    BlockDocIterator,
    EverythingIterator,
}

#[enum_dispatch(DocIterator, PostingIterator, ImpactsIterator)]
pub enum BlockImpacts {
    BlockImpactsIterator,
    SlowImpactsIterator,
}

/// Opens the streams of one segment and hands out iterators over the
/// postings of individual terms.
pub struct PostingsReader {
    doc_in: IndexInput,
    pos_in: Option<IndexInput>,
    pay_in: Option<IndexInput>,
    version: i32,
    for_util: ForUtil,
}

impl PostingsReader {
    pub fn open(state: &SegmentReadState) -> Result<Self> {
        let open = |ext: &str, codec: &str| -> Result<(IndexInput, i32)> {
            let name = segment_file_name(&state.segment_name, &state.segment_suffix, ext);
            let mut input = state.directory.open_input(&name)?;
            let version = check_index_header(
                &mut input,
                codec,
                VERSION_START,
                VERSION_CURRENT,
                &state.segment_id,
                &state.segment_suffix,
            )?;
            // a truncated file fails here rather than on some later read
            retrieve_checksum(&input)?;
            Ok((input, version))
        };

        let (doc_in, version) = open(DOC_EXTENSION, DOC_CODEC)?;
        let check_version = |input: &IndexInput, other: i32| {
            if other == version {
                Ok(())
            } else {
                Err(PostingsError::corrupt(
                    format!("format version {other} differs from doc stream version {version}"),
                    input.name(),
                ))
            }
        };

        let field_infos = &state.field_infos;
        let (pos_in, pay_in) = if field_infos.has_prox() {
            let (pos_in, pos_version) = open(POS_EXTENSION, POS_CODEC)?;
            check_version(&pos_in, pos_version)?;
            let pay_in = if field_infos.has_payloads() || field_infos.has_offsets() {
                let (pay_in, pay_version) = open(PAY_EXTENSION, PAY_CODEC)?;
                check_version(&pay_in, pay_version)?;
                Some(pay_in)
            } else {
                None
            };
            (Some(pos_in), pay_in)
        } else {
            (None, None)
        };

        let reader = Self {
            for_util: ForUtil::new(packing_for_version(version)?),
            doc_in,
            pos_in,
            pay_in,
            version,
        };
        if state.option.verify_checksums {
            reader.check_integrity()?;
        }
        tracing::debug!(
            segment = %state.segment_name,
            version,
            positions = reader.pos_in.is_some(),
            payloads = reader.pay_in.is_some(),
            "opened postings reader"
        );
        Ok(reader)
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    /// Checks the terms dictionary header written by
    /// [`PostingsWriter::init`](super::PostingsWriter::init).
    pub fn init<I: DataInput + ?Sized>(
        &self,
        terms_in: &mut I,
        state: &SegmentReadState,
    ) -> Result<()> {
        let version = check_index_header(
            terms_in,
            TERMS_CODEC,
            VERSION_START,
            VERSION_CURRENT,
            &state.segment_id,
            &state.segment_suffix,
        )?;
        if version != self.version {
            return Err(PostingsError::corrupt(
                format!(
                    "terms version {version} differs from postings version {}",
                    self.version
                ),
                terms_in.resource(),
            ));
        }
        let index_block_size = terms_in.read_vint()?;
        if index_block_size as usize != BLOCK_SIZE {
            return Err(PostingsError::BlockSizeMismatch {
                index: index_block_size,
                expected: BLOCK_SIZE as u32,
            });
        }
        Ok(())
    }

    pub fn decode_term<I: DataInput + ?Sized>(
        &self,
        input: &mut I,
        field: &FieldInfo,
        state: &mut IntBlockTermState,
        absolute: bool,
    ) -> Result<()> {
        state.decode(input, field, absolute)
    }

    pub fn postings(
        &self,
        field: &FieldInfo,
        state: &IntBlockTermState,
        flags: PostingFlags,
    ) -> Result<BlockPostings> {
        self.postings_reuse(field, state, None, flags)
    }

    /// Like `postings`, resetting `reuse` instead of allocating when it was
    /// created by this reader for a compatible field and flags.
    pub fn postings_reuse(
        &self,
        field: &FieldInfo,
        state: &IntBlockTermState,
        reuse: Option<BlockPostings>,
        flags: PostingFlags,
    ) -> Result<BlockPostings> {
        let index_has_freq = field.index_options.has_freqs();
        match self.position_features(field, flags)? {
            None => {
                let mut iter = match reuse {
                    Some(BlockPostings::BlockDocIterator(iter))
                        if iter.can_reuse(&self.doc_in, index_has_freq) =>
                    {
                        iter
                    }
                    _ => BlockDocIterator::new(self.for_util, self.doc_in.clone(), index_has_freq),
                };
                iter.reset(state, flags)?;
                Ok(iter.into())
            }
            Some(features) => {
                let mut iter = match reuse {
                    Some(BlockPostings::EverythingIterator(iter))
                        if iter.can_reuse(&self.doc_in, features) =>
                    {
                        iter
                    }
                    _ => EverythingIterator::new(
                        self.for_util,
                        self.doc_in.clone(),
                        self.pos_input()?,
                        self.pay_input(features)?,
                        features,
                    ),
                };
                iter.reset(state)?;
                Ok(iter.into())
            }
        }
    }

    /// Iterator exposing impacts. Posting lists of a single block have no
    /// skip data and get unbounded impacts.
    pub fn impacts(
        &self,
        field: &FieldInfo,
        state: &IntBlockTermState,
        flags: PostingFlags,
    ) -> Result<BlockImpacts> {
        if state.doc_freq as usize <= BLOCK_SIZE {
            return Ok(SlowImpactsIterator::new(self.postings(field, state, flags)?).into());
        }
        let positions = match self.position_features(field, flags)? {
            Some(features) => Some(PositionCursor::new(
                self.for_util,
                self.pos_input()?,
                self.pay_input(features)?,
                features,
            )),
            None => None,
        };
        let mut iter = BlockImpactsIterator::new(
            self.for_util,
            self.doc_in.clone(),
            field.index_options.has_freqs(),
            positions,
        );
        iter.reset(state, flags)?;
        Ok(iter.into())
    }

    /// Verifies the checksum of every stream.
    pub fn check_integrity(&self) -> Result<()> {
        checksum_entire_file(&self.doc_in)?;
        if let Some(pos_in) = &self.pos_in {
            checksum_entire_file(pos_in)?;
        }
        if let Some(pay_in) = &self.pay_in {
            checksum_entire_file(pay_in)?;
        }
        Ok(())
    }

    // None when positions are not requested
    fn position_features(
        &self,
        field: &FieldInfo,
        flags: PostingFlags,
    ) -> Result<Option<PositionFeatures>> {
        if !flags.contains(PostingFlags::POSITIONS) {
            return Ok(None);
        }
        if !field.index_options.has_positions() {
            return Err(PostingsError::illegal_state(format!(
                "field {:?} was indexed without positions",
                field.name
            )));
        }
        Ok(Some(PositionFeatures {
            index_has_payloads: field.has_payloads(),
            index_has_offsets: field.index_options.has_offsets(),
            needs_payloads: field.has_payloads() && flags.contains(PostingFlags::PAYLOADS),
            needs_offsets: field.index_options.has_offsets()
                && flags.contains(PostingFlags::OFFSETS),
        }))
    }

    fn pos_input(&self) -> Result<IndexInput> {
        self.pos_in
            .clone()
            .ok_or_else(|| PostingsError::illegal_state("segment has no position stream"))
    }

    fn pay_input(&self, features: PositionFeatures) -> Result<Option<IndexInput>> {
        if !features.uses_pay_stream() {
            return Ok(None);
        }
        self.pay_in
            .clone()
            .map(Some)
            .ok_or_else(|| PostingsError::illegal_state("segment has no payload stream"))
    }
}
