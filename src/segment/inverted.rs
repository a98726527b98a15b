use std::collections::BTreeMap;

use crate::error::{PostingsError, Result};
use crate::field::{FieldInfo, FieldNormRead};
use crate::postings::{DocId, IntBlockTermState, PostingsWriter, MAX_POSITION, NO_MORE_DOCS};
use crate::utils::vint;

/// Inverted lists of one field, buffered in memory until they are flushed
/// through a [`PostingsWriter`].
pub struct InvertedWriter {
    field: FieldInfo,
    term_index: BTreeMap<Vec<u8>, TermRecorder>,
    // tokens per document, only kept for fields with norms
    doc_lengths: BTreeMap<DocId, u64>,
}

impl InvertedWriter {
    pub fn new(field: FieldInfo) -> Self {
        Self {
            field,
            term_index: BTreeMap::new(),
            doc_lengths: BTreeMap::new(),
        }
    }

    pub fn field(&self) -> &FieldInfo {
        &self.field
    }

    /// Records one occurrence of `term` in `doc_id`. Documents of a term
    /// must arrive in increasing order, and the positions and offsets of a
    /// document in increasing order. Positions, payloads and offsets are
    /// dropped when the field does not index them.
    pub fn add_token(
        &mut self,
        doc_id: DocId,
        term: &[u8],
        position: i32,
        payload: Option<&[u8]>,
        start_offset: i32,
        end_offset: i32,
    ) -> Result<()> {
        if !(0..NO_MORE_DOCS).contains(&doc_id) {
            return Err(self.corrupt(format!("doc id {doc_id} out of range")));
        }
        let options = self.field.index_options;
        let has_payloads = self.field.has_payloads;

        let field_name = &self.field.name;
        let recorder = self
            .term_index
            .entry(term.to_vec())
            .or_insert_with(TermRecorder::new);
        if doc_id < recorder.current_doc {
            return Err(PostingsError::corrupt(
                format!(
                    "doc {doc_id} added after doc {} for the same term",
                    recorder.current_doc
                ),
                field_name,
            ));
        }
        let same_doc = doc_id == recorder.current_doc;

        if options.has_positions() {
            let last_position = if same_doc { recorder.last_position } else { 0 };
            if !(0..=MAX_POSITION).contains(&position) || position < last_position {
                return Err(PostingsError::corrupt(
                    format!("position {position} of doc {doc_id} is out of order or range"),
                    field_name,
                ));
            }
            if options.has_offsets() {
                let last_start = if same_doc { recorder.last_start_offset } else { 0 };
                if start_offset < last_start || end_offset < start_offset {
                    return Err(PostingsError::corrupt(
                        format!("invalid offsets [{start_offset}, {end_offset}) in doc {doc_id}"),
                        field_name,
                    ));
                }
            }
        }

        if !same_doc {
            recorder.try_close_doc()?;
            recorder.new_doc(doc_id)?;
        }
        recorder.current_freq += 1;
        if options.has_positions() {
            recorder.record_position(position)?;
            if has_payloads {
                let payload = payload.unwrap_or_default();
                vint::encode_vint32(payload.len() as u32, &mut recorder.prox)?;
                recorder.prox.extend_from_slice(payload);
            }
            if options.has_offsets() {
                recorder.record_offsets(start_offset, end_offset)?;
            }
        }

        if self.field.has_norms {
            *self.doc_lengths.entry(doc_id).or_default() += 1;
        }
        Ok(())
    }

    /// Number of distinct terms.
    pub fn len(&self) -> usize {
        self.term_index.len()
    }

    pub fn doc_freq(&self, term: &[u8]) -> u32 {
        self.term_index.get(term).map_or(0, |r| r.doc_freq)
    }

    pub fn terms(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.term_index.keys().map(Vec::as_slice)
    }

    /// Replays every term, in byte order, through `writer` and returns the
    /// metadata of each term.
    pub fn serialize(
        mut self,
        writer: &mut PostingsWriter,
    ) -> Result<Vec<(Vec<u8>, IntBlockTermState)>> {
        for recorder in self.term_index.values_mut() {
            recorder.try_close_doc()?;
        }
        let norms = self
            .field
            .has_norms
            .then(|| Box::new(std::mem::take(&mut self.doc_lengths)) as Box<dyn FieldNormRead>);
        writer.set_field(&self.field, norms)?;

        let options = self.field.index_options;
        let mut states = Vec::with_capacity(self.term_index.len());
        for (term, recorder) in self.term_index {
            writer.start_term()?;
            let mut prox = recorder.prox.as_slice();
            for entry in recorder.docs() {
                let (doc_id, freq) = entry?;
                writer.start_doc(doc_id, freq)?;
                if options.has_positions() {
                    let mut position = 0;
                    let mut start_offset = 0;
                    for _ in 0..freq {
                        position += vint::decode_vint32(&mut prox)? as i32;
                        let payload = if self.field.has_payloads {
                            let len = vint::decode_vint32(&mut prox)? as usize;
                            let payload = prox.get(..len).ok_or_else(|| {
                                PostingsError::illegal_state("truncated inverted buffer")
                            })?;
                            prox = &prox[len..];
                            Some(payload)
                        } else {
                            None
                        };
                        let mut end_offset = -1;
                        if options.has_offsets() {
                            start_offset += vint::decode_vint32(&mut prox)? as i32;
                            end_offset = start_offset + vint::decode_vint32(&mut prox)? as i32;
                        }
                        writer.add_position(position, payload, start_offset, end_offset)?;
                    }
                }
                writer.finish_doc()?;
            }
            states.push((term, writer.finish_term()?));
        }
        tracing::debug!(
            field = %self.field.name,
            terms = states.len(),
            "flushed inverted lists"
        );
        Ok(states)
    }

    fn corrupt(&self, message: String) -> PostingsError {
        PostingsError::corrupt(message, &self.field.name)
    }
}

// (doc delta, freq) pairs in `docs`, position data in `prox`, all vint
struct TermRecorder {
    docs: Vec<u8>,
    prox: Vec<u8>,
    current_doc: DocId,
    current_freq: u32,
    last_position: i32,
    last_start_offset: i32,
    doc_freq: u32,
}

impl TermRecorder {
    fn new() -> Self {
        Self {
            docs: Vec::new(),
            prox: Vec::new(),
            current_doc: -1,
            current_freq: 0,
            last_position: 0,
            last_start_offset: 0,
            doc_freq: 0,
        }
    }

    fn new_doc(&mut self, doc_id: DocId) -> Result<()> {
        let delta = (doc_id - self.current_doc) as u32;
        self.doc_freq += 1;
        self.current_doc = doc_id;
        self.last_position = 0;
        self.last_start_offset = 0;
        vint::encode_vint32(delta, &mut self.docs)?;
        Ok(())
    }

    fn record_position(&mut self, position: i32) -> Result<()> {
        vint::encode_vint32((position - self.last_position) as u32, &mut self.prox)?;
        self.last_position = position;
        Ok(())
    }

    fn record_offsets(&mut self, start_offset: i32, end_offset: i32) -> Result<()> {
        vint::encode_vint32((start_offset - self.last_start_offset) as u32, &mut self.prox)?;
        vint::encode_vint32((end_offset - start_offset) as u32, &mut self.prox)?;
        self.last_start_offset = start_offset;
        Ok(())
    }

    fn try_close_doc(&mut self) -> Result<()> {
        if self.current_freq == 0 {
            return Ok(());
        }
        vint::encode_vint32(self.current_freq, &mut self.docs)?;
        self.current_freq = 0;
        Ok(())
    }

    fn docs(&self) -> impl Iterator<Item = Result<(DocId, u32)>> + '_ {
        let mut doc_id: DocId = -1;
        let mut buffer = self.docs.as_slice();
        std::iter::from_fn(move || {
            if buffer.is_empty() {
                return None;
            }
            let entry = vint::decode_vint32(&mut buffer).and_then(|delta| {
                let freq = vint::decode_vint32(&mut buffer)?;
                doc_id += delta as DocId;
                Ok((doc_id, freq))
            });
            Some(entry)
        })
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::field::{FieldInfos, IndexOptions, PostingFlags, SegmentReadState, SegmentWriteState};
    use crate::options::PostingsOption;
    use crate::postings::{
        DocIterator, ImpactsIterator, PostingIterator, PostingsReader, NO_MORE_DOCS,
    };
    use crate::store::RamDirectory;

    fn write_state(dir: &RamDirectory, field: &FieldInfo) -> SegmentWriteState {
        SegmentWriteState {
            directory: Arc::new(dir.clone()),
            segment_name: "_1".to_string(),
            segment_suffix: String::new(),
            segment_id: [3; 16],
            field_infos: FieldInfos::new(vec![field.clone()]),
            option: PostingsOption::default(),
        }
    }

    fn flush(
        dir: &RamDirectory,
        inverted: InvertedWriter,
    ) -> (PostingsReader, Vec<(Vec<u8>, IntBlockTermState)>) {
        let state = write_state(dir, inverted.field());
        let mut writer = PostingsWriter::open(&state).unwrap();
        let terms = inverted.serialize(&mut writer).unwrap();
        writer.close().unwrap();
        let reader = PostingsReader::open(&SegmentReadState::from_write_state(&state)).unwrap();
        (reader, terms)
    }

    #[test]
    fn test_terms_in_byte_order() {
        let field = FieldInfo::new("title", 0, IndexOptions::DocsAndFreqs);
        let mut inverted = InvertedWriter::new(field.clone());
        for (doc, text) in ["b a b", "c a", "a"].iter().enumerate() {
            for (position, word) in text.split(' ').enumerate() {
                inverted
                    .add_token(doc as DocId, word.as_bytes(), position as i32, None, -1, -1)
                    .unwrap();
            }
        }
        assert_eq!(inverted.len(), 3);
        assert_eq!(inverted.doc_freq(b"a"), 3);
        assert_eq!(inverted.doc_freq(b"z"), 0);

        let dir = RamDirectory::new();
        let (reader, terms) = flush(&dir, inverted);
        let names: Vec<Vec<u8>> = terms.iter().map(|(t, _)| t.clone()).collect();
        assert_eq!(names, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
        assert_eq!(terms[0].1.doc_freq, 3);
        // "b" only occurs in doc 0, twice
        assert_eq!(terms[1].1.singleton_doc_id, Some(0));
        assert_eq!(terms[1].1.total_term_freq, 2);

        let mut iter = reader.postings(&field, &terms[0].1, PostingFlags::FREQS).unwrap();
        assert_eq!(iter.next_doc().unwrap(), 0);
        assert_eq!(iter.freq().unwrap(), 1);
        assert_eq!(iter.next_doc().unwrap(), 1);
        assert_eq!(iter.next_doc().unwrap(), 2);
        assert_eq!(iter.next_doc().unwrap(), NO_MORE_DOCS);
    }

    #[test]
    fn test_positions_payloads_offsets_survive_flush() {
        let field = FieldInfo::new("body", 0, IndexOptions::DocsAndFreqsAndPositionsAndOffsets)
            .with_payloads();
        let mut rng = StdRng::seed_from_u64(11);
        let mut inverted = InvertedWriter::new(field.clone());
        let mut expected = Vec::new();
        let mut doc_id = 0;
        for _ in 0..400 {
            doc_id += rng.gen_range(1..4);
            let mut positions = Vec::new();
            let mut position = 0;
            let mut offset = 0;
            for _ in 0..rng.gen_range(1..6) {
                position += rng.gen_range(0..5);
                offset += rng.gen_range(0..7);
                let payload: Vec<u8> = (0..rng.gen_range(0..3)).map(|_| rng.gen()).collect();
                inverted
                    .add_token(doc_id, b"term", position, Some(&payload), offset, offset + 2)
                    .unwrap();
                positions.push((position, payload, offset, offset + 2));
            }
            expected.push((doc_id, positions));
        }

        let dir = RamDirectory::new();
        let (reader, terms) = flush(&dir, inverted);
        assert_eq!(terms.len(), 1);
        let state = &terms[0].1;
        assert_eq!(state.doc_freq, 400);
        assert!(state.skip_offset.is_some());

        let mut iter = reader.postings(&field, state, PostingFlags::ALL).unwrap();
        for (doc_id, positions) in &expected {
            assert_eq!(iter.next_doc().unwrap(), *doc_id);
            assert_eq!(iter.freq().unwrap() as usize, positions.len());
            for (position, payload, start, end) in positions {
                assert_eq!(iter.next_position().unwrap(), *position);
                let got = iter.payload().unwrap_or_default();
                assert_eq!(got, payload.as_slice());
                assert_eq!(iter.start_offset(), *start);
                assert_eq!(iter.end_offset(), *end);
            }
        }
        assert_eq!(iter.next_doc().unwrap(), NO_MORE_DOCS);
    }

    #[test]
    fn test_doc_lengths_become_norms() {
        let field = FieldInfo::new("body", 0, IndexOptions::DocsAndFreqs).with_norms();
        let mut inverted = InvertedWriter::new(field.clone());
        for doc in 0..300 {
            inverted.add_token(doc, b"common", 0, None, -1, -1).unwrap();
            // doc 5 is short and dense in the term
            let filler = if doc == 5 { 0 } else { 20 };
            for position in 1..=filler {
                inverted.add_token(doc, b"filler", position, None, -1, -1).unwrap();
            }
        }

        let dir = RamDirectory::new();
        let (reader, terms) = flush(&dir, inverted);
        let common = &terms[0].1;
        let mut iter = reader.impacts(&field, common, PostingFlags::FREQS).unwrap();
        iter.advance_shallow(0).unwrap();
        let impacts = iter.impacts().unwrap();
        assert!(impacts.doc_id_up_to(0) >= 5);
        assert!(impacts
            .get(0)
            .iter().any(|impact| impact.freq == 1 && impact.norm == 1));
    }

    #[test]
    fn test_out_of_order_tokens() {
        let field = FieldInfo::new("body", 0, IndexOptions::DocsAndFreqsAndPositions);
        let mut inverted = InvertedWriter::new(field);
        inverted.add_token(4, b"x", 3, None, -1, -1).unwrap();
        let err = inverted.add_token(4, b"x", 2, None, -1, -1).unwrap_err();
        assert!(err.is_corruption());
        let err = inverted.add_token(3, b"x", 0, None, -1, -1).unwrap_err();
        assert!(err.is_corruption());
        assert!(inverted.add_token(-1, b"y", 0, None, -1, -1).is_err());
        // a later doc starts its positions over
        inverted.add_token(5, b"x", 0, None, -1, -1).unwrap();
        assert_eq!(inverted.doc_freq(b"x"), 2);
        let err = inverted.add_token(NO_MORE_DOCS, b"x", 0, None, -1, -1).unwrap_err();
        assert!(err.is_corruption());
        assert_eq!(inverted.doc_freq(b"x"), 2);
    }

    #[test]
    fn test_sparse_doc_ids() {
        let far = 2_000_000_000;
        for field in [
            FieldInfo::new("body", 0, IndexOptions::DocsAndFreqs),
            FieldInfo::new("body", 0, IndexOptions::DocsAndFreqs).with_norms(),
        ] {
            let mut inverted = InvertedWriter::new(field.clone());
            inverted.add_token(1, b"x", 0, None, -1, -1).unwrap();
            inverted.add_token(far, b"x", 0, None, -1, -1).unwrap();
            inverted.add_token(far, b"x", 1, None, -1, -1).unwrap();
            inverted.add_token(NO_MORE_DOCS - 1, b"y", 0, None, -1, -1).unwrap();
            let lengths = if field.has_norms { 3 } else { 0 };
            assert_eq!(inverted.doc_lengths.len(), lengths);

            let dir = RamDirectory::new();
            let (reader, terms) = flush(&dir, inverted);
            let mut iter = reader.postings(&field, &terms[0].1, PostingFlags::FREQS).unwrap();
            assert_eq!(iter.advance(2).unwrap(), far);
            assert_eq!(iter.freq().unwrap(), 2);
            assert_eq!(iter.next_doc().unwrap(), NO_MORE_DOCS);
            assert_eq!(terms[1].1.singleton_doc_id, Some(NO_MORE_DOCS - 1));
        }
    }
}
