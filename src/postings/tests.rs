use std::sync::Arc;

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::*;
use crate::algorithm::BLOCK_SIZE;
use crate::error::PostingsError;
use crate::field::{
    FieldInfo, FieldInfos, IndexOptions, PostingFlags, SegmentReadState, SegmentWriteState,
};
use crate::options::{PackingOption, PostingsOption};
use crate::skip::{CompetitiveImpactAccumulator, Impacts};
use crate::store::codec_util::write_index_header;
use crate::store::{DataOutput, Directory, IndexInput, IndexOutput, RamDirectory};

#[derive(Debug, Clone, PartialEq)]
struct Pos {
    position: i32,
    payload: Option<Vec<u8>>,
    start: i32,
    end: i32,
}

#[derive(Debug, Clone)]
struct Doc {
    id: DocId,
    freq: u32,
    positions: Vec<Pos>,
}

impl Doc {
    fn new(id: DocId, freq: u32) -> Self {
        Self {
            id,
            freq,
            positions: Vec::new(),
        }
    }

    fn with_positions(id: DocId, positions: Vec<Pos>) -> Self {
        Self {
            id,
            freq: positions.len() as u32,
            positions,
        }
    }
}

const SEGMENT_ID: [u8; 16] = [7; 16];

struct Segment {
    dir: RamDirectory,
    field: FieldInfo,
    option: PostingsOption,
    terms: Vec<u8>,
    states: Vec<IntBlockTermState>,
}

impl Segment {
    fn write_state(dir: &RamDirectory, field: &FieldInfo, option: PostingsOption) -> SegmentWriteState {
        SegmentWriteState {
            directory: Arc::new(dir.clone()),
            segment_name: "_0".to_string(),
            segment_suffix: String::new(),
            segment_id: SEGMENT_ID,
            field_infos: FieldInfos::new(vec![field.clone()]),
            option,
        }
    }

    fn write(field: &FieldInfo, option: PostingsOption, terms: &[Vec<Doc>]) -> Self {
        Self::write_with_norms(field, option, terms, None)
    }

    fn write_with_norms(
        field: &FieldInfo,
        option: PostingsOption,
        terms: &[Vec<Doc>],
        norms: Option<Vec<u64>>,
    ) -> Self {
        let dir = RamDirectory::new();
        let state = Self::write_state(&dir, field, option);
        let mut writer = PostingsWriter::open(&state).unwrap();
        let mut terms_out = Vec::new();
        writer.init(&mut terms_out, &state).unwrap();
        writer
            .set_field(field, norms.map(|n| Box::new(n) as Box<dyn crate::field::FieldNormRead>))
            .unwrap();
        let mut states = Vec::new();
        for docs in terms {
            writer.start_term().unwrap();
            for doc in docs {
                writer.start_doc(doc.id, doc.freq).unwrap();
                if !field.index_options.has_positions() {
                    writer.finish_doc().unwrap();
                    continue;
                }
                for pos in &doc.positions {
                    writer
                        .add_position(pos.position, pos.payload.as_deref(), pos.start, pos.end)
                        .unwrap();
                }
                writer.finish_doc().unwrap();
            }
            let term_state = writer.finish_term().unwrap();
            writer
                .encode_term(&mut terms_out, field, &term_state, false)
                .unwrap();
            states.push(term_state);
        }
        writer.close().unwrap();
        Self {
            dir,
            field: field.clone(),
            option,
            terms: terms_out,
            states,
        }
    }

    fn read_state(&self) -> SegmentReadState {
        SegmentReadState::from_write_state(&Self::write_state(&self.dir, &self.field, self.option))
    }

    /// Opens the reader and decodes the term metadata back.
    fn open(&self) -> (PostingsReader, Vec<IntBlockTermState>) {
        let read_state = self.read_state();
        let reader = PostingsReader::open(&read_state).unwrap();
        let mut input = self.terms.as_slice();
        reader.init(&mut input, &read_state).unwrap();
        let mut state = IntBlockTermState::default();
        let mut decoded = Vec::new();
        for written in &self.states {
            state.doc_freq = written.doc_freq;
            state.total_term_freq = written.total_term_freq;
            reader
                .decode_term(&mut input, &self.field, &mut state, false)
                .unwrap();
            assert_eq!(&state, written);
            decoded.push(state.clone());
        }
        assert!(input.is_empty());
        (reader, decoded)
    }
}

fn positions_field() -> FieldInfo {
    FieldInfo::new("body", 0, IndexOptions::DocsAndFreqsAndPositions)
}

fn full_field() -> FieldInfo {
    FieldInfo::new("body", 0, IndexOptions::DocsAndFreqsAndPositionsAndOffsets).with_payloads()
}

fn random_docs(rng: &mut StdRng, count: usize, max_gap: i32, max_freq: u32, with_extras: bool) -> Vec<Doc> {
    let mut id = -1;
    (0..count)
        .map(|_| {
            id += rng.gen_range(1..=max_gap);
            let freq = rng.gen_range(1..=max_freq);
            let mut position = 0;
            let mut offset = 0;
            let positions = (0..freq)
                .map(|_| {
                    position += rng.gen_range(0..20);
                    offset += rng.gen_range(0..10);
                    let len = rng.gen_range(0..8);
                    let payload = (with_extras && rng.gen_bool(0.4))
                        .then(|| (0..rng.gen_range(1..5)).map(|_| rng.gen()).collect());
                    Pos {
                        position,
                        payload,
                        start: if with_extras { offset } else { -1 },
                        end: if with_extras { offset + len } else { -1 },
                    }
                })
                .collect();
            Doc::with_positions(id, positions)
        })
        .collect()
}

fn read_positions<P: PostingIterator>(iter: &mut P) -> Vec<Pos> {
    let freq = iter.freq().unwrap();
    (0..freq)
        .map(|_| {
            let position = iter.next_position().unwrap();
            Pos {
                position,
                payload: iter.payload().map(<[u8]>::to_vec),
                start: iter.start_offset(),
                end: iter.end_offset(),
            }
        })
        .collect()
}

fn both_packings() -> [PostingsOption; 2] {
    [
        PostingsOption {
            packing: PackingOption::WordPair,
            ..Default::default()
        },
        PostingsOption {
            packing: PackingOption::Lanes,
            ..Default::default()
        },
    ]
}

#[test]
fn test_advance_into_middle_block() {
    let field = FieldInfo::new("body", 0, IndexOptions::DocsAndFreqs);
    let docs: Vec<Doc> = (0..300).map(|i| Doc::new(i * 3, (i % 5 + 1) as u32)).collect();
    for option in both_packings() {
        let segment = Segment::write(&field, option, &[docs.clone()]);
        let (reader, states) = segment.open();
        assert_eq!(reader.version(), version_for_packing(option.packing));
        assert_eq!(states[0].doc_freq, 300);
        assert!(states[0].skip_offset.is_some());

        let mut iter = reader.postings(&field, &states[0], PostingFlags::FREQS).unwrap();
        assert_eq!(iter.doc_id(), -1);
        assert_eq!(iter.cost(), 300);
        assert_eq!(iter.advance(450).unwrap(), 450);
        assert_eq!(iter.freq().unwrap(), 150 % 5 + 1);
        assert_eq!(iter.next_doc().unwrap(), 453);
        assert_eq!(iter.freq().unwrap(), 151 % 5 + 1);
        // not a doc of the list: lands on the next one
        assert_eq!(iter.advance(800).unwrap(), 801);
        assert_eq!(iter.advance(2000).unwrap(), NO_MORE_DOCS);
        assert_eq!(iter.next_doc().unwrap(), NO_MORE_DOCS);
        assert_eq!(iter.doc_id(), NO_MORE_DOCS);
    }
}

#[test]
fn test_next_doc_visits_every_doc() {
    let field = FieldInfo::new("body", 0, IndexOptions::DocsAndFreqs);
    let mut rng = StdRng::seed_from_u64(1);
    let docs = random_docs(&mut rng, 1000, 9, 40, false);
    let segment = Segment::write(&field, PostingsOption::default(), &[docs.clone()]);
    let (reader, states) = segment.open();
    let mut iter = reader.postings(&field, &states[0], PostingFlags::FREQS).unwrap();
    for doc in &docs {
        assert_eq!(iter.next_doc().unwrap(), doc.id);
        assert_eq!(iter.freq().unwrap(), doc.freq);
    }
    assert_eq!(iter.next_doc().unwrap(), NO_MORE_DOCS);
    assert_eq!(iter.next_doc().unwrap(), NO_MORE_DOCS);
}

#[test]
fn test_freqs_not_requested() {
    let field = FieldInfo::new("body", 0, IndexOptions::DocsAndFreqs);
    let docs: Vec<Doc> = (0..600).map(|i| Doc::new(i, 7)).collect();
    let segment = Segment::write(&field, PostingsOption::default(), &[docs]);
    let (reader, states) = segment.open();

    let mut iter = reader.postings(&field, &states[0], PostingFlags::NONE).unwrap();
    let mut count = 0;
    while iter.next_doc().unwrap() != NO_MORE_DOCS {
        assert_eq!(iter.freq().unwrap(), 1);
        count += 1;
    }
    assert_eq!(count, 600);
    let stats = iter.decode_stats();
    assert_eq!(stats.doc_blocks_decoded, 4);
    assert_eq!(stats.freq_blocks_decoded, 0);
    assert_eq!(stats.freq_blocks_skipped, 4);
    assert_eq!(stats.vint_blocks_decoded, 1);
}

#[test]
fn test_lazy_freq_blocks() {
    let field = FieldInfo::new("body", 0, IndexOptions::DocsAndFreqs);
    let docs: Vec<Doc> = (0..512).map(|i| Doc::new(i, (i % 3 + 2) as u32)).collect();
    let segment = Segment::write(&field, PostingsOption::default(), &[docs]);
    let (reader, states) = segment.open();
    let mut iter = reader.postings(&field, &states[0], PostingFlags::FREQS).unwrap();
    // freqs read only inside the third block
    for _ in 0..300 {
        iter.next_doc().unwrap();
    }
    assert_eq!(iter.doc_id(), 299);
    assert_eq!(iter.freq().unwrap(), 299 % 3 + 2);
    assert_eq!(iter.freq().unwrap(), 299 % 3 + 2);
    let stats = iter.decode_stats();
    assert_eq!(stats.freq_blocks_decoded, 1);
    assert_eq!(stats.freq_blocks_skipped, 2);
}

#[test]
fn test_docs_only_field() {
    let field = FieldInfo::new("id", 0, IndexOptions::Docs);
    let docs: Vec<Doc> = (0..200).map(|i| Doc::new(i * 2 + 1, 5)).collect();
    let segment = Segment::write(&field, PostingsOption::default(), &[docs]);
    let (reader, states) = segment.open();
    assert_eq!(states[0].total_term_freq, 200);
    let mut iter = reader.postings(&field, &states[0], PostingFlags::FREQS).unwrap();
    assert_eq!(iter.advance(150).unwrap(), 151);
    assert_eq!(iter.freq().unwrap(), 1);
    assert!(matches!(
        reader.postings(&field, &states[0], PostingFlags::POSITIONS),
        Err(PostingsError::IllegalState(_))
    ));
}

#[test]
fn test_singleton_term() {
    let field = positions_field();
    let doc = Doc::with_positions(
        42,
        vec![
            Pos { position: 3, payload: None, start: -1, end: -1 },
            Pos { position: 9, payload: None, start: -1, end: -1 },
        ],
    );
    let segment = Segment::write(&field, PostingsOption::default(), &[vec![doc.clone()]]);
    let (reader, states) = segment.open();
    assert_eq!(states[0].singleton_doc_id, Some(42));
    assert_eq!(states[0].skip_offset, None);
    assert_eq!(states[0].last_pos_block_offset, None);

    let mut iter = reader.postings(&field, &states[0], PostingFlags::POSITIONS).unwrap();
    assert_eq!(iter.next_doc().unwrap(), 42);
    assert_eq!(read_positions(&mut iter), doc.positions);
    assert_eq!(iter.next_doc().unwrap(), NO_MORE_DOCS);

    let mut iter = reader.postings(&field, &states[0], PostingFlags::FREQS).unwrap();
    assert_eq!(iter.advance(42).unwrap(), 42);
    assert_eq!(iter.freq().unwrap(), 2);
}

#[test]
fn test_positions_payloads_offsets() {
    let field = full_field();
    let mut rng = StdRng::seed_from_u64(7);
    let terms: Vec<Vec<Doc>> = [1usize, 5, 127, 128, 129, 700]
        .iter()
        .map(|&n| random_docs(&mut rng, n, 5, 6, true))
        .collect();
    for option in both_packings() {
        let segment = Segment::write(&field, option, &terms);
        let (reader, states) = segment.open();
        for (docs, state) in terms.iter().zip(&states) {
            let mut iter = reader.postings(&field, state, PostingFlags::ALL).unwrap();
            for doc in docs {
                assert_eq!(iter.next_doc().unwrap(), doc.id);
                assert_eq!(read_positions(&mut iter), doc.positions);
            }
            assert_eq!(iter.next_doc().unwrap(), NO_MORE_DOCS);

            // positions only: payload and offsets are not decoded
            let mut iter = reader.postings(&field, state, PostingFlags::POSITIONS).unwrap();
            for doc in docs {
                assert_eq!(iter.next_doc().unwrap(), doc.id);
                let positions = read_positions(&mut iter);
                for (read, written) in positions.iter().zip(&doc.positions) {
                    assert_eq!(read.position, written.position);
                    assert_eq!(read.payload, None);
                    assert_eq!((read.start, read.end), (-1, -1));
                }
            }
        }
    }
}

#[test]
fn test_offsets_without_payloads() {
    let field = FieldInfo::new("body", 0, IndexOptions::DocsAndFreqsAndPositionsAndOffsets);
    let mut rng = StdRng::seed_from_u64(11);
    let docs: Vec<Doc> = random_docs(&mut rng, 300, 3, 4, true)
        .into_iter()
        .map(|mut doc| {
            doc.positions.iter_mut().for_each(|p| p.payload = None);
            doc
        })
        .collect();
    let segment = Segment::write(&field, PostingsOption::default(), &[docs.clone()]);
    let (reader, states) = segment.open();
    let mut iter = reader.postings(&field, &states[0], PostingFlags::OFFSETS).unwrap();
    let target = docs[250].id;
    assert_eq!(iter.advance(target).unwrap(), target);
    assert_eq!(read_positions(&mut iter), docs[250].positions);
}

#[test]
fn test_unread_positions_are_skipped() {
    let field = positions_field();
    let long_doc = Doc::with_positions(
        0,
        (0..300)
            .map(|i| Pos { position: i, payload: None, start: -1, end: -1 })
            .collect(),
    );
    let short_doc = Doc::with_positions(
        5,
        vec![
            Pos { position: 1, payload: None, start: -1, end: -1 },
            Pos { position: 4, payload: None, start: -1, end: -1 },
        ],
    );
    let segment = Segment::write(
        &field,
        PostingsOption::default(),
        &[vec![long_doc, short_doc.clone()]],
    );
    let (reader, states) = segment.open();
    assert!(states[0].last_pos_block_offset.is_some());
    let mut iter = reader.postings(&field, &states[0], PostingFlags::POSITIONS).unwrap();
    assert_eq!(iter.next_doc().unwrap(), 0);
    assert_eq!(iter.next_doc().unwrap(), 5);
    assert_eq!(read_positions(&mut iter), short_doc.positions);
    let stats = iter.decode_stats();
    assert_eq!(stats.pos_blocks_skipped, 2);
    assert_eq!(stats.pos_blocks_decoded, 0);
    assert_eq!(stats.vint_blocks_decoded, 2);
}

#[test]
fn test_advance_with_positions_uses_skip_data() {
    let field = full_field();
    let mut rng = StdRng::seed_from_u64(3);
    let docs = random_docs(&mut rng, 5000, 4, 5, true);
    let segment = Segment::write(&field, PostingsOption::default(), &[docs.clone()]);
    let (reader, states) = segment.open();
    let mut iter = reader.postings(&field, &states[0], PostingFlags::ALL).unwrap();
    let target = &docs[4000];
    assert_eq!(iter.advance(target.id).unwrap(), target.id);
    assert_eq!(read_positions(&mut iter), target.positions);
    let stats = iter.decode_stats();
    // only the blocks around the target are decoded
    assert!(stats.doc_blocks_decoded <= 1, "{stats:?}");
    assert!(stats.pos_blocks_decoded <= 2, "{stats:?}");

    let next = &docs[4001];
    assert_eq!(iter.next_doc().unwrap(), next.id);
    assert_eq!(read_positions(&mut iter), next.positions);
}

#[test]
fn test_too_many_next_position_calls() {
    let field = positions_field();
    let docs: Vec<Doc> = (0..3)
        .map(|i| {
            Doc::with_positions(i, vec![Pos { position: 2, payload: None, start: -1, end: -1 }])
        })
        .collect();
    let segment = Segment::write(&field, PostingsOption::default(), &[docs]);
    let (reader, states) = segment.open();
    let mut iter = reader.postings(&field, &states[0], PostingFlags::POSITIONS).unwrap();
    iter.next_doc().unwrap();
    assert_eq!(iter.next_position().unwrap(), 2);
    assert!(matches!(
        iter.next_position(),
        Err(PostingsError::IllegalState(_))
    ));
}

#[test]
fn test_exact_block_multiples() {
    let field = positions_field();
    for n in [128, 256] {
        let docs: Vec<Doc> = (0..n)
            .map(|i| {
                Doc::with_positions(i, vec![Pos { position: i, payload: None, start: -1, end: -1 }])
            })
            .collect();
        let segment = Segment::write(&field, PostingsOption::default(), &[docs.clone()]);
        let (reader, states) = segment.open();
        assert_eq!(states[0].skip_offset.is_some(), n > 128);
        assert_eq!(states[0].last_pos_block_offset.is_some(), n > 128);
        let mut iter = reader.postings(&field, &states[0], PostingFlags::POSITIONS).unwrap();
        for doc in &docs {
            assert_eq!(iter.next_doc().unwrap(), doc.id);
            assert_eq!(iter.next_position().unwrap(), doc.id);
        }
        assert_eq!(iter.next_doc().unwrap(), NO_MORE_DOCS);
    }
}

#[test]
fn test_postings_reuse() {
    let field = FieldInfo::new("body", 0, IndexOptions::DocsAndFreqs);
    let terms = vec![
        (0..10).map(|i| Doc::new(i, 1)).collect::<Vec<_>>(),
        (0..400).map(|i| Doc::new(i * 2, 2)).collect(),
    ];
    let segment = Segment::write(&field, PostingsOption::default(), &terms);
    let (reader, states) = segment.open();
    let mut iter = reader.postings(&field, &states[0], PostingFlags::FREQS).unwrap();
    assert_eq!(iter.advance(9).unwrap(), 9);
    let mut iter = reader
        .postings_reuse(&field, &states[1], Some(iter), PostingFlags::FREQS)
        .unwrap();
    assert!(matches!(iter, BlockPostings::BlockDocIterator(_)));
    assert_eq!(iter.doc_id(), -1);
    assert_eq!(iter.advance(501).unwrap(), 502);
    assert_eq!(iter.freq().unwrap(), 2);
}

fn impacts_fixture() -> (Vec<Doc>, Vec<u64>) {
    let docs: Vec<Doc> = (0..1000)
        .map(|i| {
            let freq = 1 + (i * 7 % 13) as u32;
            let positions = (0..freq as i32)
                .map(|p| Pos { position: p * 2, payload: None, start: -1, end: -1 })
                .collect();
            Doc::with_positions(i * 2, positions)
        })
        .collect();
    let norms = (0..2000).map(|d| 1 + (d as u64 * 11 % 17)).collect();
    (docs, norms)
}

#[test]
fn test_impacts_per_block() {
    let field = positions_field().with_norms();
    let (docs, norms) = impacts_fixture();
    let segment = Segment::write_with_norms(
        &field,
        PostingsOption::default(),
        &[docs.clone()],
        Some(norms.clone()),
    );
    let (reader, states) = segment.open();
    let mut iter = reader.impacts(&field, &states[0], PostingFlags::FREQS).unwrap();
    assert!(matches!(iter, BlockImpacts::BlockImpactsIterator(_)));

    let block_frontier = |block: usize| {
        let mut acc = CompetitiveImpactAccumulator::new();
        for doc in &docs[block * BLOCK_SIZE..(block + 1) * BLOCK_SIZE] {
            acc.add(doc.freq, norms[doc.id as usize]);
        }
        acc.iter().collect::<Vec<_>>()
    };

    let impacts = iter.impacts().unwrap();
    assert_eq!(impacts.doc_id_up_to(0), docs[BLOCK_SIZE - 1].id);
    assert_eq!(impacts.get(0), block_frontier(0).as_slice());

    let target = docs[5 * BLOCK_SIZE + 10].id;
    iter.advance_shallow(target).unwrap();
    let impacts = iter.impacts().unwrap();
    assert_eq!(impacts.doc_id_up_to(0), docs[6 * BLOCK_SIZE - 1].id);
    assert_eq!(impacts.get(0), block_frontier(5).as_slice());
    // seven full blocks never reach a level 1 entry
    assert_eq!(impacts.num_levels(), 1);

    assert_eq!(iter.advance(target).unwrap(), target);
    assert_eq!(iter.freq().unwrap(), docs[5 * BLOCK_SIZE + 10].freq);

    // the tail block has no skip entry
    iter.advance(docs[990].id).unwrap();
    assert_eq!(iter.impacts().unwrap(), Impacts::unbounded());
}

#[test]
fn test_impacts_iterator_matches_postings() {
    let field = full_field();
    let mut rng = StdRng::seed_from_u64(5);
    let docs = random_docs(&mut rng, 3000, 6, 4, true);
    let segment = Segment::write(&field, PostingsOption::default(), &[docs.clone()]);
    let (reader, states) = segment.open();
    for flags in [PostingFlags::FREQS, PostingFlags::POSITIONS, PostingFlags::ALL] {
        let mut iter = reader.impacts(&field, &states[0], flags).unwrap();
        let mut expected = reader.postings(&field, &states[0], flags).unwrap();
        let mut target = 0;
        loop {
            let doc = iter.advance(target).unwrap();
            assert_eq!(doc, expected.advance(target).unwrap());
            if doc == NO_MORE_DOCS {
                break;
            }
            assert_eq!(iter.freq().unwrap(), expected.freq().unwrap());
            if flags.contains(PostingFlags::POSITIONS) {
                assert_eq!(read_positions(&mut iter), read_positions(&mut expected));
            }
            iter.impacts().unwrap();
            target = doc + rng.gen_range(1..400);
        }
        assert_eq!(iter.next_doc().unwrap(), NO_MORE_DOCS);
    }
}

#[test]
fn test_slow_impacts_for_short_lists() {
    let field = FieldInfo::new("body", 0, IndexOptions::DocsAndFreqs);
    let docs: Vec<Doc> = (0..100).map(|i| Doc::new(i * 3, 2)).collect();
    let segment = Segment::write(&field, PostingsOption::default(), &[docs]);
    let (reader, states) = segment.open();
    let mut iter = reader.impacts(&field, &states[0], PostingFlags::FREQS).unwrap();
    assert!(matches!(iter, BlockImpacts::SlowImpactsIterator(_)));
    iter.advance_shallow(200).unwrap();
    assert_eq!(iter.impacts().unwrap(), Impacts::unbounded());
    assert_eq!(iter.advance(200).unwrap(), 201);
    assert_eq!(iter.freq().unwrap(), 2);
}

#[test]
fn test_out_of_order_docs_are_corrupt() {
    let field = FieldInfo::new("body", 0, IndexOptions::DocsAndFreqs);
    let dir = RamDirectory::new();
    let state = Segment::write_state(&dir, &field, PostingsOption::default());
    let mut writer = PostingsWriter::open(&state).unwrap();
    writer.set_field(&field, None).unwrap();
    writer.start_term().unwrap();
    assert!(writer.start_doc(-1, 1).unwrap_err().is_corruption());
    assert!(writer.start_doc(NO_MORE_DOCS, 1).unwrap_err().is_corruption());
    writer.start_doc(5, 1).unwrap();
    writer.finish_doc().unwrap();
    assert!(writer.start_doc(5, 1).unwrap_err().is_corruption());
    assert!(writer.start_doc(3, 1).unwrap_err().is_corruption());
    assert!(writer.start_doc(6, 0).unwrap_err().is_corruption());
    assert!(writer.start_doc(NO_MORE_DOCS, 1).unwrap_err().is_corruption());
}

#[test]
fn test_largest_doc_id_round_trips() {
    let field = FieldInfo::new("body", 0, IndexOptions::DocsAndFreqs);
    let last = NO_MORE_DOCS - 1;
    let segment = Segment::write(
        &field,
        PostingsOption::default(),
        &[vec![Doc::new(5, 1), Doc::new(last, 3)], vec![Doc::new(last, 2)]],
    );
    let (reader, states) = segment.open();
    let mut iter = reader.postings(&field, &states[0], PostingFlags::FREQS).unwrap();
    assert_eq!(iter.next_doc().unwrap(), 5);
    assert_eq!(iter.next_doc().unwrap(), last);
    assert_eq!(iter.freq().unwrap(), 3);
    assert_eq!(iter.next_doc().unwrap(), NO_MORE_DOCS);

    assert_eq!(states[1].singleton_doc_id, Some(last));
    let mut iter = reader.postings(&field, &states[1], PostingFlags::FREQS).unwrap();
    assert_eq!(iter.advance(last).unwrap(), last);
    assert_eq!(iter.freq().unwrap(), 2);
}

#[test]
fn test_invalid_positions() {
    let field = full_field();
    let dir = RamDirectory::new();
    let state = Segment::write_state(&dir, &field, PostingsOption::default());
    let mut writer = PostingsWriter::open(&state).unwrap();
    writer.set_field(&field, None).unwrap();
    writer.start_term().unwrap();
    writer.start_doc(0, 2).unwrap();
    assert!(writer
        .add_position(MAX_POSITION + 1, None, 0, 0)
        .unwrap_err()
        .is_corruption());
    assert!(writer.add_position(-1, None, 0, 0).unwrap_err().is_corruption());
    writer.add_position(10, None, 5, 8).unwrap();
    assert!(writer.add_position(9, None, 6, 8).unwrap_err().is_corruption());
    assert!(writer.add_position(11, None, 4, 8).unwrap_err().is_corruption());
    assert!(writer.add_position(11, None, 6, 5).unwrap_err().is_corruption());
}

#[test]
fn test_call_sequence_is_checked() {
    let field = positions_field();
    let dir = RamDirectory::new();
    let state = Segment::write_state(&dir, &field, PostingsOption::default());
    let mut writer = PostingsWriter::open(&state).unwrap();
    writer.set_field(&field, None).unwrap();
    assert!(matches!(
        writer.start_doc(0, 1),
        Err(PostingsError::IllegalState(_))
    ));
    assert!(matches!(
        writer.finish_term(),
        Err(PostingsError::IllegalState(_))
    ));
    writer.start_term().unwrap();
    assert!(matches!(
        writer.finish_term(),
        Err(PostingsError::IllegalState(_))
    ));
    writer.start_doc(0, 2).unwrap();
    writer.add_position(1, None, -1, -1).unwrap();
    // one position short of freq
    assert!(matches!(
        writer.finish_doc(),
        Err(PostingsError::IllegalState(_))
    ));
    writer.add_position(2, None, -1, -1).unwrap();
    assert!(matches!(
        writer.add_position(3, None, -1, -1),
        Err(PostingsError::IllegalState(_))
    ));
    writer.finish_doc().unwrap();
    assert!(matches!(
        writer.set_field(&field, None),
        Err(PostingsError::IllegalState(_))
    ));
    writer.finish_term().unwrap();
    writer.close().unwrap();
}

#[test]
fn test_block_size_mismatch() {
    let field = FieldInfo::new("body", 0, IndexOptions::DocsAndFreqs);
    let segment = Segment::write(&field, PostingsOption::default(), &[vec![Doc::new(1, 1)]]);
    let read_state = segment.read_state();
    let reader = PostingsReader::open(&read_state).unwrap();
    let mut terms = Vec::new();
    write_index_header(&mut terms, TERMS_CODEC, VERSION_CURRENT, &SEGMENT_ID, "").unwrap();
    terms.write_vint(64).unwrap();
    let err = reader.init(&mut terms.as_slice(), &read_state).unwrap_err();
    assert!(matches!(
        err,
        PostingsError::BlockSizeMismatch {
            index: 64,
            expected: 128
        }
    ));
}

#[test]
fn test_checksum_corruption() {
    let field = positions_field();
    let mut rng = StdRng::seed_from_u64(9);
    let docs = random_docs(&mut rng, 400, 3, 3, false);
    let mut segment = Segment::write(&field, PostingsOption::default(), &[docs]);
    let (reader, _) = segment.open();
    reader.check_integrity().unwrap();

    let name = "_0.pos";
    let input = segment.dir.open_input(name).unwrap();
    let mut data = input.slice(0, input.len()).unwrap().to_vec();
    data[60] ^= 0x10;
    segment.dir.overwrite(name, data);

    assert!(reader.check_integrity().is_ok());
    let reopened = PostingsReader::open(&segment.read_state()).unwrap();
    assert!(reopened.check_integrity().unwrap_err().is_corruption());
    segment.option.verify_checksums = true;
    assert!(PostingsReader::open(&segment.read_state())
        .err()
        .unwrap()
        .is_corruption());
}

#[test]
fn test_truncated_doc_stream() {
    let field = FieldInfo::new("body", 0, IndexOptions::DocsAndFreqs);
    let segment = Segment::write(&field, PostingsOption::default(), &[vec![Doc::new(1, 1)]]);
    let input = segment.dir.open_input("_0.doc").unwrap();
    let data = input.slice(0, input.len() - 4).unwrap().to_vec();
    segment.dir.overwrite("_0.doc", data);
    assert!(PostingsReader::open(&segment.read_state())
        .err()
        .unwrap()
        .is_corruption());
}

struct FailingDirectory {
    inner: RamDirectory,
    fail_on: &'static str,
}

impl Directory for FailingDirectory {
    fn create_output(&self, name: &str) -> crate::error::Result<IndexOutput> {
        if name.ends_with(self.fail_on) {
            return Err(std::io::Error::other(format!("cannot create {name}")).into());
        }
        self.inner.create_output(name)
    }

    fn open_input(&self, name: &str) -> crate::error::Result<IndexInput> {
        self.inner.open_input(name)
    }

    fn file_names(&self) -> crate::error::Result<Vec<String>> {
        self.inner.file_names()
    }
}

#[test]
fn test_open_failure_publishes_nothing() {
    let field = full_field();
    let inner = RamDirectory::new();
    let state = SegmentWriteState {
        directory: Arc::new(FailingDirectory {
            inner: inner.clone(),
            fail_on: ".pay",
        }),
        segment_name: "_0".to_string(),
        segment_suffix: String::new(),
        segment_id: SEGMENT_ID,
        field_infos: FieldInfos::new(vec![field]),
        option: PostingsOption::default(),
    };
    assert!(matches!(
        PostingsWriter::open(&state),
        Err(PostingsError::Io(_))
    ));
    assert!(inner.file_names().unwrap().is_empty());
}

#[test]
fn test_segment_id_is_checked() {
    let field = FieldInfo::new("body", 0, IndexOptions::DocsAndFreqs);
    let segment = Segment::write(&field, PostingsOption::default(), &[vec![Doc::new(1, 1)]]);
    let mut read_state = segment.read_state();
    read_state.segment_id = [8; 16];
    assert!(PostingsReader::open(&read_state).err().unwrap().is_corruption());
}

#[test]
fn test_stream_states_follow_skips() {
    use super::iterator::BlockState::{Decoded, NotDecoded, Skipped};

    let field = full_field();
    let mut rng = StdRng::seed_from_u64(17);
    let docs = random_docs(&mut rng, 600, 4, 3, true);
    let segment = Segment::write(&field, PostingsOption::default(), &[docs.clone()]);
    let (reader, states) = segment.open();

    let postings = reader.postings(&field, &states[0], PostingFlags::ALL).unwrap();
    let BlockPostings::EverythingIterator(mut iter) = postings else {
        panic!("positions were requested");
    };
    assert_eq!(iter.stream_states(), (Skipped, NotDecoded));
    assert_eq!(iter.next_doc().unwrap(), docs[0].id);
    assert_eq!(iter.next_position().unwrap(), docs[0].positions[0].position);
    assert_eq!(iter.stream_states(), (Decoded, Decoded));

    // the skip moves both streams, they are sought on the next position
    let target = docs[400].id;
    assert_eq!(iter.advance(target).unwrap(), target);
    assert_eq!(iter.stream_states(), (Skipped, NotDecoded));
    let first = &docs[400].positions[0];
    assert_eq!(iter.next_position().unwrap(), first.position);
    assert_eq!(iter.payload().map(<[u8]>::to_vec), first.payload);
    assert_eq!(iter.start_offset(), first.start);
    assert_eq!(iter.stream_states(), (Decoded, Decoded));
}

#[test]
fn test_freq_after_shallow_skip() {
    let field = FieldInfo::new("body", 0, IndexOptions::DocsAndFreqs);
    let docs: Vec<Doc> = (0..600).map(|i| Doc::new(i, 2)).collect();
    let segment = Segment::write(&field, PostingsOption::default(), &[docs]);
    let (reader, states) = segment.open();

    let mut iter = reader.impacts(&field, &states[0], PostingFlags::FREQS).unwrap();
    assert_eq!(iter.next_doc().unwrap(), 0);
    iter.advance_shallow(500).unwrap();
    assert!(matches!(iter.freq(), Err(PostingsError::IllegalState(_))));
    assert_eq!(iter.advance(500).unwrap(), 500);
    assert_eq!(iter.freq().unwrap(), 2);

    // freqs were not asked for
    let mut iter = reader.impacts(&field, &states[0], PostingFlags::NONE).unwrap();
    assert_eq!(iter.next_doc().unwrap(), 0);
    iter.advance_shallow(500).unwrap();
    assert_eq!(iter.freq().unwrap(), 1);
}

#[test]
fn test_reader_follows_stored_version() {
    let field = positions_field();
    let mut rng = StdRng::seed_from_u64(21);
    let docs = random_docs(&mut rng, 600, 2, 4, false);
    let word_pair = PostingsOption {
        packing: PackingOption::WordPair,
        ..Default::default()
    };
    let mut segment = Segment::write(&field, word_pair, &[docs.clone()]);
    segment.option.packing = PackingOption::Lanes;
    let (reader, states) = segment.open();
    assert_eq!(reader.version(), VERSION_START);

    let target = docs[450].id;
    let mut iter = reader.postings(&field, &states[0], PostingFlags::POSITIONS).unwrap();
    assert_eq!(iter.advance(target).unwrap(), target);
    assert_eq!(read_positions(&mut iter), docs[450].positions);
    for doc in &docs[451..] {
        assert_eq!(iter.next_doc().unwrap(), doc.id);
        assert_eq!(read_positions(&mut iter), doc.positions);
    }
    assert_eq!(iter.next_doc().unwrap(), NO_MORE_DOCS);
}

#[test]
fn test_stream_versions_must_agree() {
    let field = positions_field();
    let lanes = PostingsOption {
        packing: PackingOption::Lanes,
        ..Default::default()
    };
    let pos = Pos {
        position: 1,
        payload: None,
        start: -1,
        end: -1,
    };
    let segment = Segment::write(&field, lanes, &[vec![Doc::with_positions(3, vec![pos])]]);
    PostingsReader::open(&segment.read_state()).unwrap();

    let name = "_0.pos";
    let input = segment.dir.open_input(name).unwrap();
    let mut data = input.slice(0, input.len()).unwrap().to_vec();
    // magic, codec name, then the version
    let at = 4 + 1 + POS_CODEC.len();
    assert_eq!(data[at..at + 4], VERSION_LANES.to_be_bytes());
    data[at..at + 4].copy_from_slice(&VERSION_START.to_be_bytes());
    segment.dir.overwrite(name, data);

    let err = PostingsReader::open(&segment.read_state()).err().unwrap();
    assert!(matches!(
        &err,
        PostingsError::Corrupt { resource, .. } if resource.as_str() == name
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_advance_matches_linear_scan(
        gaps in proptest::collection::vec(1i32..40, 1..1500),
        steps in proptest::collection::vec(1i32..600, 1..40),
        lanes in any::<bool>(),
        multiplier in 2u32..9,
    ) {
        let field = FieldInfo::new("body", 0, IndexOptions::DocsAndFreqs);
        let mut id = -1;
        let docs: Vec<Doc> = gaps
            .iter()
            .map(|gap| {
                id += gap;
                Doc::new(id, (*gap as u32 % 7) + 1)
            })
            .collect();
        let option = PostingsOption {
            packing: if lanes { PackingOption::Lanes } else { PackingOption::WordPair },
            skip_multiplier: multiplier,
            ..Default::default()
        };
        let segment = Segment::write(&field, option, &[docs.clone()]);
        let (reader, states) = segment.open();
        let mut iter = reader.postings(&field, &states[0], PostingFlags::FREQS).unwrap();
        let mut target = 0;
        for step in steps {
            target += step;
            let expected = docs.iter().find(|d| d.id >= target);
            let doc = iter.advance(target).unwrap();
            match expected {
                Some(expected) => {
                    prop_assert_eq!(doc, expected.id);
                    prop_assert_eq!(iter.freq().unwrap(), expected.freq);
                    target = doc;
                }
                None => {
                    prop_assert_eq!(doc, NO_MORE_DOCS);
                    break;
                }
            }
        }
    }
}
