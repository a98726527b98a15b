use std::collections::BTreeMap;
use std::sync::Arc;

use crate::options::PostingsOption;
use crate::postings::DocId;
use crate::store::codec_util::SegmentId;
use crate::store::Directory;

/// What a field indexes, ordered from least to most.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IndexOptions {
    Docs,
    DocsAndFreqs,
    DocsAndFreqsAndPositions,
    DocsAndFreqsAndPositionsAndOffsets,
}

impl IndexOptions {
    pub fn has_freqs(self) -> bool {
        self >= IndexOptions::DocsAndFreqs
    }

    pub fn has_positions(self) -> bool {
        self >= IndexOptions::DocsAndFreqsAndPositions
    }

    pub fn has_offsets(self) -> bool {
        self >= IndexOptions::DocsAndFreqsAndPositionsAndOffsets
    }
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    pub number: u32,
    pub index_options: IndexOptions,
    pub has_payloads: bool,
    pub has_norms: bool,
}

impl FieldInfo {
    pub fn new(name: impl Into<String>, number: u32, index_options: IndexOptions) -> Self {
        Self {
            name: name.into(),
            number,
            index_options,
            has_payloads: false,
            has_norms: false,
        }
    }

    pub fn with_payloads(mut self) -> Self {
        self.has_payloads = true;
        self
    }

    pub fn with_norms(mut self) -> Self {
        self.has_norms = true;
        self
    }

    pub(crate) fn has_payloads(&self) -> bool {
        self.has_payloads && self.index_options.has_positions()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FieldInfos {
    fields: Vec<FieldInfo>,
}

impl FieldInfos {
    pub fn new(fields: Vec<FieldInfo>) -> Self {
        Self { fields }
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldInfo> {
        self.fields.iter()
    }

    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_prox(&self) -> bool {
        self.fields.iter().any(|f| f.index_options.has_positions())
    }

    pub fn has_payloads(&self) -> bool {
        self.fields.iter().any(|f| f.has_payloads())
    }

    pub fn has_offsets(&self) -> bool {
        self.fields.iter().any(|f| f.index_options.has_offsets())
    }
}

bitflags::bitflags! {
    /// Per-iterator request of what to decode beyond doc ids. Requesting
    /// offsets or payloads implies positions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PostingFlags: u8 {
        const NONE = 0;
        const FREQS = 1 << 3;
        const POSITIONS = Self::FREQS.bits() | 1 << 4;
        const OFFSETS = Self::POSITIONS.bits() | 1 << 5;
        const PAYLOADS = Self::POSITIONS.bits() | 1 << 6;
        const ALL = Self::OFFSETS.bits() | Self::PAYLOADS.bits();
    }
}

impl Default for PostingFlags {
    fn default() -> Self {
        PostingFlags::FREQS
    }
}

/// Length normalization value of a document, used for impacts.
pub trait FieldNormRead: Send {
    fn read(&self, doc_id: DocId) -> Option<u64>;
}

impl FieldNormRead for Vec<u64> {
    fn read(&self, doc_id: DocId) -> Option<u64> {
        usize::try_from(doc_id).ok().and_then(|i| self.get(i).copied())
    }
}

impl FieldNormRead for BTreeMap<DocId, u64> {
    fn read(&self, doc_id: DocId) -> Option<u64> {
        self.get(&doc_id).copied()
    }
}

pub struct SegmentWriteState {
    pub directory: Arc<dyn Directory>,
    pub segment_name: String,
    pub segment_suffix: String,
    pub segment_id: SegmentId,
    pub field_infos: FieldInfos,
    pub option: PostingsOption,
}

pub struct SegmentReadState {
    pub directory: Arc<dyn Directory>,
    pub segment_name: String,
    pub segment_suffix: String,
    pub segment_id: SegmentId,
    pub field_infos: FieldInfos,
    pub option: PostingsOption,
}

impl SegmentReadState {
    pub fn from_write_state(state: &SegmentWriteState) -> Self {
        Self {
            directory: state.directory.clone(),
            segment_name: state.segment_name.clone(),
            segment_suffix: state.segment_suffix.clone(),
            segment_id: state.segment_id,
            field_infos: state.field_infos.clone(),
            option: state.option,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_flags_imply_positions() {
        assert!(PostingFlags::PAYLOADS.contains(PostingFlags::POSITIONS));
        assert!(PostingFlags::OFFSETS.contains(PostingFlags::FREQS));
        assert!(!PostingFlags::POSITIONS.contains(PostingFlags::OFFSETS));
        assert!(PostingFlags::ALL.contains(PostingFlags::PAYLOADS | PostingFlags::OFFSETS));
    }

    #[test]
    fn test_field_infos_aggregate() {
        let infos = FieldInfos::new(vec![
            FieldInfo::new("id", 0, IndexOptions::Docs).with_payloads(),
            FieldInfo::new("body", 1, IndexOptions::DocsAndFreqsAndPositions),
        ]);
        assert!(infos.has_prox());
        // payloads without positions do not count
        assert!(!infos.has_payloads());
        assert!(!infos.has_offsets());
        assert_eq!(infos.field("body").unwrap().number, 1);
    }
}
