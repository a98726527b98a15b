//! Block postings format.
//!
//! Each term's postings are split over up to three streams:
//!
//! * `.doc`: doc deltas and freqs in packed blocks of 128, a vint-encoded
//!   tail, then the skip data when there is more than one block.
//! * `.pos`: position deltas in packed blocks, plus a vint tail that also
//!   carries inline payloads and offsets.
//! * `.pay`: payload lengths, payload bytes, offset start deltas and offset
//!   lengths of every packed position block.
//!
//! A term with a single document keeps it in the term metadata instead of
//! the doc stream.

mod iterator;

mod doc_cursor;
mod docs;
mod everything;
mod impacts;
mod position_cursor;
mod reader;
mod term_state;
mod writer;

#[cfg(test)]
mod tests;

pub use docs::BlockDocIterator;
pub use everything::EverythingIterator;
pub use impacts::{BlockImpactsIterator, SlowImpactsIterator};
pub use iterator::{DecodeStats, DocIterator, ImpactsIterator, PostingIterator};
pub use reader::{BlockImpacts, BlockPostings, PostingsReader};
pub use term_state::IntBlockTermState;
pub use writer::PostingsWriter;

use crate::error::{PostingsError, Result};
use crate::options::PackingOption;

pub type DocId = i32;

pub const NO_MORE_DOCS: DocId = i32::MAX;

/// Largest position a document may carry.
pub const MAX_POSITION: i32 = i32::MAX - 128;

pub const DOC_EXTENSION: &str = "doc";
pub const POS_EXTENSION: &str = "pos";
pub const PAY_EXTENSION: &str = "pay";

pub const TERMS_CODEC: &str = "BlockPostingsTerms";
pub const DOC_CODEC: &str = "BlockPostingsDoc";
pub const POS_CODEC: &str = "BlockPostingsPos";
pub const PAY_CODEC: &str = "BlockPostingsPay";

/// Full blocks use the word-pair layout.
pub const VERSION_START: i32 = 0;
/// Full blocks use the lanes layout.
pub const VERSION_LANES: i32 = 1;
pub const VERSION_CURRENT: i32 = VERSION_LANES;

pub(crate) fn version_for_packing(packing: PackingOption) -> i32 {
    match packing {
        PackingOption::WordPair => VERSION_START,
        PackingOption::Lanes => VERSION_LANES,
    }
}

pub(crate) fn packing_for_version(version: i32) -> Result<PackingOption> {
    match version {
        VERSION_START => Ok(PackingOption::WordPair),
        VERSION_LANES => Ok(PackingOption::Lanes),
        _ => Err(PostingsError::UnsupportedVersion {
            codec: DOC_CODEC.to_string(),
            version,
            min: VERSION_START,
            max: VERSION_CURRENT,
        }),
    }
}
