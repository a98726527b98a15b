#![allow(clippy::len_without_is_empty)]

pub mod algorithm;
pub mod error;
pub mod field;
pub mod options;
pub mod postings;
pub mod segment;
pub mod skip;
pub mod store;
pub mod utils;

pub use error::{PostingsError, Result};
pub use field::{FieldInfo, FieldInfos, IndexOptions, PostingFlags};
pub use options::{PackingOption, PostingsOption};
pub use postings::{
    BlockImpacts, BlockPostings, DocId, DocIterator, ImpactsIterator, IntBlockTermState,
    PostingIterator, PostingsReader, PostingsWriter, NO_MORE_DOCS,
};
pub use segment::InvertedWriter;

#[cfg(not(all(target_endian = "little", target_pointer_width = "64")))]
compile_error!("Target is not supported.");
