pub mod codec_util;
mod directory;
mod input;
mod output;

pub use directory::{segment_file_name, Directory, FsDirectory, RamDirectory};
pub use input::{DataInput, IndexInput};
pub use output::{DataOutput, IndexOutput, OutputSink};
