//! File framing: every file starts with an index header naming its codec,
//! version, segment id and suffix, and ends with a footer carrying the CRC32
//! of everything before the checksum itself.

use super::{DataInput, DataOutput, IndexInput, IndexOutput};
use crate::error::{PostingsError, Result};

pub const CODEC_MAGIC: u32 = 0x3fd7_6c17;
pub const FOOTER_MAGIC: u32 = !CODEC_MAGIC;
pub const ID_LENGTH: usize = 16;
pub const FOOTER_LENGTH: u64 = 16;

pub type SegmentId = [u8; ID_LENGTH];

pub fn write_index_header<O: DataOutput + ?Sized>(
    out: &mut O,
    codec: &str,
    version: i32,
    id: &SegmentId,
    suffix: &str,
) -> Result<()> {
    if suffix.len() > u8::MAX as usize {
        return Err(PostingsError::illegal_state(format!(
            "suffix must be shorter than 256 bytes, got {}",
            suffix.len()
        )));
    }
    out.write_u32(CODEC_MAGIC)?;
    out.write_string(codec)?;
    out.write_i32(version)?;
    out.write_bytes(id)?;
    out.write_byte(suffix.len() as u8)?;
    out.write_bytes(suffix.as_bytes())
}

/// Validates the header and returns the stored version.
pub fn check_index_header<I: DataInput + ?Sized>(
    input: &mut I,
    codec: &str,
    min_version: i32,
    max_version: i32,
    id: &SegmentId,
    suffix: &str,
) -> Result<i32> {
    let magic = input.read_u32()?;
    if magic != CODEC_MAGIC {
        return Err(PostingsError::corrupt(
            format!("codec header mismatch: actual {magic:#x} vs expected {CODEC_MAGIC:#x}"),
            input.resource(),
        ));
    }
    let actual_codec = input.read_string()?;
    if actual_codec != codec {
        return Err(PostingsError::corrupt(
            format!("codec mismatch: actual {actual_codec:?} vs expected {codec:?}"),
            input.resource(),
        ));
    }
    let version = input.read_i32()?;
    if version < min_version || version > max_version {
        return Err(PostingsError::UnsupportedVersion {
            codec: codec.to_string(),
            version,
            min: min_version,
            max: max_version,
        });
    }
    let mut actual_id = [0u8; ID_LENGTH];
    input.read_bytes(&mut actual_id)?;
    if &actual_id != id {
        return Err(PostingsError::corrupt(
            "segment id mismatch in file header",
            input.resource(),
        ));
    }
    let suffix_len = input.read_byte()? as usize;
    let mut actual_suffix = vec![0u8; suffix_len];
    input.read_bytes(&mut actual_suffix)?;
    if actual_suffix != suffix.as_bytes() {
        return Err(PostingsError::corrupt(
            format!(
                "file suffix mismatch: actual {:?} vs expected {suffix:?}",
                String::from_utf8_lossy(&actual_suffix)
            ),
            input.resource(),
        ));
    }
    Ok(version)
}

pub fn write_footer(out: &mut IndexOutput) -> Result<()> {
    out.write_u32(FOOTER_MAGIC)?;
    out.write_u32(0)?;
    let checksum = out.checksum();
    out.write_u64(checksum)
}

fn read_footer(input: &mut IndexInput) -> Result<u64> {
    let magic = input.read_u32()?;
    if magic != FOOTER_MAGIC {
        return Err(PostingsError::corrupt(
            format!("codec footer mismatch (file truncated?): actual {magic:#x} vs expected {FOOTER_MAGIC:#x}"),
            input.resource(),
        ));
    }
    let algorithm = input.read_u32()?;
    if algorithm != 0 {
        return Err(PostingsError::corrupt(
            format!("unknown checksum algorithm {algorithm}"),
            input.resource(),
        ));
    }
    let checksum = input.read_u64()?;
    if checksum >> 32 != 0 {
        return Err(PostingsError::corrupt(
            format!("illegal CRC-32 checksum {checksum:#x}"),
            input.resource(),
        ));
    }
    Ok(checksum)
}

/// Reads the stored checksum after validating the footer structure. Does not
/// hash the file.
pub fn retrieve_checksum(input: &IndexInput) -> Result<u64> {
    let mut input = input.clone();
    if input.len() < FOOTER_LENGTH {
        return Err(PostingsError::corrupt(
            format!("misplaced codec footer (file truncated?): length {}", input.len()),
            input.resource(),
        ));
    }
    input.seek(input.len() - FOOTER_LENGTH)?;
    read_footer(&mut input)
}

/// Hashes the whole file and compares against the footer.
pub fn checksum_entire_file(input: &IndexInput) -> Result<u64> {
    let expected = retrieve_checksum(input)?;
    let body = input.slice(0, input.len() - 8)?;
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(body);
    let actual = u64::from(hasher.finalize());
    if actual != expected {
        tracing::warn!(file = input.name(), expected, actual, "checksum mismatch");
        return Err(PostingsError::corrupt(
            format!("checksum failed (hardware problem?): expected {expected:#x} actual {actual:#x}"),
            format!("IndexInput(\"{}\")", input.name()),
        ));
    }
    Ok(actual)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::{Directory, RamDirectory};

    const ID: SegmentId = [7u8; ID_LENGTH];

    fn framed_file(dir: &RamDirectory) -> IndexInput {
        let mut out = dir.create_output("_0.doc").unwrap();
        write_index_header(&mut out, "PostingsDoc", 1, &ID, "s").unwrap();
        out.write_bytes(&[1, 2, 3, 4, 5]).unwrap();
        write_footer(&mut out).unwrap();
        out.close().unwrap();
        dir.open_input("_0.doc").unwrap()
    }

    #[test]
    fn test_header_and_footer() {
        let dir = RamDirectory::new();
        let mut input = framed_file(&dir);
        let version = check_index_header(&mut input, "PostingsDoc", 0, 1, &ID, "s").unwrap();
        assert_eq!(version, 1);
        assert_eq!(input.read_byte().unwrap(), 1);
        let stored = retrieve_checksum(&input).unwrap();
        assert_eq!(checksum_entire_file(&input).unwrap(), stored);
    }

    #[test]
    fn test_header_mismatch() {
        let dir = RamDirectory::new();
        let input = framed_file(&dir);
        assert!(check_index_header(&mut input.clone(), "PostingsPos", 0, 1, &ID, "s").is_err());
        assert!(matches!(
            check_index_header(&mut input.clone(), "PostingsDoc", 2, 3, &ID, "s"),
            Err(PostingsError::UnsupportedVersion { version: 1, .. })
        ));
        assert!(check_index_header(&mut input.clone(), "PostingsDoc", 0, 1, &[0; 16], "s").is_err());
        assert!(check_index_header(&mut input.clone(), "PostingsDoc", 0, 1, &ID, "t").is_err());
    }

    #[test]
    fn test_checksum_detects_flipped_byte() {
        let dir = RamDirectory::new();
        let input = framed_file(&dir);
        let mut bytes = input.slice(0, input.len()).unwrap().to_vec();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0x10;
        dir.overwrite("_0.doc", bytes);
        let input = dir.open_input("_0.doc").unwrap();
        assert!(retrieve_checksum(&input).is_ok());
        let err = checksum_entire_file(&input).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_truncated_footer() {
        let dir = RamDirectory::new();
        let input = framed_file(&dir);
        let bytes = input.slice(0, input.len() - 3).unwrap().to_vec();
        dir.overwrite("_0.doc", bytes);
        let input = dir.open_input("_0.doc").unwrap();
        assert!(retrieve_checksum(&input).unwrap_err().is_corruption());
    }
}
