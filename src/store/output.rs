use crate::error::{PostingsError, Result};
use crate::utils::vint;

pub trait DataOutput {
    fn write_byte(&mut self, b: u8) -> Result<()>;

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()>;

    fn write_vint(&mut self, val: u32) -> Result<()> {
        let mut buf = [0u8; vint::MAX_VINT32_LEN];
        let mut cursor = &mut buf[..];
        vint::encode_vint32(val, &mut cursor)?;
        let len = vint::MAX_VINT32_LEN - cursor.len();
        self.write_bytes(&buf[..len])
    }

    fn write_vlong(&mut self, val: u64) -> Result<()> {
        let mut buf = [0u8; vint::MAX_VINT64_LEN];
        let mut cursor = &mut buf[..];
        vint::encode_vint64(val, &mut cursor)?;
        let len = vint::MAX_VINT64_LEN - cursor.len();
        self.write_bytes(&buf[..len])
    }

    fn write_u32(&mut self, val: u32) -> Result<()> {
        self.write_bytes(&val.to_be_bytes())
    }

    fn write_i32(&mut self, val: i32) -> Result<()> {
        self.write_u32(val as u32)
    }

    fn write_u64(&mut self, val: u64) -> Result<()> {
        self.write_bytes(&val.to_be_bytes())
    }

    fn write_string(&mut self, val: &str) -> Result<()> {
        self.write_vint(val.len() as u32)?;
        self.write_bytes(val.as_bytes())
    }
}

impl DataOutput for Vec<u8> {
    fn write_byte(&mut self, b: u8) -> Result<()> {
        self.push(b);
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

/// Destination of an [`IndexOutput`]. `finish` makes the written bytes
/// visible to readers of the directory.
pub trait OutputSink: std::io::Write + Send {
    fn finish(self: Box<Self>) -> std::io::Result<()>;
}

/// Append-only file being written. Keeps a running CRC32 of everything
/// written so far for the footer.
pub struct IndexOutput {
    name: String,
    sink: Option<Box<dyn OutputSink>>,
    hasher: crc32fast::Hasher,
    file_pointer: u64,
}

impl IndexOutput {
    pub fn new(name: impl Into<String>, sink: Box<dyn OutputSink>) -> Self {
        Self {
            name: name.into(),
            sink: Some(sink),
            hasher: crc32fast::Hasher::new(),
            file_pointer: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_pointer(&self) -> u64 {
        self.file_pointer
    }

    pub fn checksum(&self) -> u64 {
        u64::from(self.hasher.clone().finalize())
    }

    pub fn close(mut self) -> Result<()> {
        if let Some(sink) = self.sink.take() {
            sink.finish()?;
        }
        tracing::trace!(file = %self.name, len = self.file_pointer, "closed output");
        Ok(())
    }
}

impl DataOutput for IndexOutput {
    fn write_byte(&mut self, b: u8) -> Result<()> {
        self.write_bytes(&[b])
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let Some(sink) = self.sink.as_mut() else {
            return Err(PostingsError::illegal_state(format!(
                "output {} is already closed",
                self.name
            )));
        };
        sink.write_all(bytes)?;
        self.hasher.update(bytes);
        self.file_pointer += bytes.len() as u64;
        Ok(())
    }
}

impl Drop for IndexOutput {
    fn drop(&mut self) {
        if self.sink.is_some() {
            tracing::warn!(file = %self.name, "output dropped without close, discarding");
        }
    }
}
