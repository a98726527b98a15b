use std::sync::Arc;

use crate::error::{PostingsError, Result};
use crate::utils::vint;

pub trait DataInput {
    fn read_byte(&mut self) -> Result<u8>;

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Name used in corruption messages.
    fn resource(&self) -> String;

    fn skip_bytes(&mut self, mut count: u64) -> Result<()> {
        let mut scratch = [0u8; 256];
        while count > 0 {
            let step = count.min(scratch.len() as u64) as usize;
            self.read_bytes(&mut scratch[..step])?;
            count -= step as u64;
        }
        Ok(())
    }

    fn read_vint(&mut self) -> Result<u32> {
        vint::read_vint32(self)
    }

    fn read_vlong(&mut self) -> Result<u64> {
        vint::read_vint64(self)
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_bytes(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    fn read_i32(&mut self) -> Result<i32> {
        self.read_u32().map(|v| v as i32)
    }

    fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_bytes(&mut buf)?;
        Ok(u64::from_be_bytes(buf))
    }

    fn read_string(&mut self) -> Result<String> {
        let len = self.read_vint()? as usize;
        let mut buf = vec![0u8; len];
        self.read_bytes(&mut buf)?;
        String::from_utf8(buf)
            .map_err(|_| PostingsError::corrupt("invalid utf-8 string", self.resource()))
    }
}

impl DataInput for &[u8] {
    fn read_byte(&mut self) -> Result<u8> {
        let Some((&b, rest)) = self.split_first() else {
            return Err(PostingsError::corrupt("read past EOF", self.resource()));
        };
        *self = rest;
        Ok(b)
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.len() < buf.len() {
            return Err(PostingsError::corrupt("read past EOF", self.resource()));
        }
        let (head, rest) = self.split_at(buf.len());
        buf.copy_from_slice(head);
        *self = rest;
        Ok(())
    }

    fn resource(&self) -> String {
        "byte slice".to_string()
    }

    fn read_vint(&mut self) -> Result<u32> {
        vint::decode_vint32(self)
    }

    fn read_vlong(&mut self) -> Result<u64> {
        vint::decode_vint64(self)
    }
}

/// Random-access cursor over immutable file content. Cloning copies the
/// cursor only; the bytes are shared.
#[derive(Clone)]
pub struct IndexInput {
    name: Arc<str>,
    data: Arc<[u8]>,
    pos: usize,
}

impl IndexInput {
    pub fn new(name: impl Into<Arc<str>>, data: Arc<[u8]>) -> Self {
        Self {
            name: name.into(),
            data,
            pos: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn file_pointer(&self) -> u64 {
        self.pos as u64
    }

    pub fn seek(&mut self, fp: u64) -> Result<()> {
        if fp > self.len() {
            return Err(PostingsError::corrupt(
                format!("seek to {} past EOF ({})", fp, self.len()),
                self.resource(),
            ));
        }
        self.pos = fp as usize;
        Ok(())
    }

    /// Bytes in `[start, end)` without moving the cursor.
    pub fn slice(&self, start: u64, end: u64) -> Result<&[u8]> {
        if start > end || end > self.len() {
            return Err(PostingsError::corrupt(
                format!("slice {}..{} out of bounds ({})", start, end, self.len()),
                self.resource(),
            ));
        }
        Ok(&self.data[start as usize..end as usize])
    }

    fn remaining(&self) -> &[u8] {
        &self.data[self.pos..]
    }
}

impl DataInput for IndexInput {
    fn read_byte(&mut self) -> Result<u8> {
        match self.data.get(self.pos) {
            Some(&b) => {
                self.pos += 1;
                Ok(b)
            }
            None => Err(PostingsError::corrupt("read past EOF", self.resource())),
        }
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        let end = self.pos + buf.len();
        if end > self.data.len() {
            return Err(PostingsError::corrupt("read past EOF", self.resource()));
        }
        buf.copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        Ok(())
    }

    fn resource(&self) -> String {
        format!("IndexInput(\"{}\")", self.name)
    }

    fn skip_bytes(&mut self, count: u64) -> Result<()> {
        let target = self.file_pointer() + count;
        if target > self.len() {
            return Err(PostingsError::corrupt("skip past EOF", self.resource()));
        }
        self.pos = target as usize;
        Ok(())
    }

    fn read_vint(&mut self) -> Result<u32> {
        let mut data = self.remaining();
        let before = data.len();
        let value = vint::decode_vint32(&mut data)
            .map_err(|_| PostingsError::corrupt("invalid vint32", self.resource()))?;
        let consumed = before - data.len();
        self.pos += consumed;
        Ok(value)
    }

    fn read_vlong(&mut self) -> Result<u64> {
        let mut data = self.remaining();
        let before = data.len();
        let value = vint::decode_vint64(&mut data)
            .map_err(|_| PostingsError::corrupt("invalid vint64", self.resource()))?;
        let consumed = before - data.len();
        self.pos += consumed;
        Ok(value)
    }
}
