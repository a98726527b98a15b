//! Variable-length integers. The high bit marks the last byte of a value,
//! the low seven bits of each byte are little-endian groups.

use crate::error::{PostingsError, Result};
use crate::store::DataInput;

const STOP_BIT: u8 = 128;

pub const MAX_VINT32_LEN: usize = 5;
pub const MAX_VINT64_LEN: usize = 10;

pub fn encode_vint32(val: u32, mut w: impl std::io::Write) -> std::io::Result<()> {
    const START_2: u64 = 1 << 7;
    const START_3: u64 = 1 << 14;
    const START_4: u64 = 1 << 21;
    const START_5: u64 = 1 << 28;

    const MASK_1: u64 = 127;
    const MASK_2: u64 = MASK_1 << 7;
    const MASK_3: u64 = MASK_2 << 7;
    const MASK_4: u64 = MASK_3 << 7;
    const MASK_5: u64 = MASK_4 << 7;

    let val = u64::from(val);
    const STOP_BIT: u64 = 128u64;
    let (res, num_bytes) = if val < START_2 {
        (val | STOP_BIT, 1)
    } else if val < START_3 {
        (
            (val & MASK_1) | ((val & MASK_2) << 1) | (STOP_BIT << (8)),
            2,
        )
    } else if val < START_4 {
        (
            (val & MASK_1) | ((val & MASK_2) << 1) | ((val & MASK_3) << 2) | (STOP_BIT << (8 * 2)),
            3,
        )
    } else if val < START_5 {
        (
            (val & MASK_1)
                | ((val & MASK_2) << 1)
                | ((val & MASK_3) << 2)
                | ((val & MASK_4) << 3)
                | (STOP_BIT << (8 * 3)),
            4,
        )
    } else {
        (
            (val & MASK_1)
                | ((val & MASK_2) << 1)
                | ((val & MASK_3) << 2)
                | ((val & MASK_4) << 3)
                | ((val & MASK_5) << 4)
                | (STOP_BIT << (8 * 4)),
            5,
        )
    };
    w.write_all(&res.to_le_bytes()[..num_bytes])
}

pub fn decode_vint32(data: &mut &[u8]) -> Result<u32> {
    let vlen = vint32_len(data)?;
    let mut result = 0u32;
    let mut shift = 0u32;
    for &b in &data[..vlen] {
        result |= u32::from(b & 127u8) << shift;
        shift += 7;
    }
    *data = &data[vlen..];
    Ok(result)
}

fn vint32_len(data: &[u8]) -> Result<usize> {
    for (i, &val) in data.iter().enumerate().take(MAX_VINT32_LEN) {
        if val >= STOP_BIT {
            return Ok(i + 1);
        }
    }
    Err(PostingsError::corrupt("invalid vint32", "byte slice"))
}

pub fn encode_vint64(mut val: u64, mut w: impl std::io::Write) -> std::io::Result<()> {
    loop {
        let b = (val & 127) as u8;
        val >>= 7;
        if val == 0 {
            w.write_all(&[b | STOP_BIT])?;
            break;
        }
        w.write_all(&[b])?;
    }
    Ok(())
}

pub fn decode_vint64(data: &mut &[u8]) -> Result<u64> {
    let mut result = 0u64;
    let mut shift = 0u32;
    loop {
        let Some((&b, rest)) = data.split_first() else {
            return Err(PostingsError::corrupt("truncated vint64", "byte slice"));
        };
        *data = rest;
        if shift >= 64 {
            return Err(PostingsError::corrupt("invalid vint64", "byte slice"));
        }
        result |= u64::from(b & 127) << shift;
        shift += 7;
        if b >= STOP_BIT {
            break;
        }
    }
    Ok(result)
}

/// Byte-at-a-time decoding for streams that cannot lend a contiguous slice.
pub fn read_vint32<I: DataInput + ?Sized>(input: &mut I) -> Result<u32> {
    let mut result = 0u32;
    for i in 0..MAX_VINT32_LEN {
        let b = input.read_byte()?;
        result |= u32::from(b & 127) << (7 * i);
        if b >= STOP_BIT {
            return Ok(result);
        }
    }
    Err(PostingsError::corrupt("invalid vint32", input.resource()))
}

pub fn read_vint64<I: DataInput + ?Sized>(input: &mut I) -> Result<u64> {
    let mut result = 0u64;
    for i in 0..MAX_VINT64_LEN {
        let b = input.read_byte()?;
        result |= u64::from(b & 127) << (7 * i);
        if b >= STOP_BIT {
            return Ok(result);
        }
    }
    Err(PostingsError::corrupt("invalid vint64", input.resource()))
}
