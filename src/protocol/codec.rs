// MySQL length-encoded integers and strings

use bytes::{BufMut, BytesMut};

use super::error::ProtocolError;
use super::Result;

/// First-byte marker for a NULL length-encoded value.
pub const NULL_MARKER: u8 = 0xFB;

/// A decoded length-encoded integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LenencInt {
    pub value: u64,
    pub is_null: bool,
    /// Total bytes the encoding occupied, marker included.
    pub size: usize,
}

/// Appends `n` as a MySQL length-encoded integer.
///
/// Values up to 250 encode as a single literal byte; larger values get a
/// `0xFC`/`0xFD`/`0xFE` marker followed by 2, 3, or 8 little-endian bytes.
pub fn put_lenenc_int(buf: &mut BytesMut, n: u64) {
    if n <= 250 {
        buf.put_u8(n as u8);
    } else if n <= 0xFFFF {
        buf.put_u8(0xFC);
        buf.put_u16_le(n as u16);
    } else if n <= 0xFF_FFFF {
        buf.put_u8(0xFD);
        buf.put_u8(n as u8);
        buf.put_u8((n >> 8) as u8);
        buf.put_u8((n >> 16) as u8);
    } else {
        buf.put_u8(0xFE);
        buf.put_u64_le(n);
    }
}

/// Reads a length-encoded integer from the front of `buf`.
pub fn get_lenenc_int(buf: &[u8]) -> Result<LenencInt> {
    let first = *buf
        .first()
        .ok_or_else(|| ProtocolError::violation("length-encoded integer on empty buffer"))?;
    match first {
        NULL_MARKER => Ok(LenencInt {
            value: 0,
            is_null: true,
            size: 1,
        }),
        0xFC => {
            let tail = tail_bytes(buf, 2)?;
            Ok(LenencInt {
                value: u64::from(u16::from_le_bytes([tail[0], tail[1]])),
                is_null: false,
                size: 3,
            })
        }
        0xFD => {
            let tail = tail_bytes(buf, 3)?;
            Ok(LenencInt {
                value: u64::from(u32::from_le_bytes([tail[0], tail[1], tail[2], 0])),
                is_null: false,
                size: 4,
            })
        }
        0xFE => {
            let tail = tail_bytes(buf, 8)?;
            let mut raw = [0u8; 8];
            raw.copy_from_slice(tail);
            Ok(LenencInt {
                value: u64::from_le_bytes(raw),
                is_null: false,
                size: 9,
            })
        }
        literal => Ok(LenencInt {
            value: u64::from(literal),
            is_null: false,
            size: 1,
        }),
    }
}

fn tail_bytes(buf: &[u8], n: usize) -> Result<&[u8]> {
    buf.get(1..1 + n).ok_or_else(|| {
        ProtocolError::violation(format!("length-encoded integer truncated: {} tail bytes missing", n))
    })
}

/// Appends a length-encoded string: lenenc length prefix, then the raw bytes.
pub fn put_lenenc_bytes(buf: &mut BytesMut, data: &[u8]) {
    put_lenenc_int(buf, data.len() as u64);
    buf.put_slice(data);
}

/// Reads a length-encoded string, returning `(bytes, is_null, total size)`.
pub fn get_lenenc_bytes(buf: &[u8]) -> Result<(&[u8], bool, usize)> {
    let prefix = get_lenenc_int(buf)?;
    if prefix.is_null {
        return Ok((&[], true, prefix.size));
    }
    // The declared length comes off the wire; the end offset may not fit.
    let len = prefix.value as usize;
    let end = prefix
        .size
        .checked_add(len)
        .ok_or_else(|| ProtocolError::violation("length-encoded string exceeds buffer"))?;
    let data = buf
        .get(prefix.size..end)
        .ok_or_else(|| ProtocolError::violation("length-encoded string exceeds buffer"))?;
    Ok((data, false, end))
}

/// Sequential reader over one packet payload.
///
/// Every read checks the remaining length and fails with a protocol
/// violation on truncation, so packet decoders can use `?` throughout.
pub struct PayloadReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(ProtocolError::violation(format!(
                "payload truncated: need {} bytes, {} remain",
                n,
                self.remaining()
            )));
        }
        let data: &'a [u8] = self.data;
        let slice = &data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u64_le(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    /// Reads up to, and consumes, the next NUL byte.
    pub fn read_null_terminated(&mut self) -> Result<&'a [u8]> {
        let data: &'a [u8] = self.data;
        let rest = &data[self.pos..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| ProtocolError::violation("missing NUL terminator"))?;
        self.pos += nul + 1;
        Ok(&rest[..nul])
    }

    pub fn read_lenenc_int(&mut self) -> Result<LenencInt> {
        let data: &'a [u8] = self.data;
        let decoded = get_lenenc_int(&data[self.pos..])?;
        self.pos += decoded.size;
        Ok(decoded)
    }

    pub fn read_lenenc_bytes(&mut self) -> Result<(&'a [u8], bool)> {
        let data: &'a [u8] = self.data;
        let (bytes, is_null, size) = get_lenenc_bytes(&data[self.pos..])?;
        self.pos += size;
        Ok((bytes, is_null))
    }
}
