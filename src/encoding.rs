//! CompactSize integers and a bounds-checked byte reader for wire decoding

use crate::error::{MultisigError, Result};

/// Number of bytes CompactSize uses for `n`
pub fn compact_size_len(n: u64) -> usize {
    if n < 0xfd {
        1
    } else if n <= 0xffff {
        3
    } else if n <= 0xffff_ffff {
        5
    } else {
        9
    }
}

/// Append CompactSize(n):
/// n < 0xfd → [n]; n ≤ 0xffff → [0xfd, u16 LE]; n ≤ 0xffffffff → [0xfe, u32 LE];
/// else [0xff, u64 LE]
pub fn write_compact_size(n: u64, out: &mut Vec<u8>) {
    if n < 0xfd {
        out.push(n as u8);
    } else if n <= 0xffff {
        out.push(0xfd);
        out.extend_from_slice(&(n as u16).to_le_bytes());
    } else if n <= 0xffff_ffff {
        out.push(0xfe);
        out.extend_from_slice(&(n as u32).to_le_bytes());
    } else {
        out.push(0xff);
        out.extend_from_slice(&n.to_le_bytes());
    }
}

/// Append CompactSize(len(bytes)) ‖ bytes
pub fn write_var_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    write_compact_size(bytes.len() as u64, out);
    out.extend_from_slice(bytes);
}

/// Cursor over a byte slice; every read fails with `TruncatedInput` past the end
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Byte at the cursor without consuming it
    pub fn peek_u8(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(MultisigError::TruncatedInput {
                offset: self.pos,
                needed: len,
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64_le(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Read a CompactSize, rejecting encodings longer than necessary
    pub fn read_compact_size(&mut self) -> Result<u64> {
        let (value, minimum) = match self.read_u8()? {
            0xff => (self.read_u64_le()?, 0x1_0000_0000),
            0xfe => (u64::from(self.read_u32_le()?), 0x1_0000),
            0xfd => (u64::from(self.read_u16_le()?), 0xfd),
            n => return Ok(u64::from(n)),
        };
        if value < minimum {
            return Err(MultisigError::NonCanonicalCompactSize(value));
        }
        Ok(value)
    }

    /// Read CompactSize(len) ‖ bytes
    pub fn read_var_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_compact_size()?;
        // Never trust a length prefix beyond the data actually present
        if len > self.remaining() as u64 {
            return Err(MultisigError::TruncatedInput {
                offset: self.pos,
                needed: usize::try_from(len).unwrap_or(usize::MAX),
            });
        }
        Ok(self.read_bytes(len as usize)?.to_vec())
    }

    /// Fail with `TrailingBytes` unless the whole input was consumed
    pub fn finish(self) -> Result<()> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(MultisigError::TrailingBytes(n)),
        }
    }
}
