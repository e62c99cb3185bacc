//! Bounded little-endian cursor over a DWARF section.
//!
//! Positions are absolute offsets into the underlying slice; a cursor may be
//! narrowed to a sub-range with [`Reader::bounded`] so that list and opcode
//! loops can stop at "end of region" rather than at the end of the section.

use crate::header::DwarfError;
use crate::leb128::{decode_sleb128, decode_uleb128};

/// A read cursor over `data[pos..end]`.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    end: usize,
}

impl<'a> Reader<'a> {
    /// Creates a cursor over the whole slice.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            end: data.len(),
        }
    }

    /// Creates a cursor over `data[pos..]`.
    ///
    /// # Errors
    ///
    /// Returns [`DwarfError::Truncated`] if `pos` lies past the end of `data`.
    pub fn at(data: &'a [u8], pos: usize) -> Result<Self, DwarfError> {
        if pos > data.len() {
            return Err(DwarfError::Truncated);
        }
        Ok(Self {
            data,
            pos,
            end: data.len(),
        })
    }

    /// Returns a cursor over the next `len` bytes, leaving `self` untouched.
    ///
    /// # Errors
    ///
    /// Returns [`DwarfError::Truncated`] if fewer than `len` bytes remain.
    pub fn bounded(&self, len: usize) -> Result<Self, DwarfError> {
        let end = self.pos.checked_add(len).ok_or(DwarfError::Truncated)?;
        if end > self.end {
            return Err(DwarfError::Truncated);
        }
        Ok(Self {
            data: self.data,
            pos: self.pos,
            end,
        })
    }

    /// Current absolute offset.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Exclusive upper bound of the region.
    #[must_use]
    pub fn end(&self) -> usize {
        self.end
    }

    /// Whether the cursor has reached the end of its region.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.end
    }

    /// Number of bytes left in the region.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.end.saturating_sub(self.pos)
    }

    /// Advances the cursor by `count` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DwarfError::Truncated`] if fewer than `count` bytes remain.
    pub fn skip(&mut self, count: usize) -> Result<(), DwarfError> {
        self.read_bytes(count).map(|_| ())
    }

    /// Reads `count` raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DwarfError::Truncated`] if fewer than `count` bytes remain.
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], DwarfError> {
        if count > self.remaining() {
            return Err(DwarfError::Truncated);
        }
        let bytes = &self.data[self.pos..self.pos + count];
        self.pos += count;
        Ok(bytes)
    }

    /// Reads a single byte.
    ///
    /// # Errors
    ///
    /// Returns [`DwarfError::Truncated`] at the end of the region.
    pub fn read_u8(&mut self) -> Result<u8, DwarfError> {
        Ok(self.read_bytes(1)?[0])
    }

    /// Reads a little-endian `u16`.
    ///
    /// # Errors
    ///
    /// Returns [`DwarfError::Truncated`] if fewer than 2 bytes remain.
    pub fn read_u16(&mut self) -> Result<u16, DwarfError> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Reads a little-endian `u32`.
    ///
    /// # Errors
    ///
    /// Returns [`DwarfError::Truncated`] if fewer than 4 bytes remain.
    pub fn read_u32(&mut self) -> Result<u32, DwarfError> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads an unsigned LEB128 value.
    ///
    /// # Errors
    ///
    /// Returns [`DwarfError::Truncated`] if the encoding runs past the region.
    pub fn read_uleb128(&mut self) -> Result<u64, DwarfError> {
        let (value, consumed) =
            decode_uleb128(&self.data[self.pos..self.end]).ok_or(DwarfError::Truncated)?;
        self.pos += consumed;
        Ok(value)
    }

    /// Reads a signed LEB128 value.
    ///
    /// # Errors
    ///
    /// Returns [`DwarfError::Truncated`] if the encoding runs past the region.
    pub fn read_sleb128(&mut self) -> Result<i64, DwarfError> {
        let (value, consumed) =
            decode_sleb128(&self.data[self.pos..self.end]).ok_or(DwarfError::Truncated)?;
        self.pos += consumed;
        Ok(value)
    }

    /// Reads a NUL-terminated string, returning the bytes without the NUL.
    ///
    /// # Errors
    ///
    /// Returns [`DwarfError::Truncated`] if no NUL occurs before the region end.
    pub fn read_cstr(&mut self) -> Result<&'a [u8], DwarfError> {
        let remaining = &self.data[self.pos..self.end];
        let nul_pos = remaining
            .iter()
            .position(|&b| b == 0)
            .ok_or(DwarfError::Truncated)?;
        self.pos += nul_pos + 1;
        Ok(&remaining[..nul_pos])
    }
}
