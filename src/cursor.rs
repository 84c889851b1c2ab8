//! Bounds-checked primitive reads over an immutable byte buffer.
//!
//! Every read names the field being decoded so that a short buffer reports
//! what was being read and how many bytes it needed.

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// The whole underlying buffer, independent of the current position.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn seek(&mut self, position: usize, structure: &'static str) -> Result<()> {
        if position > self.data.len() {
            return Err(Error::OffsetOutOfRange {
                structure,
                offset: position as u64,
                len: self.data.len(),
            });
        }
        self.position = position;
        Ok(())
    }

    /// A new cursor over the same buffer, positioned at `offset`.
    pub fn fork_at(&self, offset: usize, structure: &'static str) -> Result<ByteCursor<'a>> {
        let mut cursor = ByteCursor::new(self.data);
        cursor.seek(offset, structure)?;
        Ok(cursor)
    }

    pub fn read_bytes(&mut self, count: usize, field: &'static str) -> Result<&'a [u8]> {
        if count > self.remaining() {
            return Err(Error::TruncatedInput {
                field,
                needed: count,
                available: self.remaining(),
            });
        }
        let bytes = &self.data[self.position..self.position + count];
        self.position += count;
        Ok(bytes)
    }

    pub fn skip(&mut self, count: usize, field: &'static str) -> Result<()> {
        self.read_bytes(count, field).map(|_| ())
    }

    pub fn read_array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N, field)?);
        Ok(out)
    }

    pub fn read_u8(&mut self, field: &'static str) -> Result<u8> {
        Ok(self.read_array::<1>(field)?[0])
    }

    pub fn read_u16_be(&mut self, field: &'static str) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read_array(field)?))
    }

    pub fn read_u16_le(&mut self, field: &'static str) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array(field)?))
    }

    pub fn read_i16_be(&mut self, field: &'static str) -> Result<i16> {
        Ok(i16::from_be_bytes(self.read_array(field)?))
    }

    pub fn read_u32_be(&mut self, field: &'static str) -> Result<u32> {
        Ok(u32::from_be_bytes(self.read_array(field)?))
    }

    pub fn read_u32_le(&mut self, field: &'static str) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array(field)?))
    }

    pub fn read_u64_be(&mut self, field: &'static str) -> Result<u64> {
        Ok(u64::from_be_bytes(self.read_array(field)?))
    }

    pub fn read_u64_le(&mut self, field: &'static str) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array(field)?))
    }

    /// Read `count` big-endian UTF-16 code units.
    pub fn read_utf16_be(&mut self, count: usize, field: &'static str) -> Result<Vec<u16>> {
        let bytes = self.read_bytes(checked_width(count, 2, field)?, field)?;
        Ok(bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect())
    }

    /// Read `count` big-endian 32-bit integers.
    pub fn read_u32_be_vec(&mut self, count: usize, field: &'static str) -> Result<Vec<u32>> {
        let bytes = self.read_bytes(checked_width(count, 4, field)?, field)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|quad| u32::from_be_bytes([quad[0], quad[1], quad[2], quad[3]]))
            .collect())
    }
}

fn checked_width(count: usize, width: usize, field: &'static str) -> Result<usize> {
    count.checked_mul(width).ok_or(Error::TruncatedInput {
        field,
        needed: usize::MAX,
        available: 0,
    })
}
