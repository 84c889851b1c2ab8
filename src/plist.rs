//! Binary property lists (`bplist00`), which Finder stores in many blob
//! records such as `bwsp`, `icvp` and `lsvp`.
//!
//! Layout: an 8-byte magic, the objects, a table of object offsets, and a
//! 32-byte trailer describing the table. Objects refer to each other by index
//! into the offset table.

use tracing::trace;

use crate::cursor::ByteCursor;
use crate::error::{Error, Result};
use crate::options::DecodeOptions;

pub const MAGIC: &[u8; 8] = b"bplist00";
const TRAILER_SIZE: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    /// Seconds since 2001-01-01 00:00:00 UTC.
    Date(f64),
    Data(Vec<u8>),
    String(String),
    Uid(u64),
    Array(Vec<Value>),
    Dictionary(Vec<(String, Value)>),
}

pub fn is_binary_plist(bytes: &[u8]) -> bool {
    bytes.starts_with(MAGIC)
}

/// Decode the top object of a binary property list.
pub fn parse(bytes: &[u8], options: &DecodeOptions) -> Result<Value> {
    if !is_binary_plist(bytes) {
        return Err(malformed("missing bplist00 magic"));
    }
    if bytes.len() < MAGIC.len() + TRAILER_SIZE {
        return Err(Error::TruncatedInput {
            field: "property list trailer",
            needed: MAGIC.len() + TRAILER_SIZE,
            available: bytes.len(),
        });
    }

    let mut trailer = ByteCursor::new(&bytes[bytes.len() - TRAILER_SIZE..]);
    trailer.skip(6, "property list trailer padding")?;
    let offset_size = usize::from(trailer.read_u8("property list offset size")?);
    let ref_size = usize::from(trailer.read_u8("property list reference size")?);
    let object_count = trailer.read_u64_be("property list object count")?;
    let top_object = trailer.read_u64_be("property list top object")?;
    let table_offset = trailer.read_u64_be("property list offset table")?;

    if !(1..=8).contains(&offset_size) || !(1..=8).contains(&ref_size) {
        return Err(malformed("integer sizes must be between 1 and 8 bytes"));
    }
    if top_object >= object_count {
        return Err(malformed("top object lies outside the object table"));
    }
    let table_end = object_count
        .checked_mul(offset_size as u64)
        .and_then(|length| length.checked_add(table_offset));
    match table_end {
        Some(end) if end <= (bytes.len() - TRAILER_SIZE) as u64 => {}
        _ => {
            return Err(Error::OffsetOutOfRange {
                structure: "property list offset table",
                offset: table_offset,
                len: bytes.len(),
            });
        }
    }

    let mut parser = Parser {
        data: bytes,
        options,
        offset_size,
        ref_size,
        object_count,
        table_offset: table_offset as usize,
        decoded: 0,
    };
    parser.object(top_object, 0)
}

fn malformed(message: &str) -> Error {
    Error::Malformed {
        structure: "property list",
        message: message.to_string(),
    }
}

fn be_uint(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(0u64, |value, &byte| (value << 8) | u64::from(byte))
}

struct Parser<'a, 'o> {
    data: &'a [u8],
    options: &'o DecodeOptions,
    offset_size: usize,
    ref_size: usize,
    object_count: u64,
    table_offset: usize,
    decoded: usize,
}

impl<'a> Parser<'a, '_> {
    fn object_offset(&self, index: u64) -> Result<usize> {
        if index >= self.object_count {
            return Err(malformed("object reference lies outside the object table"));
        }
        let at = self.table_offset + index as usize * self.offset_size;
        let mut cursor = ByteCursor::new(self.data).fork_at(at, "property list offset table")?;
        let offset = be_uint(cursor.read_bytes(self.offset_size, "property list object offset")?);
        usize::try_from(offset).map_err(|_| Error::OffsetOutOfRange {
            structure: "property list",
            offset,
            len: self.data.len(),
        })
    }

    fn object(&mut self, index: u64, depth: usize) -> Result<Value> {
        if depth > self.options.max_bookmark_depth {
            return Err(Error::DepthLimitExceeded {
                structure: "property list",
                limit: self.options.max_bookmark_depth,
            });
        }
        self.decoded += 1;
        if self.decoded > self.options.max_bookmark_items {
            return Err(Error::TooManyEntries {
                what: "property list objects",
                limit: self.options.max_bookmark_items,
            });
        }

        let offset = self.object_offset(index)?;
        let mut cursor = ByteCursor::new(self.data).fork_at(offset, "property list object")?;
        let marker = cursor.read_u8("property list object marker")?;
        let info = marker & 0x0f;
        trace!(index, marker, "property list object");

        Ok(match marker >> 4 {
            0x0 => match info {
                0x0 | 0xf => Value::Null,
                0x8 => Value::Bool(false),
                0x9 => Value::Bool(true),
                _ => return Err(malformed("unknown singleton object")),
            },
            0x1 => Value::Integer(Self::integer(&mut cursor, info)?),
            0x2 => match info {
                2 => Value::Real(f64::from(f32::from_be_bytes(
                    cursor.read_array("property list real")?,
                ))),
                3 => Value::Real(f64::from_be_bytes(cursor.read_array("property list real")?)),
                _ => return Err(malformed("unsupported real width")),
            },
            0x3 if info == 3 => {
                Value::Date(f64::from_be_bytes(cursor.read_array("property list date")?))
            }
            0x4 => {
                let count = Self::count(&mut cursor, info)?;
                Value::Data(cursor.read_bytes(count, "property list data")?.to_vec())
            }
            0x5 => {
                let count = Self::count(&mut cursor, info)?;
                let bytes = cursor.read_bytes(count, "property list string")?;
                Value::String(String::from_utf8_lossy(bytes).into_owned())
            }
            0x6 => {
                let count = Self::count(&mut cursor, info)?;
                let units = cursor.read_utf16_be(count, "property list string")?;
                Value::String(String::from_utf16_lossy(&units))
            }
            0x8 => Value::Uid(be_uint(
                cursor.read_bytes(usize::from(info) + 1, "property list uid")?,
            )),
            0xa | 0xc => {
                let count = Self::count(&mut cursor, info)?;
                let refs = self.references(&mut cursor, count)?;
                let mut elements = Vec::new();
                for reference in refs {
                    elements.push(self.object(reference, depth + 1)?);
                }
                Value::Array(elements)
            }
            0xd => {
                let count = Self::count(&mut cursor, info)?;
                let keys = self.references(&mut cursor, count)?;
                let values = self.references(&mut cursor, count)?;
                let mut entries = Vec::new();
                for (key, value) in keys.into_iter().zip(values) {
                    let key = match self.object(key, depth + 1)? {
                        Value::String(key) => key,
                        _ => return Err(malformed("dictionary key is not a string")),
                    };
                    entries.push((key, self.object(value, depth + 1)?));
                }
                Value::Dictionary(entries)
            }
            _ => return Err(malformed("unknown object type")),
        })
    }

    fn integer(cursor: &mut ByteCursor<'_>, info: u8) -> Result<i64> {
        Ok(match info {
            0 => i64::from(cursor.read_u8("property list integer")?),
            1 => i64::from(cursor.read_u16_be("property list integer")?),
            2 => i64::from(cursor.read_u32_be("property list integer")?),
            3 => cursor.read_u64_be("property list integer")? as i64,
            // 128-bit integers only ever hold 64-bit values.
            4 => {
                cursor.skip(8, "property list integer")?;
                cursor.read_u64_be("property list integer")? as i64
            }
            _ => return Err(malformed("unsupported integer width")),
        })
    }

    /// Element count from a marker's low nibble, or from the integer object
    /// that follows when the nibble is 0xf.
    fn count(cursor: &mut ByteCursor<'_>, info: u8) -> Result<usize> {
        if info != 0x0f {
            return Ok(usize::from(info));
        }
        let marker = cursor.read_u8("property list count marker")?;
        if marker >> 4 != 0x1 {
            return Err(malformed("count is not an integer"));
        }
        let count = Self::integer(cursor, marker & 0x0f)?;
        usize::try_from(count).map_err(|_| malformed("negative count"))
    }

    fn references(&self, cursor: &mut ByteCursor<'a>, count: usize) -> Result<Vec<u64>> {
        let width = count
            .checked_mul(self.ref_size)
            .ok_or_else(|| malformed("reference list overflows"))?;
        let bytes = cursor.read_bytes(width, "property list object references")?;
        Ok(bytes.chunks_exact(self.ref_size).map(be_uint).collect())
    }
}
