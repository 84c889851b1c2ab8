//! Bookmark records (`pBBk`), the successor to aliases.
//!
//! A bookmark starts with a 48-byte header. Every offset inside it is measured
//! from the end of that header, where the offset of the first table of
//! contents is stored. Tables of contents form a linked list; their entries
//! point at typed values elsewhere in the record.
//!
//! The header magic is big-endian. All other integers are little-endian,
//! except dates, which are big-endian doubles.

use ds_types::FourCharCode;
use tracing::debug;

use crate::cursor::ByteCursor;
use crate::error::{DecodeContext, Error, Result};
use crate::raw::{self, FixedLayout, RawBookmarkHeader, RawTocEntry, RawTocHeader};

/// Value type codes.
pub mod item_type {
    pub const STRING: u32 = 0x0101;
    pub const DATA: u32 = 0x0201;
    pub const INT8: u32 = 0x0301;
    pub const INT16: u32 = 0x0302;
    pub const INT32: u32 = 0x0303;
    pub const INT64: u32 = 0x0304;
    pub const FLOAT32: u32 = 0x0305;
    pub const FLOAT64: u32 = 0x0306;
    pub const DATE: u32 = 0x0400;
    pub const FALSE: u32 = 0x0500;
    pub const TRUE: u32 = 0x0501;
    pub const ARRAY: u32 = 0x0601;
    pub const DICTIONARY: u32 = 0x0701;
    pub const UUID: u32 = 0x0801;
    pub const URL: u32 = 0x0901;
    pub const RELATIVE_URL: u32 = 0x0902;
}

/// Keys with this bit set name their key string by offset instead.
const NAMED_KEY: u32 = 0x8000_0000;

#[derive(Debug, Clone, PartialEq)]
pub struct Bookmark {
    pub magic: FourCharCode,
    pub bookmark_size: u32,
    pub unknown: u32,
    pub header_size: u32,
    pub reserved: [u8; 32],
    pub toc_offset: u32,
    pub tocs: Vec<TableOfContents>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableOfContents {
    pub size: u32,
    pub magic: u32,
    pub identifier: u32,
    pub next_toc_offset: u32,
    pub entries: Vec<TocEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TocEntry {
    pub key: u32,
    pub offset: u32,
    pub reserved: u32,
    /// For keys stored as a string reference, the referenced string.
    pub key_name: Option<String>,
    pub item: BookmarkItem,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookmarkItem {
    pub length: u32,
    pub type_code: u32,
    pub value: BookmarkValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BookmarkValue {
    String(String),
    Url(String),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    /// Seconds since 2001-01-01 00:00:00 UTC.
    Date(f64),
    Bool(bool),
    Array(Vec<BookmarkItem>),
    /// Key/value pairs in stored order.
    Dictionary(Vec<(BookmarkItem, BookmarkItem)>),
    Uuid(Vec<u8>),
    Data(Vec<u8>),
    /// Relative URLs, unknown types, and values too short for their type.
    Other(Vec<u8>),
}

impl BookmarkValue {
    /// Name of the value's type, or `None` when the raw type code is all
    /// that is known.
    pub fn type_name(&self) -> Option<&'static str> {
        Some(match self {
            BookmarkValue::String(_) => "string",
            BookmarkValue::Url(_) => "url",
            BookmarkValue::Int8(_) => "int8",
            BookmarkValue::Int16(_) => "int16",
            BookmarkValue::Int32(_) => "int32",
            BookmarkValue::Int64(_) => "int64",
            BookmarkValue::Float32(_) => "float32",
            BookmarkValue::Float64(_) => "float64",
            BookmarkValue::Date(_) => "date",
            BookmarkValue::Bool(_) => "bool",
            BookmarkValue::Array(_) => "array",
            BookmarkValue::Dictionary(_) => "dictionary",
            BookmarkValue::Uuid(_) => "uuid",
            BookmarkValue::Data(_) => "data",
            BookmarkValue::Other(_) => return None,
        })
    }
}

impl Bookmark {
    pub const HEADER_SIZE: u32 = 48;

    pub fn decode(bytes: &[u8], ctx: &mut DecodeContext) -> Result<Self> {
        let mut cursor = ByteCursor::new(bytes);
        let header: RawBookmarkHeader = raw::read_fixed(&mut cursor)?;
        if header.header_size != Self::HEADER_SIZE {
            return Err(Error::SizeMismatch {
                structure: "bookmark header",
                declared: header.header_size as usize,
                actual: RawBookmarkHeader::SIZE,
            });
        }

        let origin = &bytes[RawBookmarkHeader::SIZE..];
        let toc_offset = ByteCursor::new(origin).read_u32_le("bookmark toc offset")?;

        let mut resolver = Resolver {
            origin,
            ctx,
            resolved: 0,
        };
        let mut tocs = Vec::new();
        let mut next = toc_offset;
        while next != 0 {
            if tocs.len() >= resolver.ctx.options.max_toc_count {
                return Err(Error::TooManyEntries {
                    what: "bookmark tables of contents",
                    limit: resolver.ctx.options.max_toc_count,
                });
            }
            let toc = resolver.table_of_contents(next)?;
            next = toc.next_toc_offset;
            tocs.push(toc);
        }

        debug!(tocs = tocs.len(), "read bookmark");
        Ok(Self {
            magic: FourCharCode(header.magic),
            bookmark_size: header.bookmark_size,
            unknown: header.unknown,
            header_size: header.header_size,
            reserved: header.reserved,
            toc_offset,
            tocs,
        })
    }

    /// All entries across every table of contents.
    pub fn entries(&self) -> impl Iterator<Item = &TocEntry> {
        self.tocs.iter().flat_map(|toc| toc.entries.iter())
    }
}

struct Resolver<'a, 'c> {
    origin: &'a [u8],
    ctx: &'c mut DecodeContext,
    resolved: usize,
}

impl<'a> Resolver<'a, '_> {
    fn cursor_at(&self, offset: u32, structure: &'static str) -> Result<ByteCursor<'a>> {
        ByteCursor::new(self.origin).fork_at(offset as usize, structure)
    }

    fn table_of_contents(&mut self, offset: u32) -> Result<TableOfContents> {
        let mut cursor = self.cursor_at(offset, "bookmark table of contents")?;
        let header: RawTocHeader = raw::read_fixed(&mut cursor)?;
        let limit = self.ctx.options.max_toc_entries;
        if header.count as usize > limit {
            return Err(Error::TooManyEntries {
                what: "bookmark table of contents entries",
                limit,
            });
        }

        let mut entries = Vec::new();
        for _ in 0..header.count {
            let entry: RawTocEntry = raw::read_fixed(&mut cursor)?;
            let item = self.item(entry.offset, 0)?;
            let key_name = self.key_name(entry.key);
            entries.push(TocEntry {
                key: entry.key,
                offset: entry.offset,
                reserved: entry.reserved,
                key_name,
                item,
            });
        }

        Ok(TableOfContents {
            size: header.size,
            magic: header.magic,
            identifier: header.identifier,
            next_toc_offset: header.next_toc_offset,
            entries,
        })
    }

    fn key_name(&mut self, key: u32) -> Option<String> {
        if key & NAMED_KEY == 0 {
            return None;
        }
        // Key strings are leaves; resolve them at the deepest level so that
        // a key pointing at an array cannot recurse.
        let depth = self.ctx.options.max_bookmark_depth;
        match self.item(key & !NAMED_KEY, depth) {
            Ok(BookmarkItem {
                value: BookmarkValue::String(name),
                ..
            }) => Some(name),
            Ok(_) => None,
            Err(e) => {
                debug!(key, "unreadable bookmark key name: {e}");
                None
            }
        }
    }

    fn item(&mut self, offset: u32, depth: usize) -> Result<BookmarkItem> {
        let max_depth = self.ctx.options.max_bookmark_depth;
        if depth > max_depth {
            return Err(Error::DepthLimitExceeded {
                structure: "bookmark",
                limit: max_depth,
            });
        }
        let max_items = self.ctx.options.max_bookmark_items;
        self.resolved += 1;
        if self.resolved > max_items {
            return Err(Error::TooManyEntries {
                what: "bookmark values",
                limit: max_items,
            });
        }

        let mut cursor = self.cursor_at(offset, "bookmark value")?;
        let length = cursor.read_u32_le("bookmark value length")?;
        let type_code = cursor.read_u32_le("bookmark value type")?;
        let max_len = self.ctx.options.max_value_len;
        if length as usize > max_len {
            return Err(Error::ValueTooLarge {
                what: "bookmark value",
                length: length as usize,
                limit: max_len,
            });
        }
        let bytes = cursor.read_bytes(length as usize, "bookmark value data")?;

        let value = match type_code {
            item_type::STRING => BookmarkValue::String(String::from_utf8_lossy(bytes).into_owned()),
            item_type::URL => BookmarkValue::Url(String::from_utf8_lossy(bytes).into_owned()),
            item_type::INT8 => le::<1>(bytes)
                .map(|b| BookmarkValue::Int8(i8::from_le_bytes(b)))
                .unwrap_or_else(|| other(bytes)),
            item_type::INT16 => le::<2>(bytes)
                .map(|b| BookmarkValue::Int16(i16::from_le_bytes(b)))
                .unwrap_or_else(|| other(bytes)),
            item_type::INT32 => le::<4>(bytes)
                .map(|b| BookmarkValue::Int32(i32::from_le_bytes(b)))
                .unwrap_or_else(|| other(bytes)),
            item_type::INT64 => le::<8>(bytes)
                .map(|b| BookmarkValue::Int64(i64::from_le_bytes(b)))
                .unwrap_or_else(|| other(bytes)),
            item_type::FLOAT32 => le::<4>(bytes)
                .map(|b| BookmarkValue::Float32(f32::from_le_bytes(b)))
                .unwrap_or_else(|| other(bytes)),
            item_type::FLOAT64 => le::<8>(bytes)
                .map(|b| BookmarkValue::Float64(f64::from_le_bytes(b)))
                .unwrap_or_else(|| other(bytes)),
            item_type::DATE => le::<8>(bytes)
                .map(|b| BookmarkValue::Date(f64::from_be_bytes(b)))
                .unwrap_or_else(|| other(bytes)),
            item_type::FALSE => BookmarkValue::Bool(false),
            item_type::TRUE => BookmarkValue::Bool(true),
            item_type::ARRAY if bytes.len() % 4 == 0 => {
                self.check_element_count(bytes.len() / 4, "bookmark array elements")?;
                let mut elements = Vec::new();
                for offset in offsets(bytes) {
                    elements.push(self.item(offset, depth + 1)?);
                }
                BookmarkValue::Array(elements)
            }
            item_type::DICTIONARY if bytes.len() % 8 == 0 => {
                self.check_element_count(bytes.len() / 8, "bookmark dictionary entries")?;
                let mut pairs = Vec::new();
                let mut iter = offsets(bytes);
                while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
                    let key = self.item(key, depth + 1)?;
                    let value = self.item(value, depth + 1)?;
                    pairs.push((key, value));
                }
                BookmarkValue::Dictionary(pairs)
            }
            item_type::UUID => BookmarkValue::Uuid(bytes.to_vec()),
            item_type::DATA => BookmarkValue::Data(bytes.to_vec()),
            _ => other(bytes),
        };

        Ok(BookmarkItem {
            length,
            type_code,
            value,
        })
    }

    fn check_element_count(&self, count: usize, what: &'static str) -> Result<()> {
        let limit = self.ctx.options.max_toc_entries;
        if count > limit {
            return Err(Error::TooManyEntries { what, limit });
        }
        Ok(())
    }
}

/// The first `N` bytes of a value, if it has that many.
fn le<const N: usize>(bytes: &[u8]) -> Option<[u8; N]> {
    bytes.get(..N).and_then(|head| head.try_into().ok())
}

fn other(bytes: &[u8]) -> BookmarkValue {
    BookmarkValue::Other(bytes.to_vec())
}

fn offsets(bytes: &[u8]) -> impl Iterator<Item = u32> + '_ {
    bytes
        .chunks_exact(4)
        .map(|quad| u32::from_le_bytes([quad[0], quad[1], quad[2], quad[3]]))
}
