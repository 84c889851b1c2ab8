//! Legacy Alias Manager records (version 2), as stored in `pict` records.
//!
//! An alias is a fixed 150-byte header followed by tagged metadata entries.
//! Each entry is `{tag: i16, length: u16, value}` with the value padded to an
//! even length; a tag of -1 ends the list.

use ds_types::{CatalogNodeId, FourCharCode, MacDate, UtcDateTime};
use tracing::debug;

use crate::cursor::ByteCursor;
use crate::error::{DecodeContext, Error, Result, Warning};
use crate::raw::{self, FixedLayout, RawAliasHeader};

const VOLUME_NAME_CAPACITY: usize = 27;
const TARGET_NAME_CAPACITY: usize = 63;
const END_OF_METADATA: i16 = -1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub creator_code: FourCharCode,
    pub record_size: u16,
    pub version: u16,
    pub alias_kind: u16,
    /// Mac OS Roman.
    pub volume_name: Vec<u8>,
    pub volume_date: MacDate,
    pub filesystem_type: u16,
    pub disk_type: u16,
    pub containing_folder_cnid: CatalogNodeId,
    /// Mac OS Roman.
    pub target_name: Vec<u8>,
    pub target_cnid: CatalogNodeId,
    pub target_creation_date: MacDate,
    pub target_creator_code: FourCharCode,
    pub target_type_code: FourCharCode,
    pub alias_to_root_directory_depth: i16,
    pub root_to_target_directory_depth: i16,
    pub volume_attributes: u32,
    pub volume_fsid: u16,
    pub reserved: [u8; 10],
    pub metadata: Vec<AliasMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasMetadata {
    pub tag: i16,
    /// The value without its padding byte.
    pub value: Vec<u8>,
}

/// A metadata value interpreted according to its tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasValue {
    /// Mac OS Roman text: folder name, volume and server names, paths.
    CString(Vec<u8>),
    /// Length-prefixed UTF-16 file or volume name.
    HfsString(Vec<u16>),
    UtcDate(UtcDateTime),
    NestedAlias(Box<Alias>),
    /// Parent directory chain.
    Cnids(Vec<CatalogNodeId>),
    Data(Vec<u8>),
}

impl Alias {
    pub const VERSION: u16 = 2;

    pub fn new() -> Self {
        Self {
            creator_code: FourCharCode(0),
            record_size: RawAliasHeader::SIZE as u16,
            version: Self::VERSION,
            alias_kind: 0,
            volume_name: Vec::new(),
            volume_date: 0,
            filesystem_type: 0,
            disk_type: 0,
            containing_folder_cnid: 0,
            target_name: Vec::new(),
            target_cnid: 0,
            target_creation_date: 0,
            target_creator_code: FourCharCode(0),
            target_type_code: FourCharCode(0),
            alias_to_root_directory_depth: 0,
            root_to_target_directory_depth: 0,
            volume_attributes: 0,
            volume_fsid: 0,
            reserved: [0; 10],
            metadata: Vec::new(),
        }
    }

    pub fn decode(bytes: &[u8], ctx: &mut DecodeContext) -> Result<Self> {
        let mut cursor = ByteCursor::new(bytes);
        let header: RawAliasHeader = raw::read_fixed(&mut cursor)?;

        let record_size = usize::from(header.record_size);
        if record_size != bytes.len() {
            return Err(Error::SizeMismatch {
                structure: "alias record",
                declared: record_size,
                actual: bytes.len(),
            });
        }
        if header.version != Self::VERSION {
            return Err(Error::UnsupportedVersion {
                structure: "alias",
                found: u32::from(header.version),
                expected: u32::from(Self::VERSION),
            });
        }

        let mut metadata = Vec::new();
        while cursor.position() + 4 <= record_size {
            let tag = cursor.read_i16_be("alias metadata tag")?;
            let length = usize::from(cursor.read_u16_be("alias metadata length")?);
            let value = cursor.read_bytes(length, "alias metadata value")?.to_vec();
            if length % 2 == 1 {
                cursor.skip(1, "alias metadata padding")?;
            }

            if tag == END_OF_METADATA {
                if cursor.position() != record_size {
                    ctx.warn(Warning::TrailingGarbageBytes {
                        structure: "alias record",
                        count: record_size - cursor.position(),
                    });
                }
                break;
            }
            metadata.push(AliasMetadata { tag, value });
        }

        debug!(entries = metadata.len(), "read alias");
        Ok(Self {
            creator_code: FourCharCode(header.creator_code),
            record_size: header.record_size,
            version: header.version,
            alias_kind: header.alias_kind,
            volume_name: pascal_string(header.volume_name_length, &header.volume_name),
            volume_date: header.volume_date,
            filesystem_type: header.filesystem_type,
            disk_type: header.disk_type,
            containing_folder_cnid: header.containing_folder_cnid,
            target_name: pascal_string(header.target_name_length, &header.target_name),
            target_cnid: header.target_cnid,
            target_creation_date: header.target_creation_date,
            target_creator_code: FourCharCode(header.target_creator_code),
            target_type_code: FourCharCode(header.target_type_code),
            alias_to_root_directory_depth: header.alias_to_root_directory_depth,
            root_to_target_directory_depth: header.root_to_target_directory_depth,
            volume_attributes: header.volume_attributes,
            volume_fsid: header.volume_fsid,
            reserved: header.reserved,
            metadata,
        })
    }

    /// Serialize the alias with a terminating metadata entry. `record_size` in
    /// the output is the length of the returned buffer, whatever the field
    /// currently holds.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        for entry in &self.metadata {
            write_metadata(&mut body, entry.tag, &entry.value)?;
        }
        write_metadata(&mut body, END_OF_METADATA, &[])?;

        let total = RawAliasHeader::SIZE + body.len();
        let record_size = u16::try_from(total).map_err(|_| Error::ValueTooLarge {
            what: "alias record",
            length: total,
            limit: usize::from(u16::MAX),
        })?;

        let header = RawAliasHeader {
            creator_code: self.creator_code.as_u32(),
            record_size,
            version: self.version,
            alias_kind: self.alias_kind,
            volume_name_length: fixed_length(&self.volume_name, VOLUME_NAME_CAPACITY),
            volume_name: fixed_buffer(&self.volume_name),
            volume_date: self.volume_date,
            filesystem_type: self.filesystem_type,
            disk_type: self.disk_type,
            containing_folder_cnid: self.containing_folder_cnid,
            target_name_length: fixed_length(&self.target_name, TARGET_NAME_CAPACITY),
            target_name: fixed_buffer(&self.target_name),
            target_cnid: self.target_cnid,
            target_creation_date: self.target_creation_date,
            target_creator_code: self.target_creator_code.as_u32(),
            target_type_code: self.target_type_code.as_u32(),
            alias_to_root_directory_depth: self.alias_to_root_directory_depth,
            root_to_target_directory_depth: self.root_to_target_directory_depth,
            volume_attributes: self.volume_attributes,
            volume_fsid: self.volume_fsid,
            reserved: self.reserved,
        };
        let mut out = raw::write_fixed(&header)?;
        out.extend_from_slice(&body);
        Ok(out)
    }
}

impl Default for Alias {
    fn default() -> Self {
        Self::new()
    }
}

impl AliasMetadata {
    /// Interpret the value by tag. `depth` is the nesting level of the alias
    /// holding this entry; a nested alias below the configured limit fails.
    pub fn interpret(&self, ctx: &mut DecodeContext, depth: usize) -> Result<AliasValue> {
        let value = &self.value;
        Ok(match self.tag {
            0 | 2..=6 | 18 | 19 => AliasValue::CString(value.clone()),
            14 | 15 => {
                let mut cursor = ByteCursor::new(value);
                let count = usize::from(cursor.read_u16_be("alias name length")?);
                let available = cursor.remaining() / 2;
                AliasValue::HfsString(cursor.read_utf16_be(count.min(available), "alias name")?)
            }
            16 | 17 if value.len() >= UtcDateTime::SIZE => {
                let mut cursor = ByteCursor::new(value);
                AliasValue::UtcDate(UtcDateTime::from_be_bytes(cursor.read_array("alias date")?))
            }
            20 => {
                if depth >= ctx.options.max_alias_depth {
                    return Err(Error::DepthLimitExceeded {
                        structure: "alias",
                        limit: ctx.options.max_alias_depth,
                    });
                }
                AliasValue::NestedAlias(Box::new(Alias::decode(value, ctx)?))
            }
            1 if value.len() % 4 == 0 => {
                let mut cursor = ByteCursor::new(value);
                AliasValue::Cnids(cursor.read_u32_be_vec(value.len() / 4, "alias parent cnids")?)
            }
            _ => AliasValue::Data(value.clone()),
        })
    }
}

fn pascal_string(length: u8, buffer: &[u8]) -> Vec<u8> {
    buffer[..usize::from(length).min(buffer.len())].to_vec()
}

fn fixed_length(name: &[u8], capacity: usize) -> u8 {
    name.len().min(capacity) as u8
}

fn fixed_buffer<const N: usize>(name: &[u8]) -> [u8; N] {
    let mut buffer = [0u8; N];
    let length = name.len().min(N);
    buffer[..length].copy_from_slice(&name[..length]);
    buffer
}

fn write_metadata(out: &mut Vec<u8>, tag: i16, value: &[u8]) -> Result<()> {
    let length = u16::try_from(value.len()).map_err(|_| Error::ValueTooLarge {
        what: "alias metadata value",
        length: value.len(),
        limit: usize::from(u16::MAX),
    })?;
    out.extend_from_slice(&tag.to_be_bytes());
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(value);
    if value.len() % 2 == 1 {
        out.push(0);
    }
    Ok(())
}
