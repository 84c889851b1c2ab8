//! Unvalidated fixed-size layouts, read straight off the wire with `deku`.
//! Field names follow the format's conventional naming; checks on the values
//! happen in the modules that own each structure.

use deku::prelude::*;

use crate::cursor::ByteCursor;
use crate::error::{Error, Result as DsResult};

/// A layout with a fixed on-disk size.
pub trait FixedLayout {
    const SIZE: usize;
    const NAME: &'static str;
}

/// Read one fixed layout at the cursor, advancing past it.
///
/// The cursor guarantees the bytes are present, so a `deku` failure here means
/// the layout itself could not be interpreted.
pub(crate) fn read_fixed<'a, T>(cursor: &mut ByteCursor<'a>) -> DsResult<T>
where
    T: FixedLayout + DekuContainerRead<'a>,
{
    let bytes = cursor.read_bytes(T::SIZE, T::NAME)?;
    let (_, value) = T::from_bytes((bytes, 0)).map_err(|e| Error::Malformed {
        structure: T::NAME,
        message: e.to_string(),
    })?;
    Ok(value)
}

pub(crate) fn write_fixed<T>(value: &T) -> DsResult<Vec<u8>>
where
    T: FixedLayout + DekuContainerWrite,
{
    value.to_bytes().map_err(|e| Error::Malformed {
        structure: T::NAME,
        message: e.to_string(),
    })
}

/// The "DSDB" block: root of the record B-tree.
#[derive(Debug, Clone, PartialEq, Eq, DekuRead, DekuWrite)]
#[deku(endian = "big")]
pub struct RawHeaderBlock {
    pub root_block_number: u32,
    pub node_levels: u32,
    pub record_count: u32,
    pub node_count: u32,
    pub tree_node_page_size: u32,
}

impl FixedLayout for RawHeaderBlock {
    const SIZE: usize = 20;
    const NAME: &'static str = "header block";
}

/// Legacy alias record header. Names are Pascal strings in fixed buffers.
#[derive(Debug, Clone, PartialEq, Eq, DekuRead, DekuWrite)]
#[deku(endian = "big")]
pub struct RawAliasHeader {
    pub creator_code: u32,
    pub record_size: u16,
    pub version: u16,
    pub alias_kind: u16,
    pub volume_name_length: u8,
    pub volume_name: [u8; 27],
    pub volume_date: u32,
    pub filesystem_type: u16,
    pub disk_type: u16,
    pub containing_folder_cnid: u32,
    pub target_name_length: u8,
    pub target_name: [u8; 63],
    pub target_cnid: u32,
    pub target_creation_date: u32,
    pub target_creator_code: u32,
    pub target_type_code: u32,
    pub alias_to_root_directory_depth: i16,
    pub root_to_target_directory_depth: i16,
    pub volume_attributes: u32,
    pub volume_fsid: u16,
    pub reserved: [u8; 10],
}

impl FixedLayout for RawAliasHeader {
    const SIZE: usize = 150;
    const NAME: &'static str = "alias header";
}

/// Bookmark header. The magic is big-endian; everything else in a bookmark is
/// little-endian.
#[derive(Debug, Clone, PartialEq, Eq, DekuRead, DekuWrite)]
#[deku(endian = "little")]
pub struct RawBookmarkHeader {
    #[deku(endian = "big")]
    pub magic: u32,
    pub bookmark_size: u32,
    pub unknown: u32,
    pub header_size: u32,
    pub reserved: [u8; 32],
}

impl FixedLayout for RawBookmarkHeader {
    const SIZE: usize = 48;
    const NAME: &'static str = "bookmark header";
}

#[derive(Debug, Clone, PartialEq, Eq, DekuRead, DekuWrite)]
#[deku(endian = "little")]
pub struct RawTocHeader {
    pub size: u32,
    pub magic: u32,
    pub identifier: u32,
    pub next_toc_offset: u32,
    pub count: u32,
}

impl FixedLayout for RawTocHeader {
    const SIZE: usize = 20;
    const NAME: &'static str = "bookmark table of contents";
}

#[derive(Debug, Clone, PartialEq, Eq, DekuRead, DekuWrite)]
#[deku(endian = "little")]
pub struct RawTocEntry {
    pub key: u32,
    pub offset: u32,
    pub reserved: u32,
}

impl FixedLayout for RawTocEntry {
    const SIZE: usize = 12;
    const NAME: &'static str = "bookmark table of contents entry";
}

/// `Iloc` blob.
#[derive(Debug, Clone, PartialEq, Eq, DekuRead, DekuWrite)]
#[deku(endian = "big")]
pub struct RawIconLocation {
    pub x: u32,
    pub y: u32,
    pub unknown: [u8; 8],
}

impl FixedLayout for RawIconLocation {
    const SIZE: usize = 16;
    const NAME: &'static str = "icon location";
}

/// `fwi0` blob.
#[derive(Debug, Clone, PartialEq, Eq, DekuRead, DekuWrite)]
#[deku(endian = "big")]
pub struct RawWindowInfo {
    pub top: u16,
    pub left: u16,
    pub bottom: u16,
    pub right: u16,
    pub view: u32,
    pub unknown: [u8; 4],
}

impl FixedLayout for RawWindowInfo {
    const SIZE: usize = 16;
    const NAME: &'static str = "window info";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_sizes_match_wire() {
        let header_block = RawHeaderBlock {
            root_block_number: 1,
            node_levels: 2,
            record_count: 3,
            node_count: 4,
            tree_node_page_size: 0x1000,
        };
        assert_eq!(write_fixed(&header_block).unwrap().len(), RawHeaderBlock::SIZE);

        let bookmark = RawBookmarkHeader {
            magic: u32::from_be_bytes(*b"book"),
            bookmark_size: 0,
            unknown: 0,
            header_size: 48,
            reserved: [0; 32],
        };
        assert_eq!(write_fixed(&bookmark).unwrap().len(), RawBookmarkHeader::SIZE);

        let toc = RawTocHeader {
            size: 0,
            magic: 0,
            identifier: 0,
            next_toc_offset: 0,
            count: 0,
        };
        assert_eq!(write_fixed(&toc).unwrap().len(), RawTocHeader::SIZE);
    }

    #[test]
    fn bookmark_header_endianness() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"book");
        bytes.extend_from_slice(&0x1234u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&48u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 32]);

        let mut cursor = ByteCursor::new(&bytes);
        let header: RawBookmarkHeader = read_fixed(&mut cursor).unwrap();
        assert_eq!(header.magic.to_be_bytes(), *b"book");
        assert_eq!(header.bookmark_size, 0x1234);
        assert_eq!(header.header_size, 48);
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn window_info_fields() {
        let bytes = [
            0x00, 0x10, 0x00, 0x20, 0x01, 0x00, 0x02, 0x00, b'i', b'c', b'n', b'v', 1, 2, 3, 4,
        ];
        let mut cursor = ByteCursor::new(&bytes);
        let info: RawWindowInfo = read_fixed(&mut cursor).unwrap();
        assert_eq!(info.top, 0x10);
        assert_eq!(info.left, 0x20);
        assert_eq!(info.bottom, 0x100);
        assert_eq!(info.right, 0x200);
        assert_eq!(info.view.to_be_bytes(), *b"icnv");
        assert_eq!(info.unknown, [1, 2, 3, 4]);
    }

    #[test]
    fn short_layout_is_truncation() {
        let bytes = [0u8; 10];
        let mut cursor = ByteCursor::new(&bytes);
        let result: DsResult<RawHeaderBlock> = read_fixed(&mut cursor);
        assert!(matches!(result, Err(Error::TruncatedInput { needed: 20, .. })));
    }
}
