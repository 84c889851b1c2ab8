//! The 36-byte preamble at the start of every store.

use ds_types::{FourCharCode, STORE_MAGIC};
use tracing::debug;

use crate::cursor::ByteCursor;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreHeader {
    pub version: u32,
    pub magic: FourCharCode,
    /// Offset of the allocator state, relative to the end of `version`.
    pub allocator_offset: u32,
    pub allocator_size: u32,
    pub allocator_offset_check: u32,
    pub padding: [u8; 16],
}

impl StoreHeader {
    pub const SIZE: usize = 36;
    pub const VERSION: u32 = 1;

    pub fn new(allocator_offset: u32, allocator_size: u32) -> Self {
        Self {
            version: Self::VERSION,
            magic: STORE_MAGIC,
            allocator_offset,
            allocator_size,
            allocator_offset_check: allocator_offset,
            padding: [0; 16],
        }
    }

    /// Decode and validate the header. Checks run in wire order and stop at
    /// the first failure, so a bad version is reported before the magic is
    /// even read.
    pub fn decode(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let version = cursor.read_u32_be("store version")?;
        if version != Self::VERSION {
            return Err(Error::UnsupportedVersion {
                structure: "store",
                found: version,
                expected: Self::VERSION,
            });
        }

        let magic = FourCharCode(cursor.read_u32_be("store magic")?);
        if magic != STORE_MAGIC {
            return Err(Error::BadMagic {
                found: magic,
                expected: STORE_MAGIC,
            });
        }

        let allocator_offset = cursor.read_u32_be("allocator offset")?;
        let allocator_size = cursor.read_u32_be("allocator size")?;
        let allocator_offset_check = cursor.read_u32_be("allocator offset check")?;
        if allocator_offset != allocator_offset_check {
            return Err(Error::ChecksumMismatch {
                offset: allocator_offset,
                check: allocator_offset_check,
            });
        }

        let padding = cursor.read_array::<16>("header padding")?;

        debug!(allocator_offset, allocator_size, "read store header");
        Ok(Self {
            version,
            magic,
            allocator_offset,
            allocator_size,
            allocator_offset_check,
            padding,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::SIZE);
        out.extend_from_slice(&self.version.to_be_bytes());
        out.extend_from_slice(&self.magic.to_bytes());
        out.extend_from_slice(&self.allocator_offset.to_be_bytes());
        out.extend_from_slice(&self.allocator_size.to_be_bytes());
        out.extend_from_slice(&self.allocator_offset_check.to_be_bytes());
        out.extend_from_slice(&self.padding);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let mut header = StoreHeader::new(0x2000, 0x800);
        header.padding[3] = 0x0c;
        let bytes = header.encode();
        assert_eq!(bytes.len(), StoreHeader::SIZE);
        assert_eq!(&bytes[4..8], b"Bud1");

        let mut cursor = ByteCursor::new(&bytes);
        assert_eq!(StoreHeader::decode(&mut cursor).unwrap(), header);
        assert_eq!(cursor.position(), StoreHeader::SIZE);
    }

    #[test]
    fn checksum_mismatch_stops_decoding() {
        let mut header = StoreHeader::new(0x100, 0x800);
        header.allocator_offset_check = 0x200;
        let bytes = header.encode();

        let mut cursor = ByteCursor::new(&bytes);
        match StoreHeader::decode(&mut cursor) {
            Err(Error::ChecksumMismatch { offset, check }) => {
                assert_eq!(offset, 0x100);
                assert_eq!(check, 0x200);
            }
            other => panic!("unexpected result {other:?}"),
        }
        // Padding is never reached.
        assert_eq!(cursor.position(), 20);
    }

    #[test]
    fn version_checked_before_magic() {
        let mut bytes = StoreHeader::new(0, 0).encode();
        bytes[3] = 2;
        bytes[4..8].copy_from_slice(b"Bud2");
        let result = StoreHeader::decode(&mut ByteCursor::new(&bytes));
        assert!(matches!(
            result,
            Err(Error::UnsupportedVersion { found: 2, .. })
        ));
    }

    #[test]
    fn bad_magic() {
        let mut bytes = StoreHeader::new(0, 0).encode();
        bytes[4..8].copy_from_slice(b"Bud2");
        let result = StoreHeader::decode(&mut ByteCursor::new(&bytes));
        assert!(matches!(result, Err(Error::BadMagic { .. })));
    }

    #[test]
    fn truncated_header() {
        let bytes = StoreHeader::new(0, 0).encode();
        let result = StoreHeader::decode(&mut ByteCursor::new(&bytes[..30]));
        assert!(matches!(
            result,
            Err(Error::TruncatedInput {
                field: "header padding",
                ..
            })
        ));
    }
}
