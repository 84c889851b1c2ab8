//! Buddy allocator state: maps block numbers to packed offset/size addresses
//! and names the store's top-level structures.

use itertools::Itertools;
use std::fmt;
use tracing::debug;

use crate::cursor::ByteCursor;
use crate::error::{DecodeContext, Error, Result, Warning};

/// Number of free lists, one per power-of-two block size.
pub const FREE_LIST_COUNT: usize = 32;

/// Block addresses are stored in groups of this many entries.
const ADDRESS_TABLE_GRANULE: usize = 256;

/// Byte offset of a block, relative to the end of the store's version field.
/// The low five bits of an address hold the size, so offsets are always
/// 32-byte aligned.
pub const fn block_address_offset(address: u32) -> u32 {
    address & !0x1f
}

/// Size of a block in bytes.
pub const fn block_address_size(address: u32) -> u32 {
    1 << (address & 0x1f)
}

/// Number of address slots actually stored for `block_count` blocks.
pub const fn padded_block_count(block_count: u32) -> usize {
    (block_count as usize).div_ceil(ADDRESS_TABLE_GRANULE) * ADDRESS_TABLE_GRANULE
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: Vec<u8>,
    pub block_number: u32,
}

impl DirectoryEntry {
    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreeList {
    pub offsets: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuddyAllocatorState {
    pub block_count: u32,
    pub unknown: u32,
    /// One address per block, padded with trailing slots to a multiple of
    /// 256 entries.
    pub block_addresses: Vec<u32>,
    pub directory_entries: Vec<DirectoryEntry>,
    pub free_lists: Vec<FreeList>,
}

impl BuddyAllocatorState {
    pub fn decode(cursor: &mut ByteCursor<'_>, ctx: &mut DecodeContext) -> Result<Self> {
        let block_count = cursor.read_u32_be("allocator block count")?;
        let unknown = cursor.read_u32_be("allocator unknown")?;
        if unknown != 0 {
            ctx.warn(Warning::NonZeroReservedField {
                field: "allocator unknown",
                value: u64::from(unknown),
            });
        }

        let block_addresses =
            cursor.read_u32_be_vec(padded_block_count(block_count), "allocator block addresses")?;

        let directory_count = cursor.read_u32_be("allocator directory count")?;
        if directory_count as usize > ctx.options.max_directory_entries {
            return Err(Error::TooManyEntries {
                what: "allocator directory entries",
                limit: ctx.options.max_directory_entries,
            });
        }
        let mut directory_entries = Vec::new();
        for _ in 0..directory_count {
            let length = cursor.read_u8("directory entry name length")?;
            let name = cursor
                .read_bytes(usize::from(length), "directory entry name")?
                .to_vec();
            let block_number = cursor.read_u32_be("directory entry block number")?;
            directory_entries.push(DirectoryEntry { name, block_number });
        }

        let mut free_lists = Vec::with_capacity(FREE_LIST_COUNT);
        for _ in 0..FREE_LIST_COUNT {
            let count = cursor.read_u32_be("free list count")?;
            let offsets = cursor.read_u32_be_vec(count as usize, "free list offsets")?;
            free_lists.push(FreeList { offsets });
        }

        debug!(
            block_count,
            directories = directory_entries.len(),
            "read buddy allocator state"
        );
        Ok(Self {
            block_count,
            unknown,
            block_addresses,
            directory_entries,
            free_lists,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.block_count.to_be_bytes());
        out.extend_from_slice(&self.unknown.to_be_bytes());
        let slots = padded_block_count(self.block_count).max(self.block_addresses.len());
        for index in 0..slots {
            let address = self.block_addresses.get(index).copied().unwrap_or(0);
            out.extend_from_slice(&address.to_be_bytes());
        }

        out.extend_from_slice(&(self.directory_entries.len() as u32).to_be_bytes());
        for entry in &self.directory_entries {
            out.push(entry.name.len() as u8);
            out.extend_from_slice(&entry.name);
            out.extend_from_slice(&entry.block_number.to_be_bytes());
        }

        for index in 0..FREE_LIST_COUNT {
            let offsets = self
                .free_lists
                .get(index)
                .map(|list| list.offsets.as_slice())
                .unwrap_or_default();
            out.extend_from_slice(&(offsets.len() as u32).to_be_bytes());
            for offset in offsets {
                out.extend_from_slice(&offset.to_be_bytes());
            }
        }
        out
    }

    /// Block number recorded under `name`. The first entry whose name matches
    /// exactly wins.
    pub fn find_directory_entry(&self, name: &[u8]) -> Option<u32> {
        self.directory_entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.block_number)
    }

    /// Packed address of `block`.
    pub fn block_address(&self, block: u32) -> Result<u32> {
        if block >= self.block_count {
            return Err(Error::BlockNumberOutOfRange {
                block,
                block_count: self.block_count,
            });
        }
        self.block_addresses
            .get(block as usize)
            .copied()
            .ok_or(Error::BlockNumberOutOfRange {
                block,
                block_count: self.block_count,
            })
    }

    pub fn block_offset(&self, block: u32) -> Result<u32> {
        self.block_address(block).map(block_address_offset)
    }

    /// Addresses of the live blocks, without the padding slots.
    pub fn addresses(&self) -> &[u32] {
        let live = (self.block_count as usize).min(self.block_addresses.len());
        &self.block_addresses[..live]
    }
}

impl fmt::Display for BuddyAllocatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "allocator block count: {}", self.block_count)?;
        writeln!(f, "allocator unknown?: {}", self.unknown)?;
        writeln!(
            f,
            "allocator block addresses: {}",
            self.addresses()
                .iter()
                .map(|&address| format!(
                    "{{{}, {}}}",
                    block_address_offset(address),
                    block_address_size(address)
                ))
                .join(" ")
        )?;
        writeln!(
            f,
            "allocator directory entry count: {}",
            self.directory_entries.len()
        )?;
        for entry in &self.directory_entries {
            writeln!(f, "\tname: {}", entry.name_lossy())?;
            writeln!(f, "\tblock number: {}", entry.block_number)?;
        }
        for (index, list) in self.free_lists.iter().enumerate() {
            write!(f, "free list #{index}:")?;
            for offset in &list.offsets {
                write!(f, " {offset}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
