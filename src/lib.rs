#![forbid(unsafe_code)]

//! Reader for Finder `.DS_Store` files.
//!
//! A store is a 36-byte header followed by a buddy-allocated block space. The
//! allocator's "DSDB" directory entry names a header block, which roots a
//! B-tree of records keyed by filename and record type. Blob records may hold
//! further formats: legacy aliases, bookmarks, and binary property lists.

pub mod alias;
pub mod allocator;
pub mod blob;
pub mod bookmark;
pub mod btree;
pub mod cursor;
pub mod describe;
pub mod error;
pub mod header;
pub mod options;
pub mod plist;
pub mod raw;
pub mod record;

use std::path::Path;

use ds_types::DSDB;
use tracing::debug;

pub use crate::allocator::BuddyAllocatorState;
pub use crate::btree::{BlockSpace, HeaderBlock, enumerate_records};
pub use crate::cursor::ByteCursor;
pub use crate::describe::{Description, describe_record};
pub use crate::error::{DecodeContext, Error, Result, Warning};
pub use crate::header::StoreHeader;
pub use crate::options::DecodeOptions;
pub use crate::record::{Payload, Record};

/// An opened store. The file is held in memory and every traversal works on
/// its own cursors, so a store can be shared between threads.
#[derive(Debug, Clone)]
pub struct DsStore {
    data: Vec<u8>,
    options: DecodeOptions,
    header: StoreHeader,
    allocator: BuddyAllocatorState,
    header_block: HeaderBlock,
    warnings: Vec<Warning>,
}

impl DsStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, DecodeOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: DecodeOptions) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        debug!(path = %path.as_ref().display(), len = data.len(), "read store");
        Self::from_bytes_with(data, options)
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_bytes_with(data, DecodeOptions::default())
    }

    /// Decode the header, the allocator state and the header block. Records
    /// are only read when traversed.
    pub fn from_bytes_with(data: Vec<u8>, options: DecodeOptions) -> Result<Self> {
        let mut ctx = DecodeContext::new(options);
        let header = StoreHeader::decode(&mut ByteCursor::new(&data))?;
        let space = BlockSpace::new(&data)?;

        let mut cursor = space.cursor_at(header.allocator_offset, "allocator state")?;
        let allocator = BuddyAllocatorState::decode(&mut cursor, &mut ctx)?;

        let block = allocator
            .find_directory_entry(&DSDB.to_bytes())
            .ok_or_else(|| Error::DirectoryEntryNotFound(DSDB.to_string()))?;
        let address = allocator.block_address(block)?;
        let header_block = HeaderBlock::decode(&mut space.block(address, "header block")?, &mut ctx)?;
        debug!(
            root = header_block.root_block_number,
            records = header_block.record_count,
            "opened store"
        );

        let options = ctx.options.clone();
        Ok(Self {
            data,
            options,
            header,
            allocator,
            header_block,
            warnings: ctx.into_warnings(),
        })
    }

    pub fn header(&self) -> &StoreHeader {
        &self.header
    }

    pub fn allocator(&self) -> &BuddyAllocatorState {
        &self.allocator
    }

    pub fn header_block(&self) -> &HeaderBlock {
        &self.header_block
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    /// Warnings raised while opening the store.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// A fresh decode context carrying this store's options.
    pub fn context(&self) -> DecodeContext {
        DecodeContext::new(self.options.clone())
    }

    /// Visit every record in key order. Warns when the number visited differs
    /// from the count in the header block.
    pub fn for_each_record<F>(&self, ctx: &mut DecodeContext, visit: F) -> Result<u64>
    where
        F: FnMut(Record),
    {
        let space = BlockSpace::new(&self.data)?;
        let visited = enumerate_records(
            &space,
            &self.allocator,
            &self.header_block,
            self.header_block.root_block_number,
            ctx,
            visit,
        )?;
        let declared = self.header_block.record_count;
        if visited != u64::from(declared) {
            ctx.warn(Warning::RecordCountMismatch { declared, visited });
        }
        Ok(visited)
    }

    pub fn records(&self, ctx: &mut DecodeContext) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        self.for_each_record(ctx, |record| records.push(record))?;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::{DirectoryEntry, FREE_LIST_COUNT, FreeList};
    use crate::btree::{TREE_NODE_PAGE_SIZE, TreeNode};
    use ds_types::RecordType;

    const PAGE: usize = 0x1000;

    fn record(name: &str) -> Record {
        let comment = Payload::UnicodeString("x".encode_utf16().collect());
        Record::new(name, RecordType::Comment.code(), comment)
    }

    /// A store with the tree nodes in blocks `2..`, the header block in
    /// block 1 and the allocator state in block 0, placed after everything
    /// else.
    fn build_store(nodes: &[TreeNode], record_count: u32, directory_name: &[u8]) -> Vec<u8> {
        let header_block = HeaderBlock {
            root_block_number: 2,
            node_levels: u32::from(nodes.len() > 1),
            record_count,
            node_count: nodes.len() as u32,
            tree_node_page_size: TREE_NODE_PAGE_SIZE,
        };

        let mut pages = vec![header_block.encode().unwrap()];
        pages.extend(nodes.iter().map(TreeNode::encode));
        let allocator_offset = (PAGE * (pages.len() + 1)) as u32;

        let mut addresses = vec![allocator_offset | 12];
        addresses.extend((0..pages.len()).map(|i| (PAGE * (i + 1)) as u32 | 12));
        let block_count = addresses.len() as u32;
        addresses.resize(256, 0);
        let allocator = BuddyAllocatorState {
            block_count,
            unknown: 0,
            block_addresses: addresses,
            directory_entries: vec![DirectoryEntry {
                name: directory_name.to_vec(),
                block_number: 1,
            }],
            free_lists: vec![FreeList::default(); FREE_LIST_COUNT],
        };
        let allocator_bytes = allocator.encode();

        let mut file = StoreHeader::new(allocator_offset, allocator_bytes.len() as u32).encode();
        for page in pages {
            file.resize(4 + file.len().saturating_sub(4).next_multiple_of(PAGE), 0);
            file.extend_from_slice(&page);
        }
        file.resize(4 + allocator_offset as usize, 0);
        file.extend_from_slice(&allocator_bytes);
        file
    }

    fn names(records: &[Record]) -> Vec<String> {
        records.iter().map(Record::filename_lossy).collect()
    }

    #[test]
    fn reads_single_leaf_store() {
        let nodes = [TreeNode::Leaf {
            records: vec![record("a"), record("b")],
        }];
        let store = DsStore::from_bytes(build_store(&nodes, 2, b"DSDB")).unwrap();
        assert_eq!(store.header_block().record_count, 2);
        assert!(store.warnings().is_empty());

        let mut ctx = store.context();
        assert_eq!(names(&store.records(&mut ctx).unwrap()), ["a", "b"]);
        assert!(ctx.warnings().is_empty());
    }

    #[test]
    fn reads_two_level_store_in_order() {
        let nodes = [
            TreeNode::Internal {
                entries: vec![(3, record("c"))],
                rightmost_child: 4,
            },
            TreeNode::Leaf {
                records: vec![record("a"), record("b")],
            },
            TreeNode::Leaf {
                records: vec![record("d")],
            },
        ];
        let store = DsStore::from_bytes(build_store(&nodes, 4, b"DSDB")).unwrap();
        let mut ctx = store.context();
        assert_eq!(names(&store.records(&mut ctx).unwrap()), ["a", "b", "c", "d"]);
    }

    #[test]
    fn record_count_mismatch_warns() {
        let nodes = [TreeNode::Leaf {
            records: vec![record("a")],
        }];
        let store = DsStore::from_bytes(build_store(&nodes, 5, b"DSDB")).unwrap();
        let mut ctx = store.context();
        assert_eq!(store.for_each_record(&mut ctx, |_| {}).unwrap(), 1);
        assert_eq!(
            ctx.warnings(),
            &[Warning::RecordCountMismatch {
                declared: 5,
                visited: 1
            }]
        );
    }

    #[test]
    fn missing_dsdb_entry() {
        let nodes = [TreeNode::Leaf { records: vec![] }];
        let result = DsStore::from_bytes(build_store(&nodes, 0, b"DSDBX"));
        assert!(matches!(result, Err(Error::DirectoryEntryNotFound(name)) if name == "DSDB"));
    }

    #[test]
    fn header_failures_are_fatal() {
        let nodes = [TreeNode::Leaf { records: vec![] }];
        let mut bytes = build_store(&nodes, 0, b"DSDB");
        bytes[16..20].copy_from_slice(&0x200u32.to_be_bytes());
        assert!(matches!(
            DsStore::from_bytes(bytes),
            Err(Error::ChecksumMismatch { .. })
        ));

        assert!(matches!(
            DsStore::from_bytes(vec![0, 0, 0, 1]),
            Err(Error::TruncatedInput { .. })
        ));
    }

    #[test]
    fn lenient_page_size() {
        let nodes = [TreeNode::Leaf {
            records: vec![record("a")],
        }];
        let mut bytes = build_store(&nodes, 1, b"DSDB");
        // tree_node_page_size is the last field of the header block at 0x1000.
        let at = 4 + PAGE + 16;
        bytes[at..at + 4].copy_from_slice(&0x2000u32.to_be_bytes());

        assert!(matches!(
            DsStore::from_bytes(bytes.clone()),
            Err(Error::UnexpectedPageSize { .. })
        ));

        let options = DecodeOptions {
            strict_page_size: false,
            ..DecodeOptions::default()
        };
        let store = DsStore::from_bytes_with(bytes, options).unwrap();
        assert!(matches!(store.warnings(), [Warning::UnexpectedPageSize { found: 0x2000, .. }]));
        assert_eq!(names(&store.records(&mut store.context()).unwrap()), ["a"]);
    }

    #[test]
    fn store_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DsStore>();
    }
}
