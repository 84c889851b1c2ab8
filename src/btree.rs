//! The record B-tree: its header block, node layout, and in-order traversal.

use std::collections::HashSet;
use tracing::{debug, trace};

use crate::allocator::{BuddyAllocatorState, block_address_offset, block_address_size};
use crate::cursor::ByteCursor;
use crate::error::{DecodeContext, Error, Result, Warning};
use crate::raw::{self, RawHeaderBlock};
use crate::record::Record;

/// The only node page size Finder writes.
pub const TREE_NODE_PAGE_SIZE: u32 = 0x1000;

/// Contents of the block named by the "DSDB" directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderBlock {
    pub root_block_number: u32,
    /// Levels of internal nodes above the leaves.
    pub node_levels: u32,
    pub record_count: u32,
    pub node_count: u32,
    pub tree_node_page_size: u32,
}

impl HeaderBlock {
    pub fn decode(cursor: &mut ByteCursor<'_>, ctx: &mut DecodeContext) -> Result<Self> {
        let raw: RawHeaderBlock = raw::read_fixed(cursor)?;
        if raw.tree_node_page_size != TREE_NODE_PAGE_SIZE {
            if ctx.options.strict_page_size {
                return Err(Error::UnexpectedPageSize {
                    found: raw.tree_node_page_size,
                    expected: TREE_NODE_PAGE_SIZE,
                });
            }
            ctx.warn(Warning::UnexpectedPageSize {
                found: raw.tree_node_page_size,
                expected: TREE_NODE_PAGE_SIZE,
            });
        }
        Ok(raw.into())
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        raw::write_fixed(&RawHeaderBlock::from(*self))
    }
}

impl From<RawHeaderBlock> for HeaderBlock {
    fn from(raw: RawHeaderBlock) -> Self {
        Self {
            root_block_number: raw.root_block_number,
            node_levels: raw.node_levels,
            record_count: raw.record_count,
            node_count: raw.node_count,
            tree_node_page_size: raw.tree_node_page_size,
        }
    }
}

impl From<HeaderBlock> for RawHeaderBlock {
    fn from(block: HeaderBlock) -> Self {
        Self {
            root_block_number: block.root_block_number,
            node_levels: block.node_levels,
            record_count: block.record_count,
            node_count: block.node_count,
            tree_node_page_size: block.tree_node_page_size,
        }
    }
}

/// The allocator-relative address space: every byte of the store after the
/// leading version field. Block offsets index into this region.
#[derive(Debug, Clone, Copy)]
pub struct BlockSpace<'a> {
    data: &'a [u8],
}

impl<'a> BlockSpace<'a> {
    /// Bytes preceding the address space.
    pub const LEAD: usize = 4;

    pub fn new(file: &'a [u8]) -> Result<Self> {
        let data = file.get(Self::LEAD..).ok_or(Error::TruncatedInput {
            field: "store version",
            needed: Self::LEAD,
            available: file.len(),
        })?;
        Ok(Self { data })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Cursor over the region starting at `offset` and running to the end of
    /// the space.
    pub fn cursor_at(&self, offset: u32, structure: &'static str) -> Result<ByteCursor<'a>> {
        ByteCursor::new(self.data).fork_at(offset as usize, structure)
    }

    /// Cursor over a single block. A block whose declared size runs past the
    /// end of the file is cut short at the end of the file.
    pub fn block(&self, address: u32, structure: &'static str) -> Result<ByteCursor<'a>> {
        let start = block_address_offset(address) as usize;
        if start > self.data.len() {
            return Err(Error::OffsetOutOfRange {
                structure,
                offset: start as u64,
                len: self.data.len(),
            });
        }
        let end = start
            .saturating_add(block_address_size(address) as usize)
            .min(self.data.len());
        Ok(ByteCursor::new(&self.data[start..end]))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    Leaf {
        records: Vec<Record>,
    },
    /// `entries[i].0` holds the records sorting before `entries[i].1`;
    /// `rightmost_child` holds those after the last record.
    Internal {
        entries: Vec<(u32, Record)>,
        rightmost_child: u32,
    },
}

impl TreeNode {
    pub fn decode(cursor: &mut ByteCursor<'_>, ctx: &mut DecodeContext) -> Result<Self> {
        let node_type = cursor.read_u32_be("node type")?;
        let count = cursor.read_u32_be("node record count")?;

        if node_type == 0 {
            let mut records = Vec::new();
            for _ in 0..count {
                records.push(Record::decode(cursor, ctx)?);
            }
            return Ok(TreeNode::Leaf { records });
        }

        let mut entries = Vec::new();
        for _ in 0..count {
            let child = cursor.read_u32_be("internal node block number")?;
            entries.push((child, Record::decode(cursor, ctx)?));
        }
        Ok(TreeNode::Internal {
            entries,
            rightmost_child: node_type,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            TreeNode::Leaf { records } => {
                out.extend_from_slice(&0u32.to_be_bytes());
                out.extend_from_slice(&(records.len() as u32).to_be_bytes());
                for record in records {
                    record.encode_into(&mut out);
                }
            }
            TreeNode::Internal {
                entries,
                rightmost_child,
            } => {
                out.extend_from_slice(&rightmost_child.to_be_bytes());
                out.extend_from_slice(&(entries.len() as u32).to_be_bytes());
                for (child, record) in entries {
                    out.extend_from_slice(&child.to_be_bytes());
                    record.encode_into(&mut out);
                }
            }
        }
        out
    }
}

enum Step {
    Descend { block: u32, depth: usize },
    Emit(Record),
}

/// Visit every record in the subtree rooted at `block`, in key order.
///
/// Traversal keeps its own stack, so it neither recurses nor moves any shared
/// cursor. Each block may be entered once; reaching one again is reported as
/// a cycle. Returns the number of records visited.
pub fn enumerate_records<F>(
    space: &BlockSpace<'_>,
    allocator: &BuddyAllocatorState,
    header_block: &HeaderBlock,
    block: u32,
    ctx: &mut DecodeContext,
    mut visit: F,
) -> Result<u64>
where
    F: FnMut(Record),
{
    let mut stack = vec![Step::Descend { block, depth: 0 }];
    let mut entered = HashSet::new();
    let mut visited = 0u64;
    let mut warned_depth = false;

    while let Some(step) = stack.pop() {
        let (block, depth) = match step {
            Step::Emit(record) => {
                visit(record);
                visited += 1;
                continue;
            }
            Step::Descend { block, depth } => (block, depth),
        };

        if depth > ctx.options.max_tree_depth {
            return Err(Error::DepthLimitExceeded {
                structure: "record tree",
                limit: ctx.options.max_tree_depth,
            });
        }
        if !entered.insert(block) {
            return Err(Error::BlockCycle(block));
        }
        if depth as u64 > u64::from(header_block.node_levels) && !warned_depth {
            warned_depth = true;
            ctx.warn(Warning::TreeDeeperThanDeclared {
                declared_levels: header_block.node_levels,
                depth,
            });
        }

        let address = allocator.block_address(block)?;
        let mut cursor = space.block(address, "tree node")?;
        trace!(block, depth, "reading tree node");
        match TreeNode::decode(&mut cursor, ctx)? {
            TreeNode::Leaf { records } => {
                for record in records {
                    visit(record);
                    visited += 1;
                }
            }
            TreeNode::Internal {
                entries,
                rightmost_child,
            } => {
                stack.push(Step::Descend {
                    block: rightmost_child,
                    depth: depth + 1,
                });
                for (child, record) in entries.into_iter().rev() {
                    stack.push(Step::Emit(record));
                    stack.push(Step::Descend {
                        block: child,
                        depth: depth + 1,
                    });
                }
            }
        }
    }

    debug!(visited, nodes = entered.len(), "finished record traversal");
    Ok(visited)
}
