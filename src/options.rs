use serde::{Deserialize, Serialize};

/// Upper bounds applied while decoding. Every count or length read from the
/// wire is checked against the input size, and nested structures against
/// these limits, before anything is allocated or followed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    /// Maximum B-tree depth below the root node.
    pub max_tree_depth: usize,
    /// Maximum nesting of aliases through metadata tag 20.
    pub max_alias_depth: usize,
    /// Maximum nesting of bookmark arrays and dictionaries, also applied to
    /// property lists.
    pub max_bookmark_depth: usize,
    /// Maximum number of linked tables of contents in a bookmark.
    pub max_toc_count: usize,
    /// Maximum entries in one table of contents, or elements in one bookmark
    /// array or dictionary.
    pub max_toc_entries: usize,
    /// Maximum declared length of a single bookmark value.
    pub max_value_len: usize,
    /// Maximum number of values resolved from one bookmark or property list,
    /// counting every array and dictionary element.
    pub max_bookmark_items: usize,
    /// Maximum number of allocator directory entries.
    pub max_directory_entries: usize,
    /// Fail, rather than warn, when the header block's node page size is not
    /// 0x1000.
    pub strict_page_size: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_tree_depth: 32,
            max_alias_depth: 8,
            max_bookmark_depth: 16,
            max_toc_count: 64,
            max_toc_entries: 4096,
            max_value_len: 1 << 20,
            max_bookmark_items: 16384,
            max_directory_entries: 4096,
            strict_page_size: true,
        }
    }
}
