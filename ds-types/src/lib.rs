// SPDX-License-Identifier: MIT

//! Types and constants shared by the Finder `.DS_Store` format and the Carbon
//! structures embedded in its records, adjusted to use Rust-friendly naming.
//!
//! References:
//! - [DSStoreFormat.pod](https://metacpan.org/dist/Mac-Finder-DSStore/view/DSStoreFormat.pod)
//! - [Mac::Alias::Parse](https://metacpan.org/pod/Mac::Alias::Parse)

#![forbid(unsafe_code)]

use std::fmt;

/// A 32-bit code conventionally displayed as four ASCII characters, such as
/// `Bud1` or `DSDB`. Stored big-endian on disk.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FourCharCode(pub u32);

impl FourCharCode {
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(u32::from_be_bytes(bytes))
    }

    pub const fn to_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl From<u32> for FourCharCode {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<[u8; 4]> for FourCharCode {
    fn from(value: [u8; 4]) -> Self {
        Self::from_bytes(value)
    }
}

impl fmt::Display for FourCharCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.to_bytes() {
            if byte.is_ascii_graphic() || byte == b' ' {
                write!(f, "{}", byte as char)?;
            } else {
                write!(f, "\\x{byte:02x}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FourCharCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCharCode('{self}')")
    }
}

/// Magic number following the version field at the start of every store.
pub const STORE_MAGIC: FourCharCode = FourCharCode::from_bytes(*b"Bud1");

/// Name of the allocator directory entry holding the B-tree header block.
pub const DSDB: FourCharCode = FourCharCode::from_bytes(*b"DSDB");

/// Catalog Node ID, identifying a file or folder on an HFS volume. Referenced
/// by legacy alias records.
pub type CatalogNodeId = u32;

/// Seconds since 01-01-1904 GMT, as used by Carbon and HFS.
pub type MacDate = u32;

/// Seconds between the Mac epoch (1904-01-01) and the Unix epoch.
pub const MAC_EPOCH_TO_UNIX_SECONDS: i64 = 2_082_844_800;

/// Seconds between the Unix epoch and the Core Foundation epoch (2001-01-01).
pub const CF_ABSOLUTE_TIME_TO_UNIX_SECONDS: f64 = 978_307_200.0;

/// Convert a 32-bit Mac date to seconds since the Unix epoch.
pub fn mac_date_to_unix(date: MacDate) -> i64 {
    i64::from(date) - MAC_EPOCH_TO_UNIX_SECONDS
}

/// Convert Core Foundation absolute time to seconds since the Unix epoch.
pub fn cf_absolute_time_to_unix(seconds: f64) -> f64 {
    seconds + CF_ABSOLUTE_TIME_TO_UNIX_SECONDS
}

/// Carbon `UTCDateTime`: 48 bits of seconds since 1904 and a 16-bit fraction.
/// Stored as a single big-endian 64-bit quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct UtcDateTime {
    pub high_seconds: u16,
    pub low_seconds: u32,
    /// Fraction of a second, in units of 1/65536.
    pub fraction: u16,
}

impl UtcDateTime {
    pub const SIZE: usize = 8;

    pub const fn from_u64(raw: u64) -> Self {
        Self {
            high_seconds: (raw >> 48) as u16,
            low_seconds: (raw >> 16) as u32,
            fraction: raw as u16,
        }
    }

    pub const fn to_u64(self) -> u64 {
        ((self.high_seconds as u64) << 48) | ((self.low_seconds as u64) << 16) | self.fraction as u64
    }

    pub const fn from_be_bytes(bytes: [u8; 8]) -> Self {
        Self::from_u64(u64::from_be_bytes(bytes))
    }

    pub const fn to_be_bytes(self) -> [u8; 8] {
        self.to_u64().to_be_bytes()
    }

    /// Whole seconds since 1904-01-01 00:00:00 UTC.
    pub const fn seconds_since_1904(self) -> u64 {
        ((self.high_seconds as u64) << 32) | self.low_seconds as u64
    }

    /// Seconds since the Unix epoch, including the fractional part.
    pub fn unix_seconds(self) -> f64 {
        let whole = self.seconds_since_1904() as i64 - MAC_EPOCH_TO_UNIX_SECONDS;
        whole as f64 + f64::from(self.fraction) / 65536.0
    }
}

/// Payload kinds a record may carry, named by their on-disk four-character
/// code. The code determines the payload size.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// 32-bit big-endian integer.
    Long = u32::from_be_bytes(*b"long"),
    /// 16-bit integer, stored in four bytes with two leading zero bytes.
    Short = u32::from_be_bytes(*b"shor"),
    /// One byte.
    Bool = u32::from_be_bytes(*b"bool"),
    /// Length-prefixed bytes.
    Blob = u32::from_be_bytes(*b"blob"),
    /// Four-character code.
    Type = u32::from_be_bytes(*b"type"),
    /// Length-prefixed big-endian UTF-16.
    UnicodeString = u32::from_be_bytes(*b"ustr"),
    /// 64-bit big-endian integer.
    Comp = u32::from_be_bytes(*b"comp"),
    /// Carbon [`UtcDateTime`].
    DateTime = u32::from_be_bytes(*b"dutc"),
}

impl DataType {
    pub const ALL: [DataType; 8] = [
        DataType::Long,
        DataType::Short,
        DataType::Bool,
        DataType::Blob,
        DataType::Type,
        DataType::UnicodeString,
        DataType::Comp,
        DataType::DateTime,
    ];

    pub fn from_code(code: FourCharCode) -> Option<Self> {
        Self::ALL.into_iter().find(|data_type| data_type.code() == code)
    }

    pub const fn code(self) -> FourCharCode {
        FourCharCode(self as u32)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.code().fmt(f)
    }
}

/// Record types written by Finder, identifying which property of a file the
/// record describes.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// Window background: default, solid colour, or picture.
    Background = u32::from_be_bytes(*b"BKGD"),
    /// Icon view options (pre-10.4).
    IconViewOptionsFlag = u32::from_be_bytes(*b"ICVO"),
    /// Icon location within its parent window.
    IconLocation = u32::from_be_bytes(*b"Iloc"),
    /// List view options (pre-10.4).
    ListViewOptionsFlag = u32::from_be_bytes(*b"LSVO"),
    /// Browser window settings, a binary property list.
    BrowserWindowSettings = u32::from_be_bytes(*b"bwsp"),
    /// Spotlight comment.
    Comment = u32::from_be_bytes(*b"cmmt"),
    /// Desktop icon location.
    DesktopIconLocation = u32::from_be_bytes(*b"dilc"),
    /// Folder is expanded in list view.
    Disclosed = u32::from_be_bytes(*b"dscl"),
    /// File extension.
    Extension = u32::from_be_bytes(*b"extn"),
    /// Finder window information.
    WindowInfo = u32::from_be_bytes(*b"fwi0"),
    /// Sidebar width.
    SidebarWidth = u32::from_be_bytes(*b"fwsw"),
    /// Window height.
    WindowHeight = u32::from_be_bytes(*b"fwvh"),
    /// Group-by setting.
    GroupBy = u32::from_be_bytes(*b"GRP0"),
    IconViewUnknown = u32::from_be_bytes(*b"icgo"),
    /// Icon view scroll position.
    IconViewScrollPosition = u32::from_be_bytes(*b"icsp"),
    /// Icon view options.
    IconViewOptions = u32::from_be_bytes(*b"icvo"),
    /// Icon view properties, a binary property list.
    IconViewProperties = u32::from_be_bytes(*b"icvp"),
    IconViewPropertiesAlt = u32::from_be_bytes(*b"icvP"),
    /// Icon view text label position.
    IconViewLabelPosition = u32::from_be_bytes(*b"icvl"),
    /// Icon view text size.
    IconViewTextSize = u32::from_be_bytes(*b"icvt"),
    Info = u32::from_be_bytes(*b"info"),
    /// Logical size of a folder's contents.
    LogicalSize = u32::from_be_bytes(*b"logS"),
    LogicalSizeAlt = u32::from_be_bytes(*b"lg1S"),
    /// List view scroll position.
    ListViewScrollPosition = u32::from_be_bytes(*b"lssp"),
    /// List view options.
    ListViewOptions = u32::from_be_bytes(*b"lsvo"),
    /// List view text size.
    ListViewTextSize = u32::from_be_bytes(*b"lsvt"),
    /// List view properties, a binary property list.
    ListViewProperties = u32::from_be_bytes(*b"lsvp"),
    ListViewPropertiesAlt = u32::from_be_bytes(*b"lsvP"),
    /// Modification date.
    ModificationDate = u32::from_be_bytes(*b"modD"),
    ModificationDateAlt = u32::from_be_bytes(*b"moDD"),
    /// Background picture, as a bookmark.
    BackgroundBookmark = u32::from_be_bytes(*b"pBBk"),
    /// Physical size of a folder's contents.
    PhysicalSize = u32::from_be_bytes(*b"phyS"),
    PhysicalSizeAlt = u32::from_be_bytes(*b"ph1S"),
    /// Background picture, as a legacy alias.
    BackgroundAlias = u32::from_be_bytes(*b"pict"),
    /// Store version.
    Version = u32::from_be_bytes(*b"vSrn"),
    /// View style.
    ViewStyle = u32::from_be_bytes(*b"vstl"),
}

impl RecordType {
    pub const ALL: [RecordType; 36] = [
        RecordType::Background,
        RecordType::IconViewOptionsFlag,
        RecordType::IconLocation,
        RecordType::ListViewOptionsFlag,
        RecordType::BrowserWindowSettings,
        RecordType::Comment,
        RecordType::DesktopIconLocation,
        RecordType::Disclosed,
        RecordType::Extension,
        RecordType::WindowInfo,
        RecordType::SidebarWidth,
        RecordType::WindowHeight,
        RecordType::GroupBy,
        RecordType::IconViewUnknown,
        RecordType::IconViewScrollPosition,
        RecordType::IconViewOptions,
        RecordType::IconViewProperties,
        RecordType::IconViewPropertiesAlt,
        RecordType::IconViewLabelPosition,
        RecordType::IconViewTextSize,
        RecordType::Info,
        RecordType::LogicalSize,
        RecordType::LogicalSizeAlt,
        RecordType::ListViewScrollPosition,
        RecordType::ListViewOptions,
        RecordType::ListViewTextSize,
        RecordType::ListViewProperties,
        RecordType::ListViewPropertiesAlt,
        RecordType::ModificationDate,
        RecordType::ModificationDateAlt,
        RecordType::BackgroundBookmark,
        RecordType::PhysicalSize,
        RecordType::PhysicalSizeAlt,
        RecordType::BackgroundAlias,
        RecordType::Version,
        RecordType::ViewStyle,
    ];

    pub fn from_code(code: FourCharCode) -> Option<Self> {
        Self::ALL.into_iter().find(|record_type| record_type.code() == code)
    }

    pub const fn code(self) -> FourCharCode {
        FourCharCode(self as u32)
    }

    /// Data type Finder writes for this record type.
    pub const fn expected_data_type(self) -> DataType {
        use RecordType::*;
        match self {
            Background | IconLocation | BrowserWindowSettings | DesktopIconLocation
            | WindowInfo | IconViewUnknown | IconViewScrollPosition | IconViewOptions
            | IconViewProperties | IconViewPropertiesAlt | Info | ListViewScrollPosition
            | ListViewOptions | ListViewProperties | ListViewPropertiesAlt
            | BackgroundBookmark | BackgroundAlias => DataType::Blob,
            IconViewOptionsFlag | ListViewOptionsFlag | Disclosed => DataType::Bool,
            Comment | Extension | GroupBy => DataType::UnicodeString,
            SidebarWidth | Version => DataType::Long,
            WindowHeight | IconViewTextSize | ListViewTextSize => DataType::Short,
            IconViewLabelPosition | ViewStyle => DataType::Type,
            LogicalSize | LogicalSizeAlt | PhysicalSize | PhysicalSizeAlt => DataType::Comp,
            ModificationDate | ModificationDateAlt => DataType::DateTime,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.code().fmt(f)
    }
}

/// Characters for Mac OS Roman bytes 0x80 through 0xFF. The lower half
/// matches ASCII.
const MAC_ROMAN_HIGH: [char; 128] = [
    '\u{00c4}', '\u{00c5}', '\u{00c7}', '\u{00c9}', '\u{00d1}', '\u{00d6}', '\u{00dc}', '\u{00e1}', '\u{00e0}', '\u{00e2}', '\u{00e4}', '\u{00e3}', '\u{00e5}', '\u{00e7}', '\u{00e9}', '\u{00e8}',
    '\u{00ea}', '\u{00eb}', '\u{00ed}', '\u{00ec}', '\u{00ee}', '\u{00ef}', '\u{00f1}', '\u{00f3}', '\u{00f2}', '\u{00f4}', '\u{00f6}', '\u{00f5}', '\u{00fa}', '\u{00f9}', '\u{00fb}', '\u{00fc}',
    '\u{2020}', '\u{00b0}', '\u{00a2}', '\u{00a3}', '\u{00a7}', '\u{2022}', '\u{00b6}', '\u{00df}', '\u{00ae}', '\u{00a9}', '\u{2122}', '\u{00b4}', '\u{00a8}', '\u{2260}', '\u{00c6}', '\u{00d8}',
    '\u{221e}', '\u{00b1}', '\u{2264}', '\u{2265}', '\u{00a5}', '\u{00b5}', '\u{2202}', '\u{2211}', '\u{220f}', '\u{03c0}', '\u{222b}', '\u{00aa}', '\u{00ba}', '\u{03a9}', '\u{00e6}', '\u{00f8}',
    '\u{00bf}', '\u{00a1}', '\u{00ac}', '\u{221a}', '\u{0192}', '\u{2248}', '\u{2206}', '\u{00ab}', '\u{00bb}', '\u{2026}', '\u{00a0}', '\u{00c0}', '\u{00c3}', '\u{00d5}', '\u{0152}', '\u{0153}',
    '\u{2013}', '\u{2014}', '\u{201c}', '\u{201d}', '\u{2018}', '\u{2019}', '\u{00f7}', '\u{25ca}', '\u{00ff}', '\u{0178}', '\u{2044}', '\u{20ac}', '\u{2039}', '\u{203a}', '\u{fb01}', '\u{fb02}',
    '\u{2021}', '\u{00b7}', '\u{201a}', '\u{201e}', '\u{2030}', '\u{00c2}', '\u{00ca}', '\u{00c1}', '\u{00cb}', '\u{00c8}', '\u{00cd}', '\u{00ce}', '\u{00cf}', '\u{00cc}', '\u{00d3}', '\u{00d4}',
    '\u{f8ff}', '\u{00d2}', '\u{00da}', '\u{00db}', '\u{00d9}', '\u{0131}', '\u{02c6}', '\u{02dc}', '\u{00af}', '\u{02d8}', '\u{02d9}', '\u{02da}', '\u{00b8}', '\u{02dd}', '\u{02db}', '\u{02c7}',
];

/// Decode a Mac OS Roman byte string, the encoding of legacy alias names.
pub fn mac_roman_to_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&byte| match byte {
            0x00..=0x7f => char::from(byte),
            _ => MAC_ROMAN_HIGH[usize::from(byte - 0x80)],
        })
        .collect()
}
