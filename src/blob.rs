//! Interpretation of `blob` payloads whose layout depends on the record type.

use ds_types::{FourCharCode, RecordType};
use tracing::debug;

use crate::alias::Alias;
use crate::bookmark::Bookmark;
use crate::cursor::ByteCursor;
use crate::error::{DecodeContext, Result, Warning};
use crate::plist;
use crate::raw::{self, FixedLayout, RawIconLocation, RawWindowInfo};

/// `BKGD`: the folder's background.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Background {
    /// `DefB`
    Default,
    /// `ClrB`
    Color { red: u16, green: u16, blue: u16 },
    /// `PctB`, with the picture itself stored in the `pict` record.
    Picture { length: u32 },
    Other(FourCharCode),
}

impl Background {
    pub const SIZE: usize = 12;

    fn decode(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let kind = FourCharCode(cursor.read_u32_be("background kind")?);
        Ok(match &kind.to_bytes() {
            b"DefB" => Background::Default,
            b"ClrB" => Background::Color {
                red: cursor.read_u16_be("background red")?,
                green: cursor.read_u16_be("background green")?,
                blue: cursor.read_u16_be("background blue")?,
            },
            b"PctB" => Background::Picture {
                length: cursor.read_u32_be("background picture length")?,
            },
            _ => Background::Other(kind),
        })
    }
}

/// `Iloc`: an icon's position in its folder window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IconLocation {
    pub x: u32,
    pub y: u32,
    pub unknown: [u8; 8],
}

impl From<RawIconLocation> for IconLocation {
    fn from(raw: RawIconLocation) -> Self {
        Self {
            x: raw.x,
            y: raw.y,
            unknown: raw.unknown,
        }
    }
}

/// `fwi0`: window bounds and view style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowInfo {
    pub top: u16,
    pub left: u16,
    pub bottom: u16,
    pub right: u16,
    pub view: FourCharCode,
    pub unknown: [u8; 4],
}

impl From<RawWindowInfo> for WindowInfo {
    fn from(raw: RawWindowInfo) -> Self {
        Self {
            top: raw.top,
            left: raw.left,
            bottom: raw.bottom,
            right: raw.right,
            view: FourCharCode(raw.view),
            unknown: raw.unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlobContent {
    Background(Background),
    IconLocation(IconLocation),
    WindowInfo(WindowInfo),
    Alias(Alias),
    Bookmark(Bookmark),
    PropertyList(plist::Value),
    Raw(Vec<u8>),
}

/// Decode a blob according to the record type that holds it.
///
/// Fixed-size blobs of the wrong size are kept raw with a warning. Alias and
/// bookmark failures are errors; a blob that only looks like a property list
/// falls back to raw bytes.
pub fn interpret_blob(
    record_type: FourCharCode,
    bytes: &[u8],
    ctx: &mut DecodeContext,
) -> Result<BlobContent> {
    let mut cursor = ByteCursor::new(bytes);
    match RecordType::from_code(record_type) {
        Some(RecordType::Background) => {
            if expect_size(record_type, Background::SIZE, bytes, ctx) {
                return Ok(BlobContent::Background(Background::decode(&mut cursor)?));
            }
        }
        Some(RecordType::IconLocation) => {
            if expect_size(record_type, RawIconLocation::SIZE, bytes, ctx) {
                let location: RawIconLocation = raw::read_fixed(&mut cursor)?;
                return Ok(BlobContent::IconLocation(location.into()));
            }
        }
        Some(RecordType::WindowInfo) => {
            if expect_size(record_type, RawWindowInfo::SIZE, bytes, ctx) {
                let info: RawWindowInfo = raw::read_fixed(&mut cursor)?;
                return Ok(BlobContent::WindowInfo(info.into()));
            }
        }
        Some(RecordType::BackgroundAlias) => {
            return Ok(BlobContent::Alias(Alias::decode(bytes, ctx)?));
        }
        Some(RecordType::BackgroundBookmark) => {
            return Ok(BlobContent::Bookmark(Bookmark::decode(bytes, ctx)?));
        }
        _ if plist::is_binary_plist(bytes) => match plist::parse(bytes, &ctx.options) {
            Ok(value) => return Ok(BlobContent::PropertyList(value)),
            Err(err) => debug!(%record_type, %err, "blob is not a readable property list"),
        },
        _ => {}
    }
    Ok(BlobContent::Raw(bytes.to_vec()))
}

fn expect_size(
    record_type: FourCharCode,
    expected: usize,
    bytes: &[u8],
    ctx: &mut DecodeContext,
) -> bool {
    if bytes.len() == expected {
        return true;
    }
    ctx.warn(Warning::UnexpectedBlobSize {
        record_type,
        expected,
        found: bytes.len(),
    });
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::AliasMetadata;
    use crate::plist::tests::Writer;

    fn interpret(record_type: RecordType, bytes: &[u8]) -> (BlobContent, DecodeContext) {
        let mut ctx = DecodeContext::default();
        let content = interpret_blob(record_type.code(), bytes, &mut ctx).unwrap();
        (content, ctx)
    }

    #[test]
    fn background_kinds() {
        let mut color = b"ClrB".to_vec();
        color.extend_from_slice(&[0xff, 0xff, 0x80, 0x00, 0x00, 0x10, 0, 0]);
        let (content, _) = interpret(RecordType::Background, &color);
        assert_eq!(
            content,
            BlobContent::Background(Background::Color {
                red: 0xffff,
                green: 0x8000,
                blue: 0x0010
            })
        );

        let mut picture = b"PctB".to_vec();
        picture.extend_from_slice(&[0, 0, 0x01, 0x2c, 0, 0, 0, 0]);
        let (content, _) = interpret(RecordType::Background, &picture);
        assert_eq!(content, BlobContent::Background(Background::Picture { length: 300 }));

        let mut default = b"DefB".to_vec();
        default.extend_from_slice(&[0; 8]);
        let (content, ctx) = interpret(RecordType::Background, &default);
        assert_eq!(content, BlobContent::Background(Background::Default));
        assert!(ctx.warnings().is_empty());
    }

    #[test]
    fn icon_location_and_window_info() {
        let mut iloc = Vec::new();
        iloc.extend_from_slice(&100u32.to_be_bytes());
        iloc.extend_from_slice(&220u32.to_be_bytes());
        iloc.extend_from_slice(&[0xff; 6]);
        iloc.extend_from_slice(&[0; 2]);
        let (content, _) = interpret(RecordType::IconLocation, &iloc);
        assert!(matches!(
            content,
            BlobContent::IconLocation(IconLocation { x: 100, y: 220, .. })
        ));

        let mut fwi0 = Vec::new();
        for value in [40u16, 60, 500, 900] {
            fwi0.extend_from_slice(&value.to_be_bytes());
        }
        fwi0.extend_from_slice(b"icnv");
        fwi0.extend_from_slice(&[0, 0, 0, 0]);
        let (content, _) = interpret(RecordType::WindowInfo, &fwi0);
        match content {
            BlobContent::WindowInfo(info) => {
                assert_eq!((info.top, info.left, info.bottom, info.right), (40, 60, 500, 900));
                assert_eq!(info.view.to_bytes(), *b"icnv");
            }
            other => panic!("unexpected content {other:?}"),
        }
    }

    #[test]
    fn wrong_size_stays_raw_with_warning() {
        let (content, ctx) = interpret(RecordType::IconLocation, &[0; 12]);
        assert_eq!(content, BlobContent::Raw(vec![0; 12]));
        assert_eq!(
            ctx.warnings(),
            &[Warning::UnexpectedBlobSize {
                record_type: RecordType::IconLocation.code(),
                expected: 16,
                found: 12,
            }]
        );
    }

    #[test]
    fn alias_in_pict() {
        let mut alias = Alias::new();
        alias.target_name = b"bg.png".to_vec();
        alias.metadata.push(AliasMetadata {
            tag: 0,
            value: b"Pictures".to_vec(),
        });
        let bytes = alias.encode().unwrap();
        let (content, _) = interpret(RecordType::BackgroundAlias, &bytes);
        match content {
            BlobContent::Alias(decoded) => {
                assert_eq!(usize::from(decoded.record_size), bytes.len());
                assert_eq!(decoded.target_name, alias.target_name);
                assert_eq!(decoded.metadata, alias.metadata);
            }
            other => panic!("unexpected content {other:?}"),
        }

        let mut ctx = DecodeContext::default();
        assert!(interpret_blob(RecordType::BackgroundAlias.code(), &bytes[..100], &mut ctx).is_err());
    }

    #[test]
    fn property_list_or_raw() {
        let mut writer = Writer::new();
        let top = writer.object(&[0x09]);
        let bytes = writer.finish(top);
        let (content, _) = interpret(RecordType::BrowserWindowSettings, &bytes);
        assert_eq!(content, BlobContent::PropertyList(plist::Value::Bool(true)));

        let (content, ctx) = interpret(RecordType::BrowserWindowSettings, b"bplist00 broken");
        assert_eq!(content, BlobContent::Raw(b"bplist00 broken".to_vec()));
        assert!(ctx.warnings().is_empty());

        let (content, _) = interpret(RecordType::DesktopIconLocation, &[1, 2, 3]);
        assert_eq!(content, BlobContent::Raw(vec![1, 2, 3]));
    }
}
