//! Generic key/value projection of decoded records, used for JSON output and
//! the text dump.

use std::fmt;

use chrono::{DateTime, Utc};
use ds_types::{
    FourCharCode, cf_absolute_time_to_unix, mac_date_to_unix, mac_roman_to_string,
};
use itertools::Itertools;
use serde::{Serialize, Serializer};

use crate::alias::{Alias, AliasValue};
use crate::blob::{Background, BlobContent, interpret_blob};
use crate::bookmark::{Bookmark, BookmarkItem, BookmarkValue, TocEntry};
use crate::error::{DecodeContext, Result};
use crate::plist;
use crate::record::{Payload, Record};

#[derive(Debug, Clone, PartialEq)]
pub enum Description {
    Null,
    Bool(bool),
    Integer(i64),
    Unsigned(u64),
    Real(f64),
    String(String),
    Date(DateTime<Utc>),
    Data(Vec<u8>),
    Array(Vec<Description>),
    /// Entries in insertion order.
    Dictionary(Vec<(String, Description)>),
}

impl Description {
    fn dictionary<const N: usize>(entries: [(&str, Description); N]) -> Self {
        Description::Dictionary(
            entries
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
        )
    }

    fn code(code: FourCharCode) -> Self {
        Description::String(code.to_string())
    }

    /// A date, or the raw seconds when they fall outside chrono's range.
    fn unix_date(seconds: f64) -> Self {
        let whole = seconds.floor();
        let nanos = ((seconds - whole) * 1e9) as u32;
        seconds
            .is_finite()
            .then(|| DateTime::from_timestamp(whole as i64, nanos.min(999_999_999)))
            .flatten()
            .map_or(Description::Real(seconds), Description::Date)
    }

    /// Look up a dictionary entry.
    pub fn get(&self, key: &str) -> Option<&Description> {
        match self {
            Description::Dictionary(entries) => entries
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    fn is_container(&self) -> bool {
        matches!(self, Description::Array(_) | Description::Dictionary(_))
    }

    fn write_tree(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        match self {
            Description::Dictionary(entries) => {
                for (key, value) in entries {
                    write!(f, "{:indent$}{key}:", "")?;
                    value.write_value(f, indent)?;
                }
                Ok(())
            }
            Description::Array(items) => {
                for item in items {
                    write!(f, "{:indent$}-", "")?;
                    item.write_value(f, indent)?;
                }
                Ok(())
            }
            scalar => {
                write!(f, "{:indent$}", "")?;
                scalar.write_scalar(f)?;
                writeln!(f)
            }
        }
    }

    fn write_value(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        match self {
            Description::Dictionary(entries) if entries.is_empty() => writeln!(f, " {{}}"),
            Description::Array(items) if items.is_empty() => writeln!(f, " []"),
            container if container.is_container() => {
                writeln!(f)?;
                container.write_tree(f, indent + 2)
            }
            scalar => {
                write!(f, " ")?;
                scalar.write_scalar(f)?;
                writeln!(f)
            }
        }
    }

    fn write_scalar(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Description::Null => write!(f, "null"),
            Description::Bool(value) => write!(f, "{value}"),
            Description::Integer(value) => write!(f, "{value}"),
            Description::Unsigned(value) => write!(f, "{value}"),
            Description::Real(value) => write!(f, "{value}"),
            Description::String(value) => write!(f, "{value:?}"),
            Description::Date(value) => write!(f, "{value}"),
            Description::Data(bytes) => write!(f, "<{}>", hex_words(bytes)),
            Description::Array(_) | Description::Dictionary(_) => Ok(()),
        }
    }
}

/// Hex digits grouped in four-byte words.
fn hex_words(bytes: &[u8]) -> String {
    bytes.chunks(4).map(hex::encode).join(" ")
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_tree(f, 0)
    }
}

impl Serialize for Description {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Description::Null => serializer.serialize_unit(),
            Description::Bool(value) => serializer.serialize_bool(*value),
            Description::Integer(value) => serializer.serialize_i64(*value),
            Description::Unsigned(value) => serializer.serialize_u64(*value),
            Description::Real(value) => serializer.serialize_f64(*value),
            Description::String(value) => serializer.serialize_str(value),
            Description::Date(value) => value.serialize(serializer),
            Description::Data(bytes) => serializer.serialize_str(&hex_words(bytes)),
            Description::Array(items) => serializer.collect_seq(items),
            Description::Dictionary(entries) => {
                serializer.collect_map(entries.iter().map(|(key, value)| (key, value)))
            }
        }
    }
}

/// Project a record into `{filename, type, data_type, data}`, decoding blob
/// sub-formats on the way.
pub fn describe_record(record: &Record, ctx: &mut DecodeContext) -> Result<Description> {
    let data = match &record.payload {
        Payload::Long(value) => Description::Integer(i64::from(*value)),
        Payload::Short { value, .. } => Description::Integer(i64::from(*value)),
        Payload::Bool(value) => Description::Bool(*value != 0),
        Payload::Blob(bytes) => describe_blob(interpret_blob(record.record_type, bytes, ctx)?, ctx)?,
        Payload::Type(code) => Description::code(*code),
        Payload::UnicodeString(units) => Description::String(String::from_utf16_lossy(units)),
        Payload::Comp(value) => Description::Unsigned(*value),
        Payload::DateTime(value) => Description::unix_date(value.unix_seconds()),
    };
    Ok(Description::dictionary([
        ("filename", Description::String(record.filename_lossy())),
        ("type", Description::code(record.record_type)),
        ("data_type", Description::code(record.data_type().code())),
        ("data", data),
    ]))
}

fn describe_blob(content: BlobContent, ctx: &mut DecodeContext) -> Result<Description> {
    Ok(match content {
        BlobContent::Background(Background::Default) => Description::Dictionary(Vec::new()),
        BlobContent::Background(Background::Color { red, green, blue }) => {
            Description::dictionary([
                ("r", Description::Integer(i64::from(red))),
                ("g", Description::Integer(i64::from(green))),
                ("b", Description::Integer(i64::from(blue))),
            ])
        }
        BlobContent::Background(Background::Picture { length }) => {
            Description::dictionary([("pict", Description::Integer(i64::from(length)))])
        }
        BlobContent::Background(Background::Other(kind)) => {
            Description::dictionary([("kind", Description::code(kind))])
        }
        BlobContent::IconLocation(location) => Description::dictionary([
            ("x", Description::Integer(i64::from(location.x))),
            ("y", Description::Integer(i64::from(location.y))),
            ("unknown", Description::Data(location.unknown.to_vec())),
        ]),
        BlobContent::WindowInfo(info) => Description::dictionary([
            ("top", Description::Integer(i64::from(info.top))),
            ("left", Description::Integer(i64::from(info.left))),
            ("bottom", Description::Integer(i64::from(info.bottom))),
            ("right", Description::Integer(i64::from(info.right))),
            ("view", Description::code(info.view)),
            ("unknown", Description::Data(info.unknown.to_vec())),
        ]),
        BlobContent::Alias(alias) => describe_alias(&alias, ctx, 0)?,
        BlobContent::Bookmark(bookmark) => describe_bookmark(&bookmark),
        BlobContent::PropertyList(value) => describe_plist(value),
        BlobContent::Raw(bytes) => Description::Data(bytes),
    })
}

pub fn describe_alias(alias: &Alias, ctx: &mut DecodeContext, depth: usize) -> Result<Description> {
    let mut metadata = Vec::with_capacity(alias.metadata.len());
    for entry in &alias.metadata {
        let value = match entry.interpret(ctx, depth)? {
            AliasValue::CString(bytes) => Description::String(mac_roman_to_string(&bytes)),
            AliasValue::HfsString(units) => Description::String(String::from_utf16_lossy(&units)),
            AliasValue::UtcDate(date) => Description::unix_date(date.unix_seconds()),
            AliasValue::NestedAlias(nested) => describe_alias(&nested, ctx, depth + 1)?,
            AliasValue::Cnids(cnids) => Description::Array(
                cnids
                    .into_iter()
                    .map(|cnid| Description::Integer(i64::from(cnid)))
                    .collect(),
            ),
            AliasValue::Data(bytes) => Description::Data(bytes),
        };
        metadata.push(Description::dictionary([
            ("tag", Description::Integer(i64::from(entry.tag))),
            ("value", value),
        ]));
    }

    let mac_date = |date| Description::unix_date(mac_date_to_unix(date) as f64);
    Ok(Description::dictionary([
        ("creator_code", Description::code(alias.creator_code)),
        ("record_size", Description::Integer(i64::from(alias.record_size))),
        ("version", Description::Integer(i64::from(alias.version))),
        ("alias_kind", Description::Integer(i64::from(alias.alias_kind))),
        ("volume_name", Description::String(mac_roman_to_string(&alias.volume_name))),
        ("volume_date", mac_date(alias.volume_date)),
        (
            "filesystem_type",
            Description::String(mac_roman_to_string(&alias.filesystem_type.to_be_bytes())),
        ),
        ("disk_type", Description::Integer(i64::from(alias.disk_type))),
        (
            "containing_folder_cnid",
            Description::Integer(i64::from(alias.containing_folder_cnid)),
        ),
        ("target_name", Description::String(mac_roman_to_string(&alias.target_name))),
        ("target_cnid", Description::Integer(i64::from(alias.target_cnid))),
        ("target_creation_date", mac_date(alias.target_creation_date)),
        ("target_creator_code", Description::code(alias.target_creator_code)),
        ("target_type_code", Description::code(alias.target_type_code)),
        (
            "alias_to_root_directory_depth",
            Description::Integer(i64::from(alias.alias_to_root_directory_depth)),
        ),
        (
            "root_to_target_directory_depth",
            Description::Integer(i64::from(alias.root_to_target_directory_depth)),
        ),
        ("volume_attributes", Description::Integer(i64::from(alias.volume_attributes))),
        ("volume_fsid", Description::Integer(i64::from(alias.volume_fsid))),
        ("metadata", Description::Array(metadata)),
    ]))
}

pub fn describe_bookmark(bookmark: &Bookmark) -> Description {
    let tocs = bookmark
        .tocs
        .iter()
        .map(|toc| {
            Description::dictionary([
                ("size", Description::Integer(i64::from(toc.size))),
                ("magic", Description::Integer(i64::from(toc.magic))),
                ("identifier", Description::Integer(i64::from(toc.identifier))),
                ("next_toc_offset", Description::Integer(i64::from(toc.next_toc_offset))),
                (
                    "entries",
                    Description::Array(toc.entries.iter().map(describe_toc_entry).collect()),
                ),
            ])
        })
        .collect();
    Description::dictionary([
        ("magic", Description::code(bookmark.magic)),
        ("bookmark_size", Description::Integer(i64::from(bookmark.bookmark_size))),
        ("unknown", Description::Integer(i64::from(bookmark.unknown))),
        ("header_size", Description::Integer(i64::from(bookmark.header_size))),
        ("toc_offset", Description::Integer(i64::from(bookmark.toc_offset))),
        ("tocs", Description::Array(tocs)),
    ])
}

fn describe_toc_entry(entry: &TocEntry) -> Description {
    let mut fields = vec![("key".to_string(), Description::Integer(i64::from(entry.key)))];
    if let Some(name) = &entry.key_name {
        fields.push(("key.name".to_string(), Description::String(name.clone())));
    }
    fields.push(("offset".to_string(), Description::Integer(i64::from(entry.offset))));
    fields.push(("reserved".to_string(), Description::Integer(i64::from(entry.reserved))));
    fields.push((
        "data.length".to_string(),
        Description::Integer(i64::from(entry.item.length)),
    ));
    if let Description::Dictionary(item) = describe_bookmark_item(&entry.item) {
        fields.extend(item);
    }
    Description::Dictionary(fields)
}

fn describe_bookmark_item(item: &BookmarkItem) -> Description {
    let value = match &item.value {
        BookmarkValue::String(text) | BookmarkValue::Url(text) => Description::String(text.clone()),
        BookmarkValue::Int8(value) => Description::Integer(i64::from(*value)),
        BookmarkValue::Int16(value) => Description::Integer(i64::from(*value)),
        BookmarkValue::Int32(value) => Description::Integer(i64::from(*value)),
        BookmarkValue::Int64(value) => Description::Integer(*value),
        BookmarkValue::Float32(value) => Description::Real(f64::from(*value)),
        BookmarkValue::Float64(value) => Description::Real(*value),
        BookmarkValue::Date(seconds) => Description::unix_date(cf_absolute_time_to_unix(*seconds)),
        BookmarkValue::Bool(value) => Description::Bool(*value),
        BookmarkValue::Array(items) => {
            Description::Array(items.iter().map(describe_bookmark_item).collect())
        }
        BookmarkValue::Dictionary(pairs) => Description::Array(
            pairs
                .iter()
                .map(|(key, value)| {
                    Description::dictionary([
                        ("key", describe_bookmark_item(key)),
                        ("value", describe_bookmark_item(value)),
                    ])
                })
                .collect(),
        ),
        BookmarkValue::Uuid(bytes) | BookmarkValue::Data(bytes) | BookmarkValue::Other(bytes) => {
            Description::Data(bytes.clone())
        }
    };
    let type_name = match item.value.type_name() {
        Some(name) => Description::String(name.to_string()),
        None => Description::Integer(i64::from(item.type_code)),
    };
    Description::dictionary([("data.type", type_name), ("data.value", value)])
}

fn describe_plist(value: plist::Value) -> Description {
    match value {
        plist::Value::Null => Description::Null,
        plist::Value::Bool(value) => Description::Bool(value),
        plist::Value::Integer(value) => Description::Integer(value),
        plist::Value::Real(value) => Description::Real(value),
        plist::Value::Date(seconds) => Description::unix_date(cf_absolute_time_to_unix(seconds)),
        plist::Value::Data(bytes) => Description::Data(bytes),
        plist::Value::String(text) => Description::String(text),
        plist::Value::Uid(value) => Description::Unsigned(value),
        plist::Value::Array(items) => {
            Description::Array(items.into_iter().map(describe_plist).collect())
        }
        plist::Value::Dictionary(entries) => Description::Dictionary(
            entries
                .into_iter()
                .map(|(key, value)| (key, describe_plist(value)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::AliasMetadata;
    use crate::bookmark::item_type;
    use crate::bookmark::tests::Builder;
    use ds_types::{RecordType, UtcDateTime};

    fn describe(record: &Record) -> Description {
        describe_record(record, &mut DecodeContext::default()).unwrap()
    }

    #[test]
    fn scalar_records() {
        let record = Record::new(
            "Applications",
            RecordType::ViewStyle.code(),
            Payload::Type(FourCharCode::from_bytes(*b"clmv")),
        );
        let description = describe(&record);
        let text = |value: &str| Some(Description::String(value.into()));
        assert_eq!(description.get("filename").cloned(), text("Applications"));
        assert_eq!(description.get("type").cloned(), text("vstl"));
        assert_eq!(description.get("data_type").cloned(), text("type"));
        assert_eq!(description.get("data").cloned(), text("clmv"));

        let comment = Record::new(
            "a",
            RecordType::Comment.code(),
            Payload::UnicodeString("note".encode_utf16().collect()),
        );
        assert_eq!(describe(&comment).get("data").cloned(), text("note"));
    }

    #[test]
    fn large_comp_stays_unsigned() {
        let record = Record::new("a", RecordType::LogicalSize.code(), Payload::Comp(u64::MAX));
        let description = describe(&record);
        assert_eq!(description.get("data"), Some(&Description::Unsigned(u64::MAX)));
        let json = serde_json::to_value(&description).unwrap();
        assert_eq!(json["data"], serde_json::json!(u64::MAX));

        let flag = Record::new("a", RecordType::Disclosed.code(), Payload::Bool(0x02));
        assert_eq!(describe(&flag).get("data"), Some(&Description::Bool(true)));
    }

    #[test]
    fn dates_are_converted() {
        // 2001-01-01 00:00:00 UTC is 3_061_152_000 seconds after 1904.
        let raw = 3_061_152_000u64 << 16;
        let record = Record::new(
            "a",
            RecordType::ModificationDate.code(),
            Payload::DateTime(UtcDateTime::from_u64(raw)),
        );
        match describe(&record).get("data") {
            Some(Description::Date(date)) => {
                assert_eq!(date.to_rfc3339(), "2001-01-01T00:00:00+00:00")
            }
            other => panic!("unexpected data {other:?}"),
        }
    }

    #[test]
    fn icon_location_projection() {
        let mut blob = Vec::new();
        blob.extend_from_slice(&64u32.to_be_bytes());
        blob.extend_from_slice(&128u32.to_be_bytes());
        blob.extend_from_slice(&[0xff, 0xff, 0, 0, 0, 0, 0, 0]);
        let record = Record::new("a.txt", RecordType::IconLocation.code(), Payload::Blob(blob));
        let data = describe(&record).get("data").cloned().unwrap();
        assert_eq!(data.get("x"), Some(&Description::Integer(64)));
        assert_eq!(data.get("y"), Some(&Description::Integer(128)));

        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["unknown"], "ffff0000 00000000");
    }

    #[test]
    fn alias_projection() {
        let mut alias = Alias::new();
        alias.volume_name = b"Caf\x8e".to_vec();
        alias.filesystem_type = u16::from_be_bytes(*b"H+");
        alias.metadata.push(AliasMetadata {
            tag: 1,
            value: vec![0, 0, 0, 7, 0, 0, 0, 2],
        });
        let blob = Payload::Blob(alias.encode().unwrap());
        let record = Record::new(".", RecordType::BackgroundAlias.code(), blob);
        let data = describe(&record).get("data").cloned().unwrap();
        assert_eq!(data.get("volume_name"), Some(&Description::String("Caf\u{e9}".into())));
        assert_eq!(data.get("filesystem_type"), Some(&Description::String("H+".into())));
        let metadata = match data.get("metadata") {
            Some(Description::Array(items)) => items.clone(),
            other => panic!("unexpected metadata {other:?}"),
        };
        assert_eq!(
            metadata[0].get("value"),
            Some(&Description::Array(vec![Description::Integer(7), Description::Integer(2)]))
        );
    }

    #[test]
    fn bookmark_projection() {
        let mut builder = Builder::new();
        let path = builder.value(item_type::STRING, b"Users");
        let flag = builder.value(item_type::TRUE, &[]);
        let elements = [path.to_le_bytes(), flag.to_le_bytes()].concat();
        let list = builder.value(item_type::ARRAY, &elements);
        let unknown = builder.value(0x0902, &[1, 2]);
        let toc = builder.toc(&[(0x1004, list), (0x1005, unknown)], 0);
        let bytes = builder.finish(toc);

        let blob = Payload::Blob(bytes);
        let record = Record::new(".", RecordType::BackgroundBookmark.code(), blob);
        let data = describe(&record).get("data").cloned().unwrap();
        let json = serde_json::to_value(&data).unwrap();
        let entries = &json["tocs"][0]["entries"];
        assert_eq!(entries[0]["key"], 0x1004);
        assert_eq!(entries[0]["data.type"], "array");
        assert_eq!(entries[0]["data.length"], 8);
        assert_eq!(entries[0]["data.value"][0]["data.value"], "Users");
        assert_eq!(entries[0]["data.value"][1]["data.type"], "bool");
        assert_eq!(entries[1]["data.type"], 0x0902);
        assert_eq!(entries[1]["data.value"], "0102");
    }

    #[test]
    fn text_tree() {
        let description = Description::dictionary([
            ("filename", Description::String("a".into())),
            ("data", Description::dictionary([("x", Description::Integer(1))])),
            ("list", Description::Array(vec![Description::Data(vec![0xab, 0xcd])])),
            ("empty", Description::Array(Vec::new())),
        ]);
        assert_eq!(
            description.to_string(),
            "filename: \"a\"\ndata:\n  x: 1\nlist:\n  - <abcd>\nempty: []\n"
        );
    }
}
