//! Records: the (filename, record type) keyed entries stored in the B-tree.

use ds_types::{DataType, FourCharCode, RecordType, UtcDateTime};

use crate::cursor::ByteCursor;
use crate::error::{DecodeContext, Error, Result, Warning};

/// A record's value. The variant is selected by the on-disk data type code,
/// which also fixes how many bytes the value occupies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Long(u32),
    /// Stored in four bytes; the leading two are reserved and normally zero.
    Short { reserved: u16, value: u16 },
    /// The stored byte; nonzero is true.
    Bool(u8),
    Blob(Vec<u8>),
    Type(FourCharCode),
    /// Big-endian UTF-16 code units, not necessarily valid UTF-16.
    UnicodeString(Vec<u16>),
    Comp(u64),
    DateTime(UtcDateTime),
}

impl Payload {
    pub fn short(value: u16) -> Self {
        Payload::Short { reserved: 0, value }
    }

    pub fn bool(value: bool) -> Self {
        Payload::Bool(u8::from(value))
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Payload::Long(_) => DataType::Long,
            Payload::Short { .. } => DataType::Short,
            Payload::Bool(_) => DataType::Bool,
            Payload::Blob(_) => DataType::Blob,
            Payload::Type(_) => DataType::Type,
            Payload::UnicodeString(_) => DataType::UnicodeString,
            Payload::Comp(_) => DataType::Comp,
            Payload::DateTime(_) => DataType::DateTime,
        }
    }

    fn decode(
        data_type: DataType,
        cursor: &mut ByteCursor<'_>,
        ctx: &mut DecodeContext,
    ) -> Result<Self> {
        Ok(match data_type {
            DataType::Bool => Payload::Bool(cursor.read_u8("bool record data")?),
            DataType::Comp => Payload::Comp(cursor.read_u64_be("comp record data")?),
            DataType::DateTime => Payload::DateTime(UtcDateTime::from_u64(
                cursor.read_u64_be("dutc record data")?,
            )),
            DataType::Long => Payload::Long(cursor.read_u32_be("long record data")?),
            DataType::Short => {
                let reserved = cursor.read_u16_be("shor record reserved bytes")?;
                if reserved != 0 {
                    ctx.warn(Warning::NonZeroReservedField {
                        field: "shor record reserved bytes",
                        value: u64::from(reserved),
                    });
                }
                Payload::Short {
                    reserved,
                    value: cursor.read_u16_be("shor record data")?,
                }
            }
            DataType::Type => Payload::Type(FourCharCode(cursor.read_u32_be("type record data")?)),
            DataType::Blob => {
                let length = cursor.read_u32_be("blob record length")?;
                if length == 0 {
                    return Err(Error::EmptyPayload(data_type));
                }
                Payload::Blob(cursor.read_bytes(length as usize, "blob record data")?.to_vec())
            }
            DataType::UnicodeString => {
                let length = cursor.read_u32_be("ustr record length")?;
                if length == 0 {
                    return Err(Error::EmptyPayload(data_type));
                }
                Payload::UnicodeString(cursor.read_utf16_be(length as usize, "ustr record data")?)
            }
        })
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Payload::Long(value) => out.extend_from_slice(&value.to_be_bytes()),
            Payload::Short { reserved, value } => {
                out.extend_from_slice(&reserved.to_be_bytes());
                out.extend_from_slice(&value.to_be_bytes());
            }
            Payload::Bool(value) => out.push(*value),
            Payload::Blob(bytes) => {
                out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
                out.extend_from_slice(bytes);
            }
            Payload::Type(code) => out.extend_from_slice(&code.to_bytes()),
            Payload::UnicodeString(units) => {
                out.extend_from_slice(&(units.len() as u32).to_be_bytes());
                for unit in units {
                    out.extend_from_slice(&unit.to_be_bytes());
                }
            }
            Payload::Comp(value) => out.extend_from_slice(&value.to_be_bytes()),
            Payload::DateTime(value) => out.extend_from_slice(&value.to_be_bytes()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub filename: Vec<u16>,
    pub record_type: FourCharCode,
    pub payload: Payload,
}

impl Record {
    pub fn new(filename: &str, record_type: FourCharCode, payload: Payload) -> Self {
        Self {
            filename: filename.encode_utf16().collect(),
            record_type,
            payload,
        }
    }

    pub fn decode(cursor: &mut ByteCursor<'_>, ctx: &mut DecodeContext) -> Result<Self> {
        let filename_length = cursor.read_u32_be("record filename length")?;
        if filename_length == 0 {
            return Err(Error::EmptyFilename);
        }
        let filename = cursor.read_utf16_be(filename_length as usize, "record filename")?;
        let record_type = FourCharCode(cursor.read_u32_be("record type")?);
        let data_type_code = FourCharCode(cursor.read_u32_be("record data type")?);
        let data_type = DataType::from_code(data_type_code);

        // Only the declared data type determines the payload size, so a table
        // mismatch is survivable.
        match (RecordType::from_code(record_type), data_type) {
            (None, _) => ctx.warn(Warning::UnknownRecordType(record_type)),
            (Some(known), Some(found)) if known.expected_data_type() != found => {
                ctx.warn(Warning::UnexpectedRecordDataType {
                    record_type,
                    expected: known.expected_data_type(),
                    found,
                })
            }
            _ => {}
        }

        let data_type = data_type.ok_or(Error::UnknownDataType(data_type_code))?;
        let payload = Payload::decode(data_type, cursor, ctx)?;
        Ok(Self {
            filename,
            record_type,
            payload,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.filename.len() as u32).to_be_bytes());
        for unit in &self.filename {
            out.extend_from_slice(&unit.to_be_bytes());
        }
        out.extend_from_slice(&self.record_type.to_bytes());
        out.extend_from_slice(&self.payload.data_type().code().to_bytes());
        self.payload.encode_into(out);
    }

    pub fn filename_lossy(&self) -> String {
        String::from_utf16_lossy(&self.filename)
    }

    pub fn data_type(&self) -> DataType {
        self.payload.data_type()
    }

    pub fn known_type(&self) -> Option<RecordType> {
        RecordType::from_code(self.record_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> (Result<Record>, DecodeContext) {
        let mut ctx = DecodeContext::default();
        let result = Record::decode(&mut ByteCursor::new(bytes), &mut ctx);
        (result, ctx)
    }

    #[test]
    fn every_kind_round_trips() {
        let samples = [
            Record::new("a", RecordType::SidebarWidth.code(), Payload::Long(0xdead_beef)),
            Record::new("b", RecordType::WindowHeight.code(), Payload::short(0x1234)),
            Record::new("c", RecordType::Disclosed.code(), Payload::bool(true)),
            Record::new("d", RecordType::IconLocation.code(), Payload::Blob(vec![1, 2, 3])),
            Record::new(
                "e",
                RecordType::ViewStyle.code(),
                Payload::Type(FourCharCode::from_bytes(*b"icnv")),
            ),
            Record::new(
                "f",
                RecordType::Comment.code(),
                Payload::UnicodeString("hi".encode_utf16().collect()),
            ),
            Record::new("g", RecordType::LogicalSize.code(), Payload::Comp(1 << 40)),
            Record::new(
                "h",
                RecordType::ModificationDate.code(),
                Payload::DateTime(UtcDateTime::from_u64(0x0000_d5a1_0000_8000)),
            ),
        ];
        for record in samples {
            let bytes = record.encode();
            let (decoded, ctx) = decode(&bytes);
            let decoded = decoded.unwrap();
            assert_eq!(decoded, record);
            assert_eq!(decoded.encode(), bytes);
            assert!(ctx.warnings().is_empty(), "{:?}", ctx.warnings());
        }
    }

    #[test]
    fn short_has_reserved_lead_bytes() {
        let record = Record::new("x", RecordType::IconViewTextSize.code(), Payload::short(12));
        let bytes = record.encode();
        assert_eq!(&bytes[bytes.len() - 4..], &[0, 0, 0, 12]);
    }

    #[test]
    fn nonzero_short_reserved_warns() {
        let mut bytes = Record::new("x", RecordType::WindowHeight.code(), Payload::short(7)).encode();
        let at = bytes.len() - 4;
        bytes[at] = 1;
        let (decoded, ctx) = decode(&bytes);
        let decoded = decoded.unwrap();
        assert_eq!(
            decoded.payload,
            Payload::Short {
                reserved: 0x100,
                value: 7
            }
        );
        assert!(matches!(
            ctx.warnings(),
            [Warning::NonZeroReservedField { value: 0x100, .. }]
        ));
        assert_eq!(decoded.encode(), bytes);
    }

    #[test]
    fn bool_keeps_stored_byte() {
        let mut bytes = Record::new("x", RecordType::Disclosed.code(), Payload::bool(true)).encode();
        let at = bytes.len() - 1;
        bytes[at] = 0x02;
        let (decoded, ctx) = decode(&bytes);
        let decoded = decoded.unwrap();
        assert_eq!(decoded.payload, Payload::Bool(0x02));
        assert!(ctx.warnings().is_empty());
        assert_eq!(decoded.encode(), bytes);
    }

    #[test]
    fn mismatched_data_type_warns_but_decodes() {
        let record = Record::new("x", RecordType::Comment.code(), Payload::Long(3));
        let (decoded, ctx) = decode(&record.encode());
        assert_eq!(decoded.unwrap(), record);
        assert_eq!(
            ctx.warnings(),
            &[Warning::UnexpectedRecordDataType {
                record_type: RecordType::Comment.code(),
                expected: DataType::UnicodeString,
                found: DataType::Long,
            }]
        );
    }

    #[test]
    fn unknown_record_type_warns() {
        let code = FourCharCode::from_bytes(*b"zzzz");
        let record = Record::new("x", code, Payload::bool(false));
        let (decoded, ctx) = decode(&record.encode());
        assert!(decoded.is_ok());
        assert_eq!(ctx.warnings(), &[Warning::UnknownRecordType(code)]);
    }

    #[test]
    fn unknown_data_type_is_fatal() {
        let mut bytes = Record::new("x", RecordType::Disclosed.code(), Payload::bool(true)).encode();
        // filename length (4) + one unit (2) + record type (4)
        bytes[10..14].copy_from_slice(b"wxyz");
        let (decoded, _) = decode(&bytes);
        assert!(matches!(decoded, Err(Error::UnknownDataType(code)) if code.to_bytes() == *b"wxyz"));
    }

    #[test]
    fn empty_filename_and_payload() {
        let (decoded, _) = decode(&[0, 0, 0, 0]);
        assert!(matches!(decoded, Err(Error::EmptyFilename)));

        let bytes = Record::new("x", RecordType::Comment.code(), Payload::UnicodeString(vec![])).encode();
        let (decoded, _) = decode(&bytes);
        assert!(matches!(decoded, Err(Error::EmptyPayload(DataType::UnicodeString))));
    }

    #[test]
    fn oversized_blob_length_is_truncation() {
        let mut bytes = Record::new("x", RecordType::IconLocation.code(), Payload::Blob(vec![0; 4])).encode();
        let at = bytes.len() - 8;
        bytes[at..at + 4].copy_from_slice(&u32::MAX.to_be_bytes());
        let (decoded, _) = decode(&bytes);
        assert!(matches!(
            decoded,
            Err(Error::TruncatedInput {
                field: "blob record data",
                ..
            })
        ));
    }
}
