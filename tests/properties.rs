//! Property-based tests for the store's address arithmetic and codecs.

use dsstore::allocator::{block_address_offset, block_address_size, padded_block_count};
use dsstore::cursor::ByteCursor;
use dsstore::{DecodeContext, Payload, Record, StoreHeader};
use ds_types::{DataType, FourCharCode, RecordType, UtcDateTime};
use proptest::prelude::*;

fn payload() -> impl Strategy<Value = Payload> {
    prop_oneof![
        any::<u32>().prop_map(Payload::Long),
        (any::<u16>(), any::<u16>()).prop_map(|(reserved, value)| Payload::Short { reserved, value }),
        any::<u8>().prop_map(Payload::Bool),
        prop::collection::vec(any::<u8>(), 1..64).prop_map(Payload::Blob),
        any::<u32>().prop_map(|code| Payload::Type(FourCharCode(code))),
        prop::collection::vec(any::<u16>(), 1..32).prop_map(Payload::UnicodeString),
        any::<u64>().prop_map(Payload::Comp),
        any::<u64>().prop_map(|raw| Payload::DateTime(UtcDateTime::from_u64(raw))),
    ]
}

proptest! {
    #[test]
    fn prop_block_offsets_are_aligned(address in any::<u32>()) {
        prop_assert_eq!(block_address_offset(address) % 32, 0);
        prop_assert_eq!(block_address_offset(address) | (address & 0x1f), address);
    }

    #[test]
    fn prop_block_size_is_power_of_two(address in any::<u32>()) {
        let size = block_address_size(address);
        prop_assert!(size.is_power_of_two());
        prop_assert_eq!(size.trailing_zeros(), address & 0x1f);
    }

    #[test]
    fn prop_padded_count_covers_blocks(block_count in any::<u32>()) {
        let padded = padded_block_count(block_count);
        prop_assert_eq!(padded % 256, 0);
        prop_assert!(padded >= block_count as usize);
        prop_assert!(padded < block_count as usize + 256);
    }

    #[test]
    fn prop_header_round_trips(offset in any::<u32>(), size in any::<u32>(), padding in any::<[u8; 16]>()) {
        let mut header = StoreHeader::new(offset, size);
        header.padding = padding;
        let bytes = header.encode();
        prop_assert_eq!(bytes.len(), StoreHeader::SIZE);
        let decoded = StoreHeader::decode(&mut ByteCursor::new(&bytes)).unwrap();
        prop_assert_eq!(decoded, header);
    }

    #[test]
    fn prop_record_round_trips(
        filename in prop::collection::vec(any::<u16>(), 1..24),
        record_type in prop::sample::select(RecordType::ALL.to_vec()),
        payload in payload(),
    ) {
        let record = Record {
            filename,
            record_type: record_type.code(),
            payload,
        };
        let bytes = record.encode();
        let mut ctx = DecodeContext::default();
        let mut cursor = ByteCursor::new(&bytes);
        let decoded = Record::decode(&mut cursor, &mut ctx).unwrap();
        prop_assert_eq!(cursor.remaining(), 0);
        prop_assert_eq!(decoded.encode(), bytes);
        prop_assert_eq!(&decoded, &record);

        // Beyond nonzero reserved bytes, only mismatches against the record
        // type table warn.
        let reserved = matches!(record.payload, Payload::Short { reserved, .. } if reserved != 0);
        let expected = record_type.expected_data_type();
        prop_assert_eq!(
            ctx.warnings().is_empty(),
            expected == record.data_type() && !reserved
        );
        prop_assert!(DataType::ALL.contains(&decoded.data_type()));
    }
}
