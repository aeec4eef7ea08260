//! Property tests for the invariants named directly in the testable-
//! properties list: descriptor round-tripping, operation blob
//! round-tripping, clock-skew clamping, and in-flight table cleanup.

use std::sync::Arc;

use proptest::prelude::*;
use uuid::Uuid;

use pconv::codec::{Decoder, Encoder};
use pconv::config::EngineConfig;
use pconv::connection::{ConversationConnection, Direction};
use pconv::descriptor::{Descriptor, DescriptorFlags, DescriptorHeader, DescriptorId, ObjectDescriptor};
use pconv::external::{StatType, Transport};
use pconv::operation::{decode_operation_blob, encode_operation_blob, Operation, OperationType};

struct NullTransport;
impl Transport for NullTransport {
    fn send_packet(&self, _peer: Uuid, _stat: StatType, _frame: bytes::Bytes) -> pconv::ConvResult<()> {
        Ok(())
    }
    fn send_message(&self, _peer: Uuid, _stat: StatType, _bytes: bytes::Bytes) -> pconv::ConvResult<()> {
        Ok(())
    }
    fn increment_stat(&self, _peer: Uuid, _stat: StatType) {}
}

fn open_connection() -> ConversationConnection {
    let mut connection = ConversationConnection::new(Uuid::new_v4(), EngineConfig::default(), Arc::new(NullTransport), 0);
    connection.admit_incoming_offer();
    connection
        .transport_assigned_peer_connection(Direction::Incoming, Uuid::new_v4())
        .unwrap();
    connection.data_channel_opened(Direction::Incoming, 0).unwrap();
    connection
}

proptest! {
    /// property 1: any Descriptor header survives an encode/decode cycle.
    #[test]
    fn descriptor_header_roundtrips(
        created in 0i64..1_000_000_000,
        sent_offset in 0i64..10_000,
        flags_bits in 0u32..4,
    ) {
        let mut header = DescriptorHeader::new(DescriptorId::new(Uuid::new_v4(), 1), Uuid::new_v4(), created);
        header.sent_timestamp = created + sent_offset;
        header.flags = DescriptorFlags::from_bits_truncate(flags_bits);

        let mut enc = Encoder::new();
        header.encode(&mut enc);
        let bytes = enc.finish();
        let mut dec = Decoder::new(&bytes);
        let decoded = DescriptorHeader::decode(&mut dec).unwrap();
        prop_assert_eq!(decoded, header);
    }

    /// property 3: timestamps stay non-decreasing across random valid
    /// transitions (skipping zero).
    #[test]
    fn timestamps_never_regress_once_set(
        created in 0i64..1_000,
        sent in 1_000i64..2_000,
        received in 2_000i64..3_000,
    ) {
        use pconv::descriptor::TimestampKind;
        let mut header = DescriptorHeader::new(DescriptorId::new(Uuid::new_v4(), 1), Uuid::new_v4(), created);
        prop_assert!(header.apply_timestamp(TimestampKind::Sent, sent));
        prop_assert!(header.apply_timestamp(TimestampKind::Received, received));
        prop_assert!(header.created_timestamp <= header.sent_timestamp);
        prop_assert!(header.sent_timestamp <= header.received_timestamp);
        // Replaying an earlier sent timestamp must be rejected.
        prop_assert!(!header.apply_timestamp(TimestampKind::Sent, created));
    }

    /// property 2 (partial): an Operation rehydrated from its storage blob
    /// carries every field the original had, for arbitrary ids/payloads.
    #[test]
    fn operation_blob_preserves_all_fields(
        id in any::<i64>(),
        creation_date in any::<i64>(),
        payload in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
        let mut op = Operation::new(id, OperationType::PushCommand, Uuid::new_v4(), creation_date);
        op.payload = Some(payload.clone());

        let blob = encode_operation_blob(&op).unwrap();
        let rehydrated = decode_operation_blob(&blob).unwrap();

        prop_assert_eq!(rehydrated.id, op.id);
        prop_assert_eq!(rehydrated.operation_type, op.operation_type);
        prop_assert_eq!(rehydrated.conversation_id, op.conversation_id);
        prop_assert_eq!(rehydrated.creation_date, op.creation_date);
        prop_assert_eq!(rehydrated.payload, Some(payload));
    }

    /// property 6: adjustPeerTime clamps the correction to ±3_600_000 ms
    /// regardless of how far apart peer_time and now land.
    #[test]
    fn adjust_peer_time_clamps_correction(
        start_time in 0i64..1_000_000,
        tp in 0i64..60_000,
        peer_time in -10_000_000_000i64..10_000_000_000,
    ) {
        let mut connection = open_connection();
        connection.begin_synchronize(start_time);
        let now = start_time + tp;
        connection.adjust_peer_time(peer_time, now).unwrap();
        prop_assert!(connection.peer_time_correction.abs() <= 3_600_000);
    }

    /// property 8: for any requestId, once an Object push is registered and
    /// then taken, the in-flight table no longer contains it.
    #[test]
    fn in_flight_entry_is_gone_after_take(request_id in any::<i64>()) {
        let mut connection = open_connection();
        let header = DescriptorHeader::new(DescriptorId::new(Uuid::new_v4(), 1), connection.conversation_id, 0);
        let descriptor = Descriptor::Object(ObjectDescriptor::new(header, "x"));
        connection.register_in_flight(request_id, descriptor);
        prop_assert!(connection.take_in_flight(request_id).is_some());
        prop_assert!(connection.take_in_flight(request_id).is_none());
    }
}
