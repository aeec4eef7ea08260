//! File-chunk IQs (spec §4.2, §4.6): `PushFileChunkIQ`/`OnPushFileChunkIQ`,
//! and `PushThumbnailIQ` which reuses the same chunk format on a distinct
//! schema (spec §4.6 "Thumbnails travel as a distinct PushThumbnailIQ schema
//! using the same chunk format").

use uuid::Uuid;

use crate::codec::{Decoder, Encoder, IqMessage};
use crate::descriptor::DescriptorId;
use crate::error::ConvResult;
use crate::iq::DeviceState;

const SCHEMA_BASE: u128 = 0x6368_756e_6b00_0000_0000_000000000000;

pub struct PushFileChunkIQ {
    pub descriptor_id: DescriptorId,
    pub timestamp: i64,
    pub chunk_start: u64,
    pub chunk: Option<Vec<u8>>,
}

impl IqMessage for PushFileChunkIQ {
    const SCHEMA_ID: Uuid = Uuid::from_u128(SCHEMA_BASE | 1);
    const SCHEMA_VERSION: i32 = 1;

    fn encode_body(&self, enc: &mut Encoder) {
        self.descriptor_id.encode(enc);
        enc.write_long(self.timestamp);
        enc.write_long(self.chunk_start as i64);
        enc.write_optional_bytes(self.chunk.as_deref());
    }

    fn decode_body(dec: &mut Decoder) -> ConvResult<Self> {
        Ok(Self {
            descriptor_id: DescriptorId::decode(dec)?,
            timestamp: dec.read_long()?,
            chunk_start: dec.read_long()? as u64,
            chunk: dec.read_optional_bytes()?,
        })
    }
}

pub struct OnPushFileChunkIQ {
    pub device_state: DeviceState,
    pub received_timestamp: i64,
    pub sender_timestamp: i64,
    pub next_chunk_start: u64,
}

impl IqMessage for OnPushFileChunkIQ {
    const SCHEMA_ID: Uuid = Uuid::from_u128(SCHEMA_BASE | 2);
    const SCHEMA_VERSION: i32 = 1;

    fn encode_body(&self, enc: &mut Encoder) {
        enc.write_int(self.device_state.bits() as i32);
        enc.write_long(self.received_timestamp);
        enc.write_long(self.sender_timestamp);
        enc.write_long(self.next_chunk_start as i64);
    }

    fn decode_body(dec: &mut Decoder) -> ConvResult<Self> {
        Ok(Self {
            device_state: DeviceState::from_bits_truncate(dec.read_int()? as u32),
            received_timestamp: dec.read_long()?,
            sender_timestamp: dec.read_long()?,
            next_chunk_start: dec.read_long()? as u64,
        })
    }
}

/// Same chunk format as `PushFileChunkIQ`, distinct schema id (spec §4.6).
pub struct PushThumbnailIQ {
    pub descriptor_id: DescriptorId,
    pub timestamp: i64,
    pub chunk_start: u64,
    pub chunk: Option<Vec<u8>>,
}

impl IqMessage for PushThumbnailIQ {
    const SCHEMA_ID: Uuid = Uuid::from_u128(SCHEMA_BASE | 3);
    const SCHEMA_VERSION: i32 = 1;

    fn encode_body(&self, enc: &mut Encoder) {
        self.descriptor_id.encode(enc);
        enc.write_long(self.timestamp);
        enc.write_long(self.chunk_start as i64);
        enc.write_optional_bytes(self.chunk.as_deref());
    }

    fn decode_body(dec: &mut Decoder) -> ConvResult<Self> {
        Ok(Self {
            descriptor_id: DescriptorId::decode(dec)?,
            timestamp: dec.read_long()?,
            chunk_start: dec.read_long()? as u64,
            chunk: dec.read_optional_bytes()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_ack_roundtrips() {
        let iq = OnPushFileChunkIQ {
            device_state: DeviceState::FOREGROUND | DeviceState::VALID,
            received_timestamp: 100,
            sender_timestamp: 90,
            next_chunk_start: 65536,
        };
        let mut enc = Encoder::new();
        iq.encode_body(&mut enc);
        let bytes = enc.finish();
        let mut dec = Decoder::new(&bytes);
        let decoded = OnPushFileChunkIQ::decode_body(&mut dec).unwrap();
        assert_eq!(decoded.next_chunk_start, 65536);
        assert!(decoded.device_state.contains(DeviceState::VALID));
    }

    #[test]
    fn thumbnail_and_file_chunk_schemas_are_distinct() {
        assert_ne!(PushFileChunkIQ::SCHEMA_ID, PushThumbnailIQ::SCHEMA_ID);
    }
}
