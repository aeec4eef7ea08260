//! `SynchronizeIQ`/`OnSynchronizeIQ` (spec §4.2, §4.3 "Clock skew
//! correction").

use uuid::Uuid;

use crate::codec::{Decoder, Encoder, IqMessage};
use crate::error::ConvResult;

const SCHEMA_BASE: u128 = 0x7379_6e63_0000_0000_0000_000000000000;

pub struct SynchronizeIQ {
    pub peer_twincode_outbound_id: Uuid,
    pub resource_id: Uuid,
    pub timestamp: i64,
}

impl IqMessage for SynchronizeIQ {
    const SCHEMA_ID: Uuid = Uuid::from_u128(SCHEMA_BASE | 1);
    const SCHEMA_VERSION: i32 = 1;

    fn encode_body(&self, enc: &mut Encoder) {
        enc.write_uuid(self.peer_twincode_outbound_id);
        enc.write_uuid(self.resource_id);
        enc.write_long(self.timestamp);
    }

    fn decode_body(dec: &mut Decoder) -> ConvResult<Self> {
        Ok(Self {
            peer_twincode_outbound_id: dec.read_uuid()?,
            resource_id: dec.read_uuid()?,
            timestamp: dec.read_long()?,
        })
    }
}

pub struct OnSynchronizeIQ {
    pub timestamp: i64,
    pub sender_timestamp: i64,
}

impl IqMessage for OnSynchronizeIQ {
    const SCHEMA_ID: Uuid = Uuid::from_u128(SCHEMA_BASE | 2);
    const SCHEMA_VERSION: i32 = 1;

    fn encode_body(&self, enc: &mut Encoder) {
        enc.write_long(self.timestamp);
        enc.write_long(self.sender_timestamp);
    }

    fn decode_body(dec: &mut Decoder) -> ConvResult<Self> {
        Ok(Self {
            timestamp: dec.read_long()?,
            sender_timestamp: dec.read_long()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synchronize_roundtrips() {
        let iq = SynchronizeIQ {
            peer_twincode_outbound_id: Uuid::new_v4(),
            resource_id: Uuid::new_v4(),
            timestamp: 1_000,
        };
        let mut enc = Encoder::new();
        iq.encode_body(&mut enc);
        let bytes = enc.finish();
        let mut dec = Decoder::new(&bytes);
        assert_eq!(SynchronizeIQ::decode_body(&mut dec).unwrap().timestamp, 1_000);
    }
}
