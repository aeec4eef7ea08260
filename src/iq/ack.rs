//! Generic acknowledgement (spec §4.2 "OnPushIQ (generic acknowledgement:
//! deviceState, receivedTimestamp) and its per-operation typed aliases (one
//! schemaId per operation so the receiver can confirm exactly which request
//! is acknowledged)").

use uuid::Uuid;

use crate::codec::{Decoder, Encoder, IqMessage};
use crate::error::ConvResult;
use crate::iq::DeviceState;

const SCHEMA_BASE: u128 = 0x6f6e_7075_7368_0000_0000_000000000000;

/// Fields shared by every `OnPush*IQ` (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnPushIQ {
    pub device_state: DeviceState,
    pub received_timestamp: i64,
}

impl OnPushIQ {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_int(self.device_state.bits() as i32);
        enc.write_long(self.received_timestamp);
    }

    fn decode(dec: &mut Decoder) -> ConvResult<Self> {
        Ok(Self {
            device_state: DeviceState::from_bits_truncate(dec.read_int()? as u32),
            received_timestamp: dec.read_long()?,
        })
    }
}

/// Declares a typed `OnPush*IQ` alias: same fields as `OnPushIQ`, its own
/// schema identifier so the sender's in-flight table can route the ack to
/// the right operation kind without inspecting the body (spec §4.2).
macro_rules! on_push_alias {
    ($name:ident, $schema_suffix:expr) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name(pub OnPushIQ);

        impl IqMessage for $name {
            const SCHEMA_ID: Uuid = Uuid::from_u128(SCHEMA_BASE | $schema_suffix);
            const SCHEMA_VERSION: i32 = 1;

            fn encode_body(&self, enc: &mut Encoder) {
                self.0.encode(enc);
            }

            fn decode_body(dec: &mut Decoder) -> ConvResult<Self> {
                Ok(Self(OnPushIQ::decode(dec)?))
            }
        }
    };
}

on_push_alias!(OnPushObjectIQ, 1);
on_push_alias!(OnPushFileIQ, 2);
on_push_alias!(OnPushTwincodeIQ, 3);
on_push_alias!(OnPushGeolocationIQ, 4);
on_push_alias!(OnPushInvitationIQ, 5);

pub use crate::iq::group::OnJoinGroupIQ;
