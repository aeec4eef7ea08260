//! Group IQs (spec §4.2): `InviteGroupIQ`, `JoinGroupIQ`/`OnJoinGroupIQ`,
//! `UpdatePermissionsIQ`.

use uuid::Uuid;

use crate::codec::{Decoder, Encoder, IqMessage};
use crate::error::ConvResult;
use crate::iq::DeviceState;

const SCHEMA_BASE: u128 = 0x6772_6f75_7000_0000_0000_000000000000;

/// The wire-relevant subset of the crypto contract's `SignatureInfo` (spec
/// §6), embedded in group invitations so the recipient can verify the
/// inviter without a separate round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviterInfo {
    pub twincode_outbound_id: Uuid,
    pub public_key: Vec<u8>,
    pub signature: Option<Vec<u8>>,
}

impl InviterInfo {
    fn encode(&self, enc: &mut Encoder) {
        enc.write_uuid(self.twincode_outbound_id);
        enc.write_bytes(&self.public_key);
        enc.write_optional_bytes(self.signature.as_deref());
    }

    fn decode(dec: &mut Decoder) -> ConvResult<Self> {
        Ok(Self {
            twincode_outbound_id: dec.read_uuid()?,
            public_key: dec.read_bytes()?,
            signature: dec.read_optional_bytes()?,
        })
    }
}

fn encode_optional_inviter(enc: &mut Encoder, inviter: &Option<InviterInfo>) {
    match inviter {
        None => enc.write_zero(),
        Some(i) => {
            enc.write_bool(true);
            i.encode(enc);
        }
    }
}

fn decode_optional_inviter(dec: &mut Decoder) -> ConvResult<Option<InviterInfo>> {
    if dec.read_bool()? {
        Ok(Some(InviterInfo::decode(dec)?))
    } else {
        Ok(None)
    }
}

pub struct InviteGroupIQ {
    pub group_twincode_id: Uuid,
    pub member_twincode_id: Uuid,
    pub inviter_info: Option<InviterInfo>,
}

impl IqMessage for InviteGroupIQ {
    const SCHEMA_ID: Uuid = Uuid::from_u128(SCHEMA_BASE | 1);
    const SCHEMA_VERSION: i32 = 1;

    fn encode_body(&self, enc: &mut Encoder) {
        enc.write_uuid(self.group_twincode_id);
        enc.write_uuid(self.member_twincode_id);
        encode_optional_inviter(enc, &self.inviter_info);
    }

    fn decode_body(dec: &mut Decoder) -> ConvResult<Self> {
        Ok(Self {
            group_twincode_id: dec.read_uuid()?,
            member_twincode_id: dec.read_uuid()?,
            inviter_info: decode_optional_inviter(dec)?,
        })
    }
}

/// `JoinGroupIQ` v2 (spec §8 "A sends JoinGroupIQ v2 with null
/// inviterInfo").
pub struct JoinGroupIQ {
    pub group_twincode_id: Uuid,
    pub member_twincode_id: Uuid,
    pub inviter_info: Option<InviterInfo>,
}

impl IqMessage for JoinGroupIQ {
    const SCHEMA_ID: Uuid = Uuid::from_u128(SCHEMA_BASE | 2);
    const SCHEMA_VERSION: i32 = 2;

    fn encode_body(&self, enc: &mut Encoder) {
        enc.write_uuid(self.group_twincode_id);
        enc.write_uuid(self.member_twincode_id);
        encode_optional_inviter(enc, &self.inviter_info);
    }

    fn decode_body(dec: &mut Decoder) -> ConvResult<Self> {
        Ok(Self {
            group_twincode_id: dec.read_uuid()?,
            member_twincode_id: dec.read_uuid()?,
            inviter_info: decode_optional_inviter(dec)?,
        })
    }
}

/// `OnJoinGroupIQ`: either the join succeeded, or it failed (spec §8 "B
/// returns OnJoinGroupIQ.fail(requestId, deviceState)").
pub enum OnJoinGroupIQ {
    Success {
        device_state: DeviceState,
        received_timestamp: i64,
    },
    Fail {
        device_state: DeviceState,
    },
}

impl OnJoinGroupIQ {
    pub fn fail(device_state: DeviceState) -> Self {
        OnJoinGroupIQ::Fail { device_state }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OnJoinGroupIQ::Success { .. })
    }
}

impl IqMessage for OnJoinGroupIQ {
    const SCHEMA_ID: Uuid = Uuid::from_u128(SCHEMA_BASE | 3);
    const SCHEMA_VERSION: i32 = 1;

    fn encode_body(&self, enc: &mut Encoder) {
        match self {
            OnJoinGroupIQ::Success {
                device_state,
                received_timestamp,
            } => {
                enc.write_enum(1);
                enc.write_int(device_state.bits() as i32);
                enc.write_long(*received_timestamp);
            }
            OnJoinGroupIQ::Fail { device_state } => {
                enc.write_enum(0);
                enc.write_int(device_state.bits() as i32);
            }
        }
    }

    fn decode_body(dec: &mut Decoder) -> ConvResult<Self> {
        let tag = dec.read_enum("OnJoinGroupIQ", 2)?;
        let device_state = DeviceState::from_bits_truncate(dec.read_int()? as u32);
        Ok(if tag == 1 {
            OnJoinGroupIQ::Success {
                device_state,
                received_timestamp: dec.read_long()?,
            }
        } else {
            OnJoinGroupIQ::Fail { device_state }
        })
    }
}

pub struct UpdatePermissionsIQ {
    pub group_twincode_id: Uuid,
    pub member_twincode_id: Uuid,
    pub permissions: u32,
}

impl IqMessage for UpdatePermissionsIQ {
    const SCHEMA_ID: Uuid = Uuid::from_u128(SCHEMA_BASE | 4);
    const SCHEMA_VERSION: i32 = 1;

    fn encode_body(&self, enc: &mut Encoder) {
        enc.write_uuid(self.group_twincode_id);
        enc.write_uuid(self.member_twincode_id);
        enc.write_int(self.permissions as i32);
    }

    fn decode_body(dec: &mut Decoder) -> ConvResult<Self> {
        Ok(Self {
            group_twincode_id: dec.read_uuid()?,
            member_twincode_id: dec.read_uuid()?,
            permissions: dec.read_int()? as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_group_with_null_inviter_info_roundtrips() {
        let iq = JoinGroupIQ {
            group_twincode_id: Uuid::new_v4(),
            member_twincode_id: Uuid::new_v4(),
            inviter_info: None,
        };
        let mut enc = Encoder::new();
        iq.encode_body(&mut enc);
        let bytes = enc.finish();
        let mut dec = Decoder::new(&bytes);
        let decoded = JoinGroupIQ::decode_body(&mut dec).unwrap();
        assert!(decoded.inviter_info.is_none());
    }

    #[test]
    fn on_join_group_fail_roundtrips() {
        let iq = OnJoinGroupIQ::fail(DeviceState::FOREGROUND);
        let mut enc = Encoder::new();
        iq.encode_body(&mut enc);
        let bytes = enc.finish();
        let mut dec = Decoder::new(&bytes);
        let decoded = OnJoinGroupIQ::decode_body(&mut dec).unwrap();
        assert!(!decoded.is_success());
    }
}
