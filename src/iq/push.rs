//! Push IQs (spec §4.2): `PushObjectIQ`, `PushFileIQ` (+ descriptor-subtype
//! tagging already carried by `FileKind`), `PushTwincodeIQ` (v2/v3),
//! `PushGeolocationIQ`, `PushTransientIQ`/`PushCommandIQ`.

use uuid::Uuid;

use crate::codec::{Decoder, Encoder, IqMessage};
use crate::descriptor::{
    FileDescriptor, GeolocationDescriptor, InvitationDescriptor, ObjectDescriptor, TransientObjectDescriptor, TwincodeDescriptor,
};
use crate::error::ConvResult;

const SCHEMA_BASE: u128 = 0x7075_7368_0000_0000_0000_000000000000;

pub struct PushObjectIQ(pub ObjectDescriptor);

impl IqMessage for PushObjectIQ {
    const SCHEMA_ID: Uuid = Uuid::from_u128(SCHEMA_BASE | 1);
    const SCHEMA_VERSION: i32 = 5;

    fn encode_body(&self, enc: &mut Encoder) {
        self.0.encode_body(enc);
    }

    fn decode_body(dec: &mut Decoder) -> ConvResult<Self> {
        Ok(Self(ObjectDescriptor::decode_body(dec)?))
    }
}

pub struct PushFileIQ(pub FileDescriptor);

impl IqMessage for PushFileIQ {
    const SCHEMA_ID: Uuid = Uuid::from_u128(SCHEMA_BASE | 2);
    const SCHEMA_VERSION: i32 = 4;

    fn encode_body(&self, enc: &mut Encoder) {
        self.0.encode_body(enc);
    }

    fn decode_body(dec: &mut Decoder) -> ConvResult<Self> {
        Ok(Self(FileDescriptor::decode_body(dec)?))
    }
}

/// `PushTwincodeIQ` v2: the legacy wire layout, no `publicKey` field (spec
/// §4.2, §4.5 "v2 if (2, 12)").
pub struct PushTwincodeIQV2(pub TwincodeDescriptor);

impl IqMessage for PushTwincodeIQV2 {
    const SCHEMA_ID: Uuid = Uuid::from_u128(SCHEMA_BASE | 3);
    const SCHEMA_VERSION: i32 = 2;

    fn encode_body(&self, enc: &mut Encoder) {
        let d = &self.0;
        d.header.encode(enc);
        enc.write_uuid(d.twincode_id);
        enc.write_uuid(d.schema_id);
        enc.write_bool(d.copy_allowed);
    }

    fn decode_body(dec: &mut Decoder) -> ConvResult<Self> {
        let header = crate::descriptor::DescriptorHeader::decode(dec)?;
        let twincode_id = dec.read_uuid()?;
        let schema_id = dec.read_uuid()?;
        let copy_allowed = dec.read_bool()?;
        Ok(Self(TwincodeDescriptor {
            header,
            twincode_id,
            schema_id,
            public_key: None,
            copy_allowed,
        }))
    }
}

/// `PushTwincodeIQ` v3: adds `publicKey` (spec §4.2, §4.5 "v3 only if peer
/// supports (2, 18)").
pub struct PushTwincodeIQV3(pub TwincodeDescriptor);

impl IqMessage for PushTwincodeIQV3 {
    const SCHEMA_ID: Uuid = Uuid::from_u128(SCHEMA_BASE | 3);
    const SCHEMA_VERSION: i32 = 3;

    fn encode_body(&self, enc: &mut Encoder) {
        self.0.encode_body(enc);
    }

    fn decode_body(dec: &mut Decoder) -> ConvResult<Self> {
        Ok(Self(TwincodeDescriptor::decode_body(dec)?))
    }
}

/// Either wire version of `PushTwincodeIQ`, chosen by the sender based on
/// peer capability (spec §4.5).
pub enum PushTwincodeIQ {
    V2(PushTwincodeIQV2),
    V3(PushTwincodeIQV3),
}

pub struct PushGeolocationIQ(pub GeolocationDescriptor);

impl IqMessage for PushGeolocationIQ {
    const SCHEMA_ID: Uuid = Uuid::from_u128(SCHEMA_BASE | 4);
    const SCHEMA_VERSION: i32 = 2;

    fn encode_body(&self, enc: &mut Encoder) {
        self.0.encode_body(enc);
    }

    fn decode_body(dec: &mut Decoder) -> ConvResult<Self> {
        Ok(Self(GeolocationDescriptor::decode_body(dec)?))
    }
}

/// `PushTransientIQ`: carries a `TransientObjectDescriptor`, persisted only
/// long enough to attempt delivery (spec §3 "TransientObject
/// (non-persisted)").
pub struct PushTransientIQ(pub TransientObjectDescriptor);

impl IqMessage for PushTransientIQ {
    const SCHEMA_ID: Uuid = Uuid::from_u128(SCHEMA_BASE | 5);
    const SCHEMA_VERSION: i32 = 1;

    fn encode_body(&self, enc: &mut Encoder) {
        self.0.encode_body(enc);
    }

    fn decode_body(dec: &mut Decoder) -> ConvResult<Self> {
        Ok(Self(TransientObjectDescriptor::decode_body(dec)?))
    }
}

/// `PushCommandIQ`: a bare short-lived payload with no descriptor identity
/// at all (spec §4.2 "short-lived payloads") — used for fire-and-forget
/// administrative commands that never get persisted as a descriptor.
pub struct PushCommandIQ {
    pub inner_schema_id: Uuid,
    pub inner_schema_version: i32,
    pub payload: Vec<u8>,
}

impl IqMessage for PushCommandIQ {
    const SCHEMA_ID: Uuid = Uuid::from_u128(SCHEMA_BASE | 6);
    const SCHEMA_VERSION: i32 = 1;

    fn encode_body(&self, enc: &mut Encoder) {
        enc.write_uuid(self.inner_schema_id);
        enc.write_int(self.inner_schema_version);
        enc.write_bytes(&self.payload);
    }

    fn decode_body(dec: &mut Decoder) -> ConvResult<Self> {
        Ok(Self {
            inner_schema_id: dec.read_uuid()?,
            inner_schema_version: dec.read_int()?,
            payload: dec.read_bytes()?,
        })
    }
}

/// `PushInvitationIQ`: delivers a group invitation as a regular descriptor
/// push, pairing with the `OnPushInvitationIQ` ack (spec §4.2).
pub struct PushInvitationIQ(pub InvitationDescriptor);

impl IqMessage for PushInvitationIQ {
    const SCHEMA_ID: Uuid = Uuid::from_u128(SCHEMA_BASE | 7);
    const SCHEMA_VERSION: i32 = 1;

    fn encode_body(&self, enc: &mut Encoder) {
        self.0.encode_body(enc);
    }

    fn decode_body(dec: &mut Decoder) -> ConvResult<Self> {
        Ok(Self(InvitationDescriptor::decode_body(dec)?))
    }
}
