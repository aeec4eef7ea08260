//! `TransientObjectDescriptor` (spec §3 "TransientObject (non-persisted;
//! wraps an arbitrary serialisable payload identified by its own (schemaId,
//! schemaVersion))").
//!
//! Unlike the other variants this one is never written to storage (spec §4.5
//! "operations with no ack ... complete immediately"); it only needs a wire
//! form. The inner payload is kept as an opaque blob here — resolving it to
//! a concrete type is the polymorphic-dispatch job of
//! [`crate::codec::registry::SchemaRegistry`] at the call site, per spec
//! §4.1 "Polymorphism".

use uuid::Uuid;

use crate::codec::{Decoder, Encoder};
use crate::error::ConvResult;

use super::DescriptorHeader;

#[derive(Debug, Clone, PartialEq)]
pub struct TransientObjectDescriptor {
    pub header: DescriptorHeader,
    pub payload_schema_id: Uuid,
    pub payload_schema_version: i32,
    pub payload: Vec<u8>,
}

impl TransientObjectDescriptor {
    pub fn new(header: DescriptorHeader, payload_schema_id: Uuid, payload_schema_version: i32, payload: Vec<u8>) -> Self {
        Self {
            header,
            payload_schema_id,
            payload_schema_version,
            payload,
        }
    }

    pub fn encode_body(&self, enc: &mut Encoder) {
        self.header.encode(enc);
        enc.write_uuid(self.payload_schema_id);
        enc.write_int(self.payload_schema_version);
        enc.write_bytes(&self.payload);
    }

    pub fn decode_body(dec: &mut Decoder) -> ConvResult<Self> {
        let header = DescriptorHeader::decode(dec)?;
        let payload_schema_id = dec.read_uuid()?;
        let payload_schema_version = dec.read_int()?;
        let payload = dec.read_bytes()?;
        Ok(Self {
            header,
            payload_schema_id,
            payload_schema_version,
            payload,
        })
    }
}
