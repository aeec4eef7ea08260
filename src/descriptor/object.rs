//! `ObjectDescriptor`: a text message (spec §3 "Object (text message +
//! copyAllowed + edited-flag)").

use uuid::Uuid;

use crate::codec::{Decoder, Encoder};
use crate::error::{ConvError, ConvResult};

use super::DescriptorHeader;

/// Schema identifier for the `ObjectDescriptor` body when it appears as the
/// inner polymorphic payload of a message schema (spec §4.1 "the inner
/// schema must equal the well-known Message schema").
pub const MESSAGE_SCHEMA_ID: Uuid = Uuid::from_u128(0x0bec7000_0001_0000_0000_000000000001);
pub const MESSAGE_SCHEMA_VERSION: i32 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectDescriptor {
    pub header: DescriptorHeader,
    pub message: String,
    pub copy_allowed: bool,
    pub edited: bool,
}

impl ObjectDescriptor {
    pub fn new(header: DescriptorHeader, message: impl Into<String>) -> Self {
        Self {
            header,
            message: message.into(),
            copy_allowed: true,
            edited: false,
        }
    }

    /// spec §4.1 "Polymorphism": the message body is itself a polymorphic
    /// `Object` payload, so it is prefixed with the inner `(schemaId,
    /// schemaVersion)` before the text bytes.
    pub fn encode_body(&self, enc: &mut Encoder) {
        self.header.encode(enc);
        enc.write_uuid(MESSAGE_SCHEMA_ID);
        enc.write_int(MESSAGE_SCHEMA_VERSION);
        enc.write_string(&self.message);
        enc.write_bool(self.copy_allowed);
        enc.write_bool(self.edited);
    }

    /// spec §4.1: "the inner schema must equal the well-known Message schema
    /// — otherwise the read fails with SerializationError".
    pub fn decode_body(dec: &mut Decoder) -> ConvResult<Self> {
        let header = DescriptorHeader::decode(dec)?;
        let schema_id = dec.read_uuid()?;
        let schema_version = dec.read_int()?;
        if schema_id != MESSAGE_SCHEMA_ID || schema_version != MESSAGE_SCHEMA_VERSION {
            return Err(ConvError::UnexpectedInnerSchema {
                expected: MESSAGE_SCHEMA_ID,
                actual: schema_id,
            });
        }
        let message = dec.read_string()?;
        let copy_allowed = dec.read_bool()?;
        let edited = dec.read_bool()?;
        Ok(Self {
            header,
            message,
            copy_allowed,
            edited,
        })
    }
}
