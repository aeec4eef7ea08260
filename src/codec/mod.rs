//! Binary codec & schema registry (spec §4.1, §6).
//!
//! `primitives` implements the byte-level read/write rules; `registry`
//! implements the `(schemaId, schemaVersion) -> decoder` lookup table. This
//! module ties them together into the frame envelope every IQ shares:
//! `[optional leading padding][schemaId: 16 bytes][schemaVersion: i32]
//! [requestId: i64][body]`.

pub mod primitives;
pub mod registry;

pub use primitives::{Decoder, Encoder};
pub use registry::{SchemaKey, SchemaRegistry};

use bytes::Bytes;
use uuid::Uuid;

use crate::error::{ConvError, ConvResult};

/// Selects which framing variant a connection uses (spec §4.1, §6 item 1).
/// This is a per-connection property (`ConversationConnection.leadingPadding`),
/// not something encoded in the frame itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingVariant {
    /// No leading padding.
    Compact,
    /// A fixed, connection-configured byte prefix precedes the envelope
    /// (required by some legacy transports).
    Padded { padding_bytes: usize },
}

impl FramingVariant {
    pub fn padding_len(self) -> usize {
        match self {
            FramingVariant::Compact => 0,
            FramingVariant::Padded { padding_bytes } => padding_bytes,
        }
    }
}

/// A type that can appear as the body of an IQ envelope: it owns a stable
/// `(schemaId, schemaVersion)` pair and knows how to encode/decode its own
/// fields (spec §6: "Schema identifiers and wire layouts are stable public
/// contracts ... must not be changed").
pub trait IqMessage: Sized {
    const SCHEMA_ID: Uuid;
    const SCHEMA_VERSION: i32;

    fn encode_body(&self, enc: &mut Encoder);
    fn decode_body(dec: &mut Decoder) -> ConvResult<Self>;

    fn schema_key() -> SchemaKey {
        SchemaKey::new(Self::SCHEMA_ID, Self::SCHEMA_VERSION)
    }
}

/// Serializes `message` into a complete wire frame: padding (if any),
/// envelope, body.
pub fn encode_frame<M: IqMessage>(variant: FramingVariant, request_id: i64, message: &M) -> Bytes {
    let mut enc = Encoder::with_capacity(64);
    for _ in 0..variant.padding_len() {
        enc.write_bool(false); // one zero byte per padding slot
    }
    enc.write_uuid(M::SCHEMA_ID);
    enc.write_int(M::SCHEMA_VERSION);
    enc.write_long(request_id);
    message.encode_body(&mut enc);
    enc.finish()
}

/// The envelope header read off an inbound frame, before the body is
/// interpreted (spec §4.4 steps 2-3).
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    pub schema: SchemaKey,
    pub request_id: i64,
}

/// Strips the framing-variant padding and decodes `(schemaId,
/// schemaVersion, requestId)`, returning the header plus a `Decoder`
/// positioned at the start of the body.
pub fn decode_envelope<'a>(
    variant: FramingVariant,
    buf: &'a [u8],
) -> ConvResult<(FrameHeader, Decoder<'a>)> {
    let padding = variant.padding_len();
    if buf.len() < padding {
        return Err(ConvError::BufferUnderrun {
            needed: padding,
            available: buf.len(),
        });
    }
    let mut cursor: &[u8] = &buf[padding..];
    let mut dec = Decoder::new(cursor);
    let schema_id = dec.read_uuid()?;
    let schema_version = dec.read_int()?;
    let request_id = dec.read_long()?;
    // `dec` has already advanced past the header; rebuild a fresh decoder
    // over the remaining slice so callers get a body-only cursor.
    let consumed = cursor.len() - dec.remaining();
    cursor = &cursor[consumed..];
    Ok((
        FrameHeader {
            schema: SchemaKey::new(schema_id, schema_version),
            request_id,
        },
        Decoder::new(cursor),
    ))
}
