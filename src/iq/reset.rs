//! `ResetConversationIQ` (spec §4.2, §8 "Reset conversation in CLEAR_MEDIA
//! mode against peer < 2.15: operation returns SUCCESS without sending any
//! frame").

use uuid::Uuid;

use crate::codec::{Decoder, Encoder, IqMessage};
use crate::descriptor::ClearDescriptor;
use crate::error::{ConvError, ConvResult};

const SCHEMA_BASE: u128 = 0x7265_7365_7400_0000_0000_000000000000;

/// spec §4.2 "ClearMode ∈ {CLEAR_LOCAL, CLEAR_BOTH, CLEAR_MEDIA,
/// CLEAR_BOTH_MEDIA}".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearMode {
    ClearLocal,
    ClearBoth,
    ClearMedia,
    ClearBothMedia,
}

impl ClearMode {
    fn tag(self) -> i32 {
        match self {
            ClearMode::ClearLocal => 0,
            ClearMode::ClearBoth => 1,
            ClearMode::ClearMedia => 2,
            ClearMode::ClearBothMedia => 3,
        }
    }

    fn from_tag(tag: i32) -> ConvResult<Self> {
        Ok(match tag {
            0 => ClearMode::ClearLocal,
            1 => ClearMode::ClearBoth,
            2 => ClearMode::ClearMedia,
            3 => ClearMode::ClearBothMedia,
            other => {
                return Err(ConvError::InvalidEnumTag {
                    tag: other,
                    type_name: "ClearMode",
                })
            }
        })
    }

    /// spec §4.5: reset under CLEAR_MEDIA/CLEAR_BOTH_MEDIA has no wire
    /// representation for peers below 2.15.
    pub fn requires_media_support(self) -> bool {
        matches!(self, ClearMode::ClearMedia | ClearMode::ClearBothMedia)
    }
}

pub struct ResetConversationIQ {
    pub clear_descriptor: Option<ClearDescriptor>,
    pub clear_timestamp: i64,
    pub mode: ClearMode,
}

impl IqMessage for ResetConversationIQ {
    const SCHEMA_ID: Uuid = Uuid::from_u128(SCHEMA_BASE | 1);
    const SCHEMA_VERSION: i32 = 2;

    fn encode_body(&self, enc: &mut Encoder) {
        match &self.clear_descriptor {
            None => enc.write_zero(),
            Some(d) => {
                enc.write_bool(true);
                d.encode_body(enc);
            }
        }
        enc.write_long(self.clear_timestamp);
        enc.write_enum(self.mode.tag());
    }

    fn decode_body(dec: &mut Decoder) -> ConvResult<Self> {
        let clear_descriptor = if dec.read_bool()? {
            Some(ClearDescriptor::decode_body(dec)?)
        } else {
            None
        };
        let clear_timestamp = dec.read_long()?;
        let mode = ClearMode::from_tag(dec.read_enum("ClearMode", 4)?)?;
        Ok(Self {
            clear_descriptor,
            clear_timestamp,
            mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_without_clear_descriptor() {
        let iq = ResetConversationIQ {
            clear_descriptor: None,
            clear_timestamp: 1_000,
            mode: ClearMode::ClearBoth,
        };
        let mut enc = Encoder::new();
        iq.encode_body(&mut enc);
        let bytes = enc.finish();
        let mut dec = Decoder::new(&bytes);
        let decoded = ResetConversationIQ::decode_body(&mut dec).unwrap();
        assert!(decoded.clear_descriptor.is_none());
        assert_eq!(decoded.mode, ClearMode::ClearBoth);
    }

    #[test]
    fn media_modes_are_flagged_as_requiring_peer_support() {
        assert!(ClearMode::ClearMedia.requires_media_support());
        assert!(ClearMode::ClearBothMedia.requires_media_support());
        assert!(!ClearMode::ClearLocal.requires_media_support());
    }
}
