//! `ClearDescriptor` (spec §3 "Clear (clearTimestamp)"), produced by a
//! `ResetConversationIQ` (spec §4.2) to mark the point before which content
//! is considered cleared.

use crate::codec::{Decoder, Encoder};
use crate::error::ConvResult;

use super::DescriptorHeader;

#[derive(Debug, Clone, PartialEq)]
pub struct ClearDescriptor {
    pub header: DescriptorHeader,
    pub clear_timestamp: i64,
}

impl ClearDescriptor {
    pub fn new(header: DescriptorHeader, clear_timestamp: i64) -> Self {
        Self {
            header,
            clear_timestamp,
        }
    }

    pub fn encode_body(&self, enc: &mut Encoder) {
        self.header.encode(enc);
        enc.write_long(self.clear_timestamp);
    }

    pub fn decode_body(dec: &mut Decoder) -> ConvResult<Self> {
        let header = DescriptorHeader::decode(dec)?;
        let clear_timestamp = dec.read_long()?;
        Ok(Self {
            header,
            clear_timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DescriptorId;
    use uuid::Uuid;

    #[test]
    fn roundtrips() {
        let header = DescriptorHeader::new(DescriptorId::new(Uuid::new_v4(), 1), Uuid::new_v4(), 10);
        let c = ClearDescriptor::new(header, 9_999);
        let mut enc = Encoder::new();
        c.encode_body(&mut enc);
        let bytes = enc.finish();
        let mut dec = Decoder::new(&bytes);
        assert_eq!(ClearDescriptor::decode_body(&mut dec).unwrap(), c);
    }
}
