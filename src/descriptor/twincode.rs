//! `TwincodeDescriptor` (spec §3 "Twincode (twincodeId, schemaId, optional
//! publicKey, copyAllowed)").

use uuid::Uuid;

use crate::codec::{Decoder, Encoder};
use crate::error::ConvResult;

use super::DescriptorHeader;

#[derive(Debug, Clone, PartialEq)]
pub struct TwincodeDescriptor {
    pub header: DescriptorHeader,
    pub twincode_id: Uuid,
    pub schema_id: Uuid,
    pub public_key: Option<Vec<u8>>,
    pub copy_allowed: bool,
}

impl TwincodeDescriptor {
    pub fn new(header: DescriptorHeader, twincode_id: Uuid, schema_id: Uuid) -> Self {
        Self {
            header,
            twincode_id,
            schema_id,
            public_key: None,
            copy_allowed: true,
        }
    }

    pub fn encode_body(&self, enc: &mut Encoder) {
        self.header.encode(enc);
        enc.write_uuid(self.twincode_id);
        enc.write_uuid(self.schema_id);
        enc.write_optional_bytes(self.public_key.as_deref());
        enc.write_bool(self.copy_allowed);
    }

    pub fn decode_body(dec: &mut Decoder) -> ConvResult<Self> {
        let header = DescriptorHeader::decode(dec)?;
        let twincode_id = dec.read_uuid()?;
        let schema_id = dec.read_uuid()?;
        let public_key = dec.read_optional_bytes()?;
        let copy_allowed = dec.read_bool()?;
        Ok(Self {
            header,
            twincode_id,
            schema_id,
            public_key,
            copy_allowed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DescriptorId;

    #[test]
    fn v2_wire_has_no_public_key_but_still_roundtrips_absent() {
        let header = DescriptorHeader::new(DescriptorId::new(Uuid::new_v4(), 1), Uuid::new_v4(), 10);
        let d = TwincodeDescriptor::new(header, Uuid::new_v4(), Uuid::new_v4());
        let mut enc = Encoder::new();
        d.encode_body(&mut enc);
        let bytes = enc.finish();
        let mut dec = Decoder::new(&bytes);
        let decoded = TwincodeDescriptor::decode_body(&mut dec).unwrap();
        assert_eq!(decoded.public_key, None);
    }
}
