//! `InvitationDescriptor` (spec §3 "Invitation (groupTwincodeId,
//! memberTwincodeId, inviterTwincodeId, name, optional publicKey, Status)").

use uuid::Uuid;

use crate::codec::{Decoder, Encoder};
use crate::error::{ConvError, ConvResult};

use super::DescriptorHeader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Refused,
    Withdrawn,
    Joined,
}

impl InvitationStatus {
    fn tag(self) -> i32 {
        match self {
            InvitationStatus::Pending => 0,
            InvitationStatus::Accepted => 1,
            InvitationStatus::Refused => 2,
            InvitationStatus::Withdrawn => 3,
            InvitationStatus::Joined => 4,
        }
    }

    fn from_tag(tag: i32) -> ConvResult<Self> {
        Ok(match tag {
            0 => InvitationStatus::Pending,
            1 => InvitationStatus::Accepted,
            2 => InvitationStatus::Refused,
            3 => InvitationStatus::Withdrawn,
            4 => InvitationStatus::Joined,
            other => {
                return Err(ConvError::InvalidEnumTag {
                    tag: other,
                    type_name: "InvitationStatus",
                })
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvitationDescriptor {
    pub header: DescriptorHeader,
    pub group_twincode_id: Uuid,
    pub member_twincode_id: Uuid,
    pub inviter_twincode_id: Uuid,
    pub name: String,
    pub public_key: Option<Vec<u8>>,
    pub status: InvitationStatus,
}

impl InvitationDescriptor {
    pub fn new(
        header: DescriptorHeader,
        group_twincode_id: Uuid,
        member_twincode_id: Uuid,
        inviter_twincode_id: Uuid,
        name: impl Into<String>,
    ) -> Self {
        Self {
            header,
            group_twincode_id,
            member_twincode_id,
            inviter_twincode_id,
            name: name.into(),
            public_key: None,
            status: InvitationStatus::Pending,
        }
    }

    pub fn encode_body(&self, enc: &mut Encoder) {
        self.header.encode(enc);
        enc.write_uuid(self.group_twincode_id);
        enc.write_uuid(self.member_twincode_id);
        enc.write_uuid(self.inviter_twincode_id);
        enc.write_string(&self.name);
        enc.write_optional_bytes(self.public_key.as_deref());
        enc.write_enum(self.status.tag());
    }

    pub fn decode_body(dec: &mut Decoder) -> ConvResult<Self> {
        let header = DescriptorHeader::decode(dec)?;
        let group_twincode_id = dec.read_uuid()?;
        let member_twincode_id = dec.read_uuid()?;
        let inviter_twincode_id = dec.read_uuid()?;
        let name = dec.read_string()?;
        let public_key = dec.read_optional_bytes()?;
        let status = InvitationStatus::from_tag(dec.read_enum("InvitationStatus", 5)?)?;
        Ok(Self {
            header,
            group_twincode_id,
            member_twincode_id,
            inviter_twincode_id,
            name,
            public_key,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DescriptorId;

    #[test]
    fn roundtrips_with_status() {
        let header = DescriptorHeader::new(DescriptorId::new(Uuid::new_v4(), 1), Uuid::new_v4(), 10);
        let mut inv = InvitationDescriptor::new(
            header,
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "Family",
        );
        inv.status = InvitationStatus::Accepted;
        let mut enc = Encoder::new();
        inv.encode_body(&mut enc);
        let bytes = enc.finish();
        let mut dec = Decoder::new(&bytes);
        assert_eq!(InvitationDescriptor::decode_body(&mut dec).unwrap(), inv);
    }
}
