//! In-place update IQs (spec §4.2): `UpdateGeolocationIQ`,
//! `UpdateTimestampIQ`, `UpdateDescriptorIQ`, `UpdateAnnotationIQ`.

use std::collections::HashMap;

use uuid::Uuid;

use crate::codec::{Decoder, Encoder, IqMessage};
use crate::descriptor::{DescriptorId, GeolocationDescriptor};
use crate::error::{ConvError, ConvResult};

const SCHEMA_BASE: u128 = 0x7570_6461_7465_0000_0000_000000000000;

/// `UpdateGeolocationIQ`: in-place mutation of the peer's current
/// geolocation (spec §4.2).
pub struct UpdateGeolocationIQ(pub GeolocationDescriptor);

impl IqMessage for UpdateGeolocationIQ {
    const SCHEMA_ID: Uuid = Uuid::from_u128(SCHEMA_BASE | 1);
    const SCHEMA_VERSION: i32 = 2;

    fn encode_body(&self, enc: &mut Encoder) {
        let g = &self.0;
        g.header.encode(enc);
        enc.write_double(g.longitude);
        enc.write_double(g.latitude);
        enc.write_double(g.altitude);
        // Deliberately distinct fields, unlike the source's serializer
        // (spec §9 design notes: it writes mapLongitudeDelta twice where
        // mapLatitudeDelta belongs; not replicated here since this is a
        // from-scratch wire format with no legacy peer to stay compatible
        // with).
        enc.write_double(g.map_latitude_delta);
        enc.write_double(g.map_longitude_delta);
        enc.write_bool(g.updated);
    }

    fn decode_body(dec: &mut Decoder) -> ConvResult<Self> {
        let header = crate::descriptor::DescriptorHeader::decode(dec)?;
        let longitude = dec.read_double()?;
        let latitude = dec.read_double()?;
        let altitude = dec.read_double()?;
        let map_latitude_delta = dec.read_double()?;
        let map_longitude_delta = dec.read_double()?;
        let updated = dec.read_bool()?;
        Ok(Self(GeolocationDescriptor {
            header,
            longitude,
            latitude,
            altitude,
            map_latitude_delta,
            map_longitude_delta,
            updated,
            local_map_path: None,
        }))
    }
}

/// Which timestamp an `UpdateTimestampIQ` carries (spec §4.2 "type ∈ {READ,
/// DELETE, PEER_DELETE}").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateTimestampType {
    Read,
    Delete,
    PeerDelete,
}

impl UpdateTimestampType {
    fn tag(self) -> i32 {
        match self {
            UpdateTimestampType::Read => 0,
            UpdateTimestampType::Delete => 1,
            UpdateTimestampType::PeerDelete => 2,
        }
    }

    fn from_tag(tag: i32) -> ConvResult<Self> {
        Ok(match tag {
            0 => UpdateTimestampType::Read,
            1 => UpdateTimestampType::Delete,
            2 => UpdateTimestampType::PeerDelete,
            other => {
                return Err(ConvError::InvalidEnumTag {
                    tag: other,
                    type_name: "UpdateTimestampType",
                })
            }
        })
    }
}

pub struct UpdateTimestampIQ {
    pub descriptor_id: DescriptorId,
    pub kind: UpdateTimestampType,
    pub timestamp: i64,
}

impl IqMessage for UpdateTimestampIQ {
    const SCHEMA_ID: Uuid = Uuid::from_u128(SCHEMA_BASE | 2);
    const SCHEMA_VERSION: i32 = 1;

    fn encode_body(&self, enc: &mut Encoder) {
        self.descriptor_id.encode(enc);
        enc.write_enum(self.kind.tag());
        enc.write_long(self.timestamp);
    }

    fn decode_body(dec: &mut Decoder) -> ConvResult<Self> {
        let descriptor_id = DescriptorId::decode(dec)?;
        let kind = UpdateTimestampType::from_tag(dec.read_enum("UpdateTimestampType", 3)?)?;
        let timestamp = dec.read_long()?;
        Ok(Self {
            descriptor_id,
            kind,
            timestamp,
        })
    }
}

/// `UpdateDescriptorIQ`: edit (spec §4.2 "updatedTimestamp, optional
/// expireTimeout, optional copyAllowed, optional message").
pub struct UpdateDescriptorIQ {
    pub descriptor_id: DescriptorId,
    pub updated_timestamp: i64,
    pub expire_timeout: Option<i64>,
    pub copy_allowed: Option<bool>,
    pub message: Option<String>,
}

impl IqMessage for UpdateDescriptorIQ {
    const SCHEMA_ID: Uuid = Uuid::from_u128(SCHEMA_BASE | 3);
    const SCHEMA_VERSION: i32 = 1;

    fn encode_body(&self, enc: &mut Encoder) {
        self.descriptor_id.encode(enc);
        enc.write_long(self.updated_timestamp);
        enc.write_optional_long(self.expire_timeout);
        enc.write_optional_bool(self.copy_allowed);
        enc.write_optional_string(self.message.as_deref());
    }

    fn decode_body(dec: &mut Decoder) -> ConvResult<Self> {
        Ok(Self {
            descriptor_id: DescriptorId::decode(dec)?,
            updated_timestamp: dec.read_long()?,
            expire_timeout: dec.read_optional_long()?,
            copy_allowed: dec.read_optional_bool()?,
            message: dec.read_optional_string()?,
        })
    }
}

/// spec §4.2 "mode ∈ {SET, ADD, DEL}".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateAnnotationMode {
    Set,
    Add,
    Del,
}

impl UpdateAnnotationMode {
    fn tag(self) -> i32 {
        match self {
            UpdateAnnotationMode::Set => 0,
            UpdateAnnotationMode::Add => 1,
            UpdateAnnotationMode::Del => 2,
        }
    }

    fn from_tag(tag: i32) -> ConvResult<Self> {
        Ok(match tag {
            0 => UpdateAnnotationMode::Set,
            1 => UpdateAnnotationMode::Add,
            2 => UpdateAnnotationMode::Del,
            other => {
                return Err(ConvError::InvalidEnumTag {
                    tag: other,
                    type_name: "UpdateAnnotationMode",
                })
            }
        })
    }
}

/// spec §4.2 "AnnotationType ∈ {FORWARD, FORWARDED, SAVE, LIKE, POLL}".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationType {
    Forward,
    Forwarded,
    Save,
    Like,
    Poll,
}

impl AnnotationType {
    fn tag(self) -> i32 {
        match self {
            AnnotationType::Forward => 0,
            AnnotationType::Forwarded => 1,
            AnnotationType::Save => 2,
            AnnotationType::Like => 3,
            AnnotationType::Poll => 4,
        }
    }

    fn from_tag(tag: i32) -> ConvResult<Self> {
        Ok(match tag {
            0 => AnnotationType::Forward,
            1 => AnnotationType::Forwarded,
            2 => AnnotationType::Save,
            3 => AnnotationType::Like,
            4 => AnnotationType::Poll,
            other => {
                return Err(ConvError::InvalidEnumTag {
                    tag: other,
                    type_name: "AnnotationType",
                })
            }
        })
    }
}

pub struct UpdateAnnotationIQ {
    pub descriptor_id: DescriptorId,
    pub mode: UpdateAnnotationMode,
    pub annotations: HashMap<Uuid, Vec<(AnnotationType, i32)>>,
}

impl IqMessage for UpdateAnnotationIQ {
    const SCHEMA_ID: Uuid = Uuid::from_u128(SCHEMA_BASE | 4);
    const SCHEMA_VERSION: i32 = 1;

    fn encode_body(&self, enc: &mut Encoder) {
        self.descriptor_id.encode(enc);
        enc.write_enum(self.mode.tag());
        enc.write_int(self.annotations.len() as i32);
        for (twincode_id, entries) in &self.annotations {
            enc.write_uuid(*twincode_id);
            enc.write_int(entries.len() as i32);
            for (kind, value) in entries {
                enc.write_enum(kind.tag());
                enc.write_int(*value);
            }
        }
    }

    fn decode_body(dec: &mut Decoder) -> ConvResult<Self> {
        let descriptor_id = DescriptorId::decode(dec)?;
        let mode = UpdateAnnotationMode::from_tag(dec.read_enum("UpdateAnnotationMode", 3)?)?;
        let map_len = dec.read_int()?;
        let mut annotations = HashMap::with_capacity(map_len.max(0) as usize);
        for _ in 0..map_len {
            let twincode_id = dec.read_uuid()?;
            let entry_len = dec.read_int()?;
            let mut entries = Vec::with_capacity(entry_len.max(0) as usize);
            for _ in 0..entry_len {
                let kind = AnnotationType::from_tag(dec.read_enum("AnnotationType", 5)?)?;
                let value = dec.read_int()?;
                entries.push((kind, value));
            }
            annotations.insert(twincode_id, entries);
        }
        Ok(Self {
            descriptor_id,
            mode,
            annotations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_annotation_roundtrips() {
        let mut annotations = HashMap::new();
        annotations.insert(Uuid::new_v4(), vec![(AnnotationType::Like, 1)]);
        let iq = UpdateAnnotationIQ {
            descriptor_id: DescriptorId::new(Uuid::new_v4(), 1),
            mode: UpdateAnnotationMode::Add,
            annotations,
        };
        let mut enc = Encoder::new();
        iq.encode_body(&mut enc);
        let bytes = enc.finish();
        let mut dec = Decoder::new(&bytes);
        let decoded = UpdateAnnotationIQ::decode_body(&mut dec).unwrap();
        assert_eq!(decoded.annotations.len(), 1);
        assert_eq!(decoded.mode, UpdateAnnotationMode::Add);
    }

    #[test]
    fn update_timestamp_roundtrips() {
        let iq = UpdateTimestampIQ {
            descriptor_id: DescriptorId::new(Uuid::new_v4(), 9),
            kind: UpdateTimestampType::Delete,
            timestamp: 12_345,
        };
        let mut enc = Encoder::new();
        iq.encode_body(&mut enc);
        let bytes = enc.finish();
        let mut dec = Decoder::new(&bytes);
        let decoded = UpdateTimestampIQ::decode_body(&mut dec).unwrap();
        assert_eq!(decoded.kind, UpdateTimestampType::Delete);
        assert_eq!(decoded.timestamp, 12_345);
    }
}
