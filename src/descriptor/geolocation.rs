//! `GeolocationDescriptor` (spec §3 "Geolocation (longitude, latitude,
//! altitude, two map deltas, updated flag, optional local map path)").

use crate::codec::{Decoder, Encoder};
use crate::error::ConvResult;

use super::DescriptorHeader;

#[derive(Debug, Clone, PartialEq)]
pub struct GeolocationDescriptor {
    pub header: DescriptorHeader,
    pub longitude: f64,
    pub latitude: f64,
    pub altitude: f64,
    pub map_latitude_delta: f64,
    pub map_longitude_delta: f64,
    pub updated: bool,
    pub local_map_path: Option<String>,
}

impl GeolocationDescriptor {
    pub fn new(header: DescriptorHeader, longitude: f64, latitude: f64, altitude: f64) -> Self {
        Self {
            header,
            longitude,
            latitude,
            altitude,
            map_latitude_delta: 0.0,
            map_longitude_delta: 0.0,
            updated: false,
            local_map_path: None,
        }
    }

    /// In-place update from a newer reading, mirroring
    /// `UpdateGeolocationIQ`'s effect on the local descriptor. Deliberately
    /// assigns `latitude = other.latitude` on a latitude change — the
    /// source assigns `altitude` there, a copy-paste bug this
    /// reimplementation does not carry forward.
    pub fn update(&mut self, other: &GeolocationDescriptor) {
        if self.latitude != other.latitude {
            self.latitude = other.latitude;
            self.updated = true;
        }
        if self.longitude != other.longitude {
            self.longitude = other.longitude;
            self.updated = true;
        }
        if self.altitude != other.altitude {
            self.altitude = other.altitude;
            self.updated = true;
        }
        self.map_latitude_delta = other.map_latitude_delta;
        self.map_longitude_delta = other.map_longitude_delta;
    }

    pub fn encode_body(&self, enc: &mut Encoder) {
        self.header.encode(enc);
        enc.write_double(self.longitude);
        enc.write_double(self.latitude);
        enc.write_double(self.altitude);
        enc.write_double(self.map_latitude_delta);
        enc.write_double(self.map_longitude_delta);
        enc.write_bool(self.updated);
        enc.write_optional_string(self.local_map_path.as_deref());
    }

    pub fn decode_body(dec: &mut Decoder) -> ConvResult<Self> {
        let header = DescriptorHeader::decode(dec)?;
        let longitude = dec.read_double()?;
        let latitude = dec.read_double()?;
        let altitude = dec.read_double()?;
        let map_latitude_delta = dec.read_double()?;
        let map_longitude_delta = dec.read_double()?;
        let updated = dec.read_bool()?;
        let local_map_path = dec.read_optional_string()?;
        Ok(Self {
            header,
            longitude,
            latitude,
            altitude,
            map_latitude_delta,
            map_longitude_delta,
            updated,
            local_map_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DescriptorId;
    use uuid::Uuid;

    fn header() -> DescriptorHeader {
        DescriptorHeader::new(DescriptorId::new(Uuid::new_v4(), 1), Uuid::new_v4(), 10)
    }

    #[test]
    fn update_moves_latitude_not_altitude_on_latitude_change() {
        let mut mine = GeolocationDescriptor::new(header(), 2.35, 48.85, 35.0);
        let theirs = GeolocationDescriptor::new(header(), 2.35, 49.00, 35.0);
        mine.update(&theirs);
        assert_eq!(mine.latitude, 49.00);
        assert_eq!(mine.altitude, 35.0);
        assert!(mine.updated);
    }

    #[test]
    fn roundtrips() {
        let g = GeolocationDescriptor::new(header(), 2.35, 48.85, 35.0);
        let mut enc = Encoder::new();
        g.encode_body(&mut enc);
        let bytes = enc.finish();
        let mut dec = Decoder::new(&bytes);
        assert_eq!(GeolocationDescriptor::decode_body(&mut dec).unwrap(), g);
    }
}
