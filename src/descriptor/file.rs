//! `FileDescriptor` and its specialisations (spec §3 "File (path, extension,
//! length, end-offset, copyAllowed, hasThumbnail) and its specialisations
//! Image (+ width, height), Audio (+ duration), Video (+ w, h, duration),
//! NamedFile (+ name)").
//!
//! Composition, not inheritance (spec §9): `FileKind` carries the
//! specialisation-specific fields, and `FileDescriptor::encode_body`/
//! `decode_body` write the common fields once followed by the kind's own.

use crate::codec::{Decoder, Encoder};
use crate::error::{ConvError, ConvResult};

use super::DescriptorHeader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Plain,
    Image { width: i32, height: i32 },
    Audio { duration_ms: i64 },
    Video { width: i32, height: i32, duration_ms: i64 },
    NamedFile,
}

impl FileKind {
    fn tag(&self) -> i32 {
        match self {
            FileKind::Plain => 0,
            FileKind::Image { .. } => 1,
            FileKind::Audio { .. } => 2,
            FileKind::Video { .. } => 3,
            FileKind::NamedFile => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileDescriptor {
    pub header: DescriptorHeader,
    pub path: String,
    pub extension: String,
    pub length: i64,
    pub end_offset: i64,
    pub copy_allowed: bool,
    pub has_thumbnail: bool,
    pub kind: FileKind,
    /// Only meaningful for `FileKind::NamedFile`; kept out of `FileKind` so
    /// the tag switch above stays `Copy`.
    pub name: Option<String>,
}

impl FileDescriptor {
    pub fn new(header: DescriptorHeader, path: impl Into<String>, extension: impl Into<String>, length: i64) -> Self {
        Self {
            header,
            path: path.into(),
            extension: extension.into(),
            length,
            end_offset: 0,
            copy_allowed: true,
            has_thumbnail: false,
            kind: FileKind::Plain,
            name: None,
        }
    }

    pub fn encode_body(&self, enc: &mut Encoder) {
        self.header.encode(enc);
        enc.write_string(&self.path);
        enc.write_string(&self.extension);
        enc.write_long(self.length);
        enc.write_long(self.end_offset);
        enc.write_bool(self.copy_allowed);
        enc.write_bool(self.has_thumbnail);
        enc.write_enum(self.kind.tag());
        match self.kind {
            FileKind::Plain => {}
            FileKind::Image { width, height } => {
                enc.write_int(width);
                enc.write_int(height);
            }
            FileKind::Audio { duration_ms } => enc.write_long(duration_ms),
            FileKind::Video {
                width,
                height,
                duration_ms,
            } => {
                enc.write_int(width);
                enc.write_int(height);
                enc.write_long(duration_ms);
            }
            FileKind::NamedFile => {
                enc.write_string(self.name.as_deref().unwrap_or_default());
            }
        }
    }

    pub fn decode_body(dec: &mut Decoder) -> ConvResult<Self> {
        let header = DescriptorHeader::decode(dec)?;
        let path = dec.read_string()?;
        let extension = dec.read_string()?;
        let length = dec.read_long()?;
        let end_offset = dec.read_long()?;
        let copy_allowed = dec.read_bool()?;
        let has_thumbnail = dec.read_bool()?;
        let tag = dec.read_enum("FileKind", 5)?;
        let mut name = None;
        let kind = match tag {
            0 => FileKind::Plain,
            1 => FileKind::Image {
                width: dec.read_int()?,
                height: dec.read_int()?,
            },
            2 => FileKind::Audio {
                duration_ms: dec.read_long()?,
            },
            3 => FileKind::Video {
                width: dec.read_int()?,
                height: dec.read_int()?,
                duration_ms: dec.read_long()?,
            },
            4 => {
                name = Some(dec.read_string()?);
                FileKind::NamedFile
            }
            other => {
                return Err(ConvError::InvalidEnumTag {
                    tag: other,
                    type_name: "FileKind",
                })
            }
        };
        Ok(Self {
            header,
            path,
            extension,
            length,
            end_offset,
            copy_allowed,
            has_thumbnail,
            kind,
            name,
        })
    }
}
