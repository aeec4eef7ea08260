//! IQ packet layer (spec §4.2): request/response packets wrapping
//! descriptors or sub-commands. Every IQ implements
//! [`crate::codec::IqMessage`] and shares the envelope
//! `{schemaId, schemaVersion, requestId}` via [`crate::codec::encode_frame`]/
//! [`decode_envelope`].

pub mod ack;
pub mod chunk;
pub mod group;
pub mod push;
pub mod reset;
pub mod sync;
pub mod update;

use bitflags::bitflags;

pub use ack::{OnJoinGroupIQ, OnPushIQ};
pub use chunk::{OnPushFileChunkIQ, PushFileChunkIQ, PushThumbnailIQ};
pub use group::{InviteGroupIQ, JoinGroupIQ, UpdatePermissionsIQ};
pub use push::{
    PushCommandIQ, PushFileIQ, PushGeolocationIQ, PushObjectIQ, PushTransientIQ, PushTwincodeIQ,
};
pub use reset::{ClearMode, ResetConversationIQ};
pub use sync::{OnSynchronizeIQ, SynchronizeIQ};
pub use update::{
    AnnotationType, UpdateAnnotationIQ, UpdateAnnotationMode, UpdateDescriptorIQ,
    UpdateGeolocationIQ, UpdateTimestampIQ, UpdateTimestampType,
};

bitflags! {
    /// Device-state bitmask carried by acks and by `ConversationConnection`
    /// (spec §3 "deviceState and peerDeviceState (bitmask: FOREGROUND=1,
    /// HAS_OPERATIONS=2, SYNCHRONIZE_KEYS=4, VALID=16)").
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DeviceState: u32 {
        const FOREGROUND = 1;
        const HAS_OPERATIONS = 2;
        const SYNCHRONIZE_KEYS = 4;
        const VALID = 16;
    }
}
