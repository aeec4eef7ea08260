//! Operation execution (spec §4.5): turning a durable [`Operation`] record
//! into a single outbound frame (or a silent no-send outcome) against an
//! open [`ConversationConnection`].

use crate::codec::{encode_frame, Decoder, IqMessage};
use crate::connection::ConversationConnection;
use crate::descriptor::{Descriptor, DescriptorId};
use crate::error::{ConvError, ConvResult, ErrorCode};
use crate::external::{Crypto, Storage};
use crate::iq::group::{InviteGroupIQ, InviterInfo, JoinGroupIQ, UpdatePermissionsIQ};
use crate::iq::push::{
    PushCommandIQ, PushFileIQ, PushGeolocationIQ, PushInvitationIQ, PushObjectIQ, PushTransientIQ, PushTwincodeIQV2, PushTwincodeIQV3,
};
use crate::iq::reset::ResetConversationIQ;
use crate::iq::sync::SynchronizeIQ;
use crate::iq::update::{UpdateAnnotationIQ, UpdateAnnotationMode, UpdateDescriptorIQ, UpdateTimestampIQ, UpdateTimestampType};

use super::{Operation, OperationType};

/// Everything `Operation::execute` needs beyond the record itself and the
/// connection (spec §4.5 "Load the target Descriptor ... if not held in
/// memory"). Borrowed for the duration of a single `execute` call; none of
/// it is owned by the `Operation`.
pub struct ExecutionContext<'a> {
    pub storage: &'a dyn Storage,
    pub crypto: &'a dyn Crypto,
    pub now: i64,
}

impl Operation {
    /// spec §4.5 algorithm, dispatched per `OperationType`. Returns an
    /// [`ErrorCode`], not a `ConvError`: `Expired`/`FeatureNotSupportedByPeer`
    /// are *successful* decisions not to send, not failures.
    pub fn execute(&self, connection: &mut ConversationConnection, ctx: &ExecutionContext) -> ConvResult<ErrorCode> {
        match self.operation_type {
            OperationType::PushObject => self.push_descriptor(connection, ctx, PushKind::Object),
            OperationType::PushFile => self.push_descriptor(connection, ctx, PushKind::File),
            OperationType::PushGeolocation => self.push_descriptor(connection, ctx, PushKind::Geolocation),
            OperationType::PushTwincode => self.push_twincode(connection, ctx),
            OperationType::PushInvitation => self.push_descriptor(connection, ctx, PushKind::Invitation),
            OperationType::PushTransientObject => self.push_transient(connection),
            OperationType::PushCommand => self.push_command(connection),
            OperationType::SynchronizeConversation => self.synchronize(connection, ctx),
            OperationType::ResetConversation => self.reset_conversation(connection),
            OperationType::UpdateDescriptorTimestamp => self.update_timestamp(connection),
            OperationType::UpdateAnnotations => self.update_annotations(connection),
            OperationType::UpdateDescriptor => self.update_descriptor(connection),
            OperationType::UpdatePermissions => self.update_permissions(connection),
            OperationType::JoinGroup => self.join_group(connection, ctx),
            OperationType::InvokeJoinGroup => self.invite_group(connection, ctx),
            OperationType::InvokeAddMember => self.invite_group(connection, ctx),
        }
    }

    fn load_descriptor(&self, ctx: &ExecutionContext) -> ConvResult<Option<Descriptor>> {
        let Some(descriptor_id) = self.descriptor_id else {
            return Ok(None);
        };
        let Some(local_id) = descriptor_id.local_database_id else {
            return Ok(None);
        };
        ctx.storage.load_descriptor(local_id)
    }

    /// Common path for the five descriptor-bearing pushes (spec §4.5: load,
    /// `preparePush`, allocate requestId, register in-flight, send).
    fn push_descriptor(&self, connection: &mut ConversationConnection, ctx: &ExecutionContext, kind: PushKind) -> ConvResult<ErrorCode> {
        let Some(mut descriptor) = self.load_descriptor(ctx)? else {
            return Ok(ErrorCode::Expired);
        };
        if !connection.prepare_push(&mut descriptor, ctx.now, ctx.storage) {
            return Ok(ErrorCode::Expired);
        }
        let request_id = connection.allocate_request_id();
        let variant = connection.framing_variant();
        let frame = match (&kind, &descriptor) {
            (PushKind::Object, Descriptor::Object(d)) => encode_frame(variant, request_id, &PushObjectIQ(d.clone())),
            (PushKind::File, Descriptor::File(d)) => encode_frame(variant, request_id, &PushFileIQ(d.clone())),
            (PushKind::Geolocation, Descriptor::Geolocation(d)) => encode_frame(variant, request_id, &PushGeolocationIQ(d.clone())),
            (PushKind::Invitation, Descriptor::Invitation(d)) => encode_frame(variant, request_id, &PushInvitationIQ(d.clone())),
            _ => {
                return Err(ConvError::FatalInternal(
                    "operation descriptor_id resolved to a descriptor of the wrong variant".to_string(),
                ))
            }
        };
        connection.register_in_flight(request_id, descriptor);
        connection
            .transport()
            .send_packet(connection.peer_connection_id().unwrap_or_default(), kind.stat_type(), frame)?;
        Ok(ErrorCode::Queued)
    }

    /// `PushTwincode` needs its own path: the wire version (v2/v3) depends on
    /// peer capability (spec §4.5 "v3 only if peer supports (2, 18);
    /// otherwise v2 if (2, 12); otherwise ... refuses").
    fn push_twincode(&self, connection: &mut ConversationConnection, ctx: &ExecutionContext) -> ConvResult<ErrorCode> {
        let Some(mut descriptor) = self.load_descriptor(ctx)? else {
            return Ok(ErrorCode::Expired);
        };
        if !matches!(descriptor, Descriptor::Twincode(_)) {
            return Err(ConvError::FatalInternal(
                "PushTwincode operation resolved to a non-twincode descriptor".to_string(),
            ));
        }
        if !connection.is_supported(2, 12) {
            return Ok(ErrorCode::FeatureNotSupportedByPeer);
        }
        if !connection.prepare_push(&mut descriptor, ctx.now, ctx.storage) {
            return Ok(ErrorCode::Expired);
        }
        let Descriptor::Twincode(twincode) = &descriptor else {
            unreachable!()
        };
        let request_id = connection.allocate_request_id();
        let variant = connection.framing_variant();
        let frame = if connection.is_supported(2, 18) {
            encode_frame(variant, request_id, &PushTwincodeIQV3(twincode.clone()))
        } else {
            encode_frame(variant, request_id, &PushTwincodeIQV2(twincode.clone()))
        };
        connection.register_in_flight(request_id, descriptor);
        connection
            .transport()
            .send_packet(connection.peer_connection_id().unwrap_or_default(), "push_twincode", frame)?;
        Ok(ErrorCode::Queued)
    }

    /// spec §4.5 "operations with no ack ... complete immediately" /
    /// §3 "TransientObject (non-persisted)": the descriptor lives only in
    /// `self.payload`, never in storage.
    fn push_transient(&self, connection: &mut ConversationConnection) -> ConvResult<ErrorCode> {
        let Some(payload) = &self.payload else {
            return Ok(ErrorCode::Expired);
        };
        let mut dec = Decoder::new(payload);
        let transient = crate::descriptor::TransientObjectDescriptor::decode_body(&mut dec)?;
        let request_id = connection.allocate_request_id();
        let variant = connection.framing_variant();
        let frame = encode_frame(variant, request_id, &PushTransientIQ(transient));
        connection
            .transport()
            .send_packet(connection.peer_connection_id().unwrap_or_default(), "push_transient", frame)?;
        Ok(ErrorCode::Success)
    }

    fn push_command(&self, connection: &mut ConversationConnection) -> ConvResult<ErrorCode> {
        let Some(payload) = &self.payload else {
            return Ok(ErrorCode::Expired);
        };
        let mut dec = Decoder::new(payload);
        let inner_schema_id = dec.read_uuid()?;
        let inner_schema_version = dec.read_int()?;
        let inner_payload = dec.read_bytes()?;
        let request_id = connection.allocate_request_id();
        let variant = connection.framing_variant();
        let frame = encode_frame(
            variant,
            request_id,
            &PushCommandIQ {
                inner_schema_id,
                inner_schema_version,
                payload: inner_payload,
            },
        );
        connection
            .transport()
            .send_packet(connection.peer_connection_id().unwrap_or_default(), "push_command", frame)?;
        Ok(ErrorCode::Success)
    }

    fn synchronize(&self, connection: &mut ConversationConnection, ctx: &ExecutionContext) -> ConvResult<ErrorCode> {
        let request_id = connection.allocate_request_id();
        let variant = connection.framing_variant();
        connection.begin_synchronize(ctx.now);
        let frame = encode_frame(
            variant,
            request_id,
            &SynchronizeIQ {
                peer_twincode_outbound_id: self.conversation_id,
                resource_id: self.conversation_id,
                timestamp: ctx.now,
            },
        );
        connection
            .transport()
            .send_packet(connection.peer_connection_id().unwrap_or_default(), "synchronize", frame)?;
        Ok(ErrorCode::Queued)
    }

    /// spec §8 "Reset conversation in CLEAR_MEDIA mode against peer < 2.15:
    /// operation returns SUCCESS without sending any frame."
    fn reset_conversation(&self, connection: &mut ConversationConnection) -> ConvResult<ErrorCode> {
        let Some(payload) = &self.payload else {
            return Ok(ErrorCode::Expired);
        };
        let mut dec = Decoder::new(payload);
        let reset = ResetConversationIQ::decode_body(&mut dec)?;
        if reset.mode.requires_media_support() && !connection.is_supported(2, 15) {
            return Ok(ErrorCode::Success);
        }
        let request_id = connection.allocate_request_id();
        let variant = connection.framing_variant();
        let frame = encode_frame(variant, request_id, &reset);
        connection
            .transport()
            .send_packet(connection.peer_connection_id().unwrap_or_default(), "reset_conversation", frame)?;
        Ok(ErrorCode::Queued)
    }

    fn update_timestamp(&self, connection: &mut ConversationConnection) -> ConvResult<ErrorCode> {
        let Some(descriptor_id) = self.descriptor_id else {
            return Ok(ErrorCode::Expired);
        };
        let Some(payload) = &self.payload else {
            return Ok(ErrorCode::Expired);
        };
        let kind = decode_update_timestamp_kind(payload)?;
        let request_id = connection.allocate_request_id();
        let variant = connection.framing_variant();
        let frame = encode_frame(
            variant,
            request_id,
            &UpdateTimestampIQ {
                descriptor_id,
                kind,
                timestamp: self.creation_date,
            },
        );
        connection
            .transport()
            .send_packet(connection.peer_connection_id().unwrap_or_default(), "update_timestamp", frame)?;
        Ok(ErrorCode::Success)
    }

    fn update_annotations(&self, connection: &mut ConversationConnection) -> ConvResult<ErrorCode> {
        let Some(payload) = &self.payload else {
            return Ok(ErrorCode::Expired);
        };
        let mut dec = Decoder::new(payload);
        let update = UpdateAnnotationIQ::decode_body(&mut dec)?;
        let request_id = connection.allocate_request_id();
        let variant = connection.framing_variant();
        let frame = encode_frame(variant, request_id, &update);
        connection
            .transport()
            .send_packet(connection.peer_connection_id().unwrap_or_default(), "update_annotations", frame)?;
        Ok(ErrorCode::Success)
    }

    fn update_descriptor(&self, connection: &mut ConversationConnection) -> ConvResult<ErrorCode> {
        let Some(payload) = &self.payload else {
            return Ok(ErrorCode::Expired);
        };
        let mut dec = Decoder::new(payload);
        let update = UpdateDescriptorIQ::decode_body(&mut dec)?;
        let request_id = connection.allocate_request_id();
        let variant = connection.framing_variant();
        let frame = encode_frame(variant, request_id, &update);
        connection
            .transport()
            .send_packet(connection.peer_connection_id().unwrap_or_default(), "update_descriptor", frame)?;
        Ok(ErrorCode::Success)
    }

    fn update_permissions(&self, connection: &mut ConversationConnection) -> ConvResult<ErrorCode> {
        let Some(payload) = &self.payload else {
            return Ok(ErrorCode::Expired);
        };
        let mut dec = Decoder::new(payload);
        let update = UpdatePermissionsIQ::decode_body(&mut dec)?;
        let request_id = connection.allocate_request_id();
        let variant = connection.framing_variant();
        let frame = encode_frame(variant, request_id, &update);
        connection
            .transport()
            .send_packet(connection.peer_connection_id().unwrap_or_default(), "update_permissions", frame)?;
        Ok(ErrorCode::Success)
    }

    /// Group operations aren't tracked in the descriptor-keyed in-flight
    /// table; their ack (`OnJoinGroupIQ`) is correlated purely by
    /// `requestId`, matching `ConversationHandler::handle`'s treatment of
    /// `OnJoinGroup` (it never calls `take_in_flight`).
    fn join_group(&self, connection: &mut ConversationConnection, ctx: &ExecutionContext) -> ConvResult<ErrorCode> {
        let Some(payload) = &self.payload else {
            return Ok(ErrorCode::Expired);
        };
        let mut dec = Decoder::new(payload);
        let group_twincode_id = dec.read_uuid()?;
        let member_twincode_id = dec.read_uuid()?;
        let inviter_info = signature_to_inviter(ctx, group_twincode_id)?;
        let request_id = connection.allocate_request_id();
        let variant = connection.framing_variant();
        let frame = encode_frame(
            variant,
            request_id,
            &JoinGroupIQ {
                group_twincode_id,
                member_twincode_id,
                inviter_info,
            },
        );
        connection
            .transport()
            .send_packet(connection.peer_connection_id().unwrap_or_default(), "join_group", frame)?;
        Ok(ErrorCode::Queued)
    }

    fn invite_group(&self, connection: &mut ConversationConnection, ctx: &ExecutionContext) -> ConvResult<ErrorCode> {
        let Some(payload) = &self.payload else {
            return Ok(ErrorCode::Expired);
        };
        let mut dec = Decoder::new(payload);
        let group_twincode_id = dec.read_uuid()?;
        let member_twincode_id = dec.read_uuid()?;
        let inviter_info = signature_to_inviter(ctx, group_twincode_id)?;
        let request_id = connection.allocate_request_id();
        let variant = connection.framing_variant();
        let frame = encode_frame(
            variant,
            request_id,
            &InviteGroupIQ {
                group_twincode_id,
                member_twincode_id,
                inviter_info,
            },
        );
        connection
            .transport()
            .send_packet(connection.peer_connection_id().unwrap_or_default(), "invite_group", frame)?;
        Ok(ErrorCode::Queued)
    }
}

enum PushKind {
    Object,
    File,
    Geolocation,
    Invitation,
}

impl PushKind {
    fn stat_type(&self) -> &'static str {
        match self {
            PushKind::Object => "push_object",
            PushKind::File => "push_file",
            PushKind::Geolocation => "push_geolocation",
            PushKind::Invitation => "push_invitation",
        }
    }
}

fn signature_to_inviter(ctx: &ExecutionContext, group_twincode_id: uuid::Uuid) -> ConvResult<Option<InviterInfo>> {
    Ok(ctx.crypto.produce_signature(group_twincode_id)?.map(|sig| InviterInfo {
        twincode_outbound_id: sig.twincode_outbound_id,
        public_key: sig.public_key,
        signature: sig.signature,
    }))
}

fn decode_update_timestamp_kind(payload: &[u8]) -> ConvResult<UpdateTimestampType> {
    let mut dec = Decoder::new(payload);
    match dec.read_enum("UpdateTimestampType", 3)? {
        0 => Ok(UpdateTimestampType::Read),
        1 => Ok(UpdateTimestampType::Delete),
        2 => Ok(UpdateTimestampType::PeerDelete),
        other => Err(ConvError::InvalidEnumTag {
            tag: other,
            type_name: "UpdateTimestampType",
        }),
    }
}

/// Allows a single `UpdateAnnotationMode` byte encoded at the front of a
/// standalone payload to be read back without pulling in the whole
/// `UpdateAnnotationIQ` (used by callers that build `Operation.payload` from
/// just the mode, e.g. a queue replay that only needs to know SET/ADD/DEL
/// before deciding whether to coalesce). Unused by `execute` itself, which
/// always stores and replays the full `UpdateAnnotationIQ` body.
#[allow(dead_code)]
fn decode_update_annotation_mode(payload: &[u8]) -> ConvResult<UpdateAnnotationMode> {
    let mut dec = Decoder::new(payload);
    match dec.read_enum("UpdateAnnotationMode", 3)? {
        0 => Ok(UpdateAnnotationMode::Set),
        1 => Ok(UpdateAnnotationMode::Add),
        2 => Ok(UpdateAnnotationMode::Del),
        other => Err(ConvError::InvalidEnumTag {
            tag: other,
            type_name: "UpdateAnnotationMode",
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;
    use crate::config::EngineConfig;
    use crate::descriptor::{DescriptorHeader, ObjectDescriptor};
    use crate::external::mock::{MockCrypto, MockStorage, MockTransport};

    fn connection() -> ConversationConnection {
        let mut c = ConversationConnection::new(Uuid::new_v4(), EngineConfig::default(), Arc::new(MockTransport::default()), 0);
        c.admit_incoming_offer();
        let pcid = Uuid::new_v4();
        c.transport_assigned_peer_connection(crate::connection::Direction::Incoming, pcid)
            .unwrap();
        c.data_channel_opened(crate::connection::Direction::Incoming, 0).unwrap();
        c
    }

    #[test]
    fn push_object_queues_and_stamps_sent_timestamp() {
        let mut connection = connection();
        let storage = MockStorage::default();
        let crypto = MockCrypto { signature: None };
        let conversation_id = connection.conversation_id;

        let mut id = DescriptorId::new(Uuid::new_v4(), 1);
        id.local_database_id = Some(1);
        let header = DescriptorHeader::new(id, conversation_id, 0);
        let descriptor = Descriptor::Object(ObjectDescriptor::new(header, "hi"));
        storage.descriptors.lock().unwrap().insert(1, descriptor);

        let mut op = Operation::new(1, OperationType::PushObject, conversation_id, 0);
        op.descriptor_id = Some(id);

        let ctx = ExecutionContext {
            storage: &storage,
            crypto: &crypto,
            now: 500,
        };
        let result = op.execute(&mut connection, &ctx).unwrap();
        assert_eq!(result, ErrorCode::Queued);
        assert_eq!(connection.in_flight_len(), 1);
        let stored = storage.descriptors.lock().unwrap().get(&1).unwrap().clone();
        assert_eq!(stored.header().sent_timestamp, 500);
    }

    #[test]
    fn push_object_returns_expired_when_descriptor_missing() {
        let mut connection = connection();
        let storage = MockStorage::default();
        let crypto = MockCrypto { signature: None };
        let mut id = DescriptorId::new(Uuid::new_v4(), 1);
        id.local_database_id = Some(42);
        let mut op = Operation::new(1, OperationType::PushObject, connection.conversation_id, 0);
        op.descriptor_id = Some(id);

        let ctx = ExecutionContext {
            storage: &storage,
            crypto: &crypto,
            now: 0,
        };
        assert_eq!(op.execute(&mut connection, &ctx).unwrap(), ErrorCode::Expired);
    }

    #[test]
    fn push_twincode_is_refused_below_minimum_peer_version() {
        let mut connection = connection();
        let storage = MockStorage::default();
        let crypto = MockCrypto { signature: None };

        let mut id = DescriptorId::new(Uuid::new_v4(), 1);
        id.local_database_id = Some(2);
        let header = DescriptorHeader::new(id, connection.conversation_id, 0);
        let descriptor = Descriptor::Twincode(crate::descriptor::TwincodeDescriptor::new(header, Uuid::new_v4(), Uuid::new_v4()));
        storage.descriptors.lock().unwrap().insert(2, descriptor);

        let mut op = Operation::new(1, OperationType::PushTwincode, connection.conversation_id, 0);
        op.descriptor_id = Some(id);

        let ctx = ExecutionContext {
            storage: &storage,
            crypto: &crypto,
            now: 0,
        };
        assert_eq!(op.execute(&mut connection, &ctx).unwrap(), ErrorCode::FeatureNotSupportedByPeer);
    }

    #[test]
    fn reset_conversation_clear_media_against_old_peer_is_silent_success() {
        let mut connection = connection();
        connection.peer_major_version = 2;
        connection.peer_minor_version = 10;
        let storage = MockStorage::default();
        let crypto = MockCrypto { signature: None };

        let reset = ResetConversationIQ {
            clear_descriptor: None,
            clear_timestamp: 1,
            mode: crate::iq::reset::ClearMode::ClearMedia,
        };
        let mut enc = crate::codec::Encoder::new();
        reset.encode_body(&mut enc);

        let mut op = Operation::new(1, OperationType::ResetConversation, connection.conversation_id, 0);
        op.payload = Some(enc.finish().to_vec());

        let ctx = ExecutionContext {
            storage: &storage,
            crypto: &crypto,
            now: 0,
        };
        let result = op.execute(&mut connection, &ctx).unwrap();
        assert_eq!(result, ErrorCode::Success);
        assert!(storage.descriptors.lock().unwrap().is_empty());
    }

    #[test]
    fn push_transient_completes_with_no_in_flight_registration() {
        let mut connection = connection();
        let storage = MockStorage::default();
        let crypto = MockCrypto { signature: None };

        let header = DescriptorHeader::new(
            DescriptorId::new(Uuid::new_v4(), 1),
            connection.conversation_id,
            0,
        );
        let transient = crate::descriptor::TransientObjectDescriptor::new(header, Uuid::new_v4(), 1, vec![9, 9]);
        let mut enc = crate::codec::Encoder::new();
        transient.encode_body(&mut enc);

        let mut op = Operation::new(1, OperationType::PushTransientObject, connection.conversation_id, 0);
        op.payload = Some(enc.finish().to_vec());

        let ctx = ExecutionContext {
            storage: &storage,
            crypto: &crypto,
            now: 0,
        };
        assert_eq!(op.execute(&mut connection, &ctx).unwrap(), ErrorCode::Success);
        assert_eq!(connection.in_flight_len(), 0);
    }
}
