//! `ConversationHandler` — inbound packet demultiplexer (spec §4.4).

use std::sync::Arc;

use tracing::{debug, warn};

use crate::codec::{decode_envelope, encode_frame, Decoder, FramingVariant, IqMessage, SchemaKey, SchemaRegistry};
use crate::descriptor::{Descriptor, DescriptorId, FileDescriptor};
use crate::error::ConvResult;
use crate::iq::{
    ack::{OnPushFileIQ, OnPushGeolocationIQ, OnPushInvitationIQ, OnPushIQ, OnPushObjectIQ, OnPushTwincodeIQ},
    chunk::OnPushFileChunkIQ,
    chunk::PushFileChunkIQ,
    chunk::PushThumbnailIQ,
    group::InviteGroupIQ,
    group::JoinGroupIQ,
    group::OnJoinGroupIQ,
    group::UpdatePermissionsIQ,
    push::PushCommandIQ,
    push::PushFileIQ,
    push::PushGeolocationIQ,
    push::PushObjectIQ,
    push::PushTransientIQ,
    push::PushTwincodeIQV2,
    push::PushTwincodeIQV3,
    reset::ResetConversationIQ,
    sync::OnSynchronizeIQ,
    sync::SynchronizeIQ,
    update::UpdateAnnotationIQ,
    update::UpdateDescriptorIQ,
    update::UpdateGeolocationIQ,
    update::UpdateTimestampIQ,
    update::UpdateTimestampType,
    DeviceState,
};

use super::{file_key, ConversationConnection, ReceivingFile};

/// Callbacks the handler drives local state through once an inbound IQ has
/// been decoded and validated (spec §4.4 "delivers the descriptor via
/// onPopDescriptor(descriptor) callback").
pub trait ConversationListener: Send + Sync {
    fn on_pop_descriptor(&self, descriptor: Descriptor);
    fn on_read_descriptor(&self, descriptor_id: DescriptorId, timestamp: i64);
    fn on_delete_descriptor(&self, descriptor_id: DescriptorId, timestamp: i64);

    /// spec §4.6 `writeChunk`: "write bytes, advance offset". Default no-op
    /// so hosts that don't need byte-level persistence (tests, mocks) aren't
    /// forced to implement it.
    fn on_receive_file_chunk(&self, _descriptor_id: DescriptorId, _chunk_start: u64, _chunk: &[u8]) {}
}

/// The full set of inbound IQ shapes the dispatcher recognises. Built as a
/// sum type rather than trait objects so the registry can hand back
/// something `match`-able without downcasting (spec §9 "Polymorphic
/// payloads: use a sum type of known content schemas").
enum InboundIq {
    PushObject(PushObjectIQ),
    PushFile(PushFileIQ),
    PushGeolocation(PushGeolocationIQ),
    PushTwincodeV2(PushTwincodeIQV2),
    PushTwincodeV3(PushTwincodeIQV3),
    PushTransient(PushTransientIQ),
    PushCommand(PushCommandIQ),
    UpdateGeolocation(UpdateGeolocationIQ),
    UpdateTimestamp(UpdateTimestampIQ),
    UpdateDescriptor(UpdateDescriptorIQ),
    UpdateAnnotation(UpdateAnnotationIQ),
    ResetConversation(ResetConversationIQ),
    InviteGroup(InviteGroupIQ),
    JoinGroup(JoinGroupIQ),
    OnJoinGroup(OnJoinGroupIQ),
    UpdatePermissions(UpdatePermissionsIQ),
    PushFileChunk(PushFileChunkIQ),
    OnPushFileChunk(OnPushFileChunkIQ),
    PushThumbnail(PushThumbnailIQ),
    Synchronize(SynchronizeIQ),
    OnSynchronize(OnSynchronizeIQ),
    OnPush(OnPushIQ),
}

fn build_registry() -> SchemaRegistry<InboundIq> {
    let mut r = SchemaRegistry::new();
    r.register(PushObjectIQ::schema_key(), |d| PushObjectIQ::decode_body(d).map(InboundIq::PushObject));
    r.register(PushFileIQ::schema_key(), |d| PushFileIQ::decode_body(d).map(InboundIq::PushFile));
    r.register(PushGeolocationIQ::schema_key(), |d| {
        PushGeolocationIQ::decode_body(d).map(InboundIq::PushGeolocation)
    });
    r.register(SchemaKey::new(PushTwincodeIQV2::SCHEMA_ID, PushTwincodeIQV2::SCHEMA_VERSION), |d| {
        PushTwincodeIQV2::decode_body(d).map(InboundIq::PushTwincodeV2)
    });
    r.register(SchemaKey::new(PushTwincodeIQV3::SCHEMA_ID, PushTwincodeIQV3::SCHEMA_VERSION), |d| {
        PushTwincodeIQV3::decode_body(d).map(InboundIq::PushTwincodeV3)
    });
    r.register(PushTransientIQ::schema_key(), |d| PushTransientIQ::decode_body(d).map(InboundIq::PushTransient));
    r.register(PushCommandIQ::schema_key(), |d| PushCommandIQ::decode_body(d).map(InboundIq::PushCommand));
    r.register(UpdateGeolocationIQ::schema_key(), |d| {
        UpdateGeolocationIQ::decode_body(d).map(InboundIq::UpdateGeolocation)
    });
    r.register(UpdateTimestampIQ::schema_key(), |d| {
        UpdateTimestampIQ::decode_body(d).map(InboundIq::UpdateTimestamp)
    });
    r.register(UpdateDescriptorIQ::schema_key(), |d| {
        UpdateDescriptorIQ::decode_body(d).map(InboundIq::UpdateDescriptor)
    });
    r.register(UpdateAnnotationIQ::schema_key(), |d| {
        UpdateAnnotationIQ::decode_body(d).map(InboundIq::UpdateAnnotation)
    });
    r.register(ResetConversationIQ::schema_key(), |d| {
        ResetConversationIQ::decode_body(d).map(InboundIq::ResetConversation)
    });
    r.register(InviteGroupIQ::schema_key(), |d| InviteGroupIQ::decode_body(d).map(InboundIq::InviteGroup));
    r.register(JoinGroupIQ::schema_key(), |d| JoinGroupIQ::decode_body(d).map(InboundIq::JoinGroup));
    r.register(OnJoinGroupIQ::schema_key(), |d| OnJoinGroupIQ::decode_body(d).map(InboundIq::OnJoinGroup));
    r.register(UpdatePermissionsIQ::schema_key(), |d| {
        UpdatePermissionsIQ::decode_body(d).map(InboundIq::UpdatePermissions)
    });
    r.register(PushFileChunkIQ::schema_key(), |d| PushFileChunkIQ::decode_body(d).map(InboundIq::PushFileChunk));
    r.register(OnPushFileChunkIQ::schema_key(), |d| {
        OnPushFileChunkIQ::decode_body(d).map(InboundIq::OnPushFileChunk)
    });
    r.register(PushThumbnailIQ::schema_key(), |d| PushThumbnailIQ::decode_body(d).map(InboundIq::PushThumbnail));
    r.register(SynchronizeIQ::schema_key(), |d| SynchronizeIQ::decode_body(d).map(InboundIq::Synchronize));
    r.register(OnSynchronizeIQ::schema_key(), |d| OnSynchronizeIQ::decode_body(d).map(InboundIq::OnSynchronize));
    r.register(OnPushObjectIQ::schema_key(), |d| OnPushObjectIQ::decode_body(d).map(|a| InboundIq::OnPush(a.0)));
    r.register(OnPushFileIQ::schema_key(), |d| OnPushFileIQ::decode_body(d).map(|a| InboundIq::OnPush(a.0)));
    r.register(OnPushTwincodeIQ::schema_key(), |d| OnPushTwincodeIQ::decode_body(d).map(|a| InboundIq::OnPush(a.0)));
    r.register(OnPushGeolocationIQ::schema_key(), |d| {
        OnPushGeolocationIQ::decode_body(d).map(|a| InboundIq::OnPush(a.0))
    });
    r.register(OnPushInvitationIQ::schema_key(), |d| {
        OnPushInvitationIQ::decode_body(d).map(|a| InboundIq::OnPush(a.0))
    });
    r
}

/// Non-descriptor "generic ack" variants ride on the `OnPushIQ` schema
/// family (one schema id per operation kind); the dispatcher needs only the
/// shared fields to clear the in-flight table, so every typed alias decodes
/// straight into `InboundIq::OnPush` above.
pub struct ConversationHandler {
    registry: SchemaRegistry<InboundIq>,
    listener: Arc<dyn ConversationListener>,
    inbound_iq_count: u64,
}

impl ConversationHandler {
    pub fn new(listener: Arc<dyn ConversationListener>) -> Self {
        Self {
            registry: build_registry(),
            listener,
            inbound_iq_count: 0,
        }
    }

    pub fn inbound_iq_count(&self) -> u64 {
        self.inbound_iq_count
    }

    /// spec §4.4, steps 1-5. Errors from decoding/dispatch are swallowed
    /// (logged) per spec; only truly fatal internal errors should reach the
    /// caller, and none of the paths below produce one.
    pub fn dispatch(&mut self, connection: &mut ConversationConnection, frame: &[u8], now: i64) {
        self.inbound_iq_count += 1;
        let variant = connection.framing_variant();

        let (header, mut body) = match decode_envelope(variant, frame) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "dropping malformed inbound frame");
                return;
            }
        };

        let iq = match self.registry.decode(header.schema, &mut body) {
            Ok(iq) => iq,
            Err(e) => {
                warn!(schema = %header.schema, error = %e, "dropping frame for unknown or unparseable schema");
                return;
            }
        };

        if let Err(e) = self.handle(connection, header.request_id, iq, now) {
            warn!(error = %e, "error handling inbound IQ, dropped");
        }
    }

    fn handle(&mut self, connection: &mut ConversationConnection, request_id: i64, iq: InboundIq, now: i64) -> ConvResult<()> {
        match iq {
            InboundIq::PushObject(p) => self.ack_push(connection, request_id, Descriptor::Object(p.0), now),
            InboundIq::PushFile(p) => self.handle_push_file(connection, request_id, p.0, now),
            InboundIq::PushGeolocation(p) => self.ack_push(connection, request_id, Descriptor::Geolocation(p.0), now),
            InboundIq::PushTwincodeV2(p) => self.ack_push(connection, request_id, Descriptor::Twincode(p.0), now),
            InboundIq::PushTwincodeV3(p) => self.ack_push(connection, request_id, Descriptor::Twincode(p.0), now),
            InboundIq::PushTransient(p) => self.ack_push(connection, request_id, Descriptor::TransientObject(p.0), now),
            InboundIq::PushCommand(_) => {
                // fire-and-forget: no descriptor, no ack (spec §4.5 "Success
                // (fire-and-forget, no ack)").
                Ok(())
            }
            InboundIq::UpdateGeolocation(u) => self.handle_update_geolocation(connection, request_id, u.0, now),
            InboundIq::UpdateTimestamp(u) => self.handle_update_timestamp(u),
            InboundIq::UpdateDescriptor(_) => Ok(()),
            InboundIq::UpdateAnnotation(_) => Ok(()),
            InboundIq::ResetConversation(_) => Ok(()),
            InboundIq::InviteGroup(_) => Ok(()),
            InboundIq::JoinGroup(_) => Ok(()),
            InboundIq::OnJoinGroup(ack) => {
                self.clear_in_flight(connection, request_id, if ack.is_success() { Some(now) } else { None });
                Ok(())
            }
            InboundIq::UpdatePermissions(_) => Ok(()),
            InboundIq::PushFileChunk(c) => self.handle_push_file_chunk(connection, request_id, c, now),
            InboundIq::OnPushFileChunk(ack) => {
                connection.record_rtt_measurement(ack.received_timestamp - ack.sender_timestamp);
                self.clear_in_flight(connection, request_id, Some(ack.received_timestamp));
                Ok(())
            }
            InboundIq::PushThumbnail(_) => Ok(()),
            InboundIq::Synchronize(s) => self.handle_synchronize(connection, request_id, s, now),
            InboundIq::OnSynchronize(o) => connection.adjust_peer_time(o.timestamp, now),
            InboundIq::OnPush(ack) => {
                self.clear_in_flight(connection, request_id, Some(ack.received_timestamp));
                Ok(())
            }
        }
    }

    /// Common `Push*IQ` handling (spec §4.4): stamp `receivedTimestamp`,
    /// deliver via `onPopDescriptor`, emit the matching `OnPushIQ`.
    fn ack_push(&self, connection: &mut ConversationConnection, request_id: i64, mut descriptor: Descriptor, now: i64) -> ConvResult<()> {
        descriptor.header_mut().received_timestamp = now;
        self.listener.on_pop_descriptor(descriptor);
        let ack = OnPushIQ {
            device_state: connection.device_state,
            received_timestamp: now,
        };
        self.send_generic_ack(connection, request_id, ack)
    }

    /// spec §4.6: a `PushFileIQ` establishes the receiver's `receivingFiles`
    /// entry (`expected length`, `currentOffset = 0`) before any chunk can
    /// arrive for it, in addition to the ordinary push ack/delivery.
    fn handle_push_file(&self, connection: &mut ConversationConnection, request_id: i64, file: FileDescriptor, now: i64) -> ConvResult<()> {
        let key = file_key(file.header.descriptor_id);
        let expected_length = file.length.max(0) as u64;
        connection.receiving_files().insert(key, ReceivingFile::new(expected_length));
        self.ack_push(connection, request_id, Descriptor::File(file), now)
    }

    /// spec §4.6 `writeChunk` + ack (`OnPushFileChunkIQ`): advance the
    /// receiver's offset, persist the bytes, and report `nextChunkStart` so
    /// the sender knows where to resume. Out-of-order chunks and chunks for
    /// a file with no known `receivingFiles` entry are protocol violations
    /// (spec §7): drop silently, log, leave the connection open.
    fn handle_push_file_chunk(
        &self,
        connection: &mut ConversationConnection,
        request_id: i64,
        push: PushFileChunkIQ,
        now: i64,
    ) -> ConvResult<()> {
        let key = file_key(push.descriptor_id);
        let next_chunk_start = {
            let Some(file) = connection.receiving_files().get_mut(&key) else {
                warn!(descriptor_id = ?push.descriptor_id, "file chunk for unknown receiving file; dropping");
                return Ok(());
            };
            match file.accept_chunk(push.chunk_start, push.chunk.as_deref()) {
                Ok(offset) => offset,
                Err(e) => {
                    warn!(error = %e, descriptor_id = ?push.descriptor_id, "out-of-order file chunk; dropping");
                    return Ok(());
                }
            }
        };

        if let Some(bytes) = push.chunk.as_deref() {
            self.listener.on_receive_file_chunk(push.descriptor_id, push.chunk_start, bytes);
        }
        let complete = connection.receiving_files().get(&key).map(|f| f.is_complete()).unwrap_or(false);
        if complete {
            connection.receiving_files().remove(&key);
        }

        let ack = OnPushFileChunkIQ {
            device_state: connection.device_state,
            received_timestamp: now,
            sender_timestamp: push.timestamp,
            next_chunk_start,
        };
        let frame = encode_frame(self.framing(connection), request_id, &ack);
        connection.transport().send_packet(
            connection.peer_connection_id().unwrap_or_default(),
            "on_push_file_chunk_ack",
            frame,
        )
    }

    fn handle_update_geolocation(
        &self,
        connection: &mut ConversationConnection,
        request_id: i64,
        geolocation: crate::descriptor::GeolocationDescriptor,
        now: i64,
    ) -> ConvResult<()> {
        // spec §4.4: "if no geolocation descriptor has ever been received
        // from this peer, the ack carries receivedTimestamp = -1".
        let received_timestamp = if connection.peer_geolocation().is_none() {
            -1
        } else {
            now
        };
        if received_timestamp != -1 {
            connection.set_peer_geolocation(geolocation.clone());
        }
        self.listener.on_pop_descriptor(Descriptor::Geolocation(geolocation));
        let ack = OnPushIQ {
            device_state: connection.device_state,
            received_timestamp,
        };
        self.send_generic_ack(connection, request_id, ack)
    }

    fn handle_update_timestamp(&self, update: UpdateTimestampIQ) -> ConvResult<()> {
        match update.kind {
            UpdateTimestampType::Read => self.listener.on_read_descriptor(update.descriptor_id, update.timestamp),
            UpdateTimestampType::Delete => self.listener.on_delete_descriptor(update.descriptor_id, update.timestamp),
            // spec §4.4: "PEER_DELETE -> no local action (peer-side
            // tombstone only)".
            UpdateTimestampType::PeerDelete => {}
        }
        Ok(())
    }

    fn handle_synchronize(&self, connection: &mut ConversationConnection, request_id: i64, request: SynchronizeIQ, now: i64) -> ConvResult<()> {
        // spec §4.3: "the peer records peerTime on receipt and returns it" —
        // `timestamp` is B's own wallclock at receipt, `sender_timestamp`
        // echoes A's original start time so A can compute the round trip.
        let ack = OnSynchronizeIQ {
            timestamp: now,
            sender_timestamp: request.timestamp,
        };
        let frame = encode_frame(self.framing(connection), request_id, &ack);
        connection.transport().send_packet(
            connection.peer_connection_id().unwrap_or_default(),
            "synchronize_ack",
            frame,
        )
    }

    /// spec §4.4: "For every OnPushIQ received ... the handler removes the
    /// corresponding entry from the in-flight table and - if present and not
    /// already marked - stamps its receivedTimestamp with the value from the
    /// IQ."
    fn clear_in_flight(&self, connection: &mut ConversationConnection, request_id: i64, received_timestamp: Option<i64>) {
        if let Some(mut descriptor) = connection.take_in_flight(request_id) {
            if let Some(ts) = received_timestamp {
                if descriptor.header().received_timestamp == 0 {
                    descriptor.header_mut().received_timestamp = ts;
                }
            }
        } else {
            debug!(request_id, "ack for unknown requestId; already removed or never sent");
        }
    }

    fn send_generic_ack(&self, connection: &mut ConversationConnection, request_id: i64, ack: OnPushIQ) -> ConvResult<()> {
        let frame = encode_frame(self.framing(connection), request_id, &AckFrame(ack));
        connection.transport().send_packet(connection.peer_connection_id().unwrap_or_default(), "on_push_ack", frame)
    }

    fn framing(&self, connection: &ConversationConnection) -> FramingVariant {
        connection.framing_variant()
    }
}

/// Adapter so a bare [`OnPushIQ`] (no typed-alias schema id attached) can
/// still be framed via [`encode_frame`] using the base schema, for callers
/// that haven't picked a specific typed alias.
struct AckFrame(OnPushIQ);

impl IqMessage for AckFrame {
    const SCHEMA_ID: uuid::Uuid = uuid::Uuid::from_u128(0x6f6e_7075_7368_0000_0000_000000000000);
    const SCHEMA_VERSION: i32 = 0;

    fn encode_body(&self, enc: &mut crate::codec::Encoder) {
        enc.write_int(self.0.device_state.bits() as i32);
        enc.write_long(self.0.received_timestamp);
    }

    fn decode_body(dec: &mut Decoder) -> ConvResult<Self> {
        Ok(Self(OnPushIQ {
            device_state: DeviceState::from_bits_truncate(dec.read_int()? as u32),
            received_timestamp: dec.read_long()?,
        }))
    }
}

