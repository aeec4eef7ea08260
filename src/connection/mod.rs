//! `ConversationConnection` (spec §3, §4.3): the per-(conversation, peer)
//! state machine — version negotiation, clock-skew correction, adaptive
//! chunking and resource lifecycle.

pub mod file_transfer;
pub mod handler;

pub use file_transfer::{file_key, FileTransferError, ReceivingFile, SendingFile};
pub use handler::ConversationHandler;

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::codec::FramingVariant;
use crate::config::EngineConfig;
use crate::descriptor::{Descriptor, TimestampKind};
use crate::error::{ConvError, ConvResult};
use crate::external::{Storage, Transport};
pub use crate::iq::DeviceState;

/// Per-direction connection state (spec §4.3 "States are kept per
/// direction").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Creating,
    Opening,
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// Outcome of an admission decision for an incoming offer (spec §4.3
/// "Admission").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    Rejected,
    /// `openTimeout` already pending; caller may retry.
    Unknown,
}

/// Pending clock-skew negotiation state, started when a `SynchronizeIQ` is
/// sent (spec §4.3 "Clock skew correction").
#[derive(Debug, Clone, Copy)]
pub struct PendingSynchronize {
    pub start_time: i64,
}

/// Per (local conversation, remote peer) connection (spec §3
/// "ConversationConnection").
pub struct ConversationConnection {
    pub conversation_id: Uuid,
    config: EngineConfig,
    transport: Arc<dyn Transport>,

    incoming_state: ConnectionState,
    outgoing_state: ConnectionState,
    incoming_peer_connection_id: Option<Uuid>,
    outgoing_peer_connection_id: Option<Uuid>,

    pub peer_major_version: u32,
    pub peer_minor_version: u32,
    pub peer_time_correction: i64,
    pub estimated_rtt_ms: i64,
    pub leading_padding: bool,
    pub device_state: DeviceState,
    pub peer_device_state: DeviceState,

    in_flight: HashMap<i64, Descriptor>,
    next_request_id: i64,

    sending_files: HashMap<String, SendingFile>,
    receiving_files: HashMap<String, ReceivingFile>,

    open_timeout_pending: bool,
    pending_synchronize: Option<PendingSynchronize>,
    accessed_time_ms: i64,

    /// Last geolocation received from this peer, if any (spec §4.4
    /// "UpdateGeolocationIQ, if no geolocation descriptor has ever been
    /// received from this peer, the ack carries receivedTimestamp = -1").
    peer_geolocation: Option<crate::descriptor::GeolocationDescriptor>,
}

impl ConversationConnection {
    pub fn new(conversation_id: Uuid, config: EngineConfig, transport: Arc<dyn Transport>, now: i64) -> Self {
        Self {
            conversation_id,
            config,
            transport,
            incoming_state: ConnectionState::Closed,
            outgoing_state: ConnectionState::Closed,
            incoming_peer_connection_id: None,
            outgoing_peer_connection_id: None,
            peer_major_version: 0,
            peer_minor_version: 0,
            peer_time_correction: 0,
            estimated_rtt_ms: 0,
            leading_padding: false,
            device_state: DeviceState::empty(),
            peer_device_state: DeviceState::empty(),
            in_flight: HashMap::new(),
            next_request_id: 1,
            sending_files: HashMap::new(),
            receiving_files: HashMap::new(),
            open_timeout_pending: false,
            pending_synchronize: None,
            accessed_time_ms: now,
            peer_geolocation: None,
        }
    }

    pub fn peer_geolocation(&self) -> Option<&crate::descriptor::GeolocationDescriptor> {
        self.peer_geolocation.as_ref()
    }

    pub fn set_peer_geolocation(&mut self, geolocation: crate::descriptor::GeolocationDescriptor) {
        self.peer_geolocation = Some(geolocation);
    }

    pub fn clear_peer_geolocation_if_matches(&mut self, descriptor_id: crate::descriptor::DescriptorId) {
        if self
            .peer_geolocation
            .as_ref()
            .is_some_and(|g| g.header.descriptor_id == descriptor_id)
        {
            self.peer_geolocation = None;
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// The framing variant this connection's frames must use (spec §4.1,
    /// §6 item 1): padded with the configured prefix length, or compact.
    pub fn framing_variant(&self) -> FramingVariant {
        if self.leading_padding {
            FramingVariant::Padded {
                padding_bytes: self.config.leading_padding_bytes,
            }
        } else {
            FramingVariant::Compact
        }
    }

    /// spec §4.5 "Check connection.preparePush(descriptor): returns false
    /// if deleted or expired; otherwise stamps the descriptor's
    /// sentTimestamp = now on first successful push and persists." Returns
    /// `false` without mutating anything once the descriptor is deleted or
    /// expired.
    pub fn prepare_push(&self, descriptor: &mut Descriptor, now: i64, storage: &dyn Storage) -> bool {
        let header = descriptor.header();
        if header.is_deleted() || header.is_expired(now) {
            return false;
        }
        if header.sent_timestamp == 0 {
            descriptor.header_mut().apply_timestamp(TimestampKind::Sent, now);
            let _ = storage.persist_descriptor_timestamps(descriptor);
        }
        true
    }

    // -- state machine (spec §4.3) -----------------------------------------

    fn state_mut(&mut self, direction: Direction) -> &mut ConnectionState {
        match direction {
            Direction::Incoming => &mut self.incoming_state,
            Direction::Outgoing => &mut self.outgoing_state,
        }
    }

    pub fn state(&self, direction: Direction) -> ConnectionState {
        match direction {
            Direction::Incoming => self.incoming_state,
            Direction::Outgoing => self.outgoing_state,
        }
    }

    /// Derived overall state (spec §4.3 "prefer the non-CLOSED side's
    /// state; if both non-CLOSED, prefer the incoming side").
    pub fn effective_state(&self) -> ConnectionState {
        match (self.incoming_state, self.outgoing_state) {
            (ConnectionState::Closed, other) => other,
            (incoming, _) => incoming,
        }
    }

    /// The side that actually opened, once one has (spec §3 "the *effective*
    /// peerConnectionId (whichever side opened)").
    pub fn peer_connection_id(&self) -> Option<Uuid> {
        if self.incoming_state == ConnectionState::Open {
            self.incoming_peer_connection_id
        } else if self.outgoing_state == ConnectionState::Open {
            self.outgoing_peer_connection_id
        } else {
            None
        }
    }

    /// spec §4.3 "Admission for an incoming offer: rejected if either
    /// direction is OPEN or CREATING. Otherwise, if openTimeout is null,
    /// transition incoming to CREATING and accept. If openTimeout is
    /// non-null, answer unknown."
    pub fn admit_incoming_offer(&mut self) -> Admission {
        if self.incoming_state == ConnectionState::Open
            || self.incoming_state == ConnectionState::Creating
            || self.outgoing_state == ConnectionState::Open
            || self.outgoing_state == ConnectionState::Creating
        {
            return Admission::Rejected;
        }
        if self.open_timeout_pending {
            return Admission::Unknown;
        }
        self.incoming_state = ConnectionState::Creating;
        self.open_timeout_pending = true;
        Admission::Accepted
    }

    /// spec §4.3 "Outgoing start permitted only if outgoing is CLOSED and
    /// incoming is either CLOSED or has no pending openTimeout."
    pub fn start_outgoing(&mut self) -> bool {
        if self.outgoing_state != ConnectionState::Closed {
            return false;
        }
        if self.incoming_state != ConnectionState::Closed && self.open_timeout_pending {
            return false;
        }
        self.outgoing_state = ConnectionState::Creating;
        self.open_timeout_pending = true;
        true
    }

    /// spec §4.3 "CREATING -> transport returns a peerConnectionId ->
    /// OPENING: store peerConnectionId".
    pub fn transport_assigned_peer_connection(&mut self, direction: Direction, peer_connection_id: Uuid) -> ConvResult<()> {
        if *self.state_mut(direction) != ConnectionState::Creating {
            return Err(ConvError::InvalidTransition {
                from: format!("{:?}", self.state(direction)),
                event: "transport_assigned_peer_connection".to_string(),
            });
        }
        match direction {
            Direction::Incoming => self.incoming_peer_connection_id = Some(peer_connection_id),
            Direction::Outgoing => self.outgoing_peer_connection_id = Some(peer_connection_id),
        }
        *self.state_mut(direction) = ConnectionState::Opening;
        Ok(())
    }

    /// spec §4.3 "OPENING -> transport reports data-channel open -> OPEN:
    /// clear openTimeout, set effective peerConnectionId, reset
    /// peerTimeCorrection and peerDeviceState, touch()."
    pub fn data_channel_opened(&mut self, direction: Direction, now: i64) -> ConvResult<()> {
        if *self.state_mut(direction) != ConnectionState::Opening {
            return Err(ConvError::InvalidTransition {
                from: format!("{:?}", self.state(direction)),
                event: "data_channel_opened".to_string(),
            });
        }
        *self.state_mut(direction) = ConnectionState::Open;
        self.open_timeout_pending = false;
        self.peer_time_correction = 0;
        self.peer_device_state = DeviceState::empty();
        self.touch(now);
        Ok(())
    }

    /// spec §4.3 "any -> explicit close or transport failure -> CLOSED:
    /// cancel openTimeout; if both sides CLOSED, cancel in-flight file
    /// transfers and notify the conversation."
    pub fn close(&mut self, direction: Direction) -> bool {
        *self.state_mut(direction) = ConnectionState::Closed;
        match direction {
            Direction::Incoming => self.incoming_peer_connection_id = None,
            Direction::Outgoing => self.outgoing_peer_connection_id = None,
        }
        self.open_timeout_pending = false;
        let both_closed = self.incoming_state == ConnectionState::Closed && self.outgoing_state == ConnectionState::Closed;
        if both_closed {
            self.sending_files.clear();
            self.receiving_files.clear();
        }
        both_closed
    }

    // -- version gating (spec §4.3 "Version gating") ------------------------

    pub fn is_supported(&self, major: u32, minor: u32) -> bool {
        self.peer_major_version > major || (self.peer_major_version == major && self.peer_minor_version >= minor)
    }

    /// Caps the version this side would *send* against, applying the
    /// documented workaround for `major=2, minor in [13,15]`.
    pub fn negotiate_response_version(&self) -> (u32, u32) {
        let cap = &self.config.version;
        let mut major = self.peer_major_version.min(cap.max_major);
        let mut minor = if major == cap.max_major {
            self.peer_minor_version.min(cap.max_minor)
        } else {
            self.peer_minor_version
        };
        if major == 2 && (13..=15).contains(&minor) {
            minor = 12;
        }
        if major == 0 && minor == 0 {
            major = 0;
        }
        (major, minor)
    }

    // -- clock skew correction (spec §4.3) -----------------------------------

    pub fn begin_synchronize(&mut self, start_time: i64) {
        self.pending_synchronize = Some(PendingSynchronize { start_time });
    }

    /// `tp = now - startTime`; discard if `tp < 0 || tp > 60_000`; `tc =
    /// peerTime - (startTime + tp/2)`; clamp `|tc| <= max_correction_ms`;
    /// store `peerTimeCorrection = -tc` and `estimatedRTT = tp`.
    pub fn adjust_peer_time(&mut self, peer_time: i64, now: i64) -> ConvResult<()> {
        let pending = self
            .pending_synchronize
            .take()
            .ok_or_else(|| ConvError::ProtocolViolation {
                reason: "adjust_peer_time with no pending SynchronizeIQ".to_string(),
            })?;
        let tp = now - pending.start_time;
        if tp < 0 || tp > self.config.clock_skew.max_round_trip_ms {
            return Err(ConvError::ProtocolViolation {
                reason: format!("synchronize round trip {tp}ms out of range"),
            });
        }
        let tc = peer_time - (pending.start_time + tp / 2);
        let clamped = tc.clamp(-self.config.clock_skew.max_correction_ms, self.config.clock_skew.max_correction_ms);
        self.peer_time_correction = -clamped;
        self.estimated_rtt_ms = tp;
        Ok(())
    }

    /// Reads a peer-originated timestamp adjusted by the stored correction
    /// (spec §4.3 "Subsequent timestamps received from the peer are read as
    /// peer_ts + peerTimeCorrection").
    pub fn adjusted_peer_timestamp(&self, peer_ts: i64) -> i64 {
        peer_ts + self.peer_time_correction
    }

    // -- adaptive chunk size (spec §4.3) -------------------------------------

    pub fn best_chunk_size(&self) -> usize {
        let c = &self.config.chunking;
        if self.estimated_rtt_ms <= c.small_threshold_ms as i64 {
            c.small_bytes
        } else if self.estimated_rtt_ms <= c.medium_threshold_ms as i64 {
            c.medium_bytes
        } else {
            c.large_bytes
        }
    }

    /// spec §4.3 "Updated on every inbound chunk-ack via estimatedRTT =
    /// (estimatedRTT + newMeasurement)/2, ignoring measurements < 0 or >
    /// 60_000."
    pub fn record_rtt_measurement(&mut self, measurement_ms: i64) {
        if measurement_ms < 0 || measurement_ms > 60_000 {
            return;
        }
        self.estimated_rtt_ms = (self.estimated_rtt_ms + measurement_ms) / 2;
    }

    // -- in-flight request table (spec §3, §9 "Request/ack correlation") ----

    pub fn allocate_request_id(&mut self) -> i64 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    pub fn register_in_flight(&mut self, request_id: i64, descriptor: Descriptor) {
        self.in_flight.insert(request_id, descriptor);
    }

    pub fn take_in_flight(&mut self, request_id: i64) -> Option<Descriptor> {
        self.in_flight.remove(&request_id)
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    // -- file transfer tables -------------------------------------------------

    pub fn sending_files(&mut self) -> &mut HashMap<String, SendingFile> {
        &mut self.sending_files
    }

    pub fn receiving_files(&mut self) -> &mut HashMap<String, ReceivingFile> {
        &mut self.receiving_files
    }

    // -- idle detection -------------------------------------------------------

    pub fn touch(&mut self, now: i64) {
        self.accessed_time_ms = now;
    }

    pub fn is_idle(&self, now: i64) -> bool {
        now - self.accessed_time_ms > self.config.idle_timeout_ms as i64
    }

    /// Transfers all state from `self` into a fresh incoming connection,
    /// closing `self` atomically afterwards (spec §4.3 "Peer state
    /// transfer", §9 "acquire both source and destination locks in a fixed
    /// order to avoid torn reads").
    ///
    /// Callers holding both connections under a single combined lock (e.g.
    /// two entries of the same `Mutex`-guarded registry) must acquire them
    /// in a fixed order — by `conversation_id`, then by whichever side is
    /// "source" — before calling this; this function itself only performs
    /// the field copy and the source close, it does not acquire locks.
    pub fn transfer_peer_connection(&mut self, destination: &mut ConversationConnection) {
        destination.incoming_state = self.incoming_state;
        destination.outgoing_state = self.outgoing_state;
        destination.incoming_peer_connection_id = self.incoming_peer_connection_id;
        destination.outgoing_peer_connection_id = self.outgoing_peer_connection_id;
        destination.peer_major_version = self.peer_major_version;
        destination.peer_minor_version = self.peer_minor_version;
        destination.peer_time_correction = self.peer_time_correction;
        destination.estimated_rtt_ms = self.estimated_rtt_ms;
        destination.leading_padding = self.leading_padding;
        destination.device_state = self.device_state;
        destination.peer_device_state = self.peer_device_state;
        destination.in_flight = std::mem::take(&mut self.in_flight);
        destination.next_request_id = self.next_request_id;
        destination.sending_files = std::mem::take(&mut self.sending_files);
        destination.receiving_files = std::mem::take(&mut self.receiving_files);
        destination.accessed_time_ms = self.accessed_time_ms;
        destination.peer_geolocation = self.peer_geolocation.take();

        self.incoming_state = ConnectionState::Closed;
        self.outgoing_state = ConnectionState::Closed;
        self.incoming_peer_connection_id = None;
        self.outgoing_peer_connection_id = None;
        self.open_timeout_pending = false;
    }
}
