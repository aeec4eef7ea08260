//! External collaborator contracts (spec §6): the transport, storage and
//! crypto layers this crate treats as injected dependencies rather than
//! owning. Constructors of [`crate::connection::ConversationConnection`] and
//! [`crate::connection::ConversationHandler`] take these explicitly (spec §9
//! "Background services / global state ... in the rewrite they must be
//! passed explicitly into constructors").

use bytes::Bytes;
use uuid::Uuid;

use crate::error::ConvResult;

/// Counter hook passed to `incrementStat` (spec §6); kept abstract since the
/// concrete stat taxonomy lives with the transport implementation.
pub type StatType = &'static str;

/// Expected from the external data-channel layer (spec §6 "Transport
/// contract").
pub trait Transport: Send + Sync {
    /// Enqueues a framed, serialised IQ. MUST be non-blocking.
    fn send_packet(&self, peer_connection_id: Uuid, stat_type: StatType, frame: Bytes) -> ConvResult<()>;

    /// Enqueues already-serialised bytes.
    fn send_message(&self, peer_connection_id: Uuid, stat_type: StatType, bytes: Bytes) -> ConvResult<()>;

    fn increment_stat(&self, peer_connection_id: Uuid, stat_type: StatType);
}

/// Observer callbacks the transport drives into the handler (spec §6). The
/// handler is the sole consumer, per spec.
pub trait TransportObserver: Send + Sync {
    fn on_data_channel_open(&self, peer_connection_id: Uuid, peer_version: Option<(u32, u32)>, leading_padding: bool);
    fn on_data_channel_message(&self, peer_connection_id: Uuid, buffer: Bytes, leading_padding: bool);
    fn on_data_channel_closed(&self, peer_connection_id: Uuid);
}

/// spec §6 "Storage contract": load descriptor by local id; persist
/// descriptor timestamp fields; load/save annotations; load operations and
/// their blobs; delete operation rows.
pub trait Storage: Send + Sync {
    fn load_descriptor(&self, local_database_id: i64) -> ConvResult<Option<crate::descriptor::Descriptor>>;
    fn persist_descriptor_timestamps(&self, descriptor: &crate::descriptor::Descriptor) -> ConvResult<()>;
    fn load_annotations(&self, descriptor_id: crate::descriptor::DescriptorId) -> ConvResult<Vec<u8>>;
    fn save_annotations(&self, descriptor_id: crate::descriptor::DescriptorId, blob: &[u8]) -> ConvResult<()>;
    fn load_operations(&self, conversation_id: Uuid) -> ConvResult<Vec<(i64, Vec<u8>)>>;
    fn delete_operation(&self, operation_id: i64) -> ConvResult<()>;
}

/// spec §6 "Crypto contract": `SignatureInfo { twincodeOutboundId,
/// publicKey, secret, salt?, signature? }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureInfo {
    pub twincode_outbound_id: Uuid,
    pub public_key: Vec<u8>,
    pub secret: Vec<u8>,
    pub salt: Option<Vec<u8>>,
    pub signature: Option<Vec<u8>>,
}

pub trait Crypto: Send + Sync {
    /// Produces signature material for the given group twincode id; may
    /// return `None` if no key material is available for it.
    fn produce_signature(&self, group_twincode_id: Uuid) -> ConvResult<Option<SignatureInfo>>;

    /// Verifies signature material received in a group IQ.
    fn verify_signature(&self, info: &SignatureInfo) -> ConvResult<bool>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod mock {
    //! In-memory stand-ins for the external contracts, for use by this
    //! crate's own tests (spec §9 "Background services ... passed
    //! explicitly into constructors" makes these injectable rather than
    //! singletons, which is exactly what makes them mockable).

    use std::sync::Mutex;

    use super::*;
    use crate::descriptor::{Descriptor, DescriptorId};

    #[derive(Default)]
    pub struct MockTransport {
        pub sent_packets: Mutex<Vec<(Uuid, StatType, Bytes)>>,
        pub sent_messages: Mutex<Vec<(Uuid, StatType, Bytes)>>,
        pub fail_send: Mutex<bool>,
    }

    impl Transport for MockTransport {
        fn send_packet(&self, peer_connection_id: Uuid, stat_type: StatType, frame: Bytes) -> ConvResult<()> {
            if *self.fail_send.lock().unwrap() {
                return Err(crate::error::ConvError::TransientTransportFailure);
            }
            self.sent_packets
                .lock()
                .unwrap()
                .push((peer_connection_id, stat_type, frame));
            Ok(())
        }

        fn send_message(&self, peer_connection_id: Uuid, stat_type: StatType, bytes: Bytes) -> ConvResult<()> {
            if *self.fail_send.lock().unwrap() {
                return Err(crate::error::ConvError::TransientTransportFailure);
            }
            self.sent_messages
                .lock()
                .unwrap()
                .push((peer_connection_id, stat_type, bytes));
            Ok(())
        }

        fn increment_stat(&self, _peer_connection_id: Uuid, _stat_type: StatType) {}
    }

    #[derive(Default)]
    pub struct MockStorage {
        pub descriptors: Mutex<std::collections::HashMap<i64, Descriptor>>,
    }

    impl Storage for MockStorage {
        fn load_descriptor(&self, local_database_id: i64) -> ConvResult<Option<Descriptor>> {
            Ok(self.descriptors.lock().unwrap().get(&local_database_id).cloned())
        }

        fn persist_descriptor_timestamps(&self, descriptor: &Descriptor) -> ConvResult<()> {
            if let Some(id) = descriptor.descriptor_id().local_database_id {
                self.descriptors.lock().unwrap().insert(id, descriptor.clone());
            }
            Ok(())
        }

        fn load_annotations(&self, _descriptor_id: DescriptorId) -> ConvResult<Vec<u8>> {
            Ok(Vec::new())
        }

        fn save_annotations(&self, _descriptor_id: DescriptorId, _blob: &[u8]) -> ConvResult<()> {
            Ok(())
        }

        fn load_operations(&self, _conversation_id: Uuid) -> ConvResult<Vec<(i64, Vec<u8>)>> {
            Ok(Vec::new())
        }

        fn delete_operation(&self, _operation_id: i64) -> ConvResult<()> {
            Ok(())
        }
    }

    pub struct MockCrypto {
        pub signature: Option<SignatureInfo>,
    }

    impl Crypto for MockCrypto {
        fn produce_signature(&self, _group_twincode_id: Uuid) -> ConvResult<Option<SignatureInfo>> {
            Ok(self.signature.clone())
        }

        fn verify_signature(&self, _info: &SignatureInfo) -> ConvResult<bool> {
            Ok(true)
        }
    }
}
