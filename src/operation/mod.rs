//! The Operation model (spec §3 "Operation", §4.5 "Operation execution"):
//! durable, replayable units of work that drive what gets sent over an open
//! `ConversationConnection`.

mod execute;
mod persist;

pub use execute::ExecutionContext;
pub use persist::{decode_operation_blob, encode_operation_blob};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::descriptor::{Descriptor, DescriptorId};
use crate::error::ErrorCode;

/// spec §3 "Types: SYNCHRONIZE_CONVERSATION, PUSH_OBJECT, PUSH_FILE, ...".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationType {
    SynchronizeConversation,
    PushObject,
    PushFile,
    PushGeolocation,
    PushTwincode,
    PushTransientObject,
    PushCommand,
    PushInvitation,
    JoinGroup,
    InvokeJoinGroup,
    InvokeAddMember,
    UpdateDescriptorTimestamp,
    UpdateAnnotations,
    UpdateDescriptor,
    UpdatePermissions,
    ResetConversation,
}

/// A durable record of one pending send (spec §3 "Operation"). `payload` is
/// the operation-specific data that doesn't belong on the `Descriptor`
/// itself (e.g. the annotation map for `UpdateAnnotations`, the permissions
/// value for `UpdatePermissions`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub id: i64,
    pub operation_type: OperationType,
    pub conversation_id: Uuid,
    pub creation_date: i64,
    pub descriptor_id: Option<DescriptorId>,
    pub payload: Option<Vec<u8>>,
}

impl Operation {
    pub fn new(id: i64, operation_type: OperationType, conversation_id: Uuid, creation_date: i64) -> Self {
        Self {
            id,
            operation_type,
            conversation_id,
            creation_date,
            descriptor_id: None,
            payload: None,
        }
    }
}

/// Supplies an [`Operation`] with everything it needs to execute that isn't
/// already on the record itself (spec §4.5 "Load the target Descriptor ...
/// if not held in memory").
pub trait OperationStorage {
    fn load_descriptor(&self, id: DescriptorId) -> Option<Descriptor>;
}

/// Re-exported here so callers of `Operation::execute` don't need to reach
/// into `crate::error` separately.
pub type OperationResult = ErrorCode;
