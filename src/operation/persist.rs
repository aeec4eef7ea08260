//! Operation persistence (spec §6 "Each Operation serialises to an opaque
//! byte blob with its own tiny prefix: a schemaVersion int followed by the
//! operation-specific fields"). Distinct from the manual IQ wire codec in
//! [`crate::codec`]: this is a local storage-layer blob, never sent to a
//! peer, so it uses `bincode` + `serde` rather than hand-rolled framing.

use serde::{Deserialize, Serialize};

use crate::error::{ConvError, ConvResult};

use super::Operation;

const OPERATION_BLOB_SCHEMA_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct OperationBlob {
    schema_version: u32,
    operation: Operation,
}

/// Serialises an [`Operation`] to its storage blob.
pub fn encode_operation_blob(operation: &Operation) -> ConvResult<Vec<u8>> {
    let blob = OperationBlob {
        schema_version: OPERATION_BLOB_SCHEMA_VERSION,
        operation: operation.clone(),
    };
    bincode::serde::encode_to_vec(&blob, bincode::config::standard()).map_err(|e| ConvError::Storage(e.to_string()))
}

/// Re-hydrates an [`Operation`] from a storage blob (spec §6 "this layer only
/// contracts that re-hydration from the blob produces an operation
/// semantically equivalent to the original").
pub fn decode_operation_blob(bytes: &[u8]) -> ConvResult<Operation> {
    let (blob, _): (OperationBlob, usize) =
        bincode::serde::decode_from_slice(bytes, bincode::config::standard()).map_err(|e| ConvError::Storage(e.to_string()))?;
    if blob.schema_version != OPERATION_BLOB_SCHEMA_VERSION {
        return Err(ConvError::Storage(format!(
            "unsupported operation blob schema version {}",
            blob.schema_version
        )));
    }
    Ok(blob.operation)
}
