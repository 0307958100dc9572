use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// One slot in a node's local block sequence.
///
/// The value is the consensus payload and the only field that changes
/// after creation; each finalized round for this slot's index rewrites it.
/// Peers never see the block itself, only byte-copies of the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub value: Vec<u8>,
    /// Opaque content tag assigned at creation, informational only.
    pub hash: String,
    /// Unix seconds at creation.
    pub created_at: u64,
}

impl Block {
    pub fn new(value: Vec<u8>) -> Self {
        let hash = hex::encode(&value);
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        Block {
            value,
            hash,
            created_at,
        }
    }
}
