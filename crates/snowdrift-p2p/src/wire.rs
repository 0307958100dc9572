use serde::{Deserialize, Serialize};

use crate::peer::Peer;

/// Point read of another node's current value at one block index.
///
/// The index is signed on the wire so an out-of-range query (including a
/// negative one) reaches the responder and is rejected there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueQuery {
    pub index: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueResponse {
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub peer: Peer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub peers: Vec<Peer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerListResponse {
    pub peers: Vec<Peer>,
}
