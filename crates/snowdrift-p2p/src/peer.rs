use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered node in the simulated peer universe.
///
/// The id is the peer's identity across registrations; the address is the
/// `host:port` its query endpoint listens on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub id: Uuid,
    pub address: String,
}

impl Peer {
    pub fn new(address: String) -> Self {
        Peer {
            id: Uuid::new_v4(),
            address,
        }
    }
}
