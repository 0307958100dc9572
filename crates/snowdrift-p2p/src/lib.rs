//! Snowdrift P2P - HTTP registry and peer transport
//!
//! This crate provides the transport layer of the simulation: a central
//! peer registry with health checking, and the per-node client that serves
//! inbound value queries and issues outbound point reads.

pub mod client;
pub mod error;
pub mod peer;
pub mod registry;
pub mod wire;

pub use client::{Client, ClientConfig, ValueSource};
pub use error::{P2pError, QueryError};
pub use peer::Peer;
pub use registry::Registry;
pub use wire::{PeerListResponse, RegisterRequest, RegisterResponse, ValueQuery, ValueResponse};
