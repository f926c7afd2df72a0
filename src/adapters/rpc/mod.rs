//! JSON-RPC transport and the fleet-control adapter built on it.

pub mod client;
pub mod fleet;

pub use client::{RpcClient, RpcError};
pub use fleet::RpcFleetControl;
