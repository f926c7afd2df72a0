//! Adapters: concrete implementations of the domain ports.

pub mod extractor;
pub mod process_worker;
pub mod remote_worker;
pub mod rpc;

pub use extractor::RegexResultExtractor;
pub use process_worker::ProcessWorker;
pub use remote_worker::RemoteWorker;
pub use rpc::{RpcClient, RpcError, RpcFleetControl};
