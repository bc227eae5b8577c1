pub mod rpc_request;

pub use rpc_request::{RpcEnvelope, body_rejection};
