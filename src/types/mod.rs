pub mod node_ref;
pub mod rpc;

pub use node_ref::{NodeRef, node_id};
pub use rpc::{Empty, HealthResponse, RpcRequest, decode_params};
