//! Client side of the RPC bridge, as used by the desktop shell.

pub mod discovery;
pub mod rpc_client;

pub use discovery::{BackendLauncher, BackendLocator, connect_or_spawn};
pub use rpc_client::RpcClient;
