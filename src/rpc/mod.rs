//! Named-method RPC surface shared by `/rpc` and the typed client.

pub mod alfresco_methods;
pub mod backend_methods;
pub mod registry;

pub use registry::MethodRegistry;
