pub mod binary;
pub mod health;
pub mod oidc;
pub mod rpc;
pub mod stream;
