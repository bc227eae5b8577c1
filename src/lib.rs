pub mod alfresco;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod rpc;
pub mod runtime;
pub mod service;
pub mod types;

pub use error::DeskError;
pub use router::{DeskState, desk_router};
