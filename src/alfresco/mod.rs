//! Proxy to remote Alfresco repositories over the public REST API.

pub mod auth;
pub mod binary;
pub mod client;
pub mod endpoints;
pub mod methods;
pub mod proxy;

pub use binary::{DownloadKind, DownloadRequest, UploadFile, UploadKind};
pub use client::AlfrescoClient;
pub use methods::AlfrescoMethod;
pub use proxy::{AlfrescoProxy, Target};
