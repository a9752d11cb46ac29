//! Live network transport.
//!
//! # Module Structure
//!
//! - `client` - hyper-based transport with a pooled HTTPS-capable client
//! - `tls` - crypto provider setup and the skip-verify certificate verifier

mod client;
mod tls;

pub use client::{HttpClient, HyperTransport};
pub use tls::{install_crypto_provider, AcceptAnyServerCert};

use crate::error::Result;
use crate::message::{Request, Response};
use async_trait::async_trait;

/// Sends a request to the real network.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &Request) -> Result<Response>;
}
