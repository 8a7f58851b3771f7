//! Transport abstraction for the remote protocol.
//!
//! The transport delivers an already-signed request and returns the remote's
//! response. Implementations may use HTTP or anything else; the signature
//! covers the URL exactly as built, so transports must not rewrite it.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use vaultsync_auth::SignedRequest;

use crate::error::Result;

/// A remote response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Bytes,
}

impl Response {
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    /// Error response with a plain-text message body.
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: Bytes::from(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, for error reporting.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Transport trait for delivering signed requests.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and wait for the response.
    ///
    /// Errors are for delivery failures only; remote errors come back as
    /// non-success responses.
    async fn round_trip(&self, request: SignedRequest) -> Result<Response>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn round_trip(&self, request: SignedRequest) -> Result<Response> {
        (**self).round_trip(request).await
    }
}

/// A simple in-memory transport for testing.
///
/// Routes requests straight into a [`VaultService`](crate::server::VaultService).
pub mod memory {
    use super::*;
    use crate::server::VaultService;

    /// In-memory transport implementation.
    #[derive(Debug, Clone)]
    pub struct MemoryTransport {
        service: Arc<VaultService>,
    }

    impl MemoryTransport {
        pub fn new(service: Arc<VaultService>) -> Self {
            Self { service }
        }

        /// The service requests are routed to.
        pub fn service(&self) -> &Arc<VaultService> {
            &self.service
        }
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn round_trip(&self, request: SignedRequest) -> Result<Response> {
            Ok(self.service.handle(&request).await)
        }
    }
}
