//! Transport seam.
//!
//! The cache never talks HTTP itself; it hands an [`Endpoint`] to whatever
//! implements [`Transport`] and gets raw JSON or a [`TransportError`] back.
//! Timeouts are the transport's business.

use crate::endpoint::Endpoint;
use async_trait::async_trait;
use mapcache_core::TransportError;
use serde_json::Value;
use std::sync::Arc;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute one request and return the decoded JSON body.
    async fn execute(&self, endpoint: &Endpoint) -> Result<Value, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(&self, endpoint: &Endpoint) -> Result<Value, TransportError> {
        (**self).execute(endpoint).await
    }
}
