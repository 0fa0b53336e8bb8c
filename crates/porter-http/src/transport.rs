//! The transport seam.
//!
//! A [`Transport`] performs one network transfer, following redirects up to
//! the requested limit, and reports failures using the closed
//! [`FailureKind`](crate::FailureKind) taxonomy. Connection pooling, TLS and
//! DNS live behind this trait.

use crate::error::TransportError;
use crate::raw::RawResponse;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::cookie::CookieStore;
use std::fmt;
use std::time::Duration;

/// A fully resolved request handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    /// Absolute target URL.
    pub url: String,
    /// HTTP method.
    pub method: String,
    /// Header lines in transmission order.
    pub headers: Vec<(String, String)>,
    /// Request body, replayed on 307 and 308 redirects.
    pub body: Option<Bytes>,
    /// Bound on the whole transfer including redirect hops.
    pub transfer_timeout: Option<Duration>,
    /// Redirects to follow; `0` disables following.
    pub max_redirects: u32,
    /// Maximum response body length; `None` is unlimited.
    pub max_body_length: Option<u64>,
}

/// Performs network transfers.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Execute `request`, reading and storing cookies through `cookies`.
    ///
    /// On success the returned response carries the chain of redirect
    /// responses that preceded it.
    async fn execute(
        &self,
        request: TransportRequest,
        cookies: &dyn CookieStore,
    ) -> Result<RawResponse, TransportError>;
}
