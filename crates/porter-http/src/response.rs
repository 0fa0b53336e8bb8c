//! Normalized HTTP responses.

use crate::classify::classify;
use crate::error::{Failure, FetchError, TransportError};
use crate::raw::{RawBody, RawResponse};
use bytes::{Bytes, BytesMut};
use futures_util::future::BoxFuture;
use futures_util::{FutureExt, StreamExt};
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

/// A server response, with the redirect chain that led to it.
///
/// Header names are stored lowercased; lookups normalize the queried name the
/// same way. Values keep the order they were received in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status_code: u16,
    reason_phrase: String,
    protocol_version: String,
    headers: BTreeMap<String, Vec<String>>,
    body: Bytes,
    previous: Option<Box<Response>>,
}

impl Response {
    /// Status code.
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Reason phrase.
    ///
    /// Responses read by [`ReqwestTransport`](crate::ReqwestTransport) carry
    /// the canonical phrase for the status code rather than the text the
    /// server sent, so non-standard codes such as 599 have an empty phrase.
    pub fn reason_phrase(&self) -> &str {
        &self.reason_phrase
    }

    /// Protocol version, such as `1.1` or `2`.
    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }

    /// Headers keyed by lowercase name.
    pub fn headers(&self) -> &BTreeMap<String, Vec<String>> {
        &self.headers
    }

    /// Whether the named header is present, ignoring case.
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(&normalize_header_name(name))
    }

    /// Every value of the named header, or an empty slice.
    pub fn header(&self, name: &str) -> &[String] {
        self.headers
            .get(&normalize_header_name(name))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Buffered body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ResponseError> {
        serde_json::from_slice(&self.body).map_err(|e| ResponseError::Parse {
            status: self.status_code,
            body: self.text().into_owned(),
            source: e,
        })
    }

    /// The response that redirected to this one.
    pub fn previous(&self) -> Option<&Response> {
        self.previous.as_deref()
    }

    /// This response followed by every earlier response in the chain.
    pub fn history(&self) -> impl Iterator<Item = &Response> {
        std::iter::successors(Some(self), |response| response.previous())
    }

    /// Number of redirect hops before this response.
    pub fn redirect_count(&self) -> usize {
        self.history().count() - 1
    }

    /// Whether the status is inside the accepted `200..400` range.
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status_code)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

fn normalize_header_name(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// Response parsing errors.
#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    #[error("failed to parse JSON (status {status}): {source}")]
    Parse {
        status: u16,
        body: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Converts raw transport responses into [`Response`]s and applies the
/// status code policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseBuilder {
    return_error_responses: bool,
}

impl ResponseBuilder {
    /// Builder that fails on out-of-range statuses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return out-of-range statuses as normal responses instead of failing.
    pub fn return_error_responses(mut self, return_error_responses: bool) -> Self {
        self.return_error_responses = return_error_responses;
        self
    }

    /// Normalize `raw` and its redirect chain, then apply the status policy.
    pub async fn build(&self, raw: RawResponse) -> Result<Response, FetchError> {
        let response = Self::normalize(raw).await.map_err(classify)?;
        self.apply_status_policy(response)
    }

    /// Buffer the body and convert the whole chain, oldest response last.
    pub fn normalize(raw: RawResponse) -> BoxFuture<'static, Result<Response, TransportError>> {
        async move {
            let RawResponse {
                status,
                reason,
                version,
                headers: raw_headers,
                body,
                previous,
            } = raw;

            let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for (name, value) in raw_headers {
                headers
                    .entry(normalize_header_name(&name))
                    .or_default()
                    .push(value);
            }

            let body = buffer_body(body).await?;

            let previous = match previous {
                Some(previous) => Some(Box::new(Self::normalize(*previous).await?)),
                None => None,
            };

            Ok(Response {
                status_code: status,
                reason_phrase: reason,
                protocol_version: version,
                headers,
                body,
                previous,
            })
        }
        .boxed()
    }

    /// Fail with a server status error unless the status is accepted.
    pub fn apply_status_policy(&self, response: Response) -> Result<Response, FetchError> {
        if self.return_error_responses || response.is_success() {
            return Ok(response);
        }

        // TODO: truncate very large bodies in the message.
        let message = format!(
            "HTTP server responded with error: {} \"{}\".\n\n{}",
            response.status_code(),
            response.reason_phrase(),
            response
        );

        Err(FetchError::Fatal(Failure::server_status(message, response)))
    }
}

async fn buffer_body(body: RawBody) -> Result<Bytes, TransportError> {
    match body {
        RawBody::Buffered(bytes) => Ok(bytes),
        RawBody::Unavailable => Ok(Bytes::new()),
        RawBody::Stream(mut stream) => {
            let mut buffer = BytesMut::new();
            while let Some(chunk) = stream.next().await {
                buffer.extend_from_slice(&chunk?);
            }
            Ok(buffer.freeze())
        }
    }
}
