//! Raw transport responses.

use crate::error::TransportError;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use std::fmt;

/// Body of a raw response as handed over by a transport.
pub enum RawBody {
    /// Fully buffered content.
    Buffered(Bytes),
    /// Content still to be read from the transport.
    Stream(BoxStream<'static, Result<Bytes, TransportError>>),
    /// The body cannot be read, or was already released.
    Unavailable,
}

impl fmt::Debug for RawBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buffered(bytes) => f.debug_tuple("Buffered").field(&bytes.len()).finish(),
            Self::Stream(_) => f.write_str("Stream"),
            Self::Unavailable => f.write_str("Unavailable"),
        }
    }
}

/// A response as produced by a transport, before normalization.
///
/// When the transport followed redirects, `previous` points at the response
/// that triggered the last hop.
#[derive(Debug)]
pub struct RawResponse {
    /// Status code.
    pub status: u16,
    /// Reason phrase.
    pub reason: String,
    /// Protocol version without the `HTTP/` prefix, e.g. `1.1`.
    pub version: String,
    /// Header lines in the order received.
    pub headers: Vec<(String, String)>,
    /// Body, possibly unread.
    pub body: RawBody,
    /// Response that redirected to this one.
    pub previous: Option<Box<RawResponse>>,
}

impl RawResponse {
    /// Create an HTTP/1.1 response with an empty body.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            reason: String::new(),
            version: "1.1".to_string(),
            headers: Vec::new(),
            body: RawBody::Buffered(Bytes::new()),
            previous: None,
        }
    }

    /// Set the reason phrase.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Set the protocol version, such as `1.1` or `2`.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Append a header line.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set a buffered body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = RawBody::Buffered(body.into());
        self
    }

    /// Set the body in any state.
    pub fn with_raw_body(mut self, body: RawBody) -> Self {
        self.body = body;
        self
    }

    /// Link the response that redirected to this one.
    pub fn with_previous(mut self, previous: RawResponse) -> Self {
        self.previous = Some(Box::new(previous));
        self
    }

    /// Parse a flat list of header lines that may span several responses.
    ///
    /// Stream wrappers and CGI-style transports report every response of a
    /// redirect chain as one list, each block opened by an
    /// `HTTP/x.y code reason` status line. The last block becomes the
    /// returned response and receives `body`; earlier blocks are linked
    /// through `previous` with unavailable bodies.
    pub fn from_header_lines<S: AsRef<str>>(
        lines: &[S],
        body: Option<Bytes>,
    ) -> Result<Self, TransportError> {
        let lines: Vec<&str> = lines
            .iter()
            .map(|line| line.as_ref().trim_end_matches(['\r', '\n']))
            .filter(|line| !line.trim().is_empty())
            .collect();

        let body = match body {
            Some(bytes) => RawBody::Buffered(bytes),
            None => RawBody::Unavailable,
        };

        Self::parse_block(&lines, body)
    }

    fn parse_block(lines: &[&str], body: RawBody) -> Result<Self, TransportError> {
        let start = lines
            .iter()
            .rposition(|line| line.starts_with("HTTP/"))
            .ok_or_else(|| TransportError::malformed_response("missing HTTP status line"))?;

        let (version, status, reason) = parse_status_line(lines[start])?;

        let headers = lines[start + 1..]
            .iter()
            .map(|line| {
                parse_header_line(line).ok_or_else(|| {
                    TransportError::malformed_response(format!("invalid header: \"{line}\""))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let previous = if start > 0 {
            Some(Box::new(Self::parse_block(&lines[..start], RawBody::Unavailable)?))
        } else {
            None
        };

        Ok(Self {
            status,
            reason,
            version,
            headers,
            body,
            previous,
        })
    }
}

fn parse_status_line(line: &str) -> Result<(String, u16, String), TransportError> {
    let invalid = || TransportError::malformed_response(format!("invalid status line: \"{line}\""));

    let mut parts = line.splitn(3, ' ');
    let version = parts
        .next()
        .and_then(|v| v.strip_prefix("HTTP/"))
        .filter(|v| !v.is_empty())
        .ok_or_else(invalid)?;
    let status = parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(invalid)?;
    let reason = parts.next().unwrap_or_default().trim();

    Ok((version.to_string(), status, reason.to_string()))
}

fn parse_header_line(line: &str) -> Option<(String, String)> {
    let (name, value) = line.split_once(':')?;
    if name.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }

    Some((name.to_string(), value.trim_start_matches([' ', '\t']).to_string()))
}
