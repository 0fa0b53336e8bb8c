//! Failure taxonomy.
//!
//! Transports report a [`TransportError`] tagged with one of four
//! [`FailureKind`]s. The connector reclassifies every such failure into a
//! [`FetchError`], which is either retryable or fatal. Callers that own a
//! retry loop only need [`FetchError::is_retryable`].

use crate::response::Response;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Boxed error used as the underlying cause of a transport failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The closed set of failures a transport may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// DNS, socket, timeout, TLS negotiation or stream I/O failure.
    ConnectionFailure,
    /// The redirect limit was exceeded.
    TooManyRedirects,
    /// The request could not be sent as described.
    InvalidRequest,
    /// The response could not be parsed or broke a protocol limit.
    MalformedResponse,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ErrorCategory::from(*self).fmt(f)
    }
}

/// A failure raised by a [`Transport`](crate::Transport).
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    kind: FailureKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl TransportError {
    /// Create a failure of the given kind.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Connection-level failure: DNS, socket, TLS or stream I/O.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ConnectionFailure, message)
    }

    /// Redirect limit exceeded.
    pub fn too_many_redirects(message: impl Into<String>) -> Self {
        Self::new(FailureKind::TooManyRedirects, message)
    }

    /// The request could not be built or sent as described.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(FailureKind::InvalidRequest, message)
    }

    /// The response could not be read or violated a limit.
    pub fn malformed_response(message: impl Into<String>) -> Self {
        Self::new(FailureKind::MalformedResponse, message)
    }

    /// Attach the underlying cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Failure category reported by the transport.
    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Human-readable description.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_builder() {
            FailureKind::InvalidRequest
        } else if e.is_redirect() {
            FailureKind::TooManyRedirects
        } else if e.is_decode() {
            FailureKind::MalformedResponse
        } else {
            // Timeouts, refused connections, resets, TLS and body stream errors.
            FailureKind::ConnectionFailure
        };

        Self::new(kind, e.to_string()).with_source(e)
    }
}

/// Category of a classified failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    ConnectionFailure,
    TooManyRedirects,
    InvalidRequest,
    MalformedResponse,
    /// The server answered with a status outside the accepted range.
    ServerStatusError,
}

impl From<FailureKind> for ErrorCategory {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::ConnectionFailure => Self::ConnectionFailure,
            FailureKind::TooManyRedirects => Self::TooManyRedirects,
            FailureKind::InvalidRequest => Self::InvalidRequest,
            FailureKind::MalformedResponse => Self::MalformedResponse,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ConnectionFailure => "connection failure",
            Self::TooManyRedirects => "too many redirects",
            Self::InvalidRequest => "invalid request",
            Self::MalformedResponse => "malformed response",
            Self::ServerStatusError => "server status error",
        };
        f.write_str(name)
    }
}

/// Details of a classified failure.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct Failure {
    category: ErrorCategory,
    message: String,
    #[source]
    cause: Option<TransportError>,
    response: Option<Box<Response>>,
}

impl Failure {
    /// Wrap a transport failure, keeping its message.
    pub fn from_transport(cause: TransportError) -> Self {
        Self {
            category: cause.kind().into(),
            message: cause.message().to_string(),
            cause: Some(cause),
            response: None,
        }
    }

    /// A server status failure carrying the full response.
    pub fn server_status(message: impl Into<String>, response: Response) -> Self {
        Self {
            category: ErrorCategory::ServerStatusError,
            message: message.into(),
            cause: None,
            response: Some(Box::new(response)),
        }
    }

    /// Category of this failure.
    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    /// Human-readable description.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The transport failure this was classified from, if any.
    pub fn cause(&self) -> Option<&TransportError> {
        self.cause.as_ref()
    }

    /// The server response, for [`ErrorCategory::ServerStatusError`].
    pub fn response(&self) -> Option<&Response> {
        self.response.as_deref()
    }

    /// Take the attached response, if any.
    pub fn into_response(self) -> Option<Response> {
        self.response.map(|r| *r)
    }
}

/// A classified fetch failure.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transient failure; the same request may succeed on a later attempt.
    #[error(transparent)]
    Retryable(Failure),

    /// Permanent failure; retrying the same request cannot succeed.
    #[error(transparent)]
    Fatal(Failure),
}

impl FetchError {
    /// Whether a retry may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }

    /// Details of the failure.
    pub fn failure(&self) -> &Failure {
        match self {
            Self::Retryable(failure) | Self::Fatal(failure) => failure,
        }
    }

    /// Category of the underlying failure.
    pub fn category(&self) -> ErrorCategory {
        self.failure().category()
    }

    /// The server response attached to a status failure.
    pub fn response(&self) -> Option<&Response> {
        self.failure().response()
    }

    /// Unwrap the failure details.
    pub fn into_failure(self) -> Failure {
        match self {
            Self::Retryable(failure) | Self::Fatal(failure) => failure,
        }
    }
}

/// Errors raised while building a connector or its pooled client.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("failed to read certificate authority {path}: {source}")]
    CertificateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid certificate authority {path}: {source}")]
    InvalidCertificate {
        path: PathBuf,
        #[source]
        source: reqwest::Error,
    },
}
