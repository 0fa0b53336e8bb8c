//! Retryable/fatal classification of transport failures.

use crate::error::{Failure, FailureKind, FetchError, TransportError};

/// Classify a transport failure.
///
/// Connection-level failures (timeouts, resets, DNS, TLS negotiation, stream
/// errors) are retryable. Exceeded redirect limits, invalid requests and
/// unparseable responses are fatal: sending the same request again cannot
/// change the outcome.
pub fn classify(error: TransportError) -> FetchError {
    let retryable = is_retryable(error.kind());
    let failure = Failure::from_transport(error);

    if retryable {
        FetchError::Retryable(failure)
    } else {
        FetchError::Fatal(failure)
    }
}

/// Whether a failure of this kind is worth retrying.
pub fn is_retryable(kind: FailureKind) -> bool {
    matches!(kind, FailureKind::ConnectionFailure)
}
