//! HTTP fetch connector.
//!
//! A [`Connector`] turns a [`RequestDescriptor`] into a normalized
//! [`Response`] and sorts every failure into exactly one of two outcomes:
//! [`FetchError::Retryable`] for transient conditions a caller may retry,
//! and [`FetchError::Fatal`] for everything else. The connector never
//! retries on its own.
//!
//! ```no_run
//! use porter_http::{Connector, RequestDescriptor};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let connector = Connector::new()?;
//! let response = connector
//!     .fetch(&RequestDescriptor::new("https://example.com/").with_header("Accept", "text/html"))
//!     .await?;
//! println!("{} {}", response.status_code(), response.text());
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod client;
pub mod connector;
pub mod cookie;
pub mod error;
pub mod options;
pub mod raw;
pub mod request;
pub mod response;
pub mod tls;
pub mod transport;

pub use classify::{classify, is_retryable};
pub use client::{build_client, ClientConfig, ReqwestTransport};
pub use connector::{Connector, ConnectorBuilder};
pub use cookie::CookieJar;
pub use error::{BuildError, ErrorCategory, Failure, FailureKind, FetchError, TransportError};
pub use options::{TransferOptions, TransferOptionsBuilder};
pub use raw::{RawBody, RawResponse};
pub use request::{merge_query, RequestDescriptor, RequestHash};
pub use response::{Response, ResponseBuilder, ResponseError};
pub use tls::TlsOptions;
pub use transport::{Transport, TransportRequest};
