//! The fetch connector.

use crate::classify::classify;
use crate::client::{ClientConfig, ReqwestTransport};
use crate::cookie::CookieJar;
use crate::error::{BuildError, FetchError};
use crate::options::TransferOptions;
use crate::request::{RequestDescriptor, RequestHash};
use crate::response::{Response, ResponseBuilder};
use crate::transport::{Transport, TransportRequest};
use porter_common_config::PorterConfig;
use std::sync::Arc;

/// Fetches [`RequestDescriptor`]s through a [`Transport`].
///
/// A connector never retries: retryable failures are returned to the caller,
/// which owns the retry policy.
///
/// Cloning a connector copies its [`TransferOptions`] and cookie jar, so
/// changes to a clone never leak back to the original. The transport, and
/// with it the connection pool, is shared between clones.
#[derive(Debug)]
pub struct Connector {
    options: TransferOptions,
    cookie_jar: Arc<CookieJar>,
    transport: Arc<dyn Transport>,
}

impl Connector {
    /// Create a connector with default options and a pooled reqwest client.
    pub fn new() -> Result<Self, BuildError> {
        Self::builder().build()
    }

    /// Start configuring a connector.
    pub fn builder() -> ConnectorBuilder {
        ConnectorBuilder::default()
    }

    /// Create a connector from loaded configuration.
    pub fn from_config(config: &PorterConfig) -> Result<Self, BuildError> {
        Self::builder()
            .options(TransferOptions::from(&config.http))
            .client_config(ClientConfig::from(config))
            .build()
    }

    /// Fetch the described resource.
    ///
    /// Transport failures are classified as retryable or fatal. Responses
    /// with a status below 200 or from 400 upward fail with a fatal server
    /// status error unless the options return error responses.
    pub async fn fetch(&self, source: &RequestDescriptor) -> Result<Response, FetchError> {
        let request = self.build_request(source);
        tracing::debug!(method = %request.method, url = %request.url, "fetching");

        let raw = self
            .transport
            .execute(request, self.cookie_jar.as_ref())
            .await
            .map_err(|e| {
                let err = classify(e);
                tracing::warn!(
                    method = source.method(),
                    url = source.url(),
                    category = %err.category(),
                    retryable = err.is_retryable(),
                    "fetch failed: {}",
                    err
                );
                err
            })?;

        let response = ResponseBuilder::new()
            .return_error_responses(self.options.return_error_responses())
            .build(raw)
            .await?;

        tracing::debug!(
            url = source.url(),
            status = response.status_code(),
            redirects = response.redirect_count(),
            "fetched"
        );
        Ok(response)
    }

    /// Resolve a descriptor against this connector's options.
    pub fn build_request(&self, source: &RequestDescriptor) -> TransportRequest {
        let headers = source
            .headers()
            .flat_map(|(name, values)| {
                values
                    .iter()
                    .map(move |value| (name.to_string(), value.clone()))
            })
            .collect();

        TransportRequest {
            url: source.url().to_string(),
            method: source.method().to_string(),
            headers,
            body: source.body().cloned(),
            transfer_timeout: self.options.transfer_timeout(),
            max_redirects: self.options.max_redirects(),
            max_body_length: match source.max_body_length() {
                Some(0) => None,
                Some(limit) => Some(limit),
                None => self.options.max_body_length(),
            },
        }
    }

    /// Canonical identity hash of a descriptor.
    pub fn compute_hash(source: &RequestDescriptor) -> RequestHash {
        source.compute_hash()
    }

    /// Transfer options applied to every fetch.
    pub fn options(&self) -> &TransferOptions {
        &self.options
    }

    /// Replace the options of this connector only.
    pub fn set_options(&mut self, options: TransferOptions) {
        self.options = options;
    }

    /// Cookies owned by this connector.
    pub fn cookie_jar(&self) -> &CookieJar {
        &self.cookie_jar
    }

    /// Transport shared with every clone of this connector.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }
}

impl Clone for Connector {
    fn clone(&self) -> Self {
        Self {
            options: self.options.clone(),
            cookie_jar: Arc::new(CookieJar::clone(&self.cookie_jar)),
            transport: Arc::clone(&self.transport),
        }
    }
}

/// Builder for [`Connector`].
#[derive(Debug, Default)]
pub struct ConnectorBuilder {
    options: TransferOptions,
    client_config: ClientConfig,
    cookie_jar: Option<CookieJar>,
    transport: Option<Arc<dyn Transport>>,
}

impl ConnectorBuilder {
    /// Set the transfer options.
    pub fn options(mut self, options: TransferOptions) -> Self {
        self.options = options;
        self
    }

    /// Client settings for the default reqwest transport.
    pub fn client_config(mut self, config: ClientConfig) -> Self {
        self.client_config = config;
        self
    }

    /// Start with a pre-populated cookie jar.
    pub fn cookie_jar(mut self, jar: CookieJar) -> Self {
        self.cookie_jar = Some(jar);
        self
    }

    /// Use a custom transport instead of the pooled reqwest client.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the connector, creating a pooled client unless a transport was given.
    pub fn build(self) -> Result<Connector, BuildError> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::with_config(&self.client_config)?),
        };

        Ok(Connector {
            options: self.options,
            cookie_jar: Arc::new(self.cookie_jar.unwrap_or_default()),
            transport,
        })
    }
}
