//! Pooled reqwest transport.

use crate::error::{BuildError, TransportError};
use crate::raw::{RawBody, RawResponse};
use crate::tls::TlsOptions;
use crate::transport::{Transport, TransportRequest};
use async_trait::async_trait;
use bytes::BytesMut;
use futures_util::StreamExt;
use porter_common_config::PorterConfig;
use reqwest::cookie::CookieStore;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, COOKIE,
    LOCATION, PROXY_AUTHORIZATION, REFERER, SET_COOKIE,
};
use reqwest::{redirect, Client, ClientBuilder, Method, StatusCode, Version};
use std::time::Duration;
use url::Url;

/// Settings of the pooled HTTP client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// User agent string.
    pub user_agent: String,
    /// Maximum idle connections per host.
    pub pool_max_idle_per_host: usize,
    /// Enable gzip decompression.
    pub gzip: bool,
    /// TLS policy of pooled connections.
    pub tls: TlsOptions,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            user_agent: format!("porter/{}", env!("CARGO_PKG_VERSION")),
            pool_max_idle_per_host: 10,
            gzip: true,
            tls: TlsOptions::default(),
        }
    }
}

impl From<&PorterConfig> for ClientConfig {
    fn from(config: &PorterConfig) -> Self {
        Self {
            connect_timeout: Duration::from_millis(config.http.connect_timeout_ms),
            user_agent: config.http.user_agent.clone(),
            pool_max_idle_per_host: config.http.pool_max_idle_per_host,
            gzip: config.http.gzip,
            tls: TlsOptions::from(&config.tls),
        }
    }
}

/// Build a pooled client that leaves redirects to the transport.
pub fn build_client(config: &ClientConfig) -> Result<Client, BuildError> {
    let builder = ClientBuilder::new()
        .connect_timeout(config.connect_timeout)
        .user_agent(&config.user_agent)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .gzip(config.gzip)
        .redirect(redirect::Policy::none());

    config.tls.apply(builder)?.build().map_err(BuildError::ClientBuild)
}

/// [`Transport`] backed by a pooled reqwest client.
///
/// Clones share the same connection pool. Redirects are followed hop by hop
/// so every intermediate response can be reported.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport with the default client config.
    pub fn new() -> Result<Self, BuildError> {
        Self::with_config(&ClientConfig::default())
    }

    /// Create a transport with a custom client config.
    pub fn with_config(config: &ClientConfig) -> Result<Self, BuildError> {
        Ok(Self {
            client: build_client(config)?,
        })
    }

    /// Get the inner reqwest client.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    async fn transfer(
        &self,
        request: TransportRequest,
        cookies: &dyn CookieStore,
    ) -> Result<RawResponse, TransportError> {
        let mut url = Url::parse(&request.url).map_err(|e| {
            TransportError::invalid_request(format!("invalid URL \"{}\": {e}", request.url))
                .with_source(e)
        })?;
        let mut method = Method::from_bytes(request.method.as_bytes()).map_err(|e| {
            TransportError::invalid_request(format!("invalid method \"{}\"", request.method))
                .with_source(e)
        })?;
        let mut headers = header_map(&request.headers)?;
        let mut body = request.body;
        let mut previous: Option<RawResponse> = None;
        let mut redirects = 0;

        loop {
            let mut hop_headers = headers.clone();
            if let Some(cookie) = merge_cookie_header(&headers, cookies.cookies(&url)) {
                hop_headers.insert(COOKIE, cookie);
            }
            let mut builder = self
                .client
                .request(method.clone(), url.clone())
                .headers(hop_headers);
            if let Some(body) = &body {
                builder = builder.body(body.clone());
            }

            let response = builder.send().await?;
            cookies.set_cookies(&mut response.headers().get_all(SET_COOKIE).iter(), &url);

            let status = response.status();
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);

            let mut raw = read_response(response, request.max_body_length).await?;
            if let Some(previous) = previous.take() {
                raw = raw.with_previous(previous);
            }

            let location = match location {
                Some(location) if request.max_redirects > 0 && is_followed_redirect(status) => {
                    location
                }
                _ => return Ok(raw),
            };

            if redirects >= request.max_redirects {
                return Err(TransportError::too_many_redirects(format!(
                    "too many redirects: limit of {} exceeded at {}",
                    request.max_redirects, url
                )));
            }

            let next = url.join(&location).map_err(|e| {
                TransportError::malformed_response(format!(
                    "invalid redirect location \"{location}\""
                ))
                .with_source(e)
            })?;

            tracing::trace!(status = status.as_u16(), from = %url, to = %next, "following redirect");

            let next_method = redirect_method(&method, status);
            if next_method != method {
                body = None;
                headers.remove(CONTENT_TYPE);
                headers.remove(CONTENT_LENGTH);
            }
            if url.origin() != next.origin() {
                headers.remove(AUTHORIZATION);
                headers.remove(PROXY_AUTHORIZATION);
                headers.remove(COOKIE);
            }
            headers.remove(REFERER);
            if let Some(referer) = referer(&url, &next) {
                headers.insert(REFERER, referer);
            }

            method = next_method;
            url = next;
            redirects += 1;
            previous = Some(raw);
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(
        &self,
        request: TransportRequest,
        cookies: &dyn CookieStore,
    ) -> Result<RawResponse, TransportError> {
        match request.transfer_timeout {
            Some(limit) => tokio::time::timeout(limit, self.transfer(request, cookies))
                .await
                .map_err(|elapsed| {
                    TransportError::connection(format!(
                        "transfer timed out after {} ms",
                        limit.as_millis()
                    ))
                    .with_source(elapsed)
                })?,
            None => self.transfer(request, cookies).await,
        }
    }
}

fn header_map(headers: &[(String, String)]) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::with_capacity(headers.len());

    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            TransportError::invalid_request(format!("invalid header name \"{name}\"")).with_source(e)
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| {
            TransportError::invalid_request(format!("invalid value for header \"{name}\""))
                .with_source(e)
        })?;
        map.append(header_name, header_value);
    }

    Ok(map)
}

/// Fold caller `Cookie` values and jar cookies into one header line.
fn merge_cookie_header(headers: &HeaderMap, jar: Option<HeaderValue>) -> Option<HeaderValue> {
    let mut values: Vec<HeaderValue> = headers.get_all(COOKIE).iter().cloned().collect();
    values.extend(jar);
    values.retain(|value| !value.is_empty());

    if values.len() <= 1 {
        return values.pop();
    }

    let joined = values
        .iter()
        .map(HeaderValue::as_bytes)
        .collect::<Vec<_>>()
        .join(&b"; "[..]);
    HeaderValue::from_bytes(&joined).ok()
}

async fn read_response(
    response: reqwest::Response,
    max_body_length: Option<u64>,
) -> Result<RawResponse, TransportError> {
    let status = response.status();
    let version = protocol_version(response.version());
    let headers = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();

    if let (Some(limit), Some(length)) = (max_body_length, response.content_length()) {
        if length > limit {
            return Err(body_limit_exceeded(limit));
        }
    }

    let mut body = BytesMut::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if let Some(limit) = max_body_length {
            if (body.len() + chunk.len()) as u64 > limit {
                return Err(body_limit_exceeded(limit));
            }
        }
        body.extend_from_slice(&chunk);
    }

    Ok(RawResponse {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or_default().to_string(),
        version,
        headers,
        body: RawBody::Buffered(body.freeze()),
        previous: None,
    })
}

fn body_limit_exceeded(limit: u64) -> TransportError {
    TransportError::malformed_response(format!("body size limit of {limit} bytes exceeded"))
}

fn protocol_version(version: Version) -> String {
    let name = if version == Version::HTTP_09 {
        "0.9"
    } else if version == Version::HTTP_10 {
        "1.0"
    } else if version == Version::HTTP_2 {
        "2"
    } else if version == Version::HTTP_3 {
        "3"
    } else {
        "1.1"
    };
    name.to_string()
}

fn is_followed_redirect(status: StatusCode) -> bool {
    matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308)
}

/// Method of the next hop: 303 always becomes `GET` (except `HEAD`), 301 and
/// 302 turn `POST` into `GET`, 307 and 308 replay the original method.
fn redirect_method(method: &Method, status: StatusCode) -> Method {
    match status.as_u16() {
        303 if *method != Method::HEAD => Method::GET,
        301 | 302 if *method == Method::POST => Method::GET,
        _ => method.clone(),
    }
}

/// Referer for the next hop, omitted when downgrading from HTTPS to HTTP.
fn referer(from: &Url, to: &Url) -> Option<HeaderValue> {
    if from.scheme() == "https" && to.scheme() != "https" {
        return None;
    }

    let mut referer = from.clone();
    referer.set_fragment(None);
    let _ = referer.set_username("");
    let _ = referer.set_password(None);
    HeaderValue::from_str(referer.as_str()).ok()
}
