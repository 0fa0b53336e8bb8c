//! Request descriptors and their canonical identity hash.

use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::fmt;
use url::form_urlencoded;

/// Default HTTP method of a new descriptor.
pub const DEFAULT_METHOD: &str = "GET";

/// Description of one logical fetch.
///
/// Header names keep their original case for transmission and are matched
/// case-insensitively on lookup. Values of a name keep insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    url: String,
    method: String,
    headers: Vec<(String, Vec<String>)>,
    body: Option<Bytes>,
    max_body_length: Option<u64>,
}

impl RequestDescriptor {
    /// Create a `GET` descriptor for the given absolute URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: DEFAULT_METHOD.to_string(),
            headers: Vec::new(),
            body: None,
            max_body_length: None,
        }
    }

    /// Set the HTTP method.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Append a header value, keeping any existing values of the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();

        match self.position(&name) {
            Some(index) => self.headers[index].1.push(value),
            None => self.headers.push((name, vec![value])),
        }
        self
    }

    /// Remove every value of the named header.
    pub fn without_headers(mut self, name: &str) -> Self {
        self.headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        self
    }

    /// Set the request body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Override the connector's maximum response body length for this request.
    /// `0` disables the limit.
    pub fn with_max_body_length(mut self, max_body_length: u64) -> Self {
        self.max_body_length = Some(max_body_length);
        self
    }

    /// Merge query parameters into the URL. See [`merge_query`].
    pub fn with_query<K: AsRef<str>, V: AsRef<str>>(mut self, query: &[(K, V)]) -> Self {
        self.url = merge_query(&self.url, query);
        self
    }

    /// Absolute target URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// HTTP method.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Headers in insertion order.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.headers
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Request body, if any.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Per-request body length override. `Some(0)` disables the limit.
    pub fn max_body_length(&self) -> Option<u64> {
        self.max_body_length
    }

    /// First value of the named header.
    pub fn find_header(&self, name: &str) -> Option<&str> {
        self.find_headers(name).first().map(String::as_str)
    }

    /// Every value of the named header.
    pub fn find_headers(&self, name: &str) -> &[String] {
        match self.position(name) {
            Some(index) => &self.headers[index].1,
            None => &[],
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(name))
    }

    /// Compute the canonical identity hash of this request.
    ///
    /// Header names (lowercased) are sorted, then each name's values are
    /// sorted, so the hash does not depend on the order headers were added.
    /// Method, URL and body follow the headers.
    pub fn compute_hash(&self) -> RequestHash {
        let mut headers: Vec<(String, Vec<&str>)> = self
            .headers
            .iter()
            .map(|(name, values)| {
                let mut values: Vec<&str> = values.iter().map(String::as_str).collect();
                values.sort_unstable();
                (name.to_ascii_lowercase(), values)
            })
            .collect();
        headers.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        let mut hasher = Sha256::new();
        for (name, values) in &headers {
            for value in values {
                hasher.update(name.as_bytes());
                hasher.update(value.as_bytes());
            }
        }
        hasher.update(self.method.as_bytes());
        hasher.update(self.url.as_bytes());
        if let Some(body) = &self.body {
            hasher.update(body);
        }

        let digest = hasher.finalize();
        let mut hash = [0u8; RequestHash::LEN];
        hash.copy_from_slice(&digest[..RequestHash::LEN]);
        RequestHash(hash)
    }
}

/// 128-bit identity hash of a [`RequestDescriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestHash([u8; RequestHash::LEN]);

impl RequestHash {
    /// Digest length in bytes.
    pub const LEN: usize = 16;

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }

    /// Lowercase hex encoding of the digest.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for RequestHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Merge a form-encoded query into a URL.
///
/// The new parameters are placed ahead of any existing query and always
/// before the fragment, including fragments that themselves contain `?`.
pub fn merge_query<K: AsRef<str>, V: AsRef<str>>(url: &str, query: &[(K, V)]) -> String {
    if query.is_empty() {
        return url.to_string();
    }

    let query_string = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(query)
        .finish();

    let query_pos = url.find('?');
    let fragment_pos = url.find('#');

    match (query_pos, fragment_pos) {
        (Some(q), Some(h)) if q < h => format!("{}{}&{}", &url[..=q], query_string, &url[q + 1..]),
        (Some(q), None) => format!("{}{}&{}", &url[..=q], query_string, &url[q + 1..]),
        (_, Some(h)) => format!("{}?{}{}", &url[..h], query_string, &url[h..]),
        (None, None) => format!("{}?{}", url, query_string),
    }
}
