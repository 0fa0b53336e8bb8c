//! Connector-wide transfer defaults.

use porter_common_config::HttpSettings;
use std::time::Duration;

/// Default transfer timeout, covering every redirect hop.
pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_secs(15);
/// Default number of redirects to follow.
pub const DEFAULT_MAX_REDIRECTS: u32 = 5;
/// Default maximum response body length: 10 MiB.
pub const DEFAULT_MAX_BODY_LENGTH: u64 = 10 * 1024 * 1024;

/// Transfer options applied to every fetch unless a request overrides them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOptions {
    transfer_timeout: Option<Duration>,
    max_redirects: u32,
    max_body_length: Option<u64>,
    return_error_responses: bool,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            transfer_timeout: Some(DEFAULT_TRANSFER_TIMEOUT),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            max_body_length: Some(DEFAULT_MAX_BODY_LENGTH),
            return_error_responses: false,
        }
    }
}

impl TransferOptions {
    /// Start a builder from the defaults.
    pub fn builder() -> TransferOptionsBuilder {
        TransferOptionsBuilder::default()
    }

    /// Timeout for the whole transfer, or `None` when disabled.
    pub fn transfer_timeout(&self) -> Option<Duration> {
        self.transfer_timeout
    }

    /// Redirects to follow; `0` returns redirect responses unfollowed.
    pub fn max_redirects(&self) -> u32 {
        self.max_redirects
    }

    /// Maximum response body length, or `None` when unlimited.
    pub fn max_body_length(&self) -> Option<u64> {
        self.max_body_length
    }

    /// Whether out-of-range statuses are returned instead of failing.
    pub fn return_error_responses(&self) -> bool {
        self.return_error_responses
    }

    /// Start a builder from these options.
    pub fn to_builder(&self) -> TransferOptionsBuilder {
        TransferOptionsBuilder {
            options: self.clone(),
        }
    }
}

impl From<&HttpSettings> for TransferOptions {
    fn from(settings: &HttpSettings) -> Self {
        // Zero disables a limit in configuration files.
        Self {
            transfer_timeout: (settings.transfer_timeout_ms > 0)
                .then(|| Duration::from_millis(settings.transfer_timeout_ms)),
            max_redirects: settings.max_redirects,
            max_body_length: (settings.max_body_length > 0).then_some(settings.max_body_length),
            return_error_responses: settings.return_error_responses,
        }
    }
}

/// Builder for [`TransferOptions`].
#[derive(Debug, Clone, Default)]
pub struct TransferOptionsBuilder {
    options: TransferOptions,
}

impl TransferOptionsBuilder {
    /// Bound the whole transfer. [`Duration::ZERO`] disables the timeout.
    pub fn transfer_timeout(mut self, timeout: Duration) -> Self {
        self.options.transfer_timeout = Some(timeout).filter(|timeout| !timeout.is_zero());
        self
    }

    /// Let transfers run without a time bound.
    pub fn no_transfer_timeout(mut self) -> Self {
        self.options.transfer_timeout = None;
        self
    }

    /// Redirects to follow. `0` returns the first redirect response as is.
    pub fn max_redirects(mut self, max_redirects: u32) -> Self {
        self.options.max_redirects = max_redirects;
        self
    }

    /// Maximum response body length in bytes. `0` disables the limit.
    pub fn max_body_length(mut self, max_body_length: u64) -> Self {
        self.options.max_body_length = Some(max_body_length).filter(|&limit| limit > 0);
        self
    }

    /// Accept response bodies of any length.
    pub fn unlimited_body_length(mut self) -> Self {
        self.options.max_body_length = None;
        self
    }

    /// Return 1xx, 4xx and 5xx responses instead of failing.
    pub fn return_error_responses(mut self, return_error_responses: bool) -> Self {
        self.options.return_error_responses = return_error_responses;
        self
    }

    /// Finish building.
    pub fn build(self) -> TransferOptions {
        self.options
    }
}
