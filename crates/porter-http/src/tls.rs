//! TLS policy for the pooled client.

use crate::error::BuildError;
use porter_common_config::TlsSettings;
use reqwest::{Certificate, ClientBuilder};
use std::path::{Path, PathBuf};

/// TLS options applied when the pooled client is built.
///
/// TLS policy belongs to the connection pool, so every clone of a connector
/// shares the policy its pool was built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsOptions {
    verify_peer: bool,
    ca_file: Option<PathBuf>,
    ca_directory: Option<PathBuf>,
    server_name_indication: bool,
}

impl Default for TlsOptions {
    fn default() -> Self {
        Self {
            verify_peer: true,
            ca_file: None,
            ca_directory: None,
            server_name_indication: true,
        }
    }
}

impl TlsOptions {
    /// Options verifying peers against the system roots.
    pub fn new() -> Self {
        Self::default()
    }

    /// Verify the peer certificate. Disabling this accepts any certificate.
    pub fn with_verify_peer(mut self, verify_peer: bool) -> Self {
        self.verify_peer = verify_peer;
        self
    }

    /// Trust the certificate authorities in a PEM file.
    pub fn with_ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_file = Some(path.into());
        self
    }

    /// Trust every `.pem`/`.crt` certificate authority in a directory.
    pub fn with_ca_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_directory = Some(path.into());
        self
    }

    /// Enable or disable SNI.
    pub fn with_server_name_indication(mut self, enabled: bool) -> Self {
        self.server_name_indication = enabled;
        self
    }

    /// Whether server certificates are verified.
    pub fn verify_peer(&self) -> bool {
        self.verify_peer
    }

    /// Extra certificate authority file.
    pub fn ca_file(&self) -> Option<&Path> {
        self.ca_file.as_deref()
    }

    /// Directory of extra certificate authorities.
    pub fn ca_directory(&self) -> Option<&Path> {
        self.ca_directory.as_deref()
    }

    /// Whether SNI is sent.
    pub fn server_name_indication(&self) -> bool {
        self.server_name_indication
    }

    /// Apply these options to a client builder.
    pub(crate) fn apply(&self, mut builder: ClientBuilder) -> Result<ClientBuilder, BuildError> {
        for certificate in self.root_certificates()? {
            builder = builder.add_root_certificate(certificate);
        }

        Ok(builder
            .danger_accept_invalid_certs(!self.verify_peer)
            .tls_sni(self.server_name_indication))
    }

    fn root_certificates(&self) -> Result<Vec<Certificate>, BuildError> {
        let mut paths = Vec::new();

        if let Some(file) = &self.ca_file {
            paths.push(file.clone());
        }

        if let Some(dir) = &self.ca_directory {
            let entries = std::fs::read_dir(dir).map_err(|source| BuildError::CertificateRead {
                path: dir.clone(),
                source,
            })?;

            let mut found: Vec<PathBuf> = entries
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|path| is_certificate_file(path))
                .collect();
            found.sort();
            paths.extend(found);
        }

        paths.iter().map(|path| load_certificate(path)).collect()
    }
}

impl From<&TlsSettings> for TlsOptions {
    fn from(settings: &TlsSettings) -> Self {
        Self {
            verify_peer: settings.verify_peer,
            ca_file: settings.ca_file.clone(),
            ca_directory: settings.ca_directory.clone(),
            server_name_indication: settings.server_name_indication,
        }
    }
}

fn is_certificate_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pem") || ext.eq_ignore_ascii_case("crt"))
}

fn load_certificate(path: &Path) -> Result<Certificate, BuildError> {
    let pem = std::fs::read(path).map_err(|source| BuildError::CertificateRead {
        path: path.to_path_buf(),
        source,
    })?;

    Certificate::from_pem(&pem).map_err(|source| BuildError::InvalidCertificate {
        path: path.to_path_buf(),
        source,
    })
}
