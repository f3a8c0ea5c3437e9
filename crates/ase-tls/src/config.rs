//! TLS configuration options.

use std::path::PathBuf;

/// Port on which TLS is assumed even when not enabled explicitly.
pub const IMPLICIT_TLS_PORT: u16 = 443;

/// TLS configuration for ASE connections.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct TlsConfig {
    /// Wrap the connection in TLS.
    pub enable: bool,

    /// Hostname to verify the server certificate against.
    ///
    /// If not set, the connection host is used. A leading `CN=` is ignored.
    pub hostname: Option<String>,

    /// Accept any server certificate.
    ///
    /// **Warning:** This is insecure and should only be used for testing.
    pub skip_validation: bool,

    /// PEM file with the CA certificates to trust instead of the
    /// built-in Mozilla roots.
    pub ca_file: Option<PathBuf>,
}

impl TlsConfig {
    /// Create a new TLS configuration with TLS disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable TLS.
    #[must_use]
    pub fn enable(mut self, enable: bool) -> Self {
        self.enable = enable;
        self
    }

    /// Set the hostname for certificate validation.
    #[must_use]
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Accept any server certificate.
    ///
    /// **Warning:** This is insecure and should only be used for testing.
    #[must_use]
    pub fn skip_validation(mut self, skip: bool) -> Self {
        self.skip_validation = skip;
        self
    }

    /// Trust the CA certificates in the given PEM file.
    #[must_use]
    pub fn with_ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_file = Some(path.into());
        self
    }

    /// Whether a connection to `port` uses TLS.
    #[must_use]
    pub fn is_required(&self, port: u16) -> bool {
        self.enable || port == IMPLICIT_TLS_PORT
    }

    /// Name to verify the server certificate against.
    #[must_use]
    pub fn server_name<'a>(&'a self, host: &'a str) -> &'a str {
        match &self.hostname {
            Some(hostname) if !hostname.is_empty() => {
                hostname.strip_prefix("CN=").unwrap_or(hostname)
            }
            _ => host,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_implicit_tls_port() {
        let config = TlsConfig::new();
        assert!(!config.is_required(5000));
        assert!(config.is_required(443));
        assert!(config.enable(true).is_required(5000));
    }

    #[test]
    fn test_server_name() {
        let config = TlsConfig::new();
        assert_eq!(config.server_name("db.example.com"), "db.example.com");

        let config = config.with_hostname("CN=ase.example.com");
        assert_eq!(config.server_name("10.0.0.1"), "ase.example.com");

        let config = TlsConfig::new().with_hostname("");
        assert_eq!(config.server_name("db"), "db");
    }
}
