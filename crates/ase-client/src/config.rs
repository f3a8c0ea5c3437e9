//! Connection and login configuration.

use std::time::Duration;

use ase_auth::{Credentials, RemoteServer, SymmetricCipher};
use ase_protocol::DEFAULT_PACKET_SIZE;
use ase_protocol::login::{LoginRecord, MAX_NAME};
use ase_protocol::package::MsgId;
use ase_tls::TlsConfig;
use ase_types::Endian;

/// Default ASE port.
pub const DEFAULT_PORT: u16 = 5000;

/// Application name sent when none is configured.
pub const DEFAULT_APP_NAME: &str = "ase-tds";

/// Transport used to reach the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum Network {
    /// TCP, optionally wrapped in TLS.
    #[default]
    Tcp,
}

/// Connection configuration.
///
/// This struct is marked `#[non_exhaustive]` to allow adding new fields
/// in future releases. Use [`Config::default()`] and the builder methods
/// to construct instances.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// Server hostname or IP address.
    pub host: String,

    /// Server port (default: 5000).
    pub port: u16,

    /// Login name and password.
    pub credentials: Credentials,

    /// Database name.
    pub database: Option<String>,

    /// Transport (default: TCP).
    pub network: Network,

    /// Hostname sent to the server in the login record.
    pub client_hostname: String,

    /// TLS configuration.
    pub tls: TlsConfig,

    /// How long the reader waits for a packet before checking whether the
    /// connection is still open (default: 50s).
    pub packet_read_timeout: Duration,

    /// How many decoded packages a channel buffers before the reader
    /// waits for the consumer (default: 100).
    pub channel_package_queue_size: usize,

    /// Log every package sent or received at debug level.
    pub debug_log_packages: bool,

    /// Byte order of integers in package payloads (default: little).
    pub endian: Endian,

    /// Cipher of the session key sent during an encrypted login.
    pub symmetric_cipher: SymmetricCipher,

    /// Time to establish the TCP connection and TLS handshake (default: 15s).
    pub connect_timeout: Duration,

    /// Time to wait for the logout response (default: 60s).
    pub logout_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            credentials: Credentials::default(),
            database: None,
            network: Network::Tcp,
            client_hostname: local_hostname(),
            tls: TlsConfig::default(),
            packet_read_timeout: Duration::from_secs(50),
            channel_package_queue_size: 100,
            debug_log_packages: false,
            endian: Endian::Little,
            symmetric_cipher: SymmetricCipher::default(),
            connect_timeout: Duration::from_secs(15),
            logout_timeout: Duration::from_secs(60),
        }
    }
}

fn local_hostname() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .ok()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

impl Config {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the server port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the login credentials.
    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Set the database.
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the hostname sent in the login record.
    #[must_use]
    pub fn client_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.client_hostname = hostname.into();
        self
    }

    /// Set the TLS configuration.
    #[must_use]
    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.tls = tls;
        self
    }

    /// Set the packet read timeout.
    #[must_use]
    pub fn packet_read_timeout(mut self, timeout: Duration) -> Self {
        self.packet_read_timeout = timeout;
        self
    }

    /// Set the per-channel package queue depth.
    #[must_use]
    pub fn channel_package_queue_size(mut self, size: usize) -> Self {
        self.channel_package_queue_size = size.max(1);
        self
    }

    /// Log every package sent or received.
    #[must_use]
    pub fn debug_log_packages(mut self, enabled: bool) -> Self {
        self.debug_log_packages = enabled;
        self
    }

    /// Set the payload byte order.
    #[must_use]
    pub fn endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    /// Set the session key cipher.
    #[must_use]
    pub fn symmetric_cipher(mut self, cipher: SymmetricCipher) -> Self {
        self.symmetric_cipher = cipher;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the logout timeout.
    #[must_use]
    pub fn logout_timeout(mut self, timeout: Duration) -> Self {
        self.logout_timeout = timeout;
        self
    }

    /// Whether the connection is wrapped in TLS.
    #[must_use]
    pub fn uses_tls(&self) -> bool {
        self.tls.is_required(self.port)
    }
}

/// Per-login settings.
///
/// Built from a [`Config`] with [`LoginConfig::new`]; clients usually
/// adjust the application name.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct LoginConfig {
    /// Login name and password.
    pub credentials: Credentials,
    /// Client hostname, at most 30 bytes.
    pub hostname: String,
    /// Client process identifier.
    pub host_process: String,
    /// Application name.
    pub app_name: String,
    /// Server name, at most 30 bytes.
    pub server_name: String,
    /// Session language.
    pub language: String,
    /// Client character set.
    pub charset: String,
    /// Requested packet size, renegotiated by the server.
    pub packet_size: u16,
    /// Passwords for remote servers. The login server is added in front
    /// of them during the login.
    pub remote_servers: Vec<RemoteServer>,
    /// Password encryption, `None` for a plain login.
    pub encryption: Option<MsgId>,
}

impl LoginConfig {
    /// Create a login configuration with the defaults for `config`.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            credentials: config.credentials.clone(),
            hostname: truncate(&config.client_hostname, MAX_NAME),
            host_process: std::process::id().to_string(),
            app_name: DEFAULT_APP_NAME.to_string(),
            server_name: truncate(&config.host, MAX_NAME),
            language: "us_english".to_string(),
            charset: "utf8".to_string(),
            packet_size: DEFAULT_PACKET_SIZE as u16,
            remote_servers: Vec::new(),
            encryption: Some(MsgId::SecEncrypt4),
        }
    }

    /// Set the application name.
    #[must_use]
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Add a remote server password.
    #[must_use]
    pub fn remote_server(mut self, server: RemoteServer) -> Self {
        self.remote_servers.push(server);
        self
    }

    /// Set the password encryption.
    #[must_use]
    pub fn encryption(mut self, encryption: Option<MsgId>) -> Self {
        self.encryption = encryption;
        self
    }

    /// Remote servers as sent during an encrypted login, the login server
    /// first with an empty name.
    #[must_use]
    pub fn remote_servers_with_login_server(&self) -> Vec<RemoteServer> {
        let mut servers = Vec::with_capacity(self.remote_servers.len() + 1);
        servers.push(RemoteServer::new("", self.credentials.password.as_ref()));
        servers.extend(self.remote_servers.iter().cloned());
        servers
    }

    /// Fields of the login record.
    #[must_use]
    pub fn record(&self) -> LoginRecord {
        LoginRecord {
            hostname: self.hostname.clone(),
            username: self.credentials.username.to_string(),
            password: self.credentials.password.to_string(),
            host_process: self.host_process.clone(),
            app_name: self.app_name.clone(),
            server_name: self.server_name.clone(),
            language: self.language.clone(),
            charset: self.charset.clone(),
            packet_size: self.packet_size,
            encryption: self.encryption,
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.packet_read_timeout, Duration::from_secs(50));
        assert_eq!(config.channel_package_queue_size, 100);
        assert_eq!(config.endian, Endian::Little);
        assert!(!config.debug_log_packages);
        assert!(!config.uses_tls());
    }

    #[test]
    fn test_config_builder() {
        let config = Config::new()
            .host("ase.example.com")
            .port(443)
            .credentials(Credentials::new("sa", "secret"))
            .channel_package_queue_size(0);
        assert_eq!(config.host, "ase.example.com");
        assert!(config.uses_tls());
        assert_eq!(config.channel_package_queue_size, 1);
    }

    #[test]
    fn test_login_config_truncates_names() {
        let config = Config::new()
            .host("h".repeat(40))
            .client_hostname("c".repeat(31));
        let login = LoginConfig::new(&config);
        assert_eq!(login.server_name.len(), 30);
        assert_eq!(login.hostname.len(), 30);
        assert_eq!(login.encryption, Some(MsgId::SecEncrypt4));
        assert_eq!(login.host_process, std::process::id().to_string());
    }

    #[test]
    fn test_remote_servers_start_with_login_server() {
        let config = Config::new().credentials(Credentials::new("sa", "main"));
        let login =
            LoginConfig::new(&config).remote_server(RemoteServer::new("REMOTE", "remote-pw"));

        let servers = login.remote_servers_with_login_server();
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0].name, "");
        assert_eq!(servers[0].password, "main");
        assert_eq!(servers[1].name, "REMOTE");
    }

    #[test]
    fn test_record_uses_credentials() {
        let config = Config::new().credentials(Credentials::new("sa", "pw"));
        let record = LoginConfig::new(&config).encryption(None).record();
        assert_eq!(record.username, "sa");
        assert_eq!(record.password, "pw");
        assert_eq!(record.packet_size, 512);
        assert!(!record.is_encrypted());
    }
}
