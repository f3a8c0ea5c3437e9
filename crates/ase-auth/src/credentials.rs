//! Credential types for authentication.

use std::borrow::Cow;

/// Login name and password for ASE authentication.
///
/// Credentials are designed to minimize copying of sensitive data.
#[derive(Clone, Default)]
pub struct Credentials {
    /// Login name.
    pub username: Cow<'static, str>,
    /// Password.
    pub password: Cow<'static, str>,
}

impl Credentials {
    /// Create credentials.
    pub fn new(
        username: impl Into<Cow<'static, str>>,
        password: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Password for a remote server reached through the login server.
///
/// The login server itself is represented by an entry with an empty name.
#[derive(Clone)]
pub struct RemoteServer {
    /// Server name.
    pub name: String,
    /// Password on that server.
    pub password: String,
}

impl RemoteServer {
    /// Create a remote server entry.
    pub fn new(name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for RemoteServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteServer")
            .field("name", &self.name)
            .field("password", &"[REDACTED]")
            .finish()
    }
}
