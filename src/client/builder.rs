//! Builder pattern for client configuration.
//!
//! Provides a fluent API for configuring and creating [`Client`] instances.
//!
//! # Example
//!
//! ```no_run
//! use pilaf_client::{BridgeTransport, Client};
//!
//! # fn example() -> pilaf_client::Result<()> {
//! let client = Client::builder()
//!     .host("localhost")
//!     .port(25565)
//!     .username("pilaf_test_player")
//!     .transport(BridgeTransport::local()?)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::error::{Error, Result};
use crate::session::SessionIdentity;
use crate::transport::SessionTransport;

use super::core::Client;
use super::options::ClientOptions;

// ============================================================================
// Constants
// ============================================================================

/// Default game server host.
pub const DEFAULT_HOST: &str = "localhost";

/// Default game server port.
pub const DEFAULT_PORT: u16 = 25565;

/// Default player name.
pub const DEFAULT_USERNAME: &str = "pilaf_test_player";

/// Accepted player names.
const USERNAME_PATTERN: &str = "^[A-Za-z0-9_]{3,}$";

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for configuring a [`Client`] instance.
///
/// Use [`Client::builder()`] to create a new builder.
#[derive(Clone)]
pub struct ClientBuilder {
    host: String,
    port: u16,
    username: String,
    password: Option<String>,
    version: Option<String>,
    options: ClientOptions,
    transport: Option<Arc<dyn SessionTransport>>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            username: DEFAULT_USERNAME.to_string(),
            password: None,
            version: None,
            options: ClientOptions::default(),
            transport: None,
        }
    }
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("version", &self.version)
            .field("options", &self.options)
            .field("transport", &self.transport.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ClientBuilder Implementation
// ============================================================================

impl ClientBuilder {
    /// Creates a builder with default connection settings and no transport.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the game server host.
    #[inline]
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the game server port.
    #[inline]
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the player name.
    #[inline]
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Sets the account password.
    #[inline]
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Pins the protocol version instead of auto-detecting it.
    #[inline]
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Sets timing and command options.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the session transport.
    #[inline]
    #[must_use]
    pub fn transport(mut self, transport: impl SessionTransport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Sets an already shared session transport.
    #[inline]
    #[must_use]
    pub fn shared_transport(mut self, transport: Arc<dyn SessionTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Builds the client with validation.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the host is empty, the port is zero, the
    /// username is shorter than 3 word characters, an option is out of range,
    /// or no transport is set.
    pub fn build(self) -> Result<Client> {
        let identity = self.validate_identity()?;
        self.validate_options()?;
        let transport = self.transport.ok_or_else(|| {
            Error::config(
                "Session transport is required. Use .transport() to set it.\n\
                 Example: Client::builder().transport(BridgeTransport::local()?)",
            )
        })?;

        Ok(Client::new(identity, self.options, transport))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ClientBuilder {
    /// Validates the connection target.
    fn validate_identity(&self) -> Result<SessionIdentity> {
        if self.host.trim().is_empty() {
            return Err(Error::config("Host must not be empty"));
        }

        if self.port == 0 {
            return Err(Error::config("Port must be non-zero"));
        }

        let pattern = Regex::new(USERNAME_PATTERN)
            .map_err(|e| Error::config(format!("Invalid username pattern: {e}")))?;
        if !pattern.is_match(&self.username) {
            return Err(Error::config(format!(
                "Invalid username '{}': expected at least 3 letters, digits or '_'",
                self.username
            )));
        }

        Ok(SessionIdentity {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            version: self.version.clone(),
        })
    }

    /// Validates timing and limits.
    fn validate_options(&self) -> Result<()> {
        let options = &self.options;

        if options.connect_timeout.is_zero() {
            return Err(Error::config("Connect timeout must be non-zero"));
        }

        if options.command_timeout.is_zero() {
            return Err(Error::config("Command timeout must be non-zero"));
        }

        if options.max_pending_commands == 0 {
            return Err(Error::config("Max pending commands must be at least 1"));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
