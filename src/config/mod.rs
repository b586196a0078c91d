//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables
//! - Builder methods (for embedding applications)

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Lwm2mError, Result};
use crate::object::ManagementObject;

/// Default registration lifetime in seconds
pub const DEFAULT_LIFETIME: u32 = 30;

/// Default short server ID
pub const DEFAULT_SERVER_ID: u16 = 123;

/// Connect configuration for one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// LWM2M server URI (e.g., coap://host:5683)
    pub server_uri: String,

    /// Endpoint client name
    pub client_name: String,

    /// Optional DTLS pre-shared key credentials
    pub psk: Option<PskConfig>,

    /// Registration lifetime in seconds
    pub lifetime: u32,

    /// Short server ID
    pub server_id: u16,

    /// Objects registered at start
    pub objects: Vec<ManagementObject>,

    /// Service tick scheduling
    pub service: ServiceConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_uri: String::new(),
            client_name: String::new(),
            psk: None,
            lifetime: DEFAULT_LIFETIME,
            server_id: DEFAULT_SERVER_ID,
            objects: Vec::new(),
            service: ServiceConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Create config for a server and endpoint name
    pub fn new(server_uri: impl Into<String>, client_name: impl Into<String>) -> Self {
        Self {
            server_uri: server_uri.into(),
            client_name: client_name.into(),
            ..Default::default()
        }
    }

    /// Set PSK credentials
    pub fn with_psk(mut self, identity: impl Into<String>, key: impl Into<String>) -> Self {
        self.psk = Some(PskConfig {
            identity: identity.into(),
            key: key.into(),
        });
        self
    }

    /// Set registration lifetime
    pub fn with_lifetime(mut self, lifetime: u32) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Set short server ID
    pub fn with_server_id(mut self, server_id: u16) -> Self {
        self.server_id = server_id;
        self
    }

    /// Add an object to register at start
    pub fn with_object(mut self, object: ManagementObject) -> Self {
        self.objects.push(object);
        self
    }

    /// Set service scheduling
    pub fn with_service(mut self, service: ServiceConfig) -> Self {
        self.service = service;
        self
    }

    /// Check the fields connect requires
    pub fn validate(&self) -> Result<()> {
        if self.server_uri.is_empty() {
            return Err(Lwm2mError::InvalidArgument(
                "server_uri is required".to_string(),
            ));
        }
        if self.client_name.is_empty() {
            return Err(Lwm2mError::InvalidArgument(
                "client_name is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| Lwm2mError::Config(format!("Failed to read config file: {e}")))?;

        Ok(toml::from_str(&content)?)
    }

    /// Load configuration from environment variables
    ///
    /// A missing client name gets a random `lwm2m-<uuid>` endpoint name.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(uri) = std::env::var("LWM2M_SERVER_URI") {
            config.server_uri = uri;
        }
        config.client_name = std::env::var("LWM2M_CLIENT_NAME")
            .unwrap_or_else(|_| format!("lwm2m-{}", uuid::Uuid::new_v4()));

        if let (Ok(identity), Ok(key)) = (
            std::env::var("LWM2M_PSK_IDENTITY"),
            std::env::var("LWM2M_PSK_KEY"),
        ) {
            config.psk = Some(PskConfig { identity, key });
        }

        if let Ok(val) = std::env::var("LWM2M_LIFETIME") {
            if let Ok(val) = val.parse() {
                config.lifetime = val;
            }
        }
        if let Ok(val) = std::env::var("LWM2M_SERVER_ID") {
            if let Ok(val) = val.parse() {
                config.server_id = val;
            }
        }

        config
    }

    /// Default config file location (`<config dir>/lwm2m/client.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("lwm2m").join("client.toml"))
    }
}

/// DTLS pre-shared key credentials
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PskConfig {
    /// PSK identity
    pub identity: String,
    /// PSK key
    pub key: String,
}

impl std::fmt::Debug for PskConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PskConfig")
            .field("identity", &self.identity)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Service tick scheduling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Delay before the first service tick
    pub initial_delay_ms: u64,

    /// Time budget the engine may spend in one service call
    pub poll_quantum_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 100,
            poll_quantum_ms: 1000,
        }
    }
}

impl ServiceConfig {
    /// Delay before the first tick
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Engine poll quantum
    pub fn poll_quantum(&self) -> Duration {
        Duration::from_millis(self.poll_quantum_ms)
    }
}
