//! Environment configuration.
//!
//! Every setting is read from a `WEBHOOK_`-prefixed variable. A `.env` file in
//! the working directory is loaded first if present.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `WEBHOOK_APP_SECRET` | none |
//! | `WEBHOOK_VERIFY_TOKEN` | required |
//! | `WEBHOOK_VALIDATE_SIGNATURE` | `true` |
//! | `WEBHOOK_BIND_ADDRESS` | `0.0.0.0` |
//! | `WEBHOOK_PORT` | `8080` |
//! | `WEBHOOK_ROUTE_PATH` | `/webhook` |

use std::net::{IpAddr, SocketAddr};

use dotenvy::dotenv;
use serde::Deserialize;
use thiserror::Error;

pub const ENV_PREFIX: &str = "WEBHOOK_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid or missing environment variable: {0}")]
    Env(#[from] envy::Error),

    #[error("WEBHOOK_APP_SECRET is required when signature validation is enabled")]
    MissingAppSecret,

    #[error("invalid bind address {0:?}")]
    InvalidBindAddress(String),

    #[error("route path must start with '/', got {0:?}")]
    InvalidRoutePath(String),
}

#[derive(Clone, Deserialize)]
pub struct Config {
    /// Secret used to check `X-Hub-Signature-256`.
    #[serde(default)]
    pub app_secret: Option<String>,

    /// Token expected in the subscription handshake.
    pub verify_token: String,

    #[serde(default = "default_validate_signature")]
    pub validate_signature: bool,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_route_path")]
    pub route_path: String,
}

fn default_validate_signature() -> bool {
    true
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_route_path() -> String {
    "/webhook".to_string()
}

impl Config {
    /// Loads `.env` (if any), then reads the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenv().ok();

        let config = envy::prefixed(ENV_PREFIX).from_env::<Self>()?;
        config.validate()
    }

    /// Reads configuration from explicit `(name, value)` pairs. Names carry
    /// the `WEBHOOK_` prefix, as in the environment.
    pub fn from_iter<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config = envy::prefixed(ENV_PREFIX).from_iter::<_, Self>(vars)?;
        config.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.validate_signature && self.app_secret.as_deref().is_none_or(str::is_empty) {
            return Err(ConfigError::MissingAppSecret);
        }
        if !self.route_path.starts_with('/') {
            return Err(ConfigError::InvalidRoutePath(self.route_path));
        }
        self.socket_addr()?;
        Ok(self)
    }

    /// The address to listen on.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress(self.bind_address.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

// Secrets stay out of logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("app_secret", &self.app_secret.as_ref().map(|_| "<redacted>"))
            .field("verify_token", &"<redacted>")
            .field("validate_signature", &self.validate_signature)
            .field("bind_address", &self.bind_address)
            .field("port", &self.port)
            .field("route_path", &self.route_path)
            .finish()
    }
}
