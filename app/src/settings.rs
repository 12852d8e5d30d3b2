//! Application settings.
//!
//! Loaded from `config/default.toml` (optional) and then from `REGSEC__*`
//! environment variables, e.g. `REGSEC__SERVER__PORT=9090` or
//! `REGSEC__SECURITY__LOCATION_POLICY=block`. Every field has a default so an
//! empty environment yields a working local setup.

use std::path::PathBuf;

use derive_more::{Display, Error};
use serde::Deserialize;

use registration_security_core::http::security::{
    ConcurrencyPolicy, LocationPolicy, SessionFixationStrategy,
};

#[derive(Debug, Display, Error)]
pub enum SettingsError {
    #[display("failed to load settings: {source}")]
    Load { source: config::ConfigError },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub security: SecuritySettings,
}

impl AppSettings {
    pub fn load() -> Result<Self, SettingsError> {
        config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(
                config::Environment::with_prefix("REGSEC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(config::Config::try_deserialize::<AppSettings>)
            .map_err(|source| SettingsError::Load { source })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// `EnvFilter` directives, overridden by `RUST_LOG`.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecuritySettings {
    #[serde(default = "default_remember_me_key")]
    pub remember_me_key: String,
    #[serde(default = "default_remember_me_validity_days")]
    pub remember_me_validity_days: u64,
    /// Name of the session cookie, also expired on logout.
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,
    /// At least 64 bytes; a random key is generated when absent.
    #[serde(default)]
    pub session_signing_key: Option<String>,
    /// Mark cookies `Secure`; enable when served over HTTPS.
    #[serde(default)]
    pub secure_cookies: bool,
    #[serde(default = "default_maximum_sessions")]
    pub maximum_sessions: usize,
    #[serde(default)]
    pub concurrency_policy: ConcurrencyPolicy,
    #[serde(default = "default_fixation")]
    pub session_fixation: SessionFixationStrategy,
    /// Minutes of inactivity after which a session is no longer valid.
    #[serde(default)]
    pub idle_timeout_minutes: Option<u64>,
    #[serde(default)]
    pub location_policy: LocationPolicy,
    /// Read the client address from `Forwarded`/`X-Forwarded-For`. Only for
    /// deployments behind a proxy that sets those headers itself.
    #[serde(default)]
    pub trust_forwarded_headers: bool,
    #[serde(default = "default_geoip_database")]
    pub geoip_database: Option<PathBuf>,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            remember_me_key: default_remember_me_key(),
            remember_me_validity_days: default_remember_me_validity_days(),
            session_cookie: default_session_cookie(),
            session_signing_key: None,
            secure_cookies: false,
            maximum_sessions: default_maximum_sessions(),
            concurrency_policy: ConcurrencyPolicy::default(),
            session_fixation: default_fixation(),
            idle_timeout_minutes: None,
            location_policy: LocationPolicy::default(),
            trust_forwarded_headers: false,
            geoip_database: default_geoip_database(),
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_filter() -> String {
    "info,registration_security::audit=info".to_string()
}

fn default_remember_me_key() -> String {
    "theKey".to_string()
}

fn default_remember_me_validity_days() -> u64 {
    14
}

fn default_session_cookie() -> String {
    "JSESSIONID".to_string()
}

fn default_maximum_sessions() -> usize {
    1
}

fn default_fixation() -> SessionFixationStrategy {
    SessionFixationStrategy::None
}

fn default_geoip_database() -> Option<PathBuf> {
    Some(PathBuf::from("maxmind/GeoLite2-Country.mmdb"))
}

fn default_bcrypt_cost() -> u32 {
    11
}
