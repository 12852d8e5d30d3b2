//! Security audit events.
//!
//! Authentication outcomes, session evictions, remember-me theft and access
//! denials are published as [`SecurityEvent`]s to every handler registered on
//! an [`AuditLogger`]. [`TracingHandler`] forwards them to `tracing`.
//!
//! # Spring Security Equivalent
//! `AuthenticationEventPublisher` / `ApplicationEventPublisher`
//!
//! # Example
//!
//! ```
//! use registration_security_core::http::security::audit::{AuditLogger, SecurityEvent};
//!
//! let audit = AuditLogger::new().with_handler(|event| {
//!     assert_eq!(event.username.as_deref(), Some("test@test.com"));
//! });
//! audit.log(SecurityEvent::access_denied("test@test.com", "http://localhost/management"));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::Serialize;

const AUDIT_TARGET: &str = "registration_security::audit";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityEventType {
    AuthenticationSuccess,
    AuthenticationFailure,
    Logout,
    SessionCreated,
    /// An older session was expired to make room for a new login.
    SessionEvicted,
    /// A request arrived with an expired or unknown session.
    InvalidSession,
    AccessDenied,
    RememberMeLogin,
    TokenExpired,
    /// A stale remember-me token was presented for a live series.
    TokenReuseDetected,
    /// Login from a country other than the last known one.
    SuspiciousLocation,
}

impl fmt::Display for SecurityEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SecurityEventType::AuthenticationSuccess => "AUTHENTICATION_SUCCESS",
            SecurityEventType::AuthenticationFailure => "AUTHENTICATION_FAILURE",
            SecurityEventType::Logout => "LOGOUT",
            SecurityEventType::SessionCreated => "SESSION_CREATED",
            SecurityEventType::SessionEvicted => "SESSION_EVICTED",
            SecurityEventType::InvalidSession => "INVALID_SESSION",
            SecurityEventType::AccessDenied => "ACCESS_DENIED",
            SecurityEventType::RememberMeLogin => "REMEMBER_ME_LOGIN",
            SecurityEventType::TokenExpired => "TOKEN_EXPIRED",
            SecurityEventType::TokenReuseDetected => "TOKEN_REUSE_DETECTED",
            SecurityEventType::SuspiciousLocation => "SUSPICIOUS_LOCATION",
        };
        f.write_str(name)
    }
}

impl SecurityEventType {
    pub fn default_severity(&self) -> SecurityEventSeverity {
        match self {
            SecurityEventType::AuthenticationSuccess
            | SecurityEventType::Logout
            | SecurityEventType::SessionCreated
            | SecurityEventType::RememberMeLogin
            | SecurityEventType::AccessDenied => SecurityEventSeverity::Info,

            SecurityEventType::SessionEvicted
            | SecurityEventType::InvalidSession
            | SecurityEventType::TokenExpired
            | SecurityEventType::AuthenticationFailure => SecurityEventSeverity::Warning,

            SecurityEventType::SuspiciousLocation => SecurityEventSeverity::Error,

            SecurityEventType::TokenReuseDetected => SecurityEventSeverity::Critical,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityEventSeverity {
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for SecurityEventSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityEventSeverity::Info => write!(f, "INFO"),
            SecurityEventSeverity::Warning => write!(f, "WARNING"),
            SecurityEventSeverity::Error => write!(f, "ERROR"),
            SecurityEventSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// A security audit event.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityEvent {
    pub id: String,
    /// Unix epoch milliseconds.
    pub timestamp: u64,
    pub event_type: SecurityEventType,
    pub severity: SecurityEventSeverity,
    pub username: Option<String>,
    pub ip_address: Option<String>,
    /// Full request URL or path.
    pub url: Option<String>,
    pub session_id: Option<String>,
    /// Human readable summary.
    pub message: Option<String>,
    pub details: BTreeMap<String, String>,
}

impl SecurityEvent {
    pub fn new(event_type: SecurityEventType) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        SecurityEvent {
            id: format!("{:x}-{:08x}", timestamp, rand::thread_rng().gen::<u32>()),
            timestamp,
            severity: event_type.default_severity(),
            event_type,
            username: None,
            ip_address: None,
            url: None,
            session_id: None,
            message: None,
            details: BTreeMap::new(),
        }
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn ip_address(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// An authenticated principal was refused a URL.
    pub fn access_denied(email: &str, url: &str) -> Self {
        Self::new(SecurityEventType::AccessDenied)
            .username(email)
            .url(url)
            .message(format!(
                "User {} attempted to access unauthorized URL {}",
                email, url
            ))
    }

    pub fn login_success(email: &str) -> Self {
        Self::new(SecurityEventType::AuthenticationSuccess).username(email)
    }

    pub fn login_failure(email: &str, reason: &str) -> Self {
        Self::new(SecurityEventType::AuthenticationFailure)
            .username(email)
            .detail("reason", reason)
    }

    pub fn session_evicted(email: &str, session_id: &str) -> Self {
        Self::new(SecurityEventType::SessionEvicted)
            .username(email)
            .session_id(session_id)
    }

    pub fn token_reuse_detected(email: &str) -> Self {
        Self::new(SecurityEventType::TokenReuseDetected)
            .username(email)
            .message(format!(
                "Remember-me token reuse for {}, all persistent logins revoked",
                email
            ))
    }

    pub fn suspicious_location(email: &str, known: &str, current: &str) -> Self {
        Self::new(SecurityEventType::SuspiciousLocation)
            .username(email)
            .detail("known_country", known)
            .detail("current_country", current)
    }

    /// One-line `key=value` rendering.
    pub fn to_log_line(&self) -> String {
        let mut parts = vec![format!("[{}]", self.severity), format!("[{}]", self.event_type)];

        if let Some(ref username) = self.username {
            parts.push(format!("user={}", username));
        }
        if let Some(ref ip) = self.ip_address {
            parts.push(format!("ip={}", ip));
        }
        if let Some(ref url) = self.url {
            parts.push(format!("url={}", url));
        }
        for (k, v) in &self.details {
            parts.push(format!("{}={}", k, v));
        }
        if let Some(ref message) = self.message {
            parts.push(format!("msg=\"{}\"", message));
        }

        parts.join(" ")
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.to_log_line())
    }
}

pub trait SecurityEventHandler: Send + Sync {
    fn handle(&self, event: &SecurityEvent);
}

/// Emits each event as one `tracing` record on the `registration_security::audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHandler;

impl SecurityEventHandler for TracingHandler {
    fn handle(&self, event: &SecurityEvent) {
        let text = event.message.clone().unwrap_or_else(|| event.to_log_line());
        match event.severity {
            SecurityEventSeverity::Info => tracing::info!(
                target: AUDIT_TARGET,
                event_type = %event.event_type,
                user = event.username.as_deref().unwrap_or("-"),
                "{}",
                text
            ),
            SecurityEventSeverity::Warning => tracing::warn!(
                target: AUDIT_TARGET,
                event_type = %event.event_type,
                user = event.username.as_deref().unwrap_or("-"),
                "{}",
                text
            ),
            SecurityEventSeverity::Error | SecurityEventSeverity::Critical => tracing::error!(
                target: AUDIT_TARGET,
                event_type = %event.event_type,
                severity = %event.severity,
                user = event.username.as_deref().unwrap_or("-"),
                "{}",
                text
            ),
        }
    }
}

pub struct ClosureHandler<F>
where
    F: Fn(&SecurityEvent) + Send + Sync,
{
    handler: F,
}

impl<F> ClosureHandler<F>
where
    F: Fn(&SecurityEvent) + Send + Sync,
{
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F> SecurityEventHandler for ClosureHandler<F>
where
    F: Fn(&SecurityEvent) + Send + Sync,
{
    fn handle(&self, event: &SecurityEvent) {
        (self.handler)(event);
    }
}

/// Fans events out to its handlers. Cheap to clone.
#[derive(Clone)]
pub struct AuditLogger {
    handlers: Arc<Vec<Arc<dyn SecurityEventHandler>>>,
    enabled: bool,
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditLogger")
            .field("handlers", &self.handlers.len())
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl AuditLogger {
    /// A logger with no handlers.
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
            enabled: true,
        }
    }

    /// A logger that writes through `tracing`.
    pub fn with_tracing() -> Self {
        Self::new().add_handler(TracingHandler)
    }

    pub fn add_handler<H: SecurityEventHandler + 'static>(mut self, handler: H) -> Self {
        Arc::make_mut(&mut self.handlers).push(Arc::new(handler));
        self
    }

    pub fn with_handler<F>(self, handler: F) -> Self
    where
        F: Fn(&SecurityEvent) + Send + Sync + 'static,
    {
        self.add_handler(ClosureHandler::new(handler))
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn log(&self, event: SecurityEvent) {
        if !self.enabled {
            return;
        }
        for handler in self.handlers.iter() {
            handler.handle(&event);
        }
    }
}
