//! Session-based authentication with a concurrent session registry.
//!
//! # Spring Security Equivalent
//! `HttpSession` security context, `SessionRegistryImpl` and
//! `ConcurrentSessionControlAuthenticationStrategy` (`maximumSessions(1)`)
//!
//! The login state lives in the actix-session store as a [`SessionUser`]
//! holding the principal's email and a server-generated session id. The
//! [`SessionRegistry`] decides whether that id is still live, which is how
//! a newer login on another browser ends an older one.
//!
//! # Example
//! ```rust,ignore
//! use actix_session::{storage::CookieSessionStore, SessionMiddleware};
//!
//! let config = SessionConfig::new().maximum_sessions(1);
//! let registry = Arc::new(SessionRegistry::new(&config));
//! let authenticator = SessionAuthenticator::new(config, registry, users);
//!
//! App::new()
//!     .wrap(SecurityTransform::new()
//!         .config_authenticator(move || authenticator.clone())
//!         .config_authorizer(|| /* ... */))
//!     .wrap(SessionMiddleware::new(CookieSessionStore::default(), key))
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use actix_session::{Session, SessionExt};
use actix_web::dev::ServiceRequest;
use derive_more::{Display, Error};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::http::security::audit::{AuditLogger, SecurityEvent, SecurityEventType};
use crate::http::security::authorizer::routing_path;
use crate::http::security::config::{AuthenticationOutcome, Authenticator};
use crate::http::security::remember_me::{RememberMeError, RememberMeServices};
use crate::http::security::repository::UserRepository;
use crate::http::security::user::User;

const SESSION_ID_LENGTH: usize = 32;

// =============================================================================
// Session Policies
// =============================================================================

/// Strategy for session fixation protection.
///
/// # Spring Security Equivalent
/// `sessionManagement().sessionFixation()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionFixationStrategy {
    /// Renew the session id and keep its attributes.
    #[default]
    MigrateSession,
    /// Renew the session id and drop its attributes.
    NewSession,
    /// Keep the session as is.
    None,
}

/// What happens when a principal logs in while already at the session limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyPolicy {
    /// Expire the principal's oldest sessions to make room.
    #[default]
    ExpireOldest,
    /// Refuse the new login with [`SessionError::LimitExceeded`].
    RejectNew,
}

// =============================================================================
// Session Configuration
// =============================================================================

/// # Example
/// ```rust,ignore
/// let config = SessionConfig::new()
///     .fixation_strategy(SessionFixationStrategy::None)
///     .maximum_sessions(1)
///     .invalid_session_url("/invalidSession.html");
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    user_key: String,
    fixation_strategy: SessionFixationStrategy,
    maximum_sessions: Option<usize>,
    concurrency_policy: ConcurrencyPolicy,
    idle_timeout: Option<Duration>,
    invalid_session_url: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionConfig {
    /// One session per principal, evicting the oldest.
    pub fn new() -> Self {
        Self {
            user_key: "security_user".to_string(),
            fixation_strategy: SessionFixationStrategy::MigrateSession,
            maximum_sessions: Some(1),
            concurrency_policy: ConcurrencyPolicy::ExpireOldest,
            idle_timeout: None,
            invalid_session_url: "/invalidSession.html".to_string(),
        }
    }

    /// Session key for the logged-in principal.
    pub fn user_key(mut self, key: &str) -> Self {
        self.user_key = key.to_string();
        self
    }

    pub fn fixation_strategy(mut self, strategy: SessionFixationStrategy) -> Self {
        self.fixation_strategy = strategy;
        self
    }

    /// # Spring Equivalent
    /// `sessionManagement().maximumSessions(1)`
    pub fn maximum_sessions(mut self, max: usize) -> Self {
        self.maximum_sessions = Some(max);
        self
    }

    pub fn unlimited_sessions(mut self) -> Self {
        self.maximum_sessions = None;
        self
    }

    pub fn concurrency_policy(mut self, policy: ConcurrencyPolicy) -> Self {
        self.concurrency_policy = policy;
        self
    }

    /// Sessions idle for longer than `timeout` stop being valid.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// # Spring Equivalent
    /// `sessionManagement().invalidSessionUrl(..)`
    pub fn invalid_session_url(mut self, url: &str) -> Self {
        self.invalid_session_url = url.to_string();
        self
    }

    pub fn get_user_key(&self) -> &str {
        &self.user_key
    }

    pub fn get_fixation_strategy(&self) -> SessionFixationStrategy {
        self.fixation_strategy
    }

    pub fn get_maximum_sessions(&self) -> Option<usize> {
        self.maximum_sessions
    }

    pub fn get_concurrency_policy(&self) -> ConcurrencyPolicy {
        self.concurrency_policy
    }

    pub fn get_idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }

    pub fn get_invalid_session_url(&self) -> &str {
        &self.invalid_session_url
    }
}

// =============================================================================
// Session Registry
// =============================================================================

#[derive(Debug, Display, Error, PartialEq, Eq)]
pub enum SessionError {
    #[display("maximum sessions exceeded for {principal}")]
    LimitExceeded {
        #[error(not(source))]
        principal: String,
    },
    #[display("session insert error: {reason}")]
    Insert {
        #[error(not(source))]
        reason: String,
    },
}

/// A registered session.
#[derive(Debug, Clone)]
pub struct SessionInformation {
    pub session_id: String,
    pub principal: String,
    pub created_at: SystemTime,
    pub last_request: Instant,
}

#[derive(Debug, Default)]
struct RegistryState {
    sessions: HashMap<String, SessionInformation>,
    /// Session ids per principal, oldest first.
    by_principal: HashMap<String, Vec<String>>,
}

impl RegistryState {
    fn remove(&mut self, session_id: &str) -> Option<SessionInformation> {
        let info = self.sessions.remove(session_id)?;
        if let Some(ids) = self.by_principal.get_mut(&info.principal) {
            ids.retain(|id| id != session_id);
            if ids.is_empty() {
                self.by_principal.remove(&info.principal);
            }
        }
        Some(info)
    }

    /// Drops the sessions of `principal` that `live` rejects.
    fn prune(&mut self, principal: &str, live: impl Fn(&SessionInformation) -> bool) {
        let dead: Vec<String> = self
            .by_principal
            .get(principal)
            .into_iter()
            .flatten()
            .filter(|id| self.sessions.get(*id).map_or(true, |info| !live(info)))
            .cloned()
            .collect();
        for id in dead {
            self.remove(&id);
        }
    }
}

/// Tracks live sessions per principal and enforces the concurrent session limit.
///
/// # Spring Security Equivalent
/// `SessionRegistryImpl`
///
/// All state sits behind one mutex, so two simultaneous logins for the same
/// principal are ordered and the second always sees the first.
#[derive(Debug)]
pub struct SessionRegistry {
    maximum_sessions: Option<usize>,
    policy: ConcurrencyPolicy,
    idle_timeout: Option<Duration>,
    state: Mutex<RegistryState>,
}

impl SessionRegistry {
    pub fn new(config: &SessionConfig) -> Self {
        SessionRegistry {
            maximum_sessions: config.maximum_sessions,
            policy: config.concurrency_policy,
            idle_timeout: config.idle_timeout,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Registers a new session for `principal`.
    ///
    /// Returns the ids of sessions dropped to stay within the limit.
    ///
    /// Dropped and idle sessions of `principal` leave the registry here, so
    /// an evicted id is simply unknown when its cookie comes back.
    pub fn register(&self, principal: &str, session_id: &str) -> Result<Vec<String>, SessionError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.remove(session_id);
        state.prune(principal, |info| self.is_live(info));

        let mut evicted = Vec::new();
        if let Some(max) = self.maximum_sessions {
            let live = state.by_principal.get(principal).cloned().unwrap_or_default();

            if live.len() >= max {
                if self.policy == ConcurrencyPolicy::RejectNew {
                    return Err(SessionError::LimitExceeded {
                        principal: principal.to_string(),
                    });
                }
                for id in &live[..live.len() + 1 - max.max(1)] {
                    if state.remove(id).is_some() {
                        evicted.push(id.clone());
                    }
                }
            }
        }

        state.sessions.insert(
            session_id.to_string(),
            SessionInformation {
                session_id: session_id.to_string(),
                principal: principal.to_string(),
                created_at: SystemTime::now(),
                last_request: Instant::now(),
            },
        );
        state
            .by_principal
            .entry(principal.to_string())
            .or_default()
            .push(session_id.to_string());

        Ok(evicted)
    }

    /// Removes a session (logout).
    pub fn invalidate(&self, session_id: &str) -> Option<SessionInformation> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id)
    }

    /// Whether `session_id` is registered and not idle too long.
    ///
    /// Sessions found dead are dropped from the registry.
    pub fn is_valid(&self, session_id: &str) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let live = match state.sessions.get(session_id) {
            None => return false,
            Some(info) => self.is_live(info),
        };
        if !live {
            state.remove(session_id);
        }
        live
    }

    /// Records activity on a session.
    pub fn touch(&self, session_id: &str) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(info) = state.sessions.get_mut(session_id) {
            info.last_request = Instant::now();
        }
    }

    /// Number of registered sessions across all principals.
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sessions
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sessions of `principal`, oldest first.
    pub fn sessions_for(&self, principal: &str, include_expired: bool) -> Vec<SessionInformation> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .by_principal
            .get(principal)
            .into_iter()
            .flatten()
            .filter_map(|id| state.sessions.get(id))
            .filter(|info| include_expired || self.is_live(info))
            .cloned()
            .collect()
    }

    fn is_live(&self, info: &SessionInformation) -> bool {
        self.idle_timeout
            .map_or(true, |timeout| info.last_request.elapsed() < timeout)
    }
}

// =============================================================================
// Session User Data
// =============================================================================

/// What the session store holds for a logged-in principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub email: String,
    /// Registry id of this login.
    pub session_id: String,
}

// =============================================================================
// Session Authenticator
// =============================================================================

/// Resolves the principal from the session, falling back to remember-me.
///
/// # Spring Security Equivalent
/// `SecurityContextPersistenceFilter`, `ConcurrentSessionFilter` and
/// `RememberMeAuthenticationFilter`
#[derive(Clone)]
pub struct SessionAuthenticator {
    config: SessionConfig,
    registry: Arc<SessionRegistry>,
    users: Arc<dyn UserRepository>,
    remember_me: Option<RememberMeServices>,
    audit: AuditLogger,
}

impl fmt::Debug for SessionAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionAuthenticator")
            .field("config", &self.config)
            .field("remember_me", &self.remember_me.is_some())
            .finish_non_exhaustive()
    }
}

impl SessionAuthenticator {
    pub fn new(
        config: SessionConfig,
        registry: Arc<SessionRegistry>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            config,
            registry,
            users,
            remember_me: None,
            audit: AuditLogger::new(),
        }
    }

    pub fn remember_me(mut self, services: RememberMeServices) -> Self {
        self.remember_me = Some(services);
        self
    }

    pub fn audit(mut self, audit: AuditLogger) -> Self {
        self.audit = audit;
        self
    }

    /// Establishes a login for `user` in `session` and registers it.
    ///
    /// A previous login held by the same session is released first.
    pub fn login(&self, session: &Session, user: &User) -> Result<SessionUser, SessionError> {
        if let Some(previous) = self.current(session) {
            self.registry.invalidate(&previous.session_id);
        }

        match self.config.fixation_strategy {
            SessionFixationStrategy::MigrateSession => session.renew(),
            SessionFixationStrategy::NewSession => {
                session.clear();
                session.renew();
            }
            SessionFixationStrategy::None => {}
        }

        let session_user = SessionUser {
            email: user.get_email().to_string(),
            session_id: new_session_id(),
        };

        let evicted = self
            .registry
            .register(&session_user.email, &session_user.session_id)?;
        for id in &evicted {
            tracing::info!(principal = %session_user.email, "Expired older session to honour the session limit");
            self.audit.log(SecurityEvent::session_evicted(&session_user.email, id));
        }

        if let Err(e) = session.insert(&self.config.user_key, &session_user) {
            self.registry.invalidate(&session_user.session_id);
            return Err(SessionError::Insert {
                reason: e.to_string(),
            });
        }

        self.audit.log(
            SecurityEvent::new(SecurityEventType::SessionCreated)
                .username(&session_user.email)
                .session_id(&session_user.session_id),
        );
        Ok(session_user)
    }

    /// Ends the login held by `session` and clears the session.
    pub fn logout(&self, session: &Session) -> Option<SessionUser> {
        let current = self.current(session);
        if let Some(ref user) = current {
            self.registry.invalidate(&user.session_id);
        }
        session.purge();
        current
    }

    /// The login stored in `session`, if any.
    pub fn current(&self, session: &Session) -> Option<SessionUser> {
        match session.get::<SessionUser>(&self.config.user_key) {
            Ok(user) => user,
            Err(e) => {
                tracing::debug!(error = %e, "Discarding unreadable session login");
                None
            }
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn remember_me_services(&self) -> Option<&RememberMeServices> {
        self.remember_me.as_ref()
    }

    fn enabled_user(&self, email: &str) -> Option<User> {
        self.users.find_by_email(email).filter(User::is_enabled)
    }

    fn auto_login(&self, req: &ServiceRequest, session: &Session) -> AuthenticationOutcome {
        let Some(services) = &self.remember_me else {
            return AuthenticationOutcome::anonymous();
        };
        let Some(cookie) = req.cookie(services.cookie_name()) else {
            return AuthenticationOutcome::anonymous();
        };

        let error = match services.validate(cookie.value()) {
            Ok((email, rotated)) => match self.enabled_user(&email) {
                Some(user) => match self.login(session, &user) {
                    Ok(_) => {
                        self.audit.log(
                            SecurityEvent::new(SecurityEventType::RememberMeLogin).username(&email),
                        );
                        return AuthenticationOutcome::Authenticated {
                            user,
                            cookie: Some(rotated),
                        };
                    }
                    Err(e) => {
                        tracing::warn!(principal = %email, error = %e, "Remember-me login refused");
                        // The token already rotated; the old cookie must not come back.
                        return AuthenticationOutcome::Anonymous {
                            cookie: Some(services.clear_cookie()),
                        };
                    }
                },
                None => {
                    services.logout(&email);
                    RememberMeError::UserNotFound
                }
            },
            Err(e) => e,
        };

        match &error {
            RememberMeError::TokenReuseDetected { username } => {
                tracing::warn!(principal = %username, "Remember-me token reuse, persistent logins revoked");
                self.audit.log(SecurityEvent::token_reuse_detected(username));
            }
            RememberMeError::Expired => {
                self.audit.log(SecurityEvent::new(SecurityEventType::TokenExpired));
            }
            _ => tracing::debug!(error = %error, "Ignoring remember-me cookie"),
        }

        AuthenticationOutcome::Anonymous {
            cookie: Some(services.clear_cookie()),
        }
    }
}

impl Authenticator for SessionAuthenticator {
    fn authenticate(&self, req: &ServiceRequest) -> AuthenticationOutcome {
        let session = req.get_session();

        let Some(current) = self.current(&session) else {
            return self.auto_login(req, &session);
        };

        if !self.registry.is_valid(&current.session_id) {
            session.purge();
            self.audit.log(
                SecurityEvent::new(SecurityEventType::InvalidSession)
                    .username(&current.email)
                    .session_id(&current.session_id)
                    .url(routing_path(req)),
            );
            return AuthenticationOutcome::InvalidSession {
                redirect_url: self.config.get_invalid_session_url().to_string(),
            };
        }

        match self.enabled_user(&current.email) {
            Some(user) => {
                self.registry.touch(&current.session_id);
                AuthenticationOutcome::Authenticated { user, cookie: None }
            }
            None => {
                self.registry.invalidate(&current.session_id);
                session.purge();
                AuthenticationOutcome::anonymous()
            }
        }
    }
}

fn new_session_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LENGTH)
        .map(char::from)
        .collect()
}
