//! Username/password authentication with a post-authentication location check.
//!
//! # Spring Security Equivalent
//! `DaoAuthenticationProvider` with `setPostAuthenticationChecks(differentLocationChecker)`

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, OnceLock};

use actix_web::http::header;
use actix_web::HttpRequest;
use derive_more::{Display, Error};

use crate::http::security::audit::{AuditLogger, SecurityEvent};
use crate::http::security::crypto::PasswordEncoder;
use crate::http::security::location::{LocationCheck, LocationChecker, LocationPolicy};
use crate::http::security::repository::UserRepository;
use crate::http::security::user::User;

#[derive(Debug, Display, Error, PartialEq, Eq)]
pub enum AuthenticationError {
    #[display("user not found")]
    UserNotFound,
    #[display("bad credentials")]
    BadCredentials,
    #[display("user is disabled")]
    Disabled,
    #[display("login from {current}, expected {known}")]
    LocationMismatch {
        #[error(not(source))]
        known: String,
        current: String,
    },
}

/// Request facts the provider needs beyond the credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginContext {
    pub ip: Option<IpAddr>,
    pub user_agent: Option<String>,
}

impl LoginContext {
    /// Reads the client address and user agent.
    ///
    /// The address comes from the socket unless `trust_forwarded` is set, in
    /// which case `Forwarded`/`X-Forwarded-For` win. Only trust those headers
    /// behind a proxy that overwrites them.
    pub fn from_request(req: &HttpRequest, trust_forwarded: bool) -> Self {
        let ip = if trust_forwarded {
            req.connection_info()
                .realip_remote_addr()
                .and_then(parse_ip)
        } else {
            req.peer_addr().map(|addr| addr.ip())
        };
        let user_agent = req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        LoginContext { ip, user_agent }
    }
}

fn parse_ip(addr: &str) -> Option<IpAddr> {
    addr.parse::<IpAddr>()
        .ok()
        .or_else(|| addr.parse::<SocketAddr>().ok().map(|s| s.ip()))
}

/// A successful login.
#[derive(Debug, Clone)]
pub struct Authentication {
    pub user: User,
    pub location: LocationCheck,
}

impl Authentication {
    /// Whether the login succeeded from an unexpected country.
    pub fn is_flagged(&self) -> bool {
        self.location.is_mismatch()
    }
}

/// Verifies credentials against the [`UserRepository`].
#[derive(Clone)]
pub struct AuthenticationProvider {
    users: Arc<dyn UserRepository>,
    encoder: Arc<dyn PasswordEncoder>,
    location: LocationChecker,
    location_policy: LocationPolicy,
    audit: AuditLogger,
    unknown_user_hash: Arc<OnceLock<Option<String>>>,
}

impl fmt::Debug for AuthenticationProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationProvider")
            .field("location", &self.location)
            .field("location_policy", &self.location_policy)
            .finish_non_exhaustive()
    }
}

impl AuthenticationProvider {
    pub fn new(users: Arc<dyn UserRepository>, encoder: Arc<dyn PasswordEncoder>) -> Self {
        Self {
            users,
            encoder,
            location: LocationChecker::disabled(),
            location_policy: LocationPolicy::default(),
            audit: AuditLogger::new(),
            unknown_user_hash: Arc::new(OnceLock::new()),
        }
    }

    pub fn location_checker(mut self, checker: LocationChecker) -> Self {
        self.location = checker;
        self
    }

    pub fn location_policy(mut self, policy: LocationPolicy) -> Self {
        self.location_policy = policy;
        self
    }

    pub fn audit(mut self, audit: AuditLogger) -> Self {
        self.audit = audit;
        self
    }

    pub fn authenticate(
        &self,
        username: &str,
        password: &str,
        context: &LoginContext,
    ) -> Result<Authentication, AuthenticationError> {
        let mut user = match self.users.find_by_email(username) {
            Some(user) => user,
            None => {
                self.compare_against_unknown_user(password);
                return Err(self.fail(username, context, AuthenticationError::UserNotFound));
            }
        };

        if !user.is_enabled() {
            return Err(self.fail(username, context, AuthenticationError::Disabled));
        }

        if !self.encoder.matches(password, user.get_password()) {
            return Err(self.fail(username, context, AuthenticationError::BadCredentials));
        }

        let mut changed = false;
        if self.encoder.upgrade_encoding(user.get_password()) {
            match self.encoder.encode(password) {
                Ok(hash) => {
                    user.set_password(hash);
                    changed = true;
                }
                Err(e) => tracing::warn!(principal = %username, error = %e, "Password re-encoding failed"),
            }
        }

        let location = self.location.check(&user, context.ip);
        match &location {
            LocationCheck::Mismatch { known, current } => {
                tracing::warn!(principal = %username, %known, %current, "Login from a new country");
                self.audit.log(
                    SecurityEvent::suspicious_location(username, known, current)
                        .ip_address(ip_string(context)),
                );
                if self.location_policy == LocationPolicy::Block {
                    return Err(self.fail(
                        username,
                        context,
                        AuthenticationError::LocationMismatch {
                            known: known.clone(),
                            current: current.clone(),
                        },
                    ));
                }
            }
            LocationCheck::Unknown {
                resolved: Some(country),
            } => {
                user.set_last_known_country(country);
                changed = true;
            }
            _ => {}
        }

        if changed {
            self.users.save(user.clone());
        }

        self.audit
            .log(SecurityEvent::login_success(username).ip_address(ip_string(context)));
        Ok(Authentication { user, location })
    }

    /// Runs one hash comparison so unknown accounts take as long as wrong passwords.
    fn compare_against_unknown_user(&self, password: &str) {
        let hash = self
            .unknown_user_hash
            .get_or_init(|| self.encoder.encode("userNotFoundPassword").ok());
        if let Some(hash) = hash {
            self.encoder.matches(password, hash);
        }
    }

    fn fail(
        &self,
        username: &str,
        context: &LoginContext,
        error: AuthenticationError,
    ) -> AuthenticationError {
        tracing::info!(principal = %username, reason = %error, "Authentication failed");
        self.audit.log(
            SecurityEvent::login_failure(username, &error.to_string()).ip_address(ip_string(context)),
        );
        error
    }
}

fn ip_string(context: &LoginContext) -> String {
    context
        .ip
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::sync::Mutex;

    use actix_web::test::TestRequest;

    use super::*;
    use crate::http::security::audit::SecurityEventType;
    use crate::http::security::crypto::BCryptPasswordEncoder;
    use crate::http::security::location::InMemoryGeoIpResolver;
    use crate::http::security::repository::InMemoryUserRepository;

    const LONDON: IpAddr = IpAddr::V4(Ipv4Addr::new(81, 2, 69, 160));
    const NEW_YORK: IpAddr = IpAddr::V4(Ipv4Addr::new(216, 160, 83, 56));

    fn setup() -> (AuthenticationProvider, Arc<InMemoryUserRepository>) {
        let encoder = BCryptPasswordEncoder::with_cost(4);
        let users = Arc::new(
            InMemoryUserRepository::new()
                .with_user(
                    User::new("test@test.com", encoder.encode("test").unwrap())
                        .roles(&["USER".into()]),
                )
                .with_user(User::new("off@test.com", encoder.encode("test").unwrap()).enabled(false)),
        );
        let checker = LocationChecker::new(Arc::new(
            InMemoryGeoIpResolver::new()
                .with_country(LONDON, "GB")
                .with_country(NEW_YORK, "US"),
        ));
        let provider = AuthenticationProvider::new(users.clone(), Arc::new(encoder))
            .location_checker(checker);
        (provider, users)
    }

    fn from(ip: IpAddr) -> LoginContext {
        LoginContext {
            ip: Some(ip),
            user_agent: None,
        }
    }

    #[test]
    fn test_valid_credentials() {
        let (provider, _) = setup();
        let auth = provider
            .authenticate("test@test.com", "test", &LoginContext::default())
            .unwrap();

        assert_eq!(auth.user.get_email(), "test@test.com");
        assert!(!auth.is_flagged());
    }

    #[test]
    fn test_unknown_user() {
        let (provider, _) = setup();
        assert_eq!(
            provider
                .authenticate("nobody@test.com", "test", &LoginContext::default())
                .unwrap_err(),
            AuthenticationError::UserNotFound
        );
    }

    #[test]
    fn test_wrong_password() {
        let (provider, _) = setup();
        assert_eq!(
            provider
                .authenticate("test@test.com", "nope", &LoginContext::default())
                .unwrap_err(),
            AuthenticationError::BadCredentials
        );
    }

    #[test]
    fn test_disabled_user() {
        let (provider, _) = setup();
        assert_eq!(
            provider
                .authenticate("off@test.com", "test", &LoginContext::default())
                .unwrap_err(),
            AuthenticationError::Disabled
        );
    }

    #[test]
    fn test_first_login_records_country() {
        let (provider, users) = setup();
        provider
            .authenticate("test@test.com", "test", &from(LONDON))
            .unwrap();

        assert_eq!(
            users
                .find_by_email("test@test.com")
                .unwrap()
                .get_last_known_country(),
            Some("GB")
        );
    }

    #[test]
    fn test_mismatch_is_flagged_under_notify() {
        let (provider, users) = setup();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let provider = provider.audit(
            AuditLogger::new().with_handler(move |e| sink.lock().unwrap().push(e.event_type.clone())),
        );

        provider.authenticate("test@test.com", "test", &from(LONDON)).unwrap();
        let auth = provider
            .authenticate("test@test.com", "test", &from(NEW_YORK))
            .unwrap();

        assert!(auth.is_flagged());
        assert_eq!(
            users
                .find_by_email("test@test.com")
                .unwrap()
                .get_last_known_country(),
            Some("GB")
        );
        assert!(events
            .lock()
            .unwrap()
            .contains(&SecurityEventType::SuspiciousLocation));
    }

    #[test]
    fn test_mismatch_fails_under_block() {
        let (provider, _) = setup();
        let provider = provider.location_policy(LocationPolicy::Block);

        provider.authenticate("test@test.com", "test", &from(LONDON)).unwrap();
        assert_eq!(
            provider
                .authenticate("test@test.com", "test", &from(NEW_YORK))
                .unwrap_err(),
            AuthenticationError::LocationMismatch {
                known: "GB".into(),
                current: "US".into()
            }
        );
    }

    #[test]
    fn test_failures_are_audited() {
        let (provider, _) = setup();
        let failures = Arc::new(Mutex::new(0));
        let sink = failures.clone();
        let provider = provider.audit(AuditLogger::new().with_handler(move |e| {
            if e.event_type == SecurityEventType::AuthenticationFailure {
                *sink.lock().unwrap() += 1;
            }
        }));

        let _ = provider.authenticate("test@test.com", "nope", &LoginContext::default());
        let _ = provider.authenticate("nobody@test.com", "nope", &LoginContext::default());

        assert_eq!(*failures.lock().unwrap(), 2);
    }

    #[test]
    fn test_weak_hash_is_upgraded_on_login() {
        let weak = BCryptPasswordEncoder::with_cost(4);
        let users = Arc::new(
            InMemoryUserRepository::new()
                .with_user(User::new("test@test.com", weak.encode("test").unwrap())),
        );
        let provider =
            AuthenticationProvider::new(users.clone(), Arc::new(BCryptPasswordEncoder::with_cost(5)));

        provider
            .authenticate("test@test.com", "test", &LoginContext::default())
            .unwrap();

        let stored = users.find_by_email("test@test.com").unwrap();
        assert!(stored.get_password().starts_with("$2b$05$"));
    }

    #[test]
    fn test_login_context_from_request() {
        let req = TestRequest::default()
            .insert_header(("x-forwarded-for", "81.2.69.160"))
            .insert_header((header::USER_AGENT, "Mozilla/5.0"))
            .to_http_request();
        let context = LoginContext::from_request(&req, true);

        assert_eq!(context.ip, Some(LONDON));
        assert_eq!(context.user_agent.as_deref(), Some("Mozilla/5.0"));
    }

    #[test]
    fn test_login_context_ignores_forwarded_by_default() {
        let req = TestRequest::default()
            .peer_addr("216.160.83.56:40000".parse().unwrap())
            .insert_header(("x-forwarded-for", "81.2.69.160"))
            .to_http_request();
        let context = LoginContext::from_request(&req, false);

        assert_eq!(context.ip, Some("216.160.83.56".parse().unwrap()));

        let local = TestRequest::default().to_http_request();
        assert_eq!(LoginContext::from_request(&local, false).ip, None);
    }

    #[test]
    fn test_parse_ip_with_port() {
        assert_eq!(parse_ip("127.0.0.1:8080"), Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));
        assert_eq!(parse_ip("[::1]:443"), Some("::1".parse().unwrap()));
        assert_eq!(parse_ip("not-an-ip"), None);
    }
}
