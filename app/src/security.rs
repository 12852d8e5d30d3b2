//! The application's security configuration: URL rules, role hierarchy,
//! session management, remember-me and form login.
//!
//! # Spring Security Equivalent
//! `SecSecurityConfig`

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use actix_session::config::CookieContentSecurity;
use actix_session::storage::CookieSessionStore;
use actix_session::SessionMiddleware;
use actix_web::cookie::Key;
use actix_web::http::Method;

use registration_security_core::http::security::middleware::SecurityTransform;
use registration_security_core::http::security::{
    AccessDeniedHandler, AccessPolicy, AccessRule, AuditLogger, AuthenticationProvider,
    FormLoginConfig, FormLoginService, GeoIpResolver, HierarchyError, InMemoryTokenRepository,
    InMemoryUserRepository, LocationChecker, MaxMindCountryResolver, PasswordEncoder,
    PasswordEncodingError, PolicyAuthorizer, RememberMeConfig, RememberMeServices, Requirement,
    RoleHierarchy, SessionAuthenticator, SessionConfig, SessionRegistry, User, UserRepository,
};

use crate::error::AppError;
use crate::settings::SecuritySettings;

pub const ROLE_HIERARCHY: &str = "ROLE_ADMIN > ROLE_STAFF\nROLE_STAFF > ROLE_USER";

/// Reachable without authentication.
pub const PUBLIC_PATHS: &[&str] = &[
    "/login*",
    "/logout*",
    "/signin/**",
    "/signup/**",
    "/customLogin",
    "/user/registration*",
    "/registrationConfirm*",
    "/expiredAccount*",
    "/registration*",
    "/badUser*",
    "/user/resendRegistrationToken*",
    "/forgetPassword*",
    "/user/resetPassword*",
    "/user/savePassword*",
    "/updatePassword*",
    "/user/changePassword*",
    "/emailError*",
    "/resources/**",
    "/old/user/registration*",
    "/successRegister*",
    "/qrcode*",
    "/user/enableNewLoc*",
    "/accessDenied",
    "/error*",
    "/h2/**",
];

/// The URL rules, most specific first.
pub fn access_policy() -> Result<AccessPolicy, HierarchyError> {
    Ok(AccessPolicy::new(RoleHierarchy::parse(ROLE_HIERARCHY)?)
        .permit_all(PUBLIC_PATHS)
        .rule(AccessRule::new(&["/roleHierarchy"], Requirement::role("STAFF")).method(Method::GET))
        .rule(AccessRule::new(&["/management*"], Requirement::role("MANAGER")))
        .rule(AccessRule::new(&["/invalidSession*"], Requirement::Anonymous))
        .rule(AccessRule::new(
            &["/user/updatePassword*"],
            Requirement::authority("CHANGE_PASSWORD_PRIVILEGE"),
        ))
        .rule(AccessRule::any_request(Requirement::authority("READ_PRIVILEGE"))))
}

/// Opens the country database, or disables location checks when it cannot be read.
pub fn location_checker(database: Option<&Path>) -> LocationChecker {
    let Some(path) = database else {
        return LocationChecker::disabled();
    };
    match MaxMindCountryResolver::open(path) {
        Ok(resolver) => {
            tracing::info!(path = %path.display(), "Loaded GeoIP country database");
            LocationChecker::new(Arc::new(resolver) as Arc<dyn GeoIpResolver>)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "GeoIP database unavailable, location checks disabled");
            LocationChecker::disabled()
        }
    }
}

/// The demo accounts.
pub fn seed_users(encoder: &dyn PasswordEncoder) -> Result<InMemoryUserRepository, PasswordEncodingError> {
    let privileges = |names: &[&str]| names.iter().map(|n| n.to_string()).collect::<Vec<_>>();

    Ok(InMemoryUserRepository::new()
        .with_user(
            User::new("test@test.com", encoder.encode("test")?)
                .id(1)
                .roles(&["USER".into()])
                .authorities(&privileges(&["READ_PRIVILEGE", "CHANGE_PASSWORD_PRIVILEGE"])),
        )
        .with_user(
            User::new("manager@test.com", encoder.encode("test")?)
                .id(2)
                .roles(&["MANAGER".into()])
                .authorities(&privileges(&["READ_PRIVILEGE"])),
        )
        .with_user(
            User::new("staff@test.com", encoder.encode("staff")?)
                .id(3)
                .roles(&["STAFF".into()])
                .authorities(&privileges(&["READ_PRIVILEGE", "CHANGE_PASSWORD_PRIVILEGE"])),
        )
        .with_user(
            User::new("admin@test.com", encoder.encode("admin")?)
                .id(4)
                .roles(&["ADMIN".into()])
                .authorities(&privileges(&[
                    "READ_PRIVILEGE",
                    "WRITE_PRIVILEGE",
                    "CHANGE_PASSWORD_PRIVILEGE",
                ])),
        ))
}

/// Everything the security layer shares between workers.
#[derive(Debug, Clone)]
pub struct Security {
    sessions: SessionAuthenticator,
    authorizer: PolicyAuthorizer,
    form_login: FormLoginService,
    session_cookie: String,
    secure_cookies: bool,
}

impl Security {
    pub fn new(
        settings: &SecuritySettings,
        users: Arc<dyn UserRepository>,
        encoder: Arc<dyn PasswordEncoder>,
        location: LocationChecker,
        audit: AuditLogger,
    ) -> Result<Self, AppError> {
        let mut session_config = SessionConfig::new()
            .fixation_strategy(settings.session_fixation)
            .maximum_sessions(settings.maximum_sessions)
            .concurrency_policy(settings.concurrency_policy)
            .invalid_session_url("/invalidSession.html");
        if let Some(minutes) = settings.idle_timeout_minutes {
            session_config = session_config.idle_timeout(Duration::from_secs(minutes * 60));
        }
        let registry = Arc::new(SessionRegistry::new(&session_config));

        let remember_me = RememberMeServices::new(
            RememberMeConfig::new(&settings.remember_me_key)
                .token_validity_days(settings.remember_me_validity_days)
                .cookie_secure(settings.secure_cookies),
            Arc::new(InMemoryTokenRepository::new()),
        );

        let sessions = SessionAuthenticator::new(session_config, registry, users.clone())
            .remember_me(remember_me)
            .audit(audit.clone());

        let form_config =
            FormLoginConfig::new().delete_cookies(&[settings.session_cookie.as_str()]);

        let authorizer = PolicyAuthorizer::new(access_policy()?)
            .login_url(form_config.get_login_page())
            .access_denied_handler(AccessDeniedHandler::new().audit(audit.clone()));

        let provider = AuthenticationProvider::new(users, encoder)
            .location_checker(location)
            .location_policy(settings.location_policy)
            .audit(audit.clone());

        let form_login = FormLoginService::new(provider, sessions.clone(), form_config)
            .trust_forwarded_headers(settings.trust_forwarded_headers)
            .audit(audit);

        Ok(Security {
            sessions,
            authorizer,
            form_login,
            session_cookie: settings.session_cookie.clone(),
            secure_cookies: settings.secure_cookies,
        })
    }

    /// The security middleware; wrap it inside [`Security::session_middleware`].
    pub fn transform(&self) -> SecurityTransform<SessionAuthenticator, PolicyAuthorizer> {
        let sessions = self.sessions.clone();
        let authorizer = self.authorizer.clone();
        SecurityTransform::new()
            .config_authenticator(move || sessions.clone())
            .config_authorizer(move || authorizer.clone())
    }

    pub fn session_middleware(&self, key: Key) -> SessionMiddleware<CookieSessionStore> {
        SessionMiddleware::builder(CookieSessionStore::default(), key)
            .cookie_name(self.session_cookie.clone())
            .cookie_secure(self.secure_cookies)
            .cookie_content_security(CookieContentSecurity::Private)
            .build()
    }

    pub fn form_login(&self) -> &FormLoginService {
        &self.form_login
    }

    pub fn sessions(&self) -> &SessionAuthenticator {
        &self.sessions
    }
}

/// Builds the cookie signing key from settings, or a random one.
pub fn session_key(settings: &SecuritySettings) -> Result<Key, AppError> {
    match &settings.session_signing_key {
        Some(secret) => Key::try_from(secret.as_bytes()).map_err(|_| AppError::SigningKey),
        None => Ok(Key::generate()),
    }
}
