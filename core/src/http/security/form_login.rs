//! Form-based Login Authentication.
//!
//! # Spring Security Equivalent
//! `formLogin()` and `logout()` on `HttpSecurity`.
//!
//! # Features
//! - POST-based login form processing with configurable parameter names
//! - Session registration with fixation protection and a session limit
//! - Remember-me issuing on login and revocation on logout
//! - Cookie deletion on logout
//!
//! # Example
//! ```rust,ignore
//! use registration_security_core::http::security::form_login::{FormLoginConfig, FormLoginService};
//!
//! let form_login = FormLoginConfig::new()
//!     .login_page("/login")
//!     .default_success_url("/homepage.html")
//!     .failure_url("/login?error=true")
//!     .logout_success_url("/logout.html?logSucc=true")
//!     .delete_cookies(&["JSESSIONID"]);
//!
//! let service = FormLoginService::new(provider, session_authenticator, form_login);
//! ```

use std::collections::HashMap;

use actix_session::Session;
use actix_web::cookie::Cookie;
use actix_web::http::header::LOCATION;
use actix_web::{web, HttpRequest, HttpResponse};
use derive_more::{Display, Error};

use crate::http::security::audit::{AuditLogger, SecurityEvent, SecurityEventType};
use crate::http::security::provider::{AuthenticationProvider, LoginContext};
use crate::http::security::session::SessionAuthenticator;

// =============================================================================
// Form Login Configuration
// =============================================================================

/// Form login configuration.
///
/// # Spring Security Equivalent
/// `FormLoginConfigurer` + `LogoutConfigurer`
#[derive(Debug, Clone)]
pub struct FormLoginConfig {
    login_page: String,
    username_parameter: String,
    password_parameter: String,
    default_success_url: String,
    failure_url: String,
    logout_success_url: String,
    delete_cookies: Vec<String>,
}

impl Default for FormLoginConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl FormLoginConfig {
    pub fn new() -> Self {
        Self {
            login_page: "/login".to_string(),
            username_parameter: "username".to_string(),
            password_parameter: "password".to_string(),
            default_success_url: "/homepage.html".to_string(),
            failure_url: "/login?error=true".to_string(),
            logout_success_url: "/logout.html?logSucc=true".to_string(),
            delete_cookies: vec!["JSESSIONID".to_string()],
        }
    }

    /// # Spring Equivalent
    /// `formLogin().loginPage("/login")`
    pub fn login_page(mut self, url: &str) -> Self {
        self.login_page = url.to_string();
        self
    }

    pub fn username_parameter(mut self, param: &str) -> Self {
        self.username_parameter = param.to_string();
        self
    }

    pub fn password_parameter(mut self, param: &str) -> Self {
        self.password_parameter = param.to_string();
        self
    }

    /// # Spring Equivalent
    /// `formLogin().defaultSuccessUrl("/homepage.html")`
    pub fn default_success_url(mut self, url: &str) -> Self {
        self.default_success_url = url.to_string();
        self
    }

    pub fn failure_url(mut self, url: &str) -> Self {
        self.failure_url = url.to_string();
        self
    }

    pub fn logout_success_url(mut self, url: &str) -> Self {
        self.logout_success_url = url.to_string();
        self
    }

    /// Cookies expired on logout.
    ///
    /// # Spring Equivalent
    /// `logout().deleteCookies("JSESSIONID")`
    pub fn delete_cookies(mut self, names: &[&str]) -> Self {
        self.delete_cookies = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn get_login_page(&self) -> &str {
        &self.login_page
    }

    pub fn get_username_parameter(&self) -> &str {
        &self.username_parameter
    }

    pub fn get_password_parameter(&self) -> &str {
        &self.password_parameter
    }

    pub fn get_default_success_url(&self) -> &str {
        &self.default_success_url
    }

    pub fn get_failure_url(&self) -> &str {
        &self.failure_url
    }

    pub fn get_logout_success_url(&self) -> &str {
        &self.logout_success_url
    }

    pub fn get_delete_cookies(&self) -> &[String] {
        &self.delete_cookies
    }
}

// =============================================================================
// Login Form Data
// =============================================================================

#[derive(Debug, Display, Error, PartialEq, Eq)]
pub enum FormLoginError {
    #[display("missing parameter: {name}")]
    MissingParameter {
        #[error(not(source))]
        name: String,
    },
}

/// Credentials read from a submitted login form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub remember_me: bool,
}

impl LoginForm {
    /// Reads the credentials using the configured parameter names.
    pub fn from_fields(
        fields: &HashMap<String, String>,
        config: &FormLoginConfig,
        remember_me_parameter: &str,
    ) -> Result<Self, FormLoginError> {
        let field = |name: &str| {
            fields
                .get(name)
                .cloned()
                .ok_or_else(|| FormLoginError::MissingParameter {
                    name: name.to_string(),
                })
        };
        Ok(LoginForm {
            username: field(&config.username_parameter)?.trim().to_string(),
            password: field(&config.password_parameter)?,
            remember_me: fields
                .get(remember_me_parameter)
                .is_some_and(|v| matches!(v.as_str(), "on" | "true" | "yes" | "1")),
        })
    }
}

// =============================================================================
// Form Login Service
// =============================================================================

/// Processes login and logout submissions.
///
/// # Spring Security Equivalent
/// `UsernamePasswordAuthenticationFilter` + `LogoutFilter`
///
/// # Example
/// ```rust,ignore
/// async fn login(
///     req: HttpRequest,
///     session: Session,
///     form: web::Form<HashMap<String, String>>,
///     service: web::Data<FormLoginService>,
/// ) -> HttpResponse {
///     service.login(&req, &session, &form).await
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FormLoginService {
    provider: AuthenticationProvider,
    sessions: SessionAuthenticator,
    config: FormLoginConfig,
    audit: AuditLogger,
    trust_forwarded: bool,
}

impl FormLoginService {
    pub fn new(
        provider: AuthenticationProvider,
        sessions: SessionAuthenticator,
        config: FormLoginConfig,
    ) -> Self {
        Self {
            provider,
            sessions,
            config,
            audit: AuditLogger::new(),
            trust_forwarded: false,
        }
    }

    pub fn audit(mut self, audit: AuditLogger) -> Self {
        self.audit = audit;
        self
    }

    /// Take the client address from `Forwarded`/`X-Forwarded-For` (default: false).
    pub fn trust_forwarded_headers(mut self, trust: bool) -> Self {
        self.trust_forwarded = trust;
        self
    }

    /// Authenticates the form, starts a registered session and redirects.
    ///
    /// Any failure, including a refused session, redirects to the failure URL.
    ///
    /// Password hashing runs on the blocking thread pool; the session and
    /// cookies are handled back on the worker.
    pub async fn login(
        &self,
        req: &HttpRequest,
        session: &Session,
        fields: &HashMap<String, String>,
    ) -> HttpResponse {
        let remember_me_parameter = self
            .sessions
            .remember_me_services()
            .map_or("remember-me", |s| s.parameter_name());
        let form = match LoginForm::from_fields(fields, &self.config, remember_me_parameter) {
            Ok(form) => form,
            Err(e) => {
                tracing::debug!(error = %e, "Rejecting incomplete login form");
                return self.on_authentication_failure();
            }
        };

        let context = LoginContext::from_request(req, self.trust_forwarded);
        let provider = self.provider.clone();
        let (username, password) = (form.username.clone(), form.password);
        let authentication =
            match web::block(move || provider.authenticate(&username, &password, &context)).await {
                Ok(Ok(authentication)) => authentication,
                Ok(Err(_)) => return self.on_authentication_failure(),
                Err(e) => {
                    tracing::error!(error = %e, "Authentication task failed");
                    return self.on_authentication_failure();
                }
            };

        if let Err(e) = self.sessions.login(session, &authentication.user) {
            tracing::warn!(principal = %form.username, error = %e, "Session could not be established");
            return self.on_authentication_failure();
        }

        let mut response = HttpResponse::Found();
        response.insert_header((LOCATION, self.config.default_success_url.as_str()));
        if let Some(services) = self.sessions.remember_me_services() {
            if services.should_remember(form.remember_me) {
                response.cookie(services.issue(authentication.user.get_email()));
            }
        }
        response.finish()
    }

    pub fn on_authentication_failure(&self) -> HttpResponse {
        HttpResponse::Found()
            .insert_header((LOCATION, self.config.failure_url.as_str()))
            .finish()
    }

    /// Ends the session, revokes remember-me tokens and expires the configured cookies.
    pub fn logout(&self, session: &Session) -> HttpResponse {
        let principal = self.sessions.logout(session);

        let mut response = HttpResponse::Found();
        response.insert_header((LOCATION, self.config.logout_success_url.as_str()));

        for name in &self.config.delete_cookies {
            let mut cookie = Cookie::build(name.clone(), "").path("/").finish();
            cookie.make_removal();
            response.cookie(cookie);
        }

        if let Some(services) = self.sessions.remember_me_services() {
            let cookie = match &principal {
                Some(user) => services.logout(&user.email),
                None => services.clear_cookie(),
            };
            response.cookie(cookie);
        }

        if let Some(user) = principal {
            tracing::info!(principal = %user.email, "Logged out");
            self.audit.log(
                SecurityEvent::new(SecurityEventType::Logout)
                    .username(&user.email)
                    .session_id(&user.session_id),
            );
        }

        response.finish()
    }

    pub fn config(&self) -> &FormLoginConfig {
        &self.config
    }

    pub fn provider(&self) -> &AuthenticationProvider {
        &self.provider
    }

    pub fn sessions(&self) -> &SessionAuthenticator {
        &self.sessions
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_session::SessionExt;
    use actix_web::test::TestRequest;

    use super::*;
    use crate::http::security::crypto::{BCryptPasswordEncoder, PasswordEncoder};
    use crate::http::security::repository::InMemoryUserRepository;
    use crate::http::security::session::{SessionConfig, SessionRegistry};
    use crate::http::security::user::User;

    fn service() -> FormLoginService {
        let encoder = Arc::new(BCryptPasswordEncoder::with_cost(4));
        let users = Arc::new(InMemoryUserRepository::new().with_user(User::new(
            "test@test.com",
            encoder.encode("test").unwrap(),
        )));
        let config = SessionConfig::new();
        let registry = Arc::new(SessionRegistry::new(&config));
        let sessions = SessionAuthenticator::new(config, registry, users.clone());
        FormLoginService::new(
            AuthenticationProvider::new(users, encoder),
            sessions,
            FormLoginConfig::new(),
        )
    }

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_form_login_config_default() {
        let config = FormLoginConfig::new();

        assert_eq!(config.get_login_page(), "/login");
        assert_eq!(config.get_username_parameter(), "username");
        assert_eq!(config.get_password_parameter(), "password");
        assert_eq!(config.get_default_success_url(), "/homepage.html");
        assert_eq!(config.get_failure_url(), "/login?error=true");
        assert_eq!(config.get_logout_success_url(), "/logout.html?logSucc=true");
        assert_eq!(config.get_delete_cookies(), ["JSESSIONID"]);
    }

    #[test]
    fn test_form_login_config_builder() {
        let config = FormLoginConfig::new()
            .login_page("/auth/login")
            .username_parameter("email")
            .password_parameter("pass")
            .default_success_url("/dashboard")
            .failure_url("/auth/login?failed=true")
            .logout_success_url("/auth/login?loggedout")
            .delete_cookies(&["SESSION", "XSRF-TOKEN"]);

        assert_eq!(config.get_login_page(), "/auth/login");
        assert_eq!(config.get_username_parameter(), "email");
        assert_eq!(config.get_password_parameter(), "pass");
        assert_eq!(config.get_default_success_url(), "/dashboard");
        assert_eq!(config.get_failure_url(), "/auth/login?failed=true");
        assert_eq!(config.get_logout_success_url(), "/auth/login?loggedout");
        assert_eq!(config.get_delete_cookies(), ["SESSION", "XSRF-TOKEN"]);
    }

    #[test]
    fn test_login_form_remember_me() {
        let config = FormLoginConfig::new();

        let form = LoginForm::from_fields(
            &fields(&[("username", " user@test.com "), ("password", "pass"), ("remember-me", "on")]),
            &config,
            "remember-me",
        )
        .unwrap();
        assert_eq!(form.username, "user@test.com");
        assert!(form.remember_me);

        let form = LoginForm::from_fields(
            &fields(&[("username", "user@test.com"), ("password", "pass")]),
            &config,
            "remember-me",
        )
        .unwrap();
        assert!(!form.remember_me);
    }

    #[test]
    fn test_login_form_custom_parameters() {
        let config = FormLoginConfig::new()
            .username_parameter("email")
            .password_parameter("secret");

        let form = LoginForm::from_fields(
            &fields(&[("email", "user@test.com"), ("secret", "pass")]),
            &config,
            "remember-me",
        )
        .unwrap();
        assert_eq!(form.password, "pass");

        assert_eq!(
            LoginForm::from_fields(&fields(&[("email", "user@test.com")]), &config, "remember-me"),
            Err(FormLoginError::MissingParameter {
                name: "secret".into()
            })
        );
    }

    #[actix_web::test]
    async fn test_login_redirects_on_outcome() {
        let service = service();

        let req = TestRequest::post().to_http_request();
        let res = service
            .login(&req, &req.get_session(), &fields(&[("username", "test@test.com"), ("password", "test")]))
            .await;
        assert_eq!(res.headers().get(LOCATION).unwrap(), "/homepage.html");
        assert_eq!(service.sessions().registry().len(), 1);

        let req = TestRequest::post().to_http_request();
        let res = service
            .login(&req, &req.get_session(), &fields(&[("username", "test@test.com"), ("password", "nope")]))
            .await;
        assert_eq!(res.headers().get(LOCATION).unwrap(), "/login?error=true");

        let res = service
            .login(&req, &req.get_session(), &fields(&[("username", "test@test.com")]))
            .await;
        assert_eq!(res.headers().get(LOCATION).unwrap(), "/login?error=true");
    }
}
