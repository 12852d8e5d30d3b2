//! Persistent remember-me logins.
//!
//! # Spring Security Equivalent
//! `PersistentTokenBasedRememberMeServices` with a `PersistentTokenRepository`
//!
//! Each remembered login is a *series* that stays fixed for the life of the
//! login and a *token* that is replaced every time the cookie is used. The
//! cookie carries `series:token` plus an HMAC-SHA256 signature under the
//! shared key. Presenting a known series with an old token means the cookie
//! was copied and used elsewhere, so every persistent login of that user is
//! revoked.
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use registration_security_core::http::security::remember_me::{
//!     InMemoryTokenRepository, RememberMeConfig, RememberMeServices,
//! };
//!
//! let services = RememberMeServices::new(
//!     RememberMeConfig::new("theKey"),
//!     Arc::new(InMemoryTokenRepository::new()),
//! );
//!
//! let cookie = services.issue("test@test.com");
//! let (username, rotated) = services.validate(cookie.value()).unwrap();
//! assert_eq!(username, "test@test.com");
//! assert_ne!(rotated.value(), cookie.value());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, SystemTime};

use actix_web::cookie::{Cookie, SameSite};
use base64::prelude::*;
use derive_more::{Display, Error};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const SERIES_LENGTH: usize = 16;
const TOKEN_LENGTH: usize = 16;

// =============================================================================
// Remember-Me Configuration
// =============================================================================

/// Remember-me cookie and token settings.
///
/// # Spring Security Equivalent
/// `RememberMeConfigurer`
#[derive(Clone)]
pub struct RememberMeConfig {
    key: String,
    token_validity: Duration,
    cookie_name: String,
    cookie_path: String,
    cookie_domain: Option<String>,
    cookie_secure: bool,
    cookie_http_only: bool,
    cookie_same_site: SameSite,
    parameter_name: String,
    always_remember: bool,
}

impl fmt::Debug for RememberMeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RememberMeConfig")
            .field("token_validity", &self.token_validity)
            .field("cookie_name", &self.cookie_name)
            .field("parameter_name", &self.parameter_name)
            .field("always_remember", &self.always_remember)
            .finish_non_exhaustive()
    }
}

impl RememberMeConfig {
    /// Creates a configuration signing cookies with `key`. Tokens are valid for 14 days.
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            token_validity: Duration::from_secs(14 * 24 * 60 * 60),
            cookie_name: "remember-me".to_string(),
            cookie_path: "/".to_string(),
            cookie_domain: None,
            cookie_secure: true,
            cookie_http_only: true,
            cookie_same_site: SameSite::Lax,
            parameter_name: "remember-me".to_string(),
            always_remember: false,
        }
    }

    pub fn token_validity_days(mut self, days: u64) -> Self {
        self.token_validity = Duration::from_secs(days * 24 * 60 * 60);
        self
    }

    pub fn token_validity_seconds(mut self, seconds: u64) -> Self {
        self.token_validity = Duration::from_secs(seconds);
        self
    }

    pub fn cookie_name(mut self, name: &str) -> Self {
        self.cookie_name = name.to_string();
        self
    }

    pub fn cookie_path(mut self, path: &str) -> Self {
        self.cookie_path = path.to_string();
        self
    }

    pub fn cookie_domain(mut self, domain: &str) -> Self {
        self.cookie_domain = Some(domain.to_string());
        self
    }

    pub fn cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    pub fn cookie_http_only(mut self, http_only: bool) -> Self {
        self.cookie_http_only = http_only;
        self
    }

    pub fn cookie_same_site(mut self, same_site: SameSite) -> Self {
        self.cookie_same_site = same_site;
        self
    }

    /// Login form field that opts in to remember-me.
    pub fn parameter_name(mut self, name: &str) -> Self {
        self.parameter_name = name.to_string();
        self
    }

    /// Remember every login regardless of the form field.
    pub fn always_remember(mut self, always: bool) -> Self {
        self.always_remember = always;
        self
    }

    pub fn get_token_validity(&self) -> Duration {
        self.token_validity
    }

    pub fn get_cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn get_parameter_name(&self) -> &str {
        &self.parameter_name
    }

    pub fn is_always_remember(&self) -> bool {
        self.always_remember
    }
}

// =============================================================================
// Token Storage
// =============================================================================

/// A stored persistent login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistentRememberMeToken {
    pub series: String,
    pub token_value: String,
    pub username: String,
    pub last_used: SystemTime,
}

/// Storage for persistent logins.
///
/// # Spring Security Equivalent
/// `PersistentTokenRepository`
pub trait PersistentTokenRepository: Send + Sync {
    fn create_new_token(&self, token: PersistentRememberMeToken);

    fn update_token(&self, series: &str, token_value: &str, last_used: SystemTime);

    fn get_token_for_series(&self, series: &str) -> Option<PersistentRememberMeToken>;

    fn remove_series(&self, series: &str);

    fn remove_user_tokens(&self, username: &str);

    /// Drops every series last used before `cutoff`.
    fn remove_tokens_used_before(&self, cutoff: SystemTime);
}

/// In-memory `PersistentTokenRepository`.
///
/// # Spring Security Equivalent
/// `InMemoryTokenRepositoryImpl`
#[derive(Debug, Default)]
pub struct InMemoryTokenRepository {
    tokens: RwLock<HashMap<String, PersistentRememberMeToken>>,
}

impl InMemoryTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tokens.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PersistentTokenRepository for InMemoryTokenRepository {
    fn create_new_token(&self, token: PersistentRememberMeToken) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.series.clone(), token);
    }

    fn update_token(&self, series: &str, token_value: &str, last_used: SystemTime) {
        let mut tokens = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = tokens.get_mut(series) {
            token.token_value = token_value.to_string();
            token.last_used = last_used;
        }
    }

    fn get_token_for_series(&self, series: &str) -> Option<PersistentRememberMeToken> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(series)
            .cloned()
    }

    fn remove_series(&self, series: &str) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(series);
    }

    fn remove_user_tokens(&self, username: &str) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, token| token.username != username);
    }

    fn remove_tokens_used_before(&self, cutoff: SystemTime) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, token| token.last_used >= cutoff);
    }
}

// =============================================================================
// Remember-Me Services
// =============================================================================

#[derive(Debug, Display, Error, PartialEq, Eq)]
pub enum RememberMeError {
    #[display("remember-me cookie is malformed or incorrectly signed")]
    Malformed,
    #[display("no persistent login for the presented series")]
    SeriesNotFound,
    #[display("remember-me login has expired")]
    Expired,
    /// Known series, stale token. All of the user's persistent logins were removed.
    #[display("remember-me token reuse detected for {username}")]
    TokenReuseDetected {
        #[error(not(source))]
        username: String,
    },
    #[display("remembered user no longer exists or is disabled")]
    UserNotFound,
}

/// Issues, validates and revokes persistent logins.
///
/// Issue, validate-and-rotate and logout run one at a time so that two
/// requests racing with the same cookie cannot both rotate it.
#[derive(Clone)]
pub struct RememberMeServices {
    config: RememberMeConfig,
    repository: Arc<dyn PersistentTokenRepository>,
    lock: Arc<Mutex<()>>,
}

impl RememberMeServices {
    pub fn new(config: RememberMeConfig, repository: Arc<dyn PersistentTokenRepository>) -> Self {
        Self {
            config,
            repository,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Starts a new series for `username` and returns the cookie to set.
    ///
    /// # Spring Equivalent
    /// `RememberMeServices.loginSuccess()`
    pub fn issue(&self, username: &str) -> Cookie<'static> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(cutoff) = SystemTime::now().checked_sub(self.config.token_validity) {
            self.repository.remove_tokens_used_before(cutoff);
        }

        let token = PersistentRememberMeToken {
            series: random_value(SERIES_LENGTH),
            token_value: random_value(TOKEN_LENGTH),
            username: username.to_string(),
            last_used: SystemTime::now(),
        };
        self.repository.create_new_token(token.clone());

        self.create_cookie(self.encode(&token.series, &token.token_value))
    }

    /// Checks a cookie value and rotates its token.
    ///
    /// Returns the remembered username and the replacement cookie.
    ///
    /// # Spring Equivalent
    /// `RememberMeServices.autoLogin()`
    pub fn validate(&self, cookie_value: &str) -> Result<(String, Cookie<'static>), RememberMeError> {
        let (series, presented) = self.decode(cookie_value)?;

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let stored = self
            .repository
            .get_token_for_series(&series)
            .ok_or(RememberMeError::SeriesNotFound)?;

        if !bool::from(presented.as_bytes().ct_eq(stored.token_value.as_bytes())) {
            self.repository.remove_user_tokens(&stored.username);
            return Err(RememberMeError::TokenReuseDetected {
                username: stored.username,
            });
        }

        let age = SystemTime::now()
            .duration_since(stored.last_used)
            .unwrap_or_default();
        if age > self.config.token_validity {
            self.repository.remove_series(&series);
            return Err(RememberMeError::Expired);
        }

        let next = random_value(TOKEN_LENGTH);
        self.repository.update_token(&series, &next, SystemTime::now());

        Ok((stored.username, self.create_cookie(self.encode(&series, &next))))
    }

    /// Removes every persistent login of `username` and returns a cookie that clears the browser's copy.
    pub fn logout(&self, username: &str) -> Cookie<'static> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.repository.remove_user_tokens(username);
        self.clear_cookie()
    }

    /// A removal cookie for the remember-me cookie.
    pub fn clear_cookie(&self) -> Cookie<'static> {
        let mut cookie = self.cookie_builder(String::new());
        cookie.make_removal();
        cookie
    }

    /// Whether a login with the form field set to `requested` should be remembered.
    pub fn should_remember(&self, requested: bool) -> bool {
        self.config.always_remember || requested
    }

    pub fn cookie_name(&self) -> &str {
        &self.config.cookie_name
    }

    pub fn parameter_name(&self) -> &str {
        &self.config.parameter_name
    }

    pub fn config(&self) -> &RememberMeConfig {
        &self.config
    }

    fn create_cookie(&self, value: String) -> Cookie<'static> {
        let mut cookie = self.cookie_builder(value);
        cookie.set_max_age(actix_web::cookie::time::Duration::seconds(
            self.config.token_validity.as_secs() as i64,
        ));
        cookie
    }

    fn cookie_builder(&self, value: String) -> Cookie<'static> {
        let mut cookie = Cookie::build(self.config.cookie_name.clone(), value)
            .path(self.config.cookie_path.clone())
            .http_only(self.config.cookie_http_only)
            .secure(self.config.cookie_secure)
            .same_site(self.config.cookie_same_site);

        if let Some(domain) = &self.config.cookie_domain {
            cookie = cookie.domain(domain.clone());
        }

        cookie.finish()
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(self.config.key.as_bytes())
            .expect("HMAC can take a key of any size")
    }

    fn encode(&self, series: &str, token: &str) -> String {
        let payload = format!("{}:{}", series, token);
        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        let signature = BASE64_URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        BASE64_URL_SAFE_NO_PAD.encode(format!("{}:{}", payload, signature))
    }

    fn decode(&self, cookie_value: &str) -> Result<(String, String), RememberMeError> {
        let raw = BASE64_URL_SAFE_NO_PAD
            .decode(cookie_value)
            .map_err(|_| RememberMeError::Malformed)?;
        let raw = String::from_utf8(raw).map_err(|_| RememberMeError::Malformed)?;

        let mut parts = raw.split(':');
        let (series, token, signature) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(series), Some(token), Some(signature), None) => (series, token, signature),
            _ => return Err(RememberMeError::Malformed),
        };
        let signature = BASE64_URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| RememberMeError::Malformed)?;

        let mut mac = self.mac();
        mac.update(format!("{}:{}", series, token).as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| RememberMeError::Malformed)?;

        Ok((series.to_string(), token.to_string()))
    }
}

fn random_value(len: usize) -> String {
    let bytes: Vec<u8> = (0..len).map(|_| rand::thread_rng().gen()).collect();
    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}
