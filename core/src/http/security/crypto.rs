//! Password hashing.
//!
//! # Spring Security Equivalent
//! `org.springframework.security.crypto.password.PasswordEncoder`

use derive_more::{Display, Error};

/// Cost factor used for account passwords.
pub const DEFAULT_BCRYPT_COST: u32 = 11;

#[derive(Debug, Display, Error)]
pub enum PasswordEncodingError {
    #[display("password hashing failed: {reason}")]
    Hashing {
        #[error(not(source))]
        reason: String,
    },
}

/// Trait for encoding and verifying passwords.
///
/// # Spring Security Equivalent
/// `PasswordEncoder` interface
///
/// # Example
/// ```
/// use registration_security_core::http::security::crypto::{BCryptPasswordEncoder, PasswordEncoder};
///
/// let encoder = BCryptPasswordEncoder::with_cost(4);
/// let hash = encoder.encode("my_password").unwrap();
/// assert!(encoder.matches("my_password", &hash));
/// ```
pub trait PasswordEncoder: Send + Sync {
    /// Hashes the raw password with a fresh salt.
    fn encode(&self, raw_password: &str) -> Result<String, PasswordEncodingError>;

    /// Verifies a raw password against an encoded one. Malformed hashes
    /// never match.
    fn matches(&self, raw_password: &str, encoded_password: &str) -> bool;

    /// Whether the stored hash should be re-encoded on the next login.
    fn upgrade_encoding(&self, _encoded_password: &str) -> bool {
        false
    }
}

/// BCrypt password encoder.
///
/// # Spring Security Equivalent
/// `BCryptPasswordEncoder(11)`
///
/// Verification goes through `bcrypt::verify`, which compares digests in
/// constant time.
#[derive(Clone, Debug)]
pub struct BCryptPasswordEncoder {
    cost: u32,
}

impl BCryptPasswordEncoder {
    /// Creates an encoder with cost 11.
    pub fn new() -> Self {
        Self::with_cost(DEFAULT_BCRYPT_COST)
    }

    /// Creates an encoder with a custom cost, clamped to bcrypt's 4..=31.
    pub fn with_cost(cost: u32) -> Self {
        BCryptPasswordEncoder {
            cost: cost.clamp(4, 31),
        }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }
}

impl Default for BCryptPasswordEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordEncoder for BCryptPasswordEncoder {
    fn encode(&self, raw_password: &str) -> Result<String, PasswordEncodingError> {
        bcrypt::hash(raw_password, self.cost).map_err(|e| PasswordEncodingError::Hashing {
            reason: e.to_string(),
        })
    }

    fn matches(&self, raw_password: &str, encoded_password: &str) -> bool {
        bcrypt::verify(raw_password, encoded_password).unwrap_or(false)
    }

    fn upgrade_encoding(&self, encoded_password: &str) -> bool {
        // $2b$11$<salt+hash>
        encoded_password
            .split('$')
            .nth(2)
            .and_then(|cost| cost.parse::<u32>().ok())
            .map_or(true, |cost| cost < self.cost)
    }
}
