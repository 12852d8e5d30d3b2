//! Credential store.
//!
//! # Spring Equivalent
//! `UserRepository` (`findByEmail`, `save`) behind `UserDetailsService`

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::http::security::user::User;

/// Lookup and persistence of registered accounts, keyed by email.
///
/// Implement this for a database backed store; the security layer only
/// needs these two operations.
pub trait UserRepository: Send + Sync {
    fn find_by_email(&self, email: &str) -> Option<User>;

    /// Inserts or replaces the account with the same email.
    fn save(&self, user: User);
}

/// In-memory `UserRepository`, used for seeded demo accounts and tests.
///
/// # Example
///
/// ```
/// use registration_security_core::http::security::{InMemoryUserRepository, User, UserRepository};
///
/// let repository = InMemoryUserRepository::new()
///     .with_user(User::new("test@test.com", "hash".into()).roles(&["USER".into()]));
///
/// assert!(repository.find_by_email("test@test.com").is_some());
/// assert!(repository.find_by_email("other@test.com").is_none());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, user: User) -> Self {
        self.save(user);
        self
    }

    pub fn len(&self) -> usize {
        self.users.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UserRepository for InMemoryUserRepository {
    fn find_by_email(&self, email: &str) -> Option<User> {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(email)
            .cloned()
    }

    fn save(&self, user: User) {
        self.users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user.get_email().to_string(), user);
    }
}
