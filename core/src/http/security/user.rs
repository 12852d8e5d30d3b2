//! Registered user account.
//!
//! # Spring Equivalent
//! `UserDetails` backed by the registration `User` entity

use std::fmt;

/// A registered account as seen by the security layer.
///
/// The email address is the login name. Roles are stored without the
/// `ROLE_` prefix (`"ADMIN"`, `"MANAGER"`), authorities are privilege names
/// (`"READ_PRIVILEGE"`).
///
/// # Example
/// ```
/// use registration_security_core::http::security::User;
///
/// let user = User::new("manager@test.com", "$2b$11$...".into())
///     .roles(&["MANAGER".into()])
///     .authorities(&["READ_PRIVILEGE".into()]);
///
/// assert!(user.has_role("MANAGER"));
/// assert!(user.has_authority("READ_PRIVILEGE"));
/// assert!(user.is_enabled());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    id: u64,
    email: String,
    password: String,
    enabled: bool,
    roles: Vec<String>,
    authorities: Vec<String>,
    last_known_country: Option<String>,
}

impl User {
    /// Creates an enabled user with an already encoded password.
    pub fn new(email: &str, encoded_password: String) -> Self {
        User {
            id: 0,
            email: email.to_string(),
            password: encoded_password,
            enabled: true,
            roles: Vec::new(),
            authorities: Vec::new(),
            last_known_country: None,
        }
    }

    pub fn id(mut self, id: u64) -> Self {
        self.id = id;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Adds roles, skipping duplicates.
    pub fn roles(mut self, roles: &[String]) -> Self {
        for role in roles {
            if !self.roles.contains(role) {
                self.roles.push(role.clone());
            }
        }
        self
    }

    /// Adds authorities, skipping duplicates.
    pub fn authorities(mut self, authorities: &[String]) -> Self {
        for authority in authorities {
            if !self.authorities.contains(authority) {
                self.authorities.push(authority.clone());
            }
        }
        self
    }

    pub fn last_known_country(mut self, country: &str) -> Self {
        self.last_known_country = Some(country.to_string());
        self
    }

    pub fn get_id(&self) -> u64 {
        self.id
    }

    /// Returns the login name (the email address).
    pub fn get_username(&self) -> &str {
        &self.email
    }

    pub fn get_email(&self) -> &str {
        &self.email
    }

    /// Returns the encoded password.
    pub fn get_password(&self) -> &str {
        &self.password
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn get_roles(&self) -> &[String] {
        &self.roles
    }

    pub fn get_authorities(&self) -> &[String] {
        &self.authorities
    }

    pub fn get_last_known_country(&self) -> Option<&str> {
        self.last_known_country.as_deref()
    }

    /// Replaces the encoded password (password change flow).
    pub fn set_password(&mut self, encoded_password: String) {
        self.password = encoded_password;
    }

    pub fn set_last_known_country(&mut self, country: &str) {
        self.last_known_country = Some(country.to_string());
    }

    /// Checks a directly granted role. Inherited roles are resolved by
    /// [`RoleHierarchy`](crate::http::security::RoleHierarchy).
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        roles.iter().any(|role| self.has_role(role))
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.iter().any(|a| a == authority)
    }

    pub fn has_any_authority(&self, authorities: &[&str]) -> bool {
        authorities.iter().any(|auth| self.has_authority(auth))
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "User {{ email: {}, enabled: {}, roles: {:?}, authorities: {:?} }}",
            self.email, self.enabled, self.roles, self.authorities
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =============================================================================
    // Creation Tests
    // =============================================================================

    #[test]
    fn test_user_new_is_enabled_without_grants() {
        let user = User::new("alice@test.com", "hash".to_string());
        assert_eq!(user.get_username(), "alice@test.com");
        assert_eq!(user.get_email(), "alice@test.com");
        assert_eq!(user.get_password(), "hash");
        assert!(user.is_enabled());
        assert!(user.get_roles().is_empty());
        assert!(user.get_authorities().is_empty());
        assert_eq!(user.get_last_known_country(), None);
    }

    #[test]
    fn test_user_builder() {
        let user = User::new("bob@test.com", "hash".to_string())
            .id(7)
            .enabled(false)
            .roles(&["USER".into()])
            .authorities(&["READ_PRIVILEGE".into()])
            .last_known_country("FR");

        assert_eq!(user.get_id(), 7);
        assert!(!user.is_enabled());
        assert_eq!(user.get_roles(), &["USER".to_string()]);
        assert_eq!(user.get_last_known_country(), Some("FR"));
    }

    #[test]
    fn test_roles_and_authorities_no_duplicates() {
        let user = User::new("admin@test.com", "hash".to_string())
            .roles(&["ADMIN".into(), "USER".into()])
            .roles(&["ADMIN".into(), "STAFF".into()])
            .authorities(&["READ_PRIVILEGE".into()])
            .authorities(&["READ_PRIVILEGE".into(), "WRITE_PRIVILEGE".into()]);

        assert_eq!(user.get_roles().len(), 3);
        assert_eq!(user.get_authorities().len(), 2);
    }

    // =============================================================================
    // Grant Checks
    // =============================================================================

    #[test]
    fn test_has_role_is_direct_and_case_sensitive() {
        let user = User::new("staff@test.com", "hash".to_string()).roles(&["STAFF".into()]);

        assert!(user.has_role("STAFF"));
        assert!(!user.has_role("staff"));
        assert!(!user.has_role("USER"));
        assert!(user.has_any_role(&["ADMIN", "STAFF"]));
        assert!(!user.has_any_role(&["ADMIN", "MANAGER"]));
    }

    #[test]
    fn test_has_authority() {
        let user = User::new("test@test.com", "hash".to_string())
            .authorities(&["READ_PRIVILEGE".into(), "CHANGE_PASSWORD_PRIVILEGE".into()]);

        assert!(user.has_authority("CHANGE_PASSWORD_PRIVILEGE"));
        assert!(!user.has_authority("WRITE_PRIVILEGE"));
        assert!(user.has_any_authority(&["WRITE_PRIVILEGE", "READ_PRIVILEGE"]));
    }

    // =============================================================================
    // Mutation
    // =============================================================================

    #[test]
    fn test_setters() {
        let mut user = User::new("test@test.com", "old".to_string());
        user.set_password("new".to_string());
        user.set_last_known_country("DE");

        assert_eq!(user.get_password(), "new");
        assert_eq!(user.get_last_known_country(), Some("DE"));
    }

    #[test]
    fn test_display_hides_password() {
        let user = User::new("test@test.com", "secret-hash".to_string()).roles(&["USER".into()]);
        let display = user.to_string();

        assert!(display.contains("test@test.com"));
        assert!(display.contains("USER"));
        assert!(!display.contains("secret-hash"));
    }
}
