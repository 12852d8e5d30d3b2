//! Ordered URL access rules.
//!
//! # Spring Security Equivalent
//! `HttpSecurity.authorizeRequests()` with `antMatchers(..)`
//!
//! Rules are evaluated in the order they were added and the first rule whose
//! method and pattern match decides. More specific rules must therefore be
//! added before general ones, and the catch-all last. A request that matches
//! no rule is denied.

use std::fmt;

use actix_web::http::Method;
use derive_more::{Display, Error};

use crate::http::security::ant_matcher::AntMatchers;
use crate::http::security::hierarchy::RoleHierarchy;
use crate::http::security::user::User;

/// Why a request was refused.
#[derive(Debug, Clone, Display, Error, PartialEq, Eq)]
pub enum AuthorizationError {
    #[display("authentication required")]
    Unauthenticated,
    #[display("insufficient capability: {required} required")]
    InsufficientCapability {
        #[error(not(source))]
        required: String,
    },
    #[display("only available to anonymous users")]
    AnonymousOnly,
}

/// What a matching rule demands of the principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    PermitAll,
    /// Only unauthenticated requests pass.
    Anonymous,
    Authenticated,
    Role(String),
    Authority(String),
    DenyAll,
}

impl Requirement {
    /// Requires a role; a leading `ROLE_` is ignored.
    pub fn role(role: &str) -> Self {
        Requirement::Role(role.strip_prefix("ROLE_").unwrap_or(role).to_string())
    }

    pub fn authority(authority: &str) -> Self {
        Requirement::Authority(authority.to_string())
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::PermitAll => write!(f, "permitAll"),
            Requirement::Anonymous => write!(f, "anonymous"),
            Requirement::Authenticated => write!(f, "authenticated"),
            Requirement::Role(role) => write!(f, "hasRole('{}')", role),
            Requirement::Authority(authority) => write!(f, "hasAuthority('{}')", authority),
            Requirement::DenyAll => write!(f, "denyAll"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny(AuthorizationError),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }
}

/// One row of the rule table.
#[derive(Debug, Clone)]
pub struct AccessRule {
    method: Option<Method>,
    matchers: AntMatchers,
    requirement: Requirement,
}

impl AccessRule {
    pub fn new(patterns: &[&str], requirement: Requirement) -> Self {
        AccessRule {
            method: None,
            matchers: AntMatchers::new().add_all(patterns),
            requirement,
        }
    }

    /// Matches every request; belongs at the end of the table.
    pub fn any_request(requirement: Requirement) -> Self {
        Self::new(&["/**"], requirement)
    }

    /// Restricts the rule to one HTTP method.
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn matches(&self, method: &Method, path: &str) -> bool {
        self.method.as_ref().map_or(true, |m| m == method) && self.matchers.matches(path)
    }

    pub fn requirement(&self) -> &Requirement {
        &self.requirement
    }
}

/// The ordered rule table plus the role hierarchy used to expand roles.
///
/// # Example
/// ```
/// use actix_web::http::Method;
/// use registration_security_core::http::security::{
///     AccessPolicy, AccessRule, Requirement, RoleHierarchy, User,
/// };
///
/// let policy = AccessPolicy::new(RoleHierarchy::parse("ADMIN > STAFF").unwrap())
///     .rule(AccessRule::new(&["/login*"], Requirement::PermitAll))
///     .rule(AccessRule::new(&["/roleHierarchy"], Requirement::role("STAFF")).method(Method::GET))
///     .rule(AccessRule::any_request(Requirement::Authenticated));
///
/// let admin = User::new("admin@test.com", String::new()).roles(&["ADMIN".into()]);
/// assert!(policy.evaluate(&Method::GET, "/roleHierarchy", Some(&admin)).is_allowed());
/// assert!(policy.evaluate(&Method::GET, "/login", None).is_allowed());
/// ```
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    rules: Vec<AccessRule>,
    hierarchy: RoleHierarchy,
}

impl AccessPolicy {
    pub fn new(hierarchy: RoleHierarchy) -> Self {
        AccessPolicy {
            rules: Vec::new(),
            hierarchy,
        }
    }

    /// Appends a rule after those already added.
    pub fn rule(mut self, rule: AccessRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn permit_all(self, patterns: &[&str]) -> Self {
        self.rule(AccessRule::new(patterns, Requirement::PermitAll))
    }

    pub fn rules(&self) -> &[AccessRule] {
        &self.rules
    }

    pub fn hierarchy(&self) -> &RoleHierarchy {
        &self.hierarchy
    }

    /// Returns the first rule matching the request.
    pub fn matching_rule(&self, method: &Method, path: &str) -> Option<&AccessRule> {
        self.rules.iter().find(|rule| rule.matches(method, path))
    }

    pub fn evaluate(&self, method: &Method, path: &str, user: Option<&User>) -> AccessDecision {
        let requirement = self
            .matching_rule(method, path)
            .map_or(&Requirement::DenyAll, AccessRule::requirement);
        self.check(requirement, user)
    }

    fn check(&self, requirement: &Requirement, user: Option<&User>) -> AccessDecision {
        let user = match (requirement, user) {
            (Requirement::PermitAll, _) | (Requirement::Anonymous, None) => {
                return AccessDecision::Allow
            }
            (Requirement::Anonymous, Some(_)) => {
                return AccessDecision::Deny(AuthorizationError::AnonymousOnly)
            }
            (_, None) => return AccessDecision::Deny(AuthorizationError::Unauthenticated),
            (_, Some(user)) => user,
        };

        let granted = match requirement {
            Requirement::Authenticated => true,
            Requirement::Role(role) => self
                .hierarchy
                .reachable_roles(user.get_roles())
                .contains(role),
            Requirement::Authority(authority) => user.has_authority(authority),
            _ => false,
        };

        if granted {
            AccessDecision::Allow
        } else {
            AccessDecision::Deny(AuthorizationError::InsufficientCapability {
                required: requirement.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> AccessPolicy {
        AccessPolicy::new(RoleHierarchy::parse("ADMIN > STAFF\nSTAFF > USER").unwrap())
            .permit_all(&["/login*", "/logout*", "/resources/**", "/accessDenied"])
            .rule(AccessRule::new(&["/roleHierarchy"], Requirement::role("STAFF")).method(Method::GET))
            .rule(AccessRule::new(&["/management*"], Requirement::role("MANAGER")))
            .rule(AccessRule::new(&["/invalidSession*"], Requirement::Anonymous))
            .rule(AccessRule::new(
                &["/user/updatePassword*"],
                Requirement::authority("CHANGE_PASSWORD_PRIVILEGE"),
            ))
            .rule(AccessRule::any_request(Requirement::authority("READ_PRIVILEGE")))
    }

    fn user(roles: &[&str], authorities: &[&str]) -> User {
        let roles: Vec<String> = roles.iter().map(|r| r.to_string()).collect();
        let authorities: Vec<String> = authorities.iter().map(|a| a.to_string()).collect();
        User::new("someone@test.com", String::new())
            .roles(&roles)
            .authorities(&authorities)
    }

    // =============================================================================
    // Ordering
    // =============================================================================

    #[test]
    fn test_first_match_wins() {
        let policy = AccessPolicy::default()
            .rule(AccessRule::new(&["/management*"], Requirement::PermitAll))
            .rule(AccessRule::new(&["/management*"], Requirement::DenyAll));

        assert!(policy.evaluate(&Method::GET, "/management", None).is_allowed());
    }

    #[test]
    fn test_catch_all_is_last_resort() {
        let policy = policy();
        let rule = policy.matching_rule(&Method::GET, "/homepage.html").unwrap();
        assert_eq!(rule.requirement(), &Requirement::authority("READ_PRIVILEGE"));

        let rule = policy.matching_rule(&Method::POST, "/management").unwrap();
        assert_eq!(rule.requirement(), &Requirement::role("MANAGER"));
    }

    #[test]
    fn test_unmatched_request_is_denied() {
        let policy = AccessPolicy::default().permit_all(&["/login"]);
        let manager = user(&["MANAGER"], &["READ_PRIVILEGE"]);

        assert_eq!(
            policy.evaluate(&Method::GET, "/other", None),
            AccessDecision::Deny(AuthorizationError::Unauthenticated)
        );
        assert!(!policy.evaluate(&Method::GET, "/other", Some(&manager)).is_allowed());
    }

    #[test]
    fn test_method_specific_rule() {
        let policy = policy();
        let staff = user(&["STAFF"], &["READ_PRIVILEGE"]);
        let plain = user(&["USER"], &["READ_PRIVILEGE"]);

        assert!(policy.evaluate(&Method::GET, "/roleHierarchy", Some(&staff)).is_allowed());
        assert!(!policy.evaluate(&Method::GET, "/roleHierarchy", Some(&plain)).is_allowed());
        // Non-GET falls through to the catch-all.
        assert!(policy.evaluate(&Method::POST, "/roleHierarchy", Some(&plain)).is_allowed());
    }

    // =============================================================================
    // Requirements
    // =============================================================================

    #[test]
    fn test_public_paths_for_everyone() {
        let policy = policy();
        assert!(policy.evaluate(&Method::GET, "/login", None).is_allowed());
        assert!(policy.evaluate(&Method::POST, "/logout", None).is_allowed());
        assert!(policy.evaluate(&Method::GET, "/resources/css/app.css", None).is_allowed());
        assert!(policy.evaluate(&Method::GET, "/accessDenied", Some(&user(&[], &[]))).is_allowed());
    }

    #[test]
    fn test_management_requires_manager_role() {
        let policy = policy();
        let manager = user(&["MANAGER"], &["READ_PRIVILEGE"]);
        let plain = user(&["USER"], &["READ_PRIVILEGE", "CHANGE_PASSWORD_PRIVILEGE"]);

        assert!(policy.evaluate(&Method::GET, "/management", Some(&manager)).is_allowed());
        assert_eq!(
            policy.evaluate(&Method::GET, "/management", Some(&plain)),
            AccessDecision::Deny(AuthorizationError::InsufficientCapability {
                required: "hasRole('MANAGER')".to_string()
            })
        );
        assert_eq!(
            policy.evaluate(&Method::GET, "/management", None),
            AccessDecision::Deny(AuthorizationError::Unauthenticated)
        );
    }

    #[test]
    fn test_admin_passes_staff_and_user_rules() {
        let policy = AccessPolicy::new(RoleHierarchy::parse("ADMIN > STAFF\nSTAFF > USER").unwrap())
            .rule(AccessRule::new(&["/staff"], Requirement::role("STAFF")))
            .rule(AccessRule::new(&["/user"], Requirement::role("ROLE_USER")));
        let admin = user(&["ADMIN"], &[]);

        assert!(policy.evaluate(&Method::GET, "/staff", Some(&admin)).is_allowed());
        assert!(policy.evaluate(&Method::GET, "/user", Some(&admin)).is_allowed());
    }

    #[test]
    fn test_anonymous_only_rule() {
        let policy = policy();

        assert!(policy.evaluate(&Method::GET, "/invalidSession.html", None).is_allowed());
        assert_eq!(
            policy.evaluate(&Method::GET, "/invalidSession.html", Some(&user(&["USER"], &[]))),
            AccessDecision::Deny(AuthorizationError::AnonymousOnly)
        );
    }

    #[test]
    fn test_authority_rules() {
        let policy = policy();
        let reader = user(&["USER"], &["READ_PRIVILEGE"]);
        let changer = user(&["USER"], &["READ_PRIVILEGE", "CHANGE_PASSWORD_PRIVILEGE"]);

        assert!(policy.evaluate(&Method::GET, "/homepage.html", Some(&reader)).is_allowed());
        assert!(!policy.evaluate(&Method::GET, "/user/updatePassword", Some(&reader)).is_allowed());
        assert!(policy.evaluate(&Method::GET, "/user/updatePassword", Some(&changer)).is_allowed());
        assert!(!policy
            .evaluate(&Method::GET, "/homepage.html", Some(&user(&["ADMIN"], &[])))
            .is_allowed());
    }

    #[test]
    fn test_requirement_display() {
        assert_eq!(Requirement::role("ROLE_STAFF").to_string(), "hasRole('STAFF')");
        assert_eq!(
            Requirement::authority("READ_PRIVILEGE").to_string(),
            "hasAuthority('READ_PRIVILEGE')"
        );
        assert_eq!(Requirement::PermitAll.to_string(), "permitAll");
    }
}
