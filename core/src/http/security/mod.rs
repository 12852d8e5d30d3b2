//! Security module providing authentication and authorization.
//!
//! # Spring Equivalent
//! `org.springframework.security` package
//!
//! # Module Structure
//!
//! - `access_policy` - Ordered URL rules (AccessPolicy, AccessRule, Requirement)
//! - `access_denied` - Audited redirect for refused requests
//! - `ant_matcher` - Ant-style URL pattern matching
//! - `audit` - Security audit events and handlers
//! - `authorizer` - Policy-driven request authorization (PolicyAuthorizer)
//! - `config` - Core traits (Authenticator, Authorizer)
//! - `crypto` - Password encoding (BCrypt)
//! - `extractor` - Actix Web extractors (AuthenticatedUser, OptionalUser)
//! - `form_login` - Login and logout processing
//! - `hierarchy` - Role hierarchy
//! - `location` - Country lookups and the login location check
//! - `middleware` - Security middleware (SecurityTransform)
//! - `provider` - Username/password authentication
//! - `remember_me` - Persistent remember-me tokens
//! - `repository` - User storage
//! - `session` - Session login state and the concurrent session registry
//! - `user` - User model

pub use access_denied::AccessDeniedHandler;
pub use access_policy::{AccessDecision, AccessPolicy, AccessRule, AuthorizationError, Requirement};
pub use ant_matcher::{AntMatcher, AntMatchers};
pub use audit::{
    AuditLogger, ClosureHandler, SecurityEvent, SecurityEventHandler, SecurityEventSeverity,
    SecurityEventType, TracingHandler,
};
pub use authorizer::PolicyAuthorizer;
pub use config::{AuthenticationOutcome, Authenticator, Authorizer};
pub use crypto::{BCryptPasswordEncoder, PasswordEncoder, PasswordEncodingError};
pub use extractor::{AuthenticatedUser, OptionalUser, SecurityExt};
pub use form_login::{FormLoginConfig, FormLoginError, FormLoginService, LoginForm};
pub use hierarchy::{HierarchyError, RoleHierarchy, RoleHierarchyBuilder};
pub use location::{
    GeoIpResolver, GeoLookupError, InMemoryGeoIpResolver, LocationCheck, LocationChecker,
    LocationPolicy, MaxMindCountryResolver,
};
pub use provider::{Authentication, AuthenticationError, AuthenticationProvider, LoginContext};
pub use remember_me::{
    InMemoryTokenRepository, PersistentRememberMeToken, PersistentTokenRepository,
    RememberMeConfig, RememberMeError, RememberMeServices,
};
pub use repository::{InMemoryUserRepository, UserRepository};
pub use session::{
    ConcurrencyPolicy, SessionAuthenticator, SessionConfig, SessionError,
    SessionFixationStrategy, SessionInformation, SessionRegistry, SessionUser,
};
pub use user::User;

// Internal modules (private implementation details)
mod config;
mod extractor;
mod user;

// Public modules
pub mod access_denied;
pub mod access_policy;
pub mod ant_matcher;
pub mod audit;
pub mod authorizer;
pub mod crypto;
pub mod form_login;
pub mod hierarchy;
pub mod location;
pub mod middleware;
pub mod provider;
pub mod remember_me;
pub mod repository;
pub mod session;
