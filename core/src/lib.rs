//! # Registration Security Core
//!
//! Spring Security-style protection for the registration web application,
//! built as an Actix Web middleware.
//!
//! - Ordered Ant-style URL rules with a role hierarchy
//! - BCrypt form login with a geolocation check on every login
//! - One live session per user, tracked in a server-side registry
//! - Persistent remember-me tokens with theft detection
//! - Audited access-denied handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use actix_session::{storage::CookieSessionStore, SessionMiddleware};
//! use actix_web::{cookie::Key, App};
//! use registration_security_core::http::security::middleware::SecurityTransform;
//!
//! App::new()
//!     .wrap(
//!         SecurityTransform::new()
//!             .config_authenticator(move || sessions.clone())
//!             .config_authorizer(move || authorizer.clone()),
//!     )
//!     .wrap(SessionMiddleware::new(CookieSessionStore::default(), Key::generate()));
//! ```
//!
//! ## Modules
//!
//! - [`http::security`] - middleware, policy, authentication and session management
//! - [`http::error`] - `ResponseError` types returned by the extractors

pub mod http;
