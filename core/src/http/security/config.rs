//! Configuration traits for authentication and authorization.
//!
//! # Spring Equivalent
//! `AuthenticationProvider` and `AccessDecisionManager` interfaces

use actix_web::body::EitherBody;
use actix_web::cookie::Cookie;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::Error;
use futures_util::future::LocalBoxFuture;

use crate::http::security::user::User;

/// Result of identifying the principal behind a request.
#[derive(Debug)]
pub enum AuthenticationOutcome {
    Authenticated {
        user: User,
        /// Cookie to set on the response, e.g. a rotated remember-me token.
        cookie: Option<Cookie<'static>>,
    },
    Anonymous {
        cookie: Option<Cookie<'static>>,
    },
    /// The request carried a session that is no longer valid (expired,
    /// evicted by a newer login, or unknown to the registry).
    InvalidSession { redirect_url: String },
}

impl AuthenticationOutcome {
    pub fn anonymous() -> Self {
        AuthenticationOutcome::Anonymous { cookie: None }
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            AuthenticationOutcome::Authenticated { user, .. } => Some(user),
            _ => None,
        }
    }
}

/// Identifies the principal of an incoming request.
///
/// # Spring Equivalent
/// `SecurityContextPersistenceFilter` + `RememberMeAuthenticationFilter`
pub trait Authenticator {
    fn authenticate(&self, req: &ServiceRequest) -> AuthenticationOutcome;
}

/// Decides whether a request may reach its handler.
///
/// # Spring Equivalent
/// `AccessDecisionManager` / `AuthorizationManager`
///
/// The `process` method returns a boxed future that resolves to:
/// - `EitherBody::left()` when forwarding to the inner service
/// - `EitherBody::right()` for custom responses (redirects)
pub trait Authorizer<B> {
    /// # Arguments
    /// * `req` - The incoming request
    /// * `user` - The authenticated user (if any)
    /// * `next` - Closure to call the next service in the chain
    fn process(
        &self,
        req: ServiceRequest,
        user: Option<&User>,
        next: impl FnOnce(ServiceRequest) -> LocalBoxFuture<'static, Result<ServiceResponse<B>, Error>>
            + 'static,
    ) -> LocalBoxFuture<'static, Result<ServiceResponse<EitherBody<B>>, Error>>;
}
