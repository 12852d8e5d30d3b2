//! Access-policy based authorization.
//!
//! # Spring Security Equivalent
//! `FilterSecurityInterceptor` + `ExceptionTranslationFilter`

use std::sync::Arc;

use actix_web::body::EitherBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::{http, Error, HttpResponse};
use futures_util::future::LocalBoxFuture;

use crate::http::security::access_denied::AccessDeniedHandler;
use crate::http::security::access_policy::{AccessDecision, AccessPolicy, AuthorizationError};
use crate::http::security::config::Authorizer;
use crate::http::security::user::User;

/// Applies an [`AccessPolicy`] to every request.
///
/// Anonymous requests to protected URLs are redirected to the login page.
/// Every other refusal goes to the [`AccessDeniedHandler`].
///
/// # Example
/// ```
/// use registration_security_core::http::security::{
///     AccessPolicy, AccessRule, PolicyAuthorizer, Requirement, RoleHierarchy,
/// };
///
/// let policy = AccessPolicy::new(RoleHierarchy::empty())
///     .permit_all(&["/login*"])
///     .rule(AccessRule::any_request(Requirement::Authenticated));
/// let authorizer = PolicyAuthorizer::new(policy).login_url("/login");
/// ```
#[derive(Debug, Clone)]
pub struct PolicyAuthorizer {
    policy: Arc<AccessPolicy>,
    login_url: String,
    access_denied: AccessDeniedHandler,
}

impl PolicyAuthorizer {
    pub fn new(policy: AccessPolicy) -> Self {
        Self::shared(Arc::new(policy))
    }

    /// Builds an authorizer over a policy shared between workers.
    pub fn shared(policy: Arc<AccessPolicy>) -> Self {
        PolicyAuthorizer {
            policy,
            login_url: "/login".to_string(),
            access_denied: AccessDeniedHandler::new(),
        }
    }

    /// Sets the login URL (default: "/login").
    pub fn login_url(mut self, url: &str) -> Self {
        self.login_url = url.to_string();
        self
    }

    pub fn access_denied_handler(mut self, handler: AccessDeniedHandler) -> Self {
        self.access_denied = handler;
        self
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }
}

impl<B: 'static> Authorizer<B> for PolicyAuthorizer {
    fn process(
        &self,
        req: ServiceRequest,
        user: Option<&User>,
        next: impl FnOnce(ServiceRequest) -> LocalBoxFuture<'static, Result<ServiceResponse<B>, Error>>
            + 'static,
    ) -> LocalBoxFuture<'static, Result<ServiceResponse<EitherBody<B>>, Error>> {
        match self.policy.evaluate(req.method(), routing_path(&req), user) {
            AccessDecision::Allow => Box::pin(async move {
                let res = next(req).await?;
                Ok(res.map_into_left_body())
            }),
            AccessDecision::Deny(AuthorizationError::Unauthenticated) => {
                tracing::debug!(path = %routing_path(&req), "Authentication required, redirecting to login");
                let login_url = self.login_url.clone();
                Box::pin(async move {
                    Ok(req.into_response(
                        HttpResponse::Found()
                            .append_header((http::header::LOCATION, login_url))
                            .finish()
                            .map_into_right_body(),
                    ))
                })
            }
            AccessDecision::Deny(reason) => {
                let res = self.access_denied.handle(req, user, &reason);
                Box::pin(async move { Ok(res) })
            }
        }
    }
}

/// The percent-decoded path the router dispatches on.
///
/// Rules are matched against this rather than the raw request path, so an
/// encoded spelling of a protected URL meets the same rule as the plain one.
pub(crate) fn routing_path(req: &ServiceRequest) -> &str {
    req.match_info().as_str()
}
