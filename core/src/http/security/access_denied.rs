//! Handling of authenticated requests that fail authorization.
//!
//! # Spring Security Equivalent
//! `AccessDeniedHandler` configured through `exceptionHandling().accessDeniedHandler(..)`

use actix_web::body::EitherBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::{http, HttpResponse};

use crate::http::security::access_policy::AuthorizationError;
use crate::http::security::audit::{AuditLogger, SecurityEvent};
use crate::http::security::authorizer::routing_path;
use crate::http::security::user::User;

/// Records the denial and redirects to a fixed error page.
///
/// Every call emits exactly one `ACCESS_DENIED` event carrying the principal's
/// email and the requested URL. The response is a bare `302` so nothing about
/// the rule that refused the request reaches the client.
#[derive(Debug, Clone)]
pub struct AccessDeniedHandler {
    error_page: String,
    audit: AuditLogger,
}

impl AccessDeniedHandler {
    pub fn new() -> Self {
        AccessDeniedHandler {
            error_page: "/accessDenied".to_string(),
            audit: AuditLogger::with_tracing(),
        }
    }

    pub fn error_page(mut self, url: &str) -> Self {
        self.error_page = url.to_string();
        self
    }

    pub fn audit(mut self, audit: AuditLogger) -> Self {
        self.audit = audit;
        self
    }

    pub fn get_error_page(&self) -> &str {
        &self.error_page
    }

    pub fn handle<B>(
        &self,
        req: ServiceRequest,
        user: Option<&User>,
        reason: &AuthorizationError,
    ) -> ServiceResponse<EitherBody<B>> {
        let principal = user.map_or("anonymous", User::get_email);
        let url = request_url(&req);

        self.audit.log(
            SecurityEvent::access_denied(principal, &url)
                .ip_address(
                    req.connection_info()
                        .realip_remote_addr()
                        .unwrap_or("-")
                        .to_string(),
                )
                .detail("reason", reason.to_string()),
        );

        req.into_response(
            HttpResponse::Found()
                .append_header((http::header::LOCATION, self.error_page.as_str()))
                .finish()
                .map_into_right_body(),
        )
    }
}

impl Default for AccessDeniedHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// `scheme://host/path`, without the query string.
fn request_url(req: &ServiceRequest) -> String {
    let info = req.connection_info();
    format!("{}://{}{}", info.scheme(), info.host(), routing_path(req))
}
