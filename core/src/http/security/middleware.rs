//! Security middleware for Actix Web.
//!
//! # Spring Equivalent
//! `SecurityFilterChain` / `FilterChainProxy`

use std::rc::Rc;

use actix_service::{Service, Transform};
use actix_web::body::EitherBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::{http, Error, HttpMessage, HttpResponse};
use futures_util::future::{ok, LocalBoxFuture, Ready};

use crate::http::security::authorizer::routing_path;
use crate::http::security::config::{AuthenticationOutcome, Authenticator, Authorizer};

/// Security middleware factory.
///
/// Must be wrapped *inside* the session middleware so the authenticator can
/// read and purge the session.
///
/// # Spring Equivalent
/// `SecurityFilterChain`
///
/// # Example
/// ```ignore
/// App::new()
///     .wrap(
///         SecurityTransform::new()
///             .config_authenticator(move || authenticator.clone())
///             .config_authorizer(move || authorizer.clone()),
///     )
///     .wrap(SessionMiddleware::new(CookieSessionStore::default(), key))
/// ```
pub struct SecurityTransform<Auth, Autho> {
    authenticator: Option<Rc<dyn Fn() -> Auth>>,
    authorizer: Option<Rc<dyn Fn() -> Autho>>,
}

impl<Auth, Autho> SecurityTransform<Auth, Autho> {
    pub fn new() -> Self {
        SecurityTransform {
            authorizer: None,
            authenticator: None,
        }
    }

    pub fn config_authenticator(mut self, authenticator: impl Fn() -> Auth + 'static) -> Self {
        self.authenticator = Some(Rc::new(authenticator));
        self
    }

    pub fn config_authorizer(mut self, authorizer: impl Fn() -> Autho + 'static) -> Self {
        self.authorizer = Some(Rc::new(authorizer));
        self
    }
}

impl<Auth, Autho> Default for SecurityTransform<Auth, Autho> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, B, Auth, Autho> Transform<S, ServiceRequest> for SecurityTransform<Auth, Autho>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
    Auth: Authenticator + 'static,
    Autho: Authorizer<B> + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = SecurityService<Auth, Autho, S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        let authenticator = self.authenticator.as_ref().map(|f| f());
        let authorizer = self.authorizer.as_ref().map(|f| f());

        ok(SecurityService {
            authenticator,
            authorizer,
            service: Rc::new(service),
        })
    }
}

/// Security middleware service.
///
/// # Spring Equivalent
/// `FilterChainProxy`
pub struct SecurityService<Auth, Autho, S> {
    authenticator: Option<Auth>,
    authorizer: Option<Autho>,
    service: Rc<S>,
}

impl<Auth, Autho, S, B> Service<ServiceRequest> for SecurityService<Auth, Autho, S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
    Auth: Authenticator,
    Autho: Authorizer<B>,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    actix_web::dev::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        // Step 1: identify the principal (session, then remember-me)
        let outcome = self
            .authenticator
            .as_ref()
            .map_or_else(AuthenticationOutcome::anonymous, |auth| {
                auth.authenticate(&req)
            });

        let (user, cookie) = match outcome {
            AuthenticationOutcome::Authenticated { user, cookie } => (Some(user), cookie),
            AuthenticationOutcome::Anonymous { cookie } => (None, cookie),
            AuthenticationOutcome::InvalidSession { redirect_url } => {
                if routing_path(&req) != redirect_url {
                    tracing::debug!(path = %routing_path(&req), "Invalid session, redirecting");
                    return Box::pin(async move {
                        Ok(req.into_response(
                            HttpResponse::Found()
                                .append_header((http::header::LOCATION, redirect_url))
                                .finish()
                                .map_into_right_body(),
                        ))
                    });
                }
                (None, None)
            }
        };

        // Step 2: expose the user to handlers and extractors
        if let Some(ref u) = user {
            req.extensions_mut().insert(u.clone());
        }

        // Step 3: authorize
        let fut: LocalBoxFuture<'static, Result<Self::Response, Error>> = if let Some(authorizer) =
            &self.authorizer
        {
            let next = move |req: ServiceRequest| -> LocalBoxFuture<'static, Result<ServiceResponse<B>, Error>> {
                Box::pin(service.call(req))
            };
            authorizer.process(req, user.as_ref(), next)
        } else {
            let fut = service.call(req);
            Box::pin(async move {
                let res = fut.await?;
                Ok(res.map_into_left_body())
            })
        };

        Box::pin(async move {
            let mut res = fut.await?;
            if let Some(cookie) = cookie {
                res.response_mut().add_cookie(&cookie)?;
            }
            Ok(res)
        })
    }
}
