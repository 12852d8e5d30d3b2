//! Public routes: login, logout and the error pages.

use std::collections::HashMap;

use actix_session::Session;
use actix_web::{get, post, route, web, HttpRequest, HttpResponse, Responder};

use crate::security::Security;

#[derive(Debug, serde::Deserialize)]
pub struct LoginQuery {
    error: Option<String>,
}

fn page(title: &str, body: &str) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(format!(
            "<!DOCTYPE html><html><head><title>{title}</title></head><body><h1>{title}</h1>{body}</body></html>"
        ))
}

/// Login form.
#[get("/login")]
pub async fn login_page(query: web::Query<LoginQuery>) -> impl Responder {
    let error = if query.error.is_some() {
        "<p class=\"error\">Invalid username or password.</p>"
    } else {
        ""
    };
    page(
        "Login",
        &format!(
            "{error}<form method=\"post\" action=\"/login\">\
             <input type=\"email\" name=\"username\"/>\
             <input type=\"password\" name=\"password\"/>\
             <label><input type=\"checkbox\" name=\"remember-me\"/> Remember me</label>\
             <button type=\"submit\">Login</button></form>"
        ),
    )
}

/// Processes the login form.
#[post("/login")]
pub async fn login(
    req: HttpRequest,
    session: Session,
    form: web::Form<HashMap<String, String>>,
    security: web::Data<Security>,
) -> impl Responder {
    security.form_login().login(&req, &session, &form).await
}

#[route("/logout", method = "GET", method = "POST")]
pub async fn logout(session: Session, security: web::Data<Security>) -> impl Responder {
    security.form_login().logout(&session)
}

#[get("/logout.html")]
pub async fn logout_page() -> impl Responder {
    page("Logout", "<p>You have been logged out successfully.</p>")
}

#[get("/accessDenied")]
pub async fn access_denied() -> impl Responder {
    page("Access Denied", "<p>You are not authorized to view this page.</p>")
}

/// Only reachable anonymously.
#[get("/invalidSession.html")]
pub async fn invalid_session() -> impl Responder {
    page(
        "Invalid Session",
        "<p>Your session is no longer valid. Please <a href=\"/login\">log in</a> again.</p>",
    )
}
